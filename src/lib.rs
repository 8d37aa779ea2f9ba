pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use config::{cli::LocalStorage, toml_config::TomlConfig, CliConfig};
pub use core::{
    engine::{LoadTestEngine, RunOutcome, THRESHOLDS_FAILED_EXIT_CODE},
    invocation::SageMakerInvocation,
    scheduler::ConstantArrivalRate,
    thresholds::ThresholdSet,
};
pub use utils::error::{LoadTestError, Result};
