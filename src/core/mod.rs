pub mod credentials;
pub mod engine;
pub mod invocation;
pub mod metrics;
pub mod payload;
pub mod report;
pub mod scheduler;
pub mod signer;
pub mod thresholds;

pub use crate::domain::model::{Credentials, IterationOutcome, Payload, ScenarioSettings};
pub use crate::domain::ports::{ConfigProvider, CredentialProvider, Scenario, Storage};
pub use crate::utils::error::Result;
