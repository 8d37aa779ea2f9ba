use crate::domain::model::{Credentials, IterationOutcome, ScenarioSettings};
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    fn list_files(&self) -> impl std::future::Future<Output = Result<Vec<String>>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn scenario_settings(&self) -> Result<ScenarioSettings>;
    fn monitoring_enabled(&self) -> bool;
}

#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn fetch(&self) -> Result<Credentials>;
}

/// 壓測情境：setup 只執行一次，iteration 由排程器依到達率呼叫
#[async_trait]
pub trait Scenario: Send + Sync + 'static {
    type SetupData: Send + Sync + 'static;

    async fn setup(&self) -> Result<Self::SetupData>;
    async fn iteration(&self, data: &Self::SetupData) -> IterationOutcome;
}
