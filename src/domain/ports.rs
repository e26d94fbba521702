use crate::domain::model::{DaeModel, ExportSelection, SimulationOptions};
use crate::sbml::SbmlDocument;
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn input_path(&self) -> &str;
    fn output_path(&self) -> &str;
    fn model_name(&self) -> Option<&str>;
    fn simulation_options(&self) -> SimulationOptions;
    fn exports(&self) -> ExportSelection;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<SbmlDocument>;
    async fn transform(&self, document: SbmlDocument) -> Result<DaeModel>;
    async fn load(&self, model: DaeModel) -> Result<Vec<String>>;
}
