pub mod bundle;
pub mod matlab;
pub mod tabular;

use crate::domain::model::DaeModel;
use crate::utils::error::Result;

pub use bundle::bundle;
pub use matlab::MatlabExporter;
pub use tabular::{CsvExporter, JsonExporter};

/// A generated file, named relative to the output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedFile {
    pub name: String,
    pub contents: Vec<u8>,
}

impl RenderedFile {
    pub fn new(name: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            contents: contents.into(),
        }
    }
}

pub trait Exporter: Send + Sync {
    fn render(&self, model: &DaeModel) -> Result<Vec<RenderedFile>>;
}
