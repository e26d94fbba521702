pub mod builder;
pub mod engine;
pub mod pipeline;

pub use crate::domain::ports::{ConfigProvider, Pipeline, Storage};
pub use crate::utils::error::Result;
pub use builder::DaeBuilder;
pub use engine::{ConversionReport, ConvertEngine};
pub use pipeline::ConvertPipeline;
