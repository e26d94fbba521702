pub mod changelog;
pub mod config;
pub mod core;
pub mod domain;
pub mod export;
pub mod expr;
pub mod sbml;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::{ConvertConfig, LocalStorage, TomlConfig};

pub use core::{ConversionReport, ConvertEngine, ConvertPipeline, DaeBuilder};
pub use domain::model::{DaeModel, ModelParameter, SimulationOptions, State, StateType};
pub use sbml::{parse_sbml, SbmlDocument};
pub use utils::error::{ConvertError, Result};
