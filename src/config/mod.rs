#[cfg(feature = "cli")]
pub mod cli;
pub mod local;
pub mod toml_config;

#[cfg(feature = "cli")]
pub use cli::CliConfig;
pub use local::LocalStorage;
pub use toml_config::TomlConfig;

use crate::domain::model::{ExportSelection, SimulationOptions};
use crate::domain::ports::ConfigProvider;
use crate::utils::error::Result;
use crate::utils::validation::{
    validate_file_extension, validate_interval, validate_matlab_identifier, validate_path,
    Validate,
};

pub const DEFAULT_OUTPUT_PATH: &str = "./output";

/// Fully resolved settings for one conversion run.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertConfig {
    pub input_path: String,
    pub output_path: String,
    pub model_name: Option<String>,
    pub options: SimulationOptions,
    pub exports: ExportSelection,
}

impl ConvertConfig {
    pub fn new(input_path: impl Into<String>) -> Self {
        Self {
            input_path: input_path.into(),
            output_path: DEFAULT_OUTPUT_PATH.to_string(),
            model_name: None,
            options: SimulationOptions::default(),
            exports: ExportSelection::default(),
        }
    }

    /// Settings from a config file, for library callers without a command line.
    pub fn from_toml(input_path: impl Into<String>, file: &TomlConfig) -> Result<Self> {
        Ok(Self {
            input_path: input_path.into(),
            output_path: file
                .output_path()
                .unwrap_or(DEFAULT_OUTPUT_PATH)
                .to_string(),
            model_name: file.model_name().map(str::to_string),
            options: file.simulation_options()?,
            exports: file.exports(),
        })
    }
}

impl ConfigProvider for ConvertConfig {
    fn input_path(&self) -> &str {
        &self.input_path
    }

    fn output_path(&self) -> &str {
        &self.output_path
    }

    fn model_name(&self) -> Option<&str> {
        self.model_name.as_deref()
    }

    fn simulation_options(&self) -> SimulationOptions {
        self.options.clone()
    }

    fn exports(&self) -> ExportSelection {
        self.exports
    }
}

impl Validate for ConvertConfig {
    fn validate(&self) -> Result<()> {
        validate_path("input", &self.input_path)?;
        validate_file_extension("input", &self.input_path, &["xml", "sbml"])?;
        validate_path("output_path", &self.output_path)?;
        if let Some(name) = &self.model_name {
            validate_matlab_identifier("name", name)?;
        }
        validate_interval("simulation", self.options.t_init, self.options.t_end)?;
        for key in self.options.extra.keys() {
            validate_matlab_identifier("simulation.extra", key)?;
        }
        Ok(())
    }
}
