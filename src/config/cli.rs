use super::{ConvertConfig, TomlConfig, DEFAULT_OUTPUT_PATH};
use crate::utils::error::Result;
use clap::Parser;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "sbml2dae")]
#[command(version, about = "Convert an SBML model into a DAE system and MATLAB code")]
pub struct CliConfig {
    #[arg(help = "SBML model file (.xml or .sbml)")]
    pub input: String,

    #[arg(long, help = "Directory for generated files [default: ./output]")]
    pub output_path: Option<String>,

    #[arg(long, help = "TOML file with model, simulation and output settings")]
    pub config: Option<String>,

    #[arg(long, help = "Name of the generated MATLAB class")]
    pub name: Option<String>,

    #[arg(long, allow_negative_numbers = true, help = "Simulation start time")]
    pub t_init: Option<f64>,

    #[arg(long, allow_negative_numbers = true, help = "Simulation end time")]
    pub t_end: Option<f64>,

    #[arg(long, help = "Also write the DAE model as JSON")]
    pub json: bool,

    #[arg(long, help = "Also write the state table as CSV")]
    pub csv: bool,

    #[arg(long, help = "Also bundle every generated file into a ZIP archive")]
    pub zip: bool,

    #[arg(long, help = "Skip the example simulation script")]
    pub no_example: bool,

    #[arg(long, help = "Build the DAE model and report it without writing files")]
    pub dry_run: bool,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON lines")]
    pub log_json: bool,
}

impl CliConfig {
    /// Merge the optional config file with the flags; flags win.
    pub fn resolve(&self) -> Result<ConvertConfig> {
        let file = match &self.config {
            Some(path) => {
                tracing::info!("Loading configuration from {}", path);
                TomlConfig::from_file(path)?
            }
            None => TomlConfig::default(),
        };
        self.merge(&file)
    }

    pub fn merge(&self, file: &TomlConfig) -> Result<ConvertConfig> {
        let mut config = ConvertConfig::from_toml(self.input.clone(), file)?;

        config.output_path = self
            .output_path
            .clone()
            .or_else(|| file.output_path().map(str::to_string))
            .unwrap_or_else(|| DEFAULT_OUTPUT_PATH.to_string());
        if let Some(name) = &self.name {
            config.model_name = Some(name.clone());
        }
        if let Some(t_init) = self.t_init {
            config.options.t_init = t_init;
        }
        if let Some(t_end) = self.t_end {
            config.options.t_end = t_end;
        }

        config.exports.json |= self.json;
        config.exports.csv |= self.csv;
        config.exports.zip |= self.zip;
        if self.no_example {
            config.exports.example = false;
        }

        Ok(config)
    }
}
