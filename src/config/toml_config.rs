use crate::domain::model::{ExportSelection, SimulationOptions};
use crate::expr::format_number;
use crate::utils::error::{ConvertError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Optional conversion settings file.
///
/// ```toml
/// [model]
/// name = "Glycolysis"
///
/// [simulation]
/// t_init = 0
/// t_end = 120
///
/// [simulation.extra]
/// solver = "ode15s"
///
/// [output]
/// path = "${OUT_DIR}/matlab"
/// json = true
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    pub model: Option<ModelSection>,
    pub simulation: Option<SimulationSection>,
    pub output: Option<OutputSection>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelSection {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimulationSection {
    pub t_init: Option<f64>,
    pub t_end: Option<f64>,
    pub extra: Option<BTreeMap<String, toml::Value>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputSection {
    pub path: Option<String>,
    pub example: Option<bool>,
    pub json: Option<bool>,
    pub csv: Option<bool>,
    pub zip: Option<bool>,
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(ConvertError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;
        Ok(toml::from_str(&processed_content)?)
    }

    /// 替換環境變數 (例如 ${OUT_DIR})
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| ConvertError::ConfigError {
            message: format!("invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn model_name(&self) -> Option<&str> {
        self.model.as_ref().and_then(|m| m.name.as_deref())
    }

    pub fn output_path(&self) -> Option<&str> {
        self.output.as_ref().and_then(|o| o.path.as_deref())
    }

    /// Simulation options with file values applied over the defaults.
    pub fn simulation_options(&self) -> Result<SimulationOptions> {
        let mut options = SimulationOptions::default();
        if let Some(sim) = &self.simulation {
            if let Some(t_init) = sim.t_init {
                options.t_init = t_init;
            }
            if let Some(t_end) = sim.t_end {
                options.t_end = t_end;
            }
            for (key, value) in sim.extra.iter().flatten() {
                options.extra.insert(key.clone(), matlab_literal(key, value)?);
            }
        }
        Ok(options)
    }

    pub fn exports(&self) -> ExportSelection {
        let defaults = ExportSelection::default();
        match &self.output {
            Some(o) => ExportSelection {
                example: o.example.unwrap_or(defaults.example),
                json: o.json.unwrap_or(defaults.json),
                csv: o.csv.unwrap_or(defaults.csv),
                zip: o.zip.unwrap_or(defaults.zip),
            },
            None => defaults,
        }
    }
}

/// Render a TOML value as a MATLAB literal for `opts.<key> = <literal>;`.
fn matlab_literal(key: &str, value: &toml::Value) -> Result<String> {
    match value {
        toml::Value::String(s) => Ok(format!("'{}'", s.replace('\'', "''"))),
        toml::Value::Integer(i) => Ok(i.to_string()),
        toml::Value::Float(f) => Ok(format_number(*f)),
        toml::Value::Boolean(b) => Ok(b.to_string()),
        toml::Value::Array(items) => {
            let rendered = items
                .iter()
                .map(|item| match item {
                    toml::Value::Array(_) | toml::Value::Table(_) => {
                        Err(unsupported(key, "nested arrays and tables"))
                    }
                    other => matlab_literal(key, other),
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(format!("[{}]", rendered.join(" ")))
        }
        toml::Value::Datetime(_) => Err(unsupported(key, "datetimes")),
        toml::Value::Table(_) => Err(unsupported(key, "tables")),
    }
}

fn unsupported(key: &str, what: &str) -> ConvertError {
    ConvertError::InvalidConfigValueError {
        field: format!("simulation.extra.{}", key),
        value: what.to_string(),
        reason: format!("{} cannot be expressed as simulation options", what),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_full_config() {
        let toml_content = r#"
[model]
name = "Glycolysis"

[simulation]
t_init = 0
t_end = 120.5

[simulation.extra]
solver = "ode15s"
max_step = 0.5
refine = 4
span = [1, 2, 3]

[output]
path = "./matlab"
json = true
example = false
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.model_name(), Some("Glycolysis"));
        assert_eq!(config.output_path(), Some("./matlab"));

        let options = config.simulation_options().unwrap();
        assert_eq!(options.t_init, 0.0);
        assert_eq!(options.t_end, 120.5);
        assert_eq!(options.extra["solver"], "'ode15s'");
        assert_eq!(options.extra["max_step"], "0.5");
        assert_eq!(options.extra["refine"], "4");
        assert_eq!(options.extra["span"], "[1 2 3]");

        let exports = config.exports();
        assert!(exports.json);
        assert!(!exports.example);
        assert!(!exports.csv);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = TomlConfig::from_toml_str("").unwrap();
        assert_eq!(config.model_name(), None);
        assert_eq!(config.simulation_options().unwrap(), SimulationOptions::default());
        assert_eq!(config.exports(), ExportSelection::default());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("SBML2DAE_TEST_OUT", "/tmp/generated");

        let config = TomlConfig::from_toml_str(
            r#"
[output]
path = "${SBML2DAE_TEST_OUT}/matlab"
"#,
        )
        .unwrap();
        assert_eq!(config.output_path(), Some("/tmp/generated/matlab"));

        std::env::remove_var("SBML2DAE_TEST_OUT");
    }

    #[test]
    fn test_unsupported_extra_value() {
        let config = TomlConfig::from_toml_str(
            r#"
[simulation.extra]
nested = { a = 1 }
"#,
        )
        .unwrap();
        assert!(config.simulation_options().is_err());
    }

    #[test]
    fn test_invalid_toml() {
        let err = TomlConfig::from_toml_str("[simulation\nt_end = 1").unwrap_err();
        assert!(matches!(err, ConvertError::TomlError(_)));
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[model]\nname = \"FromFile\"\n")
            .unwrap();

        let config = TomlConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.model_name(), Some("FromFile"));
    }
}
