use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("XML error: {0}")]
    XmlError(#[from] quick_xml::Error),

    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("SBML parse error in <{element}>: {message}")]
    SbmlParseError { element: String, message: String },

    #[error("DAE construction error: {message}")]
    DaeBuildError { message: String },

    #[error("Export error: {message}")]
    ExportError { message: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Changelog is invalid: {} problem(s)", .problems.len())]
    ChangelogError { problems: Vec<String> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Input,
    Model,
    Output,
    Configuration,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ConvertError {
    pub fn sbml(element: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SbmlParseError {
            element: element.into(),
            message: message.into(),
        }
    }

    pub fn dae(message: impl Into<String>) -> Self {
        Self::DaeBuildError {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::XmlError(_) | Self::SbmlParseError { .. } => ErrorCategory::Input,
            Self::DaeBuildError { .. } => ErrorCategory::Model,
            Self::ZipError(_)
            | Self::CsvError(_)
            | Self::SerializationError(_)
            | Self::ExportError { .. } => ErrorCategory::Output,
            Self::TomlError(_)
            | Self::ConfigError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::ChangelogError { .. } => ErrorCategory::Configuration,
            Self::IoError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Input | ErrorCategory::Model | ErrorCategory::Configuration => {
                ErrorSeverity::High
            }
            ErrorCategory::Output => ErrorSeverity::Medium,
            ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            Self::XmlError(_) => "Check that the input is well-formed XML",
            Self::SbmlParseError { .. } => {
                "Validate the model with an SBML validator; only SBML core is supported"
            }
            Self::DaeBuildError { .. } => {
                "Check the model rules for cyclic assignments or over-determined algebraic rules"
            }
            Self::ZipError(_) | Self::CsvError(_) | Self::SerializationError(_) => {
                "Retry, or disable the optional export that failed"
            }
            Self::ExportError { .. } => "Check that model identifiers are valid MATLAB names",
            Self::TomlError(_) | Self::ConfigError { .. } => {
                "Fix the configuration file syntax and try again"
            }
            Self::InvalidConfigValueError { .. } => {
                "Review the command line flags and configuration values"
            }
            Self::ChangelogError { .. } => "Follow the Keep a Changelog format",
            Self::IoError(_) => "Check file paths and permissions",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::IoError(e) => format!("Could not access a file: {}", e),
            Self::ChangelogError { problems } => {
                let mut message = String::from("Changelog validation failed:");
                for problem in problems {
                    message.push_str("\n  - ");
                    message.push_str(problem);
                }
                message
            }
            other => other.to_string(),
        }
    }

    /// Process exit code for this error; `None` means the run should still succeed.
    pub fn exit_code(&self) -> Option<i32> {
        match self.severity() {
            ErrorSeverity::Low => None,
            ErrorSeverity::Medium => Some(2),
            ErrorSeverity::High => Some(1),
            ErrorSeverity::Critical => Some(3),
        }
    }
}

pub type Result<T> = std::result::Result<T, ConvertError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_errors_are_high_severity_input() {
        let err = ConvertError::sbml("species", "missing id");
        assert_eq!(err.category(), ErrorCategory::Input);
        assert_eq!(err.severity(), ErrorSeverity::High);
        assert_eq!(err.exit_code(), Some(1));
        assert_eq!(err.to_string(), "SBML parse error in <species>: missing id");
    }

    #[test]
    fn test_io_errors_are_critical() {
        let err = ConvertError::from(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "model.xml",
        ));
        assert_eq!(err.severity(), ErrorSeverity::Critical);
        assert_eq!(err.exit_code(), Some(3));
        assert!(err.user_friendly_message().starts_with("Could not access a file"));
    }

    #[test]
    fn test_changelog_message_lists_problems() {
        let err = ConvertError::ChangelogError {
            problems: vec!["bad date".to_string(), "bad version".to_string()],
        };
        assert_eq!(err.to_string(), "Changelog is invalid: 2 problem(s)");
        let message = err.user_friendly_message();
        assert!(message.contains("  - bad date"));
        assert!(message.contains("  - bad version"));
    }
}
