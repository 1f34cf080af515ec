use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid YAML in {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("VPC entry #{index}: {message}")]
    InvalidEntry { index: usize, message: String },

    #[error("VPC '{vpc_name}' is defined more than once for region {region}")]
    DuplicateVpc { region: String, vpc_name: String },

    #[error("Configuration contains no VPC entries")]
    Empty,

    #[error("Template '{reference}' not found under {dir}")]
    TemplateNotFound { reference: String, dir: PathBuf },

    #[error("Invalid settings: {0}")]
    InvalidSettings(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
