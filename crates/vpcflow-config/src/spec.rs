//! VPC specification list
//!
//! The configuration file is a YAML sequence, one entry per VPC:
//!
//! ```yaml
//! - Region: us-east-1
//!   vpc_name: core
//!   Template: vpc.yaml
//!   Parameters:
//!     VPCCIDRBlock: 10.0.0.0/16
//! ```
//!
//! Snake-case keys (`region`, `template`, `parameters`) are accepted as well.

use crate::error::{ConfigError, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::path::{Component, Path, PathBuf};

/// Desired state of one VPC
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VpcSpec {
    pub region: String,
    pub vpc_name: String,
    /// Template file name, relative to the template directory
    pub template_reference: String,
    pub parameters: BTreeMap<String, String>,
}

impl VpcSpec {
    /// Name of the stack that owns this VPC
    pub fn stack_name(&self) -> String {
        format!("{}-{}", self.region, self.vpc_name)
    }

    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).map(String::as_str)
    }
}

#[derive(Debug, Deserialize)]
struct RawVpcSpec {
    #[serde(rename = "Region", alias = "region")]
    region: Option<String>,
    #[serde(alias = "VpcName", alias = "vpcName")]
    vpc_name: Option<String>,
    #[serde(rename = "Template", alias = "template", alias = "template_reference")]
    template: Option<String>,
    #[serde(rename = "Parameters", alias = "parameters", default)]
    parameters: BTreeMap<String, serde_yaml::Value>,
}

/// Read and validate a VPC specification file
pub fn load_specs(path: impl AsRef<Path>) -> Result<Vec<VpcSpec>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.to_path_buf()));
    }
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let specs = parse_specs(&content).map_err(|e| match e {
        ConfigError::Yaml { source, .. } => ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        },
        other => other,
    })?;
    tracing::debug!("Loaded {} VPC specifications from {}", specs.len(), path.display());
    Ok(specs)
}

/// Parse and validate a VPC specification document
pub fn parse_specs(content: &str) -> Result<Vec<VpcSpec>> {
    let raw: Option<Vec<RawVpcSpec>> =
        serde_yaml::from_str(content).map_err(|source| ConfigError::Yaml {
            path: PathBuf::new(),
            source,
        })?;
    let raw = raw.unwrap_or_default();
    if raw.is_empty() {
        return Err(ConfigError::Empty);
    }

    let mut seen = HashSet::new();
    let mut specs = Vec::with_capacity(raw.len());
    for (index, entry) in raw.into_iter().enumerate() {
        let spec = validate(index, entry)?;
        if !seen.insert((spec.region.clone(), spec.vpc_name.clone())) {
            return Err(ConfigError::DuplicateVpc {
                region: spec.region,
                vpc_name: spec.vpc_name,
            });
        }
        specs.push(spec);
    }
    Ok(specs)
}

fn validate(index: usize, raw: RawVpcSpec) -> Result<VpcSpec> {
    let invalid = |message: String| ConfigError::InvalidEntry { index, message };

    let region = required(raw.region, "Region").map_err(invalid)?;
    let vpc_name = required(raw.vpc_name, "vpc_name").map_err(invalid)?;
    let template_reference = required(raw.template, "Template").map_err(invalid)?;

    if !region
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(invalid(format!("malformed region '{region}'")));
    }
    // stack names are `<region>-<vpc_name>` and only allow alphanumerics and hyphens
    if !vpc_name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(invalid(format!(
            "vpc_name '{vpc_name}' may only contain letters, digits and hyphens"
        )));
    }

    let mut parameters = BTreeMap::new();
    for (key, value) in raw.parameters {
        let value = match value {
            serde_yaml::Value::String(s) => s,
            serde_yaml::Value::Number(n) => n.to_string(),
            serde_yaml::Value::Bool(b) => b.to_string(),
            _ => {
                return Err(invalid(format!(
                    "parameter '{key}' must be a string, number or boolean"
                )));
            }
        };
        parameters.insert(key, value);
    }

    Ok(VpcSpec {
        region,
        vpc_name,
        template_reference,
        parameters,
    })
}

fn required(value: Option<String>, field: &str) -> std::result::Result<String, String> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(format!("missing required field '{field}'")),
    }
}

/// Template bodies keyed by template reference
#[derive(Debug, Clone, Default)]
pub struct Templates {
    bodies: BTreeMap<String, String>,
}

impl Templates {
    pub fn get(&self, reference: &str) -> Option<&str> {
        self.bodies.get(reference).map(String::as_str)
    }

    pub fn insert(&mut self, reference: impl Into<String>, body: impl Into<String>) {
        self.bodies.insert(reference.into(), body.into());
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }
}

/// Read every template the specs reference from `dir`
pub fn load_templates(dir: impl AsRef<Path>, specs: &[VpcSpec]) -> Result<Templates> {
    let dir = dir.as_ref();
    let mut templates = Templates::default();
    for spec in specs {
        if templates.get(&spec.template_reference).is_some() {
            continue;
        }
        let path = resolve_template(dir, &spec.template_reference)?;
        let body = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        tracing::debug!("Loaded template {}", path.display());
        templates.insert(spec.template_reference.clone(), body);
    }
    Ok(templates)
}

/// Locate a template file, refusing references that leave `dir`
pub fn resolve_template(dir: &Path, reference: &str) -> Result<PathBuf> {
    let not_found = || ConfigError::TemplateNotFound {
        reference: reference.to_string(),
        dir: dir.to_path_buf(),
    };
    let relative = Path::new(reference);
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return Err(not_found());
    }
    let path = dir.join(relative);
    if path.is_file() { Ok(path) } else { Err(not_found()) }
}
