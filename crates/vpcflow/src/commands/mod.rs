pub mod run;
pub mod validate;

use anyhow::Context;
use std::path::Path;
use vpcflow_config::{Settings, Templates, VpcSpec};

/// Load the VPC list, the templates it references and the run settings
pub fn load_inputs(
    config: &Path,
    template_dir: &Path,
    settings: Option<&Path>,
) -> anyhow::Result<(Vec<VpcSpec>, Templates, Settings)> {
    let specs = vpcflow_config::load_specs(config)
        .with_context(|| format!("Failed to load VPC list {}", config.display()))?;
    let templates = vpcflow_config::load_templates(template_dir, &specs)
        .with_context(|| format!("Failed to load templates from {}", template_dir.display()))?;
    let settings = Settings::load(settings).context("Failed to load settings")?;
    Ok((specs, templates, settings))
}
