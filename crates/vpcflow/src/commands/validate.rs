use crate::Target;
use colored::Colorize;
use std::path::Path;
use vpcflow_config::Topology;
use vpcflow_core::plan_pairs;

pub fn handle(target: &Target, settings_path: Option<&Path>) -> anyhow::Result<bool> {
    println!("{}", "Validating configuration...".blue());

    let (specs, templates, settings) =
        super::load_inputs(&target.config, &target.template_dir, settings_path)?;

    println!("{}", "✓ Configuration is valid".green().bold());
    println!();
    println!("VPCs: {}", specs.len());
    for spec in &specs {
        let cidr = spec
            .parameter(&settings.routing.cidr_parameter)
            .unwrap_or("(not set)");
        println!(
            "  - {} ({}, {}, template {})",
            spec.stack_name().cyan(),
            spec.region,
            cidr,
            spec.template_reference
        );
    }
    println!("Templates: {}", templates.len());
    let topology = match settings.mesh.topology {
        Topology::Mesh => "mesh",
        Topology::Hub => "hub",
    };
    println!(
        "Peering: {} connections ({topology})",
        plan_pairs(specs.len(), settings.mesh.topology).len()
    );

    Ok(true)
}
