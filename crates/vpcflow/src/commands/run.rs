use crate::RunArgs;
use crate::output;
use colored::Colorize;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use vpcflow_cloud_aws::AwsGateway;
use vpcflow_core::{Orchestrator, Pipeline};

pub async fn handle(
    pipeline: Pipeline,
    args: &RunArgs,
    settings_path: Option<&Path>,
) -> anyhow::Result<bool> {
    let (specs, templates, mut settings) = super::load_inputs(
        &args.target.config,
        &args.target.template_dir,
        settings_path,
    )?;
    if let Some(max_in_flight) = args.max_in_flight {
        settings.concurrency.max_in_flight = max_in_flight;
    }
    if let Some(per_region) = args.per_region {
        settings.concurrency.per_region = per_region;
    }
    if let Some(topology) = args.topology {
        settings.mesh.topology = topology;
    }
    settings.validate()?;

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!(
                    "{}",
                    "Interrupted: letting in-flight calls finish, starting nothing new".yellow()
                );
                cancel.cancel();
            }
        }
    });

    println!(
        "{} {} ({} VPCs)",
        "vpcflow".bold(),
        pipeline.to_string().cyan(),
        specs.len()
    );

    let provider = Arc::new(AwsGateway::new(Some(settings.timeouts.call())));
    let report = Orchestrator::new(provider, settings, cancel)
        .run(pipeline, &specs, &templates)
        .await;

    output::print_report(&report);
    Ok(report.is_success())
}
