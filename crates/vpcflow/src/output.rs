//! Colored rendering of a run report

use colored::Colorize;
use vpcflow_core::{RouteStatus, RunReport};

pub fn print_report(report: &RunReport) {
    if !report.stacks.is_empty() {
        println!();
        println!("{}", "Stacks".bold());
        for outcome in &report.stacks {
            match &outcome.result {
                Ok(deployed) => println!(
                    "  {} {} {}",
                    "✓".green(),
                    deployed.identity,
                    deployed.action.to_string().dimmed()
                ),
                Err(e) => println!(
                    "  {} {} ({}): {}",
                    "✗".red(),
                    outcome.stack_name,
                    outcome.region,
                    e.to_string().red()
                ),
            }
        }
    }

    if !report.connections.is_empty() {
        println!();
        println!("{}", "Peering".bold());
        for connection in &report.connections {
            let id = connection.id.as_deref().unwrap_or("-");
            match &connection.error {
                None => {
                    let note = if connection.reused { "reused" } else { "new" };
                    println!(
                        "  {} {} {} {}",
                        "✓".green(),
                        connection.pair(),
                        id.cyan(),
                        note.dimmed()
                    );
                }
                Some(e) => println!(
                    "  {} {} {}: {}",
                    "✗".red(),
                    connection.pair(),
                    id,
                    e.to_string().red()
                ),
            }
        }
    }

    for (identity, error) in &report.discovery_failures {
        println!(
            "  {} {}: {}",
            "✗".red(),
            identity,
            error.to_string().red()
        );
    }

    if !report.routes.is_empty() {
        println!();
        println!("{}", "Routes".bold());
        for outcome in &report.routes {
            match &outcome.status {
                RouteStatus::Routed(_) => {
                    println!("  {} {}", "✓".green(), outcome.pair());
                }
                RouteStatus::PartiallyRouted { error, .. } => println!(
                    "  {} {} partially routed: {}",
                    "!".yellow(),
                    outcome.pair(),
                    error.to_string().yellow()
                ),
                RouteStatus::Failed(error) => println!(
                    "  {} {}: {}",
                    "✗".red(),
                    outcome.pair(),
                    error.to_string().red()
                ),
                RouteStatus::SkippedInactiveConnection(status) => println!(
                    "  {} {} skipped (connection {})",
                    "-".dimmed(),
                    outcome.pair(),
                    status
                ),
            }
            for entry in outcome.entries() {
                println!(
                    "      {} {} → {} via {}",
                    entry.region.dimmed(),
                    entry.route_table_id,
                    entry.destination_cidr,
                    entry.via_peering_connection_id
                );
            }
        }
    }

    println!();
    println!("Stacks:  {}", report.stack_summary());
    if !report.connections.is_empty() {
        println!("Peering: {}", report.peering_summary());
    }
    if !report.routes.is_empty() {
        println!("Routes:  {}", report.route_summary());
    }
    let elapsed = format!("Finished in {:.1}s", report.duration_ms as f64 / 1000.0);
    if report.is_success() {
        println!("{}", elapsed.green().bold());
    } else {
        println!("{}", format!("{elapsed} with failures").red().bold());
    }
}
