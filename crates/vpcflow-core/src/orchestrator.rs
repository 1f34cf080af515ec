//! Phase sequencing: stacks, then peering, then routes

use crate::context::Context;
use crate::discovery::{ConnectionDiscovery, Discovered, DiscoveryTarget};
use crate::error::LifecycleError;
use crate::lifecycle::{DeployedStack, StackLifecycleManager};
use crate::locks::StackLocks;
use crate::mesh::PeeringMeshBuilder;
use crate::model::{PeeringConnection, VpcIdentity};
use crate::report::{RunReport, StackOutcome};
use crate::routes::{RouteOutcome, RouteTablePropagator};
use futures_util::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::info;
use vpcflow_cloud::ProviderGateway;
use vpcflow_config::{Settings, Templates, VpcSpec};

/// Which phases a run executes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pipeline {
    /// Deploy, peer and route
    Up,
    /// Create or update stacks only
    Deploy,
    /// Peer already deployed stacks
    Peer,
    /// Route existing peering connections
    Route,
}

impl std::fmt::Display for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Pipeline::Up => "up",
            Pipeline::Deploy => "deploy",
            Pipeline::Peer => "peer",
            Pipeline::Route => "route",
        };
        f.write_str(name)
    }
}

pub struct Orchestrator {
    ctx: Context,
    locks: StackLocks,
}

impl Orchestrator {
    pub fn new(
        provider: Arc<dyn ProviderGateway>,
        settings: Settings,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            ctx: Context::new(provider, settings, cancel),
            locks: StackLocks::new(),
        }
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// Run the phases of `pipeline` strictly in sequence
    pub async fn run(
        &self,
        pipeline: Pipeline,
        specs: &[VpcSpec],
        templates: &Templates,
    ) -> RunReport {
        let start = Instant::now();
        info!(
            pipeline = %pipeline,
            vpcs = specs.len(),
            provider = %self.ctx.gateway.provider_name(),
            "Starting run"
        );

        let mut report = RunReport {
            stacks: match pipeline {
                Pipeline::Up | Pipeline::Deploy => self.deploy(specs, templates).await,
                Pipeline::Peer | Pipeline::Route => self.resolve(specs).await,
            },
            ..Default::default()
        };
        info!(summary = %report.stack_summary(), "Stack phase finished");

        match pipeline {
            Pipeline::Deploy => {}
            Pipeline::Up | Pipeline::Peer => {
                report.connections = self.peer(&report.identities()).await;
                info!(summary = %report.peering_summary(), "Peering phase finished");
                if pipeline == Pipeline::Up {
                    report.routes = self.route(&report.connections).await;
                    info!(summary = %report.route_summary(), "Routing phase finished");
                }
            }
            Pipeline::Route => {
                let targets = discovery_targets(specs, &report.stacks, &self.ctx.settings);
                let Discovered {
                    connections,
                    failures,
                } = self.discover(&targets).await;
                report.discovery_failures = failures;
                report.routes = self.route(&connections).await;
                info!(summary = %report.route_summary(), "Routing phase finished");
            }
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            success = report.is_success(),
            duration_ms = report.duration_ms,
            "Run finished"
        );
        report
    }

    /// Phase 1: create or update every stack
    pub async fn deploy(&self, specs: &[VpcSpec], templates: &Templates) -> Vec<StackOutcome> {
        let manager = StackLifecycleManager::with_locks(self.ctx.clone(), self.locks.clone());
        let manager = &manager;
        stream::iter(specs)
            .map(move |spec| async move {
                let _permit = self.ctx.limiter.acquire(&spec.region).await;
                let result = if self.ctx.cancel.is_cancelled() {
                    Err(LifecycleError::Cancelled)
                } else {
                    manager.deploy(spec, templates).await
                };
                outcome(spec, result)
            })
            .buffered(self.ctx.max_in_flight())
            .collect()
            .await
    }

    /// Look up the VPCs of stacks that are already deployed
    pub async fn resolve(&self, specs: &[VpcSpec]) -> Vec<StackOutcome> {
        let manager = StackLifecycleManager::with_locks(self.ctx.clone(), self.locks.clone());
        let manager = &manager;
        stream::iter(specs)
            .map(move |spec| async move {
                let result = if self.ctx.cancel.is_cancelled() {
                    Err(LifecycleError::Cancelled)
                } else {
                    manager.resolve(spec).await
                };
                outcome(spec, result)
            })
            .buffered(self.ctx.max_in_flight())
            .collect()
            .await
    }

    /// Phase 2
    pub async fn peer(&self, vpcs: &[VpcIdentity]) -> Vec<PeeringConnection> {
        PeeringMeshBuilder::new(self.ctx.clone())
            .build_mesh(vpcs)
            .await
    }

    /// Phase 3
    pub async fn route(&self, connections: &[PeeringConnection]) -> Vec<RouteOutcome> {
        RouteTablePropagator::new(self.ctx.clone())
            .propagate_routes(connections)
            .await
    }

    pub async fn discover(&self, targets: &[DiscoveryTarget]) -> Discovered {
        ConnectionDiscovery::new(self.ctx.clone())
            .discover(targets)
            .await
    }
}

fn outcome(
    spec: &VpcSpec,
    result: Result<DeployedStack, LifecycleError>,
) -> StackOutcome {
    StackOutcome {
        stack_name: spec.stack_name(),
        region: spec.region.clone(),
        result,
    }
}

/// Pair each resolved stack with the CIDR block its spec configures
fn discovery_targets(
    specs: &[VpcSpec],
    stacks: &[StackOutcome],
    settings: &Settings,
) -> Vec<DiscoveryTarget> {
    specs
        .iter()
        .zip(stacks)
        .filter_map(|(spec, outcome)| {
            outcome.identity().map(|identity| DiscoveryTarget {
                identity: identity.clone(),
                cidr_block: spec
                    .parameter(&settings.routing.cidr_parameter)
                    .map(str::to_string),
            })
        })
        .collect()
}
