//! Route propagation across active peering connections

use crate::context::Context;
use crate::error::RouteError;
use crate::model::{PeeringConnection, RouteEntry, VpcIdentity};
use futures_util::stream::{self, StreamExt};
use tracing::{debug, info, warn};
use vpcflow_cloud::{PeerVpc, PeeringStatus, ResourceTag, RouteRequest};

/// Result of routing one connection
#[derive(Debug, Clone, PartialEq)]
pub enum RouteStatus {
    /// Requester entry first, accepter entry second
    Routed([RouteEntry; 2]),
    /// One side was written, the other failed
    PartiallyRouted {
        applied: RouteEntry,
        error: RouteError,
    },
    Failed(RouteError),
    SkippedInactiveConnection(PeeringStatus),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RouteOutcome {
    pub connection_id: Option<String>,
    pub requester: VpcIdentity,
    pub accepter: VpcIdentity,
    pub status: RouteStatus,
}

impl RouteOutcome {
    pub fn is_routed(&self) -> bool {
        matches!(self.status, RouteStatus::Routed(_))
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self.status,
            RouteStatus::PartiallyRouted { .. } | RouteStatus::Failed(_)
        )
    }

    /// Entries written for this connection
    pub fn entries(&self) -> Vec<&RouteEntry> {
        match &self.status {
            RouteStatus::Routed(entries) => entries.iter().collect(),
            RouteStatus::PartiallyRouted { applied, .. } => vec![applied],
            _ => Vec::new(),
        }
    }

    pub fn pair(&self) -> String {
        format!("{} <-> {}", self.requester.stack_name, self.accepter.stack_name)
    }
}

pub struct RouteTablePropagator {
    ctx: Context,
}

impl RouteTablePropagator {
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }

    /// Route every active connection; inactive ones are reported as skipped.
    ///
    /// Outcomes are returned in input order.
    pub async fn propagate_routes(&self, connections: &[PeeringConnection]) -> Vec<RouteOutcome> {
        info!(connections = connections.len(), "Propagating routes");
        stream::iter(connections)
            .map(|connection| self.route_connection(connection))
            .buffered(self.ctx.max_in_flight())
            .collect()
            .await
    }

    async fn route_connection(&self, connection: &PeeringConnection) -> RouteOutcome {
        let status = match connection.id.as_deref() {
            Some(id) if connection.is_active() => {
                if self.ctx.cancel.is_cancelled() {
                    RouteStatus::Failed(RouteError::Cancelled)
                } else {
                    let _permit = self.ctx.limiter.acquire(&connection.requester.region).await;
                    self.route(id, connection)
                        .await
                        .unwrap_or_else(RouteStatus::Failed)
                }
            }
            _ => {
                debug!(
                    pair = %connection.pair(),
                    status = %connection.status,
                    "Skipping inactive connection"
                );
                RouteStatus::SkippedInactiveConnection(connection.status)
            }
        };

        match &status {
            RouteStatus::Failed(e) | RouteStatus::PartiallyRouted { error: e, .. } => {
                warn!(pair = %connection.pair(), error = %e, "Route propagation failed");
            }
            _ => {}
        }

        RouteOutcome {
            connection_id: connection.id.clone(),
            requester: connection.requester.clone(),
            accepter: connection.accepter.clone(),
            status,
        }
    }

    async fn route(
        &self,
        peering_id: &str,
        connection: &PeeringConnection,
    ) -> Result<RouteStatus, RouteError> {
        let requester = &connection.requester;
        let accepter = &connection.accepter;

        let description = self
            .ctx
            .gateway
            .describe_peering(&requester.region, peering_id)
            .await?;
        // reused connections may have been requested from the other side
        let (requester_side, accepter_side) =
            if description.requester.vpc_id == requester.vpc_id {
                (&description.requester, &description.accepter)
            } else {
                (&description.accepter, &description.requester)
            };
        let requester_cidr = cidr_block(requester_side)?;
        let accepter_cidr = cidr_block(accepter_side)?;

        let requester_table = self.public_route_table(requester).await?;
        let accepter_table = self.public_route_table(accepter).await?;

        let forward = RouteEntry {
            route_table_id: requester_table,
            destination_cidr: accepter_cidr,
            via_peering_connection_id: peering_id.to_string(),
            region: requester.region.clone(),
        };
        let backward = RouteEntry {
            route_table_id: accepter_table,
            destination_cidr: requester_cidr,
            via_peering_connection_id: peering_id.to_string(),
            region: accepter.region.clone(),
        };

        let (forward_result, backward_result) =
            tokio::join!(self.put_route(&forward), self.put_route(&backward));

        Ok(match (forward_result, backward_result) {
            (Ok(()), Ok(())) => {
                info!(peering_id = %peering_id, pair = %connection.pair(), "Routes in place");
                RouteStatus::Routed([forward, backward])
            }
            (Ok(()), Err(error)) => RouteStatus::PartiallyRouted {
                applied: forward,
                error,
            },
            (Err(error), Ok(())) => RouteStatus::PartiallyRouted {
                applied: backward,
                error,
            },
            (Err(requester), Err(accepter)) => RouteStatus::Failed(RouteError::BothSides {
                requester: Box::new(requester),
                accepter: Box::new(accepter),
            }),
        })
    }

    /// The single route table of `vpc` carrying the configured tag
    async fn public_route_table(&self, vpc: &VpcIdentity) -> Result<String, RouteError> {
        let routing = &self.ctx.settings.routing;
        let tag = ResourceTag::new(&routing.table_tag_key, &routing.table_tag_value);
        let mut tables = self
            .ctx
            .gateway
            .route_tables(&vpc.region, &vpc.vpc_id, &tag)
            .await?;

        match tables.len() {
            1 => Ok(tables.remove(0)),
            0 => Err(RouteError::RouteConfiguration {
                region: vpc.region.clone(),
                vpc_id: vpc.vpc_id.clone(),
                reason: format!("no route table tagged {}={}", tag.key, tag.value),
            }),
            n => Err(RouteError::RouteConfiguration {
                region: vpc.region.clone(),
                vpc_id: vpc.vpc_id.clone(),
                reason: format!(
                    "{n} route tables tagged {}={} ({}), expected exactly one",
                    tag.key,
                    tag.value,
                    tables.join(", ")
                ),
            }),
        }
    }

    async fn put_route(&self, entry: &RouteEntry) -> Result<(), RouteError> {
        let request = RouteRequest {
            route_table_id: entry.route_table_id.clone(),
            destination_cidr: entry.destination_cidr.clone(),
            peering_connection_id: entry.via_peering_connection_id.clone(),
        };
        let write = self.ctx.gateway.put_route(&entry.region, &request).await?;
        debug!(
            route_table = %entry.route_table_id,
            destination = %entry.destination_cidr,
            peering_id = %entry.via_peering_connection_id,
            "Route {}",
            write
        );
        Ok(())
    }
}

fn cidr_block(side: &PeerVpc) -> Result<String, RouteError> {
    side.cidr_block
        .clone()
        .ok_or_else(|| RouteError::RouteConfiguration {
            region: side.region.clone(),
            vpc_id: side.vpc_id.clone(),
            reason: "peering connection reports no CIDR block".to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::test_support::context;
    use crate::mesh::PeeringMeshBuilder;
    use std::sync::Arc;
    use vpcflow_cloud::memory::{InMemoryGateway, Operation, PUBLIC_ROUTE_TABLE};
    use vpcflow_cloud::{ProviderError, StackState};

    fn stack(provider: &InMemoryGateway, region: &str, name: &str, cidr: &str) -> VpcIdentity {
        let stack_name = format!("{region}-{name}");
        let vpc_id = provider.insert_stack(region, &stack_name, StackState::CreateComplete, cidr);
        VpcIdentity::new(region, stack_name, vpc_id)
    }

    fn table_of(provider: &InMemoryGateway, vpc: &VpcIdentity) -> String {
        provider.route_table_ids(&vpc.vpc_id).remove(0)
    }

    async fn peered(provider: &Arc<InMemoryGateway>) -> (Vec<VpcIdentity>, Vec<PeeringConnection>) {
        let vpcs = vec![
            stack(provider, "us-east-1", "a", "10.0.0.0/16"),
            stack(provider, "us-west-2", "b", "10.1.0.0/16"),
            stack(provider, "eu-west-1", "c", "10.2.0.0/16"),
        ];
        let mesh = PeeringMeshBuilder::new(context(provider))
            .build_mesh(&vpcs)
            .await;
        assert!(mesh.iter().all(PeeringConnection::is_active));
        (vpcs, mesh)
    }

    #[tokio::test]
    async fn test_active_connection_gets_two_symmetric_routes() {
        let provider = Arc::new(InMemoryGateway::new());
        let (vpcs, mesh) = peered(&provider).await;

        let outcomes = RouteTablePropagator::new(context(&provider))
            .propagate_routes(&mesh[..1])
            .await;

        let RouteStatus::Routed([forward, backward]) = &outcomes[0].status else {
            panic!("expected routed, got {:?}", outcomes[0].status);
        };
        let pcx = mesh[0].id.clone().unwrap();
        assert_eq!(forward.route_table_id, table_of(&provider, &vpcs[0]));
        assert_eq!(forward.destination_cidr, "10.1.0.0/16");
        assert_eq!(forward.region, "us-east-1");
        assert_eq!(backward.route_table_id, table_of(&provider, &vpcs[1]));
        assert_eq!(backward.destination_cidr, "10.0.0.0/16");
        assert_eq!(backward.region, "us-west-2");
        assert_eq!(forward.via_peering_connection_id, pcx);
        assert_eq!(backward.via_peering_connection_id, pcx);
    }

    #[tokio::test]
    async fn test_propagation_is_idempotent() {
        let provider = Arc::new(InMemoryGateway::new());
        let (vpcs, mesh) = peered(&provider).await;
        let propagator = RouteTablePropagator::new(context(&provider));

        let first = propagator.propagate_routes(&mesh).await;
        let tables: Vec<_> = vpcs
            .iter()
            .map(|v| provider.routes(&table_of(&provider, v)))
            .collect();
        let second = propagator.propagate_routes(&mesh).await;
        let tables_again: Vec<_> = vpcs
            .iter()
            .map(|v| provider.routes(&table_of(&provider, v)))
            .collect();

        assert!(first.iter().all(RouteOutcome::is_routed));
        assert_eq!(first, second);
        assert_eq!(tables, tables_again);
        // every VPC routes to the other two
        assert!(tables.iter().all(|routes| routes.len() == 2));
    }

    #[tokio::test]
    async fn test_missing_table_fails_only_that_connection() {
        let provider = Arc::new(InMemoryGateway::new());
        let (vpcs, mesh) = peered(&provider).await;
        provider.remove_route_tables(&vpcs[2].vpc_id);

        let outcomes = RouteTablePropagator::new(context(&provider))
            .propagate_routes(&mesh)
            .await;

        assert!(outcomes[0].is_routed());
        for outcome in &outcomes[1..] {
            assert!(matches!(
                &outcome.status,
                RouteStatus::Failed(RouteError::RouteConfiguration { vpc_id, .. })
                    if *vpc_id == vpcs[2].vpc_id
            ));
            assert!(outcome.entries().is_empty());
        }
    }

    #[tokio::test]
    async fn test_ambiguous_tables_fail_that_connection() {
        let provider = Arc::new(InMemoryGateway::new());
        let (vpcs, mesh) = peered(&provider).await;
        provider.insert_route_table("us-west-2", &vpcs[1].vpc_id, "rtb-extra", PUBLIC_ROUTE_TABLE);

        let outcomes = RouteTablePropagator::new(context(&provider))
            .propagate_routes(&mesh)
            .await;

        // (a, b) and (b, c) involve b; (a, c) still routes
        assert!(outcomes[0].is_failure());
        assert!(outcomes[1].is_routed());
        assert!(outcomes[2].is_failure());
        assert!(provider.routes("rtb-extra").is_empty());
    }

    #[tokio::test]
    async fn test_failed_connection_is_skipped_and_reported() {
        let provider = Arc::new(InMemoryGateway::new());
        let (_, mut mesh) = peered(&provider).await;
        mesh[1].status = PeeringStatus::Failed;

        let outcomes = RouteTablePropagator::new(context(&provider))
            .propagate_routes(&mesh)
            .await;

        assert_eq!(outcomes.len(), 3);
        assert_eq!(
            outcomes[1].status,
            RouteStatus::SkippedInactiveConnection(PeeringStatus::Failed)
        );
        assert!(!outcomes[1].is_failure());
        assert_eq!(provider.count(Operation::PutRoute), 4);
    }

    #[tokio::test]
    async fn test_one_failed_write_is_partial() {
        let provider = Arc::new(InMemoryGateway::new());
        let (vpcs, mesh) = peered(&provider).await;
        let accepter_table = table_of(&provider, &vpcs[1]);
        provider.fail_operation(
            Operation::PutRoute,
            accepter_table,
            ProviderError::api(Some("RouteLimitExceeded"), "route limit reached"),
        );

        let outcomes = RouteTablePropagator::new(context(&provider))
            .propagate_routes(&mesh[..1])
            .await;

        match &outcomes[0].status {
            RouteStatus::PartiallyRouted { applied, error } => {
                assert_eq!(applied.route_table_id, table_of(&provider, &vpcs[0]));
                assert!(matches!(error, RouteError::Provider(_)));
            }
            other => panic!("expected partial, got {other:?}"),
        }
        assert!(outcomes[0].is_failure());
    }

    #[tokio::test]
    async fn test_both_failed_writes_report_both_errors() {
        let provider = Arc::new(InMemoryGateway::new());
        let (vpcs, mesh) = peered(&provider).await;
        let requester_table = table_of(&provider, &vpcs[0]);
        let accepter_table = table_of(&provider, &vpcs[1]);
        provider.fail_operation(
            Operation::PutRoute,
            requester_table,
            ProviderError::Throttled("Rate exceeded".into()),
        );
        provider.fail_operation(
            Operation::PutRoute,
            accepter_table,
            ProviderError::api(Some("RouteLimitExceeded"), "route limit reached"),
        );

        let outcomes = RouteTablePropagator::new(context(&provider))
            .propagate_routes(&mesh[..1])
            .await;

        assert_eq!(
            outcomes[0].status,
            RouteStatus::Failed(RouteError::BothSides {
                requester: Box::new(RouteError::Provider(ProviderError::Throttled(
                    "Rate exceeded".into()
                ))),
                accepter: Box::new(RouteError::Provider(ProviderError::api(
                    Some("RouteLimitExceeded"),
                    "route limit reached"
                ))),
            })
        );
        assert!(outcomes[0].entries().is_empty());
    }
}
