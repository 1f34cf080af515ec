//! Rediscovering peering connections that already exist
//!
//! Used when routes are propagated on their own, without a preceding mesh
//! build in the same run.

use crate::context::Context;
use crate::error::RouteError;
use crate::mesh::progress_rank;
use crate::model::{PeeringConnection, VpcIdentity};
use futures_util::stream::{self, StreamExt};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};
use vpcflow_cloud::{PeeringDescription, PeeringFilter};

/// A deployed VPC and the CIDR block it was configured with, if known
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveryTarget {
    pub identity: VpcIdentity,
    pub cidr_block: Option<String>,
}

#[derive(Debug, Default)]
pub struct Discovered {
    /// One connection per pair, requester order first
    pub connections: Vec<PeeringConnection>,
    /// VPCs whose connections could not be listed
    pub failures: Vec<(VpcIdentity, RouteError)>,
}

pub struct ConnectionDiscovery {
    ctx: Context,
}

impl ConnectionDiscovery {
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }

    /// Find the connections each target requested towards another target.
    ///
    /// Lookups filter on the requester CIDR block when one is configured and
    /// on the requester VPC id otherwise. When a pair has several connections
    /// the one furthest along is kept.
    pub async fn discover(&self, targets: &[DiscoveryTarget]) -> Discovered {
        let lookups: Vec<_> = stream::iter(targets)
            .map(move |target| async move { (target, self.lookup(target).await) })
            .buffered(self.ctx.max_in_flight())
            .collect()
            .await;

        let position = |vpc_id: &str| targets.iter().position(|t| t.identity.vpc_id == vpc_id);
        let mut best: BTreeMap<(usize, usize), PeeringDescription> = BTreeMap::new();
        let mut discovered = Discovered::default();

        for (target, result) in lookups {
            let found = match result {
                Ok(found) => found,
                Err(e) => {
                    warn!(stack = %target.identity.stack_name, error = %e, "Peering lookup failed");
                    discovered.failures.push((target.identity.clone(), e));
                    continue;
                }
            };
            for description in found {
                if description.requester.vpc_id != target.identity.vpc_id {
                    continue;
                }
                let (Some(i), Some(j)) = (
                    position(&description.requester.vpc_id),
                    position(&description.accepter.vpc_id),
                ) else {
                    debug!(peering_id = %description.id, "Ignoring connection to an unmanaged VPC");
                    continue;
                };
                if i == j {
                    continue;
                }
                let key = (i.min(j), i.max(j));
                let better = best
                    .get(&key)
                    .is_none_or(|kept| progress_rank(description.status) < progress_rank(kept.status));
                if better {
                    best.insert(key, description);
                }
            }
        }

        discovered.connections = best
            .into_values()
            .filter_map(|description| {
                let requester = targets
                    .iter()
                    .find(|t| t.identity.vpc_id == description.requester.vpc_id)?;
                let accepter = targets
                    .iter()
                    .find(|t| t.identity.vpc_id == description.accepter.vpc_id)?;
                Some(PeeringConnection::established(
                    description.id,
                    requester.identity.clone(),
                    accepter.identity.clone(),
                    description.status,
                    true,
                ))
            })
            .collect();

        info!(
            connections = discovered.connections.len(),
            failures = discovered.failures.len(),
            "Discovered peering connections"
        );
        discovered
    }

    async fn lookup(&self, target: &DiscoveryTarget) -> Result<Vec<PeeringDescription>, RouteError> {
        if self.ctx.cancel.is_cancelled() {
            return Err(RouteError::Cancelled);
        }
        let identity = &target.identity;
        let filter = match &target.cidr_block {
            Some(cidr) => PeeringFilter::new().requester_cidr(cidr),
            None => PeeringFilter::new().requester_vpc(&identity.vpc_id),
        };
        let _permit = self.ctx.limiter.acquire(&identity.region).await;
        Ok(self
            .ctx
            .gateway
            .find_peerings(&identity.region, &filter)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::test_support::context;
    use std::sync::Arc;
    use vpcflow_cloud::memory::{InMemoryGateway, Operation};
    use vpcflow_cloud::{PeeringStatus, ProviderError};

    fn target(provider: &InMemoryGateway, region: &str, name: &str, cidr: &str) -> DiscoveryTarget {
        let vpc_id = format!("vpc-{name}");
        provider.insert_vpc(region, &vpc_id, cidr);
        DiscoveryTarget {
            identity: VpcIdentity::new(region, format!("{region}-{name}"), vpc_id),
            cidr_block: Some(cidr.to_string()),
        }
    }

    #[tokio::test]
    async fn test_discovers_each_pair_once() {
        let provider = Arc::new(InMemoryGateway::new());
        let targets = vec![
            target(&provider, "us-east-1", "a", "10.0.0.0/16"),
            target(&provider, "us-west-2", "b", "10.1.0.0/16"),
            target(&provider, "eu-west-1", "c", "10.2.0.0/16"),
        ];
        provider.insert_peering(
            ("us-east-1", "vpc-a"),
            ("us-west-2", "vpc-b"),
            PeeringStatus::Failed,
        );
        let ab = provider.insert_peering(
            ("us-east-1", "vpc-a"),
            ("us-west-2", "vpc-b"),
            PeeringStatus::Active,
        );
        let cb = provider.insert_peering(
            ("eu-west-1", "vpc-c"),
            ("us-west-2", "vpc-b"),
            PeeringStatus::PendingAcceptance,
        );
        // peer outside the managed set
        provider.insert_vpc("us-east-1", "vpc-x", "172.16.0.0/16");
        provider.insert_peering(
            ("us-east-1", "vpc-a"),
            ("us-east-1", "vpc-x"),
            PeeringStatus::Active,
        );

        let discovered = ConnectionDiscovery::new(context(&provider))
            .discover(&targets)
            .await;

        assert!(discovered.failures.is_empty());
        let ids: Vec<_> = discovered
            .connections
            .iter()
            .map(|c| c.id.clone().unwrap())
            .collect();
        assert_eq!(ids, vec![ab, cb]);
        assert_eq!(discovered.connections[1].requester.vpc_id, "vpc-c");
        assert_eq!(
            discovered.connections[1].status,
            PeeringStatus::PendingAcceptance
        );
        assert_eq!(provider.mutation_count(), 0);
    }

    #[tokio::test]
    async fn test_lookup_failure_is_reported_per_vpc() {
        let provider = Arc::new(InMemoryGateway::new());
        let targets = vec![
            target(&provider, "us-east-1", "a", "10.0.0.0/16"),
            target(&provider, "us-west-2", "b", "10.1.0.0/16"),
        ];
        provider.fail_operation(
            Operation::FindPeerings,
            "10.1.0.0/16",
            ProviderError::Throttled("Rate exceeded".into()),
        );

        let discovered = ConnectionDiscovery::new(context(&provider))
            .discover(&targets)
            .await;

        assert_eq!(discovered.failures.len(), 1);
        assert_eq!(discovered.failures[0].0.vpc_id, "vpc-b");
        assert!(matches!(
            discovered.failures[0].1,
            RouteError::Provider(ProviderError::Throttled(_))
        ));
    }
}
