//! Pairwise VPC peering
//!
//! The mesh is enumerated with a double-indexed loop over the input slice:
//! the VPC at `i` requests, the VPC at `j > i` accepts. Each pair is driven
//! through request, acceptance and activation independently; a failed pair
//! is recorded and never stops its siblings.

use crate::context::Context;
use crate::error::{CallError, PeeringError};
use crate::model::{PeeringConnection, VpcIdentity};
use crate::wait::{WaitError, poll_until};
use futures_util::stream::{self, StreamExt};
use std::collections::HashSet;
use std::ops::ControlFlow;
use tracing::{debug, info, warn};
use vpcflow_cloud::{PeeringDescription, PeeringFilter, PeeringRequest, PeeringStatus};
use vpcflow_config::Topology;

/// Index pairs `(requester, accepter)` to peer, in enumeration order
pub fn plan_pairs(n: usize, topology: Topology) -> Vec<(usize, usize)> {
    match topology {
        Topology::Mesh => {
            let mut pairs = Vec::with_capacity(n * n.saturating_sub(1) / 2);
            for i in 0..n {
                for j in i + 1..n {
                    pairs.push((i, j));
                }
            }
            pairs
        }
        Topology::Hub => (1..n).map(|j| (0, j)).collect(),
    }
}

pub struct PeeringMeshBuilder {
    ctx: Context,
}

impl PeeringMeshBuilder {
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }

    /// Establish a connection for every planned pair.
    ///
    /// Output order follows [`plan_pairs`], not completion order. A pair of
    /// VPCs that already appeared earlier in the plan (duplicate input) is
    /// left out, so each unordered pair is attempted once.
    pub async fn build_mesh(&self, vpcs: &[VpcIdentity]) -> Vec<PeeringConnection> {
        let mut seen = HashSet::new();
        let pairs: Vec<_> = plan_pairs(vpcs.len(), self.ctx.settings.mesh.topology)
            .into_iter()
            .filter(|&(i, j)| {
                let (a, b) = (vpcs[i].vpc_id.as_str(), vpcs[j].vpc_id.as_str());
                let first = seen.insert(if a <= b { (a, b) } else { (b, a) });
                if !first {
                    debug!(requester = %a, accepter = %b, "Skipping duplicate pair");
                }
                first
            })
            .collect();
        info!(
            vpcs = vpcs.len(),
            pairs = pairs.len(),
            topology = ?self.ctx.settings.mesh.topology,
            "Building peering mesh"
        );

        stream::iter(pairs)
            .map(|(i, j)| self.establish_pair(&vpcs[i], &vpcs[j]))
            .buffered(self.ctx.max_in_flight())
            .collect()
            .await
    }

    async fn establish_pair(
        &self,
        requester: &VpcIdentity,
        accepter: &VpcIdentity,
    ) -> PeeringConnection {
        if self.ctx.cancel.is_cancelled() {
            return PeeringConnection::failed(
                requester.clone(),
                accepter.clone(),
                PeeringError::Cancelled,
            );
        }
        let _permit = self.ctx.limiter.acquire(&requester.region).await;

        match self.establish(requester, accepter).await {
            Ok(connection) => connection,
            Err(e) => {
                warn!(
                    requester = %requester.stack_name,
                    accepter = %accepter.stack_name,
                    error = %e,
                    "Peering failed"
                );
                PeeringConnection::failed(requester.clone(), accepter.clone(), e)
            }
        }
    }

    async fn establish(
        &self,
        requester: &VpcIdentity,
        accepter: &VpcIdentity,
    ) -> Result<PeeringConnection, PeeringError> {
        if requester.vpc_id == accepter.vpc_id {
            return Err(PeeringError::SelfPeering(requester.vpc_id.clone()));
        }
        let gateway = &self.ctx.gateway;

        let (id, mut status, accept_region, reused) =
            match self.find_existing(requester, accepter).await? {
                Some(existing) => {
                    info!(
                        peering_id = %existing.id,
                        status = %existing.status,
                        "Reusing existing peering connection"
                    );
                    (existing.id, existing.status, existing.accepter.region, true)
                }
                None => {
                    let request = PeeringRequest {
                        requester_region: requester.region.clone(),
                        requester_vpc_id: requester.vpc_id.clone(),
                        accepter_region: accepter.region.clone(),
                        accepter_vpc_id: accepter.vpc_id.clone(),
                    };
                    let id = gateway.create_peering(&request).await?;
                    info!(
                        peering_id = %id,
                        requester = %requester,
                        accepter = %accepter,
                        "Requested peering connection"
                    );
                    (id, PeeringStatus::Initiating, accepter.region.clone(), false)
                }
            };

        if status == PeeringStatus::Initiating {
            status = self
                .wait_while(&requester.region, &id, status, |s| {
                    s == PeeringStatus::Initiating
                })
                .await?;
        }
        if status == PeeringStatus::PendingAcceptance {
            debug!(peering_id = %id, region = %accept_region, "Accepting peering connection");
            status = gateway.accept_peering(&accept_region, &id).await?;
        }
        if matches!(
            status,
            PeeringStatus::PendingAcceptance | PeeringStatus::Provisioning
        ) {
            status = self
                .wait_while(&requester.region, &id, status, |s| {
                    matches!(s, PeeringStatus::PendingAcceptance | PeeringStatus::Provisioning)
                })
                .await?;
        }

        if status != PeeringStatus::Active {
            return Err(PeeringError::Rejected { id, status });
        }
        info!(peering_id = %id, reused, "Peering connection active");
        Ok(PeeringConnection::established(
            id,
            requester.clone(),
            accepter.clone(),
            status,
            reused,
        ))
    }

    /// A usable connection between the pair, in either direction
    async fn find_existing(
        &self,
        requester: &VpcIdentity,
        accepter: &VpcIdentity,
    ) -> Result<Option<PeeringDescription>, CallError> {
        let mut found = Vec::new();
        for (from, to) in [(requester, accepter), (accepter, requester)] {
            let filter = PeeringFilter::new()
                .requester_vpc(&from.vpc_id)
                .accepter_vpc(&to.vpc_id);
            found.extend(
                self.ctx
                    .gateway
                    .find_peerings(&requester.region, &filter)
                    .await?,
            );
        }

        Ok(found
            .into_iter()
            .filter(|d| d.status.is_reusable() && d.connects(&requester.vpc_id, &accepter.vpc_id))
            .min_by_key(|d| progress_rank(d.status)))
    }

    async fn wait_while(
        &self,
        region: &str,
        id: &str,
        current: PeeringStatus,
        pending: impl Fn(PeeringStatus) -> bool,
    ) -> Result<PeeringStatus, PeeringError> {
        let config = self.ctx.wait_config(self.ctx.settings.timeouts.peering());
        let gateway = &self.ctx.gateway;
        let pending = &pending;

        poll_until(&config, &self.ctx.cancel, id, move || async move {
            let status = gateway.describe_peering(region, id).await?.status;
            Ok::<_, CallError>(if pending(status) {
                ControlFlow::Continue(status)
            } else {
                ControlFlow::Break(status)
            })
        })
        .await
        .map_err(|e| match e {
            WaitError::Timeout { waited, last, .. } => PeeringError::PeeringTimeout {
                id: id.to_string(),
                status: last.unwrap_or(current),
                waited,
            },
            WaitError::Cancelled => PeeringError::Cancelled,
            WaitError::Check(e) => e.into(),
        })
    }
}

/// Prefer the connection furthest along when several exist
pub(crate) fn progress_rank(status: PeeringStatus) -> u8 {
    match status {
        PeeringStatus::Active => 0,
        PeeringStatus::Provisioning => 1,
        PeeringStatus::PendingAcceptance => 2,
        PeeringStatus::Initiating => 3,
        PeeringStatus::Failed => 4,
    }
}
