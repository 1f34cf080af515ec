//! Values produced by the three phases

use crate::error::PeeringError;
use serde::Serialize;
use vpcflow_cloud::PeeringStatus;

/// A deployed VPC, as seen by the peering and routing phases
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct VpcIdentity {
    pub region: String,
    pub stack_name: String,
    pub vpc_id: String,
}

impl VpcIdentity {
    pub fn new(
        region: impl Into<String>,
        stack_name: impl Into<String>,
        vpc_id: impl Into<String>,
    ) -> Self {
        Self {
            region: region.into(),
            stack_name: stack_name.into(),
            vpc_id: vpc_id.into(),
        }
    }
}

impl std::fmt::Display for VpcIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}, {})", self.stack_name, self.vpc_id, self.region)
    }
}

/// Outcome of establishing one pair of the mesh
#[derive(Debug, Clone, PartialEq)]
pub struct PeeringConnection {
    /// Absent when the request itself failed
    pub id: Option<String>,
    pub requester: VpcIdentity,
    pub accepter: VpcIdentity,
    pub status: PeeringStatus,
    /// An existing connection was found and reused
    pub reused: bool,
    pub error: Option<PeeringError>,
}

impl PeeringConnection {
    pub fn established(
        id: impl Into<String>,
        requester: VpcIdentity,
        accepter: VpcIdentity,
        status: PeeringStatus,
        reused: bool,
    ) -> Self {
        Self {
            id: Some(id.into()),
            requester,
            accepter,
            status,
            reused,
            error: None,
        }
    }

    pub fn failed(requester: VpcIdentity, accepter: VpcIdentity, error: PeeringError) -> Self {
        Self {
            id: error.peering_id().map(str::to_string),
            requester,
            accepter,
            status: PeeringStatus::Failed,
            reused: false,
            error: Some(error),
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == PeeringStatus::Active
    }

    /// Label for logs and reports, e.g. `a <-> b`
    pub fn pair(&self) -> String {
        format!("{} <-> {}", self.requester.stack_name, self.accepter.stack_name)
    }
}

/// A route pointing one VPC's table at the other side of a peering
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteEntry {
    pub route_table_id: String,
    pub destination_cidr: String,
    pub via_peering_connection_id: String,
    pub region: String,
}
