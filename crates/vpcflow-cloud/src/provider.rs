//! Provider gateway trait definition

use crate::error::Result;
use crate::status::{PeeringStatus, StackState};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Region-scoped control-plane operations vpcflow depends on.
///
/// Every method takes the region it acts in; implementations hold whatever
/// per-region clients they need. The orchestration layer bounds each call with
/// its own timeout, so implementations may block for as long as the transport
/// allows.
#[async_trait]
pub trait ProviderGateway: Send + Sync {
    /// Returns the provider name (e.g., "aws", "memory")
    fn name(&self) -> &str;

    /// Whether a stack with this name exists in the region
    async fn stack_exists(&self, region: &str, stack_name: &str) -> Result<bool>;

    /// Current status of a stack; `StackState::NotExists` when it is absent
    async fn stack_status(&self, region: &str, stack_name: &str) -> Result<StackState>;

    /// Submit a create call and return the provider's stack id
    async fn create_stack(&self, region: &str, request: &StackRequest) -> Result<String>;

    /// Submit an update call
    async fn update_stack(&self, region: &str, request: &StackRequest) -> Result<UpdateOutcome>;

    /// Physical id of a logical resource inside a stack
    async fn stack_resource_id(
        &self,
        region: &str,
        stack_name: &str,
        logical_id: &str,
    ) -> Result<String>;

    /// Request a peering connection from the requester's region
    async fn create_peering(&self, request: &PeeringRequest) -> Result<String>;

    /// Accept a peering connection from the accepter's region
    async fn accept_peering(&self, region: &str, peering_id: &str) -> Result<PeeringStatus>;

    async fn describe_peering(&self, region: &str, peering_id: &str)
    -> Result<PeeringDescription>;

    async fn find_peerings(
        &self,
        region: &str,
        filter: &PeeringFilter,
    ) -> Result<Vec<PeeringDescription>>;

    /// Ids of the route tables of `vpc_id` carrying `tag`
    async fn route_tables(&self, region: &str, vpc_id: &str, tag: &ResourceTag)
    -> Result<Vec<String>>;

    /// Create a route, or repoint the existing route for the same destination
    async fn put_route(&self, region: &str, route: &RouteRequest) -> Result<RouteWrite>;
}

/// Template and parameters submitted for a stack
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackRequest {
    pub stack_name: String,
    pub template_body: String,
    pub parameters: BTreeMap<String, String>,
}

impl StackRequest {
    pub fn new(
        stack_name: impl Into<String>,
        template_body: impl Into<String>,
        parameters: BTreeMap<String, String>,
    ) -> Self {
        Self {
            stack_name: stack_name.into(),
            template_body: template_body.into(),
            parameters,
        }
    }
}

/// Result of an update call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateOutcome {
    /// The provider accepted the update and is applying it
    Started,
    /// The provider reported there was nothing to change
    NoChanges,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeeringRequest {
    pub requester_region: String,
    pub requester_vpc_id: String,
    pub accepter_region: String,
    pub accepter_vpc_id: String,
}

/// One side of a peering connection as the provider reports it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerVpc {
    pub vpc_id: String,
    pub region: String,
    pub cidr_block: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeeringDescription {
    pub id: String,
    pub status: PeeringStatus,
    pub requester: PeerVpc,
    pub accepter: PeerVpc,
}

impl PeeringDescription {
    /// Whether this connection links the two VPCs, in either direction
    pub fn connects(&self, vpc_a: &str, vpc_b: &str) -> bool {
        (self.requester.vpc_id == vpc_a && self.accepter.vpc_id == vpc_b)
            || (self.requester.vpc_id == vpc_b && self.accepter.vpc_id == vpc_a)
    }
}

/// Filter for [`ProviderGateway::find_peerings`]; unset fields match anything
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeeringFilter {
    pub requester_cidr: Option<String>,
    pub requester_vpc_id: Option<String>,
    pub accepter_vpc_id: Option<String>,
}

impl PeeringFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requester_cidr(mut self, cidr: impl Into<String>) -> Self {
        self.requester_cidr = Some(cidr.into());
        self
    }

    pub fn requester_vpc(mut self, vpc_id: impl Into<String>) -> Self {
        self.requester_vpc_id = Some(vpc_id.into());
        self
    }

    pub fn accepter_vpc(mut self, vpc_id: impl Into<String>) -> Self {
        self.accepter_vpc_id = Some(vpc_id.into());
        self
    }

    pub fn matches(&self, peering: &PeeringDescription) -> bool {
        let cidr_ok = self
            .requester_cidr
            .as_ref()
            .is_none_or(|c| peering.requester.cidr_block.as_ref() == Some(c));
        let requester_ok = self
            .requester_vpc_id
            .as_ref()
            .is_none_or(|v| &peering.requester.vpc_id == v);
        let accepter_ok = self
            .accepter_vpc_id
            .as_ref()
            .is_none_or(|v| &peering.accepter.vpc_id == v);
        cidr_ok && requester_ok && accepter_ok
    }
}

/// Key/value tag used to pick out a resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceTag {
    pub key: String,
    pub value: String,
}

impl ResourceTag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteRequest {
    pub route_table_id: String,
    pub destination_cidr: String,
    pub peering_connection_id: String,
}

/// How [`ProviderGateway::put_route`] satisfied the request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteWrite {
    Created,
    /// A route for the destination existed and now points at the connection
    Replaced,
}

impl std::fmt::Display for RouteWrite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RouteWrite::Created => write!(f, "created"),
            RouteWrite::Replaced => write!(f, "replaced"),
        }
    }
}
