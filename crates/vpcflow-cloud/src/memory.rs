//! In-memory provider gateway
//!
//! Simulates the stack, peering and route-table behaviour of a real provider
//! closely enough to drive the orchestration layer in tests. Status changes
//! are reported one poll late, so every waiter observes at least one
//! in-progress state before the terminal one.

use crate::error::{ProviderError, Result};
use crate::provider::{
    PeerVpc, PeeringDescription, PeeringFilter, PeeringRequest, ProviderGateway, ResourceTag,
    RouteRequest, RouteWrite, StackRequest, UpdateOutcome,
};
use crate::status::{PeeringStatus, StackState};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Logical tag key CloudFormation puts on every resource it creates
pub const LOGICAL_ID_TAG: &str = "aws:cloudformation:logical-id";
/// Parameter the simulated template reads its CIDR block from
pub const CIDR_PARAMETER: &str = "VPCCIDRBlock";
/// Logical id of the route table the simulated template creates
pub const PUBLIC_ROUTE_TABLE: &str = "PublicRouteTable";

/// Gateway operation, as recorded in the call log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    StackExists,
    StackStatus,
    CreateStack,
    UpdateStack,
    StackResource,
    CreatePeering,
    AcceptPeering,
    DescribePeering,
    FindPeerings,
    RouteTables,
    PutRoute,
}

impl Operation {
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Operation::CreateStack
                | Operation::UpdateStack
                | Operation::CreatePeering
                | Operation::AcceptPeering
                | Operation::PutRoute
        )
    }
}

/// A single recorded gateway call.
///
/// `target` is the stack name for stack operations, the requester VPC id for
/// peering requests, the peering id for accept/describe, the VPC id for
/// route-table lookups and the route table id for route writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub op: Operation,
    pub region: String,
    pub target: String,
}

struct MemStack {
    status: StackState,
    /// Status reported from the next poll onwards
    next: Option<StackState>,
    request: StackRequest,
    vpc_id: Option<String>,
}

struct MemPeering {
    description: PeeringDescription,
    next: Option<PeeringStatus>,
}

struct MemRouteTable {
    region: String,
    vpc_id: String,
    tags: Vec<ResourceTag>,
    routes: BTreeMap<String, String>,
}

#[derive(Default)]
struct World {
    stacks: HashMap<(String, String), MemStack>,
    vpcs: HashMap<String, (String, String)>,
    peerings: BTreeMap<String, MemPeering>,
    route_tables: BTreeMap<String, MemRouteTable>,
    calls: Vec<Call>,
    faults: Vec<(Operation, String, ProviderError)>,
    failing_stacks: HashSet<String>,
    rejecting_vpcs: HashSet<String>,
    hold_initiating: bool,
    next_id: u32,
}

impl World {
    fn next_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn record(&mut self, op: Operation, region: &str, target: &str) -> Result<()> {
        self.calls.push(Call {
            op,
            region: region.to_string(),
            target: target.to_string(),
        });
        match self
            .faults
            .iter()
            .find(|(o, t, _)| *o == op && (t == target || t == "*"))
        {
            Some((_, _, err)) => {
                tracing::debug!(op = ?op, region = %region, target = %target, error = %err, "Injected fault");
                Err(err.clone())
            }
            None => Ok(()),
        }
    }

    fn add_vpc(&mut self, region: &str, vpc_id: &str, cidr: &str) {
        self.vpcs
            .insert(vpc_id.to_string(), (region.to_string(), cidr.to_string()));
    }

    fn add_route_table(&mut self, region: &str, vpc_id: &str, table_id: &str, logical_id: &str) {
        self.route_tables.insert(
            table_id.to_string(),
            MemRouteTable {
                region: region.to_string(),
                vpc_id: vpc_id.to_string(),
                tags: vec![ResourceTag::new(LOGICAL_ID_TAG, logical_id)],
                routes: BTreeMap::new(),
            },
        );
    }

    fn peer_vpc(&self, vpc_id: &str, region: &str) -> PeerVpc {
        PeerVpc {
            vpc_id: vpc_id.to_string(),
            region: region.to_string(),
            cidr_block: self.vpcs.get(vpc_id).map(|(_, cidr)| cidr.clone()),
        }
    }
}

/// Provider gateway backed by process memory
#[derive(Default)]
pub struct InMemoryGateway {
    world: Mutex<World>,
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn world(&self) -> MutexGuard<'_, World> {
        self.world.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seed an existing stack owning a VPC with one public route table.
    ///
    /// Returns the VPC id.
    pub fn insert_stack(
        &self,
        region: &str,
        stack_name: &str,
        status: StackState,
        cidr: &str,
    ) -> String {
        let mut world = self.world();
        let n = world.next_id();
        let vpc_id = format!("vpc-{n:04}");
        world.add_vpc(region, &vpc_id, cidr);
        world.add_route_table(region, &vpc_id, &format!("rtb-{n:04}"), PUBLIC_ROUTE_TABLE);
        let mut parameters = BTreeMap::new();
        parameters.insert(CIDR_PARAMETER.to_string(), cidr.to_string());
        world.stacks.insert(
            (region.to_string(), stack_name.to_string()),
            MemStack {
                status,
                next: None,
                request: StackRequest::new(stack_name, "", parameters),
                vpc_id: Some(vpc_id.clone()),
            },
        );
        vpc_id
    }

    /// Replace the stored template of a seeded stack
    pub fn set_stack_request(&self, region: &str, request: StackRequest) {
        let mut world = self.world();
        if let Some(stack) = world
            .stacks
            .get_mut(&(region.to_string(), request.stack_name.clone()))
        {
            stack.request = request;
        }
    }

    /// Seed a bare VPC without a route table
    pub fn insert_vpc(&self, region: &str, vpc_id: &str, cidr: &str) {
        self.world().add_vpc(region, vpc_id, cidr);
    }

    pub fn insert_route_table(&self, region: &str, vpc_id: &str, table_id: &str, logical_id: &str) {
        self.world()
            .add_route_table(region, vpc_id, table_id, logical_id);
    }

    /// Drop every route table of a VPC
    pub fn remove_route_tables(&self, vpc_id: &str) {
        self.world().route_tables.retain(|_, t| t.vpc_id != vpc_id);
    }

    /// Seed a peering connection in the given status
    pub fn insert_peering(
        &self,
        requester: (&str, &str),
        accepter: (&str, &str),
        status: PeeringStatus,
    ) -> String {
        let mut world = self.world();
        let id = format!("pcx-{:04}", world.next_id());
        let description = PeeringDescription {
            id: id.clone(),
            status,
            requester: world.peer_vpc(requester.1, requester.0),
            accepter: world.peer_vpc(accepter.1, accepter.0),
        };
        world.peerings.insert(
            id.clone(),
            MemPeering {
                description,
                next: None,
            },
        );
        id
    }

    /// Make `op` fail with `error` whenever it targets `target` (`"*"` for any)
    pub fn fail_operation(&self, op: Operation, target: impl Into<String>, error: ProviderError) {
        self.world().faults.push((op, target.into(), error));
    }

    /// Creates and updates of this stack end in a failed terminal state
    pub fn fail_stack(&self, stack_name: &str) {
        self.world().failing_stacks.insert(stack_name.to_string());
    }

    /// Acceptance of peerings into this VPC is rejected
    pub fn reject_peerings_into(&self, vpc_id: &str) {
        self.world().rejecting_vpcs.insert(vpc_id.to_string());
    }

    /// New peering connections never leave the initiating phase
    pub fn hold_peerings_initiating(&self) {
        self.world().hold_initiating = true;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.world().calls.clone()
    }

    pub fn count(&self, op: Operation) -> usize {
        self.world().calls.iter().filter(|c| c.op == op).count()
    }

    pub fn mutation_count(&self) -> usize {
        self.world().calls.iter().filter(|c| c.op.is_mutation()).count()
    }

    pub fn peerings(&self) -> Vec<PeeringDescription> {
        self.world()
            .peerings
            .values()
            .map(|p| p.description.clone())
            .collect()
    }

    /// Routes of a table as destination → peering id
    pub fn routes(&self, table_id: &str) -> BTreeMap<String, String> {
        self.world()
            .route_tables
            .get(table_id)
            .map(|t| t.routes.clone())
            .unwrap_or_default()
    }

    /// Route table ids of a VPC
    pub fn route_table_ids(&self, vpc_id: &str) -> Vec<String> {
        self.world()
            .route_tables
            .iter()
            .filter(|(_, t)| t.vpc_id == vpc_id)
            .map(|(id, _)| id.clone())
            .collect()
    }
}

#[async_trait]
impl ProviderGateway for InMemoryGateway {
    fn name(&self) -> &str {
        "memory"
    }

    async fn stack_exists(&self, region: &str, stack_name: &str) -> Result<bool> {
        let mut world = self.world();
        world.record(Operation::StackExists, region, stack_name)?;
        Ok(world
            .stacks
            .contains_key(&(region.to_string(), stack_name.to_string())))
    }

    async fn stack_status(&self, region: &str, stack_name: &str) -> Result<StackState> {
        let mut world = self.world();
        world.record(Operation::StackStatus, region, stack_name)?;
        let Some(stack) = world
            .stacks
            .get_mut(&(region.to_string(), stack_name.to_string()))
        else {
            return Ok(StackState::NotExists);
        };
        let current = stack.status.clone();
        if let Some(next) = stack.next.take() {
            tracing::debug!(stack = %stack_name, from = %current, to = %next, "Stack transition");
            stack.status = next;
        }
        Ok(current)
    }

    async fn create_stack(&self, region: &str, request: &StackRequest) -> Result<String> {
        let mut world = self.world();
        world.record(Operation::CreateStack, region, &request.stack_name)?;
        let key = (region.to_string(), request.stack_name.clone());
        if world.stacks.contains_key(&key) {
            return Err(ProviderError::api(
                Some("AlreadyExistsException"),
                format!("Stack [{}] already exists", request.stack_name),
            ));
        }

        let failing = world.failing_stacks.contains(&request.stack_name);
        let n = world.next_id();
        let vpc_id = if failing {
            None
        } else {
            let vpc_id = format!("vpc-{n:04}");
            let cidr = request
                .parameters
                .get(CIDR_PARAMETER)
                .cloned()
                .unwrap_or_else(|| format!("10.{}.0.0/16", n % 256));
            world.add_vpc(region, &vpc_id, &cidr);
            world.add_route_table(region, &vpc_id, &format!("rtb-{n:04}"), PUBLIC_ROUTE_TABLE);
            Some(vpc_id)
        };

        world.stacks.insert(
            key,
            MemStack {
                status: StackState::CreateInProgress,
                next: Some(if failing {
                    StackState::RollbackComplete
                } else {
                    StackState::CreateComplete
                }),
                request: request.clone(),
                vpc_id,
            },
        );
        Ok(format!("arn:memory:stack/{}/{n}", request.stack_name))
    }

    async fn update_stack(&self, region: &str, request: &StackRequest) -> Result<UpdateOutcome> {
        let mut world = self.world();
        world.record(Operation::UpdateStack, region, &request.stack_name)?;
        let failing = world.failing_stacks.contains(&request.stack_name);
        let stack = world
            .stacks
            .get_mut(&(region.to_string(), request.stack_name.clone()))
            .ok_or_else(|| {
                ProviderError::NotFound(format!("Stack [{}] does not exist", request.stack_name))
            })?;

        if !stack.status.is_updatable() || stack.next.is_some() {
            return Err(ProviderError::Conflict(format!(
                "Stack:{} is in {} state and can not be updated.",
                request.stack_name, stack.status
            )));
        }
        if stack.request == *request {
            return Ok(UpdateOutcome::NoChanges);
        }

        stack.request = request.clone();
        stack.status = StackState::UpdateInProgress;
        stack.next = Some(if failing {
            StackState::UpdateRollbackComplete
        } else {
            StackState::UpdateComplete
        });
        Ok(UpdateOutcome::Started)
    }

    async fn stack_resource_id(
        &self,
        region: &str,
        stack_name: &str,
        logical_id: &str,
    ) -> Result<String> {
        let mut world = self.world();
        world.record(Operation::StackResource, region, stack_name)?;
        world
            .stacks
            .get(&(region.to_string(), stack_name.to_string()))
            .filter(|_| logical_id == "VPC")
            .and_then(|s| s.vpc_id.clone())
            .ok_or_else(|| {
                ProviderError::NotFound(format!("Resource {logical_id} in stack {stack_name}"))
            })
    }

    async fn create_peering(&self, request: &PeeringRequest) -> Result<String> {
        let mut world = self.world();
        world.record(
            Operation::CreatePeering,
            &request.requester_region,
            &request.requester_vpc_id,
        )?;
        for vpc_id in [&request.requester_vpc_id, &request.accepter_vpc_id] {
            if !world.vpcs.contains_key(vpc_id.as_str()) {
                return Err(ProviderError::NotFound(format!("VPC {vpc_id}")));
            }
        }

        let id = format!("pcx-{:04}", world.next_id());
        let description = PeeringDescription {
            id: id.clone(),
            status: PeeringStatus::Initiating,
            requester: world.peer_vpc(&request.requester_vpc_id, &request.requester_region),
            accepter: world.peer_vpc(&request.accepter_vpc_id, &request.accepter_region),
        };
        let next = if world.hold_initiating {
            None
        } else {
            Some(PeeringStatus::PendingAcceptance)
        };
        world
            .peerings
            .insert(id.clone(), MemPeering { description, next });
        Ok(id)
    }

    async fn accept_peering(&self, region: &str, peering_id: &str) -> Result<PeeringStatus> {
        let mut world = self.world();
        world.record(Operation::AcceptPeering, region, peering_id)?;
        let rejecting = world.rejecting_vpcs.clone();
        let peering = world
            .peerings
            .get_mut(peering_id)
            .ok_or_else(|| ProviderError::NotFound(format!("Peering {peering_id}")))?;

        if peering.description.accepter.region != region {
            return Err(ProviderError::api(
                Some("OperationNotPermitted"),
                format!("Peering {peering_id} must be accepted in its accepter region"),
            ));
        }
        if peering.description.status != PeeringStatus::PendingAcceptance {
            return Err(ProviderError::api(
                Some("InvalidStateTransition"),
                format!(
                    "Peering {peering_id} is {} and cannot be accepted",
                    peering.description.status
                ),
            ));
        }

        if rejecting.contains(&peering.description.accepter.vpc_id) {
            tracing::debug!(peering_id = %peering_id, "Rejecting peering acceptance");
            peering.description.status = PeeringStatus::Failed;
            peering.next = None;
        } else {
            peering.description.status = PeeringStatus::Provisioning;
            peering.next = Some(PeeringStatus::Active);
        }
        Ok(peering.description.status)
    }

    async fn describe_peering(
        &self,
        region: &str,
        peering_id: &str,
    ) -> Result<PeeringDescription> {
        let mut world = self.world();
        world.record(Operation::DescribePeering, region, peering_id)?;
        let peering = world
            .peerings
            .get_mut(peering_id)
            .ok_or_else(|| ProviderError::NotFound(format!("Peering {peering_id}")))?;
        let current = peering.description.clone();
        if let Some(next) = peering.next.take() {
            tracing::debug!(peering_id = %peering_id, from = %current.status, to = %next, "Peering transition");
            peering.description.status = next;
        }
        Ok(current)
    }

    async fn find_peerings(
        &self,
        region: &str,
        filter: &PeeringFilter,
    ) -> Result<Vec<PeeringDescription>> {
        let mut world = self.world();
        let target = filter
            .requester_vpc_id
            .clone()
            .or_else(|| filter.requester_cidr.clone())
            .unwrap_or_default();
        world.record(Operation::FindPeerings, region, &target)?;
        Ok(world
            .peerings
            .values()
            .map(|p| &p.description)
            .filter(|d| d.requester.region == region || d.accepter.region == region)
            .filter(|d| filter.matches(d))
            .cloned()
            .collect())
    }

    async fn route_tables(
        &self,
        region: &str,
        vpc_id: &str,
        tag: &ResourceTag,
    ) -> Result<Vec<String>> {
        let mut world = self.world();
        world.record(Operation::RouteTables, region, vpc_id)?;
        Ok(world
            .route_tables
            .iter()
            .filter(|(_, t)| t.region == region && t.vpc_id == vpc_id && t.tags.contains(tag))
            .map(|(id, _)| id.clone())
            .collect())
    }

    async fn put_route(&self, region: &str, route: &RouteRequest) -> Result<RouteWrite> {
        let mut world = self.world();
        world.record(Operation::PutRoute, region, &route.route_table_id)?;
        let table = world
            .route_tables
            .get_mut(&route.route_table_id)
            .filter(|t| t.region == region)
            .ok_or_else(|| ProviderError::NotFound(format!("Route table {}", route.route_table_id)))?;
        let previous = table.routes.insert(
            route.destination_cidr.clone(),
            route.peering_connection_id.clone(),
        );
        Ok(match previous {
            Some(_) => RouteWrite::Replaced,
            None => RouteWrite::Created,
        })
    }
}
