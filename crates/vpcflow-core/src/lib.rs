//! vpcflow orchestration
//!
//! Converges a set of VPC specifications in three strictly sequential phases:
//!
//! 1. [`StackLifecycleManager`] creates or updates one stack per VPC
//! 2. [`PeeringMeshBuilder`] peers the deployed VPCs pairwise
//! 3. [`RouteTablePropagator`] points each side's public route table at the
//!    other side through the connection
//!
//! Items within a phase run concurrently and fail independently; every
//! outcome ends up in the [`RunReport`].

pub mod context;
pub mod discovery;
pub mod error;
pub mod gateway;
pub mod lifecycle;
pub mod limiter;
pub mod locks;
pub mod mesh;
pub mod model;
pub mod orchestrator;
pub mod report;
pub mod routes;
pub mod wait;

pub use context::Context;
pub use discovery::{ConnectionDiscovery, Discovered, DiscoveryTarget};
pub use error::{CallError, LifecycleError, PeeringError, RouteError};
pub use gateway::Gateway;
pub use lifecycle::{DeployedStack, StackAction, StackLifecycleManager};
pub use limiter::RegionLimiter;
pub use locks::{StackGuard, StackLocks};
pub use mesh::{PeeringMeshBuilder, plan_pairs};
pub use model::{PeeringConnection, RouteEntry, VpcIdentity};
pub use orchestrator::{Orchestrator, Pipeline};
pub use report::{PeeringSummary, RouteSummary, RunReport, StackOutcome, StackSummary};
pub use routes::{RouteOutcome, RouteStatus, RouteTablePropagator};
pub use wait::{WaitConfig, WaitError, poll_until};
