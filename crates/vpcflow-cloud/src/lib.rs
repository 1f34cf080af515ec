//! vpcflow provider abstraction
//!
//! This crate defines the control-plane contract the vpcflow orchestrator
//! drives: stack lifecycle, VPC peering, and route tables, each scoped to a
//! region.
//!
//! # Providers
//!
//! - **AWS**: CloudFormation + EC2 (`vpcflow-cloud-aws`)
//! - **Memory**: simulated provider for tests (`testing` feature)
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                   vpcflow CLI                    │
//! │             (vpcflow up/deploy/peer)             │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │                 vpcflow-core                     │
//! │   stack lifecycle → peering mesh → routes        │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │                 vpcflow-cloud                    │
//! │  trait ProviderGateway { ... }                   │
//! └───────┬─────────────────┬───────────────────────┘
//!         │                 │
//! ┌───────▼───────┐ ┌───────▼───────┐
//! │      aws      │ │    memory     │
//! │   provider    │ │   (testing)   │
//! └───────────────┘ └───────────────┘
//! ```

pub mod error;
#[cfg(any(test, feature = "testing"))]
pub mod memory;
pub mod provider;
pub mod status;

// Re-exports
pub use error::{ProviderError, Result};
pub use provider::{
    PeerVpc, PeeringDescription, PeeringFilter, PeeringRequest, ProviderGateway, ResourceTag,
    RouteRequest, RouteWrite, StackRequest, UpdateOutcome,
};
pub use status::{PeeringStatus, StackState};
