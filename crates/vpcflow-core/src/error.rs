//! Per-item error types for each orchestration phase
//!
//! Errors are `Clone` so they can be attached to the result of the item they
//! belong to and reported alongside its siblings.

use std::time::Duration;
use thiserror::Error;
use vpcflow_cloud::{PeeringStatus, ProviderError, StackState};

/// Failure of a single gateway call made through [`Gateway`](crate::Gateway)
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CallError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Run cancelled before the call was issued")]
    Cancelled,
}

/// Phase 1: stack create-or-update
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LifecycleError {
    #[error("Stack {stack} is in {status} and cannot be updated")]
    StackNotUpdatable { stack: String, status: StackState },

    #[error("Stack {stack} failed to create (ended in {status})")]
    CreateFailed { stack: String, status: StackState },

    #[error("Stack {stack} failed to update (ended in {status})")]
    UpdateFailed { stack: String, status: StackState },

    #[error("Another operation on stack {0} is already in flight")]
    StackConflict(String),

    #[error("Timed out after {waited:?} waiting for stack {stack} (last status: {last})")]
    WaitTimeout {
        stack: String,
        waited: Duration,
        last: String,
    },

    #[error("Stack {stack} is {status}; expected CREATE_COMPLETE or UPDATE_COMPLETE")]
    NotReady { stack: String, status: StackState },

    #[error("Stack {stack} has no '{logical_id}' resource")]
    MissingVpcResource { stack: String, logical_id: String },

    #[error("No template loaded for reference '{0}'")]
    MissingTemplate(String),

    #[error("Cancelled")]
    Cancelled,

    #[error("Provider error: {0}")]
    Provider(ProviderError),
}

impl From<CallError> for LifecycleError {
    fn from(err: CallError) -> Self {
        match err {
            CallError::Provider(e) => LifecycleError::Provider(e),
            CallError::Cancelled => LifecycleError::Cancelled,
        }
    }
}

/// Phase 2: one peering pair
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PeeringError {
    #[error("Refusing to peer VPC {0} with itself")]
    SelfPeering(String),

    #[error("Peering {id} still {status} after {waited:?}")]
    PeeringTimeout {
        id: String,
        status: PeeringStatus,
        waited: Duration,
    },

    #[error("Peering {id} ended in {status}")]
    Rejected { id: String, status: PeeringStatus },

    #[error("Cancelled")]
    Cancelled,

    #[error("Provider error: {0}")]
    Provider(ProviderError),
}

impl PeeringError {
    /// Connection id, when the provider had already assigned one
    pub fn peering_id(&self) -> Option<&str> {
        match self {
            PeeringError::PeeringTimeout { id, .. } | PeeringError::Rejected { id, .. } => {
                Some(id)
            }
            _ => None,
        }
    }
}

impl From<CallError> for PeeringError {
    fn from(err: CallError) -> Self {
        match err {
            CallError::Provider(e) => PeeringError::Provider(e),
            CallError::Cancelled => PeeringError::Cancelled,
        }
    }
}

/// Phase 3: routes for one connection
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RouteError {
    /// Missing or ambiguous route table, or a side without a CIDR block
    #[error("Route configuration error for {vpc_id} in {region}: {reason}")]
    RouteConfiguration {
        region: String,
        vpc_id: String,
        reason: String,
    },

    /// Neither side's route could be written
    #[error("Both route writes failed (requester side: {requester}; accepter side: {accepter})")]
    BothSides {
        requester: Box<RouteError>,
        accepter: Box<RouteError>,
    },

    #[error("Cancelled")]
    Cancelled,

    #[error("Provider error: {0}")]
    Provider(ProviderError),
}

impl From<CallError> for RouteError {
    fn from(err: CallError) -> Self {
        match err {
            CallError::Provider(e) => RouteError::Provider(e),
            CallError::Cancelled => RouteError::Cancelled,
        }
    }
}
