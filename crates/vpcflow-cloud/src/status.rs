//! Stack and peering status vocabulary
//!
//! Both enums are observed from the provider and never set by vpcflow.

use serde::{Deserialize, Serialize};

/// Status of an infrastructure stack
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StackState {
    NotExists,
    CreateInProgress,
    CreateComplete,
    CreateFailed,
    RollbackInProgress,
    RollbackComplete,
    RollbackFailed,
    UpdateInProgress,
    UpdateCompleteCleanupInProgress,
    UpdateComplete,
    UpdateFailed,
    UpdateRollbackInProgress,
    UpdateRollbackComplete,
    UpdateRollbackFailed,
    DeleteInProgress,
    DeleteComplete,
    DeleteFailed,
    /// Any status the provider reports that vpcflow has no name for
    Other(String),
}

impl StackState {
    /// Parse a provider status code such as `CREATE_COMPLETE`
    pub fn parse(code: &str) -> Self {
        match code {
            "NOT_EXISTS" => StackState::NotExists,
            "CREATE_IN_PROGRESS" => StackState::CreateInProgress,
            "CREATE_COMPLETE" => StackState::CreateComplete,
            "CREATE_FAILED" => StackState::CreateFailed,
            "ROLLBACK_IN_PROGRESS" => StackState::RollbackInProgress,
            "ROLLBACK_COMPLETE" => StackState::RollbackComplete,
            "ROLLBACK_FAILED" => StackState::RollbackFailed,
            "UPDATE_IN_PROGRESS" => StackState::UpdateInProgress,
            "UPDATE_COMPLETE_CLEANUP_IN_PROGRESS" => StackState::UpdateCompleteCleanupInProgress,
            "UPDATE_COMPLETE" => StackState::UpdateComplete,
            "UPDATE_FAILED" => StackState::UpdateFailed,
            "UPDATE_ROLLBACK_IN_PROGRESS" => StackState::UpdateRollbackInProgress,
            "UPDATE_ROLLBACK_COMPLETE" => StackState::UpdateRollbackComplete,
            "UPDATE_ROLLBACK_FAILED" => StackState::UpdateRollbackFailed,
            "DELETE_IN_PROGRESS" => StackState::DeleteInProgress,
            "DELETE_COMPLETE" => StackState::DeleteComplete,
            "DELETE_FAILED" => StackState::DeleteFailed,
            other => {
                tracing::debug!("Unrecognised stack status {}", other);
                StackState::Other(other.to_string())
            }
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            StackState::NotExists => "NOT_EXISTS",
            StackState::CreateInProgress => "CREATE_IN_PROGRESS",
            StackState::CreateComplete => "CREATE_COMPLETE",
            StackState::CreateFailed => "CREATE_FAILED",
            StackState::RollbackInProgress => "ROLLBACK_IN_PROGRESS",
            StackState::RollbackComplete => "ROLLBACK_COMPLETE",
            StackState::RollbackFailed => "ROLLBACK_FAILED",
            StackState::UpdateInProgress => "UPDATE_IN_PROGRESS",
            StackState::UpdateCompleteCleanupInProgress => "UPDATE_COMPLETE_CLEANUP_IN_PROGRESS",
            StackState::UpdateComplete => "UPDATE_COMPLETE",
            StackState::UpdateFailed => "UPDATE_FAILED",
            StackState::UpdateRollbackInProgress => "UPDATE_ROLLBACK_IN_PROGRESS",
            StackState::UpdateRollbackComplete => "UPDATE_ROLLBACK_COMPLETE",
            StackState::UpdateRollbackFailed => "UPDATE_ROLLBACK_FAILED",
            StackState::DeleteInProgress => "DELETE_IN_PROGRESS",
            StackState::DeleteComplete => "DELETE_COMPLETE",
            StackState::DeleteFailed => "DELETE_FAILED",
            StackState::Other(code) => code,
        }
    }

    /// States from which an update call may be issued
    pub fn is_updatable(&self) -> bool {
        matches!(
            self,
            StackState::CreateComplete | StackState::RollbackComplete | StackState::UpdateComplete
        )
    }

    /// The last create or update succeeded
    pub fn is_complete(&self) -> bool {
        matches!(self, StackState::CreateComplete | StackState::UpdateComplete)
    }

    /// The provider is still transitioning the stack
    pub fn is_in_progress(&self) -> bool {
        self.as_str().ends_with("_IN_PROGRESS")
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_in_progress() && *self != StackState::NotExists
    }
}

impl std::fmt::Display for StackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a VPC peering connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PeeringStatus {
    Initiating,
    PendingAcceptance,
    /// Accepted; the provider is wiring the link up
    Provisioning,
    Active,
    Failed,
}

impl PeeringStatus {
    /// Map an EC2 status code (`pending-acceptance`, `active`, ...) to a status.
    ///
    /// `rejected`, `expired`, `deleted` and anything unknown count as failed.
    pub fn from_code(code: &str) -> Self {
        match code {
            "initiating-request" => PeeringStatus::Initiating,
            "pending-acceptance" => PeeringStatus::PendingAcceptance,
            "provisioning" => PeeringStatus::Provisioning,
            "active" => PeeringStatus::Active,
            "failed" | "rejected" | "expired" | "deleted" | "deleting" => PeeringStatus::Failed,
            other => {
                tracing::debug!("Unrecognised peering status {}, treating as failed", other);
                PeeringStatus::Failed
            }
        }
    }

    /// A connection in this state can be reused instead of requesting a new one
    pub fn is_reusable(&self) -> bool {
        !matches!(self, PeeringStatus::Failed)
    }
}

impl std::fmt::Display for PeeringStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PeeringStatus::Initiating => write!(f, "initiating"),
            PeeringStatus::PendingAcceptance => write!(f, "pending-acceptance"),
            PeeringStatus::Provisioning => write!(f, "provisioning"),
            PeeringStatus::Active => write!(f, "active"),
            PeeringStatus::Failed => write!(f, "failed"),
        }
    }
}
