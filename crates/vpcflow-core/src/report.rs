//! Per-item outcomes of a run

use crate::error::{LifecycleError, RouteError};
use crate::lifecycle::{DeployedStack, StackAction};
use crate::model::{PeeringConnection, VpcIdentity};
use crate::routes::{RouteOutcome, RouteStatus};

/// Phase 1 result for one configured VPC
#[derive(Debug, Clone, PartialEq)]
pub struct StackOutcome {
    pub stack_name: String,
    pub region: String,
    pub result: Result<DeployedStack, LifecycleError>,
}

impl StackOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn identity(&self) -> Option<&VpcIdentity> {
        self.result.as_ref().ok().map(|deployed| &deployed.identity)
    }
}

/// Everything a run did, item by item
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub stacks: Vec<StackOutcome>,
    pub connections: Vec<PeeringConnection>,
    pub routes: Vec<RouteOutcome>,
    /// VPCs whose existing connections could not be listed
    pub discovery_failures: Vec<(VpcIdentity, RouteError)>,
    /// Total execution time in milliseconds
    pub duration_ms: u64,
}

impl RunReport {
    /// No item of any phase failed
    pub fn is_success(&self) -> bool {
        self.stacks.iter().all(StackOutcome::is_success)
            && self.connections.iter().all(|c| c.error.is_none())
            && !self.routes.iter().any(RouteOutcome::is_failure)
            && self.discovery_failures.is_empty()
    }

    /// Identities of the stacks that deployed or resolved, in input order
    pub fn identities(&self) -> Vec<VpcIdentity> {
        self.stacks
            .iter()
            .filter_map(StackOutcome::identity)
            .cloned()
            .collect()
    }

    pub fn stack_summary(&self) -> StackSummary {
        let mut summary = StackSummary::default();
        for outcome in &self.stacks {
            match &outcome.result {
                Ok(deployed) => match deployed.action {
                    StackAction::Created => summary.created += 1,
                    StackAction::Updated => summary.updated += 1,
                    StackAction::Unchanged => summary.unchanged += 1,
                    StackAction::Resolved => summary.resolved += 1,
                },
                Err(_) => summary.failed += 1,
            }
        }
        summary
    }

    pub fn peering_summary(&self) -> PeeringSummary {
        let mut summary = PeeringSummary::default();
        for connection in &self.connections {
            if connection.error.is_some() {
                summary.failed += 1;
            } else if connection.reused {
                summary.reused += 1;
            } else {
                summary.established += 1;
            }
        }
        summary
    }

    pub fn route_summary(&self) -> RouteSummary {
        let mut summary = RouteSummary::default();
        for outcome in &self.routes {
            match outcome.status {
                RouteStatus::Routed(_) => summary.routed += 1,
                RouteStatus::PartiallyRouted { .. } => summary.partial += 1,
                RouteStatus::Failed(_) => summary.failed += 1,
                RouteStatus::SkippedInactiveConnection(_) => summary.skipped += 1,
            }
        }
        summary
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StackSummary {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub resolved: usize,
    pub failed: usize,
}

impl std::fmt::Display for StackSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.resolved > 0 {
            write!(f, "{} resolved, ", self.resolved)?;
        }
        write!(
            f,
            "{} created, {} updated, {} unchanged, {} failed",
            self.created, self.updated, self.unchanged, self.failed
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PeeringSummary {
    pub established: usize,
    pub reused: usize,
    pub failed: usize,
}

impl std::fmt::Display for PeeringSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} established, {} reused, {} failed",
            self.established, self.reused, self.failed
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouteSummary {
    pub routed: usize,
    pub partial: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl std::fmt::Display for RouteSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} routed, {} partially routed, {} failed, {} skipped",
            self.routed, self.partial, self.failed, self.skipped
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PeeringError;
    use vpcflow_cloud::{PeeringStatus, StackState};

    fn identity(name: &str) -> VpcIdentity {
        VpcIdentity::new("us-east-1", name, format!("vpc-{name}"))
    }

    fn deployed(name: &str, action: StackAction) -> StackOutcome {
        StackOutcome {
            stack_name: name.to_string(),
            region: "us-east-1".to_string(),
            result: Ok(DeployedStack {
                identity: identity(name),
                action,
            }),
        }
    }

    #[test]
    fn test_empty_report_is_success() {
        assert!(RunReport::default().is_success());
    }

    #[test]
    fn test_stack_summary_and_identities() {
        let report = RunReport {
            stacks: vec![
                deployed("a", StackAction::Created),
                StackOutcome {
                    stack_name: "b".to_string(),
                    region: "us-east-1".to_string(),
                    result: Err(LifecycleError::StackNotUpdatable {
                        stack: "b".to_string(),
                        status: StackState::UpdateInProgress,
                    }),
                },
                deployed("c", StackAction::Unchanged),
            ],
            ..Default::default()
        };

        assert!(!report.is_success());
        assert_eq!(
            report.stack_summary().to_string(),
            "1 created, 0 updated, 1 unchanged, 1 failed"
        );
        let names: Vec<_> = report
            .identities()
            .into_iter()
            .map(|i| i.stack_name)
            .collect();
        assert_eq!(names, vec!["a", "c"]);
    }

    #[test]
    fn test_failed_peering_fails_the_run() {
        let report = RunReport {
            connections: vec![
                PeeringConnection::established(
                    "pcx-1",
                    identity("a"),
                    identity("b"),
                    PeeringStatus::Active,
                    true,
                ),
                PeeringConnection::failed(identity("a"), identity("c"), PeeringError::Cancelled),
            ],
            ..Default::default()
        };

        assert!(!report.is_success());
        assert_eq!(
            report.peering_summary(),
            PeeringSummary {
                established: 0,
                reused: 1,
                failed: 1,
            }
        );
    }

    #[test]
    fn test_skipped_routes_do_not_fail_the_run() {
        let report = RunReport {
            routes: vec![RouteOutcome {
                connection_id: Some("pcx-1".to_string()),
                requester: identity("a"),
                accepter: identity("b"),
                status: RouteStatus::SkippedInactiveConnection(PeeringStatus::PendingAcceptance),
            }],
            ..Default::default()
        };

        assert!(report.is_success());
        assert_eq!(
            report.route_summary().to_string(),
            "0 routed, 0 partially routed, 0 failed, 1 skipped"
        );
    }
}
