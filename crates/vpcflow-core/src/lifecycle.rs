//! Stack create-or-update state machine

use crate::context::Context;
use crate::error::{CallError, LifecycleError};
use crate::locks::StackLocks;
use crate::model::VpcIdentity;
use crate::wait::{WaitError, poll_until};
use std::ops::ControlFlow;
use tracing::{debug, info, warn};
use vpcflow_cloud::{ProviderError, StackRequest, StackState, UpdateOutcome};
use vpcflow_config::{Templates, VpcSpec};

/// What phase 1 did to a stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackAction {
    Created,
    Updated,
    /// The update carried no differences
    Unchanged,
    /// Looked up without any mutation
    Resolved,
}

impl std::fmt::Display for StackAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            StackAction::Created => "created",
            StackAction::Updated => "updated",
            StackAction::Unchanged => "unchanged",
            StackAction::Resolved => "resolved",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeployedStack {
    pub identity: VpcIdentity,
    pub action: StackAction,
}

impl DeployedStack {
    /// True only when an update was applied
    pub fn updated(&self) -> bool {
        self.action == StackAction::Updated
    }
}

/// Drives a single stack to a complete state.
///
/// Updates are only sent for stacks in `CREATE_COMPLETE`, `ROLLBACK_COMPLETE`
/// or `UPDATE_COMPLETE`; any other existing state is reported without a
/// mutating call.
pub struct StackLifecycleManager {
    ctx: Context,
    locks: StackLocks,
}

impl StackLifecycleManager {
    pub fn new(ctx: Context) -> Self {
        Self::with_locks(ctx, StackLocks::new())
    }

    /// Share a lock registry with other managers
    pub fn with_locks(ctx: Context, locks: StackLocks) -> Self {
        Self { ctx, locks }
    }

    pub async fn create_or_update(
        &self,
        region: &str,
        request: &StackRequest,
    ) -> Result<DeployedStack, LifecycleError> {
        let stack = request.stack_name.as_str();
        let Some(_guard) = self.locks.try_acquire(region, stack) else {
            warn!(stack = %stack, region = %region, "Stack operation already in flight");
            return Err(LifecycleError::StackConflict(stack.to_string()));
        };
        let gateway = &self.ctx.gateway;

        if !gateway.stack_exists(region, stack).await? {
            info!(stack = %stack, region = %region, "Creating stack");
            let stack_id = gateway
                .create_stack(region, request)
                .await
                .map_err(|e| conflict_or(e, stack))?;
            debug!(stack = %stack, stack_id = %stack_id, "Create submitted");

            let status = self.wait_for_terminal(region, stack).await?;
            if status != StackState::CreateComplete {
                return Err(LifecycleError::CreateFailed {
                    stack: stack.to_string(),
                    status,
                });
            }
            let identity = self.identity(region, stack).await?;
            info!(stack = %stack, vpc_id = %identity.vpc_id, "Stack created");
            return Ok(DeployedStack {
                identity,
                action: StackAction::Created,
            });
        }

        let status = gateway.stack_status(region, stack).await?;
        if !status.is_updatable() {
            warn!(stack = %stack, status = %status, "Stack is not in an updatable state");
            return Err(LifecycleError::StackNotUpdatable {
                stack: stack.to_string(),
                status,
            });
        }

        info!(stack = %stack, region = %region, status = %status, "Updating stack");
        let action = match gateway
            .update_stack(region, request)
            .await
            .map_err(|e| conflict_or(e, stack))?
        {
            UpdateOutcome::NoChanges => {
                info!(stack = %stack, "No updates to perform");
                StackAction::Unchanged
            }
            UpdateOutcome::Started => {
                let status = self.wait_for_terminal(region, stack).await?;
                if status != StackState::UpdateComplete {
                    return Err(LifecycleError::UpdateFailed {
                        stack: stack.to_string(),
                        status,
                    });
                }
                info!(stack = %stack, "Stack updated");
                StackAction::Updated
            }
        };

        Ok(DeployedStack {
            identity: self.identity(region, stack).await?,
            action,
        })
    }

    /// Create or update the stack described by `spec`
    pub async fn deploy(
        &self,
        spec: &VpcSpec,
        templates: &Templates,
    ) -> Result<DeployedStack, LifecycleError> {
        let body = templates
            .get(&spec.template_reference)
            .ok_or_else(|| LifecycleError::MissingTemplate(spec.template_reference.clone()))?;
        let request = StackRequest::new(spec.stack_name(), body, spec.parameters.clone());
        self.create_or_update(&spec.region, &request).await
    }

    /// Identity of an already deployed stack, without mutating anything.
    ///
    /// Only stacks whose last create or update completed have an identity.
    pub async fn resolve(&self, spec: &VpcSpec) -> Result<DeployedStack, LifecycleError> {
        let stack = spec.stack_name();
        let status = self.ctx.gateway.stack_status(&spec.region, &stack).await?;
        if !status.is_complete() {
            warn!(stack = %stack, status = %status, "Stack is not complete, leaving it out");
            return Err(LifecycleError::NotReady { stack, status });
        }
        let identity = self.identity(&spec.region, &stack).await?;
        debug!(stack = %identity.stack_name, vpc_id = %identity.vpc_id, "Resolved stack");
        Ok(DeployedStack {
            identity,
            action: StackAction::Resolved,
        })
    }

    async fn identity(&self, region: &str, stack: &str) -> Result<VpcIdentity, LifecycleError> {
        let logical_id = &self.ctx.settings.stack.vpc_logical_id;
        match self
            .ctx
            .gateway
            .stack_resource_id(region, stack, logical_id)
            .await
        {
            Ok(vpc_id) => Ok(VpcIdentity::new(region, stack, vpc_id)),
            Err(CallError::Provider(ProviderError::NotFound(_))) => {
                Err(LifecycleError::MissingVpcResource {
                    stack: stack.to_string(),
                    logical_id: logical_id.clone(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn wait_for_terminal(
        &self,
        region: &str,
        stack: &str,
    ) -> Result<StackState, LifecycleError> {
        let config = self.ctx.wait_config(self.ctx.settings.timeouts.stack());
        let gateway = &self.ctx.gateway;

        poll_until(&config, &self.ctx.cancel, stack, || async move {
            let status = gateway.stack_status(region, stack).await?;
            Ok::<_, CallError>(if status.is_terminal() {
                ControlFlow::Break(status)
            } else {
                ControlFlow::Continue(status)
            })
        })
        .await
        .map_err(|e| match e {
            WaitError::Timeout { waited, last, .. } => LifecycleError::WaitTimeout {
                stack: stack.to_string(),
                waited,
                last: last.map_or_else(|| "unknown".to_string(), |s| s.to_string()),
            },
            WaitError::Cancelled => LifecycleError::Cancelled,
            WaitError::Check(e) => e.into(),
        })
    }
}

/// Provider-side "can not be updated" rejections are reported as conflicts
fn conflict_or(err: CallError, stack: &str) -> LifecycleError {
    match err {
        CallError::Provider(ProviderError::Conflict(_)) => {
            LifecycleError::StackConflict(stack.to_string())
        }
        other => other.into(),
    }
}
