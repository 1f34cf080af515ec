//! Bounded, cancellable access to a [`ProviderGateway`]

use crate::error::CallError;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use vpcflow_cloud::{
    PeeringDescription, PeeringFilter, PeeringRequest, PeeringStatus, ProviderError,
    ProviderGateway, ResourceTag, RouteRequest, RouteWrite, StackRequest, StackState,
    UpdateOutcome,
};

/// Wraps a provider so every call is bounded by a timeout and no call is
/// issued once the run has been cancelled.
///
/// A call that is already in flight when cancellation fires runs to
/// completion, so mutations are never abandoned halfway.
#[derive(Clone)]
pub struct Gateway {
    provider: Arc<dyn ProviderGateway>,
    call_timeout: Duration,
    cancel: CancellationToken,
}

impl Gateway {
    pub fn new(
        provider: Arc<dyn ProviderGateway>,
        call_timeout: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            provider,
            call_timeout,
            cancel,
        }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    async fn call<T>(
        &self,
        operation: &str,
        fut: impl Future<Output = vpcflow_cloud::Result<T>>,
    ) -> Result<T, CallError> {
        if self.cancel.is_cancelled() {
            return Err(CallError::Cancelled);
        }
        match tokio::time::timeout(self.call_timeout, fut).await {
            Ok(result) => result.map_err(CallError::from),
            Err(_) => Err(ProviderError::Timeout(format!(
                "{operation} did not complete within {:?}",
                self.call_timeout
            ))
            .into()),
        }
    }

    pub async fn stack_exists(&self, region: &str, stack_name: &str) -> Result<bool, CallError> {
        self.call("stack-exists", self.provider.stack_exists(region, stack_name))
            .await
    }

    pub async fn stack_status(
        &self,
        region: &str,
        stack_name: &str,
    ) -> Result<StackState, CallError> {
        self.call("stack-status", self.provider.stack_status(region, stack_name))
            .await
    }

    pub async fn create_stack(
        &self,
        region: &str,
        request: &StackRequest,
    ) -> Result<String, CallError> {
        self.call("stack-create", self.provider.create_stack(region, request))
            .await
    }

    pub async fn update_stack(
        &self,
        region: &str,
        request: &StackRequest,
    ) -> Result<UpdateOutcome, CallError> {
        self.call("stack-update", self.provider.update_stack(region, request))
            .await
    }

    pub async fn stack_resource_id(
        &self,
        region: &str,
        stack_name: &str,
        logical_id: &str,
    ) -> Result<String, CallError> {
        self.call(
            "stack-resource",
            self.provider
                .stack_resource_id(region, stack_name, logical_id),
        )
        .await
    }

    pub async fn create_peering(&self, request: &PeeringRequest) -> Result<String, CallError> {
        self.call("peering-create", self.provider.create_peering(request))
            .await
    }

    pub async fn accept_peering(
        &self,
        region: &str,
        peering_id: &str,
    ) -> Result<PeeringStatus, CallError> {
        self.call("peering-accept", self.provider.accept_peering(region, peering_id))
            .await
    }

    pub async fn describe_peering(
        &self,
        region: &str,
        peering_id: &str,
    ) -> Result<PeeringDescription, CallError> {
        self.call(
            "peering-describe",
            self.provider.describe_peering(region, peering_id),
        )
        .await
    }

    pub async fn find_peerings(
        &self,
        region: &str,
        filter: &PeeringFilter,
    ) -> Result<Vec<PeeringDescription>, CallError> {
        self.call("peering-describe", self.provider.find_peerings(region, filter))
            .await
    }

    pub async fn route_tables(
        &self,
        region: &str,
        vpc_id: &str,
        tag: &ResourceTag,
    ) -> Result<Vec<String>, CallError> {
        self.call(
            "route-table-describe",
            self.provider.route_tables(region, vpc_id, tag),
        )
        .await
    }

    pub async fn put_route(
        &self,
        region: &str,
        route: &RouteRequest,
    ) -> Result<RouteWrite, CallError> {
        self.call("route-create", self.provider.put_route(region, route))
            .await
    }
}
