//! `ProviderGateway` over CloudFormation and EC2

use crate::context::AwsContext;
use crate::error::{ROUTE_ALREADY_EXISTS, from_sdk_error, is_no_updates};
use async_trait::async_trait;
use aws_sdk_cloudformation::types::Parameter;
use aws_sdk_ec2::error::ProvideErrorMetadata;
use aws_sdk_ec2::types::{Filter, VpcPeeringConnection, VpcPeeringConnectionVpcInfo};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use vpcflow_cloud::{
    PeerVpc, PeeringDescription, PeeringFilter, PeeringRequest, PeeringStatus, ProviderError,
    ProviderGateway, ResourceTag, Result, RouteRequest, RouteWrite, StackRequest, StackState,
    UpdateOutcome,
};

/// AWS gateway holding one SDK configuration per region it has touched
pub struct AwsGateway {
    operation_timeout: Option<Duration>,
    contexts: Mutex<HashMap<String, AwsContext>>,
}

impl AwsGateway {
    pub fn new(operation_timeout: Option<Duration>) -> Self {
        Self {
            operation_timeout,
            contexts: Mutex::new(HashMap::new()),
        }
    }

    async fn context(&self, region: &str) -> AwsContext {
        let mut contexts = self.contexts.lock().await;
        if let Some(ctx) = contexts.get(region) {
            return ctx.clone();
        }
        let ctx = AwsContext::new(region, self.operation_timeout).await;
        tracing::debug!("Loaded AWS configuration for {}", ctx.region());
        contexts.insert(ctx.region().to_string(), ctx.clone());
        ctx
    }

    async fn cloudformation(&self, region: &str) -> aws_sdk_cloudformation::Client {
        self.context(region).await.cloudformation_client()
    }

    async fn ec2(&self, region: &str) -> aws_sdk_ec2::Client {
        self.context(region).await.ec2_client()
    }
}

fn parameters(request: &StackRequest) -> Vec<Parameter> {
    request
        .parameters
        .iter()
        .map(|(key, value)| {
            Parameter::builder()
                .parameter_key(key)
                .parameter_value(value)
                .build()
        })
        .collect()
}

fn peer_vpc(info: Option<&VpcPeeringConnectionVpcInfo>) -> PeerVpc {
    PeerVpc {
        vpc_id: info
            .and_then(|i| i.vpc_id())
            .unwrap_or_default()
            .to_string(),
        region: info
            .and_then(|i| i.region())
            .unwrap_or_default()
            .to_string(),
        cidr_block: info.and_then(|i| i.cidr_block()).map(str::to_string),
    }
}

fn peering_description(connection: &VpcPeeringConnection) -> Option<PeeringDescription> {
    let id = connection.vpc_peering_connection_id()?;
    let status = connection
        .status()
        .and_then(|s| s.code())
        .map(|code| PeeringStatus::from_code(code.as_str()))
        .unwrap_or(PeeringStatus::Failed);
    Some(PeeringDescription {
        id: id.to_string(),
        status,
        requester: peer_vpc(connection.requester_vpc_info()),
        accepter: peer_vpc(connection.accepter_vpc_info()),
    })
}

fn filter(name: &str, value: &str) -> Filter {
    Filter::builder().name(name).values(value).build()
}

#[async_trait]
impl ProviderGateway for AwsGateway {
    fn name(&self) -> &str {
        "aws"
    }

    async fn stack_exists(&self, region: &str, stack_name: &str) -> Result<bool> {
        match self.stack_status(region, stack_name).await? {
            StackState::NotExists => Ok(false),
            _ => Ok(true),
        }
    }

    async fn stack_status(&self, region: &str, stack_name: &str) -> Result<StackState> {
        let output = match self
            .cloudformation(region)
            .await
            .describe_stacks()
            .stack_name(stack_name)
            .send()
            .await
        {
            Ok(output) => output,
            Err(e) => {
                return match from_sdk_error(&e) {
                    ProviderError::NotFound(_) => Ok(StackState::NotExists),
                    other => Err(other),
                };
            }
        };

        Ok(output
            .stacks()
            .first()
            .and_then(|stack| stack.stack_status())
            .map(|status| StackState::parse(status.as_str()))
            .unwrap_or(StackState::NotExists))
    }

    async fn create_stack(&self, region: &str, request: &StackRequest) -> Result<String> {
        tracing::debug!("CreateStack {} in {}", request.stack_name, region);
        let output = self
            .cloudformation(region)
            .await
            .create_stack()
            .stack_name(&request.stack_name)
            .template_body(&request.template_body)
            .set_parameters(Some(parameters(request)))
            .send()
            .await
            .map_err(|e| from_sdk_error(&e))?;

        Ok(output.stack_id().unwrap_or(&request.stack_name).to_string())
    }

    async fn update_stack(&self, region: &str, request: &StackRequest) -> Result<UpdateOutcome> {
        tracing::debug!("UpdateStack {} in {}", request.stack_name, region);
        let result = self
            .cloudformation(region)
            .await
            .update_stack()
            .stack_name(&request.stack_name)
            .template_body(&request.template_body)
            .set_parameters(Some(parameters(request)))
            .send()
            .await;

        match result {
            Ok(_) => Ok(UpdateOutcome::Started),
            Err(e) if is_no_updates(e.code(), e.message()) => Ok(UpdateOutcome::NoChanges),
            Err(e) => Err(from_sdk_error(&e)),
        }
    }

    async fn stack_resource_id(
        &self,
        region: &str,
        stack_name: &str,
        logical_id: &str,
    ) -> Result<String> {
        let output = self
            .cloudformation(region)
            .await
            .describe_stack_resource()
            .stack_name(stack_name)
            .logical_resource_id(logical_id)
            .send()
            .await
            .map_err(|e| from_sdk_error(&e))?;

        output
            .stack_resource_detail()
            .and_then(|detail| detail.physical_resource_id())
            .map(str::to_string)
            .ok_or_else(|| {
                ProviderError::NotFound(format!(
                    "Resource {logical_id} in stack {stack_name} has no physical id"
                ))
            })
    }

    async fn create_peering(&self, request: &PeeringRequest) -> Result<String> {
        let output = self
            .ec2(&request.requester_region)
            .await
            .create_vpc_peering_connection()
            .vpc_id(&request.requester_vpc_id)
            .peer_vpc_id(&request.accepter_vpc_id)
            .peer_region(&request.accepter_region)
            .send()
            .await
            .map_err(|e| from_sdk_error(&e))?;

        output
            .vpc_peering_connection()
            .and_then(|c| c.vpc_peering_connection_id())
            .map(str::to_string)
            .ok_or_else(|| ProviderError::api(None, "CreateVpcPeeringConnection returned no id"))
    }

    async fn accept_peering(&self, region: &str, peering_id: &str) -> Result<PeeringStatus> {
        let output = self
            .ec2(region)
            .await
            .accept_vpc_peering_connection()
            .vpc_peering_connection_id(peering_id)
            .send()
            .await
            .map_err(|e| from_sdk_error(&e))?;

        Ok(output
            .vpc_peering_connection()
            .and_then(|c| c.status())
            .and_then(|s| s.code())
            .map(|code| PeeringStatus::from_code(code.as_str()))
            .unwrap_or(PeeringStatus::Provisioning))
    }

    async fn describe_peering(
        &self,
        region: &str,
        peering_id: &str,
    ) -> Result<PeeringDescription> {
        let output = self
            .ec2(region)
            .await
            .describe_vpc_peering_connections()
            .vpc_peering_connection_ids(peering_id)
            .send()
            .await
            .map_err(|e| from_sdk_error(&e))?;

        output
            .vpc_peering_connections()
            .iter()
            .find_map(peering_description)
            .ok_or_else(|| ProviderError::NotFound(format!("Peering {peering_id}")))
    }

    async fn find_peerings(
        &self,
        region: &str,
        peering_filter: &PeeringFilter,
    ) -> Result<Vec<PeeringDescription>> {
        let mut request = self.ec2(region).await.describe_vpc_peering_connections();
        if let Some(cidr) = &peering_filter.requester_cidr {
            request = request.filters(filter("requester-vpc-info.cidr-block", cidr));
        }
        if let Some(vpc_id) = &peering_filter.requester_vpc_id {
            request = request.filters(filter("requester-vpc-info.vpc-id", vpc_id));
        }
        if let Some(vpc_id) = &peering_filter.accepter_vpc_id {
            request = request.filters(filter("accepter-vpc-info.vpc-id", vpc_id));
        }
        let output = request.send().await.map_err(|e| from_sdk_error(&e))?;

        Ok(output
            .vpc_peering_connections()
            .iter()
            .filter_map(peering_description)
            .filter(|d| peering_filter.matches(d))
            .collect())
    }

    async fn route_tables(
        &self,
        region: &str,
        vpc_id: &str,
        tag: &ResourceTag,
    ) -> Result<Vec<String>> {
        let output = self
            .ec2(region)
            .await
            .describe_route_tables()
            .filters(filter("vpc-id", vpc_id))
            .filters(filter(&format!("tag:{}", tag.key), &tag.value))
            .send()
            .await
            .map_err(|e| from_sdk_error(&e))?;

        Ok(output
            .route_tables()
            .iter()
            .filter_map(|table| table.route_table_id())
            .map(str::to_string)
            .collect())
    }

    async fn put_route(&self, region: &str, route: &RouteRequest) -> Result<RouteWrite> {
        let client = self.ec2(region).await;
        let created = client
            .create_route()
            .route_table_id(&route.route_table_id)
            .destination_cidr_block(&route.destination_cidr)
            .vpc_peering_connection_id(&route.peering_connection_id)
            .send()
            .await;

        match created {
            Ok(_) => Ok(RouteWrite::Created),
            Err(e) if e.code() == Some(ROUTE_ALREADY_EXISTS) => {
                tracing::debug!(
                    "Route to {} exists in {}, replacing",
                    route.destination_cidr,
                    route.route_table_id
                );
                client
                    .replace_route()
                    .route_table_id(&route.route_table_id)
                    .destination_cidr_block(&route.destination_cidr)
                    .vpc_peering_connection_id(&route.peering_connection_id)
                    .send()
                    .await
                    .map_err(|e| from_sdk_error(&e))?;
                Ok(RouteWrite::Replaced)
            }
            Err(e) => Err(from_sdk_error(&e)),
        }
    }
}
