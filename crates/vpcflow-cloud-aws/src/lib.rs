//! AWS provider for vpcflow
//!
//! Stacks are CloudFormation stacks; peering connections and route tables are
//! EC2 resources. SDK configuration is loaded lazily, once per region.

pub mod context;
pub mod error;
pub mod gateway;

pub use context::AwsContext;
pub use error::classify_aws_error;
pub use gateway::AwsGateway;
