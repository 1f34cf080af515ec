use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use vpcflow_cloud::memory::InMemoryGateway;
use vpcflow_config::{Settings, Templates, VpcSpec, parse_specs};
use vpcflow_core::Orchestrator;

pub const TEMPLATE: &str = "vpc.yaml";

/// Three VPCs in three regions, in the original key spelling
pub const THREE_REGIONS: &str = r#"
- Region: us-east-1
  vpc_name: a
  Template: vpc.yaml
  Parameters:
    VPCCIDRBlock: 10.0.0.0/16
- Region: us-west-2
  vpc_name: b
  Template: vpc.yaml
  Parameters:
    VPCCIDRBlock: 10.1.0.0/16
- Region: eu-west-1
  vpc_name: c
  Template: vpc.yaml
  Parameters:
    VPCCIDRBlock: 10.2.0.0/16
"#;

pub struct TestWorld {
    pub provider: Arc<InMemoryGateway>,
    pub specs: Vec<VpcSpec>,
    pub templates: Templates,
}

impl TestWorld {
    pub fn new(config: &str) -> Self {
        let mut templates = Templates::default();
        templates.insert(TEMPLATE, "AWSTemplateFormatVersion: '2010-09-09'\n");
        Self {
            provider: Arc::new(InMemoryGateway::new()),
            specs: parse_specs(config).unwrap(),
            templates,
        }
    }

    pub fn settings() -> Settings {
        let mut settings = Settings::default();
        settings.backoff.initial_delay_ms = 1;
        settings.backoff.max_delay_ms = 5;
        settings.timeouts.stack_secs = 5;
        settings.timeouts.peering_secs = 5;
        settings
    }

    pub fn orchestrator(&self) -> Orchestrator {
        self.orchestrator_with(Self::settings(), CancellationToken::new())
    }

    pub fn orchestrator_with(&self, settings: Settings, cancel: CancellationToken) -> Orchestrator {
        Orchestrator::new(self.provider.clone(), settings, cancel)
    }

    /// Route table ids of a deployed VPC
    #[allow(dead_code)]
    pub fn table_of(&self, vpc_id: &str) -> String {
        self.provider.route_table_ids(vpc_id).remove(0)
    }
}
