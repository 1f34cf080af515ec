//! Shared state handed to every phase of a run

use crate::gateway::Gateway;
use crate::limiter::RegionLimiter;
use crate::wait::WaitConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use vpcflow_cloud::ProviderGateway;
use vpcflow_config::Settings;

#[derive(Clone)]
pub struct Context {
    pub gateway: Gateway,
    pub settings: Arc<Settings>,
    pub limiter: RegionLimiter,
    pub cancel: CancellationToken,
}

impl Context {
    pub fn new(
        provider: Arc<dyn ProviderGateway>,
        settings: Settings,
        cancel: CancellationToken,
    ) -> Self {
        let gateway = Gateway::new(provider, settings.timeouts.call(), cancel.clone());
        let limiter = RegionLimiter::new(settings.concurrency.per_region);
        Self {
            gateway,
            settings: Arc::new(settings),
            limiter,
            cancel,
        }
    }

    /// Wait configuration bounded by `timeout`, using the run's backoff
    pub fn wait_config(&self, timeout: Duration) -> WaitConfig {
        WaitConfig::new(&self.settings.backoff, timeout)
    }

    pub fn max_in_flight(&self) -> usize {
        self.settings.concurrency.max_in_flight.max(1)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use vpcflow_cloud::memory::InMemoryGateway;

    /// Settings with millisecond backoff so waits finish quickly
    pub(crate) fn fast_settings() -> Settings {
        let mut settings = Settings::default();
        settings.backoff.initial_delay_ms = 1;
        settings.backoff.max_delay_ms = 5;
        settings.timeouts.call_secs = 5;
        settings.timeouts.stack_secs = 5;
        settings.timeouts.peering_secs = 5;
        settings
    }

    pub(crate) fn context(provider: &Arc<InMemoryGateway>) -> Context {
        Context::new(provider.clone(), fast_settings(), CancellationToken::new())
    }
}
