use bannerscope_core::AuditError;
use chromiumoxide::page::Page;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::time::sleep;

use super::network::NetworkMonitor;
use crate::shared::{js, to_audit_error, TimeoutConfig};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoadState {
    pub ready_state: String,
    /// Filled from the tab's [`NetworkMonitor`]
    #[serde(skip)]
    pub active_requests: usize,
    pub fonts_loading: bool,
}

impl LoadState {
    /// Document complete, network idle and fonts settled.
    pub fn is_idle(&self) -> bool {
        self.ready_state == "complete" && self.active_requests == 0 && !self.fonts_loading
    }
}

pub struct WaitStrategy {
    config: TimeoutConfig,
}

impl WaitStrategy {
    pub fn new(config: TimeoutConfig) -> Self {
        Self { config }
    }

    async fn probe(&self, page: &Page, network: &NetworkMonitor) -> Result<LoadState, AuditError> {
        let result = page
            .evaluate(js::build_js_call(js::wait::LOAD_STATE, &[]))
            .await
            .map_err(|e| to_audit_error(e, "WaitForStable"))?;
        let mut state: LoadState = result.into_value().unwrap_or_default();
        state.active_requests = network.in_flight();
        Ok(state)
    }

    /// Waits for `stable_checks` consecutive idle probes. Never fails on
    /// timeout: a page that keeps loading is audited as it stands.
    pub async fn wait_for_stable(&self, page: &Page, network: &NetworkMonitor) -> Result<(), AuditError> {
        let deadline = self.config.page_stable;
        let start = Instant::now();
        let mut idle_streak = 0u32;

        // Navigation may not have started painting yet
        sleep(Duration::from_millis(500)).await;

        while start.elapsed() <= deadline {
            match self.probe(page, network).await {
                Ok(state) if state.is_idle() => {
                    idle_streak += 1;
                    if idle_streak >= self.config.stable_checks {
                        tracing::debug!(elapsed_ms = start.elapsed().as_millis() as u64, "page settled");
                        sleep(self.config.settle_delay).await;
                        return Ok(());
                    }
                }
                Ok(state) => {
                    if idle_streak > 0 {
                        tracing::trace!(?state, "page busy again");
                    }
                    idle_streak = 0;
                }
                Err(e) if e.is_transient() => {
                    tracing::debug!("execution context replaced, page still navigating");
                    idle_streak = 0;
                }
                Err(e) => return Err(e),
            }
            sleep(self.config.check_interval).await;
        }

        tracing::warn!(timeout_ms = deadline.as_millis() as u64, "page never settled, auditing as is");
        Ok(())
    }
}
