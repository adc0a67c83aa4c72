use async_trait::async_trait;
use bannerscope_core::{AuditError, DeviceProfile, SessionFactory};
use chromiumoxide::browser::{Browser, BrowserConfig as ChromeConfig, HeadlessMode};
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::page::Page;
use futures::StreamExt;
use serde_json::json;
use std::path::PathBuf;
use tokio::task::JoinHandle;
use url::Url;

use super::network::NetworkMonitor;
use super::session::ChromiumSession;
use super::wait::WaitStrategy;
use crate::shared::{to_audit_error, TimeoutConfig};

#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub headless: bool,
    /// Often needed in docker/CI/restricted envs
    pub no_sandbox: bool,
    /// Falls back to `CHROME_BIN`, then to chromiumoxide's own lookup
    pub chrome_executable: Option<PathBuf>,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self { headless: true, no_sandbox: true, chrome_executable: None }
    }
}

/// One browser process, one fresh tab per audit.
pub struct ChromiumLauncher {
    browser: Browser,
    handler_task: JoinHandle<()>,
    user_data_dir: PathBuf,
    timeout_config: TimeoutConfig,
}

impl ChromiumLauncher {
    pub async fn launch(options: LaunchOptions, timeout_config: TimeoutConfig) -> Result<Self, AuditError> {
        // A unique profile per browser avoids SingletonLock conflicts
        let user_data_dir = std::env::temp_dir().join(format!("bannerscope-chromium-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&user_data_dir)
            .map_err(|e| AuditError::browser_error(format!("Failed to create temp dir: {}", e)))?;

        let mut builder = ChromeConfig::builder()
            .headless_mode(if options.headless { HeadlessMode::True } else { HeadlessMode::False })
            .user_data_dir(&user_data_dir);
        if options.no_sandbox {
            builder = builder.no_sandbox();
        }
        let executable = options
            .chrome_executable
            .clone()
            .or_else(|| std::env::var("CHROME_BIN").ok().map(PathBuf::from));
        if let Some(path) = executable {
            tracing::info!(path = %path.display(), "using custom Chrome binary");
            builder = builder.chrome_executable(path);
        }

        let chrome_cfg = builder
            .build()
            .map_err(|e| AuditError::browser_error(format!("Config failed: {}", e)))?;

        let (browser, mut handler) = Browser::launch(chrome_cfg)
            .await
            .map_err(|e| AuditError::browser_error(format!("Launch failed: {}", e)))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!("browser handler error (ignoring): {}", e);
                }
            }
            tracing::debug!("browser handler task ended");
        });

        tracing::info!(headless = options.headless, "browser launched");
        Ok(Self { browser, handler_task, user_data_dir, timeout_config })
    }

    async fn prepare(&self, page: &Page, url: &Url, device: &DeviceProfile) -> Result<(), AuditError> {
        let metrics = SetDeviceMetricsOverrideParams::new(i64::from(device.width), i64::from(device.height), 1.0, device.mobile);
        page.execute(metrics).await.map_err(|e| to_audit_error(e, "SetViewport"))?;

        if let Some(user_agent) = &device.user_agent {
            page.execute(SetUserAgentOverrideParams::new(user_agent.clone()))
                .await
                .map_err(|e| to_audit_error(e, "SetUserAgent"))?;
        }

        let network = NetworkMonitor::attach(page).await?;
        tracing::info!(url = %url, device = %device.name, resolution = %device.resolution(), "navigating");
        match tokio::time::timeout(self.timeout_config.navigation, page.goto(url.as_str())).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                return Err(AuditError::navigation_error(format!("Navigation failed: {}", e))
                    .with_context(json!({ "url": url.as_str() })));
            }
            Err(_) => {
                return Err(AuditError::timeout_error(format!(
                    "Navigation to {} exceeded {}ms",
                    url,
                    self.timeout_config.navigation.as_millis()
                ))
                .with_context(json!({ "url": url.as_str() })));
            }
        }

        WaitStrategy::new(self.timeout_config.clone()).wait_for_stable(page, &network).await
    }

    /// Closes the browser and removes its temporary profile.
    pub async fn shutdown(mut self) -> Result<(), AuditError> {
        self.browser
            .close()
            .await
            .map_err(|e| AuditError::browser_error(format!("Error closing browser: {}", e)))?;
        self.handler_task
            .await
            .map_err(|e| AuditError::browser_error(format!("Error awaiting handler: {}", e)))?;
        if let Err(e) = std::fs::remove_dir_all(&self.user_data_dir) {
            tracing::debug!("failed to clean up user-data-dir {}: {}", self.user_data_dir.display(), e);
        }
        Ok(())
    }
}

#[async_trait]
impl SessionFactory for ChromiumLauncher {
    type Session = ChromiumSession;

    async fn open(&self, url: &Url, device: &DeviceProfile) -> Result<ChromiumSession, AuditError> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| AuditError::browser_error(format!("New page failed: {}", e)))?;

        if let Err(e) = self.prepare(&page, url, device).await {
            if let Err(close_err) = page.close().await {
                tracing::debug!("closing failed page: {}", close_err);
            }
            return Err(e);
        }
        Ok(ChromiumSession::new(page))
    }

    async fn close(&self, session: ChromiumSession) {
        if let Err(e) = session.into_page().close().await {
            tracing::debug!("page close failed (already gone?): {}", e);
        }
    }
}
