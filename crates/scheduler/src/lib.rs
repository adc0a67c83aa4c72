use bannerscope_core::{AuditError, DeviceProfile, ErrorCategory, SessionFactory};
use bannerscope_detector::{BannerLocator, BannerOutcome};
use bannerscope_storage::SelectorStore;
use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio::time::Instant;
use url::Url;

#[derive(Debug, Clone)]
pub struct AuditJob {
    pub id: String,
    pub url: Url,
    pub device: DeviceProfile,
}

impl AuditJob {
    pub fn new(id: impl Into<String>, url: Url, device: DeviceProfile) -> Self {
        Self { id: id.into(), url, device }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditReport {
    pub job_id: String,
    pub url: String,
    pub device: String,
    pub result: Result<BannerOutcome, AuditError>,
}

/// Runs audits concurrently, one session per audit.
///
/// Clones share the queue, the concurrency limit and the locator (and with it
/// the selector store).
pub struct AuditScheduler<F: SessionFactory + 'static, S: SelectorStore + 'static> {
    factory: Arc<F>,
    locator: Arc<BannerLocator<S>>,
    sender: mpsc::Sender<AuditJob>,
    concurrency_limit: Arc<Semaphore>,
    audit_timeout: Duration,
}

impl<F: SessionFactory + 'static, S: SelectorStore + 'static> Clone for AuditScheduler<F, S> {
    fn clone(&self) -> Self {
        Self {
            factory: Arc::clone(&self.factory),
            locator: Arc::clone(&self.locator),
            sender: self.sender.clone(),
            concurrency_limit: Arc::clone(&self.concurrency_limit),
            audit_timeout: self.audit_timeout,
        }
    }
}

impl<F: SessionFactory + 'static, S: SelectorStore + 'static> AuditScheduler<F, S> {
    pub fn new(
        factory: Arc<F>,
        locator: BannerLocator<S>,
        capacity: usize,
        max_concurrent: usize,
        audit_timeout: Duration,
    ) -> (Self, mpsc::Receiver<AuditJob>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let scheduler = Self {
            factory,
            locator: Arc::new(locator),
            sender: tx,
            concurrency_limit: Arc::new(Semaphore::new(max_concurrent.max(1))),
            audit_timeout,
        };
        (scheduler, rx)
    }

    pub fn submit(&self, job: AuditJob) -> Result<(), mpsc::error::TrySendError<AuditJob>> {
        self.sender.try_send(job)
    }

    /// Drains `receiver` until every clone of the scheduler is dropped and all
    /// running audits have reported.
    pub async fn run(self, mut receiver: mpsc::Receiver<AuditJob>, reports: mpsc::Sender<AuditReport>) {
        let Self { factory, locator, sender, concurrency_limit, audit_timeout } = self;
        drop(sender);
        let mut futures = FuturesUnordered::new();

        loop {
            tokio::select! {
                Some(job) = receiver.recv() => {
                    let limit = Arc::clone(&concurrency_limit);
                    let factory = Arc::clone(&factory);
                    let locator = Arc::clone(&locator);

                    // Permits are taken inside the stream, never in the select loop
                    futures.push(async move {
                        let result = match limit.acquire_owned().await {
                            Ok(permit) => {
                                tracing::info!(job = %job.id, url = %job.url, device = %job.device.name, "audit started");
                                let result = audit(factory.as_ref(), locator.as_ref(), &job, audit_timeout).await;
                                drop(permit);
                                result
                            }
                            Err(_) => Err(AuditError::new(ErrorCategory::Unknown, "scheduler shut down")),
                        };
                        AuditReport {
                            job_id: job.id,
                            url: job.url.to_string(),
                            device: job.device.name,
                            result,
                        }
                    });
                }
                Some(report) = futures.next() => {
                    match &report.result {
                        Ok(outcome) => tracing::info!(
                            job = %report.job_id,
                            source = ?outcome.source,
                            selector = ?outcome.selector,
                            duration_ms = outcome.duration_ms,
                            "audit finished"
                        ),
                        Err(err) => tracing::warn!(job = %report.job_id, error = %err, "audit failed"),
                    }
                    if reports.send(report).await.is_err() {
                        tracing::debug!("report receiver dropped");
                    }
                }
                else => break,
            }
        }
    }
}

/// Opens a session, locates the banner and closes the session, all within
/// `budget`. The session is closed whether the audit finishes or times out.
pub async fn audit<F: SessionFactory, S: SelectorStore>(
    factory: &F,
    locator: &BannerLocator<S>,
    job: &AuditJob,
    budget: Duration,
) -> Result<BannerOutcome, AuditError> {
    let deadline = Instant::now() + budget;
    let timed_out = || {
        AuditError::timeout_error(format!("audit of {} exceeded {}ms", job.url, budget.as_millis()))
            .with_context(json!({ "url": job.url.as_str(), "job": job.id }))
    };

    let session = tokio::time::timeout_at(deadline, factory.open(&job.url, &job.device))
        .await
        .map_err(|_| timed_out())??;

    let located = tokio::time::timeout_at(deadline, locator.locate(&session, &job.url)).await;
    factory.close(session).await;

    located
        .map(|outcome| outcome.with_resolution(job.device.resolution()))
        .map_err(|_| timed_out())
}
