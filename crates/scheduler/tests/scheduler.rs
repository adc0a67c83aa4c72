use bannerscope_core::{DeviceProfile, ErrorCategory};
use bannerscope_detector::{BannerLocator, DetectionConfig, Lexicon, OutcomeSource, StaticPage, StaticPageFactory};
use bannerscope_scheduler::{AuditJob, AuditReport, AuditScheduler};
use bannerscope_storage::MemoryStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use url::Url;

const BANNER: &str = r#"<html><body><div id="cookie" style="z-index:9999;background:#fff">Accept cookies</div></body></html>"#;

fn url(s: &str) -> Url {
    Url::parse(s).unwrap()
}

fn locator() -> BannerLocator<MemoryStore> {
    BannerLocator::new(MemoryStore::new(), Lexicon::builtin(), DetectionConfig::default().without_retry())
}

async fn run_all(
    factory: StaticPageFactory,
    jobs: Vec<AuditJob>,
    timeout: Duration,
) -> Vec<AuditReport> {
    let (scheduler, rx) = AuditScheduler::new(Arc::new(factory), locator(), 16, 2, timeout);
    let (report_tx, mut report_rx) = mpsc::channel(16);
    for job in jobs {
        scheduler.submit(job).unwrap();
    }
    scheduler.run(rx, report_tx).await;

    let mut reports = Vec::new();
    while let Some(report) = report_rx.recv().await {
        reports.push(report);
    }
    reports.sort_by(|a, b| a.job_id.cmp(&b.job_id));
    reports
}

#[tokio::test]
async fn every_job_reports_once() {
    let factory = StaticPageFactory::new()
        .with_page(&url("https://a.example/"), StaticPage::new(BANNER))
        .with_page(&url("https://b.example/"), StaticPage::new("<p>No banner here</p>"));
    let jobs = vec![
        AuditJob::new("1", url("https://a.example/"), DeviceProfile::desktop()),
        AuditJob::new("2", url("https://b.example/"), DeviceProfile::mobile()),
        AuditJob::new("3", url("https://missing.example/"), DeviceProfile::desktop()),
    ];

    let reports = run_all(factory, jobs, Duration::from_secs(30)).await;
    assert_eq!(reports.len(), 3);

    let found = reports[0].result.as_ref().unwrap();
    assert_eq!(found.source, OutcomeSource::Detected);
    assert_eq!(found.selector.as_deref(), Some("div#cookie"));
    assert_eq!(found.resolution.as_deref(), Some("1920x1080"));

    let empty = reports[1].result.as_ref().unwrap();
    assert_eq!(empty.source, OutcomeSource::NotFound);
    assert_eq!(empty.resolution.as_deref(), Some("360x640"));
    assert_eq!(reports[1].device, "mobile");

    let failed = reports[2].result.as_ref().unwrap_err();
    assert_eq!(failed.category, ErrorCategory::Navigation);
}

#[tokio::test]
async fn repeat_audits_share_the_store() {
    let target = url("https://a.example/");
    let factory = StaticPageFactory::new().with_page(&target, StaticPage::new(BANNER));
    let locator = locator();
    let (scheduler, rx) = AuditScheduler::new(Arc::new(factory), locator, 4, 1, Duration::from_secs(30));
    let (report_tx, mut report_rx) = mpsc::channel(4);

    scheduler.submit(AuditJob::new("first", target.clone(), DeviceProfile::desktop())).unwrap();
    scheduler.submit(AuditJob::new("second", target.clone(), DeviceProfile::desktop())).unwrap();
    scheduler.run(rx, report_tx).await;

    let first = report_rx.recv().await.unwrap();
    let second = report_rx.recv().await.unwrap();
    assert_eq!(first.result.unwrap().source, OutcomeSource::Detected);
    assert_eq!(second.result.unwrap().source, OutcomeSource::CachedUrl);
}

#[tokio::test(start_paused = true)]
async fn slow_pages_time_out() {
    let target = url("https://slow.example/");
    let factory = StaticPageFactory::new().with_page(&target, StaticPage::new(BANNER).with_latency(Duration::from_secs(60)));
    let jobs = vec![AuditJob::new("slow", target, DeviceProfile::desktop())];

    let reports = run_all(factory, jobs, Duration::from_secs(5)).await;
    let err = reports[0].result.as_ref().unwrap_err();
    assert_eq!(err.category, ErrorCategory::Timeout);
}

#[test]
fn reports_serialize_for_output() {
    let report = AuditReport {
        job_id: "1".to_string(),
        url: "https://a.example/".to_string(),
        device: "desktop".to_string(),
        result: Err(bannerscope_core::AuditError::invalid_url("nope")),
    };
    let value = serde_json::to_value(&report).unwrap();
    assert_eq!(value["jobId"], "1");
    assert_eq!(value["result"]["Err"]["category"], "InvalidUrl");
}
