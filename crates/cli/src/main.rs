mod config;

use anyhow::{Context, Result};
use bannerscope_browser::{ChromiumLauncher, LaunchOptions};
use bannerscope_core::normalize_target;
use bannerscope_detector::{BannerLocator, BannerOutcome, Lexicon, StaticPage};
use bannerscope_scheduler::{AuditJob, AuditReport, AuditScheduler};
use bannerscope_storage::JsonFileStore;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use config::{AuditConfig, load_config};

#[derive(Parser)]
#[command(name = "bannerscope", version, about = "Locate cookie-consent banners and keep stable selectors for them")]
struct Args {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Folder for the selector store (overrides the config file)
    #[arg(long, global = true)]
    store: Option<String>,

    /// Write banner screenshots into this folder
    #[arg(long, global = true)]
    screenshots: Option<String>,

    /// Audit with the mobile device profile
    #[arg(long, global = true)]
    mobile: bool,

    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand)]
enum Mode {
    /// Audit live pages in headless Chromium
    Audit {
        /// Targets; bare hosts get https://
        #[arg(required = true)]
        urls: Vec<String>,

        #[arg(long)]
        concurrency: Option<usize>,

        /// Show the browser window
        #[arg(long)]
        visible: bool,
    },
    /// Audit a saved HTML snapshot without a browser
    Snapshot {
        /// Main document
        file: PathBuf,

        /// URL the snapshot was taken from, used as the cache key
        #[arg(long)]
        url: String,

        /// Same-origin frame documents, in order
        #[arg(long = "frame")]
        frames: Vec<PathBuf>,
    },
}

fn apply_overrides(config: &mut AuditConfig, args: &Args) {
    if let Some(store) = &args.store {
        config.store_path = store.clone();
    }
    if let Some(dir) = &args.screenshots {
        config.screenshot_dir = Some(dir.clone());
    }
    if args.mobile {
        config.device = "mobile".to_string();
    }
    if let Mode::Audit { concurrency, visible, .. } = &args.mode {
        if let Some(n) = concurrency {
            config.concurrency = (*n).max(1);
        }
        if *visible {
            config.headless = false;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries the JSON summary
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let mut config = load_config(args.config.as_deref())?;
    apply_overrides(&mut config, &args);

    let locator = BannerLocator::new(
        JsonFileStore::new(&config.store_path)?,
        Lexicon::builtin(),
        config.detection.clone(),
    );

    let reports = match &args.mode {
        Mode::Audit { urls, .. } => run_live(&config, locator, urls).await?,
        Mode::Snapshot { file, url, frames } => vec![run_snapshot(&config, &locator, file, url, frames).await?],
    };

    if let Some(dir) = &config.screenshot_dir {
        let extension = if matches!(args.mode, Mode::Snapshot { .. }) { "html" } else { "png" };
        save_screenshots(Path::new(dir), &reports, extension).await?;
    }
    println!("{}", serde_json::to_string_pretty(&reports)?);
    Ok(())
}

async fn run_live(config: &AuditConfig, locator: BannerLocator<JsonFileStore>, urls: &[String]) -> Result<Vec<AuditReport>> {
    let device = config.device_profile()?;
    let mut reports = Vec::new();
    let mut jobs = Vec::new();

    for (i, input) in urls.iter().enumerate() {
        let id = (i + 1).to_string();
        match normalize_target(input) {
            Ok(url) => jobs.push(AuditJob::new(id, url, device.clone())),
            Err(e) => reports.push(AuditReport { job_id: id, url: input.clone(), device: device.name.clone(), result: Err(e) }),
        }
    }
    if jobs.is_empty() {
        return Ok(reports);
    }

    let options = LaunchOptions { headless: config.headless, ..LaunchOptions::default() };
    let launcher = Arc::new(ChromiumLauncher::launch(options, config.timeout_config()?).await?);

    let (scheduler, receiver) =
        AuditScheduler::new(Arc::clone(&launcher), locator, jobs.len(), config.concurrency, config.audit_timeout());
    let (report_tx, mut report_rx) = mpsc::channel(jobs.len());
    for job in jobs {
        if let Err(e) = scheduler.submit(job) {
            tracing::warn!("could not queue audit: {}", e);
        }
    }
    scheduler.run(receiver, report_tx).await;
    while let Some(report) = report_rx.recv().await {
        reports.push(report);
    }

    match Arc::try_unwrap(launcher) {
        Ok(launcher) => launcher.shutdown().await?,
        Err(_) => tracing::warn!("browser still shared, skipping shutdown"),
    }
    reports.sort_by_key(|r| r.job_id.parse::<usize>().unwrap_or(usize::MAX));
    Ok(reports)
}

async fn run_snapshot(
    config: &AuditConfig,
    locator: &BannerLocator<JsonFileStore>,
    file: &Path,
    url: &str,
    frames: &[PathBuf],
) -> Result<AuditReport> {
    let device = config.device_profile()?;
    let target = normalize_target(url)?;

    let html = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read snapshot: {}", file.display()))?;
    let mut page = StaticPage::new(html).with_viewport(device.width, device.height);
    for frame in frames {
        let frame_html = tokio::fs::read_to_string(frame)
            .await
            .with_context(|| format!("Failed to read frame: {}", frame.display()))?;
        page = page.with_frame(frame_html);
    }

    let outcome = locator.locate(&page, &target).await.with_resolution(device.resolution());
    Ok(AuditReport { job_id: "1".to_string(), url: target.to_string(), device: device.name, result: Ok(outcome) })
}

fn screenshot_name(report: &AuditReport, outcome: &BannerOutcome, extension: &str) -> String {
    let host = url::Url::parse(&outcome.url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| "page".to_string());
    format!("{}-{}-{}.{}", report.job_id, host, report.device, extension)
}

async fn save_screenshots(dir: &Path, reports: &[AuditReport], extension: &str) -> Result<()> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create screenshot dir: {}", dir.display()))?;
    for report in reports {
        let Ok(outcome) = &report.result else { continue };
        if outcome.screenshot.is_empty() {
            continue;
        }
        let path = dir.join(screenshot_name(report, outcome, extension));
        tokio::fs::write(&path, &outcome.screenshot)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        tracing::info!(path = %path.display(), "screenshot saved");
    }
    Ok(())
}
