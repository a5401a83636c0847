//! `ccw-pipeline run` command implementation
//!
//! Wires the object store, the loader sink, the job status reporter and the
//! data-set monitor together, then polls until interrupted.

use crate::config::PipelineConfig;
use crate::listener::{LoadTotals, LoaderListener};
use anyhow::{Context, Result};
use ccw_rif::load::{InMemoryLoadSink, RifLoadSink, RifLoader};
use ccw_rif::s3::{InMemoryObjectStore, ObjectStore, S3ObjectStore};
use ccw_rif::status::LoggingStatusListener;
use ccw_rif::{DataSetMonitor, JobStatusReporter, MonitorOutcome, RifFilesProcessor};
use colored::Colorize;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub once: bool,
    pub interval: Option<Duration>,
    pub local_dir: Option<PathBuf>,
    pub dry_run: bool,
}

/// A fully wired monitor and loader
pub struct Pipeline {
    monitor: DataSetMonitor,
    listener: LoaderListener,
}

impl Pipeline {
    pub async fn build(config: &PipelineConfig, options: &RunOptions) -> Result<Self> {
        let store = build_store(config, options.local_dir.as_deref()).await?;
        let sink = build_sink(config, options.dry_run).await?;

        let processor = RifFilesProcessor::new().with_strict_grouping(config.extraction.strict_grouping);
        let loader = RifLoader::new(config.load.clone(), processor, sink);
        let status = Arc::new(JobStatusReporter::new().with_listener(Arc::new(LoggingStatusListener)));

        Ok(Self {
            monitor: DataSetMonitor::new(store, config.extraction.clone(), status),
            listener: LoaderListener::new(loader),
        })
    }

    /// One poll cycle
    pub async fn cycle(&self) -> ccw_rif::Result<MonitorOutcome> {
        self.monitor.run_once(&self.listener).await
    }

    pub fn monitor(&self) -> &DataSetMonitor {
        &self.monitor
    }

    pub fn listener(&self) -> &LoaderListener {
        &self.listener
    }
}

async fn build_store(config: &PipelineConfig, local_dir: Option<&Path>) -> Result<Arc<dyn ObjectStore>> {
    match local_dir {
        Some(dir) => {
            let store = InMemoryObjectStore::new();
            let loaded = store
                .load_dir(dir)
                .await
                .with_context(|| format!("Failed to read data sets from {}", dir.display()))?;
            info!(dir = %dir.display(), objects = loaded, "Using local data set directory");
            Ok(Arc::new(store))
        },
        None => {
            let store = S3ObjectStore::new(config.s3.clone())
                .await
                .context("Failed to create S3 client")?;
            info!(bucket = %store.bucket(), "Using S3 bucket");
            Ok(Arc::new(store))
        },
    }
}

#[cfg(feature = "database")]
async fn build_sink(config: &PipelineConfig, dry_run: bool) -> Result<Arc<dyn RifLoadSink>> {
    match (&config.database_url, dry_run) {
        (Some(url), false) => {
            let sink = ccw_rif::load::PgLoadSink::connect(url, config.database_max_connections)
                .await
                .context("Failed to connect to the database")?;
            info!("Loading into Postgres");
            Ok(Arc::new(sink))
        },
        _ => {
            info!("Loading into memory");
            Ok(Arc::new(InMemoryLoadSink::new()))
        },
    }
}

#[cfg(not(feature = "database"))]
async fn build_sink(config: &PipelineConfig, dry_run: bool) -> Result<Arc<dyn RifLoadSink>> {
    if config.database_url.is_some() && !dry_run {
        tracing::warn!("DATABASE_URL is set but this build has no database support; loading into memory");
    } else {
        info!("Loading into memory");
    }
    Ok(Arc::new(InMemoryLoadSink::new()))
}

fn print_outcome(outcome: &MonitorOutcome) {
    match outcome {
        MonitorOutcome::NothingToDo => println!("{}", "Nothing to do".dimmed()),
        MonitorOutcome::AwaitingData { manifest_key } => {
            println!("{} {}", "Waiting for data files of".yellow(), manifest_key)
        },
        MonitorOutcome::Processed { manifest_key, files } => {
            println!("{} {} ({} files)", "Loaded".green().bold(), manifest_key, files)
        },
    }
}

/// Poll for data sets until interrupted, or once with `--once`
pub async fn run(config: PipelineConfig, options: RunOptions) -> Result<()> {
    let config = match options.interval {
        Some(interval) => config.with_run_interval(interval),
        None => config,
    };
    config.validate().context("Invalid pipeline configuration")?;

    let pipeline = Pipeline::build(&config, &options).await?;
    info!(interval_secs = config.run_interval.as_secs(), once = options.once, "Pipeline started");

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Could not listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };
    let totals = run_until(&pipeline, config.run_interval, options.once, shutdown).await?;
    println!("{} files, {} records loaded", totals.files, totals.records);
    Ok(())
}

/// Cycle until `shutdown` resolves; a cycle in flight is abandoned
pub async fn run_until(
    pipeline: &Pipeline,
    interval: Duration,
    once: bool,
    shutdown: impl Future<Output = ()>,
) -> Result<LoadTotals> {
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            result = pipeline.cycle() => match result {
                Ok(outcome) => print_outcome(&outcome),
                Err(e) if once => return Err(e).context("Poll cycle failed"),
                Err(e) => error!(error = %e, "Poll cycle failed"),
            },
            _ = &mut shutdown => {
                info!("Shutdown requested");
                break;
            },
        }
        if once {
            break;
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {},
            _ = &mut shutdown => {
                info!("Shutdown requested");
                break;
            },
        }
    }
    Ok(pipeline.listener().totals())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_local_dir_is_nothing_to_do() {
        let dir = tempfile::tempdir().unwrap();
        let options = RunOptions {
            once: true,
            local_dir: Some(dir.path().to_path_buf()),
            ..RunOptions::default()
        };
        let pipeline = Pipeline::build(&PipelineConfig::default(), &options).await.unwrap();
        assert_eq!(pipeline.cycle().await.unwrap(), MonitorOutcome::NothingToDo);
        assert_eq!(pipeline.listener().totals(), LoadTotals::default());
    }

    #[tokio::test]
    async fn test_missing_local_dir_fails_to_build() {
        let dir = tempfile::tempdir().unwrap();
        let options = RunOptions {
            local_dir: Some(dir.path().join("absent")),
            ..RunOptions::default()
        };
        assert!(Pipeline::build(&PipelineConfig::default(), &options).await.is_err());
    }

    #[tokio::test]
    async fn test_shutdown_interrupts_cycle_waiting_for_data() {
        let dir = tempfile::tempdir().unwrap();
        let timestamp = (chrono::Utc::now() - chrono::Duration::hours(1))
            .to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
        let data_set = dir.path().join("Incoming").join(&timestamp);
        std::fs::create_dir_all(&data_set).unwrap();
        std::fs::write(
            data_set.join("0_manifest.xml"),
            format!(
                r#"<dataSetManifest timestamp="{}" sequenceId="0"><entry name="bene.txt" type="BENEFICIARY"/></dataSetManifest>"#,
                timestamp
            ),
        )
        .unwrap();

        let options = RunOptions {
            local_dir: Some(dir.path().to_path_buf()),
            ..RunOptions::default()
        };
        let mut config = PipelineConfig::default();
        config.extraction.data_max_wait = None;
        config.extraction.data_poll_interval = Duration::from_millis(10);
        let pipeline = Pipeline::build(&config, &options).await.unwrap();

        let shutdown = tokio::time::sleep(Duration::from_millis(100));
        let totals = tokio::time::timeout(
            Duration::from_secs(5),
            run_until(&pipeline, Duration::from_secs(60), false, shutdown),
        )
        .await
        .expect("shutdown stops a cycle that is still waiting")
        .unwrap();

        assert_eq!(totals, LoadTotals::default());
        assert_eq!(
            pipeline.monitor().status().current().map(|e| e.job_stage),
            Some(ccw_rif::JobStage::AwaitingManifestDataFiles)
        );
    }
}
