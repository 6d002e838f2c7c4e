use anyhow::{Result, Context};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::cli::config::{HarvestOverrides, HarvesterConfig};
use crate::harvest::{Dispatcher, IndexRange, Pipeline, PipelineSettings, Report};
use crate::identity::Identities;
use crate::utils::{Metrics, MetricsCollector};

/// Download the images of a range of indices
pub async fn harvest(config_path: Option<PathBuf>, overrides: HarvestOverrides, summary_json: Option<PathBuf>) -> Result<()> {
    let mut config = match &config_path {
        Some(path) => HarvesterConfig::load_from_file(path)?,
        None => HarvesterConfig::load_default()?,
    };

    // Command line values win over the file
    overrides.apply(&mut config);
    config.validate()?;

    let range = IndexRange::new(config.harvest.index_starting, config.harvest.index_final)?;

    tokio::fs::create_dir_all(&config.storage.images)
        .await
        .context(format!("Failed to create images directory: {}", config.storage.images.display()))?;

    let identities = Arc::new(Identities::load(&config.identity)?);
    let pipeline = Arc::new(Pipeline::new(identities, PipelineSettings::from(&config))?);
    let dispatcher = Dispatcher::new(pipeline, config.harvest.worker_count)?;

    let mut results = dispatcher.dispatch(range);
    let mut metrics = MetricsCollector::new();
    info!("Waiting for {} results", results.total());

    while let Some(report) = results.next().await {
        println!("{}", report_line(&report));
        metrics.record(&report.result);
    }

    let summary = metrics.snapshot();
    print_summary(&summary);

    if let Some(path) = summary_json {
        let contents = serde_json::to_string_pretty(&summary)
            .context("Failed to serialize run summary")?;
        tokio::fs::write(&path, contents)
            .await
            .context(format!("Failed to write run summary: {}", path.display()))?;
        info!("Run summary written to: {}", path.display());
    }

    Ok(())
}

/// One console line per finished job
pub fn report_line(report: &Report) -> String {
    let job = &report.result.job;
    let error = report.result.error
        .as_ref()
        .map(|e| format!(" [ERROR] {}", e))
        .unwrap_or_default();

    format!(
        "({} of {}, index: {}, status: {}) {}{}",
        report.position,
        report.total,
        job.index,
        job.status.code(),
        job.status,
        error
    )
}

fn print_summary(summary: &Metrics) {
    println!(
        "Processed {} indices in {:.1}s: {} downloaded, {} skipped, {} failed",
        summary.processed,
        summary.elapsed_ms as f64 / 1000.0,
        summary.downloaded,
        summary.skipped,
        summary.errors
    );

    for (status, count) in &summary.by_status {
        println!("  {:<20} {}", status, count);
    }
}

/// Show the effective configuration
pub async fn show_config(path: Option<PathBuf>) -> Result<()> {
    let (path, config) = match path {
        Some(path) => {
            let config = HarvesterConfig::load_from_file(&path)?;
            (path, config)
        },
        None => (HarvesterConfig::default_path(), HarvesterConfig::load_default()?),
    };

    println!("Configuration ({}):", path.display());
    println!("{:#?}", config);

    Ok(())
}

/// Write the built-in defaults to the configuration file
pub async fn init_config(path: Option<PathBuf>) -> Result<()> {
    let path = path.unwrap_or_else(HarvesterConfig::default_path);

    HarvesterConfig::default().save_to_file(&path)?;
    println!("Created default configuration: {}", path.display());

    Ok(())
}
