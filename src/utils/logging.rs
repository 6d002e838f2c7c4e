use anyhow::Result;
use tracing_subscriber::{fmt, EnvFilter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use std::path::PathBuf;
use std::fs;
use std::sync::Mutex;

/// Initialize the logging system
///
/// Logs go to stderr so the per-job report lines on stdout stay clean.
pub fn init_logging(verbose: bool, log_file: Option<PathBuf>) -> Result<()> {
    // Create an environment filter
    let env_filter = if verbose {
        EnvFilter::from_default_env()
            .add_directive("harvester=debug".parse()?)
            .add_directive("warn".parse()?)
    } else {
        EnvFilter::from_default_env()
            .add_directive("harvester=info".parse()?)
            .add_directive("warn".parse()?)
    };

    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr);

    // If a log file is specified, create a file logger as well
    if let Some(log_file) = log_file {
        // Create parent directory if necessary
        if let Some(parent) = log_file.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = fs::File::create(log_file)?;
        let file_layer = fmt::layer()
            .with_target(true)
            .with_ansi(false)
            .with_writer(Mutex::new(file));

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .with(file_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .init();
    }

    Ok(())
}
