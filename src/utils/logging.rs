use crate::config::LoggingSettings;
use anyhow::Context;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};
use std::env;
use std::fs;
use std::io;

/// Initialize logging with console output and an optional session log file
pub fn init_logging(settings: &LoggingSettings) -> anyhow::Result<()> {
    let log_level = env::var("RUST_LOG").unwrap_or_else(|_| settings.level.clone());
    let enable_backtrace = env::var("RUST_BACKTRACE").unwrap_or_else(|_| "0".to_string()) == "1";

    // Create environment filter
    let env_filter = EnvFilter::try_from_default_env().or_else(|_| {
        let filter = EnvFilter::try_new(&log_level)?;
        Ok::<_, tracing_subscriber::filter::ParseError>(filter.add_directive("slv_flexi=debug".parse()?))
    })
    .with_context(|| format!("invalid log filter '{}'", log_level))?;

    let console_layer = fmt::layer()
        .with_span_events(FmtSpan::CLOSE)
        .with_target(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(true);

    // Session-based file log, cleaned on startup
    let file_layer = match &settings.file {
        Some(path) => {
            if let Err(e) = fs::remove_file(path) {
                if e.kind() != io::ErrorKind::NotFound {
                    eprintln!("Warning: Failed to remove existing {}: {}", path.display(), e);
                }
            }
            let log_file = fs::File::create(path)
                .with_context(|| format!("failed to create log file {}", path.display()))?;
            Some(
                fmt::layer()
                    .with_writer(log_file)
                    .with_span_events(FmtSpan::CLOSE)
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_ansi(false)
                    .boxed(),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("a global tracing subscriber is already installed")?;

    std::panic::set_hook(Box::new(move |panic_info| {
        tracing::error!("Panic occurred: {}", panic_info);

        if let Some(location) = panic_info.location() {
            tracing::error!(
                "Panic location: {}:{}:{}",
                location.file(),
                location.line(),
                location.column()
            );
        }

        if enable_backtrace {
            tracing::error!("Backtrace:\n{:?}", std::backtrace::Backtrace::capture());
        }
    }));

    tracing::info!("Logging initialized with level: {}", log_level);
    if let Some(path) = &settings.file {
        tracing::info!("File logging enabled: {}", path.display());
    }
    tracing::info!("Backtrace enabled: {}", enable_backtrace);
    Ok(())
}

/// Log system information for debugging
pub fn log_system_info() {
    tracing::info!("=== System Information ===");
    tracing::info!("OS: {}", std::env::consts::OS);
    tracing::info!("Architecture: {}", std::env::consts::ARCH);
    tracing::info!("Version: {}", env!("CARGO_PKG_VERSION"));
    tracing::info!("==========================");
}
