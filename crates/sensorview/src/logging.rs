use clap::ValueEnum;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::prelude::*;

/// Log target prefix shared by every sensorview crate.
const OWN_TARGETS: &str = "sensorview";

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_filter(self) -> LevelFilter {
        match self {
            LogLevel::Off => LevelFilter::OFF,
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

/// Install the stderr subscriber.
///
/// `level` applies to sensorview's own crates. Dependencies never log above
/// `warn`, so `--log-level trace` stays readable.
pub fn init_logging(format: LogFormat, level: LogLevel) {
    let level = level.as_filter();
    let filter = Targets::new()
        .with_default(level.min(LevelFilter::WARN))
        .with_target(OWN_TARGETS, level);
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(false)
        .with_thread_names(true);
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Text => {
            let _ = registry.with(layer).try_init();
        }
        LogFormat::Json => {
            let _ = registry.with(layer.json()).try_init();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dependency_level_is_capped() {
        assert_eq!(
            LogLevel::Trace.as_filter().min(LevelFilter::WARN),
            LevelFilter::WARN
        );
        assert_eq!(
            LogLevel::Error.as_filter().min(LevelFilter::WARN),
            LevelFilter::ERROR
        );
        assert_eq!(
            LogLevel::Off.as_filter().min(LevelFilter::WARN),
            LevelFilter::OFF
        );
    }
}
