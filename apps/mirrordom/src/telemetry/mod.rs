//! Logging for the `mirrordom` binary and everything it drives.

pub mod logging {
    use clap::ValueEnum;
    use std::fs::OpenOptions;
    use std::path::PathBuf;
    use std::sync::OnceLock;
    use tracing_appender::non_blocking::WorkerGuard;
    use tracing_subscriber::EnvFilter;

    /// Crates whose targets follow the requested level; everything else
    /// stays at info.
    const OWN_TARGETS: &[&str] = &["mirrordom_core", "mirrordom", "mirror_markup"];

    /// Logs one event per autoclosed element, so it only goes to trace on
    /// request.
    const PARSER_TARGET: &str = "mirror_markup::parser";

    #[derive(Clone, Copy, Debug, Default, ValueEnum, PartialEq, Eq, PartialOrd, Ord)]
    pub enum LogLevel {
        Error,
        #[default]
        Warn,
        Info,
        Debug,
        Trace,
    }

    impl LogLevel {
        pub fn as_str(self) -> &'static str {
            match self {
                LogLevel::Error => "error",
                LogLevel::Warn => "warn",
                LogLevel::Info => "info",
                LogLevel::Debug => "debug",
                LogLevel::Trace => "trace",
            }
        }
    }

    #[derive(Clone, Debug, Default)]
    pub struct LogConfig {
        pub level: LogLevel,
        pub file: Option<PathBuf>,
    }

    #[derive(thiserror::Error, Debug)]
    pub enum InitError {
        #[error("failed to open log file {path:?}: {source}")]
        Io {
            path: PathBuf,
            source: std::io::Error,
        },
        #[error("failed to install subscriber: {0}")]
        Install(String),
    }

    static GUARD: OnceLock<WorkerGuard> = OnceLock::new();

    /// Installs the global subscriber. Later calls are no-ops.
    ///
    /// `MIRRORDOM_LOG_FILTER` replaces the level-derived filter wholesale;
    /// `MIRRORDOM_TRACE_PARSER=1` lets parser events through at trace.
    pub fn init(config: &LogConfig) -> Result<(), InitError> {
        if GUARD.get().is_some() {
            return Ok(());
        }

        let (writer, guard) = match &config.file {
            Some(path) => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(|source| InitError::Io {
                        path: path.clone(),
                        source,
                    })?;
                tracing_appender::non_blocking(file)
            }
            None => tracing_appender::non_blocking(std::io::stderr()),
        };

        let directives = std::env::var("MIRRORDOM_LOG_FILTER")
            .unwrap_or_else(|_| filter_directives(config.level, parser_traces_requested()));
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::new(directives))
            .with_target(config.level >= LogLevel::Debug)
            .with_thread_ids(config.level >= LogLevel::Trace)
            .with_ansi(config.file.is_none())
            .with_writer(writer)
            .finish();
        tracing::subscriber::set_global_default(subscriber)
            .map_err(|err| InitError::Install(err.to_string()))?;

        let _ = GUARD.set(guard);
        tracing::debug!(level = config.level.as_str(), file = ?config.file, "logging ready");
        Ok(())
    }

    fn parser_traces_requested() -> bool {
        std::env::var("MIRRORDOM_TRACE_PARSER").is_ok_and(|v| v != "0" && !v.is_empty())
    }

    fn filter_directives(level: LogLevel, parser_traces: bool) -> String {
        if level <= LogLevel::Info {
            return level.as_str().to_string();
        }
        let mut directives = vec!["info".to_string()];
        directives.extend(
            OWN_TARGETS
                .iter()
                .map(|target| format!("{target}={}", level.as_str())),
        );
        if level == LogLevel::Trace && !parser_traces {
            directives.push(format!("{PARSER_TARGET}=debug"));
        }
        directives.join(",")
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn quiet_levels_apply_globally() {
            assert_eq!(filter_directives(LogLevel::Warn, false), "warn");
            assert_eq!(filter_directives(LogLevel::Error, true), "error");
            assert_eq!(filter_directives(LogLevel::Info, false), "info");
        }

        #[test]
        fn debug_targets_our_crates_only() {
            assert_eq!(
                filter_directives(LogLevel::Debug, false),
                "info,mirrordom_core=debug,mirrordom=debug,mirror_markup=debug"
            );
        }

        #[test]
        fn parser_events_need_opt_in_at_trace() {
            let quiet = filter_directives(LogLevel::Trace, false);
            assert!(quiet.contains("mirror_markup=trace"));
            assert!(quiet.ends_with(",mirror_markup::parser=debug"));

            let loud = filter_directives(LogLevel::Trace, true);
            assert!(!loud.contains(PARSER_TARGET));
            // Every directive must be accepted by the subscriber.
            let _ = EnvFilter::try_new(&quiet).unwrap();
            let _ = EnvFilter::try_new(&loud).unwrap();
        }

        #[test]
        fn levels_order_by_verbosity() {
            assert!(LogLevel::Trace > LogLevel::Debug);
            assert!(LogLevel::Warn > LogLevel::Error);
            assert_eq!(LogLevel::default().as_str(), "warn");
        }
    }
}
