use flexi_logger::{
    colored_default_format, detailed_format, Cleanup, Criterion, Duplicate, FileSpec,
    FlexiLoggerError, Logger, LoggerHandle, Naming,
};

/// Start the global logger.
///
/// The level comes from `RUST_LOG` (fallback "info"). With a directory,
/// output goes to size-rotated files and warnings are mirrored to stderr.
pub fn setup_logging(log_dir: Option<&str>) -> Result<LoggerHandle, FlexiLoggerError> {
    let logger = Logger::try_with_env_or_str("info")?;

    match log_dir {
        Some(dir) => logger
            .log_to_file(FileSpec::default().directory(dir))
            .format(detailed_format)
            .duplicate_to_stderr(Duplicate::Warn)
            .rotate(
                Criterion::Size(10 * 1024 * 1024),
                Naming::Numbers,
                Cleanup::KeepLogFiles(7),
            )
            .start(),
        None => logger.format(colored_default_format).start(),
    }
}
