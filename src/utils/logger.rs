use log::LevelFilter;

/// Maps a configured level name to a filter. Unknown names turn logging off.
pub fn level_filter(log_level: &str) -> LevelFilter {
    match log_level {
        "debug" => LevelFilter::Debug,
        "info" => LevelFilter::Info,
        "warn" => LevelFilter::Warn,
        "error" => LevelFilter::Error,
        _ => LevelFilter::Off,
    }
}

/// Starts `env_logger` at the configured level. Module filters in `RUST_LOG` still apply.
pub fn setup_logger(log_level: &str) {
    let result = env_logger::Builder::from_default_env()
        .filter_level(level_filter(log_level))
        .format_timestamp(None)
        .try_init();
    if result.is_err() {
        log::debug!("Logger already initialized");
    }
}
