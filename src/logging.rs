use env_logger::Env;

pub const DEFAULT_FILTER: &str = "info";

/// Installs the process-wide logger. `RUST_LOG` overrides the default filter.
/// Calling it again is harmless.
pub fn init() {
    let _ = env_logger::Builder::from_env(Env::default().default_filter_or(DEFAULT_FILTER))
        .format_timestamp_millis()
        .try_init();
}
