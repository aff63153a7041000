use env_logger::{Builder, Env};
use log::LevelFilter;

/// Intercept messages using the `log` crate and print them to STDERR. `RUST_LOG` still overrides
/// the default level, so individual crates can be made noisier while debugging.
pub fn setup(default_level: LevelFilter) {
    let default = default_level.to_string().to_lowercase();
    // Tests and repeated calls may have installed a logger already; that's fine.
    let _ = Builder::from_env(Env::default().default_filter_or(default))
        .format_timestamp(None)
        .try_init();
}

/// Maps the level names used on the command line to a filter. Besides the `log` crate's own
/// names, WARNING and CRITICAL are accepted.
pub fn parse_level(name: &str) -> Option<LevelFilter> {
    match name.to_uppercase().as_ref() {
        "DEBUG" => Some(LevelFilter::Debug),
        "INFO" => Some(LevelFilter::Info),
        "WARN" | "WARNING" => Some(LevelFilter::Warn),
        "ERROR" | "CRITICAL" => Some(LevelFilter::Error),
        "TRACE" => Some(LevelFilter::Trace),
        "OFF" => Some(LevelFilter::Off),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_names() {
        assert_eq!(parse_level("warning"), Some(LevelFilter::Warn));
        assert_eq!(parse_level("CRITICAL"), Some(LevelFilter::Error));
        assert_eq!(parse_level("loud"), None);
    }
}
