use crate::config::Config;
use log::LevelFilter;
use simplelog::{self, ConfigBuilder};

/// Wire-level crates: socket frames, HTTP codecs and SQL text. Silenced below Trace.
const WIRE_TARGETS: &[&str] = &["hyper", "h2", "tungstenite", "tokio_tungstenite", "sqlx"];

/// Framework crates whose request and connection chatter drowns out push and
/// bridge logs at Info and above. Still shown at Debug.
const FRAMEWORK_TARGETS: &[&str] = &["sea_orm", "tower", "tower_http", "axum", "redis", "tracing"];

pub struct Logger {}

impl Logger {
    pub fn init_logger(config: &Config) {
        simplelog::TermLogger::init(
            config.log_level_filter,
            Self::build_log_config(config.log_level_filter),
            simplelog::TerminalMode::Mixed,
            simplelog::ColorChoice::Auto,
        )
        .expect("Failed to start simplelog");
    }

    /// Dependency targets muted at `level`. The quieter the level, the more
    /// dependencies are muted; Trace shows everything.
    fn muted_targets(level: LevelFilter) -> Vec<&'static str> {
        match level {
            LevelFilter::Trace => Vec::new(),
            LevelFilter::Debug => WIRE_TARGETS.to_vec(),
            _ => WIRE_TARGETS
                .iter()
                .chain(FRAMEWORK_TARGETS)
                .copied()
                .collect(),
        }
    }

    fn build_log_config(level: LevelFilter) -> simplelog::Config {
        let mut builder = ConfigBuilder::new();
        builder.set_time_format_rfc3339();
        for target in Self::muted_targets(level) {
            builder.add_filter_ignore_str(target);
        }
        builder.build()
    }
}
