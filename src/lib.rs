//! A deterministic 2D whisker-tracing image-analysis engine: given a
//! single dark-whiskers-on-bright-face image, locates each whisker-like
//! ridge and returns its traced centerline as a [`types::WhiskerSegment`].
//!
//! Entry point: build a [`config::Config`], construct a [`engine::Tracer`]
//! from it, then call [`engine::Tracer::find_segments`] once per frame.

pub mod config;
pub mod dedup;
pub mod detector;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod image;
pub mod offset_cache;
pub mod seed_field;
pub mod tracer;
pub mod trust;
pub mod types;
pub mod whiskers_io;

use std::path::Path;

use anyhow::Context;
use fern::colors::{Color, ColoredLevelConfig};

use config::Config;

/// Loads and validates a [`Config`] from a TOML file, for callers (a `main`,
/// a CLI) that want a single `anyhow::Result` rather than matching on
/// [`error::ConfigError`] themselves.
pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    Config::from_path(path).with_context(|| format!("loading configuration from {}", path.display()))
}

/// Configures a timestamped `fern` logger with an `Info` default level and
/// an optional file sink, mirroring the convenience wrapper callers expect
/// around their own `main`.
pub fn setup_logger(log_file: Option<&Path>) -> Result<(), fern::InitError> {
    let colors = ColoredLevelConfig::new().info(Color::Green).warn(Color::Yellow).error(Color::Red);

    let mut dispatch = fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "{}[{}][{}] {}",
                chrono::Local::now().format("[%Y-%m-%d %H:%M:%S]"),
                record.target(),
                colors.color(record.level()),
                message
            ))
        })
        .level(log::LevelFilter::Info)
        .chain(std::io::stdout());

    if let Some(path) = log_file {
        dispatch = dispatch.chain(fern::log_file(path)?);
    }

    dispatch.apply()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_config_wraps_missing_file_with_path_context() {
        let err = load_config(Path::new("/no/such/whisker-tracer-config.toml")).unwrap_err();
        assert!(format!("{err:#}").contains("no/such/whisker-tracer-config.toml"));
    }
}
