use anyhow::{Context, Result};
use facekit::{DetectionNetwork, PrepareOptions};
use std::path::Path;

/// Prepare options resolved from an optional TOML file and `FACEKIT_*` environment variables.
///
/// Environment variables override the file; command-line flags are applied by the caller.
pub fn load(config_path: Option<&Path>) -> Result<PrepareOptions> {
    let base = match config_path {
        Some(path) => from_file(path)?,
        None => PrepareOptions::default(),
    };
    Ok(apply_env(base, |key| std::env::var(key).ok()))
}

fn from_file(path: &Path) -> Result<PrepareOptions> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading config {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
}

/// Overlay `FACEKIT_DETECTION_NETWORK` and `FACEKIT_MIN_CONFIDENCE` onto `options`.
///
/// Unparseable values are ignored with a warning.
fn apply_env(mut options: PrepareOptions, var: impl Fn(&str) -> Option<String>) -> PrepareOptions {
    if let Some(value) = var("FACEKIT_DETECTION_NETWORK") {
        match value.parse::<DetectionNetwork>() {
            Ok(network) => options.detection_network = network,
            Err(e) => tracing::warn!("ignoring FACEKIT_DETECTION_NETWORK: {e}"),
        }
    }
    options.min_confidence = env_f32(&var, "FACEKIT_MIN_CONFIDENCE", options.min_confidence);
    options
}

fn env_f32(var: &impl Fn(&str) -> Option<String>, key: &str, default: f32) -> f32 {
    match var(key) {
        Some(v) => v.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %v, "ignoring unparseable value");
            default
        }),
        None => default,
    }
}
