// SPDX-FileCopyrightText: 2026 ragstream Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration system for ragstream.
//!
//! Strict TOML parsing (`deny_unknown_fields`), a system/user/local file
//! hierarchy, `RAGSTREAM_*` environment overrides, and miette diagnostics with
//! typo suggestions.
//!
//! ```no_run
//! use ragstream_config::load_and_validate;
//!
//! let config = load_and_validate().expect("config errors");
//! println!("backend: {}", config.backend.base_url);
//! ```

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

use std::path::Path;

pub use diagnostic::{ConfigError, render_errors};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::{AppConfig, BackendConfig, ChatConfig, DeliveryConfig, RagstreamConfig};

/// Load configuration from the file hierarchy and validate it.
pub fn load_and_validate() -> Result<RagstreamConfig, Vec<ConfigError>> {
    finish(loader::load_config(), collect_toml_sources)
}

/// Load configuration from one explicit file (plus env overrides) and validate it.
pub fn load_and_validate_path(path: &Path) -> Result<RagstreamConfig, Vec<ConfigError>> {
    finish(loader::load_config_from_path(path), || {
        read_source(path).into_iter().collect()
    })
}

/// Load configuration from a TOML string and validate it.
pub fn load_and_validate_str(toml_content: &str) -> Result<RagstreamConfig, Vec<ConfigError>> {
    finish(loader::load_config_from_str(toml_content), || {
        vec![("<inline>".to_string(), toml_content.to_string())]
    })
}

fn finish(
    loaded: Result<RagstreamConfig, figment::Error>,
    sources: impl FnOnce() -> Vec<diagnostic::TomlSource>,
) -> Result<RagstreamConfig, Vec<ConfigError>> {
    match loaded {
        Ok(config) => {
            validation::validate_config(&config)?;
            tracing::debug!(
                backend = %config.backend.base_url,
                flush_interval_ms = config.delivery.flush_interval_ms,
                "configuration loaded"
            );
            Ok(config)
        }
        Err(err) => Err(diagnostic::figment_to_config_errors(err, &sources())),
    }
}

/// Reads every existing file of the hierarchy for span resolution.
fn collect_toml_sources() -> Vec<diagnostic::TomlSource> {
    loader::config_file_candidates()
        .iter()
        .filter_map(|path| read_source(path))
        .collect()
}

fn read_source(path: &Path) -> Option<diagnostic::TomlSource> {
    let content = std::fs::read_to_string(path).ok()?;
    let display = if path.is_relative() {
        std::env::current_dir()
            .map(|dir| dir.join(path).display().to_string())
            .unwrap_or_else(|_| path.display().to_string())
    } else {
        path.display().to_string()
    };
    Some((display, content))
}
