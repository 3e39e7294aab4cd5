// SPDX-FileCopyrightText: 2026 ragstream Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Semantic checks that serde attributes cannot express.
//!
//! All problems are collected; validation never stops at the first one.

use crate::diagnostic::ConfigError;
use crate::model::RagstreamConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration.
pub fn validate_config(config: &RagstreamConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let level = config.app.log_level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ConfigError::validation(
            "app.log_level",
            format!(
                "`{}` is not one of {}",
                config.app.log_level,
                LOG_LEVELS.join(", ")
            ),
        ));
    }

    let delivery = &config.delivery;
    if delivery.flush_interval_ms == 0 {
        errors.push(ConfigError::validation(
            "delivery.flush_interval_ms",
            "must be greater than 0",
        ));
    }
    if delivery.fallback_chunk_chars == 0 {
        errors.push(ConfigError::validation(
            "delivery.fallback_chunk_chars",
            "must be at least 1",
        ));
    }
    if !(delivery.scroll_threshold_px.is_finite() && delivery.scroll_threshold_px >= 0.0) {
        errors.push(ConfigError::validation(
            "delivery.scroll_threshold_px",
            format!("must be a non-negative number, got {}", delivery.scroll_threshold_px),
        ));
    }
    if !(delivery.bottom_tolerance_px.is_finite() && delivery.bottom_tolerance_px >= 0.0) {
        errors.push(ConfigError::validation(
            "delivery.bottom_tolerance_px",
            format!("must be a non-negative number, got {}", delivery.bottom_tolerance_px),
        ));
    } else if delivery.bottom_tolerance_px > delivery.scroll_threshold_px {
        errors.push(ConfigError::validation(
            "delivery.bottom_tolerance_px",
            "must not exceed delivery.scroll_threshold_px",
        ));
    }

    let backend = &config.backend;
    let base = backend.base_url.trim();
    if !(base.starts_with("http://") || base.starts_with("https://")) {
        errors.push(ConfigError::validation(
            "backend.base_url",
            format!("`{base}` must start with http:// or https://"),
        ));
    }
    for (key, path) in [
        ("backend.chat_path", &backend.chat_path),
        ("backend.stream_path", &backend.stream_path),
        ("backend.documents_path", &backend.documents_path),
    ] {
        if !path.starts_with('/') {
            errors.push(ConfigError::validation(key, format!("`{path}` must start with `/`")));
        }
    }
    if backend.request_timeout_secs == 0 {
        errors.push(ConfigError::validation(
            "backend.request_timeout_secs",
            "must be greater than 0",
        ));
    }
    if let Some(token) = &backend.api_token {
        if token.trim().is_empty() {
            errors.push(ConfigError::validation(
                "backend.api_token",
                "must not be blank when set",
            ));
        }
    }

    if config.chat.page_size == 0 {
        errors.push(ConfigError::validation("chat.page_size", "must be at least 1"));
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}
