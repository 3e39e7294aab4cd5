// SPDX-FileCopyrightText: 2026 ragstream Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Lookup order: `/etc/ragstream/ragstream.toml`, then
//! `~/.config/ragstream/ragstream.toml`, then `./ragstream.toml`, with
//! `RAGSTREAM_*` environment variables applied last.

#![allow(clippy::result_large_err)] // figment::Error is external

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::RagstreamConfig;

/// Config file name searched in every directory of the hierarchy.
pub const CONFIG_FILE_NAME: &str = "ragstream.toml";

/// Config sections recognized by the environment mapping.
const ENV_SECTIONS: &[&str] = &["app", "delivery", "backend", "chat"];

/// Candidate config files, lowest precedence first.
pub fn config_file_candidates() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("/etc/ragstream").join(CONFIG_FILE_NAME)];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("ragstream").join(CONFIG_FILE_NAME));
    }
    paths.push(PathBuf::from(CONFIG_FILE_NAME));
    paths
}

/// Build the Figment for the full hierarchy without extracting it.
pub fn build_figment() -> Figment {
    config_file_candidates()
        .into_iter()
        .fold(
            Figment::new().merge(Serialized::defaults(RagstreamConfig::default())),
            |figment, path| figment.merge(Toml::file(path)),
        )
        .merge(env_provider())
}

/// Load configuration from the standard hierarchy with env var overrides.
pub fn load_config() -> Result<RagstreamConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string on top of the defaults (no files, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<RagstreamConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(RagstreamConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from one explicit file with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<RagstreamConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(RagstreamConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Environment provider mapping `RAGSTREAM_<SECTION>_<KEY>` to `section.key`.
///
/// Only the first underscore after a known section name becomes a dot, so
/// `RAGSTREAM_BACKEND_API_TOKEN` maps to `backend.api_token`.
fn env_provider() -> Env {
    Env::prefixed("RAGSTREAM_").map(|key| map_env_key(key.as_str()).into())
}

/// Maps a prefix-stripped env key to its dotted config path.
pub fn map_env_key(key: &str) -> String {
    let key = key.to_ascii_lowercase();
    ENV_SECTIONS
        .iter()
        .find_map(|section| {
            key.strip_prefix(section)
                .and_then(|rest| rest.strip_prefix('_'))
                .map(|rest| format!("{section}.{rest}"))
        })
        .unwrap_or(key)
}
