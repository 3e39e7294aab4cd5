// SPDX-FileCopyrightText: 2026 ragstream Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Config error diagnostics rendered through miette.
//!
//! Figment errors are mapped onto [`ConfigError`] variants. Unknown keys get a
//! source span pointing at the offending line and a Jaro-Winkler based
//! "did you mean?" hint.

#![allow(unused_assignments)] // miette's Diagnostic derive generates code triggering this lint

use figment::error::Kind;
use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Similarity a valid key must exceed before it is offered as a correction.
const SUGGESTION_THRESHOLD: f64 = 0.75;

/// A TOML source as `(display path, content)`.
pub type TomlSource = (String, String);

/// A configuration problem, rendered by [`render_errors`].
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("unknown configuration key `{key}`")]
    #[diagnostic(
        code(ragstream::config::unknown_key),
        help("{}", unknown_key_help(suggestion.as_deref(), valid_keys))
    )]
    UnknownKey {
        key: String,
        suggestion: Option<String>,
        valid_keys: String,
        #[label("not a ragstream setting")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    #[error("invalid type for key `{key}`: {detail}")]
    #[diagnostic(code(ragstream::config::invalid_type), help("expected {expected}"))]
    InvalidType {
        key: String,
        detail: String,
        expected: String,
    },

    #[error("missing required key `{key}`")]
    #[diagnostic(
        code(ragstream::config::missing_key),
        help("add `{key} = <value>` to ragstream.toml")
    )]
    MissingKey { key: String },

    /// A value parsed but is outside its allowed range.
    #[error("invalid value for `{key}`: {message}")]
    #[diagnostic(code(ragstream::config::validation))]
    Validation { key: String, message: String },

    #[error("configuration error: {0}")]
    #[diagnostic(code(ragstream::config::other))]
    Other(String),
}

impl ConfigError {
    pub(crate) fn validation(key: &str, message: impl Into<String>) -> Self {
        Self::Validation {
            key: key.to_string(),
            message: message.into(),
        }
    }

    /// Dotted key this error is about, when there is one.
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::UnknownKey { key, .. }
            | Self::InvalidType { key, .. }
            | Self::MissingKey { key }
            | Self::Validation { key, .. } => Some(key),
            Self::Other(_) => None,
        }
    }
}

fn unknown_key_help(suggestion: Option<&str>, valid_keys: &str) -> String {
    match suggestion {
        Some(s) => format!("did you mean `{s}`? Valid keys: {valid_keys}"),
        None => format!("valid keys: {valid_keys}"),
    }
}

/// Expands a figment error (which may hold several) into diagnostics.
pub fn figment_to_config_errors(err: figment::Error, sources: &[TomlSource]) -> Vec<ConfigError> {
    err.into_iter()
        .map(|error| {
            let path: Vec<String> = error.path.clone();
            match &error.kind {
                Kind::UnknownField(field, expected) => {
                    let (span, src) = locate(&error, &path, field, sources);
                    ConfigError::UnknownKey {
                        key: field.clone(),
                        suggestion: suggest_key(field, expected),
                        valid_keys: expected.join(", "),
                        span,
                        src,
                    }
                }
                Kind::MissingField(field) => ConfigError::MissingKey {
                    key: dotted(&path, field),
                },
                Kind::InvalidType(actual, expected) => ConfigError::InvalidType {
                    key: path.join("."),
                    detail: format!("found {actual}, expected {expected}"),
                    expected: expected.clone(),
                },
                _ => ConfigError::Other(error.to_string()),
            }
        })
        .collect()
}

fn dotted(path: &[String], field: &str) -> String {
    path.iter()
        .map(String::as_str)
        .chain(std::iter::once(field))
        .collect::<Vec<_>>()
        .join(".")
}

/// Resolves the file an error came from and the span of `field` inside it.
fn locate(
    error: &figment::Error,
    path: &[String],
    field: &str,
    sources: &[TomlSource],
) -> (Option<SourceSpan>, Option<NamedSource<String>>) {
    let origin = match error.metadata.as_ref().and_then(|m| m.source.as_ref()) {
        Some(figment::Source::File(file)) => Some(file.display().to_string()),
        _ => None,
    };

    let by_origin = origin.and_then(|origin| sources.iter().find(|(name, _)| *name == origin));
    // Inline strings carry no file path; a lone source is unambiguous.
    let source = by_origin.or(match sources {
        [only] => Some(only),
        _ => None,
    });

    source
        .and_then(|(name, content)| {
            find_key_offset(content, path, field).map(|offset| {
                (
                    Some(SourceSpan::new(offset.into(), field.len())),
                    Some(NamedSource::new(name, content.clone())),
                )
            })
        })
        .unwrap_or((None, None))
}

/// Byte offset of `field` declared under the `[path[0]]` table of `content`.
///
/// Top-level keys (empty `path`) are searched from the start of the file.
pub fn find_key_offset(content: &str, path: &[String], field: &str) -> Option<usize> {
    let start = match path.first() {
        None => 0,
        Some(section) => {
            let header = format!("[{section}]");
            content.find(&header)? + header.len()
        }
    };

    let mut offset = start;
    for line in content[start..].split_inclusive('\n') {
        let body = line.trim_start();
        if body.starts_with('[') && offset != start {
            // Reached the next table.
            return None;
        }
        let declares = body
            .strip_prefix(field)
            .map(|rest| rest.trim_start().starts_with('='))
            .unwrap_or(false);
        if declares {
            return Some(offset + (line.len() - body.len()));
        }
        offset += line.len();
    }
    None
}

/// Closest valid key by Jaro-Winkler similarity, if any clears the threshold.
pub fn suggest_key(unknown: &str, valid_keys: &[&str]) -> Option<String> {
    valid_keys
        .iter()
        .map(|key| (strsim::jaro_winkler(unknown, key), *key))
        .filter(|(score, _)| *score > SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, key)| key.to_string())
}

/// Prints every error to stderr through miette's graphical report handler.
pub fn render_errors(errors: &[ConfigError]) {
    let handler = miette::GraphicalReportHandler::new();
    for error in errors {
        let mut out = String::new();
        match handler.render_report(&mut out, error as &dyn Diagnostic) {
            Ok(()) => eprint!("{out}"),
            Err(_) => eprintln!("Error: {error}"),
        }
    }
}
