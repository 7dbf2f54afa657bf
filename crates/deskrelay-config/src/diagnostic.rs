// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration diagnostics.
//!
//! Figment reports which key failed to deserialize but not where it sits in
//! the file. This module maps each failure back to the line of
//! `deskrelay.toml` that caused it, and suggests the key the user most likely
//! meant from the section map in [`crate::model::SECTIONS`].

#![allow(unused_assignments)] // emitted by miette's Diagnostic derive

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use figment::error::Kind;
use miette::{Diagnostic, GraphicalReportHandler, NamedSource, SourceSpan};
use thiserror::Error;

use crate::model::{SECTIONS, section_keys};

/// Jaro-Winkler score below which no suggestion is offered.
const MIN_SIMILARITY: f64 = 0.8;

/// Display name of configuration given as a string rather than a file.
pub const INLINE_SOURCE: &str = "<inline>";

/// A configuration problem, ready for graphical rendering.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("unknown key `{key}`{}", in_section(.section))]
    #[diagnostic(
        code(deskrelay::config::unknown_key),
        help("{}", unknown_key_help(suggestion.as_deref(), valid_keys))
    )]
    UnknownKey {
        key: String,
        /// Enclosing section; `None` for a top-level entry.
        section: Option<String>,
        /// Closest known key. Qualified as `section.key` when it lives elsewhere.
        suggestion: Option<String>,
        valid_keys: String,
        #[label("not a deskrelay setting")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    #[error("`{key}` has the wrong type: {detail}")]
    #[diagnostic(code(deskrelay::config::invalid_type))]
    InvalidType {
        key: String,
        detail: String,
        #[label("this value")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A value that parsed but is not acceptable.
    #[error("validation error: {message}")]
    #[diagnostic(code(deskrelay::config::validation))]
    Validation { message: String },

    #[error("configuration error: {0}")]
    #[diagnostic(code(deskrelay::config::other))]
    Other(String),
}

fn in_section(section: &Option<String>) -> String {
    section.as_ref().map(|s| format!(" in [{s}]")).unwrap_or_default()
}

fn unknown_key_help(suggestion: Option<&str>, valid_keys: &str) -> String {
    match suggestion {
        Some(s) => format!("did you mean `{s}`? accepted here: {valid_keys}"),
        None => format!("accepted here: {valid_keys}"),
    }
}

/// The text of one configuration layer, kept for span lookup.
#[derive(Debug, Clone)]
pub struct TomlSource {
    name: String,
    path: Option<PathBuf>,
    content: String,
}

impl TomlSource {
    /// Read a configuration file. `None` when it does not exist or cannot be read.
    pub fn read(path: &Path) -> Option<Self> {
        let content = std::fs::read_to_string(path).ok()?;
        Some(Self {
            name: path.display().to_string(),
            path: Some(path.to_path_buf()),
            content,
        })
    }

    /// Configuration passed as a string.
    pub fn inline(content: &str) -> Self {
        Self {
            name: INLINE_SOURCE.to_string(),
            path: None,
            content: content.to_string(),
        }
    }

    fn is_file(&self, path: &Path) -> bool {
        let Some(own) = &self.path else {
            return false;
        };
        own == path
            || matches!(
                (std::fs::canonicalize(own), std::fs::canonicalize(path)),
                (Ok(a), Ok(b)) if a == b
            )
    }

    fn named(&self) -> NamedSource<String> {
        NamedSource::new(&self.name, self.content.clone())
    }
}

/// Convert every failure in a figment error into a diagnostic.
pub fn from_figment(err: figment::Error, sources: &[TomlSource]) -> Vec<ConfigError> {
    err.into_iter().map(|e| convert(&e, sources)).collect()
}

fn convert(error: &figment::Error, sources: &[TomlSource]) -> ConfigError {
    let source = origin(error, sources);
    match &error.kind {
        Kind::UnknownField(key, expected) => {
            // The path names the table that holds the unknown key.
            let section = error.path.first().map(String::as_str);
            let valid: Vec<&str> = match section {
                None => SECTIONS.iter().map(|(name, _)| *name).collect(),
                Some(name) => section_keys(name).map_or_else(|| expected.to_vec(), <[_]>::to_vec),
            };
            let entry = source.and_then(|s| find_entry(&s.content, section, key));
            ConfigError::UnknownKey {
                key: key.clone(),
                section: section.map(str::to_string),
                suggestion: suggest(section, key),
                valid_keys: valid.join(", "),
                span: entry.map(|e| e.key),
                src: entry.and(source).map(TomlSource::named),
            }
        }
        Kind::InvalidType(actual, expected) | Kind::InvalidValue(actual, expected) => {
            let (section, field) = match error.path.as_slice() {
                [field] => (None, field.as_str()),
                [section, .., field] => (Some(section.as_str()), field.as_str()),
                [] => return ConfigError::Other(error.to_string()),
            };
            let entry = source.and_then(|s| find_entry(&s.content, section, field));
            ConfigError::InvalidType {
                key: error.path.join("."),
                detail: format!("found {actual}, expected {expected}"),
                span: entry.map(|e| e.value),
                src: entry.and(source).map(TomlSource::named),
            }
        }
        _ => ConfigError::Other(error.to_string()),
    }
}

/// The layer a figment error was read from, if it is one of `sources`.
fn origin<'a>(error: &figment::Error, sources: &'a [TomlSource]) -> Option<&'a TomlSource> {
    let metadata = error.metadata.as_ref()?;
    match &metadata.source {
        Some(figment::Source::File(path)) => sources.iter().find(|s| s.is_file(path)),
        // `Toml::string` layers carry a name but no source.
        None if metadata.name.ends_with("source string") => {
            sources.iter().find(|s| s.path.is_none())
        }
        _ => None,
    }
}

/// Suggest the key the user meant.
///
/// A key that exists verbatim in another section is offered as
/// `section.key`. Otherwise the closest key in the same section wins, then
/// the closest key elsewhere. Top-level typos are matched against section
/// names.
pub fn suggest(section: Option<&str>, key: &str) -> Option<String> {
    let Some(section) = section else {
        return closest(key, SECTIONS.iter().map(|(name, _)| *name)).map(str::to_string);
    };
    let elsewhere = move || {
        SECTIONS
            .iter()
            .filter(move |(name, _)| *name != section)
            .flat_map(|(name, keys)| keys.iter().map(move |k| (*name, *k)))
    };
    if let Some((name, k)) = elsewhere().find(|(_, k)| *k == key) {
        return Some(format!("{name}.{k}"));
    }
    if let Some(local) = section_keys(section).and_then(|keys| closest(key, keys.iter().copied())) {
        return Some(local.to_string());
    }
    elsewhere()
        .map(|(name, k)| (strsim::jaro_winkler(key, k), name, k))
        .filter(|(score, _, _)| *score >= MIN_SIMILARITY)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, name, k)| format!("{name}.{k}"))
}

fn closest<'a>(key: &str, candidates: impl Iterator<Item = &'a str>) -> Option<&'a str> {
    candidates
        .map(|c| (strsim::jaro_winkler(key, c), c))
        .filter(|(score, _)| *score >= MIN_SIMILARITY)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, c)| c)
}

/// Where an entry sits in a TOML document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Entry {
    key: SourceSpan,
    value: SourceSpan,
}

/// Locate `key` inside `[section]`, or at the top level when `section` is
/// `None`. A top-level name also matches a table header, so `[sever]`
/// can be pointed at.
fn find_entry(content: &str, section: Option<&str>, key: &str) -> Option<Entry> {
    let mut current: Option<&str> = None;
    let mut start = 0;
    for line in content.split_inclusive('\n') {
        let line_start = start;
        start += line.len();
        let trimmed = line.trim();
        if trimmed.starts_with('#') {
            continue;
        }

        if let Some(header) = trimmed.strip_prefix('[').and_then(|h| h.strip_suffix(']')) {
            let header = header.trim();
            if section.is_none() && header == key {
                let at = line_start + line.find(header)?;
                let span = SourceSpan::from((at, header.len()));
                return Some(Entry { key: span, value: span });
            }
            current = Some(header);
            continue;
        }
        if current != section {
            continue;
        }

        let Some((name, value)) = line.split_once('=') else {
            continue;
        };
        let name_text = name.trim();
        if name_text.trim_matches('"') != key {
            continue;
        }
        let value_text = value.trim();
        let value_at = line_start + name.len() + 1 + (value.len() - value.trim_start().len());
        return Some(Entry {
            key: SourceSpan::from((line_start + line.find(name_text)?, name_text.len())),
            value: SourceSpan::from((value_at, value_text.len())),
        });
    }
    None
}

/// Render diagnostics the way the CLI prints them.
pub fn render(errors: &[ConfigError]) -> String {
    let handler = GraphicalReportHandler::new();
    let mut out = String::new();
    let _ = writeln!(
        out,
        "deskrelay: {} configuration problem{}",
        errors.len(),
        if errors.len() == 1 { "" } else { "s" }
    );
    for error in errors {
        if handler.render_report(&mut out, error).is_err() {
            let _ = writeln!(out, "error: {error}");
        }
    }
    out
}

/// Print diagnostics to stderr.
pub fn render_errors(errors: &[ConfigError]) {
    eprint!("{}", render(errors));
}
