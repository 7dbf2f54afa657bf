// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for the Deskrelay messaging core.
//!
//! Settings are grouped into the `[client]`, `[server]`, `[session]`,
//! `[reconnect]` and `[chat]` tables of `deskrelay.toml`. Unknown keys are
//! rejected and reported against the line that contains them.
//!
//! ```no_run
//! match deskrelay_config::load_and_validate() {
//!     Ok(config) => println!("realtime server: {}", config.server.socket_url),
//!     Err(errors) => deskrelay_config::render_errors(&errors),
//! }
//! ```

use std::path::{Path, PathBuf};

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

pub use diagnostic::{ConfigError, TomlSource, render_errors};
pub use loader::{config_files, load_config, load_config_from_path, load_config_from_str};
pub use model::DeskRelayConfig;

/// Load from the standard file locations plus the environment, then validate.
pub fn load_and_validate() -> Result<DeskRelayConfig, Vec<ConfigError>> {
    let files = loader::config_files();
    checked(loader::load_files(&files), || sources_from(&files))
}

/// Load from one file plus the environment, then validate.
pub fn load_and_validate_path(path: &Path) -> Result<DeskRelayConfig, Vec<ConfigError>> {
    let files = [path.to_path_buf()];
    checked(loader::load_files(&files), || sources_from(&files))
}

/// Load from a TOML string, then validate.
pub fn load_and_validate_str(toml_content: &str) -> Result<DeskRelayConfig, Vec<ConfigError>> {
    checked(loader::load_config_from_str(toml_content), || {
        vec![TomlSource::inline(toml_content)]
    })
}

/// Sources are only read back when extraction failed.
fn checked(
    loaded: Result<DeskRelayConfig, figment::Error>,
    sources: impl FnOnce() -> Vec<TomlSource>,
) -> Result<DeskRelayConfig, Vec<ConfigError>> {
    let config = loaded.map_err(|err| diagnostic::from_figment(err, &sources()))?;
    validation::validate_config(&config)?;
    Ok(config)
}

fn sources_from(files: &[PathBuf]) -> Vec<TomlSource> {
    files.iter().filter_map(|file| TomlSource::read(file)).collect()
}
