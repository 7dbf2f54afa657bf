// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered configuration sources.
//!
//! Later layers win: compiled defaults, then each file from [`config_files`]
//! that exists, then `DESKRELAY_<SECTION>_<KEY>` environment variables.

#![allow(clippy::result_large_err)] // figment::Error is returned as-is

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::{DeskRelayConfig, SECTIONS};

pub const ENV_PREFIX: &str = "DESKRELAY_";

/// Files consulted by [`load_config`], lowest precedence first.
pub fn config_files() -> Vec<PathBuf> {
    let mut files = vec![PathBuf::from("/etc/deskrelay/deskrelay.toml")];
    files.extend(dirs::config_dir().map(|dir| dir.join("deskrelay").join("deskrelay.toml")));
    files.push(PathBuf::from("deskrelay.toml"));
    files
}

/// Load from [`config_files`] with environment overrides.
pub fn load_config() -> Result<DeskRelayConfig, figment::Error> {
    load_files(&config_files())
}

/// Load from one explicit file with environment overrides.
pub fn load_config_from_path(path: &Path) -> Result<DeskRelayConfig, figment::Error> {
    load_files(&[path.to_path_buf()])
}

/// Load from `files` in order, then the environment. Missing files are skipped.
pub fn load_files(files: &[PathBuf]) -> Result<DeskRelayConfig, figment::Error> {
    files
        .iter()
        .fold(defaults(), |figment, file| figment.merge(Toml::file(file)))
        .merge(env_provider())
        .extract()
}

/// Load from a TOML string alone, without files or environment.
pub fn load_config_from_str(toml_content: &str) -> Result<DeskRelayConfig, figment::Error> {
    defaults().merge(Toml::string(toml_content)).extract()
}

fn defaults() -> Figment {
    Figment::from(Serialized::defaults(DeskRelayConfig::default()))
}

/// Only variables that name a known section are read, so unrelated
/// `DESKRELAY_*` variables do not fail the load.
fn env_provider() -> Env {
    Env::prefixed(ENV_PREFIX)
        .filter_map(|key| env_key(&key.as_str().to_ascii_lowercase()).map(Into::into))
}

/// `server_socket_url` -> `server.socket_url`. Keys contain underscores, so
/// the split happens at the section name rather than at every `_`.
fn env_key(var: &str) -> Option<String> {
    SECTIONS.iter().find_map(|(section, _)| {
        let field = var.strip_prefix(section)?.strip_prefix('_')?;
        (!field.is_empty()).then(|| format!("{section}.{field}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_vars_map_into_their_section() {
        assert_eq!(env_key("server_socket_url").as_deref(), Some("server.socket_url"));
        assert_eq!(env_key("reconnect_max_attempts").as_deref(), Some("reconnect.max_attempts"));
        assert_eq!(env_key("chat_file_dedup_window_ms").as_deref(), Some("chat.file_dedup_window_ms"));
        assert_eq!(env_key("session_token").as_deref(), Some("session.token"));
    }

    #[test]
    fn vars_outside_any_section_are_ignored() {
        assert_eq!(env_key("verbose"), None);
        assert_eq!(env_key("chat_"), None);
        assert_eq!(env_key("chatty_mode"), None);
    }

    #[test]
    fn user_file_sits_between_system_and_local() {
        let files = config_files();
        assert_eq!(files.first(), Some(&PathBuf::from("/etc/deskrelay/deskrelay.toml")));
        assert_eq!(files.last(), Some(&PathBuf::from("deskrelay.toml")));
    }

    #[test]
    fn later_files_and_env_win() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("base.toml", "[server]\nsocket_url = \"ws://base:4000\"\n[chat]\nevent_buffer = 8\n")?;
            jail.create_file("site.toml", "[server]\nsocket_url = \"ws://site:4000\"\n")?;
            jail.set_env("DESKRELAY_RECONNECT_MAX_ATTEMPTS", "9");
            jail.set_env("DESKRELAY_UNRELATED", "x");

            let config = load_files(&["base.toml".into(), "site.toml".into(), "absent.toml".into()])?;
            assert_eq!(config.server.socket_url, "ws://site:4000");
            assert_eq!(config.chat.event_buffer, 8);
            assert_eq!(config.reconnect.max_attempts, 9);
            Ok(())
        });
    }

    #[test]
    fn env_overrides_explicit_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("custom.toml", "[server]\nsocket_url = \"ws://from-file:4000\"\n")?;
            jail.set_env("DESKRELAY_SERVER_SOCKET_URL", "wss://from-env:443");

            let config = load_config_from_path(Path::new("custom.toml"))?;
            assert_eq!(config.server.socket_url, "wss://from-env:443");
            Ok(())
        });
    }
}
