//! Daemon configuration.
//!
//! Everything has a sensible default, so the daemon runs with no config file
//! at all.  A YAML file can override any field; the `--listen-addr` CLI flag
//! overrides the file.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub commands: CommandConfig,
}

impl Config {
    /// Optional hard ceiling on a single external command's runtime.
    pub fn step_timeout(&self) -> Option<Duration> {
        self.commands.step_timeout_secs.map(Duration::from_secs)
    }
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Socket address for the HTTP listener.
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Seconds to wait for in-flight requests during graceful shutdown.
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            shutdown_grace_secs: default_shutdown_grace(),
        }
    }
}

fn default_listen() -> String {
    "0.0.0.0:5000".to_string()
}

fn default_shutdown_grace() -> u64 {
    30
}

// ---------------------------------------------------------------------------
// External commands
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct CommandConfig {
    /// Name or path of the git binary to shell out to.
    #[serde(default = "default_git_binary")]
    pub git_binary: String,
    /// Editor launched by `POST /openEditor`.
    #[serde(default = "default_editor")]
    pub editor: String,
    /// Optional per-command timeout in seconds.  Unset means a hung external
    /// process hangs its request's task, matching the original behaviour.
    #[serde(default)]
    pub step_timeout_secs: Option<u64>,
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            git_binary: default_git_binary(),
            editor: default_editor(),
            step_timeout_secs: None,
        }
    }
}

fn default_git_binary() -> String {
    "git".to_string()
}

fn default_editor() -> String {
    "code".to_string()
}

// ---------------------------------------------------------------------------
// Loader
// ---------------------------------------------------------------------------

/// Load a [`Config`] from a YAML file, or build one from defaults when no
/// path is given.
pub fn load_config(path: Option<&str>) -> Result<Config> {
    let config = match path {
        Some(path) => {
            let path = Path::new(path);
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config file: {}", path.display()))?;
            serde_yaml::from_str(&contents)
                .with_context(|| format!("failed to parse config file: {}", path.display()))?
        }
        None => Config::default(),
    };
    validate_config(&config)?;
    Ok(config)
}

/// Basic sanity checks that cannot be expressed purely with serde.
pub fn validate_config(config: &Config) -> Result<()> {
    anyhow::ensure!(
        config.server.listen.parse::<SocketAddr>().is_ok(),
        "listen must be a socket address (host:port), got {:?}",
        config.server.listen
    );
    anyhow::ensure!(
        config.server.shutdown_grace_secs > 0,
        "shutdown_grace_secs must be positive"
    );
    anyhow::ensure!(!config.commands.git_binary.is_empty(), "git_binary must not be empty");
    anyhow::ensure!(!config.commands.editor.is_empty(), "editor must not be empty");
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert_eq!(config.server.listen, "0.0.0.0:5000");
        assert_eq!(config.server.shutdown_grace_secs, 30);
        assert_eq!(config.commands.git_binary, "git");
        assert_eq!(config.commands.editor, "code");
        assert!(config.step_timeout().is_none());
        validate_config(&config).unwrap();
    }

    #[test]
    fn yaml_overrides_selected_fields() {
        let yaml = "\
server:
  listen: 127.0.0.1:8080
commands:
  editor: vim
  step_timeout_secs: 120
";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.server.listen, "127.0.0.1:8080");
        assert_eq!(config.server.shutdown_grace_secs, 30);
        assert_eq!(config.commands.editor, "vim");
        assert_eq!(config.step_timeout(), Some(Duration::from_secs(120)));
    }

    #[test]
    fn load_without_path_uses_defaults() {
        let config = load_config(None).unwrap();
        assert_eq!(config.server.listen, "0.0.0.0:5000");
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "server:\n  listen: 127.0.0.1:6000").unwrap();
        let config = load_config(file.path().to_str()).unwrap();
        assert_eq!(config.server.listen, "127.0.0.1:6000");
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(load_config(Some("/nonexistent/gitifyd.yaml")).is_err());
    }

    #[test]
    fn bad_listen_address_is_rejected() {
        let mut config = Config::default();
        config.server.listen = ":5000".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn zero_grace_is_rejected() {
        let mut config = Config::default();
        config.server.shutdown_grace_secs = 0;
        assert!(validate_config(&config).is_err());
    }
}
