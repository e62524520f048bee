//! Config loader (ported pattern from the daemon template's
//! `config/loader.rs`: `load`, `load_from_path`, `parse`, `validate`).

use std::path::{Path, PathBuf};

use irccd_util::{IrccdError, Result};

use super::schema::Config;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load from the default XDG config path.
    pub fn load() -> Result<Config> {
        let path = irccd_util::paths::config_file();
        Self::load_from_path(&path)
    }

    pub fn load_from_path(path: &Path) -> Result<Config> {
        let contents = std::fs::read_to_string(path).map_err(|e| IrccdError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config = Self::parse(&contents, path)?;
        Self::validate(&config, path)?;
        Ok(config)
    }

    pub fn parse(contents: &str, path: &Path) -> Result<Config> {
        toml::from_str(contents).map_err(|e| IrccdError::ConfigInvalid {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Reject the same boundary cases the command registry's
    /// `server-connect` validation rejects (spec §4.5), so config-sourced
    /// and command-sourced servers obey identical invariants.
    pub fn validate(config: &Config, path: &Path) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for server in &config.servers {
            if !crate::command::server::is_valid_identifier(&server.name) {
                return Err(IrccdError::ConfigInvalid {
                    path: path.to_path_buf(),
                    message: format!("invalid server identifier '{}'", server.name),
                });
            }
            if !seen.insert(server.name.clone()) {
                return Err(IrccdError::ConfigInvalid {
                    path: path.to_path_buf(),
                    message: format!("server '{}' already exists", server.name),
                });
            }
            if server.host.is_empty() {
                return Err(IrccdError::ConfigInvalid {
                    path: path.to_path_buf(),
                    message: format!("server '{}' has an empty host", server.name),
                });
            }
        }
        Ok(())
    }

    /// `load` variant that loads and validates in one call, same shape as
    /// the template's `load_and_validate` helper.
    pub fn load_and_validate() -> Result<Config> {
        Self::load()
    }
}

#[allow(dead_code)]
fn default_config_path() -> PathBuf {
    irccd_util::paths::config_file()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_a_minimal_config() {
        let toml = r#"
            [general]
            verbose = true

            [[servers]]
            name = "freenode"
            host = "irc.freenode.net"
        "#;
        let config = ConfigLoader::parse(toml, Path::new("test.toml")).unwrap();
        assert!(config.general.verbose);
        assert_eq!(config.servers.len(), 1);
        assert_eq!(config.servers[0].port, 6667);
    }

    #[test]
    fn validate_rejects_duplicate_server_names() {
        let toml = r#"
            [[servers]]
            name = "freenode"
            host = "a"

            [[servers]]
            name = "freenode"
            host = "b"
        "#;
        let config = ConfigLoader::parse(toml, Path::new("test.toml")).unwrap();
        assert!(ConfigLoader::validate(&config, Path::new("test.toml")).is_err());
    }

    #[test]
    fn validate_rejects_empty_host() {
        let toml = r#"
            [[servers]]
            name = "freenode"
            host = ""
        "#;
        let config = ConfigLoader::parse(toml, Path::new("test.toml")).unwrap();
        assert!(ConfigLoader::validate(&config, Path::new("test.toml")).is_err());
    }

    #[test]
    fn load_from_path_reads_a_real_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[general]\nverbose = false\n").unwrap();
        let config = ConfigLoader::load_from_path(file.path()).unwrap();
        assert!(!config.general.verbose);
    }
}
