use anyhow::{Context, Result};
use dirs::{config_dir, data_dir};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::modules::countries::Country;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub base_url: String,
    /// When set, challenge details are fetched from `<challenge_api>/api/Challenges/`
    /// instead of the local catalog.
    pub challenge_api: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { base_url: "http://localhost:3000".to_string(), challenge_api: None }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CtfConfig {
    pub show_flags_in_notifications: bool,
    pub show_country_details_in_notifications: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ChallengeConfig {
    pub key: String,
    pub name: String,
    pub description: String,
    pub country: Option<String>,
    pub coding_challenge: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ConfigFile {
    pub events_path: Option<PathBuf>,
    pub cookie_path: Option<PathBuf>,
    pub language_file: Option<PathBuf>,
    pub server: ServerConfig,
    pub ctf: CtfConfig,
    pub translations: BTreeMap<String, String>,
    pub country_mapping: BTreeMap<String, Country>,
    pub challenges: Vec<ChallengeConfig>,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub path: PathBuf,
    pub events_path: Option<PathBuf>,
    pub cookie_path: PathBuf,
    pub language_file: Option<PathBuf>,
    pub server: ServerConfig,
    pub ctf: CtfConfig,
    pub translations: BTreeMap<String, String>,
    pub country_mapping: BTreeMap<String, Country>,
    pub challenges: Vec<ChallengeConfig>,
}

impl Config {
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let path = match path {
            Some(p) => p,
            None => config_path()?,
        };
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            let default = ConfigFile::default();
            let toml = toml::to_string_pretty(&default)?;
            if let Some(parent) = path.parent() { fs::create_dir_all(parent)?; }
            fs::write(path, toml)?;
        }
        let content = fs::read_to_string(path).with_context(|| format!("Reading {:?}", path))?;
        let cfg: ConfigFile = toml::from_str(&content).with_context(|| "Parsing config TOML")?;
        let cookie_path = match cfg.cookie_path {
            Some(p) => p,
            None => default_data_path("cookies.json"),
        };
        Ok(Self {
            path: path.to_path_buf(),
            events_path: cfg.events_path,
            cookie_path,
            language_file: cfg.language_file,
            server: cfg.server,
            ctf: cfg.ctf,
            translations: cfg.translations,
            country_mapping: cfg.country_mapping,
            challenges: cfg.challenges,
        })
    }
}

fn config_path() -> Result<PathBuf> {
    let base = config_dir().context("Could not determine config directory")?;
    Ok(base.join("solvefeed").join("config.toml"))
}

pub fn default_data_path(file: &str) -> PathBuf {
    data_dir().unwrap_or_else(std::env::temp_dir).join("solvefeed").join(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_config_is_created_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config::load_from(&path).unwrap();

        assert!(path.exists());
        assert_eq!(config.server.base_url, "http://localhost:3000");
        assert!(config.server.challenge_api.is_none());
        assert!(!config.ctf.show_flags_in_notifications);
        assert!(config.challenges.is_empty());
    }

    #[test]
    fn test_parses_ctf_toggles_and_tables() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
events_path = "/tmp/events.jsonl"
cookie_path = "/tmp/cookies.json"

[ctf]
show_flags_in_notifications = true
show_country_details_in_notifications = true

[translations]
CHALLENGE_SOLVED = "Solved {{challenge}}"

[country_mapping.scoreBoardChallenge]
code = "CA"
name = "Canada"

[[challenges]]
key = "scoreBoardChallenge"
name = "Score Board"
description = "Find the score board."
country = "scoreBoardChallenge"
coding_challenge = true
"#,
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();

        assert!(config.ctf.show_flags_in_notifications);
        assert!(config.ctf.show_country_details_in_notifications);
        assert_eq!(config.events_path, Some(PathBuf::from("/tmp/events.jsonl")));
        assert_eq!(config.cookie_path, PathBuf::from("/tmp/cookies.json"));
        assert_eq!(config.translations["CHALLENGE_SOLVED"], "Solved {{challenge}}");
        assert_eq!(config.country_mapping["scoreBoardChallenge"].code, "CA");
        assert_eq!(config.challenges.len(), 1);
        assert!(config.challenges[0].coding_challenge);
    }
}
