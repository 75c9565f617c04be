//! Configuration file management for expresslearn.
//!
//! Provides a TOML-based config file at `~/.config/expresslearn/config.toml`
//! and a resolution chain: CLI flag > env var > config file > default.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use learn_core::llm::{LlmConfig, ProviderKind};
use learn_db::config::DbConfig;

pub const PROVIDER_ENV: &str = "AI_PROVIDER";
pub const OPENAI_KEY_ENV: &str = "OPENAI_API_KEY";
pub const GOOGLE_KEY_ENV: &str = "GOOGLE_AI_API_KEY";
pub const MODEL_ENV: &str = "EXPRESSLEARN_MODEL";

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    pub database: DatabaseSection,
    #[serde(default)]
    pub llm: LlmSection,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct DatabaseSection {
    pub url: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct LlmSection {
    /// `openai` or `gemini`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// OpenAI key used for illustrations when the text provider is Gemini.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_api_key: Option<String>,
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the expresslearn config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/expresslearn` or
/// `~/.config/expresslearn`, also on macOS.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("expresslearn");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("expresslearn")
}

pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse the config file. Returns an error if it does not exist.
pub fn load_config() -> Result<ConfigFile> {
    let path = config_path();
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    toml::from_str(&contents).context("failed to parse config file")
}

/// Serialize and write the config file, creating parent dirs as needed.
/// The file holds API keys, so it is written 0600 on Unix.
pub fn save_config(config: &ConfigFile) -> Result<()> {
    let path = config_path();
    let dir = config_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create config directory {}", dir.display()))?;

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(&path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(&path, perms)
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(())
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// LLM values supplied on the command line.
#[derive(Debug, Default, Clone)]
pub struct LlmOverrides {
    pub provider: Option<String>,
    pub model: Option<String>,
}

fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Fully resolved configuration, ready for use.
#[derive(Debug)]
pub struct AppConfig {
    pub db_config: DbConfig,
    llm_file: LlmSection,
    overrides: LlmOverrides,
}

impl AppConfig {
    /// Resolve the database URL: `cli_db_url` > `EXPRESSLEARN_DATABASE_URL`
    /// > `config_file.database.url` > `DbConfig::DEFAULT_URL`.
    ///
    /// LLM settings are resolved lazily by [`AppConfig::llm_config`] so
    /// commands that never call a model do not need a key.
    pub fn resolve(cli_db_url: Option<&str>, overrides: LlmOverrides) -> Self {
        let file_config = load_config().ok();

        let db_url = if let Some(url) = cli_db_url {
            url.to_owned()
        } else if let Some(url) = env_non_empty(DbConfig::ENV_VAR) {
            url
        } else if let Some(cfg) = file_config.as_ref().filter(|c| !c.database.url.is_empty()) {
            cfg.database.url.clone()
        } else {
            DbConfig::DEFAULT_URL.to_owned()
        };

        Self {
            db_config: DbConfig::new(db_url),
            llm_file: file_config.map(|c| c.llm).unwrap_or_default(),
            overrides,
        }
    }

    /// Resolve the model provider, model name and keys.
    ///
    /// - provider: `--provider` > `AI_PROVIDER` > `[llm].provider` > openai
    /// - api key: `OPENAI_API_KEY` or `GOOGLE_AI_API_KEY` (per provider) >
    ///   `[llm].api_key` > error
    /// - model: `--model` > `EXPRESSLEARN_MODEL` > `[llm].model` > provider default
    pub fn llm_config(&self) -> Result<LlmConfig> {
        let provider_raw = self
            .overrides
            .provider
            .clone()
            .or_else(|| env_non_empty(PROVIDER_ENV))
            .or_else(|| self.llm_file.provider.clone())
            .unwrap_or_default();
        let provider: ProviderKind = provider_raw
            .parse()
            .map_err(|e| anyhow::anyhow!("{e}"))?;

        let key_env = match provider {
            ProviderKind::OpenAi => OPENAI_KEY_ENV,
            ProviderKind::Gemini => GOOGLE_KEY_ENV,
        };
        let Some(api_key) = env_non_empty(key_env).or_else(|| self.llm_file.api_key.clone()) else {
            bail!(
                "no API key for {provider}; set {key_env} or run `expresslearn init --api-key ...`"
            );
        };

        let model = self
            .overrides
            .model
            .clone()
            .or_else(|| env_non_empty(MODEL_ENV))
            .or_else(|| self.llm_file.model.clone());

        let image_api_key = match provider {
            ProviderKind::OpenAi => None,
            ProviderKind::Gemini => env_non_empty(OPENAI_KEY_ENV)
                .or_else(|| self.llm_file.image_api_key.clone()),
        };

        Ok(LlmConfig {
            provider,
            api_key,
            model,
            endpoint: self.llm_file.endpoint.clone(),
            image_api_key,
        })
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{EnvGuard, lock_env};

    const VARS: &[&str] = &[
        DbConfig::ENV_VAR,
        PROVIDER_ENV,
        OPENAI_KEY_ENV,
        GOOGLE_KEY_ENV,
        MODEL_ENV,
        "XDG_CONFIG_HOME",
    ];

    #[test]
    fn save_and_load_config_roundtrip() {
        let _lock = lock_env();
        let tmp = tempfile::TempDir::new().unwrap();
        let _env = EnvGuard::capture(VARS);
        unsafe { std::env::set_var("XDG_CONFIG_HOME", tmp.path()) };

        let original = ConfigFile {
            database: DatabaseSection {
                url: "postgresql://testhost:5432/testdb".to_owned(),
            },
            llm: LlmSection {
                provider: Some("gemini".to_owned()),
                api_key: Some("g-key".to_owned()),
                ..LlmSection::default()
            },
        };
        save_config(&original).unwrap();

        let loaded = load_config().unwrap();
        assert_eq!(loaded.database.url, original.database.url);
        assert_eq!(loaded.llm.provider.as_deref(), Some("gemini"));
        assert!(loaded.llm.model.is_none());
        assert!(config_path().starts_with(tmp.path()));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let meta = std::fs::metadata(config_path()).unwrap();
            assert_eq!(meta.permissions().mode() & 0o777, 0o600);
        }
    }

    #[test]
    fn cli_flag_beats_env_for_database_url() {
        let _lock = lock_env();
        let _env = EnvGuard::capture(VARS);
        unsafe { std::env::set_var(DbConfig::ENV_VAR, "postgresql://env:5432/envdb") };

        let config = AppConfig::resolve(Some("postgresql://cli:5432/clidb"), LlmOverrides::default());
        assert_eq!(config.db_config.database_url, "postgresql://cli:5432/clidb");

        let config = AppConfig::resolve(None, LlmOverrides::default());
        assert_eq!(config.db_config.database_url, "postgresql://env:5432/envdb");
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let _lock = lock_env();
        let tmp = tempfile::TempDir::new().unwrap();
        let _env = EnvGuard::capture(VARS);
        unsafe { std::env::set_var("XDG_CONFIG_HOME", tmp.path()) };

        let config = AppConfig::resolve(None, LlmOverrides::default());
        assert_eq!(config.db_config.database_url, DbConfig::DEFAULT_URL);

        let err = config.llm_config().unwrap_err().to_string();
        assert!(err.contains(OPENAI_KEY_ENV), "unexpected error: {err}");
    }

    #[test]
    fn provider_selects_its_own_key() {
        let _lock = lock_env();
        let tmp = tempfile::TempDir::new().unwrap();
        let _env = EnvGuard::capture(VARS);
        unsafe {
            std::env::set_var("XDG_CONFIG_HOME", tmp.path());
            std::env::set_var(PROVIDER_ENV, "gemini");
            std::env::set_var(OPENAI_KEY_ENV, "sk-openai");
            std::env::set_var(GOOGLE_KEY_ENV, "g-google");
            std::env::set_var(MODEL_ENV, "gemini-2.5-pro");
        }

        let llm = AppConfig::resolve(None, LlmOverrides::default())
            .llm_config()
            .unwrap();
        assert_eq!(llm.provider, ProviderKind::Gemini);
        assert_eq!(llm.api_key, "g-google");
        assert_eq!(llm.model.as_deref(), Some("gemini-2.5-pro"));
        assert_eq!(llm.image_api_key.as_deref(), Some("sk-openai"));

        let overrides = LlmOverrides {
            provider: Some("openai".to_owned()),
            model: Some("gpt-4o-mini".to_owned()),
        };
        let llm = AppConfig::resolve(None, overrides).llm_config().unwrap();
        assert_eq!(llm.provider, ProviderKind::OpenAi);
        assert_eq!(llm.api_key, "sk-openai");
        assert_eq!(llm.model.as_deref(), Some("gpt-4o-mini"));
        assert!(llm.image_api_key.is_none());
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let _lock = lock_env();
        let _env = EnvGuard::capture(VARS);
        unsafe { std::env::set_var(PROVIDER_ENV, "anthropomorphic") };

        assert!(
            AppConfig::resolve(None, LlmOverrides::default())
                .llm_config()
                .is_err()
        );
    }

    #[test]
    fn config_path_ends_with_expected_filename() {
        let path = config_path();
        assert!(
            path.ends_with("expresslearn/config.toml"),
            "unexpected config path: {}",
            path.display()
        );
    }
}
