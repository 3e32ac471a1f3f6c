// ABOUTME: Run configuration with precedence chain
// ABOUTME: CLI flag → environment → YAML config file → built-in defaults

use crate::api::{ApiClient, RetryPolicy, DEFAULT_API_BASE};
use crate::cancel::CancelToken;
use crate::ratelimit::MIN_RATE;
use crate::cli::Cli;
use crate::storage::Paths;
use crate::sync::SyncOptions;
use crate::{Error, Result};
use serde::Deserialize;
use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE_NAME: &str = ".notion-sync.yaml";
pub const DEFAULT_CONCURRENCY: usize = 4;
pub const DEFAULT_RATE_LIMIT: (f64, u32) = (3.0, 3);

/// Non-secret settings read from the YAML config file. The token is never
/// accepted here, so an unknown `token` key is a configuration error.
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub root_page: Option<String>,
    pub api_base: Option<String>,
    pub concurrency: Option<usize>,
    pub rate_limit: Option<f64>,
    pub burst: Option<u32>,
    pub max_attempts: Option<u32>,
    pub timeout_secs: Option<u64>,
}

impl FileConfig {
    /// Load `path`; a missing file is an empty config unless it was named explicitly.
    pub fn load(path: &Path, required: bool) -> Result<FileConfig> {
        if !path.exists() {
            if required {
                return Err(Error::Config(format!(
                    "config file {} does not exist",
                    path.display()
                )));
            }
            return Ok(FileConfig::default());
        }
        let content = fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(FileConfig::default());
        }
        serde_yaml::from_str(&content)
            .map_err(|e| Error::Config(format!("invalid config file {}: {}", path.display(), e)))
    }
}

pub struct Config {
    pub token: Option<String>,
    pub root_page_id: Option<String>,
    pub api_base: String,
    pub output_dir: PathBuf,
    pub concurrency: usize,
    /// `None` disables request pacing.
    pub rate_limit: Option<(f64, u32)>,
    pub retry: RetryPolicy,
    pub timeout: Option<Duration>,
    pub force: bool,
    pub dry_run: bool,
    pub push: bool,
    pub debug: bool,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("root_page_id", &self.root_page_id)
            .field("api_base", &self.api_base)
            .field("output_dir", &self.output_dir)
            .field("concurrency", &self.concurrency)
            .field("rate_limit", &self.rate_limit)
            .field("retry", &self.retry)
            .field("timeout", &self.timeout)
            .field("force", &self.force)
            .field("dry_run", &self.dry_run)
            .field("push", &self.push)
            .field("debug", &self.debug)
            .finish()
    }
}

impl Config {
    pub fn resolve(cli: &Cli) -> Result<Config> {
        Self::resolve_with(cli, |key| env::var(key).ok())
    }

    /// Resolve with an injectable environment lookup. Empty values count as unset.
    pub fn resolve_with(cli: &Cli, lookup: impl Fn(&str) -> Option<String>) -> Result<Config> {
        let env = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let output_dir = cli
            .output_dir
            .clone()
            .or_else(|| env("SYNC_OUTPUT_DIR").map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("."));

        let file = match &cli.config {
            Some(path) => FileConfig::load(path, true)?,
            None => FileConfig::load(&output_dir.join(CONFIG_FILE_NAME), false)?,
        };

        let concurrency = cli
            .concurrency
            .or(file.concurrency)
            .unwrap_or(DEFAULT_CONCURRENCY);
        if concurrency == 0 {
            return Err(Error::Config("concurrency must be at least 1".into()));
        }

        let rate_limit = if cli.no_throttle {
            None
        } else if let Some(rate) = cli.rate_limit {
            Some(rate)
        } else {
            match (file.rate_limit, file.burst) {
                (Some(rate), _) if !(rate >= MIN_RATE && rate.is_finite()) => {
                    return Err(Error::Config(format!(
                        "rate_limit must be a number of at least {}",
                        MIN_RATE
                    )));
                }
                (Some(rate), burst) => Some((rate, burst.unwrap_or(rate.ceil() as u32).max(1))),
                (None, Some(burst)) => Some((DEFAULT_RATE_LIMIT.0, burst.max(1))),
                (None, None) => Some(DEFAULT_RATE_LIMIT),
            }
        };

        let mut retry = RetryPolicy::default();
        if let Some(attempts) = file.max_attempts {
            retry.max_attempts = attempts.max(1);
        }

        Ok(Config {
            token: cli.token.clone().or_else(|| env("NOTION_TOKEN")),
            root_page_id: cli
                .root_page
                .clone()
                .or_else(|| env("NOTION_ROOT_PAGE_ID"))
                .or(file.root_page)
                .map(|id| id.trim().to_string()),
            api_base: cli
                .api_base
                .clone()
                .or_else(|| env("NOTION_API_BASE"))
                .or(file.api_base)
                .unwrap_or_else(|| DEFAULT_API_BASE.into()),
            output_dir,
            concurrency,
            rate_limit,
            retry,
            timeout: cli.timeout.or(file.timeout_secs).map(Duration::from_secs),
            force: cli.force,
            dry_run: cli.dry_run,
            push: !cli.no_push,
            debug: cli.debug,
        })
    }

    pub fn paths(&self) -> Paths {
        Paths::new(self.output_dir.clone())
    }

    pub fn root_page(&self) -> Result<&str> {
        self.root_page_id.as_deref().ok_or_else(|| {
            Error::Config(
                "No root page configured. Provide via --root-page, NOTION_ROOT_PAGE_ID, or root_page in the config file".into(),
            )
        })
    }

    pub fn cancel_token(&self) -> CancelToken {
        match self.timeout {
            Some(timeout) => CancelToken::with_timeout(timeout),
            None => CancelToken::new(),
        }
    }

    pub fn client(&self, cancel: CancelToken) -> Result<ApiClient> {
        let token = self.token.clone().ok_or_else(|| {
            Error::Auth("No integration token found. Provide via --token or NOTION_TOKEN".into())
        })?;

        let client = ApiClient::new(token, Some(self.api_base.clone()))?
            .with_retry(self.retry.clone())
            .with_cancel(cancel);
        Ok(match self.rate_limit {
            Some((rate, burst)) => client.with_rate_limit(rate, burst),
            None => client.disable_throttle(),
        })
    }

    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            force: self.force,
            dry_run: self.dry_run,
            push: self.push,
            concurrency: self.concurrency,
            progress: !self.debug,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn cli(args: &[&str]) -> Cli {
        let mut all = vec!["notion-mirror"];
        all.extend_from_slice(args);
        Cli::parse_from(all)
    }

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_cli_overrides_env() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().to_str().unwrap();
        let config = Config::resolve_with(
            &cli(&["--token", "cli_token", "--root-page", "abc", "--output-dir", dir]),
            env_of(&[("NOTION_TOKEN", "env_token"), ("NOTION_ROOT_PAGE_ID", "env_root")]),
        )
        .unwrap();
        assert_eq!(config.token.as_deref(), Some("cli_token"));
        assert_eq!(config.root_page().unwrap(), "abc");
    }

    #[test]
    fn test_env_then_file_then_default() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join(CONFIG_FILE_NAME),
            "root_page: file_root\nconcurrency: 8\nrate_limit: 2.0\n",
        )
        .unwrap();
        let dir = temp.path().to_str().unwrap().to_string();

        let config = Config::resolve_with(
            &cli(&[]),
            env_of(&[("NOTION_TOKEN", "env_token"), ("SYNC_OUTPUT_DIR", dir.as_str())]),
        )
        .unwrap();
        assert_eq!(config.token.as_deref(), Some("env_token"));
        assert_eq!(config.root_page().unwrap(), "file_root");
        assert_eq!(config.concurrency, 8);
        assert_eq!(config.rate_limit, Some((2.0, 2)));
        assert_eq!(config.api_base, DEFAULT_API_BASE);
        assert!(config.push);
    }

    #[test]
    fn test_token_in_config_file_is_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("custom.yaml");
        fs::write(&path, "token: secret_abc\n").unwrap();

        let err = Config::resolve_with(
            &cli(&["--config", path.to_str().unwrap()]),
            env_of(&[]),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(!err.to_string().contains("secret_abc"));
    }

    #[test]
    fn test_missing_explicit_config_is_error() {
        let err = Config::resolve_with(&cli(&["--config", "/nonexistent/x.yaml"]), env_of(&[]))
            .unwrap_err();
        assert_eq!(err.exit_code(), 11);
    }

    #[test]
    fn test_debug_redacts_token() {
        let temp = TempDir::new().unwrap();
        let config = Config::resolve_with(
            &cli(&["--output-dir", temp.path().to_str().unwrap()]),
            env_of(&[("NOTION_TOKEN", "secret_abc")]),
        )
        .unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("secret_abc"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_missing_credentials() {
        let temp = TempDir::new().unwrap();
        let config = Config::resolve_with(
            &cli(&["--output-dir", temp.path().to_str().unwrap()]),
            env_of(&[("NOTION_TOKEN", "  ")]),
        )
        .unwrap();
        assert!(matches!(config.client(CancelToken::new()), Err(Error::Auth(_))));
        assert!(matches!(config.root_page(), Err(Error::Config(_))));
    }

    #[test]
    fn test_unusable_rate_in_file_is_rejected() {
        for rate in ["1e-30", ".nan", "-1"] {
            let temp = TempDir::new().unwrap();
            fs::write(
                temp.path().join(CONFIG_FILE_NAME),
                format!("rate_limit: {}\n", rate),
            )
            .unwrap();
            let err = Config::resolve_with(
                &cli(&["--output-dir", temp.path().to_str().unwrap()]),
                env_of(&[]),
            )
            .unwrap_err();
            assert_eq!(err.exit_code(), 11, "rate {}", rate);
        }
    }

    #[test]
    fn test_no_throttle_wins() {
        let temp = TempDir::new().unwrap();
        let config = Config::resolve_with(
            &cli(&["--no-throttle", "--rate-limit", "5", "--output-dir", temp.path().to_str().unwrap()]),
            env_of(&[]),
        )
        .unwrap();
        assert_eq!(config.rate_limit, None);
    }
}
