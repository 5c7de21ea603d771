//! Configuration loader.

use std::fs;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::ConfigError;
use crate::schema::RunConfig;

static ENV_VAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([^}]+)\}").expect("env var pattern is valid"));

/// Configuration loader with environment variable substitution.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<RunConfig, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let content = fs::read_to_string(path)?;
        Self::load_str(&content)
    }

    /// Load configuration from a file if it exists, defaults otherwise.
    pub fn load_or_default(path: &Path) -> Result<RunConfig, ConfigError> {
        match Self::load(path) {
            Err(ConfigError::NotFound(_)) => Ok(RunConfig::default()),
            other => other,
        }
    }

    /// Load configuration from a string.
    pub fn load_str(content: &str) -> Result<RunConfig, ConfigError> {
        let expanded = Self::expand_env_vars(content)?;
        let config: RunConfig = toml::from_str(&expanded)?;
        Ok(config)
    }

    /// Expand environment variables in the format `${VAR}`.
    fn expand_env_vars(content: &str) -> Result<String, ConfigError> {
        let mut result = content.to_string();
        for cap in ENV_VAR.captures_iter(content) {
            let var_name = &cap[1];
            let var_value = std::env::var(var_name)
                .map_err(|_| ConfigError::EnvVarNotSet(var_name.to_string()))?;
            result = result.replace(&cap[0], &var_value);
        }
        Ok(result)
    }

    /// Expand shell-style paths (e.g., `~/.toolrelay`).
    pub fn expand_path(path: &str) -> String {
        shellexpand::tilde(path).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ApprovalPolicy, SandboxMode};
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_empty_config() {
        let config = ConfigLoader::load_str("").unwrap();
        assert_eq!(config.servers.len(), 1);
        assert_eq!(config.timeouts.call_seconds, 600);
    }

    #[test]
    fn test_load_policies_and_timeouts() {
        let content = r#"
            sandbox = "read-only"
            approval_policy = "on-request"
            cwd = "/tmp/repo"

            [timeouts]
            call_seconds = 120
            idle_seconds = 15
            abort_on_idle = true

            [agent]
            max_turns = 8
        "#;
        let config = ConfigLoader::load_str(content).unwrap();
        assert_eq!(config.sandbox, SandboxMode::ReadOnly);
        assert_eq!(config.approval_policy, ApprovalPolicy::OnRequest);
        assert_eq!(config.timeouts.call_seconds, 120);
        assert_eq!(config.timeouts.idle_seconds, 15);
        assert_eq!(config.timeouts.session_seconds, 300);
        assert!(config.timeouts.abort_on_idle);
        assert_eq!(config.agent.max_turns, 8);
    }

    #[test]
    fn test_load_multiple_servers() {
        let content = r#"
            [[servers]]
            name = "codex"
            command = "codex"
            args = ["mcp-server"]

            [[servers]]
            name = "fs"
            command = "fs-server"
            inherit_env = false
            propagate_env = ["PATH"]

            [servers.env]
            FS_ROOT = "/data"
        "#;
        let config = ConfigLoader::load_str(content).unwrap();
        assert_eq!(config.servers.len(), 2);
        let fs = &config.servers[1];
        assert!(!fs.inherit_env);
        assert_eq!(fs.propagate_env, vec!["PATH"]);
        assert_eq!(fs.env.get("FS_ROOT").map(String::as_str), Some("/data"));
    }

    #[test]
    fn test_load_unknown_sandbox_fails() {
        let result = ConfigLoader::load_str("sandbox = \"wide-open\"");
        assert!(matches!(result, Err(ConfigError::TomlParse(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[agent]").unwrap();
        writeln!(file, "max_turns = 5").unwrap();

        let config = ConfigLoader::load(file.path()).unwrap();
        assert_eq!(config.agent.max_turns, 5);
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = ConfigLoader::load(Path::new("/nonexistent/path/config.toml"));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config =
            ConfigLoader::load_or_default(Path::new("/nonexistent/path/config.toml")).unwrap();
        assert_eq!(config.agent.max_turns, 30);
    }

    #[test]
    fn test_load_invalid_toml() {
        let result = ConfigLoader::load_str("invalid = [unclosed");
        assert!(result.is_err());
    }

    #[test]
    fn test_expand_env_vars() {
        // SAFETY: unique test-only variable
        unsafe {
            std::env::set_var("TOOLRELAY_TEST_KEY", "sk-test");
        }
        let content = "[oracle]\napi_key = \"${TOOLRELAY_TEST_KEY}\"";
        let config = ConfigLoader::load_str(content).unwrap();
        assert_eq!(config.oracle.api_key.as_deref(), Some("sk-test"));
        unsafe {
            std::env::remove_var("TOOLRELAY_TEST_KEY");
        }
    }

    #[test]
    fn test_expand_env_vars_not_set() {
        let content = "value = \"${TOOLRELAY_NONEXISTENT_12345}\"";
        let result = ConfigLoader::expand_env_vars(content);
        assert!(matches!(result, Err(ConfigError::EnvVarNotSet(_))));
    }

    #[test]
    fn test_expand_env_vars_no_vars() {
        let content = "value = \"no variables here\"";
        let expanded = ConfigLoader::expand_env_vars(content).unwrap();
        assert_eq!(expanded, content);
    }

    #[test]
    fn test_expand_path_with_tilde() {
        let expanded = ConfigLoader::expand_path("~/test");
        assert!(!expanded.starts_with('~'));
        assert!(expanded.ends_with("/test"));
    }

    #[test]
    fn test_expand_path_no_tilde() {
        assert_eq!(ConfigLoader::expand_path("/usr/local/bin"), "/usr/local/bin");
    }
}
