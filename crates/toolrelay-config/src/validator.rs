//! Configuration validation.

use std::collections::HashSet;

use crate::error::ConfigError;
use crate::schema::{ApprovalPolicy, RunConfig, SandboxMode};

/// Validation result.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }

    /// Collapse the errors into a single [`ConfigError::Invalid`].
    pub fn into_result(self) -> Result<Vec<ValidationWarning>, ConfigError> {
        if self.errors.is_empty() {
            return Ok(self.warnings);
        }
        let joined = self
            .errors
            .iter()
            .map(|e| format!("{}: {}", e.path, e.message))
            .collect::<Vec<_>>()
            .join("; ");
        Err(ConfigError::Invalid(joined))
    }
}

/// A validation error.
#[derive(Debug)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// A validation warning.
#[derive(Debug)]
pub struct ValidationWarning {
    pub path: String,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration.
    pub fn validate(config: &RunConfig) -> ValidationResult {
        let mut result = ValidationResult::default();

        Self::validate_agent(config, &mut result);
        Self::validate_timeouts(config, &mut result);
        Self::validate_servers(config, &mut result);
        Self::validate_policies(config, &mut result);
        Self::validate_oracle(config, &mut result);

        result
    }

    fn validate_agent(config: &RunConfig, result: &mut ValidationResult) {
        if config.agent.max_turns == 0 {
            result.add_error(ValidationError::new(
                "agent.max_turns",
                "max_turns must be greater than 0",
            ));
        }

        if config.agent.max_turns > 200 {
            result.add_warning(ValidationWarning::new(
                "agent.max_turns",
                "max_turns is very high (>200), a stuck oracle will burn through tool calls",
            ));
        }

        if config.agent.max_consecutive_timeouts == 0 {
            result.add_error(ValidationError::new(
                "agent.max_consecutive_timeouts",
                "max_consecutive_timeouts must be greater than 0",
            ));
        }
    }

    fn validate_timeouts(config: &RunConfig, result: &mut ValidationResult) {
        let timeouts = &config.timeouts;
        for (path, value) in [
            ("timeouts.call_seconds", timeouts.call_seconds),
            ("timeouts.idle_seconds", timeouts.idle_seconds),
            ("timeouts.session_seconds", timeouts.session_seconds),
        ] {
            if value == 0 {
                result.add_error(ValidationError::new(path, "timeout must be greater than 0"));
            }
        }

        if timeouts.idle_seconds > timeouts.call_seconds {
            result.add_warning(ValidationWarning::new(
                "timeouts.idle_seconds",
                "idle timeout exceeds the call timeout and will never fire",
            ));
        }
    }

    fn validate_servers(config: &RunConfig, result: &mut ValidationResult) {
        if config.servers.is_empty() {
            result.add_error(ValidationError::new(
                "servers",
                "at least one tool server must be configured",
            ));
        }

        let mut seen = HashSet::new();
        for (i, server) in config.servers.iter().enumerate() {
            if server.name.trim().is_empty() {
                result.add_error(ValidationError::new(
                    format!("servers[{i}].name"),
                    "server name cannot be empty",
                ));
            } else if !seen.insert(server.name.as_str()) {
                result.add_error(ValidationError::new(
                    format!("servers[{i}].name"),
                    format!("duplicate server name '{}'", server.name),
                ));
            }

            if server.command.trim().is_empty() {
                result.add_error(ValidationError::new(
                    format!("servers[{i}].command"),
                    "command cannot be empty",
                ));
            }

            if !server.inherit_env && server.propagate_env.is_empty() && server.env.is_empty() {
                result.add_warning(ValidationWarning::new(
                    format!("servers[{i}].env"),
                    format!("server '{}' starts with an empty environment", server.name),
                ));
            }
        }
    }

    fn validate_policies(config: &RunConfig, result: &mut ValidationResult) {
        if config.sandbox == SandboxMode::DangerFullAccess
            && config.approval_policy == ApprovalPolicy::Never
        {
            result.add_warning(ValidationWarning::new(
                "sandbox",
                "danger-full-access with approval 'never' lets the tool server run anything unattended",
            ));
        }
    }

    fn validate_oracle(config: &RunConfig, result: &mut ValidationResult) {
        if config.oracle.model.trim().is_empty() {
            result.add_error(ValidationError::new("oracle.model", "model cannot be empty"));
        }

        if let Some(url) = &config.oracle.base_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                result.add_error(ValidationError::new(
                    "oracle.base_url",
                    "base_url must start with http:// or https://",
                ));
            }
        }
    }
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;
