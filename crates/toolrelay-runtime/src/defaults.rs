//! Run-wide argument defaults.

use std::path::PathBuf;

use serde_json::{Map, Value};

use toolrelay_agent_loop::ArgumentDefaults;
use toolrelay_config::{ApprovalPolicy, RunConfig, SandboxMode};
use toolrelay_protocols::ToolDescriptor;

/// Fills `sandbox`, `approval-policy`, `cwd` and, when resuming, `threadId`
/// for tools whose schema declares them and whose caller left them out.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionDefaults {
    pub sandbox: SandboxMode,
    pub approval_policy: ApprovalPolicy,
    pub cwd: PathBuf,
    pub thread_id: Option<String>,
}

impl SessionDefaults {
    pub fn from_config(config: &RunConfig, resume: Option<&str>) -> Self {
        Self {
            sandbox: config.sandbox,
            approval_policy: config.approval_policy,
            cwd: config.resolved_cwd(),
            thread_id: resume.map(str::to_string),
        }
    }
}

impl ArgumentDefaults for SessionDefaults {
    fn fill(&self, descriptor: &ToolDescriptor, arguments: &mut Map<String, Value>) {
        let mut set = |key: &str, value: Value| {
            if descriptor.declares_property(key) && !arguments.contains_key(key) {
                arguments.insert(key.to_string(), value);
            }
        };
        set("sandbox", Value::from(self.sandbox.as_str()));
        set("approval-policy", Value::from(self.approval_policy.as_str()));
        set("cwd", Value::from(self.cwd.to_string_lossy().into_owned()));
        if let Some(thread_id) = &self.thread_id {
            set("threadId", Value::from(thread_id.as_str()));
        }
    }
}
