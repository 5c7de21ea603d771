//! Extra instructions handed to the decision oracle.

use std::path::Path;

use toolrelay_config::{ApprovalPolicy, SandboxMode};

/// Compose the oracle's extra instructions.
///
/// `servers` pairs each server name with the instructions it returned from
/// `initialize`. Returns `None` when there is nothing to say.
pub fn build_instructions(
    configured: Option<&str>,
    servers: &[(String, Option<String>)],
    sandbox: SandboxMode,
    approval_policy: ApprovalPolicy,
    cwd: &Path,
    resume: Option<&str>,
) -> Option<String> {
    let mut sections = Vec::new();

    if let Some(text) = configured.map(str::trim).filter(|t| !t.is_empty()) {
        sections.push(text.to_string());
    }

    for (name, text) in servers {
        if let Some(text) = text.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            sections.push(format!("Instructions from tool server '{name}':\n{text}"));
        }
    }

    if !servers.is_empty() {
        sections.push(format!(
            "Tool calls run with sandbox '{sandbox}', approval-policy '{approval_policy}' and cwd '{}' unless you pass other values.",
            cwd.display()
        ));
    }

    if let Some(thread_id) = resume {
        sections.push(format!(
            "This run continues thread '{thread_id}'. Pass threadId '{thread_id}' to tools that accept it."
        ));
    }

    if sections.is_empty() {
        None
    } else {
        Some(sections.join("\n\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(
        configured: Option<&str>,
        servers: &[(String, Option<String>)],
        resume: Option<&str>,
    ) -> Option<String> {
        build_instructions(
            configured,
            servers,
            SandboxMode::WorkspaceWrite,
            ApprovalPolicy::Never,
            Path::new("/work"),
            resume,
        )
    }

    #[test]
    fn test_nothing_to_say() {
        assert_eq!(build(None, &[], None), None);
        assert_eq!(build(Some("   "), &[], None), None);
    }

    #[test]
    fn test_includes_server_instructions_and_defaults() {
        let servers = vec![
            ("codex".to_string(), Some("Prefer small diffs.".to_string())),
            ("quiet".to_string(), None),
        ];
        let text = build(Some("You are a developer."), &servers, None).unwrap();

        assert!(text.starts_with("You are a developer."));
        assert!(text.contains("tool server 'codex':\nPrefer small diffs."));
        assert!(!text.contains("'quiet'"));
        assert!(text.contains("sandbox 'workspace-write'"));
        assert!(text.contains("approval-policy 'never'"));
        assert!(text.contains("cwd '/work'"));
    }

    #[test]
    fn test_resume_hint() {
        let text = build(None, &[], Some("t-9")).unwrap();
        assert!(text.contains("threadId 't-9'"));
    }
}
