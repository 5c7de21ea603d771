use super::*;

#[test]
fn test_run_config_default() {
    let config = RunConfig::default();
    assert_eq!(config.sandbox, SandboxMode::WorkspaceWrite);
    assert_eq!(config.approval_policy, ApprovalPolicy::Never);
    assert_eq!(config.cwd, PathBuf::from("."));
    assert_eq!(config.servers.len(), 1);
    assert_eq!(config.servers[0].name, "codex");
    assert_eq!(config.agent.max_turns, 30);
}

#[test]
fn test_timeout_defaults() {
    let timeouts = TimeoutConfig::default();
    assert_eq!(timeouts.call(), Duration::from_secs(600));
    assert_eq!(timeouts.idle(), Duration::from_secs(60));
    assert_eq!(timeouts.session(), Duration::from_secs(300));
    assert_eq!(timeouts.close_grace(), Duration::from_millis(2000));
    assert!(!timeouts.abort_on_idle);
}

#[test]
fn test_agent_settings_default() {
    let agent = AgentSettings::default();
    assert_eq!(agent.max_turns, 30);
    assert_eq!(agent.max_consecutive_timeouts, 2);
    assert!(agent.instructions.is_none());
}

#[test]
fn test_codex_server_default() {
    let server = ServerConfig::codex();
    assert_eq!(server.command, "codex");
    assert_eq!(server.args, vec!["mcp-server"]);
    assert!(server.inherit_env);
    assert!(server.cwd.is_none());
}

#[test]
fn test_sandbox_mode_parse() {
    assert_eq!("read-only".parse::<SandboxMode>().unwrap(), SandboxMode::ReadOnly);
    assert_eq!(
        "full-access".parse::<SandboxMode>().unwrap(),
        SandboxMode::DangerFullAccess
    );
    assert!("open".parse::<SandboxMode>().is_err());
}

#[test]
fn test_sandbox_mode_serde_kebab_case() {
    let json = serde_json::to_string(&SandboxMode::DangerFullAccess).unwrap();
    assert_eq!(json, "\"danger-full-access\"");
    let parsed: SandboxMode = serde_json::from_str("\"workspace-write\"").unwrap();
    assert_eq!(parsed, SandboxMode::WorkspaceWrite);
}

#[test]
fn test_approval_policy_parse() {
    assert_eq!("on-failure".parse::<ApprovalPolicy>().unwrap(), ApprovalPolicy::OnFailure);
    assert_eq!("always".parse::<ApprovalPolicy>().unwrap(), ApprovalPolicy::Untrusted);
    assert_eq!(ApprovalPolicy::OnRequest.to_string(), "on-request");
    assert!("sometimes".parse::<ApprovalPolicy>().is_err());
}

#[test]
fn test_env_overlay_inherits_parent() {
    let mut server = ServerConfig::new("s", "cmd");
    server.env.insert("EXTRA".to_string(), "1".to_string());
    let parent = vec![
        ("PATH".to_string(), "/bin".to_string()),
        ("HOME".to_string(), "/home/u".to_string()),
    ];

    let overlay = EnvOverlay::build(parent, &server);
    assert_eq!(overlay.len(), 3);
    assert_eq!(overlay.get("PATH"), Some("/bin"));
    assert_eq!(overlay.get("EXTRA"), Some("1"));
}

#[test]
fn test_env_overlay_propagates_allowlist_only() {
    let mut server = ServerConfig::new("s", "cmd");
    server.inherit_env = false;
    server.propagate_env = vec!["PATH".to_string()];
    let parent = vec![
        ("PATH".to_string(), "/bin".to_string()),
        ("SECRET".to_string(), "x".to_string()),
    ];

    let overlay = EnvOverlay::build(parent, &server);
    assert_eq!(overlay.get("PATH"), Some("/bin"));
    assert_eq!(overlay.get("SECRET"), None);
}

#[test]
fn test_env_overlay_explicit_wins() {
    let mut server = ServerConfig::new("s", "cmd");
    server.env.insert("PATH".to_string(), "/opt/bin".to_string());
    let parent = vec![("PATH".to_string(), "/bin".to_string())];

    let overlay = EnvOverlay::build(parent, &server);
    assert_eq!(overlay.get("PATH"), Some("/opt/bin"));
}

#[test]
fn test_launch_for_uses_run_cwd() {
    let mut config = RunConfig::default();
    config.cwd = PathBuf::from("/tmp/work");
    let server = ServerConfig::new("echo", "echo-server").with_args(["--stdio"]);

    let launch = config.launch_for(&server);
    assert_eq!(launch.name, "echo");
    assert_eq!(launch.cwd, PathBuf::from("/tmp/work"));
    assert_eq!(launch.display_command(), "echo-server --stdio");
}

#[test]
fn test_launch_for_server_cwd_overrides() {
    let mut config = RunConfig::default();
    config.cwd = PathBuf::from("/tmp/work");
    let mut server = ServerConfig::new("echo", "echo-server");
    server.cwd = Some(PathBuf::from("/srv"));

    let launch = config.launch_for(&server);
    assert_eq!(launch.cwd, PathBuf::from("/srv"));
}

#[test]
fn test_resolved_cwd_expands_tilde() {
    let mut config = RunConfig::default();
    config.cwd = PathBuf::from("~/project");
    let resolved = config.resolved_cwd();
    assert!(!resolved.to_string_lossy().starts_with('~'));
    assert!(resolved.ends_with("project"));
}

#[test]
fn test_default_config_path() {
    let path = default_config_path();
    assert!(path.ends_with(".toolrelay/config.toml"));
}
