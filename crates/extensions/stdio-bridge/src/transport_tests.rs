use super::*;

#[test]
fn test_transport_error_display() {
    let err = TransportError::Timeout(Duration::from_millis(250));
    assert_eq!(err.to_string(), "No frame within 250ms");
    assert_eq!(TransportError::StreamClosed.to_string(), "Stream closed");
}

#[test]
fn test_spawn_failed_keeps_source() {
    let err = TransportError::SpawnFailed {
        command: "missing-binary".to_string(),
        source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
    };
    assert!(err.to_string().contains("missing-binary"));
    assert!(std::error::Error::source(&err).is_some());
}

#[cfg(unix)]
mod process {
    use super::*;
    use toolrelay_config::{EnvOverlay, ServerConfig};

    fn shell(script: &str) -> ServerLaunch {
        let inherited = EnvOverlay::from_process(&ServerConfig::new("sh", "/bin/sh"));
        ServerLaunch::new("sh", "/bin/sh")
            .with_args(["-c", script])
            .with_env(inherited)
            .with_cwd(std::env::temp_dir())
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let launch = ServerLaunch::new("ghost", "/nonexistent/toolrelay-server");
        let result = ProcessTransport::start(&launch).await;
        assert!(matches!(result, Err(TransportError::SpawnFailed { .. })));
    }

    #[tokio::test]
    async fn test_round_trip_through_cat() {
        let transport = ProcessTransport::start(&shell("cat")).await.unwrap();
        transport.send(br#"{"jsonrpc":"2.0","method":"x"}"#).await.unwrap();

        let frame = transport
            .receive_next(Some(Duration::from_secs(5)))
            .await
            .unwrap();
        assert_eq!(&frame[..], br#"{"jsonrpc":"2.0","method":"x"}"#);
        transport.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_receive_timeout() {
        let transport = ProcessTransport::start(&shell("sleep 5")).await.unwrap();
        let result = transport.receive_next(Some(Duration::from_millis(50))).await;
        assert!(matches!(result, Err(TransportError::Timeout(_))));
        transport.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_crash_records_exit_code_and_stderr() {
        let transport = ProcessTransport::start(&shell("echo boom >&2; exit 3"))
            .await
            .unwrap();

        let result = transport.receive_next(Some(Duration::from_secs(5))).await;
        assert!(matches!(result, Err(TransportError::StreamClosed)));
        assert_eq!(transport.exit_code(), Some(3));

        // stderr is drained concurrently; give it a moment to land.
        for _ in 0..50 {
            if !transport.stderr_tail().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(transport.stderr_tail().contains("boom"));
    }

    #[tokio::test]
    async fn test_stderr_never_enters_protocol_stream() {
        let transport = ProcessTransport::start(&shell("echo noise >&2; echo '{\"ok\":1}'; sleep 5"))
            .await
            .unwrap();
        let frame = transport
            .receive_next(Some(Duration::from_secs(5)))
            .await
            .unwrap();
        assert_eq!(&frame[..], b"{\"ok\":1}");
        transport.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_environment_overlay_is_exact() {
        let mut server = ServerConfig::new("sh", "/bin/sh");
        server.inherit_env = false;
        server.env.insert("TOOLRELAY_PROBE".to_string(), "present".to_string());
        let launch = ServerLaunch::new("sh", "/bin/sh")
            .with_args(["-c", "echo \"${TOOLRELAY_PROBE}:${HOME:-unset}\""])
            .with_env(EnvOverlay::build(
                vec![("HOME".to_string(), "/root".to_string())],
                &server,
            ))
            .with_cwd(std::env::temp_dir());

        let transport = ProcessTransport::start(&launch).await.unwrap();
        let frame = transport
            .receive_next(Some(Duration::from_secs(5)))
            .await
            .unwrap();
        assert_eq!(&frame[..], b"present:unset");
        transport.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_kills() {
        let transport = ProcessTransport::start(&shell("sleep 30"))
            .await
            .unwrap()
            .with_close_grace(Duration::from_secs(5));
        assert!(!transport.is_closed());

        transport.close().await.unwrap();
        transport.close().await.unwrap();
        assert!(transport.is_closed());

        let result = transport.receive_next(None).await;
        assert!(matches!(result, Err(TransportError::StreamClosed)));
        assert!(matches!(
            transport.send(b"{}").await,
            Err(TransportError::WriteFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_close_unblocks_pending_receive() {
        let transport = Arc::new(ProcessTransport::start(&shell("sleep 30")).await.unwrap());
        let reader = {
            let transport = Arc::clone(&transport);
            tokio::spawn(async move { transport.receive_next(None).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        transport.close().await.unwrap();
        let result = tokio::time::timeout(Duration::from_secs(5), reader)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(result, Err(TransportError::StreamClosed)));
    }

    #[tokio::test]
    async fn test_close_unblocks_stalled_send() {
        // The child never reads stdin, so a large frame fills the pipe.
        let transport = Arc::new(ProcessTransport::start(&shell("sleep 30")).await.unwrap());
        let writer = {
            let transport = Arc::clone(&transport);
            tokio::spawn(async move { transport.send(&vec![b'x'; 1 << 20]).await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!writer.is_finished());

        tokio::time::timeout(Duration::from_secs(5), transport.close())
            .await
            .unwrap()
            .unwrap();
        let result = tokio::time::timeout(Duration::from_secs(5), writer)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(result, Err(TransportError::WriteFailed(_))));
    }

    #[tokio::test]
    async fn test_close_terminates_child_process() {
        let transport = ProcessTransport::start(&shell("sleep 30")).await.unwrap();
        let pid = transport.pid().unwrap().to_string();
        let alive = || {
            std::process::Command::new("kill")
                .args(["-0", &pid])
                .status()
                .unwrap()
                .success()
        };
        assert!(alive());

        transport.close().await.unwrap();
        assert!(!alive());
    }
}
