//! Shutdown escalates to SIGKILL for children that ignore SIGINT

mod common;

use sitter_daemon::bootstrap;
use sitter_ipc::UdsClient;
use std::time::{Duration, Instant};

#[tokio::test(flavor = "multi_thread")]
async fn sigint_immune_child_is_killed_after_grace() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut config = common::test_config(dir.path());
    config.grace_period_ms = 150;
    let socket = config.socket_path.clone();

    let handle = bootstrap(config).await.expect("bootstrap");
    common::wait_for_socket(&socket).await;
    let client = UdsClient::new(&socket);

    client
        .run(vec![
            "/bin/sh".to_string(),
            "-c".to_string(),
            "trap '' INT; sleep 30".to_string(),
        ])
        .await
        .expect("run trap child");
    let listing = client.list().await.expect("list");
    assert_eq!(listing.len(), 1);
    let pid = listing[0].pid;
    assert!(common::pid_alive(pid));

    let start = Instant::now();
    client.shutdown().await.expect("shutdown");
    handle.join().await.expect("daemon join");

    // Escalation, not the sleep's 30s, bounds the shutdown.
    assert!(start.elapsed() < Duration::from_secs(5));
    assert!(!common::pid_alive(pid));
    assert!(!socket.exists());
}
