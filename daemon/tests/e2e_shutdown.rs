//! Shutdown command terminates children and stops the daemon

mod common;

use sitter_daemon::bootstrap;
use sitter_ipc::UdsClient;

#[tokio::test(flavor = "multi_thread")]
async fn shutdown_terminates_cooperative_child() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = common::test_config(dir.path());
    let socket = config.socket_path.clone();

    let handle = bootstrap(config).await.expect("bootstrap");
    common::wait_for_socket(&socket).await;
    let client = UdsClient::new(&socket);

    client
        .run(vec!["/bin/sleep".to_string(), "30".to_string()])
        .await
        .expect("run /bin/sleep");
    let listing = client.list().await.expect("list");
    assert_eq!(listing.len(), 1);
    let pid = listing[0].pid;
    assert!(common::pid_alive(pid));

    // sleep dies to the SIGINT, well inside the grace period.
    client.shutdown().await.expect("shutdown");
    handle.join().await.expect("daemon join");

    assert!(!common::pid_alive(pid));
    assert!(!socket.exists());
}
