//! Restart budget behavior through a live daemon

mod common;

use sitter_daemon::bootstrap;
use sitter_ipc::UdsClient;
use std::time::Duration;
use tokio::time::sleep;

#[tokio::test(flavor = "multi_thread")]
async fn budget_of_two_yields_exactly_three_launches() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut config = common::test_config(dir.path());
    config.default_retries = 2;
    let socket = config.socket_path.clone();

    let handle = bootstrap(config).await.expect("bootstrap");
    common::wait_for_socket(&socket).await;
    let client = UdsClient::new(&socket);
    let supervisor = handle.supervisor();

    client
        .run(vec!["/bin/true".to_string()])
        .await
        .expect("run /bin/true");

    // Original launch plus two restarts, then the chain ends.
    let mut settled = false;
    for _ in 0..400 {
        if supervisor.total_launched() == 3 && supervisor.live_count().await == 0 {
            settled = true;
            break;
        }
        sleep(Duration::from_millis(10)).await;
    }
    assert!(
        settled,
        "expected 3 launches, saw {}",
        supervisor.total_launched()
    );

    sleep(Duration::from_millis(200)).await;
    assert_eq!(supervisor.total_launched(), 3, "budget must not revive");

    client.shutdown().await.expect("shutdown");
    handle.join().await.expect("daemon join");
}
