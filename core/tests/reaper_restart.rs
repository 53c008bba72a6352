//! Reaper behavior against real children: restart chains and
//! untracked-pid tolerance
//!
//! Kept to a single test so only one waitpid(-1) drain loop ever runs
//! in this process.

use sitter_core::supervisor::{reaper, shutdown};
use sitter_core::{DaemonConfig, Supervisor};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};

async fn wait_until_empty(supervisor: &Supervisor, within: Duration) {
    let deadline = Instant::now() + within;
    while supervisor.live_count().await > 0 {
        assert!(Instant::now() < deadline, "table never emptied");
        sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test]
async fn reaper_restart_chain_and_untracked_exit() {
    let config = DaemonConfig {
        default_retries: 2,
        grace_period_ms: 200,
        ..DaemonConfig::default()
    };
    let supervisor = Arc::new(Supervisor::new(config));
    let reaper_task = tokio::spawn(reaper::run(supervisor.clone()));
    supervisor.attach_reaper(reaper_task);
    // let the reaper install its SIGCHLD stream before anything exits
    sleep(Duration::from_millis(50)).await;

    // A process that exits immediately with budget 2: exactly two
    // restarts, three launches total, then the table empties for good.
    supervisor
        .launch(vec!["/bin/true".to_string()])
        .await
        .expect("launch");

    wait_until_empty(&supervisor, Duration::from_secs(5)).await;
    assert_eq!(supervisor.total_launched(), 3);

    // no further launches after the budget is spent
    sleep(Duration::from_millis(200)).await;
    assert_eq!(supervisor.total_launched(), 3);
    assert_eq!(supervisor.live_count().await, 0);

    // An exit for a pid the table never knew is logged and ignored.
    let unmanaged = std::process::Command::new("/bin/true")
        .spawn()
        .expect("spawn unmanaged child");
    let unmanaged_pid = unmanaged.id();
    drop(unmanaged);

    sleep(Duration::from_millis(300)).await;
    assert_eq!(supervisor.live_count().await, 0);
    assert_eq!(supervisor.total_launched(), 3);
    assert!(supervisor.list().await.iter().all(|p| p.pid != unmanaged_pid));

    shutdown::shutdown(&supervisor).await.expect("shutdown");
}
