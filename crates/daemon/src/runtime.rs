use anyhow::{Context, Result};
use tokio::sync::broadcast;
use tracing::info;

use crate::ai::generator_from_config;
use crate::config::GlobalConfig;
use crate::rpc::methods::RpcServerState;
use crate::rpc::unix::serve_unix_until_shutdown;
use crate::startup::{bind_socket, remove_pid_file, write_pid_file, DaemonPaths};
use crate::store::meta_db::MetaDb;

pub async fn run_standalone() -> Result<()> {
    run_standalone_with_paths(DaemonPaths::resolve()?).await
}

async fn run_standalone_with_paths(paths: DaemonPaths) -> Result<()> {
    let listener = bind_socket(&paths.socket_path).await?;
    write_pid_file(&paths.pid_path)?;

    let config = GlobalConfig::load();
    let meta_db = MetaDb::open(&paths.db_path)
        .with_context(|| format!("failed to open meta db at `{}`", paths.db_path.display()))?;
    let generator = generator_from_config(&config.ai);

    let (shutdown_tx, shutdown_rx) = broadcast::channel(4);
    let state = RpcServerState::new(meta_db, generator, config.defaults)
        .with_shutdown_notifier(shutdown_tx.clone());
    let ctrl_c_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        let _ = ctrl_c_tx.send(());
    });

    info!(socket_path = %paths.socket_path.display(), "standalone daemon started");
    let result = serve_unix_until_shutdown(listener, state, shutdown_rx).await;
    cleanup_paths(&paths);
    result.context("standalone daemon exited with error")
}

fn cleanup_paths(paths: &DaemonPaths) {
    remove_pid_file(&paths.pid_path);
    let _ = std::fs::remove_file(&paths.socket_path);
}
