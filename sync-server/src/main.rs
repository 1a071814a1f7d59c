use sync_server::{AppState, BackgroundTasks, Config, SyncOptions, SyncScheduler, TaskKind};

use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. 环境与日志
    dotenv::dotenv().ok();
    let config = Config::from_env();
    sync_server::init_logger_with_file(Some(&config.log_level), config.log_dir.as_deref());

    sync_server::print_banner();
    tracing::info!(environment = %config.environment, "Order sync server starting...");

    // 2. 组装组件图
    let state = AppState::build(config)?;

    // 3. 启动后台任务
    let mut tasks = BackgroundTasks::new();
    let shutdown = tasks.shutdown_token();

    let scheduler = SyncScheduler::new(
        state.config.scheduler_config(),
        state.engine.clone(),
        state.jobs.clone(),
        state.stores.clone(),
        SyncOptions {
            pull_window_days: state.config.pull_window_days,
            push_window_hours: state.config.push_window_hours,
            batch_size: state.config.batch_size,
            ..Default::default()
        },
        shutdown.clone(),
    );
    tasks.spawn("sync_scheduler", TaskKind::Worker, scheduler.run());

    let monitor = state.monitor.clone();
    let retention = Duration::from_secs(state.config.alert_retention_days as u64 * 86_400);
    let prune_interval = Duration::from_secs(state.config.alert_prune_interval_secs);
    tasks.spawn(
        "alert_maintenance",
        TaskKind::Periodic,
        monitor.run_maintenance(retention, prune_interval, shutdown.clone()),
    );

    tracing::info!(
        stores = state.stores.len(),
        tasks = tasks.len(),
        "Sync server running"
    );

    // 4. 等待停机信号
    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");

    tasks.shutdown().await;
    tracing::info!("Order sync server stopped");

    Ok(())
}
