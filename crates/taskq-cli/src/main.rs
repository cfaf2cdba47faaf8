use std::error::Error;

use tokio::time::{Duration, sleep};
use tracing::info;
use tracing_subscriber::EnvFilter;

use taskq_core::{CommandSpec, ProcessingQueue, QueueConfig, TaskId, TaskRecord};

/// 終端状態（Completed / Failed）になるまでポーリング
async fn wait_for(queue: &ProcessingQueue, id: TaskId) -> Option<TaskRecord> {
    loop {
        let record = queue.get_status(id).await?;
        if record.is_terminal() {
            return Some(record);
        }
        sleep(Duration::from_millis(50)).await;
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // (A) 設定を読み込んでキューを構築・起動
    let config = QueueConfig::from_env()?;
    info!(?config, "loaded config");
    let queue = ProcessingQueue::new(config)?;
    queue.start().await;

    // (B) タスク投入：成功するクロージャ、失敗するクロージャ、外部コマンド
    let ok = queue
        .submit_fn(|| {
            std::thread::sleep(std::time::Duration::from_millis(300));
            Ok::<_, String>(serde_json::json!({ "greeting": "hello" }))
        })
        .await?;
    let bad = queue
        .submit_fn(|| Err::<(), _>("intentional failure"))
        .await?;
    let cmd = queue
        .submit_command(CommandSpec::new("echo").arg(r#"{"from": "child"}"#))
        .await?;

    // (C) 完了をポーリングで待つ
    for id in [ok, bad, cmd] {
        match wait_for(&queue, id).await {
            Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
            None => println!("{id}: no status"),
        }
    }
    println!("counts: {:?}", queue.counts().await);

    // (D) graceful shutdown
    queue.stop().await;
    Ok(())
}
