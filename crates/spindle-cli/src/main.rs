use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use serde_json::{Value, json};
use spindle_core::impls::InMemoryStore;
use spindle_core::ports::{QueueStore, Stores};
use spindle_core::{HandlerError, JobContext, JobHandler, Service, WorkerConfig};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

const QUEUE: &str = "transcode_get_media_info";

/// Pretends to inspect a media file; the first `n` calls fail.
struct MediaInfoHandler {
    remaining_failures: AtomicU32,
}

impl MediaInfoHandler {
    fn new(n: u32) -> Self {
        Self {
            remaining_failures: AtomicU32::new(n),
        }
    }
}

#[async_trait]
impl JobHandler for MediaInfoHandler {
    async fn perform(&self, queue: &str, args: &[Value], ctx: &JobContext) -> Result<(), HandlerError> {
        let file = args
            .first()
            .and_then(Value::as_str)
            .ok_or_else(|| HandlerError::new("ArgumentError", "expected a file name"))?;

        let left = self.remaining_failures.load(Ordering::Relaxed);
        if left > 0 {
            self.remaining_failures.fetch_sub(1, Ordering::Relaxed);
            return Err(HandlerError::msg(format!("intentional failure (left={left})")));
        }

        info!(queue, job_id = %ctx.job_id, file, "inspected media");
        Ok(())
    }
}

fn sample_job(job_id: u32, file: &str) -> String {
    json!({
        "queue": "transcode",
        "class": "ActiveJob::QueueAdapters::ResqueAdapter::JobWrapper",
        "args": [{
            "job_class": "GetMediaInfoJob",
            "job_id": job_id.to_string(),
            "queue_name": QUEUE,
            "arguments": [file],
            "locale": "en"
        }]
    })
    .to_string()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = WorkerConfig::from_env()?;

    // (A) ストアと service を用意（本番では Redis クライアントを差し込む）
    let store = Arc::new(InMemoryStore::new());
    let mut service = Service::new(Stores::from_backend(store.clone()), config)?;
    service.register(QUEUE, MediaInfoHandler::new(1));

    // (B) サンプルのジョブを投入
    for (id, file) in [(1, "intro.mp4"), (2, "video.mp4")] {
        store
            .rpush(&format!("resque:queue:{QUEUE}"), &sample_job(id, file))
            .await?;
    }

    // (C) Ctrl-C まで動かす
    let root = CancellationToken::new();
    let handle = service.start(&root).await?;
    info!(host = %service.hostname(), "press ctrl-c to stop");
    tokio::signal::ctrl_c().await?;

    // (D) 全 worker を止めて後片付け
    root.cancel();
    handle.stop().await?;
    info!(
        processed = store.counter("resque:stat:processed").await,
        failed = store.counter("resque:stat:failed").await,
        "stopped"
    );
    Ok(())
}
