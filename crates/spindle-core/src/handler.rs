//! Job handler capability.
//!
//! One handler is registered per queue. The worker calls it once for every
//! inner task of a popped job.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::{HandlerError, InnerTask};

/// Per-task execution context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobContext {
    pub job_id: String,
    pub job_class: String,
    pub locale: String,
    /// Identity of the worker running the task (`host:id:queue`).
    pub worker: String,
}

impl JobContext {
    pub(crate) fn for_task(task: &InnerTask, worker: &str) -> Self {
        Self {
            job_id: task.job_id.clone(),
            job_class: task.job_class.clone(),
            locale: task.locale.clone(),
            worker: worker.to_string(),
        }
    }
}

/// Something that can execute work for a job popped from a queue.
///
/// # 使用例
/// ```ignore
/// struct MediaInfo;
///
/// #[async_trait]
/// impl JobHandler for MediaInfo {
///     async fn perform(&self, queue: &str, args: &[Value], ctx: &JobContext) -> Result<(), HandlerError> {
///         inspect_media(args).await.map_err(|e| HandlerError::from_error(&e))
///     }
/// }
/// ```
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn perform(&self, queue: &str, args: &[Value], ctx: &JobContext)
    -> Result<(), HandlerError>;
}

#[async_trait]
impl<H: JobHandler + ?Sized> JobHandler for Arc<H> {
    async fn perform(
        &self,
        queue: &str,
        args: &[Value],
        ctx: &JobContext,
    ) -> Result<(), HandlerError> {
        (**self).perform(queue, args, ctx).await
    }
}

/// Adapter so a bare async closure can be registered as a handler.
///
/// The closure receives owned copies of the call arguments.
pub struct HandlerFn<F>(F);

impl<F> HandlerFn<F> {
    pub fn new<Fut>(f: F) -> Self
    where
        F: Fn(String, Vec<Value>, JobContext) -> Fut + Send + Sync,
        Fut: Future<Output = Result<(), HandlerError>> + Send,
    {
        Self(f)
    }
}

#[async_trait]
impl<F, Fut> JobHandler for HandlerFn<F>
where
    F: Fn(String, Vec<Value>, JobContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), HandlerError>> + Send,
{
    async fn perform(
        &self,
        queue: &str,
        args: &[Value],
        ctx: &JobContext,
    ) -> Result<(), HandlerError> {
        (self.0)(queue.to_string(), args.to_vec(), ctx.clone()).await
    }
}
