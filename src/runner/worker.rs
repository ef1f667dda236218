// src/runner/worker.rs

//! Scheduler worker that runs one task instance.

use std::sync::Arc;
use std::time::Instant;

use anyhow::anyhow;

use crate::context::BuildContext;
use crate::dag::{NodeResult, Worker, WorkerFactory, WorkerFuture};
use crate::logging::LogBuffer;
use crate::task::{Task, TaskBody, TaskResult};

pub struct TaskWorker {
    ctx: Arc<BuildContext>,
    task: Arc<Task>,
}

impl TaskWorker {
    pub fn new(ctx: Arc<BuildContext>, task: Arc<Task>) -> Self {
        Self { ctx, task }
    }
}

impl Worker<Arc<Task>> for TaskWorker {
    fn name(&self) -> String {
        self.task.qualified_name()
    }

    fn call(self: Box<Self>) -> WorkerFuture<Arc<Task>> {
        Box::pin(async move {
            let TaskWorker { ctx, task } = *self;
            let mut log = LogBuffer::new(task.qualified_name());
            ctx.task_start(&task);
            let started = Instant::now();

            let result = if ctx.options().dry_run {
                log.info(format!("(dry run) {}", task.qualified_name()));
                TaskResult::ok()
            } else {
                log.info(format!("--- {}", task.qualified_name()));
                let body_ctx = Arc::clone(&ctx);
                let body_task = Arc::clone(&task);
                let (result, lines) =
                    tokio::task::spawn_blocking(move || execute(&body_ctx, &body_task))
                        .await
                        .map_err(|e| anyhow!("task {} panicked: {e}", task.qualified_name()))??;
                log.extend(lines);
                result
            };

            let elapsed = started.elapsed();
            match &result.error_message {
                Some(message) if !result.success => {
                    log.error(format!("{} failed: {message}", task.qualified_name()));
                }
                _ if !result.success => log.error(format!("{} failed", task.qualified_name())),
                _ => {}
            }
            log.debug(format!("{}: {} ms", task.qualified_name(), elapsed.as_millis()));
            ctx.task_end(&task, result.success, elapsed);

            Ok::<_, anyhow::Error>(NodeResult::new(task, result).with_log(log))
        })
    }
}

/// Run the task body on the current (blocking) thread.
fn execute(ctx: &BuildContext, task: &Task) -> anyhow::Result<(TaskResult, LogBuffer)> {
    let mut log = LogBuffer::new(task.qualified_name());
    let result = match &task.body {
        TaskBody::Plain(body) => body(&task.project)?,
        TaskBody::Incremental(body) => {
            let info = body(&task.project)?;
            let key = task.qualified_name();
            let upstream_dirty = ctx.depends_on_dirty(&task.project);
            let outcome = ctx.gate().run(&key, &task.project, info, upstream_dirty)?;
            if outcome.decision.must_run() {
                log.debug(format!("{key}: running ({})", outcome.decision));
            } else {
                log.info(format!("{key}: up to date"));
            }
            if outcome.result.success && outcome.decision.marks_dirty() {
                ctx.mark_dirty(&task.project.name);
            }
            outcome.result
        }
    };
    Ok((result, log))
}

pub struct TaskWorkerFactory {
    ctx: Arc<BuildContext>,
}

impl TaskWorkerFactory {
    pub fn new(ctx: Arc<BuildContext>) -> Self {
        Self { ctx }
    }
}

impl WorkerFactory<Arc<Task>> for TaskWorkerFactory {
    fn create_workers(&self, nodes: Vec<Arc<Task>>) -> Vec<Box<dyn Worker<Arc<Task>>>> {
        nodes
            .into_iter()
            .map(|task| Box::new(TaskWorker::new(Arc::clone(&self.ctx), task)) as Box<dyn Worker<_>>)
            .collect()
    }
}
