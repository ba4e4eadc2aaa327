use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use assetdag::engine::RuntimeEvent;
use assetdag::errors::{Result, StepError};
use assetdag::exec::ExecutorBackend;
use assetdag::graph::{Job, JobFuture, RunResult};
use assetdag::reload::ReloadNotifier;
use tokio::sync::mpsc;

/// A fake executor that records which tasks were dispatched.
///
/// With `auto_complete`, it immediately reports `TaskCompleted(Completed)`;
/// otherwise the test sends completions itself, which keeps tasks "in flight"
/// for as long as the test wants.
pub struct FakeExecutor {
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    executed: Arc<Mutex<Vec<String>>>,
    auto_complete: bool,
}

impl FakeExecutor {
    pub fn new(runtime_tx: mpsc::Sender<RuntimeEvent>, executed: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            runtime_tx,
            executed,
            auto_complete: true,
        }
    }

    pub fn manual(
        runtime_tx: mpsc::Sender<RuntimeEvent>,
        executed: Arc<Mutex<Vec<String>>>,
    ) -> Self {
        Self {
            runtime_tx,
            executed,
            auto_complete: false,
        }
    }
}

impl ExecutorBackend for FakeExecutor {
    fn spawn_task(
        &mut self,
        task: String,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let tx = self.runtime_tx.clone();
        let executed = Arc::clone(&self.executed);
        let auto_complete = self.auto_complete;

        Box::pin(async move {
            executed.lock().unwrap().push(task.clone());

            if auto_complete {
                tx.send(RuntimeEvent::TaskCompleted {
                    task,
                    result: RunResult::Completed,
                })
                .await
                .map_err(anyhow::Error::from)?;
            }
            Ok(())
        })
    }
}

/// Reload notifier that records every pushed path.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    pub paths: Arc<Mutex<Vec<String>>>,
}

impl ReloadNotifier for RecordingNotifier {
    fn notify(&mut self, changed_path: &str) {
        self.paths.lock().unwrap().push(changed_path.to_string());
    }
}

/// Counters shared by every invocation of a [`ScriptedJob`].
#[derive(Debug, Default)]
pub struct ScriptedStats {
    pub invocations: AtomicUsize,
    pub running: AtomicUsize,
    pub max_running: AtomicUsize,
}

impl ScriptedStats {
    pub fn invocations(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }

    pub fn max_running(&self) -> usize {
        self.max_running.load(Ordering::SeqCst)
    }
}

/// Leaf job for graph tests.
///
/// Appends `start:<name>` / `end:<name>` to a shared log, sleeps for `delay`
/// in between, and fails with a transform error when configured to.
#[derive(Debug)]
pub struct ScriptedJob {
    name: String,
    log: Arc<Mutex<Vec<String>>>,
    delay: Duration,
    fail: bool,
    stats: Arc<ScriptedStats>,
}

impl ScriptedJob {
    pub fn new(name: &str, log: &Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            name: name.to_string(),
            log: Arc::clone(log),
            delay: Duration::from_millis(0),
            fail: false,
            stats: Arc::new(ScriptedStats::default()),
        }
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn stats(&self) -> Arc<ScriptedStats> {
        Arc::clone(&self.stats)
    }

    pub fn into_job(self) -> Arc<dyn Job> {
        Arc::new(self)
    }
}

impl Job for ScriptedJob {
    fn run(self: Arc<Self>) -> JobFuture {
        Box::pin(async move {
            self.stats.invocations.fetch_add(1, Ordering::SeqCst);
            let now = self.stats.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.stats.max_running.fetch_max(now, Ordering::SeqCst);
            self.log.lock().unwrap().push(format!("start:{}", self.name));

            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }

            self.log.lock().unwrap().push(format!("end:{}", self.name));
            self.stats.running.fetch_sub(1, Ordering::SeqCst);

            if self.fail {
                return Err(StepError::Transform {
                    transform: "scripted".to_string(),
                    message: format!("{} failed on purpose", self.name),
                });
            }
            Ok(())
        })
    }
}
