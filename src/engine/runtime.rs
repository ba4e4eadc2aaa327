// src/engine/runtime.rs

use std::fmt;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::errors::Result;
use crate::exec::ExecutorBackend;
use crate::reload::ReloadNotifier;

use super::core::CoreRuntime;
use super::{CoreCommand, RuntimeEvent};

/// Drives watch-mode re-runs in response to `RuntimeEvent`s, delegating task
/// execution to an `ExecutorBackend` and reload pushes to a `ReloadNotifier`.
///
/// This is a pure IO shell around `CoreRuntime`, which contains all the
/// runtime semantics.
pub struct Runtime<E: ExecutorBackend, N: ReloadNotifier> {
    core: CoreRuntime,
    event_rx: mpsc::Receiver<RuntimeEvent>,
    executor: E,
    notifier: N,
}

impl<E: ExecutorBackend, N: ReloadNotifier> fmt::Debug for Runtime<E, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .finish_non_exhaustive()
    }
}

impl<E: ExecutorBackend, N: ReloadNotifier> Runtime<E, N> {
    pub fn new(
        core: CoreRuntime,
        event_rx: mpsc::Receiver<RuntimeEvent>,
        executor: E,
        notifier: N,
    ) -> Self {
        Self {
            core,
            event_rx,
            executor,
            notifier,
        }
    }

    /// Main event loop.
    ///
    /// Returns the final core state so callers can inspect run counters.
    pub async fn run(mut self) -> Result<CoreRuntime> {
        info!("assetdag watch runtime started");

        loop {
            let event = match self.event_rx.recv().await {
                Some(e) => e,
                None => {
                    info!("runtime event channel closed; exiting");
                    break;
                }
            };

            debug!(?event, "runtime received event");

            let step = self.core.step(event);

            for command in step.commands {
                self.execute_command(command).await?;
            }

            if !step.keep_running {
                info!("core requested exit; stopping runtime");
                break;
            }
        }

        info!("runtime exiting");
        Ok(self.core)
    }

    async fn execute_command(&mut self, command: CoreCommand) -> Result<()> {
        match command {
            CoreCommand::DispatchTask(task) => {
                debug!(task = %task, "spawning task");
                self.executor.spawn_task(task).await?;
            }
            CoreCommand::NotifyReload(path) => {
                self.notifier.notify(&path);
            }
            CoreCommand::RequestExit => {
                info!("core issued RequestExit command");
            }
        }
        Ok(())
    }
}
