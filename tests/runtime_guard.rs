// tests/runtime_guard.rs

mod common;
use crate::common::fake_executor::{FakeExecutor, ScriptedJob, RecordingNotifier};
use crate::common::{init_tracing, new_log, with_timeout};

use std::sync::{Arc, Mutex};
use std::time::Duration;

use assetdag::engine::{
    CoreCommand, CoreRuntime, Runtime, RuntimeEvent, RuntimeOptions, TriggerReason,
    TriggerWhileRunningBehaviour,
};
use assetdag::errors::StepError;
use assetdag::exec::GraphExecutorBackend;
use assetdag::graph::{RunResult, TaskGraphBuilder};
use assetdag::reload::NoopNotifier;
use tokio::sync::mpsc;

fn trigger(task: &str) -> RuntimeEvent {
    RuntimeEvent::TaskTriggered {
        task: task.to_string(),
        reason: TriggerReason::FileWatch,
    }
}

fn completed(task: &str) -> RuntimeEvent {
    RuntimeEvent::TaskCompleted {
        task: task.to_string(),
        result: RunResult::Completed,
    }
}

fn dispatch(task: &str) -> Vec<CoreCommand> {
    vec![CoreCommand::DispatchTask(task.to_string())]
}

#[test]
fn triggers_during_a_run_collapse_into_one_rerun() {
    let mut core = CoreRuntime::new(TriggerWhileRunningBehaviour::Queue, RuntimeOptions::default());

    assert_eq!(core.step(trigger("styles")).commands, dispatch("styles"));
    assert!(core.step(trigger("styles")).commands.is_empty());
    assert!(core.step(trigger("styles")).commands.is_empty());
    assert!(core.is_running("styles"));

    let after_first = core.step(completed("styles"));
    assert_eq!(after_first.commands, dispatch("styles"));
    assert!(after_first.keep_running);
    assert!(core.is_running("styles"));

    assert!(core.step(completed("styles")).commands.is_empty());
    assert!(core.is_idle());
    assert_eq!(core.completed_runs(), 2);
}

#[test]
fn ignore_drops_triggers_while_running() {
    let mut core =
        CoreRuntime::new(TriggerWhileRunningBehaviour::Ignore, RuntimeOptions::default());

    assert_eq!(core.step(trigger("scripts")).commands, dispatch("scripts"));
    assert!(core.step(trigger("scripts")).commands.is_empty());

    assert!(core.step(completed("scripts")).commands.is_empty());
    assert!(core.is_idle());
}

#[test]
fn different_tasks_run_independently() {
    let mut core = CoreRuntime::new(TriggerWhileRunningBehaviour::Queue, RuntimeOptions::default());

    assert_eq!(core.step(trigger("styles")).commands, dispatch("styles"));
    assert_eq!(core.step(trigger("scripts")).commands, dispatch("scripts"));

    core.step(completed("scripts"));
    assert!(core.is_running("styles"));
    assert!(!core.is_running("scripts"));
}

#[test]
fn failed_runs_are_counted_and_do_not_stop_the_session() {
    let mut core = CoreRuntime::new(TriggerWhileRunningBehaviour::Queue, RuntimeOptions::default());
    core.step(trigger("styles"));

    let step = core.step(RuntimeEvent::TaskCompleted {
        task: "styles".to_string(),
        result: RunResult::failed(
            "styles",
            StepError::Transform {
                transform: "scss".to_string(),
                message: "Undefined variable.".to_string(),
            },
        ),
    });

    assert!(step.keep_running);
    assert_eq!(core.failed_runs(), 1);
    assert_eq!(core.step(trigger("styles")).commands, dispatch("styles"));
}

#[test]
fn exit_when_idle_requests_exit_after_last_completion() {
    let options = RuntimeOptions {
        exit_when_idle: true,
    };
    let mut core = CoreRuntime::new(TriggerWhileRunningBehaviour::Queue, options);
    core.step(trigger("styles"));

    let step = core.step(completed("styles"));

    assert!(!step.keep_running);
    assert_eq!(step.commands, vec![CoreCommand::RequestExit]);
}

#[test]
fn reload_and_shutdown_events() {
    let mut core = CoreRuntime::new(TriggerWhileRunningBehaviour::Queue, RuntimeOptions::default());

    let reload = core.step(RuntimeEvent::ReloadRequested {
        path: "index.html".to_string(),
    });
    assert_eq!(
        reload.commands,
        vec![CoreCommand::NotifyReload("index.html".to_string())]
    );
    assert!(reload.keep_running);

    assert!(!core.step(RuntimeEvent::ShutdownRequested).keep_running);
}

#[tokio::test]
async fn runtime_dispatches_one_rerun_for_triggers_in_flight() {
    init_tracing();
    let (tx, rx) = mpsc::channel(16);
    let executed = Arc::new(Mutex::new(Vec::new()));
    let executor = FakeExecutor::manual(tx.clone(), Arc::clone(&executed));
    let core = CoreRuntime::new(TriggerWhileRunningBehaviour::Queue, RuntimeOptions::default());

    for event in [
        trigger("styles"),
        trigger("styles"),
        trigger("styles"),
        completed("styles"),
        completed("styles"),
        RuntimeEvent::ShutdownRequested,
    ] {
        tx.send(event).await.unwrap();
    }

    let runtime = Runtime::new(core, rx, executor, NoopNotifier);
    let core = with_timeout(runtime.run()).await.unwrap();

    assert_eq!(*executed.lock().unwrap(), vec!["styles", "styles"]);
    assert_eq!(core.completed_runs(), 2);
    assert!(core.is_idle());
}

#[tokio::test]
async fn runtime_pushes_reloads_to_the_notifier() {
    init_tracing();
    let (tx, rx) = mpsc::channel(16);
    let executor = FakeExecutor::new(tx.clone(), Arc::new(Mutex::new(Vec::new())));
    let notifier = RecordingNotifier::default();
    let paths = Arc::clone(&notifier.paths);
    let core = CoreRuntime::new(TriggerWhileRunningBehaviour::Queue, RuntimeOptions::default());

    tx.send(RuntimeEvent::ReloadRequested {
        path: "css/app.min.css".to_string(),
    })
    .await
    .unwrap();
    tx.send(RuntimeEvent::ShutdownRequested).await.unwrap();

    with_timeout(Runtime::new(core, rx, executor, notifier).run())
        .await
        .unwrap();

    assert_eq!(*paths.lock().unwrap(), vec!["css/app.min.css"]);
}

#[tokio::test]
async fn graph_backend_never_overlaps_runs_of_one_task() {
    init_tracing();
    let log = new_log();
    let job = ScriptedJob::new("styles", &log).delay(Duration::from_millis(50));
    let stats = job.stats();
    let graph = Arc::new(
        TaskGraphBuilder::new()
            .leaf("styles", job.into_job())
            .build()
            .unwrap(),
    );

    let (tx, rx) = mpsc::channel(16);
    let executor = GraphExecutorBackend::new(graph, tx.clone());
    let core = CoreRuntime::new(
        TriggerWhileRunningBehaviour::Queue,
        RuntimeOptions {
            exit_when_idle: true,
        },
    );

    for _ in 0..3 {
        tx.send(trigger("styles")).await.unwrap();
    }

    let core = with_timeout(Runtime::new(core, rx, executor, NoopNotifier).run())
        .await
        .unwrap();

    assert_eq!(stats.invocations(), 2);
    assert_eq!(stats.max_running(), 1);
    assert_eq!(core.completed_runs(), 2);
    assert_eq!(core.failed_runs(), 0);
}
