use std::collections::{BTreeSet, HashSet};

use assetdag::config::{ConfigFile, RawConfigFile, TaskConfig};
use assetdag::engine::{
    CoreCommand, CoreRuntime, RuntimeEvent, RuntimeOptions, TriggerReason,
    TriggerWhileRunningBehaviour,
};
use assetdag::errors::AssetdagError;
use assetdag::graph::RunResult;
use assetdag_test_utils::builders::{asset_paths, ConfigFileBuilder, StepConfigBuilder};
use proptest::prelude::*;

/// A composite: sequence or parallel, with indices of leaves and of earlier
/// composites as children.
#[derive(Debug, Clone)]
struct Composite {
    sequence: bool,
    leaves: BTreeSet<usize>,
    groups: BTreeSet<usize>,
}

// Acyclic by construction: group i may only name groups below i. Group i > 0
// always names group i - 1 so the groups form a chain.
fn composites_strategy(max_leaves: usize, max_groups: usize) -> impl Strategy<Value = (usize, Vec<Composite>)> {
    (1..=max_leaves, 1..=max_groups).prop_flat_map(|(leaves, groups)| {
        let one = (
            any::<bool>(),
            proptest::collection::btree_set(0..leaves, 0..=leaves),
            proptest::collection::btree_set(any::<usize>(), 0..3),
        );
        proptest::collection::vec(one, groups).prop_map(move |raw| {
            let composites = raw
                .into_iter()
                .enumerate()
                .map(|(i, (sequence, mut leaf_set, raw_groups))| {
                    let mut group_set: BTreeSet<usize> = BTreeSet::new();
                    if i > 0 {
                        group_set.extend(raw_groups.into_iter().map(|g| g % i));
                        group_set.insert(i - 1);
                    } else {
                        leaf_set.insert(0);
                    }
                    Composite {
                        sequence,
                        leaves: leaf_set,
                        groups: group_set,
                    }
                })
                .collect();
            (leaves, composites)
        })
    })
}

fn children(c: &Composite) -> Vec<String> {
    c.leaves
        .iter()
        .map(|l| format!("leaf_{l}"))
        .chain(c.groups.iter().map(|g| format!("group_{g}")))
        .collect()
}

fn task_config(sequence: bool, children: Vec<String>) -> TaskConfig {
    if sequence {
        TaskConfig {
            sequence: Some(children),
            parallel: None,
        }
    } else {
        TaskConfig {
            sequence: None,
            parallel: Some(children),
        }
    }
}

fn raw_config(leaves: usize, composites: &[Composite]) -> RawConfigFile {
    let mut builder = ConfigFileBuilder::new()
        .with_memory_stamps()
        .with_paths("images", asset_paths(&["src/img/*"], Some("img"), None));
    for l in 0..leaves {
        builder = builder.with_step(&format!("leaf_{l}"), StepConfigBuilder::new("images").build());
    }
    for (i, c) in composites.iter().enumerate() {
        builder = builder.with_task(&format!("group_{i}"), task_config(c.sequence, children(c)));
    }
    builder.raw()
}

proptest! {
    #[test]
    fn acyclic_composites_validate((leaves, composites) in composites_strategy(6, 6)) {
        let cfg = ConfigFile::try_from(raw_config(leaves, &composites));
        prop_assert!(cfg.is_ok(), "{:?}", cfg.err());
    }

    #[test]
    fn back_edge_is_rejected_as_cycle((leaves, composites) in composites_strategy(6, 6)) {
        let mut raw = raw_config(leaves, &composites);
        let last = composites.len() - 1;

        // group_0 is reachable from every group; naming the last one closes a loop.
        let mut first = children(&composites[0]);
        first.push(format!("group_{last}"));
        raw.task.insert("group_0".to_string(), task_config(composites[0].sequence, first));

        let err = ConfigFile::try_from(raw).unwrap_err();
        prop_assert!(matches!(err, AssetdagError::DagCycle(_)), "{err:?}");
    }

    #[test]
    fn guard_never_overlaps_a_task(ops in proptest::collection::vec((0..3usize, any::<bool>()), 1..60)) {
        let mut core = CoreRuntime::new(TriggerWhileRunningBehaviour::Queue, RuntimeOptions::default());
        let mut running: HashSet<String> = HashSet::new();

        for (idx, is_trigger) in ops {
            let task = format!("task_{idx}");
            let event = if is_trigger {
                RuntimeEvent::TaskTriggered { task: task.clone(), reason: TriggerReason::FileWatch }
            } else if running.contains(&task) {
                RuntimeEvent::TaskCompleted { task: task.clone(), result: RunResult::Completed }
            } else {
                continue;
            };

            let was_running = running.contains(&task);
            let dispatched = core
                .step(event)
                .commands
                .contains(&CoreCommand::DispatchTask(task.clone()));

            if is_trigger {
                prop_assert_eq!(dispatched, !was_running);
                running.insert(task.clone());
            } else if !dispatched {
                running.remove(&task);
            }
            prop_assert_eq!(core.is_running(&task), running.contains(&task));
        }
    }
}
