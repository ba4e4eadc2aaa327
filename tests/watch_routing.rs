// tests/watch_routing.rs

mod common;
use crate::common::builders::{asset_paths, watch_reload, watch_task};

use std::collections::BTreeMap;
use std::path::Path;

use assetdag::config::{AssetPaths, WatchRuleConfig};
use assetdag::engine::RuntimeEvent;
use assetdag::fs::mock::MockFileSystem;
use assetdag::watch::{build_watch_rules, route_change, ContentCache, WatchContext, WatchRule};

/// Compact view of routed events.
fn describe(events: &[RuntimeEvent]) -> Vec<String> {
    events
        .iter()
        .map(|e| match e {
            RuntimeEvent::TaskTriggered { task, .. } => format!("task:{task}"),
            RuntimeEvent::ReloadRequested { path } => format!("reload:{path}"),
            other => format!("{other:?}"),
        })
        .collect()
}

fn dev_paths() -> BTreeMap<String, AssetPaths> {
    let mut scripts = asset_paths(&["src/js/**/*.js"], Some("js"), Some("dist/js"));
    scripts.watch = Some(vec!["src/js/**/*.js".to_string(), "!src/js/vendor/**".to_string()]);

    BTreeMap::from([
        (
            "styles".to_string(),
            asset_paths(&["src/styles/**/*.scss"], Some("css"), Some("dist/css")),
        ),
        ("scripts".to_string(), scripts),
    ])
}

fn dev_rules() -> Vec<WatchRule> {
    let configs = vec![
        watch_task("src/styles/**/*.scss", "styles"),
        WatchRuleConfig {
            asset: Some("scripts".to_string()),
            task: Some("scripts".to_string()),
            ..WatchRuleConfig::default()
        },
        watch_task("src/js/**/*.js", "scripts"),
        watch_reload("*.html"),
        watch_reload("css/**/*.css"),
        watch_reload("js/**/*.js"),
    ];
    build_watch_rules(&configs, &dev_paths()).unwrap()
}

fn route(fs: &MockFileSystem, rules: &[WatchRule], path: &str) -> Vec<String> {
    let ctx = WatchContext {
        root: Path::new("."),
        state_dir: ".assetdag",
        rules,
        fs,
    };
    describe(&route_change(&ctx, Path::new(path), &mut ContentCache::new()))
}

#[test]
fn html_change_only_reloads() {
    let fs = MockFileSystem::new();
    assert_eq!(route(&fs, &dev_rules(), "./index.html"), vec!["reload:index.html"]);
}

#[test]
fn source_change_triggers_its_task_once() {
    let fs = MockFileSystem::new();
    let rules = dev_rules();

    // Two rules name `scripts`; the task is triggered once.
    assert_eq!(route(&fs, &rules, "./src/js/app.js"), vec!["task:scripts"]);
    assert_eq!(route(&fs, &rules, "./src/styles/site.scss"), vec!["task:styles"]);
}

#[test]
fn built_output_reloads_without_rebuilding() {
    let fs = MockFileSystem::new();
    let rules = dev_rules();

    assert_eq!(route(&fs, &rules, "./css/app.min.css"), vec!["reload:css/app.min.css"]);
    assert_eq!(route(&fs, &rules, "./js/app.js"), vec!["reload:js/app.js"]);
}

#[test]
fn unrelated_and_state_paths_are_ignored() {
    let fs = MockFileSystem::new();
    let rules = dev_rules();

    assert!(route(&fs, &rules, "./README.md").is_empty());
    assert!(route(&fs, &rules, "./.assetdag/last_run").is_empty());
    assert!(route(&fs, &rules, "/somewhere/else/index.html").is_empty());
}

#[test]
fn negated_watch_globs_exclude_paths() {
    let fs = MockFileSystem::new();
    let configs = vec![WatchRuleConfig {
        asset: Some("scripts".to_string()),
        task: Some("scripts".to_string()),
        ..WatchRuleConfig::default()
    }];
    let rules = build_watch_rules(&configs, &dev_paths()).unwrap();

    assert_eq!(route(&fs, &rules, "./src/js/app.js"), vec!["task:scripts"]);
    assert!(route(&fs, &rules, "./src/js/vendor/jquery.js").is_empty());
}

#[test]
fn task_triggers_come_before_the_reload() {
    let fs = MockFileSystem::new();
    let configs = vec![
        watch_reload("src/**/*"),
        watch_task("src/styles/*.scss", "styles"),
        watch_task("src/**/*.scss", "lint"),
    ];
    let rules = build_watch_rules(&configs, &dev_paths()).unwrap();

    assert_eq!(
        route(&fs, &rules, "./src/styles/a.scss"),
        vec!["task:styles", "task:lint", "reload:src/styles/a.scss"]
    );
}

#[test]
fn hashed_rules_skip_unchanged_content() {
    let fs = MockFileSystem::new();
    fs.add_file("./src/styles/a.scss", ".a { color: red; }");

    let mut config = watch_task("src/styles/*.scss", "styles");
    config.use_hash = true;
    let rules = build_watch_rules(&[config, watch_reload("src/**/*")], &dev_paths()).unwrap();
    let ctx = WatchContext {
        root: Path::new("."),
        state_dir: ".assetdag",
        rules: &rules,
        fs: &fs,
    };
    let path = Path::new("./src/styles/a.scss");
    let mut cache = ContentCache::new();

    assert_eq!(
        describe(&route_change(&ctx, path, &mut cache)),
        vec!["task:styles", "reload:src/styles/a.scss"]
    );

    // Same bytes again: the hashed rule stays quiet, the plain rule still fires.
    assert_eq!(
        describe(&route_change(&ctx, path, &mut cache)),
        vec!["reload:src/styles/a.scss"]
    );

    fs.add_file("./src/styles/a.scss", ".a { color: blue; }");
    assert_eq!(
        describe(&route_change(&ctx, path, &mut cache)),
        vec!["task:styles", "reload:src/styles/a.scss"]
    );
    assert_eq!(cache.len(), 1);
}

#[test]
fn rule_without_includes_is_rejected() {
    let err = WatchRule::new(
        "only-negated",
        &["!src/**"],
        assetdag::watch::WatchAction::Reload,
        false,
    )
    .unwrap_err();
    assert!(err.to_string().contains("only-negated"), "{err}");
}
