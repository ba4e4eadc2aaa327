// tests/step_runner.rs

mod common;
use crate::common::builders::{asset_paths, mode, ConfigFileBuilder, StepConfigBuilder};
use crate::common::init_tracing;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use assetdag::config::TransformSpec;
use assetdag::errors::StepError;
use assetdag::fs::mock::MockFileSystem;
use assetdag::fs::{FileSystem, RealFileSystem};
use assetdag::graph::{BuildContext, RunResult};
use assetdag::mode::ModeRunner;
use assetdag::step::{
    open_stamp_store, CleanStep, FileSet, SourceSet, StampStore, Step, Transform, TransformError,
};
use assetdag::types::{AssetLocation, Mode, StampStorageMode};

/// Records the size of every file set it sees.
#[derive(Debug, Default)]
struct RecordingTransform {
    seen: Arc<Mutex<Vec<usize>>>,
}

impl Transform for RecordingTransform {
    fn name(&self) -> &str {
        "record"
    }

    fn apply(&self, files: FileSet) -> Result<FileSet, TransformError> {
        self.seen.lock().unwrap().push(files.len());
        Ok(files)
    }
}

#[derive(Debug)]
struct FailingTransform;

impl Transform for FailingTransform {
    fn name(&self) -> &str {
        "explode"
    }

    fn apply(&self, _files: FileSet) -> Result<FileSet, TransformError> {
        Err(TransformError::new("explode", "bad input"))
    }
}

fn mock_ctx(fs: &MockFileSystem, stamps: StampStorageMode) -> BuildContext {
    let fs: Arc<dyn FileSystem> = Arc::new(fs.clone());
    BuildContext {
        root: PathBuf::from("."),
        stamps: open_stamp_store(stamps, PathBuf::from("./.assetdag"), Arc::clone(&fs)),
        fs,
    }
}

fn sources(patterns: &[&str]) -> SourceSet {
    let patterns: Vec<String> = patterns.iter().map(|s| s.to_string()).collect();
    SourceSet::new(&patterns).unwrap()
}

fn an_hour_ago() -> SystemTime {
    SystemTime::now() - Duration::from_secs(3600)
}

fn write(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, contents).unwrap();
}

fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

fn styles_runner(root: &Path) -> ModeRunner {
    let cfg = ConfigFileBuilder::new()
        .with_memory_stamps()
        .with_paths(
            "styles",
            asset_paths(&["src/styles/*.scss", "src/styles/*.css"], Some("css"), None),
        )
        .with_step(
            "styles",
            StepConfigBuilder::new("styles")
                .transform(TransformSpec::Scss { compressed: true })
                .transform(TransformSpec::Concat {
                    file: "app.css".to_string(),
                    separator: "\n".to_string(),
                })
                .transform(TransformSpec::Rename {
                    prefix: String::new(),
                    suffix: ".min".to_string(),
                    extension: None,
                })
                .build(),
        )
        .with_mode(Mode::Prod, mode("styles"))
        .build();

    ModeRunner::new(cfg, root).unwrap()
}

#[tokio::test]
async fn styles_step_produces_single_minified_bundle() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "src/styles/a.scss", "$c: #333;\n.a { color: $c; }\n");
    write(dir.path(), "src/styles/b.css", ".b { margin: 0; }\n");

    let result = styles_runner(dir.path()).run_mode(Mode::Prod, false).await.unwrap();

    assert_eq!(result, RunResult::Completed);
    assert_eq!(file_names(&dir.path().join("css")), vec!["app.min.css"]);
    let css = std::fs::read_to_string(dir.path().join("css/app.min.css")).unwrap();
    assert!(css.contains(".a{color:#333}"), "{css}");
    assert!(css.contains(".b{margin:0}"), "{css}");
    assert!(css.find(".a{").unwrap() < css.find(".b{").unwrap());
}

#[tokio::test]
async fn scss_syntax_error_fails_prod_and_writes_nothing() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "src/styles/a.scss", ".a { color: $undefined; }\n");
    write(dir.path(), "src/styles/b.css", ".b { margin: 0; }\n");

    let result = styles_runner(dir.path()).run_mode(Mode::Prod, false).await.unwrap();

    let failures = result.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].task, "styles");
    match &failures[0].error {
        StepError::Transform { transform, message } => {
            assert_eq!(transform, "scss");
            assert!(message.contains("a.scss"), "{message}");
        }
        other => panic!("expected transform error, got {other:?}"),
    }
    assert!(!dir.path().join("css").exists());
}

#[tokio::test]
async fn only_changed_filter_hands_empty_set_on_second_run() {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_file_with_mtime("./src/img/a.png", "a", an_hour_ago());
    fs.add_file_with_mtime("./src/img/b.png", "b", an_hour_ago());
    let ctx = mock_ctx(&fs, StampStorageMode::Memory);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorder: Arc<dyn Transform> = Arc::new(RecordingTransform { seen: Arc::clone(&seen) });
    let step = Step::new("images", sources(&["src/img/*"]), vec![recorder], "./img", &ctx)
        .since_last_run(true);

    let first = step.run_blocking().unwrap();
    assert_eq!((first.matched, first.processed, first.written), (2, 2, 2));

    let second = step.run_blocking().unwrap();
    assert_eq!((second.matched, second.processed, second.written), (2, 0, 0));

    fs.add_file_with_mtime("./src/img/b.png", "b2", SystemTime::now() + Duration::from_secs(5));
    let third = step.run_blocking().unwrap();
    assert_eq!(third.processed, 1);
    assert_eq!(fs.read(Path::new("./img/b.png")).unwrap(), b"b2");

    assert_eq!(*seen.lock().unwrap(), vec![2, 0, 1]);
}

#[tokio::test]
async fn file_stamps_are_persisted_under_state_dir() {
    let fs = MockFileSystem::new();
    fs.add_file_with_mtime("./src/img/a.png", "a", an_hour_ago());
    let ctx = mock_ctx(&fs, StampStorageMode::File);

    let step = Step::new("images", sources(&["src/img/*"]), Vec::new(), "./img", &ctx)
        .since_last_run(true);
    step.run_blocking().unwrap();

    let stamps = String::from_utf8(fs.read(Path::new("./.assetdag/last_run")).unwrap()).unwrap();
    assert!(stamps.starts_with("images "), "{stamps}");

    // The persisted stamp filters the unchanged file.
    let again = step.run_blocking().unwrap();
    assert_eq!(again.processed, 0);
}

#[test]
fn emptied_destination_makes_the_next_run_rebuild_everything() {
    let fs = MockFileSystem::new();
    fs.add_file_with_mtime("./src/img/a.png", "a", an_hour_ago());
    fs.add_file_with_mtime("./src/img/b.png", "b", an_hour_ago());
    let ctx = mock_ctx(&fs, StampStorageMode::File);

    let step = Step::new("images", sources(&["src/img/*"]), Vec::new(), "./img", &ctx)
        .since_last_run(true);
    assert_eq!(step.run_blocking().unwrap().processed, 2);

    for entry in fs.read_dir(Path::new("./img")).unwrap() {
        fs.remove(&entry).unwrap();
    }

    // The stamp is still on disk, but there is nothing left to keep.
    let again = step.run_blocking().unwrap();
    assert_eq!((again.processed, again.written), (2, 2));
    assert!(fs.is_file(Path::new("./img/a.png")));
    assert!(fs.is_file(Path::new("./img/b.png")));
}

#[test]
fn clean_drops_stamps_of_steps_writing_below_it() {
    let cfg = ConfigFileBuilder::new()
        .with_memory_stamps()
        .with_paths("images", asset_paths(&["src/img/*"], Some("img"), None))
        .with_paths("icons", asset_paths(&["src/icons/*"], Some("img/icons"), None))
        .with_paths("scripts", asset_paths(&["src/js/*"], Some("js"), None))
        .with_paths("video", asset_paths(&["src/video/*"], Some("video"), None))
        .with_step("images", StepConfigBuilder::new("images").since_last_run(true).build())
        .with_step("icons", StepConfigBuilder::new("icons").since_last_run(true).build())
        .with_step("scripts", StepConfigBuilder::new("scripts").since_last_run(true).build())
        .with_step("video", StepConfigBuilder::new("video").build())
        .with_clean("img:clean", &["images", "video"], AssetLocation::Dest)
        .with_sequence("build", &["img:clean", "images", "icons", "scripts", "video"])
        .with_mode(Mode::Prod, mode("build"))
        .build();
    let fs = MockFileSystem::new();
    let ctx = mock_ctx(&fs, StampStorageMode::Memory);

    let clean = CleanStep::from_config("img:clean", &cfg.cleans()["img:clean"], &cfg, &ctx).unwrap();
    assert_eq!(clean.stale_steps(), ["icons", "images"]);

    {
        let mut store = ctx.stamps.lock().unwrap();
        for step in ["images", "icons", "scripts"] {
            store.save(step, an_hour_ago()).unwrap();
        }
    }
    clean.run_blocking().unwrap();

    let store = ctx.stamps.lock().unwrap();
    assert_eq!(store.load("images").unwrap(), None);
    assert_eq!(store.load("icons").unwrap(), None);
    assert!(store.load("scripts").unwrap().is_some());
}

#[test]
fn absolute_source_patterns_are_walked_outside_the_root() {
    let shared = tempfile::tempdir().unwrap();
    let project = tempfile::tempdir().unwrap();
    write(shared.path(), "theme/app.css", ".a { margin: 0; }");
    write(shared.path(), "theme/print/print.css", ".p { color: #000; }");
    write(shared.path(), "theme/drafts/wip.css", ".w {}");

    let patterns = vec![
        format!("{}/theme/**/*.css", shared.path().display()),
        format!("!{}/theme/drafts/**", shared.path().display()),
    ];
    let files = SourceSet::new(&patterns)
        .unwrap()
        .collect(&RealFileSystem, project.path())
        .unwrap();

    let rel: Vec<PathBuf> = files.iter().map(|f| f.rel.clone()).collect();
    assert_eq!(rel, vec![PathBuf::from("app.css"), PathBuf::from("print/print.css")]);
    assert!(files.iter().all(|f| f.abs.starts_with(shared.path())));
}

#[tokio::test]
async fn absolute_sources_and_destination_build_through_a_step() {
    init_tracing();
    let shared = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let project = tempfile::tempdir().unwrap();
    write(shared.path(), "fonts/spa.woff2", "font");

    let src = format!("{}/fonts/*", shared.path().display());
    let dest = out.path().join("fonts").display().to_string();
    let cfg = ConfigFileBuilder::new()
        .with_memory_stamps()
        .with_paths("fonts", asset_paths(&[src.as_str()], Some(dest.as_str()), None))
        .with_step("fonts", StepConfigBuilder::new("fonts").require_input(true).build())
        .with_mode(Mode::Prod, mode("fonts"))
        .build();

    let result = ModeRunner::new(cfg, project.path())
        .unwrap()
        .run_mode(Mode::Prod, false)
        .await
        .unwrap();

    assert_eq!(result, RunResult::Completed);
    assert_eq!(file_names(&out.path().join("fonts")), vec!["spa.woff2"]);
}

#[test]
fn failed_transform_skips_the_rest_and_writes_nothing() {
    let fs = MockFileSystem::new();
    fs.add_file("./src/js/app.js", "let a = 1;");
    let ctx = mock_ctx(&fs, StampStorageMode::Memory);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let transforms: Vec<Arc<dyn Transform>> = vec![
        Arc::new(FailingTransform),
        Arc::new(RecordingTransform { seen: Arc::clone(&seen) }),
    ];
    let step = Step::new("scripts", sources(&["src/js/*.js"]), transforms, "./js", &ctx)
        .since_last_run(true);

    let err = step.run_blocking().unwrap_err();

    assert_eq!(
        err,
        StepError::Transform {
            transform: "explode".to_string(),
            message: "bad input".to_string(),
        }
    );
    assert!(seen.lock().unwrap().is_empty());
    assert!(!fs.exists(Path::new("./js")));

    // No stamp on failure: the next run still sees the file.
    let retry = Step::new("scripts", sources(&["src/js/*.js"]), Vec::new(), "./js", &ctx)
        .since_last_run(true)
        .run_blocking()
        .unwrap();
    assert_eq!(retry.processed, 1);
}

#[test]
fn nested_sources_keep_their_relative_paths() {
    let fs = MockFileSystem::new();
    fs.add_file("./src/img/logo.png", "logo");
    fs.add_file("./src/img/icons/spa.svg", "spa");
    fs.add_file("./src/img/icons/README.txt", "skip me");
    let ctx = mock_ctx(&fs, StampStorageMode::Memory);

    let step = Step::new(
        "images",
        sources(&["src/img/**/*", "!src/img/**/*.txt"]),
        Vec::new(),
        "./img",
        &ctx,
    );
    let report = step.run_blocking().unwrap();

    assert_eq!(report.written, 2);
    assert!(fs.is_file(Path::new("./img/logo.png")));
    assert!(fs.is_file(Path::new("./img/icons/spa.svg")));
    assert!(!fs.exists(Path::new("./img/icons/README.txt")));
}

#[test]
fn required_input_with_no_matches_is_missing_source() {
    let fs = MockFileSystem::new();
    fs.add_dir("./css");
    let ctx = mock_ctx(&fs, StampStorageMode::Memory);

    let err = Step::new("dist:styles", sources(&["css/**/*"]), Vec::new(), "./dist/css", &ctx)
        .require_input(true)
        .run_blocking()
        .unwrap_err();

    assert!(matches!(err, StepError::MissingSource { .. }));
    assert!(err.to_string().contains("missing source"));
}

#[test]
fn disabled_step_does_nothing() {
    let fs = MockFileSystem::new();
    fs.add_file("./src/video/intro.mp4", "v");
    let ctx = mock_ctx(&fs, StampStorageMode::Memory);

    let report = Step::new("video", sources(&["src/video/*"]), Vec::new(), "./video", &ctx)
        .enabled(false)
        .run_blocking()
        .unwrap();

    assert_eq!(report.written, 0);
    assert!(!fs.exists(Path::new("./video")));
}

#[test]
fn clean_removes_every_entry_but_keeps_the_directory() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "css/app.min.css", "x");
    write(dir.path(), "css/maps/app.css.map", "{}");
    write(dir.path(), "js/app.js", "y");

    let clean = CleanStep::new(
        "prod:clean",
        vec![dir.path().join("css"), dir.path().join("js")],
        Arc::new(RealFileSystem),
    );
    let removed = clean.run_blocking().unwrap();

    assert_eq!(removed, 3);
    assert!(file_names(&dir.path().join("css")).is_empty());
    assert!(file_names(&dir.path().join("js")).is_empty());
}

#[test]
fn clean_outside_the_project_and_of_missing_dirs_succeeds() {
    let outside = tempfile::tempdir().unwrap();
    write(outside.path(), "dist/index.html", "<html></html>");

    let clean = CleanStep::new(
        "dist:clean",
        vec![outside.path().join("dist"), outside.path().join("never-built")],
        Arc::new(RealFileSystem),
    );

    assert_eq!(clean.run_blocking().unwrap(), 1);
    assert!(file_names(&outside.path().join("dist")).is_empty());
}

#[test]
fn clean_reports_permission_errors() {
    let fs = MockFileSystem::new();
    fs.add_file("./css/app.css", "x");
    fs.deny("./css/app.css");

    let clean = CleanStep::new("prod:clean", vec![PathBuf::from("./css")], Arc::new(fs.clone()));
    let err = clean.run_blocking().unwrap_err();

    match err {
        StepError::Filesystem { path, message } => {
            assert_eq!(path, PathBuf::from("./css/app.css"));
            assert!(message.contains("permission denied"));
        }
        other => panic!("expected filesystem error, got {other:?}"),
    }
}
