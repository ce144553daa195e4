//! End-to-end runs through the engine: config, registry, scheduler

use filefx::config::Config;
use filefx::engine::{Engine, EngineError};
use filefx::handlers::HandlerSpec;
use filefx::params::{ParameterSet, ValidationError};
use filefx::scheduler::TaskState;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

fn backup_pipeline(dest: &Path) -> HandlerSpec {
    let text = format!(
        r#"
kind = "pipe"

[[stages]]
kind = "handler"
id = "FileSearchHandler"
params = {{ Pattern = "*.txt", Recursion = false }}

[[stages]]
kind = "handler"
id = "FileCopyHandler"
params = {{ DestPath = '{}' }}
"#,
        dest.display()
    );
    HandlerSpec::from_toml(&text).unwrap()
}

#[tokio::test]
async fn test_run_toml_pipeline() {
    let temp_dir = TempDir::new().unwrap();
    let src = temp_dir.path().join("src");
    let backup = temp_dir.path().join("backup");
    write(&src.join("a.txt"), "a");
    write(&src.join("b.txt"), "b");
    write(&src.join("c.bin"), "c");

    let engine = Engine::new(Config::default()).unwrap();
    let id = engine
        .submit_paths(&backup_pipeline(&backup), &[src.clone()])
        .await
        .unwrap();
    let snapshot = engine.scheduler().wait(id).await.unwrap();

    assert_eq!(snapshot.state, TaskState::Succeeded);
    assert_eq!(snapshot.outputs.len(), 2);
    assert!(backup.join("a.txt").is_file());
    assert!(backup.join("b.txt").is_file());
    assert!(!backup.join("c.bin").exists());
    // two matched by the search, two copied
    assert_eq!(snapshot.report.handled, 4);
    assert!(
        snapshot
            .messages
            .iter()
            .any(|message| message.text == "Finish, 2 files copied.")
    );

    let metrics = engine.metrics();
    assert_eq!(metrics.tasks_submitted, 1);
    assert_eq!(metrics.tasks_succeeded, 1);
    assert_eq!(metrics.files_handled, 4);
}

#[tokio::test]
async fn test_configured_numbering_applies_to_copies() {
    let temp_dir = TempDir::new().unwrap();
    let src = temp_dir.path().join("src");
    let backup = temp_dir.path().join("backup");
    write(&src.join("a.txt"), "new");
    write(&backup.join("a.txt"), "old");

    let mut config = Config::default();
    config.naming.pattern = "_N".to_string();
    let engine = Engine::new(config).unwrap();

    let snapshot = {
        let id = engine
            .submit_paths(&backup_pipeline(&backup), &[src.clone()])
            .await
            .unwrap();
        engine.scheduler().wait(id).await.unwrap()
    };

    assert_eq!(snapshot.state, TaskState::Succeeded);
    assert_eq!(fs::read_to_string(backup.join("a.txt")).unwrap(), "old");
    assert_eq!(fs::read_to_string(backup.join("a_1.txt")).unwrap(), "new");
}

#[tokio::test]
async fn test_unknown_handler_rejected_at_submit() {
    let engine = Engine::new(Config::default()).unwrap();
    let spec = HandlerSpec::pipe([
        HandlerSpec::handler("FileSearchHandler", ParameterSet::new().with("Pattern", "*")),
        HandlerSpec::handler("FileShredHandler", ParameterSet::new()),
    ]);

    let err = engine.submit(&spec, Vec::new()).unwrap_err();
    assert!(matches!(
        err,
        EngineError::Validation(ValidationError::UnknownHandler(ref id)) if id == "FileShredHandler"
    ));
    assert!(engine.scheduler().list().is_empty());
}

#[tokio::test]
async fn test_run_reports_per_file_failures_without_failing() {
    let temp_dir = TempDir::new().unwrap();
    write(&temp_dir.path().join("keep/a.txt"), "a");
    let missing = temp_dir.path().join("gone.txt");
    write(&missing, "g");

    let engine = Engine::new(Config::default()).unwrap();
    let inputs = filefx::engine::stat_inputs(&[missing.clone()]).await.unwrap();
    fs::remove_file(&missing).unwrap();

    let snapshot = engine
        .run(&HandlerSpec::handler("FileDeleteHandler", ParameterSet::new()), inputs)
        .await
        .unwrap();

    assert_eq!(snapshot.state, TaskState::Succeeded);
    assert_eq!(snapshot.report.failed, 1);
    assert_eq!(snapshot.report.failures[0].path, missing);
    assert_eq!(engine.metrics().files_failed, 1);
}

#[tokio::test]
async fn test_cancel_held_task_through_engine() {
    let temp_dir = TempDir::new().unwrap();
    write(&temp_dir.path().join("a.txt"), "a");

    let engine = Engine::new(Config::default()).unwrap();
    let spec = HandlerSpec::handler("FileDeleteHandler", ParameterSet::new());
    let handler = engine.build(&spec).unwrap_or_else(|err| panic!("{err}"));
    let inputs = filefx::engine::stat_inputs(&[temp_dir.path().join("a.txt")])
        .await
        .unwrap();

    let id = engine.scheduler().submit_held(handler, inputs).unwrap();
    engine.scheduler().cancel(id).unwrap();
    let snapshot = engine.scheduler().wait(id).await.unwrap();

    assert!(snapshot.is_cancelled());
    assert!(temp_dir.path().join("a.txt").exists());
    assert_eq!(engine.metrics().tasks_cancelled, 1);
}
