//! Launcher self-update handoff tests against a mock update server.

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use launcher_updater::{
    AutoConfirm, CycleOutcome, EventSink, HandoffOutcome, HelperSpawner, Orchestrator,
    SelfUpdateCoordinator, UpdateClient, UpdateError, UpdaterSettings, Version,
};
use serde_json::json;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const HELPER_NAME: &str = "LauncherUpdater.exe";

#[derive(Debug, Default)]
struct Spawned {
    helper: PathBuf,
    helper_existed: bool,
    args: Vec<String>,
}

#[derive(Clone, Default)]
struct RecordingSpawner {
    calls: Arc<Mutex<Vec<Spawned>>>,
}

impl HelperSpawner for RecordingSpawner {
    fn spawn(&self, helper: &Path, args: &[String]) -> launcher_updater::Result<()> {
        self.calls.lock().unwrap().push(Spawned {
            helper: helper.to_path_buf(),
            helper_existed: helper.exists(),
            args: args.to_vec(),
        });
        Ok(())
    }
}

fn settings(root: &Path) -> UpdaterSettings {
    UpdaterSettings {
        install_root: root.to_path_buf(),
        helper_file_name: HELPER_NAME.to_string(),
        ..UpdaterSettings::default()
    }
}

async fn mount_descriptor(server: &MockServer, version: &str) {
    Mock::given(method("GET"))
        .and(path("/Launcher/launcher_update.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "version": version,
            "file_name": "Launcher.exe",
        })))
        .mount(server)
        .await;
}

async fn mount_helper(server: &MockServer, expected_calls: u64) {
    Mock::given(method("GET"))
        .and(path(format!("/Launcher/{HELPER_NAME}")))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"helper binary".to_vec()))
        .expect(expected_calls)
        .mount(server)
        .await;
}

fn coordinator(
    server: &MockServer,
    root: &Path,
    accept: bool,
    spawner: RecordingSpawner,
) -> SelfUpdateCoordinator {
    let base_url = format!("{}/Launcher/", server.uri());
    let client = UpdateClient::new(base_url, "test").unwrap();
    SelfUpdateCoordinator::new(
        client,
        &settings(root),
        root.join("Launcher.exe"),
        Box::new(AutoConfirm(accept)),
        Box::new(spawner),
    )
}

#[tokio::test]
async fn test_current_launcher_does_nothing() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_descriptor(&server, "1.0.0").await;
    mount_helper(&server, 0).await;

    let spawner = RecordingSpawner::default();
    let outcome = coordinator(&server, dir.path(), true, spawner.clone())
        .check_and_maybe_handoff(Version::new(1, 0, 0, 0), &EventSink::discard())
        .await
        .unwrap();

    assert_eq!(outcome, HandoffOutcome::UpToDate);
    assert!(spawner.calls.lock().unwrap().is_empty());
    assert!(!dir.path().join(HELPER_NAME).exists());
}

#[tokio::test]
async fn test_declined_update_removes_helper() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_descriptor(&server, "1.0.1").await;
    mount_helper(&server, 1).await;

    let spawner = RecordingSpawner::default();
    let outcome = coordinator(&server, dir.path(), false, spawner.clone())
        .check_and_maybe_handoff(Version::new(1, 0, 0, 0), &EventSink::discard())
        .await
        .unwrap();

    assert_eq!(outcome, HandoffOutcome::Declined);
    assert!(spawner.calls.lock().unwrap().is_empty());
    assert!(!dir.path().join(HELPER_NAME).exists());
}

#[tokio::test]
async fn test_declined_update_leaves_game_update_working() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_descriptor(&server, "1.0.1").await;
    mount_helper(&server, 1).await;

    Mock::given(method("GET"))
        .and(path("/Launcher/update.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "latest_version": "1.0.0.1",
            "updates": ["update_1.0.0.1.zip"],
        })))
        .mount(&server)
        .await;
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    zip.start_file("data/a.txt", zip::write::SimpleFileOptions::default())
        .unwrap();
    zip.write_all(b"patched").unwrap();
    let archive = zip.finish().unwrap().into_inner();
    Mock::given(method("GET"))
        .and(path("/Launcher/updates/update_1.0.0.1.zip"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(archive))
        .expect(1)
        .mount(&server)
        .await;

    let spawner = RecordingSpawner::default();
    let outcome = coordinator(&server, dir.path(), false, spawner.clone())
        .check_and_maybe_handoff(Version::new(1, 0, 0, 0), &EventSink::discard())
        .await
        .unwrap();
    assert_eq!(outcome, HandoffOutcome::Declined);

    let client = UpdateClient::new(format!("{}/Launcher/", server.uri()), "test").unwrap();
    let orchestrator = Orchestrator::with_client(settings(dir.path()), client);
    let cycle = orchestrator
        .run_cycle(&EventSink::discard(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        cycle,
        CycleOutcome::Updated {
            from: Version::new(1, 0, 0, 0),
            to: Version::new(1, 0, 0, 1),
            applied: vec!["update_1.0.0.1.zip".to_string()],
        }
    );
    assert_eq!(
        std::fs::read_to_string(dir.path().join("data/a.txt")).unwrap(),
        "patched"
    );
    assert!(!dir.path().join(HELPER_NAME).exists());
    assert!(spawner.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_accepted_update_hands_off_with_three_arguments() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_descriptor(&server, "1.0.1").await;
    mount_helper(&server, 1).await;

    let spawner = RecordingSpawner::default();
    let coordinator = coordinator(&server, dir.path(), true, spawner.clone());
    let outcome = coordinator
        .check_and_maybe_handoff(Version::new(1, 0, 0, 0), &EventSink::discard())
        .await
        .unwrap();

    let HandoffOutcome::HandedOff(invocation) = outcome else {
        panic!("expected a handoff, got {outcome:?}");
    };
    assert_eq!(invocation.file_name, "Launcher.exe");

    let calls = spawner.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    let call = &calls[0];
    assert_eq!(call.helper, dir.path().join(HELPER_NAME));
    assert!(call.helper_existed);
    assert_eq!(
        call.args,
        vec![
            format!("{}/Launcher/", server.uri()),
            dir.path().join("Launcher.exe").to_string_lossy().into_owned(),
            "Launcher.exe".to_string(),
        ]
    );
    assert_eq!(
        std::fs::read(coordinator.helper_path()).unwrap(),
        b"helper binary"
    );
}

#[tokio::test]
async fn test_missing_helper_is_self_update_error() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_descriptor(&server, "2.0").await;

    let spawner = RecordingSpawner::default();
    let err = coordinator(&server, dir.path(), true, spawner.clone())
        .check_and_maybe_handoff(Version::new(1, 0, 0, 0), &EventSink::discard())
        .await
        .unwrap_err();

    assert!(matches!(err, UpdateError::SelfUpdate(_)));
    assert!(spawner.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_malformed_descriptor_is_manifest_error() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    Mock::given(method("GET"))
        .and(path("/Launcher/launcher_update.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"version\": 5}"))
        .mount(&server)
        .await;

    let err = coordinator(&server, dir.path(), true, RecordingSpawner::default())
        .check_and_maybe_handoff(Version::new(1, 0, 0, 0), &EventSink::discard())
        .await
        .unwrap_err();

    assert!(matches!(err, UpdateError::Manifest(_)));
}
