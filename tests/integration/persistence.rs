//! Simulation over projects stored as JSON files.

use std::sync::Arc;

use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use taskplan::core::ProjectId;
use taskplan::orchestration::{SimulationRequest, SimulationService};
use taskplan::store::{JsonFileStore, ProjectStore};

use crate::fixtures::{chain_tasks, project_of, sim_config, ScriptedAssignment};

fn service_over(dir: &TempDir) -> (Arc<JsonFileStore>, SimulationService) {
    let store = Arc::new(JsonFileStore::new(dir.path().join("projects")));
    let service = SimulationService::new(
        store.clone(),
        Arc::new(ScriptedAssignment::always("developer")),
        sim_config(),
    )
    .unwrap();
    (store, service)
}

/// Test: Stored project simulation
/// Given a chain saved to the file store
/// When simulated through the service
/// Then it completes and the stored file is left untouched
#[tokio::test]
async fn test_simulate_saved_project() {
    let dir = TempDir::new().unwrap();
    let (store, service) = service_over(&dir);
    store.save(&project_of("chain", chain_tasks())).await.unwrap();
    let before = std::fs::read_to_string(dir.path().join("projects/chain.json")).unwrap();

    let response = service
        .simulate(&SimulationRequest::new("chain"), &CancellationToken::new())
        .await;

    assert_eq!(response.completion_percentage, 100.0);
    let after = std::fs::read_to_string(dir.path().join("projects/chain.json")).unwrap();
    assert_eq!(before, after);
}

/// Test: Hand-written project file
/// Given a minimal JSON file with defaults left out
/// When simulated
/// Then defaults apply: unestimated tasks take the default duration
#[tokio::test]
async fn test_hand_written_file_uses_defaults() {
    let dir = TempDir::new().unwrap();
    let (_store, service) = service_over(&dir);
    std::fs::create_dir_all(dir.path().join("projects")).unwrap();
    std::fs::write(
        dir.path().join("projects/manual.json"),
        r#"{
            "id": "manual",
            "name": "Manual",
            "tasks": [
                {"id": "spec", "title": "Write spec", "estimated_hours": 1.0},
                {"id": "impl", "title": "Implement", "dependencies": ["spec"]}
            ]
        }"#,
    )
    .unwrap();

    let response = service
        .simulate(&SimulationRequest::new("manual"), &CancellationToken::new())
        .await;

    let summary = response.final_status.summary().unwrap();
    assert!(summary.success);
    // One hour for "spec" plus the four-hour default for "impl".
    assert_eq!(summary.execution_hours, 5.5);
}

/// Test: Missing and corrupt files
/// Given no file for one id and invalid JSON for another
/// When simulated
/// Then both come back as error statuses
#[tokio::test]
async fn test_missing_and_corrupt_files_report_errors() {
    let dir = TempDir::new().unwrap();
    let (_store, service) = service_over(&dir);
    std::fs::create_dir_all(dir.path().join("projects")).unwrap();
    std::fs::write(dir.path().join("projects/broken.json"), "{ nope").unwrap();

    let missing = service
        .simulate(&SimulationRequest::new("absent"), &CancellationToken::new())
        .await;
    assert_eq!(missing.final_status.error(), Some("Project not found: absent"));

    let broken = service
        .simulate(&SimulationRequest::new("broken"), &CancellationToken::new())
        .await;
    assert!(broken.final_status.error().is_some());
    assert!(broken.execution_log.is_empty());
}

/// Test: Path traversal ids are refused
#[tokio::test]
async fn test_traversal_id_is_refused() {
    let dir = TempDir::new().unwrap();
    let (store, _service) = service_over(&dir);

    assert!(store.load(&ProjectId::new("../secrets")).await.is_err());
}
