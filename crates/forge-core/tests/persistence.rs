//! Handing finished sessions to the persistence collaborator.

use async_trait::async_trait;
use forge_core::{
    ContentVariant, InsightKind, JsonFileStore, Orchestrator, PersistenceError, SessionError,
    SessionRequest, SessionSnapshot, SessionStatus, SessionStore, TaskStatus,
};
use forge_test_utils::{
    config, content_of_len, stages, FailingStore, RecordingPresenter, ScriptedGenerator,
};
use mockall::mock;
use std::sync::Arc;
use std::time::Duration;

mock! {
    pub Store {}

    #[async_trait]
    impl SessionStore for Store {
        async fn save(&self, snapshot: &SessionSnapshot) -> Result<(), PersistenceError>;
    }
}

fn orchestrator(store: Arc<dyn SessionStore>, presenter: Arc<RecordingPresenter>) -> Orchestrator {
    Orchestrator::new(
        config().with_reveal_rate(1000),
        Arc::new(ScriptedGenerator::returning(content_of_len(150))),
        store,
    )
    .unwrap()
    .with_presenter(presenter)
}

fn request() -> SessionRequest {
    SessionRequest::new("Fleet telemetry from delivery vans", ContentVariant::Vector)
}

#[tokio::test(start_paused = true)]
async fn saves_once_with_every_task_completed() {
    let mut store = MockStore::new();
    store
        .expect_save()
        .withf(|snapshot: &SessionSnapshot| {
            snapshot.session.status == SessionStatus::Completed
                && snapshot.session.variant == ContentVariant::Vector
                && snapshot.tasks.len() == 4
                && snapshot
                    .tasks
                    .iter()
                    .all(|record| record.task.status == TaskStatus::Completed)
        })
        .times(1)
        .returning(|_| Ok(()));
    let presenter = Arc::new(RecordingPresenter::new());

    let handle = orchestrator(Arc::new(store), Arc::clone(&presenter)).start(request(), stages(4));
    let id = handle.id();
    let snapshot = handle.wait().await.unwrap();

    assert_eq!(presenter.completed(), vec![id]);
    assert!(presenter.errors().is_empty());
    assert!(snapshot.session.finished_at.is_some());
}

#[tokio::test(start_paused = true)]
async fn save_failure_is_surfaced_with_the_snapshot() {
    let store = Arc::new(FailingStore::new());
    let presenter = Arc::new(RecordingPresenter::new());

    let handle = orchestrator(
        Arc::clone(&store) as Arc<dyn SessionStore>,
        Arc::clone(&presenter),
    )
    .start(request(), stages(3));
    let err = handle.wait().await.unwrap_err();

    assert!(matches!(
        err,
        SessionError::Persistence {
            source: PersistenceError::Backend(_),
            ..
        }
    ));
    let snapshot = err.snapshot().unwrap();
    assert_eq!(snapshot.session.status, SessionStatus::Error);
    assert!(snapshot
        .tasks
        .iter()
        .all(|record| record.task.status == TaskStatus::Completed && !record.clean_content.is_empty()));
    assert!(snapshot
        .insights
        .iter()
        .any(|entry| entry.kind == InsightKind::Persistence));

    assert_eq!(store.attempts(), 1);
    assert_eq!(presenter.errors().len(), 1);
    assert!(presenter.errors()[0].contains("disk full"));
    assert!(presenter.completed().is_empty());
}

#[tokio::test(start_paused = true)]
async fn failed_snapshot_can_be_saved_elsewhere() {
    let dir = tempfile::tempdir().unwrap();
    let handle = orchestrator(
        Arc::new(FailingStore::new()),
        Arc::new(RecordingPresenter::new()),
    )
    .start(request(), stages(2));

    let err = handle.wait().await.unwrap_err();
    let snapshot = err.snapshot().unwrap().clone();

    let fallback = JsonFileStore::new(dir.path());
    fallback.save(&snapshot).await.unwrap();
    assert_eq!(fallback.load(snapshot.id()).await.unwrap(), snapshot);
}

#[tokio::test(start_paused = true)]
async fn json_store_receives_parsed_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(JsonFileStore::new(dir.path().join("sessions")));
    let orchestrator = Orchestrator::new(
        config()
            .with_reveal_rate(1000)
            .with_generation_soft_timeout(Duration::from_secs(5)),
        Arc::new(forge_core::TemplateGenerator::new(Duration::from_millis(100))),
        Arc::clone(&store) as Arc<dyn SessionStore>,
    )
    .unwrap();

    let handle = orchestrator.start(request(), forge_core::default_stages());
    let snapshot = handle.wait().await.unwrap();
    let loaded = store.load(snapshot.id()).await.unwrap();

    assert_eq!(loaded, snapshot);
    let implementation = &loaded.tasks[2];
    assert!(implementation
        .artifacts
        .as_ref()
        .is_some_and(|outcome| outcome.is_structured()));
    assert!(implementation.clean_content.contains("dimensions: 1536"));
}
