//! Engine lifecycle against real directory trees.

use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use autorsync_engine::{
    EngineConfig, EngineError, Mapping, Settings, SyncEngine, SyncExecutor, SyncOutcome,
    SyncRequest,
};
use tempfile::TempDir;

#[derive(Default)]
struct RecordingExecutor {
    calls: Mutex<Vec<SyncRequest>>,

    /// How long the first sync takes.
    first_sync: Duration,

    /// Read every file in the source tree, the way rsync does.
    read_source: bool,
}

impl RecordingExecutor {
    fn count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl SyncExecutor for RecordingExecutor {
    async fn sync(&self, request: &SyncRequest) -> SyncOutcome {
        let first = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(request.clone());
            calls.len() == 1
        };
        if first && !self.first_sync.is_zero() {
            tokio::time::sleep(self.first_sync).await;
        }
        if self.read_source {
            read_tree(&request.source);
        }
        SyncOutcome::success(0)
    }
}

fn read_tree(dir: &Path) {
    for entry in fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        if path.is_dir() {
            read_tree(&path);
        } else {
            fs::read(&path).unwrap();
        }
    }
}

/// Poll until the engine watches `count` directories or the deadline passes.
async fn wait_for_watched(engine: &SyncEngine, count: usize) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(20);
    while tokio::time::Instant::now() < deadline {
        if engine.watched_directories() >= count {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}

/// Poll until `executor` has seen at least `count` calls or the deadline passes.
async fn wait_for_calls(executor: &RecordingExecutor, count: usize) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    while tokio::time::Instant::now() < deadline {
        if executor.calls.lock().unwrap().len() >= count {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_file_write_triggers_sync() {
    let source = TempDir::new().unwrap();
    fs::create_dir(source.path().join("sub")).unwrap();

    let config = EngineConfig::new(
        vec![Mapping::new(
            source.path(),
            "host:/dst",
            vec![".autorsync".to_string()],
        )],
        Settings::new(Duration::from_millis(100)),
    );
    let executor = Arc::new(RecordingExecutor::default());
    let engine = SyncEngine::start(config, executor.clone()).unwrap();
    assert_eq!(engine.watched_directories(), 2);

    fs::write(source.path().join("sub/file.txt"), "hello").unwrap();

    assert!(wait_for_calls(&executor, 1).await, "no sync was issued");
    let call = executor.calls.lock().unwrap()[0].clone();
    assert_eq!(call.source, source.path());
    assert_eq!(call.target, "host:/dst");

    engine.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_new_directory_is_tracked() {
    let source = TempDir::new().unwrap();

    let config = EngineConfig::new(
        vec![Mapping::new(source.path(), "/dst", Vec::new())],
        Settings::new(Duration::from_millis(100)),
    );
    let executor = Arc::new(RecordingExecutor::default());
    let engine = SyncEngine::start(config, executor.clone()).unwrap();
    assert_eq!(engine.watched_directories(), 1);

    fs::create_dir(source.path().join("fresh")).unwrap();

    assert!(wait_for_watched(&engine, 2).await);
    assert_eq!(engine.watched_directories(), 2);

    engine.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_directory_moved_into_tree_is_tracked() {
    let source = TempDir::new().unwrap();
    let outside = TempDir::new().unwrap();
    fs::create_dir_all(outside.path().join("moved/inner")).unwrap();

    let config = EngineConfig::new(
        vec![Mapping::new(source.path(), "/dst", Vec::new())],
        Settings::new(Duration::from_millis(100)),
    );
    let executor = Arc::new(RecordingExecutor::default());
    let engine = SyncEngine::start(config, executor.clone()).unwrap();
    assert_eq!(engine.watched_directories(), 1);

    fs::rename(outside.path().join("moved"), source.path().join("moved")).unwrap();

    assert!(
        wait_for_watched(&engine, 3).await,
        "moved directory was not registered"
    );
    assert!(wait_for_calls(&executor, 1).await);

    engine.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_reads_do_not_trigger_sync() {
    let source = TempDir::new().unwrap();
    fs::create_dir(source.path().join("sub")).unwrap();
    fs::write(source.path().join("sub/existing.txt"), "old").unwrap();

    let config = EngineConfig::new(
        vec![Mapping::new(source.path(), "/dst", Vec::new())],
        Settings::new(Duration::from_millis(100)),
    );
    let executor = Arc::new(RecordingExecutor {
        read_source: true,
        ..Default::default()
    });
    let engine = SyncEngine::start(config, executor.clone()).unwrap();

    read_tree(source.path());
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(executor.count(), 0, "a pure read caused a sync");

    // The executor reads the whole tree on every sync; that must not
    // re-dirty the mapping.
    fs::write(source.path().join("sub/new.txt"), "new").unwrap();
    assert!(wait_for_calls(&executor, 1).await);
    tokio::time::sleep(Duration::from_millis(500)).await;
    let settled = executor.count();

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(executor.count(), settled, "syncs kept coming without writes");

    engine.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_new_directory_tracked_while_event_channel_is_full() {
    let source = TempDir::new().unwrap();

    let config = EngineConfig::new(
        vec![Mapping::new(source.path(), "/dst", Vec::new())],
        Settings::new(Duration::from_millis(100)),
    );
    let executor = Arc::new(RecordingExecutor {
        first_sync: Duration::from_millis(1500),
        ..Default::default()
    });
    let engine = SyncEngine::start(config, executor.clone()).unwrap();

    fs::write(source.path().join("start.txt"), "go").unwrap();
    assert!(wait_for_calls(&executor, 1).await);

    // The first sync holds the dirty lock, so the router stalls and the
    // event channel fills up behind it.
    for i in 0..1200 {
        fs::write(source.path().join(format!("before-{i}.txt")), "x").unwrap();
    }
    fs::create_dir(source.path().join("fresh")).unwrap();
    for i in 0..1200 {
        fs::write(source.path().join(format!("after-{i}.txt")), "x").unwrap();
    }

    assert!(
        wait_for_watched(&engine, 2).await,
        "new directory was never registered"
    );

    fs::write(source.path().join("fresh/late.txt"), "x").unwrap();
    let seen = executor.count();
    assert!(
        wait_for_calls(&executor, seen + 1).await,
        "engine stopped observing changes"
    );

    tokio::time::timeout(Duration::from_secs(10), engine.shutdown())
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_missing_source_is_fatal() {
    let config = EngineConfig::new(
        vec![Mapping::new("/nonexistent/autorsync/12345", "/dst", Vec::new())],
        Settings::new(Duration::from_secs(1)),
    );

    let result = SyncEngine::start(config, Arc::new(RecordingExecutor::default()));

    assert!(matches!(result, Err(EngineError::Watcher(_))));
}

#[tokio::test]
async fn test_no_mappings_is_fatal() {
    let config = EngineConfig::new(Vec::new(), Settings::new(Duration::from_secs(1)));

    let result = SyncEngine::start(config, Arc::new(RecordingExecutor::default()));

    assert!(matches!(result, Err(EngineError::Config(_))));
}

#[tokio::test]
async fn test_shutdown_stops_loops() {
    let source = TempDir::new().unwrap();
    let config = EngineConfig::new(
        vec![Mapping::new(source.path(), "/dst", Vec::new())],
        Settings::new(Duration::from_secs(60)),
    );

    let engine = SyncEngine::start(config, Arc::new(RecordingExecutor::default())).unwrap();
    let token = engine.cancellation_token();
    assert!(!token.is_cancelled());

    tokio::time::timeout(Duration::from_secs(5), engine.shutdown())
        .await
        .unwrap()
        .unwrap();
    assert!(token.is_cancelled());
}
