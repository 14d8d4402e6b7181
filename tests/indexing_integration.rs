//! End-to-end tests: watched repositories feeding the coordinator.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use fsindex::indexer::{CoordinatorConfig, FileReindexer, IndexCoordinator, IndexEvent, Subscription};
use fsindex::{MemoryStore, ObjectId, PathStore, WatchRepository, WatcherConfig};
use tempfile::TempDir;
use tokio::time::{timeout, Instant};
use tokio_util::sync::CancellationToken;

const WAIT: Duration = Duration::from_secs(10);

fn coordinator(store: &MemoryStore) -> Arc<IndexCoordinator> {
    let config = CoordinatorConfig {
        workers: 2,
        queue_len: 64,
    };
    Arc::new(IndexCoordinator::new(&config, FileReindexer::new(store.clone())).unwrap())
}

fn watcher_config() -> WatcherConfig {
    WatcherConfig {
        write_timeout: Duration::from_millis(100),
    }
}

fn open_repo(
    label: &str,
    root: &Path,
    coordinator: &Arc<IndexCoordinator>,
    store: &MemoryStore,
) -> WatchRepository {
    let store: Arc<dyn PathStore> = Arc::new(store.clone());
    WatchRepository::open(label, root, Arc::clone(coordinator), store, &watcher_config()).unwrap()
}

/// Receive events until every `(path, content)` pair has been reported.
///
/// Events arrive in no particular order across paths, and a file may be
/// picked up between its creation and its first write, so unrelated or
/// outdated events are skipped.
async fn wait_indexed(sub: &mut Subscription, expected: &[(PathBuf, &str)]) {
    let mut remaining: HashSet<IndexEvent> = expected
        .iter()
        .map(|(path, content)| IndexEvent {
            path: path.clone(),
            id: ObjectId::of_bytes(content.as_bytes()),
        })
        .collect();

    timeout(WAIT, async {
        while !remaining.is_empty() {
            let event = sub.recv_event().await.expect("subscription ended");
            remaining.remove(&event);
        }
    })
    .await
    .unwrap_or_else(|_| panic!("index events missing: {remaining:?}"));
}

async fn wait_for(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + WAIT;
    while !condition() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_coordinator_indexes_marked_files() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().canonicalize().unwrap();
    let a = root.join("a.txt");
    let b = root.join("b.txt");
    fs::write(&a, "alpha").unwrap();
    fs::write(&b, "beta").unwrap();

    let store = MemoryStore::new();
    let coordinator = coordinator(&store);
    coordinator.acquire(&root);
    let mut sub = coordinator.subscribe(CancellationToken::new());

    coordinator.mark_dirty(&a);
    coordinator.mark_dirty(&b);

    wait_indexed(&mut sub, &[(a.clone(), "alpha"), (b.clone(), "beta")]).await;

    fs::remove_file(&a).unwrap();
    coordinator.mark_dirty(&a);
    wait_for(|| store.paths_under(&root) == vec![b.clone()]).await;

    coordinator.close().unwrap();
    assert_eq!(coordinator.pending(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_repository_scan_and_live_updates() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().canonicalize().unwrap();
    fs::create_dir(root.join("sub")).unwrap();
    fs::write(root.join("a.txt"), "alpha").unwrap();
    fs::write(root.join("sub/b.txt"), "beta").unwrap();

    let store = MemoryStore::new();
    let coordinator = coordinator(&store);
    let mut sub = coordinator.subscribe_under(&root, CancellationToken::new());

    let repo = open_repo("repo", &root, &coordinator, &store);
    assert_eq!(repo.label(), "repo");
    assert_eq!(repo.root(), root.as_path());

    let scan = repo.wait_for_scan().await.unwrap().unwrap();
    assert_eq!(scan.files_queued, 2);
    assert!(repo.wait_for_scan().await.unwrap().is_none());

    wait_indexed(
        &mut sub,
        &[(root.join("a.txt"), "alpha"), (root.join("sub/b.txt"), "beta")],
    )
    .await;

    // New file in an existing directory.
    let c = root.join("sub/c.txt");
    fs::write(&c, "gamma").unwrap();
    wait_indexed(&mut sub, &[(c.clone(), "gamma")]).await;

    // New directory: watched and scanned.
    let nested = root.join("nested");
    fs::create_dir(&nested).unwrap();
    let d = nested.join("d.txt");
    fs::write(&d, "delta").unwrap();
    wait_indexed(&mut sub, &[(d.clone(), "delta")]).await;

    // Removal drops the record.
    fs::remove_file(root.join("a.txt")).unwrap();
    let expected = vec![d, root.join("sub/b.txt"), c];
    wait_for(|| store.paths_under(&root) == expected).await;

    // Nothing else covers the root, so closing forgets its records.
    repo.close().await;
    repo.close().await;
    assert_eq!(coordinator.interest(root.join("a.txt")), 0);
    assert!(store.paths_under(&root).is_empty());

    coordinator.close().unwrap();
    timeout(WAIT, async { while sub.recv().await.is_some() {} })
        .await
        .unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_renamed_directory_drops_child_records() {
    let tmp = TempDir::new().unwrap();
    let outside = TempDir::new().unwrap();
    let root = tmp.path().canonicalize().unwrap();
    let dir = root.join("sub");
    fs::create_dir_all(dir.join("deep")).unwrap();
    fs::write(dir.join("f.txt"), "f").unwrap();
    fs::write(dir.join("deep/g.txt"), "g").unwrap();
    fs::write(root.join("kept.txt"), "kept").unwrap();

    let store = MemoryStore::new();
    let coordinator = coordinator(&store);
    let mut sub = coordinator.subscribe_under(&root, CancellationToken::new());
    let repo = open_repo("repo", &root, &coordinator, &store);
    repo.wait_for_scan().await.unwrap();
    wait_indexed(
        &mut sub,
        &[
            (dir.join("f.txt"), "f"),
            (dir.join("deep/g.txt"), "g"),
            (root.join("kept.txt"), "kept"),
        ],
    )
    .await;

    fs::rename(&dir, outside.path().join("moved")).unwrap();
    wait_for(|| store.paths_under(&root) == vec![root.join("kept.txt")]).await;

    repo.close().await;
    coordinator.close().unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_repository_contains_and_scan() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().canonicalize().unwrap();
    fs::write(root.join("a.txt"), "alpha").unwrap();
    fs::write(root.join("b.txt"), "alpha").unwrap();
    fs::write(root.join("c.txt"), "gamma").unwrap();

    let store = MemoryStore::new();
    let coordinator = coordinator(&store);
    let mut sub = coordinator.subscribe_under(&root, CancellationToken::new());
    let repo = open_repo("repo", &root, &coordinator, &store);
    repo.wait_for_scan().await.unwrap();
    wait_indexed(
        &mut sub,
        &[
            (root.join("a.txt"), "alpha"),
            (root.join("b.txt"), "alpha"),
            (root.join("c.txt"), "gamma"),
        ],
    )
    .await;

    let alpha = ObjectId::of_bytes(b"alpha");
    let gamma = ObjectId::of_bytes(b"gamma");
    let delta = ObjectId::of_bytes(b"delta");
    assert!(repo.contains(&alpha).unwrap());
    assert!(!repo.contains(&delta).unwrap());

    // Replay only: distinct identifiers, then the end of the stream.
    let mut replay = repo.scan(CancellationToken::new(), false).unwrap();
    let mut replayed = HashSet::new();
    while let Some(id) = replay.recv().await {
        assert!(replayed.insert(id), "identifier replayed twice");
    }
    assert_eq!(replayed, HashSet::from([alpha, gamma]));

    // Replay, then follow live updates.
    let token = CancellationToken::new();
    let mut follow = repo.scan(token.clone(), true).unwrap();
    let mut seen = HashSet::new();
    for _ in 0..2 {
        seen.insert(follow.recv().await.unwrap());
    }
    assert_eq!(seen, HashSet::from([alpha, gamma]));

    fs::write(root.join("d.txt"), "delta").unwrap();
    timeout(WAIT, async {
        loop {
            match follow.recv().await {
                Some(id) if id == delta => break,
                Some(_) => {}
                None => panic!("scan ended before the new file was indexed"),
            }
        }
    })
    .await
    .unwrap();
    assert!(repo.contains(&delta).unwrap());

    token.cancel();
    assert_eq!(follow.recv().await, None);

    repo.close().await;
    coordinator.close().unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_close_waits_for_initial_scan() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().canonicalize().unwrap();
    for i in 0..500 {
        let dir = root.join(format!("d{}", i % 10));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(format!("f{i}.txt")), format!("{i}")).unwrap();
    }

    let store = MemoryStore::new();
    let coordinator = coordinator(&store);
    let repo = open_repo("repo", &root, &coordinator, &store);
    repo.close().await;

    // No scan can mark anything once close has returned.
    assert_eq!(coordinator.pending(), 0);
    assert!(store.paths_under(&root).is_empty());
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(coordinator.pending(), 0);
    assert!(store.paths_under(&root).is_empty());

    coordinator.close().unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_nested_repositories_share_interest() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().canonicalize().unwrap();
    let inner = root.join("inner");
    fs::create_dir(&inner).unwrap();

    let store = MemoryStore::new();
    let coordinator = coordinator(&store);

    let outer_repo = open_repo("outer", &root, &coordinator, &store);
    let inner_repo = open_repo("inner", &inner, &coordinator, &store);
    outer_repo.wait_for_scan().await.unwrap();
    inner_repo.wait_for_scan().await.unwrap();

    let file = inner.join("x.txt");
    assert_eq!(coordinator.interest(&file), 2);
    assert_eq!(coordinator.roots().parent(&inner), Some(root.clone()));

    outer_repo.close().await;
    assert_eq!(coordinator.interest(&file), 1);
    assert_eq!(coordinator.roots().top_level(), vec![inner.clone()]);

    let mut sub = inner_repo.subscribe(CancellationToken::new());
    fs::write(&file, "still watched").unwrap();
    wait_indexed(&mut sub, &[(file.clone(), "still watched")]).await;

    inner_repo.close().await;
    assert!(coordinator.roots().is_empty());
    coordinator.close().unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_close_keeps_records_of_nested_roots() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().canonicalize().unwrap();
    let inner = root.join("inner");
    fs::create_dir(&inner).unwrap();
    let outer_file = root.join("a.txt");
    let inner_file = inner.join("x.txt");
    fs::write(&outer_file, "outer").unwrap();
    fs::write(&inner_file, "inner").unwrap();

    let store = MemoryStore::new();
    let coordinator = coordinator(&store);
    let mut sub = coordinator.subscribe_under(&root, CancellationToken::new());

    let outer_repo = open_repo("outer", &root, &coordinator, &store);
    let inner_repo = open_repo("inner", &inner, &coordinator, &store);
    outer_repo.wait_for_scan().await.unwrap();
    inner_repo.wait_for_scan().await.unwrap();
    wait_indexed(
        &mut sub,
        &[(outer_file.clone(), "outer"), (inner_file.clone(), "inner")],
    )
    .await;

    outer_repo.close().await;
    assert_eq!(coordinator.interest(&outer_file), 0);
    assert_eq!(store.paths_under(&root), vec![inner_file.clone()]);
    assert!(inner_repo.contains(&ObjectId::of_bytes(b"inner")).unwrap());

    inner_repo.close().await;
    assert!(store.is_empty());
    coordinator.close().unwrap();
}

#[tokio::test]
async fn test_repository_rejects_missing_root() {
    let tmp = TempDir::new().unwrap();
    let store = MemoryStore::new();
    let coordinator = coordinator(&store);

    let result = WatchRepository::open(
        "missing",
        tmp.path().join("missing"),
        Arc::clone(&coordinator),
        Arc::new(store.clone()),
        &watcher_config(),
    );
    assert!(result.is_err());
    assert!(coordinator.roots().is_empty());
}
