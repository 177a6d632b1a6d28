mod common;

use chrono::{Duration, Utc};
use common::{FOREIGN_OWNER, ROOT_ID, init_tracing, memory_cache, sample_drive};
use driveinspect_core::cache::{DriveCache, DumpOutcome, LoadOutcome, Resolution};
use driveinspect_core::config::CacheConfig;
use driveinspect_core::node::{Node, NodeId};
use driveinspect_core::remote::RemoteOp;
use driveinspect_core::testing::MockDrive;
use std::path::Path;

fn file_config(path: &Path) -> CacheConfig {
    CacheConfig {
        cache_path: path.to_path_buf(),
        ..CacheConfig::default()
    }
}

#[test]
fn test_cache_survives_restart() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let config = file_config(&dir.path().join("filedata.json"));

    let mut cache = DriveCache::open(sample_drive(), config.clone());
    assert_eq!(cache.last_materialized(), None);
    assert_eq!(
        cache.resolve("/docs/2018/budget.xls").unwrap(),
        Resolution::Found(NodeId::from_raw("budget"))
    );
    assert!(matches!(cache.dump(), DumpOutcome::Written { .. }));

    // Second run against a drive that knows nothing: everything comes from disk.
    let mut cache = DriveCache::open(MockDrive::new(), config);
    assert!(cache.last_materialized().is_some());
    assert!(!cache.is_dirty());
    assert_eq!(
        cache.resolve("/docs/2018/budget.xls").unwrap(),
        Resolution::Found(NodeId::from_raw("budget"))
    );
    assert_eq!(cache.path_of(&"budget".into()).unwrap(), "/docs/2018/budget.xls");
    let children = cache.children_of(&"docs".into()).unwrap();
    assert_eq!(children.len(), 2);
    assert_eq!(cache.call_stats().total_calls(), 0);
    assert_eq!(cache.dump(), DumpOutcome::Clean);
}

#[test]
fn test_disabled_cache_ignores_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("filedata.json");

    let mut cache = DriveCache::open(sample_drive(), file_config(&path));
    cache.get(&"cat".into()).unwrap();
    cache.dump();

    let config = CacheConfig {
        use_cache: false,
        ..file_config(&path)
    };
    let cache = DriveCache::open(sample_drive(), config);
    assert!(cache.state().registry().is_empty());
    assert_eq!(cache.last_materialized(), None);
}

#[test]
fn test_corrupt_file_starts_empty() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("filedata.json");
    std::fs::write(&path, "{\"metadata\": [").unwrap();

    let mut cache = DriveCache::open(sample_drive(), file_config(&path));
    assert!(cache.state().registry().is_empty());
    assert!(matches!(cache.load(), LoadOutcome::Recovered { .. }));

    // A later dump replaces the broken document.
    cache.get(&"report".into()).unwrap();
    assert!(matches!(cache.dump(), DumpOutcome::Written { .. }));
    assert!(matches!(cache.load(), LoadOutcome::Loaded { .. }));
}

#[test]
fn test_resolver_found_missing_ambiguous() {
    init_tracing();
    let mut cache = memory_cache(sample_drive());

    assert_eq!(
        cache.resolve("/docs/report.txt").unwrap(),
        Resolution::Found(NodeId::from_raw("report"))
    );
    assert_eq!(
        cache.resolve("/docs/missing.txt").unwrap(),
        Resolution::NotFound {
            component: "missing.txt".to_string()
        }
    );
    assert_eq!(
        cache.resolve("/nope/report.txt").unwrap(),
        Resolution::NotFound {
            component: "nope".to_string()
        }
    );

    cache
        .register(&[Node::leaf("report-2", "report.txt").with_parent("docs")])
        .unwrap();
    assert!(matches!(
        cache.resolve("/docs/report.txt").unwrap(),
        Resolution::Ambiguous { .. }
    ));
}

#[test]
fn test_full_enumeration_paths() {
    let mut cache = memory_cache(sample_drive().with_page_size(3));
    let listing = cache.all_nodes().unwrap();
    assert!(listing.is_complete());
    assert_eq!(listing.len(), 9);

    let paths = cache.state().paths();
    assert_eq!(paths.get(&ROOT_ID.into()), Some("/"));
    assert_eq!(paths.get(&"photos".into()), Some("/photos/"));
    assert_eq!(paths.get(&"cat".into()), Some("/photos/cat.jpg"));
    assert_eq!(
        paths.get(&"plan".into()),
        Some("~bob@example.com/.../Shared Team/plan.doc")
    );

    // Every folder path ends in a slash, no leaf path does.
    for (id, entry) in cache.state().registry().iter() {
        let path = paths.get(id).unwrap();
        assert_eq!(path.ends_with('/'), entry.node.is_folder(), "{id} -> {path}");
    }

    let foreign_root = format!("~{FOREIGN_OWNER}/.../Shared Team");
    assert_eq!(
        cache.resolve(&foreign_root).unwrap(),
        Resolution::Found(NodeId::from_raw("team"))
    );
}

#[test]
fn test_descendants_of_docs() {
    let mut cache = memory_cache(sample_drive());
    let folders = cache.descendants(&"docs".into(), false).unwrap();
    assert_eq!(folders.ids(), vec![NodeId::from_raw("y2018")]);

    let all = cache.descendants(&"docs".into(), true).unwrap();
    let mut ids = all.ids();
    ids.sort();
    assert_eq!(
        ids,
        vec![
            NodeId::from_raw("budget"),
            NodeId::from_raw("report"),
            NodeId::from_raw("y2018")
        ]
    );
}

#[test]
fn test_modified_since_load_uses_file_time() {
    let dir = tempfile::tempdir().unwrap();
    let config = file_config(&dir.path().join("filedata.json"));

    let mut cache = DriveCache::open(sample_drive(), config.clone());
    cache.get(&"docs".into()).unwrap();
    cache.dump();

    let mut drive = sample_drive();
    drive.insert(
        Node::leaf("fresh", "fresh.txt")
            .with_parent("docs")
            .with_modified_time(Utc::now() + Duration::hours(1)),
    );
    let mut cache = DriveCache::open(drive, config);
    let listing = cache.modified_since_load().unwrap().unwrap();
    assert_eq!(listing.ids(), vec![NodeId::from_raw("fresh")]);
    assert_eq!(cache.call_stats().get(RemoteOp::ListNewer), 1);
    assert_eq!(cache.path_of(&"fresh".into()).unwrap(), "/docs/fresh.txt");
}

#[test]
fn test_status_after_work() {
    let mut cache = memory_cache(sample_drive());
    cache.resolve("/photos/cat.jpg").unwrap();
    cache.set_cwd("/photos");

    let status = cache.status();
    assert_eq!(status.cwd, "/photos");
    assert!(status.dirty);
    assert!(status.calls.get(RemoteOp::Get) >= 1);
    assert!(status.to_string().contains("# cwd: '/photos'"));

    let json = serde_json::to_value(&status).unwrap();
    assert_eq!(json["cwd"], "/photos");
}
