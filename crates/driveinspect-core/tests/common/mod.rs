use driveinspect_core::cache::DriveCache;
use driveinspect_core::config::CacheConfig;
use driveinspect_core::node::Node;
use driveinspect_core::testing::{MemoryCacheStore, MockDrive};
use tracing_subscriber::EnvFilter;

pub const ROOT_ID: &str = "0AAroot";
pub const OWNER: &str = "alice@example.com";
pub const FOREIGN_OWNER: &str = "bob@example.com";

/// Install a test subscriber once; `RUST_LOG` picks the level.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A drive laid out as:
///
/// ```text
/// /                     (My Drive)
/// /docs/
/// /docs/report.txt
/// /docs/2018/
/// /docs/2018/budget.xls
/// /photos/
/// /photos/cat.jpg
/// ~bob@example.com/.../Shared Team/       (foreign, no visible parent)
/// ~bob@example.com/.../Shared Team/plan.doc
/// ```
pub fn sample_drive() -> MockDrive {
    let mut drive = MockDrive::with_root(ROOT_ID, "My Drive");
    drive.insert(Node::folder("docs", "docs").with_parent(ROOT_ID).with_owner(OWNER));
    drive.insert(
        Node::leaf("report", "report.txt")
            .with_parent("docs")
            .with_owner(OWNER)
            .with_size(2048),
    );
    drive.insert(Node::folder("y2018", "2018").with_parent("docs").with_owner(OWNER));
    drive.insert(Node::leaf("budget", "budget.xls").with_parent("y2018").with_owner(OWNER));
    drive.insert(Node::folder("photos", "photos").with_parent(ROOT_ID).with_owner(OWNER));
    drive.insert(Node::leaf("cat", "cat.jpg").with_parent("photos").with_owner(OWNER));
    drive.insert(
        Node::folder("team", "Shared Team")
            .with_owned_by_me(Some(false))
            .with_owner(FOREIGN_OWNER),
    );
    drive.insert(
        Node::leaf("plan", "plan.doc")
            .with_parent("team")
            .with_owned_by_me(Some(false))
            .with_owner(FOREIGN_OWNER),
    );
    drive
}

#[allow(dead_code)] // Not every test binary uses the in-memory store
pub fn memory_cache(drive: MockDrive) -> DriveCache<MockDrive, MemoryCacheStore> {
    DriveCache::with_store(drive, MemoryCacheStore::new(), CacheConfig::default())
}
