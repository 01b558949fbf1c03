use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use code_oracle::config::Config;
use code_oracle::embedding::HashProvider;
use code_oracle::parser::ParserRegistry;
use code_oracle::store::InMemoryVectorStore;
use code_oracle::{Oracle, OracleError};
use tempfile::TempDir;

const CART_PY: &str = "\
def compute_total(items):
    total = 0
    for item in items:
        total += item.price
    return total
";

const INVENTORY_PY: &str = "\
class Inventory:
    def restock(self, sku, quantity):
        self.levels[sku] = self.levels.get(sku, 0) + quantity
";

const NOTES_MD: &str = "\
# Deployment notes

The service is deployed with a blue/green rollout.
Rollbacks are triggered when the health check fails twice.
";

fn hash_config(root: &Path) -> Config {
    let mut config = Config::default();
    config.index.root = root.to_path_buf();
    config.embedding.provider = "hash".to_string();
    config.embedding.dims = Some(128);
    config
}

fn write_project(root: &Path) {
    fs::create_dir_all(root.join("src")).unwrap();
    fs::create_dir_all(root.join("docs")).unwrap();
    fs::write(root.join("src/cart.py"), CART_PY).unwrap();
    fs::write(root.join("src/inventory.py"), INVENTORY_PY).unwrap();
    fs::write(root.join("docs/notes.md"), NOTES_MD).unwrap();
}

/// In-memory oracle over a fresh project in `tmp`.
fn memory_oracle(tmp: &TempDir) -> Oracle {
    write_project(tmp.path());
    let config = hash_config(tmp.path());
    let store = InMemoryVectorStore::new(Arc::new(HashProvider::new(128)));
    Oracle::with_store(config, Arc::new(store), ParserRegistry::load())
}

fn bump_mtime(path: &Path) {
    let file = fs::File::options().write(true).open(path).unwrap();
    file.set_modified(SystemTime::now() + Duration::from_secs(10))
        .unwrap();
}

#[cfg(feature = "lang-python")]
#[tokio::test]
async fn test_compute_total_found_end_to_end() {
    let tmp = TempDir::new().unwrap();
    let oracle = memory_oracle(&tmp);

    let report = oracle.build(false).await.unwrap();
    assert_eq!(report.files_scanned, 3);
    assert_eq!(report.files_indexed, 3);
    assert_eq!(report.files_fallback, 1);
    assert_eq!(report.files_failed, 0);
    assert!(report.total_chunks >= 3);

    let response = oracle.query("compute total", Some(1), None).await.unwrap();
    assert_eq!(response.results.len(), 1);
    let hit = &response.results[0];
    assert!(hit.content.contains("def compute_total"));
    assert_eq!(hit.metadata["file"], "src/cart.py");
    assert_eq!(hit.metadata["symbol"], "compute_total");
    assert_eq!(hit.metadata["start_line"], 1);
    assert_eq!(hit.metadata["language"], "python");
    assert_eq!(response.files, vec!["src/cart.py"]);
}

#[tokio::test]
async fn test_query_before_build_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let oracle = memory_oracle(&tmp);

    let err = oracle.query("compute total", None, None).await.unwrap_err();
    assert!(matches!(err, OracleError::EmptyIndex));

    let usages = oracle.symbol_usages("compute_total").await.unwrap();
    assert!(usages.found_in_files.is_empty());

    let overview = oracle.overview().await.unwrap();
    assert_eq!(overview.status, "empty");
    assert_eq!(overview.total_chunks, 0);
}

#[tokio::test]
async fn test_rebuild_without_changes_is_noop() {
    let tmp = TempDir::new().unwrap();
    let oracle = memory_oracle(&tmp);

    let first = oracle.build(false).await.unwrap();
    let second = oracle.build(false).await.unwrap();

    assert_eq!(second.files_indexed, 0);
    assert_eq!(second.files_unchanged, 3);
    assert_eq!(second.chunks_written, 0);
    assert_eq!(second.total_chunks, first.total_chunks);
}

#[tokio::test]
async fn test_force_rebuild_reindexes_everything() {
    let tmp = TempDir::new().unwrap();
    let oracle = memory_oracle(&tmp);

    let first = oracle.build(false).await.unwrap();
    let forced = oracle.build(true).await.unwrap();

    assert_eq!(forced.files_indexed, 3);
    assert_eq!(forced.files_unchanged, 0);
    // Records are replaced per file, never duplicated.
    assert_eq!(forced.total_chunks, first.total_chunks);
}

#[cfg(feature = "lang-python")]
#[tokio::test]
async fn test_modified_file_is_reindexed() {
    let tmp = TempDir::new().unwrap();
    let oracle = memory_oracle(&tmp);
    oracle.build(false).await.unwrap();

    let cart = tmp.path().join("src/cart.py");
    fs::write(
        &cart,
        "def apply_discount(order, percentage):\n    return order.total * (100 - percentage) / 100\n",
    )
    .unwrap();
    bump_mtime(&cart);

    let report = oracle.build(false).await.unwrap();
    assert_eq!(report.files_indexed, 1);
    assert_eq!(report.files_unchanged, 2);

    let response = oracle.query("apply discount", Some(1), None).await.unwrap();
    assert_eq!(response.results[0].metadata["symbol"], "apply_discount");

    let stale = oracle.query("compute total", Some(20), None).await.unwrap();
    assert!(stale
        .results
        .iter()
        .all(|hit| !hit.content.contains("compute_total")));
}

#[tokio::test]
async fn test_deleted_file_is_purged() {
    let tmp = TempDir::new().unwrap();
    let oracle = memory_oracle(&tmp);
    oracle.build(false).await.unwrap();

    fs::remove_file(tmp.path().join("docs/notes.md")).unwrap();
    let report = oracle.build(false).await.unwrap();
    assert_eq!(report.files_removed, 1);

    let response = oracle.query("deployment rollback", Some(20), None).await.unwrap();
    assert!(!response.files.iter().any(|f| f == "docs/notes.md"));

    let overview = oracle.overview().await.unwrap();
    assert_eq!(overview.tracked_files, 2);
}

#[tokio::test]
async fn test_markdown_uses_fallback_windows() {
    let tmp = TempDir::new().unwrap();
    let oracle = memory_oracle(&tmp);
    oracle.build(false).await.unwrap();

    let response = oracle
        .query("deployment notes rollback health check", Some(20), None)
        .await
        .unwrap();
    let note = response
        .results
        .iter()
        .find(|hit| hit.metadata["file"] == "docs/notes.md")
        .expect("markdown window indexed");
    assert_eq!(note.metadata["kind"], "fallback");
    assert!(note.metadata.get("symbol").is_none());
    assert!(note.content.starts_with("# Deployment notes"));
}

#[tokio::test]
async fn test_symbol_usages_subset_of_query_files() {
    let tmp = TempDir::new().unwrap();
    let oracle = memory_oracle(&tmp);
    oracle.build(false).await.unwrap();

    let usages = oracle.symbol_usages("restock").await.unwrap();
    let response = oracle.query("restock", Some(15), None).await.unwrap();

    assert_eq!(usages.symbol, "restock");
    assert!(!usages.found_in_files.is_empty());
    for file in &usages.found_in_files {
        assert!(response.files.contains(file));
    }
}

#[tokio::test]
async fn test_queries_are_remembered() {
    let tmp = TempDir::new().unwrap();
    let oracle = memory_oracle(&tmp);
    oracle.build(false).await.unwrap();

    assert!(oracle.memory_state(None).await.unwrap().is_empty());

    oracle
        .query("where are totals computed", Some(3), Some("cart.py owns totals"))
        .await
        .unwrap();
    oracle.query("restock inventory", Some(3), None).await.unwrap();

    let entries = oracle.memory_state(Some(10)).await.unwrap();
    assert_eq!(entries.len(), 2);
    let noted = entries
        .iter()
        .find(|e| e.query == "where are totals computed")
        .unwrap();
    assert_eq!(noted.insight.as_deref(), Some("cart.py owns totals"));
    assert!(!noted.files.is_empty());

    // Symbol lookups do not write to memory.
    oracle.symbol_usages("Inventory").await.unwrap();
    assert_eq!(oracle.overview().await.unwrap().memory_entries, 2);
}

#[tokio::test]
async fn test_memory_disabled_skips_logging() {
    let tmp = TempDir::new().unwrap();
    write_project(tmp.path());
    let mut config = hash_config(tmp.path());
    config.memory.enabled = false;
    let store = InMemoryVectorStore::new(Arc::new(HashProvider::new(128)));
    let oracle = Oracle::with_store(config, Arc::new(store), ParserRegistry::load());

    oracle.build(false).await.unwrap();
    oracle.query("compute total", None, None).await.unwrap();
    assert_eq!(oracle.overview().await.unwrap().memory_entries, 0);
}

#[tokio::test]
async fn test_without_grammars_everything_falls_back() {
    let tmp = TempDir::new().unwrap();
    write_project(tmp.path());
    let config = hash_config(tmp.path());
    let store = InMemoryVectorStore::new(Arc::new(HashProvider::new(128)));
    let oracle = Oracle::with_store(config, Arc::new(store), ParserRegistry::empty());

    let report = oracle.build(false).await.unwrap();
    assert_eq!(report.files_failed, 0);
    assert_eq!(report.files_fallback, report.files_indexed);

    let response = oracle.query("compute total", Some(20), None).await.unwrap();
    assert!(response
        .results
        .iter()
        .all(|hit| hit.metadata["kind"] == "fallback"));
}

#[tokio::test]
async fn test_sqlite_index_survives_reopen() {
    let tmp = TempDir::new().unwrap();
    write_project(tmp.path());

    let total = {
        let oracle = Oracle::open(hash_config(tmp.path())).await.unwrap();
        let report = oracle.build(false).await.unwrap();
        assert!(tmp.path().join(".oracle_index").is_dir());
        report.total_chunks
    };

    let oracle = Oracle::open(hash_config(tmp.path())).await.unwrap();
    let overview = oracle.overview().await.unwrap();
    assert_eq!(overview.status, "ready");
    assert_eq!(overview.total_chunks, total);
    assert_eq!(overview.tracked_files, 3);

    // The tracker survived too, so nothing is reindexed.
    let report = oracle.build(false).await.unwrap();
    assert_eq!(report.files_unchanged, 3);
    assert_eq!(report.files_indexed, 0);
}

#[tokio::test]
async fn test_index_dir_is_not_indexed() {
    let tmp = TempDir::new().unwrap();
    write_project(tmp.path());
    let oracle = Oracle::open(hash_config(tmp.path())).await.unwrap();

    oracle.build(false).await.unwrap();
    let report = oracle.build(true).await.unwrap();
    assert_eq!(report.files_scanned, 3);
}

#[cfg(unix)]
#[tokio::test]
async fn test_unreadable_directory_keeps_its_index() {
    use std::os::unix::fs::PermissionsExt;

    let tmp = TempDir::new().unwrap();
    let oracle = memory_oracle(&tmp);
    let first = oracle.build(false).await.unwrap();

    let src = tmp.path().join("src");
    fs::set_permissions(&src, fs::Permissions::from_mode(0o000)).unwrap();
    // Privileged users read through the mode bits; nothing to observe then.
    let readable = fs::read_dir(&src).is_ok();
    let second = oracle.build(false).await;
    fs::set_permissions(&src, fs::Permissions::from_mode(0o755)).unwrap();
    if readable {
        return;
    }

    let second = second.unwrap();
    assert_eq!(second.files_removed, 0);
    assert_eq!(second.total_chunks, first.total_chunks);
    assert!(second.errors.iter().any(|e| e.starts_with("src")), "{:?}", second.errors);

    let response = oracle.query("compute total", Some(20), None).await.unwrap();
    assert!(response.files.iter().any(|f| f == "src/cart.py"));
    assert_eq!(oracle.overview().await.unwrap().tracked_files, 3);
}

#[tokio::test]
async fn test_open_rejects_missing_root() {
    let tmp = TempDir::new().unwrap();
    let missing = tmp.path().join("typo");

    let err = Oracle::open(hash_config(&missing)).await.err().unwrap();
    assert!(matches!(err, OracleError::InvalidInput(_)));
    assert!(!missing.exists());
}
