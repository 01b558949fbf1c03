//! The oracle facade: one object owning the parser registry, change tracker,
//! vector store, and project memory.
//!
//! Construct it once with [`Oracle::open`] and share it behind an `Arc`; the
//! CLI and the HTTP server both drive the same instance. Builds are
//! serialized by the tracker mutex. Queries never take that lock, so a query
//! running during a build may see some files already reindexed and others
//! not yet.

use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Mutex;

use crate::config::Config;
use crate::embedding::create_provider;
use crate::error::{OracleError, Result};
use crate::indexer::{FileOutcome, IndexWriter};
use crate::languages::supported_languages;
use crate::memory::ProjectMemory;
use crate::models::{BuildReport, MemoryEntry, Overview, QueryResponse, SymbolUsages};
use crate::parser::ParserRegistry;
use crate::query::{clamp_k, distinct_files, QueryEngine};
use crate::scan::scan_tree;
use crate::store::{SqliteVectorStore, VectorStore, CHUNK_COLLECTION};
use crate::tracker::ChangeTracker;

/// Tracker is flushed to disk after this many indexed files.
const SAVE_EVERY: usize = 32;
/// A progress line is logged after this many processed files.
const PROGRESS_EVERY: usize = 30;

pub struct Oracle {
    root: PathBuf,
    index_dir: PathBuf,
    config: Config,
    registry: ParserRegistry,
    tracker: Mutex<ChangeTracker>,
    store: Arc<dyn VectorStore>,
    memory: ProjectMemory,
}

impl Oracle {
    /// Open the persistent index for `config.index.root`.
    ///
    /// The root must be an existing directory; only the index directory
    /// inside it is created.
    pub async fn open(config: Config) -> Result<Self> {
        let embedder = create_provider(&config.embedding).map_err(OracleError::Embedding)?;
        let config = with_canonical_root(config);
        if !config.index.root.is_dir() {
            return Err(OracleError::InvalidInput(format!(
                "index root is not a directory: {}",
                config.index.root.display()
            )));
        }
        let index_dir = config.index_path();
        std::fs::create_dir_all(&index_dir)?;

        let store = SqliteVectorStore::open(&index_dir, embedder).await?;
        tracing::info!(
            root = %config.index.root.display(),
            index = %index_dir.display(),
            "oracle opened"
        );
        Ok(Self::with_store(config, Arc::new(store), ParserRegistry::load()))
    }

    /// Assemble an oracle around an existing store and registry.
    pub fn with_store(
        config: Config,
        store: Arc<dyn VectorStore>,
        registry: ParserRegistry,
    ) -> Self {
        let root = config.index.root.clone();
        let index_dir = config.index_path();
        let tracker = ChangeTracker::load(&index_dir);
        let memory = ProjectMemory::new(store.clone(), config.memory.state_query.clone());

        Self {
            root,
            index_dir,
            config,
            registry,
            tracker: Mutex::new(tracker),
            store,
            memory,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Walk the root, reindex new or modified files (or every file when
    /// `force` is set), and purge records for files that disappeared.
    ///
    /// Per-file failures are logged and collected in
    /// [`BuildReport::errors`]; they never abort the build.
    pub async fn build(&self, force: bool) -> Result<BuildReport> {
        let started = Instant::now();
        let mut tracker = self.tracker.lock().await;
        let mut report = BuildReport::default();

        let scan = scan_tree(&self.root, &self.index_dir, &self.config.index)?;
        for failure in &scan.failures {
            let path = if failure.rel_path.is_empty() { "." } else { failure.rel_path.as_str() };
            report.errors.push(format!("{}: {}", path, failure.error));
        }
        let files = &scan.files;
        report.files_scanned = files.len();
        tracing::info!(root = %self.root.display(), total = files.len(), force, "indexing started");

        let writer = IndexWriter::new(&self.registry, self.store.as_ref(), &self.config.chunking);
        let mut seen: HashSet<&str> = HashSet::with_capacity(files.len());
        let mut since_save = 0;

        for (i, file) in files.iter().enumerate() {
            seen.insert(file.rel_path.as_str());

            if tracker.should_index(&file.abs_path, &file.rel_path, force) {
                match writer.index_file(&mut tracker, file).await {
                    Ok(outcome) => {
                        match outcome {
                            FileOutcome::Syntax { .. } => report.files_indexed += 1,
                            FileOutcome::Fallback { .. } => {
                                report.files_indexed += 1;
                                report.files_fallback += 1;
                            }
                            FileOutcome::Skipped => report.files_skipped += 1,
                        }
                        report.chunks_written += outcome.chunks();

                        since_save += 1;
                        if since_save >= SAVE_EVERY {
                            if let Err(e) = tracker.save() {
                                tracing::warn!(error = %e, "failed to checkpoint change tracker");
                            }
                            since_save = 0;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(file = %file.rel_path, error = %e, "failed to index file");
                        report.files_failed += 1;
                        report.errors.push(format!("{}: {}", file.rel_path, e));
                    }
                }
            } else {
                report.files_unchanged += 1;
            }

            if (i + 1) % PROGRESS_EVERY == 0 {
                tracing::info!(processed = i + 1, total = files.len(), "indexing progress");
            }
        }

        let mut known: BTreeSet<String> = tracker.paths().map(str::to_string).collect();
        known.extend(self.store.files(CHUNK_COLLECTION).await?);
        for stale in known.iter().filter(|p| !seen.contains(p.as_str())) {
            if scan.is_obscured(stale) {
                tracing::debug!(file = %stale, "not purged, path was unreadable during the walk");
                continue;
            }
            match self.store.delete_file(CHUNK_COLLECTION, stale).await {
                Ok(removed) => {
                    tracker.remove(stale);
                    report.files_removed += 1;
                    tracing::debug!(file = %stale, chunks = removed, "purged deleted file");
                }
                Err(e) => {
                    tracing::warn!(file = %stale, error = %e, "failed to purge deleted file");
                    report.errors.push(format!("{}: {}", stale, e));
                }
            }
        }

        tracker.save()?;

        report.total_chunks = self.store.count(CHUNK_COLLECTION).await?;
        report.duration_ms = started.elapsed().as_millis() as u64;

        tracing::info!(
            indexed = report.files_indexed,
            unchanged = report.files_unchanged,
            failed = report.files_failed,
            removed = report.files_removed,
            chunks = report.chunks_written,
            total_chunks = report.total_chunks,
            duration_ms = report.duration_ms,
            "indexing finished"
        );
        Ok(report)
    }

    /// Natural-language query. `k` defaults to `retrieval.default_k` and is
    /// clamped to `retrieval.max_k`.
    pub async fn query(
        &self,
        text: &str,
        k: Option<usize>,
        insight: Option<&str>,
    ) -> Result<QueryResponse> {
        let k = k.unwrap_or(self.config.retrieval.default_k);
        let engine = QueryEngine::new(self.store.as_ref(), self.config.retrieval.max_k);
        if self.config.memory.enabled {
            engine.with_memory(&self.memory).query(text, k, insight).await
        } else {
            engine.query(text, k, insight).await
        }
    }

    /// Files whose chunks are nearest to `symbol` used as query text.
    ///
    /// Approximate: exact references ranked low are missed and similarly
    /// named code is included. An empty index yields no files.
    pub async fn symbol_usages(&self, symbol: &str) -> Result<SymbolUsages> {
        let symbol = symbol.trim();
        let engine = QueryEngine::new(self.store.as_ref(), self.config.retrieval.max_k);

        let found_in_files = match engine.retrieve(symbol, self.config.retrieval.symbol_k).await {
            Ok(hits) => distinct_files(&hits),
            Err(OracleError::EmptyIndex) => Vec::new(),
            Err(e) => return Err(e),
        };

        Ok(SymbolUsages {
            symbol: symbol.to_string(),
            found_in_files,
        })
    }

    pub async fn overview(&self) -> Result<Overview> {
        let total_chunks = self.store.count(CHUNK_COLLECTION).await?;
        let tracked_files = self.tracker.try_lock().map(|t| t.len()).unwrap_or_else(|_| {
            // A build holds the lock; the on-disk checkpoint is close enough.
            ChangeTracker::load(&self.index_dir).len()
        });

        Ok(Overview {
            status: if total_chunks > 0 { "ready" } else { "empty" }.to_string(),
            root: self.root.display().to_string(),
            total_chunks,
            tracked_files,
            memory_entries: self.memory.count().await?,
            supported_languages: supported_languages(),
            loaded_languages: self.registry.loaded_languages(),
        })
    }

    /// Recent project activity from the memory log.
    pub async fn memory_state(&self, k: Option<usize>) -> Result<Vec<MemoryEntry>> {
        let k = clamp_k(
            k.unwrap_or(self.config.memory.default_k),
            self.config.retrieval.max_k,
        );
        self.memory.get_state(k).await
    }
}

fn with_canonical_root(mut config: Config) -> Config {
    if let Ok(root) = std::fs::canonicalize(&config.index.root) {
        config.index.root = root;
    }
    config
}
