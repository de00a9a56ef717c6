//! Incremental synchronization of the source folder with the vector index.
//!
//! A pass discovers documents, fingerprints them, reconciles them with the
//! manifest and then applies the minimal set of index changes. Each document
//! is committed on its own: its artifacts are fully prepared first, then the
//! index batch is applied and the manifest saved while holding the manifest
//! lock. Index and manifest I/O runs on the blocking pool. Concurrent passes
//! against the same index and manifest are not supported.

use crate::chunker::Chunker;
use crate::describer::ImageDescriber;
use crate::discovery::{discover, SourceFile, SourceFilter};
use crate::error::{IngestError, IngestResult};
use crate::extractors::{ExtractedDocument, ExtractorRegistry, ImageFilter};
use crate::fingerprint::{fingerprint, fingerprint_file};
use crate::reconcile::{reconcile, SyncPlan};
use futures_util::stream::{self, StreamExt};
use lectern_config::Config;
use lectern_core::{
    ArtifactId, ArtifactKind, DocumentPath, Embedder, Fingerprint, IndexRecord, Manifest,
    ManifestEntry, ManifestStore, PassSummary, TextArtifact, VectorIndex,
};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Validated settings for a pass.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub root: PathBuf,
    pub filter: SourceFilter,
    pub chunker: Chunker,
    pub workers: usize,
    pub images: ImageFilter,
}

impl SyncSettings {
    /// Validate `config` and derive pass settings from it.
    ///
    /// Any problem here is a configuration error, raised before the index or
    /// manifest is touched.
    pub fn from_config(config: &Config) -> IngestResult<Self> {
        config.validate()?;
        Ok(Self {
            root: config.sources.root_path(),
            filter: SourceFilter::new(&config.sources.extensions, &config.sources.ignore_patterns)?,
            chunker: Chunker::from_config(&config.chunking)?,
            workers: config.ingest.workers.max(1),
            images: ImageFilter::from(&config.images),
        })
    }
}

/// Mutable state of a pass: the manifest and where it lives.
pub struct SyncContext {
    manifest: Mutex<Manifest>,
    store: Arc<dyn ManifestStore>,
}

impl SyncContext {
    /// Load the manifest from `store`.
    pub fn load(store: Arc<dyn ManifestStore>) -> IngestResult<Self> {
        let manifest = store.load()?;
        Ok(Self {
            manifest: Mutex::new(manifest),
            store,
        })
    }

    /// A copy of the current manifest.
    pub async fn manifest(&self) -> Manifest {
        self.manifest.lock().await.clone()
    }
}

/// A discovered document with its fingerprint.
#[derive(Debug, Clone)]
struct ScannedDocument {
    file: SourceFile,
    fingerprint: Fingerprint,
    size_bytes: u64,
}

/// Result of a scan: fingerprinted documents and the paths that could not be read.
struct Scan {
    documents: BTreeMap<DocumentPath, ScannedDocument>,
    unreadable: BTreeMap<DocumentPath, String>,
}

/// What committing one document did.
#[derive(Debug, Default)]
struct DocumentReport {
    replaced: bool,
    artifacts_written: usize,
    artifacts_removed: usize,
    images_described: usize,
    images_failed: usize,
}

/// Keeps the vector index consistent with the source folder.
pub struct Synchronizer {
    settings: SyncSettings,
    extractors: Arc<ExtractorRegistry>,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    describer: Option<ImageDescriber>,
}

impl Synchronizer {
    pub fn new(
        settings: SyncSettings,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
    ) -> Self {
        let extractors = Arc::new(ExtractorRegistry::with_defaults(settings.images));
        Self {
            settings,
            extractors,
            embedder,
            index,
            describer: None,
        }
    }

    pub fn with_extractors(mut self, extractors: ExtractorRegistry) -> Self {
        self.extractors = Arc::new(extractors);
        self
    }

    /// Describe embedded images with `describer`. Without one, images are ignored.
    pub fn with_describer(mut self, describer: ImageDescriber) -> Self {
        self.describer = Some(describer);
        self
    }

    /// Compute what a pass would do without extracting or mutating anything.
    pub async fn plan_pass(&self, ctx: &SyncContext) -> IngestResult<SyncPlan> {
        let scan = self.scan().await?;
        let indexed = self.inventory().await?;
        let manifest = ctx.manifest().await;
        Ok(self.plan(&manifest, &scan, &indexed))
    }

    /// Delete every indexed artifact and empty the manifest, so the next pass
    /// ingests every document from scratch. Returns the number of artifacts deleted.
    pub async fn reset(&self, ctx: &SyncContext) -> IngestResult<usize> {
        let mut manifest = ctx.manifest.lock().await;
        let index = Arc::clone(&self.index);
        let store = Arc::clone(&ctx.store);

        let removed = blocking(move || -> IngestResult<usize> {
            let ids: Vec<ArtifactId> = index.ids()?.into_iter().collect();
            index.apply(&ids, &[])?;
            store.save(&Manifest::new())?;
            Ok(ids.len())
        })
        .await?;

        *manifest = Manifest::new();
        info!("Cleared {} artifacts", removed);
        Ok(removed)
    }

    /// Run one synchronization pass.
    pub async fn run_pass(&self, ctx: &SyncContext) -> IngestResult<PassSummary> {
        let scan = self.scan().await?;
        let indexed = self.inventory().await?;
        let mut summary = PassSummary::default();

        for (path, error) in &scan.unreadable {
            warn!("Failed to read {}: {}", path, error);
            summary.record_failure(path.clone(), error);
        }

        let plan = {
            let manifest = ctx.manifest.lock().await;
            self.plan(&manifest, &scan, &indexed)
        };
        summary.unchanged = plan.unchanged.len();

        info!(
            insert = plan.insert.len(),
            replace = plan.replace.len(),
            repair = plan.repair.len(),
            unchanged = plan.unchanged.len(),
            remove = plan.remove.len(),
            "Planned pass over {}",
            self.settings.root.display()
        );

        for path in &plan.remove {
            match self.remove_document(ctx, path).await {
                Ok(removed) => {
                    summary.deleted += 1;
                    summary.artifacts_removed += removed;
                    info!("Removed {} ({} artifacts)", path, removed);
                }
                Err(e) => {
                    warn!("Failed to remove {}: {}", path, e);
                    summary.record_failure(path.clone(), e);
                }
            }
        }

        let jobs: Vec<ScannedDocument> = plan
            .to_process()
            .filter_map(|path| scan.documents.get(path).cloned())
            .collect();

        let results: Vec<(DocumentPath, IngestResult<DocumentReport>)> = stream::iter(jobs)
            .map(|doc| async move {
                let path = doc.file.path.clone();
                let result = self.ingest_document(ctx, doc).await;
                (path, result)
            })
            .buffer_unordered(self.settings.workers)
            .collect()
            .await;

        let repairing: BTreeSet<DocumentPath> = plan.repair.iter().cloned().collect();
        for (path, result) in results {
            match result {
                Ok(report) => {
                    if repairing.contains(&path) {
                        summary.repaired += 1;
                    } else if report.replaced {
                        summary.updated += 1;
                    } else {
                        summary.inserted += 1;
                    }
                    summary.artifacts_written += report.artifacts_written;
                    summary.artifacts_removed += report.artifacts_removed;
                    summary.images_described += report.images_described;
                    summary.images_failed += report.images_failed;
                }
                Err(e) => {
                    warn!("Failed to ingest {}: {}", path, e);
                    summary.record_failure(path, e);
                }
            }
        }

        summary.failed.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(summary)
    }

    fn plan(
        &self,
        manifest: &Manifest,
        scan: &Scan,
        indexed: &BTreeMap<DocumentPath, BTreeSet<ArtifactId>>,
    ) -> SyncPlan {
        let current: BTreeMap<DocumentPath, Fingerprint> = scan
            .documents
            .iter()
            .map(|(path, doc)| (path.clone(), doc.fingerprint.clone()))
            .collect();
        let unreadable: BTreeSet<DocumentPath> = scan.unreadable.keys().cloned().collect();
        reconcile(manifest, &current, &unreadable, indexed)
    }

    /// What the index currently stores, grouped by source path.
    async fn inventory(&self) -> IngestResult<BTreeMap<DocumentPath, BTreeSet<ArtifactId>>> {
        let index = Arc::clone(&self.index);
        blocking(move || -> IngestResult<_> { Ok(index.ids_by_path()?) }).await
    }

    /// Discover and fingerprint every source document.
    async fn scan(&self) -> IngestResult<Scan> {
        let root = self.settings.root.clone();
        let filter = self.settings.filter.clone();

        blocking(move || -> IngestResult<Scan> {
            let mut scan = Scan {
                documents: BTreeMap::new(),
                unreadable: BTreeMap::new(),
            };

            for file in discover(&root, &filter)? {
                match fingerprint_file(&file.absolute) {
                    Ok((fingerprint, size_bytes)) => {
                        scan.documents.insert(
                            file.path.clone(),
                            ScannedDocument {
                                file,
                                fingerprint,
                                size_bytes,
                            },
                        );
                    }
                    Err(e) => {
                        scan.unreadable.insert(file.path, e.to_string());
                    }
                }
            }

            Ok(scan)
        })
        .await
    }

    /// Delete a vanished document's artifacts and drop its entry, if it has one.
    async fn remove_document(&self, ctx: &SyncContext, path: &str) -> IngestResult<usize> {
        let mut manifest = ctx.manifest.lock().await;
        let index = Arc::clone(&self.index);
        let store = Arc::clone(&ctx.store);
        let mut next = manifest.clone();
        let path = path.to_string();

        let (next, removed) = blocking(move || -> IngestResult<(Manifest, usize)> {
            let mut ids: BTreeSet<ArtifactId> = next
                .get(&path)
                .map(|entry| entry.artifact_ids.iter().cloned().collect())
                .unwrap_or_default();
            ids.extend(index.ids_for_path(&path)?);

            let ids: Vec<ArtifactId> = ids.into_iter().collect();
            index.apply(&ids, &[])?;

            if next.remove(&path).is_some() {
                store.save(&next)?;
            }
            Ok((next, ids.len()))
        })
        .await?;

        *manifest = next;
        Ok(removed)
    }

    /// Extract, describe and embed one document, then commit it.
    async fn ingest_document(
        &self,
        ctx: &SyncContext,
        doc: ScannedDocument,
    ) -> IngestResult<DocumentReport> {
        let path = doc.file.path.clone();
        debug!("Ingesting {}", path);

        let bytes = tokio::fs::read(&doc.file.absolute)
            .await
            .map_err(|e| IngestError::extraction(&doc.file.absolute, e))?;

        // Index what was actually read, even if the file changed since the scan.
        let fp = fingerprint(&bytes);
        if fp != doc.fingerprint {
            debug!("{} changed during the pass, using the newer content", path);
        }
        let size_bytes = bytes.len() as u64;

        let extracted = self.extract(&doc.file, bytes).await?;

        let mut report = DocumentReport::default();
        let mut artifacts = self.chunk_artifacts(&path, &fp, &extracted);
        artifacts.extend(self.describe_images(&path, &fp, &extracted, &mut report).await);

        let mut records = Vec::with_capacity(artifacts.len());
        for artifact in &artifacts {
            let vector = self.embedder.embed(&artifact.text).await?;
            records.push(IndexRecord::from_artifact(
                artifact,
                vector,
                self.embedder.model_name(),
            ));
        }

        self.commit(ctx, &path, fp, size_bytes, records, &mut report)
            .await?;

        info!(
            "{} {} ({} artifacts)",
            if report.replaced { "Updated" } else { "Ingested" },
            path,
            report.artifacts_written
        );
        Ok(report)
    }

    async fn extract(&self, file: &SourceFile, bytes: Vec<u8>) -> IngestResult<ExtractedDocument> {
        let extractors = Arc::clone(&self.extractors);
        let absolute = file.absolute.clone();

        tokio::task::spawn_blocking(move || extractors.extract(&absolute, &bytes))
            .await
            .map_err(|e| IngestError::extraction(&file.absolute, e))?
    }

    fn chunk_artifacts(
        &self,
        path: &str,
        fp: &Fingerprint,
        extracted: &ExtractedDocument,
    ) -> Vec<TextArtifact> {
        self.settings
            .chunker
            .chunk(&extracted.pages)
            .into_iter()
            .map(|window| TextArtifact {
                id: ArtifactId::chunk(path, fp, window.index),
                source_path: path.to_string(),
                pages: window.pages,
                kind: ArtifactKind::Chunk {
                    index: window.index,
                },
                text: window.text,
            })
            .collect()
    }

    /// Describe every image; failures are counted and skipped.
    async fn describe_images(
        &self,
        path: &str,
        fp: &Fingerprint,
        extracted: &ExtractedDocument,
        report: &mut DocumentReport,
    ) -> Vec<TextArtifact> {
        let Some(describer) = &self.describer else {
            if !extracted.images.is_empty() {
                debug!("Ignoring {} images in {}", extracted.images.len(), path);
            }
            return Vec::new();
        };

        let results = futures_util::future::join_all(
            extracted
                .images
                .iter()
                .map(|image| describer.describe(path, fp, image)),
        )
        .await;

        let mut artifacts = Vec::new();
        for result in results {
            match result {
                Ok(artifact) => {
                    report.images_described += 1;
                    artifacts.push(artifact);
                }
                Err(e) => {
                    report.images_failed += 1;
                    warn!("Skipping image in {}: {}", path, e);
                }
            }
        }
        artifacts
    }

    /// Swap the document's artifacts in the index and record the new entry.
    async fn commit(
        &self,
        ctx: &SyncContext,
        path: &str,
        fp: Fingerprint,
        size_bytes: u64,
        records: Vec<IndexRecord>,
        report: &mut DocumentReport,
    ) -> IngestResult<()> {
        let mut manifest = ctx.manifest.lock().await;

        let previous = manifest.get(path).cloned();
        report.replaced = previous.is_some();
        let written = records.len();

        let index = Arc::clone(&self.index);
        let store = Arc::clone(&ctx.store);
        let mut next = manifest.clone();
        let path = path.to_string();

        // A failed batch leaves the previous entry in place. Whatever the
        // index still holds for this path is swept by the next pass.
        let (next, removed) = blocking(move || -> IngestResult<(Manifest, usize)> {
            let mut deletes: BTreeSet<ArtifactId> = previous
                .iter()
                .flat_map(|entry| entry.artifact_ids.iter().cloned())
                .collect();
            deletes.extend(index.ids_for_path(&path)?);
            let new_ids: Vec<ArtifactId> = records.iter().map(|r| r.id.clone()).collect();
            let deletes: Vec<ArtifactId> = deletes
                .into_iter()
                .filter(|id| !new_ids.contains(id))
                .collect();

            index.apply(&deletes, &records)?;

            next.insert(path, ManifestEntry::new(fp, new_ids, size_bytes));
            store.save(&next)?;
            Ok((next, deletes.len()))
        })
        .await?;

        report.artifacts_removed = removed;
        report.artifacts_written = written;
        *manifest = next;
        Ok(())
    }
}

/// Run blocking index, manifest or filesystem work off the async workers.
async fn blocking<T, F>(work: F) -> IngestResult<T>
where
    F: FnOnce() -> IngestResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| IngestError::Io(std::io::Error::other(e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::{DocumentExtractor, ExtractedImage, TextExtractor};
    use async_trait::async_trait;
    use lectern_config::ImageConfig;
    use lectern_core::Captioner;
    use lectern_core::IndexHit;
    use lectern_db::{JsonManifestStore, SqliteIndex};
    use std::path::Path;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Deterministic bag-of-bytes embedding.
    struct HashEmbedder;

    #[async_trait]
    impl Embedder for HashEmbedder {
        fn model_name(&self) -> &str {
            "hash-embed"
        }

        async fn embed(&self, text: &str) -> lectern_core::Result<Vec<f32>> {
            let mut v = vec![0.0f32; 8];
            for (i, b) in text.bytes().enumerate() {
                v[(b as usize + i) % 8] += 1.0;
            }
            Ok(v)
        }
    }

    /// Fails every image whose index is odd.
    struct PickyCaptioner;

    #[async_trait]
    impl Captioner for PickyCaptioner {
        async fn caption(&self, image: &[u8], _media_type: &str) -> lectern_core::Result<String> {
            if image[0] % 2 == 1 {
                return Err(lectern_core::Error::Description("rejected".into()));
            }
            Ok("a labelled diagram".to_string())
        }
    }

    /// Text pages plus two fake figures on page 1.
    struct FigureExtractor;

    impl DocumentExtractor for FigureExtractor {
        fn extract(&self, _path: &Path, bytes: &[u8]) -> IngestResult<ExtractedDocument> {
            let mut doc = ExtractedDocument::default();
            doc.push_page(1, String::from_utf8_lossy(bytes).to_string());
            for index in 0..2u32 {
                doc.images.push(ExtractedImage {
                    page: 1,
                    index,
                    bytes: vec![index as u8; 16],
                    width: 200,
                    height: 200,
                    media_type: "image/png",
                });
            }
            Ok(doc)
        }

        fn extensions(&self) -> &[&str] {
            &["fig"]
        }
    }

    /// SQLite index whose batch writes can be made to fail.
    struct FlakyIndex {
        inner: Arc<SqliteIndex>,
        fail_apply: AtomicBool,
    }

    impl FlakyIndex {
        fn new(inner: Arc<SqliteIndex>) -> Self {
            Self {
                inner,
                fail_apply: AtomicBool::new(false),
            }
        }

        fn set_failing(&self, failing: bool) {
            self.fail_apply.store(failing, Ordering::SeqCst);
        }
    }

    impl VectorIndex for FlakyIndex {
        fn upsert(&self, record: &IndexRecord) -> lectern_core::Result<()> {
            self.inner.upsert(record)
        }

        fn delete(&self, id: &ArtifactId) -> lectern_core::Result<()> {
            self.inner.delete(id)
        }

        fn query(&self, vector: &[f32], k: usize) -> lectern_core::Result<Vec<IndexHit>> {
            self.inner.query(vector, k)
        }

        fn ids(&self) -> lectern_core::Result<BTreeSet<ArtifactId>> {
            self.inner.ids()
        }

        fn ids_for_path(&self, path: &str) -> lectern_core::Result<Vec<ArtifactId>> {
            self.inner.ids_for_path(path)
        }

        fn ids_by_path(&self) -> lectern_core::Result<BTreeMap<DocumentPath, BTreeSet<ArtifactId>>> {
            self.inner.ids_by_path()
        }

        fn len(&self) -> lectern_core::Result<usize> {
            self.inner.len()
        }

        fn apply(&self, deletes: &[ArtifactId], upserts: &[IndexRecord]) -> lectern_core::Result<()> {
            if self.fail_apply.load(Ordering::SeqCst) {
                return Err(lectern_core::Error::Index("database is locked".into()));
            }
            self.inner.apply(deletes, upserts)
        }
    }

    struct Fixture {
        dir: tempfile::TempDir,
        index: Arc<SqliteIndex>,
        store: Arc<JsonManifestStore>,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            std::fs::create_dir_all(dir.path().join("src")).unwrap();
            Self {
                index: Arc::new(SqliteIndex::open_in_memory().unwrap()),
                store: Arc::new(JsonManifestStore::new(dir.path().join("manifest.json"))),
                dir,
            }
        }

        fn root(&self) -> PathBuf {
            self.dir.path().join("src")
        }

        fn write(&self, rel: &str, contents: &[u8]) {
            let path = self.root().join(rel);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, contents).unwrap();
        }

        fn config(&self, extensions: &[&str]) -> Config {
            let mut config = Config::default();
            config.sources.root = self.root().to_string_lossy().to_string();
            config.sources.extensions = extensions.iter().map(|e| e.to_string()).collect();
            config.chunking.window_size = 50;
            config.chunking.overlap = 10;
            config
        }

        fn synchronizer(&self, config: &Config) -> Synchronizer {
            self.synchronizer_with(config, self.index.clone())
        }

        fn synchronizer_with(&self, config: &Config, index: Arc<dyn VectorIndex>) -> Synchronizer {
            let settings = SyncSettings::from_config(config).unwrap();
            Synchronizer::new(settings, Arc::new(HashEmbedder), index)
                .with_extractors(
                    ExtractorRegistry::new()
                        .with(TextExtractor::new())
                        .with(FigureExtractor),
                )
        }

        fn context(&self) -> SyncContext {
            SyncContext::load(self.store.clone()).unwrap()
        }

        async fn pass(&self, sync: &Synchronizer) -> PassSummary {
            sync.run_pass(&self.context()).await.unwrap()
        }

        fn manifest(&self) -> Manifest {
            self.store.load().unwrap()
        }

        fn manifest_bytes(&self) -> Vec<u8> {
            std::fs::read(self.store.path()).unwrap()
        }

        fn assert_coverage(&self) {
            assert_eq!(self.index.ids().unwrap(), self.manifest().all_artifact_ids());
        }
    }

    fn long_text(word: &str) -> String {
        format!("{} ", word).repeat(40)
    }

    #[tokio::test]
    async fn test_first_pass_ingests_everything() {
        let fx = Fixture::new();
        fx.write("week1/intro.txt", long_text("intro").as_bytes());
        fx.write("week2/optics.txt", b"short page one\x0Cshort page two");
        let sync = fx.synchronizer(&fx.config(&["txt"]));

        let summary = fx.pass(&sync).await;

        assert_eq!(summary.inserted, 2);
        assert!(summary.is_clean());
        assert_eq!(summary.artifacts_written, fx.index.len().unwrap());

        let manifest = fx.manifest();
        assert_eq!(manifest.len(), 2);
        let optics = manifest.get("week2/optics.txt").unwrap();
        assert_eq!(optics.artifact_ids.len(), 1);
        assert!(optics.artifact_ids[0].as_str().starts_with("week2/optics.txt:"));
        fx.assert_coverage();

        let record = fx
            .index
            .get_artifact(&optics.artifact_ids[0])
            .unwrap()
            .unwrap();
        assert_eq!(record.metadata.pages, lectern_core::PageRange::new(1, 2));
        assert_eq!(record.model, "hash-embed");
    }

    #[tokio::test]
    async fn test_second_pass_is_idempotent() {
        let fx = Fixture::new();
        fx.write("a.txt", long_text("alpha").as_bytes());
        fx.write("b.txt", long_text("beta").as_bytes());
        let sync = fx.synchronizer(&fx.config(&["txt"]));

        fx.pass(&sync).await;
        let before = fx.manifest_bytes();
        let ids_before = fx.index.ids().unwrap();

        let summary = fx.pass(&sync).await;

        assert_eq!(summary.unchanged, 2);
        assert!(!summary.has_changes());
        assert_eq!(summary.artifacts_written, 0);
        assert_eq!(summary.artifacts_removed, 0);
        assert_eq!(fx.manifest_bytes(), before);
        assert_eq!(fx.index.ids().unwrap(), ids_before);
    }

    #[tokio::test]
    async fn test_changed_document_is_replaced() {
        let fx = Fixture::new();
        fx.write("a.txt", long_text("alpha").as_bytes());
        fx.write("b.txt", long_text("beta").as_bytes());
        let sync = fx.synchronizer(&fx.config(&["txt"]));

        fx.pass(&sync).await;
        let old_ids = fx.manifest().get("a.txt").unwrap().artifact_ids.clone();
        let b_entry = fx.manifest().get("b.txt").cloned().unwrap();

        fx.write("a.txt", long_text("gamma").as_bytes());
        let summary = fx.pass(&sync).await;

        assert_eq!(summary.updated, 1);
        assert_eq!(summary.unchanged, 1);
        assert_eq!(summary.artifacts_removed, old_ids.len());

        let all = fx.index.ids().unwrap();
        assert!(old_ids.iter().all(|id| !all.contains(id)));

        let manifest = fx.manifest();
        let new_ids = &manifest.get("a.txt").unwrap().artifact_ids;
        assert!(new_ids.iter().all(|id| all.contains(id)));
        assert_eq!(manifest.get("b.txt"), Some(&b_entry));
        fx.assert_coverage();
    }

    #[tokio::test]
    async fn test_removed_document_is_deleted() {
        let fx = Fixture::new();
        fx.write("a.txt", long_text("alpha").as_bytes());
        fx.write("b.txt", long_text("beta").as_bytes());
        let sync = fx.synchronizer(&fx.config(&["txt"]));
        fx.pass(&sync).await;

        std::fs::remove_file(fx.root().join("a.txt")).unwrap();
        let summary = fx.pass(&sync).await;

        assert_eq!(summary.deleted, 1);
        assert!(!fx.manifest().contains("a.txt"));
        assert!(fx.index.ids_for_path("a.txt").unwrap().is_empty());
        fx.assert_coverage();
    }

    #[tokio::test]
    async fn test_one_of_three_fails_extraction() {
        let fx = Fixture::new();
        fx.write("a.txt", long_text("alpha").as_bytes());
        fx.write("b.txt", &[0xff, 0xfe, 0xfd]);
        fx.write("c.txt", long_text("gamma").as_bytes());
        let sync = fx.synchronizer(&fx.config(&["txt"]));

        let summary = fx.pass(&sync).await;

        assert_eq!(summary.succeeded(), 2);
        assert_eq!(summary.failed_count(), 1);
        assert_eq!(summary.failed[0].path, "b.txt");
        assert!(!fx.manifest().contains("b.txt"));
        assert!(fx.index.ids_for_path("b.txt").unwrap().is_empty());
        fx.assert_coverage();
    }

    #[tokio::test]
    async fn test_failed_replace_keeps_old_entry() {
        let fx = Fixture::new();
        fx.write("a.txt", long_text("alpha").as_bytes());
        let sync = fx.synchronizer(&fx.config(&["txt"]));
        fx.pass(&sync).await;
        let entry = fx.manifest().get("a.txt").cloned().unwrap();

        fx.write("a.txt", &[0xff, 0xfe]);
        let summary = fx.pass(&sync).await;

        assert_eq!(summary.failed_count(), 1);
        assert_eq!(fx.manifest().get("a.txt"), Some(&entry));
        fx.assert_coverage();
    }

    #[tokio::test]
    async fn test_failed_commit_then_delete_leaves_no_orphans() {
        let fx = Fixture::new();
        fx.write("a.txt", long_text("alpha").as_bytes());
        fx.write("b.txt", long_text("beta").as_bytes());
        let flaky = Arc::new(FlakyIndex::new(fx.index.clone()));
        let sync = fx.synchronizer_with(&fx.config(&["txt"]), flaky.clone());
        fx.pass(&sync).await;
        let entry = fx.manifest().get("a.txt").cloned().unwrap();

        fx.write("a.txt", long_text("gamma").as_bytes());
        flaky.set_failing(true);
        let summary = fx.pass(&sync).await;

        assert_eq!(summary.failed_count(), 1);
        assert_eq!(summary.failed[0].path, "a.txt");
        // The batch never landed, so the old entry still owns the old artifacts.
        assert_eq!(fx.manifest().get("a.txt"), Some(&entry));
        fx.assert_coverage();

        flaky.set_failing(false);
        std::fs::remove_file(fx.root().join("a.txt")).unwrap();
        let summary = fx.pass(&sync).await;

        assert_eq!(summary.deleted, 1);
        assert_eq!(summary.artifacts_removed, entry.artifact_ids.len());
        assert!(fx.index.ids_for_path("a.txt").unwrap().is_empty());
        fx.assert_coverage();
    }

    #[tokio::test]
    async fn test_orphaned_path_is_swept() {
        let fx = Fixture::new();
        fx.write("a.txt", long_text("alpha").as_bytes());
        let sync = fx.synchronizer(&fx.config(&["txt"]));
        fx.pass(&sync).await;

        // Owned by no manifest entry and gone from disk.
        let orphan = TextArtifact {
            id: ArtifactId::new("gone.txt:0123456789ab:c0"),
            source_path: "gone.txt".to_string(),
            pages: lectern_core::PageRange::single(1),
            kind: ArtifactKind::Chunk { index: 0 },
            text: "lost".to_string(),
        };
        fx.index
            .upsert(&IndexRecord::from_artifact(&orphan, vec![1.0; 8], "hash-embed"))
            .unwrap();

        let summary = fx.pass(&sync).await;

        assert_eq!(summary.deleted, 1);
        assert_eq!(summary.artifacts_removed, 1);
        assert_eq!(summary.unchanged, 1);
        assert!(fx.index.get_artifact(&orphan.id).unwrap().is_none());
        fx.assert_coverage();

        let summary = fx.pass(&sync).await;
        assert!(!summary.has_changes());
    }

    #[tokio::test]
    async fn test_unchanged_documents_are_repaired_into_empty_index() {
        let fx = Fixture::new();
        fx.write("a.txt", long_text("alpha").as_bytes());
        fx.write("b.txt", long_text("beta").as_bytes());
        let config = fx.config(&["txt"]);
        fx.pass(&fx.synchronizer(&config)).await;
        let manifest = fx.manifest();

        let fresh = Arc::new(SqliteIndex::open_in_memory().unwrap());
        let sync = fx.synchronizer_with(&config, fresh.clone());
        let summary = fx.pass(&sync).await;

        assert_eq!(summary.repaired, 2);
        assert_eq!(summary.unchanged, 0);
        assert_eq!(summary.inserted + summary.updated, 0);
        assert!(summary.is_clean());
        assert_eq!(fresh.ids().unwrap(), manifest.all_artifact_ids());
        assert_eq!(fx.manifest().all_artifact_ids(), manifest.all_artifact_ids());

        let summary = fx.pass(&sync).await;
        assert_eq!(summary.unchanged, 2);
        assert!(!summary.has_changes());
    }

    #[tokio::test]
    async fn test_reset_forces_full_reingest() {
        let fx = Fixture::new();
        fx.write("a.txt", long_text("alpha").as_bytes());
        fx.write("b.txt", long_text("beta").as_bytes());
        let sync = fx.synchronizer(&fx.config(&["txt"]));
        fx.pass(&sync).await;
        let stored = fx.index.len().unwrap();

        let ctx = fx.context();
        let removed = sync.reset(&ctx).await.unwrap();

        assert_eq!(removed, stored);
        assert!(fx.index.is_empty().unwrap());
        assert!(fx.manifest().is_empty());
        assert!(ctx.manifest().await.is_empty());

        let summary = sync.run_pass(&ctx).await.unwrap();
        assert_eq!(summary.inserted, 2);
        fx.assert_coverage();
    }

    #[tokio::test]
    async fn test_image_description_failure_is_skipped() {
        let fx = Fixture::new();
        fx.write("slides.fig", b"Lens diagrams");
        let config = fx.config(&["fig"]);
        let describer = ImageDescriber::new(Arc::new(PickyCaptioner), &ImageConfig::default());
        let sync = fx.synchronizer(&config).with_describer(describer);

        let summary = fx.pass(&sync).await;

        assert_eq!(summary.inserted, 1);
        assert_eq!(summary.images_described, 1);
        assert_eq!(summary.images_failed, 1);

        let ids = fx.manifest().get("slides.fig").unwrap().artifact_ids.clone();
        assert_eq!(ids.len(), 2);
        let image_id = ids.iter().find(|id| id.as_str().ends_with(":i1-0")).unwrap();
        let record = fx.index.get_artifact(image_id).unwrap().unwrap();
        assert!(record
            .metadata
            .text
            .starts_with("[IMAGE/FIGURE from slides.fig, Page 1]\n"));
        fx.assert_coverage();
    }

    #[tokio::test]
    async fn test_images_ignored_without_describer() {
        let fx = Fixture::new();
        fx.write("slides.fig", b"Lens diagrams");
        let sync = fx.synchronizer(&fx.config(&["fig"]));

        let summary = fx.pass(&sync).await;
        assert_eq!(summary.images_described, 0);
        assert_eq!(summary.artifacts_written, 1);
    }

    #[tokio::test]
    async fn test_invalid_config_aborts_before_mutation() {
        let fx = Fixture::new();
        fx.write("a.txt", long_text("alpha").as_bytes());
        let mut config = fx.config(&["txt"]);
        config.chunking.overlap = config.chunking.window_size;

        let err = SyncSettings::from_config(&config).unwrap_err();

        assert!(matches!(err, IngestError::Configuration(_)));
        assert!(fx.index.is_empty().unwrap());
        assert!(!fx.store.path().exists());
    }

    #[tokio::test]
    async fn test_plan_pass_does_not_mutate() {
        let fx = Fixture::new();
        fx.write("a.txt", long_text("alpha").as_bytes());
        let sync = fx.synchronizer(&fx.config(&["txt"]));

        let plan = sync.plan_pass(&fx.context()).await.unwrap();

        assert_eq!(plan.insert, vec!["a.txt"]);
        assert!(fx.index.is_empty().unwrap());
        assert!(!fx.store.path().exists());
    }

    #[tokio::test]
    async fn test_stray_artifacts_are_swept() {
        let fx = Fixture::new();
        fx.write("a.txt", long_text("alpha").as_bytes());
        let sync = fx.synchronizer(&fx.config(&["txt"]));

        // Left behind by an interrupted earlier pass.
        let stray = TextArtifact {
            id: ArtifactId::new("a.txt:000000000000:c9"),
            source_path: "a.txt".to_string(),
            pages: lectern_core::PageRange::single(1),
            kind: ArtifactKind::Chunk { index: 9 },
            text: "stale".to_string(),
        };
        fx.index
            .upsert(&IndexRecord::from_artifact(&stray, vec![1.0; 8], "hash-embed"))
            .unwrap();

        let summary = fx.pass(&sync).await;

        assert_eq!(summary.inserted, 1);
        assert_eq!(summary.artifacts_removed, 1);
        assert!(fx.index.get_artifact(&stray.id).unwrap().is_none());
        fx.assert_coverage();
    }

    #[tokio::test]
    async fn test_missing_root_is_an_error() {
        let fx = Fixture::new();
        let mut config = fx.config(&["txt"]);
        config.sources.root = fx.dir.path().join("absent").to_string_lossy().to_string();
        let sync = fx.synchronizer(&config);

        let err = sync.run_pass(&fx.context()).await.unwrap_err();
        assert!(matches!(err, IngestError::SourceRootNotFound(_)));
    }
}
