//! `App` (SPEC_FULL.md §11): the one long-lived value owning every
//! stateful component, constructed once in `main` and handed around by
//! `Arc` instead of the teacher's `shaku`/`linkme` DI container and
//! module-scope provider registry — the spec's own design note calls
//! for exactly this ("no file-scope mutables").

use opensrc_application::file_access::FileAccess;
use opensrc_application::index_engine::{IndexEngine, IndexEngineHandle};
use opensrc_application::query_planner::QueryPlanner;
use opensrc_application::registry::SourceRegistry;
use opensrc_domain::error::Result;
use opensrc_domain::ports::{Embedder, Fetcher, VectorStore};
use opensrc_domain::source::SourceIndexState;
use opensrc_infrastructure::config::AppConfig;
use opensrc_infrastructure::paths::resolve_data_dir;
use opensrc_providers::{ChunkingDispatcher, EdgeVecStore, FastEmbedEmbedder, RealFetcher};
use std::path::PathBuf;
use std::sync::Arc;

/// Everything the sandbox API and the MCP handler need, built once at
/// startup and shared by `Arc`.
pub struct App {
    pub config: AppConfig,
    pub data_dir: PathBuf,
    pub registry: Arc<SourceRegistry>,
    pub index_engine: IndexEngineHandle,
    pub query_planner: QueryPlanner,
    pub file_access: FileAccess,
    pub store: Arc<dyn VectorStore>,
    pub embedder: Arc<dyn Embedder>,
    pub fetcher: Arc<dyn Fetcher>,
}

impl App {
    /// Resolve the data directory, bring up the store and embedder,
    /// load the sources manifest, and re-queue any source that's on
    /// disk but not yet marked indexed (spec §4.8, SPEC_FULL.md §10).
    pub async fn bootstrap(config: AppConfig) -> Result<Arc<Self>> {
        let data_dir = resolve_data_dir(config.data_dir.clone());
        for sub in ["packages", "repos", "logs"] {
            tokio::fs::create_dir_all(data_dir.join(sub)).await?;
        }

        let store: Arc<dyn VectorStore> = Arc::new(EdgeVecStore::new()?);
        store.init(&data_dir.join("vector.db")).await?;

        let embedder: Arc<dyn Embedder> = Arc::new(FastEmbedEmbedder::new()?);
        let chunker = Arc::new(ChunkingDispatcher::new());
        let fetcher: Arc<dyn Fetcher> = Arc::new(RealFetcher::new()?);

        let registry = Arc::new(SourceRegistry::load(data_dir.join("sources.json")).await?);
        let index_engine = Arc::new(IndexEngine::new(chunker, Arc::clone(&embedder), Arc::clone(&store)));
        let query_planner = QueryPlanner::new(Arc::clone(&embedder), Arc::clone(&store));

        let app = Arc::new(Self {
            config,
            data_dir,
            registry,
            index_engine,
            query_planner,
            file_access: FileAccess::new(),
            store,
            embedder,
            fetcher,
        });

        app.reconcile_on_startup().await?;
        Ok(app)
    }

    /// For each source in the manifest: adopt `Indexed` if the store
    /// already has it, otherwise re-enqueue. Runs once, at startup.
    async fn reconcile_on_startup(&self) -> Result<()> {
        let sources = self.registry.list();
        let mut requeued = 0usize;
        for source in &sources {
            if self.store.is_indexed(&source.name).await? {
                self.index_engine.set_state(&source.name, SourceIndexState::Indexed);
            } else {
                self.index_engine.enqueue(source.name.clone(), self.data_dir.join(&source.path));
                requeued += 1;
            }
        }
        tracing::info!(data_dir = %self.data_dir.display(), sources = sources.len(), requeued, "startup reconciliation complete");
        Ok(())
    }

    /// Resolve a registered source's name to its on-disk root,
    /// `SourceNotFound` if it isn't registered.
    pub fn source_root(&self, name: &str) -> Result<PathBuf> {
        self.registry
            .resolve_path(&self.data_dir, name)
            .ok_or_else(|| opensrc_domain::error::Error::source_not_found(name))
    }

    /// Persist the manifest and release the store. Called from the
    /// SIGINT/SIGTERM handler (spec §4.8).
    pub async fn shutdown(&self) -> Result<()> {
        self.registry.save().await?;
        tracing::info!("shutdown: manifest persisted");
        Ok(())
    }
}
