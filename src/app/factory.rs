use crate::{
    app::AppError,
    backfill::Backfill,
    config::Config,
    embeddings::{Embedder, OpenAiEmbedder},
    import::Importer,
    search::SearchService,
    store::{PgVerseStore, VerseStore},
};
use std::sync::Arc;

/// Builds application components from an explicit configuration.
pub struct AppFactory {
    config: Config,
}

impl AppFactory {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn create_embedder(&self) -> Arc<dyn Embedder> {
        Arc::new(OpenAiEmbedder::new(&self.config.embedding))
    }

    /// Connect to Postgres and make sure the schema matches the configured
    /// embedding dimensionality.
    pub async fn create_store(&self) -> Result<Arc<PgVerseStore>, AppError> {
        let database_url = self.config.database_url()?;
        let store = PgVerseStore::connect(database_url).await?;
        store.ensure_schema(self.config.embedding.dimensions).await?;
        Ok(Arc::new(store))
    }

    /// Connect to Postgres without checking the embedding column, for
    /// schema maintenance.
    pub async fn connect_store(&self) -> Result<PgVerseStore, AppError> {
        let database_url = self.config.database_url()?;
        let store = PgVerseStore::connect(database_url).await?;
        store.create_schema(self.config.embedding.dimensions).await?;
        Ok(store)
    }

    pub fn create_search_service(&self, store: Arc<dyn VerseStore>) -> SearchService {
        SearchService::new(self.create_embedder(), store, self.config.search)
    }

    pub fn create_backfill(&self, store: Arc<dyn VerseStore>) -> Backfill {
        Backfill::new(self.create_embedder(), store, self.config.backfill)
    }

    pub fn create_importer(&self, store: Arc<dyn VerseStore>) -> Importer {
        Importer::new(store)
    }
}
