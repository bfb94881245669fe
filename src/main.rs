use std::path::Path;
use std::sync::Arc;

use clap::Parser;

mod app;
mod backfill;
mod cli;
mod config;
mod embeddings;
mod hebrew;
mod import;
mod search;
mod store;
mod verse;
mod web;

use app::AppFactory;
use config::Config;
use search::SearchRequest;
use store::VerseStore;

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let args = cli::Args::parse();
    let config = Config::from_env()?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(run(args.command, config))
}

async fn run(command: cli::Command, mut config: Config) -> anyhow::Result<()> {
    match command {
        cli::Command::Serve { bind } => {
            if let Some(bind) = bind {
                config.bind_addr = bind;
            }
            let factory = AppFactory::new(config);
            let store = factory.create_store().await?;
            let search = factory.create_search_service(store);

            let options = search.options();
            log::info!(
                "search threshold {} (min similarity {})",
                if options.threshold_enabled { "enabled" } else { "disabled" },
                options.min_similarity
            );

            let state = web::SharedState {
                search: Arc::new(search),
            };
            web::serve(state, &factory.config().bind_addr).await
        }

        cli::Command::Import { path } => {
            let factory = AppFactory::new(config);
            let store = factory.create_store().await?;
            let report = factory
                .create_importer(store)
                .import_file(Path::new(&path))
                .await?;

            println!("Import complete. Total rows processed: {}", report.processed);
            Ok(())
        }

        cli::Command::Embed {
            batch_size,
            start_after_id,
        } => {
            if let Some(batch_size) = batch_size {
                anyhow::ensure!(batch_size >= 1, "--batch-size must be at least 1");
                config.backfill.batch_size = batch_size;
            }
            if let Some(start_after_id) = start_after_id {
                anyhow::ensure!(start_after_id >= 0, "--start-after-id must not be negative");
                config.backfill.start_after_id = start_after_id;
            }

            let factory = AppFactory::new(config);
            let store = factory.create_store().await?;
            let report = factory.create_backfill(store).run().await?;

            println!(
                "Embedding complete. Total embedded in this run: {}. Last ID: {}",
                report.embedded, report.last_id
            );
            Ok(())
        }

        cli::Command::SetDimensions {} => {
            let dimensions = config.embedding.dimensions;
            let factory = AppFactory::new(config);
            let store = factory.connect_store().await?;
            store.set_dimensions(dimensions).await?;

            println!(
                "Updated embedding column to vector({dimensions}). Existing embeddings were cleared."
            );
            Ok(())
        }

        cli::Command::Search { query, book, limit } => {
            let request = SearchRequest::new(&query, book.as_deref(), limit)?;

            let factory = AppFactory::new(config);
            let store = factory.create_store().await?;
            let response = factory.create_search_service(store).search(&request).await?;

            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        }

        cli::Command::Status {} => {
            let factory = AppFactory::new(config);
            let store = factory.create_store().await?;
            let stats = store.stats().await?;

            println!("{}", serde_json::to_string_pretty(&stats)?);
            Ok(())
        }
    }
}
