use clap::{Parser, Subcommand};

use crate::import::DEFAULT_IMPORT_PATH;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the search API.
    Serve {
        /// Address to listen on
        #[clap(long, env = "BIND_ADDR")]
        bind: Option<String>,
    },
    /// Import verses from a newline-delimited JSON file
    Import {
        /// Input file
        #[clap(default_value = DEFAULT_IMPORT_PATH)]
        path: String,
    },
    /// Compute embeddings for every verse that lacks one.
    Embed {
        /// Rows fetched per batch
        #[clap(short, long)]
        batch_size: Option<i64>,

        /// Resume after this row id
        #[clap(short, long)]
        start_after_id: Option<i64>,
    },
    /// Retype the embedding column to the configured dimensions.
    /// Clears every stored embedding.
    SetDimensions {},
    /// Search verses
    Search {
        /// Query text
        query: String,

        /// Only search this book
        #[clap(short, long)]
        book: Option<String>,

        /// Max results (1-50)
        #[clap(short, long)]
        limit: Option<i64>,
    },
    /// Show corpus embedding progress
    Status {},
}
