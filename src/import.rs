//! Corpus import from newline-delimited JSON.
//!
//! One verse per line: `{"book", "book_order", "chapter", "verse",
//! "hebrew_text"}`. Rows are upserted on `(book, chapter, verse)`. The first
//! malformed line aborts the whole import.

use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

use crate::{
    app::AppError,
    store::VerseStore,
    verse::{UpsertOutcome, VerseRecord},
};

/// Default input path
pub const DEFAULT_IMPORT_PATH: &str = "data/tanach.sample.jsonl";

/// Log progress every this many records
const PROGRESS_EVERY: usize = 1000;

/// A line as it appears in the file, before validation.
#[derive(Debug, Deserialize)]
struct ImportLine {
    book: Option<String>,
    book_order: Option<i64>,
    chapter: Option<i64>,
    verse: Option<i64>,
    hebrew_text: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub processed: usize,
    pub inserted: usize,
    pub updated: usize,
}

fn positive(field: &str, value: Option<i64>, line_no: usize) -> Result<i32, AppError> {
    value
        .filter(|v| *v > 0)
        .and_then(|v| i32::try_from(v).ok())
        .ok_or_else(|| {
            AppError::data_integrity(format!(
                "invalid record at line {line_no}: {field} must be a positive integer"
            ))
        })
}

fn non_empty(field: &str, value: Option<String>, line_no: usize) -> Result<String, AppError> {
    value.filter(|v| !v.trim().is_empty()).ok_or_else(|| {
        AppError::data_integrity(format!(
            "invalid record at line {line_no}: {field} is required"
        ))
    })
}

/// Parse and validate one non-blank line.
pub fn parse_line(line: &str, line_no: usize) -> Result<VerseRecord, AppError> {
    let raw: ImportLine = serde_json::from_str(line).map_err(|err| {
        AppError::data_integrity(format!("invalid record at line {line_no}: {err}"))
    })?;

    Ok(VerseRecord {
        book: non_empty("book", raw.book, line_no)?,
        book_order: positive("book_order", raw.book_order, line_no)?,
        chapter: positive("chapter", raw.chapter, line_no)?,
        verse: positive("verse", raw.verse, line_no)?,
        hebrew_text: non_empty("hebrew_text", raw.hebrew_text, line_no)?,
    })
}

pub struct Importer {
    store: Arc<dyn VerseStore>,
}

impl Importer {
    pub fn new(store: Arc<dyn VerseStore>) -> Self {
        Self { store }
    }

    /// Import a file from disk.
    pub async fn import_file(&self, path: &Path) -> Result<ImportReport, AppError> {
        if !path.exists() {
            return Err(AppError::Validation(format!(
                "Input file not found: {}",
                path.display()
            )));
        }

        log::info!("importing verses from {}", path.display());

        let file = tokio::fs::File::open(path).await?;
        self.import_reader(BufReader::new(file)).await
    }

    /// Import from any buffered reader. Blank lines are skipped.
    pub async fn import_reader<R>(&self, reader: R) -> Result<ImportReport, AppError>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut report = ImportReport::default();
        let mut lines = reader.lines();
        let mut line_no = 0;

        while let Some(line) = lines.next_line().await? {
            line_no += 1;

            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let record = parse_line(line, line_no)?;

            match self.store.upsert_verse(&record).await? {
                UpsertOutcome::Inserted => report.inserted += 1,
                UpsertOutcome::Updated => report.updated += 1,
            }

            report.processed += 1;
            if report.processed % PROGRESS_EVERY == 0 {
                log::info!("imported {} verses...", report.processed);
            }
        }

        log::info!(
            "import complete: {} processed ({} new, {} updated)",
            report.processed,
            report.inserted,
            report.updated
        );

        Ok(report)
    }
}
