use crate::app::AppError;

/// Default OpenAI embedding model
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
/// Fallback dimensionality for models without a known size
const DEFAULT_EMBEDDING_DIMENSIONS: usize = 1536;
/// Default minimum cosine similarity when threshold filtering is on
const DEFAULT_MIN_SIMILARITY: f32 = 0.78;
/// Default number of rows fetched per backfill batch
const DEFAULT_EMBED_BATCH_SIZE: i64 = 50;
const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

/// Similarity scoring discipline of the query service.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SearchOptions {
    /// Drop matches below `min_similarity` and report scores
    pub threshold_enabled: bool,

    /// Minimum cosine similarity [0.0, 1.0]
    pub min_similarity: f32,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            threshold_enabled: false,
            min_similarity: DEFAULT_MIN_SIMILARITY,
        }
    }
}

/// Embedding provider settings.
#[derive(Clone, Debug, PartialEq)]
pub struct EmbeddingConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub dimensions: usize,
}

/// Backfill pipeline settings.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BackfillConfig {
    pub batch_size: i64,
    pub start_after_id: i64,
}

impl Default for BackfillConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_EMBED_BATCH_SIZE,
            start_after_id: 0,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub database_url: Option<String>,
    pub bind_addr: String,
    pub embedding: EmbeddingConfig,
    pub search: SearchOptions,
    pub backfill: BackfillConfig,
}

/// Dimensionality for a model identifier. Only models without a fixed size
/// consult `configured`.
pub fn dimensions_for_model(model: &str, configured: Option<usize>) -> usize {
    match model {
        "text-embedding-3-small" => 1536,
        "text-embedding-3-large" => 3072,
        _ => configured.unwrap_or(DEFAULT_EMBEDDING_DIMENSIONS),
    }
}

/// Clamp a configured similarity floor into [0, 1], falling back to the
/// default for anything that is not a finite number.
fn min_similarity(raw: Option<&str>) -> f32 {
    raw.and_then(|value| value.trim().parse::<f32>().ok())
        .filter(|value| value.is_finite())
        .map(|value| value.clamp(0.0, 1.0))
        .unwrap_or(DEFAULT_MIN_SIMILARITY)
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, AppError> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(AppError::Configuration(format!(
            "{key} must be a boolean, got '{other}'"
        ))),
    }
}

fn parse_int(key: &str, raw: &str) -> Result<i64, AppError> {
    raw.trim().parse::<i64>().map_err(|_| {
        AppError::Configuration(format!("{key} must be an integer, got '{raw}'"))
    })
}

impl Config {
    /// Build the configuration from the process environment.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let model = non_empty("EMBEDDING_MODEL").unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string());

        let configured_dimensions = match non_empty("EMBEDDING_DIMENSIONS") {
            Some(raw) => match parse_int("EMBEDDING_DIMENSIONS", &raw)? {
                value if value > 0 => Some(value as usize),
                value => {
                    return Err(AppError::Configuration(format!(
                        "EMBEDDING_DIMENSIONS must be positive, got {value}"
                    )))
                }
            },
            None => None,
        };

        let threshold_enabled = match non_empty("SEARCH_THRESHOLD_ENABLED") {
            Some(raw) => parse_bool("SEARCH_THRESHOLD_ENABLED", &raw)?,
            None => false,
        };

        let batch_size = match non_empty("EMBED_BATCH_SIZE") {
            Some(raw) => parse_int("EMBED_BATCH_SIZE", &raw)?,
            None => DEFAULT_EMBED_BATCH_SIZE,
        };

        let start_after_id = match non_empty("START_AFTER_ID") {
            Some(raw) => parse_int("START_AFTER_ID", &raw)?,
            None => 0,
        };

        let config = Self {
            database_url: non_empty("DATABASE_URL"),
            bind_addr: non_empty("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            embedding: EmbeddingConfig {
                api_key: non_empty("OPENAI_API_KEY"),
                base_url: non_empty("OPENAI_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
                dimensions: dimensions_for_model(&model, configured_dimensions),
                model,
            },
            search: SearchOptions {
                threshold_enabled,
                min_similarity: min_similarity(lookup("MIN_SIMILARITY").as_deref()),
            },
            backfill: BackfillConfig {
                batch_size,
                start_after_id,
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.backfill.batch_size < 1 {
            return Err(AppError::Configuration(format!(
                "EMBED_BATCH_SIZE must be at least 1, got {}",
                self.backfill.batch_size
            )));
        }

        if self.backfill.start_after_id < 0 {
            return Err(AppError::Configuration(format!(
                "START_AFTER_ID must not be negative, got {}",
                self.backfill.start_after_id
            )));
        }

        Ok(())
    }

    /// Storage connection string, required by every command touching the corpus.
    pub fn database_url(&self) -> Result<&str, AppError> {
        self.database_url
            .as_deref()
            .ok_or_else(|| AppError::Configuration("DATABASE_URL is required.".to_string()))
    }
}
