use crate::{
    app::AppError,
    search::{SearchRequest, SearchResponse, SearchService},
};
use axum::{
    extract::{Query, State},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tokio::signal;

#[derive(Clone)]
pub struct SharedState {
    pub search: Arc<SearchService>,
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            log::error!("failed to install Ctrl+C handler: {err}");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => log::error!("failed to install signal handler: {err}"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    log::warn!("shutting down");
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/api/search", get(search))
        .route("/health", get(health))
        .layer(
            tower_http::trace::TraceLayer::new_for_http()
                .make_span_with(
                    tower_http::trace::DefaultMakeSpan::new().level(tracing::Level::INFO),
                )
                .on_response(
                    tower_http::trace::DefaultOnResponse::new().level(tracing::Level::INFO),
                ),
        )
        .with_state(Arc::new(state))
}

pub async fn serve(state: SharedState, bind_addr: &str) -> anyhow::Result<()> {
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    log::info!("listening on {bind_addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

#[derive(Debug)]
struct HttpError(AppError);

impl IntoResponse for HttpError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self.0 {
            AppError::Validation(_) => {
                return (
                    axum::http::StatusCode::BAD_REQUEST,
                    Json(json!({"error": self.0.to_string()})),
                )
                    .into_response();
            }
            AppError::Configuration(_) | AppError::DataIntegrity(_) | AppError::IO(_) => {
                axum::http::StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::Provider(_) | AppError::Store(_) => axum::http::StatusCode::BAD_GATEWAY,
        };

        log::error!("{self:?}");
        (
            status,
            Json(json!({"error": format!("Search failed: {}", self.0)})),
        )
            .into_response()
    }
}

impl<E> From<E> for HttpError
where
    E: Into<AppError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

async fn search(
    State(state): State<Arc<SharedState>>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<SearchResponse>, HttpError> {
    log::debug!("params: {params:?}");

    let request = SearchRequest::from_pairs(&params)?;
    let response = state.search.search(&request).await?;

    Ok(response.into())
}

async fn health() -> &'static str {
    "OK"
}
