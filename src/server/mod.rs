pub mod error;
pub mod handlers;
pub mod state;

pub use error::ApiError;
pub use state::AppState;

use anyhow::{Context, Result};
use axum::Router;
use axum::http::{self, Method};
use axum::routing::{get, patch, post};
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::Config;

/// Assembles the API router over shared application state.
pub struct AppBuilder {
    app: Router,
}

impl AppBuilder {
    pub fn new(state: AppState) -> Self {
        let app = Router::new()
            .route("/api/ingest", post(handlers::ingest_note))
            .route("/api/ask", post(handlers::ask_question))
            .route("/api/structure", post(handlers::structure_notes))
            .route("/api/documents", get(handlers::list_documents))
            .route(
                "/api/documents/{id}",
                patch(handlers::update_document).delete(handlers::delete_document),
            )
            .route("/api/documents/delete", post(handlers::delete_documents))
            .route("/api/checkout", post(handlers::start_checkout))
            .route("/api/payment/complete", post(handlers::complete_payment))
            .with_state(state);

        Self { app }
    }

    pub fn with_trace_layer(self) -> Self {
        Self {
            app: self.app.layer(TraceLayer::new_for_http()),
        }
    }

    pub fn with_cors_layer(self) -> Self {
        let cors_layer = if cfg!(debug_assertions) {
            CorsLayer::permissive()
        } else {
            CorsLayer::new()
                .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
                .allow_headers([http::header::CONTENT_TYPE])
                .allow_origin(AllowOrigin::any())
        };
        Self {
            app: self.app.layer(cors_layer),
        }
    }

    pub fn build(self) -> Router {
        self.app
    }
}

/// Initialize state from the config and serve the API until shutdown.
pub async fn run(config: Config) -> Result<()> {
    let address = config.bind_address();
    let state = AppState::initialize(config).await?;

    let app = AppBuilder::new(state)
        .with_trace_layer()
        .with_cors_layer()
        .build();

    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {address}"))?;
    info!("Listening on {address}");

    axum::serve(listener, app)
        .await
        .context("Server terminated unexpectedly")?;
    Ok(())
}
