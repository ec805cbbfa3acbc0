//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{MemoryStore, SheetsAdapter},
    config::{Config, StoreBackend},
    error::ApiError,
    web::{self, rest::ApiDoc, state::AppState},
};
use axum::http::{header::CONTENT_TYPE, HeaderName, HeaderValue, Method};
use axum::Router;
use std::sync::Arc;
use study_tracker_core::{DashboardService, SystemClock, TableStore};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Initialize the Spreadsheet Store ---
    let store: Arc<dyn TableStore> = match config.store_backend {
        StoreBackend::Sheets => {
            let spreadsheet_id = config.spreadsheet_id.clone().ok_or_else(|| {
                ApiError::Internal("SHEETS_SPREADSHEET_ID is required".to_string())
            })?;
            let client = reqwest::Client::builder()
                .timeout(config.sheets_timeout)
                .build()?;
            info!("Using Google spreadsheet {}", spreadsheet_id);
            Arc::new(
                SheetsAdapter::new(client, config.sheets_base_url.clone(), spreadsheet_id)
                    .with_api_key(config.sheets_api_key.clone())
                    .with_access_token(config.sheets_access_token.clone()),
            )
        }
        StoreBackend::Memory => {
            info!("Using the in-memory store; data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    // --- 3. Build the Dashboard Service & Shared AppState ---
    let dashboard = DashboardService::new(store, Arc::new(SystemClock), config.goal)
        .with_worksheets(config.worksheets.clone())
        .with_write_mode(config.write_mode);
    info!(
        "Goal is {} pages; writes use {:?} mode",
        config.goal.pages(),
        config.write_mode
    );
    if config.admin_password.is_none() {
        info!("ADMIN_PASSWORD is not set; study entries cannot be recorded over HTTP");
    }

    let app_state = Arc::new(AppState {
        dashboard: Arc::new(dashboard),
        config: config.clone(),
    });

    // --- 4. Create the Web Router ---
    let mut api_router = web::router(app_state).layer(TraceLayer::new_for_http());

    if let Some(origin) = &config.cors_origin {
        let origin = origin.parse::<HeaderValue>().map_err(|e| {
            ApiError::Internal(format!("Invalid CORS_ORIGIN '{}': {}", origin, e))
        })?;
        let cors = CorsLayer::new()
            .allow_origin(origin)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([
                CONTENT_TYPE,
                HeaderName::from_static(web::middleware::ADMIN_PASSWORD_HEADER),
            ]);
        api_router = api_router.layer(cors);
    }

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 5. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
