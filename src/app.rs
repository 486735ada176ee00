use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    response::IntoResponse,
    routing::get,
};
use sqlx::MySqlPool;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use crate::catalog::Catalog;
use crate::config::AppConfig;
use crate::mailer::Mailer;
use crate::routes::{
    admin_routes, articles_routes, auth_routes, doi_routes, editor_routes, functions_routes,
    submissions_routes,
};
use crate::storage::ObjectStore;

#[derive(Clone)]
pub struct AppState {
    pub pool: MySqlPool,
    pub config: Arc<AppConfig>,
    pub catalog: Arc<Catalog>,
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(pool: MySqlPool, config: AppConfig, catalog: Catalog) -> Self {
        Self {
            pool,
            config: Arc::new(config),
            catalog: Arc::new(catalog),
            http: reqwest::Client::new(),
        }
    }

    pub fn store(&self) -> ObjectStore {
        ObjectStore::new(&self.config.upload_dir, &self.config.public_base_url)
    }

    pub fn mailer(&self) -> Mailer {
        Mailer::new(self.http.clone(), self.config.mail.clone())
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .nest("/api/auth", auth_routes())
        .nest("/api/articles", articles_routes())
        .nest("/api/doi", doi_routes())
        .nest("/api/functions", functions_routes())
        .nest("/api/submissions", submissions_routes())
        .nest("/api/editor", editor_routes())
        .nest("/api/admin", admin_routes())
        .route("/api/health", get(health_check));

    Router::new()
        .merge(api_routes)
        .nest_service("/uploads", ServeDir::new(&state.config.upload_dir))
        .layer(DefaultBodyLimit::max(state.config.body_limit_bytes()))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> impl IntoResponse {
    axum::Json(serde_json::json!({"status": "healthy"}))
}

/// State over a pool that never connects unless a handler touches it.
#[cfg(test)]
pub fn test_state() -> AppState {
    test_state_with(crate::config::test_config())
}

#[cfg(test)]
pub fn test_state_with(config: AppConfig) -> AppState {
    let pool = sqlx::mysql::MySqlPoolOptions::new()
        .connect_lazy(&config.database_url)
        .expect("lazy pool from a valid url");
    AppState::new(pool, config, Catalog::bundled().expect("bundled catalog parses"))
}

#[cfg(test)]
pub(crate) mod testing {
    use axum::{
        body::{Body, to_bytes},
        http::{Request, Response},
    };
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;

    pub async fn send(request: Request<Body>) -> Response<Body> {
        build_router(test_state()).oneshot(request).await.unwrap()
    }

    pub async fn body_json(response: Response<Body>) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }
}
