use axum::{
    body::Body,
    http::{Request, StatusCode},
    middleware as axum_middleware,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tower::util::ServiceExt;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod services;

use services::{qr::QrService, storage::StorageService};

#[derive(Clone)]
pub struct AppState {
    pub db: db::Database,
    pub config: config::Config,
    pub storage: StorageService,
    pub qr: QrService,
}

impl AppState {
    pub fn new(db: db::Database, config: config::Config) -> Self {
        let storage = StorageService::new(&config.storage_path);
        let qr = QrService::new(storage.clone(), config.public_origin.clone());
        Self {
            db,
            config,
            storage,
            qr,
        }
    }
}

pub fn app(state: AppState) -> Router {
    // Admin panel routes (require authentication)
    let protected_routes = Router::new()
        .nest("/users", routes::users::router())
        .nest("/employees", routes::employees::router())
        .nest("/build-sites", routes::build_sites::router())
        .nest("/feedback", routes::feedback::admin_router())
        .nest("/consultations", routes::consultations::admin_router())
        .nest("/settings", routes::settings::router())
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::auth_middleware,
        ));

    // Marketing site + QR profile endpoints
    let public_routes = Router::new()
        .nest("/profile", routes::profile::router())
        .nest("/feedback", routes::feedback::public_router())
        .nest("/consultations", routes::consultations::public_router());

    let api_router = Router::new()
        .nest("/auth", routes::auth::router())
        .nest("/health", routes::health::router())
        .nest("/public", public_routes)
        .merge(protected_routes);

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_router)
        .nest_service("/storage", ServeDir::new(&state.config.storage_path))
        .fallback(serve_spa)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

async fn health_check() -> &'static str {
    "OK"
}

async fn serve_spa(req: Request<Body>) -> Response {
    let path = req.uri().path();

    // Try to serve static file first
    let static_path = format!("static{path}");
    if std::path::Path::new(&static_path).exists() {
        let serve_dir = ServeDir::new("static");
        if let Ok(res) = serve_dir.oneshot(req).await {
            return res.into_response();
        }
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    // For SPA routes, serve index.html
    match tokio::fs::read("static/index.html").await {
        Ok(contents) => Response::builder()
            .status(StatusCode::OK)
            .header("content-type", "text/html")
            .body(Body::from(contents))
            .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response()),
        Err(_) => Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Body::from("Not found"))
            .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response()),
    }
}
