use axum::extract::State;
use axum::{http::Method, response::Json, routing::get, Router};
use serde_json::{json, Value};
use std::net::SocketAddr;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

mod database;
mod errors;
mod handlers;
mod middleware;
mod models;
mod routes;
mod services;
mod state;

use database::connection::get_db_client;
use state::{AppState, MailConfig};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let db = get_db_client().await;
    let app_state = initialize_app_state(db);

    let app = build_router(app_state);
    start_server(app).await;
}

fn initialize_app_state(db: mongodb::Database) -> AppState {
    let mail_config = MailConfig {
        api_url: std::env::var("MAIL_API_URL")
            .unwrap_or_else(|_| "https://api.resend.com/emails".to_string()),
        api_key: std::env::var("MAIL_API_KEY").unwrap_or_default(),
        from: std::env::var("MAIL_FROM").unwrap_or_else(|_| "admin@example.com".to_string()),
    };

    if mail_config.api_key.is_empty() {
        tracing::warn!("MAIL_API_KEY not set, OTP mails will fail to send");
    }

    tracing::info!("✅ OTP registry, session store, and mail service initialized");

    AppState::new(db, mail_config)
}

fn build_router(app_state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any)
        .allow_credentials(false);

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_check))
        .route("/api/health", get(api_health_check))
        .route("/debug/mail", get(debug_mail))
        .nest(
            "/api/auth",
            routes::auth::routes().merge(routes::password_reset::routes()),
        )
        .nest("/api/notes", routes::notes::routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

async fn start_server(app: Router) {
    let port = std::env::var("PORT").unwrap_or_else(|_| "10000".to_string());
    let addr = SocketAddr::from(([0, 0, 0, 0], port.parse().unwrap_or(10000)));

    tracing::info!("🚀 Server starting on {}", addr);

    match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("Server error: {}", e);
                std::process::exit(1);
            }
        }
        Err(e) => {
            tracing::error!("Failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        }
    }
}

async fn root_handler() -> &'static str {
    "📝 Notes API"
}

// Debug endpoint to exercise the mail provider end to end
async fn debug_mail(State(state): State<AppState>) -> Json<Value> {
    let to = std::env::var("MAIL_DEBUG_TO").unwrap_or_else(|_| "admin@example.com".to_string());

    match state
        .mail_service
        .send("Test Email", "Hello! This is a test email from the notes API.", &[to])
        .await
    {
        Ok(()) => Json(json!({
            "status": "mail sent",
        })),
        Err(e) => Json(json!({
            "status": "mail error",
            "error": e.to_string(),
        })),
    }
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn api_health_check(State(state): State<AppState>) -> Json<Value> {
    use mongodb::bson::doc;

    let db_status = match state.db.run_command(doc! {"ping": 1}).await {
        Ok(_) => "connected",
        Err(_) => "disconnected",
    };

    Json(json!({
        "status": "healthy",
        "database": db_status,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
