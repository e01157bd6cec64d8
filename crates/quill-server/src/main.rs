use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use quill_api::{AppState, AppStateInner};
use quill_auth::TokenCodec;
use quill_db::Database;
use quill_domain::Domain;
use quill_domain::mail::{LogTransport, Mailer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quill=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let secret =
        std::env::var("QUILL_SECRET_KEY").unwrap_or_else(|_| "dev-secret-change-me".into());
    let db_path = std::env::var("QUILL_DB_PATH").unwrap_or_else(|_| "quill.db".into());
    let host = std::env::var("QUILL_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("QUILL_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;
    let admin_email = std::env::var("QUILL_ADMIN_EMAIL").ok();

    // Init database
    let db = Arc::new(Database::open(&PathBuf::from(&db_path))?);

    // Application context
    let mailer = Mailer::start(Arc::new(LogTransport), 256);
    let domain = Domain::new(db, TokenCodec::new(&secret), mailer, admin_email);

    // Optional dev data
    if std::env::var("QUILL_SEED_FAKE").is_ok() {
        domain.seed_fake_data(25, 50)?;
    }

    let state: AppState = Arc::new(AppStateInner::new(domain));

    let app = quill_api::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Quill server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
