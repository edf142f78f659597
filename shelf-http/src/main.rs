mod error;
mod routes;

use std::sync::Arc;

use clap::Parser;
use shelf_core::auth::gate::DEFAULT_TOKEN_TTL_SECS;
use shelf_core::error::Result;
use shelf_core::{AuthGate, CatalogManager, ContentRoot, StaticCredentials};
use tokio::net::TcpListener;
use tracing::info;

use crate::routes::AppState;

const DEFAULT_MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

#[derive(Parser, Debug)]
#[command(name = "shelf-http", version, about = "Asset catalog HTTP service")]
struct Args {
    #[arg(long, env = "SHELF_BIND", default_value = "0.0.0.0:3000")]
    bind: String,
    #[arg(long, env = "SHELF_ROOT", default_value = "public", help = "Content root")]
    root: String,
    #[arg(long = "jwt-secret", env = "SHELF_JWT_SECRET", hide_env_values = true)]
    jwt_secret: String,
    #[arg(long = "token-ttl", env = "SHELF_TOKEN_TTL_SECS", default_value_t = DEFAULT_TOKEN_TTL_SECS)]
    token_ttl_secs: u64,
    #[arg(long = "admin-user", env = "SHELF_ADMIN_USER", default_value = "admin")]
    admin_user: String,
    #[arg(
        long = "admin-hash",
        env = "SHELF_ADMIN_HASH",
        hide_env_values = true,
        help = "argon2 PHC hash of the admin password"
    )]
    admin_hash: String,
    #[arg(long = "allowed-origin", env = "SHELF_ALLOWED_ORIGIN", help = "CORS origin")]
    allowed_origin: Option<String>,
    #[arg(long = "max-upload-bytes", env = "SHELF_MAX_UPLOAD_BYTES", default_value_t = DEFAULT_MAX_UPLOAD_BYTES)]
    max_upload_bytes: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let args = Args::parse();

    let manager = CatalogManager::open(ContentRoot::new(&args.root))?;
    let gate = AuthGate::new(args.jwt_secret.as_bytes(), args.token_ttl_secs)?;
    let credentials = StaticCredentials::new().with_user(args.admin_user, args.admin_hash)?;
    let state = AppState {
        manager: Arc::new(manager),
        gate: Arc::new(gate),
        credentials: Arc::new(credentials),
    };

    let mut app = routes::router(state, args.max_upload_bytes);
    if let Some(cors) = routes::build_cors_layer(args.allowed_origin.as_deref()) {
        app = app.layer(cors);
    }

    let listener = TcpListener::bind(&args.bind).await?;
    info!(addr = %args.bind, root = %args.root, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "{}=info,shelf_core=info,tower_http=info",
                    env!("CARGO_CRATE_NAME")
                )
                .into()
            }),
        )
        .init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "could not listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
