use std::sync::Arc;

use axum::Router;
use profile_editor::core::auth::{JwtConfig, JwtService, PasswordHasher};
use profile_editor::core::config::Config;
use profile_editor::core::db::{DbConfig, UserRepository, connect};
use profile_editor::core::profile::{ProfileApiState, profile_router};
use profile_editor::core::storage::{DiskRegistry, LocalDisk};
use tower_http::compression::{CompressionLayer, CompressionLevel};
use tower_http::services::ServeDir;

/// Disk whose files are publicly served under `/storage`
const PUBLIC_DISK: &str = "public";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file (if exists)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt::init();

    let config = Config::from_env()?;
    tracing::info!(
        "Config loaded: storage_disk={}, storage_root={}, bcrypt_cost={}",
        config.storage_disk,
        config.storage_root.display(),
        config.bcrypt_cost
    );

    let pool = connect(&DbConfig::new(config.database_url.clone())).await?;
    let users = Arc::new(UserRepository::new(pool));

    let public = LocalDisk::create(PUBLIC_DISK, config.storage_root.clone()).await?;
    let disks = DiskRegistry::new().register(Arc::new(public));
    let disk = disks.disk(&config.storage_disk).inspect_err(|_| {
        tracing::error!(
            "Storage disk {} is not registered, available: {:?}",
            config.storage_disk,
            disks.names()
        )
    })?;

    let jwt = JwtService::new(JwtConfig::new(config.jwt_secret.clone()));
    let state = ProfileApiState::new(users, disk, PasswordHasher::new(config.bcrypt_cost), jwt);

    let app = Router::new()
        .merge(profile_router(state))
        .nest_service("/storage", ServeDir::new(&config.storage_root))
        .layer(
            CompressionLayer::new()
                .br(true)
                .gzip(true)
                .quality(CompressionLevel::Best),
        );

    tracing::info!("listening on http://{}", config.site_addr);
    tracing::info!("Profile API: http://{}/api/profile/sessions", config.site_addr);

    let listener = tokio::net::TcpListener::bind(config.site_addr).await?;
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}
