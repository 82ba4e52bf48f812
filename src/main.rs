use std::sync::Arc;

use anyhow::Context;
use tonic::transport::Server;
use tracing_subscriber::EnvFilter;

use realworld::auth::{JwtAuthority, Pbkdf2Scheme};
use realworld::config::Config;
use realworld::db::memory::MemoryStore;
use realworld::server::ConduitService;
use realworld::state::State;

fn build_state(config: &Config) -> anyhow::Result<State> {
    let tokens = Arc::new(
        JwtAuthority::new(config.jwt_secret.as_bytes(), config.token_ttl())
            .context("invalid JWT_SECRET")?,
    );
    let passwords = Arc::new(Pbkdf2Scheme::new(config.pbkdf2_rounds));

    match config.database_url.as_deref() {
        #[cfg(feature = "postgres")]
        Some(url) => {
            use realworld::db::pg::{init_pool, PgStore};

            let pool = init_pool(url, config.pool_size).context("failed to create database pool")?;
            tracing::info!(pool_size = config.pool_size, "using postgres store");
            Ok(State::new(
                Arc::new(PgStore::new(pool)),
                tokens,
                passwords,
                config.password_min_length,
            ))
        }
        #[cfg(not(feature = "postgres"))]
        Some(_) => anyhow::bail!("DATABASE_URL is set but this build lacks the `postgres` feature"),
        None => {
            tracing::warn!("DATABASE_URL not set, data is kept in memory only");
            Ok(State::new(
                Arc::new(MemoryStore::new()),
                tokens,
                passwords,
                config.password_min_length,
            ))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let state = build_state(&config)?;
    let service = ConduitService::new(state);

    tracing::info!(addr = %config.listen_addr, "serving conduit");
    Server::builder()
        .trace_fn(|request| tracing::info_span!("rpc", path = %request.uri().path()))
        .add_service(service.into_server())
        .serve_with_shutdown(config.listen_addr, async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("shutting down");
        })
        .await?;
    Ok(())
}
