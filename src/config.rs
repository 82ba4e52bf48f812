use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;

/// Server settings. Every flag can also come from the environment, and a
/// `.env` file in the working directory is read first.
#[derive(Debug, Clone, Parser)]
#[command(name = "realworld", version, about = "RealWorld (Conduit) backend served over gRPC")]
pub struct Config {
    /// Address the gRPC server listens on.
    #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:50051")]
    pub listen_addr: SocketAddr,

    /// PostgreSQL connection string. Without it everything is kept in memory.
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    #[arg(long, env = "DATABASE_POOL_SIZE", default_value_t = 10)]
    pub pool_size: u32,

    /// HMAC secret used to sign session tokens.
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: String,

    /// Lifetime of issued tokens, in seconds.
    #[arg(long, env = "TOKEN_TTL_SECS", default_value_t = 72 * 60 * 60)]
    pub token_ttl_secs: u64,

    #[arg(long, env = "PASSWORD_MIN_LENGTH", default_value_t = 8)]
    pub password_min_length: usize,

    #[arg(long, env = "PBKDF2_ROUNDS", default_value_t = 10_000)]
    pub pbkdf2_rounds: u32,
}

impl Config {
    pub fn load() -> Config {
        dotenv::dotenv().ok();
        Config::parse()
    }

    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_defaults() {
        let config = Config::try_parse_from([
            "realworld",
            "--jwt-secret",
            "s3cret",
            "--listen-addr",
            "127.0.0.1:4000",
            "--token-ttl-secs",
            "60",
        ])
        .unwrap();
        assert_eq!(config.jwt_secret, "s3cret");
        assert_eq!(config.listen_addr, "127.0.0.1:4000".parse().unwrap());
        assert_eq!(config.token_ttl(), Duration::from_secs(60));
    }
}
