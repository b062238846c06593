use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    /// Secret used to sign and verify JWT access tokens.
    pub jwt_secret: String,
    /// Access token lifetime in minutes. Default: 120.
    pub jwt_ttl_minutes: i64,
    /// WeChat mini-program app id (empty disables the wxamp CLI commands).
    pub wx_app_id: String,
    pub wx_app_secret: String,
    /// Directory for the per-app-id token cache file.
    pub wx_cache_dir: String,
}

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();

    let jwt_secret = std::env::var("BACKSTAGE_JWT_SECRET")
        .unwrap_or_else(|_| "CHANGE_ME_INSECURE_DEV_SECRET".into());

    if jwt_secret == "CHANGE_ME_INSECURE_DEV_SECRET" {
        let env_mode = std::env::var("BACKSTAGE_ENV")
            .or_else(|_| std::env::var("RUST_ENV"))
            .unwrap_or_default();
        if env_mode == "production" {
            anyhow::bail!(
                "BACKSTAGE_JWT_SECRET is still the insecure placeholder. \
                 Set a proper secret before running in production."
            );
        }
        eprintln!("⚠️  BACKSTAGE_JWT_SECRET is not set — using insecure placeholder. Set a real secret for production.");
    }

    Ok(Config {
        port: std::env::var("BACKSTAGE_PORT")
            .unwrap_or_else(|_| "8080".into())
            .parse()
            .unwrap_or(8080),
        database_url: std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgres://localhost/backstage".into()),
        jwt_secret,
        jwt_ttl_minutes: std::env::var("BACKSTAGE_JWT_TTL_MINUTES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(120),
        wx_app_id: std::env::var("WX_APP_ID").unwrap_or_default(),
        wx_app_secret: std::env::var("WX_APP_SECRET").unwrap_or_default(),
        wx_cache_dir: std::env::var("WX_TOKEN_CACHE_DIR").unwrap_or_else(|_| "./.wxamp".into()),
    })
}
