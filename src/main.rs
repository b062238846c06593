use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use backstage::models::permission::PermissionSpec;
use backstage::store::postgres::PgStore;
use backstage::wxamp::{MiniProgramClient, SchemeJump, UrlLinkRequest};
use backstage::{api, cli, config, seed, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "backstage=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = config::load()?;
    let args = cli::Cli::parse();

    let result = match args.command {
        Some(cli::Commands::Serve { port }) => {
            let port = port.unwrap_or(cfg.port);
            run_server(cfg, port).await
        }
        Some(cli::Commands::Seed {
            company,
            prefix,
            admin,
            password,
            permissions,
        }) => run_seed(cfg, company, prefix, admin, password, permissions).await,
        Some(cli::Commands::Wx { command }) => run_wx(cfg, command).await,
        None => {
            let port = cfg.port;
            run_server(cfg, port).await
        }
    };

    if let Err(ref e) = result {
        eprintln!("Error: {:?}", e);
    }
    result
}

async fn run_server(cfg: config::Config, port: u16) -> anyhow::Result<()> {
    tracing::info!("Connecting to database...");
    let db = PgStore::connect(&cfg.database_url).await?;

    tracing::info!("Running migrations...");
    db.migrate().await?;

    let state = Arc::new(AppState { db, config: cfg });

    let app = axum::Router::new()
        // Health endpoint (no auth)
        .route("/healthz", axum::routing::get(|| async { "ok" }))
        .nest("/api/v1", api::api_router())
        .with_state(state)
        .layer({
            use axum::http::{HeaderName, Method};
            use tower_http::cors::AllowOrigin;
            let dashboard_origin = std::env::var("DASHBOARD_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:3000".to_string());
            CorsLayer::new()
                .allow_origin(AllowOrigin::predicate(move |origin, _| {
                    let origin_str = origin.to_str().unwrap_or("");
                    origin_str == dashboard_origin
                        || origin_str.starts_with("http://localhost:")
                        || origin_str.starts_with("http://127.0.0.1:")
                }))
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PATCH,
                    Method::DELETE,
                    Method::OPTIONS,
                ])
                .allow_headers([
                    HeaderName::from_static("content-type"),
                    HeaderName::from_static("authorization"),
                    HeaderName::from_static("x-request-id"),
                ])
                .allow_credentials(true)
        })
        .layer(axum::middleware::from_fn(request_id_middleware));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Backstage listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn run_seed(
    cfg: config::Config,
    company: String,
    prefix: String,
    admin: String,
    password: String,
    permissions: Option<std::path::PathBuf>,
) -> anyhow::Result<()> {
    let db = PgStore::connect(&cfg.database_url).await?;
    db.migrate().await?;

    let extra: Vec<PermissionSpec> = match permissions {
        Some(path) => {
            let raw = std::fs::read_to_string(&path)?;
            serde_json::from_str(&raw)?
        }
        None => Vec::new(),
    };

    seed::seed_permissions(&db, &extra).await?;
    seed::seed_company(&db, &company, &prefix).await?;
    seed::seed_users(&db, &[(admin.clone(), password)], &prefix).await?;

    println!("Seed complete:");
    println!("  Company: {} (prefix {})", company, prefix);
    println!("  Admin:   {}@{}", prefix, admin);
    Ok(())
}

async fn run_wx(cfg: config::Config, cmd: cli::WxCommands) -> anyhow::Result<()> {
    if cfg.wx_app_id.is_empty() || cfg.wx_app_secret.is_empty() {
        anyhow::bail!("WX_APP_ID / WX_APP_SECRET are not configured");
    }
    let client = MiniProgramClient::new(&cfg.wx_app_id, &cfg.wx_app_secret, &cfg.wx_cache_dir);

    match cmd {
        cli::WxCommands::Scheme {
            path,
            query,
            expire_interval,
        } => {
            let jump = SchemeJump::new(&path, query.as_deref());
            let link = client.generate_scheme(Some(&jump), expire_interval).await?;
            println!("{}", link);
        }
        cli::WxCommands::UrlLink {
            path,
            query,
            expire_interval,
        } => {
            let req = UrlLinkRequest {
                path,
                query,
                expire_interval,
                ..UrlLinkRequest::default()
            };
            let link = client.generate_url_link(&req).await?;
            println!("{}", link);
        }
    }
    Ok(())
}

/// Middleware: injects a unique X-Request-Id into every response so clients
/// can correlate errors with server logs.
async fn request_id_middleware(
    req: axum::extract::Request,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let req_id = uuid::Uuid::new_v4().to_string();
    let mut resp = next.run(req).await;
    if let Ok(val) = axum::http::HeaderValue::from_str(&req_id) {
        resp.headers_mut().insert("x-request-id", val);
    }
    resp
}
