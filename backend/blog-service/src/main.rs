use actix_web::{App, HttpServer};
use anyhow::Context;
use blog_service::handlers::{posts::INDEX_CACHE_PREFIX, site::error_pages};
use blog_service::models::NewGroup;
use blog_service::repository::{BlogRepository, PgBlogRepository, SharedRepository};
use blog_service::{configure, metrics, AppState, Config};
use page_cache::{MemoryPageCache, PageCache, PageKey, RedisPageCache};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const USAGE: &str = "usage: blog-service [healthcheck | create-group <slug> <title> [description] | clear-cache]";

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,actix_web=info,sqlx=warn".into());
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

/// Container healthcheck: GET the local `/health`
async fn healthcheck() -> io::Result<()> {
    let port = std::env::var("PORT").unwrap_or_else(|_| "8000".to_string());
    let url = format!("http://127.0.0.1:{}/health", port);
    match reqwest::Client::new().get(&url).send().await {
        Ok(resp) if resp.status().is_success() => Ok(()),
        Ok(resp) => {
            eprintln!("healthcheck HTTP status: {}", resp.status());
            Err(io::Error::new(io::ErrorKind::Other, "healthcheck failed"))
        }
        Err(e) => {
            eprintln!("healthcheck HTTP error: {}", e);
            Err(io::Error::new(io::ErrorKind::Other, "healthcheck error"))
        }
    }
}

async fn connect_database(config: &Config) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&config.database.url)
        .await
        .context("Failed to connect to PostgreSQL")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;

    tracing::info!(
        max_connections = config.database.max_connections,
        "database pool ready"
    );
    Ok(pool)
}

async fn connect_page_cache(config: &Config) -> Arc<dyn PageCache> {
    match &config.cache.redis_url {
        Some(url) => match RedisPageCache::connect(url).await {
            Ok(cache) => {
                tracing::info!("page cache: redis");
                Arc::new(cache)
            }
            Err(e) => {
                tracing::warn!(error = %e, "redis unavailable, falling back to in-process page cache");
                Arc::new(MemoryPageCache::with_max_entries(config.cache.max_entries))
            }
        },
        None => {
            tracing::info!(max_entries = config.cache.max_entries, "page cache: in-process");
            Arc::new(MemoryPageCache::with_max_entries(config.cache.max_entries))
        }
    }
}

async fn create_group(repo: &dyn BlogRepository, args: &[String]) -> anyhow::Result<()> {
    let (slug, title) = match (args.first(), args.get(1)) {
        (Some(slug), Some(title)) => (slug.clone(), title.clone()),
        _ => anyhow::bail!(USAGE),
    };
    let group = NewGroup {
        slug,
        title,
        description: args.get(2).cloned().unwrap_or_default(),
    };

    match repo.create_group(group).await? {
        Some(group) => {
            println!("created group {} ({})", group.slug, group.id);
            Ok(())
        }
        None => anyhow::bail!("a group with that slug already exists"),
    }
}

async fn clear_cache(config: &Config) -> anyhow::Result<()> {
    let cache = connect_page_cache(config).await;
    let removed = cache
        .clear_prefix(&PageKey::prefix(INDEX_CACHE_PREFIX))
        .await?;
    println!("removed {} cached pages", removed);
    Ok(())
}

async fn run_command(command: &str, args: &[String]) -> anyhow::Result<()> {
    let config = Config::from_env()?;
    match command {
        "create-group" => {
            let pool = connect_database(&config).await?;
            create_group(&PgBlogRepository::new(pool), args).await
        }
        "clear-cache" => clear_cache(&config).await,
        _ => anyhow::bail!(USAGE),
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = terminate.recv() => {},
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "SIGTERM handler unavailable");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

/// Blog Service
///
/// Serves the blog: feeds, posts, comments, follows and accounts, rendered
/// as HTML. PostgreSQL holds the data; the index page is cached in Redis
/// when `REDIS_URL` is set and in process memory otherwise.
#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenvy::dotenv().ok();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if let Some(command) = args.first() {
        if command == "healthcheck" {
            return healthcheck().await;
        }
        init_tracing();
        return run_command(command, &args[1..]).await.map_err(|e| {
            eprintln!("ERROR: {:#}", e);
            io::Error::new(io::ErrorKind::Other, e.to_string())
        });
    }

    init_tracing();

    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!("Configuration loading failed: {:#}", e);
            eprintln!("ERROR: Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    tracing::info!("Starting blog-service v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Environment: {}", config.app.env);

    let pool = connect_database(&config)
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("{:#}", e)))?;
    let repo: SharedRepository = Arc::new(PgBlogRepository::new(pool));
    let page_cache = connect_page_cache(&config).await;

    metrics::init();

    tokio::fs::create_dir_all(&config.media.root).await?;

    let bind_address = format!("{}:{}", config.app.host, config.app.port);
    let state = AppState::new(config, repo, page_cache)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("Failed to build application state: {e}")))?;

    tracing::info!("Starting HTTP server at {}", bind_address);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(error_pages())
            .wrap(TracingLogger::default())
            .configure(configure(state.clone()))
    })
    .bind(&bind_address)?
    .shutdown_timeout(30)
    .run();

    let handle = server.handle();
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("Shutdown signal received, stopping HTTP server");
        handle.stop(true).await;
    });

    server.await
}
