use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use axum::body::Body;
use clap::Parser;
use http::{HeaderValue, StatusCode};
use tower_governor::governor::GovernorConfigBuilder;
use tower_governor::key_extractor::SmartIpKeyExtractor;
use tower_governor::{GovernorError, GovernorLayer};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod config;
mod db;
mod error;
mod routes;
mod services;

use cli::{Cli, Command};
use config::Config;
use db::Store;
use services::init;
use services::verification::{LogVerificationSender, VerificationSender};

pub struct AppState {
    pub store: Store,
    pub config: Config,
    pub verifier: Arc<dyn VerificationSender>,
}

fn json_error(status: StatusCode, body: serde_json::Value) -> http::Response<Body> {
    let mut resp = http::Response::new(Body::from(body.to_string()));
    *resp.status_mut() = status;
    resp.headers_mut().insert(
        http::header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    resp
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "collection_share=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    tracing::info!("Starting collection sharing service");

    let pool = init::init_db(&config).await?;
    let app_state = Arc::new(AppState {
        store: Store::new(pool, Duration::from_millis(config.database.begin_timeout_ms)),
        config: config.clone(),
        verifier: Arc::new(LogVerificationSender::new(&config)),
    });

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => {}
        command => {
            let result = cli::run_admin(&app_state, command).await;
            app_state.store.pool().close().await;
            return result.map_err(Into::into);
        }
    }

    init::seed_guest_account(&app_state).await?;

    let thread_shutdown = Arc::new(AtomicBool::new(false));

    // Signup rate limiter. Rejections use the same error shape as `AppError`.
    let mut signup_builder = GovernorConfigBuilder::default();
    signup_builder.per_second(config.rate_limit.signup_per_second.into());
    signup_builder.burst_size(config.rate_limit.signup_burst);
    signup_builder.key_extractor(SmartIpKeyExtractor);
    signup_builder.error_handler(|error: GovernorError| -> http::Response<Body> {
        match error {
            GovernorError::TooManyRequests { wait_time, headers } => {
                let mut resp = json_error(
                    StatusCode::TOO_MANY_REQUESTS,
                    serde_json::json!({
                        "error": {
                            "code": "RATE_LIMITED",
                            "message": "Rate limit exceeded",
                            "details": { "retry_after_seconds": wait_time }
                        }
                    }),
                );
                if let Some(hmap) = headers {
                    for (name, value) in hmap.iter() {
                        resp.headers_mut().append(name.clone(), value.clone());
                    }
                }
                resp.headers_mut()
                    .insert(http::header::RETRY_AFTER, HeaderValue::from(wait_time));
                resp
            }
            GovernorError::UnableToExtractKey => json_error(
                StatusCode::BAD_REQUEST,
                serde_json::json!({
                    "error": {
                        "code": "INVALID_REQUEST",
                        "message": "Unable to determine client IP for rate limiting"
                    }
                }),
            ),
            GovernorError::Other { code, msg, headers } => {
                let status =
                    StatusCode::from_u16(code.as_u16()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                let mut resp = json_error(
                    status,
                    serde_json::json!({
                        "error": {
                            "code": "RATE_LIMIT_ERROR",
                            "message": msg.unwrap_or_else(|| "Rate limiting error".to_string())
                        }
                    }),
                );
                if let Some(hmap) = headers {
                    for (name, value) in hmap.iter() {
                        resp.headers_mut().append(name.clone(), value.clone());
                    }
                }
                resp
            }
        }
    });

    let signup_gov_conf = Arc::new(
        signup_builder
            .finish()
            .ok_or_else(|| anyhow::anyhow!("Failed to build signup governor config"))?,
    );

    // Background cleanup for limiter storage
    let signup_cleaner = {
        let limiter = signup_gov_conf.limiter().clone();
        let interval = Duration::from_secs(60);
        let flag = thread_shutdown.clone();
        std::thread::spawn(move || {
            let tick = Duration::from_secs(1);
            loop {
                for _ in 0..interval.as_secs() {
                    if flag.load(Ordering::SeqCst) {
                        tracing::info!("Signup rate limiter cleanup thread exiting");
                        return;
                    }
                    std::thread::sleep(tick);
                }
                tracing::debug!("signup rate limiter size: {}", limiter.len());
                limiter.retain_recent();
            }
        })
    };

    let signup_rate_layer = GovernorLayer {
        config: signup_gov_conf.clone(),
    };

    let cors_origin = config
        .server
        .frontend_url
        .parse::<HeaderValue>()
        .map_err(|e| anyhow::anyhow!("Invalid FRONTEND_URL for CORS: {}", e))?;

    let app = routes::api_router()
        .nest(
            "/api/accounts",
            routes::accounts::router().layer(signup_rate_layer),
        )
        .with_state(app_state.clone())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(cors_origin)
                .allow_methods([
                    http::Method::GET,
                    http::Method::POST,
                    http::Method::DELETE,
                    http::Method::OPTIONS,
                ])
                .allow_headers([
                    http::header::CONTENT_TYPE,
                    http::header::AUTHORIZATION,
                    http::header::ACCEPT,
                ])
                .allow_credentials(true),
        );

    let addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let server_fut = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    );

    let thread_shutdown_clone = thread_shutdown.clone();
    let signal_fut = async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut term) => {
                    tokio::select! {
                        _ = ctrl_c => {},
                        _ = term.recv() => {},
                    }
                }
                Err(e) => {
                    tracing::warn!("Failed to bind SIGTERM, waiting on Ctrl+C only: {}", e);
                    let _ = ctrl_c.await;
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
        }

        tracing::info!("Shutdown signal received");
        thread_shutdown_clone.store(true, Ordering::SeqCst);
    };

    // Dropping the server future aborts in-flight requests; their open
    // transactions roll back when dropped.
    tokio::select! {
        res = server_fut => {
            if let Err(e) = res {
                tracing::error!("Server error: {}", e);
            }
        }
        _ = signal_fut => {
            tracing::info!("Stopped accepting new connections");
        }
    }

    thread_shutdown.store(true, Ordering::SeqCst);
    if let Err(e) = signup_cleaner.join() {
        tracing::warn!("Signup cleanup thread join failed: {:?}", e);
    }

    app_state.store.pool().close().await;
    tracing::info!("Shutdown complete");
    Ok(())
}
