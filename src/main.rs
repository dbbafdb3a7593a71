use clap::Parser;
use credential_intake::config::IntakeConfig;
use credential_intake::infrastructure::{engines, staging};
use credential_intake::services::pipeline::LicensePipeline;
use credential_intake::services::worker::StagingSweeper;
use credential_intake::{AppState, create_app};
use dotenvy::dotenv;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Service type to run (api, worker, all)
    #[arg(short, long, default_value = "all")]
    mode: String,

    /// Port for the API server
    #[arg(short, long, default_value_t = 3000)]
    port: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initial Environment & Logging Setup
    dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "credential_intake=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("🚀 Starting Credential Intake [Mode: {}]...", args.mode);

    // 2. Configuration & Staging
    let config = IntakeConfig::from_env();
    info!(
        "🛡️  Intake Config: Max Size={}MB, Field='{}', Render timeout={}s, OCR timeout={}s",
        config.max_file_size / 1024 / 1024,
        config.upload_field,
        config.render_timeout_secs,
        config.ocr_timeout_secs
    );
    let staging_area = staging::setup_staging(&config).await?;

    // 3. Setup Graceful Shutdown Channel
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let mut handles = Vec::new();

    // 4. Staging Sweeper
    if args.mode == "worker" || args.mode == "all" {
        let sweeper = StagingSweeper::new(
            staging_area.clone(),
            config.staging_cleanup_age_hours,
            shutdown_rx.clone(),
        );
        handles.push(tokio::spawn(sweeper.run()));
        info!("👷 Staging sweeper initialized.");
    }

    // 5. API Service
    if args.mode == "api" || args.mode == "all" {
        let renderer = engines::setup_renderer(&config).await;
        let extractor = engines::setup_extractor(&config).await;
        let pipeline = Arc::new(LicensePipeline::new(
            staging_area.clone(),
            renderer,
            extractor,
            config.clone(),
        ));

        let state = AppState {
            pipeline,
            config: config.clone(),
        };

        let trace_layer = TraceLayer::new_for_http()
            .make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("unknown");
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id,
                )
            })
            .on_request(|request: &axum::http::Request<_>, _span: &tracing::Span| {
                info!("📥 {} {}", request.method(), request.uri());
            })
            .on_response(
                |response: &axum::http::Response<_>,
                 latency: std::time::Duration,
                 _span: &tracing::Span| {
                    info!(
                        "📤 Finished in {:?} with status {}",
                        latency,
                        response.status()
                    );
                },
            );

        let app = create_app(state).layer(trace_layer);
        let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
        let listener = tokio::net::TcpListener::bind(addr).await?;

        info!("✅ API Server listening on: http://0.0.0.0:{}", args.port);
        info!("📖 Swagger UI documentation: http://localhost:{}/swagger-ui", args.port);

        let mut server_shutdown = shutdown_rx.clone();
        handles.push(tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = server_shutdown.changed().await;
                })
                .await
            {
                error!("❌ Server runtime error: {}", e);
            }
        }));
    }

    // 6. Wait for Shutdown Signal, then drain in-flight work
    shutdown_signal().await;
    let _ = shutdown_tx.send(true);

    info!("🛑 Shutting down intake services...");
    for handle in handles {
        let _ = handle.await;
    }

    info!("👋 Credential Intake exited cleanly.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("⌨️  Ctrl+C received, initiating graceful shutdown...");
        },
        _ = terminate => {
            info!("💤 SIGTERM received, initiating graceful shutdown...");
        },
    }
}
