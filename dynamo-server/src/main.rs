use clap::Parser;
use dynamo_server::http::create_router;
use dynamo_server::{build_node, Cli};
use tokio::signal;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.into_engine_config();

    tracing_subscriber::fmt()
        .with_max_level(if config.debug {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .with_target(false)
        .init();

    info!(node = %config.node_id, "initializing local store, ring and membership service");
    let (state, membership_handle) = build_node(&config);
    info!(all_nodes = ?config.all_nodes, "ring ready");

    let app = create_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.port));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "http server listening");
    print_ready_message(&config.node_id, config.port);

    let server = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "http server failed");
        }
    });

    wait_for_shutdown().await;

    info!("shutting down");
    server.abort();
    membership_handle.stop().await;

    Ok(())
}

fn print_ready_message(node_id: &str, port: u16) {
    println!();
    println!("dynamo node '{node_id}' ready on http://0.0.0.0:{port}");
    println!();
}

async fn wait_for_shutdown() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
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
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
