use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use todo_server::config::{Config, Storage};
use todo_server::repository::{InMemoryTodoRepository, MongoTodoRepository, TodoRepository};
use todo_server::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "todo_server=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(error) => {
            tracing::error!(%error, "configuration error");
            std::process::exit(1);
        }
    };

    let repository: Arc<dyn TodoRepository> = match &config.storage {
        Storage::InMemory => {
            tracing::warn!("using in-memory storage, todos are lost on exit");
            Arc::new(InMemoryTodoRepository::new())
        }
        Storage::MongoDb(mongo) => match MongoTodoRepository::connect(mongo).await {
            Ok(repository) => Arc::new(repository),
            Err(error) => {
                tracing::error!(%error, "failed to connect to MongoDB");
                std::process::exit(1);
            }
        },
    };

    let listener = match TcpListener::bind(config.addr).await {
        Ok(listener) => listener,
        Err(error) => {
            tracing::error!(%error, addr = %config.addr, "failed to bind");
            std::process::exit(1);
        }
    };
    tracing::info!(addr = %config.addr, routes = ?todo_server::ROUTES, "listening");

    let app = todo_server::app(AppState::new(repository), config.request_timeout);
    if let Err(error) = todo_server::serve(listener, app, shutdown_signal()).await {
        tracing::error!(%error, "server error");
        std::process::exit(1);
    }
    tracing::info!("server stopped");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = signal::ctrl_c().await {
            tracing::warn!(%error, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                tracing::warn!(%error, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
        () = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
