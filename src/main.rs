use std::sync::Arc;

use quadop::api::{AppState, api_routes};
use quadop::compute::{TaskExecutor, create_strategy};
use quadop::config::{Config, StoreBackend};
use quadop::job::{Coordinator, Dispatcher};
use quadop::store::{JobStore, LibSqlStore, MemoryStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = Config::from_env()?;

    eprintln!("🧮 quadop v{}", env!("CARGO_PKG_VERSION"));
    eprintln!(
        "   API: http://{}:{}/api/jobs",
        config.server.host, config.server.port
    );

    // ── Store ────────────────────────────────────────────────────────────
    let store: Arc<dyn JobStore> = match &config.store.backend {
        StoreBackend::Memory => {
            eprintln!("   Store: in-memory (state is lost on restart)");
            Arc::new(MemoryStore::new())
        }
        StoreBackend::LibSql(path) => {
            eprintln!("   Store: libSQL at {}", path.display());
            Arc::new(LibSqlStore::new_local(path).await?)
        }
    };

    // ── Compute ──────────────────────────────────────────────────────────
    let strategy = create_strategy(&config.compute);
    match &strategy {
        Some(s) => eprintln!(
            "   Strategy: {} (timeout {:?})",
            s.name(),
            config.compute.strategy_timeout
        ),
        None => eprintln!("   Strategy: deterministic arithmetic only"),
    }

    let coordinator = Arc::new(Coordinator::new(Arc::clone(&store)));
    let executor = Arc::new(TaskExecutor::new(
        Arc::clone(&coordinator),
        strategy,
        config.compute.strategy_timeout,
    ));
    let dispatcher = Arc::new(Dispatcher::new(
        executor,
        config.compute.max_concurrent_tasks,
    ));

    // ── HTTP API ─────────────────────────────────────────────────────────
    let app = api_routes(AppState {
        coordinator,
        dispatcher,
    });

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "Job API listening");
    axum::serve(listener, app).await?;

    Ok(())
}
