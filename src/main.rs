use axum::{
    Router,
    extract::Extension,
    routing::get,
};
use fadetable::api::handlers::{
    handle_dist, handle_get, handle_incr, handle_ping, handle_status,
};
use fadetable::backend::redis::RedisConnector;
use fadetable::cluster::registry::ShardRegistry;
use fadetable::cluster::types::parse_shard_hosts;
use fadetable::dispatch::dispatcher::Dispatcher;
use fadetable::gateway::service::{GatewayService, GatewaySettings};
use fadetable::gateway::writeback::{RefreshWorkers, WritebackQueue};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args: Vec<String> = std::env::args().collect();

    let mut shard_hosts: Option<String> = None;
    let mut listen_addr: SocketAddr = "0.0.0.0:6666".parse()?;
    let mut worker_count: usize = 4;
    let mut settings = GatewaySettings::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--shard-hosts" => {
                shard_hosts = Some(args[i + 1].clone());
                i += 2;
            }
            "--listen" => {
                listen_addr = args[i + 1].parse()?;
                i += 2;
            }
            "--default-rate" => {
                settings.default_rate = args[i + 1].parse()?;
                i += 2;
            }
            "--workers" => {
                worker_count = args[i + 1].parse()?;
                i += 2;
            }
            "--timeout-ms" => {
                settings.timeout = Duration::from_millis(args[i + 1].parse()?);
                i += 2;
            }
            "--no-prune" => {
                settings.prune = false;
                i += 1;
            }
            "--version" => {
                println!("Version: {}", VERSION);
                return Ok(());
            }
            _ => {
                i += 1;
            }
        }
    }

    let Some(shard_hosts) = shard_hosts else {
        eprintln!(
            "Usage: {} --shard-hosts <host:port,host:port,...> [--listen <addr:port>]",
            args[0]
        );
        eprintln!("       [--default-rate <rate>] [--workers <n>] [--timeout-ms <ms>] [--no-prune]");
        eprintln!("Example: {} --shard-hosts localhost:6379,localhost:6380", args[0]);
        std::process::exit(1);
    };

    let endpoints = parse_shard_hosts(&shard_hosts)?;
    for endpoint in &endpoints {
        tracing::info!(
            "Added shard: {} @ {} - {}",
            endpoint.address,
            endpoint.port,
            endpoint.id
        );
    }

    // 1. Shard topology and connections:
    let connector = Arc::new(RedisConnector);
    let registry = ShardRegistry::start(endpoints, connector);
    let dispatcher = Dispatcher::new(registry.clone());

    // 2. Write-back pipeline:
    let (writeback, refresh_queue) = WritebackQueue::new();
    RefreshWorkers::new(
        dispatcher.clone(),
        settings.clone(),
        worker_count,
        refresh_queue,
    )
    .start();

    // 3. Service and HTTP router:
    let service = Arc::new(GatewayService::new(
        registry.clone(),
        dispatcher,
        writeback,
        settings,
    ));

    let app = Router::new()
        .route("/ping", get(handle_ping))
        .route("/get", get(handle_get))
        .route("/incr", get(handle_incr))
        .route("/dist", get(handle_dist))
        .route("/status", get(handle_status))
        .layer(Extension(service));

    // 4. Spawn stats reporter:
    let stats_registry = registry.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(5));

        loop {
            interval.tick().await;
            for slot in stats_registry.slots() {
                tracing::info!(
                    "  - shard {} {}:{} state={} in_flight={}",
                    slot.endpoint.id,
                    slot.endpoint.address,
                    slot.endpoint.port,
                    slot.state().as_str(),
                    slot.in_flight()
                );
            }
        }
    });

    // 5. Start HTTP server:
    tracing::info!("Version: {}", VERSION);
    tracing::info!("HTTP server listening on {}", listen_addr);
    tracing::info!("Press Ctrl+C to shutdown");

    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
