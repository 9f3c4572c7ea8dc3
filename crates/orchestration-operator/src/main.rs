//! OrchestrationCluster Kubernetes Operator
//!
//! This operator manages OrchestrationCluster custom resources in Kubernetes,
//! deploying Camunda orchestration clusters and reporting their readiness.

use anyhow::{Context, Result};
use clap::Parser;
use kube::Client;
use orchestration_operator::controller::{self, ControllerLiveness};
use orchestration_operator::crd::OrchestrationCluster;
use orchestration_operator::management_client::{ManagementClient, ManagementClientConfig};
use orchestration_operator::strategy::StrategyRegistry;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;

/// OrchestrationCluster Kubernetes Operator
#[derive(Parser, Debug)]
#[command(name = "orchestration-operator")]
#[command(about = "Kubernetes operator for Camunda orchestration clusters")]
#[command(version)]
struct Args {
    /// Metrics server address
    #[arg(long, env = "METRICS_ADDR", default_value = "0.0.0.0:8080")]
    metrics_addr: SocketAddr,

    /// Health probe address
    #[arg(long, env = "HEALTH_ADDR", default_value = "0.0.0.0:8081")]
    health_addr: SocketAddr,

    /// Namespace to watch (empty for cluster-wide)
    #[arg(long, env = "WATCH_NAMESPACE", default_value = "")]
    namespace: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: Level,

    /// Enable JSON log format
    #[arg(long, env = "LOG_JSON", default_value = "false")]
    log_json: bool,

    /// Timeout of one topology query, in seconds
    #[arg(long, env = "TOPOLOGY_TIMEOUT_SECS", default_value = "10")]
    topology_timeout_secs: u64,

    /// Print CRD YAML and exit
    #[arg(long)]
    print_crd: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Handle CRD printing
    if args.print_crd {
        print_crd()?;
        return Ok(());
    }

    // Initialize logging
    init_logging(&args)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        namespace = if args.namespace.is_empty() {
            "all"
        } else {
            &args.namespace
        },
        "Starting OrchestrationCluster operator"
    );

    // Initialize metrics
    let metrics_addr = args.metrics_addr;
    tokio::spawn(async move {
        if let Err(e) = start_metrics_server(metrics_addr).await {
            tracing::error!(error = %e, "Metrics server failed");
        }
    });

    // Start health server
    let liveness = Arc::new(ControllerLiveness::default());
    let health_addr = args.health_addr;
    let health_state = liveness.clone();
    tokio::spawn(async move {
        if let Err(e) = start_health_server(health_addr, health_state).await {
            tracing::error!(error = %e, "Health server failed");
        }
    });

    let registry = Arc::new(
        StrategyRegistry::standard().context("Failed to build version strategy registry")?,
    );

    let topology = Arc::new(
        ManagementClient::with_config(ManagementClientConfig {
            request_timeout: Duration::from_secs(args.topology_timeout_secs),
            ..Default::default()
        })
        .context("Failed to create management client")?,
    );

    // Create Kubernetes client
    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;

    // Parse namespace (empty string means cluster-wide)
    let namespace = if args.namespace.is_empty() {
        None
    } else {
        Some(args.namespace)
    };

    // Run the controller
    controller::run_controller(client, namespace, registry, topology, liveness)
        .await
        .context("Controller failed")?;

    Ok(())
}

/// Initialize logging subsystem
fn init_logging(args: &Args) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(args.log_level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(true)
        .with_thread_ids(false)
        .with_line_number(false);

    if args.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    Ok(())
}

/// Start the Prometheus metrics server
async fn start_metrics_server(addr: SocketAddr) -> Result<()> {
    use metrics_exporter_prometheus::PrometheusBuilder;

    info!(address = %addr, "Starting metrics server");

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("Failed to install Prometheus exporter")?;

    std::future::pending::<()>().await;

    Ok(())
}

/// HTTP response for a health probe given the controller's liveness
fn health_response(running: bool) -> &'static str {
    if running {
        "HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nOK"
    } else {
        "HTTP/1.1 503 Service Unavailable\r\nContent-Length: 19\r\n\r\ncontroller inactive"
    }
}

/// Start the health probe server; healthy only while the controller runs
async fn start_health_server(addr: SocketAddr, liveness: Arc<ControllerLiveness>) -> Result<()> {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    info!(address = %addr, "Starting health server");

    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind health server")?;

    loop {
        let (mut socket, _) = listener.accept().await?;
        let liveness = liveness.clone();

        tokio::spawn(async move {
            let mut buf = [0; 1024];
            if socket.read(&mut buf).await.is_ok() {
                let response = health_response(liveness.is_running());
                let _ = socket.write_all(response.as_bytes()).await;
            }
        });
    }
}

/// Print the CRD YAML for installation
fn print_crd() -> Result<()> {
    use kube::CustomResourceExt;

    let crd = OrchestrationCluster::crd();
    let yaml = serde_yaml::to_string(&crd)?;
    println!("{}", yaml);

    Ok(())
}
