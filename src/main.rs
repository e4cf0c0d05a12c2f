use anyhow::Context;
use clap::Parser;
use http::header::{HeaderName, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use http::Method;
use osm_sync::config::read_config;
use osm_sync::directory::JsonFileDirectory;
use osm_sync::server::proto::osm_sync_server::OsmSyncServer;
use osm_sync::server::{BearerAuth, OsmSyncService};
use osm_sync::utils::{GROUPS_FILE, STATE_FOLDER};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tonic::transport::Server;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{info, warn};

const DEFAULT_ADDR: &str = "127.0.0.1:50051";
const DEFAULT_CORS_ORIGINS: &str = "http://localhost,https://localhost,http://127.0.0.1,https://127.0.0.1";

/// OSM Sync - keeps Google Workspace groups in line with OSM section rosters
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to bind the server to
    #[arg(short, long, env = "OSM_SYNC_ADDR", default_value = DEFAULT_ADDR)]
    addr: String,

    /// Comma-separated list of allowed CORS origins.
    /// Use "*" to allow all origins (not recommended for production).
    #[arg(
        long,
        env = "OSM_SYNC_CORS_ORIGINS",
        default_value = DEFAULT_CORS_ORIGINS,
        value_delimiter = ','
    )]
    cors_origins: Vec<String>,

    /// Directory holding config.json, roster.json, groups.json and snapshots/
    #[arg(long, env = "OSM_SYNC_STATE_DIR", default_value = STATE_FOLDER)]
    state_dir: PathBuf,

    /// Bearer token every request must present. Unset disables the check.
    #[arg(long, env = "SCHEDULER_AUTH_TOKEN", hide_env_values = true)]
    scheduler_token: Option<String>,

    /// Report "already a member" and "not a member" responses as failures
    #[arg(long)]
    strict: bool,
}

// Include the file descriptor set for gRPC reflection
pub const FILE_DESCRIPTOR_SET: &[u8] = tonic::include_file_descriptor_set!("osm_sync_descriptor");

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Parse CLI arguments
    let args = Args::parse();

    let addr: SocketAddr = args
        .addr
        .parse()
        .with_context(|| format!("invalid bind address {}", args.addr))?;

    // Config is loaded once and handed to the service
    let config = read_config(&args.state_dir)
        .await
        .context("failed to load sync config")?;
    config.validate().context("sync config is invalid")?;

    let directory = JsonFileDirectory::load(&args.state_dir.join(GROUPS_FILE))
        .await
        .context("failed to load group directory")?;

    info!(
        domain = %config.domain,
        sections = config.sections.len(),
        state_dir = %args.state_dir.display(),
        "Loaded sync config"
    );

    let auth = BearerAuth::new(args.scheduler_token.as_deref())
        .map_err(|status| anyhow::anyhow!(status.message().to_string()))?;
    if !auth.is_enabled() {
        warn!("No scheduler token set, requests are not authenticated");
    }

    let service = OsmSyncService::new(config, args.state_dir.clone(), Arc::new(directory))
        .with_idempotent_tolerance(!args.strict);

    // Process CORS origins
    let cors_origins: Vec<String> = args
        .cors_origins
        .iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    let allow_all_origins = cors_origins.iter().any(|o| o == "*");

    info!(
        "CORS origins: {}",
        if allow_all_origins {
            "*".to_string()
        } else {
            cors_origins.join(", ")
        }
    );

    // Create reflection service
    let reflection_service = tonic_reflection::server::Builder::configure()
        .register_encoded_file_descriptor_set(FILE_DESCRIPTOR_SET)
        .build_v1()?;

    // Configure CORS for gRPC-Web
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(move |origin, _| {
            if allow_all_origins {
                return true;
            }

            origin
                .to_str()
                .map(|origin_str| {
                    cors_origins
                        .iter()
                        .any(|allowed| origin_str.starts_with(allowed.as_str()))
                })
                .unwrap_or(false)
        }))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            ACCEPT,
            AUTHORIZATION,
            CONTENT_TYPE,
            HeaderName::from_static("x-grpc-web"),
            HeaderName::from_static("x-user-agent"),
            HeaderName::from_static("grpc-timeout"),
        ])
        .expose_headers([
            HeaderName::from_static("grpc-status"),
            HeaderName::from_static("grpc-message"),
            HeaderName::from_static("grpc-status-details-bin"),
        ]);

    info!("Starting osm-sync daemon on {} (gRPC + gRPC-Web)", addr);

    Server::builder()
        .accept_http1(true) // Required for gRPC-Web
        .layer(cors)
        .layer(tonic_web::GrpcWebLayer::new())
        .add_service(reflection_service)
        .add_service(OsmSyncServer::with_interceptor(service, auth))
        .serve_with_shutdown(addr, async {
            tokio::signal::ctrl_c().await.ok();
            info!("Received shutdown signal, stopping server...");
        })
        .await?;

    info!("osm-sync daemon stopped");
    Ok(())
}
