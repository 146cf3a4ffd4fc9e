use anyhow::{Context, Result};
use clap::Parser;
use mirror_api::rosetta::types::{NetworkIdentifier, SubNetworkIdentifier};
use mirror_api::server::AppState;
use mirror_api::services::account::AccountApiService;
use mirror_api::services::block::BlockApiService;
use mirror_api::services::construction::ConstructionApiService;
use mirror_api::services::mempool::MempoolApiService;
use mirror_api::services::network::NetworkApiService;
use mirror_api::services::BaseService;
use mirror_api::{offline_router, online_router};
use mirror_domain::{EntityId, SystemEntities, BLOCKCHAIN};
use mirror_storage::{
    DbClient, PgAccountRepository, PgAddressBookRepository, PgBlockRepository,
    PgTransactionRepository,
};
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tower_http::timeout::TimeoutLayer;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod config;

use config::RosettaConfig;

#[derive(Parser)]
#[command(name = "mirror-rosetta")]
#[command(about = "Rosetta API server over a hashgraph mirror database")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Listening port override
    #[arg(long, value_name = "PORT")]
    port: Option<u16>,

    /// Force offline mode
    #[arg(long)]
    offline: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = RosettaConfig::load(cli.config.as_deref()).context("Failed to load config")?;
    if let Some(port) = cli.port {
        config.port = port;
    }
    if cli.offline {
        config.online = false;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log.level.clone())),
        )
        .init();

    info!(
        "mirror-rosetta {} starting in {} mode",
        env!("CARGO_PKG_VERSION"),
        if config.online { "ONLINE" } else { "OFFLINE" }
    );

    let state = build_state(&config).context("Failed to wire services")?;
    let router = if config.online {
        online_router(state)
    } else {
        offline_router(state)
    };

    // the request deadline covers reading the body and writing the response
    let request_budget = Duration::from_secs(config.http.read_timeout + config.http.write_timeout);
    let router = router.layer(TimeoutLayer::new(request_budget));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Listening on {addr}");

    let shutdown_timeout = Duration::from_secs(config.shutdown_timeout);
    let draining = Arc::new(tokio::sync::Notify::new());
    let drain_started = draining.clone();
    let serve = axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            drain_started.notify_one();
        })
        .into_future();

    tokio::select! {
        result = serve => {
            result.context("Server error")?;
            info!("Server shutdown gracefully");
        }
        _ = async {
            draining.notified().await;
            tokio::time::sleep(shutdown_timeout).await;
        } => {
            error!("Shutdown budget of {shutdown_timeout:?} exceeded, aborting in-flight requests");
        }
    }

    Ok(())
}

fn build_state(config: &RosettaConfig) -> Result<Arc<AppState>> {
    let system = SystemEntities::new(config.shard, config.realm)
        .map_err(|err| anyhow::anyhow!("Invalid shard/realm: {err}"))?;

    let static_nodes = parse_static_nodes(config)?;
    let node_account_ids: Vec<EntityId> =
        static_nodes.iter().map(|(_, account)| *account).collect();

    let mut network = NetworkIdentifier {
        blockchain: BLOCKCHAIN.to_string(),
        network: config.network.to_lowercase(),
        sub_network_identifier: None,
    };
    if config.feature.sub_network_identifier {
        network.sub_network_identifier = Some(SubNetworkIdentifier {
            network: format!("shard {} realm {}", config.shard, config.realm),
        });
    }

    if !config.online {
        let construction =
            ConstructionApiService::new(false, config.shard, config.realm, node_account_ids, None)
                .map_err(|err| anyhow::anyhow!("Failed to build construction service: {err}"))?;

        return Ok(Arc::new(AppState {
            network: NetworkApiService::new(
                BaseService::offline(),
                None,
                network,
                static_nodes,
                config.node_version.clone(),
            ),
            block: None,
            account: None,
            construction,
            mempool: MempoolApiService,
        }));
    }

    let db = DbClient::connect(&config.db);
    let block_repo = Arc::new(PgBlockRepository::new(db.clone(), system.treasury_account));
    let transaction_repo = Arc::new(PgTransactionRepository::new(
        db.clone(),
        system.staking_reward_account,
    ));
    let account_repo = Arc::new(PgAccountRepository::new(db.clone(), system.treasury_account));
    let address_book_repo = Arc::new(PgAddressBookRepository::new(
        db,
        system.address_book_101,
        system.address_book_102,
    ));

    let base = BaseService::online(block_repo, transaction_repo);
    let construction = ConstructionApiService::new(
        true,
        config.shard,
        config.realm,
        node_account_ids,
        Some(account_repo.clone()),
    )
    .map_err(|err| anyhow::anyhow!("Failed to build construction service: {err}"))?;

    Ok(Arc::new(AppState {
        network: NetworkApiService::new(
            base.clone(),
            Some(address_book_repo),
            network,
            static_nodes,
            config.node_version.clone(),
        ),
        block: Some(BlockApiService::new(
            base.clone(),
            account_repo.clone(),
            config.cache.entity.max_size,
            config.response.max_transactions_in_block,
        )),
        account: Some(AccountApiService::new(base, account_repo)),
        construction,
        mempool: MempoolApiService,
    }))
}

fn parse_static_nodes(config: &RosettaConfig) -> Result<Vec<(String, EntityId)>> {
    config
        .nodes
        .iter()
        .map(|(endpoint, account)| {
            let account: EntityId = account
                .parse()
                .map_err(|err| anyhow::anyhow!("Bad node account id '{account}': {err}"))?;
            Ok((endpoint.clone(), account))
        })
        .collect()
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for ctrl-c: {err}");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => error!("Failed to install SIGTERM handler: {err}"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, draining in-flight requests");
}
