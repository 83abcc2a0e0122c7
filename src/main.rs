use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use clap::Parser;
use log::{info, warn};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use std::time::Duration;

mod api;
mod blockchain;
mod config;

use api::LedgerService;
use blockchain::{Address, Blockchain, Wallet};
use config::NodeConfig;

// Resolve the reward address, generating a miner wallet when none is configured
fn reward_address(config: &NodeConfig) -> anyhow::Result<Address> {
    if let Some(address) = &config.miner_address {
        let address = Address::from(address.as_str());
        if !address.has_valid_checksum() {
            warn!("Miner address {} does not carry a valid checksum", address);
        }
        return Ok(address);
    }

    let wallet = Wallet::new()?;
    info!("Miner private key {}", wallet.private_key_hex());
    info!("Miner public key {}", wallet.public_key_hex());
    info!("Miner address {}", wallet.address());

    Ok(wallet.address().clone())
}

// Seal a block every `interval`, on the same worker path as POST /mine
fn spawn_background_miner(service: LedgerService, interval: Duration) {
    actix_web::rt::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // the first tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match service.mine().await {
                Ok(block) => info!("Background miner sealed block {}", block.hash()),
                Err(err) => warn!("Background mining failed: {}", err),
            }
        }
    });
}

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::create_wallet,
        api::handlers::sign_transaction,
        api::handlers::send_transaction,
        api::handlers::get_chain,
        api::handlers::get_pending_transactions,
        api::handlers::submit_transaction,
        api::handlers::mine_block,
        api::handlers::get_amount
    ),
    components(
        schemas(
            blockchain::Block,
            blockchain::Transaction,
            blockchain::Address,
            api::schema::StatusResponse,
            api::schema::WalletResponse,
            api::schema::WalletTransactionRequest,
            api::schema::ChainTransactionRequest,
            api::schema::SignatureResponse,
            api::schema::ChainResponse,
            api::schema::MineResponse,
            api::schema::AmountResponse
        )
    ),
    tags(
        (name = "ledger", description = "Wallet and ledger API endpoints")
    ),
    info(
        title = "Ledger API",
        version = "0.1.0",
        description = "A single-node proof-of-work ledger",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    )
)]
struct ApiDoc;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = NodeConfig::parse();

    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let blockchain = Blockchain::with_config(reward_address(&config)?, config.ledger_config());
    info!(
        "Ledger ready: difficulty={} reward={} reward_address={} balance_policy={:?}",
        blockchain.config().difficulty,
        blockchain.config().mining_reward,
        blockchain.reward_address(),
        blockchain.config().balance_policy
    );

    let service = LedgerService::new(blockchain)
        .with_mining_timeout(config.mining_timeout())
        .with_sender_policy(config.sender_policy());
    info!("Sender policy: {:?}", service.sender_policy());

    if let Some(interval) = config.mining_interval() {
        info!("Background mining every {:?}", interval);
        spawn_background_miner(service.clone(), interval);
    }

    let service = web::Data::new(service);

    info!("Starting HTTP server at http://{}:{}", config.host, config.port);

    // Start HTTP server
    HttpServer::new(move || {
        // Configure CORS
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        // Configure OpenAPI documentation
        let openapi = ApiDoc::openapi();

        App::new()
            .wrap(middleware::Logger::default())
            .wrap(cors)
            .app_data(service.clone())
            // API routes
            .configure(api::configure_routes)
            // Swagger UI
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-docs/openapi.json", openapi.clone())
            )
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await?;

    Ok(())
}
