use actix_web::{web, HttpResponse, Responder};
use log::warn;

use super::schema::{
    AmountQuery, AmountResponse, ChainResponse, ChainTransactionRequest, MineResponse, SignatureResponse,
    StatusResponse, WalletResponse, WalletTransactionRequest,
};
use super::service::LedgerService;
use crate::blockchain::Transaction;

/// Shared ledger service
pub type ServiceData = web::Data<LedgerService>;

/// Create a new wallet
///
/// Generates a P-256 keypair and derives its address.
/// The private key must be stored by the caller.
#[utoipa::path(
    post,
    path = "/wallet",
    responses(
        (status = 201, description = "Wallet created successfully", body = WalletResponse),
        (status = 500, description = "Random source unavailable", body = StatusResponse)
    )
)]
pub async fn create_wallet(service: ServiceData) -> impl Responder {
    match service.create_wallet() {
        Ok(wallet) => HttpResponse::Created().json(wallet),
        Err(err) => {
            warn!("Error: failed to create wallet: {}", err);
            HttpResponse::InternalServerError().json(StatusResponse::fail())
        }
    }
}

/// Sign a transaction
///
/// Builds a transfer from the sender's keys and returns its signature
#[utoipa::path(
    post,
    path = "/wallet/sign",
    request_body = WalletTransactionRequest,
    responses(
        (status = 200, description = "Transaction signed", body = SignatureResponse),
        (status = 400, description = "Missing or malformed fields", body = StatusResponse)
    )
)]
pub async fn sign_transaction(
    service: ServiceData,
    request: web::Json<WalletTransactionRequest>,
) -> impl Responder {
    match service.build_and_sign_transaction(&request) {
        Ok(ChainTransactionRequest {
            signature: Some(signature),
            ..
        }) => HttpResponse::Ok().json(SignatureResponse { signature }),
        Ok(_) => HttpResponse::InternalServerError().json(StatusResponse::fail()),
        Err(err) => {
            warn!("Error: {}", err);
            HttpResponse::BadRequest().json(StatusResponse::fail())
        }
    }
}

/// Send a transaction from a wallet
///
/// Builds, signs and submits the transfer in one step
#[utoipa::path(
    post,
    path = "/transaction",
    request_body = WalletTransactionRequest,
    responses(
        (status = 201, description = "Transaction queued", body = StatusResponse),
        (status = 400, description = "Transaction rejected", body = StatusResponse)
    )
)]
pub async fn send_transaction(
    service: ServiceData,
    request: web::Json<WalletTransactionRequest>,
) -> impl Responder {
    match service.send_transaction(&request) {
        Ok(()) => HttpResponse::Created().json(StatusResponse::success()),
        Err(err) => {
            warn!("Error: {}", err);
            HttpResponse::BadRequest().json(StatusResponse::fail())
        }
    }
}

/// Get the full blockchain
///
/// Returns the entire blockchain and its validity status
#[utoipa::path(
    get,
    path = "/chain",
    responses(
        (status = 200, description = "Blockchain retrieved successfully", body = ChainResponse)
    )
)]
pub async fn get_chain(service: ServiceData) -> impl Responder {
    let chain = service.get_chain();

    let response = ChainResponse {
        length: chain.len(),
        chain,
        is_valid: service.is_valid(),
    };

    HttpResponse::Ok().json(response)
}

/// Get all pending transactions
#[utoipa::path(
    get,
    path = "/transactions",
    responses(
        (status = 200, description = "Pending transactions retrieved successfully", body = Vec<Transaction>)
    )
)]
pub async fn get_pending_transactions(service: ServiceData) -> impl Responder {
    let transactions: Vec<Transaction> = service.pending_transactions();
    HttpResponse::Ok().json(transactions)
}

/// Submit a signed transaction
///
/// Verifies the signature and adds the transaction to the pool
#[utoipa::path(
    post,
    path = "/transactions",
    request_body = ChainTransactionRequest,
    responses(
        (status = 201, description = "Transaction queued", body = StatusResponse),
        (status = 400, description = "Transaction rejected", body = StatusResponse)
    )
)]
pub async fn submit_transaction(
    service: ServiceData,
    request: web::Json<ChainTransactionRequest>,
) -> impl Responder {
    match service.submit_transaction(&request) {
        Ok(()) => HttpResponse::Created().json(StatusResponse::success()),
        Err(err) => {
            warn!("Error: {}", err);
            HttpResponse::BadRequest().json(StatusResponse::fail())
        }
    }
}

/// Mine a new block
///
/// Seals all pending transactions plus the mining reward into a block
#[utoipa::path(
    post,
    path = "/mine",
    responses(
        (status = 200, description = "Block mined successfully", body = MineResponse),
        (status = 500, description = "Mining failed or timed out", body = StatusResponse)
    )
)]
pub async fn mine_block(service: ServiceData) -> impl Responder {
    match service.mine().await {
        Ok(block) => HttpResponse::Ok().json(MineResponse {
            message: StatusResponse::success().message,
            block,
        }),
        Err(err) => {
            warn!("Error: {}", err);
            HttpResponse::InternalServerError().json(StatusResponse::fail())
        }
    }
}

/// Get the balance of an address
#[utoipa::path(
    get,
    path = "/amount",
    params(
        ("blockchainAddress" = String, Query, description = "Address to total")
    ),
    responses(
        (status = 200, description = "Balance computed", body = AmountResponse)
    )
)]
pub async fn get_amount(service: ServiceData, query: web::Query<AmountQuery>) -> impl Responder {
    let amount = service.compute_balance(&query.blockchain_address);
    HttpResponse::Ok().json(AmountResponse { amount })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::configure_routes;
    use crate::blockchain::{Address, Blockchain, LedgerConfig};
    use actix_web::{http::StatusCode, test, App};

    fn service_data() -> ServiceData {
        let blockchain = Blockchain::with_config(
            Address::from("miner"),
            LedgerConfig {
                difficulty: 2,
                ..LedgerConfig::default()
            },
        );
        web::Data::new(LedgerService::new(blockchain))
    }

    #[actix_web::test]
    async fn test_full_flow_over_http() {
        let data = service_data();
        let app = test::init_service(App::new().app_data(data.clone()).configure(configure_routes)).await;

        let req = test::TestRequest::post().uri("/wallet").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let a: WalletResponse = test::read_body_json(resp).await;

        let req = test::TestRequest::post().uri("/wallet").to_request();
        let b: WalletResponse = test::call_and_read_body_json(&app, req).await;

        let request = WalletTransactionRequest {
            sender_private_key: Some(a.private_key.clone()),
            sender_blockchain_address: Some(a.blockchain_address.clone()),
            recipient_blockchain_address: Some(b.blockchain_address.clone()),
            sender_public_key: Some(a.public_key.clone()),
            value: Some("1.0".to_string()),
        };

        let req = test::TestRequest::post().uri("/wallet/sign").set_json(&request).to_request();
        let signature: SignatureResponse = test::call_and_read_body_json(&app, req).await;

        let submission = ChainTransactionRequest {
            sender_blockchain_address: Some(a.blockchain_address.clone()),
            recipient_blockchain_address: Some(b.blockchain_address.clone()),
            sender_public_key: Some(a.public_key.clone()),
            value: Some(1.0),
            signature: Some(signature.signature),
        };
        let req = test::TestRequest::post().uri("/transactions").set_json(&submission).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);

        let req = test::TestRequest::get().uri("/transactions").to_request();
        let pending: Vec<Transaction> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(pending.len(), 1);

        let req = test::TestRequest::post().uri("/mine").to_request();
        let mined: MineResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(mined.message, "success");
        assert_eq!(mined.block.transactions().len(), 2);

        let req = test::TestRequest::get()
            .uri(&format!("/amount?blockchainAddress={}", b.blockchain_address))
            .to_request();
        let amount: AmountResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(amount.amount, 1.0);

        let req = test::TestRequest::get().uri("/chain").to_request();
        let chain: ChainResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(chain.length, 2);
        assert!(chain.is_valid);
    }

    #[actix_web::test]
    async fn test_rejections_are_coarse() {
        let data = service_data();
        let app = test::init_service(App::new().app_data(data.clone()).configure(configure_routes)).await;

        // missing fields
        let req = test::TestRequest::post()
            .uri("/transactions")
            .set_json(serde_json::json!({ "value": 1.0 }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: StatusResponse = test::read_body_json(resp).await;
        assert_eq!(body, StatusResponse::fail());

        // not JSON at all
        let req = test::TestRequest::post()
            .uri("/transaction")
            .insert_header(("content-type", "application/json"))
            .set_payload("{not json")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: StatusResponse = test::read_body_json(resp).await;
        assert_eq!(body, StatusResponse::fail());

        assert!(data.pending_transactions().is_empty());
    }

    #[actix_web::test]
    async fn test_chain_json_shape() {
        let data = service_data();
        let app = test::init_service(App::new().app_data(data.clone()).configure(configure_routes)).await;

        let req = test::TestRequest::get().uri("/chain").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;

        let genesis = &body["chain"][0];
        assert_eq!(body["length"], 1);
        assert_eq!(body["isValid"], true);
        assert_eq!(genesis["nonce"], 0);
        assert_eq!(genesis["previousHash"].as_str().unwrap().len(), 64);
        assert!(genesis["transactions"].as_array().unwrap().is_empty());
    }
}
