use actix_web::{error, web, HttpResponse};
use log::warn;

use super::handlers;
use super::schema::StatusResponse;

/// Configures the API routes
///
/// # Arguments
///
/// * `cfg` - The service configuration
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    // undecodable bodies get the same coarse answer as any other rejection
    let json_config = web::JsonConfig::default().error_handler(|err, _req| {
        warn!("Error: {}", err);
        error::InternalError::from_response(err, HttpResponse::BadRequest().json(StatusResponse::fail())).into()
    });

    cfg.app_data(json_config)
        // wallet routes
        .route("/wallet", web::post().to(handlers::create_wallet))
        .route("/wallet/sign", web::post().to(handlers::sign_transaction))
        .route("/transaction", web::post().to(handlers::send_transaction))
        // chain routes
        .route("/chain", web::get().to(handlers::get_chain))
        .route("/transactions", web::get().to(handlers::get_pending_transactions))
        .route("/transactions", web::post().to(handlers::submit_transaction))
        .route("/mine", web::post().to(handlers::mine_block))
        .route("/amount", web::get().to(handlers::get_amount));
}
