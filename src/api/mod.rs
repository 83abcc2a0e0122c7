// API module
//
// HTTP front-end for the ledger: wallet routes (key generation, signing)
// and chain routes (submission, mining, chain and balance queries)

pub mod handlers;
pub mod routes;
pub mod schema;
pub mod service;

// Re-export main components for easier access
pub use routes::configure_routes;
pub use service::LedgerService;
