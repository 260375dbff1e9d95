mod page;
mod routes;
mod server;
mod state;
mod static_files;

pub use server::{router, GatewayServer};
pub use state::AppState;
