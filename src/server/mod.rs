pub mod config;
mod http_layers;
pub mod metrics;
mod serve_file;
pub mod server;
pub mod state;

pub use config::ServerConfig;
pub use http_layers::*;
pub use serve_file::ByteRange;
pub use server::{make_app, run_server};
