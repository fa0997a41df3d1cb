mod auth;
mod server;

pub use auth::{AuthConfig, SessionConfig};
pub use server::ServerConfig;
