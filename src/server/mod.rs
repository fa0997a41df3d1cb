mod admin;
pub mod dto;
mod guard;
pub mod response;
mod router;
mod session;
mod user;

pub use guard::CreatedResource;
pub use router::{AppState, create_router};
