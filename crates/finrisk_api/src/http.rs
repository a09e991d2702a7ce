mod auth;
mod error;
mod handlers;
mod router;
mod server;

pub use auth::*;
pub use error::*;
pub use router::*;
pub use server::*;
