mod config;
mod jwt;
mod token;

pub use config::*;
pub use jwt::*;
pub use token::*;
