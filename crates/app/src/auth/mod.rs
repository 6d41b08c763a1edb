//! Session authentication

mod config;
mod errors;
mod models;
mod service;
pub mod signature;
mod token;

pub use config::*;
pub use errors::*;
pub use models::*;
pub use service::*;
pub use signature::{SignatureEngine, SigningKey};
pub use token::SEGMENT_SEPARATOR;
