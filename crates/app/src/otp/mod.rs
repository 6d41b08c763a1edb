//! One-time passcodes

mod code;
mod delivery;
mod errors;
mod memory;
mod records;
pub mod redis;
mod service;
mod store;

pub use code::*;
pub use delivery::*;
pub use errors::*;
pub use memory::*;
pub use records::{
    AttemptOutcome, AttemptPolicy, Identifier, OtpPolicy, OtpRecord, RateLimitDecision,
    RateLimitPolicy, RateLimitRecord,
};
pub use service::*;
pub use store::*;

pub(crate) use records::RecordFate;
