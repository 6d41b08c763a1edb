//! Shared test fixtures

mod containers;

pub(crate) use containers::*;
pub(crate) use context::*;
