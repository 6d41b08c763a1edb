//! Depot helper extensions.

use std::any::Any;

use salvo::prelude::{Depot, StatusError};
use tally_app::auth::VerifiedIdentity;

/// Helpers for mapping depot extraction failures to HTTP errors.
pub(crate) trait DepotExt {
    fn obtain_or_500<T: Any + Send + Sync>(&self) -> Result<&T, StatusError>;

    fn insert_identity(&mut self, identity: VerifiedIdentity);

    fn identity_or_401(&self) -> Result<&VerifiedIdentity, StatusError>;
}

impl DepotExt for Depot {
    fn obtain_or_500<T: Any + Send + Sync>(&self) -> Result<&T, StatusError> {
        self.obtain::<T>()
            .map_err(|_ignored| StatusError::internal_server_error())
    }

    fn insert_identity(&mut self, identity: VerifiedIdentity) {
        self.inject(identity);
    }

    fn identity_or_401(&self) -> Result<&VerifiedIdentity, StatusError> {
        self.obtain::<VerifiedIdentity>()
            .map_err(|_missing| StatusError::unauthorized())
    }
}
