//! Identity lookup
//!
//! Resolves the user behind a verified OTP identifier so a session token can
//! be issued for them.

use std::{fs, path::Path, sync::Arc};

use async_trait::async_trait;
use mockall::automock;
use rustc_hash::FxHashMap;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::{auth::SessionUser, otp::Identifier};

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("failed to read identity file")]
    Io(#[source] std::io::Error),

    #[error("failed to parse identity file")]
    Parse(#[source] serde_json::Error),

    #[error("identifier {0} is assigned to more than one user")]
    Duplicate(String),

    #[error("user {0} has an empty email address")]
    MissingEmail(String),
}

#[automock]
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// User whose email address or phone number matches `identifier`.
    async fn find_by_identifier(
        &self,
        identifier: &Identifier,
    ) -> Result<Option<SessionUser>, IdentityError>;
}

/// One entry of the identity file.
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityRecord {
    #[serde(flatten)]
    pub user: SessionUser,

    #[serde(default)]
    pub phone: Option<String>,
}

/// [`IdentityStore`] over a fixed user list.
#[derive(Debug, Clone, Default)]
pub struct InMemoryIdentityStore {
    users: Arc<FxHashMap<Identifier, SessionUser>>,
}

impl InMemoryIdentityStore {
    /// Index users by email and, when present, phone number.
    ///
    /// # Errors
    ///
    /// Returns an error if an email is empty or two users share an identifier.
    pub fn new(records: Vec<IdentityRecord>) -> Result<Self, IdentityError> {
        let mut users = FxHashMap::default();

        for record in records {
            let email = Identifier::parse(&record.user.email)
                .map_err(|_invalid| IdentityError::MissingEmail(record.user.id.clone()))?;

            let phone = record
                .phone
                .as_deref()
                .and_then(|phone| Identifier::parse(phone).ok());

            for key in std::iter::once(email).chain(phone) {
                if users.insert(key.clone(), record.user.clone()).is_some() {
                    return Err(IdentityError::Duplicate(key.to_string()));
                }
            }
        }

        debug!(identifiers = users.len(), "identity store loaded");

        Ok(Self {
            users: Arc::new(users),
        })
    }

    /// Load a JSON array of users.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if it fails
    /// [`InMemoryIdentityStore::new`]'s checks.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, IdentityError> {
        let contents = fs::read_to_string(path).map_err(IdentityError::Io)?;
        let records: Vec<IdentityRecord> =
            serde_json::from_str(&contents).map_err(IdentityError::Parse)?;

        Self::new(records)
    }
}

#[async_trait]
impl IdentityStore for InMemoryIdentityStore {
    async fn find_by_identifier(
        &self,
        identifier: &Identifier,
    ) -> Result<Option<SessionUser>, IdentityError> {
        Ok(self.users.get(identifier).cloned())
    }
}
