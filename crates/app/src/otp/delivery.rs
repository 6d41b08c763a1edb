//! Out-of-band code delivery.

use std::{
    io::{self, Write},
    sync::Mutex,
};

use async_trait::async_trait;
use mockall::automock;
use reqwest::Client;
use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::otp::{DeliveryError, Identifier, OtpCode};

/// Sends a code to its owner over SMS, email or similar.
///
/// Retries and backoff belong to the implementation.
#[automock]
#[async_trait]
pub trait OtpDelivery: Send + Sync {
    async fn deliver(&self, identifier: &Identifier, code: &OtpCode) -> Result<(), DeliveryError>;
}

/// Configuration for [`WebhookDelivery`].
#[derive(Clone)]
pub struct WebhookConfig {
    /// Endpoint receiving `POST {"identifier": ..., "code": ...}`.
    pub url: String,

    /// Optional bearer token sent in the `Authorization` header.
    pub token: Option<String>,
}

impl std::fmt::Debug for WebhookConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookConfig")
            .field("url", &self.url)
            .field("token", &self.token.as_ref().map(|_token| "**redacted**"))
            .finish()
    }
}

/// Hands codes to an HTTP messaging gateway.
#[derive(Debug, Clone)]
pub struct WebhookDelivery {
    config: WebhookConfig,
    http: Client,
}

impl WebhookDelivery {
    #[must_use]
    pub fn new(config: WebhookConfig) -> Self {
        Self {
            config,
            http: Client::new(),
        }
    }
}

#[derive(Serialize)]
struct DeliveryRequest<'a> {
    identifier: &'a str,
    code: &'a str,
}

#[async_trait]
impl OtpDelivery for WebhookDelivery {
    async fn deliver(&self, identifier: &Identifier, code: &OtpCode) -> Result<(), DeliveryError> {
        let mut request = self.http.post(&self.config.url).json(&DeliveryRequest {
            identifier: identifier.as_str(),
            code: code.expose(),
        });

        if let Some(token) = &self.config.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();

            return Err(DeliveryError::Rejected(format!(
                "delivery gateway responded with status {status}"
            )));
        }

        Ok(())
    }
}

/// Prints codes to standard error instead of sending them.
///
/// INSECURE: anyone who can read the server's output can sign in as any
/// user. Only for development without a messaging gateway. Output bypasses
/// `tracing`, so codes never reach log collectors.
pub struct ConsoleDelivery {
    out: Mutex<Box<dyn Write + Send>>,
}

impl std::fmt::Debug for ConsoleDelivery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsoleDelivery").finish_non_exhaustive()
    }
}

impl ConsoleDelivery {
    /// Write to the process's standard error.
    #[must_use]
    pub fn stderr() -> Self {
        Self::new(io::stderr())
    }

    #[must_use]
    pub fn new(out: impl Write + Send + 'static) -> Self {
        Self {
            out: Mutex::new(Box::new(out)),
        }
    }
}

#[async_trait]
impl OtpDelivery for ConsoleDelivery {
    async fn deliver(&self, identifier: &Identifier, code: &OtpCode) -> Result<(), DeliveryError> {
        let mut out = self
            .out
            .lock()
            .map_err(|_poisoned| DeliveryError::Rejected("console lock poisoned".to_string()))?;

        writeln!(
            out,
            "[INSECURE DEVELOPMENT OTP DELIVERY] code for {identifier}: {}",
            code.expose()
        )?;
        out.flush()?;

        Ok(())
    }
}

/// Keeps the last code per identifier in memory instead of sending it.
///
/// A test double. Codes are never logged.
#[derive(Debug, Default)]
pub struct RecordingDelivery {
    sent: Mutex<FxHashMap<Identifier, OtpCode>>,
}

impl RecordingDelivery {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Last code handed over for `identifier`.
    #[must_use]
    pub fn last_code(&self, identifier: &Identifier) -> Option<OtpCode> {
        self.sent
            .lock()
            .ok()
            .and_then(|sent| sent.get(identifier).cloned())
    }
}

#[async_trait]
impl OtpDelivery for RecordingDelivery {
    async fn deliver(&self, identifier: &Identifier, code: &OtpCode) -> Result<(), DeliveryError> {
        let mut sent = self
            .sent
            .lock()
            .map_err(|_poisoned| DeliveryError::Rejected("recorder lock poisoned".to_string()))?;

        sent.insert(identifier.clone(), code.clone());

        Ok(())
    }
}
