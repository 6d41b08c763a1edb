//! JSON error responses.

use std::time::Duration;

use salvo::{
    Scribe,
    http::{StatusCode, StatusError},
    oapi::{Components, EndpointOutRegister, Operation, ToSchema},
    prelude::{Json, Response},
};
use serde::{Deserialize, Serialize};

/// Error body returned by every API endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ErrorBody {
    /// Stable machine-readable error code
    pub error: String,

    /// Whole seconds to wait before retrying
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_time_seconds: Option<u64>,
}

/// An HTTP status paired with an [`ErrorBody`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    pub(crate) fn new(status: StatusCode, code: &str) -> Self {
        Self {
            status,
            body: ErrorBody {
                error: code.to_string(),
                wait_time_seconds: None,
            },
        }
    }

    /// Details stay in the logs.
    pub(crate) fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
    }

    pub(crate) fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthorized")
    }

    #[must_use]
    pub(crate) fn with_wait(mut self, wait: Duration) -> Self {
        self.body.wait_time_seconds = Some(whole_seconds_up(wait));
        self
    }

    #[cfg(test)]
    pub(crate) fn status(&self) -> StatusCode {
        self.status
    }

    #[cfg(test)]
    pub(crate) fn body(&self) -> &ErrorBody {
        &self.body
    }
}

/// Round up so clients never retry early.
pub(crate) fn whole_seconds_up(duration: Duration) -> u64 {
    let seconds = duration.as_secs();

    if duration.subsec_nanos() > 0 {
        seconds.saturating_add(1)
    } else {
        seconds
    }
}

impl From<StatusError> for ApiError {
    fn from(error: StatusError) -> Self {
        let code = error.name.to_ascii_lowercase().replace(' ', "_");

        Self::new(error.code, &code)
    }
}

impl Scribe for ApiError {
    fn render(self, res: &mut Response) {
        res.status_code(self.status);
        res.render(Json(self.body));
    }
}

/// Registers the failures every endpoint can produce. Handlers list their
/// domain specific statuses (409, 423, 429) in their own `responses`.
impl EndpointOutRegister for ApiError {
    fn register(components: &mut Components, operation: &mut Operation) {
        for (status, description) in [
            (StatusCode::BAD_REQUEST, "Bad Request"),
            (StatusCode::UNAUTHORIZED, "Unauthorized"),
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error"),
        ] {
            operation.responses.insert(
                status.as_str(),
                salvo::oapi::Response::new(description)
                    .add_content("application/json", ErrorBody::to_schema(components)),
            );
        }
    }
}
