//! Resend Status Handler

use std::sync::Arc;

use salvo::{
    oapi::{ToSchema, extract::QueryParam},
    prelude::*,
};
use serde::{Deserialize, Serialize};

use crate::{
    errors::{ApiError, whole_seconds_up},
    extensions::*,
    otp::errors::into_api_error,
    state::State,
};

/// Resend Status Response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ResendStatusResponse {
    /// Whether a new code may be requested now
    pub allowed: bool,

    /// Whole seconds until a new code may be requested
    pub wait_time_seconds: u64,
}

/// Resend Status Handler
///
/// Gates a "resend code" action without consuming a request.
#[endpoint(tags("otp"), summary = "Check whether a new code may be requested")]
pub(crate) async fn handler(
    identifier: QueryParam<String, true>,
    depot: &mut Depot,
) -> Result<Json<ResendStatusResponse>, ApiError> {
    let state = depot.obtain_or_500::<Arc<State>>()?;

    let status = state
        .app
        .otp
        .can_resend(&identifier.into_inner())
        .await
        .map_err(into_api_error)?;

    Ok(Json(ResendStatusResponse {
        allowed: status.allowed,
        wait_time_seconds: whole_seconds_up(status.wait),
    }))
}
