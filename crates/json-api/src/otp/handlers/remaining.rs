//! Remaining Time Handler

use std::sync::Arc;

use salvo::{
    oapi::{ToSchema, extract::QueryParam},
    prelude::*,
};
use serde::{Deserialize, Serialize};

use crate::{errors::ApiError, extensions::*, otp::errors::into_api_error, state::State};

/// Remaining Time Response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RemainingTimeResponse {
    /// Whole seconds before the active code expires, zero without one
    pub remaining_seconds: u64,
}

/// Remaining Time Handler
#[endpoint(tags("otp"), summary = "Time left on the active code")]
pub(crate) async fn handler(
    identifier: QueryParam<String, true>,
    depot: &mut Depot,
) -> Result<Json<RemainingTimeResponse>, ApiError> {
    let state = depot.obtain_or_500::<Arc<State>>()?;

    let remaining = state
        .app
        .otp
        .remaining_time(&identifier.into_inner())
        .await
        .map_err(into_api_error)?;

    Ok(Json(RemainingTimeResponse {
        remaining_seconds: remaining.as_secs(),
    }))
}
