//! Current Session Handler

use salvo::prelude::*;

use crate::{errors::ApiError, extensions::*, otp::handlers::verify::UserResponse};

/// Current Session Handler
///
/// Returns the user behind the bearer token.
#[endpoint(
    tags("auth"),
    summary = "Current session user",
    security(("bearer_auth" = [])),
)]
pub(crate) async fn handler(depot: &mut Depot) -> Result<Json<UserResponse>, ApiError> {
    let identity = depot.identity_or_401()?;

    Ok(Json(identity.user().clone().into()))
}
