//! Verify OTP Handler

use std::sync::Arc;

use salvo::{
    oapi::{ToSchema, extract::JsonBody},
    prelude::*,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use tally_app::{
    auth::SessionUser,
    otp::{Identifier, OtpError},
};

use crate::{
    errors::{ApiError, ErrorBody},
    extensions::*,
    otp::errors::into_api_error,
    state::State,
};

/// Verify OTP Request
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct VerifyOtpRequest {
    /// Identifier the code was sent to
    pub identifier: String,

    /// Six digit code
    pub code: String,
}

/// Session User Response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub(crate) struct UserResponse {
    /// Stable user id
    pub id: String,

    /// Email address
    pub email: String,

    /// Display name
    pub name: String,

    /// Platform role (admin, contestant, media, voter)
    pub role: String,

    /// Avatar URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

impl From<SessionUser> for UserResponse {
    fn from(user: SessionUser) -> Self {
        UserResponse {
            id: user.id,
            email: user.email,
            name: user.name,
            role: user.role.as_str().to_string(),
            avatar: user.avatar,
        }
    }
}

/// Session Created Response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct SessionCreatedResponse {
    /// Signed session token
    pub token: String,

    /// The signed-in user
    pub user: UserResponse,
}

/// Verify OTP Handler
///
/// Exchanges a valid code for a session token.
#[endpoint(
    tags("otp"),
    summary = "Verify a one-time passcode",
    responses(
        (status_code = StatusCode::OK, description = "Code accepted, session issued"),
        (status_code = StatusCode::CONFLICT, description = "Code already used", body = ErrorBody),
        (status_code = StatusCode::LOCKED, description = "Too many incorrect attempts", body = ErrorBody),
    ),
)]
pub(crate) async fn handler(
    json: JsonBody<VerifyOtpRequest>,
    depot: &mut Depot,
) -> Result<Json<SessionCreatedResponse>, ApiError> {
    let state = depot.obtain_or_500::<Arc<State>>()?;
    let request = json.into_inner();

    state
        .app
        .otp
        .verify(&request.identifier, &request.code)
        .await
        .map_err(into_api_error)?;

    let identifier = Identifier::parse(&request.identifier).map_err(into_api_error)?;

    let Some(user) = state
        .app
        .identities
        .find_by_identifier(&identifier)
        .await
        .or_500("failed to resolve identity")?
    else {
        info!(%identifier, "verified otp for unknown identity");

        return Err(into_api_error(OtpError::NotFound.into()));
    };

    let token = state
        .app
        .sessions
        .issue(user.clone(), state.app.session_ttl, state.app.clock.now())
        .or_500("failed to issue session token")?;

    info!(user_id = %user.id, "session issued");

    Ok(Json(SessionCreatedResponse {
        token: token.into_string(),
        user: user.into(),
    }))
}

#[cfg(test)]
mod tests {
    use salvo::test::{ResponseExt, TestClient};
    use serde_json::json;
    use testresult::TestResult;

    use tally_app::{identity::MockIdentityStore, otp::MockOtpService};

    use crate::{
        errors::ErrorBody,
        test_helpers::{TEST_NOW, otp_service, test_sessions, test_user},
    };

    use super::*;

    fn make_service(otp: MockOtpService, identities: MockIdentityStore) -> Service {
        otp_service(
            otp,
            identities,
            Router::with_path("auth/otp/verify").post(handler),
        )
    }

    #[tokio::test]
    async fn test_verify_issues_a_session_token() -> TestResult {
        let mut otp = MockOtpService::new();
        let mut identities = MockIdentityStore::new();

        otp.expect_verify()
            .once()
            .withf(|identifier, code| identifier == "X@y.com" && code == "123456")
            .return_once(|_, _| Ok(()));

        identities
            .expect_find_by_identifier()
            .once()
            .withf(|identifier| identifier.as_str() == "x@y.com")
            .return_once(|_| Ok(Some(test_user())));

        let mut res = TestClient::post("http://example.com/auth/otp/verify")
            .json(&json!({ "identifier": "X@y.com", "code": "123456" }))
            .send(&make_service(otp, identities))
            .await;

        assert_eq!(res.status_code, Some(StatusCode::OK));

        let body: SessionCreatedResponse = res.take_json().await?;

        assert_eq!(body.user, UserResponse::from(test_user()));

        let identity = test_sessions()
            .verify(&body.token, TEST_NOW)
            .ok_or("issued token should verify")?;

        assert_eq!(identity.user(), &test_user());

        Ok(())
    }

    #[tokio::test]
    async fn test_verify_unknown_user_returns_not_found() -> TestResult {
        let mut otp = MockOtpService::new();
        let mut identities = MockIdentityStore::new();

        otp.expect_verify().once().return_once(|_, _| Ok(()));
        identities
            .expect_find_by_identifier()
            .once()
            .return_once(|_| Ok(None));

        let mut res = TestClient::post("http://example.com/auth/otp/verify")
            .json(&json!({ "identifier": "x@y.com", "code": "123456" }))
            .send(&make_service(otp, identities))
            .await;

        assert_eq!(res.status_code, Some(StatusCode::UNAUTHORIZED));

        let body: ErrorBody = res.take_json().await?;

        assert_eq!(body.error, "otp_not_found");

        Ok(())
    }

    #[tokio::test]
    async fn test_verify_failures_never_reach_identity_lookup() -> TestResult {
        for (error, status, code) in [
            (OtpError::Mismatch, StatusCode::UNAUTHORIZED, "otp_mismatch"),
            (OtpError::AlreadyUsed, StatusCode::CONFLICT, "otp_already_used"),
            (
                OtpError::AttemptsExceeded,
                StatusCode::LOCKED,
                "otp_attempts_exceeded",
            ),
            (OtpError::Expired, StatusCode::UNAUTHORIZED, "otp_expired"),
        ] {
            let mut otp = MockOtpService::new();
            let mut identities = MockIdentityStore::new();

            otp.expect_verify()
                .once()
                .return_once(move |_, _| Err(error.into()));
            identities.expect_find_by_identifier().never();

            let mut res = TestClient::post("http://example.com/auth/otp/verify")
                .json(&json!({ "identifier": "x@y.com", "code": "000000" }))
                .send(&make_service(otp, identities))
                .await;

            assert_eq!(res.status_code, Some(status));

            let body: ErrorBody = res.take_json().await?;

            assert_eq!(body.error, code);
        }

        Ok(())
    }
}
