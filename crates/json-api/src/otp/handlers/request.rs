//! Request OTP Handler

use std::sync::Arc;

use salvo::{
    oapi::{ToSchema, extract::JsonBody},
    prelude::*,
};
use serde::{Deserialize, Serialize};

use crate::{
    errors::{ApiError, ErrorBody},
    extensions::*,
    otp::errors::into_api_error,
    state::State,
};

/// Request OTP Request
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct RequestOtpRequest {
    /// Email address or phone number the code is sent to
    pub identifier: String,
}

/// OTP Challenge Response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub(crate) struct OtpChallengeResponse {
    /// Seconds until the delivered code expires
    pub expires_in_seconds: u64,
}

/// Request OTP Handler
///
/// Generates a code and hands it to the delivery channel. The code itself is
/// never part of the response.
#[endpoint(
    tags("otp"),
    summary = "Request a one-time passcode",
    responses(
        (status_code = StatusCode::ACCEPTED, description = "Code sent"),
        (status_code = StatusCode::TOO_MANY_REQUESTS, description = "Too many codes requested", body = ErrorBody),
    ),
)]
pub(crate) async fn handler(
    json: JsonBody<RequestOtpRequest>,
    depot: &mut Depot,
    res: &mut Response,
) -> Result<Json<OtpChallengeResponse>, ApiError> {
    let state = depot.obtain_or_500::<Arc<State>>()?;

    let challenge = state
        .app
        .otp
        .generate(&json.into_inner().identifier)
        .await
        .map_err(into_api_error)?;

    res.status_code(StatusCode::ACCEPTED);

    Ok(Json(OtpChallengeResponse {
        expires_in_seconds: challenge.expires_in.as_secs(),
    }))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use salvo::test::{ResponseExt, TestClient};
    use serde_json::json;
    use testresult::TestResult;

    use tally_app::otp::{
        DeliveryError, MockOtpService, OtpChallenge, OtpError, OtpServiceError,
    };

    use crate::{errors::ErrorBody, test_helpers::otp_only_service};

    use super::*;

    fn make_service(otp: MockOtpService) -> Service {
        otp_only_service(otp, Router::with_path("auth/otp").post(handler))
    }

    #[tokio::test]
    async fn test_request_otp_returns_202_without_code() -> TestResult {
        let mut otp = MockOtpService::new();

        otp.expect_generate()
            .once()
            .withf(|identifier| identifier == "x@y.com")
            .return_once(|_| {
                Ok(OtpChallenge {
                    expires_in: Duration::from_secs(600),
                })
            });

        let mut res = TestClient::post("http://example.com/auth/otp")
            .json(&json!({ "identifier": "x@y.com" }))
            .send(&make_service(otp))
            .await;

        assert_eq!(res.status_code, Some(StatusCode::ACCEPTED));

        let body: serde_json::Value = res.take_json().await?;

        assert_eq!(body, json!({ "expiresInSeconds": 600 }));

        Ok(())
    }

    #[tokio::test]
    async fn test_request_otp_rate_limited_returns_429() -> TestResult {
        let mut otp = MockOtpService::new();

        otp.expect_generate().once().return_once(|_| {
            Err(OtpError::RateLimitExceeded {
                wait: Duration::from_millis(27_500),
            }
            .into())
        });

        let mut res = TestClient::post("http://example.com/auth/otp")
            .json(&json!({ "identifier": "x@y.com" }))
            .send(&make_service(otp))
            .await;

        assert_eq!(res.status_code, Some(StatusCode::TOO_MANY_REQUESTS));

        let body: ErrorBody = res.take_json().await?;

        assert_eq!(body.error, "rate_limit_exceeded");
        assert_eq!(body.wait_time_seconds, Some(28));

        Ok(())
    }

    #[tokio::test]
    async fn test_request_otp_delivery_failure_returns_500() -> TestResult {
        let mut otp = MockOtpService::new();

        otp.expect_generate().once().return_once(|_| {
            Err(OtpServiceError::Delivery(DeliveryError::Rejected(
                "gateway down".to_string(),
            )))
        });

        let mut res = TestClient::post("http://example.com/auth/otp")
            .json(&json!({ "identifier": "x@y.com" }))
            .send(&make_service(otp))
            .await;

        assert_eq!(res.status_code, Some(StatusCode::INTERNAL_SERVER_ERROR));

        let body = res.take_string().await?;

        assert!(!body.contains("gateway down"), "details stay in the logs");

        Ok(())
    }

    #[tokio::test]
    async fn test_request_otp_empty_identifier_returns_400() -> TestResult {
        let mut otp = MockOtpService::new();

        otp.expect_generate()
            .once()
            .return_once(|_| Err(OtpServiceError::InvalidIdentifier));

        let res = TestClient::post("http://example.com/auth/otp")
            .json(&json!({ "identifier": "  " }))
            .send(&make_service(otp))
            .await;

        assert_eq!(res.status_code, Some(StatusCode::BAD_REQUEST));

        Ok(())
    }
}
