//! OTP Errors

use salvo::http::StatusCode;
use tracing::error;

use tally_app::otp::{OtpError, OtpServiceError};

use crate::errors::ApiError;

pub(crate) fn into_api_error(error: OtpServiceError) -> ApiError {
    match error {
        OtpServiceError::Otp(error) => otp_error(error),
        OtpServiceError::InvalidIdentifier => {
            ApiError::new(StatusCode::BAD_REQUEST, "invalid_identifier")
        }
        OtpServiceError::Store(source) => {
            error!("otp store failure: {source}");

            ApiError::internal()
        }
        OtpServiceError::Delivery(source) => {
            error!("otp delivery failure: {source}");

            ApiError::internal()
        }
    }
}

fn otp_error(error: OtpError) -> ApiError {
    let status = match error {
        OtpError::NotFound | OtpError::Expired | OtpError::Mismatch => StatusCode::UNAUTHORIZED,
        OtpError::AlreadyUsed => StatusCode::CONFLICT,
        OtpError::AttemptsExceeded => StatusCode::LOCKED,
        OtpError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
    };

    let api_error = ApiError::new(status, error.code());

    match error {
        OtpError::RateLimitExceeded { wait } => api_error.with_wait(wait),
        _ => api_error,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tally_app::otp::StoreError;

    use super::*;

    #[test]
    fn test_owner_facing_errors_keep_their_codes() {
        for (error, status, code) in [
            (OtpError::NotFound, StatusCode::UNAUTHORIZED, "otp_not_found"),
            (OtpError::Expired, StatusCode::UNAUTHORIZED, "otp_expired"),
            (OtpError::Mismatch, StatusCode::UNAUTHORIZED, "otp_mismatch"),
            (OtpError::AlreadyUsed, StatusCode::CONFLICT, "otp_already_used"),
            (
                OtpError::AttemptsExceeded,
                StatusCode::LOCKED,
                "otp_attempts_exceeded",
            ),
        ] {
            let api_error = into_api_error(error.into());

            assert_eq!(api_error.status(), status);
            assert_eq!(api_error.body().error, code);
            assert_eq!(api_error.body().wait_time_seconds, None);
        }
    }

    #[test]
    fn test_rate_limit_carries_wait_time() {
        let api_error = into_api_error(
            OtpError::RateLimitExceeded {
                wait: Duration::from_millis(12_300),
            }
            .into(),
        );

        assert_eq!(api_error.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(api_error.body().error, "rate_limit_exceeded");
        assert_eq!(api_error.body().wait_time_seconds, Some(13));
    }

    #[test]
    fn test_store_failures_are_opaque() {
        let api_error = into_api_error(StoreError::Corrupt("bad hash".to_string()).into());

        assert_eq!(api_error, ApiError::internal());
    }
}
