//! Test helpers.

use std::{sync::Arc, time::Duration};

use jiff::Timestamp;
use salvo::{affix_state::inject, prelude::*};

use tally_app::{
    auth::{Role, SessionTokenService, SessionUser, SigningKey},
    clock::{Clock, ManualClock},
    context::AppContext,
    identity::MockIdentityStore,
    otp::MockOtpService,
};

use crate::state::State;

pub(crate) const TEST_SECRET: &[u8] = b"tally-json-test-secret-0123456789abcdef";

/// 2026-05-01T09:00:00Z
pub(crate) const TEST_NOW: Timestamp = Timestamp::constant(1_777_626_000, 0);

pub(crate) const TEST_SESSION_TTL: Duration = Duration::from_secs(3_600);

pub(crate) fn test_user() -> SessionUser {
    SessionUser {
        id: "user-1".to_string(),
        email: "x@y.com".to_string(),
        name: "Ada".to_string(),
        role: Role::Voter,
        avatar: None,
    }
}

pub(crate) fn test_sessions() -> SessionTokenService {
    SessionTokenService::new(SigningKey::from_bytes(TEST_SECRET.to_vec()))
}

pub(crate) fn test_clock() -> ManualClock {
    ManualClock::new(TEST_NOW)
}

fn strict_otp_mock() -> MockOtpService {
    let mut otp = MockOtpService::new();

    otp.expect_generate().never();
    otp.expect_verify().never();
    otp.expect_can_resend().never();
    otp.expect_remaining_time().never();
    otp.expect_clear().never();

    otp
}

fn strict_identity_mock() -> MockIdentityStore {
    let mut identities = MockIdentityStore::new();

    identities.expect_find_by_identifier().never();

    identities
}

pub(crate) fn state_with(
    otp: MockOtpService,
    identities: MockIdentityStore,
    clock: ManualClock,
) -> Arc<State> {
    let clock: Arc<dyn Clock> = Arc::new(clock);

    State::from_app_context(AppContext {
        sessions: test_sessions(),
        session_ttl: TEST_SESSION_TTL,
        otp: Arc::new(otp),
        identities: Arc::new(identities),
        clock,
    })
}

pub(crate) fn state_with_otp(otp: MockOtpService) -> Arc<State> {
    state_with(otp, strict_identity_mock(), test_clock())
}

pub(crate) fn state_with_clock(clock: ManualClock) -> Arc<State> {
    state_with(strict_otp_mock(), strict_identity_mock(), clock)
}

pub(crate) fn otp_service(
    otp: MockOtpService,
    identities: MockIdentityStore,
    route: Router,
) -> Service {
    Service::new(
        Router::new()
            .hoop(inject(state_with(otp, identities, test_clock())))
            .push(route),
    )
}

pub(crate) fn otp_only_service(otp: MockOtpService, route: Router) -> Service {
    Service::new(
        Router::new()
            .hoop(inject(state_with_otp(otp)))
            .push(route),
    )
}
