//! Auth middleware.

use std::sync::Arc;

use salvo::{http::header::AUTHORIZATION, prelude::*};
use tracing::debug;

use crate::{errors::ApiError, extensions::*, state::State};

/// Admit requests carrying a valid session token.
///
/// The verified identity is injected into the depot. Failures get a bare
/// `401` without saying what was wrong with the token.
#[salvo::handler]
pub(crate) async fn handler(
    req: &mut Request,
    depot: &mut Depot,
    res: &mut Response,
    ctrl: &mut FlowCtrl,
) {
    let Some(token) = extract_bearer_token(req) else {
        res.render(ApiError::unauthorized());
        ctrl.skip_rest();

        return;
    };

    let Ok(state) = depot.obtain::<Arc<State>>() else {
        res.render(ApiError::internal());
        ctrl.skip_rest();

        return;
    };

    let Some(identity) = state.app.sessions.verify(token, state.app.clock.now()) else {
        debug!("rejected session token");

        res.render(ApiError::unauthorized());
        ctrl.skip_rest();

        return;
    };

    depot.insert_identity(identity);

    ctrl.call_next(req, depot, res).await;
}

fn extract_bearer_token(req: &Request) -> Option<&str> {
    let value = req.headers().get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();

    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return None;
    }

    Some(token)
}
