//! App Router

use salvo::Router;

use crate::{auth, healthcheck, otp};

pub(crate) fn app_router() -> Router {
    Router::new()
        .push(Router::with_path("healthcheck").get(healthcheck::handler))
        .push(
            Router::with_path("auth")
                .push(
                    Router::with_path("otp")
                        .post(otp::handlers::request::handler)
                        .push(Router::with_path("verify").post(otp::handlers::verify::handler))
                        .push(Router::with_path("resend").get(otp::handlers::resend::handler))
                        .push(
                            Router::with_path("remaining").get(otp::handlers::remaining::handler),
                        ),
                )
                .push(
                    Router::with_path("session")
                        .hoop(auth::middleware::handler)
                        .get(auth::session::handler),
                ),
        )
}
