//! Shared Redis container for store tests

use once_cell::sync::Lazy;
use redis::aio::ConnectionManager;
use testcontainers::{ContainerAsync, TestcontainersError, runners::AsyncRunner};
use testcontainers_modules::redis::{REDIS_PORT, Redis};
use thiserror::Error;
use tokio::sync::OnceCell;

use crate::otp::{StoreError, redis::connect};

#[derive(Debug, Error)]
pub(crate) enum TestRedisError {
    #[error("failed to start redis container")]
    Container(#[from] TestcontainersError),

    #[error("failed to connect to redis container")]
    Connect(#[from] StoreError),
}

/// Container handle plus the URL tests connect with.
///
/// The handle is never dropped, so the container outlives every test runtime.
struct SharedRedis {
    _container: ContainerAsync<Redis>,
    url: String,
}

/// Shared Redis container that starts once and is reused across all tests
static REDIS_CONTAINER: Lazy<OnceCell<SharedRedis>> = Lazy::new(OnceCell::new);

async fn init_redis_container() -> Result<SharedRedis, TestcontainersError> {
    let container = Redis::default().start().await?;

    let host = container.get_host().await?;
    let port = container.get_host_port_ipv4(REDIS_PORT).await?;

    Ok(SharedRedis {
        _container: container,
        url: format!("redis://{host}:{port}"),
    })
}

/// Fresh connection to the shared container.
///
/// Connections belong to the calling test's runtime, so each test opens its
/// own. Tests isolate their data with unique key prefixes.
pub(crate) async fn redis_connection() -> Result<ConnectionManager, TestRedisError> {
    let shared = REDIS_CONTAINER
        .get_or_try_init(init_redis_container)
        .await?;

    Ok(connect(&shared.url).await?)
}
