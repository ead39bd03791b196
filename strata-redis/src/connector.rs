//! Shared, lazily established Redis connection.

use std::time::Duration;

use redis::Client;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use tokio::sync::OnceCell;

use crate::error::Error;

/// Lazily connected handle to a single Redis node, shared by the store,
/// the lock provider and the publisher.
///
/// The multiplexed connection is established on first use and reused
/// afterwards; the pub/sub subscriber opens its own dedicated connection
/// from the same client settings.
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
/// use strata_redis::RedisConnector;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let connector = RedisConnector::builder()
///     .url("redis://localhost:6379/0")
///     .username("cache_user")
///     .password("secret")
///     .connection_timeout(Duration::from_secs(5))
///     .response_timeout(Duration::from_secs(2))
///     .retries(3)
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct RedisConnector {
    client: Client,
    connection_timeout: Option<Duration>,
    response_timeout: Option<Duration>,
    number_of_retries: Option<usize>,

    /// Established on first cache operation.
    connection: OnceCell<ConnectionManager>,
}

impl RedisConnector {
    /// Creates a new builder.
    #[must_use]
    pub fn builder() -> RedisConnectorBuilder {
        RedisConnectorBuilder::default()
    }

    /// Gets or initializes the multiplexed connection.
    ///
    /// Established only once even under concurrent first use; subsequent
    /// calls return a cheap clone of the cached manager.
    pub(crate) async fn manager(&self) -> Result<ConnectionManager, Error> {
        self.connection
            .get_or_try_init(|| async {
                let mut config = ConnectionManagerConfig::new();
                if let Some(timeout) = self.connection_timeout {
                    config = config.set_connection_timeout(timeout);
                }
                if let Some(timeout) = self.response_timeout {
                    config = config.set_response_timeout(timeout);
                }
                if let Some(retries) = self.number_of_retries {
                    config = config.set_number_of_retries(retries);
                }
                let manager =
                    ConnectionManager::new_with_config(self.client.clone(), config).await?;
                Ok(manager)
            })
            .await
            .cloned()
    }

    /// The underlying client, for connections the manager cannot serve
    /// (pub/sub).
    pub(crate) fn client(&self) -> &Client {
        &self.client
    }
}

/// Builder for [`RedisConnector`].
#[derive(Default)]
pub struct RedisConnectorBuilder {
    url: Option<String>,
    username: Option<String>,
    password: Option<String>,
    connection_timeout: Option<Duration>,
    response_timeout: Option<Duration>,
    number_of_retries: Option<usize>,
}

impl RedisConnectorBuilder {
    /// Sets the Redis connection URL in format
    /// `redis://[:<password>@]<host>[:<port>][/<database>]`. Required.
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Sets the username for Redis 6+ ACL authentication.
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Sets the password for authentication.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Sets the timeout for establishing a connection.
    ///
    /// Default: no timeout (waits indefinitely).
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = Some(timeout);
        self
    }

    /// Sets the timeout for waiting on Redis responses.
    ///
    /// Default: no timeout (waits indefinitely).
    pub fn response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = Some(timeout);
        self
    }

    /// Sets the maximum number of reconnection attempts.
    ///
    /// Default: the redis-rs default.
    pub fn retries(mut self, count: usize) -> Self {
        self.number_of_retries = Some(count);
        self
    }

    /// Builds the connector.
    ///
    /// This is synchronous; the actual connection is established lazily on
    /// first use.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingUrl`] if no URL was set, or a client error
    /// for an unparseable URL.
    pub fn build(self) -> Result<RedisConnector, Error> {
        let url = self.url.ok_or(Error::MissingUrl)?;
        let mut info: redis::ConnectionInfo = url.as_str().parse()?;
        if let Some(username) = self.username {
            info.redis.username = Some(username);
        }
        if let Some(password) = self.password {
            info.redis.password = Some(password);
        }
        let client = Client::open(info)?;

        Ok(RedisConnector {
            client,
            connection_timeout: self.connection_timeout,
            response_timeout: self.response_timeout,
            number_of_retries: self.number_of_retries,
            connection: OnceCell::new(),
        })
    }
}
