//! RabbitMQ client: a lazily opened, cached AMQP connection.

pub mod error;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use configuration::RabbitMqConfig;
use core_types::{ContextResult, ErrorContext, WrapErr};
use lapin::options::{BasicPublishOptions, QueueDeclareOptions};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Connection, ConnectionProperties};
use tokio::sync::OnceCell;

// Re-export the core types to provide a clean public API.
pub use error::QueueError;
pub use lapin::Channel;

pub struct RabbitMq {
    config: RabbitMqConfig,
    ctx: ErrorContext,
    connection: OnceCell<Arc<Connection>>,
    closed: AtomicBool,
}

impl RabbitMq {
    /// Stores the settings only; the broker is first contacted by [`RabbitMq::get_connection`].
    pub fn new(config: RabbitMqConfig, ctx: &ErrorContext) -> Self {
        Self {
            config,
            ctx: ctx.append("RabbitMQ"),
            connection: OnceCell::new(),
            closed: AtomicBool::new(false),
        }
    }

    pub fn context(&self) -> &ErrorContext {
        &self.ctx
    }

    fn uri(&self, password: &str) -> String {
        let host = if self.config.host.contains(':') {
            format!("[{}]", self.config.host)
        } else {
            self.config.host.clone()
        };
        // A literal `/` vhost has to be escaped in the path segment.
        let vhost = self.config.vhost.replace('/', "%2f");
        format!(
            "amqp://{}:{}@{}:{}/{}",
            self.config.user, password, host, self.config.port, vhost
        )
    }

    /// The broker URI with the password masked, safe to log.
    pub fn connection_string(&self) -> String {
        self.uri("***")
    }

    /// Returns the cached connection, opening it first if needed.
    pub async fn get_connection(&self) -> ContextResult<Arc<Connection>> {
        let ew = self.ctx.method("GetConnection");

        if self.closed.load(Ordering::Acquire) {
            return Err(ew.wrap(QueueError::Closed));
        }

        let connection = self
            .connection
            .get_or_try_init(|| async {
                tracing::info!(uri = %self.connection_string(), "Connecting to RabbitMQ");
                Connection::connect(&self.uri(&self.config.password), ConnectionProperties::default())
                    .await
                    .map(Arc::new)
                    .map_err(QueueError::ConnectionError)
            })
            .await
            .wrap_err(&ew)?;

        Ok(Arc::clone(connection))
    }

    /// Opens a fresh channel on the cached connection.
    pub async fn channel(&self) -> ContextResult<Channel> {
        let ew = self.ctx.method("Channel");
        let connection = self.get_connection().await.wrap_err(&ew)?;
        connection
            .create_channel()
            .await
            .map_err(QueueError::from)
            .wrap_err(&ew)
    }

    /// Declares a durable queue; declaring an existing queue is a no-op.
    pub async fn declare_queue(&self, name: &str) -> ContextResult<()> {
        let ew = self.ctx.method("DeclareQueue");
        let channel = self.channel().await.wrap_err(&ew)?;

        let options = QueueDeclareOptions {
            durable: true,
            ..QueueDeclareOptions::default()
        };
        channel
            .queue_declare(name, options, FieldTable::default())
            .await
            .map_err(QueueError::from)
            .wrap_err(&ew)?;

        tracing::debug!(queue = name, "Queue declared");
        Ok(())
    }

    /// Publishes `payload` and waits for the broker to confirm it.
    pub async fn publish(&self, exchange: &str, routing_key: &str, payload: &[u8]) -> ContextResult<()> {
        let ew = self.ctx.method("Publish");
        let channel = self.channel().await.wrap_err(&ew)?;

        channel
            .basic_publish(
                exchange,
                routing_key,
                BasicPublishOptions::default(),
                payload,
                BasicProperties::default(),
            )
            .await
            .map_err(QueueError::from)
            .wrap_err(&ew)?
            .await
            .map_err(QueueError::from)
            .wrap_err(&ew)?;

        Ok(())
    }

    /// Closes the connection if one was opened. Failures are logged, not returned.
    pub async fn close(&self) {
        self.closed.store(true, Ordering::Release);

        let Some(connection) = self.connection.get() else {
            return;
        };
        match connection.close(200, "application shutdown").await {
            Ok(()) => tracing::info!(component = "RabbitMQ", "Connection closed"),
            Err(e) => tracing::error!(component = "RabbitMQ", error = %e, "Error while closing connection"),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}
