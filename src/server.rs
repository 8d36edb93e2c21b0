use std::{future::Future, io, net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use tokio::{
    net::{TcpListener, TcpStream},
    select,
};
use tracing::info;

use crate::{
    config::ServerConfig,
    event::{EventSink, ServerEvent},
    publisher,
    registry::SubscriberRegistry,
    subscriber,
};

/// The relay: two listeners sharing one subscriber registry.
///
/// Accepted connections are spawned as independent tasks, so a slow session
/// never blocks the accept loop. A failed bind is fatal and surfaces from
/// [`Server::bind`]; a transient accept error is reported through the event
/// sink and accepting continues.
pub struct Server {
    publisher_listener: TcpListener,
    subscriber_listener: TcpListener,
    config: Arc<ServerConfig>,
    registry: Arc<SubscriberRegistry>,
    events: Arc<dyn EventSink>,
}

impl Server {
    pub async fn bind(config: ServerConfig, events: Arc<dyn EventSink>) -> Result<Self> {
        let publisher_listener = TcpListener::bind(config.publisher_addr)
            .await
            .with_context(|| format!("failed to bind publisher endpoint {}", config.publisher_addr))?;
        let subscriber_listener = TcpListener::bind(config.subscriber_addr)
            .await
            .with_context(|| {
                format!("failed to bind subscriber endpoint {}", config.subscriber_addr)
            })?;

        Ok(Self {
            publisher_listener,
            subscriber_listener,
            config: Arc::new(config),
            registry: Arc::new(SubscriberRegistry::new()),
            events,
        })
    }

    /// Bound address of the publisher endpoint. Use port 0 in the config to
    /// bind an ephemeral port and read the real one back here.
    pub fn publisher_addr(&self) -> io::Result<SocketAddr> {
        self.publisher_listener.local_addr()
    }

    /// Bound address of the subscriber endpoint.
    pub fn subscriber_addr(&self) -> io::Result<SocketAddr> {
        self.subscriber_listener.local_addr()
    }

    /// Accepts connections on both endpoints until `shutdown` resolves.
    ///
    /// There is no graceful drain: shutdown stops accepting and returns,
    /// leaving in-flight sessions to end with their connections.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        let Server {
            publisher_listener,
            subscriber_listener,
            config,
            registry,
            events,
        } = self;
        tokio::pin!(shutdown);

        loop {
            select! {
                _ = &mut shutdown => {
                    info!("relay shutting down");
                    break;
                }
                accepted = publisher_listener.accept() => {
                    handle_publisher_accept(accepted, &registry, &events, &config);
                }
                accepted = subscriber_listener.accept() => {
                    handle_subscriber_accept(accepted, &registry, &events);
                }
            }
        }

        Ok(())
    }

    pub async fn run_until_ctrl_c(self) -> Result<()> {
        self.run_until(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = ?err, "failed to install ctrl-c handler");
            }
        })
        .await
    }
}

fn handle_publisher_accept(
    result: io::Result<(TcpStream, SocketAddr)>,
    registry: &Arc<SubscriberRegistry>,
    events: &Arc<dyn EventSink>,
    config: &Arc<ServerConfig>,
) {
    match result {
        Ok((stream, peer)) => {
            let registry = Arc::clone(registry);
            let events = Arc::clone(events);
            let config = Arc::clone(config);
            tokio::spawn(async move {
                publisher::run(stream, peer.to_string(), registry, events, config).await;
            });
        }
        Err(err) => report_accept_error(events, err),
    }
}

fn handle_subscriber_accept(
    result: io::Result<(TcpStream, SocketAddr)>,
    registry: &Arc<SubscriberRegistry>,
    events: &Arc<dyn EventSink>,
) {
    match result {
        Ok((stream, peer)) => {
            let registry = Arc::clone(registry);
            let events = Arc::clone(events);
            tokio::spawn(async move {
                subscriber::run(stream, peer.to_string(), registry, events).await;
            });
        }
        Err(err) => report_accept_error(events, err),
    }
}

fn report_accept_error(events: &Arc<dyn EventSink>, err: io::Error) {
    events.log(ServerEvent::Error {
        source: None,
        cause: err.to_string(),
    });
}
