use std::sync::Arc;

use anyhow::Result;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{TcpStream, tcp::OwnedWriteHalf},
};

use crate::{
    LINE_ENDINGS,
    config::ServerConfig,
    event::{EventSink, ServerEvent},
    registry::{SubscriberHandle, SubscriberRegistry},
};

/// Drives one publisher connection to completion.
///
/// The session greets the publisher with the current subscriber count, then
/// broadcasts every line it reads to a snapshot of the registry. The
/// connection is closed exactly once (by drop) on every exit path; a clean
/// end-of-stream produces only the disconnect event, any failure produces an
/// error event first.
pub async fn run(
    stream: TcpStream,
    addr: String,
    registry: Arc<SubscriberRegistry>,
    events: Arc<dyn EventSink>,
    config: Arc<ServerConfig>,
) {
    if let Err(err) = drive(stream, &addr, &registry, events.as_ref(), &config).await {
        events.log(ServerEvent::Error {
            source: Some(addr.clone()),
            cause: err.to_string(),
        });
    }
    events.log(ServerEvent::PublisherDisconnected { addr });
}

async fn drive(
    stream: TcpStream,
    addr: &str,
    registry: &SubscriberRegistry,
    events: &dyn EventSink,
    config: &ServerConfig,
) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);

    greet(&mut writer, addr, registry, events, config).await?;

    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            return Ok(());
        }

        let content = line.trim_end_matches(LINE_ENDINGS);
        events.log(ServerEvent::PublisherMessage {
            from: addr.to_string(),
            content: content.to_string(),
        });

        let snapshot = registry.snapshot().await;
        broadcast(content, &snapshot, events).await;
    }
}

async fn greet(
    writer: &mut OwnedWriteHalf,
    addr: &str,
    registry: &SubscriberRegistry,
    events: &dyn EventSink,
    config: &ServerConfig,
) -> Result<()> {
    let greeting = config.greeting(registry.len().await);
    writer.write_all(greeting.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;

    events.log(ServerEvent::PublisherConnected {
        addr: addr.to_string(),
    });
    Ok(())
}

/// Delivers one line to every subscriber in the snapshot. A failed write is
/// reported against that subscriber and delivery continues; removal stays
/// the failing subscriber's own responsibility.
async fn broadcast(content: &str, snapshot: &[SubscriberHandle], events: &dyn EventSink) {
    for subscriber in snapshot {
        if let Err(err) = subscriber.send_line(content).await {
            events.log(ServerEvent::Error {
                source: Some(subscriber.addr().to_string()),
                cause: err.to_string(),
            });
        }
    }
}
