use std::sync::Arc;

use anyhow::Result;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    net::{TcpStream, tcp::OwnedReadHalf},
};

use crate::{
    LINE_ENDINGS,
    event::{EventSink, ServerEvent},
    registry::{SubscriberHandle, SubscriberRegistry},
};

const HEARTBEAT_REQUEST: &str = "ping";
const HEARTBEAT_REPLY: &str = "pong";

/// Drives one subscriber connection to completion.
///
/// The session registers its write half in the registry so publishers can
/// push broadcast lines onto the connection, then reads heartbeat lines
/// until the peer goes away. Registration is removed before the disconnect
/// event is emitted, so registry membership always matches a live session.
pub async fn run(
    stream: TcpStream,
    addr: String,
    registry: Arc<SubscriberRegistry>,
    events: Arc<dyn EventSink>,
) {
    let (reader, writer) = stream.into_split();
    let handle = SubscriberHandle::new(registry.next_id(), addr.clone(), writer);
    let id = handle.id();

    registry.add(handle.clone()).await;
    events.log(ServerEvent::SubscriberConnected { addr: addr.clone() });

    let result = listen(BufReader::new(reader), &handle, &addr, events.as_ref()).await;

    registry.remove(id).await;
    if let Err(err) = result {
        events.log(ServerEvent::Error {
            source: Some(addr.clone()),
            cause: err.to_string(),
        });
    }
    events.log(ServerEvent::SubscriberDisconnected { addr });
}

/// Heartbeat loop: `ping` (any case) earns a `pong`, anything else non-empty
/// is a protocol violation that is reported but does not close the
/// connection. Broadcast delivery happens concurrently through the shared
/// write half; this loop only ever reads.
async fn listen(
    mut reader: BufReader<OwnedReadHalf>,
    handle: &SubscriberHandle,
    addr: &str,
    events: &dyn EventSink,
) -> Result<()> {
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            return Ok(());
        }

        let request = line.trim_end_matches(LINE_ENDINGS);
        if request.is_empty() {
            continue;
        }

        if request.eq_ignore_ascii_case(HEARTBEAT_REQUEST) {
            handle.send_line(HEARTBEAT_REPLY).await?;
        } else {
            events.log(ServerEvent::Error {
                source: Some(addr.to_string()),
                cause: format!("protocol violation: expected {HEARTBEAT_REQUEST}, got {request:?}"),
            });
        }
    }
}
