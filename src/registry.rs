use std::{
    collections::HashMap,
    io,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use tokio::{io::AsyncWriteExt, net::tcp::OwnedWriteHalf, sync::Mutex};

pub type SubscriberId = u64;

/// Shareable write handle to one subscriber connection.
///
/// Publisher sessions clone handles out of a registry snapshot and write
/// broadcast lines through them; the subscriber's own session writes pong
/// replies through the same handle. The inner mutex serializes writes to the
/// one connection, so lines never interleave mid-line and each publisher's
/// lines arrive in send order.
#[derive(Clone)]
pub struct SubscriberHandle {
    id: SubscriberId,
    addr: String,
    writer: Arc<Mutex<OwnedWriteHalf>>,
}

impl SubscriberHandle {
    pub fn new(id: SubscriberId, addr: String, writer: OwnedWriteHalf) -> Self {
        Self {
            id,
            addr,
            writer: Arc::new(Mutex::new(writer)),
        }
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Writes `line` plus a newline delimiter and flushes, holding only this
    /// subscriber's writer lock for the duration.
    pub async fn send_line(&self, line: &str) -> io::Result<()> {
        let mut writer = self.writer.lock().await;
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await
    }
}

/// The set of currently connected subscribers.
///
/// Subscriber sessions are the only writers (add on entry, remove on exit);
/// publisher sessions only take snapshots. The membership lock is held just
/// long enough to mutate or copy the map, never across a network write, so a
/// stalled subscriber cannot block registration or other broadcasts.
pub struct SubscriberRegistry {
    subscribers: Mutex<HashMap<SubscriberId, SubscriberHandle>>,
    next_id: AtomicU64,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn next_id(&self) -> SubscriberId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub async fn add(&self, handle: SubscriberHandle) {
        let mut subscribers = self.subscribers.lock().await;
        subscribers.insert(handle.id(), handle);
    }

    pub async fn remove(&self, id: SubscriberId) -> Option<SubscriberHandle> {
        let mut subscribers = self.subscribers.lock().await;
        subscribers.remove(&id)
    }

    pub async fn len(&self) -> usize {
        self.subscribers.lock().await.len()
    }

    /// Point-in-time copy of the current membership. Later adds and removes
    /// do not affect a snapshot already taken.
    pub async fn snapshot(&self) -> Vec<SubscriberHandle> {
        let subscribers = self.subscribers.lock().await;
        subscribers.values().cloned().collect()
    }
}

impl Default for SubscriberRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::{
        io::{AsyncBufReadExt, BufReader},
        net::{TcpListener, TcpStream},
    };

    async fn socket_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let (accepted, connected) = tokio::join!(listener.accept(), TcpStream::connect(addr));
        let (server_side, _) = accepted.expect("accept");
        (server_side, connected.expect("connect"))
    }

    async fn handle_with_peer(registry: &SubscriberRegistry) -> (SubscriberHandle, TcpStream) {
        let (server_side, client_side) = socket_pair().await;
        let addr = server_side
            .peer_addr()
            .expect("peer addr")
            .to_string();
        let (_reader, writer) = server_side.into_split();
        (
            SubscriberHandle::new(registry.next_id(), addr, writer),
            client_side,
        )
    }

    #[tokio::test]
    async fn add_and_remove_track_membership() {
        let registry = SubscriberRegistry::new();
        let (first, _first_peer) = handle_with_peer(&registry).await;
        let (second, _second_peer) = handle_with_peer(&registry).await;
        let first_id = first.id();

        registry.add(first).await;
        registry.add(second).await;
        assert_eq!(registry.len().await, 2);

        let removed = registry.remove(first_id).await;
        assert_eq!(removed.map(|handle| handle.id()), Some(first_id));
        assert_eq!(registry.len().await, 1);
        assert!(registry.remove(first_id).await.is_none());
    }

    #[tokio::test]
    async fn snapshot_is_a_point_in_time_copy() {
        let registry = SubscriberRegistry::new();
        let (first, _first_peer) = handle_with_peer(&registry).await;
        let (second, _second_peer) = handle_with_peer(&registry).await;
        let first_id = first.id();

        registry.add(first).await;
        registry.add(second).await;
        let snapshot = registry.snapshot().await;
        assert_eq!(snapshot.len(), 2);

        registry.remove(first_id).await;
        assert_eq!(snapshot.len(), 2, "existing snapshot is unaffected");
        assert_eq!(registry.snapshot().await.len(), 1);
    }

    #[tokio::test]
    async fn send_line_appends_newline_and_flushes() {
        let registry = SubscriberRegistry::new();
        let (handle, peer) = handle_with_peer(&registry).await;

        handle.send_line("hello").await.expect("send line");

        let mut reader = BufReader::new(peer);
        let mut line = String::new();
        reader.read_line(&mut line).await.expect("read line");
        assert_eq!(line, "hello\n");
    }

    #[tokio::test]
    async fn ids_are_unique() {
        let registry = SubscriberRegistry::new();
        let first = registry.next_id();
        let second = registry.next_id();
        assert_ne!(first, second);
    }
}
