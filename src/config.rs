use std::net::SocketAddr;

/// Literal token in `subscriber_count_message` replaced by the subscriber count.
pub const COUNT_TOKEN: &str = "{count}";

/// Immutable server configuration, constructed once at startup (see [`crate::cli`]).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the publisher endpoint binds to.
    pub publisher_addr: SocketAddr,
    /// Address the subscriber endpoint binds to.
    pub subscriber_addr: SocketAddr,
    /// Greeting sent to a publisher when no subscribers are connected.
    pub no_subscribers_message: String,
    /// Greeting template sent otherwise; every `{count}` expands to the
    /// decimal subscriber count. A template without the token is sent verbatim.
    pub subscriber_count_message: String,
}

impl ServerConfig {
    /// Renders the greeting line for a publisher that connects while
    /// `subscriber_count` subscribers are registered.
    pub fn greeting(&self, subscriber_count: usize) -> String {
        if subscriber_count == 0 {
            self.no_subscribers_message.clone()
        } else {
            self.subscriber_count_message
                .replace(COUNT_TOKEN, &subscriber_count.to_string())
        }
    }
}
