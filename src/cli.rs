use std::net::SocketAddr;

use clap::Parser;

use crate::config::ServerConfig;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Socket address for the publisher endpoint. Use port 0 for an ephemeral port.
    #[arg(long, default_value = "127.0.0.1:9111")]
    pub publisher_listen: SocketAddr,

    /// Socket address for the subscriber endpoint.
    #[arg(long, default_value = "127.0.0.1:9222")]
    pub subscriber_listen: SocketAddr,

    /// Greeting sent to a publisher when no subscribers are connected.
    #[arg(long, default_value = "No subscribers connected")]
    pub no_subscribers_message: String,

    /// Greeting template sent otherwise; {count} expands to the subscriber count.
    #[arg(long, default_value = "{count} subscriber(s) connected")]
    pub subscriber_count_message: String,
}

impl Cli {
    pub fn into_config(self) -> ServerConfig {
        ServerConfig {
            publisher_addr: self.publisher_listen,
            subscriber_addr: self.subscriber_listen,
            no_subscribers_message: self.no_subscribers_message,
            subscriber_count_message: self.subscriber_count_message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_protocol() {
        let cli = Cli::parse_from(["line-relay"]);
        let config = cli.into_config();
        assert_eq!(config.publisher_addr.port(), 9111);
        assert_eq!(config.subscriber_addr.port(), 9222);
        assert_eq!(config.no_subscribers_message, "No subscribers connected");
        assert_eq!(config.subscriber_count_message, "{count} subscriber(s) connected");
    }

    #[test]
    fn flags_override_defaults() {
        let cli = Cli::parse_from([
            "line-relay",
            "--publisher-listen",
            "0.0.0.0:7000",
            "--subscriber-count-message",
            "{count} online",
        ]);
        let config = cli.into_config();
        assert_eq!(config.publisher_addr.port(), 7000);
        assert_eq!(config.subscriber_count_message, "{count} online");
    }
}
