use clap::Parser;
use std::net::SocketAddr;

/// CLI arguments for the relay server.
#[derive(Parser, Debug, Clone)]
#[command(name = "rdvs")]
#[command(about = "Rendezvous and message-relay server")]
#[command(version)]
pub struct Args {
    /// TCP port to listen on.
    #[arg(long, default_value = "8080", env = "PORT")]
    pub port: u16,
    /// Socket address for the metrics endpoint.
    #[arg(long, default_value = "127.0.0.1:9090", env = "RDVS_METRICS")]
    pub metrics_addr: SocketAddr,
    /// Maximum total concurrent connections.
    #[arg(long, default_value = "10000", env = "RDVS_MAX_CONNS")]
    pub max_conns: usize,
    /// Maximum inbound message size in bytes; larger messages are dropped.
    #[arg(long, default_value = "1024", env = "RDVS_MAX_MESSAGE_SIZE")]
    pub max_message_size: usize,
    /// Interval between WebSocket pings in seconds.
    #[arg(long, default_value = "30", env = "RDVS_PING_INTERVAL")]
    pub ping_interval: u64,
    /// Connection idle timeout in seconds.
    #[arg(long, default_value = "120", env = "RDVS_IDLE_TIMEOUT")]
    pub idle_timeout: u64,
}

/// Runtime configuration derived from [`Args`].
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// TCP port to listen on.
    pub port: u16,
    /// Socket address for the metrics endpoint.
    pub metrics_addr: SocketAddr,
    /// Maximum total concurrent connections.
    pub max_conns: usize,
    /// Maximum inbound message size in bytes; larger messages are dropped.
    pub max_message_size: usize,
    /// Interval between WebSocket pings in seconds.
    pub ping_interval: u64,
    /// Connection idle timeout in seconds.
    pub idle_timeout: u64,
}

impl ServerConfig {
    /// Validates the configuration values are within acceptable bounds.
    ///
    /// # Errors
    ///
    /// Returns a description of the first out-of-bounds value.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_conns == 0 {
            return Err("max_conns must be greater than 0".to_string());
        }
        if self.max_conns > 1_000_000 {
            return Err("max_conns exceeds reasonable limit (1,000,000)".to_string());
        }

        // The transport cap in connection.rs rides above this value, so it
        // must stay well under the WebSocket frame limits.
        const MAX_ALLOWED_MESSAGE: usize = 65_535;
        if self.max_message_size == 0 {
            return Err("max_message_size must be greater than 0".to_string());
        }
        if self.max_message_size > MAX_ALLOWED_MESSAGE {
            return Err(format!(
                "max_message_size exceeds maximum allowed ({MAX_ALLOWED_MESSAGE} bytes)"
            ));
        }

        if self.ping_interval == 0 {
            return Err("ping_interval must be greater than 0".to_string());
        }
        if self.ping_interval > 3600 {
            return Err("ping_interval exceeds reasonable limit (3600 seconds)".to_string());
        }

        if self.idle_timeout == 0 {
            return Err("idle_timeout must be greater than 0".to_string());
        }
        if self.idle_timeout > 86_400 {
            return Err("idle_timeout exceeds reasonable limit (86400 seconds / 1 day)".to_string());
        }

        Ok(())
    }
}

impl From<Args> for ServerConfig {
    fn from(args: Args) -> Self {
        Self {
            port: args.port,
            metrics_addr: args.metrics_addr,
            max_conns: args.max_conns,
            max_message_size: args.max_message_size,
            ping_interval: args.ping_interval,
            idle_timeout: args.idle_timeout,
        }
    }
}
