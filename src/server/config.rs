//! Gateway server configuration

use std::net::SocketAddr;
use std::time::Duration;

/// Gateway server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Maximum concurrent connections (0 = unlimited)
    pub max_connections: usize,

    /// Lines queued per connection before forwarders start waiting
    pub outbound_queue: usize,

    /// Longest accepted request line in bytes
    pub max_line_length: usize,

    /// Maximum subscriptions per connection (0 = unlimited)
    pub max_subscriptions: usize,

    /// Idle timeout (disconnect if no request received; zero disables)
    pub idle_timeout: Duration,

    /// Enable TCP_NODELAY (disable Nagle's algorithm)
    pub tcp_nodelay: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 7070)),
            max_connections: 0, // Unlimited
            outbound_queue: 256,
            max_line_length: 64 * 1024, // 64KB
            max_subscriptions: 16,
            idle_timeout: Duration::ZERO,
            tcp_nodelay: true,
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set maximum connections
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the per-connection outbound queue length
    pub fn outbound_queue(mut self, len: usize) -> Self {
        self.outbound_queue = len.max(1);
        self
    }

    /// Set the maximum request line length
    pub fn max_line_length(mut self, len: usize) -> Self {
        self.max_line_length = len;
        self
    }

    /// Set maximum subscriptions per connection
    pub fn max_subscriptions(mut self, max: usize) -> Self {
        self.max_subscriptions = max;
        self
    }

    /// Set idle timeout
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();

        assert_eq!(config.bind_addr.port(), 7070);
        assert_eq!(config.max_connections, 0);
        assert_eq!(config.outbound_queue, 256);
        assert_eq!(config.max_subscriptions, 16);
        assert_eq!(config.idle_timeout, Duration::ZERO);
        assert!(config.tcp_nodelay);
    }

    #[test]
    fn test_with_addr() {
        let addr: SocketAddr = "127.0.0.1:7071".parse().unwrap();
        let config = ServerConfig::with_addr(addr);

        assert_eq!(config.bind_addr.port(), 7071);
    }

    #[test]
    fn test_outbound_queue_minimum() {
        let config = ServerConfig::default().outbound_queue(0);

        assert_eq!(config.outbound_queue, 1);
    }

    #[test]
    fn test_builder_chaining() {
        let addr: SocketAddr = "127.0.0.1:9000".parse().unwrap();
        let config = ServerConfig::default()
            .bind(addr)
            .max_connections(50)
            .outbound_queue(32)
            .max_line_length(1024)
            .max_subscriptions(4)
            .idle_timeout(Duration::from_secs(30));

        assert_eq!(config.bind_addr, addr);
        assert_eq!(config.max_connections, 50);
        assert_eq!(config.outbound_queue, 32);
        assert_eq!(config.max_line_length, 1024);
        assert_eq!(config.max_subscriptions, 4);
        assert_eq!(config.idle_timeout, Duration::from_secs(30));
    }
}
