//! Trait abstraction for the WiFi collaborator to enable testing

use std::io;
use thiserror::Error;

/// Failure to dispatch a query
#[derive(Debug, Error)]
pub enum TransportError {
    /// No route to the resolver
    #[error("network unreachable")]
    Unreachable,

    /// Socket buffer full; the query was not sent
    #[error("send would block")]
    WouldBlock,

    /// Query name cannot be put on the wire
    #[error("invalid query name: {0}")]
    InvalidName(String),

    /// Other socket errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// WiFi collaborator: reachability and a fire-and-forget query primitive
pub trait WifiLink {
    /// A usable access point (and its resolver) is currently reachable
    fn network_reachable(&mut self) -> bool;

    /// Dispatch a lookup for `name`; success means no transport-level error
    fn send_query(&mut self, name: &str) -> Result<(), TransportError>;
}

#[cfg(test)]
pub mod mocks {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Mock WiFi link for testing
    #[derive(Clone, Default)]
    pub struct MockWifiLink {
        pub sent: Arc<Mutex<Vec<String>>>,
        pub reachable: Arc<Mutex<bool>>,
        pub send_error: Arc<Mutex<Option<io::ErrorKind>>>,
        /// Network disappears after this many successful sends
        pub drop_after: Arc<Mutex<Option<usize>>>,
    }

    impl MockWifiLink {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn reachable() -> Self {
            let link = Self::new();
            link.set_reachable(true);
            link
        }

        pub fn get_sent(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }

        pub fn set_reachable(&self, reachable: bool) {
            *self.reachable.lock().unwrap() = reachable;
        }

        pub fn set_send_error(&self, error: Option<io::ErrorKind>) {
            *self.send_error.lock().unwrap() = error;
        }

        pub fn set_drop_after(&self, sends: usize) {
            *self.drop_after.lock().unwrap() = Some(sends);
        }
    }

    impl WifiLink for MockWifiLink {
        fn network_reachable(&mut self) -> bool {
            *self.reachable.lock().unwrap()
        }

        fn send_query(&mut self, name: &str) -> Result<(), TransportError> {
            if let Some(kind) = *self.send_error.lock().unwrap() {
                return Err(TransportError::Io(io::Error::new(kind, "Mock send error")));
            }

            let mut sent = self.sent.lock().unwrap();
            sent.push(name.to_string());

            if *self.drop_after.lock().unwrap() == Some(sent.len()) {
                *self.reachable.lock().unwrap() = false;
            }
            Ok(())
        }
    }
}
