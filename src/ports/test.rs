//! Canned-response port for offline runs and tests.

use async_trait::async_trait;
use log::debug;

use crate::ports::Port;
use crate::prelude::*;

/// Replays a command definition's canned test responses instead of
/// touching hardware. The coordinator primes it with the responses of
/// the command about to run.
#[derive(Debug, Default)]
pub struct TestPort {
    connected: bool,
    responses: Vec<Vec<u8>>,
    next: usize,
}

impl TestPort {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the canned responses for the next command. Successive calls
    /// to `send_and_receive` cycle through them.
    pub fn prime(&mut self, responses: &[Vec<u8>]) {
        self.responses = responses.to_vec();
        self.next = 0;
    }
}

#[async_trait]
impl Port for TestPort {
    async fn connect(&mut self) -> Result<bool> {
        self.connected = true;
        Ok(true)
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.connected = false;
        Ok(())
    }

    async fn send_and_receive(&mut self, full_command: &[u8]) -> Result<Vec<u8>> {
        if !self.connected {
            bail!("test port is not connected");
        }
        debug!("test port sending {:02x?}", full_command);
        if self.responses.is_empty() {
            bail!("test port has no canned response to return");
        }
        let response = self.responses[self.next % self.responses.len()].clone();
        self.next += 1;
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cycles_through_primed_responses() {
        let mut port = TestPort::new();
        port.prime(&[b"one".to_vec(), b"two".to_vec()]);
        port.connect().await.unwrap();
        assert_eq!(port.send_and_receive(b"QPI").await.unwrap(), b"one");
        assert_eq!(port.send_and_receive(b"QPI").await.unwrap(), b"two");
        assert_eq!(port.send_and_receive(b"QPI").await.unwrap(), b"one");
    }

    #[tokio::test]
    async fn refuses_when_disconnected() {
        let mut port = TestPort::new();
        port.prime(&[b"one".to_vec()]);
        assert!(port.send_and_receive(b"QPI").await.is_err());
    }
}
