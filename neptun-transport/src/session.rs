//! Session management for one controller link
//!
//! A session owns the transport and tracks:
//! - When the last exchange finished (command spacing)
//! - Whether the socket should stay open between commands
//! - Whether the current command has used its reconnect
//!
//! It connects lazily and drops the socket after a timeout. A request is
//! written at most once per [`Session::exchange`]; resending is left to the
//! caller.

use std::fmt;
use std::time::{Duration, Instant};

use bytes::BytesMut;
use tracing::{debug, info, warn};

use neptun_core::constants::DEFAULT_COMMAND_SPACING;

use crate::{clock::SharedClock, error::*, Transport};

pub struct Session {
    transport: Box<dyn Transport>,
    clock: SharedClock,
    command_spacing: Duration,
    keep_alive: bool,
    last_exchange: Option<Instant>,

    /// Set once the current command has lost its connection
    connection_lost: bool,
}

impl Session {
    pub fn new(transport: Box<dyn Transport>, clock: SharedClock) -> Self {
        Self {
            transport,
            clock,
            command_spacing: DEFAULT_COMMAND_SPACING,
            keep_alive: true,
            last_exchange: None,
            connection_lost: false,
        }
    }

    /// Minimum gap between the end of one exchange and the next request
    pub fn with_command_spacing(mut self, spacing: Duration) -> Self {
        self.command_spacing = spacing;
        self
    }

    /// Keep the socket open between exchanges (default `true`)
    pub fn with_keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    pub fn remote_addr(&self) -> String {
        self.transport.remote_addr()
    }

    /// Start a new logical command, restoring its single reconnect
    pub fn begin_command(&mut self) {
        self.connection_lost = false;
    }

    /// The socket is gone and the current command may not open another one
    pub fn reconnect_spent(&self) -> bool {
        self.connection_lost && !self.transport.is_connected()
    }

    /// Send one encoded frame and read one frame back
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionLost`] when the connection broke; the request is
    ///   not resent, but if this command has not reconnected yet a fresh
    ///   socket is opened for the caller's next attempt
    /// - [`Error::ReconnectSpent`] when the socket is gone and this command
    ///   already lost its connection once; nothing is sent
    /// - [`Error::Timeout`] when no complete frame arrived in time; the socket
    ///   is dropped so the next exchange starts on a fresh connection
    pub async fn exchange(&mut self, request: &[u8], response_timeout: Duration) -> Result<BytesMut> {
        if self.reconnect_spent() {
            debug!("Not reopening {}, reconnect already used", self.remote_addr());
            return Err(Error::ReconnectSpent);
        }

        self.wait_for_spacing().await;

        let result = match self.try_exchange(request, response_timeout).await {
            Err(e) if e.is_connection_fault() => {
                warn!("Connection to {} failed: {}", self.remote_addr(), e);
                self.abandon().await;

                if !self.connection_lost {
                    self.connection_lost = true;
                    self.reconnect().await;
                }

                Err(Error::ConnectionLost(Box::new(e)))
            }
            other => other,
        };

        self.last_exchange = Some(self.clock.now());

        if let Err(Error::Timeout(after)) = &result {
            debug!("No response from {} within {:?}, dropping socket", self.remote_addr(), after);
            self.abandon().await;
        } else if !self.keep_alive {
            self.abandon().await;
        }

        result
    }

    async fn try_exchange(&mut self, request: &[u8], response_timeout: Duration) -> Result<BytesMut> {
        if !self.transport.is_connected() {
            self.transport.connect().await?;
        }

        self.transport.send(request).await?;
        self.transport.receive(response_timeout).await
    }

    async fn reconnect(&mut self) {
        match self.transport.connect().await {
            Ok(()) => info!("Reconnected to {}", self.remote_addr()),
            Err(e) => warn!("Reconnect to {} failed: {}", self.remote_addr(), e),
        }
    }

    async fn wait_for_spacing(&self) {
        let Some(last) = self.last_exchange else {
            return;
        };

        let elapsed = self.clock.now().saturating_duration_since(last);
        if elapsed < self.command_spacing {
            self.clock.sleep(self.command_spacing - elapsed).await;
        }
    }

    /// Drop the socket without waiting for anything in flight
    pub async fn abandon(&mut self) {
        if let Err(e) = self.transport.disconnect().await {
            debug!("Ignoring disconnect error: {}", e);
        }
    }

    /// Release the socket
    pub async fn close(&mut self) -> Result<()> {
        self.transport.disconnect().await
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("remote_addr", &self.remote_addr())
            .field("connected", &self.is_connected())
            .field("command_spacing", &self.command_spacing)
            .field("keep_alive", &self.keep_alive)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use std::collections::VecDeque;
    use std::io;
    use std::sync::Arc;

    const TIMEOUT: Duration = Duration::from_secs(20);
    const REPLY: &[u8] = &[0x02, 0x54, 0x41, 0x57, 0x00, 0x00, 0xDA, 0x12];

    /// Records calls and plays back queued outcomes
    #[derive(Default)]
    struct Script {
        connected: bool,
        connects: usize,
        disconnects: usize,
        sent: Vec<Vec<u8>>,
        connect_results: VecDeque<Result<()>>,
        replies: VecDeque<Result<BytesMut>>,
    }

    #[derive(Clone, Default)]
    struct ScriptedTransport(Arc<Mutex<Script>>);

    impl ScriptedTransport {
        fn reply(&self, reply: Result<BytesMut>) -> &Self {
            self.0.lock().replies.push_back(reply);
            self
        }

        fn fail_connect(&self, err: Error) -> &Self {
            self.0.lock().connect_results.push_back(Err(err));
            self
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn connect(&mut self) -> Result<()> {
            let mut script = self.0.lock();
            script.connects += 1;
            script.connect_results.pop_front().unwrap_or(Ok(()))?;
            script.connected = true;
            Ok(())
        }

        async fn disconnect(&mut self) -> Result<()> {
            let mut script = self.0.lock();
            script.disconnects += 1;
            script.connected = false;
            Ok(())
        }

        fn is_connected(&self) -> bool {
            self.0.lock().connected
        }

        async fn send(&mut self, data: &[u8]) -> Result<()> {
            self.0.lock().sent.push(data.to_vec());
            Ok(())
        }

        async fn receive(&mut self, _timeout: Duration) -> Result<BytesMut> {
            let mut script = self.0.lock();
            let reply = script.replies.pop_front().unwrap_or(Err(Error::Timeout(TIMEOUT)));
            if matches!(&reply, Err(e) if e.is_connection_fault()) {
                script.connected = false;
            }
            reply
        }

        fn remote_addr(&self) -> String {
            "scripted:6350".to_string()
        }
    }

    fn ok_reply() -> Result<BytesMut> {
        Ok(BytesMut::from(REPLY))
    }

    fn session(transport: &ScriptedTransport, clock: &Arc<ManualClock>) -> Session {
        Session::new(Box::new(transport.clone()), clock.clone())
    }

    #[tokio::test]
    async fn test_connects_lazily() {
        let transport = ScriptedTransport::default();
        transport.reply(ok_reply());
        let clock = Arc::new(ManualClock::new());
        let mut session = session(&transport, &clock);

        assert!(!session.is_connected());
        let reply = session.exchange(&[0x01], TIMEOUT).await.unwrap();

        assert_eq!(reply.as_ref(), REPLY);
        assert!(session.is_connected());
        assert_eq!(transport.0.lock().connects, 1);
    }

    #[tokio::test]
    async fn test_command_spacing() {
        let transport = ScriptedTransport::default();
        transport.reply(ok_reply()).reply(ok_reply()).reply(ok_reply());
        let clock = Arc::new(ManualClock::new());
        let mut session = session(&transport, &clock);

        session.exchange(&[0x01], TIMEOUT).await.unwrap();
        session.exchange(&[0x02], TIMEOUT).await.unwrap();

        clock.advance(Duration::from_millis(200));
        session.exchange(&[0x03], TIMEOUT).await.unwrap();

        assert_eq!(
            clock.sleeps(),
            vec![Duration::from_millis(500), Duration::from_millis(300)]
        );
        assert_eq!(transport.0.lock().sent.len(), 3);
    }

    #[tokio::test]
    async fn test_no_wait_after_idle_period() {
        let transport = ScriptedTransport::default();
        transport.reply(ok_reply()).reply(ok_reply());
        let clock = Arc::new(ManualClock::new());
        let mut session = session(&transport, &clock);

        session.exchange(&[0x01], TIMEOUT).await.unwrap();
        clock.advance(Duration::from_secs(1));
        session.exchange(&[0x02], TIMEOUT).await.unwrap();

        assert!(clock.sleeps().is_empty());
    }

    #[tokio::test]
    async fn test_fault_reconnects_without_resending() {
        let transport = ScriptedTransport::default();
        transport
            .reply(Err(Error::Io(io::Error::from(io::ErrorKind::ConnectionReset))))
            .reply(ok_reply());
        let clock = Arc::new(ManualClock::new());
        let mut session = session(&transport, &clock);
        session.begin_command();

        let result = session.exchange(&[0x01], TIMEOUT).await;
        assert!(matches!(result, Err(Error::ConnectionLost(_))));
        assert!(session.is_connected());
        assert_eq!(transport.0.lock().sent, vec![vec![0x01]]);

        // The caller's next attempt goes out on the fresh socket
        let reply = session.exchange(&[0x01], TIMEOUT).await.unwrap();
        assert_eq!(reply.as_ref(), REPLY);

        let script = transport.0.lock();
        assert_eq!(script.connects, 2);
        assert_eq!(script.sent.len(), 2);
    }

    #[tokio::test]
    async fn test_one_reconnect_per_command() {
        let transport = ScriptedTransport::default();
        transport
            .reply(Err(Error::ConnectionClosed))
            .reply(Err(Error::ConnectionClosed))
            .reply(ok_reply());
        let clock = Arc::new(ManualClock::new());
        let mut session = session(&transport, &clock);
        session.begin_command();

        let first = session.exchange(&[0x01], TIMEOUT).await;
        assert!(matches!(first, Err(Error::ConnectionLost(_))));

        // Second fault: no further reconnect
        let second = session.exchange(&[0x01], TIMEOUT).await;
        assert!(matches!(second, Err(Error::ConnectionLost(_))));
        assert!(!session.is_connected());

        assert!(session.reconnect_spent());
        let third = session.exchange(&[0x01], TIMEOUT).await;
        assert!(matches!(third, Err(Error::ReconnectSpent)));
        {
            let script = transport.0.lock();
            assert_eq!(script.connects, 2);
            assert_eq!(script.sent.len(), 2);
        }

        // A new command may connect again
        session.begin_command();
        session.exchange(&[0x02], TIMEOUT).await.unwrap();
        assert_eq!(transport.0.lock().connects, 3);
    }

    #[tokio::test]
    async fn test_failed_reconnect_spends_the_budget() {
        let transport = ScriptedTransport::default();
        transport.reply(Err(Error::ConnectionClosed));
        // First connect succeeds, reconnect is refused
        transport.0.lock().connect_results.push_back(Ok(()));
        transport.fail_connect(Error::ConnectionRefused("scripted:6350".into()));
        let clock = Arc::new(ManualClock::new());
        let mut session = session(&transport, &clock);
        session.begin_command();

        let result = session.exchange(&[0x01], TIMEOUT).await;
        assert!(matches!(result, Err(Error::ConnectionLost(_))));
        assert!(!session.is_connected());

        let result = session.exchange(&[0x01], TIMEOUT).await;
        assert!(matches!(result, Err(Error::ReconnectSpent)));

        let script = transport.0.lock();
        assert_eq!(script.connects, 2);
        assert_eq!(script.sent.len(), 1);
    }

    #[tokio::test]
    async fn test_timeout_drops_socket() {
        let transport = ScriptedTransport::default();
        transport.reply(Err(Error::Timeout(TIMEOUT))).reply(ok_reply());
        let clock = Arc::new(ManualClock::new());
        let mut session = session(&transport, &clock);

        let result = session.exchange(&[0x01], TIMEOUT).await;
        assert!(matches!(result, Err(Error::Timeout(_))));
        assert!(!session.is_connected());

        // Next exchange opens a fresh connection
        session.exchange(&[0x01], TIMEOUT).await.unwrap();
        assert_eq!(transport.0.lock().connects, 2);
    }

    #[tokio::test]
    async fn test_frame_errors_are_not_reconnected() {
        let transport = ScriptedTransport::default();
        transport.reply(Err(Error::Frame(neptun_core::Error::UnknownCommand(0x10))));
        let clock = Arc::new(ManualClock::new());
        let mut session = session(&transport, &clock);

        let result = session.exchange(&[0x01], TIMEOUT).await;

        assert!(matches!(result, Err(Error::Frame(_))));
        assert_eq!(transport.0.lock().connects, 1);
        assert_eq!(transport.0.lock().sent.len(), 1);
    }

    #[tokio::test]
    async fn test_without_keep_alive_closes_after_exchange() {
        let transport = ScriptedTransport::default();
        transport.reply(ok_reply()).reply(ok_reply());
        let clock = Arc::new(ManualClock::new());
        let mut session = session(&transport, &clock).with_keep_alive(false);

        session.exchange(&[0x01], TIMEOUT).await.unwrap();
        assert!(!session.is_connected());

        session.exchange(&[0x02], TIMEOUT).await.unwrap();
        assert_eq!(transport.0.lock().connects, 2);
    }

    #[tokio::test]
    async fn test_close_releases_socket() {
        let transport = ScriptedTransport::default();
        transport.reply(ok_reply());
        let clock = Arc::new(ManualClock::new());
        let mut session = session(&transport, &clock);

        session.exchange(&[0x01], TIMEOUT).await.unwrap();
        session.close().await.unwrap();

        assert!(!session.is_connected());
        assert_eq!(transport.0.lock().disconnects, 1);
    }
}
