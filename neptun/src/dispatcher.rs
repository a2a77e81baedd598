//! Command dispatch with bounded retries
//!
//! One [`Dispatcher`] owns the session to a controller. Commands are
//! serialized through an async mutex, so a poll and a control command never
//! share the wire.

use std::time::Duration;

use bytes::Bytes;
use tokio::sync::Mutex;
use tracing::{debug, trace, warn};

use neptun_core::{frame, Command, Frame};
use neptun_transport::{Error as TransportError, Session, SharedClock, TcpTransport, Transport};

use crate::config::Config;
use crate::error::{Error, Result};

pub struct Dispatcher {
    session: Mutex<Session>,
    clock: SharedClock,
    response_timeout: Duration,
    max_attempts: usize,
    retry_delay: Duration,
}

impl Dispatcher {
    pub fn new(session: Session, clock: SharedClock, config: &Config) -> Self {
        Self {
            session: Mutex::new(session),
            clock,
            response_timeout: config.response_timeout,
            max_attempts: config.max_attempts.max(1),
            retry_delay: config.retry_delay,
        }
    }

    /// Dispatcher over a plain TCP link to `config.host`
    pub fn connect_tcp(config: &Config, clock: SharedClock) -> Self {
        let transport = TcpTransport::new(config.host.clone(), config.port)
            .with_connect_timeout(config.connect_timeout);

        Self::with_transport(Box::new(transport), clock, config)
    }

    pub fn with_transport(transport: Box<dyn Transport>, clock: SharedClock, config: &Config) -> Self {
        let session = Session::new(transport, clock.clone())
            .with_command_spacing(config.command_spacing)
            .with_keep_alive(config.keep_alive);

        Self::new(session, clock, config)
    }

    /// Send `command` and wait for a response carrying `expected`
    ///
    /// # Errors
    ///
    /// - [`neptun_core::Error::InvalidPayloadSize`] before anything is sent
    /// - the first non-retriable error, as is
    /// - [`Error::Exhausted`] once every attempt failed, or when the link
    ///   dropped again after the command's single reconnect
    pub async fn execute(&self, command: Command, payload: Bytes, expected: Command) -> Result<Frame> {
        let request = frame::encode(command, &payload)?;
        trace!("Request {}: {}", command, hex::encode_upper(&request));

        let mut session = self.session.lock().await;
        session.begin_command();

        let mut attempt = 1;

        loop {
            debug!("Sending {} (attempt {}/{})", command, attempt, self.max_attempts);

            let err = match self.attempt(&mut session, &request, expected).await {
                Ok(frame) => return Ok(frame),
                Err(e) => e,
            };

            if stream_out_of_sync(&err) {
                session.abandon().await;
            }

            if !err.is_retriable() {
                debug!("{} failed, not retrying: {}", command, err);
                return Err(err);
            }

            if attempt >= self.max_attempts || session.reconnect_spent() {
                warn!("{} failed after {} attempts: {}", command, attempt, err);
                return Err(Error::Exhausted {
                    attempts: attempt,
                    last: Box::new(err),
                });
            }

            warn!(
                "{} attempt {}/{} failed: {}, retrying in {:?}",
                command, attempt, self.max_attempts, err, self.retry_delay
            );

            attempt += 1;
            self.clock.sleep(self.retry_delay).await;
        }
    }

    /// [`execute`](Self::execute) bounded by a caller deadline
    ///
    /// On expiry the in-flight exchange is dropped and the socket abandoned.
    pub async fn execute_within(
        &self,
        deadline: Duration,
        command: Command,
        payload: Bytes,
        expected: Command,
    ) -> Result<Frame> {
        match tokio::time::timeout(deadline, self.execute(command, payload, expected)).await {
            Ok(result) => result,
            Err(_) => {
                warn!("{} did not complete within {:?}", command, deadline);
                self.session.lock().await.abandon().await;
                Err(Error::DeadlineElapsed(deadline))
            }
        }
    }

    async fn attempt(&self, session: &mut Session, request: &[u8], expected: Command) -> Result<Frame> {
        let raw = session.exchange(request, self.response_timeout).await?;
        trace!("Response: {}", hex::encode_upper(&raw));

        let frame = Frame::decode(raw)?;

        if frame.command != expected || !frame.is_response() {
            return Err(Error::UnexpectedResponse {
                expected,
                actual: frame.command,
            });
        }

        Ok(frame)
    }

    /// Release the socket; the next command reconnects
    pub async fn close(&self) -> Result<()> {
        self.session.lock().await.close().await?;
        Ok(())
    }
}

/// Bytes of a bad frame may still be queued on the socket. Transport errors
/// other than framing are handled by the session itself.
fn stream_out_of_sync(err: &Error) -> bool {
    match err {
        Error::Transport(TransportError::Frame(_)) => true,
        Error::Transport(_) => false,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{response, state_block_hex, MockLink};
    use bytes::BytesMut;
    use neptun_core::Nak;
    use neptun_transport::{ManualClock, TokioClock};
    use pretty_assertions::assert_eq;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    type Reply = neptun_transport::Result<BytesMut>;

    /// Mock link that accepts every connect and plays back `replies`
    fn link(replies: Vec<Reply>, sends: usize) -> MockLink {
        let mut replies = VecDeque::from(replies);
        let mut link = MockLink::new();

        link.expect_is_connected().return_const(false);
        link.expect_connect().returning(|| Ok(()));
        link.expect_disconnect().returning(|| Ok(()));
        link.expect_remote_addr().return_const("mock:6350".to_string());
        link.expect_send().times(sends).returning(|_| Ok(()));
        link.expect_receive().times(sends).returning(move |_| {
            replies
                .pop_front()
                .unwrap_or(Err(neptun_transport::Error::Timeout(Duration::from_secs(20))))
        });

        link
    }

    fn dispatcher(link: MockLink, clock: &Arc<ManualClock>) -> Dispatcher {
        Dispatcher::with_transport(Box::new(link), clock.clone(), &Config::new("mock"))
    }

    fn timeout() -> Reply {
        Err(neptun_transport::Error::Timeout(Duration::from_secs(20)))
    }

    fn corrupted(mut frame: BytesMut) -> Reply {
        let last = frame.len() - 1;
        frame[last] ^= 0xFF;
        Ok(frame)
    }

    #[tokio::test]
    async fn test_first_attempt_succeeds() {
        let clock = Arc::new(ManualClock::new());
        let state = BytesMut::from(&hex::decode(state_block_hex()).unwrap()[..]);
        let dispatcher = dispatcher(link(vec![Ok(state)], 1), &clock);

        let frame = dispatcher
            .execute(Command::SystemState, Bytes::new(), Command::SystemState)
            .await
            .unwrap();

        assert_eq!(frame.command, Command::SystemState);
        assert_eq!(frame.payload.len(), 104);
        assert!(clock.sleeps().is_empty());
    }

    #[tokio::test]
    async fn test_retry_exhaustion() {
        let clock = Arc::new(ManualClock::new());
        let dispatcher = dispatcher(link(vec![timeout(), timeout(), timeout()], 3), &clock);

        let result = dispatcher
            .execute(Command::SystemState, Bytes::new(), Command::SystemState)
            .await;

        match result {
            Err(Error::Exhausted { attempts, last }) => {
                assert_eq!(attempts, 3);
                assert!(matches!(
                    *last,
                    Error::Transport(neptun_transport::Error::Timeout(_))
                ));
            }
            other => panic!("Expected Exhausted, got {:?}", other),
        }

        // Spacing is already satisfied by the retry delay
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(2), Duration::from_secs(2)]);
    }

    #[tokio::test]
    async fn test_corrupt_frame_is_retried() {
        let clock = Arc::new(ManualClock::new());
        let ok = response(Command::SetSystemState, &[]);
        let dispatcher = dispatcher(link(vec![corrupted(ok.clone()), Ok(ok)], 2), &clock);

        let frame = dispatcher
            .execute(Command::SetSystemState, Bytes::from_static(&[0x53, 0, 4, 1, 0, 0, 0]), Command::SetSystemState)
            .await
            .unwrap();

        assert_eq!(frame.command, Command::SetSystemState);
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(2)]);
    }

    #[tokio::test]
    async fn test_checksum_nak_is_retried() {
        let clock = Arc::new(ManualClock::new());
        let nak = Ok(BytesMut::from(&[0x02, 0x54, 0x41, 0xFE][..]));
        let ok = Ok(response(Command::SetSystemState, &[]));
        let dispatcher = dispatcher(link(vec![nak, ok], 2), &clock);

        let result = dispatcher
            .execute(Command::SetSystemState, Bytes::new(), Command::SetSystemState)
            .await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_unknown_command_nak_is_not_retried() {
        let clock = Arc::new(ManualClock::new());
        let nak = Ok(BytesMut::from(&[0x02, 0x54, 0x41, 0xFB][..]));
        let dispatcher = dispatcher(link(vec![nak], 1), &clock);

        let result = dispatcher
            .execute(Command::SetCounterValue, Bytes::new(), Command::SetCounterValue)
            .await;

        assert!(matches!(
            result,
            Err(Error::Core(neptun_core::Error::DeviceRejected(Nak::UnknownCommand)))
        ));
        assert!(clock.sleeps().is_empty());
    }

    #[tokio::test]
    async fn test_unexpected_response_is_retried() {
        let clock = Arc::new(ManualClock::new());
        let wrong = Ok(response(Command::SetSystemState, &[]));
        let right = Ok(response(Command::SetCounterValue, &[]));
        let dispatcher = dispatcher(link(vec![wrong, right], 2), &clock);

        let frame = dispatcher
            .execute(Command::SetCounterValue, Bytes::new(), Command::SetCounterValue)
            .await
            .unwrap();

        assert_eq!(frame.command, Command::SetCounterValue);
    }

    #[tokio::test]
    async fn test_oversized_payload_sends_nothing() {
        let clock = Arc::new(ManualClock::new());
        let dispatcher = dispatcher(link(Vec::new(), 0), &clock);

        let payload = Bytes::from(vec![0u8; Frame::MAX_PAYLOAD_SIZE + 1]);
        let result = dispatcher
            .execute(Command::SetSystemState, payload, Command::SetSystemState)
            .await;

        assert!(matches!(
            result,
            Err(Error::Core(neptun_core::Error::InvalidPayloadSize { .. }))
        ));
    }

    #[tokio::test]
    async fn test_dropped_connection_is_not_resent() {
        let connected = Arc::new(AtomicBool::new(false));
        let sent = Arc::new(AtomicUsize::new(0));
        let mut link = MockLink::new();

        let flag = connected.clone();
        link.expect_is_connected().returning(move || flag.load(Ordering::SeqCst));
        let flag = connected.clone();
        link.expect_connect().times(2).returning(move || {
            flag.store(true, Ordering::SeqCst);
            Ok(())
        });
        let flag = connected.clone();
        link.expect_disconnect().returning(move || {
            flag.store(false, Ordering::SeqCst);
            Ok(())
        });
        link.expect_remote_addr().return_const("mock:6350".to_string());
        let count = sent.clone();
        link.expect_send().returning(move |_| {
            count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        let flag = connected.clone();
        link.expect_receive().returning(move |_| {
            flag.store(false, Ordering::SeqCst);
            Err(neptun_transport::Error::ConnectionClosed)
        });

        let clock = Arc::new(ManualClock::new());
        let dispatcher = dispatcher(link, &clock);

        let result = dispatcher
            .execute(
                Command::SetSystemState,
                Bytes::from_static(&[0x53, 0, 4, 0, 0, 0, 0]),
                Command::SetSystemState,
            )
            .await;

        // Initial connection plus one reconnect, each used for one send
        match result {
            Err(Error::Exhausted { attempts, last }) => {
                assert_eq!(attempts, 2);
                assert!(matches!(
                    *last,
                    Error::Transport(neptun_transport::Error::ConnectionLost(_))
                ));
            }
            other => panic!("Expected Exhausted, got {:?}", other),
        }
        assert_eq!(sent.load(Ordering::SeqCst), 2);
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(2)]);
    }

    #[tokio::test]
    async fn test_unknown_response_command_is_not_retried() {
        let mut reply = BytesMut::from(&[0x02, 0x54, 0x41, 0x49, 0x00, 0x00][..]);
        let crc = neptun_core::checksum::crc16_ccitt(&reply);
        reply.extend_from_slice(&crc.to_be_bytes());

        let clock = Arc::new(ManualClock::new());
        let dispatcher = dispatcher(link(vec![Ok(reply)], 1), &clock);

        let result = dispatcher
            .execute(Command::SystemState, Bytes::new(), Command::SystemState)
            .await;

        assert!(matches!(
            result,
            Err(Error::Core(neptun_core::Error::UnknownCommand(0x49)))
        ));
        assert!(clock.sleeps().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_elapsed() {
        let mut link = MockLink::new();
        link.expect_is_connected().return_const(false);
        link.expect_connect().returning(|| Ok(()));
        link.expect_disconnect().returning(|| Ok(()));
        link.expect_remote_addr().return_const("mock:6350".to_string());
        link.expect_send().times(1).returning(|_| Ok(()));
        link.expect_receive().times(1).returning(|_| timeout());

        let config = Config::new("mock").with_retry_delay(Duration::from_secs(60));
        let dispatcher = Dispatcher::with_transport(Box::new(link), Arc::new(TokioClock), &config);

        let result = dispatcher
            .execute_within(
                Duration::from_secs(5),
                Command::SystemState,
                Bytes::new(),
                Command::SystemState,
            )
            .await;

        assert!(matches!(result, Err(Error::DeadlineElapsed(d)) if d == Duration::from_secs(5)));
    }
}
