//! Test doubles shared by the unit tests

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use mockall::mock;
use parking_lot::{Mutex, MutexGuard};

use neptun_core::{checksum, decode_state, frame, layout::LAYOUT, Command, Frame};
use neptun_transport::{Error, Result, Transport};
use neptun_types::DeviceState;

mock! {
    pub Link {}

    #[async_trait]
    impl Transport for Link {
        async fn connect(&mut self) -> Result<()>;
        async fn disconnect(&mut self) -> Result<()>;
        fn is_connected(&self) -> bool;
        async fn send(&mut self, data: &[u8]) -> Result<()>;
        async fn receive(&mut self, timeout: Duration) -> Result<BytesMut>;
        fn remote_addr(&self) -> String;
    }
}

/// `SYSTEM_STATE` response captured from an N4106: valve open, sensor 3
/// triggered, sensor 1 battery at 42%
pub fn state_block_hex() -> &'static str {
    concat!(
        "0254415200684900054E343130364D001136303A43353A41383A36463A35363A36",
        "41410001005300070103000000000473000C0301D60003026400020364004C0004",
        "02000000430014000000000100000000010000000001000000000144000A313439",
        "32333836313033570001043F0E",
    )
}

pub fn state_block() -> Vec<u8> {
    hex::decode(state_block_hex()).unwrap()
}

pub fn captured_state() -> DeviceState {
    decode_state(&state_block()).unwrap()
}

/// Encoded controller response
pub fn response(command: Command, payload: &[u8]) -> BytesMut {
    Frame::response(command, payload.to_vec()).unwrap().encode()
}

/// In-memory controller
///
/// Keeps a state block, applies write commands to it and answers queries
/// with the current block.
#[derive(Debug)]
pub struct Model {
    pub block: Vec<u8>,
    pub requests: Vec<Frame>,

    /// Apply valve commands to the reported position immediately
    pub valve_follows: bool,

    /// Upcoming state queries to leave unanswered
    pub dropped_queries: usize,

    connected: bool,
    pending: Option<BytesMut>,
}

impl Model {
    fn answer(&mut self, request: Frame) -> Option<BytesMut> {
        let reply = match request.command {
            Command::SystemState if self.dropped_queries > 0 => {
                self.dropped_queries -= 1;
                None
            }
            Command::SystemState => {
                let body = self.block.len() - Frame::CHECKSUM_SIZE;
                let crc = checksum::crc16_ccitt(&self.block[..body]);
                self.block[body..].copy_from_slice(&crc.to_be_bytes());
                Some(BytesMut::from(&self.block[..]))
            }
            Command::SetSystemState => {
                let values = &request.payload[3..7];
                if self.valve_follows {
                    self.block[LAYOUT.valve] = values[0];
                }
                self.block[LAYOUT.dry_mode] = values[1];
                self.block[LAYOUT.auto_close] = values[2];
                self.block[LAYOUT.line_modes] = values[3];
                Some(response(Command::SetSystemState, &[]))
            }
            Command::SetCounterValue => {
                let line = usize::from(request.payload[3]);
                let mut value = [0u8; 4];
                value.copy_from_slice(&request.payload[7..11]);
                let at = LAYOUT.lines[line - 1].counter;
                self.block[at..at + 4].copy_from_slice(&u32::from_le_bytes(value).to_be_bytes());
                Some(response(Command::SetCounterValue, &[]))
            }
        };

        self.requests.push(request);
        reply
    }

    /// Requests received for `command`, oldest first
    pub fn sent(&self, command: Command) -> Vec<Frame> {
        self.requests
            .iter()
            .filter(|frame| frame.command == command)
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct FakeController(Arc<Mutex<Model>>);

impl FakeController {
    pub fn new() -> Self {
        Self(Arc::new(Mutex::new(Model {
            block: state_block(),
            requests: Vec::new(),
            valve_follows: true,
            dropped_queries: 0,
            connected: false,
            pending: None,
        })))
    }

    pub fn model(&self) -> MutexGuard<'_, Model> {
        self.0.lock()
    }
}

#[async_trait]
impl Transport for FakeController {
    async fn connect(&mut self) -> Result<()> {
        self.0.lock().connected = true;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        let mut model = self.0.lock();
        model.connected = false;
        model.pending = None;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.0.lock().connected
    }

    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let request = frame::decode(data)?;
        let mut model = self.0.lock();
        let reply = model.answer(request);
        model.pending = reply;
        Ok(())
    }

    async fn receive(&mut self, timeout: Duration) -> Result<BytesMut> {
        self.0.lock().pending.take().ok_or(Error::Timeout(timeout))
    }

    fn remote_addr(&self) -> String {
        "fake:6350".to_string()
    }
}
