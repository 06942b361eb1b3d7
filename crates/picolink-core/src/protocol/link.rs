//! Link engine
//!
//! Owns the transport channel and the connection state; builds and sends
//! outbound frames and runs the blocking receive state machine that parses,
//! validates, and dispatches inbound frames.
//!
//! Validation failures on inbound frames follow a report-but-proceed
//! policy: the engine replies with an acknowledgment carrying the matching
//! error code, logs the problem, and then dispatches the frame anyway. This
//! reproduces the device firmware's behavior faithfully; the consequence is
//! that a corrupted frame is still acted upon.

use serde::{Deserialize, Serialize};

use super::{
    AckCode, ByteChannel, Command, Packet, ProtocolError, DEFAULT_BAUD_RATE, END_MARKER,
    FRAME_OVERHEAD, MAX_PAYLOAD_SIZE, PROTOCOL_VERSION, START_MARKER,
};

/// Connection state of the link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkState {
    /// No open/close handshake has completed
    Disconnected,
    /// An open frame has been accepted
    Connected,
}

/// Link configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkConfig {
    /// Serial port name
    pub port_name: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Optional bound on the blocking byte wait, in milliseconds.
    /// `None` waits forever, which is the protocol's native behavior.
    pub read_timeout_ms: Option<u64>,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            port_name: String::new(),
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout_ms: None,
        }
    }
}

/// Dispatch outcome of one received frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Acknowledgment received; carries the raw code byte, if any
    Ack(Option<u8>),
    /// Data frame; the payload, reproduced exactly
    Data(Vec<u8>),
    /// Open accepted; the link is now connected
    Opened,
    /// Open received while already connected; OPENED ack sent
    RedundantOpen,
    /// Close accepted; the link is now disconnected
    Closed,
    /// Close received while already disconnected; CLOSED ack sent
    RedundantClose,
    /// Echo request; the payload was sent back via the data primitive
    Echoed(Vec<u8>),
    /// Diagnostics request; the external hook was invoked
    Diagnostics,
    /// Command byte outside the recognized set; TYPE ack sent
    Unknown(u8),
}

/// One fully received and dispatched frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Received {
    /// Frame length as declared in the header
    pub frame_len: usize,
    /// What the dispatch state did with it
    pub action: Action,
}

/// Protocol engine over a byte channel
///
/// Single execution context: sends and receives never overlap, and the
/// receive path blocks until a whole frame has been consumed.
pub struct Link<C: ByteChannel> {
    /// Transport channel
    channel: C,
    /// Connection state, owned by the engine instance
    state: LinkState,
    /// External diagnostics hook, invoked on a 't' frame
    diagnostics: Option<Box<dyn FnMut() + Send>>,
    /// Metrics: cumulative bytes/frames sent & received
    tx_bytes: u64,
    rx_bytes: u64,
    tx_frames: u64,
    rx_frames: u64,
}

impl Link<super::SerialChannel> {
    /// Open a serial port per the configuration and create a link over it
    pub fn open(config: &LinkConfig) -> Result<Self, ProtocolError> {
        let mut channel = super::SerialChannel::open(&config.port_name, Some(config.baud_rate))?;
        if let Some(ms) = config.read_timeout_ms {
            channel.set_read_timeout(Some(std::time::Duration::from_millis(ms)));
        }
        Ok(Link::new(channel))
    }
}

impl<C: ByteChannel> Link<C> {
    /// Create a new link over a channel, initially disconnected
    pub fn new(channel: C) -> Self {
        Self {
            channel,
            state: LinkState::Disconnected,
            diagnostics: None,
            tx_bytes: 0,
            rx_bytes: 0,
            tx_frames: 0,
            rx_frames: 0,
        }
    }

    /// Get current connection state
    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Get cumulative tx/rx bytes and frame counters. Byte counters track
    /// traffic as written to and consumed from the channel.
    pub fn counters(&self) -> (u64, u64, u64, u64) {
        (self.tx_bytes, self.rx_bytes, self.tx_frames, self.rx_frames)
    }

    /// Install the diagnostics hook invoked on a 't' frame.
    ///
    /// The hook is an external collaborator (typically a self-test
    /// harness); the engine only invokes it.
    pub fn set_diagnostics_hook(&mut self, hook: impl FnMut() + Send + 'static) {
        self.diagnostics = Some(Box::new(hook));
    }

    /// Access the underlying channel
    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    // --- Send family ---------------------------------------------------

    /// Write a frame to the channel one byte at a time, in order.
    /// Returns the total frame length written.
    ///
    /// Payloads beyond [`MAX_PAYLOAD_SIZE`] are rejected before encoding;
    /// the length field could not describe the resulting frame.
    fn send_frame(&mut self, packet: Packet) -> Result<usize, ProtocolError> {
        if packet.payload.len() > MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::PayloadTooLarge(packet.payload.len()));
        }
        let bytes = packet.to_bytes();
        for &b in &bytes {
            self.channel.put(b)?;
        }
        self.tx_bytes = self.tx_bytes.saturating_add(bytes.len() as u64);
        self.tx_frames = self.tx_frames.saturating_add(1);
        tracing::debug!(len = bytes.len(), command = packet.command, "frame sent");
        Ok(bytes.len())
    }

    /// Send a data frame carrying the payload
    pub fn send_data(&mut self, payload: &[u8]) -> Result<usize, ProtocolError> {
        self.send_frame(Packet::new(Command::Data, payload.to_vec()))
    }

    /// Send an echo-request frame carrying the payload
    pub fn send_echo(&mut self, payload: &[u8]) -> Result<usize, ProtocolError> {
        self.send_frame(Packet::new(Command::Echo, payload.to_vec()))
    }

    /// Send an acknowledgment frame carrying a one-byte error code
    pub fn send_ack(&mut self, code: AckCode) -> Result<usize, ProtocolError> {
        self.send_frame(Packet::new(Command::Ack, vec![code.code()]))
    }

    /// Send an open frame
    pub fn send_open(&mut self) -> Result<usize, ProtocolError> {
        self.send_frame(Packet::new(Command::Open, Vec::new()))
    }

    /// Send a close frame
    pub fn send_close(&mut self) -> Result<usize, ProtocolError> {
        self.send_frame(Packet::new(Command::Close, Vec::new()))
    }

    /// Send a diagnostics-request frame
    pub fn send_diagnostics_request(&mut self) -> Result<usize, ProtocolError> {
        self.send_frame(Packet::new(Command::Diagnostics, Vec::new()))
    }

    // --- Receive state machine -----------------------------------------

    /// Receive one frame, dispatch it, and return the declared frame
    /// length. Blocks until a whole frame has been consumed.
    pub fn receive_packet(&mut self) -> Result<usize, ProtocolError> {
        Ok(self.receive()?.frame_len)
    }

    /// Receive one frame and return the dispatch outcome alongside the
    /// declared frame length.
    ///
    /// States run strictly in order with no branching back: sync on the
    /// start marker, read the length, validate the version, read the
    /// command and payload, verify the checksum, verify the end marker,
    /// dispatch.
    pub fn receive(&mut self) -> Result<Received, ProtocolError> {
        // Sync: discard until the start marker appears
        loop {
            let byte = self.channel.get()?;
            if byte == START_MARKER {
                break;
            }
            tracing::trace!(byte, "discarding byte while syncing");
        }

        // Declared total frame length, big-endian
        let len_hi = self.channel.get()?;
        let len_lo = self.channel.get()?;
        let frame_len = u16::from_be_bytes([len_hi, len_lo]) as usize;

        // Reconstruct the frame as it was transmitted, with the CRC slot
        // zeroed and the end marker assumed, so the check runs over a
        // fresh buffer rather than mutating anything received
        let mut frame = Vec::with_capacity(frame_len.max(FRAME_OVERHEAD));
        frame.push(START_MARKER);
        frame.push(len_hi);
        frame.push(len_lo);

        let version = self.channel.get()?;
        frame.push(version);
        if version != PROTOCOL_VERSION {
            tracing::warn!(got = version, expected = PROTOCOL_VERSION, "wrong version");
            self.send_ack(AckCode::Version)?;
        }

        let command = self.channel.get()?;
        frame.push(command);

        // Exactly length - overhead payload bytes; a length below the
        // overhead reads none and is caught by the checks below
        let payload_len = frame_len.saturating_sub(FRAME_OVERHEAD);
        let mut payload = Vec::with_capacity(payload_len);
        for _ in 0..payload_len {
            payload.push(self.channel.get()?);
        }
        frame.extend_from_slice(&payload);

        // Checksum verify over the reconstructed frame
        let received_crc = self.channel.get()?;
        frame.push(0);
        frame.push(END_MARKER);
        let computed_crc = super::compute_crc(&frame);
        if received_crc != computed_crc {
            tracing::warn!(
                got = received_crc,
                expected = computed_crc,
                "incorrect crc"
            );
            self.send_ack(AckCode::Crc)?;
        }

        // End-marker verify
        let end = self.channel.get()?;
        if end != END_MARKER {
            tracing::warn!(got = end, "missing end marker");
            self.send_ack(AckCode::Ending)?;
        }

        // Count bytes actually consumed from the channel, not the declared
        // length, which a malformed header may understate
        self.rx_bytes = self
            .rx_bytes
            .saturating_add((FRAME_OVERHEAD + payload_len) as u64);
        self.rx_frames = self.rx_frames.saturating_add(1);

        // Dispatch runs regardless of the checks above: report but proceed
        let action = self.dispatch(command, payload)?;

        Ok(Received { frame_len, action })
    }

    /// Execute the action selected by the command byte
    fn dispatch(&mut self, command: u8, payload: Vec<u8>) -> Result<Action, ProtocolError> {
        match Command::from_byte(command) {
            Some(Command::Ack) => {
                let code = payload.first().copied();
                match code {
                    Some(0) => tracing::info!("success"),
                    Some(1) => tracing::info!("fail"),
                    Some(other) => match AckCode::from_byte(other) {
                        Some(known) => tracing::info!(code = other, "ack: {}", known.describe()),
                        None => tracing::warn!(code = other, "unrecognized ack code"),
                    },
                    None => tracing::warn!("ack frame without a code byte"),
                }
                Ok(Action::Ack(code))
            }
            Some(Command::Data) => {
                tracing::info!("{}", String::from_utf8_lossy(&payload));
                Ok(Action::Data(payload))
            }
            Some(Command::Open) => {
                if self.state == LinkState::Connected {
                    self.send_ack(AckCode::Opened)?;
                    Ok(Action::RedundantOpen)
                } else {
                    self.state = LinkState::Connected;
                    self.send_open()?;
                    tracing::debug!("connection opened");
                    Ok(Action::Opened)
                }
            }
            Some(Command::Close) => {
                if self.state == LinkState::Connected {
                    self.state = LinkState::Disconnected;
                    self.send_close()?;
                    tracing::debug!("connection closed");
                    Ok(Action::Closed)
                } else {
                    self.send_ack(AckCode::Closed)?;
                    Ok(Action::RedundantClose)
                }
            }
            Some(Command::Echo) => {
                self.send_data(&payload)?;
                Ok(Action::Echoed(payload))
            }
            Some(Command::Diagnostics) => {
                if let Some(hook) = self.diagnostics.as_mut() {
                    hook();
                }
                Ok(Action::Diagnostics)
            }
            None => {
                tracing::warn!(command, "unknown command");
                self.send_ack(AckCode::Type)?;
                Ok(Action::Unknown(command))
            }
        }
    }
}
