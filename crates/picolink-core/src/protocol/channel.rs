//! Byte channel abstraction
//!
//! The engine consumes exactly two transport primitives: a blocking byte
//! source and a byte sink. Anything that delivers bytes in order can carry
//! the protocol, whether a USB CDC serial port, a TCP bridge, or an
//! in-memory buffer in tests.

use serialport::SerialPort;
use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::time::{Duration, Instant};

use super::{serial, ProtocolError, DEFAULT_BAUD_RATE};

/// Blocking byte transport consumed by the protocol engine
pub trait ByteChannel {
    /// Read one byte, blocking until the transport delivers it.
    ///
    /// A stalled transport stalls the caller indefinitely unless the
    /// implementation enforces a bounded wait.
    fn get(&mut self) -> Result<u8, ProtocolError>;

    /// Write one byte to the transport
    fn put(&mut self, byte: u8) -> Result<(), ProtocolError>;
}

/// Serial port channel for USB CDC devices
pub struct SerialChannel {
    port: Box<dyn SerialPort>,
    /// Bound on how long `get` waits for a byte; `None` blocks forever
    read_timeout: Option<Duration>,
}

impl SerialChannel {
    /// Wrap an already-opened serial port
    pub fn new(port: Box<dyn SerialPort>) -> Self {
        Self {
            port,
            read_timeout: None,
        }
    }

    /// Open and configure a serial port by name
    pub fn open(name: &str, baud_rate: Option<u32>) -> Result<Self, ProtocolError> {
        let mut port = serial::open_port(name, baud_rate.or(Some(DEFAULT_BAUD_RATE)))?;
        serial::configure_port(port.as_mut())?;
        serial::clear_buffers(port.as_mut())?;
        Ok(Self::new(port))
    }

    /// Bound the blocking wait in `get`.
    ///
    /// The protocol itself has no timeout: by design a silent peer blocks
    /// the receiver forever. Setting a bound here is an opt-in enhancement
    /// for hosts that cannot afford to hang.
    pub fn set_read_timeout(&mut self, timeout: Option<Duration>) {
        self.read_timeout = timeout;
    }
}

impl ByteChannel for SerialChannel {
    fn get(&mut self) -> Result<u8, ProtocolError> {
        let start = Instant::now();
        let mut buf = [0u8; 1];
        loop {
            match self.port.read(&mut buf) {
                Ok(1) => return Ok(buf[0]),
                Ok(_) => {}
                Err(ref e)
                    if e.kind() == io::ErrorKind::TimedOut
                        || e.kind() == io::ErrorKind::WouldBlock =>
                {
                    // The port is opened with a short timeout so this arm
                    // is the idle path; keep polling
                }
                Err(e) => return Err(ProtocolError::SerialError(e.to_string())),
            }

            if let Some(timeout) = self.read_timeout {
                if start.elapsed() > timeout {
                    return Err(ProtocolError::Timeout);
                }
            }
        }
    }

    fn put(&mut self, byte: u8) -> Result<(), ProtocolError> {
        self.port
            .write_all(&[byte])
            .map_err(|e| ProtocolError::SerialError(e.to_string()))
    }
}

/// TCP stream channel, for serial-over-network bridges
pub struct TcpChannel {
    stream: TcpStream,
}

impl TcpChannel {
    /// Wrap a connected TCP stream
    pub fn new(stream: TcpStream) -> Self {
        Self { stream }
    }

    /// Bound the blocking wait in `get`; `None` blocks forever
    pub fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<(), ProtocolError> {
        self.stream.set_read_timeout(timeout)?;
        Ok(())
    }
}

impl ByteChannel for TcpChannel {
    fn get(&mut self) -> Result<u8, ProtocolError> {
        let mut buf = [0u8; 1];
        loop {
            match self.stream.read(&mut buf) {
                Ok(0) => {
                    return Err(ProtocolError::IoError(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "connection closed",
                    )))
                }
                Ok(_) => return Ok(buf[0]),
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(ref e)
                    if e.kind() == io::ErrorKind::TimedOut
                        || e.kind() == io::ErrorKind::WouldBlock =>
                {
                    return Err(ProtocolError::Timeout)
                }
                Err(e) => return Err(ProtocolError::IoError(e)),
            }
        }
    }

    fn put(&mut self, byte: u8) -> Result<(), ProtocolError> {
        self.stream.write_all(&[byte])?;
        Ok(())
    }
}
