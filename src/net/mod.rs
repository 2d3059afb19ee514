//! Transport layer for I/O abstraction

use crate::error::Result;
use std::io::{Read, Write};
use std::net::TcpStream;

mod connection;
mod monitor;

pub use connection::Connection;
pub use monitor::{ConnectionMonitor, MonitorMode};

/// Transport trait for viewer communication
pub trait Transport: Send {
    /// Read data into buffer, returns number of bytes read
    ///
    /// Non-blocking transports return Ok(0) when nothing is pending.
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize>;

    /// Write data from buffer, returns number of bytes written
    fn write(&mut self, data: &[u8]) -> Result<usize>;

    /// Flush any pending writes (blocking until complete)
    fn flush(&mut self) -> Result<()>;

    /// Peer description for log lines, if the transport knows one
    fn peer(&self) -> Option<String> {
        None
    }
}

/// TCP stream transport
///
/// The stream is switched to non-blocking mode so read polls from the
/// server update loop never stall frame delivery.
pub struct TcpTransport {
    stream: TcpStream,
}

impl TcpTransport {
    pub fn new(stream: TcpStream) -> Result<Self> {
        stream.set_nodelay(true)?;
        stream.set_nonblocking(true)?;
        Ok(Self { stream })
    }
}

impl Transport for TcpTransport {
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
        match self.stream.read(buffer) {
            Ok(n) => Ok(n),
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        // Writes must be complete even on a non-blocking socket, so spin
        // through WouldBlock instead of surfacing a short write.
        let mut sent = 0;
        while sent < data.len() {
            match self.stream.write(&data[sent..]) {
                Ok(0) => return Err(std::io::Error::from(std::io::ErrorKind::WriteZero).into()),
                Ok(n) => sent += n,
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    std::thread::yield_now();
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(sent)
    }

    fn flush(&mut self) -> Result<()> {
        self.stream.flush()?;
        Ok(())
    }

    fn peer(&self) -> Option<String> {
        self.stream.peer_addr().ok().map(|a| a.to_string())
    }
}

/// Mock transport for unit testing
#[cfg(test)]
pub use mock::MockTransport;

#[cfg(test)]
pub mod mock {
    use super::Transport;
    use crate::error::Result;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Mock transport for unit testing
    #[derive(Clone)]
    pub struct MockTransport {
        inner: Arc<Mutex<MockTransportInner>>,
    }

    struct MockTransportInner {
        read_buffer: VecDeque<u8>,
        write_buffer: Vec<u8>,
    }

    impl MockTransport {
        /// Create a new mock transport
        pub fn new() -> Self {
            MockTransport {
                inner: Arc::new(Mutex::new(MockTransportInner {
                    read_buffer: VecDeque::new(),
                    write_buffer: Vec::new(),
                })),
            }
        }

        /// Inject data to be read
        pub fn inject_read(&self, data: &[u8]) {
            let mut inner = self.inner.lock().unwrap();
            inner.read_buffer.extend(data);
        }

        /// Get all written data
        pub fn get_written(&self) -> Vec<u8> {
            let inner = self.inner.lock().unwrap();
            inner.write_buffer.clone()
        }
    }

    impl Transport for MockTransport {
        fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
            let mut inner = self.inner.lock().unwrap();
            let available = inner.read_buffer.len().min(buffer.len());

            for item in buffer.iter_mut().take(available) {
                *item = inner.read_buffer.pop_front().unwrap();
            }

            Ok(available)
        }

        fn write(&mut self, data: &[u8]) -> Result<usize> {
            let mut inner = self.inner.lock().unwrap();
            inner.write_buffer.extend_from_slice(data);
            Ok(data.len())
        }

        fn flush(&mut self) -> Result<()> {
            Ok(())
        }

        fn peer(&self) -> Option<String> {
            Some("mock-viewer".to_string())
        }
    }

    impl Default for MockTransport {
        fn default() -> Self {
            Self::new()
        }
    }
}
