//! Byte-level port abstraction under [`super::ElrsSerial`]
//!
//! The link only ever writes: ELRS modules accept RC frames without
//! acknowledging them, so there is no read side here.

use async_trait::async_trait;
use std::io;
use tokio::io::AsyncWriteExt;

/// Write half of a serial link
#[async_trait]
pub trait SerialPortIO: Send {
    /// Write the whole buffer
    async fn write_all(&mut self, data: &[u8]) -> io::Result<()>;

    /// Push buffered bytes out to the device
    async fn flush(&mut self) -> io::Result<()>;
}

/// [`SerialPortIO`] over a native tokio-serial stream
pub struct TokioSerialPort {
    port: tokio_serial::SerialStream,
}

impl TokioSerialPort {
    pub fn new(port: tokio_serial::SerialStream) -> Self {
        Self { port }
    }
}

#[async_trait]
impl SerialPortIO for TokioSerialPort {
    async fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        self.port.write_all(data).await
    }

    async fn flush(&mut self) -> io::Result<()> {
        self.port.flush().await
    }
}

#[cfg(test)]
pub mod mocks {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Default)]
    struct MockState {
        writes: Vec<Vec<u8>>,
        flushes: usize,
        failing_writes: usize,
        flush_error: Option<io::ErrorKind>,
    }

    /// Recording port; clones share one log so a test can keep a handle
    /// after moving the port into the link
    #[derive(Debug, Clone, Default)]
    pub struct MockSerialPort {
        state: Arc<Mutex<MockState>>,
    }

    impl MockSerialPort {
        pub fn new() -> Self {
            Self::default()
        }

        /// Every buffer written so far, one entry per `write_all`
        pub fn writes(&self) -> Vec<Vec<u8>> {
            self.state.lock().unwrap().writes.clone()
        }

        pub fn flushes(&self) -> usize {
            self.state.lock().unwrap().flushes
        }

        /// Make the next `count` writes fail with `BrokenPipe`
        pub fn fail_next_writes(&self, count: usize) {
            self.state.lock().unwrap().failing_writes = count;
        }

        pub fn set_flush_error(&self, error: Option<io::ErrorKind>) {
            self.state.lock().unwrap().flush_error = error;
        }
    }

    #[async_trait]
    impl SerialPortIO for MockSerialPort {
        async fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
            let mut state = self.state.lock().unwrap();
            if state.failing_writes > 0 {
                state.failing_writes -= 1;
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "mock write failure"));
            }
            state.writes.push(data.to_vec());
            Ok(())
        }

        async fn flush(&mut self) -> io::Result<()> {
            let mut state = self.state.lock().unwrap();
            if let Some(kind) = state.flush_error {
                return Err(io::Error::new(kind, "mock flush failure"));
            }
            state.flushes += 1;
            Ok(())
        }
    }
}
