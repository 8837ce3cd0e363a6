//! # Serial Communication Module
//!
//! Drives an ExpressLRS transmitter module over a USB serial port.
//!
//! This module handles:
//! - Opening the configured port (8N1, no flow control)
//! - Encoding each channel frame as a CRSF RC channels packet
//! - Writing and flushing packets
//! - Reopening the port after a failure

pub mod port_trait;

use async_trait::async_trait;
use std::time::Duration;
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info};

use crate::config::SerialConfig;
use crate::crsf::encoder::encode_rc_channels_frame;
use crate::crsf::protocol::ChannelFrame;
use crate::error::{BridgeError, Result};
use crate::link::LinkSink;
use port_trait::{SerialPortIO, TokioSerialPort};

/// Opens a port by path and baud rate
pub type PortOpener = fn(&str, u32) -> Result<Box<dyn SerialPortIO>>;

/// ELRS Serial Link
///
/// Owns the port handle. After a failed write the handle is dropped and
/// [`LinkSink::reconnect`] opens a fresh one.
pub struct ElrsSerial {
    port: Option<Box<dyn SerialPortIO>>,
    device_path: String,
    baud_rate: u32,
    write_timeout: Duration,
    opener: PortOpener,
}

impl std::fmt::Debug for ElrsSerial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElrsSerial")
            .field("device_path", &self.device_path)
            .field("baud_rate", &self.baud_rate)
            .field("connected", &self.port.is_some())
            .finish_non_exhaustive()
    }
}

impl ElrsSerial {
    /// Open the ELRS module described by `config`
    ///
    /// # Arguments
    ///
    /// * `config` - Port path, baud rate and write timeout
    ///
    /// # Errors
    ///
    /// Returns `Serial` error if the port cannot be opened
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use elrs_gamepad::config::SerialConfig;
    /// use elrs_gamepad::serial::ElrsSerial;
    ///
    /// #[tokio::main]
    /// async fn main() -> anyhow::Result<()> {
    ///     let serial = ElrsSerial::open(&SerialConfig::default())?;
    ///     println!("Connected to {}", serial.device_path());
    ///     Ok(())
    /// }
    /// ```
    pub fn open(config: &SerialConfig) -> Result<Self> {
        Self::open_with(config, open_native)
    }

    /// Open with a custom port opener, used again on every reconnect
    pub fn open_with(config: &SerialConfig, opener: PortOpener) -> Result<Self> {
        let port = opener(&config.port, config.baud_rate)?;
        info!("Opened ELRS module at {} ({} baud)", config.port, config.baud_rate);

        Ok(Self {
            port: Some(port),
            device_path: config.port.clone(),
            baud_rate: config.baud_rate,
            write_timeout: Duration::from_millis(config.timeout_ms),
            opener,
        })
    }

    pub fn device_path(&self) -> &str {
        &self.device_path
    }

    pub fn is_connected(&self) -> bool {
        self.port.is_some()
    }

    /// Write one complete packet and flush it
    ///
    /// # Errors
    ///
    /// Returns `Serial` error if the port is closed, or the write fails or
    /// does not complete within the write timeout. A failed write closes
    /// the port.
    pub async fn send_packet(&mut self, packet: &[u8]) -> Result<()> {
        let port = self
            .port
            .as_mut()
            .ok_or_else(|| BridgeError::Serial(format!("{} is not open", self.device_path)))?;

        let written = tokio::time::timeout(self.write_timeout, async {
            port.write_all(packet).await?;
            port.flush().await
        })
        .await;

        let failure = match written {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("timed out after {:?}", self.write_timeout),
        };

        self.port = None;
        Err(BridgeError::Serial(format!(
            "Failed to write to {}: {}",
            self.device_path, failure
        )))
    }
}

#[async_trait]
impl LinkSink for ElrsSerial {
    async fn send_frame(&mut self, frame: &ChannelFrame) -> Result<()> {
        let packet = encode_rc_channels_frame(frame);
        self.send_packet(&packet).await
    }

    async fn reconnect(&mut self) -> Result<()> {
        self.port = None;
        debug!("Reopening {}", self.device_path);
        self.port = Some((self.opener)(&self.device_path, self.baud_rate)?);
        Ok(())
    }

    fn describe(&self) -> String {
        format!("{} @ {} baud", self.device_path, self.baud_rate)
    }
}

/// Opens a real serial device with CRSF line settings
fn open_native(path: &str, baud_rate: u32) -> Result<Box<dyn SerialPortIO>> {
    let stream = tokio_serial::new(path, baud_rate)
        .data_bits(tokio_serial::DataBits::Eight)
        .parity(tokio_serial::Parity::None)
        .stop_bits(tokio_serial::StopBits::One)
        .flow_control(tokio_serial::FlowControl::None)
        .open_native_async()
        .map_err(|e| BridgeError::Serial(format!("Failed to open {}: {}", path, e)))?;

    Ok(Box::new(TokioSerialPort::new(stream)))
}

#[cfg(test)]
mod tests {
    use super::port_trait::mocks::MockSerialPort;
    use super::*;
    use crate::crsf::crc::crc8_dvb_s2;
    use crate::crsf::protocol::{CRSF_RC_CHANNELS_FRAME_SIZE, CRSF_SYNC_BYTE, NEUTRAL_FRAME};
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    // Openers are plain fns, so the shared mock lives in statics. Each test
    // uses its own pair to stay independent under the parallel runner.
    static SEND_PORT: Mutex<Option<MockSerialPort>> = Mutex::new(None);
    static RECONNECT_PORT: Mutex<Option<MockSerialPort>> = Mutex::new(None);
    static RECONNECT_OPENS: AtomicUsize = AtomicUsize::new(0);
    static FAILED_OPENS: AtomicUsize = AtomicUsize::new(0);

    fn send_opener(_: &str, _: u32) -> Result<Box<dyn SerialPortIO>> {
        let port = SEND_PORT.lock().unwrap().get_or_insert_with(MockSerialPort::new).clone();
        Ok(Box::new(port))
    }

    fn reconnect_opener(_: &str, _: u32) -> Result<Box<dyn SerialPortIO>> {
        RECONNECT_OPENS.fetch_add(1, Ordering::SeqCst);
        let port = RECONNECT_PORT.lock().unwrap().get_or_insert_with(MockSerialPort::new).clone();
        Ok(Box::new(port))
    }

    fn mock_config(port: &str, baud_rate: u32) -> SerialConfig {
        SerialConfig {
            port: port.to_string(),
            baud_rate,
            ..SerialConfig::default()
        }
    }

    fn flaky_opener(path: &str, _: u32) -> Result<Box<dyn SerialPortIO>> {
        // First open succeeds, later ones fail
        if FAILED_OPENS.fetch_add(1, Ordering::SeqCst) == 0 {
            Ok(Box::new(MockSerialPort::new()))
        } else {
            Err(BridgeError::Serial(format!("Failed to open {}", path)))
        }
    }

    #[tokio::test]
    async fn test_open_invalid_path_returns_error() {
        let result = ElrsSerial::open(&mock_config("/dev/nonexistent_serial_device_12345", 921_600));

        match result {
            Err(BridgeError::Serial(msg)) => {
                assert!(msg.contains("/dev/nonexistent_serial_device_12345"));
                assert!(msg.contains("Failed to open"));
            }
            other => panic!("Expected Serial error, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_send_frame_writes_crsf_packet() {
        let mut serial = ElrsSerial::open_with(&mock_config("/dev/mock0", 921_600), send_opener).unwrap();
        let port = SEND_PORT.lock().unwrap().clone().unwrap();

        let mut frame = NEUTRAL_FRAME;
        frame[0] = 2047;
        frame[1] = 0;
        serial.send_frame(&frame).await.unwrap();

        let writes = port.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(port.flushes(), 1);

        let packet = &writes[0];
        assert_eq!(packet.len(), CRSF_RC_CHANNELS_FRAME_SIZE);
        assert_eq!(packet[0], CRSF_SYNC_BYTE);
        assert_eq!(packet[1], 0x18);
        assert_eq!(packet[2], 0x16);
        assert_eq!(packet[25], crc8_dvb_s2(&packet[2..25]));
        assert_eq!(packet.as_slice(), &encode_rc_channels_frame(&frame)[..]);
        assert_eq!(serial.describe(), "/dev/mock0 @ 921600 baud");
    }

    #[tokio::test]
    async fn test_failed_write_closes_port_until_reconnect() {
        let mut serial = ElrsSerial::open_with(&mock_config("/dev/mock1", 420_000), reconnect_opener).unwrap();
        let port = RECONNECT_PORT.lock().unwrap().clone().unwrap();
        port.fail_next_writes(1);

        assert!(serial.send_frame(&NEUTRAL_FRAME).await.is_err());
        assert!(!serial.is_connected());

        // Still closed: no write reaches the port
        assert!(serial.send_frame(&NEUTRAL_FRAME).await.is_err());
        assert!(port.writes().is_empty());

        serial.reconnect().await.unwrap();
        assert!(serial.is_connected());
        assert_eq!(RECONNECT_OPENS.load(Ordering::SeqCst), 2);

        serial.send_frame(&NEUTRAL_FRAME).await.unwrap();
        assert_eq!(port.writes().len(), 1);
    }

    #[tokio::test]
    async fn test_flush_failure_is_a_send_failure() {
        let port = MockSerialPort::new();
        port.set_flush_error(Some(io::ErrorKind::TimedOut));
        let mut serial = ElrsSerial {
            port: Some(Box::new(port.clone())),
            device_path: "/dev/mock2".to_string(),
            baud_rate: 921_600,
            write_timeout: Duration::from_millis(100),
            opener: open_native,
        };

        let err = serial.send_frame(&NEUTRAL_FRAME).await.unwrap_err();
        assert!(matches!(err, BridgeError::Serial(_)));
        assert!(!serial.is_connected());
    }

    #[tokio::test]
    async fn test_failed_reconnect_leaves_port_closed() {
        let mut serial = ElrsSerial::open_with(&mock_config("/dev/mock3", 921_600), flaky_opener).unwrap();

        assert!(serial.reconnect().await.is_err());
        assert!(!serial.is_connected());
    }

    // Integration test - only runs if ELRS hardware is connected
    #[tokio::test]
    #[ignore] // Run with: cargo test -- --ignored
    async fn test_send_frame_with_real_hardware() {
        match ElrsSerial::open(&SerialConfig::default()) {
            Ok(mut serial) => {
                let result = serial.send_frame(&NEUTRAL_FRAME).await;
                assert!(result.is_ok(), "Failed to send frame: {:?}", result);
            }
            Err(e) => println!("No ELRS hardware detected ({})", e),
        }
    }
}
