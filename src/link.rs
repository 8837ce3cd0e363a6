//! # Link Sink
//!
//! The transmitter side of the bridge. The runtime loop publishes each new
//! [`ChannelFrame`] into a [`tokio::sync::watch`] channel; [`run_link`] runs
//! as its own task, picks up whatever frame is latest at each tick and
//! hands it to a [`LinkSink`].
//!
//! Only the newest frame matters, so there is no queue: a slow link simply
//! skips intermediate frames. Transmission errors stay inside this task,
//! which backs off and asks the sink to reconnect.

use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::crsf::protocol::ChannelFrame;
use crate::error::Result;

/// Destination for channel frames
#[async_trait]
pub trait LinkSink: Send {
    /// Transmit one frame
    ///
    /// # Errors
    ///
    /// Returns an error if the frame could not be handed to the transmitter.
    async fn send_frame(&mut self, frame: &ChannelFrame) -> Result<()>;

    /// Drop and re-establish the underlying connection
    ///
    /// # Errors
    ///
    /// Returns an error if the connection is still unavailable.
    async fn reconnect(&mut self) -> Result<()>;

    /// Human-readable name of the destination, for logs
    fn describe(&self) -> String;
}

/// Counters reported when [`run_link`] ends
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStats {
    pub frames_sent: u64,
    pub send_failures: u64,
    pub reconnects: u64,
}

/// Transmits the latest published frame every `period` until the sender
/// side of `frames` is dropped
///
/// # Arguments
///
/// * `sink` - Link to transmit on
/// * `frames` - Receiver of the runtime loop's latest frame
/// * `period` - Transmission cadence
/// * `reconnect_delay` - Pause after a failed send before reconnecting
pub async fn run_link<S: LinkSink>(
    mut sink: S,
    mut frames: watch::Receiver<ChannelFrame>,
    period: Duration,
    reconnect_delay: Duration,
) -> LinkStats {
    let mut stats = LinkStats::default();
    let mut ticker = time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!("Link started on {} ({:?} period)", sink.describe(), period);

    loop {
        ticker.tick().await;

        // Err means the runtime loop has gone away
        if frames.has_changed().is_err() {
            break;
        }
        let frame = *frames.borrow_and_update();

        match sink.send_frame(&frame).await {
            Ok(()) => {
                stats.frames_sent += 1;
                if stats.frames_sent % 1000 == 0 {
                    debug!("Sent {} frames", stats.frames_sent);
                }
            }
            Err(e) => {
                stats.send_failures += 1;
                warn!("Send on {} failed: {}", sink.describe(), e);

                time::sleep(reconnect_delay).await;
                match sink.reconnect().await {
                    Ok(()) => {
                        stats.reconnects += 1;
                        info!("Reconnected to {}", sink.describe());
                    }
                    Err(e) => warn!("Reconnect to {} failed: {}", sink.describe(), e),
                }
            }
        }
    }

    info!(
        "Link stopped: {} frames sent, {} failures, {} reconnects",
        stats.frames_sent, stats.send_failures, stats.reconnects
    );
    stats
}
