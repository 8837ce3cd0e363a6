//! # Calibration Engine
//!
//! Interactively discovers a [`Mapping`] by watching for deliberate,
//! large-magnitude operator input.
//!
//! ## Sequence
//!
//! 1. For each calibrated channel (0..=3): capture a baseline snapshot, ask
//!    the operator to push the chosen control to its maximum, and wait until
//!    some unclaimed axis moves at least `threshold` away from the baseline.
//!    The winning axis is claimed; its polarity is recorded.
//! 2. Wait for a press of an unclaimed button for switch A, then switch B.
//! 3. Assemble the mapping.
//!
//! ## Detection rules
//!
//! - Claimed axes are treated as having zero displacement, so a control
//!   bound earlier can never be picked again even if the operator bumps it.
//! - When two axes move together the larger displacement wins; ties go to
//!   the lower index. The loser stays available for later channels.
//! - `inverted` is set when the winning axis moved below its baseline: the
//!   direction the operator calls "maximum" is numerically negative.
//! - Button detection is edge-triggered: only press events count, and events
//!   queued before a prompt are discarded.
//!
//! Every [`Calibrator::run`] starts from a fresh [`CalibrationSession`], so
//! repeated runs never inherit claims from an earlier one.
//!
//! There is no timeout: each step waits until the operator answers it.

use std::collections::BTreeSet;
use std::time::Duration;
use tracing::{debug, info};

use super::input::{ControllerEvent, InputSource};
use crate::config::CalibrationConfig;
use crate::error::{BridgeError, Result};
use crate::mapping::{AxisBinding, ButtonBindings, ButtonId, Mapping, CALIBRATED_AXES};

/// Default movement threshold on the normalized `-1.0..=1.0` scale
pub const DEFAULT_THRESHOLD: f32 = 0.6;

/// Transient bookkeeping for one calibration run
#[derive(Debug, Clone, Default)]
pub struct CalibrationSession {
    baseline: Vec<f32>,
    claimed_axes: BTreeSet<usize>,
    claimed_buttons: BTreeSet<ButtonId>,
    axes: Vec<AxisBinding>,
    buttons: Vec<ButtonId>,
}

impl CalibrationSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the reference snapshot used for axis detection
    pub fn rebaseline(&mut self, baseline: Vec<f32>) {
        self.baseline = baseline;
    }

    pub fn baseline(&self) -> &[f32] {
        &self.baseline
    }

    pub fn claimed_axes(&self) -> &BTreeSet<usize> {
        &self.claimed_axes
    }

    pub fn claimed_buttons(&self) -> &BTreeSet<ButtonId> {
        &self.claimed_buttons
    }

    /// Records `binding` for the next channel and claims its axis
    pub fn claim_axis(&mut self, binding: AxisBinding) {
        self.claimed_axes.insert(binding.physical_index);
        self.axes.push(binding);
    }

    /// Records `button` for the next switch and claims it
    pub fn claim_button(&mut self, button: ButtonId) {
        self.claimed_buttons.insert(button);
        self.buttons.push(button);
    }

    /// Builds the mapping once every channel and switch is bound
    ///
    /// # Errors
    ///
    /// Returns `MappingCorrupt` if the session is incomplete.
    pub fn finish(self) -> Result<Mapping> {
        let axes: [AxisBinding; CALIBRATED_AXES] = self.axes.try_into().map_err(|axes: Vec<_>| {
            BridgeError::MappingCorrupt(format!(
                "calibration bound {} of {} axes",
                axes.len(),
                CALIBRATED_AXES
            ))
        })?;

        let &[btn_a, btn_b] = self.buttons.as_slice() else {
            return Err(BridgeError::MappingCorrupt(format!(
                "calibration bound {} of 2 buttons",
                self.buttons.len()
            )));
        };

        Mapping::new(axes, ButtonBindings { btn_a, btn_b })
    }
}

/// Picks the axis the operator is deliberately moving, if any
///
/// Compares `current` against `baseline` for every axis not in `claimed`
/// and returns the one with the largest absolute displacement, provided that
/// displacement reaches `threshold`. Axes present in only one of the two
/// snapshots are ignored.
///
/// # Examples
///
/// ```
/// use std::collections::BTreeSet;
/// use elrs_gamepad::controller::calibration::detect_axis_movement;
///
/// let baseline = [0.0, 0.0, 0.0, 0.0];
/// let current = [0.0, 0.1, 0.9, 0.0];
/// let binding = detect_axis_movement(&baseline, &current, &BTreeSet::new(), 0.6).unwrap();
/// assert_eq!(binding.physical_index, 2);
/// assert!(!binding.inverted);
/// ```
#[must_use]
pub fn detect_axis_movement(
    baseline: &[f32],
    current: &[f32],
    claimed: &BTreeSet<usize>,
    threshold: f32,
) -> Option<AxisBinding> {
    let mut best: Option<(usize, f32)> = None;

    for (index, (&base, &now)) in baseline.iter().zip(current).enumerate() {
        let delta = if claimed.contains(&index) { 0.0 } else { now - base };
        // Strict comparison keeps the lowest index on ties
        if best.map_or(true, |(_, d)| delta.abs() > d.abs()) {
            best = Some((index, delta));
        }
    }

    let (index, delta) = best?;
    (delta.abs() >= threshold).then(|| AxisBinding::new(index, current[index] < baseline[index]))
}

/// Returns the first press of a button not in `claimed`
///
/// Releases and presses of claimed buttons are skipped.
#[must_use]
pub fn detect_button_press<I>(events: I, claimed: &BTreeSet<ButtonId>) -> Option<ButtonId>
where
    I: IntoIterator<Item = ControllerEvent>,
{
    events.into_iter().find_map(|event| match event {
        ControllerEvent::ButtonPressed(id) if !claimed.contains(&id) => Some(id),
        _ => None,
    })
}

/// Drives the interactive calibration sequence against an input source
#[derive(Debug)]
pub struct Calibrator<'a, S: InputSource> {
    source: &'a mut S,
    threshold: f32,
    poll_interval: Duration,
}

impl<'a, S: InputSource> Calibrator<'a, S> {
    pub fn new(source: &'a mut S, config: &CalibrationConfig) -> Self {
        Self {
            source,
            threshold: config.threshold,
            poll_interval: Duration::from_millis(config.poll_interval_ms),
        }
    }

    /// Runs the full sequence and returns the discovered mapping
    ///
    /// # Errors
    ///
    /// Returns an error only if the input source fails.
    pub async fn run(&mut self) -> Result<Mapping> {
        let mut session = CalibrationSession::new();

        for channel in 0..CALIBRATED_AXES {
            self.source.pump()?;
            session.rebaseline(self.source.axis_snapshot());

            announce(&format!(
                "Move the control you want to be **channel {}** fully FORWARD / RIGHT (max positive) and hold...",
                channel
            ));
            let binding = self.wait_for_axis(&session).await?;
            announce(&format!(
                "  Detected axis {} {}",
                binding.physical_index,
                if binding.inverted { "inverted" } else { "normal" }
            ));
            session.claim_axis(binding);
        }

        for prompt in [
            "Press the first button you'd like to map (e.g. ARM)...",
            "Press the second button (e.g. MODE)...",
        ] {
            self.discard_pending_events()?;
            announce(prompt);
            let button = self.wait_for_button(&session).await?;
            announce(&format!("  Detected button {}", button));
            session.claim_button(button);
        }

        let mapping = session.finish()?;
        announce("Calibration completed!");
        Ok(mapping)
    }

    async fn wait_for_axis(&mut self, session: &CalibrationSession) -> Result<AxisBinding> {
        loop {
            self.source.pump()?;
            let current = self.source.axis_snapshot();
            if let Some(binding) = detect_axis_movement(
                session.baseline(),
                &current,
                session.claimed_axes(),
                self.threshold,
            ) {
                debug!(
                    "Axis {} moved {:+.2} from baseline",
                    binding.physical_index,
                    current[binding.physical_index] - session.baseline()[binding.physical_index]
                );
                return Ok(binding);
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn wait_for_button(&mut self, session: &CalibrationSession) -> Result<ButtonId> {
        loop {
            self.source.pump()?;
            let events = self.source.poll_events();
            if let Some(button) = detect_button_press(events, session.claimed_buttons()) {
                return Ok(button);
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Drops presses made before the current prompt
    fn discard_pending_events(&mut self) -> Result<()> {
        self.source.pump()?;
        let stale = self.source.poll_events();
        if !stale.is_empty() {
            debug!("Discarded {} stale button events", stale.len());
        }
        Ok(())
    }
}

/// Shows an operator prompt
fn announce(message: &str) {
    println!("{}", message);
    info!("{}", message);
}
