//! Experiment orchestration.
//!
//! Connects to the instrument, prepares the channel, runs the configured
//! technique and drains data and firmware messages on two background
//! threads, the same split the vendor sample applications use (one
//! `BL_GetData` poller, one `BL_GetMessage` poller).

use crate::config::ExperimentConfig;
use anyhow::{Context, Result};
use crossbeam::channel::{Receiver, Sender};
use lib_eclib_ffi::{default_library_name, ChannelData, DataPoint, EclBinder, EclDevice, EclError};
use lib_types::{ChannelState, TechniqueId};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Experiment orchestrator.
pub struct Orchestrator {
    config: ExperimentConfig,
}

/// Everything recorded during one experiment run.
#[derive(Debug)]
pub struct ExperimentResults {
    pub technique: TechniqueId,

    /// Column names of the decoded data, set by the first buffer.
    pub fields: Vec<String>,

    pub points: Vec<DataPoint>,

    /// Firmware messages in arrival order.
    pub messages: Vec<String>,

    /// Wall-clock duration of the acquisition (s).
    pub duration_s: f64,

    /// False when the run was cut short by the duration cap.
    pub completed: bool,
}

enum Event {
    Data(ChannelData),
    Message(String),
    /// The data poller hit an API error and gave up.
    Failed(EclError),
}

impl Orchestrator {
    pub fn new(config: ExperimentConfig) -> Result<Self> {
        Ok(Self { config })
    }

    /// Run the configured experiment to completion.
    pub fn run(&self) -> Result<ExperimentResults> {
        tracing::info!("Starting experiment: {}", self.config.name);

        let mut binder = EclBinder::new();
        let library = match &self.config.library {
            Some(path) => binder.initialize(path),
            None => binder.initialize(default_library_name()),
        }
        .context("Failed to load the EClib library")?;

        tracing::info!(version = %library.lib_version()?, "EClib ready");

        let device = EclDevice::connect(
            &library,
            &self.config.device.address,
            self.config.device.timeout_s,
        )
        .with_context(|| format!("Failed to connect to {}", self.config.device.address))?;
        tracing::info!("{}", device.info());

        let channel = self.config.device.channel;
        self.prepare_channel(&device, channel)?;

        let ecc_file = self.config.technique.ecc_file(device.is_vmp4_series());
        let params = self.config.technique.tech_params();
        device
            .load_technique(channel, &ecc_file, &params, true, true)
            .with_context(|| format!("Failed to load technique {ecc_file}"))?;

        device.start_channel(channel)?;
        let started = Instant::now();
        tracing::info!(channel, ecc_file, "Channel started");

        let results = match self.collect(&device, channel) {
            Ok(results) => results,
            Err(e) => {
                // The technique may still be running on the instrument.
                if let Err(stop_err) = device.stop_channel(channel) {
                    tracing::warn!(channel, error = %stop_err, "Stop after poll failure failed");
                }
                return Err(e);
            }
        };
        let duration_s = started.elapsed().as_secs_f64();

        if !results.completed {
            tracing::warn!("Duration cap reached, stopping channel");
            device.stop_channel(channel)?;
        }

        device.disconnect().context("Failed to disconnect")?;
        binder.teardown();

        tracing::info!(
            points = results.points.len(),
            messages = results.messages.len(),
            duration_s,
            "Experiment complete"
        );
        Ok(ExperimentResults {
            duration_s,
            ..results
        })
    }

    /// Verify the channel exists and carries the kernel firmware,
    /// loading it when the configuration allows.
    fn prepare_channel(&self, device: &EclDevice, channel: u8) -> Result<()> {
        if !device.is_channel_plugged(channel) {
            anyhow::bail!("Channel {} is not plugged", channel);
        }

        let mut info = device.channel_info(channel)?;
        if !info.is_kernel_loaded() && self.config.device.load_firmware {
            tracing::info!(channel, "Loading kernel firmware");
            let results = device
                .load_firmware(&[channel], false, None)
                .context("Firmware load failed")?;
            tracing::debug!(?results, "Firmware load results");
            info = device.channel_info(channel)?;
        }
        if !info.is_kernel_loaded() {
            anyhow::bail!(
                "Channel {} does not run the kernel firmware (found {:?})",
                channel,
                info.firmware_code
            );
        }

        if info.state.is_running() {
            anyhow::bail!("Channel {} is already running a technique", channel);
        }
        Ok(())
    }

    /// Poll the channel until it stops, collecting data and messages.
    fn collect(&self, device: &EclDevice, channel: u8) -> Result<ExperimentResults> {
        let polling = self.config.polling;
        let deadline = (polling.max_duration_s > 0)
            .then(|| Instant::now() + Duration::from_secs(polling.max_duration_s));

        let stop = AtomicBool::new(false);
        let timed_out = AtomicBool::new(false);
        let (tx, rx) = crossbeam::channel::unbounded();

        let mut results = ExperimentResults {
            technique: self.config.technique.technique_id(),
            fields: Vec::new(),
            points: Vec::new(),
            messages: Vec::new(),
            duration_s: 0.0,
            completed: true,
        };

        let poll_error = std::thread::scope(|scope| {
            let data_tx = tx.clone();
            scope.spawn(|| {
                data_poller(
                    device,
                    channel,
                    Duration::from_millis(polling.data_interval_ms),
                    deadline,
                    &stop,
                    &timed_out,
                    data_tx,
                );
            });
            scope.spawn(|| {
                message_poller(
                    device,
                    channel,
                    Duration::from_millis(polling.message_interval_ms),
                    &stop,
                    tx,
                );
            });

            drain_events(channel, rx, &mut results)
        });

        if let Some(e) = poll_error {
            return Err(e).context("Data polling failed");
        }

        results.completed = !timed_out.load(Ordering::Relaxed);
        Ok(results)
    }
}

/// Aggregate poller events into the results. Returns once both senders
/// have dropped; a reported poll failure is handed back to the caller.
fn drain_events(
    channel: u8,
    rx: Receiver<Event>,
    results: &mut ExperimentResults,
) -> Option<EclError> {
    let mut poll_error = None;
    for event in rx {
        match event {
            Event::Data(data) => {
                if results.fields.is_empty() {
                    results.fields = data.fields.iter().map(|f| f.to_string()).collect();
                }
                tracing::debug!(
                    points = data.points.len(),
                    loop_count = data.loop_count,
                    "Data buffer"
                );
                results.points.extend(data.points);
            }
            Event::Message(text) => {
                tracing::info!(channel, "Firmware: {}", text.trim_end());
                results.messages.push(text);
            }
            Event::Failed(e) => {
                poll_error = Some(e);
            }
        }
    }
    poll_error
}

fn data_poller(
    device: &EclDevice,
    channel: u8,
    interval: Duration,
    deadline: Option<Instant>,
    stop: &AtomicBool,
    timed_out: &AtomicBool,
    tx: Sender<Event>,
) {
    // The channel may still report Stop on the first polls right after
    // BL_StartChannel; only a Stop seen after Run ends the run.
    let mut seen_running = false;
    while !stop.load(Ordering::Relaxed) {
        match device.get_data(channel) {
            Ok((data, values)) => {
                if !data.is_empty() {
                    let _ = tx.send(Event::Data(data));
                }
                match values.state {
                    ChannelState::Run | ChannelState::Pause => seen_running = true,
                    ChannelState::Stop if seen_running => {
                        tracing::info!(channel, "Channel stopped");
                        stop.store(true, Ordering::Relaxed);
                    }
                    _ => {}
                }
            }
            Err(e) => {
                tracing::error!(channel, error = %e, "Data poll failed");
                let _ = tx.send(Event::Failed(e));
                stop.store(true, Ordering::Relaxed);
            }
        }
        if let Some(deadline) = deadline {
            if Instant::now() >= deadline {
                timed_out.store(true, Ordering::Relaxed);
                stop.store(true, Ordering::Relaxed);
            }
        }
        if !stop.load(Ordering::Relaxed) {
            std::thread::sleep(interval);
        }
    }
}

fn message_poller(
    device: &EclDevice,
    channel: u8,
    interval: Duration,
    stop: &AtomicBool,
    tx: Sender<Event>,
) {
    while !stop.load(Ordering::Relaxed) {
        match device.get_message(channel) {
            Ok(text) if !text.is_empty() => {
                let _ = tx.send(Event::Message(text));
            }
            Ok(_) => {}
            Err(e) => {
                // Message polling is best-effort; the data poller owns
                // the stop decision.
                tracing::warn!(channel, error = %e, "Message poll failed");
            }
        }
        if !stop.load(Ordering::Relaxed) {
            std::thread::sleep(interval);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lib_eclib_ffi::FieldValue;

    fn empty_results() -> ExperimentResults {
        ExperimentResults {
            technique: TechniqueId::Ocv,
            fields: Vec::new(),
            points: Vec::new(),
            messages: Vec::new(),
            duration_s: 0.0,
            completed: true,
        }
    }

    fn sample_data() -> ChannelData {
        ChannelData {
            technique: TechniqueId::Ocv,
            process_index: 0,
            loop_count: 0,
            start_time: 0.0,
            fields: vec!["Ewe"],
            points: vec![DataPoint {
                time: Some(0.5),
                values: vec![FieldValue::Single(3.25)],
            }],
        }
    }

    #[test]
    fn drain_aggregates_data_and_messages() {
        let (tx, rx) = crossbeam::channel::unbounded();
        tx.send(Event::Data(sample_data())).unwrap();
        tx.send(Event::Message("start OCV\n".to_owned())).unwrap();
        tx.send(Event::Data(sample_data())).unwrap();
        drop(tx);

        let mut results = empty_results();
        let err = drain_events(0, rx, &mut results);
        assert!(err.is_none());
        assert_eq!(results.fields, vec!["Ewe".to_owned()]);
        assert_eq!(results.points.len(), 2);
        assert_eq!(results.messages, vec!["start OCV\n".to_owned()]);
    }

    #[test]
    fn drain_surfaces_a_poll_failure() {
        // Data received before the failure is kept, but the failure must
        // reach the caller so the run is not reported as complete.
        let (tx, rx) = crossbeam::channel::unbounded();
        tx.send(Event::Data(sample_data())).unwrap();
        tx.send(Event::Failed(EclError::DataLayout(
            "buffer header mismatch".to_owned(),
        )))
        .unwrap();
        drop(tx);

        let mut results = empty_results();
        let err = drain_events(0, rx, &mut results);
        assert!(matches!(err, Some(EclError::DataLayout(_))));
        assert_eq!(results.points.len(), 1);
    }
}
