//! Collector state machine.
//!
//! ```text
//!   Initializing ──(≥1 sensor)──> Running ──(max consecutive errors)──> Recovering
//!        │  ↺ no sensors            ↑                                      │  ↺ no sensors
//!        │                          └──────────────(≥1 sensor)─────────────┘
//!        └──────────── stop ───────────> ShuttingDown ──> Stopped
//! ```
//!
//! Only a failure to create the output directory ends the collector with an
//! error. Bus faults are retried forever, storage faults cost the affected
//! file, and live client faults cost the client.

use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use accel_core::config::{AppConfig, CollectorConfig, LiveStreamConfig};
use accel_core::{unix_timestamp, Sample, SensorIdentity, StopFlag};
use accel_driver_h3lis331::registers::{FULL_SCALE_G, SENSITIVITY_G_PER_COUNT};
use accel_driver_h3lis331::{BusProvider, H3lis331, SensorError};
use accel_storage::{HeaderTemplate, LogFile, LogFileOptions};
use tracing::{debug, error, info, warn};

use crate::error::CollectorError;
use crate::heartbeat::Heartbeat;
use crate::live_stream::LiveStreamServer;
use crate::schedule::TickSchedule;

/// Supervisor lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectorState {
    /// Opening the bus and probing sensors for the first time
    Initializing,
    /// Sampling
    Running,
    /// Reopening the bus after repeated transport errors
    Recovering,
    /// Sealing files and powering sensors down
    ShuttingDown,
    /// Done
    Stopped,
}

impl fmt::Display for CollectorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Initializing => "initializing",
            Self::Running => "running",
            Self::Recovering => "recovering",
            Self::ShuttingDown => "shutting down",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Counters returned by [`CollectorSupervisor::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectorStats {
    /// Successful ticks (one reading from every active sensor)
    pub samples: u64,
    /// Failed ticks
    pub errors: u64,
    /// Completed recoveries
    pub recoveries: u64,
    /// Raw files sealed
    pub files_sealed: u64,
}

#[derive(Debug)]
struct ActiveSensor {
    sensor: H3lis331,
    log: LogFile,
    storage_failing: bool,
}

/// An open bus and the sensors that answered on it.
#[derive(Debug)]
struct Session<B> {
    bus: B,
    sensors: Vec<ActiveSensor>,
}

/// Owns the bus, the sensors, their files and the live stream.
pub struct CollectorSupervisor<P: BusProvider> {
    config: CollectorConfig,
    raw_dir: PathBuf,
    file_options: LogFileOptions,
    live_config: LiveStreamConfig,
    heartbeat_every: u64,
    provider: P,
    heartbeat: Heartbeat,
    stop: StopFlag,
    state: CollectorState,
    session: Option<Session<P::Bus>>,
    live: Option<LiveStreamServer>,
    readings: Vec<Sample>,
    stats: CollectorStats,
    consecutive_errors: u32,
    ticks: u64,
    ready_sent: bool,
}

impl<P: BusProvider> CollectorSupervisor<P> {
    /// Supervisor for `config.collector.bus` using `provider` to open it.
    pub fn new(config: &AppConfig, provider: P, stop: StopFlag) -> Self {
        Self {
            config: config.collector.clone(),
            raw_dir: config.storage.raw_dir.clone(),
            file_options: LogFileOptions::from(&config.storage),
            live_config: config.live_stream.clone(),
            heartbeat_every: u64::from(config.heartbeat.every_ticks.max(1)),
            provider,
            heartbeat: Heartbeat::from_config(&config.heartbeat),
            stop,
            state: CollectorState::Initializing,
            session: None,
            live: None,
            readings: Vec::with_capacity(config.collector.sensors.len()),
            stats: CollectorStats::default(),
            consecutive_errors: 0,
            ticks: 0,
            ready_sent: false,
        }
    }

    /// Replace the heartbeat built from configuration.
    pub fn with_heartbeat(mut self, heartbeat: Heartbeat) -> Self {
        self.heartbeat = heartbeat;
        self
    }

    /// Current state.
    pub fn state(&self) -> CollectorState {
        self.state
    }

    /// Counters so far.
    pub fn stats(&self) -> CollectorStats {
        let mut stats = self.stats;
        if let Some(session) = &self.session {
            stats.files_sealed += session
                .sensors
                .iter()
                .map(|a| a.log.stats().files_sealed)
                .sum::<u64>();
        }
        stats
    }

    /// Addresses of the sensors currently being sampled.
    pub fn active_addresses(&self) -> Vec<u8> {
        self.session
            .as_ref()
            .map(|s| s.sensors.iter().map(|a| a.sensor.address()).collect())
            .unwrap_or_default()
    }

    /// Run until the stop flag is set, then shut down cleanly.
    pub fn run(&mut self) -> Result<CollectorStats, CollectorError> {
        info!(
            bus = self.config.bus,
            device = %self.provider.describe(),
            rate_hz = self.config.sample_rate_hz,
            max_file_bytes = self.file_options.max_bytes,
            "Collector starting"
        );
        fs::create_dir_all(&self.raw_dir).map_err(|source| {
            error!(path = %self.raw_dir.display(), error = %source, "Cannot create output directory");
            CollectorError::FatalStartup {
                path: self.raw_dir.clone(),
                source,
            }
        })?;
        self.start_live_stream();

        while !self.stop.is_requested() {
            match self.state {
                CollectorState::Initializing => {
                    if !self.initialize() {
                        self.heartbeat.watchdog();
                        self.stop.sleep(self.config.recovery_cooldown);
                    }
                }
                CollectorState::Recovering => {
                    if !self.stop.sleep(self.config.recovery_cooldown) {
                        break;
                    }
                    self.consecutive_errors = 0;
                    if self.initialize() {
                        self.stats.recoveries += 1;
                        info!(sensors = self.active_addresses().len(), "Recovery complete");
                    } else {
                        self.heartbeat.watchdog();
                    }
                }
                CollectorState::Running => self.sample_until_interrupted(),
                CollectorState::ShuttingDown | CollectorState::Stopped => break,
            }
        }

        self.shutdown();
        Ok(self.stats())
    }

    fn transition(&mut self, next: CollectorState) {
        if self.state != next {
            info!(from = %self.state, to = %next, "Collector state change");
            self.state = next;
        }
    }

    fn start_live_stream(&mut self) {
        if !self.live_config.enabled {
            return;
        }
        match LiveStreamServer::bind(self.live_config.bind) {
            Ok(server) => self.live = Some(server),
            Err(e) => warn!(
                addr = %self.live_config.bind,
                error = %e,
                "Live stream unavailable, continuing without it"
            ),
        }
    }

    /// Seal the previous session, reopen the bus and probe every sensor.
    ///
    /// Returns whether at least one sensor is ready; on success the state is
    /// `Running`.
    fn initialize(&mut self) -> bool {
        self.retire_session();

        let mut bus = match self.provider.open() {
            Ok(bus) => bus,
            Err(e) => {
                error!(error = %e, "Failed to open I2C bus");
                return false;
            }
        };

        let template = HeaderTemplate {
            full_scale_g: FULL_SCALE_G,
            sample_rate_hz: self.config.sample_rate_hz,
            sensitivity_g_per_count: SENSITIVITY_G_PER_COUNT,
        };
        let mut sensors = Vec::with_capacity(self.config.sensors.len());
        for slot in &self.config.sensors {
            let identity = SensorIdentity::new(self.config.bus, slot.address, slot.label.clone());
            let sensor = H3lis331::new(slot.address);
            if !sensor.identify(&mut bus) {
                continue;
            }
            if let Err(e) = sensor.configure(&mut bus, self.config.sample_rate_hz) {
                warn!(sensor = %identity, error = %e, "Sensor configuration failed");
                continue;
            }
            info!(sensor = %identity, rate_hz = self.config.sample_rate_hz, "Sensor ready (±100 g)");
            sensors.push(ActiveSensor {
                sensor,
                log: LogFile::new(&self.raw_dir, identity, template, self.file_options),
                storage_failing: false,
            });
        }

        if sensors.is_empty() {
            error!(
                retry_in = ?self.config.recovery_cooldown,
                "No sensors found, retrying"
            );
            return false;
        }

        let count = sensors.len();
        self.session = Some(Session { bus, sensors });
        self.transition(CollectorState::Running);
        info!(sensors = count, "Sampling");

        if !self.ready_sent {
            self.heartbeat.ready();
            self.ready_sent = true;
        }
        self.heartbeat.status(&format!("Sampling {count} sensor(s)"));
        true
    }

    /// Seal every file of the current session and close its bus.
    fn retire_session(&mut self) {
        if let Some(session) = self.session.take() {
            for mut active in session.sensors {
                self.retire_log(&mut active.log);
            }
            drop(session.bus);
        }
    }

    /// Final seal of a writer that is about to be dropped.
    fn retire_log(&mut self, log: &mut LogFile) {
        if let Err(e) = log.seal() {
            error!(sensor = %log.identity(), error = %e, "Failed to seal raw file");
        }
        self.stats.files_sealed += log.stats().files_sealed;
    }

    /// The fixed-rate loop. Returns when a stop is requested or the error
    /// threshold sends the supervisor into recovery.
    fn sample_until_interrupted(&mut self) {
        let started = Instant::now();
        let mut schedule = TickSchedule::new(
            self.config.sample_interval(),
            self.config.schedule_slack,
            started,
        );
        let mut last_status = started;
        let accept_every = u64::from(self.config.accept_every_ticks.max(1));

        while !self.stop.is_requested() {
            schedule.sleep_until_due();

            match self.tick() {
                Ok(()) => {
                    if self.consecutive_errors > 0 {
                        info!(after_errors = self.consecutive_errors, "I2C reads recovered");
                    }
                    self.stats.samples += 1;
                    self.consecutive_errors = 0;
                }
                Err(e) => {
                    self.stats.errors += 1;
                    self.consecutive_errors += 1;
                    if self.consecutive_errors == 1 {
                        error!(error = %e, "I2C error");
                    }
                    if self.consecutive_errors >= self.config.max_consecutive_errors {
                        error!(
                            consecutive = self.consecutive_errors,
                            "Consecutive I2C errors, recovering"
                        );
                        self.transition(CollectorState::Recovering);
                        return;
                    }
                    self.stop.sleep(self.config.error_cooldown);
                    schedule.reset(Instant::now());
                }
            }

            self.ticks += 1;
            if self.ticks % accept_every == 0 {
                if let Some(live) = self.live.as_mut() {
                    live.accept_if_pending();
                }
            }
            if self.ticks % self.heartbeat_every == 0 {
                self.heartbeat.watchdog();
            }

            let now = Instant::now();
            if now.duration_since(last_status) >= self.config.status_interval {
                self.log_status();
                last_status = now;
            }
            if let Some(lag) = schedule.advance(now) {
                warn!(lag_ms = lag.as_millis() as u64, "Sampling fell behind, resynchronising");
            }
        }
    }

    /// One reading from every active sensor, written and mirrored.
    ///
    /// All sensors are read before anything is written so a transport error
    /// leaves no partial tick on disk.
    fn tick(&mut self) -> Result<(), SensorError> {
        let Some(session) = self.session.as_mut() else {
            return Ok(());
        };
        let timestamp = unix_timestamp();

        self.readings.clear();
        for active in &session.sensors {
            self.readings
                .push(active.sensor.read(&mut session.bus, timestamp)?);
        }

        for (active, sample) in session.sensors.iter_mut().zip(&self.readings) {
            match active.log.write_sample(sample) {
                Ok(()) if active.storage_failing => {
                    info!(sensor = %active.log.identity(), "Raw file writes recovered");
                    active.storage_failing = false;
                }
                Ok(()) => {}
                Err(e) => {
                    if !active.storage_failing {
                        error!(sensor = %active.log.identity(), error = %e, "Raw file write failed");
                    }
                    active.storage_failing = true;
                }
            }
        }

        if let Some(live) = self.live.as_mut().filter(|l| l.has_client()) {
            for (active, sample) in session.sensors.iter().zip(&self.readings) {
                if live.broadcast(sample, active.log.identity()).is_err() {
                    break;
                }
            }
        }
        Ok(())
    }

    fn log_status(&self) {
        let files = self
            .session
            .as_ref()
            .map(|s| {
                s.sensors
                    .iter()
                    .map(|a| format!("0x{:02x}:{}KB", a.sensor.address(), a.log.bytes_written() / 1024))
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .unwrap_or_default();
        info!(
            samples = self.stats.samples,
            errors = self.stats.errors,
            files = %format!("[{files}]"),
            "Collector status"
        );
        self.heartbeat.status(&format!(
            "{} samples, {} errors",
            self.stats.samples, self.stats.errors
        ));
    }

    fn shutdown(&mut self) {
        self.transition(CollectorState::ShuttingDown);

        let mut session = self.session.take();
        if let Some(session) = session.as_mut() {
            for active in &mut session.sensors {
                self.retire_log(&mut active.log);
            }
        }

        if let Some(live) = self.live.take() {
            let stats = live.stats();
            debug!(
                accepted = stats.clients_accepted,
                rejected = stats.clients_rejected,
                dropped = stats.clients_dropped,
                lines = stats.lines_sent,
                "Live stream closed"
            );
        }
        self.heartbeat.stopping();
        if let Some(session) = session {
            Self::power_down(session);
        }

        self.transition(CollectorState::Stopped);
        info!(
            samples = self.stats.samples,
            errors = self.stats.errors,
            recoveries = self.stats.recoveries,
            files_sealed = self.stats.files_sealed,
            "Collector stopped"
        );
    }

    /// Best-effort power-down of every sensor, then close the bus.
    fn power_down(mut session: Session<P::Bus>) {
        for active in &session.sensors {
            if let Err(e) = active.sensor.power_down(&mut session.bus) {
                debug!(sensor = %active.log.identity(), error = %e, "Power-down failed");
            }
        }
        drop(session);
    }
}
