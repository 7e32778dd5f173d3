//! Avoidance control loop
//!
//! One sensor read per tick at the configured loop rate. A near reading
//! starts a recovery maneuver that runs to completion without polling the
//! sensor. The observer gets a heartbeat once per tick and at least every
//! [`HEARTBEAT_INTERVAL`] while waiting, and every wait ends early on a stop
//! request.

use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_time::{Duration, Instant};
use rand::Rng;

use super::state::{classify, AvoidEvent, AvoidanceState, Proximity, TurnPlan};
use crate::config::{AvoidConfig, ConfigError};
use crate::drive::DriveCommand;
use crate::shutdown::{StopToken, Wait};
use crate::traits::{ActuatorFault, Drivetrain, RangeSensor, SensorError};

/// Settle time after the first stop, before backing away
pub const SETTLE_BEFORE_BACKING: Duration = Duration::from_millis(80);

/// Settle time after the turn, before resuming forward
pub const SETTLE_AFTER_TURN: Duration = Duration::from_millis(50);

/// Pause after a failed sensor read
pub const SENSOR_RETRY_BACKOFF: Duration = Duration::from_millis(200);

/// Longest slice of any wait
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_millis(50);

/// State as seen by status reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReportedState {
    Avoidance(AvoidanceState),
    SensorError(SensorError),
}

impl ReportedState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportedState::Avoidance(state) => state.as_str(),
            ReportedState::SensorError(_) => "sensor_error",
        }
    }
}

/// Snapshot published to the observer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AvoidStatus {
    /// Last successful reading, if any
    pub distance_mm: Option<u16>,
    pub state: ReportedState,
}

/// Hooks called from the control loop
///
/// Both are called synchronously from the loop and must not block.
pub trait AvoidObserver {
    /// Called once per tick and at the end of every wait slice with the
    /// command in effect
    fn heartbeat(&mut self, _cmd: DriveCommand) {}

    /// Called on every reading, sensor error and state transition
    fn status(&mut self, _status: AvoidStatus) {}
}

impl AvoidObserver for () {}

impl<O: AvoidObserver + ?Sized> AvoidObserver for &mut O {
    fn heartbeat(&mut self, cmd: DriveCommand) {
        (**self).heartbeat(cmd)
    }

    fn status(&mut self, status: AvoidStatus) {
        (**self).status(status)
    }
}

/// Obstacle-avoidance controller
pub struct AvoidanceController<D, S, R, O = ()> {
    drive: D,
    sensor: S,
    rng: R,
    observer: O,
    config: AvoidConfig,
    state: AvoidanceState,
    last_distance: Option<u16>,
    issued: DriveCommand,
}

impl<D, S, R> AvoidanceController<D, S, R, ()>
where
    D: Drivetrain,
    S: RangeSensor,
    R: Rng,
{
    /// Create a controller with no observer
    pub fn new(drive: D, sensor: S, rng: R, config: AvoidConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            drive,
            sensor,
            rng,
            observer: (),
            config: config.validated()?,
            state: AvoidanceState::Forward,
            last_distance: None,
            issued: DriveCommand::STOP,
        })
    }
}

impl<D, S, R, O> AvoidanceController<D, S, R, O>
where
    D: Drivetrain,
    S: RangeSensor,
    R: Rng,
    O: AvoidObserver,
{
    /// Replace the observer
    pub fn with_observer<P: AvoidObserver>(self, observer: P) -> AvoidanceController<D, S, R, P> {
        AvoidanceController {
            drive: self.drive,
            sensor: self.sensor,
            rng: self.rng,
            observer,
            config: self.config,
            state: self.state,
            last_distance: self.last_distance,
            issued: self.issued,
        }
    }

    pub fn state(&self) -> AvoidanceState {
        self.state
    }

    pub fn last_distance(&self) -> Option<u16> {
        self.last_distance
    }

    pub fn config(&self) -> &AvoidConfig {
        &self.config
    }

    /// Run until `stop` is requested or the drivetrain faults
    ///
    /// The drivetrain is stopped on every exit. Sensor errors are never
    /// terminal. The controller returns to `Forward` so it can be run again.
    pub async fn run<M: RawMutex>(&mut self, stop: &StopToken<M>) -> Result<(), ActuatorFault> {
        info!("avoidance loop started");
        let result = self.run_loop(stop).await;

        let stopped = self.drive.stop();
        self.issued = DriveCommand::STOP;
        self.state = AvoidanceState::Forward;

        match result {
            Ok(()) => info!("avoidance loop stopped"),
            Err(e) => error!("avoidance loop aborted: {:?}", e),
        }
        result.and(stopped)
    }

    async fn run_loop<M: RawMutex>(&mut self, stop: &StopToken<M>) -> Result<(), ActuatorFault> {
        let period = self.config.loop_period();

        loop {
            if stop.is_stopped() {
                return Ok(());
            }
            let tick = Instant::now();

            let reading = match select(self.sensor.read_mm(), stop.wait()).await {
                Either::First(reading) => reading,
                Either::Second(()) => return Ok(()),
            };

            match reading {
                Ok(distance) => {
                    self.last_distance = Some(distance);
                    trace!("distance {} mm", distance);

                    match classify(distance, &self.config) {
                        Proximity::Near => {
                            self.report();
                            if self.recover(stop).await?.is_cancelled() {
                                return Ok(());
                            }
                            // Next reading right away
                            continue;
                        }
                        Proximity::Clear => {
                            self.issue(DriveCommand::straight(self.config.fwd_speed))?;
                        }
                        Proximity::Between => {}
                    }
                    self.observer.heartbeat(self.issued);
                    self.report();
                }
                Err(e) => {
                    warn!("sensor read failed: {:?}", e);
                    self.issue_stop()?;
                    self.observer.heartbeat(self.issued);
                    self.observer.status(AvoidStatus {
                        distance_mm: self.last_distance,
                        state: ReportedState::SensorError(e),
                    });
                    if self.hold(SENSOR_RETRY_BACKOFF, stop).await.is_cancelled() {
                        return Ok(());
                    }
                    continue;
                }
            }

            if self
                .hold_until(deadline_after(tick, period), stop)
                .await
                .is_cancelled()
            {
                return Ok(());
            }
        }
    }

    /// Run one full recovery maneuver
    async fn recover<M: RawMutex>(&mut self, stop: &StopToken<M>) -> Result<Wait, ActuatorFault> {
        info!("obstacle at {} mm", self.last_distance);
        self.advance(AvoidEvent::ObstacleSeen);

        self.issue_stop()?;
        if self.hold(SETTLE_BEFORE_BACKING, stop).await.is_cancelled() {
            return Ok(Wait::Cancelled);
        }

        self.advance(AvoidEvent::Settled);
        self.issue(DriveCommand::straight(-self.config.back_speed))?;
        if self
            .hold(self.config.back_duration(), stop)
            .await
            .is_cancelled()
        {
            return Ok(Wait::Cancelled);
        }

        self.advance(AvoidEvent::BackedOff);
        let plan = TurnPlan::choose(&mut self.rng, &self.config);
        debug!(
            "turning {:?} for {} ms",
            plan.direction,
            plan.duration.as_millis()
        );
        self.issue(plan.command(self.config.turn_steer))?;
        if self.hold(plan.duration, stop).await.is_cancelled() {
            return Ok(Wait::Cancelled);
        }

        self.issue_stop()?;
        if self.hold(SETTLE_AFTER_TURN, stop).await.is_cancelled() {
            return Ok(Wait::Cancelled);
        }

        self.advance(AvoidEvent::TurnFinished);
        Ok(Wait::Elapsed)
    }

    fn advance(&mut self, event: AvoidEvent) {
        let next = self.state.transition(event);
        if next != self.state {
            debug!("{} -> {}", self.state.as_str(), next.as_str());
            self.state = next;
            self.report();
        }
    }

    fn report(&mut self) {
        self.observer.status(AvoidStatus {
            distance_mm: self.last_distance,
            state: ReportedState::Avoidance(self.state),
        });
    }

    fn issue(&mut self, cmd: DriveCommand) -> Result<(), ActuatorFault> {
        self.drive.drive(cmd)?;
        self.issued = cmd;
        Ok(())
    }

    fn issue_stop(&mut self) -> Result<(), ActuatorFault> {
        self.drive.stop()?;
        self.issued = DriveCommand::STOP;
        Ok(())
    }

    async fn hold<M: RawMutex>(&mut self, duration: Duration, stop: &StopToken<M>) -> Wait {
        self.hold_until(deadline_after(Instant::now(), duration), stop)
            .await
    }

    /// Wait until `deadline` in slices, heartbeating after each
    async fn hold_until<M: RawMutex>(&mut self, deadline: Instant, stop: &StopToken<M>) -> Wait {
        loop {
            if stop.is_stopped() {
                return Wait::Cancelled;
            }
            let now = Instant::now();
            if now >= deadline {
                return Wait::Elapsed;
            }

            let slice_end = deadline.min(deadline_after(now, HEARTBEAT_INTERVAL));
            if stop.sleep_until(slice_end).await.is_cancelled() {
                return Wait::Cancelled;
            }
            self.observer.heartbeat(self.issued);
        }
    }
}

/// `start + duration`, saturating at the end of time
fn deadline_after(start: Instant, duration: Duration) -> Instant {
    start.checked_add(duration).unwrap_or(Instant::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MAX_MANEUVER_S;
    use core::cell::RefCell;
    use embassy_futures::block_on;
    use embassy_futures::join::join;
    use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
    use embassy_sync::signal::Signal;
    use embassy_time::Timer;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;
    use std::collections::VecDeque;
    use std::vec::Vec;

    type Token = StopToken<CriticalSectionRawMutex>;

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Call {
        Drive(DriveCommand),
        Stop,
    }

    #[derive(Default)]
    struct RecordingDrive {
        calls: RefCell<Vec<(Instant, Call)>>,
    }

    impl RecordingDrive {
        fn calls(&self) -> Vec<Call> {
            self.calls.borrow().iter().map(|(_, c)| *c).collect()
        }
    }

    impl Drivetrain for RecordingDrive {
        fn drive(&self, cmd: DriveCommand) -> Result<(), ActuatorFault> {
            self.calls.borrow_mut().push((Instant::now(), Call::Drive(cmd)));
            Ok(())
        }

        fn stop(&self) -> Result<(), ActuatorFault> {
            self.calls.borrow_mut().push((Instant::now(), Call::Stop));
            Ok(())
        }
    }

    /// Plays back readings, then requests stop and never answers again
    struct ScriptedSensor<'a> {
        script: VecDeque<Result<u16, SensorError>>,
        stop: &'a Token,
        reads: usize,
        read_at: Vec<Instant>,
        /// Time each read takes
        latency: Duration,
    }

    impl<'a> ScriptedSensor<'a> {
        fn new(script: &[Result<u16, SensorError>], stop: &'a Token) -> Self {
            Self {
                script: script.iter().copied().collect(),
                stop,
                reads: 0,
                read_at: Vec::new(),
                latency: Duration::from_ticks(0),
            }
        }

        fn with_latency(mut self, latency: Duration) -> Self {
            self.latency = latency;
            self
        }
    }

    impl RangeSensor for ScriptedSensor<'_> {
        async fn read_mm(&mut self) -> Result<u16, SensorError> {
            self.reads += 1;
            self.read_at.push(Instant::now());
            if self.latency > Duration::from_ticks(0) {
                Timer::after(self.latency).await;
            }
            match self.script.pop_front() {
                Some(reading) => reading,
                None => {
                    self.stop.request_stop();
                    core::future::pending().await
                }
            }
        }
    }

    #[derive(Default)]
    struct Recorder {
        statuses: Vec<AvoidStatus>,
        heartbeats: Vec<DriveCommand>,
    }

    impl AvoidObserver for Recorder {
        fn heartbeat(&mut self, cmd: DriveCommand) {
            self.heartbeats.push(cmd);
        }

        fn status(&mut self, status: AvoidStatus) {
            self.statuses.push(status);
        }
    }

    /// Short maneuvers so tests finish quickly
    fn fast_config() -> AvoidConfig {
        AvoidConfig {
            back_s: 0.12,
            turn_s_min: 0.06,
            turn_s_max: 0.10,
            loop_hz: 100.0,
            ..Default::default()
        }
    }

    fn rng() -> SmallRng {
        SmallRng::seed_from_u64(0x7EAD)
    }

    fn transitions_into(statuses: &[AvoidStatus], target: AvoidanceState) -> usize {
        let mut prev = None;
        let mut count = 0;
        for s in statuses {
            if let ReportedState::Avoidance(state) = s.state {
                if state == target && prev != Some(state) {
                    count += 1;
                }
                prev = Some(state);
            }
        }
        count
    }

    #[test]
    fn test_rejects_invalid_config() {
        let stop = Token::new();
        let drive = RecordingDrive::default();
        let config = AvoidConfig {
            near_mm: 400,
            ..Default::default()
        };
        let result =
            AvoidanceController::new(&drive, ScriptedSensor::new(&[], &stop), rng(), config);
        assert!(matches!(result, Err(ConfigError::InvalidThresholds)));
    }

    #[test]
    fn test_clear_path_drives_forward_every_tick() {
        let stop = Token::new();
        let drive = RecordingDrive::default();
        let sensor = ScriptedSensor::new(&[Ok(500), Ok(500), Ok(500), Ok(500)], &stop);
        let mut ctrl = AvoidanceController::new(&drive, sensor, rng(), fast_config()).unwrap();

        block_on(ctrl.run(&stop)).unwrap();

        let forward = Call::Drive(DriveCommand::new(0.22, 0.0));
        assert_eq!(
            drive.calls(),
            vec![forward, forward, forward, forward, Call::Stop]
        );
    }

    #[test]
    fn test_between_thresholds_issues_nothing() {
        let stop = Token::new();
        let drive = RecordingDrive::default();
        let mut recorder = Recorder::default();
        let sensor = ScriptedSensor::new(&[Ok(300), Ok(300)], &stop);
        let mut ctrl = AvoidanceController::new(&drive, sensor, rng(), fast_config())
            .unwrap()
            .with_observer(&mut recorder);

        block_on(ctrl.run(&stop)).unwrap();
        drop(ctrl);

        // Only the exit stop
        assert_eq!(drive.calls(), vec![Call::Stop]);
        assert_eq!(recorder.statuses.len(), 2);
        assert_eq!(recorder.statuses[0].distance_mm, Some(300));
    }

    #[test]
    fn test_single_recovery_sequence() {
        let stop = Token::new();
        let drive = RecordingDrive::default();
        let mut recorder = Recorder::default();
        let config = fast_config();
        let sensor = ScriptedSensor::new(&[Ok(400), Ok(400), Ok(150), Ok(400)], &stop);
        let mut ctrl = AvoidanceController::new(&drive, sensor, rng(), config)
            .unwrap()
            .with_observer(&mut recorder);

        block_on(ctrl.run(&stop)).unwrap();
        drop(ctrl);

        let calls = drive.calls.borrow().clone();
        let forward = Call::Drive(DriveCommand::new(0.22, 0.0));
        let back = Call::Drive(DriveCommand::new(-0.18, 0.0));

        assert_eq!(calls.len(), 8);
        assert_eq!(calls[0].1, forward);
        assert_eq!(calls[1].1, forward);
        assert_eq!(calls[2].1, Call::Stop);
        assert_eq!(calls[3].1, back);
        match calls[4].1 {
            Call::Drive(cmd) => {
                assert_eq!(cmd.throttle, 0.0);
                assert_eq!(cmd.steering.abs(), 0.55);
            }
            Call::Stop => panic!("expected a turn"),
        }
        assert_eq!(calls[5].1, Call::Stop);
        assert_eq!(calls[6].1, forward);
        assert_eq!(calls[7].1, Call::Stop);

        // Settle, back and turn durations
        let slack = Duration::from_millis(100);
        let settle = calls[3].0 - calls[2].0;
        assert!(settle >= SETTLE_BEFORE_BACKING && settle < SETTLE_BEFORE_BACKING + slack);
        let backing = calls[4].0 - calls[3].0;
        assert!(backing >= config.back_duration());
        assert!(backing < config.back_duration() + slack);
        let (min, max) = config.turn_bounds();
        let turning = calls[5].0 - calls[4].0;
        assert!(turning >= min && turning < max + slack);
        let resumed = calls[6].0 - calls[5].0;
        assert!(resumed >= SETTLE_AFTER_TURN);

        assert_eq!(
            transitions_into(&recorder.statuses, AvoidanceState::ObstacleDetected),
            1
        );
        for state in [AvoidanceState::Backing, AvoidanceState::Turning] {
            assert_eq!(transitions_into(&recorder.statuses, state), 1);
        }
        let last = recorder.statuses.last().unwrap();
        assert_eq!(last.state, ReportedState::Avoidance(AvoidanceState::Forward));
        assert_eq!(last.distance_mm, Some(400));

        // Heartbeats carry the command in effect
        assert!(recorder.heartbeats.contains(&DriveCommand::new(-0.18, 0.0)));
        assert!(recorder.heartbeats.contains(&DriveCommand::STOP));
    }

    #[test]
    fn test_sensor_failures_are_not_terminal() {
        let stop = Token::new();
        let drive = RecordingDrive::default();
        let mut recorder = Recorder::default();
        let script = [
            Err(SensorError::Timeout),
            Err(SensorError::BusFault),
            Err(SensorError::Timeout),
        ];
        let sensor = ScriptedSensor::new(&script, &stop);
        let mut ctrl = AvoidanceController::new(&drive, sensor, rng(), fast_config())
            .unwrap()
            .with_observer(&mut recorder);

        let start = Instant::now();
        block_on(ctrl.run(&stop)).unwrap();
        // Three errors plus the read that ran out of script
        assert_eq!(ctrl.sensor.reads, 4);
        drop(ctrl);

        assert!(start.elapsed() >= SENSOR_RETRY_BACKOFF * 3);
        assert_eq!(drive.calls(), vec![Call::Stop; 4]);
        assert_eq!(recorder.statuses.len(), 3);
        for (status, err) in recorder.statuses.iter().zip(script) {
            assert_eq!(status.state, ReportedState::SensorError(err.unwrap_err()));
            assert_eq!(status.state.as_str(), "sensor_error");
            assert_eq!(status.distance_mm, None);
        }
    }

    #[test]
    fn test_sensor_error_keeps_last_distance() {
        let stop = Token::new();
        let drive = RecordingDrive::default();
        let mut recorder = Recorder::default();
        let sensor = ScriptedSensor::new(&[Ok(500), Err(SensorError::OutOfRange)], &stop);
        let mut ctrl = AvoidanceController::new(&drive, sensor, rng(), fast_config())
            .unwrap()
            .with_observer(&mut recorder);

        block_on(ctrl.run(&stop)).unwrap();
        drop(ctrl);

        let last = recorder.statuses.last().unwrap();
        assert_eq!(last.state, ReportedState::SensorError(SensorError::OutOfRange));
        assert_eq!(last.distance_mm, Some(500));
    }

    #[test]
    fn test_cancel_mid_maneuver() {
        let stop = Token::new();
        let drive = RecordingDrive::default();
        let config = AvoidConfig {
            back_s: 5.0,
            ..fast_config()
        };
        let sensor = ScriptedSensor::new(&[Ok(100)], &stop);
        let mut ctrl = AvoidanceController::new(&drive, sensor, rng(), config).unwrap();

        let start = Instant::now();
        let (result, _) = block_on(join(ctrl.run(&stop), async {
            Timer::after_millis(200).await;
            stop.request_stop();
        }));
        result.unwrap();

        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(200));
        assert!(elapsed < Duration::from_millis(200) + HEARTBEAT_INTERVAL * 4);
        assert_eq!(ctrl.state(), AvoidanceState::Forward);

        let calls = drive.calls();
        assert_eq!(calls[0], Call::Stop);
        assert_eq!(calls[1], Call::Drive(DriveCommand::new(-0.18, 0.0)));
        assert_eq!(calls.last(), Some(&Call::Stop));
        assert_eq!(calls.len(), 3);
    }

    #[test]
    fn test_repeated_near_readings_run_one_maneuver_each() {
        let stop = Token::new();
        let drive = RecordingDrive::default();
        let mut recorder = Recorder::default();
        let script = [Ok(400), Ok(400), Ok(150), Ok(150), Ok(150)];
        let sensor = ScriptedSensor::new(&script, &stop);
        let mut ctrl = AvoidanceController::new(&drive, sensor, rng(), fast_config())
            .unwrap()
            .with_observer(&mut recorder);

        block_on(ctrl.run(&stop)).unwrap();
        // Five scripted reads plus the one that ran out of script
        assert_eq!(ctrl.sensor.reads, 6);
        let read_at = ctrl.sensor.read_at.clone();
        drop(ctrl);

        let calls = drive.calls.borrow().clone();
        let forward = Call::Drive(DriveCommand::new(0.22, 0.0));
        let back = Call::Drive(DriveCommand::new(-0.18, 0.0));

        // Two forward ticks, three maneuvers, the exit stop
        assert_eq!(calls.len(), 2 + 3 * 4 + 1);
        assert_eq!(calls[0].1, forward);
        assert_eq!(calls[1].1, forward);
        for maneuver in calls[2..14].chunks(4) {
            assert_eq!(maneuver[0].1, Call::Stop);
            assert_eq!(maneuver[1].1, back);
            assert!(matches!(maneuver[2].1, Call::Drive(cmd) if cmd.throttle == 0.0));
            assert_eq!(maneuver[3].1, Call::Stop);

            // The sensor is not polled between the first stop and the
            // settle after the turn
            let (start, end) = (maneuver[0].0, maneuver[3].0);
            assert!(read_at.iter().all(|t| *t <= start || *t >= end));
        }
        assert_eq!(calls[14].1, Call::Stop);

        assert_eq!(
            transitions_into(&recorder.statuses, AvoidanceState::ObstacleDetected),
            3
        );
        assert_eq!(transitions_into(&recorder.statuses, AvoidanceState::Turning), 3);
    }

    #[test]
    fn test_heartbeat_every_tick_with_slow_sensor() {
        let stop = Token::new();
        let drive = RecordingDrive::default();
        let mut recorder = Recorder::default();
        let config = AvoidConfig {
            loop_hz: 30.0,
            ..fast_config()
        };
        // Each read outlasts the loop period, so no tick ever waits
        let sensor = ScriptedSensor::new(&[Ok(500); 10], &stop)
            .with_latency(Duration::from_millis(40));
        let mut ctrl = AvoidanceController::new(&drive, sensor, rng(), config)
            .unwrap()
            .with_observer(&mut recorder);

        block_on(ctrl.run(&stop)).unwrap();
        drop(ctrl);

        let forward = DriveCommand::new(0.22, 0.0);
        assert!(recorder.heartbeats.len() >= 10);
        assert!(recorder.heartbeats.iter().all(|cmd| *cmd == forward));
    }

    #[test]
    fn test_sensor_error_heartbeats_stop() {
        let stop = Token::new();
        let drive = RecordingDrive::default();
        let mut recorder = Recorder::default();
        let sensor = ScriptedSensor::new(&[Ok(500), Err(SensorError::Timeout)], &stop);
        let mut ctrl = AvoidanceController::new(&drive, sensor, rng(), fast_config())
            .unwrap()
            .with_observer(&mut recorder);

        block_on(ctrl.run(&stop)).unwrap();
        drop(ctrl);

        assert_eq!(recorder.heartbeats[0], DriveCommand::new(0.22, 0.0));
        assert_eq!(recorder.heartbeats.last(), Some(&DriveCommand::STOP));
    }

    #[test]
    fn test_long_maneuver_does_not_overflow() {
        assert_eq!(
            deadline_after(Instant::MAX, Duration::from_secs(1)),
            Instant::MAX
        );

        let stop = Token::new();
        let drive = RecordingDrive::default();
        let config = AvoidConfig {
            back_s: MAX_MANEUVER_S,
            ..fast_config()
        };
        let sensor = ScriptedSensor::new(&[Ok(100)], &stop);
        let mut ctrl = AvoidanceController::new(&drive, sensor, rng(), config).unwrap();

        let (result, _) = block_on(join(ctrl.run(&stop), async {
            Timer::after_millis(150).await;
            stop.request_stop();
        }));
        result.unwrap();
        assert_eq!(drive.calls().last(), Some(&Call::Stop));
    }

    #[test]
    fn test_next_owner_drives_after_run_returns() {
        let stop = Token::new();
        let idle: Signal<CriticalSectionRawMutex, ()> = Signal::new();
        let drive = RecordingDrive::default();
        let sensor = ScriptedSensor::new(&[Ok(500); 1000], &stop);
        let mut ctrl = AvoidanceController::new(&drive, sensor, rng(), fast_config()).unwrap();
        let takeover = DriveCommand::new(0.5, -0.2);

        block_on(join(
            async {
                ctrl.run(&stop).await.unwrap();
                idle.signal(());
            },
            async {
                Timer::after_millis(60).await;
                stop.request_stop();
                idle.wait().await;
                drive.drive(takeover).unwrap();
            },
        ));

        let calls = drive.calls();
        let n = calls.len();
        assert_eq!(calls[n - 2], Call::Stop);
        assert_eq!(calls[n - 1], Call::Drive(takeover));
    }

    struct FaultyDrive;

    impl Drivetrain for FaultyDrive {
        fn drive(&self, _cmd: DriveCommand) -> Result<(), ActuatorFault> {
            Err(ActuatorFault::Pwm)
        }

        fn stop(&self) -> Result<(), ActuatorFault> {
            Ok(())
        }
    }

    #[test]
    fn test_actuator_fault_ends_loop() {
        let stop = Token::new();
        let sensor = ScriptedSensor::new(&[Ok(500), Ok(500)], &stop);
        let mut ctrl = AvoidanceController::new(FaultyDrive, sensor, rng(), fast_config()).unwrap();

        assert_eq!(block_on(ctrl.run(&stop)), Err(ActuatorFault::Pwm));
        assert_eq!(ctrl.sensor.reads, 1);
    }
}
