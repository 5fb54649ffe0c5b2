//! Automatic control session: trigger on discomfort, decide, apply, count
//! down, and release the manual lockout on expiry or stop.
//!
//! Every mutation of the session happens under one lock and no lock is held
//! across an await. Decide and apply calls carry the generation that was
//! current when they started; a stop bumps the generation, so their results
//! are discarded instead of reactivating the session.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::gateway::DeviceGateway;
use crate::interpret::DI_TRIGGER;
use crate::logger::SessionLogger;
use crate::metrics::discomfort_index;
use crate::policy::DecisionService;
use crate::telemetry::TelemetrySource;
use crate::types::*;
use crate::{Error, Result};

type EventCallback = Box<dyn Fn(&ControlEvent) + Send + Sync>;

const DEFAULT_TICK_PERIOD: Duration = Duration::from_secs(1);

pub struct AutoControllerBuilder<D, G> {
    decision: D,
    gateway: G,
    trigger_threshold: f64,
    tick_period: Duration,
    restore_on_expiry: bool,
    event_callbacks: Vec<EventCallback>,
    log_path: Option<PathBuf>,
}

impl<D, G> AutoControllerBuilder<D, G>
where
    D: DecisionService + Send + Sync + 'static,
    G: DeviceGateway + Send + Sync + 'static,
{
    pub fn new(decision: D, gateway: G) -> Self {
        Self {
            decision,
            gateway,
            trigger_threshold: DI_TRIGGER,
            tick_period: DEFAULT_TICK_PERIOD,
            restore_on_expiry: false,
            event_callbacks: Vec::new(),
            log_path: None,
        }
    }

    /// Discomfort index at or above which a session is started.
    pub fn trigger_threshold(mut self, di: f64) -> Self {
        self.trigger_threshold = di;
        self
    }

    /// Length of one countdown step; `remaining_secs` drops by one per step.
    pub fn tick_period(mut self, period: Duration) -> Self {
        self.tick_period = period;
        self
    }

    /// Re-apply the state reported before the session once it expires.
    pub fn restore_on_expiry(mut self, restore: bool) -> Self {
        self.restore_on_expiry = restore;
        self
    }

    pub fn on_event(mut self, f: impl Fn(&ControlEvent) + Send + Sync + 'static) -> Self {
        self.event_callbacks.push(Box::new(f));
        self
    }

    pub fn session_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = Some(path.into());
        self
    }

    pub fn build(self) -> Result<AutoController<D, G>> {
        if !self.trigger_threshold.is_finite() {
            return Err(Error::Config(format!(
                "trigger threshold must be finite, got {}",
                self.trigger_threshold
            )));
        }
        if self.tick_period.is_zero() {
            return Err(Error::Config("tick period must be non-zero".to_string()));
        }
        let logger = match self.log_path {
            Some(path) => Some(Mutex::new(SessionLogger::new(path)?)),
            None => None,
        };

        Ok(AutoController {
            inner: Arc::new(Inner {
                decision: self.decision,
                gateway: self.gateway,
                trigger_threshold: self.trigger_threshold,
                tick_period: self.tick_period,
                restore_on_expiry: self.restore_on_expiry,
                session: Mutex::new(Session::default()),
                event_callbacks: self.event_callbacks,
                logger,
            }),
        })
    }
}

#[derive(Default)]
struct Session {
    phase: Phase,
    generation: u64,
    remaining_secs: u32,
    commanded: Option<AcState>,
    /// Reported state captured when the session became active.
    previous: Option<AcState>,
    reported: Option<AcState>,
    session_id: Option<Uuid>,
    started_at: Option<DateTime<Utc>>,
    countdown: Option<JoinHandle<()>>,
    manual_in_flight: bool,
}

impl Session {
    fn snapshot(&self) -> AutoControlSession {
        AutoControlSession {
            phase: self.phase,
            active: self.phase == Phase::Active,
            remaining_secs: self.remaining_secs,
            commanded_state: self.commanded,
            session_id: self.session_id,
            started_at: self.started_at,
        }
    }

    fn is_deciding(&self, generation: u64) -> bool {
        self.generation == generation && self.phase == Phase::Deciding
    }
}

enum Tick {
    Continue,
    Done,
    Restore(AcState),
}

struct Inner<D, G> {
    decision: D,
    gateway: G,
    trigger_threshold: f64,
    tick_period: Duration,
    restore_on_expiry: bool,
    session: Mutex<Session>,
    event_callbacks: Vec<EventCallback>,
    logger: Option<Mutex<SessionLogger>>,
}

impl<D, G> Inner<D, G>
where
    D: DecisionService + Send + Sync + 'static,
    G: DeviceGateway + Send + Sync + 'static,
{
    fn lock(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: &ControlEvent) {
        for cb in &self.event_callbacks {
            cb(event);
        }
    }

    fn log(&self, f: impl FnOnce(&mut SessionLogger)) {
        if let Some(logger) = &self.logger {
            f(&mut logger.lock().unwrap_or_else(PoisonError::into_inner));
        }
    }

    fn transition(&self, session: &mut Session, to: Phase) {
        let from = session.phase;
        if from == to {
            return;
        }
        session.phase = to;
        let generation = session.generation;
        debug!(%from, %to, generation, "auto-control transition");
        self.log(|l| l.log_transition(generation, from, to));
    }

    /// Deciding -> Idle for the given generation. False if the session moved
    /// on in the meantime.
    fn settle_idle(&self, generation: u64) -> bool {
        let mut session = self.lock();
        if !session.is_deciding(generation) {
            return false;
        }
        self.transition(&mut session, Phase::Idle);
        true
    }

    fn activate(self: &Arc<Self>, generation: u64, command: &AutoControlCommand) -> Option<Uuid> {
        let mut session = self.lock();
        if !session.is_deciding(generation) {
            return None;
        }
        let session_id = Uuid::new_v4();
        session.previous = session.reported;
        session.reported = Some(command.state);
        session.commanded = Some(command.state);
        session.remaining_secs = command.duration_secs;
        session.session_id = Some(session_id);
        session.started_at = Some(Utc::now());
        session.countdown = Some(spawn_countdown(
            Arc::downgrade(self),
            generation,
            self.tick_period,
        ));
        self.transition(&mut session, Phase::Active);
        Some(session_id)
    }

    fn tick(&self, generation: u64) -> Tick {
        let mut session = self.lock();
        if session.generation != generation || session.phase != Phase::Active {
            return Tick::Done;
        }
        session.remaining_secs = session.remaining_secs.saturating_sub(1);
        trace!(remaining = session.remaining_secs, "countdown");
        if session.remaining_secs > 0 {
            return Tick::Continue;
        }

        session.commanded = None;
        let previous = session.previous.take();
        if self.restore_on_expiry
            && let Some(state) = previous
        {
            // lockout stays held until the restore has been applied
            self.transition(&mut session, Phase::Stopping);
            return Tick::Restore(state);
        }

        let session_id = session.session_id.take();
        session.started_at = None;
        session.countdown = None;
        self.transition(&mut session, Phase::Idle);
        drop(session);

        info!(?session_id, "auto-control session expired");
        self.emit(&ControlEvent::Expired {
            session_id,
            restored: false,
        });
        Tick::Done
    }

    fn finish_restore(&self, generation: u64, state: AcState, restored: bool) {
        let mut session = self.lock();
        if session.generation != generation || session.phase != Phase::Stopping {
            debug!(generation, "restore result discarded, session was stopped");
            return;
        }
        if restored {
            session.reported = Some(state);
        }
        let session_id = session.session_id.take();
        session.started_at = None;
        session.countdown = None;
        self.transition(&mut session, Phase::Idle);
        drop(session);

        info!(?session_id, restored, "auto-control session expired");
        self.emit(&ControlEvent::Expired {
            session_id,
            restored,
        });
    }
}

fn spawn_countdown<D, G>(
    inner: Weak<Inner<D, G>>,
    generation: u64,
    period: Duration,
) -> JoinHandle<()>
where
    D: DecisionService + Send + Sync + 'static,
    G: DeviceGateway + Send + Sync + 'static,
{
    tokio::spawn(async move {
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let Some(inner) = inner.upgrade() else {
                break;
            };
            match inner.tick(generation) {
                Tick::Continue => {}
                Tick::Done => break,
                Tick::Restore(state) => {
                    let result = inner.gateway.apply(&state).await;
                    if let Err(e) = &result {
                        warn!(error = %e, "failed to restore pre-session state");
                    }
                    inner.finish_restore(generation, state, result.is_ok());
                    break;
                }
            }
        }
    })
}

/// Clears the in-flight marker of a manual write however the write ends.
struct ManualWrite<'a> {
    session: &'a Mutex<Session>,
}

impl Drop for ManualWrite<'_> {
    fn drop(&mut self) {
        self.session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .manual_in_flight = false;
    }
}

/// Handle to one air conditioner's auto-control session. Clones share the
/// same session.
pub struct AutoController<D, G> {
    inner: Arc<Inner<D, G>>,
}

impl<D, G> Clone for AutoController<D, G> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<D, G> AutoController<D, G>
where
    D: DecisionService + Send + Sync + 'static,
    G: DeviceGateway + Send + Sync + 'static,
{
    pub fn builder(decision: D, gateway: G) -> AutoControllerBuilder<D, G> {
        AutoControllerBuilder::new(decision, gateway)
    }

    pub fn session(&self) -> AutoControlSession {
        self.inner.lock().snapshot()
    }

    pub fn phase(&self) -> Phase {
        self.inner.lock().phase
    }

    /// True whenever manual writes are refused.
    pub fn is_locked_out(&self) -> bool {
        self.inner.lock().phase != Phase::Idle
    }

    pub fn is_counting_down(&self) -> bool {
        self.inner
            .lock()
            .countdown
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    pub fn trigger_threshold(&self) -> f64 {
        self.inner.trigger_threshold
    }

    pub fn reported_state(&self) -> Option<AcState> {
        self.inner.lock().reported
    }

    /// Records the state last read from the device.
    pub fn observe_state(&self, state: AcState) {
        self.inner.lock().reported = Some(state);
    }

    /// Reads the AC state and the room's latest sample, then evaluates the
    /// trigger. Missing data or a failing source yields `Ok(None)`.
    pub async fn poll<T: TelemetrySource>(
        &self,
        source: &T,
        room_id: &str,
    ) -> Result<Option<TriggerOutcome>> {
        match source.ac_state().await {
            Ok(Some(state)) => self.observe_state(state),
            Ok(None) => trace!("no AC state yet"),
            Err(e) => warn!(error = %e, "failed to read AC state"),
        }

        let sample = match source.latest_sample(room_id).await {
            Ok(Some(sample)) => sample,
            Ok(None) => {
                trace!(room_id, "no sample yet");
                return Ok(None);
            }
            Err(e) => {
                warn!(room_id, error = %e, "failed to read sample");
                return Ok(None);
            }
        };
        self.on_sample(sample).await.map(Some)
    }

    /// Evaluates one sample against the trigger and, if a session starts,
    /// runs it through decide and apply.
    pub async fn on_sample(&self, sample: Sample) -> Result<TriggerOutcome> {
        sample.validate()?;
        let inner = &self.inner;
        let di = discomfort_index(sample.temperature, sample.humidity);
        if di < inner.trigger_threshold {
            return Ok(TriggerOutcome::BelowThreshold {
                discomfort_index: di,
            });
        }

        let (generation, state_now) = {
            let mut session = inner.lock();
            if session.phase != Phase::Idle || session.manual_in_flight {
                trace!(phase = %session.phase, di, "trigger ignored");
                return Ok(TriggerOutcome::Ignored);
            }
            session.generation += 1;
            inner.transition(&mut session, Phase::Deciding);
            (session.generation, session.reported)
        };
        info!(di, generation, "discomfort above threshold, deciding");
        inner.log(|l| l.log_trigger(generation, &sample, di));
        inner.emit(&ControlEvent::Triggered {
            discomfort_index: di,
            generation,
        });

        let decision = match inner.decision.decide(&sample, state_now.as_ref()).await {
            Ok(decision) => decision,
            Err(e) => {
                let reason = e.to_string();
                if !inner.settle_idle(generation) {
                    debug!(generation, "stale decision failure discarded");
                    return Ok(TriggerOutcome::Stale);
                }
                warn!(error = %e, "auto-control decision failed");
                inner.log(|l| l.log_failure(generation, "decide", &reason));
                inner.emit(&ControlEvent::DecisionFailed {
                    reason: reason.clone(),
                });
                return Ok(TriggerOutcome::DecisionFailed { reason });
            }
        };
        inner.log(|l| l.log_decision(generation, &decision));

        let command = match decision {
            Decision::Skip => {
                if !inner.settle_idle(generation) {
                    debug!(generation, "stale skip discarded");
                    return Ok(TriggerOutcome::Stale);
                }
                info!(di, "no auto-control needed");
                inner.emit(&ControlEvent::Skipped {
                    discomfort_index: di,
                });
                return Ok(TriggerOutcome::Skipped {
                    discomfort_index: di,
                });
            }
            Decision::Command(command) => command,
        };

        let current = inner.lock().is_deciding(generation);
        if !current {
            debug!(generation, "session stopped before apply, command dropped");
            return Ok(TriggerOutcome::Stale);
        }

        if let Err(e) = inner.gateway.apply(&command.state).await {
            let reason = e.to_string();
            if !inner.settle_idle(generation) {
                debug!(generation, "stale apply failure discarded");
                return Ok(TriggerOutcome::Stale);
            }
            warn!(error = %e, "auto-control command was not applied");
            inner.log(|l| l.log_failure(generation, "apply", &reason));
            inner.emit(&ControlEvent::ApplyFailed {
                reason: reason.clone(),
            });
            return Ok(TriggerOutcome::ApplyFailed { reason });
        }

        let Some(session_id) = inner.activate(generation, &command) else {
            debug!(generation, "session stopped during apply, not activating");
            return Ok(TriggerOutcome::Stale);
        };
        info!(
            %session_id,
            state = %command.state,
            duration = command.duration_secs,
            "auto-control active"
        );
        inner.log(|l| l.log_command(session_id, &command));
        inner.emit(&ControlEvent::CommandApplied {
            session_id,
            command,
        });
        Ok(TriggerOutcome::Activated {
            session_id,
            command,
        })
    }

    /// Applies a state chosen by a user. Refused while any automatic session
    /// is deciding, running or unwinding.
    pub async fn apply_manual(&self, state: AcState) -> Result<ManualOutcome> {
        state.validate()?;
        let inner = &self.inner;
        let rejected = {
            let mut session = inner.lock();
            if session.phase != Phase::Idle {
                Some(RejectReason::AutoControlActive)
            } else if session.manual_in_flight {
                Some(RejectReason::ManualCommandInFlight)
            } else {
                session.manual_in_flight = true;
                None
            }
        };
        if let Some(reason) = rejected {
            info!(%reason, "manual command rejected");
            inner.emit(&ControlEvent::ManualRejected { reason });
            return Ok(ManualOutcome::Rejected(reason));
        }

        let _write = ManualWrite {
            session: &inner.session,
        };
        inner.gateway.apply(&state).await?;
        inner.lock().reported = Some(state);
        debug!(state = %state, "manual command applied");
        Ok(ManualOutcome::Applied)
    }

    /// Ends the current session at once. A session that is already writing
    /// its restore state keeps the lockout until that write completes.
    /// Returns false if there was nothing to stop.
    pub fn request_stop(&self) -> bool {
        let inner = &self.inner;
        let mut session = inner.lock();
        let from = session.phase;
        if from == Phase::Idle {
            trace!("stop requested while idle");
            return false;
        }

        if from == Phase::Stopping {
            // the expiry restore write is in flight; finish_restore releases
            // the lockout once the device has answered
            debug!("stop requested while restoring pre-session state");
            return true;
        }

        inner.transition(&mut session, Phase::Stopping);
        if let Some(handle) = session.countdown.take() {
            handle.abort();
        }
        session.generation += 1;
        session.remaining_secs = 0;
        session.commanded = None;
        session.previous = None;
        session.started_at = None;
        let session_id = session.session_id.take();
        inner.transition(&mut session, Phase::Idle);
        drop(session);

        info!(?session_id, "auto-control stopped");
        inner.emit(&ControlEvent::Stopped { session_id });
        true
    }
}
