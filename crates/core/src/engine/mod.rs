use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::{
    pattern::{PatternCatalog, RhythmPattern},
    timeline::{TimerId, TimerWheel},
    PulsedeckError, Result,
};

/// Tunable bounds and probabilities for the beat engine.
///
/// The engine trusts these values as given; `min <= max` ordering is
/// enforced by the settings surface before they ever reach the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineTunables {
    /// Lower bound of the sampled pulse frequency in Hz.
    pub min_frequency: f64,
    /// Upper bound of the sampled pulse frequency in Hz.
    pub max_frequency: f64,
    /// Lower bound of a segment's target duration in seconds.
    pub min_segment_secs: f64,
    /// Upper bound of a segment's target duration in seconds.
    pub max_segment_secs: f64,
    /// Lower bound of a rest period in whole seconds.
    pub min_pause_secs: u64,
    /// Upper bound of a rest period in whole seconds.
    pub max_pause_secs: u64,
    /// Probability of resampling once the segment target has elapsed.
    pub resample_chance: f64,
    /// Probability, given a successful resample gate, of entering a pause
    /// instead of resampling.
    pub pause_chance: f64,
}

impl Default for EngineTunables {
    fn default() -> Self {
        Self {
            min_frequency: 0.5,
            max_frequency: 5.0,
            min_segment_secs: 15.0,
            max_segment_secs: 50.0,
            min_pause_secs: 5,
            max_pause_secs: 20,
            resample_chance: 0.1,
            pause_chance: 0.005,
        }
    }
}

/// Notification emitted by the engine as its state machine transitions.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// An audible pulse (a positive pattern step just elapsed).
    Pulse,
    /// Frequency, segment duration, and pattern were resampled together.
    BeatChanged {
        old_frequency: f64,
        new_frequency: f64,
        pattern: String,
    },
    /// A rest period began; `seconds` is its full sampled length.
    PauseStarted { seconds: u64 },
    /// One second of the rest period elapsed; display-only.
    PauseTick { remaining: u64 },
    /// The rest period finished; the engine resamples immediately after.
    PauseEnded,
}

/// Pattern and position, guarded together so a settings edit can never
/// observe (or produce) a position pointing outside the active pattern.
#[derive(Debug)]
struct PatternCursor {
    pattern: Arc<RhythmPattern>,
    position: usize,
}

const COUNTDOWN_TICK: Duration = Duration::from_secs(1);

/// The beat engine: a self-scheduling probabilistic pulse generator.
///
/// The engine never sleeps or spawns threads. It arms one-shot timers on an
/// internal [`TimerWheel`] and the owner drives it by calling
/// [`BeatEngine::advance`] with the current session time, collecting the
/// [`EngineEvent`]s produced by any timers that became due.
#[derive(Debug)]
pub struct BeatEngine<R: Rng = StdRng> {
    tunables: EngineTunables,
    catalog: Arc<PatternCatalog>,
    selected: Vec<String>,
    rng: R,

    /// Pulses per second; 0.0 means uninitialized and forces a resample on
    /// the next scheduling step.
    frequency: f64,
    segment_started_at: Duration,
    segment_target_secs: f64,
    cursor: Arc<Mutex<PatternCursor>>,
    /// Step consumed when the pending pulse timer was armed; decides whether
    /// the timer firing produces an audible pulse.
    pending_step: i32,

    running: bool,
    paused: bool,
    pause_remaining_secs: u64,

    timers: TimerWheel,
    pulse_timer: Option<TimerId>,
    pause_timer: Option<TimerId>,
}

impl BeatEngine<StdRng> {
    /// Creates an engine drawing randomness from the operating system.
    pub fn new(catalog: Arc<PatternCatalog>, tunables: EngineTunables) -> Self {
        Self::with_rng(catalog, tunables, StdRng::from_os_rng())
    }
}

impl<R: Rng> BeatEngine<R> {
    /// Creates an engine with an explicit random source. Tests use this with
    /// a seeded [`StdRng`] to make every sampling decision reproducible.
    pub fn with_rng(catalog: Arc<PatternCatalog>, tunables: EngineTunables, rng: R) -> Self {
        let initial = catalog
            .iter()
            .next()
            .cloned()
            .expect("pattern catalog must not be empty");
        let selected = catalog.names();
        Self {
            tunables,
            catalog,
            selected,
            rng,
            frequency: 0.0,
            segment_started_at: Duration::ZERO,
            segment_target_secs: 0.0,
            cursor: Arc::new(Mutex::new(PatternCursor {
                pattern: initial,
                position: 0,
            })),
            pending_step: 0,
            running: false,
            paused: false,
            pause_remaining_secs: 0,
            timers: TimerWheel::new(),
            pulse_timer: None,
            pause_timer: None,
        }
    }

    /// Begins (or resumes) the scheduling loop. Idempotent while running.
    pub fn start(&mut self, now: Duration) -> Result<Vec<EngineEvent>> {
        if self.running {
            return Ok(Vec::new());
        }
        self.running = true;
        let mut events = Vec::new();
        self.schedule_step(now, &mut events)?;
        Ok(events)
    }

    /// Halts all scheduling. Pending timers are cancelled and will never
    /// fire. Sampled state is retained, so a later [`BeatEngine::start`]
    /// resumes mid-segment unless the frequency was reset by a natural
    /// pause expiry.
    pub fn stop(&mut self) {
        if let Some(id) = self.pulse_timer.take() {
            self.timers.cancel(id);
        }
        if let Some(id) = self.pause_timer.take() {
            self.timers.cancel(id);
        }
        self.running = false;
        self.paused = false;
    }

    /// Processes every timer due at `now`, in deadline order, and returns
    /// the events produced by the resulting state transitions.
    pub fn advance(&mut self, now: Duration) -> Result<Vec<EngineEvent>> {
        let mut events = Vec::new();
        while let Some(id) = self.timers.pop_due(now) {
            if self.pulse_timer == Some(id) {
                self.pulse_timer = None;
                self.on_pulse_timer(now, &mut events)?;
            } else if self.pause_timer == Some(id) {
                self.pause_timer = None;
                self.on_countdown_tick(now, &mut events)?;
            }
        }
        Ok(events)
    }

    /// Earliest pending deadline, used by the event loop to size its wait.
    pub fn next_deadline(&self) -> Option<Duration> {
        self.timers.next_deadline()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Current sampled frequency in Hz; 0.0 while uninitialized.
    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    pub fn tunables(&self) -> &EngineTunables {
        &self.tunables
    }

    /// Replaces the tunable bounds and probabilities. Takes effect on the
    /// next scheduling decision; the in-flight segment keeps its already
    /// sampled frequency, duration, and pattern.
    pub fn set_tunables(&mut self, tunables: EngineTunables) {
        self.tunables = tunables;
    }

    pub fn selected(&self) -> &[String] {
        &self.selected
    }

    /// Replaces the set of pattern names the engine may draw from. Rejects
    /// an empty set and unknown names, leaving the prior selection intact.
    pub fn set_selected(&mut self, names: Vec<String>) -> Result<()> {
        if names.is_empty() {
            return Err(PulsedeckError::EmptySelection);
        }
        for name in &names {
            if !self.catalog.contains(name) {
                return Err(PulsedeckError::UnknownPattern(name.clone()));
            }
        }
        self.selected = names;
        Ok(())
    }

    /// Applies tunables and a pattern selection as one edit. `None` selects
    /// the full catalog. Either both parts land or, on a bad selection,
    /// neither does.
    pub fn apply_settings(
        &mut self,
        tunables: EngineTunables,
        selection: Option<Vec<String>>,
    ) -> Result<()> {
        match selection {
            Some(names) => self.set_selected(names)?,
            None => self.selected = self.catalog.names(),
        }
        self.tunables = tunables;
        Ok(())
    }

    /// Name of the pattern the cursor currently points into.
    pub fn active_pattern_name(&self) -> Result<String> {
        Ok(self.lock_cursor()?.pattern.name().to_string())
    }

    /// Current position within the active pattern.
    pub fn pattern_position(&self) -> Result<usize> {
        Ok(self.lock_cursor()?.position)
    }

    /// The resample-check-and-reschedule step at the heart of the state
    /// machine. Runs on start and after every pulse timer expiry.
    fn schedule_step(&mut self, now: Duration, events: &mut Vec<EngineEvent>) -> Result<()> {
        if self.frequency == 0.0 {
            // Uninitialized (first start or post-pause reset): sample
            // everything without reporting a beat change.
            self.resample(now)?;
        }
        let elapsed = now.saturating_sub(self.segment_started_at).as_secs_f64();
        if elapsed >= self.segment_target_secs && self.gate(self.tunables.resample_chance) {
            if self.gate(self.tunables.pause_chance) {
                return self.begin_pause(now, events);
            }
            let old_frequency = self.frequency;
            self.resample(now)?;
            events.push(EngineEvent::BeatChanged {
                old_frequency,
                new_frequency: self.frequency,
                pattern: self.active_pattern_name()?,
            });
        }

        let (wait, step) = {
            let mut cursor = self.lock_cursor()?;
            let step = cursor.pattern.steps()[cursor.position];
            cursor.position = (cursor.position + 1) % cursor.pattern.len();
            // `unsigned_abs` because `i32::MIN.abs()` would overflow.
            let millis = (1.0 / self.frequency) * 1000.0 / f64::from(step.unsigned_abs());
            // Truncated to whole milliseconds, but never zero: a zero wait
            // would make the timer due instantly and spin the loop.
            (Duration::from_millis((millis as u64).max(1)), step)
        };
        self.pending_step = step;
        if let Some(id) = self.pulse_timer.take() {
            self.timers.cancel(id);
        }
        self.pulse_timer = Some(self.timers.schedule(now, wait));
        Ok(())
    }

    fn on_pulse_timer(&mut self, now: Duration, events: &mut Vec<EngineEvent>) -> Result<()> {
        if self.pending_step > 0 {
            events.push(EngineEvent::Pulse);
        }
        self.schedule_step(now, events)
    }

    /// Draws a new frequency, segment target, and pattern as one atomic
    /// unit, resetting the cursor position.
    fn resample(&mut self, now: Duration) -> Result<()> {
        let t = &self.tunables;
        self.frequency = self.rng.random_range(t.min_frequency..=t.max_frequency);
        self.segment_target_secs = self.rng.random_range(t.min_segment_secs..=t.max_segment_secs);
        self.segment_started_at = now;

        // The settings surface guards against an empty selection, but fall
        // back to the full catalog rather than panic if one slips through.
        let name = if self.selected.is_empty() {
            tracing::warn!("pattern selection is empty, falling back to full catalog");
            let names = self.catalog.names();
            names[self.rng.random_range(0..names.len())].clone()
        } else {
            self.selected[self.rng.random_range(0..self.selected.len())].clone()
        };
        let pattern = self.catalog.get(&name)?;

        let mut cursor = self.lock_cursor()?;
        cursor.pattern = pattern;
        cursor.position = 0;
        Ok(())
    }

    fn begin_pause(&mut self, now: Duration, events: &mut Vec<EngineEvent>) -> Result<()> {
        if let Some(id) = self.pulse_timer.take() {
            self.timers.cancel(id);
        }
        let t = &self.tunables;
        self.pause_remaining_secs = self
            .rng
            .random_range(t.min_pause_secs..=t.max_pause_secs);
        self.paused = true;
        events.push(EngineEvent::PauseStarted {
            seconds: self.pause_remaining_secs,
        });
        self.pause_timer = Some(self.timers.schedule(now, COUNTDOWN_TICK));
        Ok(())
    }

    fn on_countdown_tick(&mut self, now: Duration, events: &mut Vec<EngineEvent>) -> Result<()> {
        self.pause_remaining_secs = self.pause_remaining_secs.saturating_sub(1);
        if self.pause_remaining_secs == 0 {
            self.paused = false;
            self.frequency = 0.0;
            events.push(EngineEvent::PauseEnded);
            return self.schedule_step(now, events);
        }
        events.push(EngineEvent::PauseTick {
            remaining: self.pause_remaining_secs,
        });
        self.pause_timer = Some(self.timers.schedule(now, COUNTDOWN_TICK));
        Ok(())
    }

    fn gate(&mut self, chance: f64) -> bool {
        self.rng.random_bool(chance.clamp(0.0, 1.0))
    }

    fn lock_cursor(&self) -> Result<MutexGuard<'_, PatternCursor>> {
        self.cursor
            .lock()
            .map_err(|_| PulsedeckError::msg("pattern cursor has been poisoned"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(value: u64) -> Duration {
        Duration::from_secs(value)
    }

    fn millis(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    fn engine_with(tunables: EngineTunables, seed: u64) -> BeatEngine<StdRng> {
        BeatEngine::with_rng(
            Arc::new(PatternCatalog::builtin()),
            tunables,
            StdRng::seed_from_u64(seed),
        )
    }

    fn steady_tunables() -> EngineTunables {
        EngineTunables {
            min_frequency: 1.0,
            max_frequency: 1.0,
            min_segment_secs: 100.0,
            max_segment_secs: 100.0,
            resample_chance: 0.0,
            pause_chance: 0.0,
            ..EngineTunables::default()
        }
    }

    #[test]
    fn pulses_steadily_at_one_hz() {
        let mut engine = engine_with(steady_tunables(), 7);
        engine.set_selected(vec!["Standard Beat".to_string()]).unwrap();

        let startup = engine.start(secs(0)).unwrap();
        assert!(startup.is_empty());

        for tick in 1..=10u64 {
            assert_eq!(engine.next_deadline(), Some(secs(tick)));
            let events = engine.advance(secs(tick)).unwrap();
            assert_eq!(events, vec![EngineEvent::Pulse]);
        }
        assert!((engine.frequency() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn step_durations_follow_pattern_magnitudes() {
        let catalog = PatternCatalog::new(vec![
            RhythmPattern::new("Half Rest", vec![2, -1]).unwrap(),
        ])
        .unwrap();
        let tunables = EngineTunables {
            min_frequency: 2.0,
            max_frequency: 2.0,
            min_segment_secs: 100.0,
            max_segment_secs: 100.0,
            resample_chance: 0.0,
            pause_chance: 0.0,
            ..EngineTunables::default()
        };
        let mut engine =
            BeatEngine::with_rng(Arc::new(catalog), tunables, StdRng::seed_from_u64(1));

        engine.start(secs(0)).unwrap();
        // Step `2` at 2 Hz: (1/2) * 1000 / 2 = 250 ms, audible.
        assert_eq!(engine.next_deadline(), Some(millis(250)));
        let events = engine.advance(millis(250)).unwrap();
        assert_eq!(events, vec![EngineEvent::Pulse]);

        // Step `-1` at 2 Hz: (1/2) * 1000 / 1 = 500 ms, silent.
        assert_eq!(engine.next_deadline(), Some(millis(750)));
        let events = engine.advance(millis(750)).unwrap();
        assert!(events.is_empty());

        // Pattern wraps back to the audible step.
        assert_eq!(engine.next_deadline(), Some(millis(1000)));
        let events = engine.advance(millis(1000)).unwrap();
        assert_eq!(events, vec![EngineEvent::Pulse]);
    }

    #[test]
    fn extreme_step_magnitudes_never_overflow() {
        let catalog = PatternCatalog::new(vec![
            RhythmPattern::new("Extreme", vec![i32::MIN, 1]).unwrap(),
        ])
        .unwrap();
        let mut engine = BeatEngine::with_rng(
            Arc::new(catalog),
            steady_tunables(),
            StdRng::seed_from_u64(1),
        );

        engine.start(secs(0)).unwrap();
        // The divisor is astronomically large, so the wait collapses to the
        // one-millisecond floor; the silent step produces no pulse.
        assert_eq!(engine.next_deadline(), Some(millis(1)));
        let events = engine.advance(millis(1)).unwrap();
        assert!(events.is_empty());
        assert_eq!(engine.next_deadline(), Some(millis(1) + secs(1)));
    }

    #[test]
    fn position_always_wraps_modulo_pattern_length() {
        let mut engine = engine_with(steady_tunables(), 3);
        engine.set_selected(vec!["Long Rest".to_string()]).unwrap();

        engine.start(secs(0)).unwrap();
        let mut previous = engine.pattern_position().unwrap();
        for tick in 1..=12u64 {
            let deadline = engine.next_deadline().unwrap();
            let _ = engine.advance(deadline).unwrap();
            let position = engine.pattern_position().unwrap();
            assert_eq!(position, (previous + 1) % 4, "tick {tick}");
            assert!(position < 4);
            previous = position;
        }
    }

    #[test]
    fn never_resamples_before_target_duration() {
        let tunables = EngineTunables {
            min_frequency: 1.0,
            max_frequency: 1.0,
            min_segment_secs: 50.0,
            max_segment_secs: 50.0,
            resample_chance: 1.0,
            pause_chance: 0.0,
            ..EngineTunables::default()
        };
        let mut engine = engine_with(tunables, 11);
        engine.set_selected(vec!["Standard Beat".to_string()]).unwrap();

        engine.start(secs(0)).unwrap();
        for tick in 1..50u64 {
            let events = engine.advance(secs(tick)).unwrap();
            assert!(
                !events
                    .iter()
                    .any(|event| matches!(event, EngineEvent::BeatChanged { .. })),
                "resampled at {tick}s, before the 50s target"
            );
        }
        // The gate always passes, so expiry resamples on the next tick.
        let events = engine.advance(secs(50)).unwrap();
        assert!(events
            .iter()
            .any(|event| matches!(event, EngineEvent::BeatChanged { .. })));
    }

    #[test]
    fn certain_gates_pause_immediately_on_expiry() {
        let tunables = EngineTunables {
            min_frequency: 1.0,
            max_frequency: 1.0,
            min_segment_secs: 0.0,
            max_segment_secs: 0.0,
            min_pause_secs: 3,
            max_pause_secs: 3,
            resample_chance: 1.0,
            pause_chance: 1.0,
            ..EngineTunables::default()
        };
        let mut engine = engine_with(tunables, 5);

        // The freshly sampled segment expires instantly, the resample gate
        // passes, and the pause gate diverts into a rest before any pulse.
        let events = engine.start(secs(0)).unwrap();
        assert_eq!(events, vec![EngineEvent::PauseStarted { seconds: 3 }]);
        assert!(engine.is_paused());

        let events = engine.advance(secs(1)).unwrap();
        assert_eq!(events, vec![EngineEvent::PauseTick { remaining: 2 }]);
        let events = engine.advance(secs(2)).unwrap();
        assert_eq!(events, vec![EngineEvent::PauseTick { remaining: 1 }]);

        // Countdown reaches zero: the pause ends, the engine resamples, and
        // with both gates certain it immediately rests again.
        let events = engine.advance(secs(3)).unwrap();
        assert_eq!(
            events,
            vec![
                EngineEvent::PauseEnded,
                EngineEvent::PauseStarted { seconds: 3 },
            ]
        );
    }

    #[test]
    fn pause_is_only_reachable_through_the_resample_gate() {
        // Resample gate closed: pause_chance of 1.0 alone must never pause.
        let tunables = EngineTunables {
            min_frequency: 1.0,
            max_frequency: 1.0,
            min_segment_secs: 0.0,
            max_segment_secs: 0.0,
            resample_chance: 0.0,
            pause_chance: 1.0,
            ..EngineTunables::default()
        };
        let mut engine = engine_with(tunables, 13);
        engine.set_selected(vec!["Standard Beat".to_string()]).unwrap();

        engine.start(secs(0)).unwrap();
        for tick in 1..=30u64 {
            let events = engine.advance(secs(tick)).unwrap();
            assert_eq!(events, vec![EngineEvent::Pulse]);
        }
        assert!(!engine.is_paused());
    }

    #[test]
    fn sampled_frequencies_stay_within_bounds() {
        let tunables = EngineTunables {
            min_frequency: 0.5,
            max_frequency: 5.0,
            min_segment_secs: 0.0,
            max_segment_secs: 0.0,
            resample_chance: 1.0,
            pause_chance: 0.0,
            ..EngineTunables::default()
        };
        let mut engine = engine_with(tunables, 99);

        engine.start(secs(0)).unwrap();
        let mut observed = 0;
        for _ in 0..200 {
            let deadline = engine.next_deadline().unwrap();
            for event in engine.advance(deadline).unwrap() {
                if let EngineEvent::BeatChanged { new_frequency, .. } = event {
                    assert!((0.5..=5.0).contains(&new_frequency));
                    observed += 1;
                }
            }
            assert!((0.5..=5.0).contains(&engine.frequency()));
        }
        assert!(observed > 0, "expected at least one resample");
    }

    #[test]
    fn stop_cancels_all_pending_timers() {
        let mut engine = engine_with(steady_tunables(), 2);
        engine.start(secs(0)).unwrap();
        assert!(engine.next_deadline().is_some());

        engine.stop();
        assert!(!engine.is_running());
        assert_eq!(engine.next_deadline(), None);
        let events = engine.advance(secs(3600)).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn stop_during_pause_cancels_the_countdown() {
        let tunables = EngineTunables {
            min_segment_secs: 0.0,
            max_segment_secs: 0.0,
            min_pause_secs: 10,
            max_pause_secs: 10,
            resample_chance: 1.0,
            pause_chance: 1.0,
            ..EngineTunables::default()
        };
        let mut engine = engine_with(tunables, 4);
        let events = engine.start(secs(0)).unwrap();
        assert!(matches!(events[0], EngineEvent::PauseStarted { .. }));

        engine.stop();
        assert!(engine.advance(secs(100)).unwrap().is_empty());
    }

    #[test]
    fn start_is_idempotent_while_running() {
        let mut engine = engine_with(steady_tunables(), 6);
        engine.start(secs(0)).unwrap();
        let first_deadline = engine.next_deadline();

        let events = engine.start(secs(0)).unwrap();
        assert!(events.is_empty());
        assert_eq!(engine.next_deadline(), first_deadline);
    }

    #[test]
    fn selection_edits_are_validated() {
        let mut engine = engine_with(steady_tunables(), 8);
        let before = engine.selected().to_vec();

        assert!(matches!(
            engine.set_selected(Vec::new()),
            Err(PulsedeckError::EmptySelection)
        ));
        assert!(matches!(
            engine.set_selected(vec!["Bogus".to_string()]),
            Err(PulsedeckError::UnknownPattern(_))
        ));
        assert_eq!(engine.selected(), before.as_slice());

        engine
            .set_selected(vec!["Build Up".to_string(), "Slow Down".to_string()])
            .unwrap();
        assert_eq!(engine.selected().len(), 2);
    }

    #[test]
    fn tunable_edits_never_touch_the_inflight_segment() {
        let mut engine = engine_with(steady_tunables(), 10);
        engine.start(secs(0)).unwrap();
        let frequency = engine.frequency();

        engine.set_tunables(EngineTunables {
            min_frequency: 4.0,
            max_frequency: 4.0,
            ..steady_tunables()
        });
        assert!((engine.frequency() - frequency).abs() < f64::EPSILON);
    }
}
