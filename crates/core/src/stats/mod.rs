use std::time::Duration;

use serde::Serialize;

use crate::events::SessionEvent;

/// Accumulates beat and pause counters over the lifetime of a session.
///
/// Purely passive: it consumes [`SessionEvent`]s with their timestamps and
/// never schedules anything itself.
#[derive(Debug, Default)]
pub struct SessionStats {
    session_started_at: Option<Duration>,
    pause_count: u32,
    paused_secs: f64,
    open_pause_started_at: Option<Duration>,
    beat_count: u32,
    beat_change_count: u32,
    /// Insertion-ordered so favorite-pattern ties resolve to the pattern
    /// encountered first.
    pattern_usage: Vec<(String, u32)>,
}

impl SessionStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes a session event into the appropriate counter.
    pub fn handle(&mut self, now: Duration, event: &SessionEvent) {
        match event {
            SessionEvent::SessionStarted => self.on_session_start(now),
            SessionEvent::BeatPulse => self.beat_count += 1,
            SessionEvent::BeatChanged { pattern, .. } => self.on_beat_changed(pattern),
            SessionEvent::PauseStarted { .. } => self.on_pause_start(now),
            SessionEvent::PauseEnded => self.on_pause_end(now),
            SessionEvent::SessionEnded | SessionEvent::MediaSkipped | SessionEvent::MediaRepeated => {}
        }
    }

    fn on_session_start(&mut self, now: Duration) {
        *self = Self::default();
        self.session_started_at = Some(now);
    }

    fn on_pause_start(&mut self, now: Duration) {
        self.pause_count += 1;
        if self.open_pause_started_at.is_some() {
            // Inconsistent event stream; skip duration accounting for this
            // occurrence rather than corrupting the totals.
            tracing::warn!("pause started while a pause was already open");
            return;
        }
        self.open_pause_started_at = Some(now);
    }

    fn on_pause_end(&mut self, now: Duration) {
        match self.open_pause_started_at.take() {
            Some(started) => {
                self.paused_secs += now.saturating_sub(started).as_secs_f64();
            }
            None => tracing::warn!("pause ended without a matching start"),
        }
    }

    fn on_beat_changed(&mut self, pattern: &str) {
        self.beat_change_count += 1;
        match self
            .pattern_usage
            .iter_mut()
            .find(|(name, _)| name == pattern)
        {
            Some((_, count)) => *count += 1,
            None => self.pattern_usage.push((pattern.to_string(), 1)),
        }
    }

    pub fn beat_count(&self) -> u32 {
        self.beat_count
    }

    pub fn pause_count(&self) -> u32 {
        self.pause_count
    }

    /// Freezes the accumulated counters into a report. A pause still open at
    /// session end is counted up to `now`.
    pub fn finish(&mut self, now: Duration) -> SessionReport {
        if self.open_pause_started_at.is_some() {
            self.on_pause_end(now);
        }
        let total_secs = self
            .session_started_at
            .map(|started| now.saturating_sub(started).as_secs_f64())
            .unwrap_or(0.0);
        let active_secs = total_secs - self.paused_secs;

        // Strictly-greater comparison so ties keep the first-encountered
        // pattern (`Iterator::max_by_key` would keep the last).
        let mut favorite_pattern: Option<(&str, u32)> = None;
        for (name, count) in &self.pattern_usage {
            if favorite_pattern.map(|(_, best)| *count > best).unwrap_or(true) {
                favorite_pattern = Some((name, *count));
            }
        }
        let favorite_pattern = favorite_pattern.map(|(name, _)| name.to_string());

        SessionReport {
            total_secs,
            paused_secs: self.paused_secs,
            pause_count: self.pause_count,
            beat_count: self.beat_count,
            beat_change_count: self.beat_change_count,
            average_pause_secs: (self.pause_count > 0)
                .then(|| self.paused_secs / f64::from(self.pause_count)),
            average_beat_rate: (total_secs > 0.0)
                .then(|| f64::from(self.beat_count) / total_secs),
            average_beat_rate_active: (active_secs > 0.0)
                .then(|| f64::from(self.beat_count) / active_secs),
            favorite_pattern,
        }
    }
}

/// Derived session totals, produced once at session end.
///
/// Averages whose divisor would be zero are `None` instead of a fault.
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub total_secs: f64,
    pub paused_secs: f64,
    pub pause_count: u32,
    pub beat_count: u32,
    pub beat_change_count: u32,
    pub average_pause_secs: Option<f64>,
    pub average_beat_rate: Option<f64>,
    pub average_beat_rate_active: Option<f64>,
    pub favorite_pattern: Option<String>,
}
