//! Timestamped parameter automation.
//!
//! An [`AudioParam`] holds a current value plus a timeline of scheduled
//! events. Control code schedules `(target, deadline)` pairs; the render
//! loop commits them by calling [`AudioParam::advance`] once per frame.
//! The semantics follow WebAudio's `setValueAtTime` and
//! `linearRampToValueAtTime`: a ramp interpolates from the previous event's
//! time and value to its own end time and value.

use std::collections::VecDeque;

/// A scheduled automation event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamEvent {
    /// Jump to `value` at `time`.
    SetValue { value: f64, time: f64 },
    /// Reach `value` at `end_time`, linearly from the preceding event.
    LinearRamp { value: f64, end_time: f64 },
}

impl ParamEvent {
    fn time(&self) -> f64 {
        match *self {
            ParamEvent::SetValue { time, .. } => time,
            ParamEvent::LinearRamp { end_time, .. } => end_time,
        }
    }

    fn value(&self) -> f64 {
        match *self {
            ParamEvent::SetValue { value, .. } | ParamEvent::LinearRamp { value, .. } => value,
        }
    }
}

/// A scalar parameter with sample-accurate scheduled automation.
#[derive(Debug, Clone)]
pub struct AudioParam {
    /// Value at `anchor_time`; the starting point of a leading ramp.
    value: f64,
    anchor_time: f64,
    events: VecDeque<ParamEvent>,
}

impl AudioParam {
    pub fn new(value: f64) -> Self {
        AudioParam {
            value,
            anchor_time: 0.0,
            events: VecDeque::new(),
        }
    }

    /// Set the value immediately, discarding any scheduled automation.
    pub fn set_value(&mut self, value: f64) {
        self.value = value;
        self.events.clear();
    }

    /// The committed value (as of the last `advance`).
    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn set_value_at_time(&mut self, value: f64, time: f64) {
        self.insert(ParamEvent::SetValue { value, time });
    }

    pub fn linear_ramp_to_value_at_time(&mut self, value: f64, end_time: f64) {
        self.insert(ParamEvent::LinearRamp { value, end_time });
    }

    /// Remove every event scheduled at or after `time`.
    pub fn cancel_scheduled_values(&mut self, time: f64) {
        self.events.retain(|e| e.time() < time);
    }

    /// Whether any automation is still pending.
    pub fn has_scheduled_values(&self) -> bool {
        !self.events.is_empty()
    }

    /// Events after the anchor, in time order.
    pub fn events(&self) -> impl Iterator<Item = &ParamEvent> {
        self.events.iter()
    }

    /// Value of the parameter at `time` without committing anything.
    pub fn value_at(&self, time: f64) -> f64 {
        let mut value = self.value;
        let mut from = self.anchor_time;
        for event in &self.events {
            match *event {
                ParamEvent::SetValue { value: v, time: t } => {
                    if t > time {
                        return value;
                    }
                    value = v;
                    from = t;
                }
                ParamEvent::LinearRamp {
                    value: v,
                    end_time,
                } => {
                    if end_time <= time {
                        value = v;
                        from = end_time;
                        continue;
                    }
                    let span = end_time - from;
                    if span <= 0.0 || time <= from {
                        return value;
                    }
                    let t = (time - from) / span;
                    return value + (v - value) * t;
                }
            }
        }
        value
    }

    /// Commit every event that has completed by `time` and return the value
    /// at `time`.
    pub fn advance(&mut self, time: f64) -> f64 {
        if self.events.is_empty() {
            return self.value;
        }
        let current = self.value_at(time);
        while let Some(event) = self.events.front() {
            if event.time() > time {
                break;
            }
            self.value = event.value();
            self.anchor_time = event.time();
            self.events.pop_front();
        }
        current
    }

    fn insert(&mut self, event: ParamEvent) {
        // Events with equal times keep insertion order.
        let at = self
            .events
            .iter()
            .position(|e| e.time() > event.time())
            .unwrap_or(self.events.len());
        self.events.insert(at, event);
    }
}
