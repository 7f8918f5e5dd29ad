//! Output context — the render clock and its run state.

/// Run state of the output context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    /// Created but not yet started; renders silence and the clock is frozen.
    Suspended,
    Running,
    /// Disposed. Terminal.
    Closed,
}

/// Frame clock shared by every voice and effect of one engine.
#[derive(Debug, Clone)]
pub struct AudioContext {
    sample_rate: f64,
    frame: u64,
    state: ContextState,
}

impl AudioContext {
    pub fn new(sample_rate: f64) -> Self {
        AudioContext {
            sample_rate,
            frame: 0,
            state: ContextState::Suspended,
        }
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn state(&self) -> ContextState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == ContextState::Running
    }

    /// Seconds elapsed on the render clock.
    pub fn current_time(&self) -> f64 {
        self.frame as f64 / self.sample_rate
    }

    pub fn current_frame(&self) -> u64 {
        self.frame
    }

    /// Start (or restart) the clock. No effect once closed.
    pub fn resume(&mut self) {
        if self.state == ContextState::Suspended {
            self.state = ContextState::Running;
        }
    }

    pub fn suspend(&mut self) {
        if self.state == ContextState::Running {
            self.state = ContextState::Suspended;
        }
    }

    pub fn close(&mut self) {
        self.state = ContextState::Closed;
    }

    /// Move the clock forward one frame.
    #[inline]
    pub(crate) fn tick(&mut self) {
        self.frame += 1;
    }
}
