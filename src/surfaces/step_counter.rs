//! Daily step count card.
//!
//! Readings arrive from the host as they happen; each one is followed by an
//! immediate refresh so the count never waits for the next boundary.

use crate::schedule::timers::{Refresh, RefreshContext};
use crate::surfaces::{Frame, FrameCounter, Surface, SurfaceKind, echo_frame};

pub struct StepCounter {
    steps: u32,
    counter: FrameCounter,
    last: Option<Frame>,
    echo: bool,
}

impl StepCounter {
    pub fn new(echo: bool) -> Self {
        Self {
            steps: 0,
            counter: FrameCounter::default(),
            last: None,
            echo,
        }
    }

    pub fn steps(&self) -> u32 {
        self.steps
    }

    /// Store the latest cumulative reading for today.
    pub fn set_steps(&mut self, steps: u32) {
        self.steps = steps;
    }
}

impl Refresh for StepCounter {
    fn refresh(&mut self, frame: &RefreshContext) {
        self.counter.record(frame.mode);

        let title = if frame.mode.is_ambient() {
            "Steps"
        } else {
            "Daily step count"
        };
        let rendered = Frame {
            at_ms: frame.now_ms,
            mode: frame.mode,
            lines: vec![title.to_string(), format!("{} steps today", self.steps)],
        };

        if self.echo {
            echo_frame(SurfaceKind::StepCounter, self.counter.total(), &rendered);
        }
        self.last = Some(rendered);
    }
}

impl Surface for StepCounter {
    fn kind(&self) -> SurfaceKind {
        SurfaceKind::StepCounter
    }

    fn last_frame(&self) -> Option<&Frame> {
        self.last.as_ref()
    }

    fn frames(&self) -> FrameCounter {
        self.counter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::DisplayMode;

    #[test]
    fn test_renders_latest_reading() {
        let mut card = StepCounter::new(false);
        card.set_steps(4_210);
        card.refresh(&RefreshContext {
            now_ms: 1_000,
            mode: DisplayMode::Interactive,
            interval_ms: 1_000,
            refresh_count: 1,
        });

        let frame = card.last_frame().unwrap();
        assert_eq!(frame.lines, vec!["Daily step count", "4210 steps today"]);
    }

    #[test]
    fn test_reading_without_refresh_is_not_shown() {
        let mut card = StepCounter::new(false);
        card.set_steps(10);
        assert!(card.last_frame().is_none());
        assert_eq!(card.steps(), 10);
    }
}
