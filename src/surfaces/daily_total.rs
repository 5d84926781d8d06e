//! Status panel showing the active mode, its update rate and a draw count.

use crate::schedule::timers::{Refresh, RefreshContext};
use crate::surfaces::{Frame, FrameCounter, Surface, SurfaceKind, clock_text, echo_frame};

pub struct DailyTotal {
    draw_count: u64,
    counter: FrameCounter,
    last: Option<Frame>,
    echo: bool,
}

impl DailyTotal {
    pub fn new(echo: bool) -> Self {
        Self {
            draw_count: 0,
            counter: FrameCounter::default(),
            last: None,
            echo,
        }
    }

    pub fn draw_count(&self) -> u64 {
        self.draw_count
    }
}

impl Refresh for DailyTotal {
    fn refresh(&mut self, frame: &RefreshContext) {
        self.draw_count += 1;
        self.counter.record(frame.mode);

        let mode_label = if frame.mode.is_ambient() {
            "Ambient"
        } else {
            "Interactive"
        };

        let rendered = Frame {
            at_ms: frame.now_ms,
            mode: frame.mode,
            lines: vec![
                mode_label.to_string(),
                format!("Update rate: {}s", frame.interval_ms / 1_000),
                clock_text(frame.now_ms, "%H:%M:%S"),
                format!("Timestamp: {}", frame.now_ms),
                format!("Draw count: {}", self.draw_count),
            ],
        };

        if self.echo {
            echo_frame(SurfaceKind::DailyTotal, self.draw_count, &rendered);
        }
        self.last = Some(rendered);
    }
}

impl Surface for DailyTotal {
    fn kind(&self) -> SurfaceKind {
        SurfaceKind::DailyTotal
    }

    fn last_frame(&self) -> Option<&Frame> {
        self.last.as_ref()
    }

    fn frames(&self) -> FrameCounter {
        self.counter
    }
}
