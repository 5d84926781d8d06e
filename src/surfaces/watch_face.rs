//! Digital watch face.
//!
//! Interactive: `HH:MM:SS` with blinking colons, visible during the first half of
//! every second. Ambient or muted: `HH:MM` with a steady colon and no seconds.
//! A tap cycles the info line between the date, the day of the year and the
//! days left in the year.

use chrono::{DateTime, Datelike, Local, NaiveDate};

use crate::schedule::timers::{Refresh, RefreshContext};
use crate::surfaces::{Frame, FrameCounter, Surface, SurfaceKind, clock_text, echo_frame};
use crate::time_source::local_from_millis;

/// What the second and third lines show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InfoLine {
    #[default]
    Date,
    DayOfYear,
    DaysLeftInYear,
}

impl InfoLine {
    fn next(self) -> Self {
        match self {
            InfoLine::Date => InfoLine::DayOfYear,
            InfoLine::DayOfYear => InfoLine::DaysLeftInYear,
            InfoLine::DaysLeftInYear => InfoLine::Date,
        }
    }
}

pub struct WatchFace {
    info: InfoLine,
    muted: bool,
    counter: FrameCounter,
    last: Option<Frame>,
    echo: bool,
}

impl WatchFace {
    pub fn new(echo: bool) -> Self {
        Self {
            info: InfoLine::default(),
            muted: false,
            counter: FrameCounter::default(),
            last: None,
            echo,
        }
    }

    pub fn tap(&mut self) {
        self.info = self.info.next();
    }

    pub fn info(&self) -> InfoLine {
        self.info
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    fn time_line(&self, frame: &RefreshContext) -> String {
        if frame.mode.is_ambient() || self.muted {
            return clock_text(frame.now_ms, "%H:%M");
        }

        if frame.now_ms % 1_000 < 500 {
            clock_text(frame.now_ms, "%H:%M:%S")
        } else {
            clock_text(frame.now_ms, "%H %M %S")
        }
    }

    fn info_lines(&self, now: DateTime<Local>) -> [String; 2] {
        match self.info {
            InfoLine::Date => [
                now.format("%A").to_string(),
                now.format("%B %-d, %Y").to_string(),
            ],
            InfoLine::DayOfYear => ["Day of year".to_string(), now.ordinal().to_string()],
            InfoLine::DaysLeftInYear => [
                "Days left in year".to_string(),
                days_left_in_year(now.date_naive()).to_string(),
            ],
        }
    }
}

fn days_left_in_year(date: NaiveDate) -> u32 {
    let days_in_year = NaiveDate::from_ymd_opt(date.year(), 12, 31)
        .map(|last| last.ordinal())
        .unwrap_or(365);
    days_in_year.saturating_sub(date.ordinal())
}

impl Refresh for WatchFace {
    fn refresh(&mut self, frame: &RefreshContext) {
        self.counter.record(frame.mode);

        let mut lines = vec![self.time_line(frame)];
        if let Ok(now) = local_from_millis(frame.now_ms) {
            lines.extend(self.info_lines(now));
        }

        let rendered = Frame {
            at_ms: frame.now_ms,
            mode: frame.mode,
            lines,
        };

        if self.echo {
            echo_frame(SurfaceKind::WatchFace, self.counter.total(), &rendered);
        }
        self.last = Some(rendered);
    }
}

impl Surface for WatchFace {
    fn kind(&self) -> SurfaceKind {
        SurfaceKind::WatchFace
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

    // 2026-06-15 12:00:00 UTC
    const NOON_MS: u64 = 1_781_524_800_000;

    fn draw(face: &mut WatchFace, now_ms: u64, mode: DisplayMode) -> Vec<String> {
        face.refresh(&RefreshContext {
            now_ms,
            mode,
            interval_ms: 500,
            refresh_count: 1,
        });
        face.last_frame().unwrap().lines.clone()
    }

    #[test]
    fn test_colons_blink_with_half_seconds() {
        let mut face = WatchFace::new(false);

        let first_half = draw(&mut face, NOON_MS + 250, DisplayMode::Interactive);
        let second_half = draw(&mut face, NOON_MS + 750, DisplayMode::Interactive);

        assert_eq!(first_half[0].matches(':').count(), 2);
        assert_eq!(second_half[0].matches(':').count(), 0);
        assert_eq!(first_half[0].len(), 8);
    }

    #[test]
    fn test_ambient_and_muted_drop_seconds() {
        let mut face = WatchFace::new(false);
        let ambient = draw(&mut face, NOON_MS + 750, DisplayMode::Ambient);
        assert_eq!(ambient[0].len(), 5);
        assert!(ambient[0].contains(':'));

        face.set_muted(true);
        assert!(face.is_muted());
        let muted = draw(&mut face, NOON_MS + 750, DisplayMode::Interactive);
        assert_eq!(muted[0], ambient[0]);
    }

    #[test]
    fn test_tap_cycles_info_line() {
        let mut face = WatchFace::new(false);
        assert_eq!(face.info(), InfoLine::Date);

        // Local date of June 15 noon UTC is the 15th or a neighbour, depending on zone
        let ordinal = local_from_millis(NOON_MS).unwrap().ordinal();

        face.tap();
        let lines = draw(&mut face, NOON_MS, DisplayMode::Interactive);
        assert_eq!(lines[1], "Day of year");
        assert_eq!(lines[2], ordinal.to_string());

        face.tap();
        let lines = draw(&mut face, NOON_MS, DisplayMode::Interactive);
        assert_eq!(lines[1], "Days left in year");
        assert_eq!(lines[2], (365 - ordinal).to_string());

        face.tap();
        assert_eq!(face.info(), InfoLine::Date);
    }

    #[test]
    fn test_days_left_handles_leap_years() {
        let leap_day = NaiveDate::from_ymd_opt(2028, 2, 29).unwrap();
        assert_eq!(days_left_in_year(leap_day), 366 - 60);

        let new_years_eve = NaiveDate::from_ymd_opt(2026, 12, 31).unwrap();
        assert_eq!(days_left_in_year(new_years_eve), 0);
    }
}
