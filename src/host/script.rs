//! Scripted host scenarios for simulation.
//!
//! A script is a comma-separated list of `SECS:EVENT` steps, where `SECS` is the
//! offset from the start of the run (fractions allowed) and `EVENT` one of:
//!
//! ```text
//! visible | hidden | ambient | interactive | steps=N | tap | mute | unmute | destroy
//! ```
//!
//! For example `0:visible,5:ambient,125:interactive,130:hidden`.

use anyhow::{Context, Result, bail};
use std::collections::VecDeque;

use super::HostEvent;

/// One scheduled host event, at an offset from the start of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptStep {
    pub offset_ms: u64,
    pub event: HostEvent,
}

/// Parse a script. Steps are returned in time order; equal offsets keep their
/// written order.
pub fn parse_script(script: &str) -> Result<Vec<ScriptStep>> {
    let mut steps = Vec::new();

    for (index, raw) in script.split(',').enumerate() {
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }

        let (offset, event) = raw
            .split_once(':')
            .with_context(|| format!("Step {} '{raw}' is not in SECS:EVENT form", index + 1))?;

        let offset_ms = parse_offset(offset.trim())
            .with_context(|| format!("Step {} '{raw}' has an invalid offset", index + 1))?;
        let event = parse_event(event.trim())
            .with_context(|| format!("Step {} '{raw}' has an invalid event", index + 1))?;

        steps.push(ScriptStep { offset_ms, event });
    }

    if steps.is_empty() {
        bail!("Script contains no steps");
    }

    steps.sort_by_key(|step| step.offset_ms);
    Ok(steps)
}

fn parse_offset(text: &str) -> Result<u64> {
    let seconds: f64 = text
        .parse()
        .with_context(|| format!("'{text}' is not a number of seconds"))?;
    if !seconds.is_finite() || seconds < 0.0 {
        bail!("offset must be a non-negative number of seconds, got {text}");
    }
    Ok((seconds * 1_000.0).round() as u64)
}

fn parse_event(text: &str) -> Result<HostEvent> {
    if let Some(count) = text.strip_prefix("steps=") {
        let steps = count
            .parse::<u32>()
            .with_context(|| format!("'{count}' is not a step count"))?;
        return Ok(HostEvent::Steps(steps));
    }

    let event = match text.to_lowercase().as_str() {
        "visible" => HostEvent::Visible,
        "hidden" => HostEvent::Hidden,
        "ambient" => HostEvent::EnterAmbient,
        "interactive" => HostEvent::ExitAmbient,
        "tap" => HostEvent::Tap,
        "mute" => HostEvent::Mute(true),
        "unmute" => HostEvent::Mute(false),
        "destroy" => HostEvent::Destroy,
        other => bail!(
            "unknown event '{other}' (expected visible, hidden, ambient, interactive, steps=N, tap, mute, unmute or destroy)"
        ),
    };
    Ok(event)
}

/// Script steps anchored to an absolute start time, consumed as they come due.
#[derive(Debug, Clone)]
pub struct Timeline {
    start_ms: u64,
    steps: VecDeque<ScriptStep>,
}

impl Timeline {
    pub fn new(start_ms: u64, steps: Vec<ScriptStep>) -> Self {
        Self {
            start_ms,
            steps: steps.into(),
        }
    }

    /// Absolute time of the next step.
    pub fn next_due_ms(&self) -> Option<u64> {
        self.steps
            .front()
            .map(|step| self.start_ms.saturating_add(step.offset_ms))
    }

    /// Remove and return every step due at or before `now_ms`.
    pub fn take_due(&mut self, now_ms: u64) -> Vec<HostEvent> {
        let mut due = Vec::new();
        while self.next_due_ms().is_some_and(|at| at <= now_ms) {
            if let Some(step) = self.steps.pop_front() {
                due.push(step.event);
            }
        }
        due
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_default_scenario() {
        let steps = parse_script("0:visible,5:ambient,125:interactive,130:hidden").unwrap();
        let events: Vec<HostEvent> = steps.iter().map(|s| s.event).collect();

        assert_eq!(
            events,
            vec![
                HostEvent::Visible,
                HostEvent::EnterAmbient,
                HostEvent::ExitAmbient,
                HostEvent::Hidden
            ]
        );
        assert_eq!(steps[1].offset_ms, 5_000);
    }

    #[test]
    fn test_parses_parameterized_and_fractional_steps() {
        let steps = parse_script(" 1.5:steps=420 , 2:tap, 3:mute, 4:UNMUTE, 9:destroy").unwrap();

        assert_eq!(
            steps[0],
            ScriptStep {
                offset_ms: 1_500,
                event: HostEvent::Steps(420)
            }
        );
        assert_eq!(steps[3].event, HostEvent::Mute(false));
        assert_eq!(steps[4].event, HostEvent::Destroy);
    }

    #[test]
    fn test_sorts_by_offset_keeping_written_order() {
        let steps = parse_script("10:hidden,0:visible,10:visible").unwrap();
        let events: Vec<HostEvent> = steps.iter().map(|s| s.event).collect();
        assert_eq!(
            events,
            vec![HostEvent::Visible, HostEvent::Hidden, HostEvent::Visible]
        );
    }

    #[test]
    fn test_rejects_malformed_steps() {
        assert!(parse_script("").is_err());
        assert!(parse_script("visible").is_err());
        assert!(parse_script("-1:visible").is_err());
        assert!(parse_script("0:sideways").is_err());
        assert!(parse_script("0:steps=lots").is_err());

        let err = parse_script("0:visible,x:hidden").unwrap_err();
        assert!(format!("{err:#}").contains("Step 2"));
    }

    #[test]
    fn test_timeline_releases_steps_as_they_come_due() {
        let steps = parse_script("0:visible,5:ambient,5:tap").unwrap();
        let mut timeline = Timeline::new(100_000, steps);

        assert_eq!(timeline.take_due(100_000), vec![HostEvent::Visible]);
        assert_eq!(timeline.next_due_ms(), Some(105_000));
        assert!(timeline.take_due(104_999).is_empty());
        assert_eq!(
            timeline.take_due(105_000),
            vec![HostEvent::EnterAmbient, HostEvent::Tap]
        );
        assert!(timeline.is_empty());
    }
}
