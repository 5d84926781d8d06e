//! Default configuration file creation.
//!
//! The generated file documents every field inline with aligned comments, so
//! the first file a user opens doubles as the reference.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use super::SurfaceSettings;
use crate::common::constants::*;
use crate::surfaces::SurfaceKind;

/// Write a commented default configuration to `path`, creating parent directories.
pub fn create_default_config(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("Failed to create config directory")?;
    }

    fs::write(path, default_config_content())
        .with_context(|| format!("Failed to write default config to {}", path.display()))
}

/// The text of the default configuration file.
pub fn default_config_content() -> String {
    let surfaces: Vec<String> = SurfaceKind::ALL.iter().map(|k| format!("\"{k}\"")).collect();

    let mut builder = ConfigBuilder::new()
        .add_section("Host")
        .add_setting(
            "surface",
            &format!("\"{DEFAULT_SURFACE}\""),
            &format!("Surface to show: {}", surfaces.join(", ")),
        )
        .add_setting(
            "time_tick_interval_ms",
            &DEFAULT_TIME_TICK_INTERVAL_MS.to_string(),
            &format!(
                "Platform time tick period while ambient ({MINIMUM_TIME_TICK_INTERVAL_MS}-{MAXIMUM_TIME_TICK_INTERVAL_MS})"
            ),
        )
        .add_setting(
            "sleep_in_ambient",
            &DEFAULT_SLEEP_IN_AMBIENT.to_string(),
            "Let the processor sleep between ambient wakes",
        );

    for kind in SurfaceKind::ALL {
        let defaults = SurfaceSettings::defaults_for(kind);
        builder = builder
            .add_table(kind.as_str())
            .add_setting(
                "interactive_interval_ms",
                &defaults.interactive_interval_ms.to_string(),
                &format!(
                    "Refresh cadence while interactive ({MINIMUM_INTERACTIVE_INTERVAL_MS}-{MAXIMUM_INTERACTIVE_INTERVAL_MS})"
                ),
            )
            .add_setting(
                "ambient_interval_ms",
                &defaults.ambient_interval_ms.to_string(),
                &format!(
                    "Refresh cadence while ambient ({MINIMUM_AMBIENT_INTERVAL_MS}-{MAXIMUM_AMBIENT_INTERVAL_MS})"
                ),
            )
            .add_setting(
                "ambient_wake",
                &defaults.ambient_wake.to_string(),
                if defaults.ambient_wake {
                    "Arm an exact wake alarm in ambient mode"
                } else {
                    "false = ambient refreshes follow the time tick only"
                },
            );

        if let Some(muted) = defaults.muted_interval_ms {
            builder = builder.add_setting(
                "muted_interval_ms",
                &muted.to_string(),
                "Interactive cadence while muted",
            );
        }
    }

    let mut content = builder.build();
    content.push('\n');
    content
}

struct ConfigBuilder {
    entries: Vec<ConfigEntry>,
}

#[derive(Clone)]
struct ConfigEntry {
    content: String,
    entry_type: EntryType,
}

#[derive(Clone)]
enum EntryType {
    /// Comment heading for top-level keys, `#[Title]`
    Section,
    /// Real TOML table, `[name]`
    Table,
    Setting { line: String, comment: String },
}

impl ConfigBuilder {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    fn add_section(mut self, title: &str) -> Self {
        self.entries.push(ConfigEntry {
            content: format!("#[{title}]"),
            entry_type: EntryType::Section,
        });
        self
    }

    fn add_table(mut self, name: &str) -> Self {
        self.entries.push(ConfigEntry {
            content: format!("[{name}]"),
            entry_type: EntryType::Table,
        });
        self
    }

    fn add_setting(mut self, key: &str, value: &str, comment: &str) -> Self {
        let line = format!("{key} = {value}");
        self.entries.push(ConfigEntry {
            content: line.clone(),
            entry_type: EntryType::Setting {
                line,
                comment: format!("# {comment}"),
            },
        });
        self
    }

    fn build(self) -> String {
        // Comments line up across the whole file
        let max_width = self
            .entries
            .iter()
            .filter_map(|entry| match &entry.entry_type {
                EntryType::Setting { line, .. } => Some(line.len()),
                EntryType::Section | EntryType::Table => None,
            })
            .max()
            .unwrap_or(0)
            + 1;

        let mut result = Vec::new();
        let mut first_heading = true;

        for entry in self.entries {
            match entry.entry_type {
                EntryType::Section | EntryType::Table => {
                    if !first_heading {
                        result.push(String::new());
                    }
                    result.push(entry.content);
                    first_heading = false;
                }
                EntryType::Setting { line, comment } => {
                    let padding = " ".repeat(max_width - line.len());
                    result.push(format!("{line}{padding}{comment}"));
                }
            }
        }

        result.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_aligns_comments() {
        let content = ConfigBuilder::new()
            .add_section("Host")
            .add_setting("a", "1", "short")
            .add_setting("longer_key", "true", "long")
            .build();

        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "#[Host]");
        assert_eq!(lines[1].find('#'), lines[2].find('#'));
    }

    #[test]
    fn test_tables_are_separated_by_blank_lines() {
        let content = ConfigBuilder::new()
            .add_section("Host")
            .add_setting("surface", "\"watch_face\"", "x")
            .add_table("watch_face")
            .add_setting("ambient_wake", "false", "y")
            .build();

        assert!(content.contains("\n\n[watch_face]\n"));
    }

    #[test]
    fn test_default_content_parses_to_default_settings() {
        let config: crate::config::Config = toml::from_str(&default_config_content()).unwrap();

        for kind in SurfaceKind::ALL {
            assert_eq!(config.surface_settings(kind), SurfaceSettings::defaults_for(kind));
        }
        assert_eq!(config.surface(), DEFAULT_SURFACE);
        assert!(
            config
                .surface_config(SurfaceKind::DailyTotal)
                .is_some_and(|t| t.muted_interval_ms.is_none())
        );
    }
}
