//! Small shared helpers for display formatting.

use std::path::Path;

/// Render a path with the home directory replaced by `~`.
///
/// Keeps user names out of logs that people paste into bug reports.
pub fn private_path(path: &Path) -> String {
    if let Some(home) = dirs::home_dir()
        && let Ok(stripped) = path.strip_prefix(&home)
    {
        return format!("~/{}", stripped.display());
    }
    path.display().to_string()
}

/// Format a millisecond duration the way the logs show intervals: `500ms`, `20s`, `1m 5.5s`.
pub fn format_millis(ms: u64) -> String {
    if ms < 1_000 {
        format!("{ms}ms")
    } else if ms % 1_000 != 0 && ms < 60_000 {
        format!("{:.1}s", ms as f64 / 1_000.0)
    } else if ms < 60_000 {
        format!("{}s", ms / 1_000)
    } else {
        let minutes = ms / 60_000;
        let remainder_ms = ms % 60_000;
        if remainder_ms == 0 {
            format!("{minutes}m")
        } else if remainder_ms % 1_000 != 0 {
            format!("{minutes}m {:.1}s", remainder_ms as f64 / 1_000.0)
        } else {
            format!("{minutes}m {}s", remainder_ms / 1_000)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_format_millis_ranges() {
        assert_eq!(format_millis(500), "500ms");
        assert_eq!(format_millis(1_000), "1s");
        assert_eq!(format_millis(1_500), "1.5s");
        assert_eq!(format_millis(20_000), "20s");
        assert_eq!(format_millis(60_000), "1m");
        assert_eq!(format_millis(65_000), "1m 5s");
        assert_eq!(format_millis(65_500), "1m 5.5s");
        assert_eq!(format_millis(120_300), "2m 0.3s");
    }

    #[test]
    fn test_private_path_outside_home_is_unchanged() {
        let path = PathBuf::from("/etc/ambientr/ambientr.toml");
        assert_eq!(private_path(&path), "/etc/ambientr/ambientr.toml");
    }
}
