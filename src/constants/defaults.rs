use std::time::Duration;

/// Enforce gmutes on sight unless STRICT_GMUTE says otherwise
pub const DEFAULT_STRICT_GMUTE: bool = true;

/// Prefix for text commands (needed for the reply-to-message target form)
pub const DEFAULT_COMMAND_PREFIX: &str = "!";

/// Discord caps member timeouts at 28 days
pub const MAX_RESTRICTION: Duration = Duration::from_secs(28 * 24 * 60 * 60);

/// Slack subtracted from the cap so clock skew never pushes us past it
pub const RESTRICTION_MARGIN: Duration = Duration::from_secs(60);

/// Name of the document produced by /gmutelist
pub const GMUTE_LIST_FILENAME: &str = "gmutelist.txt";

/// Length of the restriction applied per guild
pub fn restriction_length() -> Duration {
    MAX_RESTRICTION - RESTRICTION_MARGIN
}

/// Format duration for display
pub fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();

    if total_secs < 60 {
        format!("{} seconds", total_secs)
    } else if total_secs < 3600 {
        let mins = total_secs / 60;
        format!("{} minute{}", mins, if mins == 1 { "" } else { "s" })
    } else if total_secs < 86400 {
        let hours = total_secs / 3600;
        format!("{} hour{}", hours, if hours == 1 { "" } else { "s" })
    } else {
        let days = total_secs / 86400;
        format!("{} day{}", days, if days == 1 { "" } else { "s" })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_restriction_within_discord_cap() {
        assert!(restriction_length() < MAX_RESTRICTION);
        assert_eq!(format_duration(MAX_RESTRICTION), "28 days");
        assert_eq!(format_duration(restriction_length()), "27 days");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(5)), "5 seconds");
        assert_eq!(format_duration(Duration::from_secs(60)), "1 minute");
        assert_eq!(format_duration(Duration::from_secs(7200)), "2 hours");
    }
}
