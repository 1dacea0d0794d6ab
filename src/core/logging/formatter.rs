/// Log Formatting Utilities
///
/// This module provides consistent formatting for logs across the engine
use colored::*;

use crate::core::types::Tier;

/// Format a hash for display (truncated with ellipsis)
pub fn format_hash(hash: &[u8], length: usize) -> ColoredString {
    format_hex(&hex::encode(hash), length)
}

/// Truncate an already hex-encoded value
pub fn format_hex(hex_str: &str, length: usize) -> ColoredString {
    let truncated = if hex_str.len() > length {
        format!("{}...", &hex_str[..length])
    } else {
        hex_str.to_string()
    };
    truncated.bright_cyan()
}

/// Shorten a provider identity for log lines
pub fn format_provider(provider_id: &str) -> ColoredString {
    let short: String = provider_id.chars().take(10).collect();
    if short.len() < provider_id.len() {
        format!("{}...", short).bright_white()
    } else {
        short.bright_white()
    }
}

/// Format a byte count in human-readable binary units
pub fn format_file_size(bytes: u64) -> ColoredString {
    const UNITS: [&str; 6] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0]).bright_yellow()
    } else {
        format!("{:.2} {}", value, UNITS[unit]).bright_yellow()
    }
}

/// Format duration in human-readable format
pub fn format_duration_ms(ms: u64) -> ColoredString {
    if ms < 1000 {
        format!("{}ms", ms).bright_yellow()
    } else if ms < 60000 {
        format!("{:.2}s", ms as f64 / 1000.0).bright_yellow()
    } else {
        let minutes = ms / 60000;
        let seconds = (ms % 60000) as f64 / 1000.0;
        format!("{}m{:.1}s", minutes, seconds).bright_yellow()
    }
}

/// Format a percentage with appropriate color coding
pub fn format_percentage(value: f64) -> ColoredString {
    let percentage_str = format!("{:.1}%", value * 100.0);
    if value >= 0.9 {
        percentage_str.bright_green()
    } else if value >= 0.7 {
        percentage_str.bright_yellow()
    } else {
        percentage_str.bright_red()
    }
}

/// Format a reward; penalties render red
pub fn format_reward(value: f64) -> ColoredString {
    let s = format!("{:.4}", value);
    if value > 0.0 {
        s.bright_green()
    } else if value < 0.0 {
        s.bright_red()
    } else {
        s.bright_black()
    }
}

pub fn format_tier(tier: Tier) -> ColoredString {
    match tier {
        Tier::Bronze => tier.name().yellow(),
        Tier::Silver => tier.name().white(),
        Tier::Gold => tier.name().bright_yellow(),
        Tier::Platinum => tier.name().bright_white(),
        Tier::Diamond => tier.name().bright_cyan(),
        Tier::Emerald => tier.name().bright_green(),
        Tier::Ruby => tier.name().bright_red(),
        Tier::SuperSaiyan => tier.name().bright_magenta().bold(),
    }
}

/// Format a count with thousands separators
pub fn format_count(count: u64) -> ColoredString {
    if count < 1000 {
        count.to_string().bright_green()
    } else if count < 1_000_000 {
        format!("{:.1}K", count as f64 / 1000.0).bright_green()
    } else {
        format!("{:.1}M", count as f64 / 1_000_000.0).bright_green()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_hash_truncates() {
        colored::control::set_override(false);
        assert_eq!(format_hash(&[0xab; 32], 8).to_string(), "abababab...");
        assert_eq!(format_hex("abcd", 8).to_string(), "abcd");
    }

    #[test]
    fn test_format_file_size_units() {
        colored::control::set_override(false);
        assert_eq!(format_file_size(512).to_string(), "512 B");
        assert_eq!(format_file_size(1536).to_string(), "1.50 KiB");
        assert_eq!(
            format_file_size(Tier::Bronze.storage_limit()).to_string(),
            "10.00 TiB"
        );
    }

    #[test]
    fn test_format_duration() {
        colored::control::set_override(false);
        assert_eq!(format_duration_ms(250).to_string(), "250ms");
        assert_eq!(format_duration_ms(1500).to_string(), "1.50s");
        assert_eq!(format_duration_ms(90_000).to_string(), "1m30.0s");
    }
}
