//! Terminal progress bars and table helpers.

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use sidekick_download::TransferProgress;

/// Bar for a byte transfer. Starts as a spinner until the size is known.
pub fn transfer_bar(label: &str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(spinner_style());
    bar.set_message(label.to_string());
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}

/// Feed one transfer update into a bar made by [`transfer_bar`].
pub fn update_transfer_bar(bar: &ProgressBar, progress: &TransferProgress) {
    if let Some(total) = progress.total {
        if bar.length() != Some(total) {
            bar.set_style(bytes_style());
            bar.set_length(total);
        }
    }
    bar.set_position(progress.downloaded);
}

/// Bar on a 0..=100 scale with a changing message.
pub fn percent_bar() -> ProgressBar {
    let bar = ProgressBar::new(100);
    bar.set_style(percent_style());
    bar
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.green} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

fn bytes_style() -> ProgressStyle {
    ProgressStyle::with_template(
        "{spinner:.green} {msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, ETA {eta})",
    )
    .map_or_else(|_| ProgressStyle::default_bar(), |s| s.progress_chars("█▓░"))
}

fn percent_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.green} [{bar:40.cyan/blue}] {pos:>3}% {msg}")
        .map_or_else(|_| ProgressStyle::default_bar(), |s| s.progress_chars("█▓░"))
}

/// Print a horizontal separator line.
pub fn print_separator(width: usize) {
    println!("{}", "-".repeat(width));
}

/// Truncate a string to `max_len` characters, adding "..." if truncated.
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}
