use std::time::Duration;

use configuration::Config;
use indicatif::{ProgressBar, ProgressStyle};

pub const CHECK_CONFIG: &str = "CHECK CONFIG";

const RED: &str = "\x1b[31m";
const RESET: &str = "\x1b[0m";

pub fn red(line: &str) -> String {
    format!("{RED}{line}{RESET}")
}

/// Prints one red line per enabled destructive flag. Returns how many were printed.
pub fn print_alerts(config: &Config) -> usize {
    let alerts = config.destructive_alerts();
    for alert in &alerts {
        println!("{}", red(alert));
    }
    alerts.len()
}

/// Shows a progress bar that advances once per `tick` for `steps` ticks.
pub async fn countdown(message: &str, steps: u64, tick: Duration) {
    if steps == 0 {
        return;
    }

    let bar = ProgressBar::new(steps);
    match ProgressStyle::default_bar().template("{msg} [{bar:40.red/white}] {pos}/{len}s") {
        Ok(style) => bar.set_style(style.progress_chars("#>-")),
        Err(e) => tracing::debug!(error = %e, "Countdown template rejected, using default style"),
    }
    bar.set_message(message.to_string());

    let mut ticker = tokio::time::interval(tick);
    // The first tick of an interval completes immediately.
    ticker.tick().await;
    for _ in 0..steps {
        ticker.tick().await;
        bar.inc(1);
    }

    bar.finish_with_message(format!("{message}: continuing"));
}

/// Prints the alerts, then gives the operator `wait` to abort before anything is touched.
pub async fn announce(config: &Config, wait: Duration) {
    print_alerts(config);
    countdown(CHECK_CONFIG, wait.as_secs(), Duration::from_secs(1)).await;
}
