use std::io::Write;
use std::time::Duration;

use colored::{ColoredString, Colorize};
use env_logger::{Builder, Env};
use log::{LevelFilter, info};

/// Records logged under this target are written without the time/target prefix.
pub const RAW_TARGET: &str = "raw";

pub fn init_logging(quiet: bool) {
    let env = Env::default().filter_or("RUST_LOG", "info");
    let mut builder = Builder::from_env(env);
    if quiet {
        builder.filter_level(LevelFilter::Error);
    }

    builder
        .format(|buf, record| {
            if record.target() == RAW_TARGET {
                return writeln!(buf, "{}", record.args());
            }

            let target = record.target().to_ascii_lowercase();
            let target = match record.level() {
                log::Level::Error => target.bold().red(),
                log::Level::Warn => target.bold().yellow(),
                _ => target.bold().bright_yellow(),
            };

            writeln!(
                buf,
                "{} {} {}",
                chrono::Local::now().format("%H:%M:%S").to_string().dimmed(),
                target,
                record.args()
            )
        })
        .init();
}

/// `850ms` in yellow, `3s` in red, and so on.
pub fn format_elapsed_time(elapsed: Duration) -> ColoredString {
    match elapsed.as_secs() {
        secs if secs > 2 => format!("{secs}s").red(),
        secs if secs > 1 => format!("{secs}s").yellow(),
        secs if secs > 0 => format!("{secs}s").normal(),
        _ => match elapsed.as_millis() {
            millis if millis > 500 => format!("{millis}ms").red(),
            millis if millis > 100 => format!("{millis}ms").yellow(),
            millis if millis > 0 => format!("{millis}ms").normal(),
            _ => format!("{}μs", elapsed.as_micros()).normal(),
        },
    }
}

pub fn print_title(title: &str) {
    info!(target: RAW_TARGET, "");
    info!(target: RAW_TARGET, "{}", format!(" {title} ").on_green().bold());
}
