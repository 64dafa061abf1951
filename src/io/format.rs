//! Nice `IntDeriv` output formatting.

use std::fmt;

use log;

const INTDERIV_BANNER_LENGTH: usize = 103;

/// Logs a warning to the `intderiv-output` logger.
macro_rules! intderiv_warn {
    ($fmt:expr $(, $($arg:tt)*)?) => { log::warn!(target: "intderiv-output", $fmt, $($($arg)*)?); }
}

/// Logs a main output line to the `intderiv-output` logger.
macro_rules! intderiv_output {
    ($fmt:expr $(, $($arg:tt)*)?) => { log::info!(target: "intderiv-output", $fmt, $($($arg)*)?); }
}

pub(crate) use {intderiv_output, intderiv_warn};

/// Logs a nicely formatted section title to the `intderiv-output` logger.
pub(crate) fn log_title(title: &str) {
    let length = title.chars().count().max(INTDERIV_BANNER_LENGTH - 6);
    let bar = "─".repeat(length);
    intderiv_output!("┌──{bar}──┐");
    intderiv_output!("│§ {title:^length$} §│");
    intderiv_output!("└──{bar}──┘");
}

/// Writes a nicely formatted subtitle.
pub(crate) fn write_subtitle(f: &mut fmt::Formatter<'_>, subtitle: &str) -> fmt::Result {
    let length = subtitle.chars().count();
    let bar = "═".repeat(length);
    writeln!(f, "{subtitle}")?;
    writeln!(f, "{bar}")?;
    Ok(())
}

/// Logs a nicely formatted subtitle to the `intderiv-output` logger.
pub(crate) fn log_subtitle(subtitle: &str) {
    let length = subtitle.chars().count();
    let bar = "═".repeat(length);
    intderiv_output!("{}", subtitle);
    intderiv_output!("{}", bar);
}

/// Turns a boolean into a string of `yes` or `no`.
pub(crate) fn nice_bool(b: bool) -> String {
    if b {
        "yes".to_string()
    } else {
        "no".to_string()
    }
}

/// A trait for logging `IntDeriv` outputs nicely.
pub(crate) trait IntDerivOutput: fmt::Debug + fmt::Display {
    /// Logs display output nicely.
    fn log_output_display(&self) {
        let lines = self.to_string();
        lines.lines().for_each(|line| {
            intderiv_output!("{line}");
        })
    }
}

// Blanket implementation
impl<T> IntDerivOutput for T where T: fmt::Debug + fmt::Display {}
