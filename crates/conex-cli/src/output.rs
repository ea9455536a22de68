//! User-facing output
//!
//! Status lines go to stderr so that command results printed on stdout can
//! be redirected to a file.

use std::fmt::Display;
use std::io::{self, BufRead, Write};
use std::time::Duration;

use console::{Term, style};
use conex_core::json::to_string_pretty4;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

use crate::error::Result;

pub fn success(message: impl Display) {
    eprintln!("{} {}", style("✓").green(), message);
}

pub fn warning(message: impl Display) {
    eprintln!("{} {}", style("⚠").yellow(), message);
}

pub fn info(message: impl Display) {
    eprintln!("{} {}", style("→").blue(), message);
}

/// Bold heading for a group of status lines
pub fn title(message: impl Display) {
    eprintln!("{}", style(message).bold());
}

/// Print a document on stdout with 4-space indentation
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", to_string_pretty4(value)?);
    Ok(())
}

/// Spinner on stderr, hidden when stderr is not a terminal
pub fn spinner(message: impl Into<String>) -> ProgressBar {
    let pb = if Term::stderr().is_term() {
        ProgressBar::new_spinner()
    } else {
        ProgressBar::hidden()
    };
    if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.into());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Ask for a line of input on stderr
pub fn prompt(label: &str) -> Result<String> {
    eprint!("{}: ", label);
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

/// Ask for a password without echo
pub fn prompt_password() -> Result<String> {
    Ok(rpassword::prompt_password("Password: ")?)
}
