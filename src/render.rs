//! Output rendering for streamed replies.
//!
//! This module provides the renderer trait the chat session reports to, plus a
//! plain-text implementation that prints fragments as they arrive and a
//! markdown implementation that shows a spinner and renders the finished reply.

use std::io::{self, Stdout, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use termimad::MadSkin;

/// ANSI escape code for bold text (used for reply labels).
const ANSI_BOLD: &str = "\x1b[1m";

/// ANSI escape code for dim text (used for notices).
const ANSI_DIM: &str = "\x1b[2m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// ANSI escape code for green text (used for reply labels).
const ANSI_GREEN: &str = "\x1b[32m";

/// ANSI escape code for red text (used for errors).
const ANSI_RED: &str = "\x1b[31m";

/// Printed when a reply ends without text.
pub const NO_RESPONSE_MESSAGE: &str = "No response received from the API.";

/// Trait for rendering streaming output.
///
/// A reply is reported as `start_reply`, zero or more `print_fragment`s, and
/// then exactly one of `finish_reply`, `print_no_response`, or `cancel_reply`.
pub trait Renderer: Send {
    /// Called before the first fragment of a reply.
    fn start_reply(&mut self, label: &str);

    /// Print a chunk of reply text as it arrives.
    fn print_fragment(&mut self, text: &str);

    /// Called once the reply is complete, with its full text.
    fn finish_reply(&mut self, label: &str, text: &str);

    /// Called when a reply stops early; undo any transient output.
    fn cancel_reply(&mut self);

    /// Called when a reply ends without text.
    fn print_no_response(&mut self);

    /// Print an error message.
    fn print_error(&mut self, error: &str);

    /// Print an informational message.
    fn print_info(&mut self, info: &str);

    /// Called when the reply is interrupted by the user.
    fn print_interrupted(&mut self) {}

    /// Returns true if streaming should be interrupted.
    fn should_interrupt(&self) -> bool {
        false
    }
}

fn interrupt_requested(flag: &Option<Arc<AtomicBool>>) -> bool {
    flag.as_ref()
        .is_some_and(|flag| flag.load(Ordering::Relaxed))
}

/// Plain text renderer with optional ANSI styling.
///
/// This renderer writes fragments to stdout the moment they arrive.
pub struct PlainTextRenderer {
    stdout: Stdout,
    use_color: bool,
    line_start: bool,
    interrupted: Option<Arc<AtomicBool>>,
}

impl PlainTextRenderer {
    /// Creates a new PlainTextRenderer with ANSI colors enabled.
    pub fn new() -> Self {
        Self::with_color(true)
    }

    /// Creates a new PlainTextRenderer with specified color setting.
    pub fn with_color(use_color: bool) -> Self {
        Self {
            stdout: io::stdout(),
            use_color,
            line_start: true,
            interrupted: None,
        }
    }

    /// Attaches an interrupt flag to the renderer.
    pub fn with_interrupt(mut self, interrupted: Arc<AtomicBool>) -> Self {
        self.interrupted = Some(interrupted);
        self
    }

    /// Flushes stdout to ensure immediate display of streamed content.
    fn flush(&mut self) {
        let _ = self.stdout.flush();
    }

    fn write(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        print!("{text}");
        self.line_start = text.ends_with('\n');
        self.flush();
    }

    fn end_line(&mut self) {
        if !self.line_start {
            self.write("\n");
        }
    }

    fn styled(&self, style: &str, text: &str) -> String {
        if self.use_color {
            format!("{style}{text}{ANSI_RESET}")
        } else {
            text.to_string()
        }
    }
}

impl Default for PlainTextRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for PlainTextRenderer {
    fn start_reply(&mut self, label: &str) {
        self.end_line();
        let label = self.styled(&format!("{ANSI_BOLD}{ANSI_GREEN}"), &format!("{label}:"));
        self.write(&format!("{label} "));
    }

    fn print_fragment(&mut self, text: &str) {
        self.write(text);
    }

    fn finish_reply(&mut self, _label: &str, _text: &str) {
        self.end_line();
    }

    fn cancel_reply(&mut self) {
        self.end_line();
    }

    fn print_no_response(&mut self) {
        self.end_line();
        let message = self.styled(ANSI_DIM, NO_RESPONSE_MESSAGE);
        self.write(&format!("{message}\n"));
    }

    fn print_error(&mut self, error: &str) {
        self.end_line();
        let message = self.styled(ANSI_RED, &format!("Error: {error}"));
        eprintln!("{message}");
    }

    fn print_info(&mut self, info: &str) {
        self.end_line();
        self.write(&format!("{info}\n"));
    }

    fn print_interrupted(&mut self) {
        self.end_line();
        let message = self.styled(ANSI_DIM, "[interrupted]");
        self.write(&format!("{message}\n"));
    }

    fn should_interrupt(&self) -> bool {
        interrupt_requested(&self.interrupted)
    }
}

/// Removes one leading `[label]:` tag the model may echo before its reply.
fn strip_label<'a>(label: &str, text: &'a str) -> &'a str {
    let trimmed = text.trim_start();
    trimmed
        .strip_prefix('[')
        .and_then(|rest| rest.strip_prefix(label))
        .and_then(|rest| rest.strip_prefix("]:"))
        .map(str::trim_start)
        .unwrap_or(text)
}

/// Renderer that collects a reply behind a spinner and prints it as markdown.
pub struct MarkdownRenderer {
    skin: MadSkin,
    use_color: bool,
    spinner: Option<ProgressBar>,
    interrupted: Option<Arc<AtomicBool>>,
}

impl MarkdownRenderer {
    pub fn new() -> Self {
        Self::with_color(true)
    }

    pub fn with_color(use_color: bool) -> Self {
        let skin = if use_color {
            let mut skin = MadSkin::default_dark();
            skin.inline_code
                .set_fg(termimad::crossterm::style::Color::Yellow);
            skin
        } else {
            MadSkin::no_style()
        };
        Self {
            skin,
            use_color,
            spinner: None,
            interrupted: None,
        }
    }

    /// Attaches an interrupt flag to the renderer.
    pub fn with_interrupt(mut self, interrupted: Arc<AtomicBool>) -> Self {
        self.interrupted = Some(interrupted);
        self
    }

    /// Formats a finished reply the way [`Renderer::finish_reply`] prints it.
    pub fn format(&self, label: &str, text: &str) -> String {
        let heading = if self.use_color {
            format!("{ANSI_BOLD}{ANSI_GREEN}{label}:{ANSI_RESET}")
        } else {
            format!("{label}:")
        };
        let body = self.skin.term_text(strip_label(label, text)).to_string();
        format!("{heading}\n{}\n", body.trim_end())
    }

    fn stop_spinner(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
    }
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for MarkdownRenderer {
    fn start_reply(&mut self, label: &str) {
        self.stop_spinner();
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.set_message(format!("{label} is typing..."));
        spinner.enable_steady_tick(Duration::from_millis(80));
        self.spinner = Some(spinner);
    }

    fn print_fragment(&mut self, _text: &str) {
        if let Some(spinner) = &self.spinner {
            spinner.tick();
        }
    }

    fn finish_reply(&mut self, label: &str, text: &str) {
        self.stop_spinner();
        print!("{}", self.format(label, text));
        let _ = io::stdout().flush();
    }

    fn cancel_reply(&mut self) {
        self.stop_spinner();
    }

    fn print_no_response(&mut self) {
        self.stop_spinner();
        if self.use_color {
            println!("{ANSI_DIM}{NO_RESPONSE_MESSAGE}{ANSI_RESET}");
        } else {
            println!("{NO_RESPONSE_MESSAGE}");
        }
    }

    fn print_error(&mut self, error: &str) {
        self.stop_spinner();
        if self.use_color {
            eprintln!("{ANSI_RED}Error: {error}{ANSI_RESET}");
        } else {
            eprintln!("Error: {error}");
        }
    }

    fn print_info(&mut self, info: &str) {
        self.stop_spinner();
        println!("{info}");
    }

    fn print_interrupted(&mut self) {
        self.stop_spinner();
        println!("[interrupted]");
    }

    fn should_interrupt(&self) -> bool {
        interrupt_requested(&self.interrupted)
    }
}
