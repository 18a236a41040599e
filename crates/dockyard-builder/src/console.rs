//! User-facing build output.

use colored::{Color, Colorize};
use std::sync::Mutex;

use crate::summary::BuildSummary;

/// Prefix colors, assigned round-robin by image ordinal.
pub const PALETTE: [Color; 14] = [
    Color::White,
    Color::Magenta,
    Color::Cyan,
    Color::Green,
    Color::Yellow,
    Color::Blue,
    Color::Red,
    Color::BrightWhite,
    Color::BrightMagenta,
    Color::BrightCyan,
    Color::BrightGreen,
    Color::BrightYellow,
    Color::BrightBlue,
    Color::BrightRed,
];

/// Prefix color of the image at `ordinal`.
pub fn color_for(ordinal: usize) -> Color {
    PALETTE[ordinal % PALETTE.len()]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Out,
    Err,
}

/// Image tag shown in front of a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prefix {
    pub name: String,
    pub color: Color,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleLine {
    pub prefix: Option<Prefix>,
    pub channel: Channel,
    pub text: String,
}

impl ConsoleLine {
    /// A line without an image prefix.
    pub fn plain(channel: Channel, text: impl Into<String>) -> Self {
        Self {
            prefix: None,
            channel,
            text: text.into(),
        }
    }

    pub fn tagged(prefix: &Prefix, channel: Channel, text: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.clone()),
            channel,
            text: text.into(),
        }
    }
}

/// Sink for build output. Shared by every image of a build.
pub trait Console: Send + Sync {
    fn emit(&self, line: ConsoleLine);
}

/// Writes to the process's stdout and stderr.
#[derive(Debug, Default)]
pub struct TerminalConsole;

impl TerminalConsole {
    pub fn new() -> Self {
        Self
    }
}

impl Console for TerminalConsole {
    fn emit(&self, line: ConsoleLine) {
        let rendered = match &line.prefix {
            Some(prefix) => format!(
                "{} {}",
                format!("{}:", prefix.name).color(prefix.color),
                line.text
            ),
            None => line.text,
        };
        match line.channel {
            Channel::Out => println!("{}", rendered),
            Channel::Err => eprintln!("{}", rendered),
        }
    }
}

/// Keeps every line in memory.
#[derive(Debug, Default)]
pub struct MemoryConsole {
    lines: Mutex<Vec<ConsoleLine>>,
}

impl MemoryConsole {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<ConsoleLine> {
        match self.lines.lock() {
            Ok(lines) => lines.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Line texts, without prefixes.
    pub fn texts(&self) -> Vec<String> {
        self.lines().into_iter().map(|l| l.text).collect()
    }
}

impl Console for MemoryConsole {
    fn emit(&self, line: ConsoleLine) {
        match self.lines.lock() {
            Ok(mut lines) => lines.push(line),
            Err(poisoned) => poisoned.into_inner().push(line),
        }
    }
}

/// Write the end-of-build summary block.
pub fn print_summary(console: &dyn Console, summary: &BuildSummary) {
    let out = |text: String| console.emit(ConsoleLine::plain(Channel::Out, text));

    out(String::new());
    out(format!("{}", "Build summary".bold()));
    out(format!("  {} image(s) total", summary.total));
    out(format!("  {} completed", summary.completed.to_string().green()));
    if summary.failed > 0 {
        out(format!("  {} failed", summary.failed.to_string().red()));
    }
    if summary.canceled > 0 {
        out(format!("  {} canceled", summary.canceled.to_string().yellow()));
    }
    if summary.unknown > 0 {
        out(format!("  {} unknown", summary.unknown));
    }
}
