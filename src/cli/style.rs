//! Terminal styling helpers

use mergeq::report::Conclusion;
use owo_colors::{OwoColorize, Stream, Style};

/// Marker for success lines
pub const CHECK: &str = "✓";
/// Marker for failure lines
pub const CROSS: &str = "✗";
/// Marker for pending lines
pub const DOT: &str = "•";

/// Semantic styles for terminal output
pub trait Stylize {
    /// De-emphasized text
    fn muted(&self) -> String;
    /// Highlighted text
    fn emphasis(&self) -> String;
    /// Text in a given style, when stdout supports colors
    fn styled(&self, style: Style) -> String;
}

impl<T: std::fmt::Display> Stylize for T {
    fn muted(&self) -> String {
        self.styled(Style::new().dimmed())
    }

    fn emphasis(&self) -> String {
        self.styled(Style::new().bold())
    }

    fn styled(&self, style: Style) -> String {
        self.if_supports_color(Stream::Stdout, |text| text.style(style))
            .to_string()
    }
}

/// Green check mark
pub fn check() -> String {
    CHECK.styled(Style::new().green())
}

/// Marker and style for a report conclusion
pub fn conclusion_marker(conclusion: Option<Conclusion>) -> String {
    match conclusion {
        Some(Conclusion::Success) => check(),
        Some(Conclusion::Failure) => CROSS.styled(Style::new().red()),
        Some(Conclusion::Cancelled | Conclusion::ActionRequired) => CROSS.styled(Style::new().yellow()),
        None => DOT.styled(Style::new().cyan()),
    }
}
