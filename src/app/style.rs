use console::style;
use std::fmt::Display;

/// Bold white: section headers, the assistant label
pub fn header<D: Display>(text: D) -> String {
    style(text).white().bold().to_string()
}

/// Dim: hints and secondary text
pub fn dim<D: Display>(text: D) -> String {
    style(text).dim().to_string()
}

/// Cyan bold: prompt marker, bullets
pub fn accent<D: Display>(text: D) -> String {
    style(text).cyan().bold().to_string()
}

/// Green: confirmations, healthy states
pub fn success<D: Display>(text: D) -> String {
    style(text).green().to_string()
}

/// Yellow: notices and truncation warnings
pub fn warn<D: Display>(text: D) -> String {
    style(text).yellow().to_string()
}

/// Red bold: failures shown inline
pub fn error<D: Display>(text: D) -> String {
    style(text).red().bold().to_string()
}
