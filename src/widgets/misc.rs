use std::fmt::Display;

use ratatui::{layout::Alignment, text::Text};

pub const COLUMN_SPACING: u16 = 1;

/// Right aligns displayable value
pub fn right_align_text<'a, T: Display>(v: T) -> Text<'a> {
    Text::from(v.to_string()).alignment(Alignment::Right)
}

/// Formats a memory size given in MB, keeping the '+' marker of heterogeneous partitions
pub fn mb_to_string<T: Display>(mb: T) -> String {
    format!("{} MB", mb)
}
