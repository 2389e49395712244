use std::fmt::Display;

use console::{style, StyledObject};

/// How a piece of stderr text should read to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Good,
    Warning,
    Error,
    Muted,
    Heading,
}

pub fn paint(text: impl Display, tone: Tone) -> StyledObject<String> {
    let text = style(text.to_string());
    match tone {
        Tone::Good => text.bright().green(),
        Tone::Warning => text.bright().yellow(),
        Tone::Error => text.bright().red(),
        Tone::Muted => text.dim(),
        Tone::Heading => text.magenta().bold(),
    }
}
