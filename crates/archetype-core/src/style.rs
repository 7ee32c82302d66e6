//! Stateless ANSI colouring.
//!
//! Used by the colour template helpers and by span highlighting. Styling is
//! always forced on: the output usually ends up in a file or a pipe, not a
//! terminal, and the caller asked for colour explicitly.

use console::Style;

/// Foreground colours available to templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Colour {
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
    White,
}

impl Colour {
    pub const ALL: [Colour; 7] = [
        Colour::Red,
        Colour::Green,
        Colour::Yellow,
        Colour::Blue,
        Colour::Magenta,
        Colour::Cyan,
        Colour::White,
    ];

    /// Lower-case name, also the template helper name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Red => "red",
            Self::Green => "green",
            Self::Yellow => "yellow",
            Self::Blue => "blue",
            Self::Magenta => "magenta",
            Self::Cyan => "cyan",
            Self::White => "white",
        }
    }

    fn style(&self) -> Style {
        let style = Style::new().force_styling(true);
        match self {
            Self::Red => style.red(),
            Self::Green => style.green(),
            Self::Yellow => style.yellow(),
            Self::Blue => style.blue(),
            Self::Magenta => style.magenta(),
            Self::Cyan => style.cyan(),
            Self::White => style.white(),
        }
    }
}

/// Paint `text` in `colour`.
pub fn paint(colour: Colour, text: &str) -> String {
    colour.style().apply_to(text).to_string()
}

/// Paint `text` in the high-intensity variant of `colour`.
pub fn paint_bright(colour: Colour, text: &str) -> String {
    colour.style().bright().apply_to(text).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paint_wraps_in_ansi() {
        let painted = paint(Colour::Red, "boom");
        assert!(painted.contains("boom"));
        assert!(painted.starts_with("\u{1b}["));
        assert_ne!(painted, "boom");
    }

    #[test]
    fn test_bright_differs_from_normal() {
        assert_ne!(
            paint(Colour::Green, "ok"),
            paint_bright(Colour::Green, "ok")
        );
    }
}
