//! Rendering of a single log line.

use console::Style;

/// Turns a `(message, dump)` pair into one line of text.
#[derive(Debug, Clone)]
pub struct Formatter {
    colorize: bool,
    message_style: Style,
    dump_style: Style,
}

impl Formatter {
    pub fn new(colorize: bool) -> Self {
        // Styling is forced on: the sink decides where lines go, not the tty
        Self {
            colorize,
            message_style: Style::new().cyan().bold().force_styling(true),
            dump_style: Style::new().yellow().force_styling(true),
        }
    }

    pub fn format(&self, message: Option<&str>, dump: Option<&str>) -> String {
        if !self.colorize {
            return format!("{}  {}", message.unwrap_or(""), dump.unwrap_or(""));
        }

        let message = self.message_style.apply_to(message.unwrap_or(""));
        match dump {
            Some(dump) => format!("{}  {}", message, self.dump_style.apply_to(dump)),
            None => message.to_string(),
        }
    }
}
