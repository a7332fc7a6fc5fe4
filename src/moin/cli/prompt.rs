use console::Term;
use std::io::{self, BufRead, IsTerminal};

/// Source of interactive answers. Abstracted so `auth` can be driven from tests.
pub trait Prompter {
    fn input(&mut self, label: &str) -> io::Result<String>;
    /// Like `input`, but the answer is not echoed.
    fn secret(&mut self, label: &str) -> io::Result<String>;
}

/// Prompts on stderr. When stdin is not a terminal, answers are read line by
/// line from stdin instead, so the command can be scripted.
pub struct TerminalPrompter {
    term: Term,
    interactive: bool,
}

impl TerminalPrompter {
    pub fn new() -> Self {
        Self {
            term: Term::stderr(),
            interactive: io::stdin().is_terminal(),
        }
    }

    fn read_piped_line(&self) -> io::Result<String> {
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }
}

impl Default for TerminalPrompter {
    fn default() -> Self {
        Self::new()
    }
}

impl Prompter for TerminalPrompter {
    fn input(&mut self, label: &str) -> io::Result<String> {
        self.term.write_str(&format!("{}: ", label))?;
        if self.interactive {
            self.term.read_line()
        } else {
            let line = self.read_piped_line()?;
            self.term.write_line("")?;
            Ok(line)
        }
    }

    fn secret(&mut self, label: &str) -> io::Result<String> {
        self.term.write_str(&format!("{}: ", label))?;
        if self.interactive {
            self.term.read_secure_line()
        } else {
            let line = self.read_piped_line()?;
            self.term.write_line("")?;
            Ok(line)
        }
    }
}
