use std::io::{self, BufRead, Write};

use crate::error::{ExportError, Result};

/// Obtains the out-of-band verification code after the user visits
/// `authorize_url`.
pub trait AuthCodePrompt {
    fn request_code(&mut self, authorize_url: &str) -> Result<String>;
}

/// Prints the authorize URL to stdout and reads one line from stdin.
pub struct StdinPrompt;

impl AuthCodePrompt for StdinPrompt {
    fn request_code(&mut self, authorize_url: &str) -> Result<String> {
        let io_err = ExportError::Prompt;

        let mut stdout = io::stdout();
        writeln!(stdout, "==> Go to the authorize URL and enter the code").map_err(io_err)?;
        writeln!(stdout, "Authorize URL: {}", authorize_url).map_err(io_err)?;
        write!(stdout, "Enter code: ").map_err(io_err)?;
        stdout.flush().map_err(io_err)?;

        let mut line = String::new();
        io::stdin().lock().read_line(&mut line).map_err(io_err)?;
        Ok(line.trim().to_string())
    }
}
