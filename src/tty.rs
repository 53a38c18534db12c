//! Terminal input for the CLI.

use std::io::{self, BufRead, IsTerminal, Write};

pub fn is_stdin_tty() -> bool {
    io::stdin().is_terminal()
}

/// Read one line for a secret value. Prompts on stderr only when stdin is a terminal,
/// so values can also be piped in.
pub fn prompt_secret(message: &str) -> liftoff::Result<String> {
    if is_stdin_tty() {
        eprint!("{}", message);
        io::stderr().flush().ok();
    }

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line).map_err(|e| {
        liftoff::Error::internal_io(e.to_string(), Some("read secret from stdin".to_string()))
    })?;

    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
