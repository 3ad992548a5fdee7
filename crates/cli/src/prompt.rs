use std::io::{self, BufRead, Write};

/// Asks a yes/no question on the terminal; anything but `y`/`yes` means no.
pub fn confirm(question: &str) -> bool {
    let stdin = io::stdin();
    let mut input = stdin.lock();
    ask(&mut input, &mut io::stderr(), question)
}

pub fn ask<R: BufRead, W: Write>(input: &mut R, output: &mut W, question: &str) -> bool {
    let _ = write!(output, "{question} (y/N): ");
    let _ = output.flush();
    let mut line = String::new();
    match input.read_line(&mut line) {
        Ok(_) => matches!(line.trim().to_lowercase().as_str(), "y" | "yes"),
        Err(_) => false,
    }
}
