use std::io::{self, BufRead, Write};

pub(crate) const CONFIRM_PROMPT: &str = "Run the migration? (y/n): ";

/// Only an explicit yes proceeds
pub(crate) fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// Ask once; end of input counts as no
pub(crate) fn confirm(mut input: impl BufRead, mut output: impl Write) -> io::Result<bool> {
    output.write_all(CONFIRM_PROMPT.as_bytes())?;
    output.flush()?;

    let mut answer = String::new();
    if input.read_line(&mut answer)? == 0 {
        return Ok(false);
    }
    Ok(is_affirmative(&answer))
}
