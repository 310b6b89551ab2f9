//! Secret arguments that may be read from standard input.
//!
//! `--gui-password -` reads the password from the first line of stdin so it
//! never appears in the process list.

use std::io::BufRead;

use crate::error::AppError;

/// Argument value meaning "read one line from stdin".
pub const STDIN_SENTINEL: &str = "-";

/// Return `value` unchanged unless it is the stdin sentinel, in which case
/// exactly one line is read from `reader` (line ending stripped).
///
/// Empty input, with no line at all, is an error.
pub fn resolve_secret<R: BufRead>(value: Option<String>, mut reader: R) -> Result<Option<String>, AppError> {
    match value {
        Some(v) if v == STDIN_SENTINEL => {
            let mut line = String::new();
            let read = reader
                .read_line(&mut line)
                .map_err(|e| AppError::Input(format!("failed reading GUI password: {e}")))?;
            if read == 0 {
                return Err(AppError::Input(
                    "failed reading GUI password: unexpected end of input".into(),
                ));
            }
            let trimmed = line.trim_end_matches(['\n', '\r']).len();
            line.truncate(trimmed);
            Ok(Some(line))
        }
        other => Ok(other),
    }
}
