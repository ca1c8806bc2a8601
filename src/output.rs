//! Terminal rendering for streaming recognition results.
//!
//! Partial results overwrite the current line in place; final results
//! commit a line and move on. Used by `voxstream listen`.

use crate::protocol::ResultRecord;
use std::io::{self, Write};

const DIM: &str = "\x1b[2m";
const GREEN: &str = "\x1b[32m";
const RESET: &str = "\x1b[0m";

/// Clear the current terminal line (replaces a partial result).
pub fn clear_line() {
    eprint!("\r\x1b[2K");
}

/// Annotation shown after a committed result, e.g. ` [2pass-offline]`.
fn mode_tag(record: &ResultRecord) -> String {
    if record.mode.is_empty() {
        String::new()
    } else {
        format!(" {DIM}[{}]{RESET}", record.mode)
    }
}

/// Render an in-progress hypothesis, overwriting the previous one.
pub fn render_partial(record: &ResultRecord) {
    eprint!("\r\x1b[2K{DIM}{}{RESET}", record.text);
    io::stderr().flush().ok();
}

/// Commit a finalized utterance to its own line.
pub fn render_final(record: &ResultRecord) {
    clear_line();
    if record.text.is_empty() {
        // Empty completion marker: the utterance produced no text.
        eprintln!("{DIM}(no speech){RESET}");
    } else {
        eprintln!("{GREEN}{}{RESET}{}", record.text, mode_tag(record));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(mode: &str, text: &str, is_final: bool) -> ResultRecord {
        ResultRecord {
            mode: mode.to_string(),
            text: text.to_string(),
            wav_name: "microphone".to_string(),
            is_final,
        }
    }

    #[test]
    fn mode_tag_includes_mode() {
        let tag = mode_tag(&record("2pass-offline", "hello", true));
        assert!(tag.contains("2pass-offline"));
    }

    #[test]
    fn mode_tag_empty_for_missing_mode() {
        assert_eq!(mode_tag(&record("", "hello", true)), "");
    }
}
