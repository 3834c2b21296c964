//! Output trimming for log lines.
//!
//! Script output is only logged, never stored, so the useful part is the end:
//! the last lines of stderr usually carry the failure.

/// Keep at most the last `max_chars` characters of `output`.
///
/// When anything is dropped the result starts with a marker saying how many
/// characters were omitted. Splits on `char` boundaries.
pub fn keep_tail(output: &str, max_chars: usize) -> String {
    let total = output.chars().count();
    if total <= max_chars {
        return output.to_owned();
    }
    let omitted = total - max_chars;
    let tail: String = output.chars().skip(omitted).collect();
    format!("[... {omitted} chars omitted]\n{tail}")
}
