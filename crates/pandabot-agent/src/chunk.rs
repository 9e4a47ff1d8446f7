// SPDX-FileCopyrightText: 2026 Pandabot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound message chunking for platform length limits.

/// Maximum characters per outbound chunk.
pub const MAX_CHUNK_LEN: usize = 4000;

/// Splits `text` into chunks of at most `max_len` characters, preferring to
/// break at a line boundary and falling back to a hard cut.
pub fn split_message(text: &str, max_len: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut rest = chars.as_slice();
    while !rest.is_empty() {
        while rest.first() == Some(&'\n') {
            rest = &rest[1..];
        }
        if rest.is_empty() {
            break;
        }
        if rest.len() <= max_len {
            chunks.push(rest.iter().collect());
            break;
        }
        let window = &rest[..max_len];
        // A newline at position 0 would produce an empty chunk; hard-cut
        // instead.
        let split_pos = match window.iter().rposition(|&c| c == '\n') {
            Some(pos) if pos > 0 => pos,
            _ => max_len,
        };
        chunks.push(rest[..split_pos].iter().collect());
        rest = &rest[split_pos..];
    }
    chunks
}
