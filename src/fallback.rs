//! Fixed-size overlapping line windows.
//!
//! Used when a file has no registered parser or syntax extraction produced
//! nothing. Consecutive windows share `overlap` lines so a declaration split
//! across a window boundary is still retrievable from one of them.

/// A window of lines starting at a 0-based line offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Window {
    pub offset: usize,
    pub text: String,
}

/// Split `lines` into windows of `window_size` lines advancing by
/// `window_size - overlap`, dropping windows whose trimmed text has fewer
/// than `min_chars` characters.
pub fn chunk_lines<S: AsRef<str>>(
    lines: &[S],
    window_size: usize,
    overlap: usize,
    min_chars: usize,
) -> Vec<Window> {
    let window_size = window_size.max(1);
    let step = window_size.saturating_sub(overlap).max(1);

    let mut windows = Vec::new();
    let mut offset = 0;
    while offset < lines.len() {
        let end = (offset + window_size).min(lines.len());
        let text = lines[offset..end]
            .iter()
            .map(AsRef::as_ref)
            .collect::<Vec<_>>()
            .join("\n");

        if text.trim().chars().count() >= min_chars {
            windows.push(Window { offset, text });
        }
        offset += step;
    }
    windows
}

/// Chunk a whole file's text.
pub fn chunk_text(source: &str, window_size: usize, overlap: usize, min_chars: usize) -> Vec<Window> {
    let lines: Vec<&str> = source.lines().collect();
    chunk_lines(&lines, window_size, overlap, min_chars)
}
