//! Overlapping fixed-size text chunker.
//!
//! Splits page text into chunks of at most `chunk_size` characters where
//! consecutive chunks from the same page share `chunk_overlap` characters of
//! context. Splitting prefers line boundaries, then spaces, then a hard cut.
//! Chunks never span pages.
//!
//! Deterministic: the same pages and parameters always yield the same chunk
//! sequence and count.

use crate::models::{Chunk, Page};

/// Split pages into overlapping chunks.
///
/// `chunk_size` and `chunk_overlap` are measured in characters (bytes for
/// ASCII text; cuts always land on UTF-8 character boundaries). Empty pages
/// produce no chunks.
pub fn chunk_pages(pages: &[Page], chunk_size: usize, chunk_overlap: usize) -> Vec<Chunk> {
    debug_assert!(chunk_overlap < chunk_size);

    let mut chunks = Vec::new();
    for page in pages {
        chunk_page(page, chunk_size, chunk_overlap, &mut chunks);
    }
    chunks
}

fn chunk_page(page: &Page, chunk_size: usize, chunk_overlap: usize, out: &mut Vec<Chunk>) {
    let text = page.text.trim_end();
    if text.trim().is_empty() {
        return;
    }

    let len = text.len();
    let mut start = 0usize;

    while start < len {
        let window_end = floor_char_boundary(text, (start + chunk_size).min(len));

        let end = if window_end < len {
            // Prefer the last line break in the window, then the last space.
            let split = text[start..window_end]
                .rfind('\n')
                .or_else(|| text[start..window_end].rfind(' '))
                .map(|pos| start + pos + 1)
                .unwrap_or(window_end);
            // A boundary inside the overlap region would stall the cursor.
            if split <= start + chunk_overlap {
                window_end
            } else {
                split
            }
        } else {
            window_end
        };

        out.push(Chunk {
            text: text[start..end].to_string(),
            page: page.number,
            section: page.section.clone(),
        });

        if end >= len {
            break;
        }
        start = floor_char_boundary(text, end - chunk_overlap);
    }
}

/// Largest index `<= i` that lands on a char boundary.
fn floor_char_boundary(s: &str, mut i: usize) -> usize {
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}
