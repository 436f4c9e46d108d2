//! Splitting long messages into channel-sized chunks.
//!
//! Chat webhooks reject messages above a hard character ceiling. Content is
//! split on line boundaries, a line longer than the budget is cut by raw
//! character count, and when more than one chunk results each chunk gets a
//! `" (i/n)"` page suffix. An optional tag (usually the bold title) is
//! prepended to the first chunk only.
//!
//! Chunk bodies keep their line breaks, so concatenating every
//! [`Chunk::body`] reproduces the input exactly.

use std::fmt;

use crate::utils::{char_len, char_offset};

/// Discord message ceiling, with a safety margin under the real 2000.
pub const DISCORD_MAX_LENGTH: usize = 1900;

/// KakaoTalk bot message ceiling.
pub const KAKAO_MAX_LENGTH: usize = 1000;

/// One length-bounded piece of a larger message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// The slice of the original content carried by this chunk.
    pub body: String,
    /// Present on the first chunk only.
    pub tag: Option<String>,
    /// `(i, n)` when a page suffix is rendered.
    pub position: Option<(usize, usize)>,
}

impl Chunk {
    fn suffix(&self) -> Option<String> {
        self.position.map(|(i, n)| format!(" ({i}/{n})"))
    }

    /// The wire form: `tag\nbody (i/n)`.
    ///
    /// The suffix goes at the end of the body's last line, ahead of a trailing
    /// line break.
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(self.body.len() + 32);
        if let Some(tag) = &self.tag {
            out.push_str(tag);
            out.push('\n');
        }
        match self.suffix() {
            Some(suffix) => {
                let (text, newline) = match self.body.strip_suffix('\n') {
                    Some(text) => (text, "\n"),
                    None => (self.body.as_str(), ""),
                };
                out.push_str(text);
                out.push_str(&suffix);
                out.push_str(newline);
            }
            None => out.push_str(&self.body),
        }
        out
    }
}

impl fmt::Display for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Split `content` into chunks of at most `max_length` characters.
///
/// `tag` (if non-empty) is prepended to the first chunk followed by a line
/// break, and its length counts against that chunk's budget. Empty content
/// yields a single empty chunk.
///
/// # Arguments
///
/// * `content` - The text to split; chunk boundaries prefer line breaks
/// * `max_length` - Upper bound, in characters, on each rendered chunk
/// * `tag` - Header line for the first chunk, or `""` for none
///
/// # Returns
///
/// The chunks in order. Their bodies concatenate back to `content`.
///
/// # Panics
///
/// Panics if `max_length` is zero.
pub fn split(content: &str, max_length: usize, tag: &str) -> Vec<Chunk> {
    assert!(max_length > 0, "chunk max_length must be at least 1");

    let tag = (!tag.is_empty()).then(|| tag.to_string());
    let tag_overhead = tag.as_deref().map_or(0, |t| char_len(t) + 1);

    if char_len(content) + tag_overhead <= max_length {
        return vec![Chunk {
            body: content.to_string(),
            tag,
            position: None,
        }];
    }

    // Reserve room for the widest suffix; widen if the count gains a digit.
    let mut digits = 1;
    let bodies = loop {
        let reserve = suffix_len(digits);
        let bodies = pack(content, |index| {
            let overhead = if index == 0 { tag_overhead } else { 0 };
            budget(max_length, reserve, overhead)
        });
        if decimal_digits(bodies.len()) <= digits {
            break bodies;
        }
        digits += 1;
    };

    let total = bodies.len();
    bodies
        .into_iter()
        .enumerate()
        .map(|(i, body)| {
            let overhead = if i == 0 { tag_overhead } else { 0 };
            let suffix = format!(" ({}/{})", i + 1, total);
            let fits = char_len(&body) + overhead + char_len(&suffix) <= max_length;
            Chunk {
                body,
                tag: if i == 0 { tag.clone() } else { None },
                position: fits.then_some((i + 1, total)),
            }
        })
        .collect()
}

/// [`split`] followed by [`Chunk::render`] on every chunk.
pub fn render_all(content: &str, max_length: usize, tag: &str) -> Vec<String> {
    split(content, max_length, tag)
        .iter()
        .map(Chunk::render)
        .collect()
}

fn suffix_len(digits: usize) -> usize {
    // " (" + i + "/" + n + ")"
    4 + 2 * digits
}

fn decimal_digits(mut n: usize) -> usize {
    let mut digits = 1;
    while n >= 10 {
        n /= 10;
        digits += 1;
    }
    digits
}

fn budget(max_length: usize, reserve: usize, overhead: usize) -> usize {
    match max_length.checked_sub(reserve + overhead) {
        Some(room) if room > 0 => room,
        // Too small for a suffix: spend everything on content instead.
        _ => max_length.saturating_sub(overhead).max(1),
    }
}

/// Greedy line packing. `budget_for(i)` is the body budget of chunk `i`.
fn pack(content: &str, budget_for: impl Fn(usize) -> usize) -> Vec<String> {
    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in content.split_inclusive('\n') {
        let line_len = char_len(line);
        if current_len + line_len <= budget_for(chunks.len()) {
            current.push_str(line);
            current_len += line_len;
            continue;
        }

        if !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
        }

        // A line that cannot fit even on its own is cut by character count.
        let mut rest = line;
        let mut rest_len = line_len;
        loop {
            let budget = budget_for(chunks.len());
            if rest_len <= budget {
                break;
            }
            let cut = char_offset(rest, budget);
            chunks.push(rest[..cut].to_string());
            rest = &rest[cut..];
            rest_len -= budget;
        }
        current.push_str(rest);
        current_len = rest_len;
    }

    if !current.is_empty() || chunks.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reassemble(chunks: &[Chunk]) -> String {
        chunks.iter().map(|c| c.body.as_str()).collect()
    }

    #[test]
    fn test_short_content_is_single_chunk() {
        let chunks = split("hello\nworld", 100, "");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].render(), "hello\nworld");
    }

    #[test]
    fn test_single_chunk_with_tag() {
        let chunks = split("body", 100, "**AI News**");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].render(), "**AI News**\nbody");
    }

    #[test]
    fn test_tag_counts_against_first_chunk() {
        // 10 chars of content fit alone but not with a 5-char tag + newline.
        let chunks = split("0123456789", 12, "TAG!!");
        assert!(chunks.len() > 1);
        assert_eq!(reassemble(&chunks), "0123456789");
    }

    #[test]
    fn test_empty_content_yields_one_empty_chunk() {
        let chunks = split("", 10, "");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].body, "");
        assert_eq!(chunks[0].position, None);
    }

    #[test]
    #[should_panic(expected = "max_length")]
    fn test_zero_max_length_panics() {
        split("abc", 0, "");
    }

    #[test]
    fn test_five_thousand_chars_make_three_chunks() {
        let line = format!("{}\n", "a".repeat(99));
        let content = line.repeat(50);
        assert_eq!(char_len(&content), 5000);

        let chunks = split(&content, DISCORD_MAX_LENGTH, "");
        assert_eq!(chunks.len(), 3);

        let rendered: Vec<String> = chunks.iter().map(Chunk::render).collect();
        for (i, r) in rendered.iter().enumerate() {
            assert!(char_len(r) <= DISCORD_MAX_LENGTH);
            assert!(r.trim_end().ends_with(&format!(" ({}/3)", i + 1)));
        }
        // Boundaries fall on line breaks.
        for chunk in &chunks {
            assert!(chunk.body.ends_with('\n'));
        }
        assert_eq!(reassemble(&chunks), content);
    }

    #[test]
    fn test_long_line_is_force_split() {
        let content = format!("short\n{}\nend", "가".repeat(45));
        let chunks = split(&content, 20, "");
        assert_eq!(reassemble(&chunks), content);
        for chunk in &chunks {
            assert!(char_len(&chunk.render()) <= 20);
        }
    }

    #[test]
    fn test_pack_carries_remainder_of_cut_line() {
        let chunks = pack("ab\n0123456789\ncd", |_| 5);
        assert_eq!(chunks, vec!["ab\n", "01234", "56789", "\ncd"]);
    }

    #[test]
    fn test_reassembly_and_bound_across_sizes() {
        let content = "## AI Twitter Recap\n\n- 첫 번째 항목 [링크](https://x.com/a/status/1)\n\
                       - second item with a much longer description that keeps going\n\
                       \n---\n📖 출처: [원문](https://news.smol.ai/issues/25-09-01)\n";
        for max_length in [12, 17, 25, 40, 80, 500] {
            for tag in ["", "**T**"] {
                let chunks = split(content, max_length, tag);
                assert_eq!(reassemble(&chunks), content, "max_length={max_length}");
                for chunk in &chunks {
                    assert!(
                        char_len(&chunk.render()) <= max_length,
                        "max_length={max_length} tag={tag:?} chunk={:?}",
                        chunk.render()
                    );
                }
                assert_eq!(chunks[0].tag.is_some(), !tag.is_empty());
                assert!(chunks.iter().skip(1).all(|c| c.tag.is_none()));
            }
        }
    }

    #[test]
    fn test_suffix_widens_for_double_digit_counts() {
        let content = "abcdefghij\n".repeat(30);
        let chunks = split(&content, 20, "");
        assert!(chunks.len() >= 10);
        let total = chunks.len();
        let last = chunks.last().unwrap().render();
        assert!(last.trim_end().ends_with(&format!("({total}/{total})")));
        assert!(chunks.iter().all(|c| char_len(&c.render()) <= 20));
    }

    #[test]
    fn test_render_all_prepends_tag_once() {
        let content = "line one\nline two\nline three\n";
        let rendered = render_all(content, 16, "#T");
        assert!(rendered[0].starts_with("#T\n"));
        assert!(rendered.iter().skip(1).all(|r| !r.starts_with("#T")));
    }
}
