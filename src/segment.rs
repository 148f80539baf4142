//! Overlapping character windows over plain text.

use crate::error::{Error, Result};

/// Lazy iterator of windows produced by [`segment`].
///
/// Offsets are counted in chars; each yielded slice lies on char
/// boundaries of the input. Only the two byte cursors are kept, so a page
/// is never indexed up front.
#[derive(Debug, Clone)]
pub struct Windows<'a> {
    text: &'a str,
    window: usize,
    step: usize,
    // byte cursors of the next window
    start: usize,
    end: usize,
    // chars between start and end
    span: usize,
    first: bool,
    done: bool,
}

/// Reject a window size that cannot produce windows.
pub fn check_window(window_size: usize) -> Result<()> {
    if window_size == 0 {
        return Err(Error::configuration("window size must be greater than zero"));
    }
    Ok(())
}

/// Split `text` into windows of `window_size` chars whose starts are
/// `window_size / 2` chars apart.
///
/// The last window is clamped to the end of the text. A window spanning no
/// more than 30% of `window_size` is never produced. A zero window size is
/// a configuration error.
pub fn segment(text: &str, window_size: usize) -> Result<Windows<'_>> {
    check_window(window_size)?;
    let (end, span) = advance(text, 0, window_size);
    Ok(Windows {
        text,
        window: window_size,
        step: (window_size / 2).max(1),
        start: 0,
        end,
        span,
        first: true,
        done: text.is_empty(),
    })
}

/// Move `n` chars forward from byte `from`, stopping at the end of `text`.
/// Returns the new byte offset and the number of chars actually passed.
fn advance(text: &str, from: usize, n: usize) -> (usize, usize) {
    text[from..]
        .chars()
        .take(n)
        .fold((from, 0), |(pos, taken), c| (pos + c.len_utf8(), taken + 1))
}

impl<'a> Windows<'a> {
    fn is_sliver(&self) -> bool {
        // span <= 0.3 * window, in integers
        10 * self.span <= 3 * self.window
    }
}

impl<'a> Iterator for Windows<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        if self.done {
            return None;
        }
        if !self.first && self.is_sliver() {
            self.done = true;
            return None;
        }
        self.first = false;

        let text = self.text;
        let slice = &text[self.start..self.end];

        if self.end >= text.len() {
            self.done = true;
        } else {
            // span == window here, and step <= window
            let (start, _) = advance(text, self.start, self.step);
            let (end, added) = advance(text, self.end, self.step);
            self.start = start;
            self.end = end;
            self.span = self.span - self.step + added;
        }
        Some(slice)
    }
}

impl std::iter::FusedIterator for Windows<'_> {}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(text: &str, window: usize) -> Vec<&str> {
        segment(text, window).unwrap().collect()
    }

    #[test]
    fn ten_chars_window_four() {
        assert_eq!(
            collect("abcdefghij", 4),
            vec!["abcd", "cdef", "efgh", "ghij"]
        );
    }

    #[test]
    fn short_text_is_one_window() {
        assert_eq!(collect("abc", 600), vec!["abc"]);
        assert_eq!(collect("abcd", 4), vec!["abcd"]);
    }

    #[test]
    fn empty_text_has_no_windows() {
        assert!(collect("", 10).is_empty());
    }

    #[test]
    fn zero_window_is_rejected() {
        assert!(matches!(segment("abc", 0), Err(Error::Configuration(_))));
    }

    #[test]
    fn window_of_one_advances() {
        assert_eq!(collect("abc", 1), vec!["a", "b", "c"]);
    }

    #[test]
    fn odd_window_truncates_step() {
        // step = 5 / 2 = 2
        assert_eq!(collect("abcdefghi", 5), vec!["abcde", "cdefg", "efghi"]);
    }

    #[test]
    fn tail_window_is_clamped() {
        assert_eq!(collect("abcdefghijk", 4), vec!["abcd", "cdef", "efgh", "ghij", "ijk"]);
    }

    #[test]
    fn starts_advance_by_half_window_and_no_slivers() {
        let text: String = (0..997).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
        for window in [2usize, 3, 7, 10, 64, 400, 600] {
            let windows = collect(&text, window);
            let mut offset = 0usize;
            for w in &windows {
                assert!(text[offset..].starts_with(w));
                assert!(10 * w.len() > 3 * window, "sliver for window {}", window);
                offset += window / 2;
            }
            assert!(text.ends_with(windows.last().unwrap()));
        }
    }

    #[test]
    fn counts_chars_not_bytes() {
        assert_eq!(collect("αβγδεζ", 4), vec!["αβγδ", "γδεζ"]);
    }

    #[test]
    fn mixed_width_text_matches_char_offsets() {
        let text = "añ€😀b".repeat(40);
        let chars: Vec<char> = text.chars().collect();
        for window in [3usize, 8, 25] {
            let step = (window / 2).max(1);
            let mut expected = Vec::new();
            let mut start = 0;
            loop {
                let end = (start + window).min(chars.len());
                if start > 0 && 10 * (end - start) <= 3 * window {
                    break;
                }
                expected.push(chars[start..end].iter().collect::<String>());
                if end == chars.len() {
                    break;
                }
                start += step;
            }
            assert_eq!(collect(&text, window), expected, "window {}", window);
        }
    }

    #[test]
    fn check_window_rejects_zero_only() {
        assert!(matches!(check_window(0), Err(Error::Configuration(_))));
        assert!(check_window(1).is_ok());
    }

    #[test]
    fn reinvocation_is_reproducible() {
        let a = collect("the quick brown fox jumps", 8);
        let b = collect("the quick brown fox jumps", 8);
        assert_eq!(a, b);
    }
}
