//! Smooth "typing" output

use std::time::Duration;

pub const SLICE_CHARS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacer {
    delay: Duration,
    slice_chars: usize,
}

impl Pacer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            slice_chars: SLICE_CHARS,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Emits `fragment` slice by slice, sleeping between slices only.
    pub async fn emit<F>(&self, fragment: &str, mut sink: F)
    where
        F: FnMut(&str),
    {
        let mut slices = split_slices(fragment, self.slice_chars).peekable();
        while let Some(slice) = slices.next() {
            sink(slice);
            if slices.peek().is_some() {
                tokio::time::sleep(self.delay).await;
            }
        }
    }
}

/// Splits `text` into runs of `size` chars; the last run may be shorter.
///
/// Counts Unicode scalar values, so a grapheme cluster can straddle two runs.
pub fn split_slices(text: &str, size: usize) -> impl Iterator<Item = &str> {
    let size = size.max(1);
    let mut rest = text;
    std::iter::from_fn(move || {
        if rest.is_empty() {
            return None;
        }
        let cut = rest
            .char_indices()
            .nth(size)
            .map(|(idx, _)| idx)
            .unwrap_or(rest.len());
        let (head, tail) = rest.split_at(cut);
        rest = tail;
        Some(head)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[test]
    fn test_split_slices_sizes() {
        let slices: Vec<&str> = split_slices("abcdefgh", 3).collect();
        assert_eq!(slices, vec!["abc", "def", "gh"]);
        assert_eq!(split_slices("", 3).count(), 0);
        assert_eq!(split_slices("ab", 3).collect::<Vec<_>>(), vec!["ab"]);
    }

    #[test]
    fn test_split_slices_reconstructs() {
        for text in [
            "Hello, world!",
            "ñandú über straße",
            "日本語のテキスト",
            "🇪🇸🇫🇷 flags split mid-cluster",
            "a\nb\r\nc",
        ] {
            assert_eq!(split_slices(text, SLICE_CHARS).collect::<String>(), text);
        }
    }

    #[test]
    fn test_split_counts_chars_not_graphemes() {
        // one flag = two regional indicator scalars
        let slices: Vec<&str> = split_slices("🇪🇸🇫🇷", 3).collect();
        assert_eq!(slices, vec!["🇪🇸🇫", "🇷"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_only_between_slices() {
        let pacer = Pacer::new(Duration::from_millis(50));
        let mut out = Vec::new();
        let start = Instant::now();
        pacer.emit("abcdefgh", |s| out.push(s.to_string())).await;
        assert_eq!(out, vec!["abc", "def", "gh"]);
        assert_eq!(start.elapsed(), Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_slice_has_no_delay() {
        let pacer = Pacer::new(Duration::from_millis(50));
        let mut out = String::new();
        let start = Instant::now();
        pacer.emit("hi", |s| out.push_str(s)).await;
        assert_eq!(out, "hi");
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
