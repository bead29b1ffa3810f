use smallvec::SmallVec;
use unicode_normalization::char::{canonical_combining_class, compose};
use unicode_normalization::{is_nfc_quick, IsNormalized, UnicodeNormalization};

// Canonical composition that remembers where every composed char came from.
//
// Composition only ever merges a starter with the non-starters that follow
// it (or, for Hangul and a few Indic vowel signs, with a following starter
// that `compose` accepts). The input is cut into such segments, each segment
// is composed on its own, and every output char is tagged with the char range
// of its segment in the original text.

/// NFC chars with their originating char ranges (`starts[i]..ends[i]`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct NfcChars {
    pub chars: Vec<char>,
    pub starts: Vec<usize>,
    pub ends: Vec<usize>,
}

impl NfcChars {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            chars: Vec::with_capacity(capacity),
            starts: Vec::with_capacity(capacity),
            ends: Vec::with_capacity(capacity),
        }
    }

    #[inline]
    fn push(&mut self, ch: char, start: usize, end: usize) {
        self.chars.push(ch);
        self.starts.push(start);
        self.ends.push(end);
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }
}

/// Compose `chars` to NFC, tracking original char offsets.
pub(crate) fn nfc_with_offsets(chars: &[char]) -> NfcChars {
    let mut out = NfcChars::with_capacity(chars.len());
    if chars.is_empty() {
        return out;
    }

    if is_nfc_quick(chars.iter().copied()) == IsNormalized::Yes {
        for (idx, &ch) in chars.iter().enumerate() {
            out.push(ch, idx, idx + 1);
        }
        return out;
    }

    let mut seg_start = 0usize;
    for idx in 1..=chars.len() {
        if idx < chars.len() && !starts_new_segment(&chars[seg_start..idx], chars[idx]) {
            continue;
        }
        push_segment(&mut out, &chars[seg_start..idx], seg_start);
        seg_start = idx;
    }
    out
}

fn starts_new_segment(segment: &[char], next: char) -> bool {
    if canonical_combining_class(next) != 0 {
        return false;
    }
    let last = match segment {
        [single] => Some(*single),
        _ => segment.iter().copied().nfc().last(),
    };
    last.and_then(|last| compose(last, next)).is_none()
}

fn push_segment(out: &mut NfcChars, segment: &[char], start: usize) {
    let composed: SmallVec<[char; 4]> = segment.iter().copied().nfc().collect();
    if composed.as_slice() == segment {
        for (offset, &ch) in segment.iter().enumerate() {
            out.push(ch, start + offset, start + offset + 1);
        }
        return;
    }

    let end = start + segment.len();
    for ch in composed {
        out.push(ch, start, end);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(text: &str) -> NfcChars {
        let chars: Vec<char> = text.chars().collect();
        nfc_with_offsets(&chars)
    }

    #[test]
    fn already_composed_text_maps_identity() {
        let out = run("café 你好");
        assert_eq!(out.chars.iter().collect::<String>(), "café 你好");
        assert_eq!(out.starts, vec![0, 1, 2, 3, 4, 5, 6]);
        assert_eq!(out.ends, vec![1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn combining_sequence_collapses_to_its_start() {
        // "e" + COMBINING ACUTE ACCENT
        let out = run("cafe\u{301}!");
        assert_eq!(out.chars.iter().collect::<String>(), "café!");
        assert_eq!(out.starts, vec![0, 1, 2, 3, 5]);
        assert_eq!(out.ends, vec![1, 2, 3, 5, 6]);
    }

    #[test]
    fn hangul_jamo_compose_across_starters() {
        // L + V + T jamo compose into a single syllable.
        let out = run("\u{1100}\u{1161}\u{11A8}x");
        assert_eq!(out.len(), 2);
        assert_eq!(out.chars[0], '\u{AC01}');
        assert_eq!((out.starts[0], out.ends[0]), (0, 3));
        assert_eq!((out.starts[1], out.ends[1]), (3, 4));
    }

    #[test]
    fn singleton_decomposition_is_replaced() {
        // ANGSTROM SIGN normalizes to LATIN CAPITAL LETTER A WITH RING ABOVE.
        let out = run("a\u{212B}b");
        assert_eq!(out.chars, vec!['a', '\u{C5}', 'b']);
        assert_eq!(out.starts, vec![0, 1, 2]);
    }

    #[test]
    fn empty_input() {
        assert_eq!(run(""), NfcChars::default());
    }
}
