use rustc_hash::FxHashMap;
use smallvec::{smallvec, SmallVec};

// Partial-ratio fuzzy alignment.
//
// Finds the window of the longer string that best matches the shorter one,
// scored with the normalized Indel similarity (`200 * lcs / (len1 + len2)`).
// Windows are only scored when they end (or, for suffix windows, start) on a
// char that occurs in the needle, which keeps long documents cheap. The LCS of
// each window is computed with Hyyrö's bit-parallel algorithm over 64-bit
// blocks, so the cost per window is `O(window * ceil(needle / 64))`.
//
// Positions are char indices; `*_end` values are exclusive.

/// Best alignment of two strings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreAlignment {
    /// Similarity in `0.0..=100.0`.
    pub score: f64,
    /// Aligned range in the first argument.
    pub src_start: usize,
    pub src_end: usize,
    /// Aligned range in the second argument.
    pub dest_start: usize,
    pub dest_end: usize,
}

impl ScoreAlignment {
    fn swapped(self) -> Self {
        Self {
            score: self.score,
            src_start: self.dest_start,
            src_end: self.dest_end,
            dest_start: self.src_start,
            dest_end: self.src_end,
        }
    }

    fn shifted(mut self, src_offset: usize, dest_offset: usize) -> Self {
        self.src_start += src_offset;
        self.src_end += src_offset;
        self.dest_start += dest_offset;
        self.dest_end += dest_offset;
        self
    }
}

/// Text prepared for scoring, still index-aligned with its source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedText {
    pub chars: Vec<char>,
    /// Source chars trimmed from the front; add back to get source indices.
    pub offset: usize,
}

/// Default scoring preprocessor.
///
/// Lowercases letters and digits, turns every other char into a space and
/// trims both ends. Each source char yields exactly one processed char, so
/// processed positions map back by adding [`ProcessedText::offset`].
#[must_use]
pub fn default_process(text: &str) -> ProcessedText {
    let chars: Vec<char> = text
        .chars()
        .map(|ch| {
            if ch.is_alphanumeric() {
                ch.to_lowercase().next().unwrap_or(ch)
            } else {
                ' '
            }
        })
        .collect();

    let Some(first) = chars.iter().position(|&ch| ch != ' ') else {
        return ProcessedText {
            chars: Vec::new(),
            offset: 0,
        };
    };
    let last = chars.iter().rposition(|&ch| ch != ' ').unwrap_or(first);
    ProcessedText {
        chars: chars[first..=last].to_vec(),
        offset: first,
    }
}

/// Bit masks of a needle's char positions, reused across windows.
struct BlockPattern {
    masks: FxHashMap<char, SmallVec<[u64; 2]>>,
    words: usize,
    len: usize,
}

impl BlockPattern {
    fn new(needle: &[char]) -> Self {
        let words = needle.len().div_ceil(64);
        let mut masks: FxHashMap<char, SmallVec<[u64; 2]>> = FxHashMap::default();
        for (pos, &ch) in needle.iter().enumerate() {
            masks.entry(ch).or_insert_with(|| smallvec![0; words])[pos / 64] |= 1u64 << (pos % 64);
        }
        Self {
            masks,
            words,
            len: needle.len(),
        }
    }

    #[inline]
    fn contains(&self, ch: char) -> bool {
        self.masks.contains_key(&ch)
    }

    fn lcs_len(&self, text: &[char]) -> usize {
        let mut state: SmallVec<[u64; 4]> = smallvec![u64::MAX; self.words];
        for ch in text {
            let Some(pm) = self.masks.get(ch) else {
                continue;
            };
            let mut carry = 0u64;
            for (word, &mask) in state.iter_mut().zip(pm.iter()) {
                let v = *word;
                let matched = v & mask;
                let (sum, c1) = v.overflowing_add(matched);
                let (sum, c2) = sum.overflowing_add(carry);
                carry = u64::from(c1 || c2);
                *word = sum | (v - matched);
            }
        }

        let tail_bits = self.len % 64;
        state
            .iter()
            .enumerate()
            .map(|(idx, &word)| {
                let valid = if idx + 1 == self.words && tail_bits != 0 {
                    (1u64 << tail_bits) - 1
                } else {
                    u64::MAX
                };
                (!word & valid).count_ones() as usize
            })
            .sum()
    }

    fn ratio(&self, window: &[char]) -> f64 {
        let total = self.len + window.len();
        if total == 0 {
            return 100.0;
        }
        200.0 * self.lcs_len(window) as f64 / total as f64
    }
}

/// Normalized Indel similarity of two char sequences, `0.0..=100.0`.
#[must_use]
pub fn ratio_chars(s1: &[char], s2: &[char]) -> f64 {
    if s1.is_empty() && s2.is_empty() {
        return 100.0;
    }
    BlockPattern::new(s1).ratio(s2)
}

/// Slide `needle` across `haystack` (`needle.len() <= haystack.len()`).
///
/// `src_*` refers to the needle, `dest_*` to the haystack window.
fn partial_ratio_short_needle(needle: &[char], haystack: &[char]) -> ScoreAlignment {
    let len1 = needle.len();
    let len2 = haystack.len();
    let pattern = BlockPattern::new(needle);
    let mut best = ScoreAlignment {
        score: 0.0,
        src_start: 0,
        src_end: len1,
        dest_start: 0,
        dest_end: len1,
    };

    let consider = |start: usize, end: usize, best: &mut ScoreAlignment| -> bool {
        let score = pattern.ratio(&haystack[start..end]);
        if score > best.score {
            best.score = score;
            best.dest_start = start;
            best.dest_end = end;
        }
        best.score >= 100.0
    };

    // Windows anchored at the start of the haystack, shorter than the needle.
    for end in 1..len1 {
        if pattern.contains(haystack[end - 1]) && consider(0, end, &mut best) {
            return best;
        }
    }

    // Full-length windows.
    for start in 0..len2 - len1 {
        if pattern.contains(haystack[start + len1 - 1]) && consider(start, start + len1, &mut best)
        {
            return best;
        }
    }

    // Windows running off the end of the haystack.
    for start in len2 - len1..len2 {
        if pattern.contains(haystack[start]) && consider(start, len2, &mut best) {
            return best;
        }
    }

    best
}

/// Best partial alignment of two already-processed char sequences.
///
/// Returns `None` when either side is empty or the best score is below
/// `score_cutoff`.
#[must_use]
pub fn partial_ratio_alignment_chars(
    s1: &[char],
    s2: &[char],
    score_cutoff: f64,
) -> Option<ScoreAlignment> {
    if s1.is_empty() || s2.is_empty() {
        return None;
    }

    let result = if s1.len() > s2.len() {
        partial_ratio_short_needle(s2, s1).swapped()
    } else {
        let mut result = partial_ratio_short_needle(s1, s2);
        if result.score < 100.0 && s1.len() == s2.len() {
            let reverse = partial_ratio_short_needle(s2, s1).swapped();
            if reverse.score > result.score {
                result = reverse;
            }
        }
        result
    };

    (result.score >= score_cutoff).then_some(result)
}

/// Best partial alignment of `s1` and `s2` after [`default_process`].
///
/// Returned ranges are char indices into the unprocessed inputs.
#[must_use]
pub fn partial_ratio_alignment(s1: &str, s2: &str, score_cutoff: f64) -> Option<ScoreAlignment> {
    let p1 = default_process(s1);
    let p2 = default_process(s2);
    partial_ratio_alignment_chars(&p1.chars, &p2.chars, score_cutoff)
        .map(|alignment| alignment.shifted(p1.offset, p2.offset))
}
