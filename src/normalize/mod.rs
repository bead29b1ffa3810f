mod nfc;

use self::nfc::nfc_with_offsets;

// Index-preserving text normalization.
//
// `normalize_with_mapping` turns arbitrary text into a canonical comparison
// form (NFC, HTML entities decoded, zero-width chars removed, lowercase,
// punctuation dropped, whitespace collapsed) and remembers, for every output
// char, which original char range produced it. A literal substring match on
// the normalized text can therefore always be mapped back onto the original.
//
// All indices are char indices, not byte offsets.

/// `map[i]` is the original char index that produced normalized char `i`.
///
/// Monotonically non-decreasing; `map.len()` equals the normalized char count.
pub type PositionMap = Vec<usize>;

/// HTML entities decoded during normalization, longest first.
const HTML_ENTITIES: &[(&str, &str)] = &[
    ("&hellip;", "..."),
    ("&ndash;", "-"),
    ("&mdash;", "-"),
    ("&nbsp;", " "),
    ("&#160;", " "),
    ("&quot;", "\""),
    ("&apos;", "'"),
    ("&#x27;", "'"),
    ("&#xB0;", "°"),
    ("&#xBA;", "°"),
    ("&amp;", "&"),
    ("&#39;", "'"),
    ("&zwj;", ""),
    ("&lt;", "<"),
    ("&gt;", ">"),
];

/// Normalized text plus its mapping back to the original.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedText {
    /// Canonical comparison form.
    pub text: String,
    /// Original start index per normalized char.
    pub map: PositionMap,
    /// Exclusive original end index per normalized char.
    ends: Vec<usize>,
}

impl NormalizedText {
    /// Number of chars in the normalized text.
    #[must_use]
    pub fn char_len(&self) -> usize {
        self.map.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Original index of the first char that produced normalized char `idx`.
    #[must_use]
    pub fn original_index(&self, idx: usize) -> Option<usize> {
        self.map.get(idx).copied()
    }

    /// Original index of the last char that produced normalized char `idx`.
    #[must_use]
    pub fn original_end_inclusive(&self, idx: usize) -> Option<usize> {
        self.ends.get(idx).map(|end| end.saturating_sub(1))
    }

    /// Char index (into `text`) of the first occurrence of `needle`.
    #[must_use]
    pub fn find(&self, needle: &NormalizedText) -> Option<usize> {
        if needle.is_empty() {
            return None;
        }
        let byte_pos = memchr::memmem::find(self.text.as_bytes(), needle.text.as_bytes())?;
        Some(self.text[..byte_pos].chars().count())
    }

    fn with_capacity(capacity: usize) -> Self {
        Self {
            text: String::with_capacity(capacity),
            map: Vec::with_capacity(capacity),
            ends: Vec::with_capacity(capacity),
        }
    }

    #[inline]
    fn push(&mut self, ch: char, start: usize, end: usize) {
        self.text.push(ch);
        self.map.push(start);
        self.ends.push(end);
    }

    fn pop(&mut self) {
        self.text.pop();
        self.map.pop();
        self.ends.pop();
    }
}

/// How a single char participates in the comparison form.
#[derive(Debug, Clone)]
pub enum CharFold {
    /// Collapsible whitespace.
    Space,
    /// Removed from the comparison form.
    Drop,
    /// Kept, case-folded; may expand to several chars.
    Keep(std::char::ToLowercase),
}

/// Single-char normalization.
///
/// Letters and digits are lowercased, whitespace becomes a space and every
/// other char (punctuation, quotes, dashes, symbols, stray marks) is dropped.
#[must_use]
pub fn fold_char(ch: char) -> CharFold {
    if ch.is_whitespace() {
        CharFold::Space
    } else if ch.is_alphanumeric() {
        CharFold::Keep(ch.to_lowercase())
    } else {
        CharFold::Drop
    }
}

/// Chars that render with no width and are removed outright.
#[must_use]
pub fn is_zero_width_char(ch: char) -> bool {
    matches!(
        ch,
        '\u{200B}' // zero-width space
            | '\u{200C}' // zero-width non-joiner
            | '\u{200D}' // zero-width joiner
            | '\u{2060}' // word joiner
            | '\u{FEFF}' // zero-width no-break space / BOM
            | '\u{00AD}' // soft hyphen
    )
}

#[inline]
fn entity_at(chars: &[char]) -> Option<(usize, &'static str)> {
    if chars.first() != Some(&'&') {
        return None;
    }
    HTML_ENTITIES.iter().find_map(|(entity, decoded)| {
        let len = entity.len();
        let matches = chars.len() >= len
            && entity
                .bytes()
                .zip(&chars[..len])
                .all(|(b, &c)| char::from(b) == c);
        matches.then_some((len, *decoded))
    })
}

struct Emitter {
    out: NormalizedText,
    last_was_space: bool,
}

impl Emitter {
    fn emit(&mut self, ch: char, start: usize, end: usize) {
        match fold_char(ch) {
            CharFold::Space => {
                if !self.last_was_space {
                    self.out.push(' ', start, end);
                    self.last_was_space = true;
                }
            }
            CharFold::Drop => {}
            CharFold::Keep(lower) => {
                for folded in lower {
                    self.out.push(folded, start, end);
                }
                self.last_was_space = false;
            }
        }
    }
}

/// Normalize `text` for comparison, keeping a map back to the original.
///
/// Never fails: anything that does not decode is kept as literal chars.
#[must_use]
pub fn normalize_with_mapping(text: &str) -> NormalizedText {
    if text.is_empty() {
        return NormalizedText::default();
    }

    let original: Vec<char> = text.chars().collect();
    let nfc = nfc_with_offsets(&original);

    // Leading whitespace is never emitted.
    let mut emitter = Emitter {
        out: NormalizedText::with_capacity(nfc.len()),
        last_was_space: true,
    };

    let mut i = 0usize;
    while i < nfc.len() {
        let start = nfc.starts[i];

        if let Some((entity_len, decoded)) = entity_at(&nfc.chars[i..]) {
            let end = nfc.ends[i + entity_len - 1];
            for ch in decoded.chars() {
                emitter.emit(ch, start, end);
            }
            i += entity_len;
            continue;
        }

        let ch = nfc.chars[i];
        if !is_zero_width_char(ch) {
            emitter.emit(ch, start, nfc.ends[i]);
        }
        i += 1;
    }

    let mut out = emitter.out;
    if out.text.ends_with(' ') {
        out.pop();
    }
    out
}
