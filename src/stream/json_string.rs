// Incremental JSON string decoding.
//
// Input arrives in arbitrary pieces, already past the opening quote. An
// escape sequence cut by a piece boundary is kept in the decoder until it
// completes, so callers never need to re-buffer raw input.
//
// Key invariants:
// - The first unescaped `"` closes the string; everything after it is ignored.
// - Malformed escapes are emitted literally.
// - Unpaired surrogates decode to U+FFFD. Decoding never fails.

/// Incremental decoder for the body of a JSON string literal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JsonStringDecoder {
    /// Raw text of an escape in progress, starting with `\`.
    pending: String,
    /// High surrogate waiting for its low half.
    high_surrogate: Option<u16>,
    closed: bool,
}

const REPLACEMENT: char = '\u{FFFD}';

impl JsonStringDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the closing quote has been seen.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Whether an escape or surrogate half is still pending.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty() || self.high_surrogate.is_some()
    }

    /// Decode `input`, returning the text that is complete so far.
    pub fn push(&mut self, input: &str) -> String {
        let mut out = String::with_capacity(input.len());
        self.push_into(input, &mut out);
        out
    }

    pub fn push_into(&mut self, input: &str, out: &mut String) {
        for ch in input.chars() {
            if self.closed {
                return;
            }
            if !self.pending.is_empty() {
                self.pending.push(ch);
                self.advance_escape(out);
                continue;
            }
            match ch {
                '\\' => self.pending.push(ch),
                '"' => {
                    self.flush_orphan(out);
                    self.closed = true;
                }
                _ => self.emit(ch, out),
            }
        }
    }

    /// Emit whatever is still pending as-is. Used at end of input.
    pub fn finish(&mut self) -> String {
        let mut out = String::new();
        self.flush_orphan(&mut out);
        out.push_str(&std::mem::take(&mut self.pending));
        out
    }

    fn emit(&mut self, ch: char, out: &mut String) {
        self.flush_orphan(out);
        out.push(ch);
    }

    fn flush_orphan(&mut self, out: &mut String) {
        if self.high_surrogate.take().is_some() {
            out.push(REPLACEMENT);
        }
    }

    fn emit_literal_pending(&mut self, out: &mut String) {
        let raw = std::mem::take(&mut self.pending);
        self.flush_orphan(out);
        out.push_str(&raw);
    }

    fn advance_escape(&mut self, out: &mut String) {
        let mut chars = self.pending.chars().skip(1);
        let Some(kind) = chars.next() else {
            return;
        };

        if kind != 'u' {
            let simple = match kind {
                '"' => Some('"'),
                '\\' => Some('\\'),
                '/' => Some('/'),
                'n' => Some('\n'),
                'r' => Some('\r'),
                't' => Some('\t'),
                'b' => Some('\u{08}'),
                'f' => Some('\u{0c}'),
                _ => None,
            };
            match simple {
                Some(ch) => {
                    self.pending.clear();
                    self.emit(ch, out);
                }
                None => self.emit_literal_pending(out),
            }
            return;
        }

        // Inside `\uXXXX`; everything pending so far is ASCII.
        if self.pending.len() == 2 {
            return;
        }
        if !self
            .pending
            .chars()
            .next_back()
            .is_some_and(|ch| ch.is_ascii_hexdigit())
        {
            self.emit_literal_pending(out);
            return;
        }
        if self.pending.len() < 6 {
            return;
        }

        let Ok(unit) = u16::from_str_radix(&self.pending[2..6], 16) else {
            self.emit_literal_pending(out);
            return;
        };
        self.pending.clear();
        self.push_code_unit(unit, out);
    }

    fn push_code_unit(&mut self, unit: u16, out: &mut String) {
        match unit {
            0xD800..=0xDBFF => {
                self.flush_orphan(out);
                self.high_surrogate = Some(unit);
            }
            0xDC00..=0xDFFF => match self.high_surrogate.take() {
                Some(high) => {
                    let code = 0x10000
                        + ((u32::from(high) - 0xD800) << 10)
                        + (u32::from(unit) - 0xDC00);
                    out.push(char::from_u32(code).unwrap_or(REPLACEMENT));
                }
                None => out.push(REPLACEMENT),
            },
            _ => self.emit(char::from_u32(u32::from(unit)).unwrap_or(REPLACEMENT), out),
        }
    }
}
