//! Closing-marker matching.
//!
//! Closing markers carry data from their opener (a section name, a numeric
//! directive id), so they are built per construct rather than compiled once.
//! A [`Marker`] is a short sequence of pieces matched case-insensitively.

/// One element of a marker.
#[derive(Debug, Clone)]
pub(crate) enum Piece {
    /// Literal text, ASCII case-insensitive.
    Lit(String),
    /// Zero or more whitespace characters.
    Ws,
    /// An optional `/`.
    OptSlash,
    /// A `'` or `"`.
    Quote,
}

#[derive(Debug, Clone)]
pub(crate) struct Marker {
    pieces: Vec<Piece>,
}

impl Marker {
    /// The first piece must be a quote or a literal led by an ASCII character.
    pub(crate) fn new(pieces: Vec<Piece>) -> Self {
        debug_assert!(matches!(
            pieces.first(),
            Some(Piece::Quote) | Some(Piece::Lit(_))
        ));
        Self { pieces }
    }

    fn could_start_with(&self, byte: u8) -> bool {
        match self.pieces.first() {
            Some(Piece::Lit(lit)) => lit
                .as_bytes()
                .first()
                .is_some_and(|first| first.is_ascii() && byte.eq_ignore_ascii_case(first)),
            Some(Piece::Quote) => matches!(byte, b'\'' | b'"'),
            _ => false,
        }
    }

    /// Match the whole marker at byte offset `at`; returns the end offset.
    pub(crate) fn match_at(&self, text: &str, at: usize) -> Option<usize> {
        let bytes = text.as_bytes();
        let mut pos = at;
        for piece in &self.pieces {
            match piece {
                Piece::Lit(lit) => {
                    let end = pos + lit.len();
                    if end > bytes.len() || !bytes[pos..end].eq_ignore_ascii_case(lit.as_bytes()) {
                        return None;
                    }
                    pos = end;
                }
                Piece::Ws => {
                    pos += text[pos..]
                        .char_indices()
                        .find(|(_, c)| !c.is_whitespace())
                        .map_or(text.len() - pos, |(i, _)| i);
                }
                Piece::OptSlash => {
                    if bytes.get(pos) == Some(&b'/') {
                        pos += 1;
                    }
                }
                Piece::Quote => match bytes.get(pos) {
                    Some(b'\'' | b'"') => pos += 1,
                    _ => return None,
                },
            }
        }
        Some(pos)
    }

    /// Leftmost occurrence at or after `from`, as `(start, end)`.
    pub(crate) fn find(&self, text: &str, from: usize) -> Option<(usize, usize)> {
        let bytes = text.as_bytes();
        (from..bytes.len())
            .filter(|&i| self.could_start_with(bytes[i]))
            .find_map(|i| self.match_at(text, i).map(|end| (i, end)))
    }
}

pub(crate) fn lit(text: impl Into<String>) -> Piece {
    Piece::Lit(text.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endif(id: &str) -> Marker {
        Marker::new(vec![lit(format!("%%endif{id}")), Piece::Ws, lit("%%")])
    }

    #[test]
    fn matches_case_insensitively_with_whitespace() {
        let text = "abc %%ENDIF  %% tail";
        assert_eq!(endif("").find(text, 0), Some((4, 15)));
    }

    #[test]
    fn ids_must_match_exactly() {
        let text = "%%endif12%% %%endif1%%";
        assert_eq!(endif("1").find(text, 0), Some((12, 22)));
        assert_eq!(endif("").find(text, 0), None);
    }

    #[test]
    fn quote_and_optional_slash() {
        let marker = Marker::new(vec![lit("<a-else-if"), Piece::Ws, lit("condition"), Piece::Ws, lit("="), Piece::Ws, Piece::Quote]);
        assert_eq!(marker.match_at("<a-else-if condition = 'x'", 0), Some(24));
        let close = Marker::new(vec![Piece::Quote, Piece::Ws, Piece::OptSlash, lit(">")]);
        assert_eq!(close.find("a == \"b\" />", 0), Some((7, 11)));
        assert_eq!(close.match_at("' >", 0), Some(3));
        assert!(close.match_at("'/ >", 0).is_none());
    }

    #[test]
    fn non_ascii_text_is_skipped_safely() {
        let text = "é%%endif%%";
        assert_eq!(endif("").find(text, 0), Some((2, 11)));
    }
}
