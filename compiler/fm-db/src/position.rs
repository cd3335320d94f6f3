// SPDX-License-Identifier: PMPL-1.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell

//! Conversion between byte offsets and editor positions.
//!
//! Editor positions are zero-based lines and UTF-16 code unit columns. Lines
//! end at `\n`, `\r\n` or a lone `\r`.

use fm_ast::span::Span;

/// A zero-based line and UTF-16 column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

impl Position {
    pub const fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }
}

/// A half-open range of positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

/// Start offsets of every line in a text.
#[derive(Debug, Clone)]
pub struct LineIndex<'a> {
    text: &'a str,
    starts: Vec<u32>,
}

impl<'a> LineIndex<'a> {
    pub fn new(text: &'a str) -> Self {
        let bytes = text.as_bytes();
        let mut starts = vec![0];
        let mut i = 0;
        while i < bytes.len() {
            match bytes[i] {
                b'\r' if bytes.get(i + 1) == Some(&b'\n') => {
                    i += 2;
                    starts.push(i as u32);
                }
                b'\r' | b'\n' => {
                    i += 1;
                    starts.push(i as u32);
                }
                _ => i += 1,
            }
        }
        Self { text, starts }
    }

    /// Position of byte `offset`. Offsets past the end clamp to the end and
    /// offsets inside a character snap back to its start.
    pub fn position(&self, offset: u32) -> Position {
        let offset = floor_char_boundary(self.text, offset);
        let line = self.starts.partition_point(|&start| start <= offset) - 1;
        let start = self.starts[line] as usize;
        let character = utf16_len(&self.text[start..offset as usize]);
        Position::new(line as u32, character)
    }

    /// Byte offset of `position`. Lines past the end clamp to the end of the
    /// text and columns past the end of a line clamp to the line's end.
    pub fn offset(&self, position: Position) -> u32 {
        let Some(&start) = self.starts.get(position.line as usize) else {
            return self.text.len() as u32;
        };
        let content = &self.text[start as usize..self.line_end(position.line as usize)];

        let mut units = 0;
        for (i, c) in content.char_indices() {
            if units >= position.character {
                return start + i as u32;
            }
            units += c.len_utf16() as u32;
        }
        start + content.len() as u32
    }

    pub fn range(&self, span: Span) -> Range {
        Range {
            start: self.position(span.start),
            end: self.position(span.end),
        }
    }

    /// End of the line's content, before its terminator.
    fn line_end(&self, line: usize) -> usize {
        let end = self
            .starts
            .get(line + 1)
            .map_or(self.text.len(), |&next| next as usize);
        let content = &self.text[self.starts[line] as usize..end];
        let trimmed = content
            .strip_suffix("\r\n")
            .or_else(|| content.strip_suffix('\n'))
            .or_else(|| content.strip_suffix('\r'))
            .unwrap_or(content);
        self.starts[line] as usize + trimmed.len()
    }
}

/// Position of byte `offset` in `text`.
pub fn offset_to_position(text: &str, offset: u32) -> Position {
    LineIndex::new(text).position(offset)
}

/// Byte offset of `position` in `text`.
pub fn position_to_offset(text: &str, position: Position) -> u32 {
    LineIndex::new(text).offset(position)
}

/// A maximal run of non-delimiter characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub text: &'a str,
    pub span: Span,
}

impl<'a> Token<'a> {
    /// The token as written, then with one trailing `:`, `.` or `;` removed.
    pub fn candidates(&self) -> impl Iterator<Item = &'a str> {
        let text = self.text;
        let trimmed = text
            .strip_suffix([':', '.', ';'])
            .filter(|trimmed| !trimmed.is_empty());
        std::iter::once(text).chain(trimmed)
    }
}

fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || matches!(c, '(' | ')' | '{' | '}' | '<' | '>' | ',' | '!')
}

/// The token touching byte `offset`, scanning left from the character before
/// it and right from the character at it.
pub fn find_token_at(text: &str, offset: u32) -> Option<Token<'_>> {
    let offset = floor_char_boundary(text, offset) as usize;

    let start = text[..offset]
        .char_indices()
        .rev()
        .find(|&(_, c)| is_delimiter(c))
        .map_or(0, |(i, c)| i + c.len_utf8());
    let end = text[offset..]
        .char_indices()
        .find(|&(_, c)| is_delimiter(c))
        .map_or(text.len(), |(i, _)| offset + i);

    (start < end).then(|| Token {
        text: &text[start..end],
        span: Span::new(start as u32, end as u32),
    })
}

fn floor_char_boundary(text: &str, offset: u32) -> u32 {
    let mut offset = (offset as usize).min(text.len());
    while !text.is_char_boundary(offset) {
        offset -= 1;
    }
    offset as u32
}

fn utf16_len(text: &str) -> u32 {
    text.chars().map(|c| c.len_utf16() as u32).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offsets_on_multiple_lines() {
        let text = "type Bool {\n  true,\n}\n";
        assert_eq!(offset_to_position(text, 0), Position::new(0, 0));
        assert_eq!(offset_to_position(text, 14), Position::new(1, 2));
        assert_eq!(offset_to_position(text, 20), Position::new(2, 0));
        assert_eq!(position_to_offset(text, Position::new(1, 2)), 14);
    }

    #[test]
    fn test_offset_past_end_clamps() {
        let text = "ab\ncd";
        assert_eq!(offset_to_position(text, 99), Position::new(1, 2));
        assert_eq!(position_to_offset(text, Position::new(9, 0)), 5);
        assert_eq!(position_to_offset(text, Position::new(0, 9)), 2);
    }

    #[test]
    fn test_crlf_and_lone_cr() {
        let text = "a\r\nb\rc";
        let index = LineIndex::new(text);
        assert_eq!(index.position(6), Position::new(2, 1));
        assert_eq!(index.position(3), Position::new(1, 0));
        assert_eq!(index.position(5), Position::new(2, 0));
        assert_eq!(index.offset(Position::new(0, 5)), 1);
    }

    #[test]
    fn test_utf16_columns() {
        // 'é' is 2 bytes and 1 unit, '𝔹' is 4 bytes and 2 units.
        let text = "é𝔹x";
        assert_eq!(offset_to_position(text, 2), Position::new(0, 1));
        assert_eq!(offset_to_position(text, 6), Position::new(0, 3));
        assert_eq!(position_to_offset(text, Position::new(0, 3)), 6);
        // Inside a character snaps back.
        assert_eq!(offset_to_position(text, 4), Position::new(0, 1));
    }

    #[test]
    fn test_find_token_at_middle_and_edges() {
        let text = "Bool.not(a: Bool): Bool";
        let token = find_token_at(text, 2).expect("token");
        assert_eq!(token.text, "Bool.not");
        assert_eq!(token.span, Span::new(0, 8));

        // Right after the token still finds it.
        assert_eq!(find_token_at(text, 8).map(|t| t.text), Some("Bool.not"));
        assert_eq!(find_token_at(text, 10).map(|t| t.text), Some("a:"));
        assert_eq!(find_token_at(text, 17).map(|t| t.text), Some(":"));
    }

    #[test]
    fn test_find_token_at_whitespace_is_none() {
        assert_eq!(find_token_at("a  b", 2), None);
        assert_eq!(find_token_at("", 0), None);
    }

    #[test]
    fn test_candidates_trim_one_suffix() {
        let token = find_token_at("a: Bool", 0).expect("token");
        let candidates: Vec<&str> = token.candidates().collect();
        assert_eq!(candidates, vec!["a:", "a"]);

        let token = find_token_at("Bool", 0).expect("token");
        assert_eq!(token.candidates().collect::<Vec<_>>(), vec!["Bool"]);

        let token = find_token_at(":", 0).expect("token");
        assert_eq!(token.candidates().collect::<Vec<_>>(), vec![":"]);
    }
}
