//! Tokenizing of `${name}` variable references
//!
//! Parses text like:
//! - `plain text` - a single literal
//! - `${http.port}` - a variable reference
//! - `http://${host}:${http.port}/` - literals and references interleaved
//!
//! There is no escape syntax. An unterminated `${` is kept as literal text,
//! as is an empty `${}`.

/// One piece of a tokenized string
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment<'a> {
    /// Literal text
    Literal(&'a str),
    /// A variable reference
    Variable {
        /// Variable name, trimmed of surrounding whitespace
        name: &'a str,
        /// The complete `${...}` token as written
        raw: &'a str,
    },
}

/// Tokenizer for variable references
pub struct InterpolationParser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> InterpolationParser<'a> {
    /// Create a new parser for the given input
    pub fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    /// Split the entire input into segments
    pub fn parse(&mut self) -> Vec<Segment<'a>> {
        let mut parts = Vec::new();
        let mut literal_start = self.pos;

        while !self.is_eof() {
            if self.check_interpolation_start() {
                if let Some((name, end)) = self.scan_reference() {
                    if literal_start < self.pos {
                        parts.push(Segment::Literal(&self.input[literal_start..self.pos]));
                    }
                    parts.push(Segment::Variable {
                        name,
                        raw: &self.input[self.pos..end],
                    });
                    self.pos = end;
                    literal_start = end;
                    continue;
                }
            }
            self.advance();
        }

        if literal_start < self.input.len() {
            parts.push(Segment::Literal(&self.input[literal_start..]));
        }

        parts
    }

    /// Check if we're at end of input
    fn is_eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    /// Advance by one character
    fn advance(&mut self) {
        if let Some(c) = self.input[self.pos..].chars().next() {
            self.pos += c.len_utf8();
        }
    }

    /// Check if we're at an interpolation start (${)
    fn check_interpolation_start(&self) -> bool {
        self.input[self.pos..].starts_with("${")
    }

    /// Look for the closing brace of the reference starting at the current
    /// position. Returns the trimmed name and the byte offset after `}`.
    fn scan_reference(&self) -> Option<(&'a str, usize)> {
        let body_start = self.pos + 2;
        let rest = &self.input[body_start..];
        let close = rest.find('}')?;
        let body = &rest[..close];

        // A nested opener means this `${` never closes on its own
        if body.contains("${") {
            return None;
        }

        let name = body.trim();
        if name.is_empty() {
            return None;
        }

        Some((name, body_start + close + 1))
    }
}

/// Tokenize a string into literal and variable segments
pub fn parse(input: &str) -> Vec<Segment<'_>> {
    InterpolationParser::new(input).parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_literal() {
        assert_eq!(parse("hello world"), vec![Segment::Literal("hello world")]);
    }

    #[test]
    fn test_parse_empty() {
        assert!(parse("").is_empty());
    }

    #[test]
    fn test_parse_variable() {
        assert_eq!(
            parse("${http.port}"),
            vec![Segment::Variable {
                name: "http.port",
                raw: "${http.port}"
            }]
        );
    }

    #[test]
    fn test_parse_concatenation() {
        let parts = parse("http://${host}:${http.port}/app");
        assert_eq!(
            parts,
            vec![
                Segment::Literal("http://"),
                Segment::Variable {
                    name: "host",
                    raw: "${host}"
                },
                Segment::Literal(":"),
                Segment::Variable {
                    name: "http.port",
                    raw: "${http.port}"
                },
                Segment::Literal("/app"),
            ]
        );
    }

    #[test]
    fn test_parse_adjacent_variables() {
        let parts = parse("${a}${b}");
        assert_eq!(parts.len(), 2);
        assert!(parts
            .iter()
            .all(|p| matches!(p, Segment::Variable { .. })));
    }

    #[test]
    fn test_parse_whitespace_in_reference() {
        assert_eq!(
            parse("${ name }"),
            vec![Segment::Variable {
                name: "name",
                raw: "${ name }"
            }]
        );
    }

    #[test]
    fn test_unterminated_is_literal() {
        assert_eq!(parse("prefix ${oops"), vec![Segment::Literal("prefix ${oops")]);
    }

    #[test]
    fn test_empty_reference_is_literal() {
        assert_eq!(parse("a${}b"), vec![Segment::Literal("a${}b")]);
    }

    #[test]
    fn test_dangling_opener_before_reference() {
        assert_eq!(
            parse("${a ${b}"),
            vec![
                Segment::Literal("${a "),
                Segment::Variable {
                    name: "b",
                    raw: "${b}"
                },
            ]
        );
    }

    #[test]
    fn test_multibyte_text() {
        assert_eq!(
            parse("héllo ${wörld}!"),
            vec![
                Segment::Literal("héllo "),
                Segment::Variable {
                    name: "wörld",
                    raw: "${wörld}"
                },
                Segment::Literal("!"),
            ]
        );
    }

    #[test]
    fn test_dollar_without_brace() {
        assert_eq!(parse("cost $5"), vec![Segment::Literal("cost $5")]);
    }
}
