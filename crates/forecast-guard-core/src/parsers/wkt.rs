//! Well-known-text polygon parsing.
//!
//! Accepts `POLYGON` and `MULTIPOLYGON`, case-insensitive, with an optional
//! `Z` tag. Every ring needs at least four positions, must be closed, and
//! all positions share one dimension (2 or 3).

use lazy_static::lazy_static;
use regex::Regex;

use super::{FormatError, GeometryParser, ParseFailure};

lazy_static! {
    static ref NUMBER: Regex = Regex::new(r"^[-+]?(?:\d+\.?\d*|\.\d+)(?:[eE][-+]?\d+)?").unwrap();
}

/// One position. `z` is set for 3D geometries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coord {
    pub x: f64,
    pub y: f64,
    pub z: Option<f64>,
}

/// Exterior ring first, then holes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Polygon {
    pub rings: Vec<Vec<Coord>>,
}

/// A parsed bounding region.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Geometry {
    pub polygons: Vec<Polygon>,
}

impl Geometry {
    pub fn ring_count(&self) -> usize {
        self.polygons.iter().map(|p| p.rings.len()).sum()
    }

    /// `(min_x, min_y, max_x, max_y)` over all positions.
    pub fn bounds(&self) -> Option<(f64, f64, f64, f64)> {
        let mut coords = self
            .polygons
            .iter()
            .flat_map(|p| p.rings.iter())
            .flat_map(|r| r.iter());

        let first = coords.next()?;
        Some(coords.fold(
            (first.x, first.y, first.x, first.y),
            |(min_x, min_y, max_x, max_y), c| {
                (min_x.min(c.x), min_y.min(c.y), max_x.max(c.x), max_y.max(c.y))
            },
        ))
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    Number(f64),
    Open,
    Close,
    Comma,
}

fn fail(reason: impl Into<String>) -> FormatError {
    FormatError::new("wkt", reason)
}

fn tokenize(raw: &str) -> Result<Vec<Token>, FormatError> {
    let mut tokens = Vec::new();
    let mut chars = raw.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::Open);
            }
            ')' => {
                chars.next();
                tokens.push(Token::Close);
            }
            ',' => {
                chars.next();
                tokens.push(Token::Comma);
            }
            c if c.is_ascii_alphabetic() => {
                let mut end = start;
                while let Some(&(i, c)) = chars.peek() {
                    if !c.is_ascii_alphabetic() {
                        break;
                    }
                    end = i + c.len_utf8();
                    chars.next();
                }
                tokens.push(Token::Word(raw[start..end].to_ascii_uppercase()));
            }
            c if c.is_ascii_digit() || matches!(c, '-' | '+' | '.') => {
                let text = NUMBER
                    .find(&raw[start..])
                    .map(|m| m.as_str())
                    .ok_or_else(|| fail(format!("invalid number at offset {}", start)))?;
                let end = start + text.len();
                while chars.peek().is_some_and(|&(i, _)| i < end) {
                    chars.next();
                }
                if let Some(&(_, next)) = chars.peek() {
                    if !(next.is_whitespace() || matches!(next, ',' | '(' | ')')) {
                        return Err(fail(format!(
                            "number {:?} followed by {:?}",
                            text, next
                        )));
                    }
                }
                let value: f64 = text
                    .parse()
                    .map_err(|_| fail(format!("invalid number {:?}", text)))?;
                if !value.is_finite() {
                    return Err(fail(format!("non-finite number {:?}", text)));
                }
                tokens.push(Token::Number(value));
            }
            other => return Err(fail(format!("unexpected character {:?}", other))),
        }
    }

    Ok(tokens)
}

struct Reader {
    tokens: Vec<Token>,
    pos: usize,
    dimension: Option<usize>,
}

impl Reader {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn expect(&mut self, expected: Token) -> Result<(), FormatError> {
        match self.bump() {
            Some(token) if token == expected => Ok(()),
            Some(token) => Err(fail(format!("expected {:?}, found {:?}", expected, token))),
            None => Err(fail(format!("expected {:?}, found end of input", expected))),
        }
    }

    /// Parse `( item, item, ... )`.
    fn list<T>(
        &mut self,
        mut item: impl FnMut(&mut Self) -> Result<T, FormatError>,
    ) -> Result<Vec<T>, FormatError> {
        self.expect(Token::Open)?;
        let mut items = vec![item(self)?];
        loop {
            match self.bump() {
                Some(Token::Comma) => items.push(item(self)?),
                Some(Token::Close) => return Ok(items),
                Some(token) => return Err(fail(format!("unexpected {:?}", token))),
                None => return Err(fail("unterminated list")),
            }
        }
    }

    fn coord(&mut self) -> Result<Coord, FormatError> {
        let mut values = Vec::with_capacity(3);
        while let Some(Token::Number(n)) = self.peek() {
            values.push(*n);
            self.pos += 1;
        }

        match self.dimension {
            Some(d) if d != values.len() => {
                return Err(fail(format!(
                    "position has {} values, expected {}",
                    values.len(),
                    d
                )))
            }
            None if values.len() == 2 || values.len() == 3 => self.dimension = Some(values.len()),
            None => {
                return Err(fail(format!(
                    "position has {} values, expected 2 or 3",
                    values.len()
                )))
            }
            _ => {}
        }

        Ok(Coord {
            x: values[0],
            y: values[1],
            z: values.get(2).copied(),
        })
    }

    fn ring(&mut self) -> Result<Vec<Coord>, FormatError> {
        let ring = self.list(Self::coord)?;
        if ring.len() < 4 {
            return Err(fail(format!("ring has {} positions, need at least 4", ring.len())));
        }
        if ring.first() != ring.last() {
            return Err(fail("ring is not closed"));
        }
        Ok(ring)
    }

    fn polygon(&mut self) -> Result<Polygon, FormatError> {
        Ok(Polygon {
            rings: self.list(Self::ring)?,
        })
    }
}

/// Parse a WKT polygon or multipolygon.
pub fn parse_wkt(raw: &str) -> Result<Geometry, FormatError> {
    let mut reader = Reader {
        tokens: tokenize(raw)?,
        pos: 0,
        dimension: None,
    };

    let kind = match reader.bump() {
        Some(Token::Word(word)) => word,
        _ => return Err(fail("expected a geometry type")),
    };

    if let Some(Token::Word(tag)) = reader.peek() {
        match tag.as_str() {
            "Z" => {
                reader.dimension = Some(3);
                reader.pos += 1;
            }
            "EMPTY" => return Err(fail("empty geometry has no region")),
            other => return Err(fail(format!("unsupported tag {}", other))),
        }
    }

    let polygons = match kind.as_str() {
        "POLYGON" => vec![reader.polygon()?],
        "MULTIPOLYGON" => reader.list(Reader::polygon)?,
        other => return Err(fail(format!("{} is not a polygon type", other))),
    };

    if let Some(token) = reader.peek() {
        return Err(fail(format!("trailing {:?}", token)));
    }

    Ok(Geometry { polygons })
}

/// Built-in WKT geometry parser.
#[derive(Debug, Clone, Copy, Default)]
pub struct WktParser;

impl GeometryParser for WktParser {
    fn parse(&self, wkt: &str) -> Result<Geometry, ParseFailure> {
        Ok(parse_wkt(wkt)?)
    }
}
