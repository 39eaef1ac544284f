//! Structural QuakeML check.
//!
//! Not a full QuakeML reader: the document must be well-formed XML whose
//! root element is `quakeml` (any namespace) with an `eventParameters`
//! child. Events are counted, not decoded.

use roxmltree::{Document, Node};

use super::{CatalogParser, FormatError, ParseFailure};

/// What the catalog check learned about the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CatalogSummary {
    /// Number of `event` elements
    pub events: usize,
}

/// Built-in QuakeML catalog check.
#[derive(Debug, Clone, Copy, Default)]
pub struct QuakeMlParser;

fn is_element(node: &Node, local: &str) -> bool {
    node.is_element() && node.tag_name().name() == local
}

impl QuakeMlParser {
    pub fn new() -> Self {
        Self
    }

    fn check(&self, raw: &str) -> Result<CatalogSummary, FormatError> {
        let err = |reason: String| FormatError::new("quakeml", reason);

        let text = raw.strip_prefix('\u{feff}').unwrap_or(raw);
        let document = Document::parse(text).map_err(|e| err(e.to_string()))?;

        let root = document.root_element();
        if root.tag_name().name() != "quakeml" {
            return Err(err(format!(
                "root element is <{}>, not <quakeml>",
                root.tag_name().name()
            )));
        }

        let event_parameters = root
            .children()
            .find(|n| is_element(n, "eventParameters"))
            .ok_or_else(|| err("missing <eventParameters>".to_string()))?;

        let events = event_parameters
            .descendants()
            .filter(|n| is_element(n, "event"))
            .count();

        Ok(CatalogSummary { events })
    }
}

impl CatalogParser for QuakeMlParser {
    fn parse(&self, raw: &str) -> Result<CatalogSummary, ParseFailure> {
        Ok(self.check(raw)?)
    }
}
