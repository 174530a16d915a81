//! Helpers for the API's XML responses.
//!
//! Every response is a root element whose children include a named
//! collection (`projects`, `jobs`, `nodes`, `sensors`, `readings`); each
//! child of the collection is one entry made of simple text fields.

use chrono::{NaiveDate, NaiveDateTime};
use roxmltree::{Document, Node};
use talaria_core::source::SourceError;

/// Timestamp format used in responses
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Date format used in request parameters
pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub(crate) fn parse<'i>(action: &str, body: &'i str) -> Result<Document<'i>, SourceError> {
    Document::parse(body).map_err(|e| SourceError::MalformedResponse {
        action: action.to_string(),
        details: e.to_string(),
    })
}

/// Element children of the root's first `<collection>` child
pub(crate) fn entries<'a, 'i>(
    doc: &'a Document<'i>,
    collection: &str,
) -> impl Iterator<Item = Node<'a, 'i>> + use<'a, 'i> {
    doc.root_element()
        .children()
        .find(|n| n.has_tag_name(collection))
        .into_iter()
        .flat_map(|n| n.children())
        .filter(Node::is_element)
}

/// Check if the root has a direct `<name>` child
pub(crate) fn has_child(doc: &Document<'_>, name: &str) -> bool {
    doc.root_element().children().any(|n| n.has_tag_name(name))
}

/// Text of the first `<name>` child; an empty element yields `""`
pub(crate) fn child_text<'a>(node: Node<'a, '_>, name: &str) -> Option<&'a str> {
    node.children()
        .find(|n| n.has_tag_name(name))
        .map(|n| n.text().unwrap_or(""))
}

pub(crate) fn child_parse<T: std::str::FromStr>(node: Node<'_, '_>, name: &str) -> Option<T> {
    child_text(node, name)?.trim().parse().ok()
}

pub(crate) fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text.trim(), TIMESTAMP_FORMAT).ok()
}

/// Lenient ISO 8601 parse: `T` or space separator, optional fraction,
/// or a bare date at midnight
pub(crate) fn parse_iso_timestamp(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, DATE_FORMAT)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}
