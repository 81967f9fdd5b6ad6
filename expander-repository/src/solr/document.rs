//! Solr XML update documents.
//!
//! Field names and values come straight from indexed objects, so everything
//! written into the document goes through [`escape_xml`].

use std::borrow::Cow;

use expander_shared::FlattenedDocument;

const XML_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";
const ADD_OPEN: &str = "<add><doc>";
const ADD_CLOSE: &str = "</doc></add>\n";
const DELETE_OPEN: &str = "<delete><id>";
const DELETE_CLOSE: &str = "</id></delete>\n";
const FIELD_OPEN: &str = "<field name=\"";
const FIELD_OPEN_END: &str = "\">";
const FIELD_CLOSE: &str = "</field>";

/// Replacement for characters XML 1.0 cannot carry at all.
const INVALID_CHAR_REPLACEMENT: char = '\u{FFFD}';

/// Build an `<add>` document with one `<field>` per (field, value) pair.
///
/// ```
/// use expander_repository::solr::document::add_document;
/// use expander_shared::FlattenedDocument;
///
/// let mut doc = FlattenedDocument::new();
/// doc.push("name", "a<b");
/// assert_eq!(
///     add_document(&doc),
///     "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<add><doc><field name=\"name\">a&lt;b</field></doc></add>\n"
/// );
/// ```
pub fn add_document(document: &FlattenedDocument) -> String {
    let mut xml = String::with_capacity(128 + document.len() * 48);
    xml.push_str(XML_DECLARATION);
    xml.push_str(ADD_OPEN);
    for (field, value) in document.pairs() {
        xml.push_str(FIELD_OPEN);
        xml.push_str(&escape_xml(field));
        xml.push_str(FIELD_OPEN_END);
        xml.push_str(&escape_xml(value));
        xml.push_str(FIELD_CLOSE);
    }
    xml.push_str(ADD_CLOSE);
    xml
}

/// Build a `<delete>` document referencing only the id.
pub fn delete_document(id: &str) -> String {
    let mut xml = String::with_capacity(XML_DECLARATION.len() + 32 + id.len());
    xml.push_str(XML_DECLARATION);
    xml.push_str(DELETE_OPEN);
    xml.push_str(&escape_xml(id));
    xml.push_str(DELETE_CLOSE);
    xml
}

/// Escape text for use in XML content or a double-quoted attribute.
///
/// Markup characters become entities; characters that are not allowed in
/// XML 1.0 are replaced with U+FFFD.
pub fn escape_xml(text: &str) -> Cow<'_, str> {
    if !text.chars().any(needs_escape) {
        return Cow::Borrowed(text);
    }

    let mut escaped = String::with_capacity(text.len() + 16);
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            c if !is_xml_char(c) => escaped.push(INVALID_CHAR_REPLACEMENT),
            c => escaped.push(c),
        }
    }
    Cow::Owned(escaped)
}

fn needs_escape(c: char) -> bool {
    matches!(c, '&' | '<' | '>' | '"' | '\'') || !is_xml_char(c)
}

fn is_xml_char(c: char) -> bool {
    matches!(c, '\t' | '\n' | '\r' | '\u{20}'..='\u{D7FF}' | '\u{E000}'..='\u{FFFD}' | '\u{10000}'..='\u{10FFFF}')
}
