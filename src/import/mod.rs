//! XML resources referenced from route files: dynamic backgrounds and
//! dynamic lighting sets.
//!
//! Both formats are a flat list of record elements whose children are simple
//! text fields, so they share one reader ([`read_records`]) and differ only in
//! how each record is interpreted.

pub mod background;
pub mod lighting;

use std::fmt;

use indexmap::IndexMap;
use quick_xml::events::Event;
use quick_xml::Reader;

// ── Error type (shared across all importers) ────────────────────────

#[derive(Debug)]
pub enum ImportError {
    Xml(quick_xml::Error),
    Parse(String),
}

impl fmt::Display for ImportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportError::Xml(e) => write!(f, "XML error: {e}"),
            ImportError::Parse(msg) => write!(f, "Parse error: {msg}"),
        }
    }
}

impl std::error::Error for ImportError {}

impl From<quick_xml::Error> for ImportError {
    fn from(e: quick_xml::Error) -> Self {
        ImportError::Xml(e)
    }
}

// ── Record reader ───────────────────────────────────────────────────

/// Child element text of one record, keyed by lower-cased local name.
pub type Record = IndexMap<String, String>;

fn strip_ns(name: &str) -> &str {
    name.rsplit(':').next().unwrap_or(name)
}

/// Collect every element named `record` (case-insensitive, at any depth) as
/// a map of its direct children's text.
pub fn read_records(xml: &str, record: &str) -> Result<Vec<Record>, ImportError> {
    let mut reader = Reader::from_reader(xml.as_bytes());
    reader.config_mut().trim_text(true);

    let mut buf = Vec::with_capacity(1024);
    let mut records = Vec::new();
    let mut current: Option<Record> = None;
    let mut field: Option<String> = None;
    let mut saw_root = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Eof) => break,
            Ok(Event::Start(ref e)) => {
                saw_root = true;
                let tag = String::from_utf8_lossy(e.name().as_ref()).to_string();
                let local = strip_ns(&tag).to_ascii_lowercase();
                if local == record {
                    current = Some(Record::new());
                } else if current.is_some() {
                    field = Some(local);
                }
            }
            Ok(Event::Empty(ref e)) => {
                saw_root = true;
                let tag = String::from_utf8_lossy(e.name().as_ref()).to_string();
                let local = strip_ns(&tag).to_ascii_lowercase();
                if local == record {
                    records.push(Record::new());
                } else if let Some(rec) = current.as_mut() {
                    rec.insert(local, String::new());
                }
            }
            Ok(Event::Text(ref e)) => {
                let text = e.unescape().unwrap_or_default().trim().to_string();
                if let (Some(rec), Some(name)) = (current.as_mut(), field.as_ref()) {
                    rec.insert(name.clone(), text);
                }
            }
            Ok(Event::End(ref e)) => {
                let tag = String::from_utf8_lossy(e.name().as_ref()).to_string();
                let local = strip_ns(&tag).to_ascii_lowercase();
                if local == record {
                    if let Some(rec) = current.take() {
                        records.push(rec);
                    }
                }
                field = None;
            }
            Err(e) => return Err(ImportError::Xml(e)),
            _ => {}
        }
        buf.clear();
    }

    if !saw_root {
        return Err(ImportError::Parse("document has no elements".to_string()));
    }
    Ok(records)
}

/// Split `"r, g, b"` into three bytes.
pub(crate) fn parse_rgb(text: &str) -> Option<[u8; 3]> {
    let parts: Vec<u8> = text
        .split([',', ';'])
        .map(crate::dsl::numeric::parse_byte_legacy)
        .collect::<Option<Vec<u8>>>()?;
    match parts.as_slice() {
        [r, g, b] => Some([*r, *g, *b]),
        _ => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn reads_records_with_fields() {
        let xml = r"<?xml version='1.0'?>
            <openBVE>
              <Background><Time>08.00</Time><Texture>day.png</Texture></Background>
              <background><texture>night.png</texture><Mode/></background>
            </openBVE>";
        let records = read_records(xml, "background").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get("time").map(String::as_str), Some("08.00"));
        assert_eq!(records[1].get("texture").map(String::as_str), Some("night.png"));
        assert_eq!(records[1].get("mode").map(String::as_str), Some(""));
    }

    #[test]
    fn namespaced_tags_are_stripped() {
        let xml = "<a:Root xmlns:a='x'><a:Brightness><a:Time>6</a:Time></a:Brightness></a:Root>";
        let records = read_records(xml, "brightness").unwrap();
        assert_eq!(records[0].get("time").map(String::as_str), Some("6"));
    }

    #[test]
    fn empty_document_is_an_error() {
        assert!(matches!(read_records("", "background"), Err(ImportError::Parse(_))));
    }

    #[test]
    fn malformed_xml_is_an_error() {
        assert!(read_records("<a><b></a>", "b").is_err());
    }

    #[test]
    fn rgb_parsing() {
        assert_eq!(parse_rgb("160, 170,180"), Some([160, 170, 180]));
        assert_eq!(parse_rgb("1,2"), None);
        assert_eq!(parse_rgb("1,2,300"), None);
    }
}
