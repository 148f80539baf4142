//! Passages from GROBID TEI markup.
//!
//! Only `TEI/text//body` is read, so the header, front matter and the
//! bibliography in `back` never leak into passages. Text sitting directly
//! inside a `<ref type="bibr">` (a citation marker like `[12]`) is dropped;
//! figure, table and formula references are kept.

use itertools::Itertools;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::unit::{Provenance, TextUnit};

pub const BODY_SECTION: &str = "<body>";
pub const ABSTRACT_SECTION: &str = "<abstract>";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Passage {
    pub text: String,
    pub section: String,
    pub sub_section: String,
    pub passage_id: String,
    pub coordinates: String,
}

impl Passage {
    pub fn into_unit(self) -> TextUnit {
        TextUnit::with_provenance(
            self.text,
            Provenance {
                section: self.section,
                sub_section: self.sub_section,
                id: self.passage_id,
                coordinates: self.coordinates,
            },
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassageOptions {
    /// `<p>` units when true, `<s>` units otherwise.
    pub use_paragraphs: bool,
    /// Copy the unit's `coords` attribute into the passage.
    pub capture_coordinates: bool,
}

impl Default for PassageOptions {
    fn default() -> Self {
        PassageOptions {
            use_paragraphs: true,
            capture_coordinates: false,
        }
    }
}

impl PassageOptions {
    fn unit_tag(&self) -> &'static str {
        if self.use_paragraphs {
            "p"
        } else {
            "s"
        }
    }

    fn sub_section(&self) -> &'static str {
        if self.use_paragraphs {
            "<paragraph>"
        } else {
            "<sentence>"
        }
    }
}

enum Node<'a> {
    Open(Element),
    Leaf(Element),
    Text(std::borrow::Cow<'a, str>),
    Close,
}

struct Element {
    name: String,
    citation: bool,
    coords: Option<String>,
}

impl Element {
    fn from_start(e: &BytesStart<'_>) -> Result<Self> {
        let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
        let citation = name == "ref" && attribute(e, "type")?.as_deref() == Some("bibr");
        let coords = attribute(e, "coords")?;
        Ok(Element {
            name,
            citation,
            coords,
        })
    }
}

fn attribute(e: &BytesStart<'_>, key: &str) -> Result<Option<String>> {
    let attr = e
        .try_get_attribute(key)
        .map_err(|err| Error::extraction(format!("bad attribute in TEI: {}", err)))?;
    match attr {
        Some(a) => {
            let value = a
                .unescape_value()
                .map_err(|err| Error::extraction(format!("bad attribute in TEI: {}", err)))?;
            Ok(Some(value.into_owned()))
        }
        None => Ok(None),
    }
}

/// Feed every structural event of the document to `visit`.
fn walk<F>(tei: &str, mut visit: F) -> Result<()>
where
    F: FnMut(Node<'_>) -> Result<()>,
{
    let mut reader = Reader::from_str(tei);
    let mut buf = Vec::new();
    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| Error::extraction(format!("malformed TEI at byte {}: {}", reader.buffer_position(), e)))?;
        match event {
            Event::Start(e) => visit(Node::Open(Element::from_start(&e)?))?,
            Event::Empty(e) => visit(Node::Leaf(Element::from_start(&e)?))?,
            Event::Text(e) => {
                let text = e
                    .unescape()
                    .map_err(|err| Error::extraction(format!("bad text in TEI: {}", err)))?;
                visit(Node::Text(text))?
            }
            Event::CData(e) => {
                let raw = String::from_utf8_lossy(&e.into_inner()).into_owned();
                visit(Node::Text(raw.into()))?
            }
            Event::End(_) => visit(Node::Close)?,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(())
}

/// True when the open-element path is `TEI/text/.../body/...`.
fn in_body(path: &[String]) -> bool {
    path.len() >= 3 && path[0] == "TEI" && path[1] == "text" && path[2..].iter().any(|n| n == "body")
}

struct OpenUnit {
    depth: usize,
    text: String,
    coords: String,
}

/// Extract body passages in document order. `passage_id` is the zero-based
/// position in the returned list. A unit nested inside another unit is
/// folded into the outer one.
pub fn extract_passages(tei: &str, options: PassageOptions) -> Result<Vec<Passage>> {
    let unit_tag = options.unit_tag();
    let mut path: Vec<String> = Vec::new();
    let mut citation: Vec<bool> = Vec::new();
    let mut open: Option<OpenUnit> = None;
    let mut passages = Vec::new();

    let finish = |text: String, coords: String, passages: &mut Vec<Passage>| {
        let passage_id = passages.len().to_string();
        passages.push(Passage {
            text,
            section: BODY_SECTION.to_string(),
            sub_section: options.sub_section().to_string(),
            passage_id,
            coordinates: if options.capture_coordinates {
                coords
            } else {
                String::new()
            },
        });
    };

    walk(tei, |node| {
        match node {
            Node::Open(el) => {
                let starts_unit = open.is_none() && el.name == unit_tag && in_body(&path);
                path.push(el.name);
                citation.push(el.citation);
                if starts_unit {
                    open = Some(OpenUnit {
                        depth: path.len(),
                        text: String::new(),
                        coords: el.coords.unwrap_or_default(),
                    });
                }
            }
            Node::Leaf(el) => {
                if open.is_none() && el.name == unit_tag && in_body(&path) {
                    finish(String::new(), el.coords.unwrap_or_default(), &mut passages);
                }
            }
            Node::Text(text) => {
                if let Some(unit) = open.as_mut() {
                    if !citation.last().copied().unwrap_or(false) {
                        unit.text.push_str(&text);
                    }
                }
            }
            Node::Close => {
                if open.as_ref().is_some_and(|u| u.depth == path.len()) {
                    if let Some(unit) = open.take() {
                        finish(unit.text, unit.coords, &mut passages);
                    }
                }
                path.pop();
                citation.pop();
            }
        }
        Ok(())
    })?;

    Ok(passages)
}

/// Text of the header abstract, one space between paragraphs. `None` when
/// the document has no abstract or it is blank.
pub fn extract_abstract(tei: &str) -> Result<Option<String>> {
    let mut path: Vec<String> = Vec::new();
    let mut pieces: Vec<String> = Vec::new();
    let mut current = String::new();

    let inside = |path: &[String]| {
        path.len() >= 2 && path[0] == "TEI" && path[1] == "teiHeader" && path.iter().any(|n| n == "abstract")
    };

    walk(tei, |node| {
        match node {
            Node::Open(el) => path.push(el.name),
            Node::Leaf(_) => {}
            Node::Text(text) => {
                if inside(&path) {
                    current.push_str(&text);
                }
            }
            Node::Close => {
                let closing = path.last().map(String::as_str);
                if inside(&path) && matches!(closing, Some("p") | Some("abstract")) {
                    let piece = current.trim();
                    if !piece.is_empty() {
                        pieces.push(piece.to_string());
                    }
                    current.clear();
                }
                path.pop();
            }
        }
        Ok(())
    })?;

    let joined = pieces.iter().join(" ");
    Ok(if joined.is_empty() { None } else { Some(joined) })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(name: &str) -> String {
        std::fs::read_to_string(format!("tests/fixtures/{}.tei.xml", name)).unwrap()
    }

    fn wrap_body(body: &str) -> String {
        format!(
            "<TEI xmlns=\"http://www.tei-c.org/ns/1.0\"><teiHeader/><text><body>{}</body></text></TEI>",
            body
        )
    }

    #[test]
    fn citation_markers_are_dropped() {
        let tei = wrap_body(r##"<div><p>Result: <ref type="bibr" target="#b12">[12]</ref> confirmed.</p></div>"##);
        let passages = extract_passages(&tei, PassageOptions::default()).unwrap();
        assert_eq!(passages.len(), 1);
        assert_eq!(passages[0].text, "Result:  confirmed.");
        assert_eq!(passages[0].section, "<body>");
        assert_eq!(passages[0].sub_section, "<paragraph>");
        assert_eq!(passages[0].passage_id, "0");
        assert_eq!(passages[0].coordinates, "");
    }

    #[test]
    fn figure_references_are_kept() {
        let tei = wrap_body(r##"<p>See <ref type="figure" target="#fig_0">Figure 1</ref> and <ref type="table">Table 2</ref>.</p>"##);
        let passages = extract_passages(&tei, PassageOptions::default()).unwrap();
        assert_eq!(passages[0].text, "See Figure 1 and Table 2.");
    }

    #[test]
    fn text_nested_below_a_citation_is_kept() {
        let tei = wrap_body(r#"<p>A<ref type="bibr">[<hi>3</hi>]</ref>B</p>"#);
        let passages = extract_passages(&tei, PassageOptions::default()).unwrap();
        assert_eq!(passages[0].text, "A3B");
    }

    #[test]
    fn entities_are_unescaped() {
        let tei = wrap_body("<p>x &lt; y &amp; z</p>");
        let passages = extract_passages(&tei, PassageOptions::default()).unwrap();
        assert_eq!(passages[0].text, "x < y & z");
    }

    #[test]
    fn fixture_paragraphs_skip_header_and_back() {
        let passages = extract_passages(&fixture("paper"), PassageOptions::default()).unwrap();
        assert_eq!(passages.len(), 3);
        let ids: Vec<&str> = passages.iter().map(|p| p.passage_id.as_str()).collect();
        assert_eq!(ids, vec!["0", "1", "2"]);
        assert!(passages[0].text.starts_with("Training large language models"));
        assert!(!passages[0].text.contains("[1]"));
        assert!(passages.iter().all(|p| !p.text.contains("Adam: A method")));
        assert!(passages.iter().all(|p| !p.text.contains("We propose GaLore")));
    }

    #[test]
    fn fixture_sentences() {
        let options = PassageOptions {
            use_paragraphs: false,
            capture_coordinates: false,
        };
        let passages = extract_passages(&fixture("paper"), options).unwrap();
        assert_eq!(passages.len(), 4);
        assert_eq!(passages[0].sub_section, "<sentence>");
        assert_eq!(passages[3].passage_id, "3");
    }

    #[test]
    fn coordinates_only_when_enabled() {
        let tei = wrap_body(r#"<p coords="1,72.0,100.5,450.2,9.8">Positioned.</p><p>Plain.</p>"#);
        let off = extract_passages(&tei, PassageOptions::default()).unwrap();
        assert_eq!(off[0].coordinates, "");

        let on = extract_passages(
            &tei,
            PassageOptions {
                use_paragraphs: true,
                capture_coordinates: true,
            },
        )
        .unwrap();
        assert_eq!(on[0].coordinates, "1,72.0,100.5,450.2,9.8");
        assert_eq!(on[1].coordinates, "");
    }

    #[test]
    fn empty_paragraph_keeps_its_position() {
        let tei = wrap_body("<p>one</p><p/><p>three</p>");
        let passages = extract_passages(&tei, PassageOptions::default()).unwrap();
        assert_eq!(passages.len(), 3);
        assert_eq!(passages[1].text, "");
        assert_eq!(passages[2].passage_id, "2");
    }

    #[test]
    fn malformed_markup_is_an_extraction_failure() {
        let err = extract_passages("<TEI><text><body><p>oops</body></text></TEI>", PassageOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::Extraction(_)));
    }

    #[test]
    fn abstract_from_header() {
        let text = extract_abstract(&fixture("paper")).unwrap().unwrap();
        assert!(text.starts_with("We propose GaLore"));
        assert!(text.ends_with("memory footprint."));
        assert!(!text.contains('\n'));
    }

    #[test]
    fn missing_abstract() {
        assert_eq!(extract_abstract(&wrap_body("<p>body</p>")).unwrap(), None);
    }

    #[test]
    fn passage_becomes_unit() {
        let tei = wrap_body("<p>hello</p>");
        let unit = extract_passages(&tei, PassageOptions::default())
            .unwrap()
            .remove(0)
            .into_unit();
        assert_eq!(unit.content, "hello");
        assert_eq!(unit.label(), "0");
    }
}
