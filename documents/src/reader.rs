//! Format readers that split a document into ordered raw units.
//!
//! A unit is a PDF page, a form-feed separated page of a text file, or a
//! heading-delimited section of a DOCX file. Units keep their 1-indexed
//! position even when earlier units turn out to be empty.

use std::io::Read;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::chunk::FileType;
use crate::error::{DocumentError, Result};

/// Origin element for ordinary body text.
pub const ELEMENT_TEXT: &str = "Text";

/// Origin element for a heading that opens a section.
pub const ELEMENT_TITLE: &str = "Title";

/// Page separator in plain-text documents.
const FORM_FEED: char = '\u{0C}';

/// One extractable unit of a document.
#[derive(Debug, Clone, PartialEq)]
pub struct RawUnit {
    /// 1-indexed position within the document.
    pub number: usize,

    /// Raw text as extracted.
    pub text: String,

    /// Kinds of source elements the text came from.
    pub origin_elements: Vec<String>,
}

impl RawUnit {
    fn text(number: usize, text: String) -> Self {
        Self {
            number,
            text,
            origin_elements: vec![ELEMENT_TEXT.to_string()],
        }
    }
}

/// Read `bytes` (the contents of `path`) as `file_type`.
pub fn read_units(path: &Path, file_type: FileType, bytes: &[u8]) -> Result<Vec<RawUnit>> {
    match file_type {
        FileType::Pdf => read_pdf(path, bytes),
        FileType::Txt => Ok(read_text(bytes)),
        FileType::Docx => read_docx(path, bytes),
    }
}

/// Split a plain-text file into form-feed delimited pages.
pub fn read_text(bytes: &[u8]) -> Vec<RawUnit> {
    String::from_utf8_lossy(bytes)
        .split(FORM_FEED)
        .enumerate()
        .map(|(i, page)| RawUnit::text(i + 1, page.to_string()))
        .collect()
}

/// Extract text page by page from a PDF.
pub fn read_pdf(path: &Path, bytes: &[u8]) -> Result<Vec<RawUnit>> {
    let document = lopdf::Document::load_mem(bytes).map_err(|e| DocumentError::Pdf {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let pages = document.get_pages();
    debug!("{} has {} pages", path.display(), pages.len());

    let mut units = Vec::with_capacity(pages.len());
    for page_number in pages.keys() {
        match document.extract_text(&[*page_number]) {
            Ok(text) => units.push(RawUnit::text(*page_number as usize, text)),
            Err(e) => warn!(
                "Skipping page {page_number} of {}: {e}",
                path.display()
            ),
        }
    }
    Ok(units)
}

#[allow(clippy::expect_used)]
static TEXT_BOX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<w:txbxContent>.*?</w:txbxContent>").expect("valid text box regex")
});

#[allow(clippy::expect_used)]
static EMPTY_PARAGRAPH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<w:p(?:\s[^>]*)?/>").expect("valid paragraph regex"));

#[allow(clippy::expect_used)]
static PARAGRAPH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<w:p(?:\s[^>]*)?>(.*?)</w:p>").expect("valid paragraph regex")
});

#[allow(clippy::expect_used)]
static PARAGRAPH_STYLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<w:pStyle\s+w:val="([^"]*)""#).expect("valid style regex")
});

#[allow(clippy::expect_used)]
static PARAGRAPH_PROPERTIES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<w:pPr>.*?</w:pPr>").expect("valid properties regex"));

#[allow(clippy::expect_used)]
static RUN_CONTENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<w:t(?:\s[^>]*)?>([^<]*)</w:t>|<w:(tab|br|cr)(?:\s[^>]*)?/>")
        .expect("valid run regex")
});

/// A paragraph of a DOCX body.
#[derive(Debug, Clone, PartialEq)]
struct Paragraph {
    text: String,
    is_heading: bool,
}

/// Split a DOCX file into sections, each opened by a heading-styled paragraph.
///
/// Text before the first heading forms its own section.
pub fn read_docx(path: &Path, bytes: &[u8]) -> Result<Vec<RawUnit>> {
    let docx_err = |reason: String| DocumentError::Docx {
        path: path.to_path_buf(),
        reason,
    };

    let mut archive =
        zip::ZipArchive::new(std::io::Cursor::new(bytes)).map_err(|e| docx_err(e.to_string()))?;
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| docx_err(e.to_string()))?
        .read_to_string(&mut xml)?;

    let paragraphs = parse_paragraphs(&xml);
    debug!("{} has {} paragraphs", path.display(), paragraphs.len());
    Ok(group_sections(paragraphs))
}

/// Text boxes nest whole paragraphs inside a body paragraph and are skipped.
fn parse_paragraphs(xml: &str) -> Vec<Paragraph> {
    let xml = TEXT_BOX.replace_all(xml, "");
    let xml = EMPTY_PARAGRAPH.replace_all(&xml, "");

    PARAGRAPH
        .captures_iter(&xml)
        .map(|caps| {
            let body = caps.get(1).map_or("", |m| m.as_str());
            let is_heading = PARAGRAPH_STYLE
                .captures(body)
                .and_then(|c| c.get(1))
                .is_some_and(|style| is_heading_style(style.as_str()));

            let runs = PARAGRAPH_PROPERTIES.replace(body, "");
            let mut text = String::new();
            for run in RUN_CONTENT.captures_iter(&runs) {
                if let Some(t) = run.get(1) {
                    text.push_str(&unescape_xml(t.as_str()));
                } else if let Some(kind) = run.get(2) {
                    text.push(if kind.as_str() == "tab" { '\t' } else { '\n' });
                }
            }

            Paragraph { text, is_heading }
        })
        .collect()
}

fn is_heading_style(style: &str) -> bool {
    let style = style.to_ascii_lowercase();
    style.starts_with("heading") || style == "title"
}

fn group_sections(paragraphs: Vec<Paragraph>) -> Vec<RawUnit> {
    let mut units = Vec::new();
    let mut lines: Vec<String> = Vec::new();
    let mut opened_by_heading = false;

    let mut flush = |lines: &mut Vec<String>, opened_by_heading: bool| {
        if lines.is_empty() {
            return;
        }
        let mut origin_elements = Vec::new();
        if opened_by_heading {
            origin_elements.push(ELEMENT_TITLE.to_string());
        }
        origin_elements.push(ELEMENT_TEXT.to_string());
        let number = units.len() + 1;
        units.push(RawUnit {
            number,
            text: lines.join("\n"),
            origin_elements,
        });
        lines.clear();
    };

    for paragraph in paragraphs {
        if paragraph.is_heading && paragraph.text.trim().is_empty() {
            continue;
        }
        if paragraph.is_heading {
            flush(&mut lines, opened_by_heading);
            opened_by_heading = true;
        }
        lines.push(paragraph.text);
    }
    flush(&mut lines, opened_by_heading);

    units
}

/// Decode predefined entities and numeric character references.
///
/// Anything that does not decode is kept as written.
fn unescape_xml(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let decoded = tail
            .find(';')
            .and_then(|end| decode_entity(&tail[1..end]).map(|c| (c, end)));
        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &tail[end + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(name: &str) -> Option<char> {
    match name {
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "amp" => Some('&'),
        _ => {
            let reference = name.strip_prefix('#')?;
            let code = match reference.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => reference.parse().ok()?,
            };
            char::from_u32(code)
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::io::Write;

    use super::*;
    use pretty_assertions::assert_eq;

    /// Build a minimal DOCX archive around `body` (the inside of `<w:body>`).
    pub(crate) fn docx_bytes(body: &str) -> Vec<u8> {
        let xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body}</w:body></w:document>"#
        );
        let mut cursor = std::io::Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut cursor);
            writer
                .start_file("word/document.xml", zip::write::FileOptions::default())
                .unwrap();
            writer.write_all(xml.as_bytes()).unwrap();
            writer.finish().unwrap();
        }
        cursor.into_inner()
    }

    pub(crate) fn heading(text: &str) -> String {
        format!(
            r#"<w:p w:rsidR="00A1"><w:pPr><w:pStyle w:val="Heading1"/></w:pPr><w:r><w:t>{text}</w:t></w:r></w:p>"#
        )
    }

    pub(crate) fn paragraph(text: &str) -> String {
        format!(r#"<w:p><w:r><w:t xml:space="preserve">{text}</w:t></w:r></w:p>"#)
    }

    /// Build a PDF with one page per entry; an empty entry is a blank page.
    pub(crate) fn pdf_bytes(pages: &[&str]) -> Vec<u8> {
        use lopdf::content::{Content, Operation};
        use lopdf::{Document, Object, Stream, dictionary};

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids: Vec<Object> = Vec::new();
        for text in pages {
            let operations = if text.is_empty() {
                Vec::new()
            } else {
                vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 12.into()]),
                    Operation::new("Td", vec![72.into(), 720.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*text)]),
                    Operation::new("ET", vec![]),
                ]
            };
            let content = Content { operations };
            let content_id =
                doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }

    #[test]
    fn test_read_text_splits_on_form_feed() {
        let units = read_text(b"Page one text.\x0cPage two text.");
        assert_eq!(units.len(), 2);
        assert_eq!(units[0].number, 1);
        assert_eq!(units[1].text, "Page two text.");
        assert_eq!(units[1].origin_elements, vec![ELEMENT_TEXT.to_string()]);
    }

    #[test]
    fn test_read_text_single_page() {
        let units = read_text(b"Remote work policy allows three days per week.");
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].number, 1);
    }

    #[test]
    fn test_read_docx_sections() {
        let body = [
            paragraph("Welcome to the handbook."),
            heading("Remote Work"),
            paragraph("Three days per week &amp; core hours apply."),
            "<w:p/>".to_string(),
            heading("Parental Leave"),
            paragraph("Sixteen weeks."),
        ]
        .concat();

        let units = read_docx(Path::new("handbook.docx"), &docx_bytes(&body)).unwrap();

        assert_eq!(units.len(), 3);
        assert_eq!(units[0].text, "Welcome to the handbook.");
        assert_eq!(units[0].origin_elements, vec![ELEMENT_TEXT.to_string()]);
        assert_eq!(
            units[1].text,
            "Remote Work\nThree days per week & core hours apply."
        );
        assert_eq!(
            units[1].origin_elements,
            vec![ELEMENT_TITLE.to_string(), ELEMENT_TEXT.to_string()]
        );
        assert_eq!(units[2].number, 3);
        assert_eq!(units[2].text, "Parental Leave\nSixteen weeks.");
    }

    #[test]
    fn test_read_docx_rejects_non_zip() {
        let err = read_docx(Path::new("broken.docx"), b"plain bytes").unwrap_err();
        assert!(matches!(err, DocumentError::Docx { .. }));
    }

    #[test]
    fn test_read_pdf_rejects_garbage() {
        let err = read_pdf(Path::new("broken.pdf"), b"%PDF-nonsense").unwrap_err();
        assert!(matches!(err, DocumentError::Pdf { .. }));
    }

    #[test]
    fn test_read_pdf_numbers_every_page() {
        let bytes = pdf_bytes(&["Remote work policy.", "", "Parental leave."]);

        let units = read_pdf(Path::new("handbook.pdf"), &bytes).unwrap();

        let numbers: Vec<usize> = units.iter().map(|u| u.number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert!(units[0].text.contains("Remote work policy."));
        assert!(units[1].text.trim().is_empty());
        assert!(units[2].text.contains("Parental leave."));
        assert_eq!(units[2].origin_elements, vec![ELEMENT_TEXT.to_string()]);
    }

    #[test]
    fn test_read_docx_skips_text_boxes() {
        let text_box = format!(
            r#"<w:p><w:r><w:t>Before box.</w:t></w:r><w:r><w:drawing><wps:txbx><w:txbxContent>{}</w:txbxContent></wps:txbx></w:drawing></w:r><w:r><w:t> After box.</w:t></w:r></w:p>"#,
            paragraph("Sidebar note.")
        );
        let body = [heading("Remote Work"), text_box, paragraph("Three days per week.")].concat();

        let units = read_docx(Path::new("handbook.docx"), &docx_bytes(&body)).unwrap();

        assert_eq!(units.len(), 1);
        assert_eq!(
            units[0].text,
            "Remote Work\nBefore box. After box.\nThree days per week."
        );
    }

    #[test]
    fn test_unescape_xml() {
        assert_eq!(unescape_xml("a &lt;b&gt; &amp;amp;"), "a <b> &amp;");
    }

    #[test]
    fn test_unescape_numeric_references() {
        assert_eq!(unescape_xml("employee&#8217;s"), "employee\u{2019}s");
        assert_eq!(unescape_xml("&#x2014;&#X41;"), "\u{2014}A");
        assert_eq!(unescape_xml("R&D; &#xZZ; & done"), "R&D; &#xZZ; & done");
    }
}
