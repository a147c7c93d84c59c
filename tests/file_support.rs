//! Loader coverage for every supported format, using documents built in
//! memory.

mod common;

use std::io::Write;
use std::path::{Path, PathBuf};

use orinda::loader::load_document;
use orinda_core::OrindaError;
use tempfile::TempDir;

/// Minimal valid PDF containing the text "orinda pdf words".
/// Builds body then xref with correct byte offsets so pdf-extract can parse it.
fn minimal_pdf_with_phrase() -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");
    let o1 = out.len();
    out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");
    let o2 = out.len();
    out.extend_from_slice(b"2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj\n");
    let o3 = out.len();
    out.extend_from_slice(b"3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >> endobj\n");
    let o4 = out.len();
    out.extend_from_slice(b"4 0 obj << /Length 48 >> stream\nBT /F1 12 Tf 100 700 Td (orinda pdf words) Tj ET\nendstream endobj\n");
    let o5 = out.len();
    out.extend_from_slice(
        b"5 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj\n",
    );
    let xref_start = out.len();
    out.extend_from_slice(b"xref\n0 6\n");
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    for offset in [o1, o2, o3, o4, o5] {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(b"trailer << /Size 6 /Root 1 0 R >>\nstartxref\n");
    out.extend_from_slice(format!("{}\n", xref_start).as_bytes());
    out.extend_from_slice(b"%%EOF\n");
    out
}

fn zip_with_entries(entries: &[(&str, String)]) -> Vec<u8> {
    let mut buf = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
        for (name, body) in entries {
            zip.start_file(*name, zip::write::SimpleFileOptions::default())
                .unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }
    buf
}

fn minimal_docx(paragraphs: &[&str]) -> Vec<u8> {
    let body: String = paragraphs
        .iter()
        .map(|p| format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", p))
        .collect();
    zip_with_entries(&[(
        "word/document.xml",
        format!(
            "<?xml version=\"1.0\"?><w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body>{}</w:body></w:document>",
            body
        ),
    )])
}

fn minimal_xlsx() -> Vec<u8> {
    let sheet = |rows: &str| {
        format!(
            "<?xml version=\"1.0\"?><worksheet xmlns=\"http://schemas.openxmlformats.org/spreadsheetml/2006/main\"><sheetData>{}</sheetData></worksheet>",
            rows
        )
    };
    zip_with_entries(&[
        (
            "xl/sharedStrings.xml",
            "<?xml version=\"1.0\"?><sst><si><t>Region</t></si><si><t>North</t></si><si><t>Budget</t></si></sst>"
                .to_string(),
        ),
        (
            "xl/worksheets/sheet1.xml",
            sheet("<row r=\"1\"><c r=\"A1\" t=\"s\"><v>0</v></c></row><row r=\"2\"><c r=\"A2\" t=\"s\"><v>1</v></c><c r=\"B2\"><v>12</v></c></row>"),
        ),
        (
            "xl/worksheets/sheet2.xml",
            sheet("<row r=\"1\"><c r=\"A1\" t=\"s\"><v>2</v></c><c r=\"B1\"><v>5000</v></c></row>"),
        ),
    ])
}

fn write_bytes(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}

#[test]
fn pdf_text_is_extracted() {
    let tmp = TempDir::new().unwrap();
    let path = write_bytes(tmp.path(), "brochure.pdf", &minimal_pdf_with_phrase());

    let segments = load_document(&path).unwrap();
    let text: String = segments.iter().map(|s| s.text.as_str()).collect();
    assert!(text.contains("orinda pdf words"), "got: {:?}", text);
    assert!(segments.iter().all(|s| s.source_file == "brochure.pdf"));
}

#[test]
fn docx_is_one_segment_with_paragraph_breaks() {
    let tmp = TempDir::new().unwrap();
    let path = write_bytes(
        tmp.path(),
        "Policy.DOCX",
        &minimal_docx(&["Refunds within 30 days.", "Keep your receipt."]),
    );

    let segments = load_document(&path).unwrap();
    assert_eq!(segments.len(), 1);
    assert_eq!(
        segments[0].text,
        "Refunds within 30 days.\n\nKeep your receipt."
    );
    assert_eq!(segments[0].source_file, "Policy.DOCX");
}

#[test]
fn xlsx_is_one_segment_per_sheet() {
    let tmp = TempDir::new().unwrap();
    let path = write_bytes(tmp.path(), "budget.xlsx", &minimal_xlsx());

    let segments = load_document(&path).unwrap();
    assert_eq!(segments.len(), 2);
    assert_eq!(segments[0].text, "Region\nNorth 12");
    assert_eq!(segments[1].text, "Budget 5000");
    assert_eq!(segments[1].segment_index, 1);
}

#[test]
fn markdown_and_text_are_read_verbatim() {
    let tmp = TempDir::new().unwrap();
    let md = common::write_file(tmp.path(), "guide.mdx", "# Guide\n\nStep one.");
    let txt = common::write_file(tmp.path(), "empty.txt", "  \n");

    let segments = load_document(&md).unwrap();
    assert_eq!(segments.len(), 1);
    assert_eq!(segments[0].text, "# Guide\n\nStep one.");
    assert!(load_document(&txt).unwrap().is_empty());
}

#[test]
fn failures_are_typed() {
    let tmp = TempDir::new().unwrap();
    let png = write_bytes(tmp.path(), "photo.png", b"\x89PNG");
    let bad_pdf = write_bytes(tmp.path(), "broken.pdf", b"not a pdf");
    let bad_utf8 = write_bytes(tmp.path(), "latin1.txt", &[0xff, 0xfe, 0x41]);

    assert!(matches!(
        load_document(&png),
        Err(OrindaError::UnsupportedFormat(_))
    ));
    assert!(matches!(
        load_document(&bad_pdf),
        Err(OrindaError::DocumentLoad { .. })
    ));
    assert!(matches!(
        load_document(&bad_utf8),
        Err(OrindaError::DocumentLoad { .. })
    ));
    assert!(matches!(
        load_document(&tmp.path().join("missing.md")),
        Err(OrindaError::DocumentLoad { .. })
    ));
}
