//! Document loading: file on disk → [`RawSegment`]s of plain text.
//!
//! The loader is chosen by file extension (case-insensitive):
//!
//! | Extension | Segments |
//! |-----------|----------|
//! | `.pdf` | one per page (form-feed separated), else one for the file |
//! | `.docx` | one for the document, paragraphs separated by blank lines |
//! | `.xlsx` | one per worksheet, rows on separate lines |
//! | `.md`, `.mdx`, `.txt` | one for the file, raw UTF-8 |
//!
//! Every segment carries the file's base name as its source, which is the
//! name shown in prompts and in `/sources`.

use std::io::Read;
use std::path::Path;

use orinda_core::models::RawSegment;
use orinda_core::OrindaError;
use quick_xml::events::Event;

/// Extensions accepted by [`load_document`], lowercase and without the dot.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["pdf", "docx", "xlsx", "md", "mdx", "txt"];

/// Maximum sheets to read from one workbook.
const XLSX_MAX_SHEETS: usize = 100;
/// Maximum cells to read per sheet.
const XLSX_MAX_CELLS_PER_SHEET: usize = 100_000;
/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    Docx,
    Xlsx,
    Markdown,
    Text,
}

impl DocumentFormat {
    /// Pick a format from the path's extension.
    pub fn from_path(path: &Path) -> Result<Self, OrindaError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "pdf" => Ok(Self::Pdf),
            "docx" => Ok(Self::Docx),
            "xlsx" => Ok(Self::Xlsx),
            "md" | "mdx" => Ok(Self::Markdown),
            "txt" => Ok(Self::Text),
            "" => Err(OrindaError::UnsupportedFormat(format!(
                "{} (no extension)",
                path.display()
            ))),
            other => Err(OrindaError::UnsupportedFormat(format!(
                ".{} (supported: {})",
                other,
                SUPPORTED_EXTENSIONS.join(", ")
            ))),
        }
    }
}

/// True when [`load_document`] would accept this path.
pub fn is_supported(path: &Path) -> bool {
    DocumentFormat::from_path(path).is_ok()
}

/// Display name used as `source_file` for every chunk of `path`.
pub fn source_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Load a document into text segments.
///
/// Blocking: reads the whole file and parses it in the calling thread.
/// Segments with no text after trimming are dropped, so an empty file
/// yields an empty vector.
///
/// # Errors
///
/// - [`OrindaError::UnsupportedFormat`] for an unknown extension.
/// - [`OrindaError::DocumentLoad`] when the file cannot be read or parsed.
pub fn load_document(path: &Path) -> Result<Vec<RawSegment>, OrindaError> {
    let format = DocumentFormat::from_path(path)?;
    let source = source_name(path);
    let load_err = |reason: String| OrindaError::DocumentLoad {
        file: source.clone(),
        reason,
    };

    let bytes = std::fs::read(path).map_err(|e| load_err(e.to_string()))?;

    let texts = match format {
        DocumentFormat::Pdf => extract_pdf(&bytes),
        DocumentFormat::Docx => extract_docx(&bytes).map(|t| vec![t]),
        DocumentFormat::Xlsx => extract_xlsx(&bytes),
        DocumentFormat::Markdown | DocumentFormat::Text => String::from_utf8(bytes)
            .map(|t| vec![t])
            .map_err(|e| format!("not valid UTF-8: {}", e)),
    }
    .map_err(load_err)?;

    let segments = texts
        .into_iter()
        .filter(|t| !t.trim().is_empty())
        .enumerate()
        .map(|(i, text)| RawSegment {
            text,
            source_file: source.clone(),
            segment_index: i,
        })
        .collect();
    Ok(segments)
}

fn extract_pdf(bytes: &[u8]) -> Result<Vec<String>, String> {
    let text = pdf_extract::extract_text_from_mem(bytes).map_err(|e| e.to_string())?;
    Ok(text.split('\u{c}').map(|p| p.to_string()).collect())
}

fn read_zip_entry_bounded(
    archive: &mut zip::ZipArchive<std::io::Cursor<&[u8]>>,
    name: &str,
) -> Result<Vec<u8>, String> {
    let entry = archive.by_name(name).map_err(|e| format!("{}: {}", name, e))?;
    let mut out = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut out)
        .map_err(|e| e.to_string())?;
    if out.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(format!(
            "ZIP entry {} exceeds size limit ({} bytes)",
            name, MAX_XML_ENTRY_BYTES
        ));
    }
    Ok(out)
}

fn open_archive(bytes: &[u8]) -> Result<zip::ZipArchive<std::io::Cursor<&[u8]>>, String> {
    zip::ZipArchive::new(std::io::Cursor::new(bytes)).map_err(|e| e.to_string())
}

fn extract_docx(bytes: &[u8]) -> Result<String, String> {
    let mut archive = open_archive(bytes)?;
    let xml = read_zip_entry_bounded(&mut archive, "word/document.xml")?;
    docx_paragraphs(&xml).map(|paras| paras.join("\n\n"))
}

/// Collect `w:t` text, one string per non-empty `w:p` paragraph.
fn docx_paragraphs(xml: &[u8]) -> Result<Vec<String>, String> {
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_text = false;
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => in_text = true,
            Ok(Event::Empty(e)) if e.local_name().as_ref() == b"tab" => current.push('\t'),
            Ok(Event::Empty(e)) if e.local_name().as_ref() == b"br" => current.push('\n'),
            Ok(Event::Text(te)) if in_text => {
                current.push_str(&te.unescape().map_err(|e| e.to_string())?);
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => {
                    if !current.trim().is_empty() {
                        paragraphs.push(current.trim().to_string());
                    }
                    current.clear();
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(e.to_string()),
            _ => {}
        }
        buf.clear();
    }
    if !current.trim().is_empty() {
        paragraphs.push(current.trim().to_string());
    }
    Ok(paragraphs)
}

fn extract_xlsx(bytes: &[u8]) -> Result<Vec<String>, String> {
    let mut archive = open_archive(bytes)?;
    let shared_strings = if archive.file_names().any(|n| n == "xl/sharedStrings.xml") {
        let xml = read_zip_entry_bounded(&mut archive, "xl/sharedStrings.xml")?;
        read_shared_strings(&xml)?
    } else {
        Vec::new()
    };

    let mut sheets = Vec::new();
    for name in worksheet_names(&archive).into_iter().take(XLSX_MAX_SHEETS) {
        let xml = read_zip_entry_bounded(&mut archive, &name)?;
        sheets.push(sheet_rows(&xml, &shared_strings)?);
    }
    Ok(sheets)
}

fn read_shared_strings(xml: &[u8]) -> Result<Vec<String>, String> {
    let mut strings = Vec::new();
    let mut current = String::new();
    let mut in_si = false;
    let mut in_t = false;
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"si" => {
                    in_si = true;
                    current.clear();
                }
                b"t" if in_si => in_t = true,
                _ => {}
            },
            Ok(Event::Text(te)) if in_t => {
                current.push_str(&te.unescape().map_err(|e| e.to_string())?);
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_t = false,
                b"si" => {
                    in_si = false;
                    strings.push(std::mem::take(&mut current));
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(e.to_string()),
            _ => {}
        }
        buf.clear();
    }
    Ok(strings)
}

fn worksheet_names(archive: &zip::ZipArchive<std::io::Cursor<&[u8]>>) -> Vec<String> {
    let mut names: Vec<String> = archive
        .file_names()
        .filter(|n| n.starts_with("xl/worksheets/sheet") && n.ends_with(".xml"))
        .map(|s| s.to_string())
        .collect();
    names.sort_by_key(|name| {
        name.trim_start_matches("xl/worksheets/sheet")
            .trim_end_matches(".xml")
            .parse::<u32>()
            .unwrap_or(u32::MAX)
    });
    names
}

/// Render a sheet as lines of space-separated cell values, one per row.
/// Shared strings are resolved; inline strings and numbers are kept as-is.
fn sheet_rows(xml: &[u8], shared_strings: &[String]) -> Result<String, String> {
    let mut rows: Vec<String> = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut in_value = false;
    let mut shared = false;
    let mut cell_count = 0usize;
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    loop {
        if cell_count >= XLSX_MAX_CELLS_PER_SHEET {
            break;
        }
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"c" => {
                    shared = e.attributes().flatten().any(|a| {
                        a.key.as_ref() == b"t" && a.value.as_ref() == b"s"
                    });
                }
                b"v" | b"t" => in_value = true,
                _ => {}
            },
            Ok(Event::Text(te)) if in_value => {
                let raw = te.unescape().map_err(|e| e.to_string())?;
                let value = raw.trim();
                let resolved = if value.is_empty() {
                    None
                } else if shared {
                    value
                        .parse::<usize>()
                        .ok()
                        .and_then(|i| shared_strings.get(i))
                        .cloned()
                } else {
                    Some(value.to_string())
                };
                if let Some(v) = resolved {
                    row.push(v);
                    cell_count += 1;
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"v" | b"t" => in_value = false,
                b"c" => shared = false,
                b"row" => {
                    if !row.is_empty() {
                        rows.push(row.join(" "));
                    }
                    row.clear();
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(e.to_string()),
            _ => {}
        }
        buf.clear();
    }
    if !row.is_empty() {
        rows.push(row.join(" "));
    }
    Ok(rows.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_is_chosen_case_insensitively() {
        assert_eq!(
            DocumentFormat::from_path(Path::new("Report.PDF")).unwrap(),
            DocumentFormat::Pdf
        );
        assert_eq!(
            DocumentFormat::from_path(Path::new("notes.mdx")).unwrap(),
            DocumentFormat::Markdown
        );
        assert!(matches!(
            DocumentFormat::from_path(Path::new("image.png")),
            Err(OrindaError::UnsupportedFormat(_))
        ));
        assert!(!is_supported(Path::new("Makefile")));
    }

    #[test]
    fn docx_paragraphs_are_separated() {
        let xml = br#"<w:document xmlns:w="x"><w:body>
            <w:p><w:r><w:t>Hello</w:t></w:r><w:r><w:t xml:space="preserve"> world</w:t></w:r></w:p>
            <w:p></w:p>
            <w:p><w:r><w:t>Second &amp; last</w:t></w:r></w:p>
        </w:body></w:document>"#;
        let paras = docx_paragraphs(xml).unwrap();
        assert_eq!(paras, vec!["Hello world", "Second & last"]);
    }

    #[test]
    fn sheet_rows_resolve_shared_strings() {
        let shared = vec!["name".to_string(), "Orinda".to_string()];
        let xml = br#"<worksheet><sheetData>
            <row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1"><v>42</v></c></row>
            <row r="2"><c r="A2" t="s"><v>1</v></c></row>
        </sheetData></worksheet>"#;
        assert_eq!(sheet_rows(xml, &shared).unwrap(), "name 42\nOrinda");
    }

    #[test]
    fn corrupt_archive_is_a_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.docx");
        std::fs::write(&path, b"not a zip").unwrap();
        let err = load_document(&path).unwrap_err();
        assert!(matches!(err, OrindaError::DocumentLoad { ref file, .. } if file == "broken.docx"));
    }
}
