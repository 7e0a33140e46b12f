use crate::config::ServiceConfig;
use crate::error::{StudyError, StudyResult};
use anyhow::Context as _;
use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference};
use std::io::BufWriter;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN: f32 = 15.0;
const BODY_SIZE: f32 = 11.0;
const TITLE_SIZE: f32 = 18.0;
const PT_TO_MM: f32 = 0.3528;
/// Rough Helvetica advance width as a fraction of the font size.
const AVG_GLYPH_WIDTH: f32 = 0.5;
/// Stand-in for characters the builtin fonts cannot encode.
const REPLACEMENT: char = '?';

#[derive(Debug, Clone, PartialEq)]
struct Line {
    text: String,
    size: f32,
    bold: bool,
}

/// Renders study document text into an A4 PDF.
///
/// With an embedded TrueType font every character the font covers is kept.
/// The builtin Helvetica only encodes WinAnsi; other characters are replaced
/// with `?` and reported in the log.
#[derive(Clone, Default)]
pub struct PdfRenderer {
    font: Option<Arc<Vec<u8>>>,
}

impl PdfRenderer {
    pub fn builtin() -> Self {
        Self::default()
    }

    pub fn with_font(font: Vec<u8>) -> Self {
        Self {
            font: Some(Arc::new(font)),
        }
    }

    pub fn from_font_file(path: &Path) -> anyhow::Result<Self> {
        let font = std::fs::read(path)
            .with_context(|| format!("Failed to read PDF font {}", path.display()))?;
        info!("Embedding {} in exported PDFs ({} bytes)", path.display(), font.len());
        Ok(Self::with_font(font))
    }

    pub fn from_config(config: &ServiceConfig) -> anyhow::Result<Self> {
        match &config.pdf_font_path {
            Some(path) => Self::from_font_file(path),
            None => Ok(Self::builtin()),
        }
    }

    pub fn has_embedded_font(&self) -> bool {
        self.font.is_some()
    }

    pub fn render(&self, content: &str, title: &str) -> StudyResult<Vec<u8>> {
        if content.trim().is_empty() {
            return Err(StudyError::EmptyContent);
        }

        let (content, title) = match self.font {
            Some(_) => (content.to_string(), title.to_string()),
            None => (
                builtin_safe(content, "content"),
                builtin_safe(title, "title"),
            ),
        };

        let lines = layout(&content);
        let (doc, page, layer) = PdfDocument::new(&title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
        let (regular, bold) = match &self.font {
            Some(font) => {
                let embedded = external_font(&doc, font)?;
                (embedded.clone(), embedded)
            }
            None => (
                builtin_font(&doc, BuiltinFont::Helvetica)?,
                builtin_font(&doc, BuiltinFont::HelveticaBold)?,
            ),
        };

        let mut current = doc.get_page(page).get_layer(layer);
        let mut y = PAGE_HEIGHT - MARGIN;
        let mut pages = 1;

        y = write_line(&current, &bold, &title, TITLE_SIZE, y);
        y -= line_height(BODY_SIZE);

        for line in &lines {
            let height = line_height(line.size);
            if y - height < MARGIN {
                let (page, layer) = doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
                current = doc.get_page(page).get_layer(layer);
                y = PAGE_HEIGHT - MARGIN;
                pages += 1;
            }
            if line.text.is_empty() {
                y -= height / 2.0;
                continue;
            }
            let font = if line.bold { &bold } else { &regular };
            y = write_line(&current, font, &line.text, line.size, y);
        }

        let mut buffer = Vec::new();
        {
            let mut writer = BufWriter::new(&mut buffer);
            doc.save(&mut writer).map_err(|e| {
                error!("Failed to serialize PDF: {}", e);
                StudyError::Render
            })?;
        }

        info!(
            "Rendered study PDF: {} pages, {} bytes",
            pages,
            buffer.len()
        );
        Ok(buffer)
    }
}

/// Whether the builtin Type1 fonts (WinAnsiEncoding) can show `c`.
fn is_win_ansi(c: char) -> bool {
    matches!(c, '\n' | '\r' | '\t' | ' '..='~' | '\u{a0}'..='\u{ff}')
        || "€‚ƒ„…†‡ˆ‰Š‹ŒŽ‘’“”•–—˜™š›œžŸ".contains(c)
}

/// Characters of `text` the builtin fonts would drop, in order of appearance.
fn unsupported_chars(text: &str) -> Vec<char> {
    let mut found = Vec::new();
    for c in text.chars().filter(|c| !is_win_ansi(*c)) {
        if !found.contains(&c) {
            found.push(c);
        }
    }
    found
}

fn builtin_safe(text: &str, what: &str) -> String {
    let missing = unsupported_chars(text);
    if missing.is_empty() {
        return text.to_string();
    }

    let sample: String = missing.iter().take(20).collect();
    warn!(
        "PDF {} has {} distinct characters the builtin font cannot encode ({}); \
         set PDF_FONT_PATH to a Unicode TrueType font to keep them",
        what,
        missing.len(),
        sample
    );
    text.chars()
        .map(|c| if is_win_ansi(c) { c } else { REPLACEMENT })
        .collect()
}

fn external_font(doc: &PdfDocumentReference, font: &[u8]) -> StudyResult<IndirectFontRef> {
    doc.add_external_font(font).map_err(|e| {
        error!("Failed to load embedded font: {}", e);
        StudyError::Render
    })
}

fn builtin_font(doc: &PdfDocumentReference, font: BuiltinFont) -> StudyResult<IndirectFontRef> {
    doc.add_builtin_font(font).map_err(|e| {
        error!("Failed to load builtin font: {}", e);
        StudyError::Render
    })
}

fn write_line(layer: &PdfLayerReference, font: &IndirectFontRef, text: &str, size: f32, y: f32) -> f32 {
    let y = y - line_height(size);
    layer.use_text(text, size, Mm(MARGIN), Mm(y), font);
    y
}

fn line_height(size: f32) -> f32 {
    size * 1.4 * PT_TO_MM
}

fn max_chars(size: f32) -> usize {
    let usable_pt = (PAGE_WIDTH - 2.0 * MARGIN) / PT_TO_MM;
    (usable_pt / (size * AVG_GLYPH_WIDTH)).floor() as usize
}

/// Split markdown-ish text into styled, wrapped lines.
fn layout(content: &str) -> Vec<Line> {
    let mut lines = Vec::new();

    for raw in content.lines() {
        let trimmed = raw.trim_end();
        let cleaned = trimmed.replace("**", "");

        if cleaned.trim().is_empty() {
            lines.push(Line {
                text: String::new(),
                size: BODY_SIZE,
                bold: false,
            });
            continue;
        }

        let level = cleaned.chars().take_while(|c| *c == '#').count();
        let (text, size, bold) = if level > 0 {
            let size = match level {
                1 => 16.0,
                2 => 14.0,
                _ => 12.5,
            };
            (cleaned[level..].trim().to_string(), size, true)
        } else if let Some(item) = cleaned.trim_start().strip_prefix("* ") {
            let indent = cleaned.len() - cleaned.trim_start().len();
            (format!("{}- {}", " ".repeat(indent), item), BODY_SIZE, false)
        } else {
            (cleaned, BODY_SIZE, false)
        };

        for wrapped in wrap(&text, max_chars(size)) {
            lines.push(Line {
                text: wrapped,
                size,
                bold,
            });
        }
    }

    lines
}

fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let mut word = word.to_string();
        // Break words that cannot fit on a line by themselves.
        while word.chars().count() > width {
            if !current.is_empty() {
                out.push(std::mem::take(&mut current));
            }
            let head: String = word.chars().take(width).collect();
            word = word.chars().skip(width).collect();
            out.push(head);
        }
        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };
        if needed > width && !current.is_empty() {
            out.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(&word);
    }

    if !current.is_empty() {
        out.push(current);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_respects_width() {
        let lines = wrap("one two three four five", 9);
        assert_eq!(lines, vec!["one two", "three", "four five"]);
    }

    #[test]
    fn wrap_breaks_overlong_words() {
        let lines = wrap("abcdefghij", 4);
        assert_eq!(lines, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn layout_styles_headings_and_strips_emphasis() {
        let lines = layout("# What This Shows\nThis is **important**.\n\n* a point");
        assert_eq!(lines[0].text, "What This Shows");
        assert!(lines[0].bold);
        assert_eq!(lines[1].text, "This is important.");
        assert!(!lines[1].bold);
        assert!(lines[2].text.is_empty());
        assert_eq!(lines[3].text, "- a point");
    }

    fn render(content: &str) -> StudyResult<Vec<u8>> {
        PdfRenderer::builtin().render(content, "Study Document")
    }

    fn extract_all(pdf: &[u8]) -> String {
        let document = lopdf::Document::load_mem(pdf).unwrap();
        let pages: Vec<u32> = document.get_pages().keys().copied().collect();
        document.extract_text(&pages).unwrap()
    }

    #[test]
    fn renders_a_pdf_document() {
        let pdf = render("# Title\nSome body text.").unwrap();
        assert!(pdf.starts_with(b"%PDF"));
    }

    #[test]
    fn long_content_spans_several_pages() {
        let content = (0..200)
            .map(|i| format!("Line number {i} of a long study document."))
            .collect::<Vec<_>>()
            .join("\n");
        let pdf = render(&content).unwrap();
        let document = lopdf::Document::load_mem(&pdf).unwrap();
        assert!(document.get_pages().len() > 1);
    }

    #[test]
    fn empty_content_is_rejected() {
        assert!(matches!(render(" \n "), Err(StudyError::EmptyContent)));
    }

    #[test]
    fn win_ansi_punctuation_is_supported() {
        assert!(unsupported_chars("Think of it as a kitchen — “really” café €5").is_empty());
    }

    #[test]
    fn detects_characters_outside_win_ansi() {
        assert_eq!(
            unsupported_chars("# 光合作用 🌱 ✅ 光"),
            vec!['光', '合', '作', '用', '🌱', '✅']
        );
    }

    #[test]
    fn non_latin_text_leaves_a_visible_gap_with_builtin_font() {
        let pdf = render("# 光合作用 🌱\nThink of it as a kitchen ✅").unwrap();
        let text = extract_all(&pdf);

        assert!(text.contains("????"), "got: {text:?}");
        assert!(text.contains("kitchen ?"), "got: {text:?}");
    }

    #[test]
    fn invalid_font_data_fails_rendering() {
        let renderer = PdfRenderer::with_font(b"not a font".to_vec());
        assert!(matches!(
            renderer.render("# Title\nBody", "Study Document"),
            Err(StudyError::Render)
        ));
    }

    #[test]
    fn missing_font_file_is_a_startup_error() {
        let config = ServiceConfig {
            pdf_font_path: Some("/nonexistent/font.ttf".into()),
            ..ServiceConfig::default()
        };
        assert!(PdfRenderer::from_config(&config).is_err());
        assert!(!PdfRenderer::from_config(&ServiceConfig::default())
            .unwrap()
            .has_embedded_font());
    }

    #[test]
    fn embeds_truetype_font_when_available() {
        // Any Unicode TrueType font shipped by the host works here.
        let candidates = [
            "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
            "/usr/share/fonts/TTF/DejaVuSans.ttf",
            "/Library/Fonts/Arial Unicode.ttf",
        ];
        let Some(path) = candidates.iter().map(Path::new).find(|p| p.exists()) else {
            eprintln!("no TrueType font found, skipping");
            return;
        };

        let renderer = PdfRenderer::from_font_file(path).unwrap();
        let pdf = renderer
            .render("# Фотосинтез\nΦως και νερό", "Study Document")
            .unwrap();

        assert!(lopdf::Document::load_mem(&pdf).is_ok());
        assert!(pdf.windows(9).any(|w| w == b"FontFile2"));
    }
}
