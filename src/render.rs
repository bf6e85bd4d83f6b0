//! Article rendering to PDF.
//!
//! Rendering never fails the pipeline: [`DocumentRenderer::render`]
//! always returns bytes. If full layout fails, the renderer falls back
//! to a minimal error document, and as a last resort to the raw error
//! message, so delivery always has something to attach.
//!
//! The builtin Helvetica fonts only cover WinAnsi, so all text is
//! downgraded to a safe ASCII subset before layout.

use printpdf::{
    BuiltinFont, Color, Image, ImageTransform, IndirectFontRef, Mm, PdfDocument,
    PdfDocumentReference, PdfLayerReference, Rgb,
};
use std::io::Cursor;
use tracing::{debug, warn};

use crate::models::Article;

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN: f32 = 20.0;
const BOTTOM_LIMIT: f32 = MARGIN;

const TITLE_SIZE: f32 = 16.0;
const META_SIZE: f32 = 9.0;
const BODY_SIZE: f32 = 11.0;
const SOURCE_SIZE: f32 = 8.0;

const TITLE_LEADING: f32 = 8.0;
const META_LEADING: f32 = 5.0;
const BODY_LEADING: f32 = 5.5;
const SOURCE_LEADING: f32 = 4.0;

const BODY_WRAP_CHARS: usize = 90;
const TITLE_WRAP_CHARS: usize = 55;
const MAX_WORD_CHARS: usize = 50;

const IMAGE_MAX_WIDTH_MM: f32 = 170.0;
const IMAGE_MAX_HEIGHT_MM: f32 = 90.0;
const IMAGE_DPI: f32 = 300.0;

/// Renders one article into a distributable document.
pub trait DocumentRenderer: Send + Sync {
    fn render(&self, article: &Article) -> Vec<u8>;
}

pub struct PdfRenderer;

impl PdfRenderer {
    pub fn new() -> Self {
        PdfRenderer
    }

    fn render_article(&self, article: &Article) -> Result<Vec<u8>, printpdf::Error> {
        let (doc, page, layer) =
            PdfDocument::new(&article.title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "contenuto");
        let fonts = Fonts::load(&doc)?;

        let mut writer = Writer {
            doc: &doc,
            layer: doc.get_page(page).get_layer(layer),
            y: PAGE_HEIGHT - MARGIN,
        };

        for line in wrap(&ascii_safe(&article.title), TITLE_WRAP_CHARS) {
            writer.text_line(&line, TITLE_SIZE, &fonts.bold, TITLE_LEADING);
        }
        writer.y -= 2.0;

        let meta = format!(
            "{} | {} | {} parole",
            article.topic.angle,
            chrono::Local::now().format("%d/%m/%Y"),
            article.word_count
        );
        writer.layer.set_fill_color(gray());
        writer.text_line(&ascii_safe(&meta), META_SIZE, &fonts.oblique, META_LEADING);
        writer.layer.set_fill_color(black());
        writer.y -= 4.0;

        if let Some(ref image) = article.image {
            self.embed_image(&mut writer, &image.bytes, &image.mime_type);
        }

        for paragraph in ascii_safe(&clean_markdown(&article.body)).split("\n\n") {
            let paragraph = paragraph.trim();
            if paragraph.is_empty() {
                continue;
            }
            for line in wrap(&break_long_words(paragraph, MAX_WORD_CHARS), BODY_WRAP_CHARS) {
                writer.text_line(&line, BODY_SIZE, &fonts.regular, BODY_LEADING);
            }
            writer.y -= 2.5;
        }

        if !article.sources.is_empty() {
            writer.y -= 3.0;
            writer.text_line("Fonti:", META_SIZE, &fonts.bold, META_LEADING);
            writer.layer.set_fill_color(gray());
            for source in &article.sources {
                for line in wrap(&ascii_safe(&source.url), 110) {
                    writer.text_line(&line, SOURCE_SIZE, &fonts.regular, SOURCE_LEADING);
                }
            }
            writer.layer.set_fill_color(black());
        }

        doc.save_to_bytes()
    }

    /// Decode and place the article image under the metadata line.
    /// Any decoding or embedding problem skips the image and continues.
    fn embed_image(&self, writer: &mut Writer<'_>, bytes: &[u8], mime_type: &str) {
        let image = match mime_type {
            "image/jpeg" => {
                printpdf::image_crate::codecs::jpeg::JpegDecoder::new(Cursor::new(bytes))
                    .and_then(Image::try_from)
            }
            "image/png" => printpdf::image_crate::codecs::png::PngDecoder::new(Cursor::new(bytes))
                .and_then(Image::try_from),
            other => {
                warn!(mime = other, "unsupported image type, skipping");
                return;
            }
        };
        let image = match image {
            Ok(image) => image,
            Err(error) => {
                warn!(%error, "image decode failed, rendering without image");
                return;
            }
        };

        let natural_width_mm = image.image.width.0 as f32 * 25.4 / IMAGE_DPI;
        let natural_height_mm = image.image.height.0 as f32 * 25.4 / IMAGE_DPI;
        let scale = (IMAGE_MAX_WIDTH_MM / natural_width_mm)
            .min(IMAGE_MAX_HEIGHT_MM / natural_height_mm)
            .min(1.0);
        let height_mm = natural_height_mm * scale;

        writer.ensure_space(height_mm + 4.0);
        writer.y -= height_mm;
        image.add_to_layer(
            writer.layer.clone(),
            ImageTransform {
                translate_x: Some(Mm(MARGIN)),
                translate_y: Some(Mm(writer.y)),
                scale_x: Some(scale),
                scale_y: Some(scale),
                dpi: Some(IMAGE_DPI),
                ..ImageTransform::default()
            },
        );
        writer.y -= 4.0;
        debug!(height_mm, scale, "image embedded");
    }

    fn render_error_document(&self, title: &str, message: &str) -> Result<Vec<u8>, printpdf::Error> {
        let (doc, page, layer) =
            PdfDocument::new("Errore di rendering", Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "errore");
        let fonts = Fonts::load(&doc)?;
        let mut writer = Writer {
            doc: &doc,
            layer: doc.get_page(page).get_layer(layer),
            y: PAGE_HEIGHT - MARGIN,
        };
        writer.text_line("Errore di rendering", TITLE_SIZE, &fonts.bold, TITLE_LEADING);
        writer.y -= 2.0;
        for line in wrap(&ascii_safe(title), BODY_WRAP_CHARS) {
            writer.text_line(&line, BODY_SIZE, &fonts.regular, BODY_LEADING);
        }
        for line in wrap(&ascii_safe(message), BODY_WRAP_CHARS) {
            writer.text_line(&line, BODY_SIZE, &fonts.regular, BODY_LEADING);
        }
        doc.save_to_bytes()
    }
}

impl Default for PdfRenderer {
    fn default() -> Self {
        PdfRenderer::new()
    }
}

impl DocumentRenderer for PdfRenderer {
    fn render(&self, article: &Article) -> Vec<u8> {
        match self.render_article(article) {
            Ok(bytes) => bytes,
            Err(error) => {
                warn!(%error, title = %article.title, "article layout failed");
                let message = error.to_string();
                match self.render_error_document(&article.title, &message) {
                    Ok(bytes) => bytes,
                    Err(_) => format!(
                        "Rendering non riuscito per '{}': {}",
                        article.title, message
                    )
                    .into_bytes(),
                }
            }
        }
    }
}

struct Fonts {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    oblique: IndirectFontRef,
}

impl Fonts {
    fn load(doc: &PdfDocumentReference) -> Result<Self, printpdf::Error> {
        Ok(Fonts {
            regular: doc.add_builtin_font(BuiltinFont::Helvetica)?,
            bold: doc.add_builtin_font(BuiltinFont::HelveticaBold)?,
            oblique: doc.add_builtin_font(BuiltinFont::HelveticaOblique)?,
        })
    }
}

struct Writer<'a> {
    doc: &'a PdfDocumentReference,
    layer: PdfLayerReference,
    y: f32,
}

impl Writer<'_> {
    fn text_line(&mut self, text: &str, size: f32, font: &IndirectFontRef, leading: f32) {
        self.ensure_space(leading);
        self.layer
            .use_text(text, size, Mm(MARGIN), Mm(self.y), font);
        self.y -= leading;
    }

    fn ensure_space(&mut self, needed: f32) {
        if self.y - needed < BOTTOM_LIMIT {
            let (page, layer) = self
                .doc
                .add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "contenuto");
            self.layer = self.doc.get_page(page).get_layer(layer);
            self.y = PAGE_HEIGHT - MARGIN;
        }
    }
}

fn black() -> Color {
    Color::Rgb(Rgb::new(0.0, 0.0, 0.0, None))
}

fn gray() -> Color {
    Color::Rgb(Rgb::new(0.45, 0.45, 0.45, None))
}

/// Downgrade text to the ASCII subset the builtin fonts render safely.
///
/// Typographic punctuation maps to its plain form, Italian accented
/// vowels drop their accents, and anything else non-ASCII is omitted.
pub fn ascii_safe(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\u{2018}' | '\u{2019}' | '\u{02BC}' => out.push('\''),
            '\u{201C}' | '\u{201D}' | '\u{00AB}' | '\u{00BB}' => out.push('"'),
            '\u{2013}' | '\u{2014}' => out.push('-'),
            '\u{2026}' => out.push_str("..."),
            '\u{00A0}' => out.push(' '),
            '\u{20AC}' => out.push_str("EUR"),
            'à' | 'á' | 'â' => out.push('a'),
            'è' | 'é' | 'ê' => out.push('e'),
            'ì' | 'í' | 'î' => out.push('i'),
            'ò' | 'ó' | 'ô' => out.push('o'),
            'ù' | 'ú' | 'û' => out.push('u'),
            'À' | 'Á' => out.push('A'),
            'È' | 'É' => out.push('E'),
            'Ì' | 'Í' => out.push('I'),
            'Ò' | 'Ó' => out.push('O'),
            'Ù' | 'Ú' => out.push('U'),
            'ç' => out.push('c'),
            'Ç' => out.push('C'),
            'ñ' => out.push('n'),
            c if c.is_ascii() => out.push(c),
            _ => {}
        }
    }
    out
}

/// Strip markdown decoration the model tends to emit, keeping the text.
pub fn clean_markdown(text: &str) -> String {
    use once_cell::sync::Lazy;
    use regex::Regex;

    static BOLD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*([^*]+)\*\*").expect("valid pattern"));
    static ITALIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*([^*]+)\*").expect("valid pattern"));
    static HEADER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^#{1,6}\s*").expect("valid pattern"));
    static LINK: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"\[([^\]]+)\]\([^)]*\)").expect("valid pattern"));

    let text = BOLD.replace_all(text, "$1");
    let text = ITALIC.replace_all(&text, "$1");
    let text = HEADER.replace_all(&text, "");
    let text = LINK.replace_all(&text, "$1");
    text.replace('`', "")
}

/// Insert spaces into words longer than `max` characters so line
/// wrapping can always make progress.
pub fn break_long_words(text: &str, max: usize) -> String {
    text.split(' ')
        .map(|word| {
            if word.chars().count() <= max {
                word.to_string()
            } else {
                word.chars()
                    .collect::<Vec<_>>()
                    .chunks(max)
                    .map(|chunk| chunk.iter().collect::<String>())
                    .collect::<Vec<_>>()
                    .join(" ")
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Greedy wrap on spaces to at most `width` characters per line.
pub fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        let needed = if current.is_empty() { 0 } else { 1 } + word.chars().count();
        if !current.is_empty() && current.chars().count() + needed > width {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Topic;

    fn sample_article(body: &str) -> Article {
        Article::from_topic(
            Topic {
                title: "Cannoli di Piana degli Albanesi".to_string(),
                angle: "prodotto".to_string(),
                source_urls: vec!["https://balarm.it/food/cannoli".to_string()],
                keywords: vec!["cannoli".to_string()],
            },
            body.to_string(),
        )
    }

    #[test]
    fn ascii_safe_replaces_typography_and_accents() {
        assert_eq!(ascii_safe("più caffè… “vero”"), "piu caffe... \"vero\"");
        assert_eq!(ascii_safe("menù – 15\u{20AC}"), "menu - 15EUR");
        assert_eq!(ascii_safe("日本 pasta"), " pasta");
    }

    #[test]
    fn clean_markdown_strips_decoration() {
        let text = "## Titolo\n**grassetto** e *corsivo* e [link](https://x.it)";
        let cleaned = clean_markdown(text);
        assert_eq!(cleaned, "Titolo\ngrassetto e corsivo e link");
    }

    #[test]
    fn break_long_words_splits_oversized() {
        let word = "a".repeat(120);
        let broken = break_long_words(&word, 50);
        assert!(broken.split(' ').all(|w| w.chars().count() <= 50));
        assert_eq!(broken.replace(' ', ""), word);
    }

    #[test]
    fn wrap_respects_width() {
        let text = "una frase con molte parole brevi ".repeat(10);
        for line in wrap(&text, 30) {
            assert!(line.chars().count() <= 30);
        }
    }

    #[test]
    fn wrap_single_long_word_is_one_line() {
        let lines = wrap("supercalifragilistico", 10);
        assert_eq!(lines.len(), 1);
    }

    #[test]
    fn render_produces_pdf_bytes() {
        let article = sample_article(&"Una frase di prova sul cibo siciliano. ".repeat(100));
        let bytes = PdfRenderer::new().render(&article);
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn render_survives_bad_image() {
        let mut article = sample_article("Corpo breve.");
        article.image = Some(crate::models::GeneratedImage {
            bytes: vec![0, 1, 2, 3],
            mime_type: "image/png".to_string(),
        });
        let bytes = PdfRenderer::new().render(&article);
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn long_body_spans_multiple_pages() {
        let article = sample_article(&"paragrafo lungo di testo. ".repeat(2000));
        let bytes = PdfRenderer::new().render(&article);
        assert!(bytes.starts_with(b"%PDF"));
        assert!(bytes.len() > 4000);
    }
}
