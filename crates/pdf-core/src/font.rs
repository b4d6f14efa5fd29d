//! Font handling for PDF documents

use crate::{PdfError, Result};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use lopdf::{Dictionary, Object, Stream, StringFormat};
use std::collections::BTreeMap;
use std::io::Write;

/// Glyph information for a character that has been used in the document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct GlyphInfo {
    gid: u16,
    advance: u16,
}

/// Font data structure for embedded TrueType fonts
#[derive(Debug, Clone)]
pub struct FontData {
    /// Font name/identifier (used as the PDF BaseFont)
    pub name: String,
    /// Raw TTF data
    ttf_data: Vec<u8>,
    units_per_em: u16,
    ascender: i16,
    descender: i16,
    /// Glyphs for the characters used so far
    glyphs: BTreeMap<char, GlyphInfo>,
}

/// PDF objects generated for font embedding
pub struct FontObjects {
    /// Type0 font dictionary
    pub type0_font: Dictionary,
    /// CIDFont Type2 dictionary
    pub cid_font: Dictionary,
    /// Font descriptor dictionary
    pub font_descriptor: Dictionary,
    /// Font file stream (compressed TTF data)
    pub font_file_stream: Stream,
    /// ToUnicode CMap stream
    pub tounicode_stream: Stream,
}

impl FontData {
    /// Create font data from TTF bytes
    ///
    /// # Arguments
    /// * `name` - Font identifier
    /// * `ttf_data` - TrueType font file bytes
    pub fn from_ttf(name: &str, ttf_data: &[u8]) -> Result<Self> {
        let face = ttf_parser::Face::parse(ttf_data, 0)
            .map_err(|e| PdfError::FontParseError(format!("{e:?}")))?;

        Ok(Self {
            name: sanitize_font_name(name),
            units_per_em: face.units_per_em(),
            ascender: face.ascender(),
            descender: face.descender(),
            ttf_data: ttf_data.to_vec(),
            glyphs: BTreeMap::new(),
        })
    }

    /// Record characters as used, resolving their glyphs
    ///
    /// Characters the font has no glyph for map to GID 0 (.notdef).
    pub fn add_chars(&mut self, text: &str) {
        let pending: Vec<char> = text
            .chars()
            .filter(|c| !self.glyphs.contains_key(c))
            .collect();
        if pending.is_empty() {
            return;
        }

        let face = ttf_parser::Face::parse(&self.ttf_data, 0).ok();
        for c in pending {
            let info = match &face {
                Some(face) => {
                    let glyph = face.glyph_index(c).unwrap_or(ttf_parser::GlyphId(0));
                    GlyphInfo {
                        gid: glyph.0,
                        advance: face.glyph_hor_advance(glyph).unwrap_or(0),
                    }
                }
                None => GlyphInfo { gid: 0, advance: 0 },
            };
            self.glyphs.insert(c, info);
        }
    }

    /// Characters used so far
    pub fn used_chars(&self) -> impl Iterator<Item = char> + '_ {
        self.glyphs.keys().copied()
    }

    /// Get glyph ID for a used character
    pub fn glyph_id(&self, c: char) -> Option<u16> {
        self.glyphs.get(&c).map(|g| g.gid)
    }

    /// Check if font has a real glyph for a used character
    pub fn has_glyph(&self, c: char) -> bool {
        self.glyph_id(c).map(|id| id != 0).unwrap_or(false)
    }

    /// Get font units per em
    pub fn units_per_em(&self) -> u16 {
        self.units_per_em
    }

    /// Scale a value in font units to PDF glyph space (1000 units per em)
    fn to_glyph_space(&self, value: i32) -> i32 {
        (value as f64 * 1000.0 / self.units_per_em.max(1) as f64).round() as i32
    }

    /// Generate all PDF objects needed to embed this font
    pub fn to_pdf_objects(&self) -> Result<FontObjects> {
        let font_name = Object::Name(self.name.clone().into_bytes());

        let tounicode_content = self.generate_tounicode_cmap();
        let tounicode_stream = Stream::new(
            Dictionary::from_iter(vec![("Type", "CMap".into())]),
            tounicode_content.into_bytes(),
        );

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(&self.ttf_data)
            .map_err(|e| PdfError::SaveError(format!("Failed to compress font: {e}")))?;
        let compressed = encoder
            .finish()
            .map_err(|e| PdfError::SaveError(format!("Failed to compress font: {e}")))?;
        let font_file_stream = Stream::new(
            Dictionary::from_iter(vec![
                ("Length1", (self.ttf_data.len() as i64).into()),
                ("Filter", "FlateDecode".into()),
            ]),
            compressed,
        );

        let ascent = self.to_glyph_space(self.ascender as i32);
        let descent = self.to_glyph_space(self.descender as i32);

        let font_bbox: Vec<Object> = vec![
            Object::Integer(0),
            Object::Integer(descent as i64),
            Object::Integer(1000),
            Object::Integer(ascent as i64),
        ];

        let font_descriptor = Dictionary::from_iter(vec![
            ("Type", "FontDescriptor".into()),
            ("FontName", font_name.clone()),
            ("Flags", 4.into()), // Symbolic font
            ("FontBBox", font_bbox.into()),
            ("ItalicAngle", 0.into()),
            ("Ascent", (ascent as i64).into()),
            ("Descent", (descent as i64).into()),
            ("CapHeight", (ascent as i64).into()),
            ("StemV", 80.into()),
            ("FontFile2", Object::Reference((0, 0))), // Placeholder, set when embedding
        ]);

        let cid_system_info = Dictionary::from_iter(vec![
            ("Registry", Object::String(b"Adobe".to_vec(), StringFormat::Literal)),
            ("Ordering", Object::String(b"Identity".to_vec(), StringFormat::Literal)),
            ("Supplement", 0.into()),
        ]);

        let cid_font = Dictionary::from_iter(vec![
            ("Type", "Font".into()),
            ("Subtype", "CIDFontType2".into()),
            ("BaseFont", font_name.clone()),
            ("CIDSystemInfo", cid_system_info.into()),
            ("FontDescriptor", Object::Reference((0, 0))), // Placeholder, set when embedding
            ("CIDToGIDMap", "Identity".into()),
            ("W", self.generate_widths_array().into()),
            ("DW", 1000.into()),
        ]);

        let type0_font = Dictionary::from_iter(vec![
            ("Type", "Font".into()),
            ("Subtype", "Type0".into()),
            ("BaseFont", font_name),
            ("Encoding", "Identity-H".into()),
            ("DescendantFonts", vec![Object::Reference((0, 0))].into()), // Placeholder
            ("ToUnicode", Object::Reference((0, 0))),                    // Placeholder
        ]);

        Ok(FontObjects {
            type0_font,
            cid_font,
            font_descriptor,
            font_file_stream,
            tounicode_stream,
        })
    }

    /// Encode text as hex string for PDF Tj operator
    pub fn encode_text_hex(&self, text: &str) -> String {
        let mut result = String::new();
        for c in text.chars() {
            let gid = self.glyph_id(c).unwrap_or(0);
            result.push_str(&format!("{gid:04X}"));
        }
        format!("<{result}>")
    }

    /// Generate /W array for glyph widths
    fn generate_widths_array(&self) -> Vec<Object> {
        let mut gids: Vec<(u16, u16)> = self.glyphs.values().map(|g| (g.gid, g.advance)).collect();
        gids.sort();
        gids.dedup_by_key(|(gid, _)| *gid);

        // Individual mapping format: [gid1 [width1] gid2 [width2] ...]
        let mut widths = Vec::with_capacity(gids.len() * 2);
        for (gid, advance) in gids {
            widths.push((gid as i64).into());
            widths.push(vec![Object::Integer(self.to_glyph_space(advance as i32) as i64)].into());
        }
        widths
    }

    /// Generate ToUnicode CMap stream content
    fn generate_tounicode_cmap(&self) -> String {
        let mut cmap = String::new();

        cmap.push_str("/CIDInit /ProcSet findresource begin\n");
        cmap.push_str("12 dict begin\n");
        cmap.push_str("begincmap\n");
        cmap.push_str("/CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def\n");
        cmap.push_str("/CMapName /Adobe-Identity-UCS def\n");
        cmap.push_str("/CMapType 2 def\n");

        cmap.push_str("1 begincodespacerange\n");
        cmap.push_str("<0000> <FFFF>\n");
        cmap.push_str("endcodespacerange\n");

        // .notdef carries no meaningful text
        let mapped: Vec<(char, u16)> = self
            .glyphs
            .iter()
            .filter(|(_, g)| g.gid != 0)
            .map(|(c, g)| (*c, g.gid))
            .collect();

        // bfchar sections are limited to 100 entries
        for chunk in mapped.chunks(100) {
            cmap.push_str(&format!("{} beginbfchar\n", chunk.len()));
            for (c, gid) in chunk {
                let mut units = [0u16; 2];
                let unicode: String = c
                    .encode_utf16(&mut units)
                    .iter()
                    .map(|u| format!("{u:04X}"))
                    .collect();
                cmap.push_str(&format!("<{gid:04X}> <{unicode}>\n"));
            }
            cmap.push_str("endbfchar\n");
        }

        cmap.push_str("endcmap\n");
        cmap.push_str("CMapName currentdict /CMap defineresource pop\n");
        cmap.push_str("end\n");
        cmap.push_str("end\n");

        cmap
    }
}

/// Standard 14 fonts usable without embedding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StandardFont {
    #[default]
    Helvetica,
}

impl StandardFont {
    /// PDF BaseFont name
    pub fn base_font(self) -> &'static str {
        match self {
            StandardFont::Helvetica => "Helvetica",
        }
    }

    /// Font dictionary using WinAnsiEncoding
    pub fn to_dictionary(self) -> Dictionary {
        Dictionary::from_iter(vec![
            ("Type", "Font".into()),
            ("Subtype", "Type1".into()),
            ("BaseFont", self.base_font().into()),
            ("Encoding", "WinAnsiEncoding".into()),
        ])
    }

    /// Encode text as a literal string operand
    ///
    /// Characters outside WinAnsiEncoding are replaced with `?`.
    pub fn encode_text_literal(self, text: &str) -> String {
        let mut result = String::from("(");
        for c in text.chars() {
            let code = win_ansi_code(c).unwrap_or(b'?');
            match code {
                b'(' | b')' | b'\\' => {
                    result.push('\\');
                    result.push(code as char);
                }
                0x20..=0x7E => result.push(code as char),
                _ => result.push_str(&format!("\\{code:03o}")),
            }
        }
        result.push(')');
        result
    }
}

/// Map a character to its WinAnsiEncoding code
fn win_ansi_code(c: char) -> Option<u8> {
    let code = c as u32;
    match code {
        0x20..=0x7E | 0xA0..=0xFF => Some(code as u8),
        _ => match c {
            '€' => Some(0x80),
            '‚' => Some(0x82),
            '„' => Some(0x84),
            '…' => Some(0x85),
            '‘' => Some(0x91),
            '’' => Some(0x92),
            '“' => Some(0x93),
            '”' => Some(0x94),
            '•' => Some(0x95),
            '–' => Some(0x96),
            '—' => Some(0x97),
            '™' => Some(0x99),
            _ => None,
        },
    }
}

/// Keep only characters valid in a PDF name without escaping
fn sanitize_font_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    if cleaned.is_empty() {
        "EmbeddedFont".to_string()
    } else {
        cleaned
    }
}

/// The font used to draw text: an embedded TrueType font or a standard font
#[derive(Debug, Clone)]
pub enum FontSource {
    Embedded(FontData),
    Standard(StandardFont),
}

impl FontSource {
    /// Built-in Helvetica (no Unicode coverage beyond WinAnsi)
    pub fn helvetica() -> Self {
        FontSource::Standard(StandardFont::Helvetica)
    }

    /// Whether the font can render arbitrary Unicode text
    pub fn is_unicode(&self) -> bool {
        matches!(self, FontSource::Embedded(_))
    }

    /// Human-readable font name
    pub fn name(&self) -> &str {
        match self {
            FontSource::Embedded(data) => &data.name,
            FontSource::Standard(font) => font.base_font(),
        }
    }

    /// Record characters as used (no-op for standard fonts)
    pub fn add_chars(&mut self, text: &str) {
        if let FontSource::Embedded(data) = self {
            data.add_chars(text);
        }
    }

    /// Encode text as a string operand for the Tj operator
    pub fn encode_text(&self, text: &str) -> String {
        match self {
            FontSource::Embedded(data) => data.encode_text_hex(text),
            FontSource::Standard(font) => font.encode_text_literal(text),
        }
    }
}
