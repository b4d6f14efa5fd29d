//! PDF Document wrapper

use crate::form::{self, FlattenReport, FormField};
use crate::page::{object_to_f64, PageInfo, Rotation};
use crate::text::{generate_text_operators, TextRenderContext};
use crate::{FontSource, PdfError, Result};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::Path;

/// A4 fallback used when no MediaBox can be found
const A4_WIDTH: f64 = 595.28;
const A4_HEIGHT: f64 = 841.89;

/// Maximum number of `/Parent` hops followed for inherited attributes
const MAX_INHERITANCE_DEPTH: usize = 32;

/// A buffered text operation for deferred encoding
///
/// Text is buffered while drawing and encoded during save, once the font
/// knows every character it has to cover.
#[derive(Debug, Clone)]
struct BufferedTextOp {
    text: String,
    /// Zero-based page index
    page: usize,
    x: f64,
    y: f64,
    font_size: f32,
    rotation: Rotation,
}

/// RGB Color (values 0.0 - 1.0)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    /// Create a new RGB color (values 0.0 - 1.0)
    pub fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    pub fn black() -> Self {
        Self::rgb(0.0, 0.0, 0.0)
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::black()
    }
}

/// PDF Document wrapper providing high-level operations
pub struct PdfDocument {
    /// The underlying lopdf document
    inner: Document,
    /// Font used for every drawn run
    font: Option<FontSource>,
    /// Page resource name of the drawing font, unique within the document
    font_resource_name: String,
    /// Buffered content operators per page (page index -> operators)
    page_content_buffer: BTreeMap<usize, Vec<u8>>,
    /// Buffered text operations (encoded during save)
    buffered_text_ops: Vec<BufferedTextOp>,
}

impl PdfDocument {
    /// Open a PDF document from a file path
    ///
    /// # Example
    /// ```ignore
    /// let doc = PdfDocument::open("template.pdf")?;
    /// ```
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let inner = Document::load(path).map_err(|e| PdfError::OpenError(e.to_string()))?;
        Ok(Self::from_document(inner))
    }

    /// Open a PDF document from bytes
    pub fn open_from_bytes(data: &[u8]) -> Result<Self> {
        let inner = Document::load_mem(data).map_err(|e| PdfError::OpenError(e.to_string()))?;
        Ok(Self::from_document(inner))
    }

    /// Wrap an already loaded lopdf document
    pub fn from_document(inner: Document) -> Self {
        let font_resource_name = pick_font_resource_name(&inner);

        Self {
            inner,
            font: None,
            font_resource_name,
            page_content_buffer: BTreeMap::new(),
            buffered_text_ops: Vec::new(),
        }
    }

    /// Get the number of pages in the document
    pub fn page_count(&self) -> usize {
        self.inner.get_pages().len()
    }

    /// Get all page object IDs in order
    pub fn page_ids(&self) -> Vec<ObjectId> {
        self.inner.get_pages().values().copied().collect()
    }

    fn page_id(&self, index: usize) -> Result<ObjectId> {
        let pages = self.inner.get_pages();
        // lopdf numbers pages from 1
        pages
            .get(&(index as u32 + 1))
            .copied()
            .ok_or(PdfError::InvalidPage(index, pages.len()))
    }

    /// Geometry of the page at a zero-based index
    ///
    /// Size comes from the (possibly inherited) MediaBox, falling back to A4.
    /// Rotation comes from the (possibly inherited) `/Rotate` entry.
    pub fn page(&self, index: usize) -> Result<PageInfo> {
        let id = self.page_id(index)?;

        let (width, height) = self
            .inherited_attribute(id, b"MediaBox")
            .and_then(|obj| obj.as_array().ok())
            .and_then(|array| media_box_size(array))
            .unwrap_or((A4_WIDTH, A4_HEIGHT));

        let rotation = self
            .inherited_attribute(id, b"Rotate")
            .and_then(object_to_f64)
            .map(|degrees| Rotation::from_degrees(degrees.round() as i64))
            .unwrap_or_default();

        Ok(PageInfo {
            index,
            id,
            width,
            height,
            rotation,
        })
    }

    /// Geometry of every page, in document order
    pub fn pages(&self) -> Result<Vec<PageInfo>> {
        (0..self.page_count()).map(|index| self.page(index)).collect()
    }

    /// Map page object ids to zero-based page indices
    pub fn page_index_by_ref(&self) -> HashMap<ObjectId, usize> {
        self.inner
            .get_pages()
            .values()
            .enumerate()
            .map(|(index, id)| (*id, index))
            .collect()
    }

    /// Map widget annotation ids to the page listing them in `/Annots`
    pub fn annotation_page_index(&self) -> HashMap<ObjectId, usize> {
        form::annotation_page_index(&self.inner)
    }

    /// Look up a page attribute, following the `/Parent` chain
    fn inherited_attribute(&self, page_id: ObjectId, key: &[u8]) -> Option<&Object> {
        let mut current_id = page_id;
        let mut seen = HashSet::new();

        for _ in 0..MAX_INHERITANCE_DEPTH {
            if !seen.insert(current_id) {
                return None;
            }
            let dict = self.inner.get_object(current_id).ok()?.as_dict().ok()?;
            if let Ok(value) = dict.get(key) {
                return Some(form::resolve(&self.inner, value));
            }
            match dict.get(b"Parent") {
                Ok(Object::Reference(parent_id)) => current_id = *parent_id,
                _ => return None,
            }
        }
        None
    }

    /// Set the font used by subsequent `draw_text` calls
    pub fn set_font(&mut self, font: FontSource) {
        self.font = Some(font);
    }

    /// The active font, if one was set
    pub fn font(&self) -> Option<&FontSource> {
        self.font.as_ref()
    }

    /// Resource name the drawing font is registered under on each page
    pub fn font_resource_name(&self) -> &str {
        &self.font_resource_name
    }

    /// Draw a single run of text
    ///
    /// # Arguments
    /// * `text` - Text to draw; empty text is accepted and draws nothing
    /// * `page` - Zero-based page index
    /// * `x` - Baseline origin X in PDF user space
    /// * `y` - Baseline origin Y in PDF user space (from bottom)
    /// * `font_size` - Font size in points
    /// * `rotation` - Counter-clockwise rotation of the glyphs around the origin
    pub fn draw_text(
        &mut self,
        text: &str,
        page: usize,
        x: f64,
        y: f64,
        font_size: f32,
        rotation: Rotation,
    ) -> Result<()> {
        let page_count = self.page_count();
        if page >= page_count {
            return Err(PdfError::InvalidPage(page, page_count));
        }

        if !x.is_finite() || !y.is_finite() || !font_size.is_finite() || font_size <= 0.0 {
            return Err(PdfError::InvalidGeometry(format!(
                "cannot draw at ({x}, {y}) with size {font_size}"
            )));
        }

        // Skip empty text - nothing to render
        if text.is_empty() {
            return Ok(());
        }

        let font = self
            .font
            .as_mut()
            .ok_or_else(|| PdfError::FontNotFound("No font set".to_string()))?;
        font.add_chars(text);

        self.buffered_text_ops.push(BufferedTextOp {
            text: text.to_string(),
            page,
            x,
            y,
            font_size,
            rotation,
        });

        Ok(())
    }

    /// Enumerate the interactive form fields and their widgets
    pub fn form_fields(&self) -> Vec<FormField> {
        form::collect_form_fields(&self.inner)
    }

    /// Remove all widget annotations and the interactive form
    ///
    /// Drawn text is unaffected; only the interactive layer disappears.
    pub fn flatten_form(&mut self) -> Result<FlattenReport> {
        form::flatten_form(&mut self.inner)
    }

    /// Save the document to a file
    pub fn save<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.finalize()?;

        self.inner
            .save(path)
            .map_err(|e| PdfError::SaveError(e.to_string()))?;
        Ok(())
    }

    /// Save the document to bytes
    pub fn to_bytes(&mut self) -> Result<Vec<u8>> {
        self.finalize()?;

        let mut buffer = Vec::new();
        self.inner
            .save_to(&mut buffer)
            .map_err(|e| PdfError::SaveError(e.to_string()))?;

        Ok(buffer)
    }

    /// Write buffered text into the page objects
    fn finalize(&mut self) -> Result<()> {
        if self.buffered_text_ops.is_empty() {
            return Ok(());
        }

        // 1. Encode buffered text with the final font
        let pages_with_text = self.encode_buffered_text()?;

        // 2. Flush buffered content streams to pages
        self.flush_content_buffers()?;

        // 3. Embed the font and reference it from every page that uses it
        let font_id = self.embed_font()?;
        log::debug!(
            "Embedded font {:?} as /{} on {} page(s)",
            self.font.as_ref().map(FontSource::name),
            self.font_resource_name,
            pages_with_text.len()
        );
        for page in pages_with_text {
            self.add_font_to_page_resources(page, font_id)?;
        }

        Ok(())
    }

    /// Encode buffered text operations and add them to the content buffers
    fn encode_buffered_text(&mut self) -> Result<BTreeSet<usize>> {
        let text_ops: Vec<BufferedTextOp> = std::mem::take(&mut self.buffered_text_ops);
        let font = self
            .font
            .as_ref()
            .ok_or_else(|| PdfError::FontNotFound("No font set".to_string()))?;

        let mut pages = BTreeSet::new();
        for op in text_ops {
            let operand = font.encode_text(&op.text);
            let ctx = TextRenderContext {
                font_name: self.font_resource_name.clone(),
                font_size: op.font_size,
                rotation: op.rotation,
                color: Color::black(),
            };
            let operators = generate_text_operators(&operand, op.x, op.y, &ctx);

            self.page_content_buffer
                .entry(op.page)
                .or_default()
                .extend_from_slice(&operators);
            pages.insert(op.page);
        }

        Ok(pages)
    }

    /// Flush all buffered content to page streams
    fn flush_content_buffers(&mut self) -> Result<()> {
        let buffers = std::mem::take(&mut self.page_content_buffer);

        for (page, content) in buffers {
            if !content.is_empty() {
                self.append_to_content_stream(page, &content)?;
            }
        }

        Ok(())
    }

    /// Append content to a page's content
    ///
    /// The existing streams are kept untouched and wrapped in `q`/`Q`, so a
    /// graphics state left behind by the template cannot leak into the
    /// appended text.
    fn append_to_content_stream(&mut self, page: usize, content: &[u8]) -> Result<()> {
        let page_id = self.page_id(page)?;

        let existing: Vec<Object> = {
            let page_dict = self
                .inner
                .get_object(page_id)?
                .as_dict()
                .map_err(|_| PdfError::ParseError("Page object is not a dictionary".to_string()))?;

            match page_dict.get(b"Contents") {
                Ok(Object::Reference(ref_id)) => match self.inner.get_object(*ref_id) {
                    Ok(Object::Array(array)) => array.clone(),
                    _ => vec![Object::Reference(*ref_id)],
                },
                Ok(Object::Array(array)) => array.clone(),
                Ok(Object::Stream(stream)) => vec![Object::Stream(stream.clone())],
                _ => Vec::new(),
            }
        };

        let mut contents = Vec::with_capacity(existing.len() + 2);
        let mut appended = Vec::new();
        if !existing.is_empty() {
            let save_id = self
                .inner
                .add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
            contents.push(Object::Reference(save_id));
            for obj in existing {
                match obj {
                    Object::Stream(stream) => {
                        let id = self.inner.add_object(stream);
                        contents.push(Object::Reference(id));
                    }
                    other => contents.push(other),
                }
            }
            appended.extend_from_slice(b"\nQ\n");
        }
        appended.extend_from_slice(content);

        let stream_id = self
            .inner
            .add_object(Stream::new(Dictionary::new(), appended));
        contents.push(Object::Reference(stream_id));

        let page_dict = self
            .inner
            .get_object_mut(page_id)?
            .as_dict_mut()
            .map_err(|_| PdfError::ParseError("Page object is not a dictionary".to_string()))?;
        page_dict.set("Contents", Object::Array(contents));

        Ok(())
    }

    /// Embed the active font and return the font dictionary id
    fn embed_font(&mut self) -> Result<ObjectId> {
        let font = self
            .font
            .as_ref()
            .ok_or_else(|| PdfError::FontNotFound("No font set".to_string()))?;

        let font_data = match font {
            FontSource::Standard(standard) => {
                return Ok(self.inner.add_object(standard.to_dictionary()));
            }
            FontSource::Embedded(data) => data,
        };

        // Generate all PDF objects for the font
        let font_objects = font_data.to_pdf_objects()?;

        let font_file_id = self.inner.add_object(font_objects.font_file_stream);

        let mut font_descriptor = font_objects.font_descriptor;
        font_descriptor.set("FontFile2", Object::Reference(font_file_id));
        let font_descriptor_id = self.inner.add_object(font_descriptor);

        let mut cid_font = font_objects.cid_font;
        cid_font.set("FontDescriptor", Object::Reference(font_descriptor_id));
        let cid_font_id = self.inner.add_object(cid_font);

        let mut type0_font = font_objects.type0_font;
        type0_font.set(
            "DescendantFonts",
            Object::Array(vec![Object::Reference(cid_font_id)]),
        );

        let tounicode_id = self.inner.add_object(font_objects.tounicode_stream);
        type0_font.set("ToUnicode", Object::Reference(tounicode_id));

        Ok(self.inner.add_object(type0_font))
    }

    /// Register the font in a page's Resources dictionary
    ///
    /// Resources inherited from the page tree or stored as references are
    /// copied into a direct dictionary on the page so other pages sharing
    /// them are not affected.
    fn add_font_to_page_resources(&mut self, page: usize, font_id: ObjectId) -> Result<()> {
        let page_id = self.page_id(page)?;

        let mut resources_dict = self
            .inherited_attribute(page_id, b"Resources")
            .and_then(|obj| obj.as_dict().ok())
            .cloned()
            .unwrap_or_default();

        let mut font_dict = resources_dict
            .get(b"Font")
            .ok()
            .map(|obj| form::resolve(&self.inner, obj))
            .and_then(|obj| obj.as_dict().ok())
            .cloned()
            .unwrap_or_default();

        font_dict.set(
            self.font_resource_name.as_bytes(),
            Object::Reference(font_id),
        );
        resources_dict.set("Font", Object::Dictionary(font_dict));

        let page_dict = self
            .inner
            .get_object_mut(page_id)?
            .as_dict_mut()
            .map_err(|_| PdfError::SaveError("Page object is not a dictionary".to_string()))?;
        page_dict.set("Resources", Object::Dictionary(resources_dict));

        Ok(())
    }

    /// Get a reference to the underlying lopdf document
    pub fn inner(&self) -> &Document {
        &self.inner
    }

    /// Get a mutable reference to the underlying lopdf document
    pub fn inner_mut(&mut self) -> &mut Document {
        &mut self.inner
    }
}

/// Width and height of a MediaBox array
fn media_box_size(array: &[Object]) -> Option<(f64, f64)> {
    if array.len() < 4 {
        return None;
    }
    let x1 = object_to_f64(&array[0])?;
    let y1 = object_to_f64(&array[1])?;
    let x2 = object_to_f64(&array[2])?;
    let y2 = object_to_f64(&array[3])?;
    Some(((x2 - x1).abs(), (y2 - y1).abs()))
}

/// Choose a font resource name no page of the document already uses
fn pick_font_resource_name(doc: &Document) -> String {
    let mut taken: HashSet<Vec<u8>> = HashSet::new();

    for obj in doc.objects.values() {
        let Ok(dict) = obj.as_dict() else {
            continue;
        };
        let Ok(resources) = dict.get(b"Resources") else {
            continue;
        };
        let Ok(resources) = form::resolve(doc, resources).as_dict() else {
            continue;
        };
        if let Ok(fonts) = resources.get(b"Font") {
            if let Ok(fonts) = form::resolve(doc, fonts).as_dict() {
                taken.extend(fonts.iter().map(|(name, _)| name.clone()));
            }
        }
    }

    (1..)
        .map(|n| format!("WbF{n}"))
        .find(|name| !taken.contains(name.as_bytes()))
        .unwrap_or_else(|| "WbF1".to_string())
}
