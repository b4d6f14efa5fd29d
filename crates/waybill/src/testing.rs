//! In-memory template PDFs for unit tests

use lopdf::{dictionary, Document, Object, Stream, StringFormat};

/// A text widget on a template page
pub(crate) struct TestWidget {
    pub name: &'static str,
    pub page: usize,
    pub rect: [i64; 4],
    /// Whether the widget names its page through `/P`
    pub with_page_ref: bool,
}

impl TestWidget {
    pub fn new(name: &'static str, page: usize, rect: [i64; 4]) -> Self {
        Self {
            name,
            page,
            rect,
            with_page_ref: true,
        }
    }
}

/// Template with one 595x842 page per rotation and the given widgets
pub(crate) fn template_pdf(rotations: &[i64], widgets: &[TestWidget]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let page_ids: Vec<_> = rotations.iter().map(|_| doc.new_object_id()).collect();

    let mut annots: Vec<Vec<Object>> = vec![Vec::new(); rotations.len()];
    let mut fields = Vec::new();
    for widget in widgets {
        let mut dict = dictionary! {
            "Type" => "Annot",
            "Subtype" => "Widget",
            "FT" => "Tx",
            "T" => Object::String(widget.name.as_bytes().to_vec(), StringFormat::Literal),
            "Rect" => widget.rect.iter().map(|&v| Object::Integer(v)).collect::<Vec<_>>(),
        };
        if widget.with_page_ref {
            dict.set("P", page_ids[widget.page]);
        }
        let id = doc.add_object(dict);
        annots[widget.page].push(id.into());
        fields.push(Object::from(id));
    }

    for ((page_id, rotate), page_annots) in page_ids.iter().zip(rotations).zip(annots) {
        let contents_id = doc.add_object(Stream::new(dictionary! {}, b"0 0 m 1 1 l S".to_vec()));
        let mut page = dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            "Rotate" => *rotate,
            "Contents" => contents_id,
        };
        if !page_annots.is_empty() {
            page.set("Annots", page_annots);
        }
        doc.objects.insert(*page_id, Object::Dictionary(page));
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Count" => rotations.len() as i64,
            "Kids" => page_ids.iter().map(|&id| Object::from(id)).collect::<Vec<_>>(),
        }),
    );
    let mut catalog = dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    };
    if !fields.is_empty() {
        catalog.set("AcroForm", dictionary! { "Fields" => fields });
    }
    let catalog_id = doc.add_object(catalog);
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}

/// Concatenated content of a page in saved PDF bytes
pub(crate) fn page_content(pdf: &[u8], index: usize) -> String {
    let doc = Document::load_mem(pdf).unwrap();
    let page_id = doc.get_pages()[&(index as u32 + 1)];
    String::from_utf8_lossy(&doc.get_page_content(page_id).unwrap()).into_owned()
}
