//! Interactive form (AcroForm) discovery and flattening

use crate::page::Rect;
use crate::{PdfError, Result};
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::{HashMap, HashSet};

/// Maximum depth of the field hierarchy that is walked
const MAX_FIELD_DEPTH: usize = 32;

/// The visual representation of a form field on a page
#[derive(Debug, Clone, PartialEq)]
pub struct Widget {
    /// Object id of the widget annotation, when it is an indirect object
    pub id: Option<ObjectId>,
    /// Widget rectangle, if the annotation carries a valid `/Rect`
    pub rect: Option<Rect>,
    /// Page reference from the widget's `/P` entry
    pub page_ref: Option<ObjectId>,
}

/// A terminal form field with its widgets
#[derive(Debug, Clone, PartialEq)]
pub struct FormField {
    /// Fully qualified field name (partial names joined with `.`)
    pub name: String,
    /// Widgets of the field (a field may appear on several pages)
    pub widgets: Vec<Widget>,
}

/// Summary of a flattening pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlattenReport {
    /// Widget annotations removed from page `/Annots` arrays
    pub widgets_removed: usize,
    /// Pages whose `/Annots` entry was dropped because nothing remained
    pub annots_dropped: usize,
    /// Whether the catalog had an `/AcroForm` entry that was removed
    pub acroform_removed: bool,
}

impl FlattenReport {
    /// True when the pass did not change the document
    pub fn is_noop(&self) -> bool {
        self.widgets_removed == 0 && self.annots_dropped == 0 && !self.acroform_removed
    }
}

/// Decode a PDF text string (UTF-16BE with BOM, UTF-8 with BOM, or PDFDocEncoding)
pub fn decode_text_string(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    if bytes.len() >= 3 && bytes[..3] == [0xEF, 0xBB, 0xBF] {
        return String::from_utf8_lossy(&bytes[3..]).into_owned();
    }
    // PDFDocEncoding agrees with Latin-1 for the printable range
    bytes.iter().map(|&b| b as char).collect()
}

/// Follow indirect references to the underlying object
pub(crate) fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    let mut current = obj;
    // Reference chains are short; bail out on cycles
    for _ in 0..8 {
        match current {
            Object::Reference(id) => match doc.get_object(*id) {
                Ok(target) => current = target,
                Err(_) => return current,
            },
            _ => return current,
        }
    }
    current
}

/// Object id of the document catalog
pub(crate) fn catalog_id(doc: &Document) -> Result<ObjectId> {
    doc.trailer
        .get(b"Root")
        .map_err(|_| PdfError::ParseError("Document trailer missing Root entry".to_string()))?
        .as_reference()
        .map_err(|_| PdfError::ParseError("Root is not a reference".to_string()))
}

fn acroform_dict(doc: &Document) -> Option<&Dictionary> {
    let catalog = doc.get_object(catalog_id(doc).ok()?).ok()?.as_dict().ok()?;
    let acroform = catalog.get(b"AcroForm").ok()?;
    resolve(doc, acroform).as_dict().ok()
}

fn is_widget_dict(dict: &Dictionary) -> bool {
    matches!(dict.get(b"Subtype"), Ok(Object::Name(name)) if name == b"Widget")
}

fn partial_name(dict: &Dictionary) -> Option<String> {
    match dict.get(b"T") {
        Ok(Object::String(bytes, _)) => Some(decode_text_string(bytes)),
        _ => None,
    }
}

fn widget_from_dict(doc: &Document, id: Option<ObjectId>, dict: &Dictionary) -> Widget {
    let rect = dict
        .get(b"Rect")
        .ok()
        .and_then(|obj| resolve(doc, obj).as_array().ok())
        .and_then(|array| Rect::from_pdf_array(array));
    let page_ref = match dict.get(b"P") {
        Ok(Object::Reference(page_id)) => Some(*page_id),
        _ => None,
    };

    Widget { id, rect, page_ref }
}

/// Enumerate all terminal form fields of the document
///
/// Walks `/AcroForm /Fields` and nested `/Kids`. Kids carrying a partial name
/// (`/T`) are child fields; kids without one are widgets of their parent.
/// Documents without an interactive form yield an empty list.
pub(crate) fn collect_form_fields(doc: &Document) -> Vec<FormField> {
    let Some(acroform) = acroform_dict(doc) else {
        return Vec::new();
    };
    let fields = match acroform.get(b"Fields").map(|obj| resolve(doc, obj)) {
        Ok(Object::Array(fields)) => fields,
        _ => return Vec::new(),
    };

    let mut visited = HashSet::new();
    let mut out = Vec::new();
    for entry in fields {
        walk_field(doc, entry, None, 0, &mut visited, &mut out);
    }
    out
}

fn walk_field(
    doc: &Document,
    entry: &Object,
    parent_name: Option<&str>,
    depth: usize,
    visited: &mut HashSet<ObjectId>,
    out: &mut Vec<FormField>,
) {
    if depth > MAX_FIELD_DEPTH {
        return;
    }
    let id = match entry {
        Object::Reference(id) => {
            if !visited.insert(*id) {
                return;
            }
            Some(*id)
        }
        _ => None,
    };
    let Ok(dict) = resolve(doc, entry).as_dict() else {
        return;
    };

    let name = match (parent_name, partial_name(dict)) {
        (Some(parent), Some(partial)) => format!("{parent}.{partial}"),
        (None, Some(partial)) => partial,
        (Some(parent), None) => parent.to_string(),
        (None, None) => String::new(),
    };

    let mut widgets = Vec::new();
    let mut has_child_fields = false;

    if is_widget_dict(dict) {
        widgets.push(widget_from_dict(doc, id, dict));
    }

    if let Ok(Object::Array(kids)) = dict.get(b"Kids").map(|obj| resolve(doc, obj)) {
        for kid in kids {
            let kid_id = match kid {
                Object::Reference(kid_id) => Some(*kid_id),
                _ => None,
            };
            let Ok(kid_dict) = resolve(doc, kid).as_dict() else {
                continue;
            };
            if kid_dict.has(b"T") {
                has_child_fields = true;
                walk_field(doc, kid, Some(&name), depth + 1, visited, out);
            } else {
                widgets.push(widget_from_dict(doc, kid_id, kid_dict));
            }
        }
    }

    if !has_child_fields || !widgets.is_empty() {
        out.push(FormField { name, widgets });
    }
}

/// Map widget annotation ids to the index of the page listing them in `/Annots`
pub(crate) fn annotation_page_index(doc: &Document) -> HashMap<ObjectId, usize> {
    let mut lookup = HashMap::new();
    for (index, page_id) in doc.get_pages().values().enumerate() {
        let Ok(page) = doc.get_object(*page_id).and_then(|obj| obj.as_dict()) else {
            continue;
        };
        if let Ok(Object::Array(annots)) = page.get(b"Annots").map(|obj| resolve(doc, obj)) {
            for annot in annots {
                if let Object::Reference(annot_id) = annot {
                    lookup.entry(*annot_id).or_insert(index);
                }
            }
        }
    }
    lookup
}

fn is_widget_annotation(doc: &Document, annot: &Object) -> bool {
    resolve(doc, annot)
        .as_dict()
        .map(is_widget_dict)
        .unwrap_or(false)
}

/// Remove every widget annotation and the `/AcroForm` dictionary
///
/// Pages left with no annotations lose their `/Annots` entry. Non-widget
/// annotations (links, comments) are kept in their original order. Running
/// the pass on an already flattened document changes nothing.
pub(crate) fn flatten_form(doc: &mut Document) -> Result<FlattenReport> {
    let mut report = FlattenReport::default();
    let page_ids: Vec<ObjectId> = doc.get_pages().values().copied().collect();

    for page_id in page_ids {
        let annots: Vec<Object> = {
            let page = doc
                .get_object(page_id)?
                .as_dict()
                .map_err(|_| PdfError::ParseError("Page object is not a dictionary".to_string()))?;
            match page.get(b"Annots").map(|obj| resolve(doc, obj)) {
                Ok(Object::Array(annots)) => annots.clone(),
                Ok(_) => Vec::new(),
                Err(_) => continue,
            }
        };

        let before = annots.len();
        let keep: Vec<Object> = annots
            .into_iter()
            .filter(|annot| !is_widget_annotation(doc, annot))
            .collect();
        let removed = before - keep.len();

        if removed == 0 && !keep.is_empty() {
            continue;
        }

        let page = doc
            .get_object_mut(page_id)?
            .as_dict_mut()
            .map_err(|_| PdfError::ParseError("Page object is not a dictionary".to_string()))?;
        if keep.is_empty() {
            page.remove(b"Annots");
            report.annots_dropped += 1;
        } else {
            page.set("Annots", Object::Array(keep));
        }
        report.widgets_removed += removed;
    }

    let root_id = catalog_id(doc)?;
    let catalog = doc
        .get_object_mut(root_id)?
        .as_dict_mut()
        .map_err(|_| PdfError::ParseError("Catalog is not a dictionary".to_string()))?;
    report.acroform_removed = catalog.remove(b"AcroForm").is_some();

    log::debug!(
        "Flattened form: {} widget(s) removed, {} page(s) without annotations, acroform removed: {}",
        report.widgets_removed,
        report.annots_dropped,
        report.acroform_removed
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, StringFormat};

    fn text(s: &str) -> Object {
        Object::String(s.as_bytes().to_vec(), StringFormat::Literal)
    }

    /// One page, a parent field "driver" with a child "fio" that has two widgets
    fn nested_form_document() -> (Document, ObjectId) {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let page_id = doc.new_object_id();

        let widget_a = doc.add_object(dictionary! {
            "Type" => "Annot",
            "Subtype" => "Widget",
            "Rect" => vec![10.into(), 20.into(), 110.into(), 40.into()],
            "P" => page_id,
        });
        let widget_b = doc.add_object(dictionary! {
            "Type" => "Annot",
            "Subtype" => "Widget",
            "Rect" => vec![10.into(), 60.into(), 110.into(), 80.into()],
        });
        let link = doc.add_object(dictionary! {
            "Type" => "Annot",
            "Subtype" => "Link",
            "Rect" => vec![0.into(), 0.into(), 5.into(), 5.into()],
        });
        let child = doc.add_object(dictionary! {
            "T" => text("fio"),
            "FT" => "Tx",
            "Kids" => vec![widget_a.into(), widget_b.into()],
        });
        let parent = doc.add_object(dictionary! {
            "T" => text("driver"),
            "Kids" => vec![child.into()],
        });
        doc.objects.insert(
            page_id,
            Object::Dictionary(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
                "Annots" => vec![widget_a.into(), link.into(), widget_b.into()],
            }),
        );
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
            "AcroForm" => dictionary! { "Fields" => vec![parent.into()] },
        });
        doc.trailer.set("Root", catalog_id);
        (doc, page_id)
    }

    #[test]
    fn test_decode_text_string() {
        assert_eq!(decode_text_string(b"Vehicle_Number_1"), "Vehicle_Number_1");
        assert_eq!(decode_text_string(&[0xFE, 0xFF, 0x04, 0x24, 0x04, 0x18]), "ФИ");
        assert_eq!(decode_text_string(&[0xEF, 0xBB, 0xBF, 0xD0, 0x96]), "Ж");
        assert_eq!(decode_text_string(&[0x63, 0x61, 0x66, 0xE9]), "café");
    }

    #[test]
    fn test_collect_nested_fields() {
        let (doc, page_id) = nested_form_document();
        let fields = collect_form_fields(&doc);

        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].name, "driver.fio");
        assert_eq!(fields[0].widgets.len(), 2);
        assert_eq!(fields[0].widgets[0].page_ref, Some(page_id));
        assert_eq!(
            fields[0].widgets[0].rect,
            Some(Rect::new(10.0, 20.0, 100.0, 20.0))
        );
        assert_eq!(fields[0].widgets[1].page_ref, None);
    }

    #[test]
    fn test_collect_without_acroform() {
        let (mut doc, _) = nested_form_document();
        let root = catalog_id(&doc).unwrap();
        doc.get_object_mut(root)
            .unwrap()
            .as_dict_mut()
            .unwrap()
            .remove(b"AcroForm");

        assert!(collect_form_fields(&doc).is_empty());
    }

    #[test]
    fn test_annotation_page_index() {
        let (doc, _) = nested_form_document();
        let lookup = annotation_page_index(&doc);
        assert_eq!(lookup.len(), 3);
        assert!(lookup.values().all(|&index| index == 0));
    }

    #[test]
    fn test_flatten_keeps_non_widgets() {
        let (mut doc, page_id) = nested_form_document();
        let report = flatten_form(&mut doc).unwrap();

        assert_eq!(report.widgets_removed, 2);
        assert_eq!(report.annots_dropped, 0);
        assert!(report.acroform_removed);

        let page = doc.get_object(page_id).unwrap().as_dict().unwrap();
        match page.get(b"Annots") {
            Ok(Object::Array(annots)) => assert_eq!(annots.len(), 1),
            other => panic!("expected remaining link annotation, got {other:?}"),
        }
        assert!(collect_form_fields(&doc).is_empty());
    }

    #[test]
    fn test_flatten_is_idempotent() {
        let (mut doc, _) = nested_form_document();
        let first = flatten_form(&mut doc).unwrap();
        assert!(!first.is_noop());

        let second = flatten_form(&mut doc).unwrap();
        assert!(second.is_noop());
    }
}
