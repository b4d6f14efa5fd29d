//! The fill engine: draw values onto a template and flatten its form

use crate::config::FillOptions;
use crate::mapping::FieldMapping;
use crate::rules::match_field;
use crate::values::ResolvedValues;
use crate::{Result, WaybillError};
use pdf_core::{FlattenReport, FontSource, PageInfo, PdfDocument, Rotation};
use std::fmt;

/// Which way values were placed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillMode {
    /// Placements from the template's coordinate mapping
    Mapping,
    /// Rectangles of the template's own form fields
    Discovery,
}

/// What a fill did
#[derive(Debug, Clone, PartialEq)]
pub struct FillReport {
    pub mode: FillMode,
    /// Placements (mapping) or widgets (discovery) that received text
    pub fields_filled: usize,
    /// Placements in the mapping, or terminal form fields found
    pub fields_found: usize,
    /// Names of the form fields found (discovery only)
    pub field_names: Vec<String>,
    /// Font the text was drawn with
    pub font_name: String,
    pub flatten: FlattenReport,
}

/// Pipeline stages, for logging
#[derive(Debug, Clone, Copy)]
enum FillStage {
    Loaded,
    MappingCheck,
    MappingFill,
    DiscoveryFill,
    Flattened,
    Saved,
}

impl fmt::Display for FillStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FillStage::Loaded => "loaded",
            FillStage::MappingCheck => "mapping check",
            FillStage::MappingFill => "mapping fill",
            FillStage::DiscoveryFill => "discovery fill",
            FillStage::Flattened => "flattened",
            FillStage::Saved => "saved",
        };
        f.write_str(name)
    }
}

/// Move a mapped point from the top of the text to its baseline
///
/// Placements mark where the top of the text should sit as seen in the
/// viewer. The shift runs along the page's visual "down" direction, which in
/// user space depends on the page rotation.
pub fn baseline_correction(x: f64, y: f64, font_size: f64, rotation: Rotation) -> (f64, f64) {
    match rotation {
        Rotation::Deg0 => (x, y - font_size),
        Rotation::Deg90 => (x - font_size, y),
        Rotation::Deg180 => (x, y + font_size),
        Rotation::Deg270 => (x + font_size, y),
    }
}

/// Fill a template and return the flattened output
///
/// A non-empty `mapping` selects the mapping path and nothing else is drawn;
/// otherwise values go into form fields whose names match the rule table.
/// Both paths end with the form flattened.
pub fn render_waybill(
    template: &[u8],
    values: &ResolvedValues,
    mapping: Option<&FieldMapping>,
    font: FontSource,
    options: &FillOptions,
) -> Result<(Vec<u8>, FillReport)> {
    let mut doc = PdfDocument::open_from_bytes(template)?;
    log::debug!("[{}] {} page(s)", FillStage::Loaded, doc.page_count());

    let font_name = font.name().to_string();
    doc.set_font(font);

    let mapping = mapping.filter(|mapping| !mapping.is_empty());
    log::debug!(
        "[{}] {}",
        FillStage::MappingCheck,
        match mapping {
            Some(mapping) => format!("{} placement(s)", mapping.len()),
            None => "no mapping".to_string(),
        }
    );

    let (mode, fields_filled, fields_found, field_names) = match mapping {
        Some(mapping) => {
            let filled = fill_from_mapping(&mut doc, mapping, values, options)?;
            log::debug!("[{}] {} drawn", FillStage::MappingFill, filled);
            (FillMode::Mapping, filled, mapping.len(), Vec::new())
        }
        None => {
            let (filled, names) = fill_from_form(&mut doc, values, options);
            log::debug!(
                "[{}] {} of {} field(s) drawn",
                FillStage::DiscoveryFill,
                filled,
                names.len()
            );
            (FillMode::Discovery, filled, names.len(), names)
        }
    };

    let flatten = doc.flatten_form()?;
    log::debug!(
        "[{}] {} widget(s) removed",
        FillStage::Flattened,
        flatten.widgets_removed
    );

    let bytes = doc
        .to_bytes()
        .map_err(|e| WaybillError::Serialization(e.to_string()))?;
    log::debug!("[{}] {} bytes", FillStage::Saved, bytes.len());

    Ok((
        bytes,
        FillReport {
            mode,
            fields_filled,
            fields_found,
            field_names,
            font_name,
            flatten,
        },
    ))
}

/// Draw every mapped placement, in list order
fn fill_from_mapping(
    doc: &mut PdfDocument,
    mapping: &FieldMapping,
    values: &ResolvedValues,
    options: &FillOptions,
) -> Result<usize> {
    let pages = doc.pages()?;
    let Some(first_page) = pages.first().copied() else {
        log::warn!("Template has no pages, nothing to fill");
        return Ok(0);
    };

    let mut filled = 0;
    for placement in &mapping.fields {
        let page: PageInfo = match pages.get(placement.page) {
            Some(page) => *page,
            None => {
                log::warn!(
                    "Placement {} targets page {} of {}, using the first page",
                    placement.id,
                    placement.page,
                    pages.len()
                );
                first_page
            }
        };

        let font_size = placement.effective_font_size(options.default_font_size) as f64;
        let Some((x, y)) = placement.position(page.width, page.height) else {
            log::warn!("Placement {} has no position, skipping", placement.id);
            continue;
        };
        let (x, y) = baseline_correction(x, y, font_size, page.rotation);

        let text = values.get(&placement.data_key);
        if text.is_empty() {
            continue;
        }

        // The page rotation doubles as the glyph counter-rotation
        doc.draw_text(text, page.index, x, y, font_size as f32, page.rotation)?;
        filled += 1;
    }

    Ok(filled)
}

/// Draw values into the rectangles of matching form fields
///
/// Returns the number of widgets drawn and the names of all fields found.
/// A widget that cannot be drawn is logged and skipped.
fn fill_from_form(
    doc: &mut PdfDocument,
    values: &ResolvedValues,
    options: &FillOptions,
) -> (usize, Vec<String>) {
    let fields = doc.form_fields();
    let page_by_ref = doc.page_index_by_ref();
    let page_by_annot = doc.annotation_page_index();
    let font_size = options.discovery_font_size;

    let mut filled = 0;
    for field in &fields {
        let Some(rule) = match_field(&field.name) else {
            log::debug!("No rule for field {:?}", field.name);
            continue;
        };
        let text = values.get(rule.key);
        if text.is_empty() {
            log::debug!("Field {:?} matched {} but the value is empty", field.name, rule.key);
            continue;
        }

        for widget in &field.widgets {
            let Some(rect) = widget.rect else {
                log::warn!("Skipping widget of {:?} without a rectangle", field.name);
                continue;
            };
            let page = widget
                .page_ref
                .and_then(|id| page_by_ref.get(&id))
                .or_else(|| widget.id.and_then(|id| page_by_annot.get(&id)))
                .copied()
                .unwrap_or(0);

            let x = rect.x + options.widget_inset;
            let y = rect.y + (rect.height - font_size as f64) / 2.0;
            match doc.draw_text(text, page, x, y, font_size, Rotation::Deg0) {
                Ok(()) => filled += 1,
                Err(e) => log::warn!("Skipping widget of {:?}: {}", field.name, e),
            }
        }
    }

    let names = fields.into_iter().map(|field| field.name).collect();
    (filled, names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{Driver, WaybillInput};
    use crate::mapping::FieldPlacement;
    use crate::testing::{page_content, template_pdf, TestWidget};
    use crate::values::resolve_values;
    use pretty_assertions::assert_eq;

    fn values() -> ResolvedValues {
        let driver = Driver {
            license_serial: Some("77".to_string()),
            license_number: Some("123456".to_string()),
            ..Driver::new("Ivanov", "Petr")
        };
        let input = WaybillInput {
            date: "18.10.2026".to_string(),
            vehicle_number: "A123BC77".to_string(),
            ..WaybillInput::default()
        };
        resolve_values(&driver, &input)
    }

    fn fill(pdf: &[u8], mapping: Option<&FieldMapping>) -> (Vec<u8>, FillReport) {
        render_waybill(
            pdf,
            &values(),
            mapping,
            FontSource::helvetica(),
            &FillOptions::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_baseline_correction_per_rotation() {
        assert_eq!(baseline_correction(100.0, 700.0, 10.0, Rotation::Deg0), (100.0, 690.0));
        assert_eq!(baseline_correction(100.0, 700.0, 10.0, Rotation::Deg90), (90.0, 700.0));
        assert_eq!(baseline_correction(100.0, 700.0, 10.0, Rotation::Deg180), (100.0, 710.0));
        assert_eq!(baseline_correction(100.0, 700.0, 10.0, Rotation::Deg270), (110.0, 700.0));
    }

    #[test]
    fn test_mapping_scenario() {
        let pdf = template_pdf(&[0], &[]);
        let mapping = FieldMapping {
            fields: vec![FieldPlacement::at("1", "date", 0, 100.0, 700.0, 10)],
        };
        let (bytes, report) = fill(&pdf, Some(&mapping));

        assert_eq!(report.mode, FillMode::Mapping);
        assert_eq!(report.fields_filled, 1);
        assert_eq!(report.fields_found, 1);
        let content = page_content(&bytes, 0);
        assert!(content.contains("1 0 0 1 100 690 Tm"));
        assert!(content.contains("(18.10.2026) Tj"));
    }

    #[test]
    fn test_mapping_counts_only_non_empty() {
        let pdf = template_pdf(&[0, 90], &[]);
        let mut no_position = FieldPlacement::at("4", "fio", 0, 0.0, 0.0, 10);
        no_position.pdf_x = None;
        let mapping = FieldMapping {
            fields: vec![
                FieldPlacement::at("1", "fio", 1, 300.0, 400.0, 12),
                FieldPlacement::at("2", "snils", 0, 10.0, 10.0, 10),
                FieldPlacement::at("3", "lastName", 7, 50.0, 60.0, 0),
                no_position,
            ],
        };
        let (bytes, report) = fill(&pdf, Some(&mapping));

        assert_eq!(report.fields_filled, 2);
        assert_eq!(report.fields_found, 4);
        // Rotated page: x shifts, glyphs counter-rotated
        assert!(page_content(&bytes, 1).contains("0 1 -1 0 288 400 Tm"));
        // Out-of-range page lands on page 0 with the default size
        let first = page_content(&bytes, 0);
        assert!(first.contains("1 0 0 1 50 50 Tm"));
        assert!(first.contains("10 Tf"));
        assert!(!first.contains("Ivanov Petr"));
    }

    #[test]
    fn test_mapping_wins_over_form_fields() {
        let pdf = template_pdf(&[0], &[TestWidget::new("Vehicle_Number_1", 0, [100, 700, 300, 720])]);
        let mapping = FieldMapping {
            fields: vec![FieldPlacement::at("1", "date", 0, 100.0, 500.0, 10)],
        };
        let (bytes, report) = fill(&pdf, Some(&mapping));

        assert_eq!(report.mode, FillMode::Mapping);
        assert_eq!(report.fields_filled, 1);
        assert!(!page_content(&bytes, 0).contains("A123BC77"));
        // The form is flattened on this path too
        assert_eq!(report.flatten.widgets_removed, 1);
    }

    #[test]
    fn test_empty_mapping_uses_discovery() {
        let pdf = template_pdf(&[0], &[TestWidget::new("Vehicle_Number_1", 0, [100, 700, 300, 720])]);
        let (bytes, report) = fill(&pdf, Some(&FieldMapping::default()));

        assert_eq!(report.mode, FillMode::Discovery);
        assert_eq!(report.fields_found, 1);
        assert_eq!(report.fields_filled, 1);
        assert_eq!(report.field_names, vec!["Vehicle_Number_1".to_string()]);
        // x = 100 + 2, y = 700 + (20 - 12) / 2
        let content = page_content(&bytes, 0);
        assert!(content.contains("1 0 0 1 102 704 Tm"));
        assert!(content.contains("(A123BC77) Tj"));
        assert!(content.contains("12 Tf"));
    }

    #[test]
    fn test_discovery_page_lookup_and_skips() {
        let mut no_page_ref = TestWidget::new("driver_fio", 1, [10, 10, 210, 30]);
        no_page_ref.with_page_ref = false;
        let pdf = template_pdf(
            &[0, 0],
            &[
                no_page_ref,
                TestWidget::new("snils", 0, [10, 100, 210, 120]),
                TestWidget::new("signature", 0, [10, 200, 210, 220]),
            ],
        );
        let (bytes, report) = fill(&pdf, None);

        assert_eq!(report.fields_found, 3);
        // snils is empty, signature matches no rule
        assert_eq!(report.fields_filled, 1);
        assert!(page_content(&bytes, 1).contains("(Ivanov Petr) Tj"));
        assert!(!page_content(&bytes, 0).contains("Tj"));
    }

    #[test]
    fn test_no_fields_no_mapping() {
        let pdf = template_pdf(&[0], &[]);
        let (_, report) = fill(&pdf, None);

        assert_eq!(report.mode, FillMode::Discovery);
        assert_eq!(report.fields_found, 0);
        assert_eq!(report.fields_filled, 0);
        assert!(report.flatten.is_noop());
    }

    #[test]
    fn test_output_is_flat() {
        let pdf = template_pdf(&[0], &[TestWidget::new("route", 0, [0, 0, 100, 20])]);
        let (bytes, report) = fill(&pdf, None);
        assert!(report.flatten.acroform_removed);

        let doc = PdfDocument::open_from_bytes(&bytes).unwrap();
        assert!(doc.form_fields().is_empty());
    }

    #[test]
    fn test_rejects_non_pdf() {
        let result = render_waybill(
            b"%PDF-garbage",
            &values(),
            None,
            FontSource::helvetica(),
            &FillOptions::default(),
        );
        assert!(matches!(result, Err(WaybillError::Pdf(_))));
    }
}
