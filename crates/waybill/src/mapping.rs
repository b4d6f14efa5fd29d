//! Coordinate mappings: where each value is drawn on a template

use crate::{Result, WaybillError};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Suffix appended to the template file name for its mapping sidecar
const MAPPING_SUFFIX: &str = ".mapping.json";

fn default_font_size() -> u32 {
    10
}

// Lenient field readers: an odd value falls back for its own placement only
// (out-of-range page, font size 0, missing coordinate).

/// Non-negative integer page (or its text), anything else becomes out of range
fn lenient_page<'de, D>(deserializer: D) -> std::result::Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value
        .as_u64()
        .or_else(|| value.as_str().and_then(|text| text.trim().parse().ok()))
        .and_then(|page| usize::try_from(page).ok())
        .unwrap_or(usize::MAX))
}

/// Positive size in points, rounded; anything else becomes 0 (default size)
fn lenient_font_size<'de, D>(deserializer: D) -> std::result::Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let size = value
        .as_f64()
        .or_else(|| value.as_str().and_then(|text| text.trim().parse().ok()))
        .filter(|size: &f64| size.is_finite() && *size > 0.0);
    Ok(size.map(|size| size.round().min(u32::MAX as f64) as u32).unwrap_or(0))
}

/// Finite number, or nothing
fn lenient_number<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value.as_f64().filter(|number| number.is_finite()))
}

/// Text as-is, numbers as their decimal form, anything else empty
fn lenient_text<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(text) => text,
        Value::Number(number) => number.to_string(),
        _ => String::new(),
    })
}

/// One value placed on a template page
///
/// Coordinates are PDF user space (origin bottom-left). Rotation baseline
/// correction happens when drawing and is never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldPlacement {
    #[serde(default, deserialize_with = "lenient_text")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub data_key: String,
    /// Zero-based page index; out of range means the first page
    #[serde(default, deserialize_with = "lenient_page")]
    pub page: usize,
    #[serde(default, deserialize_with = "lenient_number", skip_serializing_if = "Option::is_none")]
    pub pdf_x: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number", skip_serializing_if = "Option::is_none")]
    pub pdf_y: Option<f64>,
    /// Font size in points; 0 means the default size
    #[serde(default = "default_font_size", deserialize_with = "lenient_font_size")]
    pub font_size: u32,
    /// Legacy position as a fraction of the page width
    #[serde(default, deserialize_with = "lenient_number", skip_serializing_if = "Option::is_none")]
    pub x_ratio: Option<f64>,
    /// Legacy position as a fraction of the page height, measured from the top
    #[serde(default, deserialize_with = "lenient_number", skip_serializing_if = "Option::is_none")]
    pub y_ratio: Option<f64>,
    /// Editor display label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl FieldPlacement {
    /// Placement at an absolute point
    pub fn at(
        id: impl Into<String>,
        data_key: impl Into<String>,
        page: usize,
        pdf_x: f64,
        pdf_y: f64,
        font_size: u32,
    ) -> Self {
        Self {
            id: id.into(),
            data_key: data_key.into(),
            page,
            pdf_x: Some(pdf_x),
            pdf_y: Some(pdf_y),
            font_size,
            x_ratio: None,
            y_ratio: None,
            label: None,
        }
    }

    /// Font size to draw with, substituting `default` for 0
    pub fn effective_font_size(&self, default: u32) -> u32 {
        if self.font_size == 0 {
            default
        } else {
            self.font_size
        }
    }

    /// Uncorrected baseline point on a page of the given size
    ///
    /// Stored points win; otherwise the legacy ratios are converted. Each axis
    /// falls back independently. `None` when an axis has neither.
    pub fn position(&self, page_width: f64, page_height: f64) -> Option<(f64, f64)> {
        let x = self
            .pdf_x
            .or_else(|| self.x_ratio.map(|ratio| ratio * page_width))?;
        let y = self
            .pdf_y
            .or_else(|| self.y_ratio.map(|ratio| (1.0 - ratio) * page_height))?;
        Some((x, y))
    }
}

/// All placements for one template, in drawing order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldMapping {
    #[serde(default)]
    pub fields: Vec<FieldPlacement>,
}

impl FieldMapping {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Placements on a zero-based page, in list order
    pub fn fields_on_page(&self, page: usize) -> impl Iterator<Item = &FieldPlacement> {
        self.fields.iter().filter(move |field| field.page == page)
    }
}

/// Reject template names that could escape the templates directory
pub(crate) fn validate_template_name(name: &str) -> Result<()> {
    let bad = name.trim().is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\'])
        || name.contains('\0');
    if bad {
        return Err(WaybillError::InvalidTemplateName(name.to_string()));
    }
    Ok(())
}

/// Reads and writes mapping sidecars in the templates directory
#[derive(Debug, Clone)]
pub struct MappingStore {
    templates_dir: PathBuf,
}

impl MappingStore {
    pub fn new<P: Into<PathBuf>>(templates_dir: P) -> Self {
        Self {
            templates_dir: templates_dir.into(),
        }
    }

    pub fn templates_dir(&self) -> &Path {
        &self.templates_dir
    }

    /// Path of a template file
    pub fn template_path(&self, template_name: &str) -> Result<PathBuf> {
        validate_template_name(template_name)?;
        Ok(self.templates_dir.join(template_name))
    }

    /// Path of a template's sidecar: `<templateName>.mapping.json`
    pub fn mapping_path(&self, template_name: &str) -> Result<PathBuf> {
        validate_template_name(template_name)?;
        Ok(self
            .templates_dir
            .join(format!("{template_name}{MAPPING_SUFFIX}")))
    }

    /// Load a mapping for editing; a missing sidecar is an empty mapping
    pub fn load(&self, template_name: &str) -> Result<FieldMapping> {
        let path = self.mapping_path(template_name)?;
        match std::fs::read_to_string(&path) {
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(FieldMapping::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Write a mapping as pretty-printed JSON, preserving field order
    pub fn save(&self, template_name: &str, mapping: &FieldMapping) -> Result<()> {
        let path = self.mapping_path(template_name)?;
        std::fs::create_dir_all(&self.templates_dir)?;
        let json = serde_json::to_string_pretty(mapping)?;
        std::fs::write(&path, json)?;
        log::debug!(
            "Saved {} placement(s) to {}",
            mapping.len(),
            path.display()
        );
        Ok(())
    }

    /// Load the mapping that drives a fill
    ///
    /// Returns `None` when there is no usable mapping: the sidecar is missing,
    /// unreadable, invalid or has no placements. Problems other than a missing
    /// file are logged at warn level and otherwise ignored.
    pub async fn load_for_fill(&self, template_name: &str) -> Option<FieldMapping> {
        let path = self.mapping_path(template_name).ok()?;
        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                log::warn!("Ignoring unreadable mapping {}: {}", path.display(), e);
                return None;
            }
        };

        match serde_json::from_str::<FieldMapping>(&text) {
            Ok(mapping) if mapping.is_empty() => {
                log::debug!("Mapping {} has no placements", path.display());
                None
            }
            Ok(mapping) => Some(mapping),
            Err(e) => {
                log::warn!("Ignoring malformed mapping {}: {}", path.display(), e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_placement_wire_format() {
        let json = r#"{
            "id": "1760781234567",
            "dataKey": "date",
            "label": "Дата",
            "page": 0,
            "pdfX": 100,
            "pdfY": 700.5,
            "fontSize": 10
        }"#;
        let placement: FieldPlacement = serde_json::from_str(json).unwrap();
        assert_eq!(placement.pdf_x, Some(100.0));
        assert_eq!(placement.label.as_deref(), Some("Дата"));

        let value = serde_json::to_value(&placement).unwrap();
        assert_eq!(value["dataKey"], "date");
        assert_eq!(value["pdfY"], 700.5);
        assert!(value.get("xRatio").is_none());
    }

    #[test]
    fn test_font_size_defaults() {
        let placement: FieldPlacement =
            serde_json::from_str(r#"{"dataKey": "fio", "pdfX": 1, "pdfY": 2}"#).unwrap();
        assert_eq!(placement.font_size, 10);
        assert_eq!(placement.page, 0);

        let zero = FieldPlacement::at("a", "fio", 0, 1.0, 2.0, 0);
        assert_eq!(zero.effective_font_size(10), 10);
        assert_eq!(
            FieldPlacement::at("b", "fio", 0, 1.0, 2.0, 14).effective_font_size(10),
            14
        );
    }

    #[test]
    fn test_odd_values_fall_back_per_placement() {
        let json = r#"{"fields": [
            {"id": 17, "dataKey": "fio", "page": -1, "pdfX": 10, "pdfY": 20, "fontSize": 10.5},
            {"dataKey": "date", "page": "2", "pdfX": "left", "pdfY": 20, "fontSize": -3},
            {"id": "3", "dataKey": "route", "page": null, "pdfX": 5, "pdfY": 6, "fontSize": "12"}
        ]}"#;
        let mapping: FieldMapping = serde_json::from_str(json).unwrap();

        let [first, second, third] = &mapping.fields[..] else {
            panic!("expected three placements");
        };
        assert_eq!(first.id, "17");
        assert_eq!(first.page, usize::MAX);
        assert_eq!(first.font_size, 11);
        assert_eq!(second.page, 2);
        assert_eq!(second.pdf_x, None);
        assert_eq!(second.effective_font_size(10), 10);
        assert_eq!(third.page, usize::MAX);
        assert_eq!(third.font_size, 12);
    }

    #[test]
    fn test_position_prefers_points_then_ratios() {
        let mut placement = FieldPlacement::at("a", "fio", 0, 100.0, 700.0, 10);
        assert_eq!(placement.position(600.0, 800.0), Some((100.0, 700.0)));

        placement.pdf_x = None;
        placement.pdf_y = None;
        placement.x_ratio = Some(0.5);
        placement.y_ratio = Some(0.25);
        assert_eq!(placement.position(600.0, 800.0), Some((300.0, 600.0)));

        placement.y_ratio = None;
        assert_eq!(placement.position(600.0, 800.0), None);
    }

    #[test]
    fn test_template_names_are_validated() {
        let store = MappingStore::new("templates");
        assert!(store.mapping_path("../secret.pdf").is_err());
        assert!(store.mapping_path("").is_err());
        assert_eq!(
            store.mapping_path("blank.pdf").unwrap(),
            Path::new("templates").join("blank.pdf.mapping.json")
        );
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = MappingStore::new(dir.path().join("templates"));

        let mut legacy = FieldPlacement::at("2", "fio", 1, 0.0, 0.0, 12);
        legacy.pdf_x = None;
        legacy.pdf_y = None;
        legacy.x_ratio = Some(0.1);
        legacy.y_ratio = Some(0.2);
        let mapping = FieldMapping {
            fields: vec![FieldPlacement::at("1", "date", 0, 100.0, 700.0, 10), legacy],
        };

        store.save("blank.pdf", &mapping).unwrap();
        assert_eq!(store.load("blank.pdf").unwrap(), mapping);
        assert_eq!(store.load("other.pdf").unwrap(), FieldMapping::default());
    }

    #[tokio::test]
    async fn test_load_for_fill_ignores_bad_sidecars() {
        let dir = tempfile::tempdir().unwrap();
        let store = MappingStore::new(dir.path());

        assert!(store.load_for_fill("missing.pdf").await.is_none());

        std::fs::write(store.mapping_path("broken.pdf").unwrap(), "{ not json").unwrap();
        assert!(store.load_for_fill("broken.pdf").await.is_none());

        std::fs::write(store.mapping_path("empty.pdf").unwrap(), r#"{"fields": []}"#).unwrap();
        assert!(store.load_for_fill("empty.pdf").await.is_none());

        // A single odd placement keeps the rest of the mapping usable
        std::fs::write(
            store.mapping_path("odd.pdf").unwrap(),
            r#"{"fields": [
                {"id": "1", "dataKey": "date", "page": 0, "pdfX": 100, "pdfY": 700, "fontSize": 10},
                {"id": "2", "dataKey": "fio", "page": -1, "pdfX": 100, "pdfY": 650, "fontSize": 10.5}
            ]}"#,
        )
        .unwrap();
        let odd = store.load_for_fill("odd.pdf").await.unwrap();
        assert_eq!(odd.len(), 2);
        assert_eq!(odd.fields[1].font_size, 11);

        let mapping = FieldMapping {
            fields: vec![FieldPlacement::at("1", "date", 0, 100.0, 700.0, 10)],
        };
        store.save("good.pdf", &mapping).unwrap();
        assert_eq!(store.load_for_fill("good.pdf").await, Some(mapping));
    }
}
