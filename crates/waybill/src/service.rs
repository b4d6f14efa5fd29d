//! Async waybill generation: load, fill, write

use crate::config::AppConfig;
use crate::driver::{Driver, WaybillInput};
use crate::filler::{render_waybill, FillMode, FillReport};
use crate::fonts::resolve_font;
use crate::values::resolve_values;
use crate::{Result, WaybillError};
use chrono::Utc;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::path::PathBuf;

/// Characters that may not appear in an output file name
const RESERVED_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Result of one generation, as reported to callers
#[derive(Debug, Clone, PartialEq)]
pub enum GenerateOutcome {
    Success {
        file_name: String,
        file_path: PathBuf,
        report: FillReport,
    },
    Failure {
        error: String,
    },
}

impl GenerateOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, GenerateOutcome::Success { .. })
    }
}

impl Serialize for GenerateOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            GenerateOutcome::Success {
                file_name,
                file_path,
                report,
            } => {
                let mut map = serializer.serialize_map(None)?;
                map.serialize_entry("success", &true)?;
                map.serialize_entry("fileName", file_name)?;
                map.serialize_entry("filePath", &file_path.to_string_lossy())?;
                map.serialize_entry("fieldsFilled", &report.fields_filled)?;
                map.serialize_entry("fieldsFound", &report.fields_found)?;
                match report.mode {
                    FillMode::Mapping => map.serialize_entry("usedMapping", &true)?,
                    FillMode::Discovery => map.serialize_entry("fieldNames", &report.field_names)?,
                }
                map.end()
            }
            GenerateOutcome::Failure { error } => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("success", &false)?;
                map.serialize_entry("error", error)?;
                map.end()
            }
        }
    }
}

/// Replace path separators, reserved and control characters with `_`
pub fn sanitize_file_component(component: &str) -> String {
    let cleaned: String = component
        .trim()
        .chars()
        .map(|c| {
            if RESERVED_CHARS.contains(&c) || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        "_".to_string()
    } else {
        cleaned
    }
}

/// Output file name for a filled waybill
///
/// `<lastName>_<timestamp>.pdf` for mapping fills,
/// `<lastName>_<firstName>_<timestamp>.pdf` for discovery fills.
pub fn output_file_name(driver: &Driver, mode: FillMode, timestamp: &str) -> String {
    let last_name = sanitize_file_component(&driver.last_name);
    match mode {
        FillMode::Mapping => format!("{last_name}_{timestamp}.pdf"),
        FillMode::Discovery => format!(
            "{}_{}_{}.pdf",
            last_name,
            sanitize_file_component(&driver.first_name),
            timestamp
        ),
    }
}

/// UTC instant with colons replaced and fractional seconds dropped
fn file_timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H-%M-%S").to_string()
}

/// Generates waybills from the templates in the configured data directory
#[derive(Debug, Clone)]
pub struct WaybillService {
    config: AppConfig,
}

impl WaybillService {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Fill a template for a driver and trip and write it to the output directory
    ///
    /// Never fails: errors are reported in the outcome.
    pub async fn generate(
        &self,
        template_name: &str,
        driver: &Driver,
        input: &WaybillInput,
    ) -> GenerateOutcome {
        match self.try_generate(template_name, driver, input).await {
            Ok(outcome) => outcome,
            Err(e) => {
                log::error!("Waybill generation from {} failed: {}", template_name, e);
                GenerateOutcome::Failure {
                    error: e.to_string(),
                }
            }
        }
    }

    async fn try_generate(
        &self,
        template_name: &str,
        driver: &Driver,
        input: &WaybillInput,
    ) -> Result<GenerateOutcome> {
        let store = self.config.mapping_store();
        let template_path = store.template_path(template_name)?;
        let template = tokio::fs::read(&template_path)
            .await
            .map_err(|e| WaybillError::MissingTemplate {
                path: template_path.clone(),
                source: e,
            })?;

        let mapping = store.load_for_fill(template_name).await;
        let values = resolve_values(driver, input);
        let font_candidates = self.config.font_candidates.clone();
        let options = self.config.fill;

        // PDF mutation is synchronous; keep it off the async workers
        let (bytes, report) = match tokio::task::spawn_blocking(move || {
            let font = resolve_font(&font_candidates);
            render_waybill(&template, &values, mapping.as_ref(), font, &options)
        })
        .await
        {
            Ok(Ok(rendered)) => rendered,
            Ok(Err(e)) => return Err(e),
            Err(e) => return Err(WaybillError::Task(e.to_string())),
        };

        let file_name = output_file_name(driver, report.mode, &file_timestamp());
        let file_path = self.config.output_dir.join(&file_name);
        tokio::fs::create_dir_all(&self.config.output_dir).await?;
        tokio::fs::write(&file_path, &bytes)
            .await
            .map_err(|e| WaybillError::Serialization(format!("{}: {}", file_path.display(), e)))?;

        log::info!(
            "Generated {} ({:?}, {} field(s) filled, font {})",
            file_path.display(),
            report.mode,
            report.fields_filled,
            report.font_name
        );

        Ok(GenerateOutcome::Success {
            file_name,
            file_path,
            report,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{FieldMapping, FieldPlacement};
    use crate::testing::{template_pdf, TestWidget};
    use pdf_core::FlattenReport;
    use pretty_assertions::assert_eq;

    fn service(dir: &std::path::Path) -> WaybillService {
        let config = AppConfig::new()
            .with_data_dir(dir.join("data"))
            .with_output_dir(dir.join("out"))
            .with_font_candidates(Vec::new());
        config.ensure_dirs().unwrap();
        WaybillService::new(config)
    }

    fn driver() -> Driver {
        Driver::new("Ivanov", "Petr")
    }

    #[test]
    fn test_sanitize_file_component() {
        assert_eq!(sanitize_file_component("Иванов"), "Иванов");
        assert_eq!(sanitize_file_component("a/b\\c:d"), "a_b_c_d");
        assert_eq!(sanitize_file_component(" .. "), "_");
        assert_eq!(sanitize_file_component(""), "_");
    }

    #[test]
    fn test_output_file_names() {
        let ts = "2026-10-18T09-30-00";
        assert_eq!(
            output_file_name(&driver(), FillMode::Mapping, ts),
            "Ivanov_2026-10-18T09-30-00.pdf"
        );
        assert_eq!(
            output_file_name(&driver(), FillMode::Discovery, ts),
            "Ivanov_Petr_2026-10-18T09-30-00.pdf"
        );
    }

    #[test]
    fn test_outcome_json() {
        let report = FillReport {
            mode: FillMode::Discovery,
            fields_filled: 0,
            fields_found: 0,
            field_names: Vec::new(),
            font_name: "Helvetica".to_string(),
            flatten: FlattenReport::default(),
        };
        let outcome = GenerateOutcome::Success {
            file_name: "a.pdf".to_string(),
            file_path: PathBuf::from("out/a.pdf"),
            report,
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "success": true,
                "fileName": "a.pdf",
                "filePath": "out/a.pdf",
                "fieldsFilled": 0,
                "fieldsFound": 0,
                "fieldNames": [],
            })
        );

        let failure = GenerateOutcome::Failure {
            error: "boom".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&failure).unwrap(),
            serde_json::json!({ "success": false, "error": "boom" })
        );
    }

    #[tokio::test]
    async fn test_generate_with_mapping() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path());
        let templates = service.config().templates_dir();
        std::fs::write(templates.join("blank.pdf"), template_pdf(&[0], &[])).unwrap();
        let mapping = FieldMapping {
            fields: vec![FieldPlacement::at("1", "fio", 0, 100.0, 700.0, 10)],
        };
        service.config().mapping_store().save("blank.pdf", &mapping).unwrap();

        let outcome = service
            .generate("blank.pdf", &driver(), &WaybillInput::default())
            .await;
        let GenerateOutcome::Success {
            file_name,
            file_path,
            report,
        } = outcome
        else {
            panic!("expected success, got {outcome:?}");
        };
        assert!(file_name.starts_with("Ivanov_"));
        assert!(file_path.is_file());
        assert_eq!(report.mode, FillMode::Mapping);
        assert_eq!(report.fields_filled, 1);
        assert_eq!(report.fields_found, 1);
    }

    #[tokio::test]
    async fn test_odd_placement_keeps_mapping_path() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path());
        let templates = service.config().templates_dir();
        std::fs::write(
            templates.join("form.pdf"),
            template_pdf(&[0], &[TestWidget::new("lastname", 0, [10, 10, 200, 30])]),
        )
        .unwrap();
        std::fs::write(
            templates.join("form.pdf.mapping.json"),
            r#"{"fields": [
                {"id": "1", "dataKey": "lastName", "page": 0, "pdfX": 100, "pdfY": 700, "fontSize": 10},
                {"id": "2", "dataKey": "firstName", "page": -1, "pdfX": 100, "pdfY": 650, "fontSize": 10.5}
            ]}"#,
        )
        .unwrap();

        let outcome = service
            .generate("form.pdf", &driver(), &WaybillInput::default())
            .await;
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["usedMapping"], true);
        assert_eq!(json["fieldsFilled"], 2);
        assert_eq!(json["fieldsFound"], 2);
        assert!(json["fileName"].as_str().unwrap().starts_with("Ivanov_2"));
    }

    #[tokio::test]
    async fn test_generate_discovery_without_mapping() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path());
        let templates = service.config().templates_dir();
        std::fs::write(
            templates.join("form.pdf"),
            template_pdf(&[0], &[TestWidget::new("lastname", 0, [10, 10, 200, 30])]),
        )
        .unwrap();
        // Malformed sidecar counts as no mapping
        std::fs::write(templates.join("form.pdf.mapping.json"), "{ not json").unwrap();

        let outcome = service
            .generate("form.pdf", &driver(), &WaybillInput::default())
            .await;
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["fieldsFound"], 1);
        assert_eq!(json["fieldsFilled"], 1);
        assert!(json["fileName"].as_str().unwrap().starts_with("Ivanov_Petr_"));
        assert!(json.get("usedMapping").is_none());
    }

    #[tokio::test]
    async fn test_missing_template_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path());

        let outcome = service
            .generate("absent.pdf", &driver(), &WaybillInput::default())
            .await;
        match outcome {
            GenerateOutcome::Failure { error } => assert!(error.contains("absent.pdf")),
            other => panic!("expected failure, got {other:?}"),
        }
    }
}
