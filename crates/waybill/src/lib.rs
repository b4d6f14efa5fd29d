//! Waybill - fill PDF waybill templates with driver and trip data
//!
//! This crate provides:
//! - Driver profiles and the JSON roster they are stored in
//! - Trip input and resolution of the display values drawn on a waybill
//! - Coordinate mappings (field placements) stored next to each template
//! - An editing session for building mappings
//! - The fill engine: mapping path, form-field discovery path, flattening
//! - An async service that loads, fills and writes a waybill
//!
//! # Example
//!
//! ```ignore
//! use waybill::{AppConfig, DriverRoster, WaybillInput, WaybillService};
//!
//! let config = AppConfig::from_env();
//! let roster = DriverRoster::load(config.drivers_file())?;
//! let driver = roster.find(&"1700000000000".into()).unwrap().clone();
//! let input = WaybillInput::from_defaults(driver.waybill_template.as_ref());
//!
//! let outcome = WaybillService::new(config)
//!     .generate("blank.pdf", &driver, &input)
//!     .await;
//! println!("{}", serde_json::to_string_pretty(&outcome)?);
//! ```

mod config;
mod driver;
mod filler;
mod fonts;
mod mapping;
mod rules;
mod service;
mod session;
mod templates;
mod values;

#[cfg(test)]
mod testing;

pub use config::{AppConfig, FillOptions};
pub use driver::{
    format_date_range, iso_to_display_date, suggest_waybill_number, Driver, DriverId,
    DriverRoster, Odometer, TripDefaults, WaybillInput,
};
pub use filler::{baseline_correction, render_waybill, FillMode, FillReport};
pub use fonts::resolve_font;
pub use mapping::{FieldMapping, FieldPlacement, MappingStore};
pub use rules::{match_field, FieldRule, FIELD_RULES};
pub use service::{output_file_name, sanitize_file_component, GenerateOutcome, WaybillService};
pub use session::{field_label, MappingSession};
pub use templates::{delete_template, import_template, inspect_fields, list_templates};
pub use values::{resolve_values, ResolvedValues, VALUE_KEYS};

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while managing or filling waybills
#[derive(Debug, Error)]
pub enum WaybillError {
    #[error("Template not found: {}", path.display())]
    MissingTemplate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("PDF error: {0}")]
    Pdf(#[from] pdf_core::PdfError),

    #[error("Failed to write output: {0}")]
    Serialization(String),

    #[error("Driver not found: {0}")]
    DriverNotFound(String),

    #[error("Invalid driver: {}", .0.join("; "))]
    InvalidDriver(Vec<String>),

    #[error("Unknown value key: {0}")]
    UnknownValueKey(String),

    #[error("Invalid template name: {0}")]
    InvalidTemplateName(String),

    #[error("Background task failed: {0}")]
    Task(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for waybill operations
pub type Result<T> = std::result::Result<T, WaybillError>;
