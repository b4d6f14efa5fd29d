//! Driver profiles, trip input and the driver roster

use crate::{Result, WaybillError};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Opaque driver identifier
///
/// Rosters written by older versions use millisecond timestamps (numbers);
/// hand-edited rosters may use strings. Both are kept as they were read.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DriverId {
    Number(u64),
    Text(String),
}

impl DriverId {
    /// Parse a user-supplied id, preferring the numeric form
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        match value.parse::<u64>() {
            Ok(number) => DriverId::Number(number),
            Err(_) => DriverId::Text(value.to_string()),
        }
    }
}

impl Default for DriverId {
    fn default() -> Self {
        DriverId::Number(0)
    }
}

impl From<&str> for DriverId {
    fn from(value: &str) -> Self {
        DriverId::parse(value)
    }
}

impl From<u64> for DriverId {
    fn from(value: u64) -> Self {
        DriverId::Number(value)
    }
}

impl fmt::Display for DriverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriverId::Number(number) => write!(f, "{number}"),
            DriverId::Text(text) => f.write_str(text),
        }
    }
}

/// Trip fields remembered per driver and offered as defaults next time
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TripDefaults {
    pub vehicle_model: String,
    pub vehicle_number: String,
    pub departure_point: String,
    pub destination: String,
    pub route: String,
}

/// A driver profile as stored in the roster
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Driver {
    #[serde(default)]
    pub id: DriverId,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub middle_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license_serial: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license_number: Option<String>,
    /// ISO date (`YYYY-MM-DD`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license_date: Option<String>,
    /// Legacy single-field license, used when the split fields are empty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snils: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub waybill_template: Option<TripDefaults>,
}

/// Borrow an optional text field, treating blank values as absent
pub(crate) fn text_of(value: &Option<String>) -> &str {
    value.as_deref().map(str::trim).unwrap_or("")
}

impl Driver {
    /// New driver with the mandatory name fields; the roster assigns the id
    pub fn new(last_name: impl Into<String>, first_name: impl Into<String>) -> Self {
        Self {
            last_name: last_name.into(),
            first_name: first_name.into(),
            ..Self::default()
        }
    }

    /// `Last First Middle`, without a trailing space when the middle name is absent
    pub fn full_name(&self) -> String {
        format!(
            "{} {} {}",
            self.last_name.trim(),
            self.first_name.trim(),
            text_of(&self.middle_name)
        )
        .trim()
        .to_string()
    }

    /// First letters of the last and first names
    pub fn initials(&self) -> String {
        self.last_name
            .trim()
            .chars()
            .take(1)
            .chain(self.first_name.trim().chars().take(1))
            .collect()
    }

    /// Check the fields a waybill cannot be issued without
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();
        if self.last_name.trim().is_empty() {
            errors.push("last name is required".to_string());
        }
        if self.first_name.trim().is_empty() {
            errors.push("first name is required".to_string());
        }
        if text_of(&self.license_serial).is_empty() {
            errors.push("license serial is required".to_string());
        }
        if text_of(&self.license_number).is_empty() {
            errors.push("license number is required".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(WaybillError::InvalidDriver(errors))
        }
    }

    /// Short license line for listings: `serial number`, or the legacy field
    pub fn license_summary(&self) -> Option<String> {
        let joined = [text_of(&self.license_serial), text_of(&self.license_number)]
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if !joined.is_empty() {
            return Some(joined);
        }
        let legacy = text_of(&self.license);
        (!legacy.is_empty()).then(|| legacy.to_string())
    }

    /// Store the vehicle and route of a trip as this driver's defaults
    pub fn remember_trip(&mut self, input: &WaybillInput) {
        self.waybill_template = Some(input.trip_defaults());
    }
}

/// Odometer reading, entered either as a number or as free text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Odometer {
    Int(i64),
    Float(f64),
    Text(String),
}

impl Default for Odometer {
    fn default() -> Self {
        Odometer::Text(String::new())
    }
}

impl Odometer {
    /// Display form; a reading of zero is shown as `0`
    pub fn display(&self) -> String {
        match self {
            Odometer::Int(value) => value.to_string(),
            Odometer::Float(value) if value.is_finite() => format!("{value}"),
            Odometer::Float(_) => String::new(),
            Odometer::Text(text) => text.trim().to_string(),
        }
    }
}

impl From<&str> for Odometer {
    fn from(value: &str) -> Self {
        Odometer::Text(value.to_string())
    }
}

impl From<i64> for Odometer {
    fn from(value: i64) -> Self {
        Odometer::Int(value)
    }
}

/// Trip data entered for one waybill
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WaybillInput {
    /// Display date or date range (see [`format_date_range`])
    pub date: String,
    pub number: String,
    pub vehicle_model: String,
    pub vehicle_number: String,
    pub departure_point: String,
    pub destination: String,
    pub departure_time: String,
    pub return_time: String,
    pub odometer_start: Odometer,
    pub odometer_end: Odometer,
    pub route: String,
}

impl WaybillInput {
    /// Pre-fill the vehicle and route fields from a driver's saved defaults
    pub fn from_defaults(defaults: Option<&TripDefaults>) -> Self {
        let Some(defaults) = defaults else {
            return Self::default();
        };
        Self {
            vehicle_model: defaults.vehicle_model.clone(),
            vehicle_number: defaults.vehicle_number.clone(),
            departure_point: defaults.departure_point.clone(),
            destination: defaults.destination.clone(),
            route: defaults.route.clone(),
            ..Self::default()
        }
    }

    /// The part of the input that is remembered per driver
    pub fn trip_defaults(&self) -> TripDefaults {
        TripDefaults {
            vehicle_model: self.vehicle_model.trim().to_string(),
            vehicle_number: self.vehicle_number.trim().to_string(),
            departure_point: self.departure_point.trim().to_string(),
            destination: self.destination.trim().to_string(),
            route: self.route.trim().to_string(),
        }
    }
}

/// Reformat an ISO date (`YYYY-MM-DD`) as `DD.MM.YYYY`
///
/// Input that is not a full date has its `-`-separated parts reversed and
/// joined with dots, so `2020-05` becomes `05.2020`.
pub fn iso_to_display_date(iso: &str) -> String {
    let iso = iso.trim();
    match NaiveDate::parse_from_str(iso, "%Y-%m-%d") {
        Ok(date) => date.format("%d.%m.%Y").to_string(),
        Err(_) => iso.split('-').rev().collect::<Vec<_>>().join("."),
    }
}

/// Display text for a trip date range given as two ISO dates
///
/// Equal or missing `to` yields a single date; missing `from` yields `to`.
pub fn format_date_range(from: &str, to: &str) -> String {
    let (from, to) = (from.trim(), to.trim());
    if from.is_empty() {
        return iso_to_display_date(to);
    }
    if to.is_empty() || from == to {
        return iso_to_display_date(from);
    }
    format!("{} - {}", iso_to_display_date(from), iso_to_display_date(to))
}

/// Suggested waybill number: `DDMMYYYY-<initials>-<last four digits of millis>`
pub fn suggest_waybill_number(driver: &Driver, today: NaiveDate, millis: i64) -> String {
    let digits = millis.unsigned_abs().to_string();
    let tail = &digits[digits.len().saturating_sub(4)..];
    format!("{}-{}-{}", today.format("%d%m%Y"), driver.initials(), tail)
}

/// The list of drivers, stored as a pretty-printed JSON array
#[derive(Debug, Clone)]
pub struct DriverRoster {
    path: PathBuf,
    drivers: Vec<Driver>,
}

impl DriverRoster {
    /// Load the roster; a missing file is an empty roster
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let drivers = match std::fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => Vec::new(),
            Ok(text) => serde_json::from_str(&text)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No roster at {}, starting empty", path.display());
                Vec::new()
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Self { path, drivers })
    }

    /// Write the whole roster back to its file
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(&self.drivers)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn drivers(&self) -> &[Driver] {
        &self.drivers
    }

    pub fn len(&self) -> usize {
        self.drivers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }

    pub fn find(&self, id: &DriverId) -> Option<&Driver> {
        self.drivers.iter().find(|driver| &driver.id == id)
    }

    pub fn find_mut(&mut self, id: &DriverId) -> Option<&mut Driver> {
        self.drivers.iter_mut().find(|driver| &driver.id == id)
    }

    /// Insert a new driver or replace the one with the same id
    ///
    /// Drivers whose id is not in the roster are treated as new and get a
    /// millisecond-timestamp id. Returns the id the driver is stored under.
    pub fn upsert(&mut self, mut driver: Driver) -> Result<DriverId> {
        driver.validate()?;

        if let Some(existing) = self.find_mut(&driver.id) {
            *existing = driver;
            return Ok(existing.id.clone());
        }

        driver.id = self.fresh_id();
        let id = driver.id.clone();
        self.drivers.push(driver);
        Ok(id)
    }

    fn fresh_id(&self) -> DriverId {
        let mut candidate = Utc::now().timestamp_millis().max(0) as u64;
        while self.find(&DriverId::Number(candidate)).is_some() {
            candidate += 1;
        }
        DriverId::Number(candidate)
    }

    /// Remove a driver, returning the removed profile
    pub fn remove(&mut self, id: &DriverId) -> Result<Driver> {
        let index = self
            .drivers
            .iter()
            .position(|driver| &driver.id == id)
            .ok_or_else(|| WaybillError::DriverNotFound(id.to_string()))?;
        Ok(self.drivers.remove(index))
    }

    /// Drivers whose full name contains `filter`, ignoring case
    pub fn search(&self, filter: &str) -> Vec<&Driver> {
        let needle = filter.trim().to_lowercase();
        self.drivers
            .iter()
            .filter(|driver| driver.full_name().to_lowercase().contains(&needle))
            .collect()
    }
}
