//! Resolution of the display values drawn onto a waybill

use crate::driver::{iso_to_display_date, text_of, Driver, WaybillInput};
use serde::Serialize;
use std::collections::BTreeMap;

/// Every key a mapping or a field rule may refer to
pub const VALUE_KEYS: [&str; 20] = [
    "fio",
    "lastName",
    "firstName",
    "middleName",
    "license",
    "licenseSerial",
    "licenseNumber",
    "licenseDate",
    "snils",
    "date",
    "number",
    "vehicleModel",
    "vehicleNumber",
    "departurePoint",
    "destination",
    "departureTime",
    "returnTime",
    "odometerStart",
    "odometerEnd",
    "route",
];

/// Semantic key -> display string for one fill
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ResolvedValues {
    values: BTreeMap<String, String>,
}

impl ResolvedValues {
    /// Value for a key; unknown keys yield the empty string
    pub fn get(&self, key: &str) -> &str {
        self.values.get(key).map(String::as_str).unwrap_or("")
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    fn set(&mut self, key: &str, value: impl Into<String>) {
        self.values.insert(key.to_string(), value.into());
    }
}

/// Combined license line: serial, number and display date, skipping blanks
///
/// Falls back to the legacy single `license` field, then to an empty string.
fn license_line(driver: &Driver) -> String {
    let date = iso_to_display_date(text_of(&driver.license_date));
    let joined = [
        text_of(&driver.license_serial),
        text_of(&driver.license_number),
        date.as_str(),
    ]
    .into_iter()
    .filter(|part| !part.is_empty())
    .collect::<Vec<_>>()
    .join(" ");

    if joined.is_empty() {
        text_of(&driver.license).to_string()
    } else {
        joined
    }
}

/// Build the value dictionary for a driver and a trip
pub fn resolve_values(driver: &Driver, input: &WaybillInput) -> ResolvedValues {
    let mut values = ResolvedValues::default();

    values.set("fio", driver.full_name());
    values.set("lastName", driver.last_name.trim());
    values.set("firstName", driver.first_name.trim());
    values.set("middleName", text_of(&driver.middle_name));
    values.set("license", license_line(driver));
    values.set("licenseSerial", text_of(&driver.license_serial));
    values.set("licenseNumber", text_of(&driver.license_number));
    // Raw ISO, as stored
    values.set("licenseDate", text_of(&driver.license_date));
    values.set("snils", text_of(&driver.snils));

    // Trip values are copied as entered
    values.set("date", input.date.as_str());
    values.set("number", input.number.as_str());
    values.set("vehicleModel", input.vehicle_model.as_str());
    values.set("vehicleNumber", input.vehicle_number.as_str());
    values.set("departurePoint", input.departure_point.as_str());
    values.set("destination", input.destination.as_str());
    values.set("departureTime", input.departure_time.as_str());
    values.set("returnTime", input.return_time.as_str());
    values.set("odometerStart", input.odometer_start.display());
    values.set("odometerEnd", input.odometer_end.display());
    values.set("route", input.route.as_str());

    values
}
