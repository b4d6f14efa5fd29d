//! Form field name rules for the discovery path

/// A field-name fragment and the value key it selects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRule {
    /// Lowercase substring searched for in the field name
    pub pattern: &'static str,
    /// Key into the resolved values
    pub key: &'static str,
}

const fn rule(pattern: &'static str, key: &'static str) -> FieldRule {
    FieldRule { pattern, key }
}

/// Ordered rule table; the first rule whose pattern occurs in the name wins
///
/// The order is significant and kept as established: overlapping patterns
/// resolve by position, so `route_number` matches `number`. The one
/// exception is `vehicle_number` and `reg_number`, which sit ahead of
/// `number` and `vehicle` so plate fields get the plate. The bare name
/// patterns come last and only catch names nothing else matched.
pub const FIELD_RULES: &[FieldRule] = &[
    rule("driver_lastname", "lastName"),
    rule("driver_firstname", "firstName"),
    rule("driver_middlename", "middleName"),
    rule("driver_fio", "fio"),
    rule("fio", "fio"),
    rule("license_serial", "licenseSerial"),
    rule("license_date", "licenseDate"),
    rule("license_number", "license"),
    rule("license", "license"),
    rule("snils", "snils"),
    rule("waybill_date", "date"),
    rule("date", "date"),
    rule("waybill_number", "number"),
    rule("vehicle_number", "vehicleNumber"),
    rule("reg_number", "vehicleNumber"),
    rule("number", "number"),
    rule("vehicle_model", "vehicleModel"),
    rule("vehicle", "vehicleModel"),
    rule("departure_point", "departurePoint"),
    rule("destination", "destination"),
    rule("departure_time", "departureTime"),
    rule("return_time", "returnTime"),
    rule("odometer_start", "odometerStart"),
    rule("odometer_end", "odometerEnd"),
    rule("route", "route"),
    rule("task", "route"),
    rule("lastname", "lastName"),
    rule("firstname", "firstName"),
    rule("middlename", "middleName"),
];

/// The rule selected for a form field name, if any
pub fn match_field(field_name: &str) -> Option<&'static FieldRule> {
    let lowered = field_name.to_lowercase();
    FIELD_RULES
        .iter()
        .find(|rule| lowered.contains(rule.pattern))
}
