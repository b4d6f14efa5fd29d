//! Editing session for building a template's coordinate mapping

use crate::mapping::{FieldMapping, FieldPlacement, MappingStore};
use crate::values::VALUE_KEYS;
use crate::{Result, WaybillError};
use chrono::Utc;

/// Display label of a value key; unknown keys are shown as-is
pub fn field_label(key: &str) -> &str {
    match key {
        "fio" => "ФИО",
        "lastName" => "Фамилия",
        "firstName" => "Имя",
        "middleName" => "Отчество",
        "license" => "Вод. удостоверение",
        "licenseSerial" => "Серия ВУ",
        "licenseNumber" => "Номер ВУ",
        "licenseDate" => "Дата выдачи ВУ",
        "snils" => "СНИЛС",
        "date" => "Дата",
        "number" => "Номер ПЛ",
        "vehicleModel" => "Марка ТС",
        "vehicleNumber" => "Гос. номер",
        "departurePoint" => "Отправление",
        "destination" => "Назначение",
        "departureTime" => "Выезд",
        "returnTime" => "Возврат",
        "odometerStart" => "Одометр↑",
        "odometerEnd" => "Одометр↓",
        "route" => "Маршрут",
        other => other,
    }
}

/// A mapping being edited for one template
///
/// Placements are added in PDF user space at the point where the top of the
/// text should appear. Nothing is written until [`MappingSession::save`].
#[derive(Debug, Clone)]
pub struct MappingSession {
    template_name: String,
    mapping: FieldMapping,
    current_page: usize,
    page_count: usize,
}

impl MappingSession {
    /// Start editing, beginning from the template's saved mapping
    pub fn open(store: &MappingStore, template_name: &str, page_count: usize) -> Result<Self> {
        let mapping = store.load(template_name)?;
        Ok(Self {
            template_name: template_name.to_string(),
            mapping,
            current_page: 0,
            page_count: page_count.max(1),
        })
    }

    pub fn template_name(&self) -> &str {
        &self.template_name
    }

    pub fn mapping(&self) -> &FieldMapping {
        &self.mapping
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    /// Move to a zero-based page, clamped to the document
    pub fn go_to_page(&mut self, page: usize) -> usize {
        self.current_page = page.min(self.page_count - 1);
        self.current_page
    }

    pub fn next_page(&mut self) -> usize {
        self.go_to_page(self.current_page + 1)
    }

    pub fn prev_page(&mut self) -> usize {
        self.go_to_page(self.current_page.saturating_sub(1))
    }

    /// Place a value on the current page and return the new placement's id
    ///
    /// A `font_size` of 0 stores the default size.
    pub fn place(&mut self, data_key: &str, pdf_x: f64, pdf_y: f64, font_size: u32) -> Result<String> {
        if !VALUE_KEYS.contains(&data_key) {
            return Err(WaybillError::UnknownValueKey(data_key.to_string()));
        }

        let id = self.next_id();
        let font_size = if font_size == 0 { 10 } else { font_size };
        let mut placement =
            FieldPlacement::at(id.clone(), data_key, self.current_page, pdf_x, pdf_y, font_size);
        placement.label = Some(field_label(data_key).to_string());
        self.mapping.fields.push(placement);

        log::debug!(
            "Placed {} on page {} at ({}, {})",
            data_key,
            self.current_page,
            pdf_x,
            pdf_y
        );
        Ok(id)
    }

    /// Remove a placement by id; returns whether one was removed
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.mapping.fields.len();
        self.mapping.fields.retain(|field| field.id != id);
        self.mapping.fields.len() != before
    }

    /// Placements on a zero-based page, in placement order
    pub fn fields_on_page(&self, page: usize) -> Vec<&FieldPlacement> {
        self.mapping.fields_on_page(page).collect()
    }

    /// Write the mapping next to the template
    pub fn save(&self, store: &MappingStore) -> Result<()> {
        store.save(&self.template_name, &self.mapping)
    }

    /// Millisecond timestamp id, bumped until unique within the mapping
    fn next_id(&self) -> String {
        let mut millis = Utc::now().timestamp_millis();
        loop {
            let id = millis.to_string();
            if !self.mapping.fields.iter().any(|field| field.id == id) {
                return id;
            }
            millis += 1;
        }
    }
}
