//! Template files in the templates directory

use crate::mapping::{validate_template_name, MappingStore};
use crate::{Result, WaybillError};
use pdf_core::PdfDocument;
use std::path::Path;

/// File names of the PDF templates in a directory, sorted
///
/// A missing directory has no templates.
pub fn list_templates<P: AsRef<Path>>(dir: P) -> Result<Vec<String>> {
    let entries = match std::fs::read_dir(dir.as_ref()) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.to_lowercase().ends_with(".pdf") {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

/// Names of the form fields in a template, in document order
pub fn inspect_fields(template: &[u8]) -> Result<Vec<String>> {
    let doc = PdfDocument::open_from_bytes(template)?;
    Ok(doc.form_fields().into_iter().map(|field| field.name).collect())
}

/// Copy a PDF into the templates directory and return its template name
///
/// The file must parse as a PDF. An existing template of the same name is
/// replaced; its mapping is kept.
pub fn import_template<P: AsRef<Path>, D: AsRef<Path>>(source: P, templates_dir: D) -> Result<String> {
    let source = source.as_ref();
    let name = source
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    validate_template_name(&name)?;

    let bytes = std::fs::read(source).map_err(|e| WaybillError::MissingTemplate {
        path: source.to_path_buf(),
        source: e,
    })?;
    let page_count = PdfDocument::open_from_bytes(&bytes)?.page_count();

    let templates_dir = templates_dir.as_ref();
    std::fs::create_dir_all(templates_dir)?;
    std::fs::write(templates_dir.join(&name), &bytes)?;
    log::info!("Imported template {} ({} page(s))", name, page_count);
    Ok(name)
}

/// Delete a template and its mapping sidecar
pub fn delete_template(store: &MappingStore, template_name: &str) -> Result<()> {
    let path = store.template_path(template_name)?;
    std::fs::remove_file(&path).map_err(|e| WaybillError::MissingTemplate {
        path: path.clone(),
        source: e,
    })?;

    let mapping_path = store.mapping_path(template_name)?;
    match std::fs::remove_file(&mapping_path) {
        Ok(()) => log::debug!("Removed {}", mapping_path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    log::info!("Deleted template {}", template_name);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{FieldMapping, FieldPlacement};
    use crate::testing::{template_pdf, TestWidget};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_list_templates() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.pdf"), b"").unwrap();
        std::fs::write(dir.path().join("A.PDF"), b"").unwrap();
        std::fs::write(dir.path().join("b.pdf.mapping.json"), b"{}").unwrap();
        std::fs::create_dir(dir.path().join("dir.pdf")).unwrap();

        assert_eq!(list_templates(dir.path()).unwrap(), vec!["A.PDF", "b.pdf"]);
        assert!(list_templates(dir.path().join("missing")).unwrap().is_empty());
    }

    #[test]
    fn test_inspect_fields() {
        let pdf = template_pdf(
            &[0],
            &[
                TestWidget::new("fio", 0, [0, 0, 10, 10]),
                TestWidget::new("date", 0, [0, 20, 10, 30]),
            ],
        );
        assert_eq!(inspect_fields(&pdf).unwrap(), vec!["fio", "date"]);
        assert!(inspect_fields(&template_pdf(&[0], &[])).unwrap().is_empty());
    }

    #[test]
    fn test_import_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("form.pdf");
        std::fs::write(&source, template_pdf(&[0], &[])).unwrap();
        let store = MappingStore::new(dir.path().join("templates"));

        let name = import_template(&source, store.templates_dir()).unwrap();
        assert_eq!(name, "form.pdf");
        assert_eq!(list_templates(store.templates_dir()).unwrap(), vec!["form.pdf"]);

        let mapping = FieldMapping {
            fields: vec![FieldPlacement::at("1", "fio", 0, 1.0, 1.0, 10)],
        };
        store.save("form.pdf", &mapping).unwrap();

        delete_template(&store, "form.pdf").unwrap();
        assert!(list_templates(store.templates_dir()).unwrap().is_empty());
        assert!(!store.mapping_path("form.pdf").unwrap().exists());
        assert!(matches!(
            delete_template(&store, "form.pdf"),
            Err(WaybillError::MissingTemplate { .. })
        ));
    }

    #[test]
    fn test_import_rejects_non_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("notes.pdf");
        std::fs::write(&source, b"plain text").unwrap();

        let result = import_template(&source, dir.path().join("templates"));
        assert!(matches!(result, Err(WaybillError::Pdf(_))));
        assert!(!dir.path().join("templates").exists());
    }
}
