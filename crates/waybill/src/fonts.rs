//! Font resolution with a standard-font fallback

use pdf_core::{FontData, FontSource};
use std::path::Path;

/// Pick the font used for a fill
///
/// The first candidate that exists and parses as a TrueType font is embedded.
/// Unreadable or unparsable candidates are skipped. When none works the
/// built-in Helvetica is used, which only covers WinAnsi characters.
pub fn resolve_font<P: AsRef<Path>>(candidates: &[P]) -> FontSource {
    for candidate in candidates {
        let path = candidate.as_ref();
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(_) => continue,
        };

        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("EmbeddedFont");
        match FontData::from_ttf(name, &bytes) {
            Ok(font) => {
                log::debug!("Using font {}", path.display());
                return FontSource::Embedded(font);
            }
            Err(e) => log::warn!("Skipping font {}: {}", path.display(), e),
        }
    }

    log::warn!("No TrueType font found, falling back to Helvetica (no Cyrillic support)");
    FontSource::helvetica()
}
