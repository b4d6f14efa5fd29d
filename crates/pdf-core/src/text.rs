//! Text rendering utilities

use crate::document::Color;
use crate::page::Rotation;

/// Context for rendering text
pub struct TextRenderContext {
    /// PDF font resource name (e.g., "WbF1")
    pub font_name: String,
    /// Font size in points
    pub font_size: f32,
    /// Rotation of the glyphs (counter-clockwise in user space)
    pub rotation: Rotation,
    /// Text color (RGB)
    pub color: Color,
}

/// Format a number for a content stream
///
/// Rounds to four decimals, trims trailing zeros and never emits `-0`.
pub fn format_number(value: f64) -> String {
    let rounded = (value * 10_000.0).round() / 10_000.0;
    if rounded == 0.0 {
        return "0".to_string();
    }
    let text = format!("{rounded:.4}");
    let text = text.trim_end_matches('0').trim_end_matches('.');
    text.to_string()
}

/// Generate PDF operators for text insertion
///
/// Creates the text operators (BT, rg, Tf, Tm, Tj, ET) that place a single run
/// of text with its baseline origin at `(x, y)`. The text matrix carries the
/// rotation, so the glyphs turn around the origin point.
///
/// # Arguments
/// * `text_operand` - Encoded string operand (e.g., "<0041004200>" or "(AB)")
/// * `x` - X coordinate in points (PDF coordinates, from left)
/// * `y` - Y coordinate in points (PDF coordinates, from bottom)
/// * `ctx` - Text rendering context
///
/// # Returns
/// Vector of bytes containing the PDF operators
pub fn generate_text_operators(
    text_operand: &str,
    x: f64,
    y: f64,
    ctx: &TextRenderContext,
) -> Vec<u8> {
    let mut ops = String::new();
    let (cos, sin) = ctx.rotation.cos_sin();

    ops.push_str("BT\n");

    ops.push_str(&format!(
        "{} {} {} rg\n",
        format_number(ctx.color.r as f64),
        format_number(ctx.color.g as f64),
        format_number(ctx.color.b as f64)
    ));

    ops.push_str(&format!(
        "/{} {} Tf\n",
        ctx.font_name,
        format_number(ctx.font_size as f64)
    ));

    // a b c d e f Tm
    ops.push_str(&format!(
        "{} {} {} {} {} {} Tm\n",
        format_number(cos),
        format_number(sin),
        format_number(-sin),
        format_number(cos),
        format_number(x),
        format_number(y)
    ));

    ops.push_str(&format!("{text_operand} Tj\n"));

    ops.push_str("ET\n");

    ops.into_bytes()
}
