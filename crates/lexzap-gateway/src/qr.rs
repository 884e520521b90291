//! QR code rendering for the terminal presentation layer.

use base64::{engine::general_purpose::STANDARD, Engine};
use lexzap_core::error::ZapError;

/// Render raw QR text as half-block characters for a terminal.
///
/// Each output line covers two module rows (`▀` top-only, `▄` bottom-only,
/// `█` both), so the code fits a standard terminal window. Low error
/// correction keeps the module count down, which matters at this scale.
pub fn render_terminal(qr_data: &str) -> Result<String, ZapError> {
    use qrcode::{Color, EcLevel, QrCode};

    let code = QrCode::with_error_correction_level(qr_data.as_bytes(), EcLevel::L)
        .map_err(|e| ZapError::Gateway(format!("QR generation failed: {e}")))?;

    let width = code.width();
    let modules = code.into_colors();
    let dark_at = |row: usize, col: usize| {
        row < width && modules[row * width + col] == Color::Dark
    };

    // One text line per pair of module rows; an odd trailing row is padded
    // with a light bottom half.
    let mut out = String::with_capacity((width + 1) * width.div_ceil(2));
    for row in (0..width).step_by(2) {
        for col in 0..width {
            out.push(match (dark_at(row, col), dark_at(row + 1, col)) {
                (true, true) => '█',
                (true, false) => '▀',
                (false, true) => '▄',
                (false, false) => ' ',
            });
        }
        out.push('\n');
    }

    Ok(out)
}

/// True if a QR payload is a base64 data URL (a pre-rendered image from the
/// provider) rather than raw QR text.
pub fn is_data_url(payload: &str) -> bool {
    payload.starts_with("data:image/")
}

/// Decode a `data:image/...;base64,` payload into raw image bytes.
pub fn decode_data_url(payload: &str) -> Result<Vec<u8>, ZapError> {
    let encoded = payload
        .split_once(";base64,")
        .map(|(_, rest)| rest)
        .ok_or_else(|| ZapError::Gateway("QR payload is not base64 data".to_string()))?;

    STANDARD
        .decode(encoded.trim())
        .map_err(|e| ZapError::Gateway(format!("QR payload decode failed: {e}")))
}
