use crate::error::{AppError, AppResult};
use qrcode::QrCode;
use qrcode::render::svg;

/// Renders a URL as an inline SVG QR code for the onboarding display.
pub fn render_qr_svg(url: &str) -> AppResult<String> {
    let code = QrCode::new(url.as_bytes())
        .map_err(|e| AppError::InternalError(format!("QR encoding failed: {}", e)))?;

    let image = code
        .render::<svg::Color>()
        .min_dimensions(240, 240)
        .dark_color(svg::Color("#000000"))
        .light_color(svg::Color("#ffffff"))
        .build();

    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_qr_svg() {
        let svg = render_qr_svg("https://example.com/r/welcome?t=abc123").unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains("</svg>"));
    }
}
