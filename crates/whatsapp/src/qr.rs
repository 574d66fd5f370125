use qrcode::{QrCode, render::unicode};

/// Render a login QR payload as terminal block characters.
pub fn render_qr(data: &str) -> Result<String, qrcode::types::QrError> {
    let code = QrCode::new(data.as_bytes())?;
    Ok(code
        .render::<unicode::Dense1x2>()
        .dark_color(unicode::Dense1x2::Light)
        .light_color(unicode::Dense1x2::Dark)
        .quiet_zone(true)
        .build())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_multiline_block_art() {
        let art = render_qr("2@abcdef,ghijkl,mnopqr").unwrap();
        assert!(art.lines().count() > 10);
        assert!(art.chars().any(|c| matches!(c, '█' | '▀' | '▄')));
    }
}
