//! Pairing QR page.

use {
    qrcode::{QrCode, render::svg},
    tracing::warn,
    zahra_config::QrRenderer,
};

const REMOTE_QR_ENDPOINT: &str = "https://api.qrserver.com/v1/create-qr-code/";
const QR_SIZE: u32 = 250;

/// Shown on `/qr` when there is nothing to scan.
pub const NO_QR_MESSAGE: &str = "✅ QR tidak tersedia atau sudah discan.";

/// HTML fragment displaying `token` as a scannable code.
pub fn qr_image(token: &str, renderer: QrRenderer) -> String {
    match renderer {
        QrRenderer::Svg => match QrCode::new(token.as_bytes()) {
            Ok(code) => code
                .render()
                .min_dimensions(QR_SIZE, QR_SIZE)
                .dark_color(svg::Color("#000000"))
                .light_color(svg::Color("#ffffff"))
                .build(),
            Err(e) => {
                warn!(error = %e, "failed to encode pairing token, using remote renderer");
                remote_image(token)
            },
        },
        QrRenderer::Remote => remote_image(token),
    }
}

fn remote_image(token: &str) -> String {
    format!(
        r#"<img src="{REMOTE_QR_ENDPOINT}?data={}&size={QR_SIZE}x{QR_SIZE}" alt="WhatsApp pairing QR" />"#,
        urlencoding::encode(token)
    )
}

/// Full `/qr` page for a pending pairing token.
pub fn qr_page(token: &str, renderer: QrRenderer) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
  <head><meta charset="utf-8"><meta http-equiv="refresh" content="20"><title>Scan QR WhatsApp</title></head>
  <body style="text-align:center;font-family:sans-serif">
    <h2>Scan QR WhatsApp</h2>
    {}
    <p>Scan it with WhatsApp on your phone: Linked devices &rarr; Link a device.</p>
  </body>
</html>"#,
        qr_image(token, renderer)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_renderer_encodes_token() {
        let html = qr_image("2@ab+c/d==,xyz", QrRenderer::Remote);
        assert!(html.contains("api.qrserver.com"));
        assert!(html.contains("data=2%40ab%2Bc%2Fd%3D%3D%2Cxyz"));
        assert!(html.contains("size=250x250"));
    }

    #[test]
    fn svg_renderer_inlines_svg() {
        let html = qr_image("2@pairing-token", QrRenderer::Svg);
        assert!(html.contains("<svg"));
        assert!(!html.contains("api.qrserver.com"));
    }

    #[test]
    fn missing_token_message_is_indonesian() {
        assert_eq!(NO_QR_MESSAGE, "✅ QR tidak tersedia atau sudah discan.");
    }

    #[test]
    fn page_wraps_image() {
        let page = qr_page("tok", QrRenderer::Remote);
        assert!(page.contains("<h2>Scan QR WhatsApp</h2>"));
        assert!(page.contains("data=tok"));
    }
}
