//! Embedded images. Only base64 `data:` URIs are supported; there is no
//! network or filesystem access while converting.

use base64::{engine::general_purpose::STANDARD as BASE64_STD, Engine as _};

/// Parse a `data:<mime>;base64,<data>` URI and return the decoded bytes.
pub fn decode_data_uri(src: &str) -> Result<Vec<u8>, String> {
    let Some(rest) = src.strip_prefix("data:") else {
        let preview: String = src.chars().take(80).collect();
        return Err(format!(
            "image src must be a base64 data URI (data:image/png;base64,...), got {preview:?}"
        ));
    };
    let (header, data) = rest
        .split_once(',')
        .ok_or_else(|| "invalid data URI: missing ',' after the header".to_string())?;
    if !header.ends_with(";base64") {
        return Err("only base64-encoded data URIs are supported".to_string());
    }
    let compact: String = data.chars().filter(|c| !c.is_whitespace()).collect();
    BASE64_STD
        .decode(compact)
        .map_err(|e| format!("base64 decode error: {e}"))
}

/// Pixel dimensions of the image behind `src`.
pub fn intrinsic_size(src: &str) -> Result<(u32, u32), String> {
    let bytes = decode_data_uri(src)?;
    let img = ::image::load_from_memory(&bytes).map_err(|e| format!("decode error: {e}"))?;
    match (img.width(), img.height()) {
        (0, _) | (_, 0) => Err("image has no pixels".to_string()),
        dims => Ok(dims),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// A 2×1 RGB PNG as a data URI.
    pub(crate) fn png_data_uri() -> String {
        let img = ::image::RgbImage::from_pixel(2, 1, ::image::Rgb([200, 30, 30]));
        let mut bytes = Vec::new();
        img.write_to(
            &mut std::io::Cursor::new(&mut bytes),
            ::image::ImageFormat::Png,
        )
        .unwrap();
        format!("data:image/png;base64,{}", BASE64_STD.encode(bytes))
    }

    #[test]
    fn reads_png_dimensions() {
        assert_eq!(intrinsic_size(&png_data_uri()).unwrap(), (2, 1));
    }

    #[test]
    fn rejects_remote_urls() {
        let err = decode_data_uri("https://example.com/logo.png").unwrap_err();
        assert!(err.contains("data URI"));
    }

    #[test]
    fn rejects_non_base64_payloads() {
        assert!(decode_data_uri("data:image/png,abc").is_err());
        assert!(decode_data_uri("data:image/png;base64").is_err());
    }

    #[test]
    fn corrupt_image_bytes_fail_to_decode() {
        let uri = format!("data:image/png;base64,{}", BASE64_STD.encode(b"not a png"));
        assert!(intrinsic_size(&uri).is_err());
    }
}
