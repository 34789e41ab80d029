//! Image type detection from magic bytes.

use mime_guess::mime::Mime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
    Gif,
    Webp,
}

impl ImageKind {
    pub fn sniff(data: &[u8]) -> Option<Self> {
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(Self::Jpeg)
        } else if data.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
            Some(Self::Png)
        } else if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
            Some(Self::Gif)
        } else if data.len() >= 12 && &data[..4] == b"RIFF" && &data[8..12] == b"WEBP" {
            Some(Self::Webp)
        } else {
            None
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Jpeg => ".jpg",
            Self::Png => ".png",
            Self::Gif => ".gif",
            Self::Webp => ".webp",
        }
    }

    pub fn mime(&self) -> Mime {
        mime_guess::from_ext(self.extension().trim_start_matches('.')).first_or_octet_stream()
    }
}

/// File extension for an input image; unknown data is treated as PNG.
pub fn image_extension(data: &[u8]) -> &'static str {
    ImageKind::sniff(data).unwrap_or(ImageKind::Png).extension()
}

/// Content type for an output image; unknown data is reported as JPEG.
pub fn image_content_type(data: &[u8]) -> String {
    ImageKind::sniff(data)
        .unwrap_or(ImageKind::Jpeg)
        .mime()
        .to_string()
}

/// Picks a filename for an uploaded image from its URL or sniffed type.
pub fn image_filename(url: &str, data: &[u8]) -> String {
    let from_url = url
        .split(['?', '#'])
        .next()
        .and_then(|path| path.rsplit('/').next())
        .filter(|name| name.contains('.') && !name.starts_with('.'));
    match from_url {
        Some(name) => name.to_string(),
        None => format!("image{}", image_extension(data)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0];
    const JPG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0, 0];

    #[test]
    fn test_sniff() {
        assert_eq!(ImageKind::sniff(PNG), Some(ImageKind::Png));
        assert_eq!(ImageKind::sniff(JPG), Some(ImageKind::Jpeg));
        assert_eq!(ImageKind::sniff(b"GIF89a...."), Some(ImageKind::Gif));
        assert_eq!(ImageKind::sniff(b"RIFF\0\0\0\0WEBPVP8 "), Some(ImageKind::Webp));
        assert_eq!(ImageKind::sniff(b"RIFF"), None);
        assert_eq!(ImageKind::sniff(b"hello"), None);
    }

    #[test]
    fn test_defaults() {
        assert_eq!(image_extension(b"???"), ".png");
        assert_eq!(image_extension(JPG), ".jpg");
        assert_eq!(image_content_type(b"???"), "image/jpeg");
        assert_eq!(image_content_type(PNG), "image/png");
        assert_eq!(image_content_type(b"RIFF\0\0\0\0WEBP"), "image/webp");
    }

    #[test]
    fn test_filename() {
        assert_eq!(image_filename("https://x.io/cats/a.gif?s=1", b""), "a.gif");
        assert_eq!(image_filename("https://x.io/random", PNG), "image.png");
    }
}
