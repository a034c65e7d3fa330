//! Small string and MIME helpers.

/// Shorten `s` for log lines.
///
/// Anything longer than `max - 3` characters is cut to `max - 3` and
/// suffixed with `...`.
pub fn truncate(s: &str, max: usize) -> String {
    let keep = max.saturating_sub(3);
    if s.chars().count() <= keep {
        return s.to_string();
    }
    let mut out: String = s.chars().take(keep).collect();
    out.push_str("...");
    out
}

/// Known MIME type to file extension mapping (without leading dot).
const MIME_EXTENSIONS: &[(&str, &str)] = &[
    ("application/pdf", "pdf"),
    ("application/x-pdf", "pdf"),
    ("application/xml", "xml"),
    ("text/xml", "xml"),
    ("application/x-zugferd+xml", "xml"),
    ("application/zip", "zip"),
    ("application/json", "json"),
    ("text/plain", "txt"),
    ("text/html", "html"),
    ("text/csv", "csv"),
    ("image/png", "png"),
    ("image/jpeg", "jpg"),
    ("image/gif", "gif"),
    ("image/tiff", "tif"),
    ("application/octet-stream", "bin"),
];

/// File extension for a MIME type, if known. Parameters (`; charset=...`) are ignored.
pub fn extension_for_mime(mime_type: &str) -> Option<&'static str> {
    let essence = mime_type.split(';').next().unwrap_or_default().trim();
    MIME_EXTENSIONS
        .iter()
        .find(|(mime, _)| mime.eq_ignore_ascii_case(essence))
        .map(|(_, ext)| *ext)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_keeps_short_strings() {
        assert_eq!(truncate("Invoice", 20), "Invoice");
        assert_eq!(truncate("", 20), "");
    }

    #[test]
    fn truncate_cuts_long_strings() {
        assert_eq!(truncate("Your invoice for October 2024", 20), "Your invoice for ...");
        assert_eq!(truncate("Your invoice for October 2024", 20).chars().count(), 20);
    }

    #[test]
    fn truncate_counts_characters_not_bytes() {
        assert_eq!(truncate("Rechnung für Müller & Söhne", 10), "Rechnun...");
    }

    #[test]
    fn extension_lookup() {
        assert_eq!(extension_for_mime("application/pdf"), Some("pdf"));
        assert_eq!(extension_for_mime("text/xml; charset=utf-8"), Some("xml"));
        assert_eq!(extension_for_mime("APPLICATION/XML"), Some("xml"));
        assert_eq!(extension_for_mime("application/x-unknown"), None);
    }
}
