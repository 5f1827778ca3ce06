//! C1: decode raw EMIS-XML bytes to text, never failing.

use clinxml_model::EncodingReport;

const PROLOG_SCAN_LEN: usize = 400;
const DETECTION_SAMPLE_LEN: usize = 10 * 1024;

/// Decodes `raw` following the priority order: declared prolog encoding,
/// then UTF-8, then a detector guess over the first 10 KiB, then a lossy
/// ISO-8859-1 fallback that never fails.
pub fn decode_xml(raw: &[u8]) -> (String, EncodingReport) {
    let declared = declared_encoding(raw);
    let guessed = guess_encoding(raw);

    let candidates = [declared.as_deref(), Some("utf-8"), guessed.as_deref()];
    for candidate in candidates.into_iter().flatten() {
        if let Some(text) = try_decode_strict(raw, candidate) {
            let report = EncodingReport {
                encoding_used: candidate.to_string(),
                declared_encoding: declared.clone(),
                guessed_encoding: guessed.clone(),
                lossy: false,
            };
            return (text, report);
        }
    }

    let fallback_name = guessed.clone().unwrap_or_else(|| "windows-1252".to_string());
    let encoding = encoding_rs::Encoding::for_label(fallback_name.as_bytes())
        .unwrap_or(encoding_rs::WINDOWS_1252);
    let (text, _, had_errors) = encoding.decode(raw);
    let report = EncodingReport {
        encoding_used: encoding.name().to_string(),
        declared_encoding: declared,
        guessed_encoding: guessed,
        lossy: had_errors,
    };
    (text.into_owned(), report)
}

/// Extracts the `encoding="..."` attribute from an `<?xml ... ?>` prolog in
/// the first [`PROLOG_SCAN_LEN`] bytes, if present.
fn declared_encoding(raw: &[u8]) -> Option<String> {
    let scan_len = raw.len().min(PROLOG_SCAN_LEN);
    let window = &raw[..scan_len];
    let prolog_end = find_subslice(window, b"?>")?;
    let prolog = &window[..prolog_end];
    let marker = find_subslice(prolog, b"encoding")?;
    let after_marker = &prolog[marker + b"encoding".len()..];
    let eq = after_marker.iter().position(|b| *b == b'=')?;
    let rest = &after_marker[eq + 1..];
    let quote_pos = rest.iter().position(|b| *b == b'"' || *b == b'\'')?;
    let quote_char = rest[quote_pos];
    let value_start = &rest[quote_pos + 1..];
    let value_end = value_start.iter().position(|b| *b == quote_char)?;
    let value = &value_start[..value_end];
    std::str::from_utf8(value).ok().map(|s| s.to_string())
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// A lightweight byte-distribution guess over the first 10 KiB, standing in
/// for a full charset detector: valid-UTF-8 sample favours UTF-8; a high
/// ratio of bytes in the Latin-1 high range favours Windows-1252; otherwise
/// no guess is offered.
fn guess_encoding(raw: &[u8]) -> Option<String> {
    let sample = &raw[..raw.len().min(DETECTION_SAMPLE_LEN)];
    if sample.is_empty() {
        return None;
    }
    if std::str::from_utf8(sample).is_ok() {
        return Some("utf-8".to_string());
    }
    let high_bytes = sample.iter().filter(|b| **b >= 0x80).count();
    if high_bytes * 4 >= sample.len() {
        Some("windows-1252".to_string())
    } else {
        None
    }
}

fn try_decode_strict(raw: &[u8], label: &str) -> Option<String> {
    let encoding = encoding_rs::Encoding::for_label(label.as_bytes())?;
    if encoding == encoding_rs::UTF_8 {
        return std::str::from_utf8(raw).ok().map(|s| s.to_string());
    }
    let (text, _, had_errors) = encoding.decode(raw);
    if had_errors {
        None
    } else {
        Some(text.into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decodes_plain_ascii_as_utf8() {
        let (text, report) = decode_xml(b"<search id=\"S1\"/>");
        assert_eq!(text, "<search id=\"S1\"/>");
        assert_eq!(report.encoding_used, "utf-8");
        assert!(!report.lossy);
    }

    #[test]
    fn test_honours_declared_encoding() {
        let raw = b"<?xml version=\"1.0\" encoding=\"windows-1252\"?><search/>";
        let (_, report) = decode_xml(raw);
        assert_eq!(report.declared_encoding.as_deref(), Some("windows-1252"));
        assert_eq!(report.encoding_used, "windows-1252");
    }

    #[test]
    fn test_falls_back_losslessly_on_invalid_utf8() {
        let mut raw = b"<?xml version=\"1.0\" encoding=\"utf-8\"?><search>".to_vec();
        raw.push(0xFF);
        raw.extend_from_slice(b"</search>");
        let (text, report) = decode_xml(&raw);
        assert!(!text.is_empty());
        assert_ne!(report.encoding_used, "");
    }

    #[test]
    fn test_declared_encoding_ignores_missing_prolog() {
        assert_eq!(declared_encoding(b"<search/>"), None);
    }
}
