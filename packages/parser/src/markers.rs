//! Detection of service exception reports and fee-gated values.

use std::sync::LazyLock;

use regex::Regex;

/// Exception text inside an OGC exception report.
static EXCEPTION_TEXT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<(?:[\w.-]+:)?(?:ServiceException|ExceptionText)\b[^>]*>(.*?)</")
        .expect("valid regex")
});

/// Substrings that identify an OGC exception report.
const EXCEPTION_MARKERS: &[&str] = &[
    "ServiceExceptionReport",
    "ExceptionReport",
    "<ServiceException",
    "ows:Exception",
];

/// Phrases used by upstreams to say a value is only available for a fee.
const FEE_MARKERS: &[&str] = &[
    "kostenpflichtig",
    "gebührenpflichtig",
    "gebuehrenpflichtig",
    "nur gegen gebühr",
];

/// Returns the exception message if `text` is an OGC service exception
/// report.
#[must_use]
pub fn service_exception(text: &str) -> Option<String> {
    if !EXCEPTION_MARKERS.iter().any(|m| text.contains(m)) {
        return None;
    }

    let message = EXCEPTION_TEXT_RE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| "service exception".to_string());
    Some(message)
}

/// Returns `true` if the document mentions that values are fee-based.
#[must_use]
pub fn is_fee_gated(text: &str) -> bool {
    let lower = text.to_lowercase();
    FEE_MARKERS.iter().any(|m| lower.contains(m))
}

/// Returns `true` if a single field value is a fee marker or a masked
/// value such as `***`.
#[must_use]
pub fn is_fee_marker(value: &str) -> bool {
    let trimmed = value.trim();
    (trimmed.len() >= 2 && trimmed.chars().all(|c| c == '*')) || is_fee_gated(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_wms_exception_report() {
        let body = r#"<ServiceExceptionReport><ServiceException code="InvalidFormat">
            Unsupported INFO_FORMAT
        </ServiceException></ServiceExceptionReport>"#;
        assert_eq!(service_exception(body).as_deref(), Some("Unsupported INFO_FORMAT"));
    }

    #[test]
    fn detects_ows_exception_report() {
        let body = r#"<ows:ExceptionReport><ows:Exception exceptionCode="InvalidParameterValue">
            <ows:ExceptionText>Unknown type name</ows:ExceptionText>
        </ows:Exception></ows:ExceptionReport>"#;
        assert_eq!(service_exception(body).as_deref(), Some("Unknown type name"));
    }

    #[test]
    fn ordinary_documents_are_not_exceptions() {
        assert!(service_exception("<wfs:FeatureCollection/>").is_none());
        assert!(service_exception("BRW = '420'").is_none());
    }

    #[test]
    fn fee_markers() {
        assert!(is_fee_marker("***"));
        assert!(is_fee_marker("Kostenpflichtig"));
        assert!(is_fee_marker("gebührenpflichtig"));
        assert!(!is_fee_marker("*"));
        assert!(!is_fee_marker("420"));
        assert!(is_fee_gated("<p>Auskunft kostenpflichtig</p>"));
    }
}
