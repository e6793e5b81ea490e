use std::collections::HashMap;
use std::time::Duration;

/// Extracts the `Retry-After` header (in seconds) if present.
///
/// HTTP-date values are ignored; the providers in use send the numeric form. A
/// fractional value such as `1.5` is rounded up to whole seconds.
pub(crate) fn retry_after_from_headers(headers: &HashMap<String, String>) -> Option<Duration> {
    headers
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("retry-after"))
        .and_then(|(_, value)| value.trim().parse::<f64>().ok())
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(|secs| Duration::from_secs(secs.ceil() as u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_numeric_header_case_insensitively() {
        let headers = HashMap::from([("retry-after".to_string(), "12".to_string())]);
        assert_eq!(retry_after_from_headers(&headers), Some(Duration::from_secs(12)));

        let headers = HashMap::from([("Retry-After".to_string(), "1.5".to_string())]);
        assert_eq!(retry_after_from_headers(&headers), Some(Duration::from_secs(2)));
    }

    #[test]
    fn ignores_dates_and_missing_header() {
        let headers = HashMap::from([(
            "Retry-After".to_string(),
            "Wed, 21 Oct 2015 07:28:00 GMT".to_string(),
        )]);
        assert_eq!(retry_after_from_headers(&headers), None);
        assert_eq!(retry_after_from_headers(&HashMap::new()), None);
    }
}
