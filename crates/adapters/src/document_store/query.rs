//! Search body construction and timestamp handling.

use std::fmt::Write as _;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde_json::{json, Value};

/// Hits requested per page.
pub const PAGE_SIZE: u64 = 10;

/// Default format for rendering and, after a custom pattern, parsing.
pub const DEFAULT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f%z";
pub const SECONDS_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%z";

/// `constant_score` search body for one page.
///
/// The range on `timestamp_field` covers `[start, end]`; an optional filter
/// (object or array of clauses) is added alongside it.
pub fn search_body(
    from: u64,
    size: u64,
    timestamp_field: &str,
    start: &str,
    end: &str,
    filter: Option<&Value>,
) -> Value {
    let mut must = Vec::new();
    match filter {
        Some(Value::Array(clauses)) => must.extend(clauses.iter().cloned()),
        Some(clause) => must.push(clause.clone()),
        None => {}
    }
    must.push(json!({ "range": { timestamp_field: { "gte": start, "lte": end } } }));

    json!({
        "from": from,
        "size": size,
        "query": { "constant_score": { "filter": { "bool": { "must": must } } } }
    })
}

/// Render `ts` in UTC with `pattern`, or [`DEFAULT_FORMAT`] when none is set
/// or the pattern cannot be rendered.
pub fn format_timestamp(ts: DateTime<Utc>, pattern: Option<&str>) -> String {
    if let Some(pattern) = pattern {
        let mut out = String::new();
        if write!(out, "{}", ts.format(pattern)).is_ok() {
            return out;
        }
    }
    ts.format(DEFAULT_FORMAT).to_string()
}

/// Parse a document timestamp. Tries `pattern`, the two default formats,
/// RFC 3339 and epoch milliseconds; `None` when nothing fits.
pub fn parse_timestamp(raw: &str, pattern: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    pattern
        .into_iter()
        .chain([DEFAULT_FORMAT, SECONDS_FORMAT])
        .find_map(|format| parse_with(raw, format))
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|ts| ts.with_timezone(&Utc)))
        .or_else(|| raw.parse::<i64>().ok().and_then(|ms| Utc.timestamp_millis_opt(ms).single()))
}

fn parse_with(raw: &str, format: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_str(raw, format) {
        return Some(ts.with_timezone(&Utc));
    }
    // Patterns without an offset are read as UTC.
    NaiveDateTime::parse_from_str(raw, format).ok().map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, h, m, s).unwrap()
    }

    #[test]
    fn body_without_filter_has_only_the_range() {
        let body = search_body(20, 5, "@timestamp", "a", "b", None);
        assert_eq!(body["from"], 20);
        assert_eq!(body["size"], 5);
        let must = &body["query"]["constant_score"]["filter"]["bool"]["must"];
        assert_eq!(must.as_array().unwrap().len(), 1);
        assert_eq!(must[0]["range"]["@timestamp"]["gte"], "a");
        assert_eq!(must[0]["range"]["@timestamp"]["lte"], "b");
    }

    #[test]
    fn filter_precedes_the_range() {
        let filter = json!({"match": {"level": "ERROR"}});
        let body = search_body(0, 10, "ts", "a", "b", Some(&filter));
        let must = body["query"]["constant_score"]["filter"]["bool"]["must"].as_array().unwrap();
        assert_eq!(must.len(), 2);
        assert_eq!(must[0], filter);

        let clauses = json!([{"term": {"a": 1}}, {"term": {"b": 2}}]);
        let body = search_body(0, 10, "ts", "a", "b", Some(&clauses));
        assert_eq!(
            body["query"]["constant_score"]["filter"]["bool"]["must"].as_array().unwrap().len(),
            3
        );
    }

    #[test]
    fn formats_with_default_or_pattern() {
        let ts = at(10, 30, 0);
        assert_eq!(format_timestamp(ts, None), "2024-05-01T10:30:00.000000+0000");
        assert_eq!(format_timestamp(ts, Some("%Y/%m/%d %H:%M")), "2024/05/01 10:30");
    }

    #[test]
    fn parse_fallback_chain() {
        assert_eq!(parse_timestamp("2024-05-01T10:30:00.123456+0000", None).unwrap().timestamp(), at(10, 30, 0).timestamp());
        assert_eq!(parse_timestamp("2024-05-01T12:30:00+0200", None), Some(at(10, 30, 0)));
        assert_eq!(parse_timestamp("2024-05-01T10:30:00Z", None), Some(at(10, 30, 0)));
        assert_eq!(parse_timestamp("1714559400000", None), Some(at(10, 30, 0)));
        assert_eq!(parse_timestamp("01/05/2024 10:30:00", Some("%d/%m/%Y %H:%M:%S")), Some(at(10, 30, 0)));
        assert_eq!(parse_timestamp("yesterday", None), None);
        assert_eq!(parse_timestamp("", None), None);
    }
}
