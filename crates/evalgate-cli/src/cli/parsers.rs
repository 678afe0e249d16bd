use chrono::{DateTime, Utc};

pub(super) fn parse_unit_interval_f64(raw: &str) -> std::result::Result<f64, String> {
    let value = raw
        .parse::<f64>()
        .map_err(|_| format!("invalid float value '{raw}'"))?;
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(format!("value must be within [0.0, 1.0], got {value}"));
    }
    Ok(value)
}

pub(super) fn parse_min_one_usize(raw: &str) -> std::result::Result<usize, String> {
    let value = raw
        .parse::<usize>()
        .map_err(|_| format!("invalid integer value '{raw}'"))?;
    if value == 0 {
        return Err("value must be >= 1".to_string());
    }
    Ok(value)
}

pub(super) fn parse_min_one_u64(raw: &str) -> std::result::Result<u64, String> {
    let value = raw
        .parse::<u64>()
        .map_err(|_| format!("invalid integer value '{raw}'"))?;
    if value == 0 {
        return Err("value must be >= 1".to_string());
    }
    Ok(value)
}

pub(super) fn parse_rfc3339_utc(raw: &str) -> std::result::Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|value| value.with_timezone(&Utc))
        .map_err(|err| format!("invalid RFC 3339 timestamp '{raw}': {err}"))
}

pub(super) fn parse_field_override(raw: &str) -> std::result::Result<String, String> {
    match raw.split_once('=') {
        Some((attribute, field)) if !attribute.trim().is_empty() && !field.trim().is_empty() => {
            Ok(raw.trim().to_string())
        }
        _ => Err(format!("expected attribute=field, got '{raw}'")),
    }
}
