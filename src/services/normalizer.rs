use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::sync::OnceLock;
use thiserror::Error;

use crate::models::NutritionEstimate;

/// Ways the model's reply can fail to become an estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum NormalizationError {
    #[error("No response from AI")]
    EmptyResponse,
    #[error("Invalid calorie value received")]
    InvalidCalorieValue,
    #[error("Invalid protein value received")]
    InvalidProteinValue,
    #[error("Invalid response format from AI")]
    UnparseableResponse,
}

#[derive(Debug, Deserialize)]
struct RawEstimate {
    // Items are passed through untouched; only the array shape is checked.
    items: Vec<Value>,
    total: Value,
}

fn json_fence() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"```json\n?").expect("valid fence pattern"))
}

fn any_fence() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"```\n?").expect("valid fence pattern"))
}

// First "<int>, <decimal>" or "<int> <decimal>" pair in the text.
fn totals_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"([0-9]+)[,\s]+([0-9]+\.?[0-9]*)").expect("valid totals pattern")
    })
}

/// Turns a raw completion reply into a validated estimate.
///
/// The strict path expects `{"items": [...], "total": {"calories", "protein"}}`,
/// optionally wrapped in markdown fences. When the reply does not have that
/// shape, the first `calories, protein` number pair found in the raw text is
/// used instead and the breakdown is left empty.
pub fn normalize_estimate(raw: Option<&str>) -> Result<NutritionEstimate, NormalizationError> {
    let raw = raw.map(str::trim).unwrap_or_default();
    if raw.is_empty() {
        return Err(NormalizationError::EmptyResponse);
    }

    let cleaned = strip_fences(raw);

    match parse_strict(&cleaned) {
        Some((items, total)) => validate_totals(items, &total),
        None => {
            log::warn!("⚠️ Model reply is not the expected JSON shape, trying totals fallback");
            extract_totals(raw)
        }
    }
}

fn strip_fences(text: &str) -> String {
    let cleaned = if text.contains("```json") {
        let without_tag = json_fence().replace_all(text, "");
        any_fence().replace_all(&without_tag, "").into_owned()
    } else if text.contains("```") {
        any_fence().replace_all(text, "").into_owned()
    } else {
        text.to_string()
    };

    cleaned.trim().to_string()
}

fn parse_strict(text: &str) -> Option<(Vec<Value>, Value)> {
    let value: Value = serde_json::from_str(text).ok()?;
    if !value.is_object() {
        return None;
    }

    let raw: RawEstimate = match serde_json::from_value(value) {
        Ok(raw) => raw,
        Err(e) => {
            log::debug!("Estimate JSON did not match the expected shape: {}", e);
            return None;
        }
    };

    if !is_truthy(&raw.total) {
        return None;
    }

    Some((raw.items, raw.total))
}

fn validate_totals(items: Vec<Value>, total: &Value) -> Result<NutritionEstimate, NormalizationError> {
    let calories = total
        .get("calories")
        .and_then(coerce_int)
        .filter(|c| *c > 0)
        .ok_or(NormalizationError::InvalidCalorieValue)?;

    // Zero protein is a valid total (fruit, black coffee).
    let protein = total
        .get("protein")
        .and_then(coerce_float)
        .filter(|p| p.is_finite() && *p >= 0.0)
        .ok_or(NormalizationError::InvalidProteinValue)?;

    Ok(NutritionEstimate {
        calories,
        protein,
        breakdown: items,
    })
}

fn extract_totals(raw: &str) -> Result<NutritionEstimate, NormalizationError> {
    let captures = totals_pattern()
        .captures(raw)
        .ok_or(NormalizationError::UnparseableResponse)?;

    let calories = captures
        .get(1)
        .and_then(|m| parse_int_prefix(m.as_str()))
        .filter(|c| *c > 0);
    let protein = captures
        .get(2)
        .and_then(|m| parse_float_prefix(m.as_str()))
        // Zero protein accepted here as on the strict path
        .filter(|p| p.is_finite() && *p >= 0.0);

    match (calories, protein) {
        (Some(calories), Some(protein)) => {
            log::info!("🔎 Recovered totals from unstructured reply: {} kcal, {} g protein", calories, protein);
            Ok(NutritionEstimate {
                calories,
                protein,
                breakdown: Vec::new(),
            })
        }
        _ => Err(NormalizationError::UnparseableResponse),
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Textual form of a JSON value, as a loosely typed client would print it.
fn display_value(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Array(values) => values
            .iter()
            .map(|v| if v.is_null() { String::new() } else { display_value(v) })
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

/// Integer read from the leading digits of the value's text (`"450 kcal"` -> 450).
pub fn coerce_int(value: &Value) -> Option<i64> {
    parse_int_prefix(&display_value(value))
}

/// Float read from the leading number of the value's text (`"20.5g"` -> 20.5).
pub fn coerce_float(value: &Value) -> Option<f64> {
    parse_float_prefix(&display_value(value))
}

fn split_sign(s: &str) -> (&str, &str) {
    match s.as_bytes().first() {
        Some(b'-') | Some(b'+') => s.split_at(1),
        _ => ("", s),
    }
}

fn digit_run(s: &str) -> usize {
    s.bytes().take_while(u8::is_ascii_digit).count()
}

/// Digit runs beyond the `i64` range saturate instead of failing.
fn parse_int_prefix(s: &str) -> Option<i64> {
    let (sign, rest) = split_sign(s.trim_start());
    let digits = digit_run(rest);
    if digits == 0 {
        return None;
    }

    match format!("{}{}", sign, &rest[..digits]).parse() {
        Ok(n) => Some(n),
        Err(_) if sign == "-" => Some(i64::MIN),
        Err(_) => Some(i64::MAX),
    }
}

fn parse_float_prefix(s: &str) -> Option<f64> {
    let (sign, rest) = split_sign(s.trim_start());
    if rest.starts_with("Infinity") {
        return Some(if sign == "-" { f64::NEG_INFINITY } else { f64::INFINITY });
    }

    let int_len = digit_run(rest);
    let mut end = int_len;
    let mut frac_len = 0;
    if rest[end..].starts_with('.') {
        frac_len = digit_run(&rest[end + 1..]);
        end += 1 + frac_len;
    }
    if int_len + frac_len == 0 {
        return None;
    }

    let tail = &rest[end..];
    if tail.starts_with('e') || tail.starts_with('E') {
        let (exp_sign, exp_digits) = split_sign(&tail[1..]);
        let exp_len = digit_run(exp_digits);
        if exp_len > 0 {
            end += 1 + exp_sign.len() + exp_len;
        }
    }

    format!("{}{}", sign, &rest[..end]).parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const WELL_FORMED: &str = r#"{
  "items": [
    {"item": "Chapati", "quantity": "2 pieces", "calories": 240, "protein": 6.2},
    {"item": "Dal tadka", "quantity": "1 bowl", "calories": 210, "protein": 10.5}
  ],
  "total": {"calories": 450, "protein": 16.7}
}"#;

    #[test]
    fn test_well_formed_json() {
        let estimate = normalize_estimate(Some(WELL_FORMED)).unwrap();

        assert_eq!(estimate.calories, 450);
        assert_eq!(estimate.protein, 16.7);
        assert_eq!(estimate.breakdown.len(), 2);
        assert_eq!(estimate.breakdown[0]["item"], "Chapati");
        assert_eq!(estimate.breakdown[0]["quantity"], "2 pieces");
        assert_eq!(estimate.breakdown[1]["item"], "Dal tadka");
        assert_eq!(estimate.breakdown[1]["protein"], 10.5);
    }

    #[test]
    fn test_fenced_json_matches_unfenced() {
        let fenced = format!("```json\n{}\n```", WELL_FORMED);
        let plain_fence = format!("```\n{}\n```", WELL_FORMED);

        let expected = normalize_estimate(Some(WELL_FORMED)).unwrap();
        assert_eq!(normalize_estimate(Some(&fenced)).unwrap(), expected);
        assert_eq!(normalize_estimate(Some(&plain_fence)).unwrap(), expected);
    }

    #[test]
    fn test_zero_calories_rejected() {
        let result = normalize_estimate(Some(r#"{"items":[],"total":{"calories":0,"protein":5}}"#));
        assert_eq!(result, Err(NormalizationError::InvalidCalorieValue));
    }

    #[test]
    fn test_negative_protein_rejected() {
        let result = normalize_estimate(Some(r#"{"items":[],"total":{"calories":300,"protein":-1}}"#));
        assert_eq!(result, Err(NormalizationError::InvalidProteinValue));
    }

    #[test]
    fn test_missing_or_textual_totals_rejected() {
        let result = normalize_estimate(Some(r#"{"items":[],"total":{"protein":5}}"#));
        assert_eq!(result, Err(NormalizationError::InvalidCalorieValue));

        let result = normalize_estimate(Some(r#"{"items":[],"total":{"calories":300,"protein":"none"}}"#));
        assert_eq!(result, Err(NormalizationError::InvalidProteinValue));
    }

    #[test]
    fn test_totals_are_coerced() {
        let estimate = normalize_estimate(Some(
            r#"{"items":[],"total":{"calories":"512.8 kcal","protein":"21.5g"}}"#,
        ))
        .unwrap();

        assert_eq!(estimate.calories, 512);
        assert_eq!(estimate.protein, 21.5);
        assert!(estimate.breakdown.is_empty());
    }

    #[test]
    fn test_zero_protein_accepted() {
        let estimate = normalize_estimate(Some(r#"{"items":[],"total":{"calories":120,"protein":0}}"#)).unwrap();
        assert_eq!(estimate.calories, 120);
        assert_eq!(estimate.protein, 0.0);
    }

    #[test]
    fn test_fallback_on_plain_text() {
        let estimate = normalize_estimate(Some("Total for the meal is 450, 20.5 grams")).unwrap();

        assert_eq!(estimate.calories, 450);
        assert_eq!(estimate.protein, 20.5);
        assert!(estimate.breakdown.is_empty());
    }

    #[test]
    fn test_fallback_with_whitespace_separator() {
        let estimate = normalize_estimate(Some("calories/protein: 620   31")).unwrap();
        assert_eq!(estimate.calories, 620);
        assert_eq!(estimate.protein, 31.0);
    }

    #[test]
    fn test_fallback_when_total_missing() {
        // Valid JSON without a `total` falls through to the number scan.
        let estimate = normalize_estimate(Some(r#"{"items": [], "sum": "300, 12.5"}"#)).unwrap();
        assert_eq!(estimate.calories, 300);
        assert_eq!(estimate.protein, 12.5);
    }

    #[test]
    fn test_fallback_on_fenced_garbage() {
        let estimate = normalize_estimate(Some("```json\n{\"total\": broken 250, 9.5}\n```")).unwrap();
        assert_eq!(estimate.calories, 250);
        assert_eq!(estimate.protein, 9.5);
    }

    #[test]
    fn test_fallback_zero_calories_unparseable() {
        let result = normalize_estimate(Some("that is 0, 5.5 overall"));
        assert_eq!(result, Err(NormalizationError::UnparseableResponse));
    }

    #[test]
    fn test_empty_response() {
        assert_eq!(normalize_estimate(None), Err(NormalizationError::EmptyResponse));
        assert_eq!(normalize_estimate(Some("")), Err(NormalizationError::EmptyResponse));
        assert_eq!(normalize_estimate(Some("  \n ")), Err(NormalizationError::EmptyResponse));
    }

    #[test]
    fn test_unparseable_response() {
        let result = normalize_estimate(Some("Sorry, I cannot estimate that meal."));
        assert_eq!(result, Err(NormalizationError::UnparseableResponse));
    }

    #[test]
    fn test_items_not_array_uses_fallback() {
        let result = normalize_estimate(Some(r#"{"items": "none", "total": {"calories": 0, "protein": 1}}"#));
        // No bare number pair anywhere in the text.
        assert_eq!(result, Err(NormalizationError::UnparseableResponse));
    }

    #[test]
    fn test_coerce_helpers() {
        assert_eq!(coerce_int(&json!(450.9)), Some(450));
        assert_eq!(coerce_int(&json!("  -12abc")), Some(-12));
        assert_eq!(coerce_int(&json!(null)), None);
        assert_eq!(coerce_int(&json!([300])), Some(300));
        assert_eq!(coerce_float(&json!(".5")), Some(0.5));
        assert_eq!(coerce_float(&json!("1e2 kcal")), Some(100.0));
        assert_eq!(coerce_float(&json!("7.")), Some(7.0));
        assert_eq!(coerce_float(&json!(true)), None);
    }

    #[test]
    fn test_irregular_items_keep_totals() {
        let estimate = normalize_estimate(Some(
            r#"{"items":[{"name":"Rice","kcal":200}],"total":{"calories":200,"protein":4.5}}"#,
        ))
        .unwrap();
        assert_eq!(estimate.calories, 200);
        assert_eq!(estimate.protein, 4.5);
        assert_eq!(estimate.breakdown, vec![json!({"name": "Rice", "kcal": 200})]);

        let estimate = normalize_estimate(Some(
            r#"{"items":[{"item":"Rice","quantity":"1 cup","calories":200}],"total":{"calories":200,"protein":4.5}}"#,
        ))
        .unwrap();
        assert_eq!(estimate.calories, 200);
        assert_eq!(estimate.breakdown[0].get("protein"), None);
    }

    #[test]
    fn test_items_serialize_unchanged() {
        let estimate = normalize_estimate(Some(
            r#"{"items":[{"item":"Rice","quantity":"1 cup","calories":200,"protein":"6.5 g"}],"total":{"calories":200,"protein":6.5}}"#,
        ))
        .unwrap();

        let json = serde_json::to_string(&estimate.breakdown).unwrap();
        assert_eq!(json, r#"[{"item":"Rice","quantity":"1 cup","calories":200,"protein":"6.5 g"}]"#);
    }

    #[test]
    fn test_huge_calories_saturate() {
        assert_eq!(parse_int_prefix("123456789012345678901234"), Some(i64::MAX));
        assert_eq!(parse_int_prefix("-123456789012345678901234"), Some(i64::MIN));

        let estimate = normalize_estimate(Some(
            r#"{"items":[],"total":{"calories":"99999999999999999999","protein":1}}"#,
        ))
        .unwrap();
        assert_eq!(estimate.calories, i64::MAX);

        let estimate = normalize_estimate(Some("roughly 99999999999999999999, 3.5")).unwrap();
        assert_eq!(estimate.calories, i64::MAX);
        assert_eq!(estimate.protein, 3.5);
    }
}
