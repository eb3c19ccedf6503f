//! Parsing boundary for oracle output.
//!
//! Oracle output is untrusted. Each entry is parsed on its own so that one
//! malformed entry does not discard the rest of the proposal; malformed
//! entries are reported with their index and cause.
//!
//! Accepted shapes:
//!
//! ```text
//! [ {decision}, ... ]
//! { "decisions": [ {decision}, ... ] }
//! "free text with a ```json fenced``` block containing either of the above"
//! ```

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use super::Decision;

/// The whole oracle response was unusable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecisionParseError {
    /// Top-level value is neither a list nor an object with `decisions`.
    #[error("Unexpected oracle response shape: {0}")]
    UnexpectedShape(String),

    /// Text response without an embedded JSON document.
    #[error("Oracle text response contains no JSON: {0}")]
    NoJson(String),
}

/// An entry that failed to parse.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MalformedDecision {
    /// Position in the decisions list.
    pub index: usize,
    /// Parser message.
    pub reason: String,
    /// The offending entry.
    pub raw: Value,
}

/// Result of parsing one oracle response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedDecisions {
    /// Well-formed proposals, in oracle order.
    pub decisions: Vec<Decision>,
    /// Entries rejected at the boundary.
    pub malformed: Vec<MalformedDecision>,
}

/// Parse an oracle response into tagged decisions.
pub fn parse_decisions(body: &Value) -> Result<ParsedDecisions, DecisionParseError> {
    match body {
        Value::Array(entries) => Ok(parse_entries(entries)),
        Value::Object(map) => match map.get("decisions") {
            Some(Value::Array(entries)) => Ok(parse_entries(entries)),
            Some(other) => Err(DecisionParseError::UnexpectedShape(format!(
                "'decisions' is {}",
                type_name(other)
            ))),
            None => Err(DecisionParseError::UnexpectedShape(
                "object without 'decisions'".to_string(),
            )),
        },
        Value::String(text) => {
            let embedded = extract_json(text)
                .ok_or_else(|| DecisionParseError::NoJson(truncate(text, 80)))?;
            match embedded {
                nested @ (Value::Array(_) | Value::Object(_)) => parse_decisions(&nested),
                other => Err(DecisionParseError::UnexpectedShape(type_name(&other).to_string())),
            }
        }
        other => Err(DecisionParseError::UnexpectedShape(type_name(other).to_string())),
    }
}

fn parse_entries(entries: &[Value]) -> ParsedDecisions {
    let mut parsed = ParsedDecisions::default();
    for (index, entry) in entries.iter().enumerate() {
        match serde_json::from_value::<Decision>(entry.clone()) {
            Ok(decision) => parsed.decisions.push(decision),
            Err(e) => parsed.malformed.push(MalformedDecision {
                index,
                reason: e.to_string(),
                raw: entry.clone(),
            }),
        }
    }
    parsed
}

/// Find the first JSON document inside free text, preferring a fenced block.
fn extract_json(text: &str) -> Option<Value> {
    if let Some(start) = text.find("```") {
        let after = &text[start + 3..];
        let body_start = after.find('\n').map_or(0, |i| i + 1);
        if let Some(end) = after[body_start..].find("```")
            && let Ok(value) = serde_json::from_str(after[body_start..body_start + end].trim())
        {
            return Some(value);
        }
    }
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Some(value);
    }
    for (open, close) in [('[', ']'), ('{', '}')] {
        if let (Some(start), Some(end)) = (text.find(open), text.rfind(close))
            && start < end
            && let Ok(value) = serde_json::from_str(&text[start..=end])
        {
            return Some(value);
        }
    }
    None
}

const fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn truncate(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::decision::Action;
    use serde_json::json;

    #[test]
    fn parses_wrapped_list() {
        let body = json!({"decisions": [
            {"symbol": "sol", "action": "BUY", "confidence": 0.72, "rationale": "breakout"}
        ]});
        let parsed = parse_decisions(&body).unwrap();
        assert_eq!(parsed.decisions.len(), 1);
        assert_eq!(parsed.decisions[0].symbol.as_str(), "SOL");
        assert_eq!(parsed.decisions[0].action, Action::Buy);
        assert!(parsed.malformed.is_empty());
    }

    #[test]
    fn malformed_entries_are_reported_individually() {
        let body = json!([
            {"symbol": "BTC", "action": "HOLD", "confidence": 0.5, "rationale": "chop"},
            {"symbol": "ETH", "action": "MOON", "confidence": 0.9, "rationale": "?"},
            {"symbol": "SOL", "action": "BUY", "rationale": "no confidence"},
            {"symbol": "", "action": "SELL", "confidence": 0.7, "rationale": "blank"},
            {"symbol": "DOGE", "action": "BUY", "confidence": "high", "rationale": "typed"}
        ]);
        let parsed = parse_decisions(&body).unwrap();
        assert_eq!(parsed.decisions.len(), 1);
        let indexes: Vec<usize> = parsed.malformed.iter().map(|m| m.index).collect();
        assert_eq!(indexes, vec![1, 2, 3, 4]);
    }

    #[test]
    fn extracts_fenced_json_from_text() {
        let body = json!(
            "Here is my plan:\n```json\n[{\"symbol\":\"BTC\",\"action\":\"CLOSE\",\"confidence\":0.9,\"rationale\":\"target\"}]\n```\nGood luck."
        );
        let parsed = parse_decisions(&body).unwrap();
        assert_eq!(parsed.decisions[0].action, Action::Close);
    }

    #[test]
    fn extracts_bare_json_from_text() {
        let body = json!(
            "Decisions: {\"decisions\": [{\"symbol\":\"ETH\",\"action\":\"SELL\",\"confidence\":0.66,\"rationale\":\"weak\"}]}"
        );
        let parsed = parse_decisions(&body).unwrap();
        assert_eq!(parsed.decisions[0].symbol.as_str(), "ETH");
    }

    #[test]
    fn rejects_unusable_shapes() {
        assert!(matches!(
            parse_decisions(&json!({"plan": []})),
            Err(DecisionParseError::UnexpectedShape(_))
        ));
        assert!(matches!(
            parse_decisions(&json!(42)),
            Err(DecisionParseError::UnexpectedShape(_))
        ));
        assert!(matches!(
            parse_decisions(&json!("I would hold everything today.")),
            Err(DecisionParseError::NoJson(_))
        ));
    }
}
