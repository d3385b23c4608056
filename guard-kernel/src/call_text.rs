//! Reading and writing calls as text.
//!
//! Agents and repair models rarely emit bare JSON: replies arrive wrapped in
//! markdown fences or surrounded by prose. [`parse_call`] takes the span from
//! the first `{` to the last `}` and reads it as a [`ProposedCall`].

use guard_primitives::ProposedCall;

use crate::error::{GuardError, GuardResult};

/// Removes a surrounding markdown code fence, language tag included.
#[must_use]
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(body) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = body.strip_suffix("```").unwrap_or(body);
    match body.split_once('\n') {
        Some((tag, rest)) if !tag.trim().contains(char::is_whitespace) => rest.trim(),
        _ => body.trim(),
    }
}

/// Parses call text into a [`ProposedCall`].
///
/// Accepts `tool`/`name` for the tool and `args`/`parameters`/`arguments`
/// for the argument object.
///
/// # Errors
///
/// Returns [`GuardError::MalformedCall`] when no JSON object is found or it
/// does not describe a call.
pub fn parse_call(text: &str) -> GuardResult<ProposedCall> {
    let body = strip_code_fences(text);
    let (Some(start), Some(end)) = (body.find('{'), body.rfind('}')) else {
        return Err(GuardError::malformed("no JSON object found"));
    };
    if end < start {
        return Err(GuardError::malformed("no JSON object found"));
    }
    serde_json::from_str(&body[start..=end]).map_err(|e| GuardError::malformed(e.to_string()))
}

/// Renders a call as compact JSON text.
#[must_use]
pub fn render_call(call: &ProposedCall) -> String {
    serde_json::to_string(call).unwrap_or_else(|_| format!("{{\"tool\":{:?}}}", call.tool()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_json() {
        let call = parse_call(r#"{"tool": "a.b", "args": {"x": 5}}"#).unwrap();
        assert_eq!(call, ProposedCall::new("a.b").with_arg("x", 5));
    }

    #[test]
    fn parses_fenced_reply_with_aliases() {
        let text = "```json\n{\"name\": \"crm.list_users\", \"parameters\": {}}\n```";
        let call = parse_call(text).unwrap();
        assert_eq!(call.tool(), "crm.list_users");
        assert!(call.args().is_empty());
    }

    #[test]
    fn ignores_surrounding_prose() {
        let text = "Here is the fixed call: {\"tool\": \"a.b\", \"args\": {\"x\": 1}} Hope that helps.";
        assert_eq!(parse_call(text).unwrap().tool(), "a.b");
    }

    #[test]
    fn rejects_text_without_object() {
        let err = parse_call("call a.b with x=5").unwrap_err();
        assert_eq!(err.to_string(), "MalformedCall: no JSON object found");
        assert!(parse_call("} {").is_err());
        assert!(parse_call("{\"args\": {}}").is_err());
    }

    #[test]
    fn strips_fences() {
        assert_eq!(strip_code_fences("```python\nf(x)\n```"), "f(x)");
        assert_eq!(strip_code_fences("```f(x)```"), "f(x)");
        assert_eq!(strip_code_fences("  f(x)  "), "f(x)");
    }

    #[test]
    fn render_round_trips() {
        let call = ProposedCall::new("a.b").with_arg("x", 5);
        assert_eq!(render_call(&call), r#"{"tool":"a.b","args":{"x":5}}"#);
        assert_eq!(parse_call(&render_call(&call)).unwrap(), call);
    }
}
