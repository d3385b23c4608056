//! Advisory token suggestions derived from observed calls.
//!
//! Suggestions are never applied automatically; an operator reviews and
//! provisions them through the token store.

use guard_primitives::{ArgMap, CallerContext, CapabilityToken, Operation, TokenPattern};
use serde_json::Value;

use crate::constraint::OWNED_BY_USER;

const DEPARTMENT_ARG: &str = "department";
const OWNER_ARG: &str = "owner";

const READ_VERBS: [&str; 9] = [
    "get", "list", "read", "search", "fetch", "find", "query", "view", "describe",
];
const WRITE_VERBS: [&str; 10] = [
    "update", "create", "delete", "write", "set", "put", "add", "remove", "upload", "edit",
];

/// Proposes the narrowest token that would have allowed `tool` with `args`.
///
/// The pattern is the exact tool name, escaped so that any `*` it contains
/// stays literal. A `department` argument becomes an equality constraint,
/// and an `owner` matching `context.user_id` becomes `ownedByUser`.
#[must_use]
pub fn suggest(tool: &str, args: &ArgMap, context: &CallerContext) -> CapabilityToken {
    let mut builder = CapabilityToken::builder(TokenPattern::literal(tool))
        .with_operation(infer_operation(tool))
        .description(format!("Suggested grant for {tool}"));

    if let Some(department) = args.get(DEPARTMENT_ARG) {
        builder = builder.with_constraint(format!("{DEPARTMENT_ARG}={}", plain(department)));
    }

    let owner_matches = args
        .get(OWNER_ARG)
        .is_some_and(|owner| context.user_id() == Some(owner));
    if owner_matches {
        builder = builder.with_constraint(OWNED_BY_USER);
    }

    builder.build()
}

fn plain(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn infer_operation(tool: &str) -> Operation {
    let action = tool.rsplit('.').next().unwrap_or(tool).to_ascii_lowercase();
    let verb = action
        .split(|c: char| c == '_' || c == '-')
        .next()
        .unwrap_or_default();
    if READ_VERBS.contains(&verb) {
        Operation::read()
    } else if WRITE_VERBS.contains(&verb) {
        Operation::write()
    } else {
        Operation::execute()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(value: Value) -> ArgMap {
        match value {
            Value::Object(map) => map,
            _ => panic!("arguments must be an object"),
        }
    }

    #[test]
    fn suggests_owned_read_grant() {
        let token = suggest(
            "gdrive.read_file",
            &args(json!({ "owner": "alice", "file_id": "f1" })),
            &CallerContext::for_user("alice"),
        );

        assert_eq!(token.pattern().to_string(), "gdrive.read_file");
        assert!(token.pattern().is_exact());
        assert_eq!(token.constraints(), ["ownedByUser"]);
        assert!(token.operations().contains(&Operation::read()));
        assert_eq!(token.description(), "Suggested grant for gdrive.read_file");
    }

    #[test]
    fn department_becomes_equality() {
        let token = suggest(
            "salesforce.update_lead",
            &args(json!({ "department": "Sales", "owner": "someone_else" })),
            &CallerContext::for_user("alice_sales"),
        );

        assert_eq!(token.constraints(), ["department=Sales"]);
        assert!(token.operations().contains(&Operation::write()));
    }

    #[test]
    fn wildcard_in_name_stays_literal() {
        let token = suggest("odd.*tool", &ArgMap::new(), &CallerContext::new());
        assert!(token.matches("odd.*tool"));
        assert!(!token.matches("odd.anytool"));
        assert!(token.operations().contains(&Operation::execute()));
    }

    #[test]
    fn blank_tool_still_yields_a_token() {
        let token = suggest("", &args(json!({ "department": "" })), &CallerContext::new());
        assert!(token.matches(""));
        assert!(!token.matches("crm.get"));
        assert_eq!(token.constraints(), ["department="]);
        assert!(token.operations().contains(&Operation::execute()));
    }

    #[test]
    fn suggestion_allows_the_observed_call() {
        let call = args(json!({ "department": "Engineering", "owner": "bob_eng" }));
        let ctx = CallerContext::for_user("bob_eng");
        let token = suggest("jira.create_ticket", &call, &ctx);

        let decision = crate::AuthorizationKernel::default().enforce("jira.create_ticket", &call, &[token], &ctx);
        assert!(decision.is_allowed());
    }
}
