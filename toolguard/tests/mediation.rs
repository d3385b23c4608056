use std::path::PathBuf;
use std::sync::Arc;

use serde_json::json;
use toolguard::config::{GuardConfig, load_config, load_principals};
use toolguard::kernel::{Diagnostic, Mediator, RuleBasedRepair};
use toolguard::policy::{
    AuthorizationKernel, PrincipalRecord, ReasonCode, StaticTokenStore, TokenSource,
};
use toolguard::primitives::{CallerContext, CapabilityToken, Operation, PrincipalId, ProposedCall};
use toolguard::telemetry::DecisionJournal;
use toolguard::tools::{SchemaViolation, ToolRegistry, catalog::load_catalog};

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn config() -> GuardConfig {
    load_config(fixture("guard.toml")).expect("fixture config loads")
}

fn mediator() -> Mediator {
    Mediator::from_config(&config()).expect("fixture mediator builds")
}

fn principal(id: &str) -> PrincipalId {
    PrincipalId::new(id).unwrap()
}

fn call(tool: &str, args: serde_json::Value) -> ProposedCall {
    serde_json::from_value(json!({ "tool": tool, "args": args })).unwrap()
}

#[test]
fn sales_user_updates_sales_lead() {
    let outcome = mediator().mediate(
        &principal("alice_sales"),
        &call(
            "salesforce.update_lead",
            json!({ "lead_id": "L-101", "status": "Qualified", "department": "Sales" }),
        ),
        &CallerContext::for_user("alice_sales"),
    );

    assert!(outcome.is_permitted());
    assert_eq!(outcome.decision().unwrap().reason(), ReasonCode::Allowed);
}

#[test]
fn sales_user_has_no_hr_access() {
    let outcome = mediator().mediate(
        &principal("alice_sales"),
        &call("hr.get_salary", json!({ "employee_id": "E-999" })),
        &CallerContext::for_user("alice_sales"),
    );

    assert_eq!(outcome.decision().unwrap().reason(), ReasonCode::NoCapabilityToken);
    let suggestion = outcome.suggestion().expect("denials carry a suggestion");
    assert_eq!(suggestion.pattern().to_string(), "hr.get_salary");
    assert!(suggestion.constraints().is_empty());
    assert!(suggestion.operations().contains(&Operation::read()));
}

#[test]
fn sales_user_cannot_touch_engineering_lead() {
    let outcome = mediator().mediate(
        &principal("alice_sales"),
        &call(
            "salesforce.update_lead",
            json!({ "lead_id": "L-202", "status": "Qualified", "department": "Engineering" }),
        ),
        &CallerContext::for_user("alice_sales"),
    );

    let decision = outcome.decision().unwrap();
    assert_eq!(decision.reason(), ReasonCode::ConstraintViolation);
    assert_eq!(decision.failed_constraint(), Some("department=Sales"));
}

#[test]
fn engineer_deletes_any_drive_file() {
    let outcome = mediator().mediate(
        &principal("bob_eng"),
        &call("gdrive.delete_file", json!({ "file_id": "doc-123", "owner": "alice_sales" })),
        &CallerContext::for_user("bob_eng"),
    );
    assert!(outcome.is_permitted());
}

#[test]
fn engineer_views_only_engineering_leads() {
    let mediator = mediator();
    let context = CallerContext::for_user("bob_eng");

    let own = mediator.mediate(
        &principal("bob_eng"),
        &call("salesforce.get_lead", json!({ "lead_id": "L-7", "department": "Engineering" })),
        &context,
    );
    assert!(own.is_permitted());

    let other = mediator.mediate(
        &principal("bob_eng"),
        &call("salesforce.get_lead", json!({ "lead_id": "L-7", "department": "Sales" })),
        &context,
    );
    assert_eq!(
        other.decision().unwrap().failed_constraint(),
        Some("department=Engineering")
    );
}

#[test]
fn intern_holds_no_tokens() {
    let mediator = mediator();
    for (tool, args) in [
        ("gdrive.read_file", json!({ "file_id": "doc-1" })),
        ("salesforce.get_lead", json!({ "lead_id": "L-1" })),
        ("crm.list_users", json!({})),
    ] {
        let outcome = mediator.mediate(
            &principal("mallory_intern"),
            &call(tool, args),
            &CallerContext::for_user("mallory_intern"),
        );
        assert_eq!(outcome.decision().unwrap().reason(), ReasonCode::NoCapabilityToken);
    }
}

#[test]
fn personal_drive_read_requires_ownership() {
    let mediator = mediator();
    let context = CallerContext::for_user("alice_sales");

    let mine = mediator.mediate(
        &principal("alice_sales"),
        &call("gdrive.read_file", json!({ "file_id": "f1", "owner": "alice_sales" })),
        &context,
    );
    assert!(mine.is_permitted());

    let theirs = mediator.mediate(
        &principal("alice_sales"),
        &call("gdrive.read_file", json!({ "file_id": "f2", "owner": "bob_eng" })),
        &context,
    );
    assert_eq!(theirs.decision().unwrap().failed_constraint(), Some("ownedByUser"));
}

#[test]
fn max_records_is_equality_unless_ceiling_enabled() {
    let bulk_read = call("salesforce.get_lead", json!({ "lead_id": "L-1", "limit": 500 }));
    let context = CallerContext::for_user("alice_sales");

    let default = mediator().mediate(&principal("alice_sales"), &bulk_read, &context);
    assert!(default.is_permitted());

    let mut config = config();
    config.constraints.record_ceiling = true;
    let ceiling = Mediator::from_config(&config).unwrap();

    let small = ceiling.mediate(
        &principal("alice_sales"),
        &call("salesforce.get_lead", json!({ "lead_id": "L-1", "limit": 100 })),
        &context,
    );
    assert!(small.is_permitted());

    let bulk = ceiling.mediate(&principal("alice_sales"), &bulk_read, &context);
    assert_eq!(bulk.decision().unwrap().failed_constraint(), Some("maxRecords=100"));
}

#[test]
fn malformed_arguments_never_reach_authorization() {
    let outcome = mediator().mediate(
        &principal("alice_sales"),
        &call("salesforce.update_lead", json!({ "lead_id": "lead-9", "department": "Sales" })),
        &CallerContext::for_user("alice_sales"),
    );

    assert!(outcome.decision().is_none());
    assert!(matches!(
        outcome.diagnostic(),
        Some(Diagnostic::Schema(SchemaViolation::PatternMismatch { field, .. })) if field == "lead_id"
    ));
}

#[test]
fn hallucinated_tool_is_reported() {
    let outcome = mediator().mediate(
        &principal("alice_sales"),
        &call("salesforce.delete_everything", json!({})),
        &CallerContext::for_user("alice_sales"),
    );
    assert_eq!(
        outcome.diagnostic().unwrap().to_string(),
        "Hallucination: Tool 'salesforce.delete_everything' not found."
    );
}

#[test]
fn code_blocks_report_every_unknown_callee() {
    let mediator = mediator();
    let code = r#"
lead = salesforce.get_lead(lead_id="L-1")
users = crm.get_users()  # not a real tool
salesforce.update_lead(lead_id="L-1", department="Sales")
hr.fire_employee("E-1")
print(len(users))
"#;
    let names: Vec<_> = mediator
        .guard()
        .verify_code(code)
        .into_iter()
        .map(|d| d.to_string())
        .collect();
    assert_eq!(
        names,
        [
            "Hallucination: Tool 'crm.get_users' not found.",
            "Hallucination: Tool 'hr.fire_employee' not found.",
        ]
    );
}

#[tokio::test]
async fn configured_repair_fixes_name_and_type() {
    let config = config();
    let mediator = Mediator::from_config(&config).unwrap();
    let advisor = RuleBasedRepair::from_config(&config.repair, Arc::clone(mediator.registry()));

    let outcome = mediator
        .repair_until_valid(
            r#"```json
{"tool": "crm.get_users", "args": {"age": "30"}}
```"#,
            &advisor,
            config.repair.max_attempts,
        )
        .await;

    assert!(outcome.is_valid(), "unexpected diagnostic: {:?}", outcome.diagnostic);
    assert_eq!(outcome.attempts, 2);
    let repaired = toolguard::kernel::parse_call(&outcome.text).unwrap();
    assert_eq!(repaired, call("crm.list_users", json!({ "age": 30 })));
}

#[test]
fn journal_replay_shows_effect_of_new_grant() {
    let registry = ToolRegistry::new(load_catalog(fixture("tools.json")).unwrap()).unwrap();
    let records = load_principals(fixture("principals.toml")).unwrap();
    let store = Arc::new(StaticTokenStore::from_records(records.clone()).unwrap());
    let journal = Arc::new(DecisionJournal::new());
    let mediator = Mediator::new(Arc::new(registry), store.clone()).with_observer(journal.clone());

    let context = CallerContext::for_user("mallory_intern");
    let denied = mediator.mediate(
        &principal("mallory_intern"),
        &call("crm.list_users", json!({ "department": "Interns" })),
        &context,
    );
    assert!(!denied.is_permitted());
    assert_eq!(journal.len(), 1);

    let grant = denied.suggestion().cloned().unwrap();
    let mut widened: Vec<PrincipalRecord> = records
        .into_iter()
        .filter(|r| r.id.as_str() != "mallory_intern")
        .collect();
    widened.push(PrincipalRecord {
        id: principal("mallory_intern"),
        tokens: vec![grant],
    });
    store.reload(widened).unwrap();
    assert_eq!(store.tokens_for(&principal("mallory_intern")).len(), 1);

    let divergences =
        DecisionJournal::replay(&journal.entries(), &AuthorizationKernel::default(), store.as_ref());
    assert_eq!(divergences.len(), 1);
    assert!(divergences[0].replayed.is_allowed());
}

#[test]
fn suggested_grant_is_exact_and_narrow() {
    let token: CapabilityToken = toolguard::policy::suggest(
        "gdrive.read_file",
        &call("gdrive.read_file", json!({ "owner": "alice", "file_id": "f1" }))
            .args()
            .clone(),
        &CallerContext::for_user("alice"),
    );

    assert_eq!(token.pattern().to_string(), "gdrive.read_file");
    assert_eq!(token.constraints(), ["ownedByUser"]);
    assert!(!token.matches("gdrive.read_files"));
}
