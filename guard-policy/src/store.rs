//! Token provisioning from external policy stores.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use guard_primitives::{CapabilityToken, PrincipalId};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::engine::{PolicyError, PolicyResult};

/// Source of the tokens held by each principal.
///
/// The kernel only reads tokens for the duration of one evaluation; creating,
/// storing, and revoking them belongs to the implementation.
pub trait TokenSource: Send + Sync {
    /// Returns the tokens held by `principal`, in evaluation order. Unknown
    /// principals hold no tokens.
    fn tokens_for(&self, principal: &PrincipalId) -> Arc<[CapabilityToken]>;
}

/// A principal and its grants as found in a principals document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrincipalRecord {
    /// Principal identity.
    pub id: PrincipalId,
    /// Tokens in evaluation order.
    #[serde(default)]
    pub tokens: Vec<CapabilityToken>,
}

type Grants = HashMap<PrincipalId, Arc<[CapabilityToken]>>;

/// In-memory token store replaced wholesale on reload.
#[derive(Debug, Default)]
pub struct StaticTokenStore {
    current: RwLock<Arc<Grants>>,
}

impl StaticTokenStore {
    /// Builds a store from principal records.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::DuplicatePrincipal`] when a principal appears
    /// more than once.
    pub fn from_records<I>(records: I) -> PolicyResult<Self>
    where
        I: IntoIterator<Item = PrincipalRecord>,
    {
        Ok(Self {
            current: RwLock::new(Arc::new(build_grants(records)?)),
        })
    }

    /// Replaces every grant with those in `records`.
    ///
    /// On error the previous grants stay in place.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::DuplicatePrincipal`] when a principal appears
    /// more than once.
    pub fn reload<I>(&self, records: I) -> PolicyResult<()>
    where
        I: IntoIterator<Item = PrincipalRecord>,
    {
        let grants = build_grants(records)?;
        let principals = grants.len();
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::new(grants);
        info!(principals, "token store reloaded");
        Ok(())
    }

    /// Returns every known principal in sorted order.
    #[must_use]
    pub fn principals(&self) -> Vec<PrincipalId> {
        let mut principals: Vec<_> = self.snapshot().keys().cloned().collect();
        principals.sort();
        principals
    }

    fn snapshot(&self) -> Arc<Grants> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }
}

impl TokenSource for StaticTokenStore {
    fn tokens_for(&self, principal: &PrincipalId) -> Arc<[CapabilityToken]> {
        self.snapshot()
            .get(principal)
            .cloned()
            .unwrap_or_else(|| Arc::from(Vec::new()))
    }
}

fn build_grants<I>(records: I) -> PolicyResult<Grants>
where
    I: IntoIterator<Item = PrincipalRecord>,
{
    let mut grants = Grants::new();
    for record in records {
        if grants.contains_key(&record.id) {
            return Err(PolicyError::DuplicatePrincipal {
                id: record.id.to_string(),
            });
        }
        grants.insert(record.id, Arc::from(record.tokens));
    }
    Ok(grants)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, patterns: &[&str]) -> PrincipalRecord {
        PrincipalRecord {
            id: PrincipalId::new(id).unwrap(),
            tokens: patterns
                .iter()
                .map(|p| CapabilityToken::new(p, ["read"], Vec::<String>::new(), "").unwrap())
                .collect(),
        }
    }

    #[test]
    fn tokens_resolve_per_principal() {
        let store = StaticTokenStore::from_records([
            record("alice_sales", &["salesforce.*", "gdrive.read_file"]),
            record("mallory_intern", &[]),
        ])
        .unwrap();

        let alice = store.tokens_for(&PrincipalId::new("alice_sales").unwrap());
        assert_eq!(alice.len(), 2);
        assert!(alice[0].matches("salesforce.get_lead"));

        let mallory = store.tokens_for(&PrincipalId::new("mallory_intern").unwrap());
        assert!(mallory.is_empty());

        let stranger = store.tokens_for(&PrincipalId::new("eve").unwrap());
        assert!(stranger.is_empty());
    }

    #[test]
    fn duplicate_principals_rejected() {
        let err = StaticTokenStore::from_records([record("bob", &[]), record("bob", &["x"])])
            .expect_err("duplicate");
        assert!(matches!(err, PolicyError::DuplicatePrincipal { id } if id == "bob"));
    }

    #[test]
    fn reload_replaces_grants() {
        let store = StaticTokenStore::from_records([record("bob", &["gdrive.*"])]).unwrap();
        let bob = PrincipalId::new("bob").unwrap();
        let held = store.tokens_for(&bob);

        store.reload([record("carol", &["hr.*"])]).unwrap();

        assert_eq!(held.len(), 1);
        assert!(store.tokens_for(&bob).is_empty());
        assert_eq!(store.principals(), [PrincipalId::new("carol").unwrap()]);
    }

    #[test]
    fn records_deserialize_from_json() {
        let records: Vec<PrincipalRecord> = serde_json::from_str(
            r#"[{ "id": "bob_eng", "tokens": [
                { "pattern": "gdrive.*", "operations": ["read", "write"], "description": "Full Drive Access" }
            ] }]"#,
        )
        .unwrap();

        assert_eq!(records[0].tokens[0].description(), "Full Drive Access");
    }
}
