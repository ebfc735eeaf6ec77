use std::collections::HashSet;

use async_trait::async_trait;
use casbin::{Adapter, CoreApi, DefaultModel, Enforcer, MgmtApi};
use sqlx::PgPool;
use sqlx_adapter::SqlxAdapter;
use tokio::sync::{RwLock, RwLockWriteGuard};
use tracing::debug;

use rbac0_application::{PolicyEngine, PolicyRule};
use rbac0_core::{AppError, AppResult};

/// RBAC0 model: one policy per `(subject, object, action)` and exact matching.
pub const RBAC0_MODEL: &str = r#"
[request_definition]
r = sub, obj, act

[policy_definition]
p = sub, obj, act

[policy_effect]
e = some(where (p.eft == allow))

[matchers]
m = r.sub == p.sub && r.obj == p.obj && r.act == p.act
"#;

/// Hands out the adapter each freshly built enforcer loads and persists through.
#[async_trait]
pub trait PolicyAdapterSource: Send + Sync + 'static {
    /// Adapter type produced by this source.
    type Adapter: Adapter + 'static;

    /// Returns an adapter over the persisted rules.
    async fn open(&self) -> AppResult<Self::Adapter>;
}

/// Adapter source persisting policies in the `casbin_rule` table.
///
/// The adapter is opened once; every enforcer shares its pool.
#[derive(Clone)]
pub struct SqlxPolicyAdapterSource {
    adapter: SqlxAdapter,
}

impl SqlxPolicyAdapterSource {
    /// Opens the adapter over the shared pool, creating `casbin_rule` when missing.
    pub async fn connect(pool: PgPool) -> AppResult<Self> {
        let adapter = SqlxAdapter::new_with_pool(pool)
            .await
            .map_err(|error| AppError::Engine(format!("failed to open policy adapter: {error}")))?;

        Ok(Self { adapter })
    }
}

#[async_trait]
impl PolicyAdapterSource for SqlxPolicyAdapterSource {
    type Adapter = SqlxAdapter;

    async fn open(&self) -> AppResult<Self::Adapter> {
        Ok(self.adapter.clone())
    }
}

/// Off-lock rebuilds attempted before a reload yields to local writes.
const REBUILD_ATTEMPTS: usize = 3;

/// Attempts per write; a failed attempt means another writer changed the rules.
const WRITE_ATTEMPTS: usize = 2;

struct EngineState {
    enforcer: Enforcer,
    generation: u64,
}

type StateGuard<'a> = RwLockWriteGuard<'a, EngineState>;

/// Casbin-backed policy engine with an in-memory rule cache.
///
/// Checks share the read lock and never wait on the policy store. Every
/// change of the cache bumps the generation, so a rebuild loaded concurrently
/// is only installed when nothing changed meanwhile. Writes decide what to add
/// or remove against freshly loaded rules, not against the cache.
pub struct CasbinPolicyEngine<S: PolicyAdapterSource> {
    source: S,
    state: RwLock<EngineState>,
}

impl CasbinPolicyEngine<SqlxPolicyAdapterSource> {
    /// Creates an engine persisting rules through the shared pool.
    pub async fn with_pool(pool: PgPool) -> AppResult<Self> {
        Self::new(SqlxPolicyAdapterSource::connect(pool).await?).await
    }
}

impl<S: PolicyAdapterSource> CasbinPolicyEngine<S> {
    /// Creates an engine and loads every persisted rule.
    pub async fn new(source: S) -> AppResult<Self> {
        let enforcer = build_enforcer(&source).await?;

        Ok(Self {
            source,
            state: RwLock::new(EngineState {
                enforcer,
                generation: 0,
            }),
        })
    }

    /// Loads the persisted rules without holding the lock, then takes the
    /// write lock. The rules are installed only when the cache did not change
    /// during the load.
    async fn rebuild(&self) -> AppResult<(StateGuard<'_>, bool)> {
        let generation = self.state.read().await.generation;
        let fresh = build_enforcer(&self.source).await?;

        let mut state = self.state.write().await;
        let installed = state.generation == generation;
        if installed {
            state.enforcer = fresh;
            state.generation += 1;
        }

        Ok((state, installed))
    }

    /// Returns the write lock over a cache matching the persisted rules.
    async fn lock_fresh(&self) -> AppResult<StateGuard<'_>> {
        let (mut state, installed) = self.rebuild().await?;
        if !installed {
            // A local write landed during the load; reload in place.
            state
                .enforcer
                .load_policy()
                .await
                .map_err(|error| AppError::Engine(format!("failed to reload policies: {error}")))?;
            state.generation += 1;
        }

        Ok(state)
    }
}

async fn build_enforcer<S: PolicyAdapterSource>(source: &S) -> AppResult<Enforcer> {
    let model = DefaultModel::from_str(RBAC0_MODEL)
        .await
        .map_err(|error| AppError::Engine(format!("failed to parse policy model: {error}")))?;
    let adapter = source.open().await?;

    Enforcer::new(model, adapter)
        .await
        .map_err(|error| AppError::Engine(format!("failed to load policies: {error}")))
}

fn unique_values(rules: &[PolicyRule]) -> Vec<Vec<String>> {
    let mut seen = HashSet::with_capacity(rules.len());
    rules
        .iter()
        .filter(|rule| seen.insert(*rule))
        .map(PolicyRule::to_values)
        .collect()
}

fn engine_error(operation: &str, error: Option<casbin::Error>) -> AppError {
    match error {
        Some(error) => AppError::Engine(format!("failed to {operation}: {error}")),
        None => AppError::Engine(format!(
            "failed to {operation}: policies changed concurrently"
        )),
    }
}

#[async_trait]
impl<S: PolicyAdapterSource> PolicyEngine for CasbinPolicyEngine<S> {
    async fn enforce(&self, rule: &PolicyRule) -> AppResult<bool> {
        let state = self.state.read().await;
        state
            .enforcer
            .enforce((
                rule.subject.as_str(),
                rule.object.as_str(),
                rule.action.as_str(),
            ))
            .map_err(|error| AppError::Engine(format!("failed to enforce policy: {error}")))
    }

    async fn add_rules(&self, rules: &[PolicyRule]) -> AppResult<usize> {
        let values = unique_values(rules);
        let mut failure = None;

        for attempt in 1..=WRITE_ATTEMPTS {
            let mut state = self.lock_fresh().await?;
            let missing = values
                .iter()
                .filter(|values| !state.enforcer.has_policy((*values).clone()))
                .cloned()
                .collect::<Vec<_>>();
            if missing.is_empty() {
                return Ok(0);
            }

            let added = missing.len();
            match state.enforcer.add_policies(missing).await {
                Ok(true) => {
                    state.generation += 1;
                    debug!(added, "policies added");
                    return Ok(added);
                }
                Ok(false) => failure = None,
                Err(error) => failure = Some(error),
            }
            debug!(attempt, "policy add raced another writer");
        }

        Err(engine_error("add policies", failure))
    }

    async fn remove_rules(&self, rules: &[PolicyRule]) -> AppResult<usize> {
        let values = unique_values(rules);
        let mut failure = None;

        for attempt in 1..=WRITE_ATTEMPTS {
            let mut state = self.lock_fresh().await?;
            let present = values
                .iter()
                .filter(|values| state.enforcer.has_policy((*values).clone()))
                .cloned()
                .collect::<Vec<_>>();
            if present.is_empty() {
                return Ok(0);
            }

            let removed = present.len();
            match state.enforcer.remove_policies(present).await {
                Ok(true) => {
                    state.generation += 1;
                    debug!(removed, "policies removed");
                    return Ok(removed);
                }
                Ok(false) => failure = None,
                Err(error) => failure = Some(error),
            }
            debug!(attempt, "policy removal raced another writer");
        }

        Err(engine_error("remove policies", failure))
    }

    async fn remove_subject(&self, subject: &str) -> AppResult<usize> {
        let mut failure = None;

        for attempt in 1..=WRITE_ATTEMPTS {
            let mut state = self.lock_fresh().await?;
            let removed = state
                .enforcer
                .get_filtered_policy(0, vec![subject.to_owned()])
                .len();
            if removed == 0 {
                return Ok(0);
            }

            match state
                .enforcer
                .remove_filtered_policy(0, vec![subject.to_owned()])
                .await
            {
                Ok(true) => {
                    state.generation += 1;
                    debug!(subject, removed, "subject policies removed");
                    return Ok(removed);
                }
                Ok(false) => failure = None,
                Err(error) => failure = Some(error),
            }
            debug!(subject, attempt, "subject policy removal raced another writer");
        }

        Err(engine_error(
            &format!("remove policies of subject '{subject}'"),
            failure,
        ))
    }

    async fn rules_for_subject(&self, subject: &str) -> AppResult<Vec<PolicyRule>> {
        let state = self.state.read().await;
        Ok(state
            .enforcer
            .get_filtered_policy(0, vec![subject.to_owned()])
            .iter()
            .filter_map(|values| PolicyRule::from_values(values))
            .collect())
    }

    async fn reload(&self) -> AppResult<()> {
        for attempt in 1..=REBUILD_ATTEMPTS {
            let (_state, installed) = self.rebuild().await?;
            if installed {
                return Ok(());
            }
            debug!(attempt, "policy reload overtaken by a local write");
        }

        // Local writes already refreshed the cache from the store.
        debug!("policy reload skipped after repeated local writes");
        Ok(())
    }
}
