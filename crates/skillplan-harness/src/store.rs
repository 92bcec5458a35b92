#![forbid(unsafe_code)]

//! In-memory [`PlanStore`] with a call log, fault injection and latency.
//!
//! Every call is appended to the log before anything else happens, so tests
//! can assert on what was *sent* even when the call later fails. Injected
//! faults are consumed one per call, in the order they were queued.
//!
//! ```text
//! call ──► log ──► sleep(latency[op]) ──► fault[op]? ──► apply ──► snapshot
//! ```
//!
//! Entry ids are assigned from a single counter and never reused, so a
//! re-added entry always comes back under a fresh id.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use skillplan_core::{
    Entry, EntryId, EntryPatch, EntryPayload, OrderedCollection, PlanId, PlanSnapshot, PlanStore,
    RemoteError, RemoteResult, ValidationResult,
};

use crate::validator::PrerequisiteRules;

/// Which store operation a call or fault refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteOp {
    LoadPlan,
    Reorder,
    ValidateOrder,
    AddEntry,
    UpdateEntry,
    DeleteEntry,
}

/// One logged call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCall {
    pub op: RemoteOp,
    pub plan: Option<PlanId>,
    pub entry: Option<EntryId>,
    /// Order argument of `reorder` / `validate_order`.
    pub order: Option<Vec<EntryId>>,
    /// Payload argument of `add_entry`.
    pub payload: Option<EntryPayload>,
}

impl RemoteCall {
    fn new(op: RemoteOp) -> Self {
        Self {
            op,
            plan: None,
            entry: None,
            order: None,
            payload: None,
        }
    }
}

#[derive(Debug, Default)]
struct StoreState {
    plans: HashMap<PlanId, Vec<Entry>>,
    owner: HashMap<EntryId, PlanId>,
    next_id: u64,
    calls: Vec<RemoteCall>,
    faults: HashMap<RemoteOp, VecDeque<RemoteError>>,
    latency: HashMap<RemoteOp, Duration>,
}

impl StoreState {
    fn snapshot(&self, plan: PlanId) -> RemoteResult<PlanSnapshot> {
        self.plans
            .get(&plan)
            .map(|entries| PlanSnapshot::new(plan, entries.clone()))
            .ok_or_else(|| RemoteError::NotFound(format!("{plan}")))
    }

    fn allocate_id(&mut self) -> EntryId {
        self.next_id += 1;
        EntryId::new(self.next_id)
    }
}

/// Authoritative plan storage held in memory.
#[derive(Debug, Default)]
pub struct InMemoryPlanStore {
    state: Mutex<StoreState>,
    rules: PrerequisiteRules,
}

impl InMemoryPlanStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose `validate_order` applies `rules`.
    #[must_use]
    pub fn with_rules(rules: PrerequisiteRules) -> Self {
        Self {
            state: Mutex::default(),
            rules,
        }
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ========================================================================
    // Setup
    // ========================================================================

    /// Create or replace `plan` with fresh entries. Returns the assigned ids.
    pub fn seed_plan(&self, plan: PlanId, payloads: Vec<EntryPayload>) -> Vec<EntryId> {
        let mut state = self.lock();
        if let Some(old) = state.plans.remove(&plan) {
            for entry in old {
                state.owner.remove(&entry.id);
            }
        }
        let entries: Vec<Entry> = payloads
            .into_iter()
            .map(|payload| Entry::new(state.allocate_id(), payload))
            .collect();
        let ids: Vec<EntryId> = entries.iter().map(|entry| entry.id).collect();
        for id in &ids {
            state.owner.insert(*id, plan);
        }
        state.plans.insert(plan, entries);
        ids
    }

    /// Builder form of [`seed_plan`](Self::seed_plan).
    #[must_use]
    pub fn with_plan(self, plan: PlanId, payloads: Vec<EntryPayload>) -> Self {
        self.seed_plan(plan, payloads);
        self
    }

    /// Make the next call of `op` fail with `error`. Faults queue up.
    pub fn fail_next(&self, op: RemoteOp, error: RemoteError) {
        self.lock().faults.entry(op).or_default().push_back(error);
    }

    /// Delay every call of `op` by `latency` (tokio time).
    pub fn set_latency(&self, op: RemoteOp, latency: Duration) {
        self.lock().latency.insert(op, latency);
    }

    // ========================================================================
    // Inspection
    // ========================================================================

    #[must_use]
    pub fn calls(&self) -> Vec<RemoteCall> {
        self.lock().calls.clone()
    }

    #[must_use]
    pub fn calls_for(&self, op: RemoteOp) -> Vec<RemoteCall> {
        self.lock()
            .calls
            .iter()
            .filter(|call| call.op == op)
            .cloned()
            .collect()
    }

    /// Orders sent to `reorder`, oldest first.
    #[must_use]
    pub fn reorder_calls(&self) -> Vec<Vec<EntryId>> {
        self.orders_for(RemoteOp::Reorder)
    }

    /// Orders sent to `validate_order`, oldest first.
    #[must_use]
    pub fn validate_calls(&self) -> Vec<Vec<EntryId>> {
        self.orders_for(RemoteOp::ValidateOrder)
    }

    fn orders_for(&self, op: RemoteOp) -> Vec<Vec<EntryId>> {
        self.calls_for(op)
            .into_iter()
            .filter_map(|call| call.order)
            .collect()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Current authoritative order of `plan` (empty if unknown).
    #[must_use]
    pub fn order(&self, plan: PlanId) -> OrderedCollection {
        self.entries(plan).iter().map(|entry| entry.id).collect()
    }

    #[must_use]
    pub fn entries(&self, plan: PlanId) -> Vec<Entry> {
        self.lock().plans.get(&plan).cloned().unwrap_or_default()
    }

    // ========================================================================
    // Call plumbing
    // ========================================================================

    /// Log `call`, wait out its latency, then surface any queued fault.
    async fn begin(&self, call: RemoteCall) -> RemoteResult<()> {
        let op = call.op;
        let latency = {
            let mut state = self.lock();
            state.calls.push(call);
            state.latency.get(&op).copied()
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        let fault = self
            .lock()
            .faults
            .get_mut(&op)
            .and_then(VecDeque::pop_front);
        match fault {
            Some(error) => {
                tracing::debug!(?op, %error, "injected fault");
                Err(error)
            }
            None => Ok(()),
        }
    }
}

#[async_trait]
impl PlanStore for InMemoryPlanStore {
    async fn load_plan(&self, plan: PlanId) -> RemoteResult<PlanSnapshot> {
        self.begin(RemoteCall {
            plan: Some(plan),
            ..RemoteCall::new(RemoteOp::LoadPlan)
        })
        .await?;
        self.lock().snapshot(plan)
    }

    async fn reorder(&self, plan: PlanId, order: &[EntryId]) -> RemoteResult<PlanSnapshot> {
        self.begin(RemoteCall {
            plan: Some(plan),
            order: Some(order.to_vec()),
            ..RemoteCall::new(RemoteOp::Reorder)
        })
        .await?;

        let mut state = self.lock();
        let entries = state
            .plans
            .get_mut(&plan)
            .ok_or_else(|| RemoteError::NotFound(format!("{plan}")))?;
        let current: OrderedCollection = entries.iter().map(|entry| entry.id).collect();
        let requested = OrderedCollection::new(order.to_vec());
        if !requested.is_permutation_of(&current) {
            return Err(RemoteError::rejected(
                "order is not a permutation of the plan's entries",
            ));
        }
        entries.sort_by_key(|entry| requested.position(entry.id));
        state.snapshot(plan)
    }

    async fn validate_order(
        &self,
        plan: PlanId,
        order: &[EntryId],
    ) -> RemoteResult<ValidationResult> {
        self.begin(RemoteCall {
            plan: Some(plan),
            order: Some(order.to_vec()),
            ..RemoteCall::new(RemoteOp::ValidateOrder)
        })
        .await?;

        let entries = {
            let state = self.lock();
            let known = state
                .plans
                .get(&plan)
                .ok_or_else(|| RemoteError::NotFound(format!("{plan}")))?;
            order
                .iter()
                .filter_map(|id| known.iter().find(|entry| entry.id == *id).cloned())
                .collect::<Vec<_>>()
        };
        Ok(self.rules.validate(&entries))
    }

    async fn add_entry(&self, plan: PlanId, payload: EntryPayload) -> RemoteResult<PlanSnapshot> {
        self.begin(RemoteCall {
            plan: Some(plan),
            payload: Some(payload.clone()),
            ..RemoteCall::new(RemoteOp::AddEntry)
        })
        .await?;

        let mut state = self.lock();
        if !state.plans.contains_key(&plan) {
            return Err(RemoteError::NotFound(format!("{plan}")));
        }
        let id = state.allocate_id();
        state.owner.insert(id, plan);
        if let Some(entries) = state.plans.get_mut(&plan) {
            entries.push(Entry::new(id, payload));
        }
        state.snapshot(plan)
    }

    async fn update_entry(&self, entry: EntryId, patch: EntryPatch) -> RemoteResult<PlanSnapshot> {
        self.begin(RemoteCall {
            entry: Some(entry),
            ..RemoteCall::new(RemoteOp::UpdateEntry)
        })
        .await?;

        let mut state = self.lock();
        let plan = *state
            .owner
            .get(&entry)
            .ok_or_else(|| RemoteError::NotFound(format!("entry {entry}")))?;
        let target = state
            .plans
            .get_mut(&plan)
            .and_then(|entries| entries.iter_mut().find(|candidate| candidate.id == entry))
            .ok_or_else(|| RemoteError::NotFound(format!("entry {entry}")))?;
        target.payload.apply(&patch);
        state.snapshot(plan)
    }

    async fn delete_entry(&self, entry: EntryId) -> RemoteResult<()> {
        self.begin(RemoteCall {
            entry: Some(entry),
            ..RemoteCall::new(RemoteOp::DeleteEntry)
        })
        .await?;

        let mut state = self.lock();
        let plan = state
            .owner
            .remove(&entry)
            .ok_or_else(|| RemoteError::NotFound(format!("entry {entry}")))?;
        if let Some(entries) = state.plans.get_mut(&plan) {
            entries.retain(|candidate| candidate.id != entry);
        }
        Ok(())
    }
}
