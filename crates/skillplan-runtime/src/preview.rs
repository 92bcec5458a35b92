#![forbid(unsafe_code)]

//! Debounced validation preview of the draft order.
//!
//! While a drag is active, every draft change restarts a trailing-edge timer.
//! Only when the draft has been quiet for the configured delay is a single
//! `validate_order` request sent for that exact snapshot.
//!
//! ```text
//! draft:     o1 ── o2 ── o3 ·························
//! timer:     ├──x  ├──x  ├───── 200ms ─────┤
//! request:                                 validate(o3) ──► result(g3)
//! generation: 1     2     3
//! ```
//!
//! # Generations
//!
//! Each draft change bumps a monotonically increasing generation. A request
//! cannot be cancelled once sent; it runs detached and its result is kept
//! only if its generation is still current when it arrives. Leaving drag mode
//! bumps the generation too, so late previews never reach the committed view.
//!
//! # Failure Modes
//!
//! - A failed preview request is logged and leaves the previous result shown.
//! - Without a tokio runtime on the calling thread no timer can be armed; the
//!   change is logged and skipped.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use skillplan_core::{
    IssueSeverity, OrderedCollection, PlanId, PlanStore, RemoteResult, SkillKey, ValidationResult,
};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Debounce settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    /// Quiet period before a preview request is sent (default: 200ms).
    pub debounce_ms: u64,
    /// When false, drag changes never trigger a request.
    pub enabled: bool,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 200,
            enabled: true,
        }
    }
}

impl PreviewConfig {
    #[must_use]
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// Which order a validation result belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationSource {
    Committed,
    Preview,
}

/// A validation result together with the order it was computed for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedValidation {
    pub source: ValidationSource,
    pub order: OrderedCollection,
    pub result: ValidationResult,
    pub generation: u64,
}

#[derive(Debug, Default)]
struct PreviewState {
    dragging: bool,
    generation: u64,
    committed_generation: u64,
    committed: Option<TaggedValidation>,
    preview: Option<TaggedValidation>,
    requests_issued: u64,
    stale_discarded: u64,
}

/// Speculative validation of the draft, one per plan session.
pub struct ValidationPreviewPipeline {
    plan: PlanId,
    store: Arc<dyn PlanStore>,
    config: PreviewConfig,
    shared: Arc<Mutex<PreviewState>>,
    timer: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for ValidationPreviewPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = lock(&self.shared);
        f.debug_struct("ValidationPreviewPipeline")
            .field("plan", &self.plan)
            .field("config", &self.config)
            .field("dragging", &state.dragging)
            .field("generation", &state.generation)
            .field("timer_armed", &self.timer.is_some())
            .finish()
    }
}

fn lock(shared: &Mutex<PreviewState>) -> MutexGuard<'_, PreviewState> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ValidationPreviewPipeline {
    #[must_use]
    pub fn new(plan: PlanId, store: Arc<dyn PlanStore>, config: PreviewConfig) -> Self {
        Self {
            plan,
            store,
            config,
            shared: Arc::new(Mutex::new(PreviewState::default())),
            timer: None,
        }
    }

    #[must_use]
    pub fn config(&self) -> &PreviewConfig {
        &self.config
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }

    /// Enter or leave drag mode.
    ///
    /// Either transition invalidates any armed timer and any request still in
    /// flight, and drops the current preview.
    pub fn set_dragging(&mut self, dragging: bool) {
        {
            let mut state = lock(&self.shared);
            if state.dragging == dragging {
                return;
            }
            state.dragging = dragging;
            state.generation += 1;
            state.preview = None;
        }
        self.cancel_timer();
        tracing::trace!(target: "skillplan.preview", plan = %self.plan, dragging, "drag mode changed");
    }

    #[must_use]
    pub fn is_dragging(&self) -> bool {
        lock(&self.shared).dragging
    }

    /// Restart the debounce for a new draft. Ignored while not dragging.
    pub fn on_draft_changed(&mut self, draft: &OrderedCollection) {
        if !self.config.enabled {
            return;
        }
        let generation = {
            let mut state = lock(&self.shared);
            if !state.dragging {
                return;
            }
            state.generation += 1;
            state.generation
        };
        self.cancel_timer();

        let Ok(handle) = Handle::try_current() else {
            tracing::warn!(
                target: "skillplan.preview",
                plan = %self.plan,
                "no async runtime; preview skipped"
            );
            return;
        };

        let shared = Arc::clone(&self.shared);
        let store = Arc::clone(&self.store);
        let plan = self.plan;
        let delay = self.config.debounce();
        let order = draft.clone();
        let spawner = handle.clone();
        self.timer = Some(handle.spawn(async move {
            tokio::time::sleep(delay).await;
            {
                let mut state = lock(&shared);
                if state.generation != generation || !state.dragging {
                    return;
                }
                state.requests_issued += 1;
            }
            tracing::debug!(
                target: "skillplan.preview",
                plan = %plan,
                generation,
                len = order.len(),
                "preview request sent"
            );
            // Detached so that the next draft change cannot cancel it.
            spawner.spawn(run_preview(store, shared, plan, order, generation));
        }));
    }

    /// Validate the committed order and keep the result as the fallback view.
    pub async fn refresh_committed(&self, order: &OrderedCollection) -> RemoteResult<()> {
        let generation = {
            let mut state = lock(&self.shared);
            state.committed_generation += 1;
            state.requests_issued += 1;
            state.committed_generation
        };
        let result = self.store.validate_order(self.plan, order.ids()).await?;

        let mut state = lock(&self.shared);
        if state.committed_generation == generation {
            tracing::debug!(
                target: "skillplan.preview",
                plan = %self.plan,
                errors = result.errors.len(),
                warnings = result.warnings.len(),
                "committed validation updated"
            );
            state.committed = Some(TaggedValidation {
                source: ValidationSource::Committed,
                order: order.clone(),
                result,
                generation,
            });
        } else {
            state.stale_discarded += 1;
        }
        Ok(())
    }

    /// The validation to render right now.
    ///
    /// While dragging this is the latest accepted preview, falling back to the
    /// committed result until one arrives.
    #[must_use]
    pub fn current(&self) -> Option<TaggedValidation> {
        let state = lock(&self.shared);
        if state.dragging {
            state.preview.clone().or_else(|| state.committed.clone())
        } else {
            state.committed.clone()
        }
    }

    /// Badge map for [`current`](Self::current); errors win over warnings.
    #[must_use]
    pub fn status_by_key(&self) -> HashMap<SkillKey, IssueSeverity> {
        self.current()
            .map(|tagged| tagged.result.status_by_key())
            .unwrap_or_default()
    }

    /// Current generation token.
    #[must_use]
    pub fn generation(&self) -> u64 {
        lock(&self.shared).generation
    }

    /// Validation requests actually sent (preview and committed).
    #[must_use]
    pub fn requests_issued(&self) -> u64 {
        lock(&self.shared).requests_issued
    }

    /// Responses that arrived after being superseded.
    #[must_use]
    pub fn stale_discarded(&self) -> u64 {
        lock(&self.shared).stale_discarded
    }
}

impl Drop for ValidationPreviewPipeline {
    fn drop(&mut self) {
        self.cancel_timer();
    }
}

async fn run_preview(
    store: Arc<dyn PlanStore>,
    shared: Arc<Mutex<PreviewState>>,
    plan: PlanId,
    order: OrderedCollection,
    generation: u64,
) {
    match store.validate_order(plan, order.ids()).await {
        Ok(result) => {
            let mut state = lock(&shared);
            if state.generation == generation && state.dragging {
                state.preview = Some(TaggedValidation {
                    source: ValidationSource::Preview,
                    order,
                    result,
                    generation,
                });
            } else {
                state.stale_discarded += 1;
                tracing::trace!(
                    target: "skillplan.preview",
                    plan = %plan,
                    generation,
                    current = state.generation,
                    "stale preview discarded"
                );
            }
        }
        Err(err) => {
            tracing::warn!(
                target: "skillplan.preview",
                plan = %plan,
                generation,
                error = %err,
                "preview request failed"
            );
        }
    }
}
