//! Fill session façade.
//!
//! One [`FillSession`] drives one application page: it detects fields with
//! the locator cascade, injects profile values, and hands the step to the
//! tracker to advance or finish. Element handles are claimed per step so
//! that two field types never land on the same control: a stronger
//! detection takes an element from a weaker unfilled claim, and a claim is
//! released as soon as its fill fails.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use field_locator::{DetectionResult, FieldLocator};
use formpilot_core_types::{ElementHandle, FillValue, PageLoadId, SemanticFieldType, SessionId};
use page_model::PageDriver;
use platform_registry::{PatternLibrary, GENERIC_PLATFORM};
use profile_cache::UserProfileSnapshot;
use step_tracker::{AdvanceOutcome, StepTracker, TrackerError, TrackerState};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use value_injector::ValueInjector;

use crate::config::EngineConfig;
use crate::errors::{FieldFailure, SessionError, SessionResult};
use crate::report::{FieldOutcome, FillStats, Progress, SessionReport, StepReport};

/// Hold of one field type on one element for the current step.
#[derive(Debug, Clone, Copy)]
struct Claim {
    field: SemanticFieldType,
    confidence: u8,
    filled: bool,
}

pub struct FillSession {
    id: SessionId,
    page: Arc<dyn PageDriver>,
    platform: String,
    locator: FieldLocator,
    injector: ValueInjector,
    tracker: StepTracker,
    claims: HashMap<ElementHandle, Claim>,
    detected: BTreeMap<SemanticFieldType, DetectionResult>,
    claims_load: Option<PageLoadId>,
    stats: FillStats,
    cancel: CancellationToken,
}

impl FillSession {
    /// Identify the platform from the page URL and set up the engine.
    pub async fn start(
        page: Arc<dyn PageDriver>,
        library: Arc<PatternLibrary>,
        config: &EngineConfig,
    ) -> SessionResult<Self> {
        let url = page.url().await;
        let platform = library.identify(&url).map(|p| p.identifier.clone());
        let tracker = StepTracker::new(
            Arc::clone(&library),
            platform.as_deref(),
            config.tracker.clone(),
        )?;
        let id = SessionId::new();
        let platform = platform.unwrap_or_else(|| GENERIC_PLATFORM.to_string());
        info!(
            session = %id,
            platform = %platform,
            degraded = library.is_degraded(),
            "fill session started"
        );
        Ok(Self {
            id,
            page,
            platform,
            locator: FieldLocator::new(library, config.locator.clone()),
            injector: ValueInjector::new(config.injector.clone()),
            tracker,
            claims: HashMap::new(),
            detected: BTreeMap::new(),
            claims_load: None,
            stats: FillStats::default(),
            cancel: CancellationToken::new(),
        })
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn platform(&self) -> &str {
        &self.platform
    }

    pub fn tracker(&self) -> &StepTracker {
        &self.tracker
    }

    pub fn stats(&self) -> FillStats {
        self.stats
    }

    /// Token observed between fields and between steps.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop at the next field or step boundary; the session ends incomplete.
    pub fn abort(&mut self) {
        info!(session = %self.id, "fill session aborted");
        self.cancel.cancel();
        self.tracker.abandon();
    }

    fn ensure_running(&self) -> SessionResult<()> {
        if self.cancel.is_cancelled() {
            return Err(SessionError::Cancelled);
        }
        Ok(())
    }

    /// Claims belong to one page load and one step.
    async fn sync_claims(&mut self) {
        let load = self.page.load_id().await;
        if self.claims_load != Some(load) {
            if self.claims_load.is_some() {
                debug!(load = %load, "page load changed, releasing claims");
                self.locator.invalidate();
            }
            self.reset_step();
            self.claims_load = Some(load);
        }
    }

    fn reset_step(&mut self) {
        self.claims.clear();
        self.detected.clear();
    }

    /// Best element for `field` among elements no other field holds. A
    /// filled claim is never taken; an unfilled one only by a strictly more
    /// confident detection.
    #[instrument(skip_all, fields(session = %self.id, field = %field))]
    pub async fn detect(&mut self, field: SemanticFieldType) -> SessionResult<Option<DetectionResult>> {
        self.sync_claims().await;
        let mut skip: HashSet<ElementHandle> = self
            .claims
            .iter()
            .filter(|(_, claim)| claim.field != field && claim.filled)
            .map(|(handle, _)| *handle)
            .collect();
        let found = loop {
            let Some(result) = self
                .locator
                .locate_excluding(self.page.as_ref(), field, &skip)
                .await?
            else {
                break None;
            };
            match self.claims.get(&result.element) {
                Some(claim) if claim.field != field && claim.confidence >= result.confidence => {
                    debug!(
                        element = %result.element,
                        owner = %claim.field,
                        "element held by an equal or stronger claim"
                    );
                    skip.insert(result.element);
                }
                _ => break Some(result),
            }
        };

        self.claims.retain(|_, claim| claim.field != field);
        let Some(result) = found else {
            self.detected.remove(&field);
            return Ok(None);
        };
        let previous = self.claims.insert(
            result.element,
            Claim {
                field,
                confidence: result.confidence,
                filled: false,
            },
        );
        if let Some(displaced) = previous {
            info!(
                element = %result.element,
                from = %displaced.field,
                confidence = result.confidence,
                "claim taken by a stronger detection"
            );
            self.detected.remove(&displaced.field);
        }
        self.detected.insert(field, result);
        Ok(Some(result))
    }

    /// Let the step's field types compete for elements before anything is
    /// written, so the strongest detection owns each element.
    async fn assign(&mut self, fields: &[SemanticFieldType]) -> SessionResult<()> {
        for field in fields {
            self.ensure_running()?;
            self.detect(*field).await?;
        }
        Ok(())
    }

    fn release(&mut self, field: SemanticFieldType, element: ElementHandle) {
        if self.claims.get(&element).is_some_and(|claim| claim.field == field) {
            debug!(element = %element, "fill failed, releasing claim");
            self.claims.remove(&element);
            self.detected.remove(&field);
        }
    }

    /// Detect `field` and inject `value`. A handle gone stale mid-fill is
    /// re-detected once. A failed fill gives the element back for another
    /// field type to claim.
    #[instrument(skip_all, fields(session = %self.id, field = %field))]
    pub async fn fill(&mut self, field: SemanticFieldType, value: &FillValue) -> SessionResult<FieldOutcome> {
        self.ensure_running()?;
        self.stats.attempts += 1;

        let Some(mut detection) = self.detect(field).await? else {
            self.stats.not_found += 1;
            debug!("field not found");
            return Ok(FieldOutcome::not_found(field));
        };
        let injected = match self
            .injector
            .inject(self.page.as_ref(), detection.element, field, value)
            .await
        {
            Err(err) if err.is_stale() => {
                warn!(element = %detection.element, "handle went stale, detecting again");
                let Some(again) = self.detect(field).await? else {
                    self.stats.not_found += 1;
                    return Ok(FieldOutcome::not_found(field));
                };
                detection = again;
                self.injector
                    .inject(self.page.as_ref(), detection.element, field, value)
                    .await
            }
            other => other,
        };
        let outcome = match injected {
            Ok(outcome) => outcome,
            Err(err) => {
                self.release(field, detection.element);
                return Err(err.into());
            }
        };

        if outcome.success {
            self.stats.successes += 1;
            self.tracker.record_filled(field);
            if let Some(claim) = self.claims.get_mut(&detection.element) {
                claim.filled = true;
            }
        } else {
            self.stats.failures += 1;
            self.release(field, detection.element);
        }
        Ok(FieldOutcome::from_injection(field, detection, outcome))
    }

    /// Advance when every required field of the step holds a value. Claims
    /// and the detection cache are dropped on every step change.
    #[instrument(skip_all, fields(session = %self.id))]
    pub async fn advance_if_complete(&mut self) -> SessionResult<AdvanceOutcome> {
        self.ensure_running()?;
        let result = self.tracker.advance_if_complete(self.page.as_ref()).await;
        match &result {
            Ok(outcome) if outcome.advanced || outcome.completed => {
                self.locator.invalidate();
                self.reset_step();
            }
            Err(TrackerError::StepLoopExceeded { .. }) => self.reset_step(),
            _ => {}
        }
        Ok(result?)
    }

    pub async fn check_completion(&mut self) -> SessionResult<bool> {
        Ok(self.tracker.check_completion(self.page.as_ref()).await?)
    }

    pub fn get_progress(&self) -> Progress {
        let form = self.tracker.form_state();
        Progress {
            platform: self.platform.clone(),
            state: self.tracker.state(),
            current_step: form.current_step_index,
            total_steps: form.total_steps_known,
            filled_count: form.filled_field_types.len(),
            total_detected_fields: self.detected.len(),
            transitions: self.tracker.transitions(),
            stuck: form.stuck,
            completed: self.tracker.state() == TrackerState::Completed && !self.tracker.is_incomplete(),
            incomplete: self.tracker.is_incomplete(),
            stats: self.stats,
        }
    }

    /// Fill every field of the active step the profile has an answer for.
    #[instrument(skip_all, fields(session = %self.id))]
    pub async fn fill_active_step(&mut self, profile: &UserProfileSnapshot) -> SessionResult<StepReport> {
        if self.tracker.state() == TrackerState::AwaitingStepDetection {
            self.tracker.detect_steps(self.page.as_ref()).await?;
        }
        let mut report = StepReport {
            step: self.tracker.form_state().current_step_index,
            ..StepReport::default()
        };
        let mut pending = Vec::new();
        for field in SemanticFieldType::ALL {
            self.ensure_running()?;
            if self.tracker.form_state().filled_field_types.contains(&field) {
                continue;
            }
            match profile.value_for(field) {
                Some(value) => pending.push((field, value)),
                None => report.unanswered.push(field),
            }
        }
        let fields: Vec<SemanticFieldType> = pending.iter().map(|(field, _)| *field).collect();
        self.assign(&fields).await?;

        let mut released = false;
        for (field, value) in &pending {
            self.ensure_running()?;
            let outcome = self.fill(*field, value).await?;
            if !outcome.success && outcome.detected_by.is_some() {
                warn!(field = %field, error = ?outcome.error, "field not filled");
                released = true;
            }
            report.fields.push(outcome);
        }

        // Fields that came up empty may own an element a failed fill let go.
        if released {
            for (index, (field, value)) in pending.iter().enumerate() {
                if report.fields[index].error != Some(FieldFailure::NotFound) {
                    continue;
                }
                self.ensure_running()?;
                let retry = self.fill(*field, value).await?;
                if retry.detected_by.is_some() {
                    report.fields[index] = retry;
                }
            }
        }
        info!(
            step = report.step,
            filled = report.filled(),
            attempted = report.fields.len(),
            "step filled"
        );
        Ok(report)
    }

    /// Fill and advance step after step until a completion signal, the
    /// advance cap, a blocked step or cancellation.
    #[instrument(skip_all, fields(session = %self.id))]
    pub async fn run_to_completion(&mut self, profile: &UserProfileSnapshot) -> SessionResult<SessionReport> {
        let mut steps = Vec::new();
        let mut advances = Vec::new();
        let mut blocked_by = Vec::new();
        let mut error = None;

        loop {
            if self.cancel.is_cancelled() {
                self.tracker.abandon();
                break;
            }
            if self.check_completion().await? {
                break;
            }
            match self.fill_active_step(profile).await {
                Ok(step) => steps.push(step),
                Err(SessionError::Cancelled) => continue,
                Err(err) => return Err(err),
            }
            match self.advance_if_complete().await {
                Ok(outcome) => {
                    let done = outcome.completed;
                    let stalled = !outcome.advanced && !outcome.timed_out;
                    if !outcome.blocked_by.is_empty() {
                        blocked_by = outcome.blocked_by.clone();
                    }
                    if let Some(err) = &outcome.error {
                        if stalled {
                            error = Some(err.to_string());
                        }
                    }
                    advances.push(outcome);
                    if done {
                        break;
                    }
                    if stalled {
                        // Required fields the profile cannot answer, or no
                        // advance control at all.
                        self.tracker.abandon();
                        break;
                    }
                }
                Err(SessionError::Cancelled) => continue,
                Err(SessionError::Tracker(err @ TrackerError::StepLoopExceeded { .. })) => {
                    error = Some(err.to_string());
                    break;
                }
                Err(err) => return Err(err),
            }
        }

        let progress = self.get_progress();
        info!(
            completed = progress.completed,
            transitions = progress.transitions,
            filled = self.stats.successes,
            "fill session finished"
        );
        Ok(SessionReport {
            session_id: self.id.to_string(),
            completed: progress.completed,
            completion: self.tracker.completion().cloned(),
            steps,
            advances,
            blocked_by,
            cancelled: self.cancel.is_cancelled(),
            error,
            progress,
        })
    }
}
