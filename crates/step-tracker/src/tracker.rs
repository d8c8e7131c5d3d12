use std::collections::HashSet;
use std::sync::Arc;

use field_locator::ScanScope;
use formpilot_core_types::{ElementHandle, PageLoadId, SemanticFieldType};
use page_model::{PageDriver, PageQuery, PageResult};
use platform_registry::{PatternLibrary, PlatformProfile};
use tracing::{debug, info, instrument, warn};

use crate::completeness::{describe_control, missing_required};
use crate::completion::detect_completion;
use crate::controls::{locate_controls, poll_until, press, ControlSet};
use crate::errors::TrackerError;
use crate::indicators::StepIndicatorScanner;
use crate::model::{AdvanceOutcome, CompletionSignal, ControlKind, FormState, StepInfo, TrackerState};
use crate::policy::TrackerConfig;

/// What the page looked like before an advance activation.
struct Snapshot {
    load: PageLoadId,
    inputs: HashSet<ElementHandle>,
    control: ElementHandle,
}

enum Settled {
    Completed(CompletionSignal),
    NewContent,
}

/// Wizard state machine for one page session.
pub struct StepTracker {
    library: Arc<PatternLibrary>,
    platform: Option<String>,
    config: TrackerConfig,
    scanner: StepIndicatorScanner,
    state: TrackerState,
    /// State to return to when an advance leads nowhere.
    resting: TrackerState,
    form: FormState,
    transitions: u32,
    consecutive_timeouts: u32,
    incomplete: bool,
    completion: Option<CompletionSignal>,
}

impl StepTracker {
    pub fn new(
        library: Arc<PatternLibrary>,
        platform: Option<&str>,
        config: TrackerConfig,
    ) -> Result<Self, TrackerError> {
        let scanner = StepIndicatorScanner::new(&library.generic().step_markers)?;
        Ok(Self {
            library,
            platform: platform.map(str::to_string),
            config,
            scanner,
            state: TrackerState::AwaitingStepDetection,
            resting: TrackerState::SingleStep,
            form: FormState::default(),
            transitions: 0,
            consecutive_timeouts: 0,
            incomplete: false,
            completion: None,
        })
    }

    pub fn state(&self) -> TrackerState {
        self.state
    }

    pub fn form_state(&self) -> &FormState {
        &self.form
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Advance activations performed so far.
    pub fn transitions(&self) -> u32 {
        self.transitions
    }

    /// Ended without a completion signal.
    pub fn is_incomplete(&self) -> bool {
        self.incomplete
    }

    pub fn completion(&self) -> Option<&CompletionSignal> {
        self.completion.as_ref()
    }

    pub fn record_filled(&mut self, field: SemanticFieldType) {
        self.form.filled_field_types.insert(field);
    }

    /// Stop tracking; the session ends incomplete.
    pub fn abandon(&mut self) {
        if self.state != TrackerState::Completed {
            self.state = TrackerState::Completed;
            self.incomplete = true;
        }
    }

    fn platform(&self) -> Option<&PlatformProfile> {
        self.platform.as_deref().and_then(|id| self.library.platform(id))
    }

    /// Eligible fields of the current step, active section first.
    pub async fn scope<P: PageQuery + ?Sized>(&self, page: &P) -> PageResult<ScanScope> {
        ScanScope::discover(page, self.platform(), self.scanner.markers()).await
    }

    pub async fn step_info<P: PageQuery + ?Sized>(&self, page: &P) -> PageResult<Option<StepInfo>> {
        self.scanner.scan(page).await
    }

    pub async fn controls<P: PageQuery + ?Sized>(&self, page: &P) -> PageResult<ControlSet> {
        let controls = self.library.navigation_controls(self.platform());
        locate_controls(page, &controls).await
    }

    /// Leave `AwaitingStepDetection`: a wizard when step indicators or a
    /// lone advance control are present, a single step otherwise.
    #[instrument(skip_all, fields(state = ?self.state))]
    pub async fn detect_steps<P: PageQuery + ?Sized>(
        &mut self,
        page: &P,
    ) -> Result<TrackerState, TrackerError> {
        if self.state == TrackerState::Completed {
            return Ok(self.state);
        }
        if self.check_completion(page).await? {
            return Ok(self.state);
        }

        let info = self.step_info(page).await?;
        let controls = self.controls(page).await?;
        self.apply_step_info(info.as_ref(), self.state == TrackerState::AwaitingStepDetection);
        self.form.has_advance_control = controls.next.is_some();
        self.form.has_submit_control = controls.submit.is_some();

        let wizard = info.is_some() || controls.suggests_wizard();
        self.resting = if wizard {
            TrackerState::StepActive
        } else {
            TrackerState::SingleStep
        };
        self.state = self.resting;
        info!(
            state = ?self.state,
            step = self.form.current_step_index,
            total = ?self.form.total_steps_known,
            "steps detected"
        );
        Ok(self.state)
    }

    fn apply_step_info(&mut self, info: Option<&StepInfo>, initial: bool) {
        let Some(info) = info else {
            return;
        };
        if info.total.is_some() {
            self.form.total_steps_known = info.total;
        }
        if initial {
            if let Some(current) = info.current {
                self.form.current_step_index = current;
            }
        }
    }

    /// Any state moves to `Completed` once a completion signal shows.
    pub async fn check_completion<P: PageQuery + ?Sized>(
        &mut self,
        page: &P,
    ) -> Result<bool, TrackerError> {
        if self.state == TrackerState::Completed {
            return Ok(!self.incomplete);
        }
        if let Some(signal) = detect_completion(page, &self.library, self.platform()).await? {
            self.complete(signal);
            return Ok(true);
        }
        Ok(false)
    }

    fn complete(&mut self, signal: CompletionSignal) {
        info!(signal = ?signal, step = self.form.current_step_index, "application completed");
        self.state = TrackerState::Completed;
        self.completion = Some(signal);
    }

    /// Required fields of the active step still lacking a value.
    pub async fn missing_required<P: PageQuery + ?Sized>(
        &self,
        page: &P,
    ) -> Result<Vec<ElementHandle>, TrackerError> {
        let scope = self.scope(page).await?;
        Ok(missing_required(page, &scope).await?)
    }

    /// Advance only when every required field of the step holds a value.
    pub async fn advance_if_complete(
        &mut self,
        page: &dyn PageDriver,
    ) -> Result<AdvanceOutcome, TrackerError> {
        if self.state == TrackerState::AwaitingStepDetection {
            self.detect_steps(page).await?;
        }
        if self.state != TrackerState::Completed {
            let missing = self.missing_required(page).await?;
            if !missing.is_empty() {
                let mut blocked_by = Vec::with_capacity(missing.len());
                for handle in missing {
                    blocked_by.push(describe_control(page, handle).await?);
                }
                debug!(?blocked_by, "step incomplete");
                return Ok(AdvanceOutcome {
                    new_step_index: self.form.current_step_index,
                    blocked_by,
                    ..AdvanceOutcome::default()
                });
            }
        }
        self.advance(page).await
    }

    /// Activate the advance control and wait for the page to move on.
    #[instrument(skip_all, fields(step = self.form.current_step_index, transitions = self.transitions))]
    pub async fn advance(&mut self, page: &dyn PageDriver) -> Result<AdvanceOutcome, TrackerError> {
        if self.incomplete {
            return Err(TrackerError::StepLoopExceeded {
                cap: self.config.transition_cap,
            });
        }
        if self.state == TrackerState::AwaitingStepDetection {
            self.detect_steps(page).await?;
        }
        if self.check_completion(page).await? {
            return Ok(self.completed_outcome(None, false));
        }

        let Some((kind, control)) = self.find_advance_control(page).await? else {
            let rescans = self.config.advance_rescans;
            warn!(rescans, "no advance control");
            return Ok(AdvanceOutcome {
                new_step_index: self.form.current_step_index,
                error: Some(TrackerError::NoAdvanceControl { rescans }),
                ..AdvanceOutcome::default()
            });
        };

        let before = Snapshot {
            load: page.load_id().await,
            inputs: self.scope(page).await?.ranked().iter().copied().collect(),
            control,
        };
        self.state = TrackerState::Transitioning;
        self.transitions += 1;
        info!(control = ?kind, transition = self.transitions, "advancing");

        let (settled, used_fallback) = self.activate(page, &before).await?;
        let outcome = match settled {
            Some(Settled::Completed(signal)) => {
                self.complete(signal);
                self.completed_outcome(Some(kind), used_fallback)
            }
            Some(Settled::NewContent) => {
                self.enter_next_step(page).await?;
                AdvanceOutcome {
                    advanced: true,
                    new_step_index: self.form.current_step_index,
                    activated: Some(kind),
                    used_fallback,
                    ..AdvanceOutcome::default()
                }
            }
            None => self.timed_out(kind, used_fallback),
        };

        if self.state != TrackerState::Completed && self.transitions >= self.config.transition_cap {
            let cap = self.config.transition_cap;
            warn!(cap, "advance cap reached");
            self.state = TrackerState::Completed;
            self.incomplete = true;
            return Err(TrackerError::StepLoopExceeded { cap });
        }
        Ok(outcome)
    }

    async fn find_advance_control(
        &mut self,
        page: &dyn PageDriver,
    ) -> Result<Option<(ControlKind, ElementHandle)>, TrackerError> {
        for attempt in 0..=self.config.advance_rescans {
            let controls = self.controls(page).await?;
            self.form.has_advance_control = controls.next.is_some();
            self.form.has_submit_control = controls.submit.is_some();
            if let Some(found) = controls.advance() {
                return Ok(Some(found));
            }
            if attempt < self.config.advance_rescans {
                debug!(attempt, "advance control missing, re-scanning");
                tokio::time::sleep(self.config.rescan_delay()).await;
            }
        }
        Ok(None)
    }

    /// Pointer sequence first; direct activation only when nothing settles
    /// within the click settle window.
    async fn activate(
        &self,
        page: &dyn PageDriver,
        before: &Snapshot,
    ) -> Result<(Option<Settled>, bool), TrackerError> {
        let interval = self.config.poll_interval();
        press(page, before.control).await?;
        if let Some(settled) =
            poll_until(self.config.click_settle(), interval, move || self.settled(page, before)).await?
        {
            return Ok((Some(settled), false));
        }

        debug!(control = %before.control, "falling back to direct activation");
        match page.activate(before.control).await {
            Ok(()) => {}
            // The page moved on between the last poll and the activation.
            Err(err) if err.is_stale() => {}
            Err(err) => return Err(err.into()),
        }
        let settled = poll_until(self.config.navigation_timeout(), interval, move || {
            self.settled(page, before)
        })
        .await?;
        Ok((settled, true))
    }

    async fn settled(&self, page: &dyn PageDriver, before: &Snapshot) -> PageResult<Option<Settled>> {
        if let Some(signal) = detect_completion(page, &self.library, self.platform()).await? {
            return Ok(Some(Settled::Completed(signal)));
        }
        if page.load_id().await != before.load {
            return Ok(Some(Settled::NewContent));
        }
        let scope = self.scope(page).await?;
        if scope.ranked().iter().any(|h| !before.inputs.contains(h)) {
            return Ok(Some(Settled::NewContent));
        }
        // A step without inputs (a review page) shows a different control.
        let controls = self.controls(page).await?;
        if controls.advance().is_some_and(|(_, h)| h != before.control) {
            return Ok(Some(Settled::NewContent));
        }
        Ok(None)
    }

    async fn enter_next_step(&mut self, page: &dyn PageDriver) -> Result<(), TrackerError> {
        self.form = self.form.next_step();
        self.consecutive_timeouts = 0;
        let info = self.step_info(page).await?;
        self.apply_step_info(info.as_ref(), false);
        let controls = self.controls(page).await?;
        self.form.has_advance_control = controls.next.is_some();
        self.form.has_submit_control = controls.submit.is_some();
        self.resting = TrackerState::StepActive;
        self.state = TrackerState::StepActive;
        info!(
            step = self.form.current_step_index,
            total = ?self.form.total_steps_known,
            "step active"
        );
        Ok(())
    }

    fn timed_out(&mut self, kind: ControlKind, used_fallback: bool) -> AdvanceOutcome {
        self.consecutive_timeouts += 1;
        if self.consecutive_timeouts >= self.config.stuck_after {
            self.form.stuck = true;
        }
        self.state = self.resting;
        let waited_ms = self.config.click_settle_ms + self.config.navigation_timeout_ms;
        warn!(
            step = self.form.current_step_index,
            timeouts = self.consecutive_timeouts,
            stuck = self.form.stuck,
            "no new content after advancing"
        );
        AdvanceOutcome {
            new_step_index: self.form.current_step_index,
            activated: Some(kind),
            used_fallback,
            timed_out: true,
            stuck: self.form.stuck,
            error: Some(TrackerError::NavigationTimeout {
                step: self.form.current_step_index,
                waited_ms,
            }),
            ..AdvanceOutcome::default()
        }
    }

    fn completed_outcome(&self, activated: Option<ControlKind>, used_fallback: bool) -> AdvanceOutcome {
        AdvanceOutcome {
            advanced: activated.is_some(),
            new_step_index: self.form.current_step_index,
            activated,
            completed: true,
            used_fallback,
            ..AdvanceOutcome::default()
        }
    }
}
