use crate::ads::{
    AdFailure, AdHandle, AdLoadError, AdOutcome, AdRequestOptions, AdResult, AdType, AdUnitChain,
    AttemptId, PresentationOutcome, PresentationTicket,
};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

/// Side effects requested by the pipeline. The session worker executes them
/// in order; the pipeline itself never touches timers, tasks or the UI.
#[derive(Debug, Clone, PartialEq)]
pub enum AdEffect {
    ShowLoadingCover,
    HideLoadingCover,
    /// Start loading `unit` through the presenter for `ad_type`
    StartLoad {
        attempt: AttemptId,
        ad_type: AdType,
        unit: String,
    },
    ArmTimeout {
        attempt: AttemptId,
        after: Duration,
    },
    DisarmTimeout {
        attempt: AttemptId,
    },
    /// Drop the in-flight load. Whatever it resolves to is no longer wanted.
    AbandonLoad {
        attempt: AttemptId,
    },
    SchedulePresentation {
        ticket: PresentationTicket,
        after: Duration,
    },
    Present {
        ticket: PresentationTicket,
        ad_type: AdType,
        handle: AdHandle,
    },
    /// Report the terminal result of a request to the page callback
    Deliver {
        callback: String,
        result: AdResult,
    },
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AttemptState {
    Loading,
    Loaded,
    Presenting,
    TimedOut,
    Failed,
}

/// One load of one unit of a chain.
#[derive(Debug, Clone)]
pub struct AdAttempt {
    pub id: AttemptId,
    pub ad_type: AdType,
    pub unit: String,
    pub started_at: Instant,
    pub timeout_at: Instant,
    pub state: AttemptState,
}

/// A request that is still walking its chain.
#[derive(Debug)]
struct LoadingRequest {
    attempt: AdAttempt,
    chain: AdUnitChain,
    callback: String,
    options: AdRequestOptions,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum PresentationState {
    Scheduled,
    Presenting,
}

#[derive(Debug)]
struct Presentation {
    ad_type: AdType,
    unit: String,
    display_index: usize,
    callback: String,
    state: PresentationState,
}

/// Drives ad requests through load, fallback, timeout and presentation.
///
/// Every accepted request ends in exactly one [`AdEffect::Deliver`]. Events
/// for attempts or tickets the pipeline no longer tracks are dropped, which
/// is what keeps late SDK callbacks and stale timers from double-reporting.
#[derive(Debug)]
pub struct AdDeliveryPipeline {
    attempt_timeout: Duration,
    /// Request currently loading. `Some` is the "loading an ad" flag.
    loading: Option<LoadingRequest>,
    presentations: HashMap<PresentationTicket, Presentation>,
    /// Loaded ads waiting for presentation, keyed by type and unit
    handles: HashMap<(AdType, String), AdHandle>,
    current_ad_unit: Option<String>,
    next_attempt: u64,
    next_ticket: u64,
}

impl AdDeliveryPipeline {
    pub fn new(attempt_timeout: Duration) -> Self {
        Self {
            attempt_timeout,
            loading: None,
            presentations: HashMap::new(),
            handles: HashMap::new(),
            current_ad_unit: None,
            next_attempt: 0,
            next_ticket: 0,
        }
    }

    pub fn is_loading_ad(&self) -> bool {
        self.loading.is_some()
    }

    pub fn current_ad_unit(&self) -> Option<&str> {
        self.current_ad_unit.as_deref()
    }

    /// The attempt currently racing its timeout, if any.
    pub fn active_attempt(&self) -> Option<&AdAttempt> {
        self.loading.as_ref().map(|l| &l.attempt)
    }

    /// Accepts a new ad request. A request arriving while another one is
    /// loading is dropped without any callback. A request for the unit that
    /// is already loaded and not yet shown reuses that ad instead of loading
    /// it again.
    pub fn request(
        &mut self,
        ad_type: AdType,
        raw_units: &str,
        callback: &str,
        options: AdRequestOptions,
        now: Instant,
    ) -> Vec<AdEffect> {
        if let Some(active) = &self.loading {
            log::warn!(
                "Ad request for {} dropped, still loading {} unit {:?}",
                ad_type,
                active.attempt.ad_type,
                active.attempt.unit
            );
            return vec![];
        }

        if let Some(effects) = self.reuse_loaded(ad_type, raw_units, callback, options) {
            return effects;
        }

        let chain = AdUnitChain::parse(raw_units);
        log::debug!("Ad request {} with {} unit(s)", ad_type, chain.len());

        let attempt = self.new_attempt(ad_type, chain.current(), now);
        let mut effects = vec![AdEffect::ShowLoadingCover];
        effects.extend(Self::load_effects(&attempt, self.attempt_timeout));

        self.loading = Some(LoadingRequest {
            attempt,
            chain,
            callback: callback.to_string(),
            options,
        });

        effects
    }

    /// Completion of the load started for `attempt`.
    pub fn on_load_result(
        &mut self,
        attempt: AttemptId,
        result: Result<AdHandle, AdLoadError>,
        now: Instant,
    ) -> Vec<AdEffect> {
        if !self.is_active(attempt) {
            log::debug!("Ignoring late load result for {:?}", attempt);
            return vec![];
        }

        let mut effects = vec![AdEffect::DisarmTimeout { attempt }];
        match result {
            Ok(handle) => effects.extend(self.loaded(handle)),
            Err(err) => {
                let failure = match &mut self.loading {
                    Some(request) => {
                        request.attempt.state = AttemptState::Failed;
                        AdFailure::LoadFailure {
                            unit: request.attempt.unit.clone(),
                            source: err,
                        }
                    }
                    None => return effects,
                };
                effects.extend(self.fall_back(failure, now));
            }
        }

        effects
    }

    /// The per-attempt timer for `attempt` fired.
    pub fn on_timeout(&mut self, attempt: AttemptId, now: Instant) -> Vec<AdEffect> {
        if !self.is_active(attempt) {
            return vec![];
        }

        let failure = match &mut self.loading {
            Some(request) => {
                request.attempt.state = AttemptState::TimedOut;
                AdFailure::Timeout {
                    unit: request.attempt.unit.clone(),
                    after: self.attempt_timeout,
                }
            }
            None => return vec![],
        };

        let mut effects = vec![AdEffect::AbandonLoad { attempt }];
        effects.extend(self.fall_back(failure, now));
        effects
    }

    /// A scheduled (auto-show) presentation is due.
    pub fn on_presentation_due(&mut self, ticket: PresentationTicket) -> Vec<AdEffect> {
        self.present(ticket)
    }

    pub fn on_presentation_finished(
        &mut self,
        ticket: PresentationTicket,
        outcome: PresentationOutcome,
    ) -> Vec<AdEffect> {
        let Some(presentation) = self.presentations.remove(&ticket) else {
            return vec![];
        };

        if let PresentationOutcome::FailedToPresent(reason) = &outcome {
            log::warn!("Ad unit {:?} failed to present: {}", presentation.unit, reason);
        }

        let result = AdResult {
            ad_type: presentation.ad_type,
            outcome: AdOutcome::from_presentation(presentation.ad_type, &outcome),
            ad_unit: presentation.unit,
            display_index: presentation.display_index,
        };

        // A dismissed ad invalidates every cached ad, not just its own.
        self.handles.clear();
        self.current_ad_unit = None;

        vec![AdEffect::Deliver {
            callback: presentation.callback,
            result,
        }]
    }

    /// Forgets every request, attempt and presentation without reporting any
    /// of them. Used when the session goes away.
    pub fn teardown(&mut self) {
        if let Some(request) = self.loading.take() {
            log::debug!("Dropping in-flight ad request for {}", request.attempt.ad_type);
        }
        self.presentations.clear();
        self.handles.clear();
        self.current_ad_unit = None;
    }

    fn is_active(&self, attempt: AttemptId) -> bool {
        matches!(&self.loading, Some(request) if request.attempt.id == attempt)
    }

    fn new_attempt(&mut self, ad_type: AdType, unit: &str, now: Instant) -> AdAttempt {
        self.next_attempt += 1;
        AdAttempt {
            id: AttemptId(self.next_attempt),
            ad_type,
            unit: unit.to_string(),
            started_at: now,
            timeout_at: now + self.attempt_timeout,
            state: AttemptState::Loading,
        }
    }

    fn load_effects(attempt: &AdAttempt, timeout: Duration) -> [AdEffect; 2] {
        [
            AdEffect::StartLoad {
                attempt: attempt.id,
                ad_type: attempt.ad_type,
                unit: attempt.unit.clone(),
            },
            AdEffect::ArmTimeout {
                attempt: attempt.id,
                after: timeout,
            },
        ]
    }

    fn loaded(&mut self, handle: AdHandle) -> Vec<AdEffect> {
        let Some(mut request) = self.loading.take() else {
            return vec![];
        };
        request.attempt.state = AttemptState::Loaded;

        let unit = request.attempt.unit.clone();
        let ad_type = request.attempt.ad_type;
        log::info!(
            "Loaded {} unit {:?} ({} of {})",
            ad_type,
            unit,
            request.chain.display_index(),
            request.chain.len()
        );

        self.handles.insert((ad_type, unit.clone()), handle);
        self.current_ad_unit = Some(unit.clone());

        let presentation = Presentation {
            ad_type,
            unit,
            display_index: request.chain.display_index(),
            callback: request.callback,
            state: PresentationState::Scheduled,
        };

        let mut effects = vec![AdEffect::HideLoadingCover];
        effects.extend(self.stage(presentation, request.options));
        effects
    }

    fn reuse_loaded(
        &mut self,
        ad_type: AdType,
        raw_units: &str,
        callback: &str,
        options: AdRequestOptions,
    ) -> Option<Vec<AdEffect>> {
        let unit = raw_units.trim();
        if self.current_ad_unit.as_deref() != Some(unit)
            || !self.handles.contains_key(&(ad_type, unit.to_string()))
        {
            return None;
        }

        let display_index = self
            .presentations
            .values()
            .find(|p| p.ad_type == ad_type && p.unit == unit)
            .map_or(1, |p| p.display_index);
        log::debug!("Ad request {} reuses loaded unit {:?}", ad_type, unit);

        let presentation = Presentation {
            ad_type,
            unit: unit.to_string(),
            display_index,
            callback: callback.to_string(),
            state: PresentationState::Scheduled,
        };
        Some(self.stage(presentation, options))
    }

    /// Registers `presentation` and either presents it now or schedules it
    /// after the auto-show delay.
    fn stage(&mut self, presentation: Presentation, options: AdRequestOptions) -> Vec<AdEffect> {
        self.next_ticket += 1;
        let ticket = PresentationTicket(self.next_ticket);
        self.presentations.insert(ticket, presentation);

        if options.auto_show && !options.delay.is_zero() {
            vec![AdEffect::SchedulePresentation {
                ticket,
                after: options.delay,
            }]
        } else {
            self.present(ticket)
        }
    }

    fn present(&mut self, ticket: PresentationTicket) -> Vec<AdEffect> {
        let Some(presentation) = self.presentations.get_mut(&ticket) else {
            return vec![];
        };
        if presentation.state != PresentationState::Scheduled {
            return vec![];
        }

        let key = (presentation.ad_type, presentation.unit.clone());
        match self.handles.remove(&key) {
            Some(handle) => {
                presentation.state = PresentationState::Presenting;
                vec![AdEffect::Present {
                    ticket,
                    ad_type: presentation.ad_type,
                    handle,
                }]
            }
            None => {
                let failure = AdFailure::NotAvailable {
                    unit: presentation.unit.clone(),
                };
                log::warn!("{}", failure);

                let Some(presentation) = self.presentations.remove(&ticket) else {
                    return vec![];
                };
                vec![AdEffect::Deliver {
                    callback: presentation.callback,
                    result: AdResult {
                        ad_type: presentation.ad_type,
                        outcome: AdOutcome::NotAvailable,
                        ad_unit: presentation.unit,
                        display_index: presentation.display_index,
                    },
                }]
            }
        }
    }

    fn fall_back(&mut self, failure: AdFailure, now: Instant) -> Vec<AdEffect> {
        log::warn!("{}", failure);

        let Some(mut request) = self.loading.take() else {
            return vec![];
        };

        if request.chain.advance() {
            let attempt = self.new_attempt(request.attempt.ad_type, request.chain.current(), now);
            log::debug!(
                "Falling back to unit {:?} ({} of {})",
                attempt.unit,
                request.chain.display_index(),
                request.chain.len()
            );

            let effects = Self::load_effects(&attempt, self.attempt_timeout).to_vec();
            request.attempt = attempt;
            self.loading = Some(request);
            return effects;
        }

        log::warn!(
            "{}",
            AdFailure::ChainExhausted {
                units: request.chain.len()
            }
        );

        let result = AdResult {
            ad_type: request.attempt.ad_type,
            outcome: AdOutcome::Failed,
            ad_unit: request.chain.current().to_string(),
            display_index: request.chain.display_index(),
        };
        request.chain.reset();

        vec![
            AdEffect::HideLoadingCover,
            AdEffect::Deliver {
                callback: request.callback,
                result,
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(7);

    fn start_load(effects: &[AdEffect]) -> Option<(AttemptId, String)> {
        effects.iter().find_map(|e| match e {
            AdEffect::StartLoad { attempt, unit, .. } => Some((*attempt, unit.clone())),
            _ => None,
        })
    }

    fn delivered(effects: &[AdEffect]) -> Vec<AdResult> {
        effects
            .iter()
            .filter_map(|e| match e {
                AdEffect::Deliver { result, .. } => Some(result.clone()),
                _ => None,
            })
            .collect()
    }

    fn presented(effects: &[AdEffect]) -> Option<PresentationTicket> {
        effects.iter().find_map(|e| match e {
            AdEffect::Present { ticket, .. } => Some(*ticket),
            _ => None,
        })
    }

    fn failed() -> Result<AdHandle, AdLoadError> {
        Err(AdLoadError::Network("offline".into()))
    }

    #[test]
    fn request_shows_cover_and_arms_timeout() {
        let mut p = AdDeliveryPipeline::new(TIMEOUT);
        let now = Instant::now();
        let effects = p.request(AdType::Reward, "a;b", "cb", AdRequestOptions::default(), now);

        assert_eq!(effects[0], AdEffect::ShowLoadingCover);
        let (attempt, unit) = start_load(&effects).unwrap();
        assert_eq!(unit, "a");
        assert!(effects.contains(&AdEffect::ArmTimeout {
            attempt,
            after: TIMEOUT
        }));
        assert!(p.is_loading_ad());
        assert_eq!(p.active_attempt().unwrap().timeout_at, now + TIMEOUT);
    }

    #[test]
    fn exhausted_chain_reports_last_unit_and_index() {
        let mut p = AdDeliveryPipeline::new(TIMEOUT);
        let now = Instant::now();
        let mut effects = p.request(
            AdType::Reward,
            "a;b;c",
            "cb",
            AdRequestOptions::default(),
            now,
        );

        let mut tried = vec![];
        let mut results = vec![];
        while let Some((attempt, unit)) = start_load(&effects) {
            tried.push(unit);
            effects = p.on_load_result(attempt, failed(), now);
            results.extend(delivered(&effects));
        }

        assert_eq!(tried, vec!["a", "b", "c"]);
        assert_eq!(
            results,
            vec![AdResult {
                ad_type: AdType::Reward,
                outcome: AdOutcome::Failed,
                ad_unit: "c".into(),
                display_index: 3,
            }]
        );
        assert!(effects.contains(&AdEffect::HideLoadingCover));
        assert!(!p.is_loading_ad());
    }

    #[test]
    fn timeout_abandons_and_falls_back() {
        let mut p = AdDeliveryPipeline::new(TIMEOUT);
        let now = Instant::now();
        let effects = p.request(
            AdType::Interstitial,
            "slow;fast",
            "cb",
            AdRequestOptions::default(),
            now,
        );
        let (slow, _) = start_load(&effects).unwrap();

        let effects = p.on_timeout(slow, now + TIMEOUT);
        assert_eq!(effects[0], AdEffect::AbandonLoad { attempt: slow });
        let (fast, unit) = start_load(&effects).unwrap();
        assert_eq!(unit, "fast");

        // late success of the abandoned attempt is ignored
        assert!(p.on_load_result(slow, Ok(AdHandle::new("late")), now + TIMEOUT * 2).is_empty());

        let effects = p.on_load_result(fast, Ok(AdHandle::new("h")), now + TIMEOUT);
        assert!(effects.contains(&AdEffect::DisarmTimeout { attempt: fast }));
        let ticket = presented(&effects).unwrap();
        assert_eq!(p.current_ad_unit(), Some("fast"));

        let effects = p.on_presentation_finished(
            ticket,
            PresentationOutcome::DismissedWithoutReward,
        );
        assert_eq!(
            delivered(&effects),
            vec![AdResult {
                ad_type: AdType::Interstitial,
                outcome: AdOutcome::Success,
                ad_unit: "fast".into(),
                display_index: 2,
            }]
        );
        assert_eq!(p.current_ad_unit(), None);
    }

    #[test]
    fn stale_timeout_after_success_is_ignored() {
        let mut p = AdDeliveryPipeline::new(TIMEOUT);
        let now = Instant::now();
        let effects = p.request(AdType::Reward, "a", "cb", AdRequestOptions::default(), now);
        let (attempt, _) = start_load(&effects).unwrap();

        p.on_load_result(attempt, Ok(AdHandle::new("h")), now);
        assert!(p.on_timeout(attempt, now + TIMEOUT).is_empty());
    }

    #[test]
    fn concurrent_request_is_dropped() {
        let mut p = AdDeliveryPipeline::new(TIMEOUT);
        let now = Instant::now();
        p.request(AdType::Reward, "a", "first", AdRequestOptions::default(), now);

        let effects = p.request(
            AdType::Interstitial,
            "b",
            "second",
            AdRequestOptions::default(),
            now,
        );
        assert!(effects.is_empty());
        assert_eq!(p.active_attempt().unwrap().unit, "a");
    }

    #[test]
    fn new_request_accepted_once_previous_one_loaded() {
        let mut p = AdDeliveryPipeline::new(TIMEOUT);
        let now = Instant::now();
        let effects = p.request(AdType::Reward, "a", "first", AdRequestOptions::default(), now);
        let (attempt, _) = start_load(&effects).unwrap();
        p.on_load_result(attempt, Ok(AdHandle::new("h")), now);

        let effects = p.request(AdType::Reward, "b", "second", AdRequestOptions::default(), now);
        assert!(start_load(&effects).is_some());
    }

    #[test]
    fn auto_show_schedules_presentation() {
        let mut p = AdDeliveryPipeline::new(TIMEOUT);
        let now = Instant::now();
        let delay = Duration::from_millis(1500);
        let effects = p.request(
            AdType::RewardedInterstitial,
            "a",
            "cb",
            AdRequestOptions::auto_show(delay),
            now,
        );
        let (attempt, _) = start_load(&effects).unwrap();

        let effects = p.on_load_result(attempt, Ok(AdHandle::new("h")), now);
        let ticket = effects
            .iter()
            .find_map(|e| match e {
                AdEffect::SchedulePresentation { ticket, after } => {
                    assert_eq!(*after, delay);
                    Some(*ticket)
                }
                _ => None,
            })
            .unwrap();
        assert!(presented(&effects).is_none());

        let effects = p.on_presentation_due(ticket);
        assert_eq!(presented(&effects), Some(ticket));
        // due twice does not present twice
        assert!(p.on_presentation_due(ticket).is_empty());

        let effects = p.on_presentation_finished(ticket, PresentationOutcome::EarnedReward);
        assert_eq!(delivered(&effects)[0].outcome, AdOutcome::Success);
    }

    #[test]
    fn repeat_request_reuses_loaded_ad() {
        let mut p = AdDeliveryPipeline::new(TIMEOUT);
        let now = Instant::now();
        let delay = Duration::from_secs(2);
        let effects = p.request(
            AdType::Reward,
            "a",
            "first",
            AdRequestOptions::auto_show(delay),
            now,
        );
        let (attempt, _) = start_load(&effects).unwrap();
        p.on_load_result(attempt, Ok(AdHandle::new("h")), now);
        assert_eq!(p.current_ad_unit(), Some("a"));

        // same unit again while the first one waits for its delay
        let effects = p.request(AdType::Reward, " a ", "second", AdRequestOptions::default(), now);
        assert!(start_load(&effects).is_none());
        assert!(!effects.contains(&AdEffect::ShowLoadingCover));
        let ticket = presented(&effects).unwrap();
        assert!(!p.is_loading_ad());

        let effects = p.on_presentation_finished(ticket, PresentationOutcome::EarnedReward);
        assert_eq!(
            effects,
            vec![AdEffect::Deliver {
                callback: "second".into(),
                result: AdResult {
                    ad_type: AdType::Reward,
                    outcome: AdOutcome::Success,
                    ad_unit: "a".into(),
                    display_index: 1,
                },
            }]
        );

        // a chain or another type still loads fresh
        let effects = p.request(AdType::Reward, "a;b", "third", AdRequestOptions::default(), now);
        assert!(start_load(&effects).is_some());
    }

    #[test]
    fn dismissal_invalidates_pending_presentations() {
        let mut p = AdDeliveryPipeline::new(TIMEOUT);
        let now = Instant::now();
        let delay = Duration::from_secs(5);

        let effects = p.request(AdType::Reward, "a", "first", AdRequestOptions::default(), now);
        let (first, _) = start_load(&effects).unwrap();
        let effects = p.on_load_result(first, Ok(AdHandle::new("h1")), now);
        let first_ticket = presented(&effects).unwrap();

        let effects = p.request(
            AdType::RewardedInterstitial,
            "b",
            "second",
            AdRequestOptions::auto_show(delay),
            now,
        );
        let (second, _) = start_load(&effects).unwrap();
        let effects = p.on_load_result(second, Ok(AdHandle::new("h2")), now);
        let second_ticket = effects
            .iter()
            .find_map(|e| match e {
                AdEffect::SchedulePresentation { ticket, .. } => Some(*ticket),
                _ => None,
            })
            .unwrap();

        let effects = p.on_presentation_finished(
            first_ticket,
            PresentationOutcome::DismissedWithoutReward,
        );
        assert_eq!(delivered(&effects)[0].outcome, AdOutcome::Cancelled);

        let effects = p.on_presentation_due(second_ticket);
        assert_eq!(
            delivered(&effects),
            vec![AdResult {
                ad_type: AdType::RewardedInterstitial,
                outcome: AdOutcome::NotAvailable,
                ad_unit: "b".into(),
                display_index: 1,
            }]
        );
    }

    #[test]
    fn teardown_suppresses_callbacks() {
        let mut p = AdDeliveryPipeline::new(TIMEOUT);
        let now = Instant::now();
        let effects = p.request(AdType::Reward, "a", "cb", AdRequestOptions::default(), now);
        let (attempt, _) = start_load(&effects).unwrap();

        p.teardown();
        assert!(!p.is_loading_ad());
        assert!(p.on_load_result(attempt, failed(), now).is_empty());
        assert!(p.on_timeout(attempt, now + TIMEOUT).is_empty());
    }

    #[test]
    fn failed_presentation_reports_failed() {
        let mut p = AdDeliveryPipeline::new(TIMEOUT);
        let now = Instant::now();
        let effects = p.request(AdType::Reward, "a", "cb", AdRequestOptions::default(), now);
        let (attempt, _) = start_load(&effects).unwrap();
        let ticket = presented(&p.on_load_result(attempt, Ok(AdHandle::new("h")), now)).unwrap();

        let effects = p.on_presentation_finished(
            ticket,
            PresentationOutcome::FailedToPresent("no vc".into()),
        );
        assert_eq!(delivered(&effects)[0].outcome, AdOutcome::Failed);
        // finished twice reports once
        assert!(p
            .on_presentation_finished(ticket, PresentationOutcome::EarnedReward)
            .is_empty());
    }
}
