use crate::ads::{
    AdDeliveryPipeline, AdEffect, AdHandle, AdLoadError, AdType, AttemptId, PresentationOutcome,
    PresentationTicket,
};
use crate::back::{
    BackActionPolicy, BackActionStateMachine, BackContext, BackOutcome, BackState, VerifyResult,
};
use crate::bridge::{ad_result_script, consent_script, AdRequestMessage, BridgeMessage};
use crate::config::BrowserConfig;
use crate::consent::{ConsentPayload, ConsentStore, TrackingStatus};
use crate::events::{CloseReason, SessionCommand, SessionEvent};
use crate::navigation::{NavigationDecision, NavigationPolicy, NavigationRequest};
use crate::services::SessionServices;
use crate::session::handle::SessionHandle;
use crate::session::timers::{TimerKey, TimerSet};
use crate::session::{Session, SessionId};
use crate::DEFAULT_CHANNEL_CAPACITY;
use futures::FutureExt;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use url::Url;

/// Completions of session timers and collaborator futures, delivered back
/// onto the worker.
#[derive(Debug)]
pub(crate) enum InternalEvent {
    AdLoaded {
        attempt: AttemptId,
        result: Result<AdHandle, AdLoadError>,
    },
    AdTimedOut {
        attempt: AttemptId,
    },
    PresentationDue {
        ticket: PresentationTicket,
    },
    PresentationFinished {
        ticket: PresentationTicket,
        outcome: PresentationOutcome,
    },
    BackVerifyElapsed {
        generation: u64,
    },
    ConsentResolved {
        prompt: u64,
        callback: String,
        status: TrackingStatus,
    },
}

/// Point-in-time view of a session, for hosts and diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub session_id: SessionId,
    pub current_url: Option<Url>,
    pub history: Vec<Url>,
    pub back_policy: BackActionPolicy,
    pub back_state: BackState,
    pub back_action_repeat_count: u32,
    pub is_loading_ad: bool,
    pub current_ad_unit: Option<String>,
    pub is_moving_to_external_app: bool,
}

/// Worker driving a single browser session.
///
/// All session state is owned here and only touched from [`run`](Self::run),
/// so engines need no locking. Timers and collaborator futures run as
/// separate tasks and report back through an internal channel; closing the
/// session cancels every one of them.
pub struct SessionController {
    config: Arc<BrowserConfig>,
    services: SessionServices,
    consent_store: ConsentStore,

    session: Session,
    navigation: NavigationPolicy,
    back: BackActionStateMachine,
    ads: AdDeliveryPipeline,
    timers: TimerSet,
    next_prompt: u64,

    /// Receiver for incoming session commands
    cmd_rx: mpsc::Receiver<SessionCommand>,
    internal_rx: mpsc::UnboundedReceiver<InternalEvent>,
    event_tx: broadcast::Sender<SessionEvent>,

    /// Set once the session closed; the worker exits after the current turn
    closed: Option<CloseReason>,
}

impl SessionController {
    /// Creates a session and its handle. Does NOT spawn the worker.
    pub fn new(
        config: Arc<BrowserConfig>,
        services: SessionServices,
        consent_store: ConsentStore,
    ) -> (Self, SessionHandle) {
        let (cmd_tx, cmd_rx) = mpsc::channel::<SessionCommand>(DEFAULT_CHANNEL_CAPACITY);
        let (event_tx, _) = broadcast::channel::<SessionEvent>(DEFAULT_CHANNEL_CAPACITY);
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();

        let session_id = SessionId::new();
        let session = Session::new(session_id, config.back_policy.clone(), config.history_limit);

        let this = Self {
            navigation: NavigationPolicy::from_config(&config),
            back: BackActionStateMachine::new(
                config.back_verify_timeout,
                config.back_loop_window,
                config.back_loop_threshold,
                config.terminal_page_patterns.clone(),
            ),
            ads: AdDeliveryPipeline::new(config.ad_attempt_timeout),
            timers: TimerSet::new(internal_tx),
            next_prompt: 0,
            config,
            services,
            consent_store,
            session,
            cmd_rx,
            internal_rx,
            event_tx: event_tx.clone(),
            closed: None,
        };

        (this, SessionHandle::new(session_id, cmd_tx, event_tx))
    }

    /// Creates a session and spawns its worker
    pub fn spawn(
        config: Arc<BrowserConfig>,
        services: SessionServices,
        consent_store: ConsentStore,
    ) -> (SessionHandle, JoinHandle<()>) {
        let (this, handle) = Self::new(config, services, consent_store);
        let join_handle = tokio::spawn(this.run());
        (handle, join_handle)
    }

    pub fn id(&self) -> SessionId {
        self.session.id
    }

    pub async fn run(mut self) {
        log::info!("Session[{}] worker started", self.session.id);

        self.open();

        loop {
            tokio::select! {
                msg = self.cmd_rx.recv() => {
                    let Some(cmd) = msg else {
                        // every handle is gone
                        self.close(CloseReason::HostShutdown);
                        break;
                    };
                    self.handle_command(cmd);
                }

                Some(ev) = self.internal_rx.recv() => {
                    self.handle_internal(ev);
                }
            }

            if self.closed.is_some() {
                break;
            }
        }

        log::info!("Session[{}] worker exiting", self.session.id);
    }

    fn open(&mut self) {
        self.services.web_view.set_user_agent(&self.config.user_agent);

        let url = self.config.start_url();
        match &url {
            Some(url) => {
                log::info!("Session[{}] opening {}", self.session.id, url);
                self.services.web_view.load_in_place(url);
            }
            None => log::warn!("Session[{}] opened without a start URL", self.session.id),
        }

        self.emit(SessionEvent::Opened {
            session_id: self.session.id,
            url,
        });
    }

    fn handle_command(&mut self, cmd: SessionCommand) {
        match cmd {
            SessionCommand::Bridge(msg) => self.handle_bridge(msg),
            SessionCommand::DecideNavigation { request, reply } => {
                let decision = self.decide_navigation(&request);
                let _ = reply.send(decision);
            }
            SessionCommand::DecideNewWindow { url, reply } => {
                let decision = self.decide_new_window(&url);
                let _ = reply.send(decision);
            }
            SessionCommand::PageLoadStarted => self.services.ui.set_page_loading(true),
            SessionCommand::PageCommitted { url } => self.page_committed(url),
            SessionCommand::PageLoadFinished { url } => {
                log::debug!("Session[{}] finished loading {}", self.session.id, url);
                self.services.ui.set_page_loading(false);
            }
            SessionCommand::BackPressed => self.back_pressed(),
            SessionCommand::ClosePressed => self.close(CloseReason::CloseButton),
            SessionCommand::SetBackPolicy(policy) => self.set_back_policy(policy),
            SessionCommand::AppResumed => {
                self.session.is_moving_to_external_app = false;
            }
            SessionCommand::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
            SessionCommand::Shutdown { reply } => {
                self.close(CloseReason::HostShutdown);
                let _ = reply.send(());
            }
        }
    }

    fn handle_bridge(&mut self, msg: BridgeMessage) {
        log::debug!("Session[{}] bridge message {:?}", self.session.id, msg);

        match msg {
            BridgeMessage::Reward(req) => self.request_ad(AdType::Reward, &req),
            BridgeMessage::Interstitial(req) => self.request_ad(AdType::Interstitial, &req),
            BridgeMessage::RewardedInterstitial(req) => {
                self.request_ad(AdType::RewardedInterstitial, &req)
            }
            BridgeMessage::Close => self.close(CloseReason::PageRequested),
            BridgeMessage::SetBackAction { action } => {
                let mut policy = self.session.back_policy.clone();
                policy.mode = action;
                self.set_back_policy(policy);
            }
            BridgeMessage::SetBackConfirmMessage { message } => {
                self.session.back_policy.confirm_message = message;
            }
            BridgeMessage::SetBackConfirmTimeout { timeout } => {
                self.session.back_policy.confirm_timeout_seconds = timeout;
            }
            BridgeMessage::TriggerBackAction => self.back_pressed(),
            BridgeMessage::RequestAdIdConsent { callback_function } => {
                self.request_consent(callback_function);
            }
            BridgeMessage::CheckAdIdConsentStatus { callback_function } => {
                let status = self.services.consent.current_status();
                self.deliver_consent(&callback_function, status);
            }
        }
    }

    fn handle_internal(&mut self, ev: InternalEvent) {
        if self.closed.is_some() {
            return;
        }

        let now = Instant::now();
        match ev {
            InternalEvent::AdLoaded { attempt, result } => {
                self.timers.settle(TimerKey::AdLoad(attempt));
                let effects = self.ads.on_load_result(attempt, result, now);
                self.apply_ad_effects(effects);
            }
            InternalEvent::AdTimedOut { attempt } => {
                self.timers.settle(TimerKey::AdTimeout(attempt));
                let effects = self.ads.on_timeout(attempt, now);
                self.apply_ad_effects(effects);
            }
            InternalEvent::PresentationDue { ticket } => {
                self.timers.settle(TimerKey::PresentationDelay(ticket));
                let effects = self.ads.on_presentation_due(ticket);
                self.apply_ad_effects(effects);
            }
            InternalEvent::PresentationFinished { ticket, outcome } => {
                self.timers.settle(TimerKey::Presentation(ticket));
                let effects = self.ads.on_presentation_finished(ticket, outcome);
                self.apply_ad_effects(effects);
            }
            InternalEvent::BackVerifyElapsed { generation } => self.back_verify_elapsed(generation),
            InternalEvent::ConsentResolved {
                prompt,
                callback,
                status,
            } => {
                self.timers.settle(TimerKey::ConsentPrompt(prompt));
                self.consent_store.record(status);
                self.deliver_consent(&callback, status);
            }
        }
    }

    // ****************************************
    // ** Ads

    fn request_ad(&mut self, ad_type: AdType, req: &AdRequestMessage) {
        let effects = self.ads.request(
            ad_type,
            &req.ad_unit,
            &req.callback_function,
            req.options(),
            Instant::now(),
        );
        self.apply_ad_effects(effects);
    }

    fn apply_ad_effects(&mut self, effects: Vec<AdEffect>) {
        for effect in effects {
            match effect {
                AdEffect::ShowLoadingCover => self.services.ui.show_loading_cover(),
                AdEffect::HideLoadingCover => self.services.ui.hide_loading_cover(),
                AdEffect::StartLoad { attempt, ad_type, unit } => {
                    log::debug!("Session[{}] loading {} unit {:?}", self.session.id, ad_type, unit);
                    let fut = match self.services.presenters.get(ad_type) {
                        Some(presenter) => presenter.load(&unit),
                        None => {
                            futures::future::ready(Err(AdLoadError::Unsupported(ad_type))).boxed()
                        }
                    };
                    self.timers.spawn(TimerKey::AdLoad(attempt), fut, move |result| {
                        InternalEvent::AdLoaded { attempt, result }
                    });
                }
                AdEffect::ArmTimeout { attempt, after } => {
                    self.timers.schedule(
                        TimerKey::AdTimeout(attempt),
                        after,
                        InternalEvent::AdTimedOut { attempt },
                    );
                }
                AdEffect::DisarmTimeout { attempt } => {
                    self.timers.cancel(TimerKey::AdTimeout(attempt))
                }
                AdEffect::AbandonLoad { attempt } => self.timers.cancel(TimerKey::AdLoad(attempt)),
                AdEffect::SchedulePresentation { ticket, after } => {
                    self.timers.schedule(
                        TimerKey::PresentationDelay(ticket),
                        after,
                        InternalEvent::PresentationDue { ticket },
                    );
                }
                AdEffect::Present { ticket, ad_type, handle } => {
                    let fut = match self.services.presenters.get(ad_type) {
                        Some(presenter) => presenter.present(handle),
                        None => futures::future::ready(PresentationOutcome::FailedToPresent(format!(
                            "no presenter for {ad_type}"
                        )))
                        .boxed(),
                    };
                    self.timers.spawn(TimerKey::Presentation(ticket), fut, move |outcome| {
                        InternalEvent::PresentationFinished { ticket, outcome }
                    });
                }
                AdEffect::Deliver { callback, result } => {
                    log::info!(
                        "Session[{}] ad result {} {} unit {:?} ({})",
                        self.session.id,
                        result.ad_type,
                        result.outcome,
                        result.ad_unit,
                        result.display_index
                    );
                    self.services.bridge.evaluate(&ad_result_script(&callback, &result));
                    self.emit(SessionEvent::AdResult {
                        session_id: self.session.id,
                        callback,
                        result,
                    });
                }
            }
        }
    }

    // ****************************************
    // ** Navigation

    fn decide_navigation(&mut self, request: &NavigationRequest) -> NavigationDecision {
        let decision = self.navigation.decide(request, &mut self.session, Instant::now());
        self.log_decision(&request.url, &decision);

        if let NavigationDecision::RedirectToExternalApp(hint) = &decision {
            self.open_external(&request.url, hint.clone());
        }

        self.emit(SessionEvent::NavigationDecided {
            session_id: self.session.id,
            url: request.url.clone(),
            decision: decision.clone(),
        });
        decision
    }

    fn decide_new_window(&mut self, url: &Url) -> NavigationDecision {
        let decision = self.navigation.decide_new_window(url, &mut self.session, Instant::now());
        self.log_decision(url, &decision);

        match &decision {
            NavigationDecision::AllowNewInPlace => self.services.web_view.load_in_place(url),
            NavigationDecision::RedirectToExternalApp(hint) => {
                self.open_external(url, hint.clone())
            }
            _ => {}
        }

        self.emit(SessionEvent::NavigationDecided {
            session_id: self.session.id,
            url: url.clone(),
            decision: decision.clone(),
        });
        decision
    }

    fn log_decision(&self, url: &Url, decision: &NavigationDecision) {
        if self.config.debug_enabled {
            log::info!("Session[{}] {} -> {:?}", self.session.id, url, decision);
        } else {
            log::debug!("Session[{}] {} -> {:?}", self.session.id, url, decision);
        }
    }

    fn open_external(&mut self, url: &Url, app_hint: Option<String>) {
        if self.services.opener.open_externally(url) {
            return;
        }

        log::warn!(
            "Session[{}] no app could open {} (hint {:?})",
            self.session.id,
            url,
            app_hint
        );
        self.services.ui.prompt_install(app_hint.as_deref());
        self.emit(SessionEvent::ExternalAppUnavailable {
            session_id: self.session.id,
            url: url.clone(),
            app_hint,
        });
    }

    fn page_committed(&mut self, url: Url) {
        self.session.record_commit(url.clone());
        if self.back.on_url_changed(&mut self.session, &url) {
            self.timers.cancel(TimerKey::BackVerification);
        }
    }

    // ****************************************
    // ** Back button

    fn back_pressed(&mut self) {
        let current = self
            .services
            .web_view
            .current_url()
            .or_else(|| self.session.current_url.clone());
        let history = self.services.web_view.backward_history();

        let ctx = BackContext {
            current_url: current.as_ref(),
            backward_history: &history,
        };
        let outcome = self.back.on_back(&mut self.session, ctx, Instant::now());
        log::debug!("Session[{}] back pressed -> {:?}", self.session.id, outcome);

        match outcome {
            BackOutcome::Close(reason) => self.close(reason),
            BackOutcome::GoBack {
                verify_after,
                generation,
            } => {
                self.services.web_view.go_back();
                self.timers.schedule(
                    TimerKey::BackVerification,
                    verify_after,
                    InternalEvent::BackVerifyElapsed { generation },
                );
            }
            BackOutcome::ShowConfirmation(message) => {
                self.services.ui.show_confirmation(&message);
                self.emit(SessionEvent::BackConfirmationShown {
                    session_id: self.session.id,
                    message,
                });
            }
            BackOutcome::Ignore => {}
        }
    }

    fn back_verify_elapsed(&mut self, generation: u64) {
        let live = self
            .services
            .web_view
            .current_url()
            .or_else(|| self.session.current_url.clone());

        match self.back.on_verify_elapsed(&mut self.session, generation, live.as_ref()) {
            VerifyResult::Stale => {}
            VerifyResult::Moved => self.timers.settle(TimerKey::BackVerification),
            VerifyResult::DidNotMove => {
                self.timers.settle(TimerKey::BackVerification);
                self.close(CloseReason::BackDidNotMove);
            }
        }
    }

    fn set_back_policy(&mut self, policy: BackActionPolicy) {
        log::debug!("Session[{}] back policy {:?}", self.session.id, policy.mode);
        self.session.back_policy = policy;
        self.back.reset();
        self.timers.cancel(TimerKey::BackVerification);
    }

    // ****************************************
    // ** Consent

    fn request_consent(&mut self, callback: String) {
        self.next_prompt += 1;
        let prompt = self.next_prompt;
        let fut = self.services.consent.request_permission();

        self.timers.spawn(TimerKey::ConsentPrompt(prompt), fut, move |status| {
            InternalEvent::ConsentResolved {
                prompt,
                callback,
                status,
            }
        });
    }

    fn deliver_consent(&mut self, callback: &str, status: TrackingStatus) {
        let payload = ConsentPayload::new(status, self.services.consent.as_ref());
        self.services.bridge.evaluate(&consent_script(callback, &payload));
        self.emit(SessionEvent::ConsentResult {
            session_id: self.session.id,
            callback: callback.to_string(),
            status,
        });
    }

    // ****************************************
    // ** Lifecycle

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.session.id,
            current_url: self.session.current_url.clone(),
            history: self.session.history().cloned().collect(),
            back_policy: self.session.back_policy.clone(),
            back_state: self.back.state().clone(),
            back_action_repeat_count: self.session.back_action_repeat_count,
            is_loading_ad: self.ads.is_loading_ad(),
            current_ad_unit: self.ads.current_ad_unit().map(str::to_string),
            is_moving_to_external_app: self.session.is_moving_to_external_app,
        }
    }

    fn close(&mut self, reason: CloseReason) {
        if self.closed.is_some() {
            return;
        }
        log::info!("Session[{}] closing: {}", self.session.id, reason);

        self.closed = Some(reason);
        self.timers.cancel_all();
        self.ads.teardown();
        self.back.reset();
        self.services.ui.dismiss();

        self.emit(SessionEvent::Closed {
            session_id: self.session.id,
            reason,
        });
    }

    fn emit(&self, event: SessionEvent) {
        // no subscribers is fine
        let _ = self.event_tx.send(event);
    }
}
