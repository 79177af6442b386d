// src/session/runtime.rs

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};

use crate::{
    models::{
        exam_record::{SubmitExamRequest, SubmitExamResponse, WarningRecord},
        question::{OptionLetter, PublicQuestion},
    },
    session::{
        error::SessionError,
        gateway::{ExamGateway, GatewayError},
        identity::{CompletionMarkers, SessionIdentity},
        machine::{Effect, ExamSession, ExamSettings, FinishReason, Phase},
        signals::{BrowserEvent, Countermeasure, SignalHub, SignalSource, ViewportSample},
    },
};

/// Presentation sink. Everything the student sees goes through here.
pub trait SessionView: Send {
    fn present(&mut self, effect: &Effect);

    fn countermeasure(&mut self, measure: &Countermeasure);
}

/// Reads the current window geometry for the devtools heuristic.
pub trait ViewportProbe: Send {
    fn sample(&mut self) -> Option<ViewportSample>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserAction {
    Next,
    Previous,
    Select(OptionLetter),
    /// Submit button, after the student confirmed the dialog.
    ConfirmSubmit,
}

#[derive(Debug)]
enum Message {
    Browser(BrowserEvent),
    User(UserAction),
    PaperFetched(Result<Vec<PublicQuestion>, GatewayError>),
    SubmissionSettled(Result<SubmitExamResponse, GatewayError>),
}

/// Producer side of the session queue, handed to event listeners.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    outbox: mpsc::UnboundedSender<Message>,
}

impl SessionHandle {
    /// Returns `false` once the session has shut down.
    pub fn browser_event(&self, event: BrowserEvent) -> bool {
        self.outbox.send(Message::Browser(event)).is_ok()
    }

    pub fn user_action(&self, action: UserAction) -> bool {
        self.outbox.send(Message::User(action)).is_ok()
    }

    /// Hosts driving an animation-frame loop stop it when this turns true.
    pub fn is_closed(&self) -> bool {
        self.outbox.is_closed()
    }
}

/// Final state of a session after the runtime stopped.
#[derive(Debug)]
pub struct SessionReport {
    pub phase: Phase,
    pub finish_reason: Option<FinishReason>,
    pub warnings: Vec<WarningRecord>,
    /// `None` when nothing was ever submitted (aborted while loading).
    pub outcome: Option<Result<SubmitExamResponse, String>>,
}

/// Single arbiter of one exam session.
///
/// Browser events, user actions and network completions are all queued on
/// one channel and applied to the `ExamSession` in arrival order, together
/// with the countdown and the viewport poll. Nothing else mutates the
/// session, so the first finish trigger always wins.
pub struct SessionRuntime {
    session: ExamSession,
    hub: SignalHub,
    gateway: Arc<dyn ExamGateway>,
    markers: Box<dyn CompletionMarkers>,
    view: Box<dyn SessionView>,
    probe: Option<Box<dyn ViewportProbe>>,
    inbox: mpsc::UnboundedReceiver<Message>,
    outbox: mpsc::UnboundedSender<Message>,
    tasks: Vec<JoinHandle<()>>,
    clock_origin: (DateTime<Utc>, Instant),
    outcome: Option<Result<SubmitExamResponse, String>>,
    aborted: bool,
}

impl SessionRuntime {
    /// Enters the exam page. Fails when there is no identity or it already
    /// submitted; the caller should send the student back to login.
    pub fn new(
        identity: Option<SessionIdentity>,
        markers: Box<dyn CompletionMarkers>,
        gateway: Arc<dyn ExamGateway>,
        view: Box<dyn SessionView>,
        settings: ExamSettings,
    ) -> Result<Self, SessionError> {
        let hub = SignalHub::standard(settings.devtools_gap_px, settings.frame_stall_ms);
        let mut session = ExamSession::new(settings);
        let effects = session.enter(identity, &*markers)?;

        let (outbox, inbox) = mpsc::unbounded_channel();
        let mut runtime = Self {
            session,
            hub,
            gateway,
            markers,
            view,
            probe: None,
            inbox,
            outbox,
            tasks: Vec::new(),
            clock_origin: (Utc::now(), Instant::now()),
            outcome: None,
            aborted: false,
        };
        runtime.apply(effects);
        Ok(runtime)
    }

    pub fn with_probe(mut self, probe: Box<dyn ViewportProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Arms an extra detector next to the built-in ones.
    pub fn with_source(mut self, source: Box<dyn SignalSource>) -> Self {
        self.hub = self.hub.with_source(source);
        self
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            outbox: self.outbox.clone(),
        }
    }

    /// Loads the paper and processes messages until the session is finished
    /// or aborted. Timers and background requests stop with it.
    pub async fn run(mut self) -> SessionReport {
        self.spawn_fetch();

        let tick = self.session.settings().tick;
        let mut countdown = time::interval_at(Instant::now() + tick, tick);
        countdown.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let poll_every = self.session.settings().viewport_poll;
        let mut poll = time::interval_at(Instant::now() + poll_every, poll_every);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while !self.is_over() {
            let was_running = self.session.phase() == Phase::InProgress;

            tokio::select! {
                message = self.inbox.recv() => match message {
                    Some(message) => self.dispatch(message),
                    None => break,
                },
                _ = countdown.tick(), if was_running => {
                    let effects = self.session.tick();
                    self.apply(effects);
                }
                _ = poll.tick(), if self.probe.is_some() => self.poll_viewport(),
            }

            // The countdown starts when the paper is shown, not at page entry.
            if !was_running && self.session.phase() == Phase::InProgress {
                countdown.reset();
            }
        }

        self.teardown()
    }

    fn is_over(&self) -> bool {
        self.aborted || self.session.phase() == Phase::Finished
    }

    fn dispatch(&mut self, message: Message) {
        match message {
            Message::Browser(event) => self.observe(&event),
            Message::User(action) => {
                let effects = match action {
                    UserAction::Next => self.session.next(),
                    UserAction::Previous => self.session.previous(),
                    UserAction::Select(letter) => self.session.select(letter),
                    UserAction::ConfirmSubmit => self.session.confirm_submit(),
                };
                self.apply(effects);
            }
            Message::PaperFetched(Ok(questions)) => match self.session.load_questions(questions) {
                Ok(effects) => self.apply(effects),
                Err(e) => self.abort(e.to_string()),
            },
            Message::PaperFetched(Err(e)) => {
                tracing::error!("Failed to fetch questions: {}", e);
                self.abort("Failed to load questions. Contact admin.".to_string());
            }
            Message::SubmissionSettled(result) => {
                let outcome = result.map_err(|e| e.to_string());
                self.outcome = Some(outcome.clone());
                let effects = self.session.settle_submission(outcome);
                self.apply(effects);
            }
        }
    }

    fn observe(&mut self, event: &BrowserEvent) {
        let now = self.now();
        for detection in self.hub.observe(event) {
            for measure in &detection.countermeasures {
                self.view.countermeasure(measure);
            }
            if let Some(violation) = detection.violation {
                let effects = self.session.report_violation(&violation, now);
                self.apply(effects);
            }
        }
    }

    fn poll_viewport(&mut self) {
        let sample = self.probe.as_mut().and_then(|probe| probe.sample());
        if let Some(sample) = sample {
            self.observe(&BrowserEvent::Viewport(sample));
        }
    }

    fn apply(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            if let Effect::Submit(request) = &effect {
                // Marked before the request resolves, so a failed or slow
                // submission still blocks a second attempt.
                if let Err(e) = self.markers.mark_submitted(&request.email) {
                    tracing::error!("Failed to persist completion marker: {}", e);
                }
                self.spawn_submission(request.clone());
            }
            self.view.present(&effect);
        }
    }

    /// Only an empty or failed paper fetch ends the session here.
    fn abort(&mut self, notice: String) {
        if self.session.phase() != Phase::Loading {
            return;
        }
        tracing::warn!("Session aborted while loading: {}", notice);
        self.view.present(&Effect::Notice(notice));
        self.aborted = true;
    }

    fn spawn_fetch(&mut self) {
        let gateway = Arc::clone(&self.gateway);
        let outbox = self.outbox.clone();
        self.tasks.push(tokio::spawn(async move {
            let result = gateway.fetch_questions().await;
            let _ = outbox.send(Message::PaperFetched(result));
        }));
    }

    fn spawn_submission(&mut self, request: SubmitExamRequest) {
        let gateway = Arc::clone(&self.gateway);
        let outbox = self.outbox.clone();
        self.tasks.push(tokio::spawn(async move {
            let result = gateway.submit(&request).await;
            let _ = outbox.send(Message::SubmissionSettled(result));
        }));
    }

    /// Wall-clock time advanced by the runtime's monotonic clock.
    fn now(&self) -> DateTime<Utc> {
        let (wall, origin) = self.clock_origin;
        wall + Duration::from_std(origin.elapsed()).unwrap_or_else(|_| Duration::zero())
    }

    fn teardown(mut self) -> SessionReport {
        for task in self.tasks.drain(..) {
            task.abort();
        }
        self.inbox.close();

        tracing::info!(
            "Session stopped in {:?} after {} warnings",
            self.session.phase(),
            self.session.warnings().len()
        );

        SessionReport {
            phase: self.session.phase(),
            finish_reason: self.session.finish_reason(),
            warnings: self.session.warnings().to_vec(),
            outcome: self.outcome.take(),
        }
    }
}
