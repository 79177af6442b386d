// tests/session_tests.rs

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use exam_guard::{
    models::{
        exam_record::{SubmitExamRequest, SubmitExamResponse},
        question::{OptionLetter, PublicQuestion},
    },
    session::{
        BrowserEvent, CompletionMarkers, Countermeasure, Effect, ExamGateway, ExamSettings,
        FileMarkers, FinishReason, GatewayError, MemoryMarkers, Phase, SessionError,
        SessionRuntime, SessionView, UserAction, ViewportProbe, login,
        machine::SUBMISSION_FAILED_TEXT,
        signals::{ClipboardAction, KeyStroke, ViewportSample},
    },
};

/// In-process exam server: serves a fixed paper and records submissions.
struct FakeGateway {
    paper: Vec<PublicQuestion>,
    fail_submit: bool,
    submissions: Mutex<Vec<SubmitExamRequest>>,
}

impl FakeGateway {
    fn new(paper: Vec<PublicQuestion>) -> Arc<Self> {
        Arc::new(Self {
            paper,
            fail_submit: false,
            submissions: Mutex::new(Vec::new()),
        })
    }

    fn failing(paper: Vec<PublicQuestion>) -> Arc<Self> {
        Arc::new(Self {
            paper,
            fail_submit: true,
            submissions: Mutex::new(Vec::new()),
        })
    }

    fn submissions(&self) -> Vec<SubmitExamRequest> {
        self.submissions.lock().unwrap().clone()
    }
}

#[async_trait]
impl ExamGateway for FakeGateway {
    async fn fetch_questions(&self) -> Result<Vec<PublicQuestion>, GatewayError> {
        Ok(self.paper.clone())
    }

    async fn submit(&self, request: &SubmitExamRequest) -> Result<SubmitExamResponse, GatewayError> {
        self.submissions.lock().unwrap().push(request.clone());
        if self.fail_submit {
            return Err(GatewayError::Status(500, "boom".to_string()));
        }
        Ok(SubmitExamResponse {
            message: "Exam submitted successfully".to_string(),
            correct: 0,
            total: self.paper.len(),
            percentage: 0.0,
            answers: Vec::new(),
        })
    }
}

#[derive(Clone, Default)]
struct RecordingView {
    effects: Arc<Mutex<Vec<Effect>>>,
    measures: Arc<Mutex<Vec<Countermeasure>>>,
}

impl RecordingView {
    fn has(&self, pred: impl Fn(&Effect) -> bool) -> bool {
        self.effects.lock().unwrap().iter().any(pred)
    }

    fn count(&self, pred: impl Fn(&Effect) -> bool) -> usize {
        self.effects.lock().unwrap().iter().filter(|e| pred(*e)).count()
    }

    async fn wait_for(&self, pred: impl Fn(&Effect) -> bool) {
        for _ in 0..50 {
            if self.has(&pred) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        panic!("expected effect never showed up");
    }
}

impl SessionView for RecordingView {
    fn present(&mut self, effect: &Effect) {
        self.effects.lock().unwrap().push(effect.clone());
    }

    fn countermeasure(&mut self, measure: &Countermeasure) {
        self.measures.lock().unwrap().push(*measure);
    }
}

fn paper() -> Vec<PublicQuestion> {
    (1..=3)
        .map(|id| PublicQuestion {
            id,
            question: format!("Question {}", id),
            options: vec!["w".into(), "x".into(), "y".into(), "z".into()],
        })
        .collect()
}

fn start(
    gateway: Arc<FakeGateway>,
    markers: Box<dyn CompletionMarkers>,
) -> (SessionRuntime, RecordingView) {
    let identity = login("Ada", "ada@example.com", &MemoryMarkers::new()).unwrap();
    let view = RecordingView::default();
    let runtime = SessionRuntime::new(
        Some(identity),
        markers,
        gateway,
        Box::new(view.clone()),
        ExamSettings::default(),
    )
    .unwrap();
    (runtime, view)
}

fn copy() -> BrowserEvent {
    BrowserEvent::Clipboard(ClipboardAction::Copy)
}

#[tokio::test(start_paused = true)]
async fn countdown_expiry_submits_answered_questions() {
    // Arrange
    let gateway = FakeGateway::new(paper());
    let (runtime, view) = start(gateway.clone(), Box::new(MemoryMarkers::new()));
    let handle = runtime.handle();
    let session = tokio::spawn(runtime.run());
    view.wait_for(|e| matches!(e, Effect::ShowExam)).await;

    // Act: answer two of three, then let the clock run out.
    handle.user_action(UserAction::Select(OptionLetter::A));
    handle.user_action(UserAction::Next);
    handle.user_action(UserAction::Select(OptionLetter::B));
    let report = session.await.unwrap();

    // Assert
    assert_eq!(report.phase, Phase::Finished);
    assert_eq!(report.finish_reason, Some(FinishReason::TimeOver));

    let submissions = gateway.submissions();
    assert_eq!(submissions.len(), 1);
    let answers = submissions[0].answers.as_ref().unwrap();
    assert_eq!(answers.len(), 2);
    assert_eq!(answers[0].selected_option.as_deref(), Some("A"));
    assert_eq!(answers[1].question_id, 2);

    assert!(view.has(|e| *e == Effect::Timer("60:00".to_string())));
    assert!(view.has(|e| *e == Effect::Timer("00:00".to_string())));
    assert!(view.has(|e| matches!(e, Effect::ShowResult(text) if text.starts_with("Time over."))));
    assert!(handle.is_closed());
}

#[tokio::test(start_paused = true)]
async fn third_warning_forces_exactly_one_submission() {
    let gateway = FakeGateway::new(paper());
    let (runtime, view) = start(gateway.clone(), Box::new(MemoryMarkers::new()));
    let handle = runtime.handle();
    let session = tokio::spawn(runtime.run());
    view.wait_for(|e| matches!(e, Effect::ShowExam)).await;

    for _ in 0..2 {
        assert!(handle.browser_event(copy()));
        tokio::time::sleep(Duration::from_millis(2000)).await;
    }
    // Third violation races a manual submit.
    handle.browser_event(BrowserEvent::KeyDown(KeyStroke::plain("F12")));
    handle.user_action(UserAction::ConfirmSubmit);
    let report = session.await.unwrap();

    assert_eq!(report.finish_reason, Some(FinishReason::Violations));
    assert_eq!(report.warnings.len(), 3);
    assert_eq!(report.warnings[2].code.as_deref(), Some("F12"));
    assert_eq!(gateway.submissions().len(), 1);
    assert_eq!(gateway.submissions()[0].warnings.len(), 3);
    assert_eq!(view.count(|e| matches!(e, Effect::ShowResult(_))), 1);
    assert!(view.has(|e| *e == Effect::WarningCounter { count: 3, max: 3 }));

    // Late events have nowhere to go.
    assert!(!handle.browser_event(copy()));
}

#[tokio::test(start_paused = true)]
async fn burst_of_signals_counts_once() {
    let gateway = FakeGateway::new(paper());
    let (runtime, view) = start(gateway.clone(), Box::new(MemoryMarkers::new()));
    let handle = runtime.handle();
    let session = tokio::spawn(runtime.run());
    view.wait_for(|e| matches!(e, Effect::ShowExam)).await;

    // Tab switch alone raises two detections; the rest land in the same window.
    handle.browser_event(BrowserEvent::VisibilityChange { hidden: true });
    handle.browser_event(BrowserEvent::WindowBlur);
    handle.browser_event(BrowserEvent::Clipboard(ClipboardAction::Paste));
    handle.browser_event(BrowserEvent::ContextMenu);
    handle.browser_event(BrowserEvent::KeyDown(KeyStroke::ctrl("c")));
    tokio::time::sleep(Duration::from_millis(100)).await;
    handle.user_action(UserAction::ConfirmSubmit);
    let report = session.await.unwrap();

    assert_eq!(report.finish_reason, Some(FinishReason::Manual));
    assert_eq!(report.warnings.len(), 1);
    assert_eq!(report.warnings[0].code.as_deref(), Some("TAB_CHANGE"));
    assert_eq!(view.count(|e| matches!(e, Effect::WarningCounter { .. })), 1);

    // Countermeasures still apply to suppressed signals.
    let measures = view.measures.lock().unwrap();
    assert!(measures.contains(&Countermeasure::PreventDefault));
    assert!(measures.contains(&Countermeasure::PersistentBlur));
}

#[tokio::test(start_paused = true)]
async fn entry_requires_fresh_identity() {
    let gateway = FakeGateway::new(paper());

    let missing = SessionRuntime::new(
        None,
        Box::new(MemoryMarkers::new()),
        gateway.clone(),
        Box::new(RecordingView::default()),
        ExamSettings::default(),
    );
    assert!(matches!(missing, Err(SessionError::MissingIdentity)));

    let mut markers = MemoryMarkers::new();
    let identity = login("Ada", "ada@example.com", &markers).unwrap();
    markers.mark_submitted("ada@example.com").unwrap();
    let repeat = SessionRuntime::new(
        Some(identity),
        Box::new(markers),
        gateway.clone(),
        Box::new(RecordingView::default()),
        ExamSettings::default(),
    );
    assert!(matches!(repeat, Err(SessionError::AlreadySubmitted(_))));
    assert!(gateway.submissions().is_empty());
}

#[tokio::test(start_paused = true)]
async fn empty_paper_aborts_without_submitting() {
    let gateway = FakeGateway::new(Vec::new());
    let (runtime, view) = start(gateway.clone(), Box::new(MemoryMarkers::new()));

    let report = runtime.run().await;

    assert_eq!(report.phase, Phase::Loading);
    assert!(report.outcome.is_none());
    assert!(gateway.submissions().is_empty());
    assert!(view.has(|e| *e == Effect::Notice("No questions configured.".to_string())));
    assert!(!view.has(|e| matches!(e, Effect::ShowExam)));
}

#[tokio::test(start_paused = true)]
async fn failed_submission_still_marks_completion() {
    let path = std::env::temp_dir()
        .join(format!("exam_guard_markers_{}", uuid::Uuid::new_v4()))
        .join("submitted.json");
    let gateway = FakeGateway::failing(paper());
    let (runtime, view) = start(gateway.clone(), Box::new(FileMarkers::open(&path)));
    let handle = runtime.handle();
    let session = tokio::spawn(runtime.run());
    view.wait_for(|e| matches!(e, Effect::ShowExam)).await;

    handle.user_action(UserAction::ConfirmSubmit);
    let report = session.await.unwrap();

    assert_eq!(report.phase, Phase::Finished);
    assert!(matches!(report.outcome, Some(Err(_))));
    assert!(view.has(|e| *e == Effect::ShowResult(SUBMISSION_FAILED_TEXT.to_string())));
    assert!(view.has(|e| *e == Effect::ClearIdentity));

    let reopened = FileMarkers::open(&path);
    assert!(reopened.is_submitted("ada@example.com"));
    assert!(matches!(
        login("Ada", "ada@example.com", &reopened),
        Err(SessionError::AlreadySubmitted(_))
    ));
}

struct DockedDevtools;

impl ViewportProbe for DockedDevtools {
    fn sample(&mut self) -> Option<ViewportSample> {
        Some(ViewportSample {
            outer_width: 1400,
            inner_width: 1000,
            outer_height: 900,
            inner_height: 880,
        })
    }
}

#[tokio::test(start_paused = true)]
async fn docked_devtools_escalate_through_polling() {
    let gateway = FakeGateway::new(paper());
    let (runtime, view) = start(gateway.clone(), Box::new(MemoryMarkers::new()));
    let runtime = runtime.with_probe(Box::new(DockedDevtools));

    let report = runtime.run().await;

    assert_eq!(report.finish_reason, Some(FinishReason::Violations));
    assert_eq!(report.warnings.len(), 3);
    assert!(report
        .warnings
        .iter()
        .all(|w| w.code.as_deref() == Some("DEVTOOLS_OPEN")));
    // Polls land every 1.2s, so every other one falls inside the cooldown.
    let gaps: Vec<i64> = report
        .warnings
        .windows(2)
        .map(|pair| (pair[1].at - pair[0].at).num_milliseconds())
        .collect();
    assert!(gaps.iter().all(|gap| *gap >= 1500));
    assert_eq!(gateway.submissions().len(), 1);
    assert!(view.measures.lock().unwrap().contains(&Countermeasure::PersistentBlur));
}
