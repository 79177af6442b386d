// src/session/machine.rs

use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};

use crate::{
    config::{
        DEVTOOLS_GAP_PX, EXAM_DURATION_SECONDS, FRAME_STALL_MS, MAX_WARNINGS, TIMER_TICK_MS,
        VIEWPORT_POLL_MS, WARNING_COOLDOWN_MS,
    },
    models::{
        exam_record::{
            SubmitExamRequest, SubmitExamResponse, SubmittedAnswer, WarningEntry, WarningRecord,
        },
        question::{OptionLetter, PublicQuestion},
    },
    session::{
        error::SessionError,
        identity::{CompletionMarkers, SessionIdentity},
        signals::Violation,
        warnings::{ReportOutcome, WarningAggregator},
    },
};

/// Knobs of one exam session. `Default` carries the production values.
#[derive(Debug, Clone)]
pub struct ExamSettings {
    pub duration_seconds: u32,
    pub max_warnings: u32,
    pub warning_cooldown: Duration,
    pub tick: StdDuration,
    pub viewport_poll: StdDuration,
    pub devtools_gap_px: i32,
    pub frame_stall_ms: f64,
}

impl Default for ExamSettings {
    fn default() -> Self {
        Self {
            duration_seconds: EXAM_DURATION_SECONDS,
            max_warnings: MAX_WARNINGS,
            warning_cooldown: Duration::milliseconds(WARNING_COOLDOWN_MS),
            tick: StdDuration::from_millis(TIMER_TICK_MS),
            viewport_poll: StdDuration::from_millis(VIEWPORT_POLL_MS),
            devtools_gap_px: DEVTOOLS_GAP_PX,
            frame_stall_ms: FRAME_STALL_MS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Uninitialized,
    Loading,
    InProgress,
    Finishing,
    Finished,
}

/// Why the session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Manual,
    TimeOver,
    Violations,
}

impl FinishReason {
    pub fn message(&self) -> &'static str {
        match self {
            FinishReason::Manual => "You submitted the exam.",
            FinishReason::TimeOver => "Time over.",
            FinishReason::Violations => "Exam auto-submitted due to repeated violations.",
        }
    }
}

/// The student's choice for one question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Answer {
    pub question_id: i64,
    pub selected: OptionLetter,
}

/// Everything the view needs to draw the current question.
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionView {
    pub index: usize,
    pub total: usize,
    pub prompt: String,
    pub options: Vec<(OptionLetter, String)>,
    pub selected: Option<OptionLetter>,
    pub can_go_back: bool,
    pub can_go_forward: bool,
}

impl QuestionView {
    pub fn progress(&self) -> String {
        format!("Question {} of {}", self.index + 1, self.total)
    }
}

/// Output of a transition, executed by the runtime in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Watermark(String),
    /// Blocking user-facing notice.
    Notice(String),
    WarningCounter { count: u32, max: u32 },
    /// Remaining time as `MM:SS`.
    Timer(String),
    ShowExam,
    ShowQuestion(QuestionView),
    /// Mark the identity as submitted, then send this request.
    Submit(SubmitExamRequest),
    ShowResult(String),
    ClearIdentity,
}

/// Formats seconds as a zero-padded `MM:SS` countdown.
pub fn format_clock(seconds: u32) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

/// Review text shown after a successful submission.
pub fn review_text(reason: FinishReason, response: &SubmitExamResponse) -> String {
    let mut text = format!(
        "{}\nScore: {}/{} ({}%)",
        reason.message(),
        response.correct,
        response.total,
        response.percentage
    );

    text.push_str("\n\n--- Your Answers ---\n");
    for (i, answer) in response.answers.iter().enumerate() {
        text.push_str(&format!("\n{}. {}\n", i + 1, answer.question));
        text.push_str(&format!(
            "Your answer: {}\n",
            answer.selected_option.as_deref().unwrap_or("-")
        ));
        text.push_str(&format!("Correct answer: {}\n", answer.correct_option));
        text.push_str(if answer.is_correct {
            "Result: Correct ✅\n"
        } else {
            "Result: Wrong ❌\n"
        });
    }

    text
}

pub const SUBMISSION_FAILED_TEXT: &str = "Submission error. Contact admin.";

/// The exam session state machine.
///
/// All state of one attempt lives here and is only changed through the
/// methods below; each returns the effects the runtime must carry out.
/// The `phase` field is the single guard against double submission.
#[derive(Debug)]
pub struct ExamSession {
    settings: ExamSettings,
    phase: Phase,
    identity: Option<SessionIdentity>,
    questions: Vec<PublicQuestion>,
    answers: Vec<Option<Answer>>,
    current: usize,
    remaining_seconds: u32,
    warnings: WarningAggregator,
    finish_reason: Option<FinishReason>,
}

impl ExamSession {
    pub fn new(settings: ExamSettings) -> Self {
        let warnings = WarningAggregator::new(settings.warning_cooldown, settings.max_warnings);
        Self {
            remaining_seconds: settings.duration_seconds,
            settings,
            phase: Phase::Uninitialized,
            identity: None,
            questions: Vec::new(),
            answers: Vec::new(),
            current: 0,
            warnings,
            finish_reason: None,
        }
    }

    /// `Uninitialized -> Loading`. Requires a logged-in identity that has not
    /// submitted yet.
    pub fn enter(
        &mut self,
        identity: Option<SessionIdentity>,
        markers: &dyn CompletionMarkers,
    ) -> Result<Vec<Effect>, SessionError> {
        if self.phase != Phase::Uninitialized {
            return Ok(Vec::new());
        }
        let identity = identity.ok_or(SessionError::MissingIdentity)?;
        if markers.is_submitted(&identity.email) {
            return Err(SessionError::AlreadySubmitted(identity.email));
        }

        let effects = vec![Effect::Watermark(identity.watermark())];
        self.identity = Some(identity);
        self.phase = Phase::Loading;
        Ok(effects)
    }

    /// `Loading -> InProgress` once the paper arrived. An empty paper leaves
    /// the session in `Loading` for good.
    pub fn load_questions(&mut self, questions: Vec<PublicQuestion>) -> Result<Vec<Effect>, SessionError> {
        if self.phase != Phase::Loading {
            return Ok(Vec::new());
        }
        if questions.is_empty() {
            return Err(SessionError::NoQuestions);
        }

        self.answers = vec![None; questions.len()];
        self.questions = questions;
        self.current = 0;
        self.phase = Phase::InProgress;

        let mut effects = vec![Effect::ShowExam, Effect::Timer(format_clock(self.remaining_seconds))];
        effects.extend(self.render());
        Ok(effects)
    }

    /// Funnels a violation through the debouncer and escalation policy.
    /// Ignored once the session is finishing.
    pub fn report_violation(&mut self, violation: &Violation, now: DateTime<Utc>) -> Vec<Effect> {
        if !self.accepts_warnings() {
            return Vec::new();
        }

        let ReportOutcome::Logged { record, escalate } = self.warnings.report(violation, now) else {
            return Vec::new();
        };

        let max = self.warnings.threshold();
        let mut effects = vec![
            Effect::WarningCounter {
                count: record.count,
                max,
            },
            Effect::Notice(format!("⚠ Warning {}/{}:\n{}", record.count, max, record.msg)),
        ];

        if escalate {
            effects.extend(self.finish(FinishReason::Violations));
        }
        effects
    }

    /// One countdown step. Reaching zero finishes the exam.
    pub fn tick(&mut self) -> Vec<Effect> {
        if self.phase != Phase::InProgress {
            return Vec::new();
        }

        self.remaining_seconds = self.remaining_seconds.saturating_sub(1);
        let mut effects = vec![Effect::Timer(format_clock(self.remaining_seconds))];
        if self.remaining_seconds == 0 {
            effects.extend(self.finish(FinishReason::TimeOver));
        }
        effects
    }

    pub fn next(&mut self) -> Vec<Effect> {
        if self.phase != Phase::InProgress || self.current + 1 >= self.questions.len() {
            return Vec::new();
        }
        self.current += 1;
        self.render()
    }

    pub fn previous(&mut self) -> Vec<Effect> {
        if self.phase != Phase::InProgress || self.current == 0 {
            return Vec::new();
        }
        self.current -= 1;
        self.render()
    }

    /// Upserts the answer for the current question.
    pub fn select(&mut self, letter: OptionLetter) -> Vec<Effect> {
        if self.phase != Phase::InProgress {
            return Vec::new();
        }
        let question = &self.questions[self.current];
        if letter as usize >= question.options.len() {
            return Vec::new();
        }

        self.answers[self.current] = Some(Answer {
            question_id: question.id,
            selected: letter,
        });
        Vec::new()
    }

    /// The student confirmed the submit dialog.
    pub fn confirm_submit(&mut self) -> Vec<Effect> {
        if self.phase != Phase::InProgress {
            return Vec::new();
        }
        self.finish(FinishReason::Manual)
    }

    /// `Finishing -> Finished`, whatever the submission outcome.
    pub fn settle_submission(&mut self, outcome: Result<SubmitExamResponse, String>) -> Vec<Effect> {
        if self.phase != Phase::Finishing {
            return Vec::new();
        }
        self.phase = Phase::Finished;
        self.identity = None;

        let reason = self.finish_reason.unwrap_or(FinishReason::Manual);
        let text = match outcome {
            Ok(response) => review_text(reason, &response),
            Err(e) => {
                tracing::warn!("Submission failed: {}", e);
                SUBMISSION_FAILED_TEXT.to_string()
            }
        };

        vec![Effect::ShowResult(text), Effect::ClearIdentity]
    }

    /// The only way into `Finishing`; later triggers find the phase moved on.
    fn finish(&mut self, reason: FinishReason) -> Vec<Effect> {
        if !self.accepts_warnings() {
            return Vec::new();
        }
        let Some(identity) = self.identity.as_ref() else {
            return Vec::new();
        };

        tracing::info!("Finishing exam for {}: {}", identity.email, reason.message());
        let request = SubmitExamRequest {
            user_name: identity.name.clone(),
            email: identity.email.clone(),
            answers: Some(self.submitted_answers()),
            warnings: self.warnings.log().iter().cloned().map(WarningEntry::from).collect(),
        };

        self.phase = Phase::Finishing;
        self.finish_reason = Some(reason);
        vec![Effect::Submit(request)]
    }

    /// Signals stay armed while the paper loads, so escalation may also end a
    /// session that never reached `InProgress`.
    fn accepts_warnings(&self) -> bool {
        matches!(self.phase, Phase::Loading | Phase::InProgress)
    }

    fn render(&self) -> Vec<Effect> {
        let Some(question) = self.questions.get(self.current) else {
            return Vec::new();
        };

        let options = question
            .options
            .iter()
            .enumerate()
            .filter_map(|(i, text)| OptionLetter::from_index(i).map(|l| (l, text.clone())))
            .collect();

        vec![Effect::ShowQuestion(QuestionView {
            index: self.current,
            total: self.questions.len(),
            prompt: format!("{}. {}", self.current + 1, question.question),
            options,
            selected: self.answers[self.current].map(|a| a.selected),
            can_go_back: self.current > 0,
            can_go_forward: self.current + 1 < self.questions.len(),
        })]
    }

    /// Only answered questions are sent.
    pub fn submitted_answers(&self) -> Vec<SubmittedAnswer> {
        self.answers
            .iter()
            .flatten()
            .map(|a| SubmittedAnswer {
                question_id: a.question_id,
                selected_option: Some(a.selected.to_string()),
            })
            .collect()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn identity(&self) -> Option<&SessionIdentity> {
        self.identity.as_ref()
    }

    pub fn finish_reason(&self) -> Option<FinishReason> {
        self.finish_reason
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn remaining_seconds(&self) -> u32 {
        self.remaining_seconds
    }

    pub fn warnings(&self) -> &[WarningRecord] {
        self.warnings.log()
    }

    pub fn settings(&self) -> &ExamSettings {
        &self.settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::exam_record::AnnotatedAnswer,
        session::{identity::MemoryMarkers, signals::ViolationCode},
    };

    fn at(ms: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp_millis(1_700_000_000_000 + ms).unwrap()
    }

    fn identity() -> SessionIdentity {
        SessionIdentity {
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
        }
    }

    fn paper(n: i64) -> Vec<PublicQuestion> {
        (1..=n)
            .map(|id| PublicQuestion {
                id,
                question: format!("Question {}", id),
                options: vec!["w".into(), "x".into(), "y".into(), "z".into()],
            })
            .collect()
    }

    fn started(settings: ExamSettings, questions: i64) -> ExamSession {
        let mut session = ExamSession::new(settings);
        session.enter(Some(identity()), &MemoryMarkers::new()).unwrap();
        session.load_questions(paper(questions)).unwrap();
        session
    }

    fn submits(effects: &[Effect]) -> Vec<&SubmitExamRequest> {
        effects
            .iter()
            .filter_map(|e| match e {
                Effect::Submit(req) => Some(req),
                _ => None,
            })
            .collect()
    }

    fn blur() -> Violation {
        Violation::new("Window focus lost", ViolationCode::WindowBlur)
    }

    #[test]
    fn test_enter_requires_identity() {
        let mut session = ExamSession::new(ExamSettings::default());
        assert!(matches!(
            session.enter(None, &MemoryMarkers::new()),
            Err(SessionError::MissingIdentity)
        ));
        assert_eq!(session.phase(), Phase::Uninitialized);
    }

    #[test]
    fn test_enter_rejects_submitted_identity() {
        let mut markers = MemoryMarkers::new();
        markers.mark_submitted("ada@example.com").unwrap();
        let mut session = ExamSession::new(ExamSettings::default());
        assert!(matches!(
            session.enter(Some(identity()), &markers),
            Err(SessionError::AlreadySubmitted(_))
        ));
    }

    #[test]
    fn test_empty_paper_stays_loading() {
        let mut session = ExamSession::new(ExamSettings::default());
        let effects = session.enter(Some(identity()), &MemoryMarkers::new()).unwrap();
        assert_eq!(effects, vec![Effect::Watermark("Ada • ada@example.com".to_string())]);

        assert!(matches!(session.load_questions(Vec::new()), Err(SessionError::NoQuestions)));
        assert_eq!(session.phase(), Phase::Loading);
        assert!(session.next().is_empty());
        assert!(session.tick().is_empty());
    }

    #[test]
    fn test_navigation_is_bounded() {
        let mut session = started(ExamSettings::default(), 3);
        assert!(session.previous().is_empty());

        session.next();
        let effects = session.next();
        let Some(Effect::ShowQuestion(view)) = effects.first() else {
            panic!("expected a rendered question");
        };
        assert_eq!(view.index, 2);
        assert_eq!(view.prompt, "3. Question 3");
        assert_eq!(view.progress(), "Question 3 of 3");
        assert!(view.can_go_back);
        assert!(!view.can_go_forward);

        assert!(session.next().is_empty());
        assert_eq!(session.current_index(), 2);
    }

    #[test]
    fn test_selection_upserts_per_question() {
        let mut session = started(ExamSettings::default(), 3);
        session.select(OptionLetter::A);
        session.select(OptionLetter::C);
        session.next();
        session.next();
        session.select(OptionLetter::B);

        let answers = session.submitted_answers();
        assert_eq!(answers.len(), 2);
        assert_eq!(answers[0].question_id, 1);
        assert_eq!(answers[0].selected_option.as_deref(), Some("C"));
        assert_eq!(answers[1].question_id, 3);

        session.previous();
        let Some(Effect::ShowQuestion(view)) = session.previous().pop() else {
            panic!("expected a rendered question");
        };
        assert_eq!(view.selected, Some(OptionLetter::C));
    }

    #[test]
    fn test_timer_expiry_submits_answered_only() {
        let settings = ExamSettings {
            duration_seconds: 3,
            ..ExamSettings::default()
        };
        let mut session = started(settings, 3);
        session.select(OptionLetter::A);
        session.next();
        session.select(OptionLetter::B);

        assert_eq!(session.tick(), vec![Effect::Timer("00:02".to_string())]);
        session.tick();
        let effects = session.tick();

        assert_eq!(effects[0], Effect::Timer("00:00".to_string()));
        let requests = submits(&effects);
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].answers.as_ref().map(Vec::len), Some(2));
        assert_eq!(session.phase(), Phase::Finishing);
        assert_eq!(session.finish_reason(), Some(FinishReason::TimeOver));
        assert!(session.tick().is_empty());
    }

    #[test]
    fn test_third_warning_forces_single_finish() {
        let mut session = started(ExamSettings::default(), 2);
        let mut all = Vec::new();
        for i in 0..6 {
            all.extend(session.report_violation(&blur(), at(i * 2000)));
        }

        assert_eq!(submits(&all).len(), 1);
        assert_eq!(session.warnings().len(), 3);
        assert_eq!(session.finish_reason(), Some(FinishReason::Violations));
        assert!(all.contains(&Effect::WarningCounter { count: 3, max: 3 }));
        assert!(all.contains(&Effect::Notice("⚠ Warning 1/3:\nWindow focus lost".to_string())));
    }

    #[test]
    fn test_rapid_signals_count_once() {
        let mut session = started(ExamSettings::default(), 2);
        for ms in [0, 5, 10, 900, 1400] {
            session.report_violation(&blur(), at(ms));
        }
        assert_eq!(session.warnings().len(), 1);
    }

    #[test]
    fn test_simultaneous_triggers_submit_once() {
        let settings = ExamSettings {
            duration_seconds: 1,
            ..ExamSettings::default()
        };
        let mut session = started(settings, 3);
        session.report_violation(&blur(), at(0));
        session.report_violation(&blur(), at(2000));

        let mut effects = session.tick();
        effects.extend(session.report_violation(&blur(), at(4000)));
        effects.extend(session.confirm_submit());

        assert_eq!(submits(&effects).len(), 1);
        assert_eq!(session.finish_reason(), Some(FinishReason::TimeOver));
        assert_eq!(session.warnings().len(), 2);
    }

    #[test]
    fn test_escalation_while_loading() {
        let mut session = ExamSession::new(ExamSettings::default());
        session.enter(Some(identity()), &MemoryMarkers::new()).unwrap();

        let mut effects = Vec::new();
        for i in 0..3 {
            effects.extend(session.report_violation(&blur(), at(i * 2000)));
        }
        let requests = submits(&effects);
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].answers, Some(Vec::new()));

        // A late paper is ignored.
        assert!(session.load_questions(paper(2)).unwrap().is_empty());
        assert_eq!(session.phase(), Phase::Finishing);
    }

    #[test]
    fn test_settle_clears_identity_and_renders_review() {
        let mut session = started(ExamSettings::default(), 2);
        session.select(OptionLetter::A);
        session.confirm_submit();

        let response = SubmitExamResponse {
            message: "Exam submitted successfully".to_string(),
            correct: 1,
            total: 2,
            percentage: 50.0,
            answers: vec![AnnotatedAnswer {
                question_id: 1,
                question: "Question 1".to_string(),
                options: vec!["w".into(), "x".into(), "y".into(), "z".into()],
                selected_option: Some("A".to_string()),
                correct_option: "A".to_string(),
                is_correct: true,
            }],
        };
        let effects = session.settle_submission(Ok(response));

        assert_eq!(session.phase(), Phase::Finished);
        assert!(session.identity().is_none());
        let Effect::ShowResult(text) = &effects[0] else {
            panic!("expected result text");
        };
        assert!(text.starts_with("You submitted the exam.\nScore: 1/2 (50%)"));
        assert!(text.contains("1. Question 1\nYour answer: A\nCorrect answer: A\nResult: Correct ✅"));
        assert_eq!(effects[1], Effect::ClearIdentity);

        assert!(session.settle_submission(Err("again".to_string())).is_empty());
        assert!(session.report_violation(&blur(), at(60_000)).is_empty());
    }

    #[test]
    fn test_failed_submission_still_finishes() {
        let mut session = started(ExamSettings::default(), 1);
        session.confirm_submit();
        let effects = session.settle_submission(Err("connection refused".to_string()));

        assert_eq!(session.phase(), Phase::Finished);
        assert_eq!(effects[0], Effect::ShowResult(SUBMISSION_FAILED_TEXT.to_string()));
    }

    #[test]
    fn test_format_clock() {
        assert_eq!(format_clock(3600), "60:00");
        assert_eq!(format_clock(61), "01:01");
        assert_eq!(format_clock(0), "00:00");
    }
}
