//! Exam session state machine.
//!
//! An [`ExamSession`] walks `NotStarted → AwaitingPermission → Running →
//! Graded`. It exclusively owns the answers, the violation count and the
//! phase. The countdown timer and the proctoring listener run as tokio tasks
//! that only *send* [`SessionEvent`]s; the task that owns the session reads
//! them from [`SessionEvents`] and feeds them back through
//! [`ExamSession::handle_event`]. Since every mutation goes through
//! `&mut self`, submission can never run twice concurrently, and once the
//! session is graded any late event is ignored.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use uuid::Uuid;

use crate::error::SessionError;
use crate::host::HostPage;
use crate::model::{AnswerMap, Question, SessionPhase, TestDefinition};
use crate::notification::NotificationChannel;
use crate::proctor::{ProctoringMonitor, ViolationLadder, ViolationSource, ViolationVerdict};
use crate::results::ResultRecord;
use crate::scoring::{self, ScoreSummary};
use crate::timer::CountdownTimer;
use crate::traits::{MediaDevices, QuestionSource, ResultSink};

/// Something that happened while a session was running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// One second elapsed on the countdown.
    Tick { session_id: Uuid, remaining_secs: u64 },
    /// The countdown reached zero.
    TimeExpired { session_id: Uuid },
    /// The user left the test window or page.
    Violation {
        session_id: Uuid,
        source: ViolationSource,
    },
}

impl SessionEvent {
    pub fn session_id(&self) -> Uuid {
        match self {
            SessionEvent::Tick { session_id, .. }
            | SessionEvent::TimeExpired { session_id }
            | SessionEvent::Violation { session_id, .. } => *session_id,
        }
    }
}

/// Why a session was graded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitReason {
    Manual,
    TimeExpired,
    ProctoringViolation,
}

impl fmt::Display for SubmitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitReason::Manual => write!(f, "submitted"),
            SubmitReason::TimeExpired => write!(f, "time expired"),
            SubmitReason::ProctoringViolation => write!(f, "submitted automatically"),
        }
    }
}

/// The graded result of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionOutcome {
    pub reason: SubmitReason,
    pub summary: ScoreSummary,
    pub record: ResultRecord,
    /// Whether the record reached the result sink.
    pub persisted: bool,
}

/// Receiving end of a session's event channel.
pub struct SessionEvents {
    rx: UnboundedReceiver<SessionEvent>,
}

impl SessionEvents {
    pub async fn recv(&mut self) -> Option<SessionEvent> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<SessionEvent> {
        self.rx.try_recv().ok()
    }
}

/// External collaborators a session needs.
#[derive(Clone)]
pub struct Collaborators {
    pub devices: Arc<dyn MediaDevices>,
    pub sink: Arc<dyn ResultSink>,
    pub host: HostPage,
    pub notifier: NotificationChannel,
}

/// One attempt at a test.
pub struct ExamSession {
    id: Uuid,
    phase: SessionPhase,
    definition: Option<TestDefinition>,
    answers: AnswerMap,
    current: usize,
    violations: u32,
    remaining_secs: u64,
    ladder: ViolationLadder,
    monitor: ProctoringMonitor,
    timer: Option<CountdownTimer>,
    host: HostPage,
    sink: Arc<dyn ResultSink>,
    notifier: NotificationChannel,
    events: UnboundedSender<SessionEvent>,
    started_at: Option<DateTime<Utc>>,
    outcome: Option<SessionOutcome>,
}

impl ExamSession {
    pub fn new(collaborators: Collaborators) -> (Self, SessionEvents) {
        let Collaborators {
            devices,
            sink,
            host,
            notifier,
        } = collaborators;
        let (tx, rx) = mpsc::unbounded_channel();
        let monitor = ProctoringMonitor::new(devices, host.clone(), notifier.clone());

        let session = Self {
            id: Uuid::new_v4(),
            phase: SessionPhase::NotStarted,
            definition: None,
            answers: AnswerMap::new(),
            current: 0,
            violations: 0,
            remaining_secs: 0,
            ladder: ViolationLadder::default(),
            monitor,
            timer: None,
            host,
            sink,
            notifier,
            events: tx,
            started_at: None,
            outcome: None,
        };
        (session, SessionEvents { rx })
    }

    /// Change how many violations force submission.
    pub fn with_violation_limit(mut self, limit: u32) -> Self {
        self.ladder = ViolationLadder::new(limit);
        self
    }

    // -- loading ------------------------------------------------------------

    /// Install a test definition. Only valid before the session starts.
    ///
    /// An invalid definition is reported through a notification and leaves
    /// the session without data.
    pub fn load_definition(&mut self, definition: TestDefinition) -> Result<(), SessionError> {
        self.require(SessionPhase::NotStarted, "load a test")?;
        if let Err(e) = definition.check() {
            self.definition = None;
            tracing::warn!(session = %self.id, test = %definition.id, "rejecting test definition: {e}");
            self.notifier
                .error(format!("Error: Invalid question data format ({e})"));
            return Err(e.into());
        }
        tracing::info!(
            session = %self.id,
            test = %definition.id,
            questions = definition.questions.len(),
            "test loaded"
        );
        self.remaining_secs = definition.duration_secs();
        self.definition = Some(definition);
        Ok(())
    }

    /// Load the test from `source`. Returns whether data is now present.
    pub async fn load_from(&mut self, source: &dyn QuestionSource) -> bool {
        if self.phase != SessionPhase::NotStarted {
            tracing::warn!(session = %self.id, phase = %self.phase, "ignoring load outside not-started phase");
            return false;
        }
        match source.load().await {
            Ok(definition) => self.load_definition(definition).is_ok(),
            Err(e) => {
                self.definition = None;
                tracing::error!(session = %self.id, source = source.name(), "failed to load questions: {e:#}");
                self.notifier
                    .error("Error loading questions. Please try again later.");
                false
            }
        }
    }

    // -- lifecycle ----------------------------------------------------------

    /// Request device access and, if granted, begin the test.
    ///
    /// Returns the phase reached: `Running` on success, `NotStarted` if no
    /// test is loaded or access was denied (the user may retry).
    pub async fn start(&mut self) -> Result<SessionPhase, SessionError> {
        if !matches!(
            self.phase,
            SessionPhase::NotStarted | SessionPhase::AwaitingPermission
        ) {
            return Err(SessionError::InvalidPhase {
                operation: "start",
                phase: self.phase,
            });
        }
        let Some(total_secs) = self.definition.as_ref().map(TestDefinition::duration_secs) else {
            self.notifier.warning("No test is loaded yet.");
            return Ok(self.phase);
        };

        self.transition(SessionPhase::AwaitingPermission);
        if !self.monitor.request_access().await {
            self.transition(SessionPhase::NotStarted);
            return Ok(self.phase);
        }

        self.remaining_secs = total_secs;
        self.started_at = Some(Utc::now());
        self.timer = Some(CountdownTimer::start(
            self.id,
            total_secs,
            self.events.clone(),
        ));
        self.monitor.attach(self.id, self.events.clone());
        self.host.set_leave_warning(true);
        self.transition(SessionPhase::Running);
        Ok(self.phase)
    }

    /// Submit the test. Idempotent once graded.
    pub async fn submit(&mut self) -> Result<&SessionOutcome, SessionError> {
        self.finish(SubmitReason::Manual).await
    }

    /// Interpret an event from the timer or the proctoring listener.
    pub async fn handle_event(&mut self, event: SessionEvent) -> Result<(), SessionError> {
        if event.session_id() != self.id {
            tracing::debug!(session = %self.id, ?event, "ignoring event for another session");
            return Ok(());
        }
        if self.phase != SessionPhase::Running {
            tracing::debug!(session = %self.id, phase = %self.phase, ?event, "ignoring event outside running phase");
            return Ok(());
        }

        match event {
            SessionEvent::Tick { remaining_secs, .. } => {
                self.remaining_secs = remaining_secs;
            }
            SessionEvent::TimeExpired { .. } => {
                self.remaining_secs = 0;
                self.notifier
                    .info("Time is up. Your test has been submitted.");
                self.finish(SubmitReason::TimeExpired).await?;
            }
            SessionEvent::Violation { source, .. } => {
                self.violations += 1;
                let verdict = self.ladder.assess(self.violations);
                tracing::warn!(
                    session = %self.id,
                    ?source,
                    count = self.violations,
                    "proctoring violation"
                );
                self.notifier.notify(verdict.level(), verdict.message());
                if verdict == ViolationVerdict::ForceSubmit {
                    self.finish(SubmitReason::ProctoringViolation).await?;
                }
            }
        }
        Ok(())
    }

    // -- answering ----------------------------------------------------------

    /// Record `option_text` as the answer to `question_id`.
    pub fn select_answer(&mut self, question_id: &str, option_text: &str) -> Result<(), SessionError> {
        self.require(SessionPhase::Running, "select an answer")?;
        let question = self
            .definition
            .as_ref()
            .and_then(|d| d.question(question_id))
            .ok_or_else(|| SessionError::UnknownQuestion(question_id.to_string()))?;
        if !question.has_option(option_text) {
            return Err(SessionError::UnknownOption {
                question_id: question_id.to_string(),
                option: option_text.to_string(),
            });
        }
        self.answers.record(question_id, option_text);
        Ok(())
    }

    /// Answer the current question with its `index`-th option (0-based).
    pub fn select_current(&mut self, index: usize) -> Result<(), SessionError> {
        self.require(SessionPhase::Running, "select an answer")?;
        let (question_id, text) = match self.current_question() {
            Some(q) => match q.options.get(index) {
                Some(option) => (q.id.clone(), option.text.clone()),
                None => {
                    return Err(SessionError::UnknownOption {
                        question_id: q.id.clone(),
                        option: format!("#{}", index + 1),
                    })
                }
            },
            None => return Err(SessionError::UnknownQuestion(format!("#{}", self.current + 1))),
        };
        self.select_answer(&question_id, &text)
    }

    /// Move the current-question pointer by `delta`, clamped to the test.
    pub fn navigate(&mut self, delta: isize) -> Result<usize, SessionError> {
        self.require(SessionPhase::Running, "navigate")?;
        self.current = self
            .current
            .saturating_add_signed(delta)
            .min(self.last_index());
        Ok(self.current)
    }

    /// Jump to question `index` (0-based), clamped to the test.
    pub fn go_to(&mut self, index: usize) -> Result<usize, SessionError> {
        self.require(SessionPhase::Running, "navigate")?;
        self.current = index.min(self.last_index());
        Ok(self.current)
    }

    // -- accessors ----------------------------------------------------------

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn definition(&self) -> Option<&TestDefinition> {
        self.definition.as_ref()
    }

    pub fn answers(&self) -> &AnswerMap {
        &self.answers
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.definition
            .as_ref()
            .and_then(|d| d.questions.get(self.current))
    }

    pub fn question_count(&self) -> usize {
        self.definition.as_ref().map_or(0, |d| d.questions.len())
    }

    pub fn violations(&self) -> u32 {
        self.violations
    }

    pub fn remaining_secs(&self) -> u64 {
        self.remaining_secs
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn outcome(&self) -> Option<&SessionOutcome> {
        self.outcome.as_ref()
    }

    pub fn notifier(&self) -> &NotificationChannel {
        &self.notifier
    }

    // -- internals ----------------------------------------------------------

    fn require(&self, phase: SessionPhase, operation: &'static str) -> Result<(), SessionError> {
        if self.phase == phase {
            Ok(())
        } else {
            Err(SessionError::InvalidPhase {
                operation,
                phase: self.phase,
            })
        }
    }

    fn transition(&mut self, to: SessionPhase) {
        tracing::info!(session = %self.id, from = %self.phase, to = %to, "session phase change");
        self.phase = to;
    }

    fn last_index(&self) -> usize {
        self.question_count().saturating_sub(1)
    }

    async fn finish(&mut self, reason: SubmitReason) -> Result<&SessionOutcome, SessionError> {
        if self.phase != SessionPhase::Graded {
            self.require(SessionPhase::Running, "submit")?;
            self.grade(reason).await?;
        } else {
            tracing::debug!(session = %self.id, %reason, "already graded; submit ignored");
        }
        self.outcome.as_ref().ok_or(SessionError::InvalidPhase {
            operation: "submit",
            phase: self.phase,
        })
    }

    async fn grade(&mut self, reason: SubmitReason) -> Result<(), SessionError> {
        let Some(definition) = self.definition.as_ref() else {
            return Err(SessionError::InvalidPhase {
                operation: "grade",
                phase: self.phase,
            });
        };
        let summary = scoring::score(&definition.questions, &self.answers, definition.mark_scheme())
            .inspect_err(|e| tracing::error!(session = %self.id, "cannot grade session: {e}"))?;
        let record = ResultRecord::new(definition, &summary, Utc::now());

        self.teardown();
        self.transition(SessionPhase::Graded);
        tracing::info!(
            session = %self.id,
            %reason,
            score = summary.total_score,
            percentage = summary.percentage,
            "session graded"
        );

        self.outcome = Some(SessionOutcome {
            reason,
            summary,
            record: record.clone(),
            persisted: false,
        });

        let persisted = match self.sink.append(&record).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(session = %self.id, "failed to save test result: {e:#}");
                self.notifier
                    .error("Your result could not be saved, but it is shown below.");
                false
            }
        };
        if let Some(outcome) = self.outcome.as_mut() {
            outcome.persisted = persisted;
        }
        Ok(())
    }

    /// Stop the timer, detach listeners, release devices, drop the leave warning.
    fn teardown(&mut self) {
        if let Some(mut timer) = self.timer.take() {
            timer.stop();
        }
        self.monitor.shutdown();
        self.host.set_leave_warning(false);
    }
}

impl Drop for ExamSession {
    fn drop(&mut self) {
        if self.phase == SessionPhase::Running {
            tracing::warn!(session = %self.id, "session dropped while running; abandoning");
            self.teardown();
        }
    }
}
