use crate::catalog::WordCatalog;
use crate::profile::{CompletionRecord, ProfileStore};
use crate::session::{
    AnswerResult, CompletionSummary, Session, SessionError, SessionMode, TimerEvent,
};
use tracing::{debug, error, info};

/// What the student last saw after closing a word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Feedback {
    Correct,
    Incorrect { correct_spelling: String },
    TimedOut { correct_spelling: String },
}

impl Feedback {
    pub fn message(&self) -> String {
        match self {
            Feedback::Correct => "✓ Correct!".to_string(),
            Feedback::Incorrect { correct_spelling } => {
                format!("✗ Incorrect. Correct spelling: {correct_spelling}")
            }
            Feedback::TimedOut { correct_spelling } => {
                format!("⏱ Time's up! Correct spelling: {correct_spelling}")
            }
        }
    }
}

/// Summary of a finished attempt and whether the profile store accepted it.
#[derive(Debug, Clone)]
pub struct RecordedAttempt {
    pub summary: CompletionSummary,
    /// Balance after crediting; `None` when persisting failed.
    pub balance: Option<i64>,
    pub persist_error: Option<String>,
}

/// Drives one session for the UI: owns the typed input and serializes every
/// path that can close a word.
#[derive(Debug)]
pub struct Attempt {
    subject: String,
    grade: u32,
    set_id: usize,
    session: Session,
    input: String,
    feedback: Option<Feedback>,
}

impl Attempt {
    pub fn new(
        catalog: &WordCatalog,
        grade: u32,
        subject: &str,
        set_id: usize,
        mode: SessionMode,
    ) -> Result<Self, SessionError> {
        let words = catalog.words_for(grade, subject, set_id).to_vec();
        let session = Session::start(words, mode)?;
        info!(grade, subject, set_id, %mode, words = session.words().len(), "attempt started");

        Ok(Self {
            subject: subject.to_string(),
            grade,
            set_id,
            session,
            input: String::new(),
            feedback: None,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn grade(&self) -> u32 {
        self.grade
    }

    pub fn set_id(&self) -> usize {
        self.set_id
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn feedback(&self) -> Option<&Feedback> {
        self.feedback.as_ref()
    }

    pub fn is_complete(&self) -> bool {
        self.session.is_complete()
    }

    pub fn type_char(&mut self, c: char) {
        if !self.session.is_complete() {
            self.input.push(c);
        }
    }

    pub fn backspace(&mut self) {
        self.input.pop();
    }

    /// Manual submission of whatever has been typed.
    pub fn submit(&mut self) -> Result<AnswerResult, SessionError> {
        let result = self.close_word()?;
        self.feedback = Some(if result.correct {
            Feedback::Correct
        } else {
            Feedback::Incorrect {
                correct_spelling: result.correct_spelling.clone(),
            }
        });
        Ok(result)
    }

    /// One elapsed second of the countdown. Auto-submits the typed input when
    /// the word's time runs out. A no-op outside test mode.
    pub fn on_second(&mut self) -> Result<Option<AnswerResult>, SessionError> {
        if !self.session.mode().is_timed() || self.session.is_complete() {
            return Ok(None);
        }

        match self.session.tick()? {
            TimerEvent::Expired => {
                let result = self.close_word()?;
                debug!(question = self.session.cursor(), "word timed out");
                self.feedback = Some(if result.correct {
                    Feedback::Correct
                } else {
                    Feedback::TimedOut {
                        correct_spelling: result.correct_spelling.clone(),
                    }
                });
                Ok(Some(result))
            }
            TimerEvent::Ticking { .. } | TimerEvent::Stopped => Ok(None),
        }
    }

    fn close_word(&mut self) -> Result<AnswerResult, SessionError> {
        let answer = std::mem::take(&mut self.input);
        self.session.complete_current_word(&answer)
    }

    /// Hands the summary to the store. The summary is returned even when
    /// persisting fails so the student always sees it.
    pub fn finish_and_record<S: ProfileStore>(
        &self,
        store: &S,
        uid: i64,
    ) -> Result<RecordedAttempt, SessionError> {
        let summary = self.session.finish()?;
        let record = CompletionRecord {
            subject: self.subject.clone(),
            grade: self.grade,
            set_id: self.set_id,
            summary: summary.clone(),
        };

        Ok(match store.record_completion(uid, &record) {
            Ok(balance) => RecordedAttempt {
                summary,
                balance: Some(balance),
                persist_error: None,
            },
            Err(err) => {
                error!(uid, error = %err, "failed to record attempt");
                RecordedAttempt {
                    summary,
                    balance: None,
                    persist_error: Some(err.to_string()),
                }
            }
        })
    }
}
