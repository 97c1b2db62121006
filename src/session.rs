use crate::catalog::WordEntry;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::SystemTime;
use tracing::warn;

pub const SECONDS_PER_WORD: u32 = 30;
pub const PRACTICE_GEMS: u32 = 2;
pub const TEST_GEMS: u32 = 5;

const BLANK_ANSWER: &str = "(blank)";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("cannot start a session over an empty word set")]
    EmptySet,
    #[error("session is already complete")]
    SessionComplete,
    #[error("session still has {remaining} word(s) to answer")]
    InProgress { remaining: usize },
    #[error("the current word has already been answered")]
    AlreadyAnswered,
    #[error("the current word has not been answered yet")]
    Unanswered,
    #[error("the countdown only runs in test mode")]
    NotApplicable,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    clap::ValueEnum,
    strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SessionMode {
    Practice,
    Test,
}

impl SessionMode {
    pub fn gems_per_correct(self) -> u32 {
        match self {
            SessionMode::Practice => PRACTICE_GEMS,
            SessionMode::Test => TEST_GEMS,
        }
    }

    pub fn is_timed(self) -> bool {
        self == SessionMode::Test
    }
}

impl FromStr for SessionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "practice" | "learn" => Ok(SessionMode::Practice),
            "test" => Ok(SessionMode::Test),
            other => Err(format!("unknown session mode: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mistake {
    NoAnswer,
    WrongSpelling,
}

/// One wrong or timed-out answer. Never changed once recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorRecord {
    pub question_num: usize,
    pub word: String,
    pub user_answer: String,
    pub correct_answer: String,
    pub mistake: Mistake,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerResult {
    pub correct: bool,
    pub correct_spelling: String,
    pub gems: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    Ticking { remaining: u32 },
    Expired,
    /// The current word was already answered; the countdown waits for `advance`.
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionSummary {
    pub mode: SessionMode,
    pub total_questions: usize,
    pub correct_answers: usize,
    pub error_count: usize,
    pub error_details: Vec<ErrorRecord>,
    pub gems_earned: u32,
    pub time_taken_secs: u64,
}

fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}

/// One practice or test attempt over a fixed word list.
#[derive(Debug, Clone)]
pub struct Session {
    mode: SessionMode,
    words: Vec<WordEntry>,
    cursor: usize,
    errors: Vec<ErrorRecord>,
    remaining_seconds: Option<u32>,
    answered: bool,
    pending_gems: u32,
    started_at: SystemTime,
}

impl Session {
    pub fn start(words: Vec<WordEntry>, mode: SessionMode) -> Result<Self, SessionError> {
        if words.is_empty() {
            return Err(SessionError::EmptySet);
        }

        Ok(Self {
            mode,
            words,
            cursor: 0,
            errors: Vec::new(),
            remaining_seconds: mode.is_timed().then_some(SECONDS_PER_WORD),
            answered: false,
            pending_gems: 0,
            started_at: SystemTime::now(),
        })
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    pub fn words(&self) -> &[WordEntry] {
        &self.words
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn errors(&self) -> &[ErrorRecord] {
        &self.errors
    }

    /// `None` outside test mode.
    pub fn remaining_seconds(&self) -> Option<u32> {
        self.remaining_seconds
    }

    /// Sum of the per-answer gem deltas so far. Not a balance.
    pub fn pending_gems(&self) -> u32 {
        self.pending_gems
    }

    pub fn is_answered(&self) -> bool {
        self.answered
    }

    pub fn is_complete(&self) -> bool {
        self.cursor >= self.words.len()
    }

    pub fn current(&self) -> Result<&WordEntry, SessionError> {
        self.words
            .get(self.cursor)
            .ok_or(SessionError::SessionComplete)
    }

    pub fn submit_answer(&mut self, raw: &str) -> Result<AnswerResult, SessionError> {
        if self.answered {
            return Err(SessionError::AlreadyAnswered);
        }
        let entry = self.current()?;

        let expected = normalize(&entry.word);
        let given = raw.trim();
        let correct = normalize(given) == expected;

        let gems = if correct {
            self.mode.gems_per_correct()
        } else {
            let record = ErrorRecord {
                question_num: self.cursor + 1,
                word: entry.word.clone(),
                user_answer: if given.is_empty() {
                    BLANK_ANSWER.to_string()
                } else {
                    given.to_string()
                },
                correct_answer: expected.clone(),
                mistake: if given.is_empty() {
                    Mistake::NoAnswer
                } else {
                    Mistake::WrongSpelling
                },
            };
            self.errors.push(record);
            0
        };

        self.pending_gems += gems;
        self.answered = true;

        Ok(AnswerResult {
            correct,
            correct_spelling: expected,
            gems,
        })
    }

    pub fn advance(&mut self) -> Result<(), SessionError> {
        if self.is_complete() {
            return Err(SessionError::SessionComplete);
        }
        if !self.answered {
            return Err(SessionError::Unanswered);
        }

        self.cursor += 1;
        self.answered = false;
        if self.mode.is_timed() && !self.is_complete() {
            self.remaining_seconds = Some(SECONDS_PER_WORD);
        }
        Ok(())
    }

    /// The one path that closes a word, shared by manual submit and timer expiry.
    pub fn complete_current_word(&mut self, raw: &str) -> Result<AnswerResult, SessionError> {
        let result = self.submit_answer(raw)?;
        self.advance()?;
        Ok(result)
    }

    /// One elapsed second of the per-word countdown.
    pub fn tick(&mut self) -> Result<TimerEvent, SessionError> {
        if !self.mode.is_timed() {
            return Err(SessionError::NotApplicable);
        }
        if self.is_complete() {
            return Err(SessionError::SessionComplete);
        }
        if self.answered {
            return Ok(TimerEvent::Stopped);
        }

        let remaining = self.remaining_seconds.get_or_insert(SECONDS_PER_WORD);
        *remaining = remaining.saturating_sub(1);

        Ok(match *remaining {
            0 => TimerEvent::Expired,
            remaining => TimerEvent::Ticking { remaining },
        })
    }

    pub fn finish(&self) -> Result<CompletionSummary, SessionError> {
        if !self.is_complete() {
            return Err(SessionError::InProgress {
                remaining: self.words.len() - self.cursor,
            });
        }

        let total_questions = self.words.len();
        let error_count = self.errors.len();
        let correct_answers = total_questions - error_count;
        let gems_earned = correct_answers as u32 * self.mode.gems_per_correct();

        if gems_earned != self.pending_gems {
            warn!(
                gems_earned,
                pending_gems = self.pending_gems,
                "recomputed gems disagree with per-answer total"
            );
        }

        Ok(CompletionSummary {
            mode: self.mode,
            total_questions,
            correct_answers,
            error_count,
            error_details: self.errors.clone(),
            gems_earned,
            time_taken_secs: self.started_at.elapsed().unwrap_or_default().as_secs(),
        })
    }
}
