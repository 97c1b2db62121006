use std::sync::mpsc;
use std::time::Duration;

use assert_matches::assert_matches;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use spellathon::attempt::Attempt;
use spellathon::auth::{Accounts, SignupForm};
use spellathon::catalog::{RawWord, WordCatalog};
use spellathon::profile::{ProfileError, ProfileStore, SqliteProfileStore};
use spellathon::rewards::{CLAIM_THRESHOLD, SIGNUP_GEMS};
use spellathon::runtime::{AppEvent, FixedTicker, Runner, TestEventSource};
use spellathon::session::{Mistake, Session, SessionMode, TimerEvent, SECONDS_PER_WORD};

fn cat_dog() -> WordCatalog {
    WordCatalog::from_entries(vec![
        RawWord::new(1, "English", "cat"),
        RawWord::new(1, "English", "dog"),
    ])
}

fn signup(store: &SqliteProfileStore, email: &str) -> i64 {
    Accounts::with_cost(store, 4)
        .signup(&SignupForm {
            name: "Asha".to_string(),
            grade: 1,
            email: email.to_string(),
            password: "secret".to_string(),
        })
        .unwrap()
        .uid
}

#[test]
fn csv_catalog_buckets_into_sets() {
    let mut csv = String::from("Grade,Subject,Word,Meaning\n");
    for i in 0..25 {
        csv.push_str(&format!("3,English,word{i},\"meaning, {i}\"\n"));
    }
    let catalog = WordCatalog::from_csv_str(&csv).unwrap();

    assert_eq!(catalog.set_count(3, "English"), 3);
    let sizes: Vec<usize> = (0..3)
        .map(|set| catalog.words_for(3, "English", set).len())
        .collect();
    assert_eq!(sizes, vec![10, 10, 5]);
    assert_eq!(catalog.words_for(3, "English", 2)[0].word, "word20");
    assert_eq!(catalog.words_for(3, "English", 0)[1].meaning, "meaning, 1");
}

#[test]
fn test_mode_all_correct() {
    let words = cat_dog().words_for(1, "English", 0).to_vec();
    let mut session = Session::start(words, SessionMode::Test).unwrap();

    assert_eq!(session.complete_current_word("cat").unwrap().gems, 5);
    assert!(!session.is_complete());
    assert_eq!(session.complete_current_word("dog").unwrap().gems, 5);
    assert!(session.is_complete());

    let summary = session.finish().unwrap();
    assert_eq!(summary.total_questions, 2);
    assert_eq!(summary.correct_answers, 2);
    assert_eq!(summary.error_count, 0);
    assert_eq!(summary.gems_earned, 10);
    assert_eq!(summary.gems_earned, session.pending_gems());
}

#[test]
fn practice_mode_all_wrong() {
    let words = cat_dog().words_for(1, "English", 0).to_vec();
    let mut session = Session::start(words, SessionMode::Practice).unwrap();

    assert!(!session.complete_current_word("kat").unwrap().correct);
    assert!(!session.complete_current_word("").unwrap().correct);

    let summary = session.finish().unwrap();
    assert_eq!(summary.correct_answers, 0);
    assert_eq!(summary.error_count, 2);
    assert_eq!(summary.gems_earned, 0);
    assert_eq!(summary.error_details[0].mistake, Mistake::WrongSpelling);
    assert_eq!(summary.error_details[1].mistake, Mistake::NoAnswer);
    assert_eq!(summary.error_details[1].user_answer, "(blank)");
}

#[test]
fn countdown_expires_on_thirtieth_tick() {
    let words = cat_dog().words_for(1, "English", 0).to_vec();
    let mut session = Session::start(words, SessionMode::Test).unwrap();

    for expected in (1..SECONDS_PER_WORD).rev() {
        assert_eq!(
            session.tick().unwrap(),
            TimerEvent::Ticking {
                remaining: expected
            }
        );
    }
    assert_eq!(session.tick().unwrap(), TimerEvent::Expired);
}

#[test]
fn headless_test_run_is_recorded_and_claimable() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteProfileStore::open(dir.path().join("spellathon.db")).unwrap();
    let uid = signup(&store, "asha@example.com");

    let mut attempt = Attempt::new(&cat_dog(), 1, "English", 0, SessionMode::Test).unwrap();

    let (tx, rx) = mpsc::channel();
    let runner = Runner::new(
        TestEventSource::new(rx),
        FixedTicker::new(Duration::from_millis(5)),
    );
    for c in " Cat \n".chars().chain("dgo\n".chars()) {
        let code = if c == '\n' {
            KeyCode::Enter
        } else {
            KeyCode::Char(c)
        };
        tx.send(AppEvent::Key(KeyEvent::new(code, KeyModifiers::NONE)))
            .unwrap();
    }

    for _ in 0..100u32 {
        match runner.step() {
            AppEvent::Key(key) => match key.code {
                KeyCode::Enter => {
                    attempt.submit().unwrap();
                }
                KeyCode::Char(c) => attempt.type_char(c),
                _ => {}
            },
            AppEvent::Tick | AppEvent::Resize => {}
        }
        if attempt.is_complete() {
            break;
        }
    }
    assert!(attempt.is_complete());

    let recorded = attempt.finish_and_record(&store, uid).unwrap();
    assert_eq!(recorded.summary.correct_answers, 1);
    assert_eq!(recorded.summary.gems_earned, 5);
    assert_eq!(recorded.balance, Some(SIGNUP_GEMS + 5));

    let logs = store.test_logs(uid).unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].mode, SessionMode::Test);
    assert_eq!(logs[0].error_details[0].user_answer, "dgo");

    assert_matches!(
        store.claim_reward(uid),
        Err(ProfileError::BelowThreshold { balance }) if balance == SIGNUP_GEMS + 5
    );
    store.adjust_balance(uid, CLAIM_THRESHOLD).unwrap();
    store.claim_reward(uid).unwrap();
    assert_eq!(store.profile(uid).unwrap().gems, 0);
}

#[test]
fn embedded_catalog_covers_five_grades() {
    let catalog = WordCatalog::load(None).unwrap();
    assert_eq!(catalog.grades(), vec![1, 2, 3, 4, 5]);
    for grade in 1..=5 {
        assert_eq!(catalog.subjects_for(grade), vec!["English"]);
        assert_eq!(catalog.words_for(grade, "English", 0).len(), 10);
    }
}
