use crate::profile::{AttemptLog, LoginEvent, ProfileError, ProfileStore, StudentOverview};
use crate::session::SessionMode;
use chrono::{Local, NaiveDate};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DashboardStats {
    pub total_students: usize,
    pub today_logins: usize,
    pub total_tests: usize,
    pub avg_gems: i64,
}

impl DashboardStats {
    pub fn compute(students: &[StudentOverview], logins: &[LoginEvent], today: NaiveDate) -> Self {
        let total_students = students.len();
        let total_gems: i64 = students.iter().map(|s| s.profile.gems).sum();
        let avg_gems = if total_students > 0 {
            (total_gems as f64 / total_students as f64).round() as i64
        } else {
            0
        };

        Self {
            total_students,
            today_logins: logins
                .iter()
                .filter(|login| login.timestamp.date_naive() == today)
                .count(),
            total_tests: students.iter().map(|s| s.test_count).sum(),
            avg_gems,
        }
    }

    pub fn collect<S: ProfileStore>(store: &S) -> Result<Self, ProfileError> {
        let students = store.students()?;
        let logins = store.login_events()?;
        Ok(Self::compute(&students, &logins, Local::now().date_naive()))
    }
}

impl fmt::Display for DashboardStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total students: {}", self.total_students)?;
        writeln!(f, "Logins today:   {}", self.today_logins)?;
        writeln!(f, "Total tests:    {}", self.total_tests)?;
        write!(f, "Average gems:   {}", self.avg_gems)
    }
}

/// Students whose name or email contains `query`, ignoring case.
pub fn filter_students<'a>(students: &'a [StudentOverview], query: &str) -> Vec<&'a StudentOverview> {
    let query = query.trim().to_lowercase();
    students
        .iter()
        .filter(|s| {
            s.profile.name.to_lowercase().contains(&query)
                || s.profile.email.to_lowercase().contains(&query)
        })
        .collect()
}

pub fn correct_percent(correct: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    (correct as f64 / total as f64 * 100.0).round() as u32
}

pub fn format_student(student: &StudentOverview) -> String {
    let p = &student.profile;
    format!(
        "[{}] {} <{}>  grade {}  gems {}  tests {}  logins {}",
        p.uid, p.name, p.email, p.grade, p.gems, student.test_count, student.login_count
    )
}

pub fn format_login(login: &LoginEvent) -> String {
    format!(
        "Login ({})  {}  device: {}",
        login.user_type,
        login.timestamp.format("%Y-%m-%d %H:%M:%S"),
        login.device_info.chars().take(50).collect::<String>()
    )
}

pub fn format_attempt(log: &AttemptLog) -> Vec<String> {
    let mode = match log.mode {
        SessionMode::Test => "Test mode",
        SessionMode::Practice => "Practice mode",
    };

    let mut lines = vec![
        format!("{} - Set {} ({})", log.subject, log.set_id + 1, mode),
        format!(
            "  Score: {}/{} ({}%)",
            log.correct_answers,
            log.total_questions,
            correct_percent(log.correct_answers, log.total_questions)
        ),
        format!("  Errors: {}", log.errors),
        format!("  Gems earned: +{}", log.gems_earned),
    ];
    for err in &log.error_details {
        lines.push(format!(
            "    Q{}: \"{}\" → You wrote: \"{}\"",
            err.question_num, err.word, err.user_answer
        ));
    }
    lines.push(format!("  {}", log.timestamp.format("%Y-%m-%d %H:%M:%S")));
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::Profile;
    use crate::session::{ErrorRecord, Mistake};
    use chrono::{Duration, TimeZone};

    fn student(uid: i64, name: &str, email: &str, gems: i64, tests: usize) -> StudentOverview {
        StudentOverview {
            profile: Profile {
                uid,
                name: name.to_string(),
                grade: 2,
                email: email.to_string(),
                gems,
                created_at: Local::now(),
            },
            test_count: tests,
            login_count: 0,
        }
    }

    fn login_at(timestamp: chrono::DateTime<Local>) -> LoginEvent {
        LoginEvent {
            uid: 1,
            timestamp,
            user_type: "student".to_string(),
            device_info: "spellathon".to_string(),
        }
    }

    #[test]
    fn stats_over_students_and_logins() {
        let students = vec![
            student(1, "Asha", "asha@example.com", 50, 2),
            student(2, "Ben", "ben@example.com", 101, 3),
        ];
        let noon = Local.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap();
        let logins = vec![
            login_at(noon),
            login_at(noon + Duration::hours(1)),
            login_at(noon - Duration::days(1)),
        ];

        let stats = DashboardStats::compute(&students, &logins, noon.date_naive());
        assert_eq!(
            stats,
            DashboardStats {
                total_students: 2,
                today_logins: 2,
                total_tests: 5,
                avg_gems: 76,
            }
        );
    }

    #[test]
    fn stats_without_students() {
        let today = Local::now().date_naive();
        let stats = DashboardStats::compute(&[], &[], today);
        assert_eq!(stats.avg_gems, 0);
        assert_eq!(stats.total_students, 0);
    }

    #[test]
    fn filter_matches_name_or_email() {
        let students = vec![
            student(1, "Asha Rao", "asha@example.com", 0, 0),
            student(2, "Ben", "ben@school.org", 0, 0),
        ];

        let by_name = filter_students(&students, "RAO");
        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name[0].profile.uid, 1);

        let by_email = filter_students(&students, "school");
        assert_eq!(by_email[0].profile.uid, 2);

        assert_eq!(filter_students(&students, "").len(), 2);
        assert!(filter_students(&students, "zed").is_empty());
    }

    #[test]
    fn percent_rounds_and_handles_zero() {
        assert_eq!(correct_percent(2, 3), 67);
        assert_eq!(correct_percent(10, 10), 100);
        assert_eq!(correct_percent(0, 0), 0);
    }

    #[test]
    fn attempt_lines_include_errors() {
        let log = AttemptLog {
            id: 1,
            uid: 1,
            subject: "English".to_string(),
            grade: 1,
            set_id: 0,
            timestamp: Local::now(),
            total_questions: 3,
            correct_answers: 2,
            errors: 1,
            error_details: vec![ErrorRecord {
                question_num: 2,
                word: "dog".to_string(),
                user_answer: "(blank)".to_string(),
                correct_answer: "dog".to_string(),
                mistake: Mistake::NoAnswer,
            }],
            time_taken_secs: 12,
            gems_earned: 10,
            mode: SessionMode::Test,
        };

        let lines = format_attempt(&log);
        assert_eq!(lines[0], "English - Set 1 (Test mode)");
        assert_eq!(lines[1], "  Score: 2/3 (67%)");
        assert!(lines.contains(&"    Q2: \"dog\" → You wrote: \"(blank)\"".to_string()));
    }

    #[test]
    fn student_line() {
        let line = format_student(&student(7, "Asha", "asha@example.com", 55, 1));
        assert!(line.starts_with("[7] Asha <asha@example.com>"));
        assert!(line.contains("gems 55"));
    }
}
