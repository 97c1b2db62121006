mod ui;

use clap::{error::ErrorKind, Args, CommandFactory, Parser, Subcommand};
use crossterm::{
    event::{KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Frame, Terminal,
};
use spellathon::{
    admin::{self, DashboardStats},
    attempt::{Attempt, RecordedAttempt},
    auth::{Accounts, AuthError, SignupForm},
    catalog::WordCatalog,
    config::{ConfigStore, FileConfigStore},
    logging,
    profile::{Profile, ProfileStore, SqliteProfileStore},
    runtime::{AppEvent, Countdown, CrosstermEventSource, FixedTicker, Runner},
    session::SessionMode,
};
use std::{
    error::Error,
    io::{self, stdin},
    path::PathBuf,
    time::{Duration, Instant},
};
use tracing::{error, info, warn};

const TICK_RATE_MS: u64 = 100;

/// spelling practice tui with timed tests and gem rewards
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Spelling practice for school kids: pick a word set for your grade, practice or take a timed test, earn gems and claim a reward at 1000."
)]
pub struct Cli {
    /// profile database to use instead of the per-user default
    #[clap(long, global = true)]
    db: Option<PathBuf>,

    /// word list: a CSV file or a published spreadsheet CSV url
    #[clap(long, global = true)]
    words: Option<String>,

    /// log filter, e.g. "debug" or "spellathon=trace"
    #[clap(long, global = true)]
    log_level: Option<String>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// create a student account
    Signup {
        #[clap(long)]
        name: String,
        #[clap(long)]
        grade: u32,
        #[clap(long)]
        email: String,
        #[clap(long, env = "SPELLATHON_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// practice or take a test in the terminal
    Play(Credentials),
    /// claim a reward once enough gems are collected
    Claim(Credentials),
    /// list the word sets available per grade and subject
    Words {
        #[clap(long)]
        grade: Option<u32>,
    },
    /// activity dashboard for admins
    Admin {
        #[clap(flatten)]
        credentials: Credentials,
        #[clap(subcommand)]
        view: AdminView,
    },
    /// allow an existing account to open the admin dashboard
    GrantAdmin {
        #[clap(long)]
        email: String,
    },
}

#[derive(Args, Debug, Clone)]
pub struct Credentials {
    #[clap(long)]
    email: String,
    #[clap(long, env = "SPELLATHON_PASSWORD", hide_env_values = true)]
    password: String,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum AdminView {
    /// totals across all students
    Stats,
    /// list students, optionally filtered by name or email
    Students {
        #[clap(long)]
        search: Option<String>,
    },
    /// login history and attempts of one student
    Logs {
        #[clap(long)]
        uid: i64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Subjects,
    Modes,
    Sets,
    Session,
    Summary,
}

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

#[derive(Debug)]
pub struct App {
    pub profile: Profile,
    pub catalog: WordCatalog,
    pub state: AppState,
    pub selected: usize,
    pub subject: Option<String>,
    pub mode: SessionMode,
    pub set_id: usize,
    pub attempt: Option<Attempt>,
    pub recorded: Option<RecordedAttempt>,
    pub notice: Option<String>,
    countdown: Countdown,
}

impl App {
    pub fn new(profile: Profile, catalog: WordCatalog, now: Instant) -> Self {
        let notice = if catalog.subjects_for(profile.grade).is_empty() {
            Some(format!("No word sets are available for grade {}", profile.grade))
        } else {
            None
        };

        Self {
            profile,
            catalog,
            state: AppState::Subjects,
            selected: 0,
            subject: None,
            mode: SessionMode::Practice,
            set_id: 0,
            attempt: None,
            recorded: None,
            notice,
            countdown: Countdown::new(now),
        }
    }

    pub fn menu_items(&self) -> Vec<String> {
        let grade = self.profile.grade;
        match (self.state, self.subject.as_deref()) {
            (AppState::Subjects, _) => self.catalog.subjects_for(grade),
            (AppState::Modes, _) => vec![
                "Practice (no timer, 2 gems per word)".to_string(),
                "Test (30 seconds per word, 5 gems per word)".to_string(),
            ],
            (AppState::Sets, Some(subject)) => (0..self.catalog.set_count(grade, subject))
                .map(|set_id| {
                    let words = self.catalog.words_for(grade, subject, set_id).len();
                    format!("Set {} ({} words)", set_id + 1, words)
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    fn on_key<S: ProfileStore>(&mut self, key: KeyEvent, store: &S, now: Instant) -> Flow {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Flow::Quit;
        }

        match self.state {
            AppState::Session => self.on_session_key(key, store, now),
            AppState::Summary => match key.code {
                KeyCode::Char('q') => return Flow::Quit,
                KeyCode::Char('r') => self.start_attempt(now),
                KeyCode::Enter | KeyCode::Esc => self.back(),
                _ => {}
            },
            AppState::Subjects | AppState::Modes | AppState::Sets => match key.code {
                KeyCode::Esc | KeyCode::Char('q') if self.state == AppState::Subjects => {
                    return Flow::Quit
                }
                KeyCode::Esc | KeyCode::Backspace => self.back(),
                KeyCode::Up | KeyCode::Char('k') => {
                    self.selected = self.selected.saturating_sub(1);
                }
                KeyCode::Down | KeyCode::Char('j') => {
                    if self.selected + 1 < self.menu_items().len() {
                        self.selected += 1;
                    }
                }
                KeyCode::Enter => self.choose(now),
                _ => {}
            },
        }
        Flow::Continue
    }

    fn on_session_key<S: ProfileStore>(&mut self, key: KeyEvent, store: &S, now: Instant) {
        let Some(attempt) = self.attempt.as_mut() else {
            return;
        };

        match key.code {
            KeyCode::Esc => self.back(),
            KeyCode::Backspace => attempt.backspace(),
            KeyCode::Enter => match attempt.submit() {
                Ok(_) => {
                    self.countdown.reset(now);
                    self.finish_if_complete(store);
                }
                Err(err) => warn!(error = %err, "submit rejected"),
            },
            KeyCode::Char(c) => attempt.type_char(c),
            _ => {}
        }
    }

    /// Feeds elapsed wall-clock seconds to a timed attempt. Returns whether
    /// anything visible changed.
    fn on_tick<S: ProfileStore>(&mut self, store: &S, now: Instant) -> bool {
        if self.state != AppState::Session {
            return false;
        }
        let Some(attempt) = self.attempt.as_mut() else {
            return false;
        };
        if !attempt.session().mode().is_timed() {
            return false;
        }

        let elapsed = self.countdown.poll(now);
        for _ in 0..elapsed {
            match attempt.on_second() {
                Ok(Some(_)) => {
                    // The next word gets a full 30 seconds from now
                    self.countdown.reset(now);
                    break;
                }
                Ok(None) => {}
                Err(err) => {
                    warn!(error = %err, "countdown tick rejected");
                    break;
                }
            }
        }

        self.finish_if_complete(store);
        elapsed > 0
    }

    fn choose(&mut self, now: Instant) {
        let items = self.menu_items();
        if self.selected >= items.len() {
            return;
        }

        match self.state {
            AppState::Subjects => {
                self.subject = Some(items[self.selected].clone());
                self.state = AppState::Modes;
                self.selected = 0;
            }
            AppState::Modes => {
                self.mode = if self.selected == 0 {
                    SessionMode::Practice
                } else {
                    SessionMode::Test
                };
                self.state = AppState::Sets;
                self.selected = 0;
            }
            AppState::Sets => {
                self.set_id = self.selected;
                self.start_attempt(now);
            }
            AppState::Session | AppState::Summary => {}
        }
        self.notice = None;
    }

    fn start_attempt(&mut self, now: Instant) {
        let Some(subject) = self.subject.clone() else {
            return;
        };

        match Attempt::new(
            &self.catalog,
            self.profile.grade,
            &subject,
            self.set_id,
            self.mode,
        ) {
            Ok(attempt) => {
                self.attempt = Some(attempt);
                self.recorded = None;
                self.notice = None;
                self.countdown.reset(now);
                self.state = AppState::Session;
            }
            Err(err) => {
                warn!(error = %err, set_id = self.set_id, "could not start attempt");
                self.notice = Some(err.to_string());
                self.state = AppState::Sets;
            }
        }
    }

    fn finish_if_complete<S: ProfileStore>(&mut self, store: &S) {
        let Some(attempt) = self.attempt.as_ref() else {
            return;
        };
        if !attempt.is_complete() {
            return;
        }

        match attempt.finish_and_record(store, self.profile.uid) {
            Ok(recorded) => {
                if let Some(balance) = recorded.balance {
                    self.profile.gems = balance;
                }
                self.recorded = Some(recorded);
                self.state = AppState::Summary;
            }
            Err(err) => {
                error!(error = %err, "finished attempt has no summary");
                self.notice = Some(err.to_string());
                self.state = AppState::Sets;
            }
        }
    }

    fn back(&mut self) {
        match self.state {
            AppState::Subjects => {}
            AppState::Modes => {
                self.state = AppState::Subjects;
                self.selected = 0;
            }
            AppState::Sets => {
                self.state = AppState::Modes;
                self.selected = 0;
            }
            AppState::Session => {
                if let Some(attempt) = self.attempt.take() {
                    info!(
                        answered = attempt.session().cursor(),
                        total = attempt.session().words().len(),
                        "attempt abandoned"
                    );
                }
                self.state = AppState::Sets;
                self.selected = self.set_id;
            }
            AppState::Summary => {
                self.state = AppState::Sets;
                self.selected = self.set_id;
            }
        }
    }
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let config = FileConfigStore::new().load().with_overrides(
        cli.words.clone(),
        cli.db.clone(),
        cli.log_level.clone(),
    );
    let _log_guard = logging::init_tracing(&config.log_level);

    let store = match &config.db_path {
        Some(path) => SqliteProfileStore::open(path)?,
        None => SqliteProfileStore::open_default()?,
    };
    let words_source = config.words_source.as_deref();

    match cli.command {
        Command::Signup {
            name,
            grade,
            email,
            password,
        } => {
            let form = SignupForm {
                name,
                grade,
                email,
                password,
            };
            let profile = Accounts::new(&store).signup(&form)?;
            println!(
                "Welcome, {}! Your account starts with {} gems.",
                profile.name, profile.gems
            );
        }
        Command::Play(credentials) => play(&store, &credentials, words_source)?,
        Command::Claim(credentials) => claim(&store, &credentials)?,
        Command::Words { grade } => list_words(&WordCatalog::load(words_source)?, grade),
        Command::Admin { credentials, view } => {
            Accounts::new(&store).login_admin(&credentials.email, &credentials.password)?;
            show_admin_view(&store, &view)?;
        }
        Command::GrantAdmin { email } => {
            if store.find_by_email(email.trim())?.is_none() {
                return Err(AuthError::UserNotFound.into());
            }
            store.grant_admin(email.trim())?;
            println!("{} can now open the admin dashboard.", email.trim());
        }
    }

    Ok(())
}

fn play<S: ProfileStore>(
    store: &S,
    credentials: &Credentials,
    words_source: Option<&str>,
) -> Result<(), Box<dyn Error>> {
    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let profile = Accounts::new(store).login_student(&credentials.email, &credentials.password)?;
    let catalog = WordCatalog::load(words_source)?;

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(profile, catalog, Instant::now());
    let outcome = start_tui(&mut terminal, &mut app, store);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    outcome
}

fn start_tui<B: Backend, S: ProfileStore>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    store: &S,
) -> Result<(), Box<dyn Error>> {
    let runner = Runner::new(
        CrosstermEventSource::new(),
        FixedTicker::new(Duration::from_millis(TICK_RATE_MS)),
    );

    terminal.draw(|f| ui(app, f))?;

    loop {
        let redraw = match runner.step() {
            AppEvent::Tick => app.on_tick(store, Instant::now()),
            AppEvent::Resize => true,
            AppEvent::Key(key) => {
                if app.on_key(key, store, Instant::now()) == Flow::Quit {
                    break;
                }
                true
            }
        };

        if redraw {
            terminal.draw(|f| ui(app, f))?;
        }
    }

    Ok(())
}

fn ui(app: &App, f: &mut Frame) {
    f.render_widget(app, f.area());
}

fn claim<S: ProfileStore>(store: &S, credentials: &Credentials) -> Result<(), Box<dyn Error>> {
    let profile = Accounts::new(store).login_student(&credentials.email, &credentials.password)?;

    store.claim_reward(profile.uid)?;
    println!("🎉 Reward claimed! Your gem balance is now 0.");
    Ok(())
}

fn list_words(catalog: &WordCatalog, grade: Option<u32>) {
    for g in catalog.grades() {
        if grade.is_some_and(|wanted| wanted != g) {
            continue;
        }
        println!("Grade {g}");
        for subject in catalog.subjects_for(g) {
            let words = catalog.words_in(g, &subject).len();
            let sets = catalog.set_count(g, &subject);
            println!(
                "  {subject}: {words} words in {sets} set{}",
                if sets == 1 { "" } else { "s" }
            );
        }
    }
}

fn show_admin_view<S: ProfileStore>(store: &S, view: &AdminView) -> Result<(), Box<dyn Error>> {
    match view {
        AdminView::Stats => println!("{}", DashboardStats::collect(store)?),
        AdminView::Students { search } => {
            let students = store.students()?;
            let shown = admin::filter_students(&students, search.as_deref().unwrap_or(""));
            if shown.is_empty() {
                println!("No students found");
            }
            for student in shown {
                println!("{}", admin::format_student(student));
            }
        }
        AdminView::Logs { uid } => {
            let profile = store.profile(*uid)?;
            println!("{} <{}>  grade {}", profile.name, profile.email, profile.grade);

            let logins = store.login_history(*uid)?;
            let attempts = store.test_logs(*uid)?;
            if logins.is_empty() && attempts.is_empty() {
                println!("No activity found");
            }
            for log in attempts.iter().rev() {
                admin::format_attempt(log)
                    .iter()
                    .for_each(|line| println!("{line}"));
            }
            for login in logins.iter().rev() {
                println!("{}", admin::format_login(login));
            }
        }
    }
    Ok(())
}
