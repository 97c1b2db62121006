use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use crossterm::event::{self, Event as CtEvent, KeyEvent, KeyEventKind};

/// Everything the menu/session loop reacts to.
#[derive(Clone, Debug)]
pub enum AppEvent {
    Key(KeyEvent),
    Resize,
    Tick,
}

/// Where key presses and resizes come from; swapped for a channel in tests.
pub trait EventSource: Send + 'static {
    /// Waits at most `timeout`; `Err(Timeout)` when nothing arrived.
    fn recv_timeout(&self, timeout: Duration) -> Result<AppEvent, RecvTimeoutError>;
}

/// Reads the real terminal on a background thread.
pub struct CrosstermEventSource {
    rx: Receiver<AppEvent>,
}

impl CrosstermEventSource {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();

        std::thread::spawn(move || loop {
            let ev = match event::read() {
                // Windows reports releases too
                Ok(CtEvent::Key(key)) if key.kind != KeyEventKind::Release => AppEvent::Key(key),
                Ok(CtEvent::Resize(_, _)) => AppEvent::Resize,
                Ok(_) => continue,
                Err(_) => break,
            };
            if tx.send(ev).is_err() {
                break;
            }
        });

        Self { rx }
    }
}

impl Default for CrosstermEventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSource for CrosstermEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<AppEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

pub trait Ticker: Send + Sync + 'static {
    fn interval(&self) -> Duration;
}

#[derive(Clone, Copy, Debug)]
pub struct FixedTicker {
    interval: Duration,
}

impl FixedTicker {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Ticker for FixedTicker {
    fn interval(&self) -> Duration {
        self.interval
    }
}

/// Replays whatever is pushed into the channel, for runs without a terminal.
pub struct TestEventSource {
    rx: Receiver<AppEvent>,
}

impl TestEventSource {
    pub fn new(rx: Receiver<AppEvent>) -> Self {
        Self { rx }
    }
}

impl EventSource for TestEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<AppEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Pulls one event per call and falls back to `Tick` so the countdown keeps moving.
pub struct Runner<E: EventSource, T: Ticker> {
    event_source: E,
    ticker: T,
}

impl<E: EventSource, T: Ticker> Runner<E, T> {
    pub fn new(event_source: E, ticker: T) -> Self {
        Self {
            event_source,
            ticker,
        }
    }

    /// A hung-up source also reads as `Tick`.
    pub fn step(&self) -> AppEvent {
        match self.event_source.recv_timeout(self.ticker.interval()) {
            Ok(ev) => ev,
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => AppEvent::Tick,
        }
    }
}

/// Converts wall-clock time into whole elapsed seconds.
///
/// Runner ticks arrive late whenever key events are pending, so the session
/// timer is driven from this instead of counting ticks.
#[derive(Clone, Copy, Debug)]
pub struct Countdown {
    last: Instant,
}

impl Countdown {
    pub fn new(now: Instant) -> Self {
        Self { last: now }
    }

    /// Whole seconds elapsed since the previous poll. The fractional remainder
    /// carries over to the next call.
    pub fn poll(&mut self, now: Instant) -> u32 {
        let secs = now.saturating_duration_since(self.last).as_secs();
        self.last += Duration::from_secs(secs);
        secs as u32
    }

    pub fn reset(&mut self, now: Instant) {
        self.last = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn step_returns_tick_on_timeout() {
        let (_tx, rx) = mpsc::channel();
        let es = TestEventSource::new(rx);
        let ticker = FixedTicker::new(Duration::from_millis(1));
        let runner = Runner::new(es, ticker);

        match runner.step() {
            AppEvent::Tick => {}
            _ => panic!("expected Tick on timeout"),
        }
    }

    #[test]
    fn step_passes_through_events() {
        let (tx, rx) = mpsc::channel();
        tx.send(AppEvent::Resize).unwrap();
        let es = TestEventSource::new(rx);
        let ticker = FixedTicker::new(Duration::from_millis(10));
        let runner = Runner::new(es, ticker);

        match runner.step() {
            AppEvent::Resize => {}
            _ => panic!("expected Resize event"),
        }
    }

    #[test]
    fn countdown_reports_whole_seconds() {
        let start = Instant::now();
        let mut countdown = Countdown::new(start);

        assert_eq!(countdown.poll(start + Duration::from_millis(400)), 0);
        assert_eq!(countdown.poll(start + Duration::from_millis(1_500)), 1);
        // 500ms left over from the previous poll
        assert_eq!(countdown.poll(start + Duration::from_millis(2_000)), 1);
        assert_eq!(countdown.poll(start + Duration::from_millis(5_100)), 3);
    }

    #[test]
    fn countdown_reset_drops_partial_second() {
        let start = Instant::now();
        let mut countdown = Countdown::new(start);

        countdown.reset(start + Duration::from_millis(900));
        assert_eq!(countdown.poll(start + Duration::from_millis(1_500)), 0);
        assert_eq!(countdown.poll(start + Duration::from_millis(1_900)), 1);
    }

    #[test]
    fn countdown_ignores_earlier_instants() {
        let start = Instant::now() + Duration::from_secs(10);
        let mut countdown = Countdown::new(start);
        assert_eq!(countdown.poll(start - Duration::from_secs(3)), 0);
    }
}
