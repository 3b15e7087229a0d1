use crate::view::Metric;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use std::{
    collections::VecDeque,
    io,
    time::{Duration, Instant},
};

const MAX_PENDING_KEYS: usize = 16;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Key {
    Up,
    Down,
    PageUp,
    PageDown,
    Home,
    End,
    Quit,
    ToggleView,
    SortBy(Metric),
    CycleSort,
    Faster,
    Slower,
}

pub trait InputSource {
    /// The next pending key, or `None` right away if there is none.
    fn poll_key(&mut self) -> io::Result<Option<Key>>;

    /// Sleeps for `timeout`, waking early only if quit was requested. Other keys stay pending.
    fn wait(&mut self, timeout: Duration) -> io::Result<()>;
}

// quit jumps the line. repeats of the last queued navigation key collapse into it.
#[derive(Debug, Default)]
pub struct KeyQueue {
    keys: VecDeque<Key>,
    quit: bool,
}

#[derive(Debug, Default)]
pub struct CrosstermInput {
    queue: KeyQueue,
}

impl Key {
    pub fn from_event(key: KeyEvent) -> Option<Self> {
        if key.kind != KeyEventKind::Press {
            return None;
        }

        let key = match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Self::Quit,
            KeyCode::Char('q') | KeyCode::Esc => Self::Quit,
            KeyCode::Up | KeyCode::Char('k') => Self::Up,
            KeyCode::Down | KeyCode::Char('j') => Self::Down,
            KeyCode::PageUp => Self::PageUp,
            KeyCode::PageDown => Self::PageDown,
            KeyCode::Home => Self::Home,
            KeyCode::End => Self::End,
            KeyCode::Tab => Self::ToggleView,
            KeyCode::Char('c') => Self::SortBy(Metric::Cpu),
            KeyCode::Char('m') => Self::SortBy(Metric::Memory),
            KeyCode::Char('s') => Self::CycleSort,
            KeyCode::Char('+') | KeyCode::Char('=') => Self::Faster,
            KeyCode::Char('-') | KeyCode::Char('_') => Self::Slower,
            _ => return None,
        };

        Some(key)
    }

    fn is_navigation(self) -> bool {
        matches!(self, Self::Up | Self::Down | Self::PageUp | Self::PageDown)
    }
}

impl KeyQueue {
    pub fn push(&mut self, key: Key) {
        if key == Key::Quit {
            self.quit = true;
            return;
        }
        if key.is_navigation() && self.keys.back() == Some(&key) {
            return;
        }
        if self.keys.len() >= MAX_PENDING_KEYS {
            return;
        }
        self.keys.push_back(key);
    }

    pub fn pop(&mut self) -> Option<Key> {
        if self.quit {
            self.quit = false;
            self.keys.clear();
            return Some(Key::Quit);
        }
        self.keys.pop_front()
    }

    pub fn quit_requested(&self) -> bool {
        self.quit
    }

    pub fn len(&self) -> usize {
        self.keys.len() + usize::from(self.quit)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CrosstermInput {
    pub fn new() -> Self {
        Self::default()
    }

    fn read_event(&mut self) -> io::Result<()> {
        if let Event::Key(key) = event::read()? {
            if let Some(key) = Key::from_event(key) {
                self.queue.push(key);
            }
        }
        Ok(())
    }
}

impl InputSource for CrosstermInput {
    fn poll_key(&mut self) -> io::Result<Option<Key>> {
        while event::poll(Duration::ZERO)? {
            self.read_event()?;
        }
        Ok(self.queue.pop())
    }

    fn wait(&mut self, timeout: Duration) -> io::Result<()> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.queue.quit_requested() {
                return Ok(());
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(());
            }
            if event::poll(remaining)? {
                self.read_event()?;
            }
        }
    }
}
