use crate::counters::{
    CounterUnavailable, HostSource, MemorySource, ProcessSource, enumerate_processes,
};
use crate::input::{InputSource, Key};
use crate::rate::{Percent, RateEngine, memory_utilization};
use crate::reconcile::{ProcessEntry, reconcile};
use crate::ui;
use crate::view::{Metric, Selection, rank};
use color_eyre::Result;
use ratatui::{Terminal, backend::Backend};
use std::time::Duration;
use tracing::{debug, info, warn};

pub const MIN_TICK_MS: u64 = 100;
pub const MAX_TICK_MS: u64 = 5000;
pub const TICK_STEP_MS: u64 = 100;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum View {
    Host,
    #[default]
    Processes,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum State {
    Running,
    Exiting,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Settings {
    pub view: View,
    // overrides each view's own interval.
    pub interval: Option<Duration>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot {
    pub cpu: Percent,
    pub memory: Option<Percent>,
    pub total_ticks: u64,
    // in enumeration order.
    pub processes: Vec<ProcessEntry>,
}

pub struct Sampler<H, P, M> {
    host: H,
    processes: P,
    memory: M,
    engine: RateEngine,
}

#[derive(Clone, Debug)]
pub struct Model {
    pub view: View,
    pub metric: Metric,
    pub selection: Selection,
    pub interval: Duration,
    // set once the interval was chosen by hand; view changes then leave it alone.
    interval_pinned: bool,
    pub cpu: Percent,
    pub memory: Percent,
    pub total_ticks: u64,
    // ranked by `metric`.
    pub processes: Vec<ProcessEntry>,
    // rows in the last drawn page of the process table.
    pub page_size: usize,
    pub skipped_ticks: u64,
}

pub struct App<H, P, M> {
    sampler: Sampler<H, P, M>,
    model: Model,
    state: State,
}

pub fn run<B, I, H, P, M>(
    terminal: &mut Terminal<B>,
    app: &mut App<H, P, M>,
    input: &mut I,
) -> Result<()>
where
    B: Backend,
    B::Error: std::error::Error + Send + Sync + 'static,
    I: InputSource,
    H: HostSource,
    P: ProcessSource,
    M: MemorySource,
{
    info!(view = ?app.model.view, interval = ?app.model.interval, "starting refresh loop");

    loop {
        let key = input.poll_key()?;
        if app.tick(key) == State::Exiting {
            info!("exiting refresh loop");
            return Ok(());
        }

        terminal.draw(|f| ui::draw(f, &mut app.model))?;
        input.wait(app.model.interval)?;
    }
}

impl View {
    pub fn interval(self) -> Duration {
        match self {
            Self::Host => Duration::from_millis(500),
            Self::Processes => Duration::from_millis(200),
        }
    }

    pub fn toggle(self) -> Self {
        match self {
            Self::Host => Self::Processes,
            Self::Processes => Self::Host,
        }
    }
}

impl<H, P, M> Sampler<H, P, M>
where
    H: HostSource,
    P: ProcessSource,
    M: MemorySource,
{
    pub fn new(host: H, processes: P, memory: M) -> Self {
        Self {
            host,
            processes,
            memory,
            engine: RateEngine::new(),
        }
    }

    pub fn engine(&self) -> &RateEngine {
        &self.engine
    }

    /// Reads every source, then advances the rate engine. Both cpu sources are read before
    /// anything is reconciled, so a failed tick leaves every baseline where it was.
    pub fn sample(&mut self) -> Result<Snapshot, CounterUnavailable> {
        let counters = self.host.read_host_counters()?;
        let samples = enumerate_processes(&self.processes)?;

        let host = self.engine.compute_host_utilization(counters);
        let processes = reconcile(samples, &mut self.engine, host.total_delta);
        let memory = self.memory.read_memory().map(memory_utilization);

        Ok(Snapshot {
            cpu: host.percent,
            memory,
            total_ticks: counters.total_ticks,
            processes,
        })
    }
}

impl Model {
    pub(crate) fn new(settings: Settings) -> Self {
        Self {
            view: settings.view,
            metric: Metric::default(),
            selection: Selection::default(),
            interval: settings
                .interval
                .map_or_else(|| settings.view.interval(), clamp_interval),
            interval_pinned: settings.interval.is_some(),
            cpu: Percent::ZERO,
            memory: Percent::ZERO,
            total_ticks: 0,
            processes: Vec::new(),
            page_size: 1,
            skipped_ticks: 0,
        }
    }

    fn absorb(&mut self, snapshot: Snapshot) {
        self.cpu = snapshot.cpu;
        if let Some(memory) = snapshot.memory {
            self.memory = memory;
        }
        self.total_ticks = snapshot.total_ticks;
        self.rebuild_process_rows(snapshot.processes);
    }

    fn set_metric(&mut self, metric: Metric) {
        self.metric = metric;
        self.rebuild_process_rows(self.processes.clone());
    }

    // ranks `processes` and keeps the highlight on the same pid when it is still there.
    fn rebuild_process_rows(&mut self, processes: Vec<ProcessEntry>) {
        let selected_pid = self
            .processes
            .get(self.selection.index())
            .map(|e| e.sample.pid);

        self.processes = rank(processes, self.metric);
        self.selection.clamp(self.processes.len());

        if let Some(pid) = selected_pid {
            if let Some(idx) = self.processes.iter().position(|e| e.sample.pid == pid) {
                self.selection.select(idx);
            }
        }
    }

    fn speed_up_refresh(&mut self) {
        let ms = self.interval.as_millis() as u64;
        let next = ms.saturating_sub(TICK_STEP_MS).max(MIN_TICK_MS);
        self.interval = Duration::from_millis(next);
        self.interval_pinned = true;
    }

    fn slow_down_refresh(&mut self) {
        let ms = self.interval.as_millis() as u64;
        let next = (ms + TICK_STEP_MS).min(MAX_TICK_MS);
        self.interval = Duration::from_millis(next);
        self.interval_pinned = true;
    }

    fn toggle_view(&mut self) {
        self.view = self.view.toggle();
        if !self.interval_pinned {
            self.interval = self.view.interval();
        }
        info!(view = ?self.view, interval = ?self.interval, "switched view");
    }
}

impl<H, P, M> App<H, P, M>
where
    H: HostSource,
    P: ProcessSource,
    M: MemorySource,
{
    pub fn new(sampler: Sampler<H, P, M>, settings: Settings) -> Self {
        Self {
            sampler,
            model: Model::new(settings),
            state: State::Running,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn sampler(&self) -> &Sampler<H, P, M> {
        &self.sampler
    }

    // a failed sample keeps the previous values on screen.
    pub fn tick(&mut self, key: Option<Key>) -> State {
        if let Some(key) = key {
            self.apply_key(key);
        }
        if self.state == State::Exiting {
            return self.state;
        }

        match self.sampler.sample() {
            Ok(snapshot) => self.model.absorb(snapshot),
            Err(error) => {
                self.model.skipped_ticks += 1;
                warn!(%error, skipped = self.model.skipped_ticks, "skipping tick");
            }
        }
        self.model.selection.clamp(self.model.processes.len());

        self.state
    }

    fn apply_key(&mut self, key: Key) {
        debug!(?key, "key");
        let page = self.model.page_size;
        let selection = &mut self.model.selection;

        match key {
            Key::Quit => self.state = State::Exiting,
            Key::Up => selection.up(),
            Key::Down => selection.down(),
            Key::PageUp => selection.page_up(page),
            Key::PageDown => selection.page_down(page),
            Key::Home => selection.top(),
            Key::End => selection.bottom(),
            Key::ToggleView => self.model.toggle_view(),
            Key::SortBy(metric) => self.model.set_metric(metric),
            Key::CycleSort => self.model.set_metric(self.model.metric.next()),
            Key::Faster => self.model.speed_up_refresh(),
            Key::Slower => self.model.slow_down_refresh(),
        }
    }
}

fn clamp_interval(interval: Duration) -> Duration {
    let ms = interval.as_millis() as u64;
    Duration::from_millis(ms.clamp(MIN_TICK_MS, MAX_TICK_MS))
}
