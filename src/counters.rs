use std::{
    fmt, fs, io,
    num::ParseIntError,
    path::{Path, PathBuf},
};
use sysinfo::System;
use tracing::debug;

// the kernel recycles these.
pub type Pid = u32;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct HostCounterSample {
    // idle plus iowait.
    pub idle_ticks: u64,
    pub total_ticks: u64,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProcessSample {
    pub pid: Pid,
    pub name: String,
    pub cpu_ticks: u64,
    pub resident_bytes: u64,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProcessDetail {
    pub name: String,
    pub cpu_ticks: u64,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct MemorySnapshot {
    pub total_bytes: u64,
    pub available_bytes: u64,
}

pub trait HostSource {
    fn read_host_counters(&self) -> Result<HostCounterSample, CounterUnavailable>;
}

pub trait ProcessSource {
    fn list_process_ids(&self) -> io::Result<Vec<Pid>>;
    fn read_process_detail(&self, pid: Pid) -> Result<ProcessDetail, ProcessVanished>;
    fn read_process_memory(&self, pid: Pid) -> Result<u64, ProcessVanished>;
}

pub trait MemorySource {
    /// `None` when memory could not be read this time around.
    fn read_memory(&mut self) -> Option<MemorySnapshot>;
}

#[derive(Debug)]
pub enum CounterUnavailable {
    Io(io::Error),
    Parse(StatParseError),
}

// listed, then gone before it could be read.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ProcessVanished {
    pub pid: Pid,
}

#[derive(Debug, Eq, PartialEq)]
pub enum StatParseError {
    MissingCpuLine,
    TooFewFields { found: usize },
    InvalidTicks(ParseIntError),
    TickOverflow,
    MissingName,
}

#[derive(Clone, Debug)]
pub struct ProcFs {
    root: PathBuf,
}

pub struct SysinfoMemory {
    system: System,
}

/// Lists every process and reads its counters. Processes that exit mid-scan are left out.
pub fn enumerate_processes<P>(source: &P) -> Result<Vec<ProcessSample>, CounterUnavailable>
where
    P: ProcessSource + ?Sized,
{
    let pids = source.list_process_ids()?;
    let mut samples = Vec::with_capacity(pids.len());

    for pid in pids {
        let detail = match source.read_process_detail(pid) {
            Ok(detail) => detail,
            Err(ProcessVanished { pid }) => {
                debug!(pid, "process exited before its stat could be read");
                continue;
            }
        };
        let resident_bytes = match source.read_process_memory(pid) {
            Ok(bytes) => bytes,
            Err(ProcessVanished { pid }) => {
                debug!(pid, "process exited before its status could be read");
                continue;
            }
        };

        samples.push(ProcessSample {
            pid,
            name: detail.name,
            cpu_ticks: detail.cpu_ticks,
            resident_bytes,
        });
    }

    Ok(samples)
}

// guest time is already folded into user and nice, so only the first eight fields count.
pub fn parse_host_counters(stat: &str) -> Result<HostCounterSample, StatParseError> {
    let line = stat
        .lines()
        .find(|line| line.split_whitespace().next() == Some("cpu"))
        .ok_or(StatParseError::MissingCpuLine)?;

    let ticks = line
        .split_whitespace()
        .skip(1)
        .take(8)
        .map(str::parse::<u64>)
        .collect::<Result<Vec<_>, _>>()
        .map_err(StatParseError::InvalidTicks)?;

    if ticks.len() < 4 {
        return Err(StatParseError::TooFewFields { found: ticks.len() });
    }

    // older kernels omit the trailing fields.
    let field = |i: usize| ticks.get(i).copied().unwrap_or(0);
    let (idle, iowait) = (field(3), field(4));

    let idle_ticks = idle.checked_add(iowait).ok_or(StatParseError::TickOverflow)?;
    let total_ticks = ticks
        .iter()
        .try_fold(0u64, |sum, &t| sum.checked_add(t))
        .ok_or(StatParseError::TickOverflow)?;

    Ok(HostCounterSample {
        idle_ticks,
        total_ticks,
    })
}

// the name sits between the first `(` and the last `)`; it may contain both.
pub fn parse_process_stat(stat: &str) -> Result<ProcessDetail, StatParseError> {
    let (open, close) = match (stat.find('('), stat.rfind(')')) {
        (Some(open), Some(close)) if open < close => (open, close),
        _ => return Err(StatParseError::MissingName),
    };
    let name = stat[open + 1..close].to_owned();

    // the remainder starts at field 3, `state`. utime and stime are fields 14 and 15.
    let rest = stat[close + 1..].split_whitespace().collect::<Vec<_>>();
    let [utime, stime] = match rest.get(11..13) {
        Some(&[utime, stime]) => [utime, stime],
        _ => return Err(StatParseError::TooFewFields { found: rest.len() + 2 }),
    };

    let utime = utime.parse::<u64>().map_err(StatParseError::InvalidTicks)?;
    let stime = stime.parse::<u64>().map_err(StatParseError::InvalidTicks)?;
    let cpu_ticks = utime.checked_add(stime).ok_or(StatParseError::TickOverflow)?;

    Ok(ProcessDetail { name, cpu_ticks })
}

// kernel threads have no VmRSS line.
pub fn parse_resident_bytes(status: &str) -> u64 {
    status
        .lines()
        .find_map(|line| line.strip_prefix("VmRSS:"))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|kb| kb.parse::<u64>().ok())
        .map_or(0, |kb| kb.saturating_mul(1024))
}

impl ProcFs {
    pub const DEFAULT_ROOT: &'static str = "/proc";

    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn read_pid_file(&self, pid: Pid, file: &str) -> Result<String, ProcessVanished> {
        // any failure here means the process is gone, or going. ENOENT and ESRCH both show up.
        fs::read_to_string(self.root.join(pid.to_string()).join(file))
            .map_err(|_| ProcessVanished { pid })
    }
}

impl Default for ProcFs {
    fn default() -> Self {
        Self::new(Self::DEFAULT_ROOT)
    }
}

impl HostSource for ProcFs {
    fn read_host_counters(&self) -> Result<HostCounterSample, CounterUnavailable> {
        let stat = fs::read_to_string(self.root.join("stat"))?;
        parse_host_counters(&stat).map_err(CounterUnavailable::from)
    }
}

impl ProcessSource for ProcFs {
    fn list_process_ids(&self) -> io::Result<Vec<Pid>> {
        let pids = fs::read_dir(&self.root)?
            .flatten()
            .filter_map(|entry| {
                let name = entry.file_name();
                let name = name.to_str()?;
                if name.is_empty() || !name.bytes().all(|b| b.is_ascii_digit()) {
                    return None;
                }
                name.parse::<Pid>().ok()
            })
            .collect();

        Ok(pids)
    }

    fn read_process_detail(&self, pid: Pid) -> Result<ProcessDetail, ProcessVanished> {
        let stat = self.read_pid_file(pid, "stat")?;
        parse_process_stat(&stat).map_err(|error| {
            // a truncated read is what an exiting process looks like.
            debug!(pid, %error, "unparseable process stat");
            ProcessVanished { pid }
        })
    }

    fn read_process_memory(&self, pid: Pid) -> Result<u64, ProcessVanished> {
        self.read_pid_file(pid, "status")
            .map(|status| parse_resident_bytes(&status))
    }
}

impl Default for SysinfoMemory {
    fn default() -> Self {
        Self {
            system: System::new(),
        }
    }
}

impl MemorySource for SysinfoMemory {
    fn read_memory(&mut self) -> Option<MemorySnapshot> {
        self.system.refresh_memory();
        let total_bytes = self.system.total_memory();
        if total_bytes == 0 {
            return None;
        }

        Some(MemorySnapshot {
            total_bytes,
            available_bytes: self.system.available_memory(),
        })
    }
}

impl std::error::Error for CounterUnavailable {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(io) => Some(io),
            Self::Parse(parse) => Some(parse),
        }
    }
}

impl fmt::Display for CounterUnavailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(io) => write!(f, "host counters unavailable: {io}"),
            Self::Parse(parse) => write!(f, "host counters unavailable: {parse}"),
        }
    }
}

impl From<io::Error> for CounterUnavailable {
    fn from(io: io::Error) -> Self {
        Self::Io(io)
    }
}

impl From<StatParseError> for CounterUnavailable {
    fn from(parse: StatParseError) -> Self {
        Self::Parse(parse)
    }
}

impl std::error::Error for ProcessVanished {}

impl fmt::Display for ProcessVanished {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "process {} vanished", self.pid)
    }
}

impl std::error::Error for StatParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidTicks(error) => Some(error),
            _ => None,
        }
    }
}

impl fmt::Display for StatParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingCpuLine => f.write_str("no aggregate cpu line"),
            Self::TooFewFields { found } => write!(f, "too few fields: {found}"),
            Self::InvalidTicks(error) => write!(f, "invalid tick count: {error}"),
            Self::TickOverflow => f.write_str("tick count overflows u64"),
            Self::MissingName => f.write_str("no parenthesized command name"),
        }
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use std::{cell::RefCell, collections::VecDeque};

    // `None` scripts an unreadable tick.
    #[derive(Default)]
    pub struct MockHost {
        samples: RefCell<VecDeque<Option<HostCounterSample>>>,
    }

    #[derive(Default)]
    pub struct MockProcesses {
        tables: RefCell<VecDeque<Vec<ProcessSample>>>,
        current: RefCell<Vec<ProcessSample>>,
        // listed, but gone by the time their detail is read.
        vanishing: Vec<Pid>,
    }

    #[derive(Default)]
    pub struct MockMemory {
        snapshots: VecDeque<Option<MemorySnapshot>>,
    }

    pub fn host(idle_ticks: u64, total_ticks: u64) -> HostCounterSample {
        HostCounterSample {
            idle_ticks,
            total_ticks,
        }
    }

    pub fn process(pid: Pid, cpu_ticks: u64) -> ProcessSample {
        ProcessSample {
            pid,
            name: format!("proc{pid}"),
            cpu_ticks,
            resident_bytes: u64::from(pid) * 1024,
        }
    }

    impl MockHost {
        pub fn new(samples: impl IntoIterator<Item = Option<HostCounterSample>>) -> Self {
            Self {
                samples: RefCell::new(samples.into_iter().collect()),
            }
        }
    }

    impl HostSource for MockHost {
        fn read_host_counters(&self) -> Result<HostCounterSample, CounterUnavailable> {
            self.samples
                .borrow_mut()
                .pop_front()
                .expect("mock host samples should not be empty")
                .ok_or_else(|| CounterUnavailable::Io(io::Error::other("scripted failure")))
        }
    }

    impl MockProcesses {
        pub fn new(tables: impl IntoIterator<Item = Vec<ProcessSample>>) -> Self {
            Self {
                tables: RefCell::new(tables.into_iter().collect()),
                ..Self::default()
            }
        }

        pub fn vanishing(self, vanishing: Vec<Pid>) -> Self {
            Self { vanishing, ..self }
        }
    }

    impl ProcessSource for MockProcesses {
        fn list_process_ids(&self) -> io::Result<Vec<Pid>> {
            let table = self
                .tables
                .borrow_mut()
                .pop_front()
                .expect("mock process tables should not be empty");
            let pids = table.iter().map(|p| p.pid).collect();
            self.current.replace(table);
            Ok(pids)
        }

        fn read_process_detail(&self, pid: Pid) -> Result<ProcessDetail, ProcessVanished> {
            if self.vanishing.contains(&pid) {
                return Err(ProcessVanished { pid });
            }
            self.current
                .borrow()
                .iter()
                .find(|p| p.pid == pid)
                .map(|p| ProcessDetail {
                    name: p.name.clone(),
                    cpu_ticks: p.cpu_ticks,
                })
                .ok_or(ProcessVanished { pid })
        }

        fn read_process_memory(&self, pid: Pid) -> Result<u64, ProcessVanished> {
            self.current
                .borrow()
                .iter()
                .find(|p| p.pid == pid)
                .map(|p| p.resident_bytes)
                .ok_or(ProcessVanished { pid })
        }
    }

    impl MockMemory {
        pub fn new(snapshots: impl IntoIterator<Item = Option<MemorySnapshot>>) -> Self {
            Self {
                snapshots: snapshots.into_iter().collect(),
            }
        }
    }

    impl MemorySource for MockMemory {
        fn read_memory(&mut self) -> Option<MemorySnapshot> {
            self.snapshots.pop_front().flatten()
        }
    }
}
