use clap::{Parser, ValueEnum};
use std::{path::PathBuf, time::Duration};
use tickmon::{Settings, View, counters::ProcFs};
use tracing::Level;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ViewArg {
    /// the process table
    Processes,
    /// cpu and memory meters
    Host,
}

#[derive(Parser, Debug)]
#[command(
    name = "tickmon",
    about = "A terminal cpu and memory monitor",
    long_about = "A terminal cpu and memory monitor.\n\n\
                  Samples host and per-process cpu time from procfs and shows them as \
                  meters or as a ranked process table. Press q to quit.",
    version
)]
pub struct Args {
    /// View shown at startup (tab switches)
    #[arg(long, value_enum, default_value = "processes")]
    pub view: ViewArg,

    /// Refresh interval in milliseconds [default: 200 for processes, 500 for host]
    #[arg(long, value_name = "MS")]
    pub interval_ms: Option<u64>,

    /// procfs mount point
    #[arg(long, default_value = ProcFs::DEFAULT_ROOT)]
    pub proc_root: PathBuf,

    /// Write logs to this file (nothing is logged without it)
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Log level
    #[arg(long, value_enum, default_value = "info")]
    pub log_level: LogLevel,
}

impl LogLevel {
    pub fn as_level(self) -> Option<Level> {
        match self {
            Self::Off => None,
            Self::Error => Some(Level::ERROR),
            Self::Warn => Some(Level::WARN),
            Self::Info => Some(Level::INFO),
            Self::Debug => Some(Level::DEBUG),
            Self::Trace => Some(Level::TRACE),
        }
    }
}

impl From<ViewArg> for View {
    fn from(view: ViewArg) -> Self {
        match view {
            ViewArg::Processes => Self::Processes,
            ViewArg::Host => Self::Host,
        }
    }
}

impl Args {
    pub fn settings(&self) -> Settings {
        Settings {
            view: self.view.into(),
            interval: self.interval_ms.map(Duration::from_millis),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_is_well_formed() {
        Args::command().debug_assert();
    }

    #[test]
    fn no_flags_means_process_table() {
        let args = Args::try_parse_from(["tickmon"]).unwrap();
        let settings = args.settings();
        assert_eq!(settings.view, View::Processes);
        assert_eq!(settings.interval, None);
        assert_eq!(args.proc_root, PathBuf::from("/proc"));
        assert!(args.log_file.is_none());
        assert_eq!(args.log_level.as_level(), Some(Level::INFO));
    }

    #[test]
    fn flags() {
        let args = Args::try_parse_from([
            "tickmon",
            "--view",
            "host",
            "--interval-ms",
            "750",
            "--proc-root",
            "/host/proc",
            "--log-level",
            "off",
        ])
        .unwrap();
        let settings = args.settings();
        assert_eq!(settings.view, View::Host);
        assert_eq!(settings.interval, Some(Duration::from_millis(750)));
        assert_eq!(args.proc_root, PathBuf::from("/host/proc"));
        assert_eq!(args.log_level.as_level(), None);
    }

    #[test]
    fn bad_view_is_rejected() {
        assert!(Args::try_parse_from(["tickmon", "--view", "disks"]).is_err());
    }
}
