use clap::Parser;
use color_eyre::Result;
use crossterm::{
    cursor, execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use std::{fs::OpenOptions, io, sync::Mutex};
use tickmon::{
    App, Sampler,
    counters::{ProcFs, SysinfoMemory},
    input::CrosstermInput,
};
use tracing::info;

mod cli;

// raw mode and the alternate screen, until dropped.
struct TerminalSession;

impl TerminalSession {
    fn enter() -> io::Result<Self> {
        enable_raw_mode()?;
        // from here on, drop undoes whatever was set up.
        let session = Self;
        execute!(io::stdout(), EnterAlternateScreen, cursor::Hide)?;
        Ok(session)
    }

    fn restore() {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen, cursor::Show);
    }
}

impl Drop for TerminalSession {
    fn drop(&mut self) {
        Self::restore();
    }
}

fn main() -> Result<()> {
    color_eyre::install()?;
    // put the terminal back before a panic message is printed.
    let hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        TerminalSession::restore();
        hook(info);
    }));

    let args = cli::Args::parse();
    setup_logging(&args)?;

    let procfs = ProcFs::new(&args.proc_root);
    let sampler = Sampler::new(procfs.clone(), procfs, SysinfoMemory::default());
    let mut app = App::new(sampler, args.settings());
    let mut input = CrosstermInput::new();

    let res = {
        let _session = TerminalSession::enter()?;
        let mut terminal = Terminal::new(CrosstermBackend::new(io::stdout()))?;
        tickmon::run(&mut terminal, &mut app, &mut input)
    };
    res?;

    info!("tickmon stopped");
    Ok(())
}

// the terminal belongs to the ui, so logs only ever go to --log-file.
fn setup_logging(args: &cli::Args) -> Result<()> {
    let (Some(path), Some(level)) = (&args.log_file, args.log_level.as_level()) else {
        return Ok(());
    };

    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!(
        log_level = ?args.log_level,
        proc_root = %args.proc_root.display(),
        "logging initialized"
    );
    Ok(())
}
