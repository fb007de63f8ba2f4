//! Interactive browser for running processes, their loaded modules and the
//! memory-permission bits of each module's base page.

use std::io::{self, Write};
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use procscope::report;
use procscope::service::{
    ModuleInfo, ModuleInfoSession, ProcessInfo, ProcessInfoSession, ProcessList,
};
use procscope::state::{Config, LoopState, ModuleDisplayMode, Pressed, Transition};

/// How long one frame waits for input before redrawing.
const FRAME: Duration = Duration::from_millis(33);

#[derive(Parser, Debug)]
#[clap(version, about)]
struct Args {
    /// Print the process list once and exit.
    #[clap(long)]
    list: bool,

    /// Print a one-shot module report for this process id and exit.
    #[clap(long, conflicts_with = "list")]
    pid: Option<u64>,

    /// Maximum number of process ids to store.
    #[clap(long, default_value_t = 64)]
    process_capacity: u32,

    /// Maximum number of module records to store per report.
    #[clap(long, default_value_t = 16)]
    module_capacity: u32,

    /// Make the module-detail key a toggle instead of a one-way latch.
    #[clap(long)]
    toggle_modules: bool,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    match run(&args) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> io::Result<ExitCode> {
    let config = Config {
        process_capacity: args.process_capacity,
        module_capacity: args.module_capacity,
        module_display: if args.toggle_modules {
            ModuleDisplayMode::Toggle
        } else {
            ModuleDisplayMode::Latch
        },
    };

    // Best-effort startup: a failed session is reported and the program keeps
    // running with that service degraded.
    let mut process_info = match ProcessInfoSession::initialize() {
        Ok(session) => Some(session),
        Err(err) => {
            println!(
                "Process info service failed to initialize: {err} (code {})",
                err.code()
            );
            None
        }
    };
    let mut module_info = match ModuleInfoSession::initialize() {
        Ok(session) => Some(session),
        Err(err) => {
            println!(
                "Module info service failed to initialize: {err} (code {})",
                err.code()
            );
            None
        }
    };
    log::debug!(
        "sessions ready: process_info={}, module_info={}",
        process_info.is_some(),
        module_info.is_some()
    );

    if args.list {
        return one_shot_list(&mut process_info, &config);
    }
    if let Some(pid) = args.pid {
        return one_shot_report(&mut process_info, &mut module_info, pid, &config);
    }
    interactive(&mut process_info, &mut module_info, &config)
}

fn one_shot_list(
    process_info: &mut Option<ProcessInfoSession>,
    config: &Config,
) -> io::Result<ExitCode> {
    match process_info.list_processes(config.process_capacity) {
        Ok(processes) => {
            let stdout = io::stdout();
            report::print_process_list(&processes, &mut stdout.lock())?;
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            eprintln!("Failed to list processes: {err} (code {})", err.code());
            Ok(ExitCode::FAILURE)
        }
    }
}

fn one_shot_report(
    process_info: &mut Option<ProcessInfoSession>,
    module_info: &mut Option<ModuleInfoSession>,
    pid: u64,
    config: &Config,
) -> io::Result<ExitCode> {
    let stdout = io::stdout();
    let mut out = stdout.lock();

    // Probe the title lookup first so scripted callers get a failing exit
    // code for an unusable pid.
    if let Err(err) = process_info.title_id(pid) {
        writeln!(
            out,
            "Failed to get the title id of process {pid}: {err} (code {})",
            err.code()
        )?;
        return Ok(ExitCode::FAILURE);
    }

    let processes = ProcessList::new(vec![pid], 1);
    let mut state = LoopState {
        show_modules: true,
        ..LoopState::new()
    };
    report::refresh(
        &processes,
        &mut state,
        process_info,
        module_info,
        config.module_capacity,
        &mut out,
    )?;
    Ok(ExitCode::SUCCESS)
}

fn interactive(
    process_info: &mut Option<ProcessInfoSession>,
    module_info: &mut Option<ModuleInfoSession>,
    config: &Config,
) -> io::Result<ExitCode> {
    // Lines are rendered into this buffer and flushed once per frame.
    let mut buf: Vec<u8> = Vec::new();

    let processes = match process_info.list_processes(config.process_capacity) {
        Ok(processes) => {
            writeln!(buf, "Got {} processes.", processes.stored())?;
            if processes.is_truncated() {
                writeln!(
                    buf,
                    "Process count {} exceeds the capacity of {}, extra processes are not shown.",
                    processes.total(),
                    processes.stored()
                )?;
            }
            processes
        }
        Err(err) => {
            writeln!(buf, "Failed to list processes: {err} (code {})", err.code())?;
            ProcessList::default()
        }
    };
    writeln!(buf, "Press q or Escape to exit.")?;
    writeln!(buf, "Use the Up and Down arrows to scroll through the process ids.")?;
    writeln!(buf, "Press x to dump the modules of the selected process.")?;

    let _raw = RawModeGuard::enable()?;
    let stdout = io::stdout();
    let mut state = LoopState::new();

    flush_frame(&mut stdout.lock(), &mut buf)?;
    loop {
        let pressed = poll_pressed(FRAME)?;
        match state.step(pressed, config) {
            Transition::Exit => break,
            Transition::Continue(next) => state = next,
        }
        report::refresh(
            &processes,
            &mut state,
            process_info,
            module_info,
            config.module_capacity,
            &mut buf,
        )?;
        flush_frame(&mut stdout.lock(), &mut buf)?;
    }

    Ok(ExitCode::SUCCESS)
}

/// Collect the set of logical keys newly pressed during this frame.
///
/// Waits up to `timeout` for the first event, then drains whatever else is
/// already queued so one frame sees the whole pressed set. Only key-down
/// transitions count, matching the edge-triggered input of the loop.
fn poll_pressed(timeout: Duration) -> io::Result<Pressed> {
    let mut pressed = Pressed::default();
    if !event::poll(timeout)? {
        return Ok(pressed);
    }

    loop {
        if let Event::Key(key) = event::read()? {
            if key.kind == KeyEventKind::Press {
                match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => pressed.exit = true,
                    KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                        pressed.exit = true;
                    }
                    KeyCode::Up => pressed.up = true,
                    KeyCode::Down => pressed.down = true,
                    KeyCode::Char('x') => pressed.action = true,
                    _ => (),
                }
            }
        }
        if !event::poll(Duration::ZERO)? {
            return Ok(pressed);
        }
    }
}

fn flush_frame(out: &mut impl Write, buf: &mut Vec<u8>) -> io::Result<()> {
    if buf.is_empty() {
        return Ok(());
    }
    // Raw mode turns off output post-processing, so LF must become CRLF by
    // hand.
    let text = String::from_utf8_lossy(buf).replace('\n', "\r\n");
    out.write_all(text.as_bytes())?;
    out.flush()?;
    buf.clear();
    Ok(())
}

/// Keeps the terminal in raw mode, restoring it on every exit path.
struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if let Err(err) = terminal::disable_raw_mode() {
            log::debug!("failed to restore the terminal: {err}");
        }
    }
}
