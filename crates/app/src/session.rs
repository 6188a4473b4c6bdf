use std::cell::RefCell;
use std::io::BufRead;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::{mpsc, Arc};
use std::time::{Duration, Instant};

use pulsedeck_core::{
    scan_folder, AppConfig, BeatEngine, CalloutAction, CalloutLibrary, CalloutSelector,
    EngineEvent, EventBus, PatternCatalog, Result, SessionEvent, SessionStats, SettingsEditor,
    Slideshow,
};
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Longest the loop will sleep between wakeups, so a freshly armed timer is
/// never missed by more than this.
const MAX_WAIT: Duration = Duration::from_millis(200);

/// Manual navigation command typed on standard input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Next,
    Prev,
    Quit,
}

fn parse_command(line: &str) -> Option<Command> {
    match line.trim() {
        "n" | "next" => Some(Command::Next),
        "p" | "prev" => Some(Command::Prev),
        "q" | "quit" => Some(Command::Quit),
        _ => None,
    }
}

/// Reads commands off standard input on a dedicated thread so the timer
/// loop never blocks on input. The thread exits when stdin closes or the
/// session drops the receiving end.
fn spawn_input_reader() -> mpsc::Receiver<Command> {
    let (sender, receiver) = mpsc::channel();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if let Some(command) = parse_command(&line) {
                if sender.send(command).is_err() {
                    break;
                }
            }
        }
    });
    receiver
}

#[derive(Debug)]
pub struct SessionOptions {
    pub folder: Option<PathBuf>,
    pub duration_secs: Option<u64>,
    pub seed: Option<u64>,
    pub config_path: PathBuf,
    pub callout_dir: PathBuf,
}

/// Runs one session end to end: wires the engine, slideshow, statistics,
/// and callouts together, drives the cooperative timer loop, and prints the
/// final statistics report.
pub fn run(options: SessionOptions) -> Result<()> {
    let config = AppConfig::load(&options.config_path)?;
    let catalog = Arc::new(PatternCatalog::builtin());

    let mut engine = match options.seed {
        Some(seed) => BeatEngine::with_rng(
            catalog.clone(),
            config.engine.clone(),
            StdRng::seed_from_u64(seed),
        ),
        None => BeatEngine::new(catalog.clone(), config.engine.clone()),
    };
    SettingsEditor::apply(&config, &mut engine)?;

    let mut slideshow = match options.seed {
        Some(seed) => Slideshow::with_rng(
            config.slideshow.clone(),
            StdRng::seed_from_u64(seed.wrapping_add(1)),
        ),
        None => Slideshow::new(config.slideshow.clone()),
    };
    if let Some(folder) = &options.folder {
        let files = scan_folder(folder)?;
        if files.is_empty() {
            tracing::warn!(?folder, "no supported media found");
        } else {
            tracing::info!(count = files.len(), "loaded media playlist");
            slideshow.load(files);
        }
    }

    let library = CalloutLibrary::load_dir(&options.callout_dir);
    if library.is_empty() {
        tracing::info!("no callout data available, callouts disabled");
    }
    let selector = match options.seed {
        Some(seed) => CalloutSelector::with_rng(
            library,
            config.callout.clone(),
            StdRng::seed_from_u64(seed.wrapping_add(2)),
        ),
        None => CalloutSelector::new(library, config.callout.clone()),
    };
    let callouts = Rc::new(RefCell::new(selector));
    let stats = Rc::new(RefCell::new(SessionStats::new()));

    let mut bus = EventBus::new();
    {
        let stats = stats.clone();
        bus.subscribe(move |now, event| stats.borrow_mut().handle(now, event));
    }
    {
        let callouts = callouts.clone();
        bus.subscribe(move |now, event| {
            if let Some(CalloutAction::Show(line)) = callouts.borrow_mut().handle(now, event) {
                println!("  \u{201c}{line}\u{201d}");
            }
        });
    }

    let epoch = Instant::now();
    let end_at = options.duration_secs.map(Duration::from_secs);

    bus.publish(Duration::ZERO, &SessionEvent::SessionStarted);
    let mut meter_down = false;
    for event in engine.start(Duration::ZERO)? {
        dispatch(&event, Duration::ZERO, &mut bus, &mut meter_down, config.beat_loudness);
    }
    slideshow.start(Duration::ZERO);
    if let Some(path) = slideshow.current() {
        println!("[media] {}", path.display());
    }

    let commands = spawn_input_reader();
    println!("controls: n = next, p = previous, q = quit");

    'session: loop {
        let now = epoch.elapsed();
        if end_at.is_some_and(|end| now >= end) {
            break;
        }

        for command in commands.try_iter() {
            match command {
                Command::Next => {
                    if let Some(path) = slideshow.next(now) {
                        println!("[media] {}", path.display());
                        bus.publish(now, &SessionEvent::MediaSkipped);
                    }
                }
                Command::Prev => {
                    if let Some(path) = slideshow.prev(now) {
                        println!("[media] {}", path.display());
                        bus.publish(now, &SessionEvent::MediaRepeated);
                    }
                }
                Command::Quit => break 'session,
            }
        }

        for event in engine.advance(now)? {
            dispatch(&event, now, &mut bus, &mut meter_down, config.beat_loudness);
        }
        if let Some(path) = slideshow.tick(now) {
            println!("[media] {}", path.display());
        }
        if callouts.borrow_mut().tick(now) == Some(CalloutAction::Hide) {
            println!("  (callout cleared)");
        }

        let now = epoch.elapsed();
        let next = [
            engine.next_deadline(),
            slideshow.next_deadline(),
            callouts.borrow().next_deadline(),
            end_at,
        ]
        .into_iter()
        .flatten()
        .min();
        let wait = next
            .map(|deadline| deadline.saturating_sub(now))
            .unwrap_or(MAX_WAIT)
            .min(MAX_WAIT);
        if !wait.is_zero() {
            std::thread::sleep(wait);
        }
    }

    let now = epoch.elapsed();
    engine.stop();
    slideshow.stop();
    bus.publish(now, &SessionEvent::SessionEnded);

    let report = stats.borrow_mut().finish(now);
    println!("{}", serde_json::to_string_pretty(&report).map_err(pulsedeck_core::PulsedeckError::from)?);
    Ok(())
}

/// Renders an engine event for the terminal and forwards its session-level
/// counterpart to the bus subscribers.
fn dispatch(
    event: &EngineEvent,
    now: Duration,
    bus: &mut EventBus,
    meter_down: &mut bool,
    loudness: f64,
) {
    match event {
        EngineEvent::Pulse => {
            *meter_down = !*meter_down;
            if loudness > 0.0 {
                // Terminal bell stands in for the click sample.
                print!("\u{7}");
            }
            println!("[beat] {}", if *meter_down { "DOWN" } else { "UP" });
        }
        EngineEvent::BeatChanged {
            old_frequency,
            new_frequency,
            pattern,
        } => {
            tracing::info!(
                old = %format!("{old_frequency:.2}Hz"),
                new = %format!("{new_frequency:.2}Hz"),
                pattern = %pattern,
                "beat changed"
            );
        }
        EngineEvent::PauseStarted { seconds } => {
            println!("[pause] {seconds} seconds left");
        }
        EngineEvent::PauseTick { remaining } => {
            println!("[pause] {remaining} seconds left");
        }
        EngineEvent::PauseEnded => {
            println!("[pause] over");
        }
    }

    if let Some(session_event) = SessionEvent::from_engine(event) {
        bus.publish(now, &session_event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_navigation_commands() {
        assert_eq!(parse_command("n"), Some(Command::Next));
        assert_eq!(parse_command("next"), Some(Command::Next));
        assert_eq!(parse_command("  p  "), Some(Command::Prev));
        assert_eq!(parse_command("quit"), Some(Command::Quit));
        assert_eq!(parse_command(""), None);
        assert_eq!(parse_command("skip"), None);
    }
}
