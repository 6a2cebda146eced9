/// Player: interactive terminal front end for the dialogue catalog.
///
/// Usage: player [--theme <id>] [--url <location>] [--config <file>]
///               [--catalog <file>] [--dwell-ms <n>] [--no-narration]
///               [--narrator <program>]
///
/// Commands (one per line on stdin):
///   <n> | <theme>  select a theme by number or name
///   r              replay the current theme
///   b              back to theme selection
///   s              share a link to the current theme
///   q              quit
use anyhow::{bail, Context, Result};
use clap::Parser;
use dialogue_player::core::catalog::ScriptCatalog;
use dialogue_player::core::config::{NarrationConfig, PlayerConfig};
use dialogue_player::core::link::{Clipboard, ClipboardError, Location, ShareControl};
use dialogue_player::core::narration::{CommandNarrator, Narrator};
use dialogue_player::core::scheduler::{Scheduler, TokioScheduler};
use dialogue_player::core::session::{Session, SessionBuilder};
use dialogue_player::core::stage::{self, Side, NARRATION_ADVISORY};
use dialogue_player::schema::dialogue::SpeakerId;
use dialogue_player::schema::theme::Color;
use std::io::Write;
use std::path::PathBuf;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, BufReader};

const BUBBLE_WIDTH: usize = 56;

/// Play themed fishsticks dialogues in the terminal
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Theme to start playing immediately
    #[arg(short, long)]
    theme: Option<String>,

    /// Starting location; a `theme` query parameter starts playback
    #[arg(long)]
    url: Option<String>,

    /// Player configuration file (RON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Extra catalog merged over the built-in themes
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Time each line stays on screen, in milliseconds
    #[arg(long)]
    dwell_ms: Option<u64>,

    /// Disable speech narration
    #[arg(long)]
    no_narration: bool,

    /// Speech program to use instead of auto-detection
    #[arg(long)]
    narrator: Option<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => PlayerConfig::load_from_ron(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => PlayerConfig::default(),
    };
    if let Some(ms) = cli.dwell_ms {
        config.dwell_ms = ms;
    }
    if cli.no_narration {
        config.narration.enabled = false;
    }
    if let Some(name) = &cli.narrator {
        config.narration.program = Some(name.clone());
    }
    config.validate()?;

    let mut catalog = ScriptCatalog::builtin()?;
    for path in config.catalog.iter().chain(cli.catalog.iter()) {
        let extra = ScriptCatalog::load_from_ron(path)
            .with_context(|| format!("failed to load catalog {}", path.display()))?;
        log::info!("player: merged {} themes from {}", extra.len(), path.display());
        catalog.merge(extra);
    }

    let mut location = cli.url.clone().unwrap_or_else(|| config.base_url.clone());
    if let Some(raw) = &cli.theme {
        let Some(theme) = catalog.resolve(raw).cloned() else {
            bail!("unknown theme {raw:?}");
        };
        location = Location::parse(&location).with_theme(&theme).to_string();
    }

    let narrator = build_narrator(&config.narration);
    let (scheduler, mut timers) = TokioScheduler::new();
    let mut session = SessionBuilder::new()
        .with_catalog(catalog)
        .location(&location)
        .dwell(config.dwell())
        .build(narrator, scheduler)?;

    let started = Instant::now();
    let mut share = ShareControl::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    render(&session, &share, 0);

    loop {
        tokio::select! {
            Some(token) = timers.recv() => {
                let before = session.frame_view();
                session.on_timer(token);
                if session.frame_view() != before {
                    render(&session, &share, elapsed_ms(started));
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if !handle_command(&mut session, &mut share, line.trim(), elapsed_ms(started)) {
                    break;
                }
                render(&session, &share, elapsed_ms(started));
            }
        }
    }

    Ok(())
}

fn build_narrator(config: &NarrationConfig) -> CommandNarrator {
    let settings = config.settings();
    if !config.enabled {
        return CommandNarrator::with_program(None, settings);
    }
    match &config.program {
        Some(name) => CommandNarrator::named(name, settings),
        None => CommandNarrator::detect(settings),
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

/// Returns false when the user asked to quit.
fn handle_command<N, S>(
    session: &mut Session<N, S>,
    share: &mut ShareControl,
    input: &str,
    now_ms: u64,
) -> bool
where
    N: Narrator + Clone,
    S: Scheduler + Clone,
{
    match input {
        "" => {}
        "q" | "quit" => return false,
        "r" | "replay" => {
            if !session.on_replay() {
                println!("Nothing to replay; pick a theme first.");
            }
        }
        "b" | "back" => session.on_back(),
        "s" | "share" => {
            share.share(&session.share_link(), &mut TerminalClipboard, now_ms);
        }
        other => select_theme(session, other),
    }
    true
}

fn select_theme<N, S>(session: &mut Session<N, S>, input: &str)
where
    N: Narrator + Clone,
    S: Scheduler + Clone,
{
    let ids = session.catalog().list_theme_ids();
    let theme = match input.parse::<usize>() {
        Ok(n) if (1..=ids.len()).contains(&n) => Some(ids[n - 1].clone()),
        Ok(_) => None,
        Err(_) => session.catalog().resolve(input).cloned(),
    };
    let Some(theme) = theme else {
        println!("Unknown theme {input:?}");
        return;
    };
    if let Err(e) = session.on_theme_selected(&theme) {
        eprintln!("ERROR: {e}");
    }
}

/// Prints the link instead of touching a system clipboard.
struct TerminalClipboard;

impl Clipboard for TerminalClipboard {
    fn write_text(&mut self, text: &str) -> Result<(), ClipboardError> {
        let mut out = std::io::stdout().lock();
        writeln!(out, "Link: {text}").map_err(|e| ClipboardError::WriteFailed(e.to_string()))
    }
}

fn paint(color: &Color, text: &str) -> String {
    let (r, g, b) = color.rgb();
    format!("\x1b[38;2;{r};{g};{b}m{text}\x1b[0m")
}

fn render<N, S>(session: &Session<N, S>, share: &ShareControl, now_ms: u64)
where
    N: Narrator + Clone,
    S: Scheduler + Clone,
{
    let Some(engine) = session.engine() else {
        println!("\n=== Fishsticks Joke Generator ===\n");
        println!("Choose a theme:");
        for (i, card) in stage::theme_cards(session.catalog()).iter().enumerate() {
            println!("  {}. {}", i + 1, paint(&card.accent_color, &card.name));
        }
        return;
    };

    let Some(scene) = session.stage() else {
        return;
    };
    let view = engine.frame_view();
    let name = session
        .catalog()
        .get_theme_metadata(engine.theme())
        .map(|m| m.display_name)
        .unwrap_or_else(|_| engine.theme().to_string());

    println!(
        "\n{} [{}/{}]",
        paint(&scene.background, &format!("== {name} ==")),
        view.frame_index + 1,
        view.frame_count
    );

    let sprite = |speaker| {
        let c = scene.character(speaker);
        let face = if c.talking {
            format!("({})<", c.label)
        } else {
            format!("({}) ", c.label)
        };
        paint(&c.color, &face)
    };
    let bubble = stage::speech_bubble(engine.current_line());
    let text = format!("\"{}\"", bubble.text);
    match bubble.side {
        Side::Left => println!("  {}", text),
        Side::Right => println!("  {:>width$}", text, width = BUBBLE_WIDTH),
    }
    println!(
        "  {}{:width$}{}",
        sprite(SpeakerId::One),
        "",
        sprite(SpeakerId::Two),
        width = BUBBLE_WIDTH.saturating_sub(8)
    );

    if !view.narration_available {
        println!("  ({NARRATION_ADVISORY})");
    }
    if view.is_complete {
        println!("  [r] Replay   [b] Back   [s] {}", share.label(now_ms));
    } else {
        println!("  [b] Back   [s] {}", share.label(now_ms));
    }
}
