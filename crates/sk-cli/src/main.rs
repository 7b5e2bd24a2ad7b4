//! `sketchloop`: headless runner for sketches.
//!
//! ```text
//! sketchloop check <sketch>
//! sketchloop run   <sketch> [--frames N] [--events FILE] [--png FILE] [--state FILE]
//! sketchloop pick  <sketch> --at X,Y [--frames N] [--drag-to X,Y] [--save FILE]
//! sketchloop list
//! ```
//!
//! `<sketch>` is a path or `@name` of a bundled sketch. Every command takes
//! `--config FILE` (editor config JSON) and `--seed N`.

mod sketches;

use anyhow::{Context, Result, anyhow, bail};
use sk_core::{Evaluator, SketchError};
use sk_editor::{EditorConfig, InputEvent, Session};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

fn print_help() {
    eprintln!(
        "Usage: sketchloop <check|run|pick|list> <sketch> [options]\n\n\
         <sketch> is a file path or @name of a bundled sketch (see `list`).\n\n\
         Options:\n  \
         --config <path>   Editor config JSON\n  \
         --seed <n>        Seed for Math.random\n  \
         --frames <n>      Frames to play before output (default 1)\n  \
         --events <path>   JSON array of per-frame event arrays (run)\n  \
         --png <path>      Write the last frame as PNG (run)\n  \
         --state <path>    Write the final state as JSON, `-` for stdout (run)\n  \
         --at <x,y>        Canvas point to inspect (pick)\n  \
         --drag-to <x,y>   Drag the shape under --at to this point (pick)\n  \
         --save <path>     Write the edited source, `-` for stdout (pick)\n  \
         -h, --help        Show this message"
    );
}

#[derive(Debug, Default)]
struct Args {
    command: String,
    sketch: Option<String>,
    config: Option<PathBuf>,
    seed: Option<u64>,
    frames: usize,
    events: Option<PathBuf>,
    png: Option<PathBuf>,
    state: Option<String>,
    at: Option<(f64, f64)>,
    drag_to: Option<(f64, f64)>,
    save: Option<String>,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Option<Args>> {
    let mut parsed = Args {
        frames: 1,
        ..Args::default()
    };

    while let Some(arg) = args.next() {
        let mut value = |flag: &str| args.next().with_context(|| format!("{flag} requires a value"));
        match arg.as_str() {
            "-h" | "--help" => {
                print_help();
                return Ok(None);
            }
            "--config" => parsed.config = Some(PathBuf::from(value("--config")?)),
            "--seed" => parsed.seed = Some(value("--seed")?.parse().context("--seed")?),
            "--frames" => parsed.frames = value("--frames")?.parse().context("--frames")?,
            "--events" => parsed.events = Some(PathBuf::from(value("--events")?)),
            "--png" => parsed.png = Some(PathBuf::from(value("--png")?)),
            "--state" => parsed.state = Some(value("--state")?),
            "--at" => parsed.at = Some(parse_point(&value("--at")?)?),
            "--drag-to" => parsed.drag_to = Some(parse_point(&value("--drag-to")?)?),
            "--save" => parsed.save = Some(value("--save")?),
            flag if flag.starts_with("--") => {
                bail!("Unknown argument '{flag}'. Use --help for usage.")
            }
            positional if parsed.command.is_empty() => parsed.command = positional.to_string(),
            positional if parsed.sketch.is_none() => parsed.sketch = Some(positional.to_string()),
            extra => bail!("Unexpected argument '{extra}'"),
        }
    }

    if parsed.command.is_empty() {
        print_help();
        return Ok(None);
    }
    Ok(Some(parsed))
}

fn parse_point(text: &str) -> Result<(f64, f64)> {
    let (x, y) = text
        .split_once(',')
        .ok_or_else(|| anyhow!("expected X,Y, got '{text}'"))?;
    Ok((x.trim().parse()?, y.trim().parse()?))
}

fn main() -> ExitCode {
    env_logger::init();
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<ExitCode> {
    let Some(args) = parse_args(std::env::args().skip(1))? else {
        return Ok(ExitCode::SUCCESS);
    };
    if args.command == "list" {
        for (name, _) in sketches::BUILTIN {
            println!("@{name}");
        }
        return Ok(ExitCode::SUCCESS);
    }

    let name = args.sketch.as_deref().context("missing <sketch>")?;
    let source = load_source(name)?;
    let mut config = match &args.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("Reading config {}", path.display()))?;
            EditorConfig::from_json(&text)
                .with_context(|| format!("Parsing config {}", path.display()))?
        }
        None => EditorConfig::default(),
    };
    if let Some(seed) = args.seed {
        config.seed = seed;
    }

    match args.command.as_str() {
        "check" => check(name, &source, &config),
        "run" => play(name, &source, config, &args),
        "pick" => pick(name, &source, config, &args),
        other => bail!("Unknown command '{other}'. Use --help for usage."),
    }
}

fn load_source(name: &str) -> Result<String> {
    if let Some(builtin) = name.strip_prefix('@') {
        return sketches::find(builtin)
            .map(str::to_string)
            .ok_or_else(|| anyhow!("no bundled sketch named '{builtin}'"));
    }
    fs::read_to_string(name).with_context(|| format!("Reading {name}"))
}

/// `file:line:col: kind: message`, the shape editors jump to.
fn diagnostic(name: &str, err: &SketchError) -> String {
    let (line, column) = err.position();
    format!("{name}:{line}:{column}: {}: {}", err.kind(), err.message())
}

fn print_error(name: &str, err: &SketchError) {
    eprintln!("{}", diagnostic(name, err));
}

// ─── Commands ────────────────────────────────────────────────────────────

fn check(name: &str, source: &str, config: &EditorConfig) -> Result<ExitCode> {
    let evaluator = Evaluator::new()
        .with_seed(config.seed)
        .with_dry_run(config.dry_run);
    match evaluator.load(source) {
        Ok((sketch, report)) => {
            for warning in &report.warnings {
                eprintln!("{name}: warning: {warning}");
            }
            println!(
                "{name}: ok, {}x{}, {} constants",
                sketch.size.0,
                sketch.size.1,
                report.constants.len()
            );
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            print_error(name, &err);
            Ok(ExitCode::FAILURE)
        }
    }
}

/// A session that has played `frames` frames.
fn played(name: &str, source: &str, config: EditorConfig, args: &Args) -> Result<Option<Session>> {
    let batches = match &args.events {
        Some(path) => read_events(path)?,
        None => Vec::new(),
    };
    let mut session = Session::new(EditorConfig {
        start_playing: true,
        ..config
    });
    if let Err(err) = session.open(source) {
        print_error(name, &err);
        return Ok(None);
    }
    let events = session.events();
    for frame in 0..args.frames {
        for event in batches.get(frame).into_iter().flatten() {
            events.push(event.clone());
        }
        if let Err(err) = session.tick() {
            print_error(name, &err);
            log::info!("stopped after {frame} frames");
            break;
        }
    }
    Ok(Some(session))
}

fn read_events(path: &Path) -> Result<Vec<Vec<InputEvent>>> {
    let text = fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Parsing events {}", path.display()))
}

fn play(name: &str, source: &str, config: EditorConfig, args: &Args) -> Result<ExitCode> {
    let Some(session) = played(name, source, config, args)? else {
        return Ok(ExitCode::FAILURE);
    };
    let history = session.engine().map_or(0, |engine| engine.history().len());
    println!("{name}: {history} history entries");

    if let Some(path) = &args.png {
        let surface = session.render();
        let image = image::RgbaImage::from_raw(surface.width(), surface.height(), surface.to_rgba8())
            .context("frame buffer size mismatch")?;
        image
            .save(path)
            .with_context(|| format!("Writing {}", path.display()))?;
        println!("Wrote frame to {}", path.display());
    }
    if let Some(target) = &args.state {
        let state = session.state().map(|s| s.to_json()).unwrap_or_default();
        write_output(target, &serde_json::to_string_pretty(&state)?)?;
    }
    Ok(if session.error().is_some() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn pick(name: &str, source: &str, config: EditorConfig, args: &Args) -> Result<ExitCode> {
    let (x, y) = args.at.context("pick needs --at X,Y")?;
    let Some(mut session) = played(name, source, config, args)? else {
        return Ok(ExitCode::FAILURE);
    };
    session.pause();

    let inspector = session.inspector().context("no inspectable frame")?;
    let Some(id) = inspector.on_hover(x, y) else {
        println!("{name}: nothing at {x},{y}");
        return Ok(ExitCode::FAILURE);
    };
    if let Some(cmd) = inspector.meta_for_id(id) {
        println!("#{id} {}", cmd.to_json());
        if let Some(meta) = cmd.meta() {
            println!("lines {}-{}", meta.line_start, meta.line_end);
        }
    }

    if let Some((tx, ty)) = args.drag_to {
        session.pointer(InputEvent::MouseDown { pos: [x, y] });
        if !session.is_dragging() {
            bail!("#{id} cannot be dragged");
        }
        session.pointer(InputEvent::MouseMove { pos: [tx, ty] });
        session.pointer(InputEvent::MouseUp { pos: [tx, ty] });
        let constants = session
            .engine()
            .map(|engine| engine.constants().to_vec())
            .unwrap_or_default();
        println!("constants {constants:?}");
    }
    if let Some(target) = &args.save {
        write_output(target, session.source())?;
    }
    Ok(ExitCode::SUCCESS)
}

/// Write to `target`, or stdout for `-`. Source text is written verbatim.
fn write_output(target: &str, text: &str) -> Result<()> {
    if target == "-" {
        println!("{text}");
        return Ok(());
    }
    let path = Path::new(target);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("Creating directory {}", parent.display()))?;
    }
    fs::write(path, text).with_context(|| format!("Writing {}", path.display()))?;
    println!("Wrote {}", path.display());
    Ok(())
}
