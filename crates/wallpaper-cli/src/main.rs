mod messages;

use std::fs;
use std::io::{self, BufRead, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use image::ImageFormat;
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;
use wallpaper_contracts::chat::{parse_intent, Intent, CHAT_HELP_COMMANDS};
use wallpaper_contracts::events::{new_session_id, EventWriter};
use wallpaper_contracts::history::{HistoryEntry, HistoryStore};
use wallpaper_contracts::image_uri::ImageUri;
use wallpaper_contracts::settings::{is_known_style, AspectRatio, Language, DEFAULT_STYLE, STYLES};
use wallpaper_contracts::store::{JsonFileStore, KeyValueStore};
use wallpaper_engine::{
    Coordinator, Dispatch, GeminiClient, IgnoreReason, ImageApi, ShareError, ShareOutcome,
    SharePayload, ShareTarget,
};

#[derive(Debug, Parser)]
#[command(name = "wallpaper", version, about = "Anime wallpaper studio")]
struct Cli {
    /// JSON file holding history and preferences.
    #[arg(long, global = true)]
    store: Option<PathBuf>,
    /// Append session events (JSONL) to this file.
    #[arg(long, global = true)]
    events: Option<PathBuf>,
    #[arg(long, global = true)]
    lang: Option<Language>,
    /// Directory that /share writes into.
    #[arg(long, global = true)]
    share_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Chat,
    Generate(GenerateArgs),
    History,
    ClearHistory(ClearHistoryArgs),
}

#[derive(Debug, Parser)]
struct GenerateArgs {
    #[arg(long)]
    prompt: String,
    #[arg(long, default_value = "9:16")]
    aspect: AspectRatio,
    #[arg(long, default_value = DEFAULT_STYLE, value_parser = parse_style)]
    style: String,
    /// Edit this image instead of generating from text.
    #[arg(long)]
    base: Option<PathBuf>,
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Debug, Parser)]
struct ClearHistoryArgs {
    #[arg(long)]
    yes: bool,
}

const STORE_DIR_NAME: &str = "ai-anime-wallpaper";

fn main() {
    init_tracing();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("wallpaper error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_env("WALLPAPER_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let store_path = match &cli.store {
        Some(path) => path.clone(),
        None => default_store_path()?,
    };
    let store: Arc<dyn KeyValueStore> = Arc::new(JsonFileStore::new(&store_path));
    tracing::debug!(store = %store_path.display(), "opened store");

    match &cli.command {
        Command::History => {
            let entries = HistoryStore::new(store).load();
            print_history(&entries, &mut io::stdout().lock())?;
            Ok(0)
        }
        Command::Chat => {
            let session = open_session(&cli, store)?;
            let stdin = io::stdin();
            run_repl(&session, &mut stdin.lock(), &mut io::stdout().lock())?;
            Ok(0)
        }
        Command::Generate(args) => {
            let session = open_session(&cli, store)?;
            run_generate_once(&session, args, &mut io::stdout().lock())
        }
        Command::ClearHistory(args) => {
            let session = open_session(&cli, store)?;
            let stdin = io::stdin();
            run_clear_history(
                &session,
                args.yes,
                &mut stdin.lock(),
                &mut io::stdout().lock(),
            )?;
            Ok(0)
        }
    }
}

fn default_store_path() -> Result<PathBuf> {
    dirs::data_dir()
        .or_else(dirs::home_dir)
        .map(|dir| dir.join(STORE_DIR_NAME).join("store.json"))
        .context("could not resolve a data directory; pass --store")
}

struct Session {
    coordinator: Coordinator,
    outbox: Option<OutboxShare>,
}

impl Session {
    fn new(api: Arc<dyn ImageApi>, store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            coordinator: Coordinator::new(api, store),
            outbox: None,
        }
    }

    fn language(&self) -> Language {
        self.coordinator.language()
    }

    fn share_target(&self) -> Option<&dyn ShareTarget> {
        self.outbox.as_ref().map(|outbox| outbox as &dyn ShareTarget)
    }
}

fn open_session(cli: &Cli, store: Arc<dyn KeyValueStore>) -> Result<Session> {
    let client = GeminiClient::from_env().context("failed to build the API client")?;
    let mut session = Session::new(Arc::new(client), store);
    if let Some(path) = &cli.events {
        session.coordinator = session
            .coordinator
            .with_events(EventWriter::new(path, new_session_id()));
    }
    if let Some(language) = cli.lang {
        session.coordinator.set_language(language);
    }
    session.outbox = cli.share_dir.clone().map(OutboxShare::new);
    Ok(session)
}

/// Stand-in for a platform share sheet: drops the image and a caption
/// side-by-side into a directory.
struct OutboxShare {
    dir: PathBuf,
}

impl OutboxShare {
    fn new(dir: PathBuf) -> Self {
        Self { dir }
    }
}

impl ShareTarget for OutboxShare {
    fn share(&self, payload: &SharePayload) -> Result<(), ShareError> {
        let bytes = payload
            .image
            .decode()
            .map_err(|err| ShareError::Rejected(err.to_string()))?;
        fs::create_dir_all(&self.dir).map_err(|err| ShareError::Failed(err.to_string()))?;
        let image_path = self.dir.join(&payload.file_name);
        fs::write(&image_path, bytes).map_err(|err| ShareError::Failed(err.to_string()))?;
        let caption = json!({
            "title": payload.title,
            "text": payload.text,
            "file": payload.file_name,
        });
        let caption = serde_json::to_string_pretty(&caption)
            .map_err(|err| ShareError::Failed(err.to_string()))?;
        fs::write(image_path.with_extension("json"), caption)
            .map_err(|err| ShareError::Failed(err.to_string()))?;
        Ok(())
    }
}

fn parse_style(raw: &str) -> Result<String, String> {
    let style = raw.trim();
    if is_known_style(style) {
        Ok(style.to_string())
    } else {
        Err(unknown_style_message(style))
    }
}

fn unknown_style_message(style: &str) -> String {
    let known: Vec<&str> = STYLES.iter().map(|spec| spec.id).collect();
    format!("Unknown style '{style}'; choose one of: {}", known.join(", "))
}

fn run_generate_once<W: Write>(session: &Session, args: &GenerateArgs, out: &mut W) -> Result<i32> {
    let coordinator = &session.coordinator;
    coordinator.set_prompt(args.prompt.clone());
    coordinator.set_aspect_ratio(args.aspect);
    coordinator.set_style(args.style.clone());
    if let Some(base) = &args.base {
        coordinator.set_base_image(Some(load_base_image(base)?));
    }

    match coordinator.generate() {
        Dispatch::Done(_) => {
            let path = save_current_image(coordinator, args.out.as_deref())?;
            writeln!(out, "{}", path.display())?;
            Ok(0)
        }
        Dispatch::Ignored(reason) => bail!("nothing generated: {}", ignore_reason_text(reason)),
        Dispatch::Failed(err) => Err(anyhow::Error::new(err).context(messages::error_message(
            wallpaper_engine::ErrorKind::GenerationFailed,
            session.language(),
        ))),
    }
}

fn run_clear_history<R: BufRead, W: Write>(
    session: &Session,
    assume_yes: bool,
    input: &mut R,
    out: &mut W,
) -> Result<()> {
    let confirmed = assume_yes
        || ask_confirm(
            input,
            out,
            messages::clear_history_confirm(session.language()),
        )?;
    if session.coordinator.clear_history(|| confirmed) {
        writeln!(out, "History cleared.")?;
    } else {
        writeln!(
            out,
            "Kept {} history entries.",
            session.coordinator.history().len()
        )?;
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

fn run_repl<R: BufRead, W: Write>(session: &Session, input: &mut R, out: &mut W) -> Result<()> {
    let mut line = String::new();
    writeln!(out, "Wallpaper chat started. Type /help for commands.")?;

    loop {
        write!(out, "> ")?;
        out.flush()?;

        line.clear();
        let read = match input.read_line(&mut line) {
            Ok(read) => read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };
        if read == 0 {
            break;
        }

        let intent = parse_intent(line.trim_end_matches(['\n', '\r']));
        if intent.action == "noop" {
            continue;
        }
        let flow = handle_intent(session, &intent, input, out)?;
        print_notices(session, out)?;
        if flow == Flow::Quit {
            break;
        }
    }
    Ok(())
}

fn handle_intent<R: BufRead, W: Write>(
    session: &Session,
    intent: &Intent,
    input: &mut R,
    out: &mut W,
) -> Result<Flow> {
    let coordinator = &session.coordinator;
    match intent.action.as_str() {
        "help" => {
            writeln!(out, "Commands: {}", CHAT_HELP_COMMANDS.join(" "))?;
            writeln!(out, "Plain text generates a wallpaper from that prompt.")?;
        }
        "quit" => return Ok(Flow::Quit),
        "generate" => {
            if let Some(prompt) = &intent.prompt {
                coordinator.set_prompt(prompt.clone());
            }
            writeln!(out, "Generating...")?;
            let result = coordinator.generate();
            report_image(session, result, "Generated", out)?;
        }
        "upscale" => {
            writeln!(out, "Upscaling...")?;
            let result = coordinator.upscale();
            report_image(session, result, "Upscaled", out)?;
        }
        "enhance" => {
            let result = coordinator.enhance();
            report_text(result, out)?;
        }
        "suggest" => {
            let result = coordinator.suggest();
            report_text(result, out)?;
        }
        "set_prompt" => {
            let prompt = arg_string(intent, "prompt").unwrap_or_default();
            coordinator.set_prompt(prompt);
            writeln!(out, "Prompt set.")?;
        }
        "set_aspect_ratio" => {
            let raw = arg_string(intent, "aspect_ratio").unwrap_or_default();
            match AspectRatio::from_str(&raw) {
                Ok(ratio) => {
                    coordinator.set_aspect_ratio(ratio);
                    writeln!(out, "Aspect ratio set to {ratio}")?;
                }
                Err(message) => writeln!(out, "{message}")?,
            }
        }
        "set_style" => {
            let style = arg_string(intent, "style").unwrap_or_default();
            if is_known_style(&style) {
                writeln!(out, "Style set to {style}")?;
                coordinator.set_style(style);
            } else {
                writeln!(out, "{}", unknown_style_message(&style))?;
            }
        }
        "set_language" => {
            let raw = arg_string(intent, "language").unwrap_or_default();
            match Language::from_str(&raw) {
                Ok(language) => {
                    coordinator.set_language(language);
                    writeln!(out, "Language set to {language}")?;
                }
                Err(message) => writeln!(out, "{message}")?,
            }
        }
        "set_base_image" => match arg_string(intent, "path") {
            Some(path) => match load_base_image(Path::new(&path)) {
                Ok(image) => {
                    coordinator.set_base_image(Some(image));
                    writeln!(out, "Base image set to {path}; prompts now edit it.")?;
                }
                Err(err) => writeln!(out, "Base image unchanged: {err:#}")?,
            },
            None => writeln!(out, "/base requires a path")?,
        },
        "clear_base_image" => {
            coordinator.set_base_image(None);
            writeln!(out, "Base image cleared.")?;
        }
        "save_image" => {
            if coordinator.snapshot().current_image.is_none() {
                writeln!(out, "No image to save yet.")?;
            } else {
                let target = arg_string(intent, "path").map(PathBuf::from);
                match save_current_image(coordinator, target.as_deref()) {
                    Ok(path) => writeln!(out, "Saved {}", path.display())?,
                    Err(err) => writeln!(out, "Not saved: {err:#}")?,
                }
            }
        }
        "share" => match coordinator.share(session.share_target()) {
            ShareOutcome::Shared => writeln!(out, "Shared.")?,
            ShareOutcome::Cancelled => writeln!(out, "Share cancelled.")?,
            ShareOutcome::Unsupported | ShareOutcome::Failed => {}
        },
        "history" => print_history(&coordinator.history(), out)?,
        "select_history" => {
            let history = coordinator.history();
            let entry = intent
                .command_args
                .get("index")
                .and_then(Value::as_u64)
                .and_then(|index| usize::try_from(index).ok())
                .and_then(|index| index.checked_sub(1))
                .and_then(|index| history.get(index));
            match entry {
                Some(entry) => {
                    coordinator.select_from_history(entry);
                    writeln!(out, "Selected: {}", entry.prompt)?;
                }
                None => writeln!(out, "/select requires an index between 1 and {}", history.len())?,
            }
        }
        "clear_history" => run_clear_history(session, false, input, out)?,
        "state" => print_state(session, out)?,
        "unknown" => {
            let command = arg_string(intent, "command").unwrap_or_default();
            writeln!(out, "Unknown command: /{command}. Type /help.")?;
        }
        other => {
            tracing::debug!(action = other, "unhandled chat action");
        }
    }
    Ok(Flow::Continue)
}

fn report_image<W: Write>(
    session: &Session,
    result: Dispatch<ImageUri>,
    verb: &str,
    out: &mut W,
) -> Result<()> {
    match result {
        Dispatch::Done(image) => {
            let mime_type = image.mime_type().unwrap_or("image/?");
            writeln!(
                out,
                "{verb} {mime_type}. /save to write it to disk. ({})",
                session.coordinator.download_file_name()
            )?;
        }
        Dispatch::Ignored(reason) => writeln!(out, "{}", ignore_reason_text(reason))?,
        Dispatch::Failed(_) => print_inline_error(session, out)?,
    }
    Ok(())
}

fn report_text<W: Write>(result: Dispatch<String>, out: &mut W) -> Result<()> {
    match result {
        Dispatch::Done(text) => writeln!(out, "Prompt: {text}")?,
        Dispatch::Ignored(reason) => writeln!(out, "{}", ignore_reason_text(reason))?,
        // Reported through the notice queue.
        Dispatch::Failed(_) => {}
    }
    Ok(())
}

fn ignore_reason_text(reason: IgnoreReason) -> &'static str {
    match reason {
        IgnoreReason::Busy(_) => "Another request is still running.",
        IgnoreReason::EmptyPrompt => "The prompt is empty.",
        IgnoreReason::NoImage => "There is no image yet.",
    }
}

fn print_inline_error<W: Write>(session: &Session, out: &mut W) -> Result<()> {
    if let Some(kind) = session.coordinator.snapshot().last_error {
        let language = session.language();
        writeln!(
            out,
            "{} {}",
            messages::error_title(language),
            messages::error_message(kind, language)
        )?;
    }
    Ok(())
}

fn print_notices<W: Write>(session: &Session, out: &mut W) -> Result<()> {
    let language = session.language();
    for notice in session.coordinator.take_notices() {
        writeln!(out, "! {}", messages::notice_message(notice, language))?;
    }
    Ok(())
}

fn print_state<W: Write>(session: &Session, out: &mut W) -> Result<()> {
    let state = session.coordinator.snapshot();
    writeln!(out, "prompt: {}", state.prompt)?;
    writeln!(out, "aspect: {}", state.aspect_ratio)?;
    writeln!(out, "style: {}", state.style)?;
    writeln!(
        out,
        "base image: {}",
        state
            .base_image
            .as_ref()
            .and_then(ImageUri::mime_type)
            .unwrap_or("none")
    )?;
    writeln!(
        out,
        "current image: {}",
        state
            .current_image
            .as_ref()
            .and_then(ImageUri::mime_type)
            .unwrap_or("none")
    )?;
    writeln!(out, "last prompt: {}", state.last_prompt_used)?;
    writeln!(out, "language: {}", session.language())?;
    writeln!(out, "history: {}", session.coordinator.history().len())?;
    Ok(())
}

fn print_history<W: Write>(entries: &[HistoryEntry], out: &mut W) -> Result<()> {
    if entries.is_empty() {
        writeln!(out, "History is empty.")?;
        return Ok(());
    }
    for (idx, entry) in entries.iter().enumerate() {
        let mode = if entry.is_edit() {
            "edit".to_string()
        } else {
            format!(
                "{} {}",
                entry.aspect_ratio.unwrap_or_default(),
                entry.style.as_deref().unwrap_or(DEFAULT_STYLE)
            )
        };
        writeln!(
            out,
            "{:>2}. [{}] ({mode}) {}",
            idx + 1,
            entry.created_at,
            entry.prompt
        )?;
    }
    Ok(())
}

fn ask_confirm<R: BufRead, W: Write>(input: &mut R, out: &mut W, question: &str) -> Result<bool> {
    write!(out, "{question} [y/N] ")?;
    out.flush()?;
    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(matches!(
        answer.trim().to_ascii_lowercase().as_str(),
        "y" | "yes"
    ))
}

fn load_base_image(path: &Path) -> Result<ImageUri> {
    let bytes = fs::read(path)
        .with_context(|| format!("failed to read base image {}", path.display()))?;
    let format = image::guess_format(&bytes)
        .or_else(|_| ImageFormat::from_path(path))
        .with_context(|| format!("unrecognized image format: {}", path.display()))?;
    Ok(ImageUri::from_bytes(format.to_mime_type(), &bytes))
}

/// Writes the current image. A directory target receives the suggested
/// download file name.
fn save_current_image(coordinator: &Coordinator, target: Option<&Path>) -> Result<PathBuf> {
    let image = coordinator
        .snapshot()
        .current_image
        .context("no image to save")?;
    let file_name = coordinator.download_file_name();
    let path = match target {
        Some(path) if path.is_dir() => path.join(file_name),
        Some(path) => path.to_path_buf(),
        None => PathBuf::from(file_name),
    };
    let bytes = image.decode().context("current image is not valid base64")?;
    if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, bytes).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

fn arg_string(intent: &Intent, key: &str) -> Option<String> {
    let raw = intent
        .command_args
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or_default();
    if raw.is_empty() {
        None
    } else {
        Some(raw.to_string())
    }
}
