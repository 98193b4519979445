use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::json;
use studio_contracts::chat::{parse_intent, Intent, CHAT_HELP_COMMANDS};
use studio_contracts::encoded::EncodedImage;
use studio_contracts::events::{payload_from, EventPayload, EventWriter};
use studio_contracts::mode::{ArtisticStyle, InteractionMode, UpscaleFactor};
use studio_contracts::presenter::{save_session_result, ResultContent, ResultView};
use studio_contracts::prompts::UpscalePolicy;
use studio_contracts::session::Session;
use studio_contracts::upload::{MultiUpload, PreviewRegistry};
use studio_engine::{
    GenerationCollaborator, GoogleGenAiClient, Orchestrator, StudioConfig, ValidationError,
};

#[derive(Debug, Parser)]
#[command(
    name = "image-studio",
    version,
    about = "Generate, edit, try on and upscale images with Imagen and Gemini"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Interactive session with slash commands.
    Chat(ChatArgs),
    /// Text-to-Image.
    Generate(GenerateArgs),
    /// Image-to-Image.
    Edit(EditArgs),
    /// Virtual Try-on.
    TryOn(TryOnArgs),
    Upscale(UpscaleArgs),
}

#[derive(Debug, Args)]
struct CommonArgs {
    #[arg(long, default_value = "studio-out")]
    out: PathBuf,
    #[arg(long)]
    events: Option<PathBuf>,
    #[arg(long)]
    upscale_policy: Option<UpscalePolicy>,
}

#[derive(Debug, Parser)]
struct ChatArgs {
    #[command(flatten)]
    common: CommonArgs,
    #[arg(long, default_value_t = InteractionMode::TextToImage)]
    mode: InteractionMode,
}

#[derive(Debug, Parser)]
struct GenerateArgs {
    #[command(flatten)]
    common: CommonArgs,
    #[arg(long)]
    prompt: String,
    #[arg(long, default_value_t = ArtisticStyle::Default)]
    style: ArtisticStyle,
}

#[derive(Debug, Parser)]
struct EditArgs {
    #[command(flatten)]
    common: CommonArgs,
    #[arg(long)]
    prompt: String,
    #[arg(long)]
    image: PathBuf,
    #[arg(long, default_value_t = ArtisticStyle::Default)]
    style: ArtisticStyle,
}

#[derive(Debug, Parser)]
struct TryOnArgs {
    #[command(flatten)]
    common: CommonArgs,
    #[arg(long)]
    person: PathBuf,
    #[arg(long)]
    garment: PathBuf,
}

#[derive(Debug, Parser)]
struct UpscaleArgs {
    #[command(flatten)]
    common: CommonArgs,
    #[arg(long)]
    image: PathBuf,
    #[arg(long, default_value_t = UpscaleFactor::X2)]
    factor: UpscaleFactor,
}

const PROGRESS_TICK: Duration = Duration::from_millis(500);

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("image-studio error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Chat(args) => {
            let mut studio = Studio::open(&args.common, args.mode)?;
            studio.chat()?;
            Ok(0)
        }
        Command::Generate(args) => {
            let mut studio = Studio::open(&args.common, InteractionMode::TextToImage)?;
            studio.session.set_prompt(args.prompt);
            studio.session.set_style(args.style);
            studio.one_shot()
        }
        Command::Edit(args) => {
            let mut studio = Studio::open(&args.common, InteractionMode::ImageToImage)?;
            studio.session.set_prompt(args.prompt);
            studio.session.set_style(args.style);
            studio.load_slot(Slot::Primary, &args.image)?;
            studio.one_shot()
        }
        Command::TryOn(args) => {
            let mut studio = Studio::open(&args.common, InteractionMode::TryOn)?;
            studio.load_slot(Slot::Primary, &args.person)?;
            studio.load_slot(Slot::Secondary, &args.garment)?;
            studio.one_shot()
        }
        Command::Upscale(args) => {
            let mut studio = Studio::open(&args.common, InteractionMode::Upscale)?;
            studio.session.set_upscale_factor(args.factor);
            studio.load_slot(Slot::Primary, &args.image)?;
            studio.one_shot()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Primary,
    Secondary,
}

impl Slot {
    fn as_str(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Secondary => "secondary",
        }
    }

    /// What the slot holds in `mode`, or `None` when the mode has no such input.
    fn label(self, mode: InteractionMode) -> Option<&'static str> {
        match (mode, self) {
            (InteractionMode::ImageToImage, Slot::Primary) => Some("Source Image"),
            (InteractionMode::TryOn, Slot::Primary) => Some("Person Image"),
            (InteractionMode::TryOn, Slot::Secondary) => Some("Clothing Image"),
            (InteractionMode::Upscale, Slot::Primary) => Some("Image to Upscale"),
            _ => None,
        }
    }
}

struct Studio {
    session: Session,
    orchestrator: Orchestrator,
    collaborator: Arc<dyn GenerationCollaborator>,
    out_dir: PathBuf,
    tray: MultiUpload,
    tray_previews: PreviewRegistry,
}

impl Studio {
    fn open(args: &CommonArgs, mode: InteractionMode) -> Result<Self> {
        let mut config = StudioConfig::from_env()?;
        if let Some(policy) = args.upscale_policy {
            config = config.with_upscale_policy(policy);
        }
        let events_path = args
            .events
            .clone()
            .unwrap_or_else(|| args.out.join("events.jsonl"));
        let collaborator: Arc<dyn GenerationCollaborator> =
            Arc::new(GoogleGenAiClient::new(&config));
        let events = EventWriter::new(&events_path, uuid::Uuid::new_v4().to_string());
        events
            .emit(
                "session_started",
                payload_from(json!({
                    "mode": mode.as_str(),
                    "collaborator": collaborator.name(),
                    "out_dir": args.out.display().to_string(),
                    "api_base": config.api_base,
                    "text_model": config.text_model,
                    "edit_model": config.edit_model,
                    "upscale_policy": config.upscale_policy.as_str(),
                })),
            )
            .with_context(|| format!("failed to write {}", events_path.display()))?;

        let mut session = Session::new();
        session.set_mode(mode);
        Ok(Self {
            session,
            orchestrator: Orchestrator::new(events, config.upscale_policy),
            collaborator,
            out_dir: args.out.clone(),
            tray: MultiUpload::new(),
            tray_previews: PreviewRegistry::new(),
        })
    }

    fn one_shot(&mut self) -> Result<i32> {
        self.submit()?;
        if self.session.result().is_none() {
            return Ok(1);
        }
        let path = save_session_result(&self.session, &self.out_dir)?;
        self.orchestrator.events().record(
            "image_saved",
            payload_from(json!({ "path": path.display().to_string() })),
        );
        println!("Saved {}", path.display());
        Ok(0)
    }

    fn chat(&mut self) -> Result<()> {
        let stdin = io::stdin();
        let mut line = String::new();

        println!(
            "Image Studio started (session {}). Type /help for commands.",
            self.orchestrator.events().session_id()
        );
        self.print_status();

        loop {
            print!("[{}] > ", self.session.mode().as_str());
            io::stdout().flush()?;

            line.clear();
            let read = match stdin.read_line(&mut line) {
                Ok(read) => read,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            };
            if read == 0 {
                break;
            }

            let input = line.trim_end_matches(['\n', '\r']);
            let intent = parse_intent(input);
            if intent.action == "noop" {
                continue;
            }
            if intent.action == "quit" {
                break;
            }
            self.handle(&intent)?;
        }

        self.tray.clear(&mut self.tray_previews);
        Ok(())
    }

    fn handle(&mut self, intent: &Intent) -> Result<()> {
        match intent.action.as_str() {
            "help" => {
                println!("Commands: {}", CHAT_HELP_COMMANDS.join(" "));
                println!("Anything else becomes the prompt.");
            }
            "status" => self.print_status(),
            "set_prompt" => {
                let prompt = intent.arg_str("prompt").unwrap_or_default().to_string();
                if prompt.is_empty() {
                    println!("/prompt requires text");
                } else {
                    self.session.set_prompt(prompt);
                    if !matches!(
                        self.session.mode(),
                        InteractionMode::TextToImage | InteractionMode::ImageToImage
                    ) {
                        println!(
                            "Prompt stored; {} does not use it.",
                            self.session.mode().label()
                        );
                    } else {
                        println!("Prompt set.");
                    }
                }
            }
            "set_mode" => match intent.arg_str("mode").map(str::parse::<InteractionMode>) {
                Some(Ok(mode)) => {
                    self.session.set_mode(mode);
                    self.orchestrator.events().record(
                        "mode_changed",
                        payload_from(json!({ "mode": mode.as_str() })),
                    );
                    println!("Mode: {} ({})", mode.label(), mode.model_family());
                }
                Some(Err(err)) => println!("{err}"),
                None => println!("/mode requires one of: text, edit, tryon, upscale"),
            },
            "set_style" => match intent.arg_str("style").map(str::parse::<ArtisticStyle>) {
                Some(Ok(style)) => {
                    if !self.session.mode().supports_style() {
                        println!("{} has no style option.", self.session.mode().label());
                    } else {
                        self.session.set_style(style);
                        println!("Style: {}", style.label());
                    }
                }
                Some(Err(err)) => println!("{err}"),
                None => println!("/style requires a name"),
            },
            "set_factor" => match intent.arg_str("factor").map(str::parse::<UpscaleFactor>) {
                Some(Ok(factor)) => {
                    if self.session.mode() != InteractionMode::Upscale {
                        println!("{} has no upscale factor.", self.session.mode().label());
                    } else {
                        self.session.set_upscale_factor(factor);
                        println!("Upscale factor: {factor}");
                    }
                }
                Some(Err(err)) => println!("{err}"),
                None => println!("/factor requires 2 or 4"),
            },
            "set_image" => self.handle_load(Slot::Primary, intent.arg_str("path")),
            "set_reference" => self.handle_load(Slot::Secondary, intent.arg_str("path")),
            "clear_image" => {
                self.session.clear_primary_image();
                println!("Image cleared.");
            }
            "clear_reference" => {
                self.session.clear_secondary_image();
                println!("Reference cleared.");
            }
            "tray_add" => {
                let paths = intent.arg_paths("paths");
                if paths.is_empty() {
                    println!("/tray requires at least one path");
                    return Ok(());
                }
                match self.tray.append_paths(&paths, &mut self.tray_previews) {
                    Ok(added) => {
                        self.orchestrator.events().record(
                            "image_uploaded",
                            payload_from(json!({ "slot": "tray", "count": added })),
                        );
                        self.print_tray();
                    }
                    Err(err) => {
                        self.orchestrator.events().record(
                            "upload_failed",
                            payload_from(json!({ "slot": "tray", "error": err.to_string() })),
                        );
                        println!("Tray unchanged: {err}");
                    }
                }
            }
            "tray_remove" => {
                let removed = tray_index(intent)
                    .and_then(|index| self.tray.remove(index, &mut self.tray_previews));
                match removed {
                    Some(image) => {
                        println!("Removed {}", image.name());
                        self.print_tray();
                    }
                    None => println!("No tray image at that index."),
                }
            }
            "tray_pick" => {
                let picked = tray_index(intent)
                    .and_then(|index| self.tray.get(index))
                    .map(|upload| upload.image().clone());
                match picked {
                    Some(image) if Slot::Primary.label(self.session.mode()).is_some() => {
                        println!("Using {} as the image.", image.name());
                        self.set_slot_image(Slot::Primary, image);
                    }
                    Some(_) => println!("{} takes no image.", self.session.mode().label()),
                    None => println!("No tray image at that index."),
                }
            }
            "submit" => {
                self.submit()?;
            }
            "save" => {
                let dir = intent
                    .arg_str("path")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| self.out_dir.clone());
                match save_session_result(&self.session, &dir) {
                    Ok(path) => {
                        self.orchestrator.events().record(
                            "image_saved",
                            payload_from(json!({ "path": path.display().to_string() })),
                        );
                        println!("Saved {}", path.display());
                    }
                    Err(err) => println!("{err:#}"),
                }
            }
            "unknown" => {
                let command = intent.arg_str("command").unwrap_or("unknown");
                println!("Unknown command: /{command}");
            }
            other => println!("Unhandled action: {other}"),
        }
        Ok(())
    }

    fn handle_load(&mut self, slot: Slot, path: Option<&str>) {
        let mode = self.session.mode();
        let Some(label) = slot.label(mode) else {
            println!("{} does not take that image.", mode.label());
            return;
        };
        let Some(path) = path else {
            println!("{label} requires a path");
            return;
        };
        match self.load_slot(slot, Path::new(path)) {
            Ok(()) => println!("{label}: {path}"),
            Err(err) => println!("{label} cleared: {err:#}"),
        }
    }

    /// Reads `path` into `slot`. A read failure leaves the slot empty.
    fn load_slot(&mut self, slot: Slot, path: &Path) -> Result<()> {
        let loaded = match slot {
            Slot::Primary => self.session.load_primary_image(path),
            Slot::Secondary => self.session.load_secondary_image(path),
        };
        if let Err(err) = loaded {
            self.orchestrator.events().record(
                "upload_failed",
                payload_from(json!({
                    "slot": slot.as_str(),
                    "path": path.display().to_string(),
                    "error": err.to_string(),
                })),
            );
            return Err(err).with_context(|| format!("could not load {}", path.display()));
        }
        let image = match slot {
            Slot::Primary => self.session.primary_image(),
            Slot::Secondary => self.session.secondary_image(),
        };
        if let Some(image) = image {
            self.orchestrator.events().record("image_uploaded", upload_payload(slot, image));
        }
        Ok(())
    }

    fn set_slot_image(&mut self, slot: Slot, image: EncodedImage) {
        self.orchestrator.events().record("image_uploaded", upload_payload(slot, &image));
        match slot {
            Slot::Primary => self.session.set_primary_image(image),
            Slot::Secondary => self.session.set_secondary_image(image),
        }
    }

    /// Dispatches the current session on a worker thread and waits for it,
    /// printing progress while the session is busy.
    fn submit(&mut self) -> Result<()> {
        let request = match self.orchestrator.begin(&mut self.session) {
            Ok(request) => request,
            Err(ValidationError::Missing(_)) => {
                self.print_result();
                return Ok(());
            }
            Err(err @ ValidationError::Busy) => {
                println!("{err}");
                return Ok(());
            }
        };

        let (tx, rx) = mpsc::channel();
        let collaborator = Arc::clone(&self.collaborator);
        let worker = thread::spawn(move || {
            let outcome = request.execute(&*collaborator);
            let _ = tx.send((request, outcome));
        });

        print!("{}", ResultView::from_session(&self.session).busy_overlay.unwrap_or_default());
        io::stdout().flush()?;
        let (request, outcome) = loop {
            match rx.recv_timeout(PROGRESS_TICK) {
                Ok(done) => break done,
                Err(mpsc::RecvTimeoutError::Timeout) => {
                    if !self.session.controls().inputs_enabled {
                        print!(".");
                        io::stdout().flush()?;
                    }
                }
                Err(mpsc::RecvTimeoutError::Disconnected) => {
                    anyhow::bail!("generation worker exited without a result");
                }
            }
        };
        println!();
        if worker.join().is_err() {
            anyhow::bail!("generation worker panicked");
        }

        self.orchestrator.finish(&mut self.session, &request, outcome);
        self.print_result();
        Ok(())
    }

    fn print_result(&self) {
        let view = ResultView::from_session(&self.session);
        println!("== {} ==", view.title);
        if let Some(busy) = view.busy_overlay {
            println!("{busy}");
        }
        match view.content {
            ResultContent::Image(image) => {
                let bytes = image.decode().map(|bytes| bytes.len()).unwrap_or_default();
                println!("{} ({}, {bytes} bytes)", image.name(), image.media_type());
            }
            ResultContent::Placeholder(text) => println!("{text}"),
        }
        if let Some(error) = view.error {
            println!("Error: {error}");
        }
        if view.save_enabled {
            println!("Type /save to write the image to {}", self.out_dir.display());
        }
    }

    fn print_status(&self) {
        let mode = self.session.mode();
        println!("Mode: {} ({})", mode.label(), mode.model_family());
        if matches!(
            mode,
            InteractionMode::TextToImage | InteractionMode::ImageToImage
        ) {
            let prompt = self.session.prompt();
            println!("Prompt: {}", if prompt.is_empty() { "(none)" } else { prompt });
        }
        for slot in [Slot::Primary, Slot::Secondary] {
            let Some(label) = slot.label(mode) else {
                continue;
            };
            let (image, preview) = match slot {
                Slot::Primary => (self.session.primary_image(), self.session.primary_preview()),
                Slot::Secondary => (
                    self.session.secondary_image(),
                    self.session.secondary_preview(),
                ),
            };
            match (image, preview) {
                (Some(image), Some(preview)) => {
                    println!("{label}: {} [{}]", image.name(), preview.url())
                }
                _ => println!("{label}: (none)"),
            }
        }
        if mode.supports_style() {
            println!("Style: {}", self.session.style().label());
        }
        if mode == InteractionMode::Upscale {
            println!("Upscale factor: {}", self.session.upscale_factor());
            println!("Upscale policy: {}", self.orchestrator.upscale_policy());
        }
        if !self.tray.is_empty() {
            self.print_tray();
        }
        let controls = self.session.controls();
        println!(
            "Ready: {}",
            if controls.submit_enabled { "yes" } else { "no" }
        );
        self.print_result();
    }

    fn print_tray(&self) {
        println!("Tray ({} selected):", self.tray.len());
        for index in 0..self.tray.len() {
            if let Some(upload) = self.tray.get(index) {
                println!(
                    "  {}. {} [{}]",
                    index + 1,
                    upload.image().name(),
                    upload.preview().url()
                );
            }
        }
    }
}

fn upload_payload(slot: Slot, image: &EncodedImage) -> EventPayload {
    payload_from(json!({
        "slot": slot.as_str(),
        "name": image.name(),
        "media_type": image.media_type(),
    }))
}

/// Tray indices are shown and typed 1-based.
fn tray_index(intent: &Intent) -> Option<usize> {
    intent.arg_index("index").and_then(|index| index.checked_sub(1))
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use studio_contracts::chat::parse_intent;
    use studio_contracts::mode::{ArtisticStyle, InteractionMode, UpscaleFactor};
    use studio_contracts::prompts::UpscalePolicy;

    use super::{tray_index, Cli, Command, Slot};

    #[test]
    fn one_shot_subcommands_parse_typed_options() {
        let cli = Cli::try_parse_from([
            "image-studio",
            "upscale",
            "--image",
            "small.png",
            "--factor",
            "4x",
            "--upscale-policy",
            "enhance",
        ])
        .expect("upscale args");
        let Command::Upscale(args) = cli.command else {
            panic!("expected upscale");
        };
        assert_eq!(args.factor, UpscaleFactor::X4);
        assert_eq!(args.common.upscale_policy, Some(UpscalePolicy::Enhance));
        assert_eq!(args.common.out.to_str(), Some("studio-out"));

        let cli = Cli::try_parse_from([
            "image-studio",
            "generate",
            "--prompt",
            "a cat",
            "--style",
            "flux",
        ])
        .expect("generate args");
        let Command::Generate(args) = cli.command else {
            panic!("expected generate");
        };
        assert_eq!(args.style, ArtisticStyle::Flux);
    }

    #[test]
    fn chat_mode_defaults_to_text() {
        let cli = Cli::try_parse_from(["image-studio", "chat", "--out", "/tmp/x"]).expect("chat");
        let Command::Chat(args) = cli.command else {
            panic!("expected chat");
        };
        assert_eq!(args.mode, InteractionMode::TextToImage);
        let bad_factor = ["image-studio", "upscale", "--image", "a.png", "--factor", "3"];
        assert!(Cli::try_parse_from(bad_factor).is_err());
    }

    #[test]
    fn slot_labels_follow_mode() {
        assert_eq!(Slot::Primary.label(InteractionMode::TextToImage), None);
        assert_eq!(Slot::Primary.label(InteractionMode::ImageToImage), Some("Source Image"));
        assert_eq!(Slot::Secondary.label(InteractionMode::TryOn), Some("Clothing Image"));
        assert_eq!(Slot::Secondary.label(InteractionMode::Upscale), None);
    }

    #[test]
    fn tray_indices_are_one_based() {
        assert_eq!(tray_index(&parse_intent("/pick 1")), Some(0));
        assert_eq!(tray_index(&parse_intent("/untray 3")), Some(2));
        assert_eq!(tray_index(&parse_intent("/pick 0")), None);
        assert_eq!(tray_index(&parse_intent("/pick x")), None);
    }
}
