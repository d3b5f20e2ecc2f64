//! CLI for roomstage - virtual staging of interior photos.

use clap::{Args, Parser, Subcommand, ValueEnum};
use roomstage::{
    GcsStore, GeminiModel, GeminiStager, ImagenStager, InvokeOutcome, MessageClass, ObjectStore,
    Orchestrator, RoomType, StageConfig, StageRequest, StagingModel, StatusTracker, Style,
    UploadedItem,
};
use roomstage::{prompt, MemoryStore};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "roomstage")]
#[command(about = "Stage interior photos via hosted image models (Gemini, Imagen)")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a furnished room image from a style and room type
    Generate(GenerateArgs),

    /// Edit a photo per a grounded instruction
    Edit(EditArgs),

    /// Stage a batch of photos through the orchestrator
    Stage(StageArgs),

    /// Check that the capabilities are reachable and authenticated
    Health(HealthArgs),
}

#[derive(Args)]
struct GenerateArgs {
    /// Furnishing style
    #[arg(short, long, value_enum)]
    style: StyleArg,

    /// Room type
    #[arg(short, long, value_enum)]
    room: RoomArg,

    /// Output file path (default: generated_<style>_<room>.png)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct EditArgs {
    /// Photo to edit
    input: PathBuf,

    /// Instruction; must reference the photo with the [1] marker
    #[arg(short, long)]
    instruction: String,

    /// Use the highest-quality Gemini model
    #[arg(long)]
    pro: bool,

    /// Output file path (default: edited_<originalname>.png)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct StageArgs {
    /// Photos to stage
    inputs: Vec<PathBuf>,

    /// Raw instruction; must reference the photo with the [1] marker
    #[arg(short, long, conflicts_with_all = ["style", "room"])]
    instruction: Option<String>,

    /// Furnishing style for a built staging instruction
    #[arg(short, long, value_enum, requires = "room")]
    style: Option<StyleArg>,

    /// Room type for a built staging instruction
    #[arg(short, long, value_enum, requires = "style")]
    room: Option<RoomArg>,

    /// Extra request woven into the built instruction
    #[arg(long, default_value = "")]
    note: String,

    /// Keep objects in memory instead of the configured GCS bucket
    #[arg(long)]
    memory: bool,

    /// Directory to write staged outputs into
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,
}

#[derive(Args)]
struct HealthArgs {
    /// Capability to check
    #[arg(short, long, value_enum, default_value = "gemini")]
    capability: CapabilityArg,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CapabilityArg {
    Gemini,
    Imagen,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StyleArg {
    Modern,
    Farmhouse,
    #[value(name = "mid-century-modern")]
    MidCenturyModern,
    Industrial,
    Bohemian,
    Scandinavian,
    Coastal,
}

impl From<StyleArg> for Style {
    fn from(arg: StyleArg) -> Self {
        match arg {
            StyleArg::Modern => Style::Modern,
            StyleArg::Farmhouse => Style::Farmhouse,
            StyleArg::MidCenturyModern => Style::MidCenturyModern,
            StyleArg::Industrial => Style::Industrial,
            StyleArg::Bohemian => Style::Bohemian,
            StyleArg::Scandinavian => Style::Scandinavian,
            StyleArg::Coastal => Style::Coastal,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RoomArg {
    #[value(name = "living-room")]
    LivingRoom,
    #[value(name = "main-bedroom")]
    MainBedroom,
    #[value(name = "guest-bedroom")]
    GuestBedroom,
    #[value(name = "dining-room")]
    DiningRoom,
    Kitchen,
    Office,
    Entryway,
    Basement,
}

impl From<RoomArg> for RoomType {
    fn from(arg: RoomArg) -> Self {
        match arg {
            RoomArg::LivingRoom => RoomType::LivingRoom,
            RoomArg::MainBedroom => RoomType::MainBedroom,
            RoomArg::GuestBedroom => RoomType::GuestBedroom,
            RoomArg::DiningRoom => RoomType::DiningRoom,
            RoomArg::Kitchen => RoomType::Kitchen,
            RoomArg::Office => RoomType::Office,
            RoomArg::Entryway => RoomType::Entryway,
            RoomArg::Basement => RoomType::Basement,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "roomstage=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Generate(args) => generate(args, cli.json).await?,
        Commands::Edit(args) => edit(args, cli.json).await?,
        Commands::Stage(args) => stage(args, cli.json).await?,
        Commands::Health(args) => health(args).await?,
    }

    Ok(())
}

async fn generate(args: GenerateArgs, json_output: bool) -> anyhow::Result<()> {
    let config = StageConfig::from_env()?;
    let stager = ImagenStager::builder()
        .project(&config.project)
        .location(&config.location)
        .build()?;

    let style = Style::from(args.style);
    let room = RoomType::from(args.room);
    let request = StageRequest::new(prompt::generation_prompt(style, room));

    let output = args
        .output
        .unwrap_or_else(|| PathBuf::from(prompt::generated_filename(style, room)));

    match stager.invoke(&request).await? {
        InvokeOutcome::Image(image) => {
            image.save(&output)?;
            if json_output {
                let result = serde_json::json!({
                    "success": true,
                    "output": output.display().to_string(),
                    "size_bytes": image.size(),
                    "model": image.metadata.model,
                    "duration_ms": image.metadata.duration_ms,
                });
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!(
                    "Generated {} ({} bytes) via {}",
                    output.display(),
                    image.size(),
                    stager.model_id()
                );
            }
        }
        InvokeOutcome::Empty => report_empty(stager.model_id(), json_output)?,
    }

    Ok(())
}

async fn edit(args: EditArgs, json_output: bool) -> anyhow::Result<()> {
    let model = if args.pro {
        GeminiModel::ProImagePreview
    } else {
        GeminiModel::FlashImage
    };
    let stager = GeminiStager::builder().model(model).build()?;

    let photo = tokio::fs::read(&args.input).await?;
    let request = StageRequest::new(&args.instruction).with_reference(photo);

    let original = args
        .input
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("image");
    let output = args
        .output
        .unwrap_or_else(|| PathBuf::from(prompt::edited_filename(original)));

    match stager.invoke(&request).await? {
        InvokeOutcome::Image(image) => {
            image.save(&output)?;
            if json_output {
                let result = serde_json::json!({
                    "success": true,
                    "output": output.display().to_string(),
                    "size_bytes": image.size(),
                    "model": image.metadata.model,
                    "duration_ms": image.metadata.duration_ms,
                });
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!(
                    "Edited {} -> {} ({} bytes) via {}",
                    args.input.display(),
                    output.display(),
                    image.size(),
                    stager.model_id()
                );
            }
        }
        InvokeOutcome::Empty => report_empty(stager.model_id(), json_output)?,
    }

    Ok(())
}

async fn stage(args: StageArgs, json_output: bool) -> anyhow::Result<()> {
    if args.inputs.is_empty() {
        anyhow::bail!("no photos to stage");
    }

    let instruction = match (&args.instruction, args.style, args.room) {
        (Some(raw), _, _) => raw.clone(),
        (None, Some(style), Some(room)) => {
            prompt::staging_prompt(style.into(), room.into(), &args.note)
        }
        _ => anyhow::bail!("provide either --instruction or --style with --room"),
    };

    let store: Arc<dyn ObjectStore> = if args.memory {
        Arc::new(MemoryStore::new())
    } else {
        let config = StageConfig::from_env()?;
        Arc::new(GcsStore::builder().bucket(&config.bucket).build()?)
    };

    let stager = Arc::new(GeminiStager::builder().build()?);
    let run_id = uuid::Uuid::new_v4().to_string();
    let orchestrator = Orchestrator::new(stager, store, run_id.clone());

    let mut items = Vec::with_capacity(args.inputs.len());
    for path in &args.inputs {
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| anyhow::anyhow!("unreadable filename: {}", path.display()))?
            .to_string();
        items.push(UploadedItem::new(filename, tokio::fs::read(path).await?));
    }

    let mut tracker = StatusTracker::new();
    let report = orchestrator
        .stage_batch(&mut tracker, &items, &instruction)
        .await;

    // Write staged outputs next to the report so the user has local copies.
    tokio::fs::create_dir_all(&args.output_dir).await?;
    let mut saved = Vec::new();
    for (filename, state) in tracker.iter() {
        if let Some(image) = state.result() {
            let path = args.output_dir.join(prompt::edited_filename(filename));
            image.save(&path)?;
            saved.push((filename.to_string(), path));
        }
    }

    if json_output {
        let lines: Vec<_> = report
            .iter()
            .map(|(filename, line)| {
                serde_json::json!({
                    "file": filename,
                    "class": match line.class {
                        MessageClass::Success => "success",
                        MessageClass::Warning => "warning",
                        MessageClass::Info => "info",
                    },
                    "message": line.text,
                })
            })
            .collect();
        let result = serde_json::json!({
            "run_id": run_id,
            "items": lines,
            "saved": saved
                .iter()
                .map(|(_, p)| p.display().to_string())
                .collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("Run {run_id}:");
        for (filename, line) in &report {
            let glyph = match line.class {
                MessageClass::Success => "✓",
                MessageClass::Warning => "✗",
                MessageClass::Info => "·",
            };
            println!("  {glyph} {filename}: {}", line.text);
        }
        for (_, path) in &saved {
            println!("  saved {}", path.display());
        }
    }

    Ok(())
}

async fn health(args: HealthArgs) -> anyhow::Result<()> {
    let (name, result) = match args.capability {
        CapabilityArg::Gemini => {
            let stager = GeminiStager::builder().build()?;
            (stager.name().to_string(), stager.health_check().await)
        }
        CapabilityArg::Imagen => {
            let config = StageConfig::from_env()?;
            let stager = ImagenStager::builder()
                .project(&config.project)
                .location(&config.location)
                .build()?;
            (stager.name().to_string(), stager.health_check().await)
        }
    };

    match result {
        Ok(()) => {
            println!("✓ {name}");
            Ok(())
        }
        Err(err) => {
            println!("✗ {name}: {err}");
            anyhow::bail!("health check failed")
        }
    }
}

fn report_empty(model_id: &str, json_output: bool) -> anyhow::Result<()> {
    if json_output {
        let result = serde_json::json!({
            "success": false,
            "empty": true,
            "model": model_id,
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("No image returned by {model_id}.");
    }
    Ok(())
}
