//! Snapnote application binary - composition root.
//!
//! 1. Parse CLI arguments and load configuration from TOML
//! 2. Initialize tracing
//! 3. Open the note store
//! 4. For `capture`, build the OCR client, generation service and pipeline
//!    controller from the configured backends and run one capture

mod cli;

use std::path::Path;
use std::sync::Arc;

use clap::Parser;

use snapnote_core::config::SnapnoteConfig;
use snapnote_core::error::SnapnoteError;
use snapnote_core::logging::init_tracing;
use snapnote_core::types::{NoteId, NoteUpdate};
use snapnote_generation::GenerationService;
use snapnote_ocr::{AnyOcrService, ExtractionClient};
use snapnote_pipeline::{CapturedImage, PipelineController, PipelineState};
use snapnote_storage::NoteStore;

use cli::{CliArgs, Command};

type AppResult<T> = Result<T, Box<dyn std::error::Error>>;

#[tokio::main]
async fn main() -> AppResult<()> {
    let args = CliArgs::parse();

    // Config.
    let config_file = args.resolve_config_path();
    let mut config = SnapnoteConfig::load_or_default(&config_file);
    if let Some(data_dir) = args.resolve_data_dir() {
        config.general.data_dir = data_dir;
    }
    if let Some(level) = args.resolve_log_level() {
        config.general.log_level = level;
    }

    // Tracing.
    init_tracing(&config.general.log_level);
    tracing::info!("Starting Snapnote v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration loaded");

    // Storage.
    let store = Arc::new(NoteStore::open(config.notes_path()));

    match args.command {
        Command::Capture { image, save } => capture(&config, store, &image, save).await,
        Command::List => {
            list(&store);
            Ok(())
        }
        Command::Show { id } => show(&store, &id),
        Command::Rename { id, title } => {
            let note = store.update(&NoteId::from(id), NoteUpdate::title(title))?;
            println!("Renamed {} to \"{}\"", note.id, note.title);
            Ok(())
        }
        Command::Delete { id } => {
            store.delete(&NoteId::from(id.as_str()))?;
            println!("Deleted {}", id);
            Ok(())
        }
    }
}

async fn capture(
    config: &SnapnoteConfig,
    store: Arc<NoteStore>,
    image_path: &Path,
    save: bool,
) -> AppResult<()> {
    let data = std::fs::read(image_path)?;

    let ocr = AnyOcrService::from_config(&config.extraction);
    let generation = GenerationService::from_config(&config.generation);
    tracing::info!(
        ocr = ocr.name(),
        generation = generation.backend_name(),
        "Pipeline ready"
    );
    let controller = PipelineController::new(ExtractionClient::new(ocr), generation, store);

    let source = std::fs::canonicalize(image_path).unwrap_or_else(|_| image_path.to_path_buf());
    let image = CapturedImage::new(data).with_source_url(format!("file://{}", source.display()));

    controller.start_capture()?;
    match controller.image_captured(image).await? {
        PipelineState::Previewing(draft) => {
            println!("# {}\n\n{}", draft.title, draft.body.render());
            if !draft.uncertainties.is_empty() {
                println!("Uncertainties:");
                for uncertainty in &draft.uncertainties {
                    println!("- {}", uncertainty);
                }
            }

            if save {
                let note = controller.save()?;
                println!("Saved note {}", note.id);
            } else {
                controller.discard()?;
                println!("Preview only; pass --save to keep this note.");
            }
            Ok(())
        }
        PipelineState::Error(message) => {
            controller.dismiss()?;
            Err(message.into())
        }
        other => Err(format!("Capture stopped in unexpected state {}", other).into()),
    }
}

fn list(store: &NoteStore) {
    let notes = store.list();
    if notes.is_empty() {
        println!("No notes yet.");
        return;
    }
    for note in notes {
        println!(
            "{}  {}  {}",
            note.id,
            note.timestamp.format("%Y-%m-%d %H:%M"),
            note.title
        );
    }
}

fn show(store: &NoteStore, id: &str) -> AppResult<()> {
    let note = store
        .get_by_id(&NoteId::from(id))
        .ok_or_else(|| SnapnoteError::NotFound { id: id.to_string() })?;

    println!("{}", note.render());
    if !note.uncertainties.is_empty() {
        println!("Uncertainties:");
        for uncertainty in &note.uncertainties {
            println!("- {}", uncertainty);
        }
    }
    if let Some(url) = &note.source_image_url {
        println!("Source: {}", url);
    }
    Ok(())
}
