//! End-to-end capture flow against the demo providers and a temp-dir store.

use std::sync::Arc;

use snapnote_core::config::SnapnoteConfig;
use snapnote_core::types::NoteBody;
use snapnote_generation::{GenerationService, ModelStatus};
use snapnote_ocr::{AnyOcrService, ExtractionClient, DEMO_TEXT};
use snapnote_pipeline::{CapturedImage, PipelineController, PipelineState};
use snapnote_storage::NoteStore;

fn demo_controller(config: &SnapnoteConfig) -> PipelineController<AnyOcrService> {
    PipelineController::new(
        ExtractionClient::new(AnyOcrService::from_config(&config.extraction)),
        GenerationService::from_config(&config.generation),
        Arc::new(NoteStore::open(config.notes_path())),
    )
}

fn temp_config(dir: &tempfile::TempDir) -> SnapnoteConfig {
    let mut config = SnapnoteConfig::default();
    config.general.data_dir = dir.path().to_string_lossy().into_owned();
    config
}

#[tokio::test]
async fn test_demo_capture_is_saved_and_survives_reload() {
    let dir = tempfile::tempdir().unwrap();
    let config = temp_config(&dir);
    let controller = demo_controller(&config);

    controller.start_capture().unwrap();
    let state = controller
        .image_captured(CapturedImage::new(b"fake jpeg".to_vec()).with_source_url("camera://0"))
        .await
        .unwrap();
    let draft = state.draft().expect("demo run should reach preview");
    assert_eq!(draft.title, "Meeting Notes - Q3 Planning");
    assert_eq!(draft.source_text.as_deref(), Some(DEMO_TEXT));

    let saved = controller.save().unwrap();
    assert_eq!(controller.state(), PipelineState::Idle);

    let reloaded = NoteStore::open(config.notes_path());
    let notes = reloaded.list();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0], saved);

    let NoteBody::StructuredContent(sections) = &notes[0].body else {
        panic!("generated notes carry structured content");
    };
    let finance = sections.get("Financial Goals").unwrap();
    assert!(finance.iter().any(|b| b.contains("$2.5M")));

    assert_eq!(sections.headings().next(), Some("Financial Goals"));

    let rendered = notes[0].render();
    assert!(rendered.starts_with("# Meeting Notes - Q3 Planning\n\n## Financial Goals\n"));
    assert!(rendered.contains("- Revenue targets: $2.5M for Q3"));
}

#[tokio::test]
async fn test_second_capture_of_same_text_hits_cache() {
    let dir = tempfile::tempdir().unwrap();
    let config = temp_config(&dir);
    let controller = demo_controller(&config);

    for _ in 0..2 {
        controller.start_capture().unwrap();
        controller
            .image_captured(CapturedImage::new(vec![1, 2, 3]))
            .await
            .unwrap();
        controller.save().unwrap();
    }

    assert_eq!(controller.generation().cache_len(), 1);
    assert_eq!(controller.generation().load_attempts(), 1);
    assert_eq!(controller.generation().model_status(), ModelStatus::Ready);

    let notes = controller.store().list();
    assert_eq!(notes.len(), 2);
    assert_ne!(notes[0].id, notes[1].id);
    assert!(notes[0].timestamp >= notes[1].timestamp);
}

#[tokio::test]
async fn test_failed_run_commits_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let config = temp_config(&dir);
    let controller = demo_controller(&config);

    controller.start_capture().unwrap();
    let state = controller
        .image_captured(CapturedImage::new(Vec::new()))
        .await
        .unwrap();
    assert!(state.error_message().is_some());

    controller.dismiss().unwrap();
    assert!(controller.store().is_empty());
    assert!(!config.notes_path().exists());
}
