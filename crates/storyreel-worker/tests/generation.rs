mod common;

use storyreel_models::{GenerationStage, MusicPreference, PostId, Preset};
use storyreel_worker::progress::{self, ProgressSender};

use common::{FakeInspector, FakeText, Harness, SpeechMode, EXCERPT, NARRATION_SECS};

#[tokio::test]
async fn test_single_image_success() {
    let harness = Harness::builder().build();
    let mut request = common::request();
    request.music = MusicPreference::None;
    request.hook = Some("She never meant to stay.".to_string());

    let result = harness
        .orchestrator
        .generate(&PostId::from("post-1"), &request, &ProgressSender::noop())
        .await;

    let video = result.video().expect("generation should succeed");
    assert!(video.video_path.starts_with(&harness.config.output_root));
    assert!(video.video_path.exists());
    assert_eq!((video.width, video.height), (1080, 1920));
    assert_eq!(video.duration_secs, NARRATION_SECS);

    let metadata = &video.metadata;
    assert_eq!(metadata.preset, Preset::SingleImage);
    assert_eq!(metadata.image_model, "fake-image-1");
    assert_eq!(metadata.slide_count, 1);
    assert_eq!(metadata.narration_text, format!("She never meant to stay. {EXCERPT}"));
    assert!(metadata.music_track.is_none());
    assert_eq!(metadata.effects, vec!["zoom", "vignette", "fade_in", "fade_out", "text_overlay"]);
    assert!(metadata.estimated_cost.total_usd > 0.0);

    // Narration gets hook + excerpt; mixing skipped without music
    assert_eq!(harness.speech.texts.lock().unwrap().len(), 1);
    assert!(harness.mixer.calls.lock().unwrap().is_empty());
    assert_eq!(harness.encoder.count(), 1);

    let command = harness.encoder.commands.lock().unwrap()[0].clone();
    let video_filter = command.output_value("-vf").unwrap();
    assert!(video_filter.contains("fade=t=out:st=11.5:d=0.5"));
    assert!(video_filter.contains("drawtext="));
    assert_eq!(
        command.output_value("-af"),
        Some(storyreel_models::encoding::AUDIO_NORMALIZATION_FILTER)
    );
    assert_eq!(command.output_value("-frames:v"), Some("360"));

    assert!(harness.scratch_entries().is_empty());
}

#[tokio::test]
async fn test_image_style_follows_intensity() {
    let harness = Harness::builder().build();
    let mut request = common::request();
    request.story.intensity = "spicy".to_string();

    let result = harness
        .orchestrator
        .generate(&PostId::from("post-style"), &request, &ProgressSender::noop())
        .await;
    assert!(result.is_success());

    let requests = harness.images.requests.lock().unwrap();
    assert_eq!(requests[0].style.as_str(), "dramatic_sensual");
    assert!(requests[0].scene.is_none());
}

#[tokio::test]
async fn test_speech_failure_stops_before_encoding() {
    let harness = Harness::builder().speech(SpeechMode::Fail).build();

    let result = harness
        .orchestrator
        .generate(&PostId::from("post-c"), &common::request(), &ProgressSender::noop())
        .await;

    let failure = result.failure_info().expect("generation should fail");
    assert_eq!(failure.stage, GenerationStage::Narration);
    assert!(failure.reason.contains("voice backend down"));
    assert_eq!(harness.encoder.count(), 0);
    assert!(harness.mixer.calls.lock().unwrap().is_empty());

    // The image written before the failure is gone with the scratch area
    assert_eq!(harness.images.calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    assert!(harness.scratch_entries().is_empty());
    assert!(harness.output_entries().is_empty());
}

#[tokio::test]
async fn test_short_story_fails_before_generation() {
    let harness = Harness::builder()
        .text(FakeText::new("Too short to narrate."))
        .build();

    let result = harness
        .orchestrator
        .generate(&PostId::from("post-short"), &common::request(), &ProgressSender::noop())
        .await;

    let failure = result.failure_info().unwrap();
    assert_eq!(failure.stage, GenerationStage::Precondition);
    assert_eq!(harness.images.calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    assert_eq!(harness.speech.calls.load(std::sync::atomic::Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_missing_story_fails_precondition() {
    let harness = Harness::builder().text(FakeText::missing()).build();

    let result = harness
        .orchestrator
        .generate(&PostId::from("post-missing"), &common::request(), &ProgressSender::noop())
        .await;

    let failure = result.failure_info().unwrap();
    assert_eq!(failure.stage, GenerationStage::Precondition);
    assert!(failure.reason.contains("could not be retrieved"));
}

#[tokio::test]
async fn test_invalid_request_fails_precondition() {
    let harness = Harness::builder().build();
    let mut request = common::request();
    request.hook = Some("x".repeat(500));

    let result = harness
        .orchestrator
        .generate(&PostId::from("post-invalid"), &request, &ProgressSender::noop())
        .await;

    assert_eq!(result.failure_info().unwrap().stage, GenerationStage::Precondition);
    assert_eq!(harness.images.calls.load(std::sync::atomic::Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_dimension_mismatch_fails_validation() {
    let harness = Harness::builder()
        .inspector(FakeInspector {
            width: 720,
            height: 1280,
            duration: NARRATION_SECS,
        })
        .build();

    let result = harness
        .orchestrator
        .generate(&PostId::from("post-dims"), &common::request(), &ProgressSender::noop())
        .await;

    let failure = result.failure_info().unwrap();
    assert_eq!(failure.stage, GenerationStage::Validation);
    assert!(failure.reason.contains("720x1280"));
    assert!(harness.output_entries().is_empty());
}

#[tokio::test]
async fn test_encoder_failure_surfaces_diagnostic() {
    let harness = Harness::builder().encoder_fails().build();

    let result = harness
        .orchestrator
        .generate(&PostId::from("post-enc"), &common::request(), &ProgressSender::noop())
        .await;

    let failure = result.failure_info().unwrap();
    assert_eq!(failure.stage, GenerationStage::Encoding);
    assert!(failure.reason.contains("Error opening input"));
}

#[tokio::test]
async fn test_music_track_is_mixed_and_cleaned_up() {
    let harness = Harness::builder().music_track("velvet-night").build();
    let mut request = common::request();
    request.music = MusicPreference::Track("velvet-night".to_string());

    let result = harness
        .orchestrator
        .generate(&PostId::from("post-music"), &request, &ProgressSender::noop())
        .await;

    let video = result.video().unwrap();
    assert_eq!(video.metadata.music_track.as_deref(), Some("velvet-night"));

    let mixes = harness.mixer.calls.lock().unwrap();
    assert_eq!(mixes.len(), 1);
    assert_eq!(mixes[0].music_volume, storyreel_models::encoding::MUSIC_VOLUME);
    assert!(!mixes[0].output.exists());
}

#[tokio::test]
async fn test_unknown_music_track_fails_music_stage() {
    let harness = Harness::builder().build();
    let mut request = common::request();
    request.music = MusicPreference::Track("missing".to_string());

    let result = harness
        .orchestrator
        .generate(&PostId::from("post-nomusic"), &request, &ProgressSender::noop())
        .await;

    assert_eq!(result.failure_info().unwrap().stage, GenerationStage::Music);
    assert_eq!(harness.encoder.count(), 0);
}

#[tokio::test]
async fn test_existing_output_is_never_overwritten() {
    let harness = Harness::builder().build();
    let output = harness.dir.path().join("taken.mp4");
    std::fs::write(&output, b"keep me").unwrap();
    let mut request = common::request();
    request.output_path = Some(output.clone());

    let result = harness
        .orchestrator
        .generate(&PostId::from("post-taken"), &request, &ProgressSender::noop())
        .await;

    assert_eq!(result.failure_info().unwrap().stage, GenerationStage::Precondition);
    assert_eq!(std::fs::read(&output).unwrap(), b"keep me");
}

#[tokio::test]
async fn test_multi_slide_success() {
    let harness = Harness::builder().build();
    let mut request = common::request();
    request.preset = Preset::MultiSlide;
    request.music = MusicPreference::None;

    let result = harness
        .orchestrator
        .generate(&PostId::from("post-slides"), &request, &ProgressSender::noop())
        .await;

    let video = result.video().expect("multi-slide should succeed");
    assert_eq!(video.metadata.slide_count, 3);
    assert_eq!(video.metadata.image_prompts.len(), 3);
    assert_eq!(video.duration_secs, NARRATION_SECS);

    let requests = harness.images.requests.lock().unwrap();
    assert!(requests.iter().all(|r| r.scene.is_some()));

    // Three silent segments, then the concat mux
    let commands = harness.encoder.commands.lock().unwrap();
    assert_eq!(commands.len(), 4);
    let filters: Vec<&str> = commands[..3]
        .iter()
        .map(|c| c.output_value("-vf").unwrap())
        .collect();
    assert!(filters[0].contains("drawtext=") && filters[0].contains("fade=t=in"));
    assert!(!filters[0].contains("fade=t=out"));
    assert!(!filters[1].contains("drawtext=") && !filters[1].contains("fade="));
    assert!(filters[2].contains("fade=t=out") && !filters[2].contains("fade=t=in"));
    assert_eq!(commands[3].output_value("-c:v"), Some("copy"));
    assert!(commands[..3]
        .iter()
        .all(|c| c.build_args().contains(&"-an".to_string())));

    let single = harness.orchestrator.estimate(&common::request());
    assert!(video.metadata.estimated_cost.total_usd > 0.0);
    assert!(harness.orchestrator.estimate(&request).total_usd > single.total_usd);
}

#[tokio::test]
async fn test_progress_events_are_ordered() {
    let harness = Harness::builder().build();
    let (sender, mut events) = progress::channel(64);

    let result = harness
        .orchestrator
        .generate(&PostId::from("post-progress"), &common::request(), &sender)
        .await;
    drop(sender);
    assert!(result.is_success());

    let mut seen = Vec::new();
    while let Some(event) = events.recv().await {
        seen.push(event.progress());
    }
    assert!(!seen.is_empty());
    assert!(seen.windows(2).all(|w| w[0] <= w[1]), "{seen:?}");
    assert!(*seen.last().unwrap() < 100);
}
