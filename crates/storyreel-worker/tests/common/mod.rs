//! In-memory capability fakes shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

use storyreel_media::{
    AudioMixer, EncodeRunner, FfmpegCommand, MediaError, MediaInfo, MediaInspector, MediaResult,
    MixRequest, MixedAudio, ProgressCallback,
};
use storyreel_models::{CostTable, EncoderSettings, GenerationRequest, StoryRef};
use storyreel_worker::capabilities::{
    CapabilityError, CapabilityResult, GeneratedImage, ImageGenerator, ImageRequest, MusicLibrary,
    MusicTrack, SpeechSynthesizer, SynthesizedSpeech, TextSource,
};
use storyreel_worker::{Capabilities, GenerationOrchestrator, WorkerConfig};

pub const STORY: &str = "The gala was loud and bright, full of people she did not know at all.\n\n\
Her heart raced when he found her on the balcony. He leaned close enough that she felt his breath. \
The kiss he promised hung between them like a secret.";

pub const EXCERPT: &str = "Her heart raced when he found her on the balcony. He leaned close enough \
that she felt his breath. The kiss he promised hung between them like a secret.";

pub const NARRATION_SECS: f64 = 12.0;

pub fn request() -> GenerationRequest {
    let mut request = GenerationRequest::new(StoryRef {
        text_url: "https://stories.example.com/gala.txt".to_string(),
        title: "The Gala".to_string(),
        category: "Billionaire".to_string(),
        intensity: "moderate".to_string(),
    });
    request.caption = "He found her on the balcony".to_string();
    request
}

#[derive(Default)]
pub struct FakeImages {
    pub calls: AtomicUsize,
    pub requests: Mutex<Vec<ImageRequest>>,
}

#[async_trait]
impl ImageGenerator for FakeImages {
    async fn generate(&self, request: &ImageRequest, output: &Path) -> CapabilityResult<GeneratedImage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        tokio::fs::write(output, b"png").await?;
        Ok(GeneratedImage {
            path: output.to_path_buf(),
            prompt: format!("{} ({})", request.title, request.style.as_str()),
            model: "fake-image-1".to_string(),
        })
    }
}

#[derive(Clone, Copy, PartialEq)]
pub enum SpeechMode {
    Ok,
    Fail,
    Panic,
}

pub struct FakeSpeech {
    pub mode: SpeechMode,
    pub calls: AtomicUsize,
    pub texts: Mutex<Vec<String>>,
}

impl FakeSpeech {
    pub fn new(mode: SpeechMode) -> Self {
        Self {
            mode,
            calls: AtomicUsize::new(0),
            texts: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for FakeSpeech {
    async fn synthesize(
        &self,
        text: &str,
        _voice: storyreel_models::Voice,
        output: &Path,
    ) -> CapabilityResult<SynthesizedSpeech> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.texts.lock().unwrap().push(text.to_string());
        match self.mode {
            SpeechMode::Ok => {}
            SpeechMode::Fail => {
                return Err(CapabilityError::Status {
                    service: "speech",
                    status: 500,
                    body: "voice backend down".to_string(),
                })
            }
            SpeechMode::Panic => panic!("speech adapter exploded"),
        }
        tokio::fs::write(output, b"mp3").await?;
        Ok(SynthesizedSpeech {
            path: output.to_path_buf(),
            duration_secs: NARRATION_SECS,
        })
    }
}

#[derive(Default)]
pub struct FakeMusic {
    pub track: Option<MusicTrack>,
}

#[async_trait]
impl MusicLibrary for FakeMusic {
    async fn for_category(&self, _category: &str) -> CapabilityResult<Option<MusicTrack>> {
        Ok(self.track.clone())
    }

    async fn by_id(&self, id: &str) -> CapabilityResult<Option<MusicTrack>> {
        Ok(self.track.clone().filter(|t| t.id == id))
    }
}

/// Text source that can hold callers until released.
pub struct FakeText {
    pub text: Option<String>,
    gate: Option<Arc<Semaphore>>,
}

impl FakeText {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            gate: None,
        }
    }

    pub fn missing() -> Self {
        Self { text: None, gate: None }
    }

    /// Block fetches until the returned semaphore gets a permit.
    pub fn gated(text: impl Into<String>) -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        (
            Self {
                text: Some(text.into()),
                gate: Some(gate.clone()),
            },
            gate,
        )
    }
}

#[async_trait]
impl TextSource for FakeText {
    async fn fetch(&self, url: &str) -> CapabilityResult<String> {
        if let Some(gate) = &self.gate {
            let permit = gate
                .acquire()
                .await
                .map_err(|_| CapabilityError::unavailable("gate closed"))?;
            permit.forget();
        }
        self.text
            .clone()
            .ok_or_else(|| CapabilityError::NotFound(url.to_string()))
    }
}

#[derive(Default)]
pub struct FakeMixer {
    pub calls: Mutex<Vec<MixRequest>>,
}

#[async_trait]
impl AudioMixer for FakeMixer {
    async fn mix(&self, request: &MixRequest) -> MediaResult<MixedAudio> {
        self.calls.lock().unwrap().push(request.clone());
        tokio::fs::write(&request.output, b"wav").await?;
        Ok(MixedAudio {
            path: request.output.clone(),
            duration_secs: NARRATION_SECS,
        })
    }
}

/// Records commands and writes a placeholder output file.
#[derive(Default)]
pub struct FakeEncoder {
    pub commands: Mutex<Vec<FfmpegCommand>>,
    pub fail: bool,
}

impl FakeEncoder {
    pub fn count(&self) -> usize {
        self.commands.lock().unwrap().len()
    }
}

#[async_trait]
impl EncodeRunner for FakeEncoder {
    async fn run(&self, cmd: &FfmpegCommand, _on_progress: Option<ProgressCallback>) -> MediaResult<()> {
        self.commands.lock().unwrap().push(cmd.clone());
        if self.fail {
            return Err(MediaError::ffmpeg_failed(
                "FFmpeg exited with non-zero status",
                Some("Error opening input".to_string()),
                Some(1),
            ));
        }
        tokio::fs::write(cmd.output_path(), b"mp4").await?;
        Ok(())
    }
}

pub struct FakeInspector {
    pub width: u32,
    pub height: u32,
    pub duration: f64,
}

impl Default for FakeInspector {
    fn default() -> Self {
        Self {
            width: 1080,
            height: 1920,
            duration: NARRATION_SECS,
        }
    }
}

#[async_trait]
impl MediaInspector for FakeInspector {
    async fn inspect(&self, path: &Path) -> MediaResult<MediaInfo> {
        if !path.exists() {
            return Err(MediaError::FileNotFound(path.to_path_buf()));
        }
        Ok(MediaInfo {
            duration: self.duration,
            width: Some(self.width),
            height: Some(self.height),
            has_audio: true,
            video_codec: Some("h264".to_string()),
            size: 3,
        })
    }
}

/// A wired-up orchestrator plus handles on every fake.
pub struct Harness {
    pub dir: tempfile::TempDir,
    pub config: WorkerConfig,
    pub images: Arc<FakeImages>,
    pub speech: Arc<FakeSpeech>,
    pub mixer: Arc<FakeMixer>,
    pub encoder: Arc<FakeEncoder>,
    pub orchestrator: Arc<GenerationOrchestrator>,
}

pub struct HarnessBuilder {
    speech: SpeechMode,
    text: FakeText,
    music: FakeMusic,
    inspector: FakeInspector,
    encoder_fails: bool,
    max_concurrent: usize,
}

impl Default for HarnessBuilder {
    fn default() -> Self {
        Self {
            speech: SpeechMode::Ok,
            text: FakeText::new(STORY),
            music: FakeMusic::default(),
            inspector: FakeInspector::default(),
            encoder_fails: false,
            max_concurrent: 2,
        }
    }
}

impl HarnessBuilder {
    pub fn speech(mut self, mode: SpeechMode) -> Self {
        self.speech = mode;
        self
    }

    pub fn text(mut self, text: FakeText) -> Self {
        self.text = text;
        self
    }

    pub fn music_track(mut self, id: &str) -> Self {
        self.music.track = Some(MusicTrack {
            id: id.to_string(),
            path: PathBuf::from(format!("/music/{id}.mp3")),
        });
        self
    }

    pub fn inspector(mut self, inspector: FakeInspector) -> Self {
        self.inspector = inspector;
        self
    }

    pub fn encoder_fails(mut self) -> Self {
        self.encoder_fails = true;
        self
    }

    pub fn build(self) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let config = WorkerConfig {
            scratch_root: dir.path().join("scratch"),
            output_root: dir.path().join("output"),
            music_root: dir.path().join("music"),
            max_concurrent_generations: self.max_concurrent,
            settle_retries: 1,
            ..Default::default()
        };

        let images = Arc::new(FakeImages::default());
        let speech = Arc::new(FakeSpeech::new(self.speech));
        let mixer = Arc::new(FakeMixer::default());
        let encoder = Arc::new(FakeEncoder {
            fail: self.encoder_fails,
            ..Default::default()
        });

        let caps = Capabilities {
            images: images.clone(),
            speech: speech.clone(),
            music: Arc::new(self.music),
            text: Arc::new(self.text),
            mixer: mixer.clone(),
            encoder: encoder.clone(),
            inspector: Arc::new(self.inspector),
        };
        let orchestrator = Arc::new(GenerationOrchestrator::new(
            caps,
            config.clone(),
            CostTable::default(),
            EncoderSettings::default(),
        ));

        Harness {
            dir,
            config,
            images,
            speech,
            mixer,
            encoder,
            orchestrator,
        }
    }
}

impl Harness {
    pub fn builder() -> HarnessBuilder {
        HarnessBuilder::default()
    }

    /// Files left in a directory (empty when it does not exist).
    pub fn entries(path: &Path) -> Vec<PathBuf> {
        std::fs::read_dir(path)
            .map(|entries| entries.filter_map(|e| e.ok()).map(|e| e.path()).collect())
            .unwrap_or_default()
    }

    pub fn scratch_entries(&self) -> Vec<PathBuf> {
        Self::entries(&self.config.scratch_root)
    }

    pub fn output_entries(&self) -> Vec<PathBuf> {
        Self::entries(&self.config.output_root)
    }
}
