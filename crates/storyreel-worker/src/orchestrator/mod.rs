//! Generation pipeline.
//!
//! One call to [`GenerationOrchestrator::generate`] runs every stage in order
//! and returns a [`GenerationResult`]; nothing escapes as an error. Stage
//! failures carry the stage they happened in.

mod slideshow;

use chrono::Utc;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::fs::OpenOptions;
use tracing::{debug, Instrument};
use validator::Validate;

use storyreel_media::{
    AudioMixer, EncodeRunner, ExpectedOutput, FfmpegAudioMixer, FfmpegCommand, FfmpegProgress,
    FfmpegRunner, FfprobeInspector, FilterGraphBuilder, MediaError, MediaInspector, MixRequest,
    OutputValidator, ProgressCallback,
};
use storyreel_models::encoding::{MUSIC_VOLUME, NARRATION_VOLUME};
use storyreel_models::{
    CostBreakdown, CostTable, EncoderSettings, GeneratedVideo, GenerationFailure,
    GenerationMetadata, GenerationRequest, GenerationResult, GenerationStage, MusicPreference,
    PostId, Preset,
};

use crate::capabilities::{
    CapabilityResult, GeneratedImage, HttpImageGenerator, HttpSpeechSynthesizer, HttpTextSource,
    ImageGenerator, ImageRequest, LocalMusicLibrary, MusicLibrary, MusicTrack, SpeechSynthesizer,
    TextSource,
};
use crate::config::{CapabilityEndpoints, WorkerConfig};
use crate::cost::{estimate_cost, CostUsage};
use crate::logging::GenerationLogger;
use crate::metrics;
use crate::progress::{ProgressEvent, ProgressSender};
use crate::scene::{SceneExcerpt, SceneSelector};
use crate::scratch::{sanitize, ScratchArea};

/// Everything the pipeline calls out to.
#[derive(Clone)]
pub struct Capabilities {
    pub images: Arc<dyn ImageGenerator>,
    pub speech: Arc<dyn SpeechSynthesizer>,
    pub music: Arc<dyn MusicLibrary>,
    pub text: Arc<dyn TextSource>,
    pub mixer: Arc<dyn AudioMixer>,
    pub encoder: Arc<dyn EncodeRunner>,
    pub inspector: Arc<dyn MediaInspector>,
}

impl Capabilities {
    /// Production wiring: HTTP generators, the local music library and the
    /// FFmpeg tools on `PATH`.
    pub fn from_config(
        endpoints: &CapabilityEndpoints,
        config: &WorkerConfig,
    ) -> CapabilityResult<Self> {
        let inspector: Arc<dyn MediaInspector> = Arc::new(FfprobeInspector);
        let encoder: Arc<dyn EncodeRunner> =
            Arc::new(FfmpegRunner::new().with_timeout(config.encode_timeout.as_secs()));

        Ok(Self {
            images: Arc::new(HttpImageGenerator::new(endpoints)?),
            speech: Arc::new(HttpSpeechSynthesizer::new(endpoints, inspector.clone())?),
            music: Arc::new(LocalMusicLibrary::new(&config.music_root)),
            text: Arc::new(HttpTextSource::new(endpoints)?),
            mixer: Arc::new(FfmpegAudioMixer::new(encoder.clone(), inspector.clone())),
            encoder,
            inspector,
        })
    }
}

/// A failure tagged with the stage it happened in.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct StageError {
    pub stage: GenerationStage,
    pub reason: String,
}

impl StageError {
    pub fn new(stage: GenerationStage, reason: impl fmt::Display) -> Self {
        Self {
            stage,
            reason: reason.to_string(),
        }
    }

    /// Media failures keep the tool's last diagnostic line.
    pub fn media(stage: GenerationStage, error: &MediaError) -> Self {
        Self::new(stage, error.diagnostic())
    }
}

impl From<StageError> for GenerationFailure {
    fn from(e: StageError) -> Self {
        GenerationFailure::new(e.stage, e.reason)
    }
}

/// Narration audio ready to be muxed.
#[derive(Debug, Clone)]
pub(crate) struct NarrationAudio {
    pub path: PathBuf,
    /// Authoritative clip duration
    pub duration_secs: f64,
    /// Mixer output, deleted once the video is validated
    pub mixed: Option<PathBuf>,
    pub music_track: Option<String>,
}

/// An encoded video still in the scratch area.
#[derive(Debug)]
pub(crate) struct Rendered {
    pub path: PathBuf,
    pub duration_secs: f64,
    pub images: Vec<GeneratedImage>,
    pub audio: NarrationAudio,
    pub effects: Vec<String>,
    pub slide_count: u32,
}

/// Per-attempt inputs shared by the preset strategies.
pub(crate) struct GenerationContext<'a> {
    pub request: &'a GenerationRequest,
    pub scratch: &'a ScratchArea,
    pub excerpt: &'a SceneExcerpt,
    pub narration_text: &'a str,
    pub progress: &'a ProgressSender,
    pub logger: &'a GenerationLogger,
}

impl GenerationContext<'_> {
    fn enter(&self, stage: GenerationStage) {
        self.progress.send(ProgressEvent::stage(stage));
        self.logger.log_stage(stage, stage.label());
    }
}

/// Part of the total clip covered by one encode, for progress reporting.
#[derive(Debug, Clone, Copy)]
pub(crate) struct EncodeWindow {
    pub offset_secs: f64,
    pub length_secs: f64,
    pub total_secs: f64,
}

impl EncodeWindow {
    pub fn whole(total_secs: f64) -> Self {
        Self {
            offset_secs: 0.0,
            length_secs: total_secs,
            total_secs,
        }
    }

    fn fraction(&self, progress: &FfmpegProgress) -> f64 {
        if self.total_secs <= 0.0 {
            return 0.0;
        }
        let done = self.offset_secs + progress.fraction(self.length_secs) * self.length_secs;
        (done / self.total_secs).clamp(0.0, 1.0)
    }
}

/// Sequences image, narration, music, mixing, encoding and validation.
pub struct GenerationOrchestrator {
    caps: Capabilities,
    config: WorkerConfig,
    costs: CostTable,
    graph: FilterGraphBuilder,
    selector: SceneSelector,
    validator: OutputValidator,
}

impl GenerationOrchestrator {
    pub fn new(
        caps: Capabilities,
        config: WorkerConfig,
        costs: CostTable,
        settings: EncoderSettings,
    ) -> Self {
        let selector = SceneSelector::new(config.excerpt_max_chars);
        let validator = OutputValidator::new(caps.inspector.clone());
        Self {
            graph: FilterGraphBuilder::new(settings),
            selector,
            validator,
            caps,
            config,
            costs,
        }
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.caps
    }

    /// Cost estimate for a request; nothing is generated.
    pub fn estimate(&self, request: &GenerationRequest) -> CostBreakdown {
        estimate_cost(request, &self.costs, self.config.excerpt_max_chars)
    }

    /// Run one generation to completion.
    pub async fn generate(
        &self,
        post_id: &PostId,
        request: &GenerationRequest,
        progress: &ProgressSender,
    ) -> GenerationResult {
        let logger = GenerationLogger::new(post_id, request.preset);
        let span = logger.create_span();

        async {
            let started = Instant::now();
            logger.log_start(&request.story.title);

            match self.run(post_id, request, progress, &logger, started).await {
                Ok(video) => {
                    logger.log_completion(video.duration_secs, video.metadata.latency_ms);
                    GenerationResult::Success(video)
                }
                Err(e) => {
                    logger.log_failure(e.stage, &e.reason);
                    metrics::record_stage_failure(e.stage);
                    GenerationResult::Failure(e.into())
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn run(
        &self,
        post_id: &PostId,
        request: &GenerationRequest,
        progress: &ProgressSender,
        logger: &GenerationLogger,
        started: Instant,
    ) -> Result<GeneratedVideo, StageError> {
        progress.send(ProgressEvent::stage(GenerationStage::Precondition));
        request
            .validate()
            .map_err(|e| StageError::new(GenerationStage::Precondition, format!("invalid request: {e}")))?;

        let output = self.output_path(post_id, request);
        if tokio::fs::try_exists(&output).await.unwrap_or(false) {
            return Err(StageError::new(
                GenerationStage::Precondition,
                format!("output already exists: {}", output.display()),
            ));
        }

        progress.send(ProgressEvent::stage(GenerationStage::Storage));
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                StageError::new(
                    GenerationStage::Storage,
                    format!("could not create output directory {}: {e}", parent.display()),
                )
            })?;
        }
        let scratch = ScratchArea::create(&self.config.scratch_root, post_id, self.config.keep_scratch)
            .await
            .map_err(|e| {
                StageError::new(GenerationStage::Storage, format!("could not create scratch area: {e}"))
            })?;

        let result = self
            .run_in_scratch(request, &scratch, &output, progress, logger, started)
            .await;
        scratch.cleanup().await;
        result
    }

    async fn run_in_scratch(
        &self,
        request: &GenerationRequest,
        scratch: &ScratchArea,
        output: &Path,
        progress: &ProgressSender,
        logger: &GenerationLogger,
        started: Instant,
    ) -> Result<GeneratedVideo, StageError> {
        let text = self
            .caps
            .text
            .fetch(&request.story.text_url)
            .await
            .map_err(|e| {
                StageError::new(
                    GenerationStage::Precondition,
                    format!("story text could not be retrieved: {e}"),
                )
            })?;
        if !SceneSelector::is_plausible_source(&text) {
            return Err(StageError::new(
                GenerationStage::Precondition,
                format!(
                    "story text is too short ({} characters, need {})",
                    text.trim().chars().count(),
                    crate::scene::MIN_SOURCE_CHARS
                ),
            ));
        }

        let excerpt = self.selector.select(&text);
        let narration_text = match request.hook_text() {
            Some(hook) => format!("{} {}", hook, excerpt.text),
            None => excerpt.text.clone(),
        };
        debug!(
            paragraph = excerpt.paragraph,
            score = excerpt.score,
            truncated = excerpt.truncated,
            chars = narration_text.chars().count(),
            "Selected narration excerpt"
        );

        let ctx = GenerationContext {
            request,
            scratch,
            excerpt: &excerpt,
            narration_text: &narration_text,
            progress,
            logger,
        };

        let rendered = match request.preset {
            Preset::SingleImage => self.render_single_image(&ctx).await?,
            Preset::MultiSlide => self.render_multi_slide(&ctx).await?,
        };

        self.validate_render(&ctx, &rendered).await?;

        progress.send(ProgressEvent::Delivering);
        deliver(&rendered.path, output).await?;

        let narration_chars = narration_text.chars().count();
        let estimated_cost = CostUsage {
            preset: request.preset,
            images: rendered.images.len() as u32,
            narration_chars,
            music_used: rendered.audio.music_track.is_some(),
            duration_secs: rendered.duration_secs,
        }
        .price(&self.costs);

        let settings = self.graph.settings();
        Ok(GeneratedVideo {
            video_path: output.to_path_buf(),
            duration_secs: rendered.duration_secs,
            width: settings.width,
            height: settings.height,
            metadata: GenerationMetadata {
                preset: request.preset,
                image_model: rendered
                    .images
                    .first()
                    .map(|i| i.model.clone())
                    .unwrap_or_default(),
                image_prompts: rendered.images.iter().map(|i| i.prompt.clone()).collect(),
                voice: request.voice,
                narration_text,
                narration_chars,
                music_track: rendered.audio.music_track.clone(),
                effects: rendered.effects,
                slide_count: rendered.slide_count,
                latency_ms: started.elapsed().as_millis() as u64,
                estimated_cost,
            },
        })
    }

    async fn render_single_image(&self, ctx: &GenerationContext<'_>) -> Result<Rendered, StageError> {
        ctx.enter(GenerationStage::Image);
        let image = self.generate_image(ctx, None, "image.png").await?;

        let audio = self.prepare_audio(ctx).await?;

        ctx.enter(GenerationStage::Encoding);
        let render = ctx.scratch.path("render.mp4");
        let overlay = ctx.request.overlay_text();
        let invocation = self.graph.build(
            &image.path,
            &audio.path,
            &render,
            audio.duration_secs,
            &overlay,
            &ctx.request.effects,
        );
        self.encode(&invocation.command, EncodeWindow::whole(audio.duration_secs), ctx.progress)
            .await?;

        Ok(Rendered {
            path: render,
            duration_secs: audio.duration_secs,
            images: vec![image],
            effects: invocation.effect_names(),
            audio,
            slide_count: 1,
        })
    }

    async fn generate_image(
        &self,
        ctx: &GenerationContext<'_>,
        scene: Option<String>,
        file_name: &str,
    ) -> Result<GeneratedImage, StageError> {
        let story = &ctx.request.story;
        let request = ImageRequest {
            title: story.title.clone(),
            category: story.category.clone(),
            style: story.intensity().image_style(),
            scene,
        };
        self.caps
            .images
            .generate(&request, &ctx.scratch.path(file_name))
            .await
            .map_err(|e| StageError::new(GenerationStage::Image, e))
    }

    /// Narration, optional music and the mix that fixes the clip duration.
    async fn prepare_audio(&self, ctx: &GenerationContext<'_>) -> Result<NarrationAudio, StageError> {
        ctx.enter(GenerationStage::Narration);
        let speech = self
            .caps
            .speech
            .synthesize(ctx.narration_text, ctx.request.voice, &ctx.scratch.path("narration.mp3"))
            .await
            .map_err(|e| StageError::new(GenerationStage::Narration, e))?;

        ctx.enter(GenerationStage::Music);
        let Some(track) = self.resolve_music(ctx).await? else {
            if speech.duration_secs <= 0.0 {
                return Err(StageError::new(
                    GenerationStage::Narration,
                    "synthesized narration has no duration",
                ));
            }
            return Ok(NarrationAudio {
                path: speech.path,
                duration_secs: speech.duration_secs,
                mixed: None,
                music_track: None,
            });
        };

        ctx.enter(GenerationStage::Mixing);
        let mixed = self
            .caps
            .mixer
            .mix(&MixRequest {
                narration: speech.path,
                music: Some(track.path),
                narration_volume: NARRATION_VOLUME,
                music_volume: MUSIC_VOLUME,
                output: ctx.scratch.path("mixed.wav"),
            })
            .await
            .map_err(|e| StageError::media(GenerationStage::Mixing, &e))?;
        if mixed.duration_secs <= 0.0 {
            return Err(StageError::new(GenerationStage::Mixing, "mixed audio has no duration"));
        }

        Ok(NarrationAudio {
            path: mixed.path.clone(),
            duration_secs: mixed.duration_secs,
            mixed: Some(mixed.path),
            music_track: Some(track.id),
        })
    }

    async fn resolve_music(&self, ctx: &GenerationContext<'_>) -> Result<Option<MusicTrack>, StageError> {
        match &ctx.request.music {
            MusicPreference::None => Ok(None),
            MusicPreference::Auto => {
                let category = &ctx.request.story.category;
                let track = self
                    .caps
                    .music
                    .for_category(category)
                    .await
                    .map_err(|e| StageError::new(GenerationStage::Music, e))?;
                if track.is_none() {
                    ctx.logger
                        .log_warning(&format!("No music for category '{}', continuing without", category));
                }
                Ok(track)
            }
            MusicPreference::Track(id) => self
                .caps
                .music
                .by_id(id)
                .await
                .map_err(|e| StageError::new(GenerationStage::Music, e))?
                .map(Some)
                .ok_or_else(|| StageError::new(GenerationStage::Music, format!("music track not found: {id}"))),
        }
    }

    async fn encode(
        &self,
        command: &FfmpegCommand,
        window: EncodeWindow,
        progress: &ProgressSender,
    ) -> Result<(), StageError> {
        let sender = progress.clone();
        let callback: ProgressCallback = Arc::new(move |p: FfmpegProgress| {
            sender.send(ProgressEvent::encoding(window.fraction(&p)));
        });

        let started = Instant::now();
        let result = self.caps.encoder.run(command, Some(callback)).await;
        metrics::record_encode_duration(started.elapsed().as_secs_f64());
        result.map_err(|e| StageError::media(GenerationStage::Encoding, &e))
    }

    async fn validate_render(&self, ctx: &GenerationContext<'_>, rendered: &Rendered) -> Result<(), StageError> {
        ctx.enter(GenerationStage::Validation);
        let settings = self.graph.settings();
        let expected = ExpectedOutput {
            duration_secs: rendered.duration_secs,
            width: settings.width,
            height: settings.height,
        };
        let report = self.validator.validate(&rendered.path, &expected).await;

        if let Some(mixed) = &rendered.audio.mixed {
            if let Err(e) = tokio::fs::remove_file(mixed).await {
                debug!("Could not remove mixed audio {}: {}", mixed.display(), e);
            }
        }

        if report.passed {
            Ok(())
        } else {
            Err(StageError::new(GenerationStage::Validation, report.summary()))
        }
    }

    /// Final artifact location: the request's explicit path or a unique file
    /// in the output area.
    fn output_path(&self, post_id: &PostId, request: &GenerationRequest) -> PathBuf {
        request.output_path.clone().unwrap_or_else(|| {
            self.config.output_root.join(format!(
                "{}-{}.mp4",
                sanitize(post_id.as_str()),
                Utc::now().format("%Y%m%dT%H%M%S%3f")
            ))
        })
    }
}

/// Move the validated render into the durable output area.
///
/// Never overwrites: the output is created with a hard link, or with an
/// exclusive create when linking across filesystems fails. A partial copy is
/// removed.
async fn deliver(render: &Path, output: &Path) -> Result<(), StageError> {
    match tokio::fs::hard_link(render, output).await {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => return Err(output_exists(output)),
        Err(e) => {
            debug!("Linking {} failed, copying instead: {}", output.display(), e);
            copy_exclusive(render, output).await?;
        }
    }
    if let Err(e) = tokio::fs::remove_file(render).await {
        debug!("Could not remove delivered render {}: {}", render.display(), e);
    }
    Ok(())
}

async fn copy_exclusive(render: &Path, output: &Path) -> Result<(), StageError> {
    let mut target = match OpenOptions::new().write(true).create_new(true).open(output).await {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => return Err(output_exists(output)),
        Err(e) => return Err(write_failed(output, e)),
    };

    let copied: io::Result<()> = async {
        let mut source = tokio::fs::File::open(render).await?;
        tokio::io::copy(&mut source, &mut target).await?;
        target.sync_all().await
    }
    .await;

    if let Err(e) = copied {
        drop(target);
        let _ = tokio::fs::remove_file(output).await;
        return Err(write_failed(output, e));
    }
    Ok(())
}

fn output_exists(output: &Path) -> StageError {
    StageError::new(
        GenerationStage::Storage,
        format!("output already exists: {}", output.display()),
    )
}

fn write_failed(output: &Path, e: io::Error) -> StageError {
    StageError::new(
        GenerationStage::Storage,
        format!("could not write {}: {e}", output.display()),
    )
}
