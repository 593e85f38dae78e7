//! Session state: the current clip, its parameters, and the last complete
//! analysis.
//!
//! Every change that invalidates cached results bumps a shared generation
//! counter. A [`RecomputeJob`] remembers the generation it was started for and
//! gives up between stages once the counter has moved on; [`Session::commit`]
//! refuses outputs from older generations. Readers only ever see a whole
//! [`AnalysisSnapshot`], swapped in one step.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::analysis::{
    analyze_pitch, build_spectrogram, post_process, summarize, AnalysisParameters, ParameterPatch,
    PitchFrame, RecomputeScope, SpectrogramMatrix, SpectrogramSettings, TrackSummary,
};
use crate::audio::SampleBuffer;
use crate::error::{Error, Result};
use crate::render::{render_base, with_progress, RenderState, Scene, ViewSettings};

/// Results computed together from one buffer and one set of settings.
#[derive(Debug)]
pub struct AnalysisSnapshot {
    pub buffer: Arc<SampleBuffer>,
    pub params: AnalysisParameters,
    pub spectrogram_settings: SpectrogramSettings,
    /// Estimator output before median filtering and octave correction.
    pub raw_track: Arc<Vec<PitchFrame>>,
    pub track: Arc<Vec<PitchFrame>>,
    pub spectrogram: Arc<SpectrogramMatrix>,
}

impl AnalysisSnapshot {
    pub fn summary(&self) -> TrackSummary {
        summarize(&self.track)
    }

    pub fn scene(&self) -> Scene<'_> {
        Scene {
            spectrogram: &self.spectrogram,
            track: &self.track,
            frame_size: self.params.frame_size,
            hop_size: self.params.hop_size,
            sample_rate: self.buffer.sample_rate(),
            samples: self.buffer.len(),
        }
    }

    /// Stages that must rerun for this snapshot to match the given inputs.
    fn stale_scope(
        &self,
        buffer: &Arc<SampleBuffer>,
        params: &AnalysisParameters,
        spectrogram_settings: &SpectrogramSettings,
    ) -> RecomputeScope {
        if !Arc::ptr_eq(&self.buffer, buffer) {
            return RecomputeScope::FULL;
        }
        let mut scope = self.params.merged(&ParameterPatch::from(params)).1;
        if &self.spectrogram_settings != spectrogram_settings {
            scope = scope.union(RecomputeScope::SPECTROGRAM);
        }
        scope
    }
}

pub struct Session {
    buffer: Option<Arc<SampleBuffer>>,
    params: AnalysisParameters,
    spectrogram_settings: SpectrogramSettings,
    view: ViewSettings,
    snapshot: Option<Arc<AnalysisSnapshot>>,
    generation: Arc<AtomicU64>,
    /// Generation of the most recent job not yet committed.
    pending: Option<u64>,
}

impl Session {
    pub fn new(
        params: AnalysisParameters,
        spectrogram_settings: SpectrogramSettings,
        view: ViewSettings,
    ) -> Result<Self> {
        params.validate()?;
        spectrogram_settings.validate()?;
        view.validate()?;
        Ok(Self {
            buffer: None,
            params,
            spectrogram_settings,
            view,
            snapshot: None,
            generation: Arc::new(AtomicU64::new(0)),
            pending: None,
        })
    }

    pub fn params(&self) -> &AnalysisParameters {
        &self.params
    }

    pub fn spectrogram_settings(&self) -> &SpectrogramSettings {
        &self.spectrogram_settings
    }

    pub fn view(&self) -> &ViewSettings {
        &self.view
    }

    pub fn buffer(&self) -> Option<&Arc<SampleBuffer>> {
        self.buffer.as_ref()
    }

    /// Last complete analysis, if any.
    pub fn snapshot(&self) -> Option<Arc<AnalysisSnapshot>> {
        self.snapshot.clone()
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// True between [`Session::begin_recompute`] and the commit of that job's
    /// output, whether the output is installed or dropped as stale.
    pub fn is_analyzing(&self) -> bool {
        self.pending.is_some()
    }

    /// Replace the clip and recompute everything.
    pub fn load_buffer(&mut self, buffer: SampleBuffer) -> Result<()> {
        self.stage_buffer(buffer)?;
        self.recompute(RecomputeScope::FULL);
        Ok(())
    }

    /// Replace the clip without computing. Outstanding jobs become stale.
    pub fn stage_buffer(&mut self, buffer: SampleBuffer) -> Result<()> {
        if buffer.channels() != 1 {
            return Err(Error::InvalidBuffer(format!(
                "analysis expects mono audio, got {} channels",
                buffer.channels()
            )));
        }
        self.params.warn_for_sample_rate(buffer.sample_rate());
        log::info!(
            "Loaded {:.2}s of audio at {} Hz",
            buffer.duration(),
            buffer.sample_rate()
        );
        self.buffer = Some(Arc::new(buffer));
        self.bump();
        Ok(())
    }

    /// Apply `patch` and rerun the stages it affects.
    ///
    /// The merged parameters are validated first; on error nothing changes.
    pub fn set_parameters(&mut self, patch: &ParameterPatch) -> Result<RecomputeScope> {
        let scope = self.stage_parameters(patch)?;
        if !scope.is_empty() {
            self.recompute(scope);
        }
        Ok(scope)
    }

    /// Apply `patch` without computing, returning the stages it invalidated.
    pub fn stage_parameters(&mut self, patch: &ParameterPatch) -> Result<RecomputeScope> {
        let (next, scope) = self.params.merged(patch);
        next.validate()?;
        if scope.is_empty() {
            return Ok(scope);
        }
        if let Some(buffer) = &self.buffer {
            next.warn_for_sample_rate(buffer.sample_rate());
        }
        log::debug!("Parameters changed, invalidating {:?}", scope);
        self.params = next;
        self.bump();
        Ok(scope)
    }

    /// Replace the spectrogram settings and rebuild only the spectrogram.
    pub fn set_spectrogram_settings(&mut self, settings: SpectrogramSettings) -> Result<()> {
        settings.validate()?;
        if settings == self.spectrogram_settings {
            return Ok(());
        }
        self.spectrogram_settings = settings;
        self.bump();
        self.recompute(RecomputeScope::SPECTROGRAM);
        Ok(())
    }

    /// View changes only affect drawing.
    pub fn set_view(&mut self, view: ViewSettings) -> Result<()> {
        view.validate()?;
        self.view = view;
        Ok(())
    }

    /// Draw the last complete snapshot with the playback line at `progress`.
    pub fn request_redraw(&self, progress: f64) -> Option<RenderState> {
        let snapshot = self.snapshot.as_ref()?;
        let scene = snapshot.scene();
        let base = render_base(&scene, &self.view);
        Some(with_progress(&base, &scene, &self.view, progress))
    }

    /// Start a recompute of at least `scope` for the current inputs.
    ///
    /// Stages whose cached results no longer match the current inputs are
    /// added to `scope`. Returns `None` when no buffer is loaded.
    pub fn begin_recompute(&mut self, scope: RecomputeScope) -> Option<RecomputeJob> {
        let buffer = self.buffer.clone()?;
        let scope = match &self.snapshot {
            Some(prev) => {
                scope.union(prev.stale_scope(&buffer, &self.params, &self.spectrogram_settings))
            }
            None => RecomputeScope::FULL,
        };
        let generation = self.bump();
        self.pending = Some(generation);

        Some(RecomputeJob {
            generation,
            current: Arc::clone(&self.generation),
            scope,
            buffer,
            params: self.params.clone(),
            spectrogram_settings: self.spectrogram_settings.clone(),
            previous: self.snapshot.clone(),
        })
    }

    /// Install `output` if it is still current. Stale outputs are dropped and
    /// `false` is returned; the session stops reporting the dropped job as in
    /// flight.
    pub fn commit(&mut self, output: RecomputeOutput) -> bool {
        let current = self.generation();
        if output.generation != current {
            log::debug!(
                "Discarding analysis for generation {} (current {})",
                output.generation,
                current
            );
            if self.pending == Some(output.generation) {
                self.pending = None;
            }
            return false;
        }

        let summary = output.snapshot.summary();
        log::info!(
            "Analysis: {} frames, {:.0}% voiced, median pitch {}",
            summary.frames,
            summary.voiced_ratio * 100.0,
            summary
                .median_pitch
                .map_or_else(|| "n/a".to_string(), |p| format!("{:.1} Hz", p))
        );

        self.snapshot = Some(Arc::new(output.snapshot));
        self.pending = None;
        true
    }

    fn recompute(&mut self, scope: RecomputeScope) {
        let Some(job) = self.begin_recompute(scope) else {
            return;
        };
        if let Some(output) = job.run() {
            self.commit(output);
        }
    }

    fn bump(&mut self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }
}

/// Inputs for one recompute, detached from the session so it can run on
/// another thread.
#[derive(Debug)]
pub struct RecomputeJob {
    generation: u64,
    current: Arc<AtomicU64>,
    scope: RecomputeScope,
    buffer: Arc<SampleBuffer>,
    params: AnalysisParameters,
    spectrogram_settings: SpectrogramSettings,
    previous: Option<Arc<AnalysisSnapshot>>,
}

/// A finished job, waiting for [`Session::commit`].
#[derive(Debug)]
pub struct RecomputeOutput {
    generation: u64,
    snapshot: AnalysisSnapshot,
}

impl RecomputeOutput {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn snapshot(&self) -> &AnalysisSnapshot {
        &self.snapshot
    }
}

impl RecomputeJob {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn scope(&self) -> RecomputeScope {
        self.scope
    }

    /// Run the invalidated stages, reusing the rest from the previous
    /// snapshot. Returns `None` as soon as a newer generation exists.
    pub fn run(self) -> Option<RecomputeOutput> {
        let started = Instant::now();
        let previous = self.previous.as_deref();

        self.check_current()?;
        let raw_track = match previous {
            Some(prev) if !self.scope.pitch_track => Arc::clone(&prev.raw_track),
            _ => Arc::new(analyze_pitch(&self.buffer, &self.params)),
        };

        self.check_current()?;
        let track = match previous {
            Some(prev) if !self.scope.pitch_track && !self.scope.post_process => {
                Arc::clone(&prev.track)
            }
            _ => Arc::new(post_process(&raw_track, &self.params)),
        };

        self.check_current()?;
        let spectrogram = match previous {
            Some(prev) if !self.scope.spectrogram => Arc::clone(&prev.spectrogram),
            _ => Arc::new(build_spectrogram(&self.buffer, &self.spectrogram_settings)),
        };

        self.check_current()?;
        log::debug!(
            "Recompute {:?} for generation {} took {:.1}ms",
            self.scope,
            self.generation,
            started.elapsed().as_secs_f64() * 1000.0
        );

        Some(RecomputeOutput {
            generation: self.generation,
            snapshot: AnalysisSnapshot {
                buffer: self.buffer,
                params: self.params,
                spectrogram_settings: self.spectrogram_settings,
                raw_track,
                track,
                spectrogram,
            },
        })
    }

    fn check_current(&self) -> Option<()> {
        (self.current.load(Ordering::SeqCst) == self.generation).then_some(())
    }
}
