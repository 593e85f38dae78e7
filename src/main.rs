mod cli;
mod config;
mod encode;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use cli::Cli;
use encode::ffmpeg::{video_frame_count, FfmpegEncoder, VideoOptions};
use tonescope::analysis::{PitchFrame, TrackSummary};
use tonescope::audio::{decode, wav};
use tonescope::render::timeline::center_sample;
use tonescope::render::{render_base, with_progress};
use tonescope::{AnalysisSnapshot, Session};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let mut cli = Cli::parse();

    let cfg = match config::resolve_config_path(cli.config.as_deref()) {
        Some(path) => match config::load_config(&path) {
            Ok(cfg) => {
                log::info!("Loaded config from {}", path.display());
                cfg
            }
            Err(err) => {
                log::warn!("{:#}", err);
                config::Config::default()
            }
        },
        None => config::Config::default(),
    };

    // Merge: config values apply only when CLI is at its default
    if cli.width == 1280 { cli.width = cfg.view.width; }
    if cli.height == 720 { cli.height = cfg.view.height; }
    if cli.fps == 30 { cli.fps = cfg.output.fps; }
    if cli.crf == 18 { cli.crf = cfg.output.crf; }
    if cli.codec == "libx264" { cli.codec = cfg.output.codec; }
    if cli.pix_fmt == "yuv420p" { cli.pix_fmt = cfg.output.pix_fmt; }

    let (params, _) = cfg.analysis.merged(&cli.analysis_patch());

    let mut spectrogram = cfg.spectrogram;
    if let Some(v) = cli.fft_size { spectrogram.fft_size = v; }
    if let Some(v) = cli.spectrogram_hop { spectrogram.hop_size = v; }
    if let Some(v) = cli.spectrogram_max_freq { spectrogram.max_frequency = v; }

    let mut view = cfg.view;
    view.width = cli.width;
    view.height = cli.height;
    if let Some(v) = cli.view_min_hz { view.view_min_hz = v; }
    if let Some(v) = cli.view_max_hz { view.view_max_hz = v; }
    if let Some(v) = cli.colors { view.color_scheme = v.into(); }
    if let Some(v) = cli.brightness { view.brightness = v; }
    if let Some(v) = cli.contrast { view.contrast = v; }

    if !cli.input.exists() {
        anyhow::bail!("Input file not found: {}", cli.input.display());
    }

    log::info!("tonescope - pitch contour and spectrogram renderer");
    log::info!("Input: {}", cli.input.display());
    log::info!(
        "YIN: frame {} hop {}, {:?} / {:?}, {:.0}-{:.0} Hz",
        params.frame_size,
        params.hop_size,
        params.difference_method,
        params.threshold_strategy,
        params.min_frequency,
        params.max_frequency
    );

    let mut session = Session::new(params, spectrogram, view).context("Invalid settings")?;

    // 1. Decode audio
    log::info!("Decoding audio...");
    let buffer = decode::decode_audio(&cli.input)
        .with_context(|| format!("Failed to decode {}", cli.input.display()))?;

    // 2. Analyze
    log::info!("Analyzing...");
    session.load_buffer(buffer)?;
    let snapshot = session.snapshot().context("Analysis produced no result")?;

    // 3. Exports
    if let Some(ref path) = cli.wav {
        wav::export_wav(&snapshot.buffer, path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        log::info!("Wrote WAV: {}", path.display());
    }

    if let Some(ref path) = cli.json {
        write_pitch_json(&snapshot, path)?;
        log::info!("Wrote pitch track: {}", path.display());
    }

    // 4. Still image
    if let Some(ref path) = cli.image {
        let state = session
            .request_redraw(cli.progress)
            .context("Nothing to draw")?;
        let mut encoder = FfmpegEncoder::still(path, state.canvas.width(), state.canvas.height())?;
        encoder.write_frame(state.canvas.pixels())?;
        encoder.finish()?;
        log::info!("Wrote image: {}", path.display());
    }

    // 5. Video
    if let Some(ref path) = cli.output {
        let options = VideoOptions {
            fps: cli.fps,
            codec: &cli.codec,
            pix_fmt: &cli.pix_fmt,
            crf: cli.crf,
            bitrate: cli.bitrate.as_deref(),
        };
        render_video(&session, &snapshot, &cli.input, path, &options)?;
        log::info!("Done! Output: {}", path.display());
    }

    if cli.output.is_none() && cli.image.is_none() && cli.wav.is_none() && cli.json.is_none() {
        log::info!("No outputs requested (see --output, --image, --wav, --json)");
    }

    Ok(())
}

fn render_video(
    session: &Session,
    snapshot: &AnalysisSnapshot,
    audio: &Path,
    output: &Path,
    options: &VideoOptions,
) -> Result<()> {
    let view = session.view();
    let scene = snapshot.scene();
    let duration = snapshot.buffer.duration();
    let total_frames = video_frame_count(duration, options.fps);
    log::info!(
        "Rendering {} frames at {}x{} @ {}fps",
        total_frames,
        view.width,
        view.height,
        options.fps
    );

    // The spectrogram and contour don't move; only the playback line does
    let base = render_base(&scene, view);

    let mut encoder = FfmpegEncoder::video(output, audio, view.width, view.height, options)?;

    let pb = ProgressBar::new(total_frames as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} frames ({eta} remaining)")?
            .progress_chars("=>-"),
    );

    for frame_idx in 0..total_frames {
        let time = frame_idx as f64 / options.fps as f64;
        let progress = if duration > 0.0 { time / duration } else { 1.0 };
        let state = with_progress(&base, &scene, view, progress);
        encoder.write_frame(state.canvas.pixels())?;
        pb.set_position(frame_idx as u64 + 1);
    }

    pb.finish_with_message("Rendering complete");

    log::info!("Finishing encoding...");
    encoder.finish()
}

#[derive(Serialize)]
struct PitchExport<'a> {
    sample_rate: u32,
    frame_size: usize,
    hop_size: usize,
    summary: TrackSummary,
    frames: Vec<ExportFrame<'a>>,
}

#[derive(Serialize)]
struct ExportFrame<'a> {
    /// Seconds from the start of the clip to the center of the window.
    time: f64,
    /// Estimator output before clean-up.
    raw_pitch: f64,
    #[serde(flatten)]
    frame: &'a PitchFrame,
}

fn write_pitch_json(snapshot: &AnalysisSnapshot, path: &Path) -> Result<()> {
    let params = &snapshot.params;
    let sr = snapshot.buffer.sample_rate();
    let frames = snapshot
        .track
        .iter()
        .zip(snapshot.raw_track.iter())
        .enumerate()
        .map(|(i, (frame, raw))| ExportFrame {
            time: center_sample(i, params.hop_size, params.frame_size) / sr as f64,
            raw_pitch: raw.pitch,
            frame,
        })
        .collect();

    let export = PitchExport {
        sample_rate: sr,
        frame_size: params.frame_size,
        hop_size: params.hop_size,
        summary: snapshot.summary(),
        frames,
    };

    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), &export)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
