use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::canvas::Canvas;
use super::colormap::{ColorMap, ColorScheme};
use super::timeline::TimeAxis;
use crate::analysis::{Correction, PitchFrame, SpectrogramMatrix};
use crate::error::{Error, Result};

const BACKGROUND: [u8; 4] = [0, 0, 0, 255];
const PROGRESS: [u8; 4] = [255, 255, 255, 210];

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewSettings {
    pub width: u32,
    pub height: u32,
    pub view_min_hz: f64,
    pub view_max_hz: f64,
    pub color_scheme: ColorScheme,
    /// Added to the normalized spectrogram level, in [-1, 1].
    pub brightness: f64,
    /// Gain around mid-grey, 1 = unchanged.
    pub contrast: f64,
    /// Contour segments whose vertical jump exceeds this fraction of the
    /// height are not drawn.
    pub max_jump_fraction: f64,
    pub point_radius: f64,
}

impl Default for ViewSettings {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            view_min_hz: 50.0,
            view_max_hz: 500.0,
            color_scheme: ColorScheme::default(),
            brightness: 0.0,
            contrast: 1.0,
            max_jump_fraction: 0.15,
            point_radius: 3.0,
        }
    }
}

impl ViewSettings {
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::param(format!(
                "view size {}x{} is empty",
                self.width, self.height
            )));
        }
        if !(self.view_min_hz >= 0.0 && self.view_min_hz < self.view_max_hz) {
            return Err(Error::param(format!(
                "visible range {}..{} Hz is empty",
                self.view_min_hz, self.view_max_hz
            )));
        }
        if !(-1.0..=1.0).contains(&self.brightness) {
            return Err(Error::param("brightness must be within [-1, 1]"));
        }
        if !(self.contrast >= 0.0 && self.contrast.is_finite()) {
            return Err(Error::param("contrast must be a non-negative number"));
        }
        if !(self.max_jump_fraction > 0.0 && self.max_jump_fraction <= 1.0) {
            return Err(Error::param("max_jump_fraction must be within (0, 1]"));
        }
        if !(self.point_radius >= 0.0 && self.point_radius.is_finite()) {
            return Err(Error::param("point_radius must be a non-negative number"));
        }
        Ok(())
    }

    /// Row coordinate of `freq`, linear over the visible range.
    pub fn y_for_frequency(&self, freq: f64) -> f64 {
        (self.view_max_hz - freq) / (self.view_max_hz - self.view_min_hz) * self.height as f64
    }

    fn frequency_for_row(&self, y: u32) -> f64 {
        let t = (y as f64 + 0.5) / self.height as f64;
        self.view_max_hz - t * (self.view_max_hz - self.view_min_hz)
    }

    fn is_visible(&self, freq: f64) -> bool {
        freq >= self.view_min_hz && freq <= self.view_max_hz
    }
}

/// Point and segment color for each correction class: neutral when untouched, blues for
/// frames pulled down, oranges for frames pushed up.
pub fn correction_color(correction: Correction) -> [u8; 3] {
    match correction {
        Correction::None => [235, 235, 235],
        Correction::Down2x => [90, 170, 255],
        Correction::Down4x => [30, 80, 200],
        Correction::Up2x => [255, 175, 70],
        Correction::Up4x => [215, 95, 20],
    }
}

/// Everything a frame of the display is drawn from.
#[derive(Clone, Copy, Debug)]
pub struct Scene<'a> {
    pub spectrogram: &'a SpectrogramMatrix,
    pub track: &'a [PitchFrame],
    pub frame_size: usize,
    pub hop_size: usize,
    pub sample_rate: u32,
    pub samples: usize,
}

impl Scene<'_> {
    pub fn axis(&self) -> TimeAxis {
        TimeAxis::new(self.samples, self.sample_rate, self.spectrogram.fft_size())
    }
}

/// One finished display frame.
#[derive(Clone, Debug)]
pub struct RenderState {
    pub canvas: Canvas,
    pub progress: f64,
    pub view_min_hz: f64,
    pub view_max_hz: f64,
}

/// Spectrogram and pitch overlay, without the progress line.
pub fn render_base(scene: &Scene, view: &ViewSettings) -> Canvas {
    let mut canvas = paint_spectrogram(scene, view);
    paint_contour(&mut canvas, scene, view);
    canvas
}

/// Copy of `base` with the playback line at `progress`.
pub fn with_progress(base: &Canvas, scene: &Scene, view: &ViewSettings, progress: f64) -> RenderState {
    let axis = scene.axis();
    let mut canvas = base.clone();
    let x = axis
        .x_for_time(axis.progress_time(progress), canvas.width())
        .floor()
        .min(canvas.width().saturating_sub(1) as f64);
    canvas.vertical_line(x as i64, PROGRESS);

    RenderState {
        canvas,
        progress: progress.clamp(0.0, 1.0),
        view_min_hz: view.view_min_hz,
        view_max_hz: view.view_max_hz,
    }
}

fn paint_spectrogram(scene: &Scene, view: &ViewSettings) -> Canvas {
    let spec = scene.spectrogram;
    let axis = scene.axis();
    let colors = ColorMap::new(view.color_scheme, view.brightness, view.contrast);
    let width = view.width;
    let sr = scene.sample_rate as f64;

    let columns: Vec<Option<usize>> = (0..width)
        .map(|x| {
            let t = axis.time_for_x(x, width);
            let j = ((t * sr - spec.fft_size() as f64) / spec.hop_size() as f64).round();
            (j >= 0.0 && (j as usize) < spec.num_slices()).then_some(j as usize)
        })
        .collect();

    let bin_hz = spec.bin_hz();
    let rows: Vec<Option<usize>> = (0..view.height)
        .map(|y| {
            let bin = (view.frequency_for_row(y) / bin_hz).round();
            (bin >= 0.0 && (bin as usize) < spec.num_bins()).then_some(bin as usize)
        })
        .collect();

    let mut pixels = vec![0u8; width as usize * view.height as usize * 4];
    pixels
        .par_chunks_exact_mut(width as usize * 4)
        .zip(rows.par_iter())
        .for_each(|(row, bin)| {
            for (px, column) in row.chunks_exact_mut(4).zip(columns.iter()) {
                let color = match (column, bin) {
                    (Some(j), Some(k)) => colors.rgba(spec.get(*j, *k)),
                    _ => BACKGROUND,
                };
                px.copy_from_slice(&color);
            }
        });

    Canvas::from_rgba(width, view.height, pixels)
}

fn paint_contour(canvas: &mut Canvas, scene: &Scene, view: &ViewSettings) {
    let axis = scene.axis();
    let max_jump = view.max_jump_fraction * view.height as f64;
    let position = |i: usize, frame: &PitchFrame| -> Option<(f64, f64)> {
        if !frame.is_voiced() || !view.is_visible(frame.pitch) {
            return None;
        }
        let t = axis.pitch_time(i, scene.hop_size, scene.frame_size);
        Some((axis.x_for_time(t, view.width), view.y_for_frequency(frame.pitch)))
    };

    for (i, pair) in scene.track.windows(2).enumerate() {
        let (Some(a), Some(b)) = (position(i, &pair[0]), position(i + 1, &pair[1])) else {
            continue;
        };
        if (b.1 - a.1).abs() > max_jump {
            continue;
        }
        // A segment takes the class of the frame it leads into
        let alpha = pair[0].confidence.min(pair[1].confidence);
        canvas.line(a, b, with_alpha(correction_color(pair[1].correction), alpha));
    }

    for (i, frame) in scene.track.iter().enumerate() {
        if let Some(p) = position(i, frame) {
            let color = with_alpha(correction_color(frame.correction), frame.confidence);
            canvas.fill_circle(p, view.point_radius, color);
        }
    }
}

fn with_alpha(rgb: [u8; 3], opacity: f64) -> [u8; 4] {
    [rgb[0], rgb[1], rgb[2], (opacity.clamp(0.0, 1.0) * 255.0).round() as u8]
}
