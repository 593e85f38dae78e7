use anyhow::{Context, Result};
use std::ffi::OsString;
use std::io::Write;
use std::path::Path;
use std::process::{Child, Command, Stdio};

/// Video codec settings passed through to ffmpeg.
#[derive(Debug, Clone)]
pub struct VideoOptions<'a> {
    pub fps: u32,
    pub codec: &'a str,
    pub pix_fmt: &'a str,
    pub crf: u32,
    pub bitrate: Option<&'a str>,
}

/// Raw RGBA frames piped into an ffmpeg child process.
pub struct FfmpegEncoder {
    child: Child,
    frame_len: usize,
}

impl FfmpegEncoder {
    /// Video of the piped frames muxed with the clip's audio.
    pub fn video(
        output_path: &Path,
        input_audio: &Path,
        width: u32,
        height: u32,
        options: &VideoOptions,
    ) -> Result<Self> {
        let mut args = raw_input_args(width, height, options.fps);
        args.extend([
            "-i".into(),
            input_audio.as_os_str().to_owned(),
            "-c:v".into(),
            options.codec.into(),
            "-pix_fmt".into(),
            options.pix_fmt.into(),
        ]);

        if let Some(br) = options.bitrate {
            args.extend([OsString::from("-b:v"), br.into()]);
        } else {
            args.extend([OsString::from("-crf"), options.crf.to_string().into()]);
            args.extend([OsString::from("-preset"), "medium".into()]);
        }

        args.extend([
            "-c:a".into(),
            "aac".into(),
            "-b:a".into(),
            "192k".into(),
            "-shortest".into(),
            output_path.as_os_str().to_owned(),
        ]);

        let encoder = Self::spawn(args, width, height)?;
        log::info!(
            "FFmpeg encoder started: {}x{} @ {}fps, codec={}",
            width,
            height,
            options.fps,
            options.codec
        );
        Ok(encoder)
    }

    /// Single image; the format follows the output extension.
    pub fn still(output_path: &Path, width: u32, height: u32) -> Result<Self> {
        let mut args = raw_input_args(width, height, 1);
        args.extend([
            "-frames:v".into(),
            "1".into(),
            output_path.as_os_str().to_owned(),
        ]);
        Self::spawn(args, width, height)
    }

    fn spawn(args: Vec<OsString>, width: u32, height: u32) -> Result<Self> {
        let child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .context("Failed to spawn ffmpeg. Is ffmpeg installed?")?;

        Ok(Self {
            child,
            frame_len: width as usize * height as usize * 4,
        })
    }

    pub fn write_frame(&mut self, rgba_pixels: &[u8]) -> Result<()> {
        anyhow::ensure!(
            rgba_pixels.len() == self.frame_len,
            "Frame is {} bytes, encoder expects {}",
            rgba_pixels.len(),
            self.frame_len
        );
        let stdin = self.child.stdin.as_mut().context("FFmpeg stdin not available")?;
        stdin.write_all(rgba_pixels).context("Failed to write frame to ffmpeg")?;
        Ok(())
    }

    pub fn finish(mut self) -> Result<()> {
        // Close stdin to signal EOF
        drop(self.child.stdin.take());

        let output = self.child.wait_with_output().context("Failed to wait for ffmpeg")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("FFmpeg exited with error:\n{}", stderr);
        }

        log::info!("FFmpeg encoding complete");
        Ok(())
    }
}

fn raw_input_args(width: u32, height: u32, fps: u32) -> Vec<OsString> {
    vec![
        "-y".into(),
        "-f".into(),
        "rawvideo".into(),
        "-pixel_format".into(),
        "rgba".into(),
        "-video_size".into(),
        format!("{}x{}", width, height).into(),
        "-framerate".into(),
        fps.to_string().into(),
        "-i".into(),
        "pipe:0".into(),
    ]
}

/// Number of video frames needed to cover `duration` seconds.
pub fn video_frame_count(duration: f64, fps: u32) -> usize {
    (duration * fps as f64).ceil().max(1.0) as usize
}
