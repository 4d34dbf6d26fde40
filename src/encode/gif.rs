use std::fs::File;
use std::path::PathBuf;

use anyhow::Context as _;
use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, Frame, RgbaImage};

use crate::compose::FrameRGBA;
use crate::encode::ensure_parent_dir;
use crate::encode::sink::{FrameSink, SinkConfig};
use crate::foundation::error::{ReelError, ReelResult};

/// Options for [`GifSink`].
#[derive(Clone, Debug)]
pub struct GifSinkOpts {
    /// Output GIF file path.
    pub out_path: PathBuf,
    /// Overwrite output file if it already exists.
    pub overwrite: bool,
    /// Quantizer speed, 1 (best) to 30 (fastest).
    pub speed: i32,
}

impl GifSinkOpts {
    pub fn new(out_path: impl Into<PathBuf>) -> Self {
        Self {
            out_path: out_path.into(),
            overwrite: true,
            speed: 10,
        }
    }
}

/// Streams frames into an animated GIF.
///
/// Frames go to `<out>.partial`, which is renamed over the output in `end`, so an aborted
/// replay never leaves a truncated GIF at the output path. A sink dropped before a successful
/// `end` removes its partial file.
pub struct GifSink {
    opts: GifSinkOpts,
    cfg: Option<SinkConfig>,
    encoder: Option<GifEncoder<File>>,
    partial: Option<(PathBuf, File)>,
    last_idx: Option<u64>,
    frames: u64,
}

impl GifSink {
    pub fn new(opts: GifSinkOpts) -> Self {
        Self {
            opts,
            cfg: None,
            encoder: None,
            partial: None,
            last_idx: None,
            frames: 0,
        }
    }

    /// Frames encoded so far.
    pub fn frames_written(&self) -> u64 {
        self.frames
    }

    fn partial_path(&self) -> PathBuf {
        let mut name = self.opts.out_path.as_os_str().to_os_string();
        name.push(".partial");
        PathBuf::from(name)
    }
}

impl FrameSink for GifSink {
    fn begin(&mut self, cfg: SinkConfig) -> ReelResult<()> {
        if cfg.width == 0 || cfg.height == 0 {
            return Err(ReelError::validation(
                "gif sink width/height must be non-zero",
            ));
        }
        if cfg.width > u32::from(u16::MAX) || cfg.height > u32::from(u16::MAX) {
            return Err(ReelError::validation(
                "gif sink width/height must fit in u16",
            ));
        }
        if cfg.frame_delay_ms == 0 {
            return Err(ReelError::validation("frame delay must be non-zero"));
        }
        if !(1..=30).contains(&self.opts.speed) {
            return Err(ReelError::validation("gif speed must be in 1..=30"));
        }

        ensure_parent_dir(&self.opts.out_path)?;
        if !self.opts.overwrite && self.opts.out_path.exists() {
            return Err(ReelError::validation(format!(
                "output file '{}' already exists",
                self.opts.out_path.display()
            )));
        }

        let partial = self.partial_path();
        let file = File::create(&partial)
            .with_context(|| format!("create '{}'", partial.display()))?;
        let handle = file
            .try_clone()
            .with_context(|| format!("clone handle for '{}'", partial.display()))?;
        self.partial = Some((partial, handle));

        let mut encoder = GifEncoder::new_with_speed(file, self.opts.speed);
        let repeat = match cfg.loop_count {
            0 => Repeat::Infinite,
            n => Repeat::Finite(n),
        };
        encoder
            .set_repeat(repeat)
            .map_err(|e| ReelError::encode(format!("failed to set gif repeat: {e}")))?;

        self.encoder = Some(encoder);
        self.cfg = Some(cfg);
        self.last_idx = None;
        self.frames = 0;
        Ok(())
    }

    fn push_frame(&mut self, idx: u64, frame: &FrameRGBA) -> ReelResult<()> {
        let Some(cfg) = self.cfg.as_ref() else {
            return Err(ReelError::encode("gif sink used before begin"));
        };
        if let Some(last) = self.last_idx
            && idx <= last
        {
            return Err(ReelError::encode(format!(
                "frame index {idx} is not after previous index {last}"
            )));
        }
        if frame.width != cfg.width || frame.height != cfg.height {
            return Err(ReelError::validation(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.width, frame.height, cfg.width, cfg.height
            )));
        }
        if frame.premultiplied {
            return Err(ReelError::encode(
                "gif sink expects straight-alpha frames",
            ));
        }

        let buffer = RgbaImage::from_raw(frame.width, frame.height, frame.data.clone())
            .ok_or_else(|| ReelError::validation("frame.data size mismatch with width*height*4"))?;
        let delay = Delay::from_numer_denom_ms(cfg.frame_delay_ms, 1);

        let Some(encoder) = self.encoder.as_mut() else {
            return Err(ReelError::encode("gif encoder is already finalized"));
        };
        encoder
            .encode_frame(Frame::from_parts(buffer, 0, 0, delay))
            .map_err(|e| ReelError::encode(format!("failed to encode frame {idx}: {e}")))?;

        self.last_idx = Some(idx);
        self.frames += 1;
        Ok(())
    }

    fn end(&mut self) -> ReelResult<()> {
        let Some(encoder) = self.encoder.take() else {
            return Err(ReelError::encode("gif encoder is already finalized"));
        };
        // Dropping the encoder writes the GIF trailer.
        drop(encoder);

        let result = self.finish();
        if result.is_err() {
            self.discard_partial();
        }
        result
    }
}

impl GifSink {
    fn finish(&mut self) -> ReelResult<()> {
        let Some((partial, handle)) = self.partial.as_ref() else {
            return Err(ReelError::encode("gif sink has no partial output"));
        };
        handle
            .sync_all()
            .with_context(|| format!("flush '{}'", partial.display()))?;

        if self.frames == 0 {
            return Err(ReelError::encode("no frames were written"));
        }

        std::fs::rename(partial, &self.opts.out_path).with_context(|| {
            format!(
                "move '{}' to '{}'",
                partial.display(),
                self.opts.out_path.display()
            )
        })?;
        self.partial = None;

        tracing::info!(
            frames = self.frames,
            out = %self.opts.out_path.display(),
            "wrote gif"
        );
        Ok(())
    }

    fn discard_partial(&mut self) {
        self.encoder = None;
        let Some((partial, handle)) = self.partial.take() else {
            return;
        };
        drop(handle);
        if let Err(e) = std::fs::remove_file(&partial)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            tracing::warn!(path = %partial.display(), error = %e, "failed to remove partial gif");
        }
    }
}

impl Drop for GifSink {
    fn drop(&mut self) {
        self.discard_partial();
    }
}
