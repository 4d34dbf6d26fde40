use std::path::PathBuf;

use anyhow::Context as _;

use crate::compose::FrameRGBA;
use crate::encode::ensure_parent_dir;
use crate::foundation::error::{ReelError, ReelResult};

/// Write a single straight-alpha frame as a PNG.
pub fn write_png(out_path: impl Into<PathBuf>, frame: &FrameRGBA) -> ReelResult<()> {
    let out_path = out_path.into();
    if frame.premultiplied {
        return Err(ReelError::encode("png export expects straight-alpha frames"));
    }
    ensure_parent_dir(&out_path)?;
    image::save_buffer_with_format(
        &out_path,
        &frame.data,
        frame.width,
        frame.height,
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", out_path.display()))?;
    Ok(())
}
