//! Frame composition: graph bitmap plus caption on a fixed canvas.

use crate::assets::decode::PreparedImage;
use crate::foundation::error::ReelResult;

pub mod cpu;
pub mod pixels;

/// One composed frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameRGBA {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
    pub premultiplied: bool,
}

/// Inputs for composing a single frame.
#[derive(Clone, Copy, Debug)]
pub struct FrameScene<'a> {
    /// Current graph bitmap; `None` before the first graph (and without a base graph).
    pub graph: Option<&'a PreparedImage>,
    pub caption: &'a str,
}

pub trait Compositor {
    fn compose(&mut self, scene: &FrameScene<'_>) -> ReelResult<FrameRGBA>;
}
