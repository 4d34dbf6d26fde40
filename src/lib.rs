//! Replay a game log into an animated GIF.
//!
//! Each newline-delimited JSON record either replaces the displayed graph (laid out by
//! Graphviz) or replaces the caption. One frame is composed per record and the frames are
//! streamed into a [`FrameSink`], usually a looping [`GifSink`].
//!
//! - Read records with [`LogReader`]
//! - Lay out graphs with a [`GraphRenderer`] ([`GraphvizRenderer`])
//! - Compose frames with a [`Compositor`] ([`CpuCompositor`])
//! - Drive everything with [`ReplaySession::replay`]
#![forbid(unsafe_code)]

mod assets;
mod foundation;

pub mod compose;
pub mod config;
pub mod encode;
pub mod graph;
pub mod log;
pub mod session;

pub use crate::assets::decode::{PreparedImage, decode_image, load_image};
pub use crate::assets::text::{CaptionFont, TextBrushRgba8, TextLayoutEngine};
pub use crate::compose::cpu::{ComposeOpts, CpuCompositor};
pub use crate::compose::pixels::{flatten_to_opaque_rgba8, reduce_box};
pub use crate::compose::{Compositor, FrameRGBA, FrameScene};
pub use crate::config::{AnimationConfig, CanvasConfig, CaptionConfig, ReelConfig};
pub use crate::encode::gif::{GifSink, GifSinkOpts};
pub use crate::encode::png::write_png;
pub use crate::encode::sink::{FrameSink, InMemorySink, SinkConfig};
pub use crate::foundation::error::{ReelError, ReelResult};
pub use crate::graph::{GraphRenderer, GraphvizRenderer, LayoutEngine, is_layout_engine_on_path};
pub use crate::log::{GRAPH_EVENT, LogReader, LogRecord};
pub use crate::session::{Applied, ReplaySession, ReplayStats};
