use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::encode::sink::SinkConfig;
use crate::foundation::error::{ReelError, ReelResult};
use crate::graph::LayoutEngine;

/// Full replay configuration.
///
/// Every field has a default, so a config file only needs the keys it overrides. Unknown keys
/// are rejected to catch typos.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReelConfig {
    /// Newline-delimited JSON game log.
    pub input: PathBuf,
    /// Output GIF path.
    pub output: PathBuf,
    /// Graphviz layout command used for graph descriptions.
    pub engine: LayoutEngine,
    /// Scratch directory for the graph description and its rendered bitmap.
    pub work_dir: PathBuf,
    /// Bitmap shown before the first graph event, if any.
    pub base_graph: Option<PathBuf>,
    pub canvas: CanvasConfig,
    pub caption: CaptionConfig,
    pub animation: AnimationConfig,
}

/// Size and fill of the full-resolution canvas, before downscaling.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CanvasConfig {
    pub width: u32,
    pub height: u32,
    /// Straight-alpha RGB background.
    pub background: [u8; 3],
}

/// Caption text placement and styling.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CaptionConfig {
    /// TrueType/OpenType font file.
    pub font: PathBuf,
    pub size_px: f32,
    /// Top-left corner of the caption on the full-resolution canvas.
    pub position: [f32; 2],
    /// Straight-alpha RGBA text color.
    pub color: [u8; 4],
    /// Wrap width in pixels. `None` keeps each caption on one line.
    pub max_width_px: Option<f32>,
}

/// Output animation settings.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnimationConfig {
    /// Integer box-downscale factor applied to every composed frame.
    pub reduce_factor: u32,
    /// Per-frame delay. GIF stores centiseconds, so this must be a multiple of 10.
    pub frame_delay_ms: u32,
    /// Number of repeats; 0 loops forever.
    pub loop_count: u16,
    /// GIF quantizer speed (1 = best quality, 30 = fastest).
    pub gif_speed: i32,
}

impl Default for ReelConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from("game.log"),
            output: PathBuf::from("game.gif"),
            engine: LayoutEngine::Neato,
            work_dir: std::env::temp_dir().join("logreel"),
            base_graph: None,
            canvas: CanvasConfig::default(),
            caption: CaptionConfig::default(),
            animation: AnimationConfig::default(),
        }
    }
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            width: 2439,
            height: 1600,
            background: [255, 255, 255],
        }
    }
}

impl Default for CaptionConfig {
    fn default() -> Self {
        Self {
            font: PathBuf::from("UberMoveTextRegular.otf"),
            size_px: 30.0,
            position: [100.0, 1500.0],
            color: [0, 0, 0, 255],
            max_width_px: None,
        }
    }
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            reduce_factor: 2,
            frame_delay_ms: 300,
            loop_count: 0,
            gif_speed: 10,
        }
    }
}

impl ReelConfig {
    /// Load a JSON config file. Missing keys fall back to defaults.
    pub fn from_path(path: impl AsRef<Path>) -> ReelResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config '{}'", path.display()))?;
        Self::from_json_str(&text)
    }

    /// Parse a JSON config document.
    pub fn from_json_str(text: &str) -> ReelResult<Self> {
        let cfg: Self = serde_json::from_str(text)
            .map_err(|e| ReelError::validation(format!("invalid config JSON: {e}")))?;
        Ok(cfg)
    }

    pub fn validate(&self) -> ReelResult<()> {
        let c = &self.canvas;
        if c.width == 0 || c.height == 0 {
            return Err(ReelError::validation(
                "canvas width/height must be non-zero",
            ));
        }
        if c.width > u32::from(u16::MAX) || c.height > u32::from(u16::MAX) {
            return Err(ReelError::validation(format!(
                "canvas {}x{} exceeds the {} px limit",
                c.width,
                c.height,
                u16::MAX
            )));
        }

        let cap = &self.caption;
        if !cap.size_px.is_finite() || cap.size_px <= 0.0 {
            return Err(ReelError::validation(
                "caption size_px must be finite and > 0",
            ));
        }
        if !cap.position.iter().all(|v| v.is_finite()) {
            return Err(ReelError::validation("caption position must be finite"));
        }
        if let Some(w) = cap.max_width_px
            && (!w.is_finite() || w <= 0.0)
        {
            return Err(ReelError::validation(
                "caption max_width_px must be finite and > 0",
            ));
        }

        let a = &self.animation;
        if a.reduce_factor == 0 {
            return Err(ReelError::validation("reduce_factor must be >= 1"));
        }
        if a.reduce_factor > c.width.min(c.height) {
            return Err(ReelError::validation(format!(
                "reduce_factor {} exceeds the smaller canvas side {}",
                a.reduce_factor,
                c.width.min(c.height)
            )));
        }
        if a.frame_delay_ms == 0 {
            return Err(ReelError::validation("frame_delay_ms must be non-zero"));
        }
        if !a.frame_delay_ms.is_multiple_of(10) {
            return Err(ReelError::validation(format!(
                "frame_delay_ms {} is not a multiple of 10 (gif stores centiseconds)",
                a.frame_delay_ms
            )));
        }
        if !(1..=30).contains(&a.gif_speed) {
            return Err(ReelError::validation("gif_speed must be in 1..=30"));
        }
        Ok(())
    }

    /// Frame size after downscaling.
    pub fn output_size(&self) -> (u32, u32) {
        let f = self.animation.reduce_factor.max(1);
        (
            self.canvas.width.div_ceil(f),
            self.canvas.height.div_ceil(f),
        )
    }

    /// Sink configuration matching the output size and timing.
    pub fn sink_config(&self) -> SinkConfig {
        let (width, height) = self.output_size();
        SinkConfig {
            width,
            height,
            frame_delay_ms: self.animation.frame_delay_ms,
            loop_count: self.animation.loop_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = ReelConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.output_size(), (1220, 800));
        assert_eq!(cfg.engine, LayoutEngine::Neato);
    }

    #[test]
    fn partial_json_keeps_other_defaults() {
        let cfg = ReelConfig::from_json_str(
            r#"{"engine": "dot", "animation": {"frame_delay_ms": 120}}"#,
        )
        .unwrap();
        assert_eq!(cfg.engine, LayoutEngine::Dot);
        assert_eq!(cfg.animation.frame_delay_ms, 120);
        assert_eq!(cfg.animation.reduce_factor, 2);
        assert_eq!(cfg.canvas, CanvasConfig::default());
    }

    #[test]
    fn from_path_reads_and_parses_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("logreel.json");
        std::fs::write(&path, r#"{"output": "out.gif"}"#).unwrap();
        let cfg = ReelConfig::from_path(&path).unwrap();
        assert_eq!(cfg.output, PathBuf::from("out.gif"));

        std::fs::write(&path, "{not json").unwrap();
        let err = ReelConfig::from_path(&path).unwrap_err();
        assert!(err.to_string().starts_with("validation error: invalid config JSON"));
        assert!(ReelConfig::from_path(tmp.path().join("missing.json")).is_err());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = ReelConfig::from_json_str(r#"{"fps": 30}"#).unwrap_err();
        assert!(err.to_string().contains("validation error:"));
    }

    #[test]
    fn validation_catches_bad_values() {
        let mut cfg = ReelConfig::default();
        cfg.canvas.width = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = ReelConfig::default();
        cfg.canvas.height = 70_000;
        assert!(cfg.validate().is_err());

        let mut cfg = ReelConfig::default();
        cfg.animation.reduce_factor = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = ReelConfig::default();
        cfg.animation.reduce_factor = 1601;
        assert!(cfg.validate().is_err());

        let mut cfg = ReelConfig::default();
        cfg.canvas.width = 4200;
        cfg.canvas.height = 4200;
        cfg.animation.reduce_factor = 4200;
        cfg.validate().unwrap();
        assert_eq!(cfg.output_size(), (1, 1));

        let mut cfg = ReelConfig::default();
        cfg.animation.frame_delay_ms = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = ReelConfig::default();
        cfg.animation.frame_delay_ms = 125;
        assert!(cfg.validate().is_err());

        let mut cfg = ReelConfig::default();
        cfg.caption.size_px = f32::NAN;
        assert!(cfg.validate().is_err());

        let mut cfg = ReelConfig::default();
        cfg.animation.gif_speed = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn output_size_rounds_partial_boxes_up() {
        let mut cfg = ReelConfig::default();
        cfg.canvas.width = 5;
        cfg.canvas.height = 3;
        cfg.animation.reduce_factor = 2;
        assert_eq!(cfg.output_size(), (3, 2));
    }
}
