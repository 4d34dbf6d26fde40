use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::Context as _;

use crate::assets::decode::{PreparedImage, decode_image};
use crate::foundation::error::{ReelError, ReelResult};

/// Turns a textual graph description into a bitmap.
pub trait GraphRenderer {
    fn render(&mut self, source: &str) -> ReelResult<PreparedImage>;
}

/// Graphviz layout command.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize,
    clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum LayoutEngine {
    Dot,
    #[default]
    Neato,
    Fdp,
    Sfdp,
    Circo,
    Twopi,
}

impl LayoutEngine {
    pub fn command(self) -> &'static str {
        match self {
            Self::Dot => "dot",
            Self::Neato => "neato",
            Self::Fdp => "fdp",
            Self::Sfdp => "sfdp",
            Self::Circo => "circo",
            Self::Twopi => "twopi",
        }
    }
}

impl std::fmt::Display for LayoutEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.command())
    }
}

pub fn is_layout_engine_on_path(engine: LayoutEngine) -> bool {
    Command::new(engine.command())
        .arg("-V")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Renders graph descriptions with the system Graphviz binaries.
///
/// The description is written to `<work_dir>/graph.gv` and laid out into
/// `<work_dir>/graph.gv.png`; both files are overwritten on every render.
pub struct GraphvizRenderer {
    engine: LayoutEngine,
    work_dir: PathBuf,
    renders: u64,
}

impl GraphvizRenderer {
    pub fn new(engine: LayoutEngine, work_dir: impl Into<PathBuf>) -> ReelResult<Self> {
        let work_dir = work_dir.into();
        std::fs::create_dir_all(&work_dir)
            .with_context(|| format!("create work directory '{}'", work_dir.display()))?;

        if !is_layout_engine_on_path(engine) {
            return Err(ReelError::layout(format!(
                "graphviz '{engine}' is required for graph rendering, but was not found on PATH"
            )));
        }

        Ok(Self {
            engine,
            work_dir,
            renders: 0,
        })
    }

    pub fn source_path(&self) -> PathBuf {
        self.work_dir.join("graph.gv")
    }

    pub fn bitmap_path(&self) -> PathBuf {
        self.work_dir.join("graph.gv.png")
    }

    /// Number of successful layout runs so far.
    pub fn renders(&self) -> u64 {
        self.renders
    }

    fn run_layout(&self, source_path: &Path, out_path: &Path) -> ReelResult<()> {
        let output = Command::new(self.engine.command())
            .arg("-Tpng")
            .arg(source_path)
            .arg("-o")
            .arg(out_path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| {
                ReelError::layout(format!(
                    "failed to spawn '{}' (is graphviz installed and on PATH?): {e}",
                    self.engine
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ReelError::layout(format!(
                "'{}' exited with status {}: {}",
                self.engine,
                output.status,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

impl GraphRenderer for GraphvizRenderer {
    #[tracing::instrument(skip(self, source), fields(engine = %self.engine, bytes = source.len()))]
    fn render(&mut self, source: &str) -> ReelResult<PreparedImage> {
        let source_path = self.source_path();
        let out_path = self.bitmap_path();

        std::fs::write(&source_path, source)
            .with_context(|| format!("write graph source '{}'", source_path.display()))?;
        // A bitmap from an earlier layout must never be mistaken for this one.
        match std::fs::remove_file(&out_path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(ReelError::layout(format!(
                    "failed to remove stale bitmap '{}': {e}",
                    out_path.display()
                )));
            }
        }
        self.run_layout(&source_path, &out_path)?;

        let bytes = std::fs::read(&out_path)
            .with_context(|| format!("read rendered graph '{}'", out_path.display()))?;
        let image = decode_image(&bytes).map_err(|e| {
            ReelError::layout(format!(
                "'{}' produced an unreadable bitmap '{}': {e}",
                self.engine,
                out_path.display()
            ))
        })?;

        self.renders += 1;
        Ok(image)
    }
}
