//! Frame sinks.
//!
//! Sinks consume composed frames in log order and are driven by `ReplaySession::replay`.

/// Animated GIF output.
pub mod gif;
/// Single-frame PNG export.
pub mod png;
/// Generic frame sink trait and built-in sinks.
pub mod sink;

use std::path::Path;

use anyhow::Context as _;

use crate::foundation::error::ReelResult;

/// Create the parent directory of an output file if it has one.
pub(crate) fn ensure_parent_dir(path: &Path) -> ReelResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}
