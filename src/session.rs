use crate::assets::decode::PreparedImage;
use crate::compose::{Compositor, FrameRGBA, FrameScene};
use crate::encode::sink::{FrameSink, SinkConfig};
use crate::foundation::error::{ReelError, ReelResult};
use crate::graph::GraphRenderer;
use crate::log::LogRecord;

/// What a single record did to the replay state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Applied {
    /// Graph description changed and was laid out again.
    GraphRendered,
    /// Graph description matched the current one; nothing was rendered.
    GraphUnchanged,
    /// Caption replaced.
    Caption,
}

/// Counters reported at the end of a replay.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReplayStats {
    pub frames: u64,
    pub graph_renders: u64,
    pub graph_unchanged: u64,
    pub caption_updates: u64,
}

impl ReplayStats {
    fn record(&mut self, applied: Applied) {
        match applied {
            Applied::GraphRendered => self.graph_renders += 1,
            Applied::GraphUnchanged => self.graph_unchanged += 1,
            Applied::Caption => self.caption_updates += 1,
        }
    }
}

/// Mutable replay state: the latest caption and the latest graph.
///
/// The last-seen graph text starts empty, so an empty graph record before any other leaves
/// the base graph in place.
#[derive(Clone, Debug, Default)]
pub struct ReplaySession {
    caption: String,
    graph_source: String,
    graph: Option<PreparedImage>,
    stats: ReplayStats,
}

impl ReplaySession {
    /// Start a replay. `base_graph` is shown until the first graph record.
    pub fn new(base_graph: Option<PreparedImage>) -> Self {
        Self {
            graph: base_graph,
            ..Self::default()
        }
    }

    pub fn caption(&self) -> &str {
        &self.caption
    }

    /// Text of the graph currently shown; empty until the first non-empty graph record.
    pub fn graph_source(&self) -> &str {
        &self.graph_source
    }

    pub fn graph(&self) -> Option<&PreparedImage> {
        self.graph.as_ref()
    }

    pub fn stats(&self) -> ReplayStats {
        self.stats
    }

    /// Fold one record into the state. The graph is laid out only when its text changes.
    pub fn apply(
        &mut self,
        record: LogRecord,
        renderer: &mut dyn GraphRenderer,
    ) -> ReelResult<Applied> {
        let applied = match record {
            LogRecord::Graph(source) => {
                if self.graph_source == source {
                    Applied::GraphUnchanged
                } else {
                    let image = renderer.render(&source)?;
                    self.graph = Some(image);
                    self.graph_source = source;
                    Applied::GraphRendered
                }
            }
            LogRecord::Caption(msg) => {
                self.caption = msg;
                Applied::Caption
            }
        };
        self.stats.record(applied);
        Ok(applied)
    }

    /// Compose the frame for the current state.
    pub fn compose(&self, compositor: &mut dyn Compositor) -> ReelResult<FrameRGBA> {
        compositor.compose(&FrameScene {
            graph: self.graph.as_ref(),
            caption: &self.caption,
        })
    }

    /// Replay every record, pushing one frame per record into `sink`.
    #[tracing::instrument(skip_all)]
    pub fn replay<I>(
        &mut self,
        records: I,
        sink_cfg: SinkConfig,
        renderer: &mut dyn GraphRenderer,
        compositor: &mut dyn Compositor,
        sink: &mut dyn FrameSink,
    ) -> ReelResult<ReplayStats>
    where
        I: IntoIterator<Item = ReelResult<(usize, LogRecord)>>,
    {
        sink.begin(sink_cfg)?;

        for (idx, item) in records.into_iter().enumerate() {
            let (line_no, record) = item?;
            let applied = self.apply(record, renderer)?;
            match applied {
                Applied::GraphRendered => tracing::info!(line = line_no, "graph rendered"),
                Applied::GraphUnchanged => tracing::debug!(line = line_no, "graph unchanged"),
                Applied::Caption => {}
            }

            let frame = self.compose(compositor)?;
            sink.push_frame(idx as u64, &frame)?;
            self.stats.frames += 1;
            tracing::info!(frame = idx, line = line_no, "frame");
        }

        sink.end()?;
        tracing::info!(
            frames = self.stats.frames,
            graph_renders = self.stats.graph_renders,
            graph_unchanged = self.stats.graph_unchanged,
            caption_updates = self.stats.caption_updates,
            "done"
        );
        Ok(self.stats)
    }

    /// Apply records up to and including frame `frame_index`, then compose that frame only.
    pub fn replay_until<I>(
        &mut self,
        records: I,
        frame_index: u64,
        renderer: &mut dyn GraphRenderer,
        compositor: &mut dyn Compositor,
    ) -> ReelResult<FrameRGBA>
    where
        I: IntoIterator<Item = ReelResult<(usize, LogRecord)>>,
    {
        let mut seen = 0u64;
        for item in records {
            let (_, record) = item?;
            self.apply(record, renderer)?;
            if seen == frame_index {
                let frame = self.compose(compositor)?;
                self.stats.frames += 1;
                return Ok(frame);
            }
            seen += 1;
        }
        Err(ReelError::validation(format!(
            "frame {frame_index} is out of range (log has {seen} records)"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct CountingRenderer {
        sources: Vec<String>,
    }

    impl GraphRenderer for CountingRenderer {
        fn render(&mut self, source: &str) -> ReelResult<PreparedImage> {
            self.sources.push(source.to_string());
            let shade = self.sources.len() as u8;
            Ok(PreparedImage::from_straight_rgba8(
                1,
                1,
                vec![shade, shade, shade, 255],
            ))
        }
    }

    #[test]
    fn caption_updates_do_not_render() {
        let mut r = CountingRenderer::default();
        let mut s = ReplaySession::new(None);
        assert_eq!(
            s.apply(LogRecord::Caption("a".into()), &mut r).unwrap(),
            Applied::Caption
        );
        assert_eq!(s.caption(), "a");
        assert!(r.sources.is_empty());
        assert!(s.graph().is_none());
    }

    #[test]
    fn identical_graph_is_not_rendered_twice() {
        let mut r = CountingRenderer::default();
        let mut s = ReplaySession::new(None);
        let g = || LogRecord::Graph("graph G {a}".into());
        assert_eq!(s.apply(g(), &mut r).unwrap(), Applied::GraphRendered);
        assert_eq!(s.apply(g(), &mut r).unwrap(), Applied::GraphUnchanged);
        assert_eq!(r.sources.len(), 1);

        assert_eq!(
            s.apply(LogRecord::Graph("graph G {b}".into()), &mut r)
                .unwrap(),
            Applied::GraphRendered
        );
        assert_eq!(s.apply(g(), &mut r).unwrap(), Applied::GraphRendered);
        assert_eq!(r.sources.len(), 3);
        assert_eq!(s.graph_source(), "graph G {a}");
        assert_eq!(
            s.stats(),
            ReplayStats {
                frames: 0,
                graph_renders: 3,
                graph_unchanged: 1,
                caption_updates: 0,
            }
        );
    }

    #[test]
    fn base_graph_is_kept_until_first_graph_record() {
        let base = PreparedImage::from_straight_rgba8(1, 1, vec![9, 9, 9, 255]);
        let mut r = CountingRenderer::default();
        let mut s = ReplaySession::new(Some(base.clone()));
        s.apply(LogRecord::Caption("x".into()), &mut r).unwrap();
        assert_eq!(s.graph(), Some(&base));
        s.apply(LogRecord::Graph("g".into()), &mut r).unwrap();
        assert_ne!(s.graph(), Some(&base));
    }

    #[test]
    fn empty_first_graph_keeps_base_graph_without_rendering() {
        let base = PreparedImage::from_straight_rgba8(1, 1, vec![9, 9, 9, 255]);
        let mut r = CountingRenderer::default();
        let mut s = ReplaySession::new(Some(base.clone()));
        assert_eq!(
            s.apply(LogRecord::Graph(String::new()), &mut r).unwrap(),
            Applied::GraphUnchanged
        );
        assert!(r.sources.is_empty());
        assert_eq!(s.graph(), Some(&base));
        assert_eq!(s.stats().graph_renders, 0);
    }

    #[test]
    fn failed_render_keeps_previous_graph_text() {
        struct Failing;
        impl GraphRenderer for Failing {
            fn render(&mut self, _source: &str) -> ReelResult<PreparedImage> {
                Err(ReelError::layout("boom"))
            }
        }
        let mut s = ReplaySession::new(None);
        assert!(s.apply(LogRecord::Graph("g".into()), &mut Failing).is_err());
        assert_eq!(s.graph_source(), "");
    }
}
