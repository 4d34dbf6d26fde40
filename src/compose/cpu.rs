use std::sync::Arc;

use crate::assets::decode::PreparedImage;
use crate::assets::text::{CaptionFont, TextBrushRgba8, TextLayoutEngine};
use crate::compose::pixels::{flatten_to_opaque_rgba8, reduce_box};
use crate::compose::{Compositor, FrameRGBA, FrameScene};
use crate::config::ReelConfig;
use crate::foundation::error::{ReelError, ReelResult};

/// Options for [`CpuCompositor`].
#[derive(Clone, Debug)]
pub struct ComposeOpts {
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub background: [u8; 3],
    pub font: CaptionFont,
    pub caption_size_px: f32,
    pub caption_position: [f32; 2],
    pub caption_color: [u8; 4],
    pub caption_max_width_px: Option<f32>,
    pub reduce_factor: u32,
}

impl ComposeOpts {
    /// Build options from a validated config and an already loaded font.
    pub fn from_config(cfg: &ReelConfig, font: CaptionFont) -> Self {
        Self {
            canvas_width: cfg.canvas.width,
            canvas_height: cfg.canvas.height,
            background: cfg.canvas.background,
            font,
            caption_size_px: cfg.caption.size_px,
            caption_position: cfg.caption.position,
            caption_color: cfg.caption.color,
            caption_max_width_px: cfg.caption.max_width_px,
            reduce_factor: cfg.animation.reduce_factor,
        }
    }
}

/// Software compositor built on `vello_cpu` and `parley`.
pub struct CpuCompositor {
    opts: ComposeOpts,
    width: u16,
    height: u16,
    text: TextLayoutEngine,
    font: vello_cpu::peniko::FontData,
    graph_cache: Option<(Arc<Vec<u8>>, vello_cpu::Image)>,
    pixmap: vello_cpu::Pixmap,
}

impl CpuCompositor {
    pub fn new(opts: ComposeOpts) -> ReelResult<Self> {
        let width: u16 = opts
            .canvas_width
            .try_into()
            .map_err(|_| ReelError::validation("canvas width exceeds u16"))?;
        let height: u16 = opts
            .canvas_height
            .try_into()
            .map_err(|_| ReelError::validation("canvas height exceeds u16"))?;
        if width == 0 || height == 0 {
            return Err(ReelError::validation(
                "canvas width/height must be non-zero",
            ));
        }

        let mut text = TextLayoutEngine::new();
        text.register_font(opts.font.bytes.as_slice())?;

        let font = vello_cpu::peniko::FontData::new(
            vello_cpu::peniko::Blob::from(opts.font.bytes.as_ref().clone()),
            0,
        );

        Ok(Self {
            width,
            height,
            text,
            font,
            graph_cache: None,
            pixmap: vello_cpu::Pixmap::new(width, height),
            opts,
        })
    }

    /// Family name parley resolved for the caption font.
    pub fn font_family(&self) -> ReelResult<&str> {
        self.text
            .family_name()
            .ok_or_else(|| ReelError::compose("caption font is not registered"))
    }

    fn graph_paint(&mut self, graph: &PreparedImage) -> ReelResult<vello_cpu::Image> {
        if let Some((bytes, paint)) = &self.graph_cache
            && Arc::ptr_eq(bytes, &graph.rgba8_premul)
        {
            return Ok(paint.clone());
        }

        let pixmap = image_premul_bytes_to_pixmap(
            graph.rgba8_premul.as_slice(),
            graph.width,
            graph.height,
        )?;
        let paint = vello_cpu::Image {
            image: vello_cpu::ImageSource::Pixmap(Arc::new(pixmap)),
            sampler: vello_cpu::peniko::ImageSampler::default(),
        };
        self.graph_cache = Some((graph.rgba8_premul.clone(), paint.clone()));
        Ok(paint)
    }

    fn draw_caption(&mut self, ctx: &mut vello_cpu::RenderContext, caption: &str) -> ReelResult<()> {
        if caption.is_empty() {
            return Ok(());
        }

        let layout = self.text.layout_plain(
            caption,
            self.opts.caption_size_px,
            TextBrushRgba8::from(self.opts.caption_color),
            self.opts.caption_max_width_px,
        )?;

        let [x, y] = self.opts.caption_position;
        ctx.set_transform(vello_cpu::kurbo::Affine::translate((
            f64::from(x),
            f64::from(y),
        )));

        for line in layout.lines() {
            for item in line.items() {
                let parley::layout::PositionedLayoutItem::GlyphRun(run) = item else {
                    continue;
                };

                let brush = run.style().brush;
                ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(
                    brush.r, brush.g, brush.b, brush.a,
                ));

                let glyphs = run.glyphs().map(|g| vello_cpu::Glyph {
                    id: g.id,
                    x: g.x,
                    y: g.y,
                });
                ctx.glyph_run(&self.font)
                    .font_size(run.run().font_size())
                    .fill_glyphs(glyphs);
            }
        }
        Ok(())
    }
}

impl Compositor for CpuCompositor {
    fn compose(&mut self, scene: &FrameScene<'_>) -> ReelResult<FrameRGBA> {
        let mut ctx = vello_cpu::RenderContext::new(self.width, self.height);
        ctx.set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);
        ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);

        let [r, g, b] = self.opts.background;
        ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(r, g, b, 255));
        ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
            0.0,
            0.0,
            f64::from(self.width),
            f64::from(self.height),
        ));

        if let Some(graph) = scene.graph {
            let paint = self.graph_paint(graph)?;
            ctx.set_paint(paint);
            // Larger graphs are clipped to the canvas, like a paste at the origin.
            let w = f64::from(graph.width.min(self.opts.canvas_width));
            let h = f64::from(graph.height.min(self.opts.canvas_height));
            ctx.fill_rect(&vello_cpu::kurbo::Rect::new(0.0, 0.0, w, h));
        }

        self.draw_caption(&mut ctx, scene.caption)?;

        ctx.flush();
        ctx.render_to_pixmap(&mut self.pixmap);

        let premul = self.pixmap.data_as_u8_slice();
        let mut data = vec![0u8; premul.len()];
        flatten_to_opaque_rgba8(&mut data, premul, true, self.opts.background)?;

        let full = FrameRGBA {
            width: self.opts.canvas_width,
            height: self.opts.canvas_height,
            data,
            premultiplied: false,
        };
        reduce_box(&full, self.opts.reduce_factor)
    }
}

fn image_premul_bytes_to_pixmap(
    rgba8_premul: &[u8],
    width: u32,
    height: u32,
) -> ReelResult<vello_cpu::Pixmap> {
    let w: u16 = width
        .try_into()
        .map_err(|_| ReelError::compose("graph bitmap width exceeds u16"))?;
    let h: u16 = height
        .try_into()
        .map_err(|_| ReelError::compose("graph bitmap height exceeds u16"))?;
    if rgba8_premul.len() != width as usize * height as usize * 4 {
        return Err(ReelError::compose("graph bitmap byte length mismatch"));
    }

    let mut may_have_opacities = false;
    let mut pixels = Vec::with_capacity(width as usize * height as usize);
    for px in rgba8_premul.chunks_exact(4) {
        let a = px[3];
        may_have_opacities |= a != 255;
        pixels.push(vello_cpu::peniko::color::PremulRgba8 {
            r: px[0],
            g: px[1],
            b: px[2],
            a,
        });
    }

    Ok(vello_cpu::Pixmap::from_parts_with_opacity(
        pixels,
        w,
        h,
        may_have_opacities,
    ))
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn system_font() -> Option<CaptionFont> {
        [
            "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
            "/usr/share/fonts/TTF/DejaVuSans.ttf",
            "/System/Library/Fonts/Supplemental/Arial.ttf",
        ]
        .iter()
        .find_map(|p| CaptionFont::load(PathBuf::from(p)).ok())
    }

    fn opts(font: CaptionFont) -> ComposeOpts {
        ComposeOpts {
            canvas_width: 64,
            canvas_height: 48,
            background: [255, 255, 255],
            font,
            caption_size_px: 12.0,
            caption_position: [2.0, 30.0],
            caption_color: [0, 0, 0, 255],
            caption_max_width_px: None,
            reduce_factor: 2,
        }
    }

    #[test]
    fn pixmap_conversion_rejects_length_mismatch() {
        assert!(image_premul_bytes_to_pixmap(&[0u8; 4], 2, 2).is_err());
    }

    #[test]
    fn empty_scene_is_background_at_reduced_size() {
        let Some(font) = system_font() else {
            return;
        };
        let mut c = CpuCompositor::new(opts(font)).unwrap();
        let frame = c
            .compose(&FrameScene {
                graph: None,
                caption: "",
            })
            .unwrap();
        assert_eq!((frame.width, frame.height), (32, 24));
        assert!(frame.data.iter().all(|&b| b == 255));
    }

    #[test]
    fn graph_is_pasted_at_origin_and_caption_darkens_pixels() {
        let Some(font) = system_font() else {
            return;
        };
        let mut c = CpuCompositor::new(opts(font)).unwrap();

        // 4x4 opaque red block.
        let graph = PreparedImage::from_straight_rgba8(4, 4, [255u8, 0, 0, 255].repeat(16));
        let frame = c
            .compose(&FrameScene {
                graph: Some(&graph),
                caption: "Hi",
            })
            .unwrap();

        assert_eq!(&frame.data[0..4], &[255, 0, 0, 255]);
        // Outside the graph the background stays white.
        let far = ((10 * frame.width + 30) * 4) as usize;
        assert_eq!(&frame.data[far..far + 4], &[255, 255, 255, 255]);
        // Caption sits below y=15 (reduced) and draws something non-white.
        let caption_rows = &frame.data[(15 * frame.width * 4) as usize..];
        assert!(caption_rows.chunks_exact(4).any(|px| px[0] < 200));
    }
}
