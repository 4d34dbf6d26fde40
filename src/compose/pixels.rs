use crate::compose::FrameRGBA;
use crate::foundation::error::{ReelError, ReelResult};
use crate::foundation::math::mul_div255_u16;

/// Flatten premultiplied or straight RGBA8 onto an opaque background.
pub fn flatten_to_opaque_rgba8(
    dst: &mut [u8],
    src: &[u8],
    src_is_premul: bool,
    bg_rgb: [u8; 3],
) -> ReelResult<()> {
    if dst.len() != src.len() || !dst.len().is_multiple_of(4) {
        return Err(ReelError::compose(
            "flatten_to_opaque_rgba8 expects equal-length rgba8 buffers",
        ));
    }

    let bg_r = u16::from(bg_rgb[0]);
    let bg_g = u16::from(bg_rgb[1]);
    let bg_b = u16::from(bg_rgb[2]);

    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        let a = u16::from(s[3]);
        if a == 255 {
            d.copy_from_slice(s);
            continue;
        }

        let inv = 255u16 - a;

        let (r, g, b) = if src_is_premul {
            (
                u16::from(s[0]) + mul_div255_u16(bg_r, inv),
                u16::from(s[1]) + mul_div255_u16(bg_g, inv),
                u16::from(s[2]) + mul_div255_u16(bg_b, inv),
            )
        } else {
            (
                mul_div255_u16(u16::from(s[0]), a) + mul_div255_u16(bg_r, inv),
                mul_div255_u16(u16::from(s[1]), a) + mul_div255_u16(bg_g, inv),
                mul_div255_u16(u16::from(s[2]), a) + mul_div255_u16(bg_b, inv),
            )
        };

        d[0] = r.min(255) as u8;
        d[1] = g.min(255) as u8;
        d[2] = b.min(255) as u8;
        d[3] = 255;
    }

    Ok(())
}

/// Downscale by an integer factor, averaging each `factor x factor` box.
///
/// Output dimensions round up; boxes on the right and bottom edges average only the pixels
/// they cover. A factor of 1 returns the frame unchanged.
pub fn reduce_box(frame: &FrameRGBA, factor: u32) -> ReelResult<FrameRGBA> {
    if factor == 0 {
        return Err(ReelError::validation("reduce factor must be >= 1"));
    }
    let (w, h) = (frame.width as usize, frame.height as usize);
    if frame.data.len() != w * h * 4 {
        return Err(ReelError::compose(format!(
            "frame data length {} does not match {}x{} rgba8",
            frame.data.len(),
            frame.width,
            frame.height
        )));
    }
    if factor == 1 {
        return Ok(frame.clone());
    }

    let f = factor as usize;
    let out_w = w.div_ceil(f);
    let out_h = h.div_ceil(f);
    let mut out = vec![0u8; out_w * out_h * 4];

    for oy in 0..out_h {
        let y0 = oy * f;
        let y1 = (y0 + f).min(h);
        for ox in 0..out_w {
            let x0 = ox * f;
            let x1 = (x0 + f).min(w);

            let mut sum = [0u64; 4];
            for y in y0..y1 {
                let row = &frame.data[(y * w + x0) * 4..(y * w + x1) * 4];
                for px in row.chunks_exact(4) {
                    for c in 0..4 {
                        sum[c] += u64::from(px[c]);
                    }
                }
            }

            let n = ((y1 - y0) * (x1 - x0)) as u64;
            let o = (oy * out_w + ox) * 4;
            for c in 0..4 {
                out[o + c] = ((sum[c] + n / 2) / n) as u8;
            }
        }
    }

    Ok(FrameRGBA {
        width: out_w as u32,
        height: out_h as u32,
        data: out,
        premultiplied: frame.premultiplied,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(width: u32, height: u32, data: Vec<u8>) -> FrameRGBA {
        FrameRGBA {
            width,
            height,
            data,
            premultiplied: false,
        }
    }

    #[test]
    fn flatten_premul_over_black_produces_expected_rgb() {
        let src = vec![128u8, 0u8, 0u8, 128u8];
        let mut dst = vec![0u8; 4];
        flatten_to_opaque_rgba8(&mut dst, &src, true, [0, 0, 0]).unwrap();
        assert_eq!(dst, vec![128u8, 0u8, 0u8, 255u8]);
    }

    #[test]
    fn flatten_transparent_over_white_is_white() {
        let src = vec![0u8, 0u8, 0u8, 0u8];
        let mut dst = vec![0u8; 4];
        flatten_to_opaque_rgba8(&mut dst, &src, true, [255, 255, 255]).unwrap();
        assert_eq!(dst, vec![255u8, 255u8, 255u8, 255u8]);
    }

    #[test]
    fn flatten_rejects_mismatched_buffers() {
        let mut dst = vec![0u8; 8];
        assert!(flatten_to_opaque_rgba8(&mut dst, &[0u8; 4], true, [0, 0, 0]).is_err());
    }

    #[test]
    fn reduce_2x2_averages_box() {
        let f = frame(
            2,
            2,
            vec![
                0, 0, 0, 255, //
                100, 0, 0, 255, //
                0, 200, 0, 255, //
                0, 0, 40, 255,
            ],
        );
        let out = reduce_box(&f, 2).unwrap();
        assert_eq!((out.width, out.height), (1, 1));
        assert_eq!(out.data, vec![25, 50, 10, 255]);
    }

    #[test]
    fn reduce_partial_edge_boxes_average_covered_pixels() {
        // 3x1 row: first box covers x=0..2, second box only x=2.
        let f = frame(
            3,
            1,
            vec![
                10, 10, 10, 255, //
                30, 30, 30, 255, //
                77, 77, 77, 255,
            ],
        );
        let out = reduce_box(&f, 2).unwrap();
        assert_eq!((out.width, out.height), (2, 1));
        assert_eq!(out.data, vec![20, 20, 20, 255, 77, 77, 77, 255]);
    }

    #[test]
    fn reduce_factor_one_is_identity_and_zero_is_error() {
        let f = frame(1, 1, vec![1, 2, 3, 4]);
        assert_eq!(reduce_box(&f, 1).unwrap(), f);
        assert!(reduce_box(&f, 0).is_err());
    }

    #[test]
    fn reduce_large_box_does_not_overflow() {
        // 4200^2 white pixels sum past u32::MAX in every channel.
        let side = 4200u32;
        let f = frame(side, side, vec![255; (side * side * 4) as usize]);
        let out = reduce_box(&f, side).unwrap();
        assert_eq!((out.width, out.height), (1, 1));
        assert_eq!(out.data, vec![255, 255, 255, 255]);
    }

    #[test]
    fn reduce_rejects_bad_length() {
        let f = frame(2, 2, vec![0; 4]);
        assert!(reduce_box(&f, 2).is_err());
    }
}
