pub(crate) fn mul_div255_u16(x: u16, y: u16) -> u16 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u16
}

pub(crate) fn premultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = u16::from(px[3]);
        if a == 0 {
            px[0] = 0;
            px[1] = 0;
            px[2] = 0;
            continue;
        }
        px[0] = mul_div255_u16(u16::from(px[0]), a) as u8;
        px[1] = mul_div255_u16(u16::from(px[1]), a) as u8;
        px[2] = mul_div255_u16(u16::from(px[2]), a) as u8;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mul_div255_rounds_to_nearest() {
        assert_eq!(mul_div255_u16(255, 255), 255);
        assert_eq!(mul_div255_u16(255, 0), 0);
        assert_eq!(mul_div255_u16(128, 255), 128);
        assert_eq!(mul_div255_u16(255, 128), 128);
    }

    #[test]
    fn premultiply_zero_alpha_clears_color() {
        let mut px = [10u8, 20, 30, 0];
        premultiply_rgba8_in_place(&mut px);
        assert_eq!(px, [0, 0, 0, 0]);
    }

    #[test]
    fn premultiply_opaque_is_identity() {
        let mut px = [1u8, 2, 3, 255];
        premultiply_rgba8_in_place(&mut px);
        assert_eq!(px, [1, 2, 3, 255]);
    }
}
