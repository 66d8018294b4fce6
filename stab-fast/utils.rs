//! Circular run tests for the 16-pixel Bresenham ring

/// True when `mask` holds at least `min_len` consecutive set bits, wrapping around.
///
/// A run of length n survives n-1 rotate-and-AND steps.
pub fn has_contiguous_arc(mask: u16, min_len: usize) -> bool {
    if min_len == 0 || min_len > 16 {
        return false;
    }
    if mask == u16::MAX {
        return true;
    }
    let mut runs = mask;
    for i in 1..min_len as u32 {
        runs &= mask.rotate_right(i);
        if runs == 0 {
            return false;
        }
    }
    runs != 0
}
