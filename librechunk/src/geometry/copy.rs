//! Strided copies between row-major flat buffers.
//!
//! A buffer shaped `[n0, n1, ..., nD-1]` with `element_size`-byte elements has
//! byte strides `stride[D-1] = element_size` and
//! `stride[i] = stride[i+1] * n[i+1]`. Copies walk the axes from outermost to
//! innermost and move one contiguous run per innermost traversal. Trailing
//! axes that are covered completely in both buffers are folded into that run.

/// Copies the sub-box `offset_in_source .. offset_in_source + sub_length` out
/// of `source` (shaped `source_length`) into the dense buffer `dest` (shaped
/// `sub_length`).
///
/// # Panics
///
/// Panics if the sub-box does not fit inside the source box, or if either
/// buffer is too small for its shape.
pub fn extract_sub_block(
    source: &[u8],
    source_length: &[i64],
    dest: &mut [u8],
    offset_in_source: &[i64],
    sub_length: &[i64],
    element_size: usize,
) {
    let origin = vec![0; sub_length.len()];
    copy_region(
        Layout {
            buf_shape: source_length,
            origin: offset_in_source,
        },
        source,
        Layout {
            buf_shape: sub_length,
            origin: &origin,
        },
        dest,
        sub_length,
        element_size,
    );
}

/// Inverse of [`extract_sub_block`]: writes the dense `sub_block` (shaped
/// `sub_length`) into `dest` (shaped `dest_length`) at `offset_in_dest`.
///
/// # Panics
///
/// Same conditions as [`extract_sub_block`].
pub fn embed_sub_block(
    sub_block: &[u8],
    sub_length: &[i64],
    dest: &mut [u8],
    dest_length: &[i64],
    offset_in_dest: &[i64],
    element_size: usize,
) {
    let origin = vec![0; sub_length.len()];
    copy_region(
        Layout {
            buf_shape: sub_length,
            origin: &origin,
        },
        sub_block,
        Layout {
            buf_shape: dest_length,
            origin: offset_in_dest,
        },
        dest,
        sub_length,
        element_size,
    );
}

/// Where a region sits inside one flat buffer.
#[derive(Clone, Copy)]
struct Layout<'a> {
    buf_shape: &'a [i64],
    origin: &'a [i64],
}

impl Layout<'_> {
    fn check(&self, extent: &[i64], buf_len: usize, element_size: usize, what: &str) {
        assert_eq!(self.buf_shape.len(), extent.len(), "{what}: dimension mismatch");
        assert_eq!(self.origin.len(), extent.len(), "{what}: dimension mismatch");
        for axis in 0..extent.len() {
            assert!(
                self.origin[axis] >= 0 && self.origin[axis] + extent[axis] <= self.buf_shape[axis],
                "{what}: region exceeds buffer on axis {axis}"
            );
        }
        let needed = super::volume(self.buf_shape) as usize * element_size;
        assert!(buf_len >= needed, "{what}: buffer holds {buf_len} bytes, shape needs {needed}");
    }

    fn strides(&self, element_size: usize) -> Vec<usize> {
        let mut strides = vec![element_size; self.buf_shape.len()];
        for axis in (0..self.buf_shape.len().saturating_sub(1)).rev() {
            strides[axis] = strides[axis + 1] * self.buf_shape[axis + 1] as usize;
        }
        strides
    }

    fn start(&self, strides: &[usize]) -> usize {
        self.origin
            .iter()
            .zip(strides)
            .map(|(&o, &s)| o as usize * s)
            .sum()
    }
}

struct StridedCopy<'a> {
    src: &'a [u8],
    dst: &'a mut [u8],
    src_strides: Vec<usize>,
    dst_strides: Vec<usize>,
    extent: &'a [i64],
    /// Axis at which a single contiguous run covers the rest of the region.
    run_axis: usize,
    run_len: usize,
}

impl StridedCopy<'_> {
    fn copy_axis(&mut self, axis: usize, src_pos: usize, dst_pos: usize) {
        if axis == self.run_axis {
            self.dst[dst_pos..dst_pos + self.run_len]
                .copy_from_slice(&self.src[src_pos..src_pos + self.run_len]);
            return;
        }
        for i in 0..self.extent[axis] as usize {
            self.copy_axis(
                axis + 1,
                src_pos + i * self.src_strides[axis],
                dst_pos + i * self.dst_strides[axis],
            );
        }
    }
}

fn copy_region(
    src_layout: Layout<'_>,
    src: &[u8],
    dst_layout: Layout<'_>,
    dst: &mut [u8],
    extent: &[i64],
    element_size: usize,
) {
    assert!(!extent.is_empty(), "zero-dimensional copy");
    if super::volume(extent) == 0 {
        return;
    }
    src_layout.check(extent, src.len(), element_size, "source");
    dst_layout.check(extent, dst.len(), element_size, "destination");

    let src_strides = src_layout.strides(element_size);
    let dst_strides = dst_layout.strides(element_size);

    let last = extent.len() - 1;
    let mut run_axis = last;
    let mut run_len = extent[last] as usize * element_size;
    while run_axis > 0
        && extent[run_axis] == src_layout.buf_shape[run_axis]
        && extent[run_axis] == dst_layout.buf_shape[run_axis]
    {
        run_axis -= 1;
        run_len *= extent[run_axis] as usize;
    }

    let src_start = src_layout.start(&src_strides);
    let dst_start = dst_layout.start(&dst_strides);
    let mut copy = StridedCopy {
        src,
        dst,
        src_strides,
        dst_strides,
        extent,
        run_axis,
        run_len,
    };
    copy.copy_axis(0, src_start, dst_start);
}
