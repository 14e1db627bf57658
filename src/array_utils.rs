// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Small array utilities shared by every kernel: elementwise `|z|²`, the
scatter-reduction used for incoherent-mode summation, and the patch-window
helpers that every kernel uses to index into `ob`/`pr`/`aux` via the
address book.
*/

use ndarray::{s, Array3, ArrayView2, ArrayView3, ArrayViewMut2, ArrayViewMut4, Axis, Dimension};
use ndarray::parallel::prelude::*;

use crate::address::Addr3;
use crate::C32;

/// `|x|²` for every element, preserving shape.
pub fn abs2<D: Dimension>(x: ndarray::ArrayView<C32, D>) -> ndarray::Array<f32, D> {
    x.mapv(|z| z.norm_sqr())
}

/// Zero-initialize an array of `out_shape`, then for every `i` add
/// `src[src_addr[i]]` into `out[dst_addr[i]]`.
///
/// Used for incoherent-mode summation across sub-frames: `dst_addr` may
/// repeat, so this is a genuine scatter-*reduction*, not a scatter-write.
pub fn sum_to_buffer<T>(
    src: &Array3<T>,
    out_shape: (usize, usize, usize),
    src_addr: &[[usize; 3]],
    dst_addr: &[[usize; 3]],
) -> Array3<T>
where
    T: Copy + num_traits::Zero + std::ops::AddAssign,
{
    assert_eq!(
        src_addr.len(),
        dst_addr.len(),
        "src_addr and dst_addr must have the same length"
    );
    let mut out = Array3::<T>::zeros(out_shape);
    for (s, d) in src_addr.iter().zip(dst_addr.iter()) {
        out[*d] += src[*s];
    }
    out
}

/// An immutable view of the `(h, w)` patch of `field` at `addr`.
pub fn patch<T>(field: &Array3<T>, addr: Addr3, h: usize, w: usize) -> ArrayView2<T> {
    let (layer, row, col) = (addr[0] as usize, addr[1] as usize, addr[2] as usize);
    field.slice(s![layer, row..row + h, col..col + w])
}

/// A mutable view of the `(h, w)` patch of `field` at `addr`.
pub fn patch_mut<T>(field: &mut Array3<T>, addr: Addr3, h: usize, w: usize) -> ArrayViewMut2<T> {
    let (layer, row, col) = (addr[0] as usize, addr[1] as usize, addr[2] as usize);
    field.slice_mut(s![layer, row..row + h, col..col + w])
}

/// Multiply every mode of a `[F, M, H, W]` view in place by a per-frame,
/// per-pixel `[F, H, W]` factor, broadcasting over the mode axis. Shared by
/// `FourierUpdateKernel::fmag_all_update` and `GradientDescentKernel::main`.
pub fn scale_modes_inplace(mut aux4: ArrayViewMut4<C32>, factor: ArrayView3<f32>) {
    aux4.axis_iter_mut(Axis(0))
        .into_par_iter()
        .zip(factor.axis_iter(Axis(0)).into_par_iter())
        .for_each(|(mut frame_modes, factor_frame)| {
            for mut mode in frame_modes.axis_iter_mut(Axis(0)) {
                ndarray::Zip::from(&mut mode)
                    .and(&factor_frame)
                    .for_each(|a, &f| *a *= f);
            }
        });
}
