// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
The Fourier Update Kernel (FUK): computes per-pixel Fourier-magnitude
deviation, reduces it to a per-frame error scalar, and applies the
power-bound magnitude projection.

`fourier_error` and `fmag_all_update` are a two-phase operation: the
`fdev` scratch written by `fourier_error` must still be valid (same `mag`,
same batch) when `fmag_all_update` runs, because the latter recomputes
`af = fdev + mag` rather than storing `af` itself (`SPEC_FULL.md` §9 /
open question 1). Violating that contract is a programmer error, not a
recoverable one.
*/

use ndarray::{s, Array3, ArrayView1, ArrayView3, ArrayViewMut1, Axis, Zip};
use ndarray::parallel::prelude::*;
use log::debug;

use crate::array_utils::scale_modes_inplace;
use crate::constants::DEFAULT_DENOM;
use crate::C32;

/// `(F, H, W)` — the per-frame shape shared by `fdev`, `ferr`, `mag`, `mask`.
pub type FrameShape = (usize, usize, usize);

pub struct FourierUpdateKernel {
    nmodes: usize,
    denom: f32,
    fshape: FrameShape,
    fdev: Option<Array3<f32>>,
    ferr: Option<Array3<f32>>,
}

impl FourierUpdateKernel {
    /// Construct from an example `aux` shape `(F*M, H, W)` and `nmodes`.
    pub fn new(aux_shape: FrameShape, nmodes: usize) -> Self {
        assert!(nmodes > 0, "nmodes must be positive");
        assert_eq!(
            aux_shape.0 % nmodes,
            0,
            "nmodes ({nmodes}) must divide aux's leading dimension ({})",
            aux_shape.0
        );
        let fshape = (aux_shape.0 / nmodes, aux_shape.1, aux_shape.2);
        Self {
            nmodes,
            denom: DEFAULT_DENOM,
            fshape,
            fdev: None,
            ferr: None,
        }
    }

    /// Overrides the Fourier-magnitude constraint's additive denominator
    /// (default [`DEFAULT_DENOM`]). Callers embedding this crate typically
    /// pull this from [`crate::config::KernelConfig::denom`].
    pub fn with_denom(mut self, denom: f32) -> Self {
        self.denom = denom;
        self
    }

    pub fn fshape(&self) -> FrameShape {
        self.fshape
    }

    /// Allocate `fdev`/`ferr` scratch. Idempotent.
    pub fn allocate(&mut self) {
        if self.fdev.is_none() {
            debug!("allocating FUK scratch with shape {:?}", self.fshape);
            self.fdev = Some(Array3::zeros(self.fshape));
            self.ferr = Some(Array3::zeros(self.fshape));
        }
    }

    /// Phase 1: `af = sqrt(sum_m |aux|^2)`, `fdev = af - mag`,
    /// `ferr = mask * fdev^2 / mask_sum`.
    pub fn fourier_error(
        &mut self,
        aux: ArrayView3<C32>,
        mag: ArrayView3<f32>,
        mask: ArrayView3<f32>,
        mask_sum: ArrayView1<f32>,
    ) {
        let maxz = mag.shape()[0];
        let (_, h, w) = self.fshape;
        let nmodes = self.nmodes;
        debug_assert_eq!(aux.shape(), [maxz * nmodes, h, w]);
        debug_assert_eq!(mask.dim(), (maxz, h, w));
        debug_assert_eq!(mask_sum.len(), maxz);
        debug_assert!(
            mask_sum.iter().all(|&m| m > 0.0),
            "mask_sum[f] must be > 0 for every frame entering error reduction"
        );

        let fdev = self
            .fdev
            .as_mut()
            .expect("allocate() must be called before fourier_error()");
        let ferr = self
            .ferr
            .as_mut()
            .expect("allocate() must be called before fourier_error()");

        let aux4 = aux
            .into_shape((maxz, nmodes, h, w))
            .expect("aux must be contiguous in standard layout");
        let af = aux4.mapv(|z| z.norm_sqr()).sum_axis(Axis(1)).mapv(f32::sqrt);

        let mut fdev_slice = fdev.slice_mut(s![..maxz, .., ..]);
        fdev_slice.assign(&(&af - &mag));

        let mut ferr_slice = ferr.slice_mut(s![..maxz, .., ..]);
        Zip::indexed(&mut ferr_slice)
            .and(&fdev_slice)
            .and(&mask)
            .par_for_each(|(f, _y, _x), e, &d, &m| {
                *e = m * d * d / mask_sum[f];
            });
    }

    /// `err_sum[f] = sum_{y,x} ferr[f,y,x]`.
    pub fn error_reduce(&self, err_sum: &mut ArrayViewMut1<f32>) {
        let maxz = err_sum.len();
        let ferr = self
            .ferr
            .as_ref()
            .expect("allocate() must be called before error_reduce()");
        let reduced = ferr
            .slice(s![..maxz, .., ..])
            .sum_axis(Axis(2))
            .sum_axis(Axis(1));
        err_sum.assign(&reduced);
    }

    /// Phase 2: enforce the Fourier-magnitude constraint with a power bound.
    /// Must be called after `fourier_error` on the same batch (see module
    /// doc comment for the `fdev`/`mag` cross-call invariant).
    ///
    /// `fm[f] = (1 - mask) + mask * (mag + fdev*renorm) / (af + denom)`,
    /// where `af = fdev + mag` and `renorm[f] = sqrt(pbound/err_sum[f])` once
    /// `err_sum[f] > pbound`, else `1`. `aux` is then scaled by `fm`,
    /// broadcast across modes.
    pub fn fmag_all_update(
        &mut self,
        aux: &mut Array3<C32>,
        mag: ArrayView3<f32>,
        mask: ArrayView3<f32>,
        err_sum: ArrayView1<f32>,
        pbound: f32,
    ) {
        let maxz = mag.shape()[0];
        let nmodes = self.nmodes;
        let (_, h, w) = self.fshape;
        debug_assert_eq!(aux.shape(), [maxz * nmodes, h, w]);
        debug_assert_eq!(err_sum.len(), maxz);

        let denom = self.denom;
        let fdev = self
            .fdev
            .as_ref()
            .expect("fourier_error() must run before fmag_all_update()");
        let fdev_slice = fdev.slice(s![..maxz, .., ..]);

        let mut fm = Array3::<f32>::ones((maxz, h, w));
        Zip::indexed(&mut fm)
            .and(&fdev_slice)
            .and(&mag)
            .and(&mask)
            .par_for_each(|(f, _y, _x), fm_v, &dev, &m, &mk| {
                let err = err_sum[f];
                let renorm = if err > pbound { (pbound / err).sqrt() } else { 1.0 };
                let af = dev + m;
                *fm_v = (1.0 - mk) + mk * (m + dev * renorm) / (af + denom);
            });

        let aux4 = aux
            .view_mut()
            .into_shape((maxz, nmodes, h, w))
            .expect("aux must be contiguous in standard layout");
        scale_modes_inplace(aux4, fm.view());
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array1};

    use super::*;

    #[test]
    fn fourier_error_is_zero_when_aux_matches_magnitude() {
        let mut fuk = FourierUpdateKernel::new((1, 1, 1), 1);
        fuk.allocate();

        let aux = array![[[C32::new(2.0, 0.0)]]];
        let mag = array![[[2.0f32]]];
        let mask = array![[[1.0f32]]];
        let mask_sum = Array1::from_vec(vec![1.0f32]);

        fuk.fourier_error(aux.view(), mag.view(), mask.view(), mask_sum.view());

        let mut err_sum = Array1::<f32>::zeros(1);
        fuk.error_reduce(&mut err_sum.view_mut());
        assert_abs_diff_eq!(err_sum[0], 0.0, epsilon = 1e-6);
    }

    #[test]
    fn hard_projection_recovers_measured_magnitude() {
        // A single mode with |aux| = 4 projected onto a measured magnitude
        // of 2, with pbound = 0 (unconditional hard projection), should
        // rescale aux down to magnitude 2.
        let mut fuk = FourierUpdateKernel::new((1, 1, 1), 1);
        fuk.allocate();

        let mut aux = array![[[C32::new(4.0, 0.0)]]];
        let mag = array![[[2.0f32]]];
        let mask = array![[[1.0f32]]];
        let mask_sum = Array1::from_vec(vec![1.0f32]);

        fuk.fourier_error(aux.view(), mag.view(), mask.view(), mask_sum.view());
        let mut err_sum = Array1::<f32>::zeros(1);
        fuk.error_reduce(&mut err_sum.view_mut());

        fuk.fmag_all_update(&mut aux, mag.view(), mask.view(), err_sum.view(), 0.0);
        assert_abs_diff_eq!(aux[[0, 0, 0]].re, 2.0, epsilon = 1e-4);
    }

    #[test]
    fn untouched_pixels_outside_mask_are_left_at_measured_magnitude_ratio() {
        let mut fuk = FourierUpdateKernel::new((1, 1, 1), 1);
        fuk.allocate();

        let mut aux = array![[[C32::new(4.0, 0.0)]]];
        let mag = array![[[2.0f32]]];
        let mask = array![[[0.0f32]]];
        let mask_sum = Array1::from_vec(vec![1.0f32]);

        fuk.fourier_error(aux.view(), mag.view(), mask.view(), mask_sum.view());
        let mut err_sum = Array1::<f32>::zeros(1);
        fuk.error_reduce(&mut err_sum.view_mut());

        fuk.fmag_all_update(&mut aux, mag.view(), mask.view(), err_sum.view(), 0.0);
        // mask = 0 => fm = 1, aux unchanged.
        assert_abs_diff_eq!(aux[[0, 0, 0]].re, 4.0, epsilon = 1e-4);
    }
}
