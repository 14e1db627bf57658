// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
The Gradient Descent Kernel (GDK): forms the incoherent-mode intensity
model, scores it against measured data, and produces the quadratic
line-search coefficients a maximum-likelihood engine uses to pick a step
size along a descent direction.

`make_a012` and `fill_b` work together: the caller evaluates the model at
three points along a search direction (the current iterate `f`, and two
expansion directions `a`/`b`), `make_a012` turns those into per-pixel
quadratic coefficients `(A0, A1, A2)` of the error as a function of step
size `t`, and `fill_b` reduces those to a length-3 polynomial-coefficient
vector `B`, accumulated across calls so several frames can contribute to
one global step-size solve.
*/

use ndarray::{s, Array1, Array3, ArrayView1, ArrayView3, ArrayViewMut1, Zip};
use ndarray::parallel::prelude::*;
use log::debug;

use crate::constants::DEFAULT_DENOM;
use crate::fuk::FrameShape;
use crate::C32;

pub struct GradientDescentKernel {
    nmodes: usize,
    denom: f32,
    fshape: FrameShape,
    imodel: Option<Array3<f32>>,
    llerr: Option<Array3<f32>>,
    llden: Option<Array3<f32>>,
}

impl GradientDescentKernel {
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
            imodel: None,
            llerr: None,
            llden: None,
        }
    }

    /// Overrides the floating-intensity denominator guard (default
    /// [`DEFAULT_DENOM`]). Callers embedding this crate typically pull this
    /// from [`crate::config::KernelConfig::denom`].
    pub fn with_denom(mut self, denom: f32) -> Self {
        self.denom = denom;
        self
    }

    pub fn fshape(&self) -> FrameShape {
        self.fshape
    }

    /// Allocate `Imodel`/`LLerr`/`LLden` scratch. Idempotent.
    pub fn allocate(&mut self) {
        if self.imodel.is_none() {
            debug!("allocating GDK scratch with shape {:?}", self.fshape);
            self.imodel = Some(Array3::zeros(self.fshape));
            self.llerr = Some(Array3::zeros(self.fshape));
            self.llden = Some(Array3::zeros(self.fshape));
        }
    }

    /// `Imodel[f] = sum_m |aux[f,m]|^2`.
    pub fn make_model(&mut self, aux: ArrayView3<C32>) {
        let (maxf, h, w) = self.fshape;
        let nmodes = self.nmodes;
        debug_assert_eq!(aux.shape(), [maxf * nmodes, h, w]);

        let imodel = self
            .imodel
            .as_mut()
            .expect("allocate() must be called before make_model()");
        let aux4 = aux
            .into_shape((maxf, nmodes, h, w))
            .expect("aux must be contiguous in standard layout");
        imodel.assign(&aux4.mapv(|z| z.norm_sqr()).sum_axis(ndarray::Axis(1)));
    }

    /// Scores `Imodel` against measured intensity `data` under weight `w`,
    /// and propagates the residual back into `aux` so it can be fed into
    /// the probe/object update kernel: each mode of `aux` is scaled by
    /// `w * (Imodel - data)`.
    pub fn main(&mut self, aux: &mut Array3<C32>, data: ArrayView3<f32>, w: ArrayView3<f32>) {
        let (maxf, h, wd) = self.fshape;
        let nmodes = self.nmodes;
        debug_assert_eq!(aux.shape(), [maxf * nmodes, h, wd]);
        debug_assert_eq!(data.dim(), (maxf, h, wd));
        debug_assert_eq!(w.dim(), (maxf, h, wd));

        let imodel = self
            .imodel
            .as_ref()
            .expect("make_model() must run before main()")
            .clone();
        let llerr = self
            .llerr
            .as_mut()
            .expect("allocate() must be called before main()");

        let diff = &imodel - &data;
        Zip::from(llerr.view_mut())
            .and(&w)
            .and(&diff)
            .par_for_each(|e, &wv, &d| *e = wv * d * d);

        let mut grad = Array3::<f32>::zeros((maxf, h, wd));
        Zip::from(&mut grad)
            .and(&w)
            .and(&diff)
            .par_for_each(|g, &wv, &d| *g = wv * d);

        crate::array_utils::scale_modes_inplace(
            aux.view_mut()
                .into_shape((maxf, nmodes, h, wd))
                .expect("aux must be contiguous in standard layout"),
            grad.view(),
        );
    }

    /// `err_sum[f] = sum_{y,x} LLerr[f,y,x]`.
    pub fn error_reduce(&self, err_sum: &mut ArrayViewMut1<f32>) {
        let maxf = err_sum.len();
        let llerr = self
            .llerr
            .as_ref()
            .expect("allocate() must be called before error_reduce()");
        let reduced = llerr
            .slice(s![..maxf, .., ..])
            .sum_axis(ndarray::Axis(2))
            .sum_axis(ndarray::Axis(1));
        err_sum.assign(&reduced);
    }

    /// Given the model evaluated along a descent direction at three probe
    /// points `f` (current), `a` (first-order term), `b` (second-order
    /// term), computes the per-pixel quadratic coefficients of
    /// `error(t) = sum_m |f + t*a + t^2*b|^2` as a function of `t`:
    /// `A0 = Imodel(f) - fic*data`, `A1 = 2*sum_m Re(f * conj(a)) - fic*data`,
    /// `A2 = sum_m (|a|^2 + 2*Re(f * conj(b))) - fic*data`.
    ///
    /// The `- fic*data` term on `A1`/`A2` looks redundant with `A0` but is
    /// reproduced deliberately: it matches the upstream reference's
    /// coefficient form exactly (an open question in `SPEC_FULL.md` §9,
    /// preserved rather than "fixed").
    pub fn make_a012(
        &mut self,
        f: ArrayView3<C32>,
        a: ArrayView3<C32>,
        b: ArrayView3<C32>,
        data: ArrayView3<f32>,
        fic: ArrayView1<f32>,
        a0: &mut Array3<f32>,
        a1: &mut Array3<f32>,
        a2: &mut Array3<f32>,
    ) {
        let (maxf, h, w) = self.fshape;
        let nmodes = self.nmodes;
        debug_assert_eq!(f.shape(), [maxf * nmodes, h, w]);
        debug_assert_eq!(a.shape(), f.shape());
        debug_assert_eq!(b.shape(), f.shape());
        debug_assert_eq!(fic.len(), maxf);

        let f4 = f
            .into_shape((maxf, nmodes, h, w))
            .expect("f must be contiguous in standard layout");
        let a4 = a
            .into_shape((maxf, nmodes, h, w))
            .expect("a must be contiguous in standard layout");
        let b4 = b
            .into_shape((maxf, nmodes, h, w))
            .expect("b must be contiguous in standard layout");

        let imodel = f4.mapv(|z| z.norm_sqr()).sum_axis(ndarray::Axis(1));
        Zip::indexed(a0.view_mut())
            .and(&imodel)
            .and(&data)
            .par_for_each(|(fidx, _y, _x), out, &im, &d| {
                *out = im - fic[fidx] * d;
            });

        let re_fa = (&f4 * &a4.mapv(|z| z.conj()))
            .mapv(|z| z.re)
            .sum_axis(ndarray::Axis(1));
        Zip::indexed(a1.view_mut())
            .and(&re_fa)
            .and(&data)
            .par_for_each(|(fidx, _y, _x), out, &re, &d| {
                *out = 2.0 * re - fic[fidx] * d;
            });

        let abs2_a = a4.mapv(|z| z.norm_sqr()).sum_axis(ndarray::Axis(1));
        let re_fb = (&f4 * &b4.mapv(|z| z.conj()))
            .mapv(|z| z.re)
            .sum_axis(ndarray::Axis(1));
        Zip::indexed(a2.view_mut())
            .and(&abs2_a)
            .and(&re_fb)
            .and(&data)
            .par_for_each(|(fidx, _y, _x), out, &a2v, &re, &d| {
                *out = a2v + 2.0 * re - fic[fidx] * d;
            });
    }

    /// Reduces `(A0, A1, A2)` under weight `w` into the length-3
    /// line-search coefficient vector `B`, accumulating:
    /// `B[0] += Brenorm * sum(w*A0^2)`, `B[1] += Brenorm * 2*sum(w*A0*A1)`,
    /// `B[2] += Brenorm * sum(w*(A1^2 + 2*A0*A2))`.
    pub fn fill_b(
        &self,
        a0: ArrayView3<f32>,
        a1: ArrayView3<f32>,
        a2: ArrayView3<f32>,
        w: ArrayView3<f32>,
        brenorm: f32,
        b: &mut [f32; 3],
    ) {
        debug_assert_eq!(a0.dim(), a1.dim());
        debug_assert_eq!(a0.dim(), a2.dim());
        debug_assert_eq!(a0.dim(), w.dim());

        let b0: f32 = Zip::from(&a0).and(&w).fold(0.0, |acc, &x, &wv| acc + wv * x * x);
        let b1: f32 = Zip::from(&a0)
            .and(&a1)
            .and(&w)
            .fold(0.0, |acc, &x0, &x1, &wv| acc + wv * x0 * x1);
        let b2: f32 = Zip::from(&a1)
            .and(&a2)
            .and(&a0)
            .and(&w)
            .fold(0.0, |acc, &x1, &x2, &x0, &wv| {
                acc + wv * (x1 * x1 + 2.0 * x0 * x2)
            });

        b[0] += brenorm * b0;
        b[1] += brenorm * 2.0 * b1;
        b[2] += brenorm * b2;
    }

    /// Least-squares per-frame floating-intensity scale factor,
    /// `fic[f] = sum(w*data*Imodel) / sum(w*Imodel^2)`, used to decouple a
    /// per-frame detector-intensity normalization from the object/probe
    /// reconstruction (`SPEC_FULL.md` §4.4).
    pub fn floating_intensity(
        &self,
        data: ArrayView3<f32>,
        w: ArrayView3<f32>,
        fic: &mut Array1<f32>,
    ) {
        let maxf = fic.len();
        let imodel = self
            .imodel
            .as_ref()
            .expect("make_model() must run before floating_intensity()");
        debug_assert_eq!(imodel.dim(), data.dim());
        debug_assert_eq!(imodel.dim(), w.dim());

        for f in 0..maxf {
            let im = imodel.index_axis(ndarray::Axis(0), f);
            let dt = data.index_axis(ndarray::Axis(0), f);
            let wt = w.index_axis(ndarray::Axis(0), f);
            let num: f32 = Zip::from(&im)
                .and(&dt)
                .and(&wt)
                .fold(0.0, |acc, &i, &d, &wv| acc + wv * d * i);
            let den: f32 = Zip::from(&im).and(&wt).fold(0.0, |acc, &i, &wv| acc + wv * i * i);
            fic[f] = if den > self.denom { num / den } else { 1.0 };
        }
    }
}
