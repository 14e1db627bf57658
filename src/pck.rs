// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
The Position Correction Kernel (PCK): evaluates the Fourier error at a set
of trial (mangled) scan positions and keeps whichever position — original
or trial — scores lower, for each frame independently.

PCK wraps an internal [`FourierUpdateKernel`] rather than reimplementing
Fourier-error scoring: it builds a probe-only auxiliary wave (no exit-wave
subtraction, `alpha = 0`) at the trial addresses and runs the same
`fourier_error`/`error_reduce` pair AWK/FUK already implement.
*/

use ndarray::{Array1, Array3, ArrayView1, ArrayView3};

use crate::address::AddressBook;
use crate::awk::AuxiliaryWaveKernel;
use crate::fuk::FourierUpdateKernel;
use crate::C32;

pub struct PositionCorrectionKernel {
    fuk: FourierUpdateKernel,
    awk: AuxiliaryWaveKernel,
}

impl PositionCorrectionKernel {
    pub fn new(aux_shape: (usize, usize, usize), nmodes: usize) -> Self {
        Self {
            fuk: FourierUpdateKernel::new(aux_shape, nmodes),
            awk: AuxiliaryWaveKernel::default(),
        }
    }

    /// Overrides the wrapped [`FourierUpdateKernel`]'s denominator; see
    /// [`FourierUpdateKernel::with_denom`].
    pub fn with_denom(mut self, denom: f32) -> Self {
        self.fuk = self.fuk.with_denom(denom);
        self
    }

    pub fn allocate(&mut self) {
        self.fuk.allocate();
    }

    /// Builds a trial auxiliary wave at `addr` using the whole-probe-layer,
    /// no-exit-wave convention (equivalent to [`AuxiliaryWaveKernel::build_aux`]
    /// with `alpha = 0` and `ex` all zero).
    pub fn build_aux(&self, aux: &mut Array3<C32>, addr: &AddressBook, ob: &Array3<C32>, pr: &Array3<C32>) {
        let ex_zero = Array3::from_elem(aux.raw_dim(), C32::new(0.0, 0.0));
        self.awk.build_aux(aux, addr, ob, pr, &ex_zero, 0.0);
    }

    pub fn fourier_error(
        &mut self,
        aux: ArrayView3<C32>,
        mag: ArrayView3<f32>,
        mask: ArrayView3<f32>,
        mask_sum: ArrayView1<f32>,
    ) {
        self.fuk.fourier_error(aux, mag, mask, mask_sum);
    }

    pub fn error_reduce(&self, err_sum: &mut ndarray::ArrayViewMut1<f32>) {
        self.fuk.error_reduce(err_sum);
    }

    /// For every frame, replace the current address entry and error with
    /// the mangled (trial) one when (and only when) the trial error is
    /// strictly lower. Ties keep the current position.
    pub fn update_addr_and_error_state(
        &self,
        addr: &mut AddressBook,
        error_state: &mut Array1<f32>,
        mangled_addr: &AddressBook,
        err_sum: ArrayView1<f32>,
    ) {
        let nframes = addr.num_frames();
        debug_assert_eq!(mangled_addr.num_frames(), nframes);
        debug_assert_eq!(error_state.len(), nframes);
        debug_assert_eq!(err_sum.len(), nframes);

        for f in 0..nframes {
            if err_sum[f] < error_state[f] {
                error_state[f] = err_sum[f];
                let trial = mangled_addr.frame(f).to_vec();
                addr.frame_mut(f).clone_from_slice(&trial);
            }
        }
    }
}
