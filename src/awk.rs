// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
The Auxiliary Wave Kernel (AWK): forms and updates auxiliary exit waves
from object and probe patches.

`build_aux` and `build_aux_no_ex` are pure reads of `ob`/`pr` into disjoint
slots of `aux`, so they parallelize trivially across addresses. `build_exit`
additionally accumulates into `ex`, which different address entries may
share; per `SPEC_FULL.md` §5 that accumulation is done with a sequential
scan rather than attempted floating-point atomics, exactly as the upstream
Python reference does it (a plain `for` loop over `flat_addr`).
*/

use ndarray::{parallel::prelude::*, Array3, Axis};

use crate::address::AddressBook;
use crate::array_utils::{patch, patch_mut};
use crate::C32;

/// Stateless; AWK carries no scratch buffers of its own (spec.md §3).
#[derive(Debug, Default, Clone, Copy)]
pub struct AuxiliaryWaveKernel;

impl AuxiliaryWaveKernel {
    /// `aux[exc] = (1+alpha)*ob[obc_patch]*pr[prc_layer] - alpha*ex[exc_patch]`.
    ///
    /// The probe is read as a whole, un-shifted layer (`pr[prc_layer, :, :]`),
    /// not a windowed patch — this is the AWK convention noted in
    /// `SPEC_FULL.md` §4.2.
    pub fn build_aux(
        &self,
        aux: &mut Array3<C32>,
        addr: &AddressBook,
        ob: &Array3<C32>,
        pr: &Array3<C32>,
        ex: &Array3<C32>,
        alpha: f32,
    ) {
        let h = aux.shape()[1];
        let w = aux.shape()[2];
        debug_assert_eq!(addr.entries().len(), aux.shape()[0]);

        aux.axis_iter_mut(Axis(0))
            .into_par_iter()
            .zip(addr.entries().par_iter())
            .for_each(|(mut aux_slot, e)| {
                let ob_patch = patch(ob, e.obc, h, w);
                let pr_layer = pr.index_axis(Axis(0), e.prc[0] as usize);
                let ex_patch = patch(ex, e.exc, h, w);
                ndarray::Zip::from(&mut aux_slot)
                    .and(&ob_patch)
                    .and(&pr_layer)
                    .and(&ex_patch)
                    .for_each(|a, &o, &p, &x| {
                        *a = o * p * (1.0 + alpha) - x * alpha;
                    });
            });
    }

    /// Same as [`Self::build_aux`] but omits the exit-wave subtraction and
    /// uses a patch-shifted probe (not a whole layer). Overwrites `aux` by
    /// default; accumulates if `add` is set.
    pub fn build_aux_no_ex(
        &self,
        aux: &mut Array3<C32>,
        addr: &AddressBook,
        ob: &Array3<C32>,
        pr: &Array3<C32>,
        fac: f32,
        add: bool,
    ) {
        let h = aux.shape()[1];
        let w = aux.shape()[2];
        debug_assert_eq!(addr.entries().len(), aux.shape()[0]);

        aux.axis_iter_mut(Axis(0))
            .into_par_iter()
            .zip(addr.entries().par_iter())
            .for_each(|(mut aux_slot, e)| {
                let ob_patch = patch(ob, e.obc, h, w);
                let pr_patch = patch(pr, e.prc, h, w);
                if add {
                    ndarray::Zip::from(&mut aux_slot)
                        .and(&ob_patch)
                        .and(&pr_patch)
                        .for_each(|a, &o, &p| *a += o * p * fac);
                } else {
                    ndarray::Zip::from(&mut aux_slot)
                        .and(&ob_patch)
                        .and(&pr_patch)
                        .for_each(|a, &o, &p| *a = o * p * fac);
                }
            });
    }

    /// `dex = aux - ob_patch*pr_patch`; `ex += dex` (additive, overlapping
    /// windows permitted); `aux := dex`.
    ///
    /// Runs sequentially over addresses because `ex` entries may overlap.
    pub fn build_exit(
        &self,
        aux: &mut Array3<C32>,
        addr: &AddressBook,
        ob: &Array3<C32>,
        pr: &Array3<C32>,
        ex: &mut Array3<C32>,
    ) {
        let h = aux.shape()[1];
        let w = aux.shape()[2];
        debug_assert_eq!(addr.entries().len(), aux.shape()[0]);

        for (i, e) in addr.entries().iter().enumerate() {
            let ob_patch = patch(ob, e.obc, h, w).to_owned();
            let pr_patch = patch(pr, e.prc, h, w).to_owned();
            let mut aux_slot = aux.index_axis_mut(Axis(0), i);
            let dex = &aux_slot - &(ob_patch * pr_patch);
            let mut ex_patch = patch_mut(ex, e.exc, h, w);
            ex_patch += &dex;
            aux_slot.assign(&dex);
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use ndarray::Array3;

    use super::*;
    use crate::address::AddrEntry;

    fn one_by_one_book() -> AddressBook {
        let mut e = AddrEntry::default();
        e.obc = [0, 0, 0];
        e.prc = [0, 0, 0];
        e.exc = [0, 0, 0];
        AddressBook::new(vec![e], 1, 1).unwrap()
    }

    #[test]
    fn build_exit_matches_scenario_s5() {
        // S5: aux=2, ob_patch*pr_patch=1, ex=0 pre-call.
        // Expect dex=1, ex=1, aux=1.
        let addr = one_by_one_book();
        let mut aux = Array3::from_elem((1, 1, 1), C32::new(2.0, 0.0));
        let ob = Array3::from_elem((1, 1, 1), C32::new(1.0, 0.0));
        let pr = Array3::from_elem((1, 1, 1), C32::new(1.0, 0.0));
        let mut ex = Array3::from_elem((1, 1, 1), C32::new(0.0, 0.0));

        AuxiliaryWaveKernel.build_exit(&mut aux, &addr, &ob, &pr, &mut ex);

        assert_abs_diff_eq!(aux[[0, 0, 0]].re, 1.0);
        assert_abs_diff_eq!(ex[[0, 0, 0]].re, 1.0);
    }

    #[test]
    fn build_exit_accumulates_into_overlapping_windows() {
        let e0 = AddrEntry::default();
        let e1 = AddrEntry::default(); // same exit window as e0: both [0,0,0]
        let addr = AddressBook::new(vec![e0, e1], 2, 1).unwrap();

        let mut aux = Array3::from_elem((2, 1, 1), C32::new(1.0, 0.0));
        let ob = Array3::from_elem((1, 1, 1), C32::new(0.0, 0.0));
        let pr = Array3::from_elem((1, 1, 1), C32::new(0.0, 0.0));
        let mut ex = Array3::from_elem((1, 1, 1), C32::new(0.0, 0.0));

        // Both addresses write dex=1 into the same ex window; additive.
        AuxiliaryWaveKernel.build_exit(&mut aux, &addr, &ob, &pr, &mut ex);
        assert_abs_diff_eq!(ex[[0, 0, 0]].re, 2.0);
    }

    #[test]
    fn build_aux_uses_whole_probe_layer_not_a_patch() {
        let addr = one_by_one_book();
        let mut aux = Array3::from_elem((1, 1, 1), C32::new(0.0, 0.0));
        let ob = Array3::from_elem((1, 1, 1), C32::new(2.0, 0.0));
        let pr = Array3::from_elem((1, 1, 1), C32::new(3.0, 0.0));
        let ex = Array3::from_elem((1, 1, 1), C32::new(0.0, 0.0));

        AuxiliaryWaveKernel.build_aux(&mut aux, &addr, &ob, &pr, &ex, 0.0);
        // (1+0)*2*3 - 0*ex = 6
        assert_abs_diff_eq!(aux[[0, 0, 0]].re, 6.0);
    }
}
