// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
The Probe/Object Update Kernel (POUK): accumulates weighted exit-wave
contributions back into the object and probe arrays.

Every method here scatters into overlapping windows of `ob` or `pr` (many
address entries can share the same patch), so — like
[`crate::awk::AuxiliaryWaveKernel::build_exit`] — these run as a
sequential scan over the address book rather than a parallel one.

Per `SPEC_FULL.md` §4.5, the kernel only *accumulates*: the final
per-pixel division `ob := ob / obn` is a caller concern and is
deliberately not performed here (a caller may want to fold several
batches' accumulations together before normalizing once).
*/

use ndarray::Array3;

use crate::address::AddressBook;
use crate::array_utils::{patch, patch_mut};
use crate::C32;

#[derive(Debug, Default, Clone, Copy)]
pub struct ProbeObjectUpdateKernel;

impl ProbeObjectUpdateKernel {
    /// `ob[obc_patch] += conj(pr[prc_patch]) * ex[exc_patch]`;
    /// `obn[obc_patch] += |pr[prc_patch]|^2`. Additive only — does not
    /// normalize `ob` by `obn`.
    pub fn ob_update(
        &self,
        ob: &mut Array3<C32>,
        obn: &mut Array3<f32>,
        addr: &AddressBook,
        pr: &Array3<C32>,
        ex: &Array3<C32>,
    ) {
        let h = ex.shape()[1];
        let w = ex.shape()[2];
        debug_assert_eq!(addr.entries().len(), ex.shape()[0]);

        for e in addr.entries() {
            let pr_patch = patch(pr, e.prc, h, w);
            let ex_patch = patch(ex, e.exc, h, w);
            let mut ob_patch = patch_mut(ob, e.obc, h, w);
            let mut den_patch = patch_mut(obn, e.obc, h, w);

            ndarray::Zip::from(&mut ob_patch)
                .and(&mut den_patch)
                .and(&pr_patch)
                .and(&ex_patch)
                .for_each(|o, d, &p, &x| {
                    *o += p.conj() * x;
                    *d += p.norm_sqr();
                });
        }
    }

    /// `pr[prc_patch] += conj(ob[obc_patch]) * ex[exc_patch]`;
    /// `prn[prc_patch] += |ob[obc_patch]|^2`. Symmetric with
    /// [`Self::ob_update`]; additive only.
    pub fn pr_update(
        &self,
        pr: &mut Array3<C32>,
        prn: &mut Array3<f32>,
        addr: &AddressBook,
        ob: &Array3<C32>,
        ex: &Array3<C32>,
    ) {
        let h = ex.shape()[1];
        let w = ex.shape()[2];
        debug_assert_eq!(addr.entries().len(), ex.shape()[0]);

        for e in addr.entries() {
            let ob_patch = patch(ob, e.obc, h, w);
            let ex_patch = patch(ex, e.exc, h, w);
            let mut pr_patch = patch_mut(pr, e.prc, h, w);
            let mut den_patch = patch_mut(prn, e.prc, h, w);

            ndarray::Zip::from(&mut pr_patch)
                .and(&mut den_patch)
                .and(&ob_patch)
                .and(&ex_patch)
                .for_each(|p, d, &o, &x| {
                    *p += o.conj() * x;
                    *d += o.norm_sqr();
                });
        }
    }

    /// Maximum-likelihood variant of [`Self::ob_update`]: the exit-wave
    /// contribution is additionally weighted by a per-pixel factor `fic`
    /// (e.g. the gradient produced by
    /// [`crate::gdk::GradientDescentKernel::main`]) rather than normalized
    /// by accumulated probe power alone.
    pub fn ob_update_ml(
        &self,
        ob: &mut Array3<C32>,
        addr: &AddressBook,
        pr: &Array3<C32>,
        ex: &Array3<C32>,
        fic: f32,
    ) {
        let h = ex.shape()[1];
        let w = ex.shape()[2];
        debug_assert_eq!(addr.entries().len(), ex.shape()[0]);

        for e in addr.entries() {
            let pr_patch = patch(pr, e.prc, h, w);
            let ex_patch = patch(ex, e.exc, h, w);
            let mut ob_patch = patch_mut(ob, e.obc, h, w);
            ndarray::Zip::from(&mut ob_patch)
                .and(&pr_patch)
                .and(&ex_patch)
                .for_each(|o, &p, &x| *o += p.conj() * x * fic);
        }
    }

    /// Maximum-likelihood variant of [`Self::pr_update`].
    pub fn pr_update_ml(
        &self,
        pr: &mut Array3<C32>,
        addr: &AddressBook,
        ob: &Array3<C32>,
        ex: &Array3<C32>,
        fic: f32,
    ) {
        let h = ex.shape()[1];
        let w = ex.shape()[2];
        debug_assert_eq!(addr.entries().len(), ex.shape()[0]);

        for e in addr.entries() {
            let ob_patch = patch(ob, e.obc, h, w);
            let ex_patch = patch(ex, e.exc, h, w);
            let mut pr_patch = patch_mut(pr, e.prc, h, w);
            ndarray::Zip::from(&mut pr_patch)
                .and(&ob_patch)
                .and(&ex_patch)
                .for_each(|p, &o, &x| *p += o.conj() * x * fic);
        }
    }
}
