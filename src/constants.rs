// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Useful constants.
 */

/// The small additive constant used throughout the Fourier-constraint
/// kernels to avoid division by zero. See [`crate::fuk::FourierUpdateKernel`]
/// and [`crate::pck::PositionCorrectionKernel`].
pub const DEFAULT_DENOM: f32 = 1e-7;
