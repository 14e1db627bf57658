// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Error type for all `ptycho-kernels` errors. This should be the *only*
//! error enum that is publicly visible.
//!
//! Per the design of these kernels, most precondition violations (shape
//! mismatches, out-of-bounds patches, `nmodes` not dividing the auxiliary
//! wave's leading dimension) are programmer errors and are enforced with
//! `assert!`/`debug_assert!` rather than surfaced here — see each kernel
//! module's doc comment. [`KernelError`] exists for the handful of paths
//! that are fallible because they validate data handed in by an external
//! caller, not a kernel-internal invariant.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum KernelError {
    /// The address book's entry count didn't match `num_frames * num_modes`.
    #[error("address book has {got} entries but expected frames*modes = {expected}")]
    AddressBookShape { got: usize, expected: usize },

    /// Failed to parse a [`crate::config::KernelConfig`] from TOML.
    #[error("failed to parse kernel configuration: {0}")]
    Config(#[from] toml::de::Error),
}
