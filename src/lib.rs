// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Batched numerical kernels for ptychographic reconstruction.
//!
//! This crate provides the per-iteration building blocks of an iterative
//! ptychography solver — forming auxiliary exit waves, enforcing the
//! Fourier-magnitude constraint, scoring a maximum-likelihood intensity
//! model, scattering updates back into the probe and object, correcting
//! scan positions, and a small stochastic (ePIE/SDR) driver skeleton tying
//! them together — without opinions about data loading, I/O formats, or
//! GPU backends.

pub mod address;
pub mod array_utils;
pub mod awk;
pub mod config;
pub(crate) mod constants;
pub mod error;
pub mod fuk;
pub mod gdk;
pub mod logging;
pub mod pck;
pub mod pouk;
pub mod stochastic;

/// The scalar field type every kernel in this crate operates on.
pub type C32 = num_complex::Complex32;

pub use address::{AddrEntry, AddressBook};
pub use awk::AuxiliaryWaveKernel;
pub use config::{EngineKind, KernelConfig, StochasticConfig};
pub use error::KernelError;
pub use fuk::FourierUpdateKernel;
pub use gdk::GradientDescentKernel;
pub use pck::PositionCorrectionKernel;
pub use pouk::ProbeObjectUpdateKernel;
pub use stochastic::{StochasticDriver, View, ViewId};
