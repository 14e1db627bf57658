// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Kernel configuration.

This crate has no file-format or I/O layer (per `SPEC_FULL.md` §1's
non-goals), but callers embedding it still need a place to park the small
set of scalar knobs the kernels take: mode count, the Fourier-constraint
denominator, the default power bound, whether to use floating intensities,
and the stochastic-driver engine parameters. [`KernelConfig`] is a plain
`serde`-deserializable struct, loadable from TOML, in the same spirit as
the teacher crate's params structs.
*/

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_DENOM;
use crate::error::KernelError;

/// Top-level configuration for a batch of kernels operating on a shared
/// `(ob, pr, aux)` triple.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct KernelConfig {
    /// Number of incoherent modes per frame (`M`).
    pub nmodes: usize,

    /// The additive constant used in Fourier-magnitude projection.
    #[serde(default = "default_denom")]
    pub denom: f32,

    /// The default power bound passed to `fmag_all_update`/position
    /// correction. `0.0` recovers the hard-projection formula.
    #[serde(default)]
    pub pbound: f32,

    /// Whether the gradient-descent kernel should solve for a per-frame
    /// floating intensity scale factor before computing model residuals.
    #[serde(default)]
    pub floating_intensities: bool,

    /// Parameters for the stochastic (ePIE/SDR) driver.
    #[serde(default)]
    pub stochastic: StochasticConfig,
}

fn default_denom() -> f32 {
    DEFAULT_DENOM
}

impl KernelConfig {
    /// Parse a [`KernelConfig`] from a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self, KernelError> {
        toml::from_str(s).map_err(KernelError::from)
    }
}

/// The engine family a [`crate::stochastic::StochasticDriver`] implements.
///
/// `A = 0, B = beta` is ePIE; `A = beta, B = 0` is SDR (spec.md §4.7).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize, strum_macros::Display)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    #[strum(serialize = "epie")]
    Epie,
    #[strum(serialize = "sdr")]
    Sdr,
}

impl Default for EngineKind {
    fn default() -> Self {
        EngineKind::Epie
    }
}

/// Scalar parameters for the stochastic driver (spec.md §6).
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct StochasticConfig {
    pub engine: EngineKind,

    /// The step-size parameter (`alpha` for ePIE's object update, `beta`
    /// for its probe update; `beta_O`/`beta_P` for SDR).
    pub beta: f32,

    /// Amplitude clamp applied to the object after each update, outside
    /// the core kernels.
    #[serde(default)]
    pub clip_object: Option<(f32, f32)>,

    /// Seed for the per-iteration deterministic view-order shuffle.
    #[serde(default)]
    pub seed: u64,
}

impl Default for StochasticConfig {
    fn default() -> Self {
        Self {
            engine: EngineKind::default(),
            beta: 1.0,
            clip_object: None,
            seed: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_config() {
        let cfg = KernelConfig::from_toml_str("nmodes = 2\n").unwrap();
        assert_eq!(cfg.nmodes, 2);
        assert_eq!(cfg.denom, DEFAULT_DENOM);
        assert_eq!(cfg.pbound, 0.0);
        assert!(!cfg.floating_intensities);
        assert_eq!(cfg.stochastic.engine, EngineKind::Epie);
    }

    #[test]
    fn parses_full_config() {
        let toml = r#"
            nmodes = 4
            denom = 1e-6
            pbound = 0.1
            floating_intensities = true

            [stochastic]
            engine = "sdr"
            beta = 0.9
            clip_object = [0.0, 1.0]
            seed = 42
        "#;
        let cfg = KernelConfig::from_toml_str(toml).unwrap();
        assert_eq!(cfg.nmodes, 4);
        assert_eq!(cfg.stochastic.engine, EngineKind::Sdr);
        assert_eq!(cfg.stochastic.clip_object, Some((0.0, 1.0)));
    }

    #[test]
    fn rejects_missing_required_field() {
        assert!(KernelConfig::from_toml_str("denom = 1e-6\n").is_err());
    }
}
