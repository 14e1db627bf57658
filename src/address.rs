// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
The address book: the indirection scheme that maps a flat batch of
diffraction frames to overlapping patches in the shared object and probe
fields.

A `[F, M, 5, 3]` integer tensor in the reference implementation; here it
is re-expressed as an owned `Vec` of [`AddrEntry`] grouped `M`-at-a-time
per frame, which is the natural shape for iterator-based Rust kernels.
*/

use crate::error::KernelError;

/// A `(layer, row_offset, col_offset)` triple indexing into a 3-D field.
pub type Addr3 = [i32; 3];

/// One row of the address book: the five addresses needed to process a
/// single (frame, mode) pair.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AddrEntry {
    /// Probe address: `(probe_layer, row_off, col_off)`.
    pub prc: Addr3,
    /// Object address: `(object_layer, row_off, col_off)`.
    pub obc: Addr3,
    /// Exit/auxiliary-wave address: `(exit_layer, row_off, col_off)`.
    pub exc: Addr3,
    /// Mask index: `(mask_idx, 0, 0)`.
    pub mac: Addr3,
    /// Diffraction index: `(diffraction_idx, 0, 0)`.
    pub dic: Addr3,
}

/// The immutable-per-batch (except for position correction) address book.
///
/// Entries are stored frame-major: the `M` entries for frame `f` occupy
/// `entries[f*M .. (f+1)*M]`, matching the contiguity requirement on `aux`
/// (spec: "the M sub-frames of frame f occupy contiguous indices").
#[derive(Clone, Debug)]
pub struct AddressBook {
    entries: Vec<AddrEntry>,
    num_frames: usize,
    num_modes: usize,
}

impl AddressBook {
    /// Build an address book from a flat, frame-major list of entries.
    ///
    /// Fails if `entries.len() != num_frames * num_modes`; this is the one
    /// constructable-but-fallible precondition in this crate (see
    /// `SPEC_FULL.md` §7) — everything else is a kernel-internal invariant
    /// enforced with `debug_assert!`.
    pub fn new(
        entries: Vec<AddrEntry>,
        num_frames: usize,
        num_modes: usize,
    ) -> Result<Self, KernelError> {
        let expected = num_frames * num_modes;
        if entries.len() != expected {
            return Err(KernelError::AddressBookShape {
                got: entries.len(),
                expected,
            });
        }
        Ok(Self {
            entries,
            num_frames,
            num_modes,
        })
    }

    pub fn num_frames(&self) -> usize {
        self.num_frames
    }

    pub fn num_modes(&self) -> usize {
        self.num_modes
    }

    pub fn entries(&self) -> &[AddrEntry] {
        &self.entries
    }

    pub fn entries_mut(&mut self) -> &mut [AddrEntry] {
        &mut self.entries
    }

    /// The `M` address entries belonging to frame `f`.
    pub fn frame(&self, f: usize) -> &[AddrEntry] {
        let m = self.num_modes;
        &self.entries[f * m..(f + 1) * m]
    }

    pub fn frame_mut(&mut self, f: usize) -> &mut [AddrEntry] {
        let m = self.num_modes;
        &mut self.entries[f * m..(f + 1) * m]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_rejects_mismatched_length() {
        let entries = vec![AddrEntry::default(); 3];
        let err = AddressBook::new(entries, 2, 2).unwrap_err();
        assert!(matches!(
            err,
            KernelError::AddressBookShape {
                got: 3,
                expected: 4
            }
        ));
    }

    #[test]
    fn frame_slices_are_contiguous_and_frame_major() {
        let mut entries = Vec::new();
        for f in 0..3 {
            for m in 0..2 {
                let mut e = AddrEntry::default();
                e.dic = [f * 10 + m, 0, 0];
                entries.push(e);
            }
        }
        let book = AddressBook::new(entries, 3, 2).unwrap();
        assert_eq!(book.frame(1)[0].dic, [10, 0, 0]);
        assert_eq!(book.frame(1)[1].dic, [11, 0, 0]);
        assert_eq!(book.frame(2)[0].dic, [20, 0, 0]);
    }
}
