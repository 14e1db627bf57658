// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ndarray::{Array1, Array3};

use ptycho_kernels::address::{AddrEntry, AddressBook};
use ptycho_kernels::awk::AuxiliaryWaveKernel;
use ptycho_kernels::fuk::FourierUpdateKernel;
use ptycho_kernels::pouk::ProbeObjectUpdateKernel;
use ptycho_kernels::C32;

fn address_book(num_frames: usize, num_modes: usize) -> AddressBook {
    let mut entries = Vec::with_capacity(num_frames * num_modes);
    for f in 0..num_frames {
        for m in 0..num_modes {
            let mut e = AddrEntry::default();
            e.obc = [0, 0, 0];
            e.prc = [m as i32, 0, 0];
            e.exc = [(f * num_modes + m) as i32, 0, 0];
            e.dic = [f as i32, 0, 0];
            entries.push(e);
        }
    }
    AddressBook::new(entries, num_frames, num_modes).unwrap()
}

fn fourier_update_bench(c: &mut Criterion) {
    let (f, m, h, w) = (64usize, 1usize, 128usize, 128usize);
    let aux = Array3::<C32>::from_elem((f * m, h, w), C32::new(1.0, 0.0));
    let mag = Array3::<f32>::from_elem((f, h, w), 1.0);
    let mask = Array3::<f32>::from_elem((f, h, w), 1.0);
    let mask_sum = Array1::<f32>::from_elem(f, (h * w) as f32);

    let mut group = c.benchmark_group("fuk_fourier_error");
    group.bench_function(BenchmarkId::new("frames", f), |bencher| {
        let mut fuk = FourierUpdateKernel::new((f * m, h, w), m);
        fuk.allocate();
        bencher.iter(|| {
            fuk.fourier_error(
                black_box(aux.view()),
                black_box(mag.view()),
                black_box(mask.view()),
                black_box(mask_sum.view()),
            );
        });
    });
    group.finish();
}

fn build_aux_bench(c: &mut Criterion) {
    let (f, m, h, w) = (64usize, 1usize, 128usize, 128usize);
    let addr = address_book(f, m);
    let ob = Array3::<C32>::from_elem((1, h, w), C32::new(1.0, 0.0));
    let pr = Array3::<C32>::from_elem((m, h, w), C32::new(1.0, 0.0));
    let ex = Array3::<C32>::from_elem((f * m, h, w), C32::new(0.0, 0.0));
    let mut aux = Array3::<C32>::from_elem((f * m, h, w), C32::new(0.0, 0.0));

    c.bench_function("awk_build_aux", |bencher| {
        bencher.iter(|| {
            AuxiliaryWaveKernel.build_aux(
                black_box(&mut aux),
                black_box(&addr),
                black_box(&ob),
                black_box(&pr),
                black_box(&ex),
                black_box(0.1),
            );
        });
    });
}

fn pouk_ob_update_bench(c: &mut Criterion) {
    let (f, m, h, w) = (64usize, 1usize, 128usize, 128usize);
    let addr = address_book(f, m);
    let pr = Array3::<C32>::from_elem((m, h, w), C32::new(1.0, 0.0));
    let ex = Array3::<C32>::from_elem((f * m, h, w), C32::new(1.0, 0.0));

    c.bench_function("pouk_ob_update", |bencher| {
        bencher.iter(|| {
            let mut ob = Array3::<C32>::from_elem((1, h, w), C32::new(0.0, 0.0));
            let mut obn = Array3::<f32>::from_elem((1, h, w), 0.0);
            ProbeObjectUpdateKernel::default().ob_update(
                black_box(&mut ob),
                black_box(&mut obn),
                black_box(&addr),
                black_box(&pr),
                black_box(&ex),
            );
        });
    });
}

criterion_group!(
    benches,
    fourier_update_bench,
    build_aux_bench,
    pouk_ob_update_bench
);
criterion_main!(benches);
