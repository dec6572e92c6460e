// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Galene-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Galene and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

use galene::diff::{ChangeTracker, DiffOptions};

mod fixtures;
mod profiler;

// Benchmark identity (keep stable):
// - Group names in this file: `diff.clean`, `diff.edited`
// - Case IDs: `small`, `medium`, `large`.

fn benches_diff(c: &mut Criterion) {
    let mut group = c.benchmark_group("diff.clean");
    for case in [fixtures::Case::Small, fixtures::Case::Medium, fixtures::Case::Large] {
        let mut tracker = ChangeTracker::new(DiffOptions::default());
        tracker.set_baseline(&fixtures::case_document(case));
        group.throughput(Throughput::Elements(case.node_count() as u64));
        group.bench_function(case.id(), |b| {
            b.iter(|| {
                let diff = tracker.diff();
                black_box(diff.is_empty())
            })
        });
    }
    group.finish();

    let mut group = c.benchmark_group("diff.edited");
    for case in [fixtures::Case::Small, fixtures::Case::Medium, fixtures::Case::Large] {
        let mut tracker = ChangeTracker::new(DiffOptions::default());
        tracker.set_baseline(&fixtures::case_document(case));
        tracker.update(&fixtures::edited_document(case));
        group.throughput(Throughput::Elements(case.node_count() as u64));
        group.bench_function(case.id(), |b| {
            b.iter(|| {
                let diff = tracker.diff();
                black_box(diff.added.len() + diff.modified.len() + diff.deleted.len())
            })
        });
    }
    group.finish();
}

criterion_group! {
    name = benches;
    config = profiler::criterion();
    targets = benches_diff
}
criterion_main!(benches);
