use std::sync::Arc;

use criterion::{Criterion, criterion_group, criterion_main};
use dropbin_core::identifier::{DEFAULT_IDENTIFIER_LENGTH, IdentifierAllocator, SeededRandom};
use dropbin_core::storage::sanitize_filename;

fn bench_identifier_generation(c: &mut Criterion) {
    let os = IdentifierAllocator::os(DEFAULT_IDENTIFIER_LENGTH).unwrap();
    c.bench_function("identifier_generate_os", |b| {
        b.iter(|| os.generate().unwrap());
    });

    let seeded =
        IdentifierAllocator::new(Arc::new(SeededRandom::new(42)), DEFAULT_IDENTIFIER_LENGTH)
            .unwrap();
    c.bench_function("identifier_generate_seeded", |b| {
        b.iter(|| seeded.generate().unwrap());
    });
}

fn bench_filename_sanitizing(c: &mut Criterion) {
    c.bench_function("sanitize_traversal_path", |b| {
        b.iter(|| sanitize_filename("/..%2F..%2Fetc/some%20dir/report%20final.pdf"));
    });
}

criterion_group!(benches, bench_identifier_generation, bench_filename_sanitizing);
criterion_main!(benches);
