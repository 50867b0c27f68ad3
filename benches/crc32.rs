use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ears_nvs::{
    credential, integrity, validate, KeyValueStore, MemoryPartition, MemoryReporter, Provisioner,
};

fn bench_crc32(c: &mut Criterion) {
    let page = vec![0xA5u8; 4096];
    c.bench_function("crc32_4k_page", |b| {
        b.iter(|| integrity::compute(black_box(&page)));
    });
    c.bench_function("record_checksum", |b| {
        b.iter(|| {
            integrity::record_checksum(black_box(2), black_box("AB1234"), black_box("cbf43926"))
        });
    });
    c.bench_function("credential_hash", |b| {
        b.iter(|| credential::hash(black_box(b"MySecurePassword123")));
    });
}

fn bench_validation_pass(c: &mut Criterion) {
    c.bench_function("validation_pass", |b| {
        b.iter(|| {
            let mut store = KeyValueStore::new(MemoryPartition::new(), MemoryReporter::new());
            let _ = Provisioner::new(&mut store).provision("AB1234", "pw");
            validate(&mut store)
        });
    });
}

criterion_group!(benches, bench_crc32, bench_validation_pass);
criterion_main!(benches);
