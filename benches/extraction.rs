use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use vadscope::snapshot::{PagedAddressSpace, PAGE_SIZE};
use vadscope::{Address, RegionReader};

/// Address space with every other page resident
fn half_resident(pages: u64) -> PagedAddressSpace {
    let mapping: HashMap<u64, u64> = (0..pages)
        .step_by(2)
        .map(|page| (page * PAGE_SIZE, (page % 16) * PAGE_SIZE))
        .collect();
    PagedAddressSpace::new(mapping, Arc::from(vec![0x90u8; 16 * PAGE_SIZE as usize]), PAGE_SIZE)
}

fn benchmark_region_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("region_read");
    for pages in [16u64, 256, 4096] {
        let space = half_resident(pages);
        let len = pages * PAGE_SIZE;
        group.throughput(Throughput::Bytes(len));
        group.bench_with_input(BenchmarkId::from_parameter(pages), &len, |b, &len| {
            b.iter(|| {
                let mut reader = RegionReader::new(&space, Address::new(0), len);
                io::copy(&mut reader, &mut io::sink()).map(black_box)
            });
        });
    }
    group.finish();
}

criterion_group!(benches, benchmark_region_read);
criterion_main!(benches);
