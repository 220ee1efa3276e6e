use criterion::{criterion_group, criterion_main, Criterion};
use serde_json::json;
use simbatch_exp::ParameterSpace;

fn make_space() -> ParameterSpace {
    let mut space = ParameterSpace::new();
    space
        .add_axis("per_node", [json!(1e6), json!(1e7), json!(1e8)])
        .expect("per_node");
    space.add_axis("parity", 0..10).expect("parity");
    space.add_axis("chunk_size", [1024, 4096, 9000]).expect("chunk_size");
    space.add_fixed("bisec", false).expect("bisec");
    space
}

fn bench_enumerate(c: &mut Criterion) {
    let space = make_space();
    c.bench_function("enumerate_throughput", |b| {
        b.iter(|| space.enumerate().count());
    });
}

criterion_group!(benches, bench_enumerate);
criterion_main!(benches);
