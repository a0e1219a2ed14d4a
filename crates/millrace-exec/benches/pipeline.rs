use criterion::{criterion_group, criterion_main, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use millrace_agg::{AggKind, AggregatorMode};
use millrace_core::block::Block;
use millrace_core::page::Page;
use millrace_operators::{
    AggregateSpec, AggregationConfig, AggregationOperator, Operator, TopNConfig, TopNOperator,
};

fn make_pages(pages: usize, rows: usize) -> Vec<Page> {
    let mut rng = StdRng::seed_from_u64(42);
    (0..pages)
        .map(|_| {
            let values: Vec<i64> = (0..rows).map(|_| rng.gen_range(-10_000..10_000)).collect();
            Page::new(rows, vec![Block::Long(values)]).unwrap()
        })
        .collect()
}

fn bench_top_n(c: &mut Criterion) {
    let pages = make_pages(64, 1024);
    c.bench_function("top_n_64x1024", |b| {
        b.iter(|| {
            let mut top = TopNOperator::new(TopNConfig {
                sort_channel: 0,
                ascending: false,
                top_count: 100,
            });
            for page in &pages {
                top.add_input(page.clone()).unwrap();
            }
            top.finish().unwrap();
            while top.get_output().unwrap().is_some() {}
        })
    });
}

fn bench_scalar_max(c: &mut Criterion) {
    let pages = make_pages(64, 1024);
    c.bench_function("scalar_max_64x1024", |b| {
        b.iter(|| {
            let mut agg = AggregationOperator::new(AggregationConfig {
                aggregates: vec![AggregateSpec {
                    kind: AggKind::Max,
                    mode: AggregatorMode::Single,
                    channel: 0,
                }],
            });
            for page in &pages {
                agg.add_input(page.clone()).unwrap();
            }
            agg.finish().unwrap();
            while agg.get_output().unwrap().is_some() {}
        })
    });
}

criterion_group!(benches, bench_top_n, bench_scalar_max);
criterion_main!(benches);
