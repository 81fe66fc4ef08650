use criterion::{black_box, criterion_group, criterion_main, Criterion};
use dstrack_data::{compute_digest, read_csv_from_reader};

fn synthetic_csv(rows: usize) -> String {
    let mut text = String::from("id,feature,label,flag\n");
    for i in 0..rows {
        text.push_str(&format!("{i},{},class_{},{}\n", i as f64 * 0.25, i % 7, i % 2 == 0));
    }
    text
}

fn digest_bench(c: &mut Criterion) {
    let text = synthetic_csv(20_000);
    c.bench_function("read_csv_20k", |b| {
        b.iter(|| {
            let frame = read_csv_from_reader(text.as_bytes()).unwrap();
            black_box(frame);
        });
    });
    let frame = read_csv_from_reader(text.as_bytes()).unwrap();
    c.bench_function("digest_20k", |b| {
        b.iter(|| black_box(compute_digest(&frame)));
    });
}

criterion_group!(benches, digest_bench);
criterion_main!(benches);
