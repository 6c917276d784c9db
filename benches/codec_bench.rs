//! Criterion benchmark untuk header codec
//!
//! Run dengan: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use ensemble::network::FrameWriter;
use ensemble::protocol::{
    decode_upcall, encode_downcall, encode_upcall, Decoder, Downcall, Encoder, Upcall, View,
    ViewId,
};
use ensemble::JoinOps;

fn sample_view(nmembers: i32) -> View {
    let endpts: Vec<String> = (0..nmembers).map(|i| format!("{{Endpt:host{}:5002}}", i)).collect();
    View {
        nmembers,
        version: "2.01".into(),
        group: "bench".into(),
        proto: "Top:Heal:Switch:Leave:Inter:Intra:Elect:Merge:Slander:Sync:Suspect".into(),
        ltime: 17,
        primary: true,
        parameters: "suspect_max_idle=3:int".into(),
        address: endpts.clone(),
        endpt: endpts[0].clone(),
        addr: endpts[0].clone(),
        rank: 0,
        name: format!("{}:bench", endpts[0]),
        view_id: ViewId::new(17, endpts[0].clone()),
        view: endpts,
    }
}

fn bench_downcalls(c: &mut Criterion) {
    let mut group = c.benchmark_group("downcall");
    group.throughput(Throughput::Elements(1));

    group.bench_function("stage_join", |b| {
        let mut encoder = Encoder::default();
        let call = Downcall::Join(JoinOps::new("bench").with_principal("alice"));
        b.iter(|| {
            encoder.reset();
            encode_downcall(&mut encoder, black_box(1), black_box(&call));
        });
    });

    group.bench_function("stage_send", |b| {
        let mut encoder = Encoder::default();
        let call = Downcall::Send(vec![0, 1, 2, 3, 4, 5, 6, 7, 8, 9]);
        b.iter(|| {
            encoder.reset();
            encode_downcall(&mut encoder, black_box(1), black_box(&call));
        });
    });

    // Full frame into a sink: prefix + header + 1KB payload
    let payload = vec![0xabu8; 1024];
    group.throughput(Throughput::Bytes(payload.len() as u64));
    group.bench_function("cast_frame_1kb", |b| {
        let mut writer = FrameWriter::new(std::io::sink());
        b.iter(|| {
            encode_downcall(writer.begin(), black_box(1), &Downcall::Cast);
            writer.end(black_box(&payload)).unwrap();
        });
    });

    group.finish();
}

fn bench_upcalls(c: &mut Criterion) {
    let mut group = c.benchmark_group("upcall");

    for nmembers in [1, 8, 64] {
        let mut encoder = Encoder::default();
        encode_upcall(&mut encoder, 1, &Upcall::View(sample_view(nmembers)));
        let header = encoder.as_bytes().to_vec();

        group.throughput(Throughput::Bytes(header.len() as u64));
        group.bench_function(format!("decode_view_{}", nmembers), |b| {
            b.iter(|| {
                let mut decoder = Decoder::new(black_box(&header));
                decode_upcall(&mut decoder).unwrap()
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_downcalls, bench_upcalls);
criterion_main!(benches);
