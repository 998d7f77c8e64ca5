use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::fs::{self, File};
use std::io::Write;
use tempfile::tempdir;
use textsweep::{
    classify_bytes, collect_candidates, ChunkBoundary, ChunkedMutator, OccurrenceIndexer,
    Orchestrator, WalkOptions,
};

fn create_test_files(
    dir: &tempfile::TempDir,
    file_count: usize,
    lines_per_file: usize,
) -> std::io::Result<()> {
    for i in 0..file_count {
        let file_path = dir.path().join(format!("test_{}.txt", i));
        let mut file = File::create(file_path)?;
        for j in 0..lines_per_file {
            writeln!(
                file,
                "Line {} TODO: fix bug {} FIXME: optimize line {} NOTE: important task {}",
                j, j, j, j
            )?;
        }
    }
    Ok(())
}

fn bench_classify(c: &mut Criterion) {
    let text = "The quick brown fox jumps over the lazy dog.\n".repeat(100);
    let mut binary = vec![0u8; 4096];
    for (i, b) in binary.iter_mut().enumerate() {
        *b = (i * 31 % 251) as u8 | 1;
    }

    let mut group = c.benchmark_group("Classify");
    group.bench_function("text_sample", |b| {
        b.iter(|| black_box(classify_bytes(text.as_bytes())))
    });
    group.bench_function("high_entropy_sample", |b| {
        b.iter(|| black_box(classify_bytes(&binary)))
    });
    group.finish();
}

fn bench_index_str(c: &mut Criterion) {
    let text = "Line TODO: fix bug FIXME: optimize NOTE: TODO again\n".repeat(1000);
    let indexer = OccurrenceIndexer::new("TODO");

    c.bench_function("index_str_1000_lines", |b| {
        b.iter(|| black_box(indexer.index_str(&text)))
    });
}

fn bench_replace_buffer_sizes(c: &mut Criterion) {
    let dir = tempdir().unwrap();
    create_test_files(&dir, 1, 5000).unwrap();
    let path = dir.path().join("test_0.txt");
    let original = fs::read(&path).unwrap();

    let mut group = c.benchmark_group("Replace Buffer Size");
    for size in [64usize, 1024, 16 * 1024] {
        for boundary in [ChunkBoundary::Carry, ChunkBoundary::PerChunk] {
            let mutator = ChunkedMutator::new("TODO", "DONE")
                .unwrap()
                .with_buffer_size(Some(size))
                .with_boundary(boundary);
            group.bench_with_input(
                BenchmarkId::new(format!("{:?}", boundary), size),
                &size,
                |b, _| {
                    b.iter(|| {
                        fs::write(&path, &original).unwrap();
                        black_box(mutator.replace(&path).unwrap())
                    })
                },
            );
        }
    }
    group.finish();
}

fn bench_orchestrator_pool_sizes(c: &mut Criterion) {
    let dir = tempdir().unwrap();
    create_test_files(&dir, 64, 200).unwrap();
    let files = collect_candidates(dir.path(), &WalkOptions::default()).unwrap();
    let indexer = OccurrenceIndexer::new("FIXME");

    let mut group = c.benchmark_group("Search Pool Size");
    for pool_size in [1usize, 4, 16] {
        let orchestrator = Orchestrator::new().with_pool_size(Some(pool_size));
        group.bench_with_input(
            BenchmarkId::from_parameter(pool_size),
            &pool_size,
            |b, _| b.iter(|| black_box(orchestrator.search_all(&files, &indexer).unwrap())),
        );
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_classify,
    bench_index_str,
    bench_replace_buffer_sizes,
    bench_orchestrator_pool_sizes
);
criterion_main!(benches);
