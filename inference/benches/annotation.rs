use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use hazard_watch::{annotate, draw_indicator, plan, BoundingBox, Category, Detection, Thresholds};
use image::{Rgb, RgbImage};
use rand::Rng;

const VEHICLE_CLASSES: [&str; 5] = ["car", "truck", "bus", "motorcycle", "bicycle"];

/// Random detections spread over a 1920x1080 frame
fn generate_detections(category: Category, count: usize) -> Vec<Detection> {
    let mut rng = rand::thread_rng();
    (0..count)
        .map(|_| {
            let x = rng.gen_range(0.0..1800.0);
            let y = rng.gen_range(0.0..1000.0);
            let w = rng.gen_range(20.0..120.0);
            let h = rng.gen_range(20.0..80.0);
            let (class_id, name) = match category {
                Category::Smoking => {
                    let id = rng.gen_range(0..3u32);
                    (id, ["cigarette", "face", "smoking"][id as usize])
                }
                Category::Vehicle => {
                    let id = rng.gen_range(0..VEHICLE_CLASSES.len());
                    (id as u32, VEHICLE_CLASSES[id])
                }
                Category::Crowd => (0, "person"),
                Category::Fire => (0, "fire"),
                Category::Weapon => (0, "gun"),
            };
            Detection::new(
                class_id,
                name,
                rng.gen_range(0.1..0.99),
                BoundingBox::new(x, y, x + w, y + h),
            )
        })
        .collect()
}

fn create_test_frame(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x ^ y) % 256) as u8])
    })
}

fn bench_plan(c: &mut Criterion) {
    let mut group = c.benchmark_group("plan");
    let thresholds = Thresholds::default();

    for &count in [10usize, 100, 500].iter() {
        for category in Category::ALL {
            let detections = generate_detections(category, count);
            group.throughput(Throughput::Elements(count as u64));
            group.bench_with_input(
                BenchmarkId::new(category.key(), count),
                &detections,
                |b, detections| b.iter(|| plan(category, detections, &thresholds)),
            );
        }
    }

    group.finish();
}

fn bench_annotate(c: &mut Criterion) {
    let mut group = c.benchmark_group("annotate");
    group.sample_size(30);
    let thresholds = Thresholds::default();
    let frame = create_test_frame(1920, 1080);

    for &count in [10usize, 100].iter() {
        for category in [Category::Crowd, Category::Fire, Category::Smoking] {
            let detections = generate_detections(category, count);
            group.bench_with_input(
                BenchmarkId::new(category.key(), count),
                &detections,
                |b, detections| {
                    b.iter_batched(
                        || frame.clone(),
                        |mut output| annotate(category, &mut output, detections, &thresholds),
                        criterion::BatchSize::LargeInput,
                    )
                },
            );
        }
    }

    group.finish();
}

fn bench_indicator(c: &mut Criterion) {
    let frame = create_test_frame(1280, 720);
    c.bench_function("draw_indicator_1280x720", |b| {
        b.iter_batched(
            || frame.clone(),
            |mut output| draw_indicator(&mut output, Category::Vehicle),
            criterion::BatchSize::LargeInput,
        )
    });
}

criterion_group!(benches, bench_plan, bench_annotate, bench_indicator);
criterion_main!(benches);
