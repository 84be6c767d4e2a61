use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tilebake::prelude::*;

const SURFACE_WIDTH: u32 = 800;
const SURFACE_HEIGHT: u32 = 600;

fn layout() -> AttributeLayout {
    AttributeLayout::new().with("color", AttributeKind::Vec3, Interpolation::Perspective)
}

fn mesh_of(name: &str, triangles: &[[Vec3; 3]]) -> Mesh {
    let mut mesh = Mesh::new(name, layout());
    let red = [1.0, 0.0, 0.0];
    let green = [0.0, 1.0, 0.0];
    let blue = [0.0, 0.0, 1.0];
    for &[a, b, c] in triangles {
        mesh.push_triangle([(a, &red), (b, &green), (c, &blue)])
            .expect("bench mesh matches layout");
    }
    mesh
}

fn small_triangle() -> [Vec3; 3] {
    [
        Vec3::new(100.0, 100.0, 0.0),
        Vec3::new(120.0, 100.0, 0.0),
        Vec3::new(110.0, 120.0, 0.0),
    ]
}

fn medium_triangle() -> [Vec3; 3] {
    [
        Vec3::new(100.0, 100.0, 0.0),
        Vec3::new(300.0, 100.0, 0.0),
        Vec3::new(200.0, 300.0, 0.0),
    ]
}

fn large_triangle() -> [Vec3; 3] {
    [
        Vec3::new(50.0, 50.0, 0.0),
        Vec3::new(750.0, 100.0, 0.0),
        Vec3::new(400.0, 550.0, 0.0),
    ]
}

fn baker(samples: u32, execution: Execution) -> Baker<GouraudShader> {
    let mut config = BakeConfig::new(SURFACE_WIDTH, SURFACE_HEIGHT, Vec3::ZERO);
    config
        .set_tile_size(64)
        .set_samples_per_texel(samples)
        .set_execution(execution);
    Baker::new(config, GouraudShader::new(), &layout()).expect("valid bench config")
}

fn benchmark_single_triangle(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_triangle");
    let mvp = Projection::raster_space(SURFACE_WIDTH, SURFACE_HEIGHT).matrix();

    for (name, triangle) in [
        ("small", small_triangle()),
        ("medium", medium_triangle()),
        ("large", large_triangle()),
    ] {
        let mesh = mesh_of(name, &[triangle]);
        for samples in [1, 4] {
            let baker = baker(samples, Execution::Sequential);
            group.bench_with_input(BenchmarkId::new(format!("msaa{samples}"), name), &mesh, |b, mesh| {
                b.iter(|| {
                    baker.cache().invalidate_all();
                    black_box(baker.bake(black_box(mesh), mvp).expect("bake"))
                });
            });
        }
    }

    group.finish();
}

fn benchmark_many_triangles(c: &mut Criterion) {
    let mut group = c.benchmark_group("many_triangles");
    let mvp = Projection::raster_space(SURFACE_WIDTH, SURFACE_HEIGHT).matrix();

    // Generate a grid of small triangles
    let triangles: Vec<[Vec3; 3]> = (0..20)
        .flat_map(|row| {
            (0..20).map(move |col| {
                let x = col as f32 * 40.0;
                let y = row as f32 * 30.0;
                [
                    Vec3::new(x, y, 0.0),
                    Vec3::new(x + 35.0, y, 0.0),
                    Vec3::new(x + 17.5, y + 25.0, 0.0),
                ]
            })
        })
        .collect();
    let mesh = mesh_of("grid", &triangles);

    for (name, execution) in [
        ("sequential", Execution::Sequential),
        ("parallel", Execution::Parallel { threads: None }),
    ] {
        let baker = baker(1, execution);
        group.bench_function(format!("{name}_cold_400_triangles"), |b| {
            b.iter(|| {
                baker.cache().invalidate_all();
                black_box(baker.bake(black_box(&mesh), mvp).expect("bake"))
            });
        });
    }

    let baker = baker(1, Execution::Sequential);
    baker.bake(&mesh, mvp).expect("warm-up bake");
    group.bench_function("warm_cache_400_triangles", |b| {
        b.iter(|| black_box(baker.bake(black_box(&mesh), mvp).expect("bake")));
    });

    group.finish();
}

criterion_group!(benches, benchmark_single_triangle, benchmark_many_triangles);
criterion_main!(benches);
