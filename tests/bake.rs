use approx::assert_abs_diff_eq;
use tilebake::prelude::*;
use tilebake::primitives::Triangle3;
use tilebake::render::VertexPipeline;

fn flat_layout() -> AttributeLayout {
    AttributeLayout::new().with("value", AttributeKind::Scalar, Interpolation::Flat)
}

fn sequential(width: u32, height: u32, tile_size: u32) -> BakeConfig<f32> {
    let mut config = BakeConfig::new(width, height, 0.0f32);
    config.set_tile_size(tile_size).set_execution(Execution::Sequential);
    config
}

const VALUE: &[f32] = &[1.0];

fn mesh_from(points: &[[(f32, f32); 3]]) -> Mesh {
    let mut mesh = Mesh::new("triangles", flat_layout());
    for tri in points {
        let corner = |(x, y): (f32, f32)| (Vec3::new(x, y, 0.0), VALUE);
        mesh.push_triangle([corner(tri[0]), corner(tri[1]), corner(tri[2])])
            .unwrap();
    }
    mesh
}

#[test]
fn single_tile_end_to_end() {
    let mesh = mesh_from(&[[(0.0, 0.0), (4.0, 0.0), (0.0, 4.0)]]);
    let baker = Baker::new(sequential(8, 8, 8), AttributeShader::<f32>::new("value"), &flat_layout()).unwrap();
    let mvp = Projection::raster_space(8, 8).matrix();

    let tile = baker.rasterize_tile(TileCoord::new(0, 0), &mesh, mvp).unwrap();
    assert_eq!(tile.get(1, 1), Some(1.0));
    assert_eq!(tile.texel(6, 6), Some(0.0));
    assert!(!tile.is_covered(6, 6));

    // Centers on the hypotenuse x + y = 4 lie on a bottom-right edge.
    for (x, y) in [(0, 3), (1, 2), (2, 1), (3, 0)] {
        assert!(!tile.is_covered(x, y), "({x}, {y}) should be uncovered");
        assert_eq!(tile.texel(x, y), Some(0.0));
    }
    // Centers on the top and left edges are strictly inside here; (0, 0) is.
    for (x, y) in [(0, 0), (2, 0), (0, 2), (1, 1)] {
        assert!(tile.is_covered(x, y), "({x}, {y}) should be covered");
    }
    assert_eq!(tile.covered_count(), 6);
}

#[test]
fn shared_diagonal_is_covered_exactly_once() {
    let upper = [(0.5, 0.5), (12.5, 0.5), (12.5, 12.5)];
    let lower = [(0.5, 0.5), (12.5, 12.5), (0.5, 12.5)];
    let mvp = Projection::raster_space(16, 16).matrix();
    let bake = |tris: &[[(f32, f32); 3]]| {
        let baker = Baker::new(sequential(16, 16, 8), ConstantShader::new(1.0f32), &flat_layout()).unwrap();
        baker.bake(&mesh_from(tris), mvp).unwrap()
    };

    let a = bake(&[upper]);
    let b = bake(&[lower]);
    for y in 0..16 {
        for x in 0..16 {
            let inside_quad = x < 12 && y < 12;
            let hits = a.is_covered(x, y) as u32 + b.is_covered(x, y) as u32;
            assert_eq!(hits, inside_quad as u32, "texel ({x}, {y})");
        }
    }
    assert_eq!(a.covered_count() + b.covered_count(), 144);
}

#[test]
fn irregular_fan_has_no_overlap_or_gap() {
    let quad = [(1.3, 0.7), (13.9, 2.2), (11.1, 14.6), (0.4, 9.8)];
    let first = [quad[0], quad[1], quad[2]];
    let second = [quad[0], quad[2], quad[3]];
    let mvp = Projection::raster_space(16, 16).matrix();
    let baker = Baker::new(sequential(16, 16, 4), ConstantShader::new(1.0f32), &flat_layout()).unwrap();

    let a = baker.bake(&mesh_from(&[first]), mvp).unwrap();
    let mut second_mesh = mesh_from(&[second]);
    second_mesh.set_version(ContentVersion(1));
    let b = baker.bake(&second_mesh, mvp).unwrap();
    let mut both_mesh = mesh_from(&[first, second]);
    both_mesh.set_version(ContentVersion(2));
    let both = baker.bake(&both_mesh, mvp).unwrap();

    for y in 0..16 {
        for x in 0..16 {
            assert!(!(a.is_covered(x, y) && b.is_covered(x, y)), "texel ({x}, {y}) covered twice");
            assert_eq!(both.is_covered(x, y), a.is_covered(x, y) || b.is_covered(x, y));
        }
    }
    assert_eq!(both.covered_count(), a.covered_count() + b.covered_count());
}

fn receding_triangle(interpolation: Interpolation) -> (Mesh, AttributeLayout, Triangle3, [Vec2; 3]) {
    let layout = AttributeLayout::new().with("uv", AttributeKind::Vec2, interpolation);
    let points = [
        Vec3::new(-1.0, -1.0, -2.0),
        Vec3::new(1.0, -1.0, -2.0),
        Vec3::new(0.0, 1.5, 3.0),
    ];
    let uvs = [Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0), Vec2::new(0.5, 1.0)];
    let mut mesh = Mesh::new("receding", layout.clone());
    mesh.push_triangle([
        (points[0], &[uvs[0].x, uvs[0].y][..]),
        (points[1], &[uvs[1].x, uvs[1].y][..]),
        (points[2], &[uvs[2].x, uvs[2].y][..]),
    ])
    .unwrap();
    (mesh, layout, Triangle3::new(points[0], points[1], points[2]), uvs)
}

fn uv_bake(interpolation: Interpolation, mvp: Mat4) -> Surface<Vec2> {
    let (mesh, layout, _, _) = receding_triangle(interpolation);
    let mut config = BakeConfig::new(64, 64, Vec2::ZERO);
    config.set_tile_size(16).set_execution(Execution::Sequential);
    let baker = Baker::new(config, AttributeShader::<Vec2>::new("uv"), &layout).unwrap();
    baker.bake(&mesh, mvp).unwrap()
}

#[test]
fn perspective_uv_matches_ray_cast() {
    let mut model = Transform::new();
    model.set_position_xyz(0.0, 0.0, 5.0).rotate_y(0.2);
    let mvp = Projection::perspective_degrees(60.0, 1.0, 0.5, 50.0).matrix() * model.to_matrix();
    let surface = uv_bake(Interpolation::Perspective, mvp);
    let (_, layout, geometry, uvs) = receding_triangle(Interpolation::Perspective);
    let pipeline = VertexPipeline::new(mvp, 64, 64, &layout);

    let expected_at = |x: u32, y: u32| {
        let ray = pipeline.unproject_ray(x as f32 + 0.5, y as f32 + 0.5)?;
        let hit = ray.intersect_triangle(&geometry)?;
        let [a, b, c] = hit.barycentric;
        Some(uvs[0] * a + uvs[1] * b + uvs[2] * c)
    };

    let mut checked = 0;
    for y in 0..64 {
        for x in 0..64 {
            let (Some(actual), Some(expected)) = (surface.is_covered(x, y).then(|| surface.get(x, y)).flatten(), expected_at(x, y)) else {
                continue;
            };
            assert_abs_diff_eq!(actual.x, expected.x, epsilon = 1e-3);
            assert_abs_diff_eq!(actual.y, expected.y, epsilon = 1e-3);
            checked += 1;
        }
    }
    assert!(checked > 100, "only {checked} texels compared");

    // Texel containing the projected centroid.
    let centroid = mvp * geometry.centroid();
    let cx = ((centroid.x + 1.0) * 32.0) as u32;
    let cy = ((1.0 - centroid.y) * 32.0) as u32;
    let actual = surface.get(cx, cy).unwrap();
    let expected = expected_at(cx, cy).unwrap();
    assert_abs_diff_eq!(actual.x, expected.x, epsilon = 1e-4);
    assert_abs_diff_eq!(actual.y, expected.y, epsilon = 1e-4);

    let linear = uv_bake(Interpolation::Linear, mvp).get(cx, cy).unwrap();
    assert!((linear.y - actual.y).abs() > 1e-2, "linear {linear:?} vs perspective {actual:?}");
}

#[test]
fn parallel_bake_matches_sequential() {
    let tris: Vec<[(f32, f32); 3]> = (0..12)
        .map(|i| {
            let o = i as f32 * 4.7;
            [(o, 1.0), (o + 9.3, 7.5 + o * 0.5), (o * 0.8, 30.0)]
        })
        .collect();
    let mesh = mesh_from(&tris);
    let mvp = Projection::raster_space(64, 48).matrix();

    let mut config = sequential(64, 48, 16);
    config.set_samples_per_texel(4);
    let reference = Baker::new(config.clone(), ConstantShader::new(1.0f32), &flat_layout())
        .unwrap()
        .bake(&mesh, mvp)
        .unwrap();

    config.set_execution(Execution::Parallel { threads: Some(3) });
    let (parallel, stats) = Baker::new(config, ConstantShader::new(1.0f32), &flat_layout())
        .unwrap()
        .bake_with_stats(&mesh, mvp)
        .unwrap();
    assert_eq!(parallel, reference);
    assert_eq!(stats.triangles_submitted, 12);
    assert_eq!(stats.tiles_computed, stats.tiles_touched);
}

#[test]
fn stats_count_skipped_geometry() {
    let mesh = mesh_from(&[
        [(1.0, 1.0), (6.0, 1.0), (1.0, 6.0)],
        // collinear
        [(0.0, 0.0), (2.0, 2.0), (4.0, 4.0)],
        // right of the surface
        [(20.0, 0.0), (30.0, 0.0), (20.0, 5.0)],
        // straddles the right border
        [(6.0, 0.0), (12.0, 0.0), (6.0, 6.0)],
    ]);
    let baker = Baker::new(sequential(8, 8, 4), ConstantShader::new(1.0f32), &flat_layout()).unwrap();
    let (surface, stats) = baker.bake_with_stats(&mesh, Projection::raster_space(8, 8).matrix()).unwrap();
    assert_eq!(stats.triangles_submitted, 4);
    assert_eq!(stats.degenerate, 1);
    assert_eq!(stats.clipped_away, 1);
    assert!(stats.triangles_rasterized >= 2);
    assert!(surface.is_covered(7, 0));
    assert!(!surface.is_covered(7, 7));
}

#[test]
fn msaa_averages_against_background() {
    // Vertical edge through the middle of texel column 2.
    let mesh = mesh_from(&[[(0.0, 0.0), (2.5, 0.0), (2.5, 8.0)], [(0.0, 0.0), (2.5, 8.0), (0.0, 8.0)]]);
    let mut config = sequential(8, 8, 8);
    config.set_samples_per_texel(4);
    let baker = Baker::new(config, ConstantShader::new(1.0f32), &flat_layout()).unwrap();
    let surface = baker.bake(&mesh, Projection::raster_space(8, 8).matrix()).unwrap();
    assert_eq!(surface.get(1, 4), Some(1.0));
    assert_abs_diff_eq!(surface.get(2, 4).unwrap(), 0.5, epsilon = 1e-6);
    assert!(surface.is_covered(2, 4));
    assert!(!surface.is_covered(3, 4));
}
