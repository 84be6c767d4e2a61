use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use log::info;

use tilebake::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Material {
    /// Object-space normals
    Normal,
    /// Texture coordinates
    Uv,
    /// Object-space position inside the mesh bounds
    Position,
    /// White where the mesh covers the texel
    Coverage,
    /// Color from --texture
    Texture,
}

#[derive(Parser)]
#[command(name = "tilebake")]
#[command(about = "Bake per-texel surface data from an OBJ mesh in texture space")]
struct Cli {
    /// OBJ file to bake; every object in it is baked into the same image
    mesh: PathBuf,

    #[arg(short, long, default_value = "bake.png")]
    output: PathBuf,

    /// Output width and height in texels
    #[arg(long, default_value_t = 1024)]
    size: u32,

    #[arg(long, default_value_t = 64)]
    tile_size: u32,

    /// Samples per texel: 1, 2, 4, 8 or 16
    #[arg(long, default_value_t = 4)]
    samples: u32,

    #[arg(short, long, value_enum, default_value_t = Material::Normal)]
    material: Material,

    /// Image sampled by the texture material
    #[arg(long)]
    texture: Option<PathBuf>,

    /// Tile cache budget in MiB
    #[arg(long, default_value_t = 64)]
    cache_mb: usize,

    /// Worker threads; defaults to one per core
    #[arg(long)]
    threads: Option<usize>,
}

fn material_shader(cli: &Cli, mesh: &Mesh) -> Result<MaterialShader> {
    Ok(match cli.material {
        Material::Normal => MaterialShader::normal(),
        Material::Uv => MaterialShader::uv(),
        Material::Coverage => MaterialShader::Coverage,
        Material::Position => {
            let (min, max) = mesh.vertices().iter().fold(
                (Vec3::ONE * f32::MAX, Vec3::ONE * f32::MIN),
                |(min, max), v| (min.min(v.position), max.max(v.position)),
            );
            MaterialShader::position(min, max)
        }
        Material::Texture => {
            let Some(path) = &cli.texture else {
                bail!("--material texture needs --texture <image>");
            };
            let texture = Texture::from_file(path)
                .with_context(|| format!("failed to load texture {}", path.display()))?;
            MaterialShader::texture(Arc::new(texture))
        }
    })
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let meshes = Mesh::load_obj(&cli.mesh).with_context(|| format!("failed to load {}", cli.mesh.display()))?;
    if meshes.is_empty() {
        bail!("{} contains no objects", cli.mesh.display());
    }

    let mut config = BakeConfig::new(cli.size, cli.size, Vec4::ZERO);
    config
        .set_tile_size(cli.tile_size)
        .set_samples_per_texel(cli.samples)
        .set_cache_budget_bytes(cli.cache_mb.saturating_mul(1 << 20))
        .set_depth_test(false)
        .set_execution(Execution::Parallel { threads: cli.threads });

    let mvp = Projection::texture_space().matrix();
    let mut output = Surface::new(cli.size, cli.size, Vec4::ZERO)?;
    let start = Instant::now();

    for mesh in &meshes {
        let unwrapped = mesh
            .uv_unwrapped("uv")
            .with_context(|| format!("cannot bake `{}` in texture space", mesh.name()))?;
        let shader = material_shader(&cli, mesh)?;
        let baker = Baker::new(config.clone(), shader, unwrapped.layout())?;
        let (surface, stats) = baker.bake_with_stats(&unwrapped, mvp)?;
        info!(
            "`{}`: {} of {} triangles rasterized into {} tiles",
            mesh.name(),
            stats.triangles_rasterized,
            stats.triangles_submitted,
            stats.tiles_touched
        );
        if !output.composite(&surface) {
            bail!("`{}` baked to {}x{}, expected {}x{}", mesh.name(), surface.width(), surface.height(), output.width(), output.height());
        }
    }

    save_png(&output, &cli.output).with_context(|| format!("failed to write {}", cli.output.display()))?;
    info!(
        "wrote {} ({} covered texels) in {:.2?}",
        cli.output.display(),
        output.covered_count(),
        start.elapsed()
    );
    Ok(())
}
