#[cfg(not(target_arch = "wasm32"))]
use clap::Parser;

/// Interactive solar-system style scene viewer
#[cfg(not(target_arch = "wasm32"))]
#[derive(Parser, Debug)]
#[command(name = "orrery", about = "Render a scene file with wgpu")]
struct CliArgs {
    /// Scene file, relative to the assets directory or as a path.
    #[arg(long)]
    scene: Option<String>,

    /// Window width.
    #[arg(long)]
    width: Option<u32>,

    /// Window height.
    #[arg(long)]
    height: Option<u32>,

    /// Window title.
    #[arg(long)]
    title: Option<String>,

    /// Draw triangle edges only.
    #[arg(long)]
    wireframe: bool,
}

#[cfg(not(target_arch = "wasm32"))]
fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    // Start with the defaults, then apply CLI overrides.
    let mut config = wgpu_orrery::AppConfig::default();
    if let Some(scene) = args.scene {
        config.scene = scene;
    }
    if let Some(width) = args.width {
        config.width = width;
    }
    if let Some(height) = args.height {
        config.height = height;
    }
    if let Some(title) = args.title {
        config.title = title;
    }
    config.wireframe = args.wireframe;

    pollster::block_on(wgpu_orrery::run(config))
}

// The wasm build starts from the library's `start` entry point
#[cfg(target_arch = "wasm32")]
fn main() {}
