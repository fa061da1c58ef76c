use anyhow::*;
use fs_extra::copy_items;
use fs_extra::dir::CopyOptions;
use std::env;

// Copies `assets/` (scene file, meshes, textures) into OUT_DIR, where the
// native loader looks for anything that isn't a direct path.
// The web build fetches the same folder from the page origin instead.
fn main() -> Result<()> {
    println!("cargo:rerun-if-changed=assets");

    let out_dir = env::var("OUT_DIR")?;
    let mut copy_options = CopyOptions::new();
    copy_options.overwrite = true;
    let paths_to_copy = vec!["assets/"];
    copy_items(&paths_to_copy, out_dir, &copy_options)
        .context("Couldn't copy assets into the build output")?;

    Ok(())
}
