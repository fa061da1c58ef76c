/// Startup settings. The native binary fills these from the command line,
/// wasm always uses the defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// Scene file, relative to the asset root
    pub scene: String,
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub wireframe: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            scene: "scene.json".to_string(),
            title: "wgpu orrery".to_string(),
            width: 1024,
            height: 768,
            wireframe: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_loads_bundled_scene() {
        let config = AppConfig::default();
        assert_eq!(config.scene, "scene.json");
        assert!(config.width > 0 && config.height > 0);
        assert!(!config.wireframe);
    }
}
