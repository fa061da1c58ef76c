use std::{collections::HashSet, rc::Rc};

use anyhow::anyhow;
use cgmath::Matrix4;
use context::GraphicsContext;
use pass::{
    phong::{PhongConfig, PhongPass},
    Pass,
};

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

pub mod camera;
pub mod config;
pub mod context;
pub mod error;
pub mod light;
pub mod model;
pub mod pass;
pub mod primitives;
pub mod resources;
pub mod scene;
pub mod texture;
pub mod transform_stack;
pub mod ui;
pub mod window;

pub use config::AppConfig;

use crate::{
    camera::{Camera, CameraDescription, OrbitController},
    light::lights_to_view,
    model::{
        sphere_model::builtin_sphere, DrawList, MeshModel, Model, ModelRegistry, SphereModel,
    },
    scene::{Scene, SceneDescription},
    transform_stack::TransformStack,
    ui::{ControlPanel, Gui},
    window::{Window, WindowEvents},
};

struct State {
    ctx: GraphicsContext,
    pass: PhongPass,
    gui: Gui,
    // Scene
    models: ModelRegistry,
    scene: Scene,
    // Camera as the scene file defines it, for resets
    default_camera: CameraDescription,
    camera: Camera,
    orbit: OrbitController,
    controls: ControlPanel,
    // Last pointer position in physical pixels
    cursor: (f32, f32),
}

impl State {
    // Initialize the state
    async fn new(window: &Window, config: &AppConfig) -> anyhow::Result<Self> {
        let ctx = GraphicsContext::new(&window.window).await?;

        let phong_config = PhongConfig {
            wireframe: config.wireframe,
            ..Default::default()
        };
        let pass = PhongPass::new(&phong_config, &ctx.device, &ctx.config);
        let gui = Gui::new(&ctx.device, ctx.config.format, window.scale_factor());

        // Load the scene from disk or as a HTTP request (for web support)
        // Broken parent links are rejected here, before any model loads
        let description = scene::load_scene(&config.scene).await?;
        log::info!(
            "Loaded scene '{}': {} models, {} lights",
            config.scene,
            description.models.len(),
            description.lights.len()
        );

        let models = load_models(&ctx, &pass.material_bind_group_layout, &description).await;
        let scene = Scene::from_description(&description, |url| models.id_of(url))?;

        let default_camera = description.camera.clone();
        let camera = Camera::from_description(&default_camera);
        let controls = ControlPanel::from_camera(&default_camera);

        Ok(Self {
            ctx,
            pass,
            gui,
            models,
            scene,
            default_camera,
            camera,
            orbit: OrbitController::new(),
            controls,
            cursor: (0.0, 0.0),
        })
    }

    // Keeps state in sync with window size when changed
    fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>, scale_factor: f32) {
        self.gui.set_scale_factor(scale_factor);
        if self.ctx.resize(new_size) {
            // Make sure to current window size to depth texture - required for calc
            self.pass.resize(&self.ctx.device, &self.ctx.config);
        }
    }

    fn input(&mut self, event: WindowEvents) {
        match event {
            WindowEvents::PointerMoved { x, y } => {
                self.cursor = (x, y);
                self.gui.pointer_moved(x, y);
                self.orbit.drag_to(x, y);
            }
            WindowEvents::PointerButton { pressed } => {
                self.gui.pointer_button(pressed);
                if !pressed {
                    self.orbit.end_drag();
                } else if !self.gui.wants_pointer() {
                    let (x, y) = self.cursor;
                    self.orbit.begin_drag(x, y);
                }
            }
            WindowEvents::Character(key) => {
                if let Some(target) = self.scene.look_at_target(key) {
                    log::debug!("Looking at {:?}", target);
                    self.camera.target = target;
                }
            }
            WindowEvents::Resized { .. } | WindowEvents::Draw => {}
        }
    }

    fn reset_camera(&mut self) {
        self.camera = Camera::from_description(&self.default_camera);
        self.orbit.reset();
        self.controls.reset_camera(&self.default_camera);
    }

    // Apply the control panel and pick up background work before drawing
    fn update(&mut self) {
        self.models.poll(&self.ctx.device, &self.ctx.queue);
        self.models.advance();

        if let Some(settings) = self.controls.take_texture_change() {
            log::debug!("Texture settings changed to {:?}", settings);
            self.models.configure_textures(&self.ctx.device, settings);
        }
        if self.controls.take_reset() {
            self.reset_camera();
        }
        self.controls.apply_to(&mut self.camera);
    }

    // Primary render flow
    fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        let output = self.ctx.surface.get_current_texture()?;
        let frame_view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let projection = self.camera.build_projection_matrix(self.ctx.aspect());
        let view: Matrix4<f32> = self.camera.build_orbit_view_matrix(&self.orbit);
        let lights = lights_to_view(&self.scene.lights, &view);

        // Every instance starts from the camera's view transform
        let mut stack = TransformStack::new();
        stack.multiply(view);
        let mut draws = DrawList::new();
        self.scene.redraw(
            &self.models,
            &mut stack,
            &projection,
            &lights,
            self.controls.texture_options(),
            &mut draws,
        );
        debug_assert_eq!(stack.depth(), 1);

        let [r, g, b, a] = self.scene.bg_color;
        let clear_color = wgpu::Color {
            r: r as f64,
            g: g as f64,
            b: b as f64,
            a: a as f64,
        };
        self.pass.draw(
            &frame_view,
            &self.ctx.device,
            &self.ctx.queue,
            &draws,
            clear_color,
        );

        let size = self.ctx.size();
        self.gui.draw(
            &self.ctx.device,
            &self.ctx.queue,
            &frame_view,
            [size.width, size.height],
            &mut self.controls,
        );

        output.present();
        Ok(())
    }
}

/// Build every model the scene names, once per distinct name. Failures are
/// logged and skipped so the rest of the scene still shows.
async fn load_models(
    ctx: &GraphicsContext,
    material_layout: &Rc<wgpu::BindGroupLayout>,
    description: &SceneDescription,
) -> ModelRegistry {
    let mut models = ModelRegistry::new();
    let mut failed = HashSet::new();

    for placement in &description.models {
        let url = placement.model_url.as_str();
        if models.id_of(url).is_some() || failed.contains(url) {
            continue;
        }

        let model: Box<dyn Model> = match builtin_sphere(url) {
            Some(builtin) => Box::new(SphereModel::new(
                &ctx.device,
                &ctx.queue,
                Rc::clone(material_layout),
                builtin,
            )),
            None => match MeshModel::load(&ctx.device, &ctx.queue, Rc::clone(material_layout), url)
                .await
            {
                Ok(mesh) => Box::new(mesh),
                Err(err) => {
                    log::error!("Couldn't load model '{}': {}", url, err);
                    failed.insert(url);
                    continue;
                }
            },
        };
        models.insert(url, model);
    }

    models
}

pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    cfg_if::cfg_if! {
        if #[cfg(target_arch = "wasm32")] {
            std::panic::set_hook(Box::new(console_error_panic_hook::hook));
            console_log::init_with_level(log::Level::Warn)
                .map_err(|err| anyhow!("Couldn't initialize logger: {}", err))?;
        } else {
            env_logger::init();
        }
    }

    let window = Window::new(&config)?;

    // State::new uses async code, so we're going to wait for it to finish
    let mut state = State::new(&window, &config).await?;

    window.run(move |event| match event {
        WindowEvents::Resized {
            width,
            height,
            scale_factor,
        } => {
            state.resize(winit::dpi::PhysicalSize { width, height }, scale_factor);
            Ok(())
        }
        WindowEvents::Draw => {
            state.update();
            match state.render() {
                Ok(()) => Ok(()),
                // Reconfigure the surface if it's lost or outdated
                Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                    state.ctx.reconfigure();
                    Ok(())
                }
                // The system is out of memory, we should probably quit
                Err(wgpu::SurfaceError::OutOfMemory) => Err(anyhow!("Out of GPU memory")),
                Err(wgpu::SurfaceError::Timeout) => {
                    log::warn!("Surface timeout");
                    Ok(())
                }
            }
        }
        event => {
            state.input(event);
            Ok(())
        }
    })
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub async fn start() {
    if let Err(err) = run(AppConfig::default()).await {
        log::error!("{:#}", err);
    }
}
