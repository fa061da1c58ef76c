//! On-screen controls.
//!
//! [`ControlPanel`] is plain data the renderer reads once per frame. [`Gui`]
//! draws it with egui on top of the scene and feeds pointer input to egui.

use crate::{
    camera::{Camera, CameraDescription},
    model::TextureOptions,
    texture::TextureSettings,
};

const MIN_FOV: f32 = 1.0;
const MAX_FOV: f32 = 179.0;
const MIN_NEAR: f32 = 0.01;
/// Smallest distance kept between the near and far planes
const NEAR_FAR_GAP: f32 = 0.001;
const MIN_TEXTURE_SCALE: f32 = 0.1;
const MAX_TEXTURE_SCALE: f32 = 10.0;

/// Live camera and render settings
#[derive(Debug, Clone, PartialEq)]
pub struct ControlPanel {
    pub fov_deg: f32,
    pub near: f32,
    pub far: f32,
    /// Upper bound of the far slider, taken from the scene file
    pub max_far: f32,
    pub perspective: bool,
    pub show_texture: bool,
    pub texture_scale: f32,
    pub texture_settings: TextureSettings,
    texture_changed: bool,
    reset_requested: bool,
}

impl ControlPanel {
    pub fn from_camera(description: &CameraDescription) -> Self {
        let mut panel = Self {
            fov_deg: description.fov_deg,
            near: description.near,
            far: description.far,
            max_far: description.far,
            perspective: description.perspective,
            show_texture: true,
            texture_scale: 1.0,
            texture_settings: TextureSettings::default(),
            texture_changed: false,
            reset_requested: false,
        };
        panel.clamp_ranges();
        panel
    }

    /// Put the camera values back to the scene file's, keeping render options
    pub fn reset_camera(&mut self, description: &CameraDescription) {
        let show_texture = self.show_texture;
        let texture_scale = self.texture_scale;
        let texture_settings = self.texture_settings;
        *self = Self::from_camera(description);
        self.show_texture = show_texture;
        self.texture_scale = texture_scale;
        self.texture_settings = texture_settings;
    }

    pub fn texture_options(&self) -> TextureOptions {
        TextureOptions {
            show: self.show_texture,
            scale: self.texture_scale,
        }
    }

    pub fn apply_to(&self, camera: &mut Camera) {
        camera.fovy = self.fov_deg;
        camera.znear = self.near;
        camera.zfar = self.far;
        camera.perspective = self.perspective;
    }

    /// Keep the sliders inside their ranges, with near always in front of far
    pub fn clamp_ranges(&mut self) {
        self.fov_deg = self.fov_deg.clamp(MIN_FOV, MAX_FOV);
        self.max_far = self.max_far.max(MIN_NEAR * 2.0);
        self.far = self.far.clamp(MIN_NEAR * 2.0, self.max_far);
        self.near = self.near.clamp(MIN_NEAR, self.far - NEAR_FAR_GAP);
        self.texture_scale = self
            .texture_scale
            .clamp(MIN_TEXTURE_SCALE, MAX_TEXTURE_SCALE);
    }

    pub fn request_reset(&mut self) {
        self.reset_requested = true;
    }

    /// True once after "Reset camera" was pressed
    pub fn take_reset(&mut self) -> bool {
        std::mem::take(&mut self.reset_requested)
    }

    pub fn set_texture_settings(&mut self, settings: TextureSettings) {
        if settings != self.texture_settings {
            self.texture_settings = settings;
            self.texture_changed = true;
        }
    }

    /// New sampler settings, once per change
    pub fn take_texture_change(&mut self) -> Option<TextureSettings> {
        std::mem::take(&mut self.texture_changed).then(|| self.texture_settings)
    }

    pub fn show(&mut self, ctx: &egui::Context) {
        egui::Window::new("Controls")
            .default_pos([8.0, 8.0])
            .resizable(false)
            .show(ctx, |ui| {
                ui.add(egui::Slider::new(&mut self.fov_deg, MIN_FOV..=MAX_FOV).text("FOV"));
                let far = self.far;
                ui.add(
                    egui::Slider::new(&mut self.near, MIN_NEAR..=far - NEAR_FAR_GAP)
                        .logarithmic(true)
                        .text("Near"),
                );
                let near = self.near;
                ui.add(
                    egui::Slider::new(&mut self.far, near + NEAR_FAR_GAP..=self.max_far)
                        .logarithmic(true)
                        .text("Far"),
                );
                ui.checkbox(&mut self.perspective, "Perspective");
                ui.checkbox(&mut self.show_texture, "Show texture");
                ui.add(
                    egui::Slider::new(
                        &mut self.texture_scale,
                        MIN_TEXTURE_SCALE..=MAX_TEXTURE_SCALE,
                    )
                    .logarithmic(true)
                    .text("Texture scale"),
                );

                ui.separator();
                let mut settings = self.texture_settings;
                if ui
                    .button(format!("Min filter: {:?}", settings.min_filter))
                    .clicked()
                {
                    settings.toggle_min_filter();
                }
                if ui
                    .button(format!("Mag filter: {:?}", settings.mag_filter))
                    .clicked()
                {
                    settings.toggle_mag_filter();
                }
                if ui.button(format!("Wrap S: {:?}", settings.wrap_s)).clicked() {
                    settings.cycle_wrap_s();
                }
                if ui.button(format!("Wrap T: {:?}", settings.wrap_t)).clicked() {
                    settings.cycle_wrap_t();
                }
                self.set_texture_settings(settings);

                ui.separator();
                if ui.button("Reset camera").clicked() {
                    self.request_reset();
                }
            });
        self.clamp_ranges();
    }
}

/// egui overlay: collects window input and paints the control panel
pub struct Gui {
    ctx: egui::Context,
    renderer: egui_wgpu::renderer::RenderPass,
    events: Vec<egui::Event>,
    pointer: egui::Pos2,
    pixels_per_point: f32,
}

impl Gui {
    pub fn new(device: &wgpu::Device, format: wgpu::TextureFormat, scale_factor: f32) -> Self {
        Self {
            ctx: egui::Context::default(),
            renderer: egui_wgpu::renderer::RenderPass::new(device, format, 1),
            events: Vec::new(),
            pointer: egui::Pos2::ZERO,
            pixels_per_point: scale_factor,
        }
    }

    pub fn set_scale_factor(&mut self, scale_factor: f32) {
        self.pixels_per_point = scale_factor;
    }

    /// Pointer position in physical pixels
    pub fn pointer_moved(&mut self, x: f32, y: f32) {
        self.pointer = egui::pos2(x / self.pixels_per_point, y / self.pixels_per_point);
        self.events.push(egui::Event::PointerMoved(self.pointer));
    }

    pub fn pointer_button(&mut self, pressed: bool) {
        self.events.push(egui::Event::PointerButton {
            pos: self.pointer,
            button: egui::PointerButton::Primary,
            pressed,
            modifiers: egui::Modifiers::default(),
        });
    }

    /// True while the pointer is over the panel or dragging one of its widgets
    pub fn wants_pointer(&self) -> bool {
        self.ctx.wants_pointer_input() || self.ctx.is_pointer_over_area()
    }

    /// Run the panel for this frame and paint it over `view`
    pub fn draw(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        view: &wgpu::TextureView,
        size_in_pixels: [u32; 2],
        panel: &mut ControlPanel,
    ) {
        let screen_size = egui::vec2(
            size_in_pixels[0] as f32 / self.pixels_per_point,
            size_in_pixels[1] as f32 / self.pixels_per_point,
        );
        let raw_input = egui::RawInput {
            screen_rect: Some(egui::Rect::from_min_size(egui::Pos2::ZERO, screen_size)),
            pixels_per_point: Some(self.pixels_per_point),
            events: std::mem::take(&mut self.events),
            ..Default::default()
        };

        let output = self.ctx.run(raw_input, |ctx| panel.show(ctx));
        let paint_jobs = self.ctx.tessellate(output.shapes);
        let screen_descriptor = egui_wgpu::renderer::ScreenDescriptor {
            size_in_pixels,
            pixels_per_point: self.pixels_per_point,
        };

        for (id, image_delta) in &output.textures_delta.set {
            self.renderer.update_texture(device, queue, *id, image_delta);
        }
        self.renderer
            .update_buffers(device, queue, &paint_jobs, &screen_descriptor);

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("[Egui] Encoder"),
        });
        // No clear colour: paint over the scene
        self.renderer
            .execute(&mut encoder, view, &paint_jobs, &screen_descriptor, None);
        queue.submit(std::iter::once(encoder.finish()));

        for id in &output.textures_delta.free {
            self.renderer.free_texture(id);
        }
    }
}
