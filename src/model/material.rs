use std::rc::Rc;

use crate::{
    resources,
    texture::{Texture, TextureSettings, TextureState},
};

/// Texture binding for one model.
///
/// Until the image finishes loading (or if it never does) the bind group
/// points at a white placeholder and the model reports itself untextured.
pub struct Material {
    pub name: String,
    layout: Rc<wgpu::BindGroupLayout>,
    settings: TextureSettings,
    texture: TextureState<Texture>,
    placeholder: Texture,
    bind_group: wgpu::BindGroup,
}

impl Material {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layout: Rc<wgpu::BindGroupLayout>,
        name: &str,
        texture_url: Option<&str>,
    ) -> Self {
        let placeholder = Texture::placeholder(device, queue);
        let bind_group = create_bind_group(device, &layout, name, &placeholder);
        let texture = match texture_url {
            Some(url) => {
                log::debug!("Loading texture '{}' for '{}'", url, name);
                TextureState::Loading(resources::load_image_in_background(url))
            }
            None => TextureState::None,
        };

        Self {
            name: name.to_string(),
            layout,
            settings: TextureSettings::default(),
            texture,
            placeholder,
            bind_group,
        }
    }

    pub fn is_textured(&self) -> bool {
        self.texture.ready().is_some()
    }

    pub fn bind_group(&self) -> &wgpu::BindGroup {
        &self.bind_group
    }

    pub fn poll(&mut self, device: &wgpu::Device, queue: &wgpu::Queue) {
        let settings = self.settings;
        let label = format!("{} Texture", self.name);
        let became_ready = self.texture.poll(|img| {
            Texture::from_image(device, queue, img, Some(&label), settings)
        });
        if became_ready {
            log::info!("Texture ready for '{}'", self.name);
            self.rebuild_bind_group(device);
        }
    }

    pub fn configure(&mut self, device: &wgpu::Device, settings: TextureSettings) {
        if settings == self.settings {
            return;
        }
        self.settings = settings;
        if let Some(texture) = self.texture.ready_mut() {
            texture.configure(device, settings);
            self.rebuild_bind_group(device);
        }
    }

    fn rebuild_bind_group(&mut self, device: &wgpu::Device) {
        let texture = self.texture.ready().unwrap_or(&self.placeholder);
        self.bind_group = create_bind_group(device, &self.layout, &self.name, texture);
    }
}

fn create_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    name: &str,
    texture: &Texture,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(&format!("{} Material", name)),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&texture.view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(&texture.sampler),
            },
        ],
    })
}
