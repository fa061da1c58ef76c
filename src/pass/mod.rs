use wgpu::{Device, Queue, TextureView};

use crate::model::DrawList;

pub mod phong;

pub trait Pass {
    /// Record and submit the frame's draws into `view`
    fn draw(
        &mut self,
        view: &TextureView,
        device: &Device,
        queue: &Queue,
        draws: &DrawList,
        clear_color: wgpu::Color,
    );

    /// Recreate size dependent attachments
    fn resize(&mut self, device: &Device, config: &wgpu::SurfaceConfiguration);
}

/// A growable set of same-sized uniform buffers, each with its own bind
/// group, so every draw in a frame gets a slot nobody else writes to.
pub struct UniformPool {
    label: &'static str,
    size: wgpu::BufferAddress,
    pub buffers: Vec<wgpu::Buffer>,
    pub bind_groups: Vec<wgpu::BindGroup>,
}

impl UniformPool {
    pub fn new(label: &'static str, size: wgpu::BufferAddress) -> Self {
        Self {
            label,
            size,
            buffers: Vec::new(),
            bind_groups: Vec::new(),
        }
    }

    /// Make sure at least `count` slots exist. Slots are never released, the
    /// pool only grows to the largest frame seen.
    pub fn alloc_buffers(
        &mut self,
        count: usize,
        device: &Device,
        layout: &wgpu::BindGroupLayout,
    ) {
        while self.buffers.len() < count {
            let buffer = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(self.label),
                size: self.size,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(self.label),
                layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: buffer.as_entire_binding(),
                }],
            });
            self.buffers.push(buffer);
            self.bind_groups.push(bind_group);
        }
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }
}
