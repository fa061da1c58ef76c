use std::{iter, mem, rc::Rc};

use wgpu::{BindGroupLayout, Device, Queue, TextureView};

use crate::{
    light::MAX_LIGHTS,
    model::{DrawList, Locals, ModelVertex, Vertex},
    texture,
};

use super::{Pass, UniformPool};

pub struct PhongConfig {
    pub max_lights: usize,
    pub wireframe: bool,
}

impl Default for PhongConfig {
    fn default() -> Self {
        Self {
            max_lights: MAX_LIGHTS,
            wireframe: false,
        }
    }
}

pub struct PhongPass {
    // Uniforms
    pub local_bind_group_layout: BindGroupLayout,
    pub uniform_pool: UniformPool,
    // Shared with every model's material
    pub material_bind_group_layout: Rc<BindGroupLayout>,
    // Textures
    pub depth_texture: texture::Texture,
    // One pipeline per cull mode, picked per draw
    cull_back_pipeline: wgpu::RenderPipeline,
    cull_none_pipeline: wgpu::RenderPipeline,
}

impl PhongPass {
    pub fn new(
        phong_config: &PhongConfig,
        device: &wgpu::Device,
        config: &wgpu::SurfaceConfiguration,
    ) -> PhongPass {
        // The shader's light arrays are fixed at this size
        assert_eq!(
            phong_config.max_lights, MAX_LIGHTS,
            "shader.wgsl is compiled for {} lights",
            MAX_LIGHTS
        );

        let shader_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Phong Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../shader.wgsl").into()),
        });

        // Setup local uniforms
        // Transforms and lights for a single draw
        let local_size = mem::size_of::<Locals>() as wgpu::BufferAddress;
        let local_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("[Phong] Locals"),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: wgpu::BufferSize::new(local_size),
                    },
                    count: None,
                }],
            });

        // Texture + sampler, owned by each model's material
        let material_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("[Phong] Material"),
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Float { filterable: true },
                            view_dimension: wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                        count: None,
                    },
                ],
            });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("[Phong] Pipeline"),
            bind_group_layouts: &[&local_bind_group_layout, &material_bind_group_layout],
            push_constant_ranges: &[],
        });

        // Enable/disable wireframe mode
        let polygon_mode = if phong_config.wireframe {
            if device.features().contains(wgpu::Features::POLYGON_MODE_LINE) {
                wgpu::PolygonMode::Line
            } else {
                log::warn!("Wireframe requested but the adapter can't draw lines, using fill");
                wgpu::PolygonMode::Fill
            }
        } else {
            wgpu::PolygonMode::Fill
        };

        let create_pipeline = |label: &str, cull_mode: Option<wgpu::Face>| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader_module,
                    entry_point: "vs_main",
                    buffers: &[ModelVertex::desc()],
                },
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode,
                    polygon_mode,
                    ..Default::default()
                },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: texture::Texture::DEPTH_FORMAT,
                    depth_write_enabled: true,
                    depth_compare: wgpu::CompareFunction::LessEqual,
                    stencil: Default::default(),
                    bias: Default::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                fragment: Some(wgpu::FragmentState {
                    module: &shader_module,
                    entry_point: "fs_main",
                    targets: &[Some(wgpu::ColorTargetState {
                        format: config.format,
                        blend: Some(wgpu::BlendState {
                            alpha: wgpu::BlendComponent::REPLACE,
                            color: wgpu::BlendComponent::REPLACE,
                        }),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                multiview: None,
            })
        };
        let cull_back_pipeline = create_pipeline("[Phong] Cull Back", Some(wgpu::Face::Back));
        let cull_none_pipeline = create_pipeline("[Phong] Cull None", None);

        let depth_texture =
            texture::Texture::create_depth_texture(device, config, "depth_texture");

        PhongPass {
            local_bind_group_layout,
            uniform_pool: UniformPool::new("[Phong] Locals", local_size),
            material_bind_group_layout: Rc::new(material_bind_group_layout),
            depth_texture,
            cull_back_pipeline,
            cull_none_pipeline,
        }
    }
}

impl Pass for PhongPass {
    fn draw(
        &mut self,
        view: &TextureView,
        device: &Device,
        queue: &Queue,
        draws: &DrawList,
        clear_color: wgpu::Color,
    ) {
        // Every draw writes its own slot, so all writes land before the submit
        self.uniform_pool
            .alloc_buffers(draws.len(), device, &self.local_bind_group_layout);
        for (buffer, command) in self.uniform_pool.buffers.iter().zip(draws.iter()) {
            queue.write_buffer(buffer, 0, bytemuck::cast_slice(&[command.locals]));
        }

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("[Phong] Encoder"),
        });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("[Phong] Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(clear_color),
                        store: true,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_texture.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: true,
                    }),
                    stencil_ops: None,
                }),
            });

            for (slot, command) in draws.iter().enumerate() {
                let pipeline = if command.cull_back {
                    &self.cull_back_pipeline
                } else {
                    &self.cull_none_pipeline
                };
                render_pass.set_pipeline(pipeline);
                render_pass.set_bind_group(0, &self.uniform_pool.bind_groups[slot], &[]);
                render_pass.set_bind_group(1, command.material, &[]);
                render_pass.set_vertex_buffer(0, command.mesh.vertex_buffer.slice(..));
                render_pass.draw(0..command.mesh.num_vertices, 0..1);
            }
        }

        queue.submit(iter::once(encoder.finish()));
    }

    fn resize(&mut self, device: &Device, config: &wgpu::SurfaceConfiguration) {
        self.depth_texture = texture::Texture::create_depth_texture(device, config, "depth_texture");
    }
}
