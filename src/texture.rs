use std::{num::NonZeroU32, sync::mpsc};

use image::{imageops::FilterType, DynamicImage, GenericImageView};

use crate::error::LoadError;

pub struct Texture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
    pub size: (u32, u32),
}

impl Texture {
    pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

    pub fn create_depth_texture(
        device: &wgpu::Device,
        config: &wgpu::SurfaceConfiguration,
        label: &str,
    ) -> Self {
        let size = wgpu::Extent3d {
            width: config.width,
            height: config.height,
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        });

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            compare: Some(wgpu::CompareFunction::LessEqual),
            lod_min_clamp: -100.0,
            lod_max_clamp: 100.0,
            ..Default::default()
        });

        Self {
            texture,
            view,
            sampler,
            size: (config.width, config.height),
        }
    }

    /// Upload an image along with a full mip chain built on the CPU
    pub fn from_image(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        img: &DynamicImage,
        label: Option<&str>,
        settings: TextureSettings,
    ) -> Self {
        let (width, height) = img.dimensions();
        let mip_level_count = mip_level_count(width, height);
        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label,
            size,
            mip_level_count,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        });

        for level in 0..mip_level_count {
            let level_width = (width >> level).max(1);
            let level_height = (height >> level).max(1);
            let rgba = if level == 0 {
                img.to_rgba8()
            } else {
                img.resize_exact(level_width, level_height, FilterType::Triangle)
                    .to_rgba8()
            };
            queue.write_texture(
                wgpu::ImageCopyTexture {
                    aspect: wgpu::TextureAspect::All,
                    texture: &texture,
                    mip_level: level,
                    origin: wgpu::Origin3d::ZERO,
                },
                &rgba,
                wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: NonZeroU32::new(4 * level_width),
                    rows_per_image: NonZeroU32::new(level_height),
                },
                wgpu::Extent3d {
                    width: level_width,
                    height: level_height,
                    depth_or_array_layers: 1,
                },
            );
        }

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = device.create_sampler(&settings.sampler_descriptor());

        Self {
            texture,
            view,
            sampler,
            size: (width, height),
        }
    }

    /// Single white texel, bound while a model has no texture to show
    pub fn placeholder(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        let img = DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(
            1,
            1,
            image::Rgba([255, 255, 255, 255]),
        ));
        Self::from_image(
            device,
            queue,
            &img,
            Some("Placeholder Texture"),
            TextureSettings::default(),
        )
    }

    pub fn configure(&mut self, device: &wgpu::Device, settings: TextureSettings) {
        self.sampler = device.create_sampler(&settings.sampler_descriptor());
    }
}

pub fn mip_level_count(width: u32, height: u32) -> u32 {
    32 - width.max(height).max(1).leading_zeros()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MinFilter {
    LinearMipmapLinear,
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MagFilter {
    Linear,
    Nearest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapMode {
    Repeat,
    ClampToEdge,
    MirroredRepeat,
}

impl WrapMode {
    pub fn next(self) -> Self {
        match self {
            WrapMode::Repeat => WrapMode::ClampToEdge,
            WrapMode::ClampToEdge => WrapMode::MirroredRepeat,
            WrapMode::MirroredRepeat => WrapMode::Repeat,
        }
    }

    fn address_mode(self) -> wgpu::AddressMode {
        match self {
            WrapMode::Repeat => wgpu::AddressMode::Repeat,
            WrapMode::ClampToEdge => wgpu::AddressMode::ClampToEdge,
            WrapMode::MirroredRepeat => wgpu::AddressMode::MirrorRepeat,
        }
    }
}

/// How a model samples its texture. Each model keeps its own copy and only
/// changes it through [`crate::model::Model::configure_texture`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureSettings {
    pub min_filter: MinFilter,
    pub mag_filter: MagFilter,
    pub wrap_s: WrapMode,
    pub wrap_t: WrapMode,
}

impl Default for TextureSettings {
    fn default() -> Self {
        Self {
            min_filter: MinFilter::LinearMipmapLinear,
            mag_filter: MagFilter::Linear,
            wrap_s: WrapMode::Repeat,
            wrap_t: WrapMode::Repeat,
        }
    }
}

impl TextureSettings {
    pub fn toggle_min_filter(&mut self) {
        self.min_filter = match self.min_filter {
            MinFilter::LinearMipmapLinear => MinFilter::Linear,
            MinFilter::Linear => MinFilter::LinearMipmapLinear,
        };
    }

    pub fn toggle_mag_filter(&mut self) {
        self.mag_filter = match self.mag_filter {
            MagFilter::Linear => MagFilter::Nearest,
            MagFilter::Nearest => MagFilter::Linear,
        };
    }

    pub fn cycle_wrap_s(&mut self) {
        self.wrap_s = self.wrap_s.next();
    }

    pub fn cycle_wrap_t(&mut self) {
        self.wrap_t = self.wrap_t.next();
    }

    pub fn sampler_descriptor(&self) -> wgpu::SamplerDescriptor<'static> {
        // Without the mipmap step the chain is still there, we just pin to level 0
        let (mipmap_filter, lod_max_clamp) = match self.min_filter {
            MinFilter::LinearMipmapLinear => (wgpu::FilterMode::Linear, 32.0),
            MinFilter::Linear => (wgpu::FilterMode::Nearest, 0.0),
        };
        wgpu::SamplerDescriptor {
            label: Some("Model Texture Sampler"),
            address_mode_u: self.wrap_s.address_mode(),
            address_mode_v: self.wrap_t.address_mode(),
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: match self.mag_filter {
                MagFilter::Linear => wgpu::FilterMode::Linear,
                MagFilter::Nearest => wgpu::FilterMode::Nearest,
            },
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter,
            lod_min_clamp: 0.0,
            lod_max_clamp,
            ..Default::default()
        }
    }
}

/// An image being decoded in the background. The result arrives on a
/// channel and is picked up by the render thread with [`PendingImage::try_take`].
pub struct PendingImage {
    pub name: String,
    receiver: mpsc::Receiver<Result<DynamicImage, LoadError>>,
}

impl PendingImage {
    pub fn new(name: impl Into<String>) -> (Self, mpsc::Sender<Result<DynamicImage, LoadError>>) {
        let (sender, receiver) = mpsc::channel();
        (
            Self {
                name: name.into(),
                receiver,
            },
            sender,
        )
    }

    /// `None` while the load is still running
    pub fn try_take(&self) -> Option<Result<DynamicImage, LoadError>> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(mpsc::TryRecvError::Empty) => None,
            Err(mpsc::TryRecvError::Disconnected) => Some(Err(LoadError::Fetch {
                url: self.name.clone(),
                reason: "loader stopped before sending an image".to_string(),
            })),
        }
    }
}

/// Where a model's texture is in its life. `T` is whatever the image turns
/// into once uploaded (a [`Texture`] in the renderer).
pub enum TextureState<T> {
    None,
    Loading(PendingImage),
    Ready(T),
    Failed,
}

impl<T> TextureState<T> {
    /// Move a finished load into `Ready` (or `Failed`). Returns true on the
    /// frame the texture becomes usable.
    pub fn poll(&mut self, upload: impl FnOnce(&DynamicImage) -> T) -> bool {
        let result = match self {
            TextureState::Loading(pending) => match pending.try_take() {
                Some(result) => result,
                None => return false,
            },
            _ => return false,
        };

        match result {
            Ok(img) => {
                *self = TextureState::Ready(upload(&img));
                true
            }
            Err(err) => {
                log::warn!("Texture unavailable, drawing untextured: {}", err);
                *self = TextureState::Failed;
                false
            }
        }
    }

    pub fn ready(&self) -> Option<&T> {
        match self {
            TextureState::Ready(texture) => Some(texture),
            _ => None,
        }
    }

    pub fn ready_mut(&mut self) -> Option<&mut T> {
        match self {
            TextureState::Ready(texture) => Some(texture),
            _ => None,
        }
    }
}
