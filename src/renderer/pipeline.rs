//! WebGPU render pipeline setup
//!
//! Four pipelines share one surface: alpha-blended and additive colour
//! triangles, plus textured quads for the fog (R8) and background (RGBA8).

use std::ops::Range;

use wgpu::util::DeviceExt;

use super::scene::{Blend, FramePlan};
use super::vertex::{QuadVertex, Vertex, colors};
use crate::assets::cover_fit;
use crate::fog::FogLayer;

/// Per-layer uniform: fog colour, or image opacity in `a`
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct LayerParams {
    color: [f32; 4],
}

const ADDITIVE_BLENDING: wgpu::BlendState = wgpu::BlendState {
    color: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::SrcAlpha,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
    alpha: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
};

/// A sampled texture with its bind group
struct TextureLayer {
    texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
    params: wgpu::Buffer,
    size: (u32, u32),
}

impl TextureLayer {
    fn new(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        sampler: &wgpu::Sampler,
        format: wgpu::TextureFormat,
        size: (u32, u32),
        label: &str,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: size.0.max(1),
                height: size.1.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let params = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("layer_params"),
            contents: bytemuck::bytes_of(&LayerParams { color: [1.0; 4] }),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: params.as_entire_binding(),
                },
            ],
        });
        Self {
            texture,
            bind_group,
            params,
            size: (size.0.max(1), size.1.max(1)),
        }
    }

    fn upload(&self, queue: &wgpu::Queue, bytes_per_pixel: u32, data: &[u8]) {
        let (width, height) = self.size;
        if data.len() < (width * height * bytes_per_pixel) as usize {
            log::warn!("Texture upload too short ({} bytes)", data.len());
            return;
        }
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(width * bytes_per_pixel),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
    }

    fn set_params(&self, queue: &wgpu::Queue, color: [f32; 4]) {
        queue.write_buffer(&self.params, 0, bytemuck::bytes_of(&LayerParams { color }));
    }
}

/// Main render state
pub struct RenderState {
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    alpha_pipeline: wgpu::RenderPipeline,
    additive_pipeline: wgpu::RenderPipeline,
    fog_pipeline: wgpu::RenderPipeline,
    image_pipeline: wgpu::RenderPipeline,
    layer_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    fog: TextureLayer,
    background: Option<TextureLayer>,
    /// Surface size in device pixels
    pub size: (u32, u32),
    /// Drawing coordinate space (canvas CSS pixels)
    view: glam::Vec2,
}

impl RenderState {
    pub async fn new(
        surface: wgpu::Surface<'static>,
        adapter: &wgpu::Adapter,
        width: u32,
        height: u32,
    ) -> Result<Self, wgpu::RequestDeviceError> {
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("glass-tones-device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_webgl2_defaults()
                    .using_resolution(adapter.limits()),
                memory_hints: Default::default(),
                trace: Default::default(),
                experimental_features: Default::default(),
            })
            .await?;

        let surface_caps = surface.get_capabilities(adapter);
        // Colours are authored as canvas sRGB values; blend them as-is
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| !f.is_srgb())
            .copied()
            .unwrap_or(surface_caps.formats[0]);
        log::info!("Using surface format: {:?}", surface_format);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: width.max(1),
            height: height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shader.wgsl").into()),
        });
        let texture_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("texture_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("texture.wgsl").into()),
        });

        let color_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("color_pipeline_layout"),
            bind_group_layouts: &[],
            immediate_size: 0,
        });

        let layer_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("layer_bind_group_layout"),
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
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });
        let texture_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("texture_pipeline_layout"),
            bind_group_layouts: &[&layer_layout],
            immediate_size: 0,
        });

        let make_pipeline = |label: &str,
                             layout: &wgpu::PipelineLayout,
                             module: &wgpu::ShaderModule,
                             buffers: &[wgpu::VertexBufferLayout],
                             fragment: &str,
                             blend: wgpu::BlendState| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(layout),
                vertex: wgpu::VertexState {
                    module,
                    entry_point: Some("vs_main"),
                    buffers,
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module,
                    entry_point: Some(fragment),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: config.format,
                        blend: Some(blend),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    ..Default::default()
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview_mask: None,
                cache: None,
            })
        };

        let alpha_pipeline = make_pipeline(
            "alpha_pipeline",
            &color_layout,
            &shader,
            &[Vertex::desc()],
            "fs_main",
            wgpu::BlendState::ALPHA_BLENDING,
        );
        let additive_pipeline = make_pipeline(
            "additive_pipeline",
            &color_layout,
            &shader,
            &[Vertex::desc()],
            "fs_main",
            ADDITIVE_BLENDING,
        );
        let fog_pipeline = make_pipeline(
            "fog_pipeline",
            &texture_layout,
            &texture_shader,
            &[QuadVertex::desc()],
            "fs_fog",
            wgpu::BlendState::ALPHA_BLENDING,
        );
        let image_pipeline = make_pipeline(
            "image_pipeline",
            &texture_layout,
            &texture_shader,
            &[QuadVertex::desc()],
            "fs_image",
            wgpu::BlendState::ALPHA_BLENDING,
        );

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("layer_sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let fog = TextureLayer::new(
            &device,
            &layer_layout,
            &sampler,
            wgpu::TextureFormat::R8Unorm,
            (1, 1),
            "fog_texture",
        );
        fog.set_params(&queue, colors::fog());

        Ok(Self {
            surface,
            device,
            queue,
            config,
            alpha_pipeline,
            additive_pipeline,
            fog_pipeline,
            image_pipeline,
            layer_layout,
            sampler,
            fog,
            background: None,
            size: (width, height),
            view: glam::Vec2::new(width as f32, height as f32),
        })
    }

    /// Set the coordinate space scene vertices are given in
    pub fn set_view(&mut self, view: glam::Vec2) {
        self.view = view.max(glam::Vec2::ONE);
    }

    pub fn resize(&mut self, new_width: u32, new_height: u32) {
        if new_width > 0 && new_height > 0 {
            self.size = (new_width, new_height);
            self.config.width = new_width;
            self.config.height = new_height;
            self.surface.configure(&self.device, &self.config);
        }
    }

    /// Reconfigure after a lost or outdated surface
    pub fn reconfigure(&mut self) {
        self.surface.configure(&self.device, &self.config);
    }

    /// Install the decoded background image (RGBA8, row-major)
    pub fn set_background(&mut self, width: u32, height: u32, rgba: &[u8]) {
        let layer = TextureLayer::new(
            &self.device,
            &self.layer_layout,
            &self.sampler,
            wgpu::TextureFormat::Rgba8Unorm,
            (width, height),
            "background_texture",
        );
        layer.upload(&self.queue, 4, rgba);
        self.background = Some(layer);
        log::info!("Background texture {}x{}", width, height);
    }

    /// Canvas pixels to normalized device coordinates
    pub fn px_to_ndc(&self, x: f32, y: f32) -> (f32, f32) {
        (x / self.view.x * 2.0 - 1.0, 1.0 - y / self.view.y * 2.0)
    }

    fn quad(&self, x: f32, y: f32, w: f32, h: f32) -> [QuadVertex; 6] {
        let (l, t) = self.px_to_ndc(x, y);
        let (r, b) = self.px_to_ndc(x + w, y + h);
        let v = |position, uv| QuadVertex { position, uv };
        [
            v([l, t], [0.0, 0.0]),
            v([l, b], [0.0, 1.0]),
            v([r, t], [1.0, 0.0]),
            v([r, t], [1.0, 0.0]),
            v([l, b], [0.0, 1.0]),
            v([r, b], [1.0, 1.0]),
        ]
    }

    fn sync_fog(&mut self, fog: &mut FogLayer) {
        if fog.size() != self.fog.size {
            self.fog = TextureLayer::new(
                &self.device,
                &self.layer_layout,
                &self.sampler,
                wgpu::TextureFormat::R8Unorm,
                fog.size(),
                "fog_texture",
            );
            self.fog.set_params(&self.queue, colors::fog());
            self.fog.upload(&self.queue, 1, fog.as_bytes());
            fog.take_dirty();
        } else if fog.take_dirty() {
            self.fog.upload(&self.queue, 1, fog.as_bytes());
        }
    }

    fn draw_batches(
        &self,
        pass: &mut wgpu::RenderPass<'_>,
        ranges: &[(Blend, Range<u32>)],
        buffer: &wgpu::Buffer,
    ) {
        for (blend, verts) in ranges {
            if verts.is_empty() {
                continue;
            }
            pass.set_pipeline(match blend {
                Blend::Alpha => &self.alpha_pipeline,
                Blend::Additive => &self.additive_pipeline,
            });
            pass.set_vertex_buffer(0, buffer.slice(..));
            pass.draw(verts.clone(), 0..1);
        }
    }

    /// Upload the frame and draw it
    pub fn render(&mut self, plan: &FramePlan, fog: &mut FogLayer) -> Result<(), wgpu::SurfaceError> {
        self.sync_fog(fog);

        // All colour batches share one buffer; remember each batch's range
        let mut ndc_vertices: Vec<Vertex> = Vec::with_capacity(plan.vertex_count());
        let mut ranges = Vec::with_capacity(plan.under_fog.len() + plan.over_fog.len());
        for batch in plan.under_fog.iter().chain(&plan.over_fog) {
            let start = ndc_vertices.len() as u32;
            ndc_vertices.extend(batch.vertices.iter().map(|v| {
                let (x, y) = self.px_to_ndc(v.position[0], v.position[1]);
                Vertex::new(x, y, v.color)
            }));
            ranges.push((batch.blend, start..ndc_vertices.len() as u32));
        }
        if ndc_vertices.is_empty() {
            ndc_vertices.push(Vertex::new(0.0, 0.0, [0.0; 4]));
        }
        let vertex_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("vertex_buffer"),
                contents: bytemuck::cast_slice(&ndc_vertices),
                usage: wgpu::BufferUsages::VERTEX,
            });

        let (w, h) = (self.view.x, self.view.y);
        let mut quads: Vec<QuadVertex> = self.quad(0.0, 0.0, w, h).to_vec();
        let show_background = plan.background_alpha > 0.0 && self.background.is_some();
        if let Some(bg) = self.background.as_ref().filter(|_| show_background) {
            let rect = cover_fit(
                glam::Vec2::new(bg.size.0 as f32, bg.size.1 as f32),
                glam::Vec2::new(w, h),
            );
            quads.extend(self.quad(rect.pos.x, rect.pos.y, rect.size.x, rect.size.y));
            bg.set_params(&self.queue, [1.0, 1.0, 1.0, plan.background_alpha]);
        }
        let quad_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("quad_buffer"),
                contents: bytemuck::cast_slice(&quads),
                usage: wgpu::BufferUsages::VERTEX,
            });

        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("render_encoder"),
            });

        {
            let [r, g, b, _] = colors::background();
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("render_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: r as f64,
                            g: g as f64,
                            b: b as f64,
                            a: 1.0,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            if let Some(bg) = self.background.as_ref().filter(|_| show_background) {
                render_pass.set_pipeline(&self.image_pipeline);
                render_pass.set_bind_group(0, &bg.bind_group, &[]);
                render_pass.set_vertex_buffer(0, quad_buffer.slice(..));
                render_pass.draw(6..12, 0..1);
            }

            let (under, over) = ranges.split_at(plan.under_fog.len());
            self.draw_batches(&mut render_pass, under, &vertex_buffer);

            render_pass.set_pipeline(&self.fog_pipeline);
            render_pass.set_bind_group(0, &self.fog.bind_group, &[]);
            render_pass.set_vertex_buffer(0, quad_buffer.slice(..));
            render_pass.draw(0..6, 0..1);

            self.draw_batches(&mut render_pass, over, &vertex_buffer);
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        Ok(())
    }
}
