//! Compute pipeline for progressive path tracing.
//!
//! Owns the ping-pong accumulation images, the primitive and triangle
//! buffers, and the blit pipeline that shows the latest result.
//!
//! ## Usage
//! ```ignore
//! let mut pt = PathTraceCompute::new(&device, width, height, surface_format);
//! pt.upload_triangles(&device, &flat);
//! pt.update_primitives(&queue, &lists.to_gpu());
//! pt.observe_camera(pose);
//! pt.dispatch(&queue, &mut encoder, view, fov_y, max_bounces);
//! pt.blit(&mut encoder, &target_view);
//! ```
//!
//! The compute pass and the blit pass are recorded into the same encoder.
//! The pass boundary orders "dispatch writes image B" before "blit reads B".

use wgpu::util::DeviceExt;

use crate::editor::Invalidation;

use super::accumulation::{Accumulator, CameraPose};
use super::flatten::FlattenedTriangles;
use super::gpu_data::{GpuPrimitives, GpuTraceParams, GpuTriangle};

/// WGSL source embedded at compile time.
const TRACE_WGSL: &str = include_str!("trace.wgsl");
const BLIT_WGSL: &str = include_str!("blit.wgsl");

/// Workgroup size (must match @workgroup_size in WGSL).
const WG_SIZE: u32 = 8;

const ACCUM_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;

struct AccumImage {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

/// Path trace compute pipeline state.
pub struct PathTraceCompute {
    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    /// `bind_groups[i]` reads image `i` and writes image `1 - i`.
    bind_groups: Option<[wgpu::BindGroup; 2]>,

    params_buffer: wgpu::Buffer,
    primitives_buffer: wgpu::Buffer,
    triangles_buffer: wgpu::Buffer,
    /// Triangles the buffer was sized for.
    triangle_capacity: usize,

    images: [AccumImage; 2],
    width: u32,
    height: u32,

    accumulator: Accumulator,

    blit_pipeline: wgpu::RenderPipeline,
    blit_bind_group_layout: wgpu::BindGroupLayout,
    /// `blit_bind_groups[i]` displays image `i`.
    blit_bind_groups: Option<[wgpu::BindGroup; 2]>,
}

impl PathTraceCompute {
    /// Create the pipelines and size-dependent resources.
    pub fn new(device: &wgpu::Device, width: u32, height: u32, surface_format: wgpu::TextureFormat) -> Self {
        let width = width.max(1);
        let height = height.max(1);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("pt_trace_shader"),
            source: wgpu::ShaderSource::Wgsl(TRACE_WGSL.into()),
        });

        let uniform_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("pt_bind_group_layout"),
            entries: &[
                // @binding(0) Params uniform
                uniform_entry(0),
                // @binding(1) Primitive lists uniform
                uniform_entry(1),
                // @binding(2) Triangles storage
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: true },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                // @binding(3) Previous accumulation (read)
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        sample_type: wgpu::TextureSampleType::Float { filterable: false },
                    },
                    count: None,
                },
                // @binding(4) New accumulation (write)
                wgpu::BindGroupLayoutEntry {
                    binding: 4,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::StorageTexture {
                        access: wgpu::StorageTextureAccess::WriteOnly,
                        format: ACCUM_FORMAT,
                        view_dimension: wgpu::TextureViewDimension::D2,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("pt_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("pt_compute_pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        let params_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("pt_params_buffer"),
            size: std::mem::size_of::<GpuTraceParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let primitives_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("pt_primitives_buffer"),
            size: std::mem::size_of::<GpuPrimitives>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let (triangles_buffer, triangle_capacity) = Self::create_triangle_buffer(device, &[]);

        // Blit pipeline (accumulation image -> viewport target)
        let blit_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("pt_blit_shader"),
            source: wgpu::ShaderSource::Wgsl(BLIT_WGSL.into()),
        });

        let blit_bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("pt_blit_bgl"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    multisampled: false,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    sample_type: wgpu::TextureSampleType::Float { filterable: false },
                },
                count: None,
            }],
        });

        let blit_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("pt_blit_pl"),
            bind_group_layouts: &[&blit_bind_group_layout],
            push_constant_ranges: &[],
        });

        let blit_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("pt_blit_pipeline"),
            layout: Some(&blit_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &blit_shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[],
            },
            fragment: Some(wgpu::FragmentState {
                module: &blit_shader,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let images = [
            Self::create_image(device, width, height, "pt_accum_a"),
            Self::create_image(device, width, height, "pt_accum_b"),
        ];

        let mut pt = Self {
            pipeline,
            bind_group_layout,
            bind_groups: None,
            params_buffer,
            primitives_buffer,
            triangles_buffer,
            triangle_capacity,
            images,
            width,
            height,
            accumulator: Accumulator::new(),
            blit_pipeline,
            blit_bind_group_layout,
            blit_bind_groups: None,
        };
        pt.rebuild_bind_groups(device);
        pt
    }

    fn create_image(device: &wgpu::Device, width: u32, height: u32, label: &str) -> AccumImage {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: ACCUM_FORMAT,
            usage: wgpu::TextureUsages::STORAGE_BINDING
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        AccumImage { texture, view }
    }

    /// Allocate a triangle buffer holding `triangles` (at least one slot).
    fn create_triangle_buffer(device: &wgpu::Device, triangles: &[GpuTriangle]) -> (wgpu::Buffer, usize) {
        // wgpu requires non-empty bindings
        let placeholder = [GpuTriangle::default()];
        let contents = if triangles.is_empty() { &placeholder[..] } else { triangles };
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("pt_triangles"),
            contents: bytemuck::cast_slice(contents),
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
        });
        (buffer, contents.len())
    }

    /// Rebuild bind groups after a buffer or image change.
    fn rebuild_bind_groups(&mut self, device: &wgpu::Device) {
        let compute = |read: usize| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("pt_bind_group"),
                layout: &self.bind_group_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: self.params_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: self.primitives_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: self.triangles_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: wgpu::BindingResource::TextureView(&self.images[read].view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 4,
                        resource: wgpu::BindingResource::TextureView(&self.images[1 - read].view),
                    },
                ],
            })
        };
        let bind_groups = [compute(0), compute(1)];

        let blit = |index: usize| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("pt_blit_bg"),
                layout: &self.blit_bind_group_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&self.images[index].view),
                }],
            })
        };
        let blit_bind_groups = [blit(0), blit(1)];

        self.bind_groups = Some(bind_groups);
        self.blit_bind_groups = Some(blit_bind_groups);
    }

    /// Recreate the images if dimensions changed. Resets accumulation.
    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        let (width, height) = (width.max(1), height.max(1));
        if self.width == width && self.height == height {
            return;
        }
        tracing::debug!("path tracer resize {}x{} -> {}x{}", self.width, self.height, width, height);
        self.width = width;
        self.height = height;
        self.images = [
            Self::create_image(device, width, height, "pt_accum_a"),
            Self::create_image(device, width, height, "pt_accum_b"),
        ];
        self.accumulator.reset();
        self.rebuild_bind_groups(device);
    }

    /// Reallocate the triangle buffer for `flat`.
    #[tracing::instrument(skip_all, fields(triangles = flat.triangle_count()))]
    pub fn upload_triangles(&mut self, device: &wgpu::Device, flat: &FlattenedTriangles) {
        let (buffer, capacity) = Self::create_triangle_buffer(device, &flat.triangles);
        self.triangles_buffer = buffer;
        self.triangle_capacity = capacity;
        self.rebuild_bind_groups(device);
    }

    /// Overwrite the triangle buffer in place.
    ///
    /// Falls back to [`Self::upload_triangles`] when `flat` no longer fits.
    pub fn write_triangles(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, flat: &FlattenedTriangles) {
        if flat.triangle_count() > self.triangle_capacity {
            tracing::debug!(
                "triangle buffer too small ({} > {}), reallocating",
                flat.triangle_count(),
                self.triangle_capacity
            );
            self.upload_triangles(device, flat);
            return;
        }
        if !flat.is_empty() {
            queue.write_buffer(&self.triangles_buffer, 0, flat.triangles_bytes());
        }
    }

    /// Upload this frame's primitive lists.
    pub fn update_primitives(&mut self, queue: &wgpu::Queue, primitives: &GpuPrimitives) {
        queue.write_buffer(&self.primitives_buffer, 0, bytemuck::bytes_of(primitives));
    }

    /// Track the camera; resets accumulation when it moved.
    pub fn observe_camera(&mut self, pose: CameraPose) -> bool {
        self.accumulator.observe_camera(pose)
    }

    /// Drop the accumulated history for a scene invalidation.
    pub fn apply_invalidation(&mut self, invalidation: Invalidation) -> bool {
        self.accumulator.apply(invalidation)
    }

    /// Accumulated samples in the latest image.
    pub fn sample_count(&self) -> u32 {
        self.accumulator.sample_count()
    }

    /// Record one trace pass. Returns false if bind groups are missing.
    pub fn dispatch(
        &mut self,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        view: glam::Mat4,
        fov_y: f32,
        max_bounces: u32,
    ) -> bool {
        let Some(bind_groups) = &self.bind_groups else {
            return false;
        };

        let slot = self.accumulator.begin_dispatch();
        let params = GpuTraceParams::new(
            view,
            fov_y,
            (self.width, self.height),
            slot.sample_index,
            max_bounces,
        );
        queue.write_buffer(&self.params_buffer, 0, bytemuck::bytes_of(&params));

        let wg_x = self.width.div_ceil(WG_SIZE);
        let wg_y = self.height.div_ceil(WG_SIZE);

        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("pt_compute_pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &bind_groups[slot.read], &[]);
            pass.dispatch_workgroups(wg_x, wg_y, 1);
        }

        self.accumulator.finish_dispatch();
        true
    }

    /// Blit the latest accumulated image to a render target.
    /// Call after dispatch() to display the result.
    pub fn blit(&self, encoder: &mut wgpu::CommandEncoder, target: &wgpu::TextureView) {
        let Some(bind_groups) = &self.blit_bind_groups else {
            return;
        };

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("pt_blit_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        pass.set_pipeline(&self.blit_pipeline);
        pass.set_bind_group(0, &bind_groups[self.accumulator.latest()], &[]);
        pass.draw(0..3, 0..1); // fullscreen triangle
    }

    /// Texture holding the latest accumulated result.
    pub fn latest_texture(&self) -> &wgpu::Texture {
        &self.images[self.accumulator.latest()].texture
    }

    /// Current image dimensions.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}
