//! Viewport renderer: raster preview and path tracer display.
//!
//! Both modes share the scene synchronisation step. Invalidations raised by
//! the editor are applied every frame, whichever mode is showing, so the path
//! tracer is always current when it is switched on.

mod pipelines;
mod resources;
mod shaders;

use std::sync::Arc;

use glam::{Mat4, Vec3};

use crate::editor::{Invalidation, SceneEditor};
use crate::pathtracer::{flatten, FlattenedTriangles, PathTraceCompute, PrimitiveLists};
use crate::scene::{InstanceHandle, ObjectManager};

use self::pipelines::{create_pipelines, Pipelines};
use self::resources::{aligned_stride, CameraUniform, DepthTexture, GpuMesh, ModelUniform};
use super::camera::OrbitCamera;

/// Single white point light of the raster preview.
const LIGHT_POSITION: Vec3 = Vec3::new(0.0, 2.0, 2.0);

const DEFAULT_BACKGROUND_COLOR: [f32; 4] = [0.1, 0.1, 0.12, 1.0];

/// Instances the model buffer starts with.
const INITIAL_MODEL_SLOTS: usize = 64;

/// Main renderer state
pub struct Renderer {
    pub device: Arc<wgpu::Device>,
    pub queue: Arc<wgpu::Queue>,
    pipelines: Pipelines,

    // Uniforms
    camera_buffer: wgpu::Buffer,
    camera_bind_group: wgpu::BindGroup,
    model_layout: wgpu::BindGroupLayout,
    model_buffer: wgpu::Buffer,
    model_bind_group: wgpu::BindGroup,
    model_stride: u64,
    model_slots: usize,

    /// One entry per registry template, indexed by `MeshHandle::index`.
    meshes: Vec<GpuMesh>,
    depth_texture: Option<DepthTexture>,

    // Path tracer
    path_tracer: PathTraceCompute,
    /// Triangles currently in the path tracer's buffer.
    flat: FlattenedTriangles,

    // Settings
    pub show_wireframe: bool,
    pub use_path_tracing: bool,
    pub background_color: [f32; 4],
}

impl Renderer {
    pub fn new(
        device: Arc<wgpu::Device>,
        queue: Arc<wgpu::Queue>,
        format: wgpu::TextureFormat,
    ) -> Self {
        let camera_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("camera_layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let model_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("model_layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: wgpu::BufferSize::new(std::mem::size_of::<ModelUniform>() as u64),
                },
                count: None,
            }],
        });

        let camera_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("camera_buffer"),
            size: std::mem::size_of::<CameraUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let camera_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("camera_bind_group"),
            layout: &camera_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: camera_buffer.as_entire_binding(),
            }],
        });

        let model_stride = aligned_stride(
            std::mem::size_of::<ModelUniform>(),
            device.limits().min_uniform_buffer_offset_alignment,
        );
        let (model_buffer, model_bind_group) =
            Self::create_model_buffer(&device, &model_layout, model_stride, INITIAL_MODEL_SLOTS);

        let pipelines = create_pipelines(&device, &[&camera_layout, &model_layout], format);
        let path_tracer = PathTraceCompute::new(&device, 1, 1, format);

        Self {
            device,
            queue,
            pipelines,
            camera_buffer,
            camera_bind_group,
            model_layout,
            model_buffer,
            model_bind_group,
            model_stride,
            model_slots: INITIAL_MODEL_SLOTS,
            meshes: Vec::new(),
            depth_texture: None,
            path_tracer,
            flat: FlattenedTriangles::default(),
            show_wireframe: false,
            use_path_tracing: false,
            background_color: DEFAULT_BACKGROUND_COLOR,
        }
    }

    fn create_model_buffer(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        stride: u64,
        slots: usize,
    ) -> (wgpu::Buffer, wgpu::BindGroup) {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("model_buffer"),
            size: stride * slots as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("model_bind_group"),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &buffer,
                    offset: 0,
                    size: wgpu::BufferSize::new(std::mem::size_of::<ModelUniform>() as u64),
                }),
            }],
        });
        (buffer, bind_group)
    }

    /// Path tracer owning the accumulation images.
    pub fn path_tracer(&self) -> &PathTraceCompute {
        &self.path_tracer
    }

    /// Samples in the displayed path traced image.
    pub fn sample_count(&self) -> u32 {
        self.path_tracer.sample_count()
    }

    /// Triangles the path tracer currently holds.
    pub fn triangle_count(&self) -> usize {
        self.flat.triangle_count()
    }

    /// Apply the editor's pending invalidation. Call once per frame.
    pub fn sync_scene(&mut self, editor: &mut SceneEditor) {
        let invalidation = editor.take_invalidation();
        if invalidation == Invalidation::Clean {
            return;
        }
        let _span = tracing::info_span!("sync_scene", ?invalidation).entered();
        let scene = editor.scene();

        match invalidation {
            Invalidation::Rebuild => {
                self.flat = flatten(scene);
                self.path_tracer.upload_triangles(&self.device, &self.flat);
                tracing::debug!(
                    "rebuilt {} triangles for {} instances",
                    self.flat.triangle_count(),
                    scene.len()
                );
            }
            Invalidation::Retransform => {
                let moved = flatten(scene);
                if moved.retransform_compatible(&self.flat) {
                    self.path_tracer.write_triangles(&self.device, &self.queue, &moved);
                } else {
                    tracing::debug!("triangle layout changed, reallocating");
                    self.path_tracer.upload_triangles(&self.device, &moved);
                }
                self.flat = moved;
            }
            Invalidation::Reset | Invalidation::Clean => {}
        }
        self.path_tracer.apply_invalidation(invalidation);
    }

    /// Template buffers follow the registry; it only grows.
    fn ensure_meshes(&mut self, scene: &ObjectManager) {
        let registry = scene.registry();
        if self.meshes.len() == registry.len() {
            return;
        }
        self.meshes = registry
            .iter()
            .map(|(_, template)| GpuMesh::from_template(&self.device, template))
            .collect();
    }

    fn ensure_model_slots(&mut self, count: usize) {
        if count <= self.model_slots {
            return;
        }
        let slots = count.next_power_of_two();
        let (buffer, bind_group) =
            Self::create_model_buffer(&self.device, &self.model_layout, self.model_stride, slots);
        self.model_buffer = buffer;
        self.model_bind_group = bind_group;
        self.model_slots = slots;
    }

    /// Ensure depth buffer matches viewport size
    fn ensure_depth_texture(&mut self, width: u32, height: u32) {
        let needs_recreate = match &self.depth_texture {
            Some(dt) => dt.size != (width, height),
            None => true,
        };
        if needs_recreate && width > 0 && height > 0 {
            self.depth_texture = Some(DepthTexture::new(&self.device, width, height));
        }
    }

    fn write_camera(&self, camera: &OrbitCamera, aspect: f32) {
        let uniform = CameraUniform {
            view_proj: camera.view_proj_matrix(aspect).to_cols_array_2d(),
            position: camera.position().extend(1.0).to_array(),
            light_position: LIGHT_POSITION.extend(1.0).to_array(),
        };
        self.queue.write_buffer(&self.camera_buffer, 0, bytemuck::bytes_of(&uniform));
    }

    fn write_models(&mut self, scene: &ObjectManager) {
        self.ensure_model_slots(scene.len());
        let stride = self.model_stride as usize;
        let mut bytes = vec![0u8; stride * scene.len()];
        for (i, inst) in scene.instances().iter().enumerate() {
            let uniform = ModelUniform {
                model: inst.model().to_cols_array_2d(),
                normal_matrix: Mat4::from_mat3(inst.normal_matrix()).to_cols_array_2d(),
                color: inst.color().extend(1.0).to_array(),
            };
            let offset = i * stride;
            bytes[offset..offset + std::mem::size_of::<ModelUniform>()]
                .copy_from_slice(bytemuck::bytes_of(&uniform));
        }
        if !bytes.is_empty() {
            self.queue.write_buffer(&self.model_buffer, 0, &bytes);
        }
    }

    /// Draw one frame into `view`.
    pub fn render(
        &mut self,
        view: &wgpu::TextureView,
        width: u32,
        height: u32,
        camera: &OrbitCamera,
        scene: &ObjectManager,
        max_bounces: u32,
    ) {
        if self.use_path_tracing {
            self.render_path_traced(view, width, height, camera, scene, max_bounces);
        } else {
            self.render_raster(view, width, height, camera, scene);
        }
    }

    fn render_path_traced(
        &mut self,
        view: &wgpu::TextureView,
        width: u32,
        height: u32,
        camera: &OrbitCamera,
        scene: &ObjectManager,
        max_bounces: u32,
    ) {
        let _span = tracing::info_span!("path_trace_frame").entered();
        let pt = &mut self.path_tracer;
        pt.resize(&self.device, width, height);
        pt.observe_camera(camera.pose());

        // Materials and analytic primitives go up every frame.
        match PrimitiveLists::build(scene, &self.flat) {
            Ok(lists) => pt.update_primitives(&self.queue, &lists.to_gpu()),
            Err(e) => {
                tracing::warn!("primitive upload skipped: {}", e);
                return;
            }
        }

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("pt_encoder"),
        });
        pt.dispatch(
            &self.queue,
            &mut encoder,
            camera.view_matrix(),
            camera.fov.to_radians(),
            max_bounces,
        );
        pt.blit(&mut encoder, view);
        self.queue.submit(std::iter::once(encoder.finish()));
    }

    fn render_raster(
        &mut self,
        view: &wgpu::TextureView,
        width: u32,
        height: u32,
        camera: &OrbitCamera,
        scene: &ObjectManager,
    ) {
        let _span = tracing::info_span!("raster_frame").entered();
        self.ensure_depth_texture(width, height);
        self.ensure_meshes(scene);
        self.write_camera(camera, width as f32 / height.max(1) as f32);
        self.write_models(scene);

        let Some(depth) = &self.depth_texture else {
            return;
        };

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("render_encoder"),
        });
        {
            let [r, g, b, a] = self.background_color;
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("raster_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: r as f64,
                            g: g as f64,
                            b: b as f64,
                            a: a as f64,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &depth.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            let pipeline = match &self.pipelines.wireframe_pipeline {
                Some(wireframe) if self.show_wireframe => wireframe,
                _ => &self.pipelines.fill_pipeline,
            };
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, &self.camera_bind_group, &[]);

            for i in 0..scene.len() {
                let Ok(mesh) = scene.mesh_of(InstanceHandle::new(i)) else {
                    continue;
                };
                let Some(gpu) = self.meshes.get(mesh.index()) else {
                    continue;
                };
                let offset = (i as u64 * self.model_stride) as u32;
                pass.set_bind_group(1, &self.model_bind_group, &[offset]);
                pass.set_vertex_buffer(0, gpu.vertex_buffer.slice(..));
                pass.set_index_buffer(gpu.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                pass.draw_indexed(0..gpu.index_count, 0, 0..1);
            }
        }
        self.queue.submit(std::iter::once(encoder.finish()));
    }
}
