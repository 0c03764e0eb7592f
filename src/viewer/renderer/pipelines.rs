//! Raster preview pipelines (filled and wireframe).

use super::resources::{Vertex, DEPTH_FORMAT};
use super::shaders::RASTER_SHADER;

pub struct Pipelines {
    pub fill_pipeline: wgpu::RenderPipeline,
    /// Only when the device has `POLYGON_MODE_LINE`.
    pub wireframe_pipeline: Option<wgpu::RenderPipeline>,
}

#[derive(Clone)]
struct PipelineConfig<'a> {
    label: &'a str,
    format: wgpu::TextureFormat,
    cull_mode: Option<wgpu::Face>,
    wireframe: bool,
}

pub fn create_pipelines(
    device: &wgpu::Device,
    layouts: &[&wgpu::BindGroupLayout],
    format: wgpu::TextureFormat,
) -> Pipelines {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("raster_shader"),
        source: wgpu::ShaderSource::Wgsl(RASTER_SHADER.into()),
    });
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("raster_pipeline_layout"),
        bind_group_layouts: layouts,
        push_constant_ranges: &[],
    });

    let config = PipelineConfig {
        label: "fill_pipeline",
        format,
        cull_mode: Some(wgpu::Face::Back),
        wireframe: false,
    };
    let wireframe_config = PipelineConfig {
        label: "wireframe_pipeline",
        cull_mode: None,
        wireframe: true,
        ..config.clone()
    };

    let wireframe_pipeline = if device.features().contains(wgpu::Features::POLYGON_MODE_LINE) {
        Some(create_pipeline(device, &layout, &shader, &wireframe_config))
    } else {
        tracing::warn!("POLYGON_MODE_LINE not supported, wireframe preview disabled");
        None
    };

    Pipelines {
        fill_pipeline: create_pipeline(device, &layout, &shader, &config),
        wireframe_pipeline,
    }
}

fn create_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    config: &PipelineConfig<'_>,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(config.label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some("vs_main"),
            compilation_options: Default::default(),
            buffers: &[Vertex::LAYOUT],
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some("fs_main"),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format: config.format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: config.cull_mode,
            polygon_mode: if config.wireframe {
                wgpu::PolygonMode::Line
            } else {
                wgpu::PolygonMode::Fill
            },
            ..Default::default()
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}
