//! raystudio editor window: eframe app, raster preview and path tracer display.

mod app;
mod camera;
pub mod export;
mod renderer;
mod settings;
mod viewport;

pub use settings::Settings;

use std::path::PathBuf;

use anyhow::Result;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Env var that turns on the chrome trace layer when set to "1".
pub const TRACE_ENV: &str = "RAYSTUDIO_TRACE";

const DEFAULT_FILTER: &str = "info,wgpu_core=warn,wgpu_hal=warn,naga=warn";
const VERBOSE_FILTER: &str = "debug,wgpu_core=warn,wgpu_hal=warn,naga=warn";

/// Startup options collected by the command line.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Scene file to open on the first frame.
    pub initial_scene: Option<PathBuf>,
    /// Overrides the saved scenes directory.
    pub scenes_dir: Option<PathBuf>,
    /// Write `trace.json` (same as `RAYSTUDIO_TRACE=1`).
    pub chrome_trace: bool,
    pub verbose: bool,
}

/// Open the editor window and block until it closes.
pub fn run(options: RunOptions) -> Result<()> {
    let trace_guard = init_tracing(&options);

    // Friendly panic handler for GPU errors
    std::panic::set_hook(Box::new(|info| {
        let msg = info
            .payload()
            .downcast_ref::<String>()
            .map(|s| s.as_str())
            .or_else(|| info.payload().downcast_ref::<&str>().copied())
            .unwrap_or("Unknown error");

        if msg.contains("wgpu") || msg.contains("Buffer") || msg.contains("shader") {
            eprintln!("\n[GPU Error] {}", msg);
            eprintln!("\nThe GPU rejected a command. Run with RUST_LOG=debug for details.");
        } else {
            eprintln!("\n[Error] {}", msg);
            if let Some(loc) = info.location() {
                eprintln!("  at {}:{}:{}", loc.file(), loc.line(), loc.column());
            }
        }
    }));

    let settings = Settings::load();
    tracing::info!(
        "raystudio {} (built {})",
        env!("CARGO_PKG_VERSION"),
        env!("RAYSTUDIO_BUILD_STAMP")
    );

    let native_options = eframe::NativeOptions {
        viewport: {
            let mut vp = egui::ViewportBuilder::default()
                .with_inner_size([settings.window_width, settings.window_height])
                .with_title("raystudio");
            if let (Some(x), Some(y)) = (settings.window_x, settings.window_y) {
                vp = vp.with_position([x, y]);
            }
            vp
        },
        renderer: eframe::Renderer::Wgpu,
        wgpu_options: egui_wgpu::WgpuConfiguration {
            wgpu_setup: egui_wgpu::WgpuSetup::CreateNew(egui_wgpu::WgpuSetupCreateNew {
                // The trace kernel needs compute and rgba32float storage images
                instance_descriptor: wgpu::InstanceDescriptor {
                    backends: wgpu::Backends::PRIMARY,
                    ..Default::default()
                },
                device_descriptor: std::sync::Arc::new(|adapter| {
                    wgpu::DeviceDescriptor {
                        label: Some("raystudio device"),
                        required_features: device_features(adapter.features()),
                        required_limits: wgpu::Limits {
                            max_texture_dimension_2d: 8192,
                            ..wgpu::Limits::default()
                        },
                        ..Default::default()
                    }
                }),
                ..Default::default()
            }),
            ..Default::default()
        },
        ..Default::default()
    };

    eframe::run_native(
        "raystudio",
        native_options,
        Box::new(move |cc| {
            Ok(Box::new(app::ViewerApp::new(
                cc,
                settings,
                options,
                trace_guard,
            )))
        }),
    )
    .map_err(|e| anyhow::anyhow!("Failed to run: {}", e))
}

/// Optional features worth requesting from an adapter offering `available`.
/// Only the wireframe preview uses one.
fn device_features(available: wgpu::Features) -> wgpu::Features {
    available & wgpu::Features::POLYGON_MODE_LINE
}

/// Console logging filtered by `RUST_LOG`, plus an optional chrome trace.
fn init_tracing(options: &RunOptions) -> Option<tracing_chrome::FlushGuard> {
    let default_filter = if options.verbose { VERBOSE_FILTER } else { DEFAULT_FILTER };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let chrome = options.chrome_trace || std::env::var(TRACE_ENV).ok().as_deref() == Some("1");
    let (chrome_layer, guard) = if chrome {
        let (layer, guard) = tracing_chrome::ChromeLayerBuilder::new()
            .file("trace.json")
            .build();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(chrome_layer)
        .try_init();
    if installed.is_err() {
        return None;
    }

    guard
}
