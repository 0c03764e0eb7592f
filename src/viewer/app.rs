//! Main viewer application

use std::path::{Path, PathBuf};

use egui::{CentralPanel, Color32, RichText, SidePanel, TopBottomPanel};

use super::export;
use super::settings::Settings;
use super::viewport::Viewport;
use super::RunOptions;
use crate::editor::{SceneEditor, MAX_BOUNCES, MIN_BOUNCES};
use crate::scene::{InstanceHandle, ObjectManager};
use crate::util::Vec3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Page {
    EditScene,
    EditRender,
}

/// Application context: everything the frame loop touches.
pub struct ViewerApp {
    viewport: Viewport,
    settings: Settings,
    editor: SceneEditor,
    page: Page,
    selected: Option<InstanceHandle>,
    /// Template picked in the "add" combo.
    add_template: String,
    /// File name field of the save/load row.
    scene_name: String,
    pending_scene: Option<PathBuf>,
    status_message: String,
    _trace_guard: Option<tracing_chrome::FlushGuard>,
}

impl ViewerApp {
    pub fn new(
        _cc: &eframe::CreationContext<'_>,
        settings: Settings,
        options: RunOptions,
        trace_guard: Option<tracing_chrome::FlushGuard>,
    ) -> Self {
        let scenes_dir = options
            .scenes_dir
            .clone()
            .unwrap_or_else(|| settings.scenes_dir.clone());
        let mut editor = SceneEditor::new(ObjectManager::default(), scenes_dir);
        editor.set_max_bounces(settings.max_bounces);

        // CLI file first, then the last scene of the previous session
        let pending_scene = options
            .initial_scene
            .map(|p| if p.exists() { std::path::absolute(&p).unwrap_or(p) } else { p })
            .or_else(|| settings.last_scene.as_ref().map(PathBuf::from));

        let add_template = editor
            .template_names()
            .first()
            .map(|s| s.to_string())
            .unwrap_or_default();

        Self {
            viewport: Viewport::new(),
            settings,
            editor,
            page: Page::EditScene,
            selected: None,
            add_template,
            scene_name: "scene.txt".into(),
            pending_scene,
            status_message: "Ready".into(),
            _trace_guard: trace_guard,
        }
    }

    fn menu_bar(&mut self, ctx: &egui::Context, ui: &mut egui::Ui) {
        egui::MenuBar::new().ui(ui, |ui| {
            ui.menu_button("File", |ui| {
                if ui.button("Open Scene...").clicked() {
                    self.open_scene_dialog();
                    ui.close();
                }
                if ui.button("Save Scene As...").clicked() {
                    self.save_scene_dialog();
                    ui.close();
                }
                if ui.button("Save Render").clicked() {
                    self.save_screenshot();
                    ui.close();
                }
                ui.separator();
                if ui.button("Clear Scene").clicked() {
                    self.editor.clear();
                    self.selected = None;
                    self.status_message = "Scene cleared".into();
                    ui.close();
                }
                ui.separator();
                if ui.button("Exit").clicked() {
                    ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                }
            });

            ui.menu_button("View", |ui| {
                if ui.checkbox(&mut self.settings.show_wireframe, "Wireframe (F1)").changed() {
                    self.apply_render_settings();
                }
                if ui.checkbox(&mut self.settings.path_tracing, "Path Tracing (Space)").changed() {
                    self.apply_render_settings();
                }
                ui.separator();
                if ui.button("Reset Camera (H)").clicked() {
                    self.viewport.camera.reset();
                    ui.close();
                }
                if ui.button("Fit Scene (F)").clicked() {
                    self.fit_scene();
                    ui.close();
                }
            });

            ui.menu_button("Help", |ui| {
                if ui.button("About").clicked() {
                    self.status_message = format!(
                        "raystudio {} (built {})",
                        env!("CARGO_PKG_VERSION"),
                        env!("RAYSTUDIO_BUILD_STAMP")
                    );
                    ui.close();
                }
            });
        });
    }

    fn side_panel(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.selectable_value(&mut self.page, Page::EditScene, "Edit scene");
            ui.selectable_value(&mut self.page, Page::EditRender, "Edit render");
        });
        ui.separator();

        egui::ScrollArea::vertical().show(ui, |ui| match self.page {
            Page::EditScene => self.scene_page(ui),
            Page::EditRender => self.render_page(ui),
        });
    }

    fn scene_page(&mut self, ui: &mut egui::Ui) {
        // Add
        ui.horizontal(|ui| {
            let names: Vec<String> = self.editor.template_names().iter().map(|s| s.to_string()).collect();
            egui::ComboBox::from_id_salt("add_template")
                .selected_text(&self.add_template)
                .show_ui(ui, |ui| {
                    for name in names {
                        ui.selectable_value(&mut self.add_template, name.clone(), name);
                    }
                });
            if ui.button("Add").clicked() {
                match self.editor.add_instance(&self.add_template) {
                    Some(handle) => {
                        self.selected = Some(handle);
                        self.status_message = format!("Added {}", self.add_template);
                    }
                    None => {
                        self.status_message = format!("Could not add {}", self.add_template);
                    }
                }
            }
        });

        // Select
        self.validate_selection();
        let names = self.editor.instance_names().to_vec();
        let current = self
            .selected
            .and_then(|h| names.get(h.index()).cloned())
            .unwrap_or_else(|| "None".into());
        egui::ComboBox::from_id_salt("select_instance")
            .selected_text(current)
            .show_ui(ui, |ui| {
                for (i, name) in names.iter().enumerate() {
                    ui.selectable_value(&mut self.selected, Some(InstanceHandle::new(i)), name);
                }
            });

        if let Some(handle) = self.selected {
            ui.separator();
            self.instance_editor(ui, handle);
        }

        ui.separator();
        self.file_row(ui);
    }

    fn instance_editor(&mut self, ui: &mut egui::Ui, handle: InstanceHandle) {
        let Some(inst) = self.editor.instance(handle).cloned() else {
            return;
        };

        ui.label(RichText::new("Material").strong());
        let mut color = inst.color().to_array();
        ui.horizontal(|ui| {
            if ui.color_edit_button_rgb(&mut color).changed() {
                self.editor.set_color(handle, Vec3::from_array(color));
            }
            ui.label("Color");
        });
        let mut emissive = inst.emissive_color().to_array();
        ui.horizontal(|ui| {
            if ui.color_edit_button_rgb(&mut emissive).changed() {
                self.editor.set_emissive_color(handle, Vec3::from_array(emissive));
            }
            ui.label("Emiss. Color");
        });
        let mut strength = inst.emission_strength();
        if ui
            .add(egui::DragValue::new(&mut strength).speed(0.05).range(0.0..=100.0).prefix("Emission "))
            .changed()
        {
            self.editor.set_emission_strength(handle, strength);
        }
        let mut smoothness = inst.smoothness();
        if ui.add(egui::Slider::new(&mut smoothness, 0.0..=1.0).text("Smoothness")).changed() {
            self.editor.set_smoothness(handle, smoothness);
        }
        let mut reflectivity = inst.reflectivity();
        if ui.add(egui::Slider::new(&mut reflectivity, 0.0..=1.0).text("Reflectivity")).changed() {
            self.editor.set_reflectivity(handle, reflectivity);
        }

        ui.separator();
        ui.label(RichText::new("Position").strong());
        let mut position = inst.position();
        if vec3_drag(ui, "pos", &mut position, 0.01, None) {
            self.editor.set_position(handle, position);
        }

        ui.label(RichText::new("Rotation").strong());
        let mut rotation = inst.rotation();
        if vec3_drag(ui, "rot", &mut rotation, 0.2, Some(-360.0..=360.0)) {
            self.editor.set_rotation(handle, rotation);
        }

        ui.horizontal(|ui| {
            ui.label(RichText::new("Scale").strong());
            ui.checkbox(&mut self.settings.uniform_scale, "Uniform");
        });
        let mut scale = inst.scale();
        if self.settings.uniform_scale {
            let mut s = scale.x;
            if ui.add(egui::DragValue::new(&mut s).speed(0.01).prefix("Scale ")).changed() {
                self.editor.set_uniform_scale(handle, s);
            }
        } else if vec3_drag(ui, "scale", &mut scale, 0.01, None) {
            self.editor.set_scale(handle, scale);
        }

        ui.separator();
        if ui.button("Delete").clicked() {
            if self.editor.remove_instance(handle) {
                self.status_message = "Instance deleted".into();
            }
            self.validate_selection();
        }
    }

    fn file_row(&mut self, ui: &mut egui::Ui) {
        ui.label(RichText::new("Scene file").strong());
        ui.horizontal(|ui| {
            ui.label("File name");
            ui.text_edit_singleline(&mut self.scene_name);
        });
        ui.horizontal(|ui| {
            if ui.button("Save").clicked() {
                let name = self.scene_name.clone();
                self.save_scene(Path::new(&name));
            }
            if ui.button("Load").clicked() {
                let name = self.scene_name.clone();
                self.load_scene(PathBuf::from(name));
            }
            if self.editor.unsaved_changes() {
                ui.label(RichText::new("Not saved").color(Color32::RED));
            }
        });
        ui.label(
            RichText::new(format!("in {}", self.editor.scenes_dir().display()))
                .small()
                .weak(),
        );
    }

    fn render_page(&mut self, ui: &mut egui::Ui) {
        let mut bounces = self.editor.max_bounces();
        if ui
            .add(
                egui::DragValue::new(&mut bounces)
                    .speed(0.1)
                    .range(MIN_BOUNCES..=MAX_BOUNCES)
                    .prefix("Max bounces "),
            )
            .changed()
        {
            self.editor.set_max_bounces(bounces);
            self.settings.max_bounces = self.editor.max_bounces();
        }

        if ui.checkbox(&mut self.settings.path_tracing, "Path tracing").changed() {
            self.apply_render_settings();
        }
        if ui.checkbox(&mut self.settings.show_wireframe, "Wireframe preview").changed() {
            self.apply_render_settings();
        }

        ui.separator();
        let samples = self.viewport.renderer.as_ref().map_or(0, |r| r.sample_count());
        ui.label(format!("Samples: {}", samples));
        if ui.button("Save render").clicked() {
            self.save_screenshot();
        }

        ui.separator();
        ui.label(RichText::new("Camera").strong());
        let pos = self.viewport.camera.position();
        ui.label(format!("Position: ({:.2}, {:.2}, {:.2})", pos.x, pos.y, pos.z));
        ui.label(format!("Distance: {:.2}", self.viewport.camera.distance()));
    }

    fn status_bar(&self, ui: &mut egui::Ui) {
        let (samples, triangles) = self
            .viewport
            .renderer
            .as_ref()
            .map_or((0, 0), |r| (r.sample_count(), r.triangle_count()));
        ui.horizontal(|ui| {
            ui.label(&self.status_message);
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                ui.label(format!("FPS: {:.0}", ui.ctx().input(|i| 1.0 / i.stable_dt)));
                ui.separator();
                ui.label(format!("Triangles: {}", triangles));
                ui.separator();
                ui.label(format!("Instances: {}", self.editor.len()));
                ui.separator();
                ui.label(format!("Samples: {}", samples));
            });
        });
    }

    /// Drop a selection that no longer points at an instance.
    fn validate_selection(&mut self) {
        let len = self.editor.len();
        self.selected = match self.selected {
            _ if len == 0 => None,
            Some(h) if h.index() >= len => Some(InstanceHandle::new(len - 1)),
            other => other,
        };
    }

    fn apply_render_settings(&mut self) {
        if let Some(renderer) = &mut self.viewport.renderer {
            renderer.show_wireframe = self.settings.show_wireframe;
            renderer.use_path_tracing = self.settings.path_tracing;
            renderer.background_color = self.settings.background_color;
        }
        self.settings.save();
    }

    fn fit_scene(&mut self) {
        let bounds = self.editor.scene().bounds();
        if bounds.is_empty() {
            self.viewport.camera.reset();
            self.status_message = "Empty scene".into();
        } else {
            self.viewport.camera.focus(bounds.center(), bounds.radius().max(0.1));
            self.status_message = format!("Fit to scene (radius: {:.2})", bounds.radius());
        }
    }

    fn open_scene_dialog(&mut self) {
        if let Some(path) = rfd::FileDialog::new()
            .set_directory(self.editor.scenes_dir())
            .pick_file()
        {
            self.load_scene(path);
        }
    }

    fn save_scene_dialog(&mut self) {
        if let Some(path) = rfd::FileDialog::new()
            .set_directory(self.editor.scenes_dir())
            .set_file_name(&self.scene_name)
            .save_file()
        {
            self.save_scene(&path);
        }
    }

    fn save_scene(&mut self, name: &Path) {
        if self.editor.save(name) {
            self.remember_scene(name);
            self.status_message = format!("Saved {}", self.editor.scene_path(name).display());
        } else {
            self.status_message = format!("Could not save {}", name.display());
        }
    }

    fn load_scene(&mut self, name: PathBuf) {
        match self.editor.load(&name) {
            Some(report) => {
                self.remember_scene(&name);
                self.selected = (!self.editor.is_empty()).then(|| InstanceHandle::new(0));
                self.status_message = if report.skipped > 0 {
                    format!("Loaded {} instances ({} skipped)", report.loaded, report.skipped)
                } else {
                    format!("Loaded {} instances", report.loaded)
                };
            }
            None => {
                self.status_message = format!("Could not load {}", name.display());
            }
        }
    }

    fn remember_scene(&mut self, name: &Path) {
        if let Some(file) = name.file_name() {
            self.scene_name = file.to_string_lossy().into_owned();
        }
        self.settings.last_scene = Some(name.to_string_lossy().into_owned());
        self.settings.save();
    }

    fn save_screenshot(&mut self) {
        let Some(renderer) = &self.viewport.renderer else {
            self.status_message = "Renderer not initialized".into();
            return;
        };
        if !renderer.use_path_tracing || renderer.sample_count() == 0 {
            self.status_message = "Switch to path tracing to save a render".into();
            return;
        }
        let path = export::next_screenshot_path(&self.settings.output_dir);
        self.status_message = match export::save_screenshot(
            &renderer.device,
            &renderer.queue,
            renderer.path_tracer(),
            &path,
        ) {
            Ok(()) => format!("Saved {}", path.display()),
            Err(e) => {
                tracing::error!("screenshot failed: {:#}", e);
                format!("Screenshot failed: {}", e)
            }
        };
    }

    fn handle_keys(&mut self, ctx: &egui::Context) {
        if ctx.wants_keyboard_input() {
            return;
        }
        let pressed = |key| ctx.input(|i| i.key_pressed(key));

        if pressed(egui::Key::Space) {
            self.settings.path_tracing = !self.settings.path_tracing;
            self.apply_render_settings();
        }
        if pressed(egui::Key::F1) {
            self.settings.show_wireframe = !self.settings.show_wireframe;
            self.apply_render_settings();
        }
        if pressed(egui::Key::P) {
            self.save_screenshot();
        }
        if pressed(egui::Key::H) {
            self.viewport.camera.reset();
            self.status_message = "Camera reset".into();
        }
        if pressed(egui::Key::F) {
            self.fit_scene();
        }
    }
}

/// Three labelled drag values. Returns true when any changed.
fn vec3_drag(
    ui: &mut egui::Ui,
    id: &str,
    value: &mut Vec3,
    speed: f64,
    range: Option<std::ops::RangeInclusive<f32>>,
) -> bool {
    let mut changed = false;
    ui.push_id(id, |ui| {
        ui.horizontal(|ui| {
            for (label, c) in ["X ", "Y ", "Z "].into_iter().zip(value.as_mut().iter_mut()) {
                let mut drag = egui::DragValue::new(c).speed(speed).prefix(label).max_decimals(2);
                if let Some(r) = &range {
                    drag = drag.range(r.clone());
                }
                changed |= ui.add(drag).changed();
            }
        });
    });
    changed
}

impl eframe::App for ViewerApp {
    fn on_exit(&mut self) {
        self.settings.camera_distance = self.viewport.camera.distance();
        let (yaw, pitch) = self.viewport.camera.angles();
        self.settings.camera_yaw = yaw;
        self.settings.camera_pitch = pitch;
        self.settings.max_bounces = self.editor.max_bounces();
        self.settings.scenes_dir = self.editor.scenes_dir().to_path_buf();
        self.settings.save();
    }

    fn update(&mut self, ctx: &egui::Context, frame: &mut eframe::Frame) {
        let _span = tracing::info_span!("viewer_update").entered();

        // Initialize renderer if needed
        if self.viewport.renderer.is_none() {
            if let Some(render_state) = frame.wgpu_render_state() {
                self.viewport.init_renderer(
                    &render_state.device,
                    &render_state.queue,
                    render_state.target_format,
                );
                self.apply_render_settings();
                self.viewport.camera.set_distance(self.settings.camera_distance);
                self.viewport
                    .camera
                    .set_angles(self.settings.camera_yaw, self.settings.camera_pitch);
            }
        }

        // Scene from the command line or the previous session
        if let Some(path) = self.pending_scene.take() {
            self.load_scene(path);
        }

        self.handle_keys(ctx);

        TopBottomPanel::top("menu_bar").show(ctx, |ui| {
            self.menu_bar(ctx, ui);
        });

        TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            self.status_bar(ui);
        });

        let response = SidePanel::right("side_panel")
            .default_width(self.settings.side_panel_width)
            .min_width(200.0)
            .max_width(500.0)
            .resizable(true)
            .show(ctx, |ui| {
                self.side_panel(ui);
            });
        // Width is saved with the rest on exit
        self.settings.side_panel_width = response.response.rect.width();

        CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| {
                let render_state = frame.wgpu_render_state();
                self.viewport.show(ui, render_state, &mut self.editor);
            });

        // Track window size and position for saving on exit
        ctx.input(|i| {
            if let Some(rect) = i.viewport().inner_rect {
                self.settings.window_width = rect.width();
                self.settings.window_height = rect.height();
            }
            if let Some(pos) = i.viewport().outer_rect {
                self.settings.window_x = Some(pos.min.x);
                self.settings.window_y = Some(pos.min.y);
            }
        });

        // Path tracing keeps refining while idle
        if self.settings.path_tracing {
            ctx.request_repaint();
        }
    }
}
