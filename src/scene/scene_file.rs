//! Text scene files.
//!
//! One record per instance, whitespace-separated tokens, terminated by `.`:
//!
//! ```text
//! MESH Sphere
//! COLOR 0.8 0.2 0.2
//! EMICOLOR 0 0 0
//! EMISSION 0
//! SMOOTHNESS 0.5
//! REFLEXIVITY 0.1
//! POS 0 1 0
//! SIZE 1 1 1
//! ROTATION 0 45 0
//! .
//! ```
//!
//! Omitted fields take per-record defaults. Unknown tokens are skipped, which
//! also covers the instance count that older files carry as a header.

use super::instance::Instance;
use super::object_manager::{InstanceHandle, ObjectManager};
use crate::util::{Error, Result, Vec3};
use std::fs;
use std::io::{BufWriter, Write};
use std::iter::Peekable;
use std::path::{Path, PathBuf};

/// Default directory scene file names are resolved against.
pub const DEFAULT_SCENES_DIR: &str = "data/scenes";

/// Outcome of [`load_scene`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Records turned into instances.
    pub loaded: usize,
    /// Records dropped (no mesh, unknown mesh, capacity).
    pub skipped: usize,
}

/// Resolve `name` against `scenes_dir` unless it is already absolute.
pub fn resolve_scene_path(scenes_dir: &Path, name: impl AsRef<Path>) -> PathBuf {
    let name = name.as_ref();
    if name.is_absolute() {
        name.to_path_buf()
    } else {
        scenes_dir.join(name)
    }
}

/// Write every instance of `scene` to `path`, replacing the file.
#[tracing::instrument(skip(scene))]
pub fn save_scene(scene: &ObjectManager, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| Error::scene_file(parent, e))?;
    }
    let file = fs::File::create(path).map_err(|e| Error::scene_file(path, e))?;
    let mut out = BufWriter::new(file);
    write_records(scene, &mut out).map_err(|e| Error::scene_file(path, e))?;
    out.flush().map_err(|e| Error::scene_file(path, e))?;

    tracing::info!("saved {} instances to {}", scene.len(), path.display());
    Ok(())
}

fn write_records(scene: &ObjectManager, out: &mut impl Write) -> std::io::Result<()> {
    fn vec3(out: &mut impl Write, key: &str, v: Vec3) -> std::io::Result<()> {
        writeln!(out, "{} {} {} {}", key, v.x, v.y, v.z)
    }

    for (i, inst) in scene.instances().iter().enumerate() {
        let mesh = scene
            .mesh_of(InstanceHandle::new(i))
            .and_then(|m| scene.registry().lookup(m))
            .map_err(|e| std::io::Error::other(e.to_string()))?;
        writeln!(out, "MESH {}", mesh.name())?;
        vec3(out, "COLOR", inst.color())?;
        vec3(out, "EMICOLOR", inst.emissive_color())?;
        writeln!(out, "EMISSION {}", inst.emission_strength())?;
        writeln!(out, "SMOOTHNESS {}", inst.smoothness())?;
        writeln!(out, "REFLEXIVITY {}", inst.reflectivity())?;
        vec3(out, "POS", inst.position())?;
        vec3(out, "SIZE", inst.scale())?;
        vec3(out, "ROTATION", inst.rotation())?;
        writeln!(out, ".")?;
    }
    Ok(())
}

/// Fields of the record being parsed.
struct Record {
    mesh: Option<String>,
    color: Vec3,
    emissive_color: Vec3,
    emission: f32,
    smoothness: f32,
    reflectivity: f32,
    position: Vec3,
    size: Vec3,
    rotation: Vec3,
}

impl Default for Record {
    fn default() -> Self {
        Self {
            mesh: None,
            color: Vec3::ZERO,
            emissive_color: Vec3::ZERO,
            emission: 0.0,
            smoothness: 1.0,
            reflectivity: 0.0,
            position: Vec3::ZERO,
            size: Vec3::ONE,
            rotation: Vec3::ZERO,
        }
    }
}

impl Record {
    fn to_instance(&self) -> Instance {
        let mut inst = Instance::new(self.color)
            .with_transform(self.position, self.rotation, self.size)
            .with_emission(self.emissive_color, self.emission);
        inst.set_smoothness(self.smoothness);
        inst.set_reflectivity(self.reflectivity);
        inst
    }
}

/// Consume the next token if it parses as a number.
fn read_f32<'a, I>(tokens: &mut Peekable<I>, key: &str, line: usize) -> Option<f32>
where
    I: Iterator<Item = (usize, &'a str)>,
{
    match tokens.peek().copied() {
        Some((_, tok)) => match tok.parse::<f32>() {
            Ok(v) => {
                tokens.next();
                Some(v)
            }
            Err(_) => {
                tracing::warn!("line {}: bad number {:?} after {}, keeping default", line, tok, key);
                None
            }
        },
        None => {
            tracing::warn!("line {}: {} is missing a value", line, key);
            None
        }
    }
}

fn read_vec3<'a, I>(tokens: &mut Peekable<I>, key: &str, line: usize) -> Option<Vec3>
where
    I: Iterator<Item = (usize, &'a str)>,
{
    let x = read_f32(tokens, key, line)?;
    let y = read_f32(tokens, key, line)?;
    let z = read_f32(tokens, key, line)?;
    Some(Vec3::new(x, y, z))
}

/// Parse scene text and append its records to `scene`.
pub fn parse_scene(scene: &mut ObjectManager, text: &str) -> LoadReport {
    let mut tokens = text
        .lines()
        .enumerate()
        .flat_map(|(n, l)| l.split_whitespace().map(move |t| (n + 1, t)))
        .peekable();

    let mut report = LoadReport::default();
    let mut record = Record::default();

    while let Some((line, word)) = tokens.next() {
        match word {
            "MESH" => match tokens.next() {
                Some((_, name)) => record.mesh = Some(name.to_string()),
                None => tracing::warn!("line {}: MESH is missing a name", line),
            },
            "COLOR" => {
                if let Some(v) = read_vec3(&mut tokens, word, line) {
                    record.color = v;
                }
            }
            "EMICOLOR" => {
                if let Some(v) = read_vec3(&mut tokens, word, line) {
                    record.emissive_color = v;
                }
            }
            "EMISSION" => {
                if let Some(v) = read_f32(&mut tokens, word, line) {
                    record.emission = v;
                }
            }
            "SMOOTHNESS" => {
                if let Some(v) = read_f32(&mut tokens, word, line) {
                    record.smoothness = v;
                }
            }
            "REFLEXIVITY" => {
                if let Some(v) = read_f32(&mut tokens, word, line) {
                    record.reflectivity = v;
                }
            }
            "POS" => {
                if let Some(v) = read_vec3(&mut tokens, word, line) {
                    record.position = v;
                }
            }
            "SIZE" => {
                if let Some(v) = read_vec3(&mut tokens, word, line) {
                    record.size = v;
                }
            }
            "ROTATION" => {
                if let Some(v) = read_vec3(&mut tokens, word, line) {
                    record.rotation = v;
                }
            }
            "." => {
                let finished = std::mem::take(&mut record);
                let Some(name) = finished.mesh.as_deref() else {
                    tracing::warn!("line {}: record without MESH skipped", line);
                    report.skipped += 1;
                    continue;
                };
                match scene.add_instance_by_name(name, Some(finished.to_instance())) {
                    Ok(_) => report.loaded += 1,
                    Err(e) => {
                        tracing::warn!("line {}: record skipped: {}", line, e);
                        report.skipped += 1;
                    }
                }
            }
            other => tracing::debug!("line {}: skipping token {:?}", line, other),
        }
    }

    if record.mesh.is_some() {
        tracing::warn!("unterminated last record dropped");
        report.skipped += 1;
    }
    report
}

/// Read the scene file at `path` and append its records to `scene`.
#[tracing::instrument(skip(scene))]
pub fn load_scene(scene: &mut ObjectManager, path: &Path) -> Result<LoadReport> {
    let text = fs::read_to_string(path).map_err(|e| Error::scene_file(path, e))?;
    let report = parse_scene(scene, &text);
    tracing::info!(
        "loaded {} instances from {} ({} skipped)",
        report.loaded,
        path.display(),
        report.skipped
    );
    Ok(report)
}
