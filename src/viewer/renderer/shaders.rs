//! Embedded raster preview shader.

/// Lambert plus ambient with one white point light.
pub const RASTER_SHADER: &str = r#"
struct Camera {
    view_proj: mat4x4<f32>,
    position: vec4<f32>,
    light_position: vec4<f32>,
}

struct Model {
    model: mat4x4<f32>,
    normal_matrix: mat4x4<f32>,
    color: vec4<f32>,
}

@group(0) @binding(0) var<uniform> camera: Camera;
@group(1) @binding(0) var<uniform> object: Model;

struct VsIn {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
}

struct VsOut {
    @builtin(position) clip: vec4<f32>,
    @location(0) world_pos: vec3<f32>,
    @location(1) normal: vec3<f32>,
}

@vertex
fn vs_main(in: VsIn) -> VsOut {
    let world = object.model * vec4<f32>(in.position, 1.0);
    let n = mat3x3<f32>(
        object.normal_matrix[0].xyz,
        object.normal_matrix[1].xyz,
        object.normal_matrix[2].xyz,
    ) * in.normal;

    var out: VsOut;
    out.clip = camera.view_proj * world;
    out.world_pos = world.xyz;
    out.normal = n;
    return out;
}

const AMBIENT: f32 = 0.1;

@fragment
fn fs_main(in: VsOut) -> @location(0) vec4<f32> {
    let n = normalize(in.normal);
    let l = normalize(camera.light_position.xyz - in.world_pos);
    let diffuse = max(dot(n, l), 0.0);
    let lit = (AMBIENT + diffuse) * object.color.rgb;
    return vec4<f32>(lit, 1.0);
}
"#;
