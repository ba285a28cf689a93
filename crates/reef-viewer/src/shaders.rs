//! Shader sources and the `${NAME}` constant substitution applied to them.
//!
//! Every tunable that appears in WGSL lives in the table below, and the host
//! buffer layouts are derived from the same values, so the two sides cannot
//! drift apart.

/// Maximum lights in the scene-wide light set.
pub const MAX_LIGHTS: usize = 5000;
/// Maximum light indices recorded per cluster.
pub const MAX_CLUSTER_LIGHTS: usize = 256;
/// Cluster grid dimensions (X and Y tile the screen, Z slices view depth).
pub const CLUSTER_X: usize = 16;
pub const CLUSTER_Y: usize = 16;
pub const CLUSTER_Z: usize = 16;
pub const NUM_CLUSTERS: usize = CLUSTER_X * CLUSTER_Y * CLUSTER_Z;
/// World-space influence radius of a point light, in meters.
pub const LIGHT_RADIUS: f32 = 20.0;

/// Texel resolution of one chunk's displacement/normal field.
pub const FIELD_RESOLUTION: u32 = 256;
/// World-space edge length of one chunk cell, in meters.
pub const CELL_SIZE: f32 = 512.0;
/// Y of the undisplaced ocean surface plane.
pub const SURFACE_HEIGHT: f32 = 0.0;
/// Depth of the undisplaced ocean floor plane below the surface.
pub const FLOOR_DEPTH: f32 = 40.0;
/// Field compute kernels dispatch in 16x16 tiles.
pub const WORKGROUP_SIZE: u32 = 16;

/// Maximum coral instances placed in one chunk.
pub const MAX_CORAL_PER_CHUNK: usize = 128;

/// Upper bound on overlay jellyfish; the fragment loop is sized by it.
pub const MAX_JELLYFISH: u32 = 24;

/// Spectral sample count; must match the waterprops tables.
pub const NUM_WAVELENGTHS: usize = waterprops::NUM_WAVELENGTHS;

pub const COMMON: &str = include_str!("../shaders/common.wgsl");
pub const SCATTERING: &str = include_str!("../shaders/scattering.wgsl");
pub const FULLSCREEN_VS: &str = include_str!("../shaders/fullscreen.vs.wgsl");
pub const SCENE_VS: &str = include_str!("../shaders/scene.vs.wgsl");
pub const SCENE_FS: &str = include_str!("../shaders/scene.fs.wgsl");
pub const OCEAN_SURFACE_CS: &str = include_str!("../shaders/ocean_surface.cs.wgsl");
pub const OCEAN_SURFACE_VS: &str = include_str!("../shaders/ocean_surface.vs.wgsl");
pub const OCEAN_SURFACE_FS: &str = include_str!("../shaders/ocean_surface.fs.wgsl");
pub const OCEAN_FLOOR_CS: &str = include_str!("../shaders/ocean_floor.cs.wgsl");
pub const OCEAN_FLOOR_VS: &str = include_str!("../shaders/ocean_floor.vs.wgsl");
pub const OCEAN_FLOOR_FS: &str = include_str!("../shaders/ocean_floor.fs.wgsl");
pub const CORAL_VS: &str = include_str!("../shaders/coral.vs.wgsl");
pub const CORAL_FS: &str = include_str!("../shaders/coral.fs.wgsl");
pub const PLACE_CORAL_CS: &str = include_str!("../shaders/place_coral.cs.wgsl");
pub const MOVE_LIGHTS_CS: &str = include_str!("../shaders/move_lights.cs.wgsl");
pub const CLUSTERING_CS: &str = include_str!("../shaders/clustering.cs.wgsl");
pub const COMPOSITE_FORWARD_FS: &str = include_str!("../shaders/composite_forward.fs.wgsl");
pub const COMPOSITE_DEFERRED_FS: &str = include_str!("../shaders/composite_deferred.fs.wgsl");
pub const JELLYFISH_FS: &str = include_str!("../shaders/jellyfish.fs.wgsl");

/// Substitution table. Values are spelled so they are valid WGSL both bare
/// and with a `u`/`.0` suffix appended at the use site.
fn constants() -> [(&'static str, String); 14] {
    [
        ("MAX_JELLYFISH", MAX_JELLYFISH.to_string()),
        ("MAX_LIGHTS", MAX_LIGHTS.to_string()),
        ("MAX_CLUSTER_LIGHTS", MAX_CLUSTER_LIGHTS.to_string()),
        ("CLUSTER_X", CLUSTER_X.to_string()),
        ("CLUSTER_Y", CLUSTER_Y.to_string()),
        ("CLUSTER_Z", CLUSTER_Z.to_string()),
        ("NUM_CLUSTERS", NUM_CLUSTERS.to_string()),
        ("LIGHT_RADIUS", format!("{:.1}", LIGHT_RADIUS)),
        ("FIELD_RESOLUTION", FIELD_RESOLUTION.to_string()),
        ("CELL_SIZE", format!("{}", CELL_SIZE as u32)),
        ("SURFACE_HEIGHT", format!("{:.1}", SURFACE_HEIGHT)),
        ("FLOOR_DEPTH", format!("{:.1}", FLOOR_DEPTH)),
        ("WORKGROUP_SIZE_X", WORKGROUP_SIZE.to_string()),
        ("WORKGROUP_SIZE_Y", WORKGROUP_SIZE.to_string()),
    ]
}

fn substitute(src: &str) -> String {
    let mut out = src.to_string();
    for (name, value) in constants() {
        out = out.replace(&format!("${{{name}}}"), &value);
    }
    out = out.replace("${NUM_WAVELENGTHS}", &NUM_WAVELENGTHS.to_string());
    out = out.replace("${MAX_CORAL_PER_CHUNK}", &MAX_CORAL_PER_CHUNK.to_string());
    out
}

/// Prepends the shared prelude and resolves all `${NAME}` placeholders.
pub fn process(body: &str) -> String {
    let full = format!("{COMMON}\n{body}");
    let out = substitute(&full);
    debug_assert!(!out.contains("${"), "unresolved shader constant");
    out
}

/// Like [`process`], with the spectral transport functions appended between
/// the prelude and the body (composite passes only).
pub fn process_with_scattering(body: &str) -> String {
    let full = format!("{COMMON}\n{SCATTERING}\n{body}");
    let out = substitute(&full);
    debug_assert!(!out.contains("${"), "unresolved shader constant");
    out
}

// Byte sizes of the WGSL storage/uniform structs, derived from the same
// constants the shaders are expanded with.

/// `Light`: vec3 position + pad, vec3 color + intensity.
pub const LIGHT_STRIDE: usize = 32;
/// `LightSet`: u32 count header padded to 16, then the light array.
pub const LIGHT_SET_SIZE: usize = 16 + MAX_LIGHTS * LIGHT_STRIDE;
/// `Cluster`: u32 count header padded to 16, then the index array.
pub const CLUSTER_STRIDE: usize = 16 + MAX_CLUSTER_LIGHTS * 4;
pub const CLUSTER_SET_SIZE: usize = NUM_CLUSTERS * CLUSTER_STRIDE;
/// `CoralInstance`: two vec4s.
pub const CORAL_INSTANCE_STRIDE: usize = 32;
/// `CoralSet`: u32 count header padded to 16, then the instance array.
pub const CORAL_SET_SIZE: usize = 16 + MAX_CORAL_PER_CHUNK * CORAL_INSTANCE_STRIDE;
/// `SpectralTable`: one vec4 row per wavelength.
pub const SPECTRAL_TABLE_SIZE: usize = NUM_WAVELENGTHS * 16;

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_BODIES: &[&str] = &[
        FULLSCREEN_VS,
        SCENE_VS,
        SCENE_FS,
        OCEAN_SURFACE_CS,
        OCEAN_SURFACE_VS,
        OCEAN_SURFACE_FS,
        OCEAN_FLOOR_CS,
        OCEAN_FLOOR_VS,
        OCEAN_FLOOR_FS,
        CORAL_VS,
        CORAL_FS,
        PLACE_CORAL_CS,
        MOVE_LIGHTS_CS,
        CLUSTERING_CS,
        JELLYFISH_FS,
    ];

    #[test]
    fn every_shader_resolves_fully() {
        for body in ALL_BODIES {
            assert!(!process(body).contains("${"));
        }
        assert!(!process_with_scattering(COMPOSITE_FORWARD_FS).contains("${"));
        assert!(!process_with_scattering(COMPOSITE_DEFERRED_FS).contains("${"));
    }

    #[test]
    fn raw_placeholders_all_name_table_constants() {
        let table = constants();
        let mut known: Vec<&str> = table.iter().map(|(name, _)| *name).collect();
        known.push("NUM_WAVELENGTHS");
        known.push("MAX_CORAL_PER_CHUNK");

        let mut sources: Vec<&str> = ALL_BODIES.to_vec();
        sources.extend([COMMON, SCATTERING, COMPOSITE_FORWARD_FS, COMPOSITE_DEFERRED_FS]);
        for src in sources {
            for (pos, _) in src.match_indices("${") {
                let rest = &src[pos + 2..];
                let end = rest.find('}').expect("unterminated placeholder");
                assert!(
                    known.contains(&&rest[..end]),
                    "placeholder or stray literal not in the constants table: ${{{}}}",
                    &rest[..end]
                );
            }
        }
    }

    #[test]
    fn substituted_values_are_numeric() {
        for (name, value) in constants() {
            assert!(
                value.parse::<f64>().is_ok(),
                "constant {name} is not numeric: {value}"
            );
        }
    }

    #[test]
    fn placement_kernel_writes_clamped_count_once() {
        let out = process(PLACE_CORAL_CS);
        assert_eq!(out.matches("coral.num_coral =").count(), 1);
        assert!(out.contains("coral.num_coral = min(coral_count"));
    }

    #[test]
    fn prelude_is_prepended_once() {
        let out = process(SCENE_VS);
        assert_eq!(out.matches("struct CameraUniforms").count(), 1);
        assert_eq!(out.matches("fn vs_main").count(), 1);
    }

    #[test]
    fn scattering_prelude_included_for_composites() {
        let out = process_with_scattering(COMPOSITE_DEFERRED_FS);
        assert_eq!(out.matches("fn water_shade").count(), 1);
        assert_eq!(out.matches("struct SpectralTable").count(), 1);
    }

    #[test]
    fn derived_sizes_are_16_byte_aligned() {
        assert_eq!(LIGHT_SET_SIZE % 16, 0);
        assert_eq!(CLUSTER_SET_SIZE % 16, 0);
        assert_eq!(CORAL_SET_SIZE % 16, 0);
        assert_eq!(SPECTRAL_TABLE_SIZE % 16, 0);
    }
}
