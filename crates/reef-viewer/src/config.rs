//! Viewer configuration, loaded from a JSON file next to the binary or
//! falling back to defaults. Invalid values are startup errors.

use crate::shaders::{MAX_CORAL_PER_CHUNK, MAX_LIGHTS};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::renderer::RenderMode;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ViewerConfig {
    /// Path of the glTF scene placed in the world, if any.
    pub scene_path: Option<String>,
    /// Path of the OBJ mesh instanced for coral.
    pub coral_path: Option<String>,
    /// Optional override of the built-in spectral data file.
    pub spectral_path: Option<String>,

    pub render_mode: RenderMode,
    pub water_type: String,
    pub num_lights: u32,
    pub num_jellyfish: u32,

    /// Chunk window radius for coral placement (surface and floor always
    /// track the camera with a single chunk).
    pub coral_radius: i32,
    pub coral_per_chunk: u32,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            scene_path: None,
            coral_path: None,
            spectral_path: None,
            render_mode: RenderMode::ClusteredDeferred,
            water_type: "II".to_string(),
            num_lights: 500,
            num_jellyfish: 12,
            coral_radius: 1,
            coral_per_chunk: MAX_CORAL_PER_CHUNK as u32,
        }
    }
}

impl ViewerConfig {
    /// Loads `path` if it exists, otherwise returns defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::info!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.num_lights as usize > MAX_LIGHTS {
            bail!(
                "num_lights {} exceeds the maximum of {MAX_LIGHTS}",
                self.num_lights
            );
        }
        if self.coral_radius < 0 {
            bail!("coral_radius must be non-negative");
        }
        if self.coral_per_chunk == 0 {
            bail!("coral_per_chunk must be at least 1");
        }
        self.water_type
            .parse::<waterprops::WaterType>()
            .map_err(|_| anyhow::anyhow!("unknown water_type {:?}", self.water_type))?;
        Ok(())
    }

    pub fn water_type(&self) -> waterprops::WaterType {
        // validate() ran at load time.
        self.water_type
            .parse()
            .unwrap_or(waterprops::WaterType::II)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        ViewerConfig::default().validate().unwrap();
    }

    #[test]
    fn rejects_excess_lights() {
        let config = ViewerConfig {
            num_lights: MAX_LIGHTS as u32 + 1,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_unknown_water_type() {
        let config = ViewerConfig {
            water_type: "XII".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn parses_partial_json() {
        let config: ViewerConfig =
            serde_json::from_str(r#"{"num_lights": 64, "water_type": "III"}"#).unwrap();
        config.validate().unwrap();
        assert_eq!(config.num_lights, 64);
        assert_eq!(config.water_type(), waterprops::WaterType::III);
        assert_eq!(config.coral_radius, 1);
    }
}
