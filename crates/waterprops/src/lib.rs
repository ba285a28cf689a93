//! Spectral optical properties of sea water, keyed by Jerlov water type.
//!
//! Holds the per-wavelength tables the underwater shading passes consume:
//! - `sigma_s`: scattering coefficient (1/m)
//! - `sigma_t`: extinction coefficient (1/m, scattering + absorption)
//! - `kd`:      diffuse downwelling attenuation coefficient (1/m)
//! plus a wavelength grid with integration weights and named sensitivity
//! curves (CIE color matching functions sampled on the same grid).
//!
//! The GPU-facing layout is fixed and mirrored by the shader preludes:
//!   wavelengths   : N x vec2<f32>  (wavelength_nm, weight)
//!   water props   : N x vec4<f32>  (sigma_s, sigma_t, kd, 0)
//!   sensitivities : N x vec4<f32>  (x, y, z, 0)
//! Pack/unpack helpers below are the single source of truth for that layout.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Number of wavelength samples every table in the data file must carry.
pub const NUM_WAVELENGTHS: usize = 10;

/// The canonical data file shipped with this crate.
pub const BUILTIN_JSON: &str = include_str!("../data/jerlov.json");

#[derive(Debug, thiserror::Error)]
pub enum SpectralError {
    #[error("failed to read spectral data file: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed spectral data: {0}")]
    Json(#[from] serde_json::Error),
    #[error("spectral data has {0} wavelengths, expected 10")]
    WavelengthCount(usize),
    #[error("water type '{0}' has {1} entries, expected one per wavelength")]
    WaterPropsLength(String, usize),
    #[error("sensitivity curve '{0}' has {1} entries, expected one per wavelength")]
    SensitivityLength(String, usize),
    #[error("water type '{0}' missing from data file")]
    MissingWaterType(String),
    #[error("unknown water type key '{0}'")]
    UnknownWaterType(String),
}

/// Jerlov optical water classification. Oceanic types I-III run from the
/// clearest open ocean to greener temperate water; coastal types 1C-7C get
/// progressively more turbid. The leading letter in the serialized key
/// orders the types from clearest to most turbid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WaterType {
    Ia,
    IaAlt,
    Ib,
    II,
    III,
    C1,
    C3,
    C5,
    C7,
}

impl WaterType {
    pub const ALL: [WaterType; 9] = [
        WaterType::Ia,
        WaterType::IaAlt,
        WaterType::Ib,
        WaterType::II,
        WaterType::III,
        WaterType::C1,
        WaterType::C3,
        WaterType::C5,
        WaterType::C7,
    ];

    /// Key used in the JSON data file.
    pub fn key(self) -> &'static str {
        match self {
            WaterType::Ia => "b_IA",
            WaterType::IaAlt => "c_IA",
            WaterType::Ib => "c_IB",
            WaterType::II => "d_II",
            WaterType::III => "e_III",
            WaterType::C1 => "f_1C",
            WaterType::C3 => "g_3C",
            WaterType::C5 => "h_5C",
            WaterType::C7 => "i_7C",
        }
    }

    /// Human-readable label for UI display.
    pub fn label(self) -> &'static str {
        match self {
            WaterType::Ia => "Oceanic IA",
            WaterType::IaAlt => "Oceanic IA (alt)",
            WaterType::Ib => "Oceanic IB",
            WaterType::II => "Oceanic II",
            WaterType::III => "Oceanic III",
            WaterType::C1 => "Coastal 1C",
            WaterType::C3 => "Coastal 3C",
            WaterType::C5 => "Coastal 5C",
            WaterType::C7 => "Coastal 7C",
        }
    }
}

impl fmt::Display for WaterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for WaterType {
    type Err = SpectralError;

    /// Accepts the data-file key (`d_II`) or the bare Jerlov class name
    /// (`II`, `IA`, `3C`, case-insensitive).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.to_ascii_uppercase();
        WaterType::ALL
            .into_iter()
            .find(|t| {
                t.key() == s || t.key()[2..].eq_ignore_ascii_case(&upper)
            })
            .ok_or_else(|| SpectralError::UnknownWaterType(s.to_owned()))
    }
}

/// One wavelength's optical coefficients for a given water type.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct WaterProps {
    pub sigma_s: f32,
    pub sigma_t: f32,
    pub kd: f32,
}

/// The full spectral table, deserialized from the JSON data file.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpectralData {
    pub wavelengths: Vec<f32>,
    pub wavelength_weights: Vec<f32>,
    jerlov_water_props: BTreeMap<String, Vec<WaterProps>>,
    sensitivities: BTreeMap<String, Vec<[f32; 3]>>,
}

impl SpectralData {
    /// Parses and validates a spectral data document.
    pub fn from_json(json: &str) -> Result<Self, SpectralError> {
        let data: SpectralData = serde_json::from_str(json)?;
        data.validate()?;
        Ok(data)
    }

    /// Loads from a file on disk.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, SpectralError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// The table shipped with this crate.
    pub fn builtin() -> Result<Self, SpectralError> {
        Self::from_json(BUILTIN_JSON)
    }

    fn validate(&self) -> Result<(), SpectralError> {
        if self.wavelengths.len() != NUM_WAVELENGTHS
            || self.wavelength_weights.len() != NUM_WAVELENGTHS
        {
            return Err(SpectralError::WavelengthCount(self.wavelengths.len()));
        }
        for ty in WaterType::ALL {
            let rows = self
                .jerlov_water_props
                .get(ty.key())
                .ok_or_else(|| SpectralError::MissingWaterType(ty.key().to_owned()))?;
            if rows.len() != NUM_WAVELENGTHS {
                return Err(SpectralError::WaterPropsLength(
                    ty.key().to_owned(),
                    rows.len(),
                ));
            }
        }
        for (name, rows) in &self.sensitivities {
            if rows.len() != NUM_WAVELENGTHS {
                return Err(SpectralError::SensitivityLength(name.clone(), rows.len()));
            }
        }
        Ok(())
    }

    /// Per-wavelength table for one water type.
    pub fn water_props(&self, ty: WaterType) -> &[WaterProps] {
        // Presence of every type is checked in validate().
        &self.jerlov_water_props[ty.key()]
    }

    /// Named sensitivity curve, if present ("cie" is always shipped).
    pub fn sensitivity(&self, name: &str) -> Option<&[[f32; 3]]> {
        self.sensitivities.get(name).map(Vec::as_slice)
    }

    /// `(wavelength_nm, weight)` pairs in the uniform-buffer layout.
    pub fn pack_wavelengths(&self) -> Vec<[f32; 2]> {
        self.wavelengths
            .iter()
            .zip(&self.wavelength_weights)
            .map(|(&w, &weight)| [w, weight])
            .collect()
    }

    /// `(sigma_s, sigma_t, kd, 0)` quads in the uniform-buffer layout.
    pub fn pack_water_props(&self, ty: WaterType) -> Vec<[f32; 4]> {
        self.water_props(ty)
            .iter()
            .map(|p| [p.sigma_s, p.sigma_t, p.kd, 0.0])
            .collect()
    }

    /// `(x, y, z, 0)` quads in the uniform-buffer layout.
    pub fn pack_sensitivities(&self, name: &str) -> Option<Vec<[f32; 4]>> {
        self.sensitivity(name)
            .map(|rows| rows.iter().map(|s| [s[0], s[1], s[2], 0.0]).collect())
    }
}

/// Inverse of [`SpectralData::pack_water_props`]; used to verify the
/// uniform layout reproduces the source table exactly.
pub fn unpack_water_props(packed: &[[f32; 4]]) -> Vec<WaterProps> {
    packed
        .iter()
        .map(|q| WaterProps {
            sigma_s: q[0],
            sigma_t: q[1],
            kd: q[2],
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_data_parses_and_validates() {
        let data = SpectralData::builtin().unwrap();
        assert_eq!(data.wavelengths.len(), NUM_WAVELENGTHS);
        assert_eq!(data.wavelengths[0], 412.0);
        assert_eq!(*data.wavelengths.last().unwrap(), 715.0);
    }

    #[test]
    fn all_named_types_present() {
        let data = SpectralData::builtin().unwrap();
        for ty in WaterType::ALL {
            assert_eq!(data.water_props(ty).len(), NUM_WAVELENGTHS, "{}", ty.key());
        }
    }

    #[test]
    fn water_type_keys_round_trip() {
        for ty in WaterType::ALL {
            assert_eq!(ty.key().parse::<WaterType>().unwrap(), ty);
        }
        assert!("jerlov_X".parse::<WaterType>().is_err());
    }

    #[test]
    fn pack_unpack_round_trips_every_type() {
        let data = SpectralData::builtin().unwrap();
        for ty in WaterType::ALL {
            let packed = data.pack_water_props(ty);
            assert_eq!(packed.len(), NUM_WAVELENGTHS);
            assert!(packed.iter().all(|q| q[3] == 0.0));
            assert_eq!(unpack_water_props(&packed), data.water_props(ty));
        }
    }

    #[test]
    fn turbidity_ordering_holds_in_green() {
        // Coastal 7C must extinguish light faster than oceanic IA at 555nm.
        let data = SpectralData::builtin().unwrap();
        let green = 5; // index of 555nm
        let clear = data.water_props(WaterType::Ia)[green];
        let turbid = data.water_props(WaterType::C7)[green];
        assert!(turbid.sigma_t > clear.sigma_t);
        assert!(turbid.sigma_s > clear.sigma_s);
        assert!(turbid.kd > clear.kd);
    }

    #[test]
    fn extinction_exceeds_scattering() {
        // sigma_t = sigma_s + absorption, so sigma_t > sigma_s everywhere.
        let data = SpectralData::builtin().unwrap();
        for ty in WaterType::ALL {
            for p in data.water_props(ty) {
                assert!(p.sigma_t > p.sigma_s);
            }
        }
    }

    #[test]
    fn length_mismatch_rejected() {
        let mut doc: serde_json::Value = serde_json::from_str(BUILTIN_JSON).unwrap();
        doc["jerlovWaterProps"]["d_II"]
            .as_array_mut()
            .unwrap()
            .pop();
        let err = SpectralData::from_json(&doc.to_string()).unwrap_err();
        assert!(matches!(err, SpectralError::WaterPropsLength(ref k, 9) if k == "d_II"));
    }

    #[test]
    fn missing_type_rejected() {
        let mut doc: serde_json::Value = serde_json::from_str(BUILTIN_JSON).unwrap();
        doc["jerlovWaterProps"]
            .as_object_mut()
            .unwrap()
            .remove("i_7C");
        let err = SpectralData::from_json(&doc.to_string()).unwrap_err();
        assert!(matches!(err, SpectralError::MissingWaterType(ref k) if k == "i_7C"));
    }

    #[test]
    fn cie_sensitivities_shipped() {
        let data = SpectralData::builtin().unwrap();
        let packed = data.pack_sensitivities("cie").unwrap();
        assert_eq!(packed.len(), NUM_WAVELENGTHS);
        // The photopic curve peaks near 555nm.
        let peak = packed
            .iter()
            .enumerate()
            .max_by(|a, b| a.1[1].total_cmp(&b.1[1]))
            .unwrap()
            .0;
        assert_eq!(data.wavelengths[peak], 555.0);
    }
}
