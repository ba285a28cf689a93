//! GPU side of the spectral water model: three uniform tables bound at
//! group 2 of the composite passes. Switching the water type rewrites only
//! the water-properties table.

use crate::shaders::SPECTRAL_TABLE_SIZE;
use anyhow::{Context, Result};
use waterprops::{SpectralData, WaterType};
use wgpu::util::DeviceExt;

pub struct SpectralUniforms {
    pub layout: wgpu::BindGroupLayout,
    pub bind: wgpu::BindGroup,
    props_buf: wgpu::Buffer,
    data: SpectralData,
    water_type: WaterType,
}

/// Widens `[a, b]` rows to the 16-byte stride WGSL requires of
/// uniform-space arrays.
fn widen_to_vec4(rows: &[[f32; 2]]) -> Vec<[f32; 4]> {
    rows.iter().map(|&[a, b]| [a, b, 0.0, 0.0]).collect()
}

impl SpectralUniforms {
    pub fn new(device: &wgpu::Device, data: SpectralData, water_type: WaterType) -> Result<Self> {
        let wavelengths = widen_to_vec4(&data.pack_wavelengths());
        let props = data.pack_water_props(water_type);
        let sensitivities = data
            .pack_sensitivities("cie")
            .context("spectral data has no 'cie' sensitivity curve")?;

        let table = |label, rows: &[[f32; 4]]| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: bytemuck::cast_slice(rows),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            })
        };
        let wavelengths_buf = table("Spectral Wavelengths", &wavelengths);
        let props_buf = table("Spectral Water Props", &props);
        let sens_buf = table("Spectral Sensitivities", &sensitivities);

        let entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: wgpu::BufferSize::new(SPECTRAL_TABLE_SIZE as u64),
            },
            count: None,
        };
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Spectral Layout"),
            entries: &[entry(0), entry(1), entry(2)],
        });
        let bind = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Spectral Bind"),
            layout: &layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wavelengths_buf.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: props_buf.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: sens_buf.as_entire_binding(),
                },
            ],
        });

        Ok(Self {
            layout,
            bind,
            props_buf,
            data,
            water_type,
        })
    }

    pub fn water_type(&self) -> WaterType {
        self.water_type
    }

    pub fn set_water_type(&mut self, queue: &wgpu::Queue, water_type: WaterType) {
        if water_type == self.water_type {
            return;
        }
        self.water_type = water_type;
        let props = self.data.pack_water_props(water_type);
        queue.write_buffer(&self.props_buf, 0, bytemuck::cast_slice(&props));
        log::info!("Water type set to {water_type}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widened_rows_match_table_stride() {
        let data = SpectralData::builtin().unwrap();
        let rows = widen_to_vec4(&data.pack_wavelengths());
        assert_eq!(rows.len() * 16, SPECTRAL_TABLE_SIZE);
        for (row, packed) in rows.iter().zip(data.pack_wavelengths()) {
            assert_eq!(row[0], packed[0]);
            assert_eq!(row[1], packed[1]);
            assert_eq!(row[2], 0.0);
        }
    }

    #[test]
    fn every_water_type_packs_to_table_size() {
        let data = SpectralData::builtin().unwrap();
        for ty in WaterType::ALL {
            assert_eq!(data.pack_water_props(ty).len() * 16, SPECTRAL_TABLE_SIZE);
        }
    }
}
