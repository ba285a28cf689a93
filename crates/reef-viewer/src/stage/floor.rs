//! The ocean floor: same chunk machinery as the surface, with the dune
//! kernel. The slow ripple term animates, so the floor regenerates every
//! frame as well.

use super::chunks::ChunkGrid;
use super::field::{FieldChunk, FieldPipeline};
use crate::shaders::{self, CELL_SIZE};
use anyhow::Result;
use glam::Vec2;

pub struct OceanFloor {
    pub pipeline: FieldPipeline,
    grid: ChunkGrid,
    chunks: Vec<FieldChunk>,
}

impl OceanFloor {
    pub fn new(device: &wgpu::Device, time_buf: &wgpu::Buffer) -> Result<Self> {
        let pipeline = FieldPipeline::new(device, shaders::OCEAN_FLOOR_CS, "Ocean Floor Field");
        let grid = ChunkGrid::new(CELL_SIZE, 0)?;
        let chunks = (0..grid.slot_count())
            .map(|_| pipeline.create_chunk(device, time_buf))
            .collect();
        Ok(Self {
            pipeline,
            grid,
            chunks,
        })
    }

    pub fn update(&mut self, queue: &wgpu::Queue, cam_xz: Vec2) {
        for update in self.grid.update_active_cells(cam_xz) {
            self.chunks[update.slot].set_origin(queue, update.origin);
        }
    }

    pub fn record_generate(&self, encoder: &mut wgpu::CommandEncoder) {
        for chunk in &self.chunks {
            self.pipeline.record_generate(encoder, chunk);
        }
    }

    pub fn chunks(&self) -> &[FieldChunk] {
        &self.chunks
    }
}
