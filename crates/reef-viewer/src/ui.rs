//! Settings panel. Edits land in [`UiState`]; the app diffs it against the
//! live renderer and stage after the frame is declared.

use waterprops::WaterType;

use crate::renderer::RenderMode;
use crate::shaders::{MAX_JELLYFISH, MAX_LIGHTS};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UiState {
    pub mode: RenderMode,
    pub water_type: WaterType,
    pub num_lights: u32,
    pub num_jellyfish: u32,
}

pub fn draw_panel(ctx: &egui::Context, state: &mut UiState, frame_time_ms: f32) {
    egui::Window::new("Reef")
        .default_width(220.0)
        .show(ctx, |ui| {
            ui.label(format!(
                "frame: {:.2} ms ({:.0} fps)",
                frame_time_ms,
                1000.0 / frame_time_ms.max(0.01)
            ));
            ui.separator();

            egui::ComboBox::from_label("mode")
                .selected_text(state.mode.label())
                .show_ui(ui, |ui| {
                    for mode in RenderMode::ALL {
                        ui.selectable_value(&mut state.mode, mode, mode.label());
                    }
                });

            egui::ComboBox::from_label("water")
                .selected_text(state.water_type.label())
                .show_ui(ui, |ui| {
                    for ty in WaterType::ALL {
                        ui.selectable_value(&mut state.water_type, ty, ty.label());
                    }
                });

            ui.add(
                egui::Slider::new(&mut state.num_lights, 0..=MAX_LIGHTS as u32).text("lights"),
            );
            ui.add(
                egui::Slider::new(&mut state.num_jellyfish, 0..=MAX_JELLYFISH).text("jellyfish"),
            );
        });
}
