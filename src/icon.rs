use std::sync::LazyLock;

use sotto_core::MicState;

const ICON_SIZE: u32 = 32;

const COLOR_IDLE: (u8, u8, u8) = (158, 158, 158);
const COLOR_RECORDING: (u8, u8, u8) = (255, 59, 48);
const COLOR_PROCESSING: (u8, u8, u8) = (255, 223, 0);

static ICON_IDLE: LazyLock<tray_icon::Icon> = LazyLock::new(|| render_icon(COLOR_IDLE));
static ICON_RECORDING: LazyLock<tray_icon::Icon> = LazyLock::new(|| render_icon(COLOR_RECORDING));
static ICON_PROCESSING: LazyLock<tray_icon::Icon> = LazyLock::new(|| render_icon(COLOR_PROCESSING));

/// Tray icons for the session states.
pub trait MicStateExt {
    fn icon(&self) -> tray_icon::Icon;
}

impl MicStateExt for MicState {
    fn icon(&self) -> tray_icon::Icon {
        match self {
            MicState::Idle => ICON_IDLE.clone(),
            MicState::Recording => ICON_RECORDING.clone(),
            MicState::Processing => ICON_PROCESSING.clone(),
        }
    }
}

fn render_icon(color: (u8, u8, u8)) -> tray_icon::Icon {
    let rgba = render_disc(ICON_SIZE, color);
    tray_icon::Icon::from_rgba(rgba, ICON_SIZE, ICON_SIZE).expect("Failed to build icon")
}

/// Draws a filled disc with a one-pixel feathered rim.
fn render_disc(size: u32, (r, g, b): (u8, u8, u8)) -> Vec<u8> {
    let mut rgba = Vec::with_capacity((size * size * 4) as usize);
    let center = (size as f32 - 1.0) / 2.0;
    let radius = size as f32 * 0.42;
    for y in 0..size {
        for x in 0..size {
            let dx = x as f32 - center;
            let dy = y as f32 - center;
            let dist = (dx * dx + dy * dy).sqrt();
            let alpha = ((radius - dist + 0.5).clamp(0.0, 1.0) * 255.0) as u8;
            rgba.extend_from_slice(&[r, g, b, alpha]);
        }
    }
    rgba
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disc_dimensions_and_coverage() {
        let size = 32;
        let rgba = render_disc(size, (255, 0, 0));
        assert_eq!(rgba.len(), (size * size * 4) as usize);

        let alpha_at = |x: u32, y: u32| rgba[((y * size + x) * 4 + 3) as usize];
        // Center is opaque, corners are fully transparent.
        assert_eq!(alpha_at(size / 2, size / 2), 255);
        assert_eq!(alpha_at(0, 0), 0);
        assert_eq!(alpha_at(size - 1, size - 1), 0);
    }
}
