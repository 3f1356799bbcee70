use web_time::Instant;
use winit::keyboard::KeyCode;

use crate::config::{RenderingMode, Settings};
use crate::graphics::{FramePipeline, Graphics};
use crate::scene::Scene;

/// One of the four lighting toggles in [`Settings`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SettingToggle {
    IndirectSpecularLight,
    IndirectDiffuseLight,
    DirectLight,
    Shadows,
}

impl SettingToggle {
    /// Flips the setting and returns its new value.
    pub fn apply(self, settings: &mut Settings) -> bool {
        let flag = match self {
            SettingToggle::IndirectSpecularLight => &mut settings.indirect_specular_light,
            SettingToggle::IndirectDiffuseLight => &mut settings.indirect_diffuse_light,
            SettingToggle::DirectLight => &mut settings.direct_light,
            SettingToggle::Shadows => &mut settings.shadows,
        };
        *flag = !*flag;
        *flag
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AppCommand {
    SetMode(RenderingMode),
    QueueVoxelization,
    QueueMipmapRegeneration,
    ToggleAutomaticVoxelization,
    ToggleAutomaticMipmap,
    ToggleProjectionMode,
    Toggle(SettingToggle),
    ChangeVisualizationLevel(i32),
    CycleDebugState,
    TogglePause,
    Exit,
}

pub fn command_for_key(key: KeyCode) -> Option<AppCommand> {
    let command = match key {
        KeyCode::Digit1 => AppCommand::SetMode(RenderingMode::VoxelizationVisualization),
        KeyCode::Digit2 => AppCommand::SetMode(RenderingMode::VoxelConeTracing),
        KeyCode::KeyV => AppCommand::QueueVoxelization,
        KeyCode::KeyM => AppCommand::QueueMipmapRegeneration,
        KeyCode::KeyT => AppCommand::ToggleAutomaticVoxelization,
        KeyCode::KeyG => AppCommand::ToggleAutomaticMipmap,
        KeyCode::KeyX => AppCommand::ToggleProjectionMode,
        KeyCode::F1 => AppCommand::Toggle(SettingToggle::IndirectSpecularLight),
        KeyCode::F2 => AppCommand::Toggle(SettingToggle::IndirectDiffuseLight),
        KeyCode::F3 => AppCommand::Toggle(SettingToggle::DirectLight),
        KeyCode::F4 => AppCommand::Toggle(SettingToggle::Shadows),
        KeyCode::F5 => AppCommand::CycleDebugState,
        KeyCode::Equal | KeyCode::NumpadAdd => AppCommand::ChangeVisualizationLevel(1),
        KeyCode::Minus | KeyCode::NumpadSubtract => AppCommand::ChangeVisualizationLevel(-1),
        KeyCode::KeyP => AppCommand::TogglePause,
        KeyCode::Escape => AppCommand::Exit,
        _ => return None,
    };
    Some(command)
}

const FPS_LOG_INTERVAL: f32 = 1.0;

/// Frame delta plus a once-per-second FPS log line.
pub struct FrameTimer {
    last_frame: Instant,
    frame_count: u64,
    window_frames: u32,
    window_seconds: f32,
}

impl Default for FrameTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameTimer {
    pub fn new() -> Self {
        Self {
            last_frame: Instant::now(),
            frame_count: 0,
            window_frames: 0,
            window_seconds: 0.0,
        }
    }

    pub fn tick(&mut self) -> f32 {
        let now = Instant::now();
        let delta = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;
        if let Some(fps) = self.record(delta) {
            log::info!("{fps:.1} fps (frame {})", self.frame_count);
        }
        delta
    }

    /// Accounts one frame of `delta` seconds. Returns the average FPS once a
    /// full logging interval has elapsed.
    pub fn record(&mut self, delta: f32) -> Option<f32> {
        self.frame_count += 1;
        self.window_frames += 1;
        self.window_seconds += delta;
        if self.window_seconds < FPS_LOG_INTERVAL {
            return None;
        }
        let fps = self.window_frames as f32 / self.window_seconds;
        self.window_frames = 0;
        self.window_seconds = 0.0;
        Some(fps)
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }
}

/// Application context: owns the graphics driver, the scene and the
/// interactive state, and is moved into the event loop.
pub struct App {
    graphics: Graphics,
    scene: Scene,
    mode: RenderingMode,
    paused: bool,
    scene_time: f32,
    timer: FrameTimer,
}

impl App {
    pub fn new(graphics: Graphics, scene: Scene, mode: RenderingMode) -> Self {
        Self {
            graphics,
            scene,
            mode,
            paused: false,
            scene_time: 0.0,
            timer: FrameTimer::new(),
        }
    }

    pub fn mode(&self) -> RenderingMode {
        self.mode
    }

    pub fn graphics(&self) -> &Graphics {
        &self.graphics
    }

    /// Applies a command. Returns `false` when the application should exit.
    pub fn apply(&mut self, command: AppCommand) -> bool {
        match command {
            AppCommand::SetMode(mode) => {
                if mode != self.mode {
                    log::info!("Rendering mode: {mode:?}");
                }
                self.mode = mode;
            }
            AppCommand::QueueVoxelization => {
                self.graphics.voxelization_state_mut().queue_voxelization();
            }
            AppCommand::QueueMipmapRegeneration => {
                self.graphics.voxelization_state_mut().queue_mipmap_regeneration();
            }
            AppCommand::ToggleAutomaticVoxelization => {
                let state = self.graphics.voxelization_state_mut();
                state.automatically_voxelize = !state.automatically_voxelize;
                log::info!("Automatic voxelization: {}", state.automatically_voxelize);
            }
            AppCommand::ToggleAutomaticMipmap => {
                let state = self.graphics.voxelization_state_mut();
                state.automatically_regenerate_mipmap = !state.automatically_regenerate_mipmap;
                log::info!("Automatic mipmap regeneration: {}", state.automatically_regenerate_mipmap);
            }
            AppCommand::ToggleProjectionMode => {
                let mode = self.graphics.projection_mode().toggled();
                self.graphics.set_projection_mode(mode);
                log::info!("Voxelization projection: {mode:?}");
            }
            AppCommand::Toggle(toggle) => {
                let enabled = toggle.apply(self.graphics.settings_mut());
                log::info!("{toggle:?}: {enabled}");
            }
            AppCommand::ChangeVisualizationLevel(delta) => {
                let level = self.graphics.visualization_level().saturating_add_signed(delta);
                self.graphics.set_visualization_level(level);
                log::info!("Visualized pyramid level: {}", self.graphics.visualization_level());
            }
            AppCommand::CycleDebugState => self.graphics.cycle_debug_state(),
            AppCommand::TogglePause => {
                self.paused = !self.paused;
                log::info!("Paused: {}", self.paused);
            }
            AppCommand::Exit => return false,
        }
        true
    }

    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        self.graphics.resize(device, width, height);
        self.scene.camera.aspect = width.max(1) as f32 / height.max(1) as f32;
    }

    /// Advances time, uploads the scene and records and submits one frame.
    pub fn frame(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, target: &wgpu::TextureView) {
        let delta = self.timer.tick();
        if !self.paused {
            self.scene_time += delta;
        }
        self.scene.update(queue, self.scene_time);

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Frame Encoder"),
        });
        self.graphics
            .render(queue, &mut encoder, target, &self.scene, self.mode);
        queue.submit(Some(encoder.finish()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_keys_select_rendering_mode() {
        assert_eq!(
            command_for_key(KeyCode::Digit1),
            Some(AppCommand::SetMode(RenderingMode::VoxelizationVisualization))
        );
        assert_eq!(
            command_for_key(KeyCode::Digit2),
            Some(AppCommand::SetMode(RenderingMode::VoxelConeTracing))
        );
        assert_eq!(command_for_key(KeyCode::KeyQ), None);
    }

    #[test]
    fn voxelization_keys_map_to_schedule_commands() {
        assert_eq!(command_for_key(KeyCode::KeyV), Some(AppCommand::QueueVoxelization));
        assert_eq!(command_for_key(KeyCode::KeyM), Some(AppCommand::QueueMipmapRegeneration));
        assert_eq!(command_for_key(KeyCode::KeyX), Some(AppCommand::ToggleProjectionMode));
    }

    #[test]
    fn function_keys_toggle_lighting() {
        let mut settings = Settings::default();
        for key in [KeyCode::F1, KeyCode::F2, KeyCode::F3, KeyCode::F4] {
            let Some(AppCommand::Toggle(toggle)) = command_for_key(key) else {
                panic!("{key:?} is not a lighting toggle");
            };
            assert!(!toggle.apply(&mut settings));
        }
        assert_eq!(settings.as_flags(), [0, 0, 0, 0]);
        assert!(SettingToggle::Shadows.apply(&mut settings));
        assert_eq!(settings.as_flags(), [0, 0, 0, 1]);
    }

    #[test]
    fn timer_reports_fps_once_per_interval() {
        let mut timer = FrameTimer::new();
        for _ in 0..59 {
            assert_eq!(timer.record(1.0 / 60.0), None);
        }
        let fps = timer.record(1.0 / 60.0 + 1e-4).unwrap();
        assert!((fps - 60.0).abs() < 0.1, "{fps}");
        assert_eq!(timer.frame_count(), 60);
        assert_eq!(timer.record(0.01), None);
    }
}
