use crate::error::ConfigError;
use crate::volume::VolumeLayout;

pub const DEFAULT_VIEWPORT_WIDTH: u32 = 1280;
pub const DEFAULT_VIEWPORT_HEIGHT: u32 = 720;
pub const DEFAULT_VOXEL_TEXTURE_SIZE: u32 = 64;

/// Which consumer reads the voxel pyramid after voxelization.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RenderingMode {
    VoxelizationVisualization,
    #[default]
    VoxelConeTracing,
}

/// How triangles pick their projection axis during voxelization.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ProjectionMode {
    /// Each triangle is projected along the axis its face normal is most aligned with.
    #[default]
    DominantAxis,
    /// Every triangle is projected along Z. Cheaper, misses voxels of triangles seen edge-on.
    SingleAxis,
}

impl ProjectionMode {
    pub fn toggled(self) -> Self {
        match self {
            ProjectionMode::DominantAxis => ProjectionMode::SingleAxis,
            ProjectionMode::SingleAxis => ProjectionMode::DominantAxis,
        }
    }
}

/// Lighting toggles forwarded to the shading stage every frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Settings {
    pub indirect_specular_light: bool,
    pub indirect_diffuse_light: bool,
    pub direct_light: bool,
    pub shadows: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            indirect_specular_light: true,
            indirect_diffuse_light: true,
            direct_light: true,
            shadows: true,
        }
    }
}

impl Settings {
    pub fn as_flags(&self) -> [u32; 4] {
        [
            self.indirect_specular_light as u32,
            self.indirect_diffuse_light as u32,
            self.direct_light as u32,
            self.shadows as u32,
        ]
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VoxelizationConfig {
    pub voxel_texture_size: u32,
    pub voxelization_sparsity: u32,
    pub automatically_voxelize: bool,
    pub automatically_regenerate_mipmap: bool,
    pub projection_mode: ProjectionMode,
}

impl Default for VoxelizationConfig {
    fn default() -> Self {
        Self {
            voxel_texture_size: DEFAULT_VOXEL_TEXTURE_SIZE,
            voxelization_sparsity: 1,
            automatically_voxelize: true,
            automatically_regenerate_mipmap: true,
            projection_mode: ProjectionMode::DominantAxis,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SceneKind {
    #[default]
    Cornell,
    Glass,
}

/// Everything the demo needs to start. Built from the command line in `main.rs`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DemoConfig {
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub voxelization: VoxelizationConfig,
    pub settings: Settings,
    pub rendering_mode: RenderingMode,
    pub scene: SceneKind,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            viewport_width: DEFAULT_VIEWPORT_WIDTH,
            viewport_height: DEFAULT_VIEWPORT_HEIGHT,
            voxelization: VoxelizationConfig::default(),
            settings: Settings::default(),
            rendering_mode: RenderingMode::default(),
            scene: SceneKind::default(),
        }
    }
}

impl DemoConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.viewport_width == 0 || self.viewport_height == 0 {
            return Err(ConfigError::EmptyViewport {
                width: self.viewport_width,
                height: self.viewport_height,
            });
        }
        if self.voxelization.voxelization_sparsity == 0 {
            return Err(ConfigError::ZeroSparsity);
        }
        VolumeLayout::new(self.voxelization.voxel_texture_size)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn projection_mode_toggles_back_and_forth() {
        let mode = ProjectionMode::default();
        assert_eq!(mode.toggled(), ProjectionMode::SingleAxis);
        assert_eq!(mode.toggled().toggled(), mode);
    }

    #[test]
    fn default_config_is_valid() {
        assert_eq!(DemoConfig::default().validate(), Ok(()));
    }

    #[test]
    fn rejects_non_power_of_two_volume() {
        let mut config = DemoConfig::default();
        config.voxelization.voxel_texture_size = 48;
        assert_eq!(
            config.validate(),
            Err(ConfigError::VoxelSizeNotPowerOfTwo(48))
        );
    }

    #[test]
    fn rejects_zero_sparsity() {
        let mut config = DemoConfig::default();
        config.voxelization.voxelization_sparsity = 0;
        assert_eq!(config.validate(), Err(ConfigError::ZeroSparsity));
    }

    #[test]
    fn rejects_empty_viewport() {
        let config = DemoConfig {
            viewport_width: 0,
            ..DemoConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::EmptyViewport { .. })
        ));
    }

    #[test]
    fn settings_flags_follow_field_order() {
        let settings = Settings {
            indirect_specular_light: false,
            indirect_diffuse_light: true,
            direct_light: false,
            shadows: true,
        };
        assert_eq!(settings.as_flags(), [0, 1, 0, 1]);
    }
}
