use clap::{ArgAction, Parser, ValueEnum};
use voxel_cone_tracing::config::{
    DemoConfig, ProjectionMode, RenderingMode, SceneKind, Settings, VoxelizationConfig,
    DEFAULT_VIEWPORT_HEIGHT, DEFAULT_VIEWPORT_WIDTH, DEFAULT_VOXEL_TEXTURE_SIZE,
};

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ModeArg {
    Visualization,
    ConeTracing,
}

impl ModeArg {
    fn to_runtime(self) -> RenderingMode {
        match self {
            ModeArg::Visualization => RenderingMode::VoxelizationVisualization,
            ModeArg::ConeTracing => RenderingMode::VoxelConeTracing,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ProjectionArg {
    DominantAxis,
    SingleAxis,
}

impl ProjectionArg {
    fn to_runtime(self) -> ProjectionMode {
        match self {
            ProjectionArg::DominantAxis => ProjectionMode::DominantAxis,
            ProjectionArg::SingleAxis => ProjectionMode::SingleAxis,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum SceneArg {
    Cornell,
    Glass,
}

impl SceneArg {
    fn to_runtime(self) -> SceneKind {
        match self {
            SceneArg::Cornell => SceneKind::Cornell,
            SceneArg::Glass => SceneKind::Glass,
        }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(version, about = "Real-time global illumination with voxel cone tracing")]
struct Args {
    /// Window width in pixels
    #[arg(long, short = 'W', default_value_t = DEFAULT_VIEWPORT_WIDTH)]
    width: u32,

    /// Window height in pixels
    #[arg(long, short = 'H', default_value_t = DEFAULT_VIEWPORT_HEIGHT)]
    height: u32,

    /// Edge length of the voxel volume (power of two, at most 128)
    #[arg(long, default_value_t = DEFAULT_VOXEL_TEXTURE_SIZE)]
    voxel_size: u32,

    /// Frames between automatic voxelization passes
    #[arg(long, default_value_t = 1)]
    sparsity: u32,

    /// Only voxelize on request (V)
    #[arg(long)]
    no_auto_voxelize: bool,

    /// Only rebuild the mip pyramid on request (M)
    #[arg(long)]
    no_auto_mipmap: bool,

    /// How triangles choose their voxelization projection axis
    #[arg(long, value_enum, default_value_t = ProjectionArg::DominantAxis)]
    projection: ProjectionArg,

    /// Initial rendering mode
    #[arg(long, value_enum, default_value_t = ModeArg::ConeTracing)]
    mode: ModeArg,

    /// Built-in scene to load
    #[arg(long, value_enum, default_value_t = SceneArg::Cornell)]
    scene: SceneArg,

    #[arg(long, action = ArgAction::Set, default_value_t = true)]
    indirect_specular_light: bool,

    #[arg(long, action = ArgAction::Set, default_value_t = true)]
    indirect_diffuse_light: bool,

    #[arg(long, action = ArgAction::Set, default_value_t = true)]
    direct_light: bool,

    #[arg(long, action = ArgAction::Set, default_value_t = true)]
    shadows: bool,
}

impl Args {
    fn to_config(&self) -> DemoConfig {
        DemoConfig {
            viewport_width: self.width,
            viewport_height: self.height,
            voxelization: VoxelizationConfig {
                voxel_texture_size: self.voxel_size,
                voxelization_sparsity: self.sparsity,
                automatically_voxelize: !self.no_auto_voxelize,
                automatically_regenerate_mipmap: !self.no_auto_mipmap,
                projection_mode: self.projection.to_runtime(),
            },
            settings: Settings {
                indirect_specular_light: self.indirect_specular_light,
                indirect_diffuse_light: self.indirect_diffuse_light,
                direct_light: self.direct_light,
                shadows: self.shadows,
            },
            rendering_mode: self.mode.to_runtime(),
            scene: self.scene.to_runtime(),
        }
    }
}

fn main() {
    let args = Args::parse();
    voxel_cone_tracing::run_with_config(args.to_config());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_demo_config() {
        let args = Args::try_parse_from(["voxel-cone-tracing"]).unwrap();
        assert_eq!(args.to_config(), DemoConfig::default());
    }

    #[test]
    fn flags_reach_the_config() {
        let args = Args::try_parse_from([
            "voxel-cone-tracing",
            "--voxel-size",
            "128",
            "--sparsity",
            "4",
            "--no-auto-mipmap",
            "--projection",
            "single-axis",
            "--mode",
            "visualization",
            "--scene",
            "glass",
            "--shadows",
            "false",
        ])
        .unwrap();
        let config = args.to_config();
        assert_eq!(config.voxelization.voxel_texture_size, 128);
        assert_eq!(config.voxelization.voxelization_sparsity, 4);
        assert!(config.voxelization.automatically_voxelize);
        assert!(!config.voxelization.automatically_regenerate_mipmap);
        assert_eq!(config.voxelization.projection_mode, ProjectionMode::SingleAxis);
        assert_eq!(config.rendering_mode, RenderingMode::VoxelizationVisualization);
        assert_eq!(config.scene, SceneKind::Glass);
        assert!(!config.settings.shadows);
        assert!(config.settings.direct_light);
    }
}
