use thiserror::Error;

/// Invalid demo configuration, detected before any GPU work is issued.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("voxel texture size must be a non-zero power of two, got {0}")]
    VoxelSizeNotPowerOfTwo(u32),

    #[error("voxel texture size {size} exceeds the supported maximum of {max}")]
    VoxelSizeTooLarge { size: u32, max: u32 },

    #[error("voxel texture size must be at least 2 to have a mip pyramid, got {0}")]
    VoxelSizeTooSmall(u32),

    #[error("voxelization sparsity must be at least 1")]
    ZeroSparsity,

    #[error("viewport must be non-empty, got {width}x{height}")]
    EmptyViewport { width: u32, height: u32 },
}

/// Fatal start-up failure. There is no recovery path; the demo logs it and exits.
#[derive(Error, Debug)]
pub enum InitError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to find an appropriate GPU adapter")]
    NoAdapter,

    #[error("failed to create GPU device: {0}")]
    DeviceCreation(String),

    #[error("failed to create window surface: {0}")]
    SurfaceCreation(String),

    #[error("surface is not supported by the selected adapter")]
    SurfaceUnsupported,

    #[error("failed to create window: {0}")]
    Window(String),

    #[error("a {size}³ voxel volume exceeds the device's 3D texture limit of {max}")]
    VolumeTextureTooLarge { size: u32, max: u32 },

    #[error("a {size}³ voxel volume needs a {bytes} byte accumulation buffer, the device allows {limit}")]
    AccumulationBufferTooLarge { size: u32, bytes: u64, limit: u64 },
}

/// Failure to copy voxel data back to the CPU.
#[derive(Error, Debug)]
pub enum ReadbackError {
    #[error("buffer mapping failed: {0}")]
    BufferMapping(String),
}
