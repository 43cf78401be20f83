/// Sampler trait and sampler descriptor

use std::any::Any;

/// Texel filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Filter {
    Nearest,
    #[default]
    Linear,
}

/// Mip selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MipFilter {
    /// Only sample mip 0
    #[default]
    Base,
    Nearest,
    Linear,
}

/// Behaviour outside [0, 1] texture coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AddressMode {
    #[default]
    ClampToEdge,
    Repeat,
    MirroredRepeat,
}

/// Descriptor for creating a sampler; also the sampler cache key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SamplerDesc {
    pub label: String,
    pub min_filter: Filter,
    pub mag_filter: Filter,
    pub mip_filter: MipFilter,
    pub address_mode_u: AddressMode,
    pub address_mode_v: AddressMode,
    pub address_mode_w: AddressMode,
}

/// Sampler resource trait
pub trait Sampler: Send + Sync {
    fn desc(&self) -> &SamplerDesc;

    fn is_valid(&self) -> bool;

    /// Backend downcast hook
    fn as_any(&self) -> &dyn Any;
}
