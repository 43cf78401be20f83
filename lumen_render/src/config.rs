//! Renderer configuration shared by the core encoder and its backends

/// Encoder-session configuration
///
/// # Example
///
/// ```no_run
/// use lumen_render::lumen::Config;
///
/// let config = Config {
///     enable_validation: true,
///     ..Config::default()
/// };
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Emit debug groups and object names (needs validation / debug-utils)
    pub enable_validation: bool,

    /// Capacity of one encoder's tracked-resource set
    pub max_tracked_resources: usize,

    /// Descriptor sets per descriptor pool before a new pool is grown
    pub descriptor_pool_max_sets: u32,

    /// Prefix used when naming encoder-owned objects
    pub app_name: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enable_validation: cfg!(debug_assertions),
            max_tracked_resources: 65_536,
            descriptor_pool_max_sets: 1024,
            app_name: "lumen".to_string(),
        }
    }
}
