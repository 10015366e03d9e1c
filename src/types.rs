//! Core platform types
//!
//! A compiled kernel is keyed along two axes:
//!
//! - [`FeatureLevel`] - the capability tier a shader is compiled against
//! - [`ShaderPlatform`] - the concrete shader format / RHI combination
//!
//! [`TargetPlatform`] describes a cook target: a named platform together with
//! every shader format it ships.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Rendering feature level, ordered from least to most capable
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub enum FeatureLevel {
    /// Mobile tier (ES 3.1 class)
    Es3_1,
    /// Desktop Shader Model 5
    #[default]
    Sm5,
    /// Desktop Shader Model 6
    Sm6,
}

impl FeatureLevel {
    /// Number of feature levels
    pub const COUNT: usize = 3;

    /// All feature levels in ordinal order
    pub const ALL: [FeatureLevel; Self::COUNT] =
        [FeatureLevel::Es3_1, FeatureLevel::Sm5, FeatureLevel::Sm6];

    /// Stable ordinal, folded into cache keys
    pub fn ordinal(self) -> u32 {
        match self {
            FeatureLevel::Es3_1 => 0,
            FeatureLevel::Sm5 => 1,
            FeatureLevel::Sm6 => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            FeatureLevel::Es3_1 => "ES3_1",
            FeatureLevel::Sm5 => "SM5",
            FeatureLevel::Sm6 => "SM6",
        }
    }
}

impl fmt::Display for FeatureLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Shader platform (shader format + RHI)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ShaderPlatform {
    #[default]
    PcD3dSm5,
    PcD3dSm6,
    VulkanSm5,
    VulkanEs3_1Android,
    MetalSm5,
    MetalEs3_1Ios,
}

impl ShaderPlatform {
    pub const ALL: [ShaderPlatform; 6] = [
        ShaderPlatform::PcD3dSm5,
        ShaderPlatform::PcD3dSm6,
        ShaderPlatform::VulkanSm5,
        ShaderPlatform::VulkanEs3_1Android,
        ShaderPlatform::MetalSm5,
        ShaderPlatform::MetalEs3_1Ios,
    ];

    /// The shader format name of this platform
    pub fn shader_format(self) -> &'static str {
        match self {
            ShaderPlatform::PcD3dSm5 => "PCD3D_SM5",
            ShaderPlatform::PcD3dSm6 => "PCD3D_SM6",
            ShaderPlatform::VulkanSm5 => "SF_VULKAN_SM5",
            ShaderPlatform::VulkanEs3_1Android => "SF_VULKAN_ES31_ANDROID",
            ShaderPlatform::MetalSm5 => "SF_METAL_SM5",
            ShaderPlatform::MetalEs3_1Ios => "SF_METAL",
        }
    }

    /// Resolve a shader format name back to its platform
    pub fn from_shader_format(format: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|platform| platform.shader_format() == format)
    }

    /// Highest feature level this platform can compile for
    pub fn max_feature_level(self) -> FeatureLevel {
        match self {
            ShaderPlatform::PcD3dSm6 => FeatureLevel::Sm6,
            ShaderPlatform::PcD3dSm5 | ShaderPlatform::VulkanSm5 | ShaderPlatform::MetalSm5 => {
                FeatureLevel::Sm5
            }
            ShaderPlatform::VulkanEs3_1Android | ShaderPlatform::MetalEs3_1Ios => {
                FeatureLevel::Es3_1
            }
        }
    }
}

impl fmt::Display for ShaderPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.shader_format())
    }
}

/// A cook target: platform identity plus every shader format it ships
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetPlatform {
    /// Platform identifier (e.g. "Windows", "Android")
    pub name: String,
    /// Targeted shader format names, in the order they are cooked
    pub shader_formats: Vec<String>,
}

impl TargetPlatform {
    pub fn new(name: impl Into<String>, shader_formats: &[&str]) -> Self {
        Self {
            name: name.into(),
            shader_formats: shader_formats.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Every targeted format that maps to a known shader platform
    pub fn shader_platforms(&self) -> Vec<ShaderPlatform> {
        self.shader_formats
            .iter()
            .filter_map(|format| {
                let platform = ShaderPlatform::from_shader_format(format);
                if platform.is_none() {
                    tracing::warn!(
                        "Target platform '{}' lists unknown shader format '{}'",
                        self.name,
                        format
                    );
                }
                platform
            })
            .collect()
    }
}
