use super::{KernelResource, ShaderMap};
use crate::types::FeatureLevel;
use std::sync::Arc;

#[cfg(feature = "editor")]
use crate::types::ShaderPlatform;

/// One kernel resource slot per feature level.
#[derive(Debug, Default)]
pub struct KernelResourceSet {
    resources: [Option<Arc<KernelResource>>; FeatureLevel::COUNT],
    /// Shader maps read from disk, held until post-load installs them
    #[cfg(feature = "editor")]
    loaded_shader_maps: Vec<Arc<ShaderMap>>,
}

impl KernelResourceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Invalidate and release every resource in the set.
    pub fn reset(&mut self) {
        for slot in &mut self.resources {
            if let Some(resource) = slot.take() {
                resource.invalidate();
            }
        }
    }

    pub fn get(&self, feature_level: FeatureLevel) -> Option<&Arc<KernelResource>> {
        self.resources[feature_level.ordinal() as usize].as_ref()
    }

    pub fn get_or_create(&mut self, feature_level: FeatureLevel) -> Arc<KernelResource> {
        self.resources[feature_level.ordinal() as usize]
            .get_or_insert_with(|| Arc::new(KernelResource::new()))
            .clone()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<KernelResource>> {
        self.resources.iter().flatten()
    }

    /// Install a loaded shader map directly (runtime load path).
    pub fn install_shader_map(&mut self, map: ShaderMap) {
        let feature_level = map.id.feature_level;
        self.get_or_create(feature_level)
            .set_inline_shader_map(Arc::new(map));
    }

    #[cfg(feature = "editor")]
    pub fn store_loaded_shader_map(&mut self, map: ShaderMap) {
        self.loaded_shader_maps.push(Arc::new(map));
    }

    #[cfg(feature = "editor")]
    pub fn loaded_shader_map_count(&self) -> usize {
        self.loaded_shader_maps.len()
    }

    /// Install the stored shader maps built for `shader_platform`. Maps for
    /// other platforms are dropped.
    #[cfg(feature = "editor")]
    pub fn process_serialized_shader_maps(&mut self, shader_platform: ShaderPlatform) {
        for map in std::mem::take(&mut self.loaded_shader_maps) {
            if map.shader_platform() != shader_platform {
                continue;
            }
            self.get_or_create(map.id.feature_level)
                .set_inline_shader_map(map);
        }
    }
}
