//! Compiled shader maps.
//!
//! A [`ShaderMap`] is the opaque compiled artifact for one kernel on one
//! shader platform: one compiled shader per permutation. It is immutable once
//! built and always shared behind an `Arc`.

use super::KernelResource;
use crate::error::Result;
use crate::graph::KernelCacheKey;
use crate::types::{FeatureLevel, ShaderPlatform};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Identity of a shader map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShaderMapId {
    pub key: KernelCacheKey,
    pub feature_level: FeatureLevel,
    pub shader_platform: ShaderPlatform,
}

/// Compiled output for one permutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledShader {
    pub permutation_id: u32,
    pub bytecode: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShaderMap {
    pub id: ShaderMapId,
    pub friendly_name: String,
    /// Number of permutations the map was compiled for
    pub permutation_count: u32,
    pub shaders: BTreeMap<u32, CompiledShader>,
}

impl ShaderMap {
    pub fn new(id: ShaderMapId, friendly_name: impl Into<String>, permutation_count: u32) -> Self {
        Self {
            id,
            friendly_name: friendly_name.into(),
            permutation_count,
            shaders: BTreeMap::new(),
        }
    }

    pub fn add_shader(&mut self, shader: CompiledShader) {
        self.shaders.insert(shader.permutation_id, shader);
    }

    pub fn shader(&self, permutation_id: u32) -> Option<&CompiledShader> {
        self.shaders.get(&permutation_id)
    }

    pub fn shader_platform(&self) -> ShaderPlatform {
        self.id.shader_platform
    }

    /// True if this map was built for the resource's current key and holds
    /// every permutation the resource needs. A resource that was never set
    /// up (cooked runtime data) accepts the map's own permutation count.
    pub fn is_complete(&self, resource: &KernelResource, silent: bool) -> bool {
        self.satisfies(resource.expected_shader_map().as_ref(), silent)
    }

    pub(crate) fn satisfies(&self, expected: Option<&ExpectedShaderMap>, silent: bool) -> bool {
        let Some(expected) = expected else {
            return self.permutation_count > 0
                && self.shaders.len() == self.permutation_count as usize;
        };

        if expected.key != self.id.key || expected.feature_level != self.id.feature_level {
            if !silent {
                tracing::warn!(
                    "Shader map '{}' was built for {:?}/{} but the resource expects {:?}/{}",
                    self.friendly_name,
                    self.id.key,
                    self.id.feature_level,
                    expected.key,
                    expected.feature_level
                );
            }
            return false;
        }

        let missing: Vec<u32> = expected
            .permutation_ids
            .iter()
            .copied()
            .filter(|id| !self.shaders.contains_key(id))
            .collect();
        if !missing.is_empty() {
            if !silent {
                tracing::warn!(
                    "Shader map '{}' is missing {} permutation(s): {:?}",
                    self.friendly_name,
                    missing.len(),
                    missing
                );
            }
            return false;
        }
        true
    }

    /// Cache payload encoding.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}

/// What a resource expects a shader map to satisfy.
#[derive(Debug, Clone)]
pub struct ExpectedShaderMap {
    pub key: KernelCacheKey,
    pub feature_level: FeatureLevel,
    pub permutation_ids: Vec<u32>,
}
