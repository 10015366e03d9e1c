//! Cache key derivation.
//!
//! The partial hash from source assembly is combined with a schema version
//! and the compilation context into the final content-addressed key. Bump
//! [`SCHEMA_VERSION`] whenever anything that feeds the key changes shape,
//! including the permutation-vector ordering rule.

use crate::hash::Digest;
use serde::{Deserialize, Serialize};
use std::fmt;

#[cfg(feature = "editor")]
use crate::hash::HashBuilder;
#[cfg(feature = "editor")]
use crate::types::{FeatureLevel, ShaderPlatform};
use uuid::Uuid;

/// Version of the key layout and of the cached shader map payload.
/// Archives carry it too, so cooked data from an older layout is rejected.
pub const SCHEMA_VERSION: Uuid = Uuid::from_u128(0x6a1f_3c52_9be4_4d07_8e21_c0f5_7d3a_b914);

/// Final content-addressed key of one kernel compilation.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct KernelCacheKey(pub Digest);

impl KernelCacheKey {
    pub fn digest(&self) -> &Digest {
        &self.0
    }

    /// Hex string form
    pub fn to_key_string(&self) -> String {
        self.0.to_hex()
    }
}

impl fmt::Debug for KernelCacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KernelCacheKey({})", &self.0.to_hex()[..16])
    }
}

impl fmt::Display for KernelCacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Compilation context folded into every key.
#[cfg(feature = "editor")]
#[derive(Debug, Clone)]
pub struct KeyContext<'a> {
    pub entry_point: &'a str,
    pub shader_platform: ShaderPlatform,
    pub feature_level: FeatureLevel,
    /// Shader formats of the cook target, empty outside of cooking
    pub cooked_formats: &'a [String],
}

#[cfg(feature = "editor")]
pub struct KeyDeriver;

#[cfg(feature = "editor")]
impl KeyDeriver {
    pub fn derive(partial_hash: &HashBuilder, context: &KeyContext<'_>) -> KernelCacheKey {
        let mut hash = HashBuilder::new();
        hash.append_bytes(SCHEMA_VERSION.as_bytes())
            .append_digest(&partial_hash.finalize())
            .append_str(context.entry_point)
            .append_str(context.shader_platform.shader_format())
            .append(context.feature_level.ordinal())
            .append(context.cooked_formats.len());
        for format in context.cooked_formats {
            hash.append_str(format);
        }
        KernelCacheKey(hash.finalize())
    }
}

#[cfg(all(test, feature = "editor"))]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn context(entry_point: &str) -> KeyContext<'_> {
        KeyContext {
            entry_point,
            shader_platform: ShaderPlatform::PcD3dSm5,
            feature_level: FeatureLevel::Sm5,
            cooked_formats: &[],
        }
    }

    #[test]
    fn test_context_changes_key() {
        let mut partial = HashBuilder::new();
        partial.append_str("source");
        let base = KeyDeriver::derive(&partial, &context("Main"));

        assert_ne!(base, KeyDeriver::derive(&partial, &context("Other")));

        let mut sm6 = context("Main");
        sm6.feature_level = FeatureLevel::Sm6;
        assert_ne!(base, KeyDeriver::derive(&partial, &sm6));

        let formats = vec!["PCD3D_SM5".to_string()];
        let mut cooked = context("Main");
        cooked.cooked_formats = &formats;
        assert_ne!(base, KeyDeriver::derive(&partial, &cooked));
    }

    proptest! {
        #[test]
        fn test_key_is_deterministic(source in ".{0,64}", entry in "[A-Za-z]{1,12}") {
            let mut a = HashBuilder::new();
            a.append_str(&source);
            let mut b = HashBuilder::new();
            b.append_str(&source);
            prop_assert_eq!(
                KeyDeriver::derive(&a, &context(&entry)),
                KeyDeriver::derive(&b, &context(&entry))
            );
        }

        #[test]
        fn test_source_change_changes_key(source in ".{0,64}", suffix in ".{1,8}") {
            let mut a = HashBuilder::new();
            a.append_str(&source);
            let mut b = HashBuilder::new();
            b.append_str(&format!("{}{}", source, suffix));
            prop_assert_ne!(
                KeyDeriver::derive(&a, &context("Main")),
                KeyDeriver::derive(&b, &context("Main"))
            );
        }
    }
}
