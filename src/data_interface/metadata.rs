//! Shader parameter metadata.
//!
//! Each data interface describes its shader-visible parameters by adding
//! members to a [`ShaderParametersMetadataBuilder`]. Built metadata is stored in
//! a [`ShaderParametersMetadataAllocations`] arena and referenced by
//! [`MetadataHandle`]; whoever owns the arena (a render proxy, a kernel
//! resource) bounds the lifetime of every handle into it.
//!
//! Layout follows constant-buffer packing: a member never straddles a 16-byte
//! row, arrays and nested structs start on a row, array elements occupy whole
//! rows, and resources (buffers) take no constant-buffer space.

use crate::kernel::ShaderValueType;
use serde::{Deserialize, Serialize};

const ROW_BYTES: usize = 16;

/// What a struct's metadata is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetadataUseCase {
    /// Top-level parameter struct bound to a kernel dispatch
    ShaderParameterStruct,
    /// Struct nested inside another parameter struct
    NestedStruct,
}

/// Index of a metadata object inside its allocations arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MetadataHandle(pub u32);

impl MetadataHandle {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Kind of a parameter member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShaderParameterKind {
    Scalar(ShaderValueType),
    Array {
        element: ShaderValueType,
        count: u32,
    },
    /// Read-only structured buffer
    BufferSrv(ShaderValueType),
    /// Read-write structured buffer
    BufferUav(ShaderValueType),
    NestedStruct(MetadataHandle),
}

impl ShaderParameterKind {
    pub fn is_resource(&self) -> bool {
        matches!(
            self,
            ShaderParameterKind::BufferSrv(_) | ShaderParameterKind::BufferUav(_)
        )
    }
}

/// One laid-out member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShaderParameterMember {
    pub name: String,
    pub kind: ShaderParameterKind,
    /// Byte offset in the constant buffer (0 for resources)
    pub offset: u32,
    /// Bytes occupied in the constant buffer (0 for resources)
    pub size: u32,
}

/// Immutable, laid-out parameter struct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShaderParametersMetadata {
    pub struct_name: String,
    pub use_case: MetadataUseCase,
    pub members: Vec<ShaderParameterMember>,
    /// Constant buffer size, multiple of 16
    pub size: u32,
}

impl ShaderParametersMetadata {
    pub fn member(&self, name: &str) -> Option<&ShaderParameterMember> {
        self.members.iter().find(|m| m.name == name)
    }

    pub fn resource_count(&self) -> usize {
        self.members.iter().filter(|m| m.kind.is_resource()).count()
    }
}

/// Arena owning metadata objects and the unique names they were built under.
#[derive(Debug, Default, Clone)]
pub struct ShaderParametersMetadataAllocations {
    pub names: Vec<String>,
    metadatas: Vec<ShaderParametersMetadata>,
}

impl ShaderParametersMetadataAllocations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_name(&mut self, name: impl Into<String>) -> &str {
        self.names.push(name.into());
        self.names.last().map(String::as_str).unwrap_or_default()
    }

    pub fn insert(&mut self, metadata: ShaderParametersMetadata) -> MetadataHandle {
        let handle = MetadataHandle(self.metadatas.len() as u32);
        self.metadatas.push(metadata);
        handle
    }

    pub fn get(&self, handle: MetadataHandle) -> Option<&ShaderParametersMetadata> {
        self.metadatas.get(handle.index())
    }

    pub fn len(&self) -> usize {
        self.metadatas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metadatas.is_empty()
    }
}

struct PendingMember {
    name: String,
    kind: ShaderParameterKind,
}

/// Collects members, then lays them out into a [`ShaderParametersMetadata`].
#[derive(Default)]
pub struct ShaderParametersMetadataBuilder {
    members: Vec<PendingMember>,
}

impl ShaderParametersMetadataBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_param(&mut self, name: impl Into<String>, ty: ShaderValueType) -> &mut Self {
        self.push(name, ShaderParameterKind::Scalar(ty))
    }

    pub fn add_array(
        &mut self,
        name: impl Into<String>,
        element: ShaderValueType,
        count: u32,
    ) -> &mut Self {
        self.push(name, ShaderParameterKind::Array { element, count })
    }

    pub fn add_buffer_srv(&mut self, name: impl Into<String>, element: ShaderValueType) -> &mut Self {
        self.push(name, ShaderParameterKind::BufferSrv(element))
    }

    pub fn add_buffer_uav(&mut self, name: impl Into<String>, element: ShaderValueType) -> &mut Self {
        self.push(name, ShaderParameterKind::BufferUav(element))
    }

    /// Nest a struct previously built into the same arena.
    pub fn add_nested_struct(&mut self, name: impl Into<String>, handle: MetadataHandle) -> &mut Self {
        self.push(name, ShaderParameterKind::NestedStruct(handle))
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    fn push(&mut self, name: impl Into<String>, kind: ShaderParameterKind) -> &mut Self {
        self.members.push(PendingMember {
            name: name.into(),
            kind,
        });
        self
    }

    /// Lay out the members. Nested struct sizes are read from `allocations`;
    /// an unknown handle contributes one empty row and is logged.
    pub fn build(
        self,
        use_case: MetadataUseCase,
        struct_name: impl Into<String>,
        allocations: &ShaderParametersMetadataAllocations,
    ) -> ShaderParametersMetadata {
        let struct_name = struct_name.into();
        let mut offset = 0usize;
        let mut members = Vec::with_capacity(self.members.len());

        for pending in self.members {
            let (align_to_row, size) = match &pending.kind {
                ShaderParameterKind::Scalar(ty) => (false, ty.size_bytes()),
                ShaderParameterKind::Array { count, .. } => (true, *count as usize * ROW_BYTES),
                ShaderParameterKind::NestedStruct(handle) => {
                    let size = match allocations.get(*handle) {
                        Some(nested) => nested.size as usize,
                        None => {
                            tracing::warn!(
                                "Struct '{}' nests unknown metadata {:?}",
                                struct_name,
                                handle
                            );
                            ROW_BYTES
                        }
                    };
                    (true, size)
                }
                ShaderParameterKind::BufferSrv(_) | ShaderParameterKind::BufferUav(_) => {
                    members.push(ShaderParameterMember {
                        name: pending.name,
                        kind: pending.kind,
                        offset: 0,
                        size: 0,
                    });
                    continue;
                }
            };

            let row_remaining = ROW_BYTES - (offset % ROW_BYTES);
            if align_to_row || (size > row_remaining && row_remaining != ROW_BYTES) {
                offset = offset.next_multiple_of(ROW_BYTES);
            }

            members.push(ShaderParameterMember {
                name: pending.name,
                kind: pending.kind,
                offset: offset as u32,
                size: size as u32,
            });
            offset += size;
        }

        ShaderParametersMetadata {
            struct_name,
            use_case,
            members,
            size: offset.next_multiple_of(ROW_BYTES) as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_members_do_not_straddle_rows() {
        let allocations = ShaderParametersMetadataAllocations::new();
        let mut builder = ShaderParametersMetadataBuilder::new();
        builder
            .add_param("A", ShaderValueType::float())
            .add_param("B", ShaderValueType::float3())
            .add_param("C", ShaderValueType::float());
        let metadata = builder.build(MetadataUseCase::ShaderParameterStruct, "Params", &allocations);

        assert_eq!(metadata.member("A").map(|m| m.offset), Some(0));
        assert_eq!(metadata.member("B").map(|m| m.offset), Some(4));
        assert_eq!(metadata.member("C").map(|m| m.offset), Some(16));
        assert_eq!(metadata.size, 32);
    }

    #[test]
    fn test_float4_after_scalar_moves_to_next_row() {
        let allocations = ShaderParametersMetadataAllocations::new();
        let mut builder = ShaderParametersMetadataBuilder::new();
        builder
            .add_param("Scale", ShaderValueType::float())
            .add_param("Color", ShaderValueType::float4());
        let metadata = builder.build(MetadataUseCase::ShaderParameterStruct, "Params", &allocations);
        assert_eq!(metadata.member("Color").map(|m| m.offset), Some(16));
        assert_eq!(metadata.size, 32);
    }

    #[test]
    fn test_resources_take_no_constant_space() {
        let allocations = ShaderParametersMetadataAllocations::new();
        let mut builder = ShaderParametersMetadataBuilder::new();
        builder
            .add_buffer_srv("Positions", ShaderValueType::float3())
            .add_buffer_uav("Output", ShaderValueType::float4())
            .add_param("Count", ShaderValueType::uint());
        let metadata = builder.build(MetadataUseCase::ShaderParameterStruct, "Params", &allocations);
        assert_eq!(metadata.resource_count(), 2);
        assert_eq!(metadata.member("Count").map(|m| m.offset), Some(0));
        assert_eq!(metadata.size, 16);
    }

    #[test]
    fn test_nested_struct_uses_arena_size() {
        let mut allocations = ShaderParametersMetadataAllocations::new();
        let mut inner = ShaderParametersMetadataBuilder::new();
        inner
            .add_param("X", ShaderValueType::float4())
            .add_param("Y", ShaderValueType::float());
        let inner = inner.build(MetadataUseCase::NestedStruct, "Inner", &allocations);
        assert_eq!(inner.size, 32);
        let handle = allocations.insert(inner);

        let mut outer = ShaderParametersMetadataBuilder::new();
        outer
            .add_param("Flag", ShaderValueType::uint())
            .add_nested_struct("DI0_Inner", handle);
        let outer = outer.build(MetadataUseCase::ShaderParameterStruct, "Outer", &allocations);
        assert_eq!(outer.member("DI0_Inner").map(|m| (m.offset, m.size)), Some((16, 32)));
        assert_eq!(outer.size, 48);
    }

    proptest! {
        #[test]
        fn test_layout_is_row_safe(widths in prop::collection::vec(1u8..=4, 0..24)) {
            let allocations = ShaderParametersMetadataAllocations::new();
            let mut builder = ShaderParametersMetadataBuilder::new();
            for (i, w) in widths.iter().enumerate() {
                let ty = if *w == 1 {
                    ShaderValueType::float()
                } else {
                    ShaderValueType::vector(crate::kernel::ShaderFundamentalType::Float, *w)
                };
                builder.add_param(format!("M{}", i), ty);
            }
            let metadata = builder.build(MetadataUseCase::ShaderParameterStruct, "P", &allocations);

            prop_assert_eq!(metadata.size % 16, 0);
            let mut last_end = 0;
            for m in &metadata.members {
                // Never straddles a row and never overlaps the previous member
                prop_assert_eq!(m.offset / 16, (m.offset + m.size - 1) / 16);
                prop_assert!(m.offset >= last_end);
                last_end = m.offset + m.size;
            }
            prop_assert!(last_end <= metadata.size);
        }
    }
}
