//! Data interfaces and the providers they create.
//!
//! A [`DataInterface`] is a pluggable collaborator bound to kernel external
//! function slots by graph edges. The graph never constructs one; it only
//! calls the capability set below to assemble shader source, build shader
//! parameter metadata, and create per-dispatch [`DataProvider`]s from the
//! caller's binding objects.

pub mod metadata;

pub use metadata::{
    MetadataHandle, MetadataUseCase, ShaderParameterKind, ShaderParameterMember,
    ShaderParametersMetadata, ShaderParametersMetadataAllocations,
    ShaderParametersMetadataBuilder,
};

use crate::hash::HashBuilder;
use crate::kernel::{DefinitionSet, PermutationVector, ShaderFunctionDefinition};
use std::fmt;
use std::sync::Arc;

/// Class of binding object a data interface reads from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceType(pub String);

impl SourceType {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An object the caller binds to the graph at dispatch time (a mesh
/// component, a buffer owner, ...).
pub trait BindingObject: Send + Sync {
    fn type_name(&self) -> &str;

    fn is_a(&self, source_type: &SourceType) -> bool {
        self.type_name() == source_type.name()
    }

    /// Object that owns this binding, used to find sibling components.
    fn owner(&self) -> Option<Arc<dyn BindingOwner>> {
        None
    }
}

/// Owner of binding objects (an actor). Looked up when no binding object
/// matches a requested source type directly.
pub trait BindingOwner: Send + Sync {
    fn find_component(&self, source_type: &SourceType) -> Option<Arc<dyn BindingObject>>;
}

/// Runtime object that feeds one data interface's parameters for a dispatch.
pub trait DataProvider: Send + Sync {
    fn is_valid(&self) -> bool {
        true
    }
}

/// Capability set every data interface provides.
pub trait DataInterface: Send + Sync {
    /// Class name, used in the `DI<n>_<ClassName>_` symbol prefix
    fn class_name(&self) -> &str;

    /// Binding object classes this interface consumes, one per binding slot
    fn source_types(&self) -> Vec<SourceType> {
        Vec::new()
    }

    /// Functions kernels may read through
    fn supported_inputs(&self) -> Vec<ShaderFunctionDefinition>;

    /// Functions kernels may write through
    fn supported_outputs(&self) -> Vec<ShaderFunctionDefinition>;

    /// Append the HLSL fragment. Symbols may be prefixed with the `DI_UID` macro.
    fn hlsl(&self, out: &mut String);

    fn defines(&self, _defines: &mut DefinitionSet) {}

    fn permutations(&self, _permutations: &mut PermutationVector) {}

    /// Fold an opaque hash of everything that shapes the generated code.
    /// Must be stable across runs for identical semantics.
    fn shader_hash(&self, hash: &mut HashBuilder);

    /// Describe shader parameters under the unique name `uid`.
    fn shader_parameters(
        &self,
        uid: &str,
        builder: &mut ShaderParametersMetadataBuilder,
        allocations: &mut ShaderParametersMetadataAllocations,
    );

    /// The interface whose element count drives the dispatch size
    fn is_execution_interface(&self) -> bool {
        false
    }

    /// Bits of `input_mask`/`output_mask` are the data-interface function
    /// indices wired by at least one edge.
    fn create_data_provider(
        &self,
        bindings: &[Option<Arc<dyn BindingObject>>],
        input_mask: u64,
        output_mask: u64,
    ) -> Option<Box<dyn DataProvider>>;
}

/// Name of a data interface inside a kernel's generated source:
/// `DI<slot>_<ClassName>`.
pub fn unique_data_interface_name(slot: usize, class_name: &str) -> String {
    format!("DI{}_{}", slot, class_name)
}
