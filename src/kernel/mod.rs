//! Compute kernels and their sources.
//!
//! A [`ComputeKernel`] is one node in a compute graph. It refers to a
//! [`KernelSource`]: the entry point, thread group size, HLSL body, and the
//! external functions the body calls but does not define. Those external
//! functions are resolved by graph edges to data-interface functions.

pub mod permutation;
pub mod shader_type;

pub use permutation::{PermutationDomain, PermutationEntry, PermutationSet, PermutationVector};
pub use shader_type::{
    ShaderFunctionDefinition, ShaderFundamentalType, ShaderTypeDimension, ShaderValueType,
};

use crate::hash::HashBuilder;
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One `#define SYMBOL VALUE` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KernelDefinition {
    pub symbol: String,
    pub define: String,
}

/// Ordered set of preprocessor definitions. Re-defining a symbol replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefinitionSet {
    pub defines: Vec<KernelDefinition>,
}

impl DefinitionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, symbol: impl Into<String>, define: impl Into<String>) -> Self {
        self.add(symbol, define);
        self
    }

    pub fn add(&mut self, symbol: impl Into<String>, define: impl Into<String>) {
        let symbol = symbol.into();
        let define = define.into();
        match self.defines.iter_mut().find(|d| d.symbol == symbol) {
            Some(existing) => existing.define = define,
            None => self.defines.push(KernelDefinition { symbol, define }),
        }
    }

    pub fn get(&self, symbol: &str) -> Option<&str> {
        self.defines
            .iter()
            .find(|d| d.symbol == symbol)
            .map(|d| d.define.as_str())
    }

    pub fn len(&self) -> usize {
        self.defines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defines.is_empty()
    }

    /// `#define` block, one line per definition.
    pub fn to_hlsl(&self) -> String {
        let mut out = String::new();
        for d in &self.defines {
            out.push_str("#define ");
            out.push_str(&d.symbol);
            if !d.define.is_empty() {
                out.push(' ');
                out.push_str(&d.define);
            }
            out.push('\n');
        }
        out
    }

    pub fn append_to_hash(&self, hash: &mut HashBuilder) {
        hash.append(self.defines.len());
        for d in &self.defines {
            hash.append_str(&d.symbol).append_str(&d.define);
        }
    }
}

/// Contract every kernel source satisfies.
pub trait KernelSource: Send + Sync {
    fn entry_point(&self) -> &str;

    fn group_size(&self) -> [u32; 3];

    /// HLSL body
    fn source(&self) -> &str;

    fn external_inputs(&self) -> &[ShaderFunctionDefinition];

    fn external_outputs(&self) -> &[ShaderFunctionDefinition];

    fn definitions(&self) -> &DefinitionSet;

    fn permutations(&self) -> &PermutationSet;
}

/// Kernel source authored as plain text.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TextKernelSource {
    pub entry_point: String,
    pub group_size: [u32; 3],
    pub source: String,
    pub external_inputs: Vec<ShaderFunctionDefinition>,
    pub external_outputs: Vec<ShaderFunctionDefinition>,
    pub definitions: DefinitionSet,
    pub permutations: PermutationSet,
}

impl TextKernelSource {
    pub fn new(entry_point: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            entry_point: entry_point.into(),
            group_size: [64, 1, 1],
            source: source.into(),
            ..Default::default()
        }
    }

    pub fn with_group_size(mut self, group_size: [u32; 3]) -> Self {
        self.group_size = group_size;
        self
    }

    pub fn with_input(mut self, function: ShaderFunctionDefinition) -> Self {
        self.external_inputs.push(function);
        self
    }

    pub fn with_output(mut self, function: ShaderFunctionDefinition) -> Self {
        self.external_outputs.push(function);
        self
    }

    pub fn with_define(mut self, symbol: impl Into<String>, define: impl Into<String>) -> Self {
        self.definitions.add(symbol, define);
        self
    }

    pub fn with_permutation(mut self, domain: PermutationDomain) -> Self {
        self.permutations.domains.push(domain);
        self
    }
}

impl KernelSource for TextKernelSource {
    fn entry_point(&self) -> &str {
        &self.entry_point
    }

    fn group_size(&self) -> [u32; 3] {
        self.group_size
    }

    fn source(&self) -> &str {
        &self.source
    }

    fn external_inputs(&self) -> &[ShaderFunctionDefinition] {
        &self.external_inputs
    }

    fn external_outputs(&self) -> &[ShaderFunctionDefinition] {
        &self.external_outputs
    }

    fn definitions(&self) -> &DefinitionSet {
        &self.definitions
    }

    fn permutations(&self) -> &PermutationSet {
        &self.permutations
    }
}

bitflags! {
    /// Per-kernel flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct KernelFlags: u32 {
        /// Built-in kernel the renderer cannot run without. Compile failure is fatal.
        const IS_DEFAULT_KERNEL = 1 << 0;
    }
}

/// A kernel node in a compute graph.
#[derive(Clone, Default)]
pub struct ComputeKernel {
    pub kernel_source: Option<Arc<dyn KernelSource>>,
    pub flags: KernelFlags,
}

impl ComputeKernel {
    pub fn new(source: Arc<dyn KernelSource>) -> Self {
        Self {
            kernel_source: Some(source),
            flags: KernelFlags::empty(),
        }
    }

    pub fn with_flags(mut self, flags: KernelFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn source(&self) -> Option<&Arc<dyn KernelSource>> {
        self.kernel_source.as_ref()
    }
}

impl std::fmt::Debug for ComputeKernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComputeKernel")
            .field(
                "entry_point",
                &self.kernel_source.as_ref().map(|s| s.entry_point().to_string()),
            )
            .field("flags", &self.flags)
            .finish()
    }
}
