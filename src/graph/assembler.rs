//! Kernel shader source assembly.
//!
//! One source string is produced per kernel invocation:
//!
//! 1. the kernel's `#define` block,
//! 2. each distinct bound data interface's HLSL fragment in slot order,
//!    wrapped in `#define DI_UID DI<n>_<ClassName>_` / `#undef DI_UID`,
//! 3. one shim per incident edge forwarding the kernel's external function to
//!    the data interface's implementation,
//! 4. the kernel body verbatim.
//!
//! Data-interface defines and permutation domains are folded in while walking
//! step 2, so the permutation vector holds kernel domains first and then each
//! data interface's domains by slot. That order feeds the cache key.
//!
//! `<n>` is the interface's slot: its position among the kernel's bound
//! interfaces ordered by kernel binding (inputs first). The graph-wide index
//! is never emitted, so adding interfaces in another order keeps the key.

use super::id::KernelIndex;
use super::validate::kernel_data_interface_slots;
use super::GraphEdge;
use crate::data_interface::{unique_data_interface_name, DataInterface};
use crate::error::{ComputeGraphError, Result};
use crate::hash::HashBuilder;
use crate::kernel::{DefinitionSet, KernelSource, PermutationVector, ShaderFunctionDefinition};
use std::fmt::Write as _;
use std::sync::Arc;

/// Output of [`ShaderSourceAssembler::assemble`].
#[derive(Debug, Clone)]
pub struct AssembledKernel {
    pub source: String,
    pub definitions: DefinitionSet,
    pub permutation_vector: PermutationVector,
    /// Data-interface hashes, the assembled source, the final definition set
    /// and the permutation vector, in that order.
    pub partial_hash: HashBuilder,
}

pub struct ShaderSourceAssembler;

impl ShaderSourceAssembler {
    pub fn assemble(
        kernel_index: KernelIndex,
        kernel_source: &dyn KernelSource,
        data_interfaces: &[Option<Arc<dyn DataInterface>>],
        edges: &[GraphEdge],
    ) -> Result<AssembledKernel> {
        let mut definitions = kernel_source.definitions().clone();
        let mut permutation_vector = PermutationVector::new();
        permutation_vector.add_permutation_set(kernel_source.permutations());
        let mut partial_hash = HashBuilder::new();

        let mut hlsl = definitions.to_hlsl();

        let slots = kernel_data_interface_slots(edges, kernel_index);
        for (slot, &di_index) in slots.iter().enumerate() {
            let Some(data_interface) = data_interfaces.get(di_index).and_then(Option::as_ref) else {
                continue;
            };
            let uid = unique_data_interface_name(slot, data_interface.class_name());
            let _ = writeln!(hlsl, "#define DI_UID {}_", uid);
            data_interface.hlsl(&mut hlsl);
            if !hlsl.ends_with('\n') {
                hlsl.push('\n');
            }
            hlsl.push_str("#undef DI_UID\n");

            data_interface.defines(&mut definitions);
            data_interface.permutations(&mut permutation_vector);
            data_interface.shader_hash(&mut partial_hash);
        }

        let mut incident: Vec<&GraphEdge> = edges
            .iter()
            .filter(|e| e.kernel_index == kernel_index)
            .collect();
        let slot_of = |di_index: usize| slots.iter().position(|&s| s == di_index).unwrap_or(usize::MAX);
        incident.sort_by_key(|e| {
            (
                !e.is_kernel_input,
                e.kernel_binding_index,
                slot_of(e.data_interface_index.index()),
                e.data_interface_binding_index,
            )
        });

        for edge in incident {
            let di_index = edge.data_interface_index.index();
            let slot = slot_of(di_index);
            let Some(data_interface) = data_interfaces.get(di_index).and_then(Option::as_ref) else {
                continue;
            };
            let (kernel_functions, di_functions) = if edge.is_kernel_input {
                (kernel_source.external_inputs(), data_interface.supported_inputs())
            } else {
                (kernel_source.external_outputs(), data_interface.supported_outputs())
            };
            let wrap = kernel_functions
                .get(edge.kernel_binding_index as usize)
                .ok_or_else(|| {
                    ComputeGraphError::Authoring(format!(
                        "kernel '{}' has no external function at binding {}",
                        kernel_source.entry_point(),
                        edge.kernel_binding_index
                    ))
                })?;
            let implementation = di_functions
                .get(edge.data_interface_binding_index as usize)
                .ok_or_else(|| {
                    ComputeGraphError::Authoring(format!(
                        "data interface '{}' has no function at binding {}",
                        data_interface.class_name(),
                        edge.data_interface_binding_index
                    ))
                })?;
            let uid = unique_data_interface_name(slot, data_interface.class_name());
            write_function_shim(
                implementation,
                wrap,
                &uid,
                edge.binding_function_name_override.as_deref(),
                &mut hlsl,
            );
        }

        hlsl.push_str(kernel_source.source());

        partial_hash.append_str(&hlsl);
        definitions.append_to_hash(&mut partial_hash);
        permutation_vector.append_to_hash(&mut partial_hash);

        Ok(AssembledKernel {
            source: hlsl,
            definitions,
            permutation_vector,
            partial_hash,
        })
    }
}

/// `ret name(T0 P0, ...) { return UID_impl(P0, ...); }` using the kernel-side signature.
fn write_function_shim(
    implementation: &ShaderFunctionDefinition,
    wrap: &ShaderFunctionDefinition,
    uid: &str,
    name_override: Option<&str>,
    out: &mut String,
) {
    let return_type = wrap
        .return_type
        .map(|t| t.type_declaration())
        .unwrap_or_else(|| "void".to_string());
    let name = name_override
        .filter(|n| !n.is_empty())
        .unwrap_or(&wrap.name);

    let params: Vec<String> = wrap
        .param_types
        .iter()
        .enumerate()
        .map(|(i, t)| format!("{} P{}", t.type_declaration(), i))
        .collect();
    let args: Vec<String> = (0..wrap.param_types.len()).map(|i| format!("P{}", i)).collect();

    let _ = writeln!(
        out,
        "{} {}({}) {{ {}{}_{}({}); }}",
        return_type,
        name,
        params.join(", "),
        if wrap.return_type.is_some() { "return " } else { "" },
        uid,
        implementation.name,
        args.join(", ")
    );
}
