//! # computegraph-rs: Compute Graph Kernel Cache
//!
//! Turns authored compute graphs (kernels wired to data interfaces) into
//! compiled, cached shader maps and publishes them to the render thread.
//!
//! ## Architecture
//!
//! - **Graph**: authoring model, validation, source assembly and cache keys
//! - **Resources**: one [`resource::KernelResource`] per kernel and feature
//!   level, owning the compiled shader map
//! - **Cache**: content-addressed shader map store (memory or file system)
//!   served by a worker pool
//! - **Compile**: scheduling policy and the external shader compiler seam
//! - **Render**: a dedicated render thread and immutable render proxies,
//!   swapped by pointer and released on the render thread
//!
//! ## Build Features
//!
//! `editor` (default) enables source assembly, key derivation, caching,
//! compiling and cooking. Without it the crate only loads cooked shader maps
//! and publishes render proxies.
//!
//! ## Example
//!
//! ```ignore
//! use computegraph_rs::{
//!     config::FrameworkConfig,
//!     context::ComputeFrameworkContext,
//!     graph::{ComputeGraph, GraphEdge},
//! };
//!
//! computegraph_rs::logging::init();
//!
//! let context = ComputeFrameworkContext::builder(FrameworkConfig::editor())
//!     .with_compiler(Arc::new(MyShaderCompiler::default()))
//!     .build()?;
//!
//! let mut graph = ComputeGraph::new("Deformer", context);
//! let kernel = graph.add_kernel(kernel);
//! let buffer = graph.add_data_interface(buffer);
//! graph.add_edge(GraphEdge::input(kernel, 0, buffer, 0));
//! graph.validate()?;
//! graph.update_resources()?;
//!
//! let proxy = graph.render_proxy();
//! ```

pub mod archive;
pub mod config;
pub mod context;
pub mod data_interface;
pub mod error;
pub mod graph;
pub mod hash;
pub mod kernel;
pub mod logging;
pub mod render;
pub mod resource;
pub mod types;

#[cfg(feature = "editor")]
pub mod cache;
#[cfg(feature = "editor")]
pub mod compile;
#[cfg(feature = "editor")]
pub mod worker;

// Re-export commonly used types
pub use config::FrameworkConfig;
pub use context::ComputeFrameworkContext;
pub use error::{ComputeGraphError, Result};
pub use graph::{ComputeGraph, GraphEdge, KernelCacheKey};
pub use resource::KernelResource;
pub use types::{FeatureLevel, ShaderPlatform, TargetPlatform};
