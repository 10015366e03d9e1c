//! Integration tests for cooking, archives and the file system cache

#![cfg(feature = "editor")]

mod common;

use common::builders::{context_with, single_kernel_graph, sync_context};
use common::mock_helpers::CountingCompiler;
use common::test_timeout;
use computegraph_rs::archive::{ArchiveHeader, ArchiveReader, ArchiveWriter};
use computegraph_rs::cache::{CacheKey, CacheRecordBuilder, FileSystemCacheBackend, RequestOwner, VALUE_ID};
use computegraph_rs::config::CacheBackendKind;
use computegraph_rs::resource::{KernelResourceState, ShaderMap};
use computegraph_rs::{ComputeGraphError, FrameworkConfig, ShaderPlatform, TargetPlatform};

fn windows() -> TargetPlatform {
    TargetPlatform::new("Windows", &["PCD3D_SM5", "PCD3D_SM6"])
}

// ==================== Cooking ====================

#[test]
fn test_cook_compiles_every_target_format() {
    let compiler = CountingCompiler::new();
    let (mut graph, _, _) = single_kernel_graph(sync_context(compiler.clone()));
    let target = windows();

    graph.begin_cache_for_cooked_platform_data(&target).expect("cook");
    assert!(graph.is_cached_cooked_platform_data_loaded(&target));
    assert_eq!(compiler.compile_count(), 2);

    let mut platforms: Vec<ShaderPlatform> =
        compiler.inputs().iter().map(|input| input.shader_platform).collect();
    platforms.sort_by_key(|p| p.shader_format());
    assert_eq!(platforms, vec![ShaderPlatform::PcD3dSm5, ShaderPlatform::PcD3dSm6]);
    assert!(compiler
        .inputs()
        .iter()
        .all(|input| input.target_platform.as_deref() == Some("Windows")));

    // A second request for the same target is a no-op
    graph.begin_cache_for_cooked_platform_data(&target).expect("cook again");
    assert_eq!(compiler.compile_count(), 2);
}

#[test]
fn test_cook_runs_without_rendering() {
    let mut config = FrameworkConfig::editor();
    config.compile.automation_testing = true;
    config.rhi.can_ever_render = false;
    let compiler = CountingCompiler::new();
    let (mut graph, _, _) = single_kernel_graph(context_with(config, compiler.clone()));

    graph.update_resources().expect("update resources");
    assert_eq!(compiler.compile_count(), 0);

    graph.begin_cache_for_cooked_platform_data(&windows()).expect("cook");
    assert_eq!(compiler.compile_count(), 2);
}

#[test]
fn test_cooked_archive_layout() {
    let (mut graph, _, _) = single_kernel_graph(sync_context(CountingCompiler::new()));
    let target = windows();
    graph.begin_cache_for_cooked_platform_data(&target).expect("cook");

    let bytes = graph.save_cooked(Vec::new(), &target).expect("save cooked");
    let mut archive = ArchiveReader::new(bytes.as_slice()).expect("open archive");
    assert!(archive.header().is_cooked());
    assert_eq!(archive.header().graph_name, "SingleKernel");
    assert_eq!(archive.header().target_platform.as_deref(), Some("Windows"));

    assert_eq!(archive.read_count().expect("kernel count"), 1);
    assert_eq!(archive.read_count().expect("map count"), 2);
    let sm5: Option<ShaderMap> = archive.read_value().expect("first map");
    let sm6: Option<ShaderMap> = archive.read_value().expect("second map");
    let sm5 = sm5.expect("compiled for SM5");
    let sm6 = sm6.expect("compiled for SM6");
    assert_eq!(sm5.shader_platform(), ShaderPlatform::PcD3dSm5);
    assert_eq!(sm6.shader_platform(), ShaderPlatform::PcD3dSm6);
    assert_ne!(sm5.id.key, sm6.id.key);
    assert_eq!(sm5.friendly_name, "SingleKernel/Main");
}

#[test]
fn test_save_cooked_requires_cooked_data() {
    let (mut graph, _, _) = single_kernel_graph(sync_context(CountingCompiler::new()));
    let target = windows();

    assert!(matches!(
        graph.save_cooked(Vec::new(), &target),
        Err(ComputeGraphError::Archive(_))
    ));

    graph.begin_cache_for_cooked_platform_data(&target).expect("cook");
    graph.clear_cached_cooked_platform_data(&target);
    assert!(!graph.is_cached_cooked_platform_data_loaded(&target));
    assert!(graph.save_cooked(Vec::new(), &target).is_err());

    let android = TargetPlatform::new("Android", &["SF_VULKAN_ES31_ANDROID"]);
    graph.begin_cache_for_cooked_platform_data(&target).expect("cook windows");
    graph.begin_cache_for_cooked_platform_data(&android).expect("cook android");
    graph.clear_all_cached_cooked_platform_data();
    assert!(!graph.is_cached_cooked_platform_data_loaded(&target));
    assert!(!graph.is_cached_cooked_platform_data_loaded(&android));
}

// ==================== Loading ====================

#[test]
fn test_load_cooked_archive_installs_current_platform() {
    let target = windows();
    let bytes = {
        let (mut graph, _, _) = single_kernel_graph(sync_context(CountingCompiler::new()));
        graph.begin_cache_for_cooked_platform_data(&target).expect("cook");
        graph.save_cooked(Vec::new(), &target).expect("save cooked")
    };

    let compiler = CountingCompiler::new();
    let (mut loaded, kernel, _) = single_kernel_graph(sync_context(compiler.clone()));
    loaded.load(bytes.as_slice()).expect("load");
    assert_eq!(
        loaded
            .kernel_resource_set(kernel)
            .map(|set| set.loaded_shader_map_count()),
        Some(2)
    );

    loaded.post_load().expect("post load");
    assert_eq!(
        loaded
            .kernel_resource_set(kernel)
            .map(|set| set.loaded_shader_map_count()),
        Some(0)
    );
    assert!(loaded.is_compiled());
    let resource = loaded.kernel_resource(kernel).expect("resource");
    let map = resource.game_thread_shader_map().expect("shader map");
    assert_eq!(map.shader_platform(), ShaderPlatform::PcD3dSm5);
    assert_eq!(loaded.render_proxy().map(|p| p.invocation_count()), Some(1));
}

#[test]
fn test_editor_save_round_trip() {
    let compiler = CountingCompiler::new();
    let context = sync_context(compiler.clone());
    let (graph, kernel, _) = single_kernel_graph(context.clone());
    let bytes = graph.save(Vec::new()).expect("save");

    let header = ArchiveReader::new(bytes.as_slice()).expect("open archive").header().clone();
    assert!(!header.is_cooked());
    assert!(header.cooked_at.is_none());

    let (mut loaded, _, _) = single_kernel_graph(context);
    loaded.load(bytes.as_slice()).expect("load");
    assert_eq!(
        loaded
            .kernel_resource_set(kernel)
            .map(|set| set.loaded_shader_map_count()),
        Some(0)
    );
    loaded.post_load().expect("post load");
    assert!(loaded.is_compiled());
    assert_eq!(compiler.compile_count(), 1);
}

#[test]
fn test_load_rejects_foreign_archives() {
    let (mut graph, _, _) = single_kernel_graph(sync_context(CountingCompiler::new()));

    assert!(graph.load(&b"not an archive"[..]).is_err());

    let mut header = ArchiveHeader::editor("SingleKernel");
    header.schema = uuid::Uuid::nil();
    let mut writer = ArchiveWriter::new(Vec::new(), &header).expect("writer");
    writer.write_count(0).expect("write count");
    let bytes = writer.finish().expect("finish");

    let err = graph.load(bytes.as_slice()).expect_err("schema mismatch");
    assert!(err.to_string().contains("schema"));
}

#[test]
fn test_load_rejects_more_kernels_than_the_graph_has() {
    let (mut graph, kernel, _) = single_kernel_graph(sync_context(CountingCompiler::new()));

    let header = ArchiveHeader::editor("SingleKernel");
    let mut writer = ArchiveWriter::new(Vec::new(), &header).expect("writer");
    writer.write_count(u32::MAX as usize).expect("write count");
    let bytes = writer.finish().expect("finish");

    assert!(matches!(
        graph.load(bytes.as_slice()),
        Err(ComputeGraphError::Archive(_))
    ));
    assert!(graph.kernel_resource_set(kernel).is_none());
}

// ==================== File system cache ====================

#[test]
fn test_filesystem_cache_survives_context() {
    let dir = tempfile::tempdir().expect("temp dir");
    let config = || {
        let mut config = FrameworkConfig::editor();
        config.compile.automation_testing = true;
        config.cache.backend = CacheBackendKind::Filesystem;
        config.cache.directory = Some(dir.path().to_path_buf());
        config
    };

    let first_compiler = CountingCompiler::new();
    {
        let context = context_with(config(), first_compiler.clone());
        let (mut graph, _, _) = single_kernel_graph(context.clone());
        graph.update_resources().expect("update resources");
        assert!(graph.is_compiled());
        assert!(context.wait_idle(test_timeout()));
        assert_eq!(context.cache().stats().puts, 1);
    }
    assert_eq!(first_compiler.compile_count(), 1);

    let second_compiler = CountingCompiler::new();
    let context = context_with(config(), second_compiler.clone());
    let (mut graph, _, _) = single_kernel_graph(context.clone());
    graph.update_resources().expect("update resources");

    assert!(graph.is_compiled());
    assert_eq!(second_compiler.compile_count(), 0);
    assert_eq!(context.cache().stats().hits, 1);
}

#[test]
fn test_filesystem_cache_ignores_other_platforms() {
    let dir = tempfile::tempdir().expect("temp dir");
    let config = |shader_platform| {
        let mut config = FrameworkConfig::editor();
        config.compile.automation_testing = true;
        config.rhi.shader_platform = shader_platform;
        config.cache.backend = CacheBackendKind::Filesystem;
        config.cache.directory = Some(dir.path().to_path_buf());
        config
    };

    let compiler = CountingCompiler::new();
    {
        let context = context_with(config(ShaderPlatform::PcD3dSm5), compiler.clone());
        let (mut graph, _, _) = single_kernel_graph(context.clone());
        graph.update_resources().expect("update resources");
        assert!(context.wait_idle(test_timeout()));
    }

    let context = context_with(config(ShaderPlatform::VulkanSm5), compiler.clone());
    let (mut graph, _, _) = single_kernel_graph(context);
    graph.update_resources().expect("update resources");
    assert!(graph.is_compiled());
    assert_eq!(compiler.compile_count(), 2);
}

#[test]
fn test_corrupt_cache_record_is_recompiled() {
    let dir = tempfile::tempdir().expect("temp dir");
    let config = || {
        let mut config = FrameworkConfig::editor();
        config.compile.automation_testing = true;
        config.cache.backend = CacheBackendKind::Filesystem;
        config.cache.directory = Some(dir.path().to_path_buf());
        config
    };

    let record_path = {
        let context = context_with(config(), CountingCompiler::new());
        let (mut graph, kernel, _) = single_kernel_graph(context.clone());
        graph.update_resources().expect("update resources");
        assert!(context.wait_idle(test_timeout()));

        let key = graph
            .kernel_cache_key(kernel)
            .expect("assemble kernel")
            .expect("enabled kernel");
        let backend = FileSystemCacheBackend::new(dir.path(), context.workers().clone())
            .expect("backend");
        backend.record_path(&CacheKey::kernel(*key.digest()))
    };
    assert!(record_path.exists());
    std::fs::write(&record_path, b"truncated record").expect("corrupt record");

    let compiler = CountingCompiler::new();
    let context = context_with(config(), compiler.clone());
    let (mut graph, kernel, _) = single_kernel_graph(context.clone());
    graph.update_resources().expect("update resources");

    assert_eq!(compiler.compile_count(), 1);
    assert_eq!(context.cache().stats().errors, 1);
    let resource = graph.kernel_resource(kernel).expect("resource");
    assert_eq!(resource.state(), KernelResourceState::Complete);
    assert!(graph.is_compiled());
}

#[test]
fn test_undecodable_cached_shader_map_is_recompiled() {
    let compiler = CountingCompiler::new();
    let context = sync_context(compiler.clone());
    let (mut graph, kernel, _) = single_kernel_graph(context.clone());

    let key = graph
        .kernel_cache_key(kernel)
        .expect("assemble kernel")
        .expect("enabled kernel");
    let owner = RequestOwner::new();
    context.cache().put(
        CacheRecordBuilder::new(CacheKey::kernel(*key.digest()))
            .add_value(VALUE_ID, b"not a shader map".to_vec()),
        &owner,
    );
    assert!(context.wait_idle(test_timeout()));

    graph.update_resources().expect("update resources");

    assert_eq!(context.cache().stats().hits, 1);
    assert_eq!(compiler.compile_count(), 1);
    let resource = graph.kernel_resource(kernel).expect("resource");
    assert_eq!(resource.state(), KernelResourceState::Complete);
    assert!(graph.is_compiled());
}
