use crate::resource::KernelResource;
use std::collections::HashMap;
use std::sync::Arc;

/// Kernel resources compiled for cook targets, held until the graph is saved.
///
/// Keyed by target platform name; each entry holds, per kernel slot, one
/// resource per shader format of the target.
#[derive(Debug, Default)]
pub struct PlatformCookStore {
    platforms: HashMap<String, Vec<Vec<Arc<KernelResource>>>>,
}

impl PlatformCookStore {
    pub fn insert(&mut self, target: String, per_kernel: Vec<Vec<Arc<KernelResource>>>) {
        self.platforms.insert(target, per_kernel);
    }

    pub fn contains(&self, target: &str) -> bool {
        self.platforms.contains_key(target)
    }

    pub fn get(&self, target: &str) -> Option<&Vec<Vec<Arc<KernelResource>>>> {
        self.platforms.get(target)
    }

    /// Every resource for `target` has finished compiling.
    pub fn is_loaded(&self, target: &str) -> bool {
        self.platforms.get(target).is_some_and(|per_kernel| {
            per_kernel
                .iter()
                .flatten()
                .all(|resource| resource.is_compilation_finished())
        })
    }

    pub fn remove(&mut self, target: &str) {
        if let Some(per_kernel) = self.platforms.remove(target) {
            for resource in per_kernel.iter().flatten() {
                resource.cancel_compilation();
            }
        }
    }

    pub fn clear(&mut self) {
        let targets: Vec<String> = self.platforms.keys().cloned().collect();
        for target in targets {
            self.remove(&target);
        }
    }

    pub fn len(&self) -> usize {
        self.platforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.platforms.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_remove() {
        let mut store = PlatformCookStore::default();
        store.insert(
            "Windows".to_string(),
            vec![vec![Arc::new(KernelResource::new())], Vec::new()],
        );
        assert!(store.contains("Windows"));
        assert!(store.is_loaded("Windows"));
        assert!(!store.is_loaded("Android"));

        store.insert("Android".to_string(), Vec::new());
        assert_eq!(store.len(), 2);
        store.remove("Windows");
        assert!(!store.contains("Windows"));
        store.clear();
        assert!(store.is_empty());
    }
}
