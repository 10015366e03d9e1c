//! Compile-time permutation domains.
//!
//! A [`PermutationVector`] is the ordered union of the domains contributed by a
//! kernel source and each of its bound data interfaces. Each domain gets a bit
//! range; a permutation id packs one value per domain into those bits.
//!
//! Domain order is part of the cache key contract: kernel domains first, then
//! data-interface domains in kernel binding order.
//!
//! Ids are 32 bits wide. A domain that would not fit is rejected.

use crate::hash::HashBuilder;
use serde::{Deserialize, Serialize};

/// Width of a permutation id
pub const MAX_PERMUTATION_BITS: u32 = u32::BITS;

/// One named compile-time option.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PermutationDomain {
    pub name: String,
    /// Number of values (2 for a boolean domain)
    pub value_count: u32,
}

impl PermutationDomain {
    pub fn boolean(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value_count: 2,
        }
    }

    pub fn int(name: impl Into<String>, value_count: u32) -> Self {
        Self {
            name: name.into(),
            value_count: value_count.max(1),
        }
    }

    fn bit_count(&self) -> u32 {
        // ceil(log2(value_count))
        32 - (self.value_count.max(1) - 1).leading_zeros()
    }
}

/// The permutation domains a kernel source declares.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermutationSet {
    pub domains: Vec<PermutationDomain>,
}

impl PermutationSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, domain: PermutationDomain) -> Self {
        self.domains.push(domain);
        self
    }
}

/// A domain placed in the vector's bit layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermutationEntry {
    pub domain: PermutationDomain,
    pub bit_offset: u32,
}

/// Ordered, de-duplicated set of permutation domains with a packed bit layout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermutationVector {
    entries: Vec<PermutationEntry>,
    bit_count: u32,
}

impl PermutationVector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a domain. A domain already present keeps its first definition.
    ///
    /// Returns false if the domain was rejected because the vector's ids or
    /// permutation count would no longer fit in 32 bits.
    pub fn add_permutation(&mut self, domain: PermutationDomain) -> bool {
        if let Some(existing) = self.find(&domain.name) {
            if existing.domain.value_count != domain.value_count {
                tracing::warn!(
                    "Permutation '{}' re-declared with {} values (kept {})",
                    domain.name,
                    domain.value_count,
                    existing.domain.value_count
                );
            }
            return true;
        }

        let bit_count = self.bit_count + domain.bit_count();
        let fits = bit_count <= MAX_PERMUTATION_BITS
            && self
                .checked_permutation_count()
                .and_then(|count| count.checked_mul(domain.value_count))
                .is_some();
        if !fits {
            tracing::warn!(
                "Permutation '{}' with {} values does not fit in {} bits ({} in use), ignored",
                domain.name,
                domain.value_count,
                MAX_PERMUTATION_BITS,
                self.bit_count
            );
            return false;
        }

        let bit_offset = self.bit_count;
        self.bit_count = bit_count;
        self.entries.push(PermutationEntry { domain, bit_offset });
        true
    }

    pub fn add_permutation_set(&mut self, set: &PermutationSet) {
        for domain in &set.domains {
            self.add_permutation(domain.clone());
        }
    }

    pub fn find(&self, name: &str) -> Option<&PermutationEntry> {
        self.entries.iter().find(|e| e.domain.name == name)
    }

    pub fn entries(&self) -> &[PermutationEntry] {
        &self.entries
    }

    /// Domain names in vector order
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.domain.name.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn bit_count(&self) -> u32 {
        self.bit_count
    }

    /// Number of distinct permutations (product of all domain sizes)
    pub fn permutation_count(&self) -> u32 {
        self.checked_permutation_count().unwrap_or(u32::MAX).max(1)
    }

    fn checked_permutation_count(&self) -> Option<u32> {
        self.entries
            .iter()
            .try_fold(1u32, |count, e| count.checked_mul(e.domain.value_count))
    }

    /// Every valid permutation id, ascending.
    pub fn permutation_ids(&self) -> Vec<u32> {
        let mut ids = vec![0u32];
        for entry in &self.entries {
            let mut next = Vec::with_capacity(ids.len() * entry.domain.value_count as usize);
            for id in &ids {
                for value in 0..entry.domain.value_count {
                    next.push(id | shift_left(value, entry.bit_offset));
                }
            }
            ids = next;
        }
        ids.sort_unstable();
        ids
    }

    /// Pack one value for a named domain into a permutation id.
    pub fn set_value(&self, permutation_id: u32, name: &str, value: u32) -> Option<u32> {
        let entry = self.find(name)?;
        if value >= entry.domain.value_count {
            return None;
        }
        let mask = ((1u64 << entry.domain.bit_count()) - 1) as u32;
        Some(
            (permutation_id & !shift_left(mask, entry.bit_offset))
                | shift_left(value, entry.bit_offset),
        )
    }

    /// Value of a named domain in a permutation id.
    pub fn value(&self, permutation_id: u32, name: &str) -> Option<u32> {
        let entry = self.find(name)?;
        let mask = ((1u64 << entry.domain.bit_count()) - 1) as u32;
        Some(permutation_id.checked_shr(entry.bit_offset).unwrap_or(0) & mask)
    }

    /// `#define` pairs selecting the given permutation, in vector order.
    pub fn defines_for(&self, permutation_id: u32) -> Vec<(String, String)> {
        self.entries
            .iter()
            .map(|e| {
                let value = self.value(permutation_id, &e.domain.name).unwrap_or(0);
                (e.domain.name.clone(), value.to_string())
            })
            .collect()
    }

    /// Fold the ordered domain list into a hash.
    pub fn append_to_hash(&self, hash: &mut HashBuilder) {
        hash.append(self.entries.len());
        for entry in &self.entries {
            hash.append_str(&entry.domain.name);
            hash.append(entry.domain.value_count);
        }
    }
}

/// A single-value domain may sit at offset 32; it only ever packs zero.
fn shift_left(value: u32, bit_offset: u32) -> u32 {
    value.checked_shl(bit_offset).unwrap_or(0)
}
