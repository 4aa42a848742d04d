//! Ortholog families (C1).
//!
//! A family is an unordered set of genes plus a set of external identifiers
//! giving its provenance. `merge_family` empties one family into another,
//! swapping containers by size first so the larger set is retained — this
//! keeps amortised merge cost linear in the total data moved, mirroring
//! `OrthologGroup::merge` in the source project.

use std::collections::BTreeSet;

use crate::gene::GeneHandle;

/// Opaque handle to an [`OrthologFamily`] owned by a [`crate::store::DomainStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FamilyHandle(pub(crate) u32);

/// `(source, id)` pair identifying a family's provenance in an external
/// ortholog database.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ExternalId {
    pub source: String,
    pub id: String,
}

/// An unordered set of genes presumed homologous, 1..N members.
#[derive(Debug)]
pub struct OrthologFamily {
    handle: FamilyHandle,
    genes: BTreeSet<GeneHandle>,
    external_ids: BTreeSet<ExternalId>,
}

impl OrthologFamily {
    pub fn new(handle: FamilyHandle) -> Self {
        OrthologFamily {
            handle,
            genes: BTreeSet::new(),
            external_ids: BTreeSet::new(),
        }
    }

    pub fn handle(&self) -> FamilyHandle {
        self.handle
    }

    pub fn genes(&self) -> impl Iterator<Item = &GeneHandle> {
        self.genes.iter()
    }

    pub fn len(&self) -> usize {
        self.genes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }

    pub fn contains(&self, gene: GeneHandle) -> bool {
        self.genes.contains(&gene)
    }

    pub fn external_ids(&self) -> impl Iterator<Item = &ExternalId> {
        self.external_ids.iter()
    }

    pub fn add_gene(&mut self, gene: GeneHandle) {
        self.genes.insert(gene);
    }

    pub fn add_external_id(&mut self, id: ExternalId) {
        self.external_ids.insert(id);
    }

    /// Moves `other`'s genes and external ids into `self`, swapping backing
    /// storage first so the larger container survives the merge and the
    /// smaller one is the one whose elements get inserted one by one.
    fn absorb(&mut self, other: &mut OrthologFamily) {
        if other.genes.len() > self.genes.len() {
            std::mem::swap(&mut self.genes, &mut other.genes);
        }
        self.genes.append(&mut other.genes);

        if other.external_ids.len() > self.external_ids.len() {
            std::mem::swap(&mut self.external_ids, &mut other.external_ids);
        }
        self.external_ids.append(&mut other.external_ids);
    }
}

/// Merges `b` into `a` in place given mutable access to both (the store
/// enforces `a != b` and performs the gene back-reference repoint and the
/// erase of `b` from its own arena).
pub fn merge_into(a: &mut OrthologFamily, b: &mut OrthologFamily) {
    a.absorb(b);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gene::GeneHandle;

    fn family_of(handle: u32, genes: &[u32]) -> OrthologFamily {
        let mut f = OrthologFamily::new(FamilyHandle(handle));
        for &g in genes {
            f.add_gene(GeneHandle(g));
        }
        f
    }

    /// `merge(a, b)` then reading `a` returns the disjoint union of the
    /// prior `a` and `b` (§8 round-trip property).
    #[test]
    fn merge_yields_disjoint_union() {
        let mut a = family_of(0, &[1, 2]);
        let mut b = family_of(1, &[2, 3]);
        merge_into(&mut a, &mut b);
        assert_eq!(a.len(), 3);
        for g in [1u32, 2, 3] {
            assert!(a.contains(GeneHandle(g)));
        }
        assert!(b.is_empty());
    }

    /// When `b` is larger, `absorb` swaps backing storage so the larger set
    /// survives as `self`'s own container (the amortised-merge design note).
    #[test]
    fn merge_retains_the_larger_side_as_backing_storage() {
        let mut small = family_of(0, &[1]);
        let mut large = family_of(1, &[2, 3, 4, 5]);
        merge_into(&mut small, &mut large);
        assert_eq!(small.len(), 5);
        for g in [1u32, 2, 3, 4, 5] {
            assert!(small.contains(GeneHandle(g)));
        }
    }

    #[test]
    fn external_ids_merge_too() {
        let mut a = family_of(0, &[1]);
        a.add_external_id(ExternalId { source: "db".to_string(), id: "f1".to_string() });
        let mut b = family_of(1, &[2]);
        b.add_external_id(ExternalId { source: "db".to_string(), id: "f2".to_string() });
        merge_into(&mut a, &mut b);
        assert_eq!(a.external_ids().count(), 2);
    }
}
