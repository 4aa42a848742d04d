//! The domain store (C1): an arena that exclusively owns genes, gene
//! collections, ortholog families, expression matrices and clusterings, and
//! enforces the invariants of §3/§8.
//!
//! Entities are referred to by stable opaque handles rather than shared
//! pointers/back-references, per the "shared references via arena + handle"
//! design note: back-references become handle sets owned by the arena
//! (`family_of_gene` is inverted via `Gene::families`), and a family merge
//! updates every back-reference of the absorbed family before erasing it.

use std::collections::{HashMap, HashSet};

use log::warn;

use crate::error::{Error, Result};
use crate::family::{ExternalId, FamilyHandle, OrthologFamily};
use crate::gene::{fold_case, CollectionHandle, Gene, GeneCollection, GeneHandle, ParsedName};
use crate::matrix::{ExpressionMatrix, MatrixHandle};

pub struct DomainStore {
    collections: Vec<GeneCollection>,
    collection_by_name: HashMap<String, CollectionHandle>,
    unknown_collection: CollectionHandle,

    genes: Vec<Gene>,
    gene_by_collection_and_name: HashMap<(CollectionHandle, String), GeneHandle>,

    families: Vec<Option<OrthologFamily>>,

    matrices: Vec<ExpressionMatrix>,
    gene_matrix: HashMap<GeneHandle, MatrixHandle>,

    highly_similar: Vec<(GeneHandle, GeneHandle)>,
}

/// Outcome of resolving a raw gene name against the registered collections.
pub enum Resolution {
    Gene(GeneHandle),
    NotFound,
    UnsupportedVariant { gene: String, variant: u32 },
}

impl DomainStore {
    pub fn new() -> Self {
        let mut store = DomainStore {
            collections: Vec::new(),
            collection_by_name: HashMap::new(),
            unknown_collection: CollectionHandle(0),
            genes: Vec::new(),
            gene_by_collection_and_name: HashMap::new(),
            families: Vec::new(),
            matrices: Vec::new(),
            gene_matrix: HashMap::new(),
            highly_similar: Vec::new(),
        };
        let unknown_handle = store.next_collection_handle();
        let unknown = GeneCollection::unknown(unknown_handle);
        store.collection_by_name
            .insert(fold_case(unknown.name()), unknown_handle);
        store.collections.push(unknown);
        store.unknown_collection = unknown_handle;
        store
    }

    fn next_collection_handle(&self) -> CollectionHandle {
        CollectionHandle(self.collections.len() as u32)
    }

    fn next_gene_handle(&self) -> GeneHandle {
        GeneHandle(self.genes.len() as u32)
    }

    // ---- gene collections ----------------------------------------------

    pub fn add_collection(&mut self, collection: GeneCollection) -> Result<CollectionHandle> {
        let key = fold_case(collection.name());
        if self.collection_by_name.contains_key(&key) {
            return Err(Error::DuplicateCollection(collection.name().to_string()));
        }
        let handle = collection.handle();
        self.collection_by_name.insert(key, handle);
        self.collections.push(collection);
        Ok(handle)
    }

    /// Registers a collection with fresh rules, assigning it the next handle.
    pub fn new_collection(
        &mut self,
        name: &str,
        rules: Vec<crate::gene::ParserRule>,
    ) -> Result<CollectionHandle> {
        let handle = self.next_collection_handle();
        let collection = GeneCollection::new(handle, name, rules)?;
        self.add_collection(collection)
    }

    pub fn get_collection(&self, name: &str) -> Option<&GeneCollection> {
        self.collection_by_name
            .get(&fold_case(name))
            .map(|h| &self.collections[h.0 as usize])
    }

    pub fn collection(&self, handle: CollectionHandle) -> &GeneCollection {
        &self.collections[handle.0 as usize]
    }

    pub fn collection_mut(&mut self, handle: CollectionHandle) -> &mut GeneCollection {
        &mut self.collections[handle.0 as usize]
    }

    /// Iterates registered collections in insertion order (the "unknown"
    /// collection is always first).
    pub fn iter_collections(&self) -> impl Iterator<Item = &GeneCollection> {
        self.collections.iter()
    }

    // ---- genes ------------------------------------------------------------

    /// Resolves a raw name against every registered *real* collection in
    /// insertion order first, falling back to the "unknown" collection's
    /// catch-all only when none of them match. The unknown collection is
    /// always registered at index 0 (`new()`), but its catch-all rule would
    /// otherwise shadow every real collection if tried in plain index order,
    /// so it is deliberately tried last here. Creates the gene on first
    /// successful match.
    pub fn resolve(&mut self, raw_name: &str) -> Resolution {
        let collection_count = self.collections.len();
        for idx in 0..collection_count {
            if self.collections[idx].is_unknown() {
                continue;
            }
            let handle = CollectionHandle(idx as u32);
            let parsed = match self.collections[idx].try_parse(raw_name) {
                Some(p) => p,
                None => continue,
            };
            return self.finish_resolution(handle, parsed, raw_name);
        }

        let unknown = self.unknown_collection;
        if let Some(parsed) = self.collections[unknown.0 as usize].try_parse(raw_name) {
            return self.finish_resolution(unknown, parsed, raw_name);
        }
        Resolution::NotFound
    }

    fn finish_resolution(
        &mut self,
        collection: CollectionHandle,
        parsed: ParsedName,
        raw_name: &str,
    ) -> Resolution {
        if let Some(variant) = parsed.splice_variant {
            if variant != 1 {
                return Resolution::UnsupportedVariant {
                    gene: parsed.canonical,
                    variant,
                };
            }
        }

        let key = (collection, fold_case(&parsed.canonical));
        if let Some(&handle) = self.gene_by_collection_and_name.get(&key) {
            return Resolution::Gene(handle);
        }

        if self.collections[collection.0 as usize].is_unknown() {
            warn!("gene '{raw_name}' did not match any gene collection, adding to unknown collection");
        }

        let handle = self.next_gene_handle();
        let gene = Gene::new(handle, collection, parsed.canonical);
        self.gene_by_collection_and_name.insert(key, handle);
        self.genes.push(gene);

        // Every gene starts in a fresh singleton family; orthologs-file
        // ingest may later merge it into a richer family.
        let family_handle = self.add_family();
        self.family_mut(family_handle).add_gene(handle);
        self.genes[handle.0 as usize].families_mut().push(family_handle);

        Resolution::Gene(handle)
    }

    pub fn gene(&self, handle: GeneHandle) -> &Gene {
        &self.genes[handle.0 as usize]
    }

    pub fn gene_mut(&mut self, handle: GeneHandle) -> &mut Gene {
        &mut self.genes[handle.0 as usize]
    }

    pub fn iter_genes(&self, collection: CollectionHandle) -> impl Iterator<Item = &Gene> {
        self.genes.iter().filter(move |g| g.collection() == collection)
    }

    /// Total number of genes created so far (handles are a dense `0..count`
    /// range, since genes are append-only).
    pub fn gene_count(&self) -> usize {
        self.genes.len()
    }

    /// Sets or warns-and-skips on a conflicting duplicate functional
    /// annotation.
    pub fn set_annotation(&mut self, gene: GeneHandle, text: String) {
        let name = self.gene(gene).name().to_string();
        if self.gene_mut(gene).set_annotation(text) {
            warn!("gene '{name}' already has a functional annotation; overwriting with a new, different one");
        }
    }

    /// Records a symmetric "highly similar" link. Fatal if both genes belong
    /// to the same gene collection.
    pub fn add_highly_similar(&mut self, a: GeneHandle, b: GeneHandle) -> Result<()> {
        if self.gene(a).collection() == self.gene(b).collection() {
            return Err(Error::SameCollectionMapping(
                self.gene(a).name().to_string(),
                self.gene(b).name().to_string(),
            ));
        }
        self.highly_similar.push((a, b));
        Ok(())
    }

    // ---- ortholog families ------------------------------------------------

    /// Always creates a new family; callers needing external-id
    /// deduplication must check for an existing family with that id
    /// themselves.
    pub fn add_family(&mut self) -> FamilyHandle {
        let handle = FamilyHandle(self.families.len() as u32);
        self.families.push(Some(OrthologFamily::new(handle)));
        handle
    }

    pub fn family(&self, handle: FamilyHandle) -> &OrthologFamily {
        self.families[handle.0 as usize]
            .as_ref()
            .expect("family handle used after erase")
    }

    fn family_mut(&mut self, handle: FamilyHandle) -> &mut OrthologFamily {
        self.families[handle.0 as usize]
            .as_mut()
            .expect("family handle used after erase")
    }

    /// Adds `id` as external-id provenance on `family`.
    pub fn add_family_external_id(&mut self, family: FamilyHandle, id: ExternalId) {
        self.family_mut(family).add_external_id(id);
    }

    /// Destructively merges `b` into `a`: moves all genes and external ids
    /// into `a` (swapping containers by size so the larger set is retained),
    /// repoints every absorbed gene's back-reference from `b` to `a`, and
    /// erases `b`.
    pub fn merge_family(&mut self, a: FamilyHandle, b: FamilyHandle) {
        assert_ne!(a, b, "cannot merge a family into itself");

        let genes_of_b: Vec<GeneHandle> = self.family(b).genes().copied().collect();

        {
            let [fam_a, fam_b] = self.two_families_mut(a, b);
            crate::family::merge_into(fam_a, fam_b);
        }

        for gene in genes_of_b {
            let list = self.gene_mut(gene).families_mut();
            for handle in list.iter_mut() {
                if *handle == b {
                    *handle = a;
                }
            }
            list.sort_unstable_by_key(|h| h.0);
            list.dedup();
        }

        self.erase_family(b);
    }

    fn two_families_mut(
        &mut self,
        a: FamilyHandle,
        b: FamilyHandle,
    ) -> [&mut OrthologFamily; 2] {
        assert_ne!(a.0, b.0);
        let (lo, hi) = if a.0 < b.0 { (a.0, b.0) } else { (b.0, a.0) };
        let (left, right) = self.families.split_at_mut(hi as usize);
        let low_ref = left[lo as usize].as_mut().expect("family used after erase");
        let high_ref = right[0].as_mut().expect("family used after erase");
        if a.0 < b.0 {
            [low_ref, high_ref]
        } else {
            [high_ref, low_ref]
        }
    }

    /// O(1) removal. Caller must ensure no gene still back-references `f`.
    pub fn erase_family(&mut self, f: FamilyHandle) {
        self.families[f.0 as usize] = None;
    }

    pub fn iter_families(&self) -> impl Iterator<Item = &OrthologFamily> {
        self.families.iter().filter_map(|f| f.as_ref())
    }

    /// Every family a gene currently belongs to.
    pub fn families_of(&self, gene: GeneHandle) -> &[FamilyHandle] {
        self.gene(gene).families()
    }

    /// Places `gene` into `family`, as orthologs-file ingest does for every
    /// gene named on a family line.
    ///
    /// Every gene starts in a private zero-external-id singleton
    /// (`finish_resolution`). If that is still `gene`'s only family, it is
    /// folded into `family` via [`merge_family`](Self::merge_family) so the
    /// common case stays at exactly one family per gene, matching the
    /// source project's effectively-1:1 `OrthologGroup` model. A gene that
    /// already carries more than one family, or a non-singleton family, is
    /// left alone and simply gains `family` as an additional membership —
    /// `spec.md`'s "zero or more families" invariant is the authoritative
    /// one here, not the source's stricter 1:1 assumption.
    pub fn assign_to_family(&mut self, gene: GeneHandle, family: FamilyHandle) {
        if self.family(family).contains(gene) {
            return;
        }
        let current = self.families_of(gene).to_vec();
        if let [only] = current[..] {
            if only != family && self.family(only).len() == 1 && self.family(only).external_ids().next().is_none() {
                self.merge_family(family, only);
                return;
            }
        }
        self.family_mut(family).add_gene(gene);
        self.gene_mut(gene).families_mut().push(family);
    }

    // ---- expression matrices -----------------------------------------------

    pub fn new_matrix(&mut self, name: String, k: usize) -> MatrixHandle {
        let handle = MatrixHandle(self.matrices.len() as u32);
        self.matrices.push(ExpressionMatrix::new(handle, name, k));
        handle
    }

    pub fn matrix(&self, handle: MatrixHandle) -> &ExpressionMatrix {
        &self.matrices[handle.0 as usize]
    }

    pub fn matrix_mut(&mut self, handle: MatrixHandle) -> &mut ExpressionMatrix {
        &mut self.matrices[handle.0 as usize]
    }

    pub fn get_matrix(&self, name: &str) -> Option<MatrixHandle> {
        self.matrices.iter().find(|m| m.name() == name).map(|m| m.handle())
    }

    /// Adds `gene` at `row`-th position of `matrix` with the given values.
    /// Enforces the "same gene never appears in two matrices" invariant.
    pub fn push_matrix_row(
        &mut self,
        matrix: MatrixHandle,
        gene: GeneHandle,
        values: Vec<f64>,
    ) -> Result<()> {
        if let Some(&existing) = self.gene_matrix.get(&gene) {
            if existing != matrix {
                return Err(Error::GeneInMultipleMatrices(self.gene(gene).name().to_string()));
            }
        }
        self.matrix_mut(matrix).push_row(gene, values);
        self.gene_matrix.insert(gene, matrix);
        Ok(())
    }

    pub fn matrix_containing(&self, gene: GeneHandle) -> Option<MatrixHandle> {
        self.gene_matrix.get(&gene).copied()
    }

    pub fn unknown_collection(&self) -> CollectionHandle {
        self.unknown_collection
    }

    pub fn iter_highly_similar(&self) -> impl Iterator<Item = (GeneHandle, GeneHandle)> + '_ {
        self.highly_similar.iter().copied()
    }

    // ---- raw reconstruction (persistence only) -----------------------------

    /// Creates a gene with a pre-chosen handle-order slot and no family
    /// membership, for [`crate::persist`] to replay a serialized snapshot.
    /// Callers must add it to the same families the snapshot recorded.
    pub(crate) fn create_gene_raw(&mut self, collection: CollectionHandle, name: String) -> GeneHandle {
        let handle = self.next_gene_handle();
        let key = (collection, fold_case(&name));
        let gene = Gene::new(handle, collection, name);
        self.gene_by_collection_and_name.insert(key, handle);
        self.genes.push(gene);
        handle
    }

    pub(crate) fn restore_family_gene(&mut self, family: FamilyHandle, gene: GeneHandle) {
        self.family_mut(family).add_gene(gene);
    }

    pub(crate) fn push_highly_similar_raw(&mut self, a: GeneHandle, b: GeneHandle) {
        self.highly_similar.push((a, b));
    }

    /// All distinct genes present across a list of matrices (used by the
    /// CoExpr driver to assert a gene is present in at most one of them).
    pub fn genes_across(&self, matrices: &[MatrixHandle]) -> HashSet<GeneHandle> {
        let mut set = HashSet::new();
        for &m in matrices {
            for g in self.matrix(m).genes() {
                set.insert(g);
            }
        }
        set
    }
}

impl Default for DomainStore {
    fn default() -> Self {
        Self::new()
    }
}
