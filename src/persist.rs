//! Persisted domain state (C13): a single opaque `bincode` blob capturing an
//! ingested [`DomainStore`], per §6 ("format is considered an external
//! collaborator"). `regex::Regex` is not `Serialize`, so collections are
//! snapshotted as `(pattern, replace_template, splice_variant_group)`
//! triples and rebuilt through [`ParserRule::new`] on load.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::family::ExternalId;
use crate::gene::ParserRule;
use crate::store::DomainStore;

#[derive(Serialize, Deserialize)]
struct ParserRuleSnapshot {
    pattern: String,
    replace_template: String,
    splice_variant_group: Option<usize>,
}

#[derive(Serialize, Deserialize)]
struct CollectionSnapshot {
    name: String,
    rules: Vec<ParserRuleSnapshot>,
    gene_web_page_template: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct GeneSnapshot {
    collection: u32,
    name: String,
    annotation: Option<String>,
    families: Vec<u32>,
}

#[derive(Serialize, Deserialize)]
struct FamilySnapshot {
    /// The family's handle at snapshot time. Erased families leave gaps in
    /// the handle sequence, so this must be carried explicitly and remapped
    /// on load rather than relied on to equal the family's index in this
    /// vector (`genes.rs`'s `GeneSnapshot::families` refers to these old
    /// handle values).
    handle: u32,
    genes: Vec<u32>,
    external_ids: Vec<(String, String)>,
}

#[derive(Serialize, Deserialize)]
struct MatrixSnapshot {
    name: String,
    k: usize,
    /// Row-major, one entry of `k` `f64`s per gene, in the order `genes` lists them.
    rows: Vec<Vec<f64>>,
    genes: Vec<u32>,
}

#[derive(Serialize, Deserialize)]
struct StoreSnapshot {
    /// Collections after the implicit "unknown" one at index 0.
    collections: Vec<CollectionSnapshot>,
    genes: Vec<GeneSnapshot>,
    families: Vec<FamilySnapshot>,
    matrices: Vec<MatrixSnapshot>,
    highly_similar: Vec<(u32, u32)>,
}

fn snapshot(store: &DomainStore) -> StoreSnapshot {
    let collections = store
        .iter_collections()
        .skip(1) // the "unknown" collection is reconstructed by DomainStore::new
        .map(|c| CollectionSnapshot {
            name: c.name().to_string(),
            rules: c
                .rules()
                .iter()
                .map(|r| ParserRuleSnapshot {
                    pattern: r.pattern().to_string(),
                    replace_template: r.replace_template().to_string(),
                    splice_variant_group: r.splice_variant_group(),
                })
                .collect(),
            gene_web_page_template: c.gene_web_page_template().map(|s| s.to_string()),
        })
        .collect();

    let genes = (0..store.gene_count())
        .map(|idx| {
            let gene = store.gene(crate::gene::GeneHandle(idx as u32));
            GeneSnapshot {
                collection: gene.collection().0,
                name: gene.name().to_string(),
                annotation: gene.annotation().map(|s| s.to_string()),
                families: gene.families().iter().map(|f| f.0).collect(),
            }
        })
        .collect();

    let families = store
        .iter_families()
        .map(|f| FamilySnapshot {
            handle: f.handle().0,
            genes: f.genes().map(|g| g.0).collect(),
            external_ids: f.external_ids().map(|id| (id.source.clone(), id.id.clone())).collect(),
        })
        .collect();

    StoreSnapshot {
        collections,
        genes,
        families,
        matrices: Vec::new(), // filled by the caller, which has the matrix handle list
        highly_similar: store.iter_highly_similar().map(|(a, b)| (a.0, b.0)).collect(),
    }
}

/// Serializes `store` (together with its expression matrices, named by
/// handle) to `path` as an opaque `bincode` blob.
pub fn save(store: &DomainStore, matrix_handles: &[crate::matrix::MatrixHandle], path: &Path) -> Result<()> {
    let mut snap = snapshot(store);
    snap.matrices = matrix_handles
        .iter()
        .map(|&handle| {
            let m = store.matrix(handle);
            MatrixSnapshot {
                name: m.name().to_string(),
                k: m.cols(),
                rows: (0..m.rows()).map(|r| m.row(r).to_vec()).collect(),
                genes: m.genes().map(|g| g.0).collect(),
            }
        })
        .collect();

    let bytes = bincode::serialize(&snap).map_err(|source| Error::Persistence { path: path.to_path_buf(), source })?;
    std::fs::write(path, bytes).map_err(|e| Error::Io { path: path.to_path_buf(), source: e })
}

/// Deserializes a [`DomainStore`] (plus its matrix handles, in snapshot
/// order) previously written by [`save`].
pub fn load(path: &Path) -> Result<(DomainStore, Vec<crate::matrix::MatrixHandle>)> {
    let bytes = std::fs::read(path).map_err(|e| Error::Io { path: path.to_path_buf(), source: e })?;
    let snap: StoreSnapshot =
        bincode::deserialize(&bytes).map_err(|source| Error::Persistence { path: path.to_path_buf(), source })?;

    let mut store = DomainStore::new();

    for c in &snap.collections {
        let rules: Result<Vec<ParserRule>> = c
            .rules
            .iter()
            .map(|r| ParserRule::new(&r.pattern, &r.replace_template, r.splice_variant_group))
            .collect();
        let handle = store.new_collection(&c.name, rules?)?;
        if let Some(template) = &c.gene_web_page_template {
            store.collection_mut(handle).set_gene_web_page_template(template.clone());
        }
    }

    for g in &snap.genes {
        let collection = crate::gene::CollectionHandle(g.collection);
        store.create_gene_raw(collection, g.name.clone());
    }

    // Families are recreated with fresh, densely-packed handles (erased
    // families left gaps in the snapshot's handle numbering), so every old
    // handle referenced by a gene's `families` list must be translated
    // through this map rather than reused directly.
    let mut handle_map: std::collections::HashMap<u32, crate::family::FamilyHandle> =
        std::collections::HashMap::with_capacity(snap.families.len());
    for f in &snap.families {
        let handle = store.add_family();
        handle_map.insert(f.handle, handle);
        for &g in &f.genes {
            store.restore_family_gene(handle, crate::gene::GeneHandle(g));
        }
        for (source, id) in &f.external_ids {
            store.add_family_external_id(handle, ExternalId { source: source.clone(), id: id.clone() });
        }
    }

    // Second pass: family membership lists require every gene and every
    // family to already exist.
    for (idx, g) in snap.genes.iter().enumerate() {
        let handle = crate::gene::GeneHandle(idx as u32);
        for &f in &g.families {
            let remapped = *handle_map.get(&f).expect("snapshot family handle must have been restored");
            store.gene_mut(handle).families_mut().push(remapped);
        }
        if let Some(annotation) = &g.annotation {
            store.set_annotation(handle, annotation.clone());
        }
    }

    let mut matrix_handles = Vec::with_capacity(snap.matrices.len());
    for m in &snap.matrices {
        let handle = store.new_matrix(m.name.clone(), m.k);
        for (row, &gene_idx) in m.rows.iter().zip(&m.genes) {
            store.push_matrix_row(handle, crate::gene::GeneHandle(gene_idx), row.clone())?;
        }
        matrix_handles.push(handle);
    }

    for &(a, b) in &snap.highly_similar {
        store.push_highly_similar_raw(crate::gene::GeneHandle(a), crate::gene::GeneHandle(b));
    }

    Ok((store, matrix_handles))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gene::ParserRule;
    use crate::store::{DomainStore, Resolution};
    use tempfile::tempdir;

    /// Builds a store with an ortholog merge behind it, so the erased
    /// "absorbed" family leaves a gap in the handle sequence that
    /// `save`/`load` must survive (this is the scenario the handle-remapping
    /// fix in `load` exists for).
    fn store_with_merge_gap() -> (DomainStore, Vec<(String, u32)>) {
        let mut store = DomainStore::new();
        store
            .new_collection("species", vec![ParserRule::new("(.+)", "$1", None).unwrap()])
            .unwrap();

        let resolve = |store: &mut DomainStore, name: &str| match store.resolve(name) {
            Resolution::Gene(g) => g,
            _ => panic!("expected a resolved gene"),
        };
        let a = resolve(&mut store, "A");
        let b = resolve(&mut store, "B");
        let c = resolve(&mut store, "C");
        store.set_annotation(a, "alpha gene".to_string());

        // Merge b's singleton into a's, then c's into a's: this erases two
        // families and leaves their old handle numbers unused.
        let fam_a = store.families_of(a)[0];
        let fam_b = store.families_of(b)[0];
        let fam_c = store.families_of(c)[0];
        store.merge_family(fam_a, fam_b);
        store.merge_family(fam_a, fam_c);

        let m = store.new_matrix("m".to_string(), 2);
        store.push_matrix_row(m, a, vec![1.0, 2.0]).unwrap();
        store.push_matrix_row(m, b, vec![3.0, 4.0]).unwrap();
        store.push_matrix_row(m, c, vec![5.0, 6.0]).unwrap();

        (store, vec![("A".to_string(), a.0), ("B".to_string(), b.0), ("C".to_string(), c.0)])
    }

    #[test]
    fn round_trip_preserves_family_membership_across_a_merge_gap() {
        let (store, names) = store_with_merge_gap();
        let matrix = store.get_matrix("m").unwrap();

        let dir = tempdir().unwrap();
        let path = dir.path().join("store.bin");
        save(&store, &[matrix], &path).unwrap();
        let (restored, matrices) = load(&path).unwrap();

        for (name, old_handle) in &names {
            let gene = match restored.resolve(name) {
                Resolution::Gene(g) => g,
                _ => panic!("gene '{name}' missing after round-trip"),
            };
            assert_eq!(gene.0, *old_handle, "gene handle order must be preserved");
        }

        let a = match restored.resolve("A") {
            Resolution::Gene(g) => g,
            _ => panic!(),
        };
        let b = match restored.resolve("B") {
            Resolution::Gene(g) => g,
            _ => panic!(),
        };
        let c = match restored.resolve("C") {
            Resolution::Gene(g) => g,
            _ => panic!(),
        };

        // All three must still share exactly one family, with all three genes in it.
        assert_eq!(restored.families_of(a).len(), 1);
        assert_eq!(restored.families_of(a), restored.families_of(b));
        assert_eq!(restored.families_of(a), restored.families_of(c));
        let family = restored.families_of(a)[0];
        assert_eq!(restored.family(family).len(), 3);

        assert_eq!(restored.gene(a).annotation(), Some("alpha gene"));

        let restored_matrix = matrices[0];
        assert_eq!(restored.matrix(restored_matrix).rows(), 3);
        assert_eq!(restored.matrix(restored_matrix).row(restored.matrix(restored_matrix).row_of(b).unwrap()), &[3.0, 4.0]);
    }
}
