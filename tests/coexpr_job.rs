//! End-to-end CoExpr job: write small TSV fixtures to a temp directory, run
//! the job YAML through the driver, and check the resulting network and its
//! written Cytoscape files (boundary scenarios 4/5 of §8, driven through the
//! public surface rather than `coexpr::find_neighbourhood` directly).
//!
//! The fixture and the job run are expensive enough (temp dir, several
//! ingest passes) that every test in this file shares one, built once behind
//! `lazy_static`, mirroring how the upstream correlation test suites cache
//! their `Analysis` fixtures.

use std::fs;

use lazy_static::lazy_static;
use morphcoexpr::coexpr::CoexprNetwork;
use morphcoexpr::color::HashColourAssigner;
use morphcoexpr::driver::run_coexpr_job;
use morphcoexpr::job::load_coexpr_job;
use morphcoexpr::store::DomainStore;
use morphcoexpr::writer::write_coexpr_network;
use tempfile::TempDir;

struct Fixture {
    _dir: TempDir,
    store: DomainStore,
    network: CoexprNetwork,
}

fn build_fixture() -> Fixture {
    let dir = TempDir::new().unwrap();
    let base = dir.path();

    // B1 and B2 are baits; T1 correlates tightly with B1, T2 is unrelated
    // noise. T1 and T2 are folded into the same ortholog family so the
    // family survives the orphan-family filter (needs >= 2 members).
    let matrix = "gene\tc1\tc2\tc3\tc4\tc5\n\
B1\t1.0\t2.0\t3.0\t4.0\t5.0\n\
B2\t5.0\t1.0\t4.0\t2.0\t9.0\n\
T1\t1.1\t2.2\t2.9\t4.1\t5.2\n\
T2\t9.0\t2.0\t1.0\t8.0\t3.0\n";
    fs::write(base.join("matrix.tsv"), matrix).unwrap();
    fs::write(base.join("baits.txt"), "B1\nB2\n").unwrap();
    fs::write(base.join("orthologs.tsv"), "fam1\tT1\tT2\n").unwrap();

    let job_yaml = r#"
gene_collections:
  - name: species
    rules:
      - pattern: "(.+)"
orthologs_files:
  - source_name: orthodb
    path: orthologs.tsv
baits: baits.txt
negative_treshold: -0.9
positive_treshold: 0.9
expression_matrices:
  - matrix.tsv
output_dir: out
"#;
    let job = load_coexpr_job(job_yaml).unwrap();
    let (store, network) = run_coexpr_job(&job, base).unwrap();
    Fixture { _dir: dir, store, network }
}

lazy_static! {
    static ref FIXTURE: std::sync::Mutex<Option<Fixture>> = std::sync::Mutex::new(None);
}

fn with_fixture<R>(f: impl FnOnce(&DomainStore, &CoexprNetwork) -> R) -> R {
    let mut guard = FIXTURE.lock().unwrap();
    if guard.is_none() {
        *guard = Some(build_fixture());
    }
    let fixture = guard.as_ref().unwrap();
    f(&fixture.store, &fixture.network)
}

#[test]
fn coexpr_job_finds_the_correlating_family_and_not_the_orphan() {
    with_fixture(|store, network| {
        assert_eq!(network.baits.len(), 2);
        assert_eq!(network.families.len(), 1);
        let info = &network.families[0];
        assert_eq!(info.bait_correlations().len(), 1);
        assert_eq!(store.gene(info.bait_correlations()[0].bait()).name(), "B1");
    });
}

#[test]
fn coexpr_job_bait_group_id_lists_only_correlating_baits() {
    with_fixture(|store, network| {
        let info = &network.families[0];
        assert_eq!(info.bait_group_id(store), "B1;");
    });
}

#[test]
fn coexpr_job_writes_cytoscape_files() {
    with_fixture(|store, network| {
        let out = TempDir::new().unwrap();
        write_coexpr_network(store, network, &HashColourAssigner, out.path()).unwrap();

        let sif = fs::read_to_string(out.path().join("network.sif")).unwrap();
        assert!(sif.contains("cor"));

        let node_attr = fs::read_to_string(out.path().join("network.node.attr")).unwrap();
        assert!(node_attr.starts_with("node_id\tfamilies\tgenes\tspecies\tcolor\n"));
        assert!(node_attr.contains("B1"));
        assert!(node_attr.contains("B2"));

        assert!(out.path().join("network.edge.attr").exists());
        assert!(out.path().join("network_genes.yaml").exists());
    });
}
