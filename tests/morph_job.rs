//! End-to-end MORPH job: write small TSV/GOI fixtures to a temp directory,
//! run the job YAML through the driver, and check the best-AUSR pairing is
//! reported (boundary scenario 2 of §8, driven through the public surface
//! rather than the ranker directly).

use std::fs;

use morphcoexpr::driver::run_morph_job;
use morphcoexpr::job::load_morph_job;
use tempfile::tempdir;

#[test]
fn morph_job_produces_one_result_per_viable_goi() {
    let dir = tempdir().unwrap();
    let base = dir.path();

    // Cluster "a" holds the 5-member GOI (G0..G4, identical signal), one
    // candidate with that same identical signal (G5, the expected winner)
    // and one scrambled candidate (G6, the expected loser). Cluster "b" is
    // unrelated noise so the ranking is genuinely split across clusters.
    let signal = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
    let scrambled = [8.0, 1.0, 6.0, 3.0, 4.0, 5.0, 2.0, 7.0];
    let mut matrix = String::from("gene\tc1\tc2\tc3\tc4\tc5\tc6\tc7\tc8\n");
    for i in 0..6 {
        let row: Vec<String> = signal.iter().map(|v| v.to_string()).collect();
        matrix.push_str(&format!("G{i}\t{}\n", row.join("\t")));
    }
    {
        let row: Vec<String> = scrambled.iter().map(|v| v.to_string()).collect();
        matrix.push_str(&format!("G6\t{}\n", row.join("\t")));
    }
    for i in 7..10 {
        let row: Vec<String> = [i as f64, 7.0, 2.0, 9.0, 1.0, 4.0, 6.0, 3.0].iter().map(|v| v.to_string()).collect();
        matrix.push_str(&format!("G{i}\t{}\n", row.join("\t")));
    }
    fs::write(base.join("matrix.tsv"), matrix).unwrap();
    fs::write(
        base.join("clustering.tsv"),
        "G0\ta\nG1\ta\nG2\ta\nG3\ta\nG4\ta\nG5\ta\nG6\ta\nG7\tb\nG8\tb\nG9\tb\n",
    )
    .unwrap();
    fs::write(base.join("goi.txt"), "G0,G1,G2,G3,G4\n").unwrap();

    let job_yaml = r#"
gene_collections:
  - name: species
    rules:
      - pattern: "(.+)"
expression_matrices:
  - path: matrix.tsv
    clusterings:
      - clustering.tsv
goi_files:
  - goi.txt
output_dir: out
top_k: 5
output_yaml: true
"#;
    let job = load_morph_job(job_yaml).unwrap();
    let results = run_morph_job(&job, base).unwrap();

    assert_eq!(results.len(), 1);
    let result = &results[0];
    assert!(result.best_ausr > 0.99);
    assert_eq!(result.gene_expression_name, "matrix");
    assert_eq!(result.clustering_name, "clustering");
    assert!(!result.candidates.is_empty());
    assert_eq!(result.candidates[0].gene, "G5");
}

#[test]
fn morph_job_skips_goi_with_too_few_matched_genes() {
    let dir = tempdir().unwrap();
    let base = dir.path();

    fs::write(base.join("matrix.tsv"), "gene\tc1\tc2\nG0\t1.0\t2.0\nG1\t2.0\t3.0\n").unwrap();
    fs::write(base.join("goi.txt"), "G0\n").unwrap();

    let job_yaml = r#"
gene_collections:
  - name: species
    rules:
      - pattern: "(.+)"
expression_matrices:
  - path: matrix.tsv
    clusterings: []
goi_files:
  - goi.txt
output_dir: out
top_k: 5
"#;
    let job = load_morph_job(job_yaml).unwrap();
    let results = run_morph_job(&job, base).unwrap();
    assert!(results.is_empty());
}
