//! Deterministic CSV test generators, one per end-to-end scenario named in
//! the crate-level testable-properties section (S1-S4; S5/S6 are driven
//! directly by the test suite since they require mid-run resubmission).

use std::fmt::Write as _;

/// Which conflict pattern to generate, selected by `tid % 4`.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum GeneratorKind {
    /// S1: fully disjoint reads/writes; every transaction is independent.
    NonConflicting,
    /// S2: even/odd pairs share their write set.
    PairsConflict,
    /// S3: the lower and upper halves of the pool share their write set.
    HalvesConflict,
    /// S4: every transaction shares the same write set.
    AllConflict,
}

/// Emits `count` transactions of `kind` as CSV text with 8 read and 8 write
/// columns, matching `objSetSize = 8` from the reference scenarios.
#[must_use]
pub fn generate(kind: GeneratorKind, count: u64) -> String {
    let mut out = String::new();
    let read_headers: Vec<String> = (0..8).map(|i| format!("Read object {i}")).collect();
    let write_headers: Vec<String> = (0..8).map(|i| format!("Written object {i}")).collect();
    let _ = writeln!(out, "{}", [read_headers.clone(), write_headers.clone()].concat().join(","));

    for tid in 0..count {
        let reads: Vec<u64> = (0..8).map(|i| 2 * i + 128 * tid).collect();
        let writes: Vec<u64> = match kind {
            GeneratorKind::NonConflicting => (0..8).map(|i| 2 * i + 1 + 128 * tid).collect(),
            GeneratorKind::PairsConflict => {
                let pair_base = tid & !1;
                (0..8).map(|i| i + 1 + 128 * pair_base).collect()
            }
            GeneratorKind::HalvesConflict => {
                let half = tid & 1;
                (0..8).map(|i| i + 1 + 128 * half).collect()
            }
            GeneratorKind::AllConflict => (0..8).map(|i| i + 1 + 16).collect(),
        };
        let cells: Vec<String> = reads
            .iter()
            .chain(writes.iter())
            .map(ToString::to_string)
            .collect();
        let _ = writeln!(out, "{}", cells.join(","));
    }
    out
}
