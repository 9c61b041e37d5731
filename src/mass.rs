const WATER_MASS: f64 = 18.02;
const UNKNOWN_RESIDUE_MASS: f64 = 110.0;
const MAX_TAIL_CARBONS: usize = 32;

fn residue_mass(residue: char) -> f64 {
    match residue.to_ascii_uppercase() {
        'A' => 71.08,
        'R' => 156.19,
        'N' => 114.10,
        'D' => 115.09,
        'C' => 103.15,
        'E' => 129.12,
        'Q' => 128.13,
        'G' => 57.05,
        'H' => 137.14,
        'I' => 113.16,
        'L' => 113.16,
        'K' => 128.17,
        'M' => 131.20,
        'F' => 147.18,
        'P' => 97.12,
        'S' => 87.08,
        'T' => 101.11,
        'W' => 186.21,
        'Y' => 163.18,
        'V' => 99.13,
        // C4 block of the lipid tail
        'Z' => 56.10,
        _ => UNKNOWN_RESIDUE_MASS,
    }
}

fn n_terminal_mass(n_terminus: &str) -> f64 {
    match n_terminus.trim().to_uppercase().as_str() {
        "C16" => 239.2,
        _ => 0.0,
    }
}

fn c_terminal_mass(c_terminus: &str) -> f64 {
    match c_terminus.trim().to_uppercase().as_str() {
        "AMD" => -0.98,
        _ => 0.0,
    }
}

pub fn molecular_weight(sequence: &str, n_terminus: &str, c_terminus: &str) -> Option<f64> {
    let residues = sequence.trim();
    if residues.is_empty() {
        return None;
    }
    let backbone: f64 = residues.chars().map(residue_mass).sum();
    Some(backbone + WATER_MASS + n_terminal_mass(n_terminus) + c_terminal_mass(c_terminus))
}

pub fn is_amidated(c_terminus: &str) -> bool {
    c_terminus.trim().eq_ignore_ascii_case("AMD")
}

/// Sequence as written by the cluster runs: one `Z` per four tail carbons,
/// the residues, then `00` (amidated) or `01` (free acid).
///
/// Only `Cn` termini with `n` a positive multiple of four, at most 32, have
/// an encoding.
pub fn cluster_sequence(sequence: &str, n_terminus: &str, c_terminus: &str) -> Option<String> {
    let residues = sequence.trim().to_uppercase();
    if residues.is_empty() {
        return None;
    }
    let carbons = n_terminus
        .trim()
        .to_uppercase()
        .strip_prefix('C')?
        .parse::<usize>()
        .ok()
        .filter(|n| *n > 0 && *n <= MAX_TAIL_CARBONS && n % 4 == 0)?;
    let suffix = if is_amidated(c_terminus) { "00" } else { "01" };
    Some(format!("{}{residues}{suffix}", "Z".repeat(carbons / 4)))
}
