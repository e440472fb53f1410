//! Subset enumeration for the combinatorial search.

/// Hard cap on terms per stage (2^20 - 1 candidates).
pub const MAX_TERMS: usize = 20;

/// All non-empty subsets of `0..k`, as sorted index lists.
///
/// Order: by size, then lexicographically by index. For `k = 3`:
/// `[0] [1] [2] [0,1] [0,2] [1,2] [0,1,2]`.
pub fn non_empty_subsets(k: usize) -> Vec<Vec<usize>> {
    let total = if k == 0 { 0 } else { (1usize << k) - 1 };
    let mut out = Vec::with_capacity(total);
    for size in 1..=k {
        let mut combo: Vec<usize> = (0..size).collect();
        loop {
            out.push(combo.clone());
            if !next_combination(&mut combo, k) {
                break;
            }
        }
    }
    out
}

/// Advance `combo` to the next combination of its size in lexicographic order.
fn next_combination(combo: &mut [usize], k: usize) -> bool {
    let size = combo.len();
    let mut i = size;
    while i > 0 {
        i -= 1;
        if combo[i] < k - size + i {
            combo[i] += 1;
            for j in i + 1..size {
                combo[j] = combo[j - 1] + 1;
            }
            return true;
        }
    }
    false
}
