//! Packed upper-triangular indexing of unordered sample pairs.
//!
//! For a batch of `n` samples every unordered pair `(i, j)`, `i < j`, owns one
//! slot `k` in `[0, n(n-1)/2)`, laid out row by row:
//!
//! ```text
//! k = n*i - i*(i+1)/2 + j - i - 1
//! ```
//!
//! so row `i` starts at `row_offset(n, i)` and holds `n - 1 - i` pairs.

/// Number of unordered pairs in a batch of `n` samples.
pub fn pair_count(n: usize) -> usize {
    n * n.saturating_sub(1) / 2
}

/// Slot where row `i` starts, i.e. of its first pair `(i, i + 1)`.
///
/// Returns `None` for `i >= n`. The last row is empty, so its offset equals
/// `pair_count(n)`.
pub fn row_offset(n: usize, i: usize) -> Option<usize> {
    if i >= n {
        return None;
    }
    Some(row_start(n, i))
}

fn row_start(n: usize, i: usize) -> usize {
    n * i - i * (i + 1) / 2
}

/// Slot of the unordered pair `{a, b}`.
///
/// Orientation does not matter: `pair_index(n, a, b) == pair_index(n, b, a)`.
/// Returns `None` for `a == b` or an index outside the batch.
pub fn pair_index(n: usize, a: usize, b: usize) -> Option<usize> {
    if a == b || a >= n || b >= n {
        return None;
    }
    let (i, j) = if a < b { (a, b) } else { (b, a) };
    Some(row_start(n, i) + j - i - 1)
}

/// Inverse of [`pair_index`]: recovers `(i, j)` with `i < j` from slot `k`.
///
/// Counting slots from the end of the layout, the last row holds one pair,
/// the one before it two, and so on, so the reversed row is the largest `r`
/// with `r(r+1)/2 <= m - 1 - k`.
pub fn pair_coords(n: usize, k: usize) -> Option<(usize, usize)> {
    let m = pair_count(n);
    if k >= m {
        return None;
    }
    let t = m - 1 - k;
    let mut r = ((((8 * t + 1) as f64).sqrt() as usize).saturating_sub(1)) / 2;
    // float sqrt can be off by one for very large batches
    while (r + 1) * (r + 2) / 2 <= t {
        r += 1;
    }
    while r * (r + 1) / 2 > t {
        r -= 1;
    }
    let i = n - 2 - r;
    let j = k - row_start(n, i) + i + 1;
    Some((i, j))
}

/// All pairs `(i, j)`, `i < j`, in increasing slot order.
pub fn pairs(n: usize) -> impl Iterator<Item = (usize, usize)> {
    (0..n).flat_map(move |i| (i + 1..n).map(move |j| (i, j)))
}
