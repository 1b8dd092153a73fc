//! Monotonic-predicate binary search shared by the restart array and the
//! data index.

/// Returns the smallest `i` in `[0, n)` for which `pred(i)` is true, or `n`
/// if there is none. `pred` must be monotonic: once true, true for every
/// larger index.
pub fn search<F>(n: usize, mut pred: F) -> usize
where
    F: FnMut(usize) -> bool,
{
    let (mut lo, mut hi) = (0, n);
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if pred(mid) {
            hi = mid;
        } else {
            lo = mid + 1;
        }
    }
    lo
}

/// Fallible form of [`search`]; the first error aborts the search.
pub fn try_search<F, E>(n: usize, mut pred: F) -> Result<usize, E>
where
    F: FnMut(usize) -> Result<bool, E>,
{
    let (mut lo, mut hi) = (0, n);
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if pred(mid)? {
            hi = mid;
        } else {
            lo = mid + 1;
        }
    }
    Ok(lo)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_first_true() {
        let v = [1, 3, 5, 7, 9];
        assert_eq!(search(v.len(), |i| v[i] > 4), 2);
        assert_eq!(search(v.len(), |i| v[i] > 0), 0);
        assert_eq!(search(v.len(), |i| v[i] > 9), 5);
        assert_eq!(search(0, |_| true), 0);
    }

    #[test]
    fn agrees_with_linear_scan() {
        let v: Vec<u32> = (0..100).map(|i| i * 2).collect();
        for target in 0..210 {
            let linear = v.iter().position(|&x| x >= target).unwrap_or(v.len());
            assert_eq!(search(v.len(), |i| v[i] >= target), linear);
        }
    }

    #[test]
    fn try_search_propagates_errors() {
        let r: Result<usize, &str> =
            try_search(10, |i| if i == 5 { Err("boom") } else { Ok(i > 5) });
        assert_eq!(r, Err("boom"));
        let ok: Result<usize, ()> = try_search(10, |i| Ok(i >= 3));
        assert_eq!(ok, Ok(3));
    }
}
