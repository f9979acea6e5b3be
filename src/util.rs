/// Perform a binary search on a slice sorted by a key derived via `f`,
/// returning the index of the match (if found) or the one of the
/// previous item (if any), taking into account duplicates.
///
/// This functionality is useful for cases where we compare elements
/// with a size, such as ranges, and an address to search for can be
/// covered by a range whose start is before the item to search for.
pub(crate) fn find_match_or_lower_bound_by<T, U, F>(slice: &[T], item: U, mut f: F) -> Option<usize>
where
    U: Ord,
    F: FnMut(&T) -> U,
{
    let idx = slice.partition_point(|e| f(e) < item);

    // At this point `idx` references the first item greater or equal to the one
    // we are looking for.

    if let Some(e) = slice.get(idx) {
        // If the item at `idx` is equal to what we were looking for, we are
        // trivially done, as it's guaranteed to be the first one to match.
        if f(e) == item {
            return Some(idx)
        }
    }

    // Otherwise `idx` points to a "greater" item. Hence, we pick the previous
    // one, but then have to scan backwards for as long as we see this one item,
    // so that we end up reporting the index of the first of all equal ones.
    let idx = idx.checked_sub(1)?;
    let cmp_e = f(slice.get(idx)?);

    for i in (0..idx).rev() {
        let e = slice.get(i)?;
        if f(e) != cmp_e {
            return Some(i + 1)
        }
    }
    Some(idx)
}


#[cfg(test)]
mod tests {
    use super::*;


    /// Check that we can find a match or the corresponding lower bound in a
    /// sorted slice.
    #[test]
    fn match_or_lower_bound_finding() {
        let data = [];
        assert_eq!(find_match_or_lower_bound_by(&data, 0usize, |x| *x), None);

        let data = [5usize];
        assert_eq!(find_match_or_lower_bound_by(&data, 0, |x| *x), None);
        assert_eq!(find_match_or_lower_bound_by(&data, 5, |x| *x), Some(0));
        assert_eq!(find_match_or_lower_bound_by(&data, 9, |x| *x), Some(0));

        let data = [1usize, 3, 3, 3, 7, 9];
        // An exact match reports the first of all equal entries.
        assert_eq!(find_match_or_lower_bound_by(&data, 3, |x| *x), Some(1));
        // A miss reports the first entry of the next lower run.
        assert_eq!(find_match_or_lower_bound_by(&data, 5, |x| *x), Some(1));
        assert_eq!(find_match_or_lower_bound_by(&data, 8, |x| *x), Some(4));
        assert_eq!(find_match_or_lower_bound_by(&data, 100, |x| *x), Some(5));
        assert_eq!(find_match_or_lower_bound_by(&data, 0, |x| *x), None);
    }
}
