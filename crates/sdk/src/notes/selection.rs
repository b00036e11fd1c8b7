//! Denomination splitting.

/// Largest-first split of `amount` over a descending denomination list.
///
/// Returns `None` if the list cannot represent `amount` exactly (only
/// possible when it does not end in 1) or if the split needs more than
/// `max_parts` notes. A zero amount splits into nothing.
pub fn split_greedy(amount: u64, denominations: &[u64], max_parts: usize) -> Option<Vec<u64>> {
    let mut remaining = amount;
    let mut counts = Vec::with_capacity(denominations.len());
    let mut total: usize = 0;
    for &denom in denominations {
        if denom == 0 || remaining == 0 {
            continue;
        }
        let count = remaining / denom;
        total = total.checked_add(usize::try_from(count).ok()?)?;
        if total > max_parts {
            return None;
        }
        counts.push((denom, count as usize));
        remaining -= count * denom;
    }
    if remaining != 0 {
        return None;
    }

    let mut parts = Vec::with_capacity(total);
    for (denom, count) in counts {
        parts.extend(std::iter::repeat_n(denom, count));
    }
    Some(parts)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use hearth_config::constants::{CANONICAL_DENOMINATIONS, MAX_NOTES_PER_ISSUE};

    use super::*;

    #[test]
    fn splits_sum_to_amount() {
        for amount in [1, 4, 9, 99, 1_234, 50_000, 65_537, 187_654, 1_000_001] {
            let parts =
                split_greedy(amount, &CANONICAL_DENOMINATIONS, MAX_NOTES_PER_ISSUE).unwrap();
            assert_eq!(parts.iter().sum::<u64>(), amount, "amount {amount}");
            assert!(parts.iter().all(|p| CANONICAL_DENOMINATIONS.contains(p)));
        }
    }

    #[test]
    fn largest_first() {
        let parts = split_greedy(1_556, &CANONICAL_DENOMINATIONS, MAX_NOTES_PER_ISSUE).unwrap();
        assert_eq!(parts, vec![1_000, 500, 50, 5, 1]);
    }

    #[test]
    fn zero_is_empty() {
        assert_eq!(split_greedy(0, &CANONICAL_DENOMINATIONS, 0), Some(vec![]));
    }

    #[test]
    fn unrepresentable_amount() {
        assert_eq!(split_greedy(7, &[10, 5], MAX_NOTES_PER_ISSUE), None);
    }

    #[test]
    fn note_count_is_capped_before_allocating() {
        assert_eq!(
            split_greedy(u64::MAX, &CANONICAL_DENOMINATIONS, MAX_NOTES_PER_ISSUE),
            None
        );
        assert_eq!(
            split_greedy(300_000, &CANONICAL_DENOMINATIONS, 3),
            Some(vec![100_000; 3])
        );
        assert_eq!(split_greedy(300_001, &CANONICAL_DENOMINATIONS, 3), None);
    }
}
