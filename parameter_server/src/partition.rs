use std::ops::Range;

/// Splits `total` parameters in `parts` contiguous ranges whose lengths differ by at most one.
///
/// The first `total % parts` ranges hold the extra parameter.
///
/// # Arguments
/// * `total` - The length of the flat parameter vector.
/// * `parts` - The amount of parameter servers.
///
/// # Returns
/// One range per server, in server order. Empty if `parts` is `0`.
pub fn partition(total: usize, parts: usize) -> Vec<Range<usize>> {
    if parts == 0 {
        return Vec::new();
    }

    let base = total / parts;
    let extra = total % parts;
    let mut start = 0;

    (0..parts)
        .map(|i| {
            let len = base + usize::from(i < extra);
            let range = start..start + len;
            start += len;
            range
        })
        .collect()
}
