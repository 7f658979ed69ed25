//! Tolerance timeframes.
//!
//! Once an instrument is included it stays included for up to `limit`
//! further steps even if it stops qualifying. This damps churn around the
//! inclusion boundary.

/// Carry every `Some(true)` forward over at most `limit` following cells that
/// are not `Some(true)`. Cells beyond the limit are left as they were.
pub fn hold_inclusion(cells: &[Option<bool>], limit: usize) -> Vec<Option<bool>> {
    let mut out = Vec::with_capacity(cells.len());
    // Steps since the last genuine inclusion; None before the first one.
    let mut since_included: Option<usize> = None;
    for cell in cells {
        if *cell == Some(true) {
            since_included = Some(0);
            out.push(Some(true));
            continue;
        }
        match since_included {
            Some(steps) if steps < limit => {
                since_included = Some(steps + 1);
                out.push(Some(true));
            }
            Some(steps) => {
                since_included = Some(steps + 1);
                out.push(*cell);
            }
            None => out.push(*cell),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const T: Option<bool> = Some(true);
    const F: Option<bool> = Some(false);

    #[test]
    fn zero_limit_is_identity() {
        let cells = vec![T, F, None, T, F];
        assert_eq!(hold_inclusion(&cells, 0), cells);
    }

    #[test]
    fn holds_for_limit_steps_then_reverts() {
        let cells = vec![F, T, F, F, F, F];
        assert_eq!(hold_inclusion(&cells, 2), vec![F, T, T, T, F, F]);
    }

    #[test]
    fn filled_cells_do_not_restart_the_count() {
        let cells = vec![T, None, None, None];
        assert_eq!(hold_inclusion(&cells, 1), vec![T, T, None, None]);
    }

    #[test]
    fn new_inclusion_restarts_the_count() {
        let cells = vec![T, F, T, F, F];
        assert_eq!(hold_inclusion(&cells, 1), vec![T, T, T, T, F]);
    }
}
