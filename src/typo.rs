use crate::backend::TypoTolerance;

/// How many typos a query word of `char_len` characters may contain.
pub fn typo_budget(char_len: usize, tolerance: &TypoTolerance) -> usize {
    if !tolerance.enabled {
        return 0;
    }
    let sizes = &tolerance.min_word_size_for_typos;
    if char_len >= usize::from(sizes.two_typos) {
        2
    } else if char_len >= usize::from(sizes.one_typo) {
        1
    } else {
        0
    }
}

/// Edit distance between `a` and `b` if it is at most `max`.
///
/// Length difference is a lower bound on the distance, and so is the smallest
/// value of a DP row, so both cut the computation short.
pub fn bounded_distance(a: &str, b: &str, max: usize) -> Option<usize> {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.len().abs_diff(b.len()) > max {
        return None;
    }
    if a == b {
        return Some(0);
    }

    let mut row: Vec<usize> = (0..=b.len()).collect();
    for (i, ac) in a.iter().enumerate() {
        let mut diagonal = row[0];
        row[0] = i + 1;
        let mut row_min = row[0];

        for (j, bc) in b.iter().enumerate() {
            let above = row[j + 1];
            let cost = usize::from(ac != bc);
            row[j + 1] = (above + 1).min(row[j] + 1).min(diagonal + cost);
            diagonal = above;
            row_min = row_min.min(row[j + 1]);
        }

        if row_min > max {
            return None;
        }
    }

    let distance = row[b.len()];
    (distance <= max).then_some(distance)
}
