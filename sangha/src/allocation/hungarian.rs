//! Minimum-cost bipartite assignment (Kuhn-Munkres with potentials).

/// Match rows to columns at minimum total cost.
///
/// `cost` must be rectangular with finite entries. Returns the column of
/// every row; with more rows than columns the surplus rows stay unmatched.
pub fn hungarian(cost: &[Vec<f64>]) -> Vec<Option<usize>> {
    let rows = cost.len();
    let cols = cost.first().map_or(0, Vec::len);
    if rows == 0 || cols == 0 {
        return vec![None; rows];
    }
    if rows <= cols {
        return solve(cost).into_iter().map(Some).collect();
    }

    let transposed: Vec<Vec<f64>> = (0..cols)
        .map(|j| cost.iter().map(|row| row[j]).collect())
        .collect();
    let mut assignment = vec![None; rows];
    for (col, row) in solve(&transposed).into_iter().enumerate() {
        assignment[row] = Some(col);
    }
    assignment
}

/// Square or wide matrix: every row gets a distinct column.
fn solve(cost: &[Vec<f64>]) -> Vec<usize> {
    let n = cost.len();
    let m = cost[0].len();
    // 1-based with a virtual column 0; owner[j] is the row holding column j
    let mut u = vec![0.0; n + 1];
    let mut v = vec![0.0; m + 1];
    let mut owner = vec![0usize; m + 1];
    let mut way = vec![0usize; m + 1];

    for row in 1..=n {
        owner[0] = row;
        let mut j0 = 0;
        let mut min_slack = vec![f64::INFINITY; m + 1];
        let mut used = vec![false; m + 1];
        loop {
            used[j0] = true;
            let i0 = owner[j0];
            let mut delta = f64::INFINITY;
            let mut j1 = 0;
            for j in 1..=m {
                if used[j] {
                    continue;
                }
                let slack = cost[i0 - 1][j - 1] - u[i0] - v[j];
                if slack < min_slack[j] {
                    min_slack[j] = slack;
                    way[j] = j0;
                }
                if min_slack[j] < delta {
                    delta = min_slack[j];
                    j1 = j;
                }
            }
            for j in 0..=m {
                if used[j] {
                    u[owner[j]] += delta;
                    v[j] -= delta;
                } else {
                    min_slack[j] -= delta;
                }
            }
            j0 = j1;
            if owner[j0] == 0 {
                break;
            }
        }
        // Flip the augmenting path
        while j0 != 0 {
            let j1 = way[j0];
            owner[j0] = owner[j1];
            j0 = j1;
        }
    }

    let mut assignment = vec![0; n];
    for (j, &row) in owner.iter().enumerate().skip(1) {
        if row != 0 {
            assignment[row - 1] = j - 1;
        }
    }
    assignment
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn total(cost: &[Vec<f64>], assignment: &[Option<usize>]) -> f64 {
        assignment
            .iter()
            .enumerate()
            .filter_map(|(i, j)| j.map(|j| cost[i][j]))
            .sum()
    }

    /// Cheapest total over every injective row-to-column map.
    fn brute_force(cost: &[Vec<f64>]) -> f64 {
        fn go(cost: &[Vec<f64>], row: usize, taken: &mut [bool]) -> f64 {
            if row == cost.len() {
                return 0.0;
            }
            let mut best = f64::INFINITY;
            for j in 0..taken.len() {
                if !taken[j] {
                    taken[j] = true;
                    best = best.min(cost[row][j] + go(cost, row + 1, taken));
                    taken[j] = false;
                }
            }
            best
        }
        go(cost, 0, &mut vec![false; cost[0].len()])
    }

    #[test]
    fn test_square_optimum() {
        let cost = vec![
            vec![4.0, 1.0, 3.0],
            vec![2.0, 0.0, 5.0],
            vec![3.0, 2.0, 2.0],
        ];
        let assignment = hungarian(&cost);
        assert_eq!(assignment, vec![Some(1), Some(0), Some(2)]);
        assert_relative_eq!(total(&cost, &assignment), 5.0);
    }

    #[test]
    fn test_wide_leaves_columns_free() {
        let cost = vec![vec![9.0, 2.0, 7.0, 1.0], vec![1.0, 8.0, 8.0, 2.0]];
        assert_eq!(hungarian(&cost), vec![Some(3), Some(0)]);
    }

    #[test]
    fn test_tall_leaves_rows_unmatched() {
        let cost = vec![vec![5.0], vec![1.0], vec![3.0]];
        assert_eq!(hungarian(&cost), vec![None, Some(0), None]);
    }

    #[test]
    fn test_negative_costs() {
        // Utilities as negative costs: the best total utility wins
        let cost = vec![vec![-10.0, -1.0], vec![-9.0, -8.0]];
        assert_eq!(hungarian(&cost), vec![Some(0), Some(1)]);
    }

    #[test]
    fn test_empty() {
        assert!(hungarian(&[]).is_empty());
        assert_eq!(hungarian(&[vec![], vec![]]), vec![None, None]);
    }

    #[test]
    fn test_matches_brute_force() {
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..200 {
            let rows = rng.random_range(1..=5);
            let cols = rng.random_range(rows..=6);
            let cost: Vec<Vec<f64>> = (0..rows)
                .map(|_| (0..cols).map(|_| rng.random_range(-20.0..20.0)).collect())
                .collect();
            let assignment = hungarian(&cost);

            let mut columns: Vec<usize> = assignment.iter().map(|j| j.unwrap()).collect();
            columns.sort_unstable();
            columns.dedup();
            assert_eq!(columns.len(), rows);
            assert_relative_eq!(total(&cost, &assignment), brute_force(&cost), epsilon = 1e-9);
        }
    }
}
