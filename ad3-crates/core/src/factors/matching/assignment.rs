//! The rectangular linear assignment problem, solved with shortest augmenting paths and dual
//! potentials (the Jonker-Volgenant formulation of the Hungarian method).

use crate::ad3_assert_moderate;

/// Assigns every row of the `num_rows x num_columns` row-major `costs` matrix to a distinct
/// column such that the total cost is minimal; requires `num_rows <= num_columns`.
///
/// Returns the column of every row. All costs are expected to be finite.
pub(crate) fn solve_assignment(costs: &[f64], num_rows: usize, num_columns: usize) -> Vec<usize> {
    ad3_assert_moderate!(num_rows <= num_columns);
    ad3_assert_moderate!(costs.len() == num_rows * num_columns);

    // Index 0 is a virtual column which holds the row that is currently being augmented.
    let mut row_potential = vec![0.0; num_rows + 1];
    let mut column_potential = vec![0.0; num_columns + 1];
    let mut row_of_column = vec![0_usize; num_columns + 1];
    let mut predecessor = vec![0_usize; num_columns + 1];

    for row in 1..=num_rows {
        row_of_column[0] = row;
        let mut current_column = 0;
        let mut min_reduced_cost = vec![f64::INFINITY; num_columns + 1];
        let mut visited = vec![false; num_columns + 1];

        loop {
            visited[current_column] = true;
            let current_row = row_of_column[current_column];
            let mut delta = f64::INFINITY;
            let mut next_column = 0;

            for column in 1..=num_columns {
                if visited[column] {
                    continue;
                }
                let reduced_cost = costs[(current_row - 1) * num_columns + column - 1]
                    - row_potential[current_row]
                    - column_potential[column];
                if reduced_cost < min_reduced_cost[column] {
                    min_reduced_cost[column] = reduced_cost;
                    predecessor[column] = current_column;
                }
                if min_reduced_cost[column] < delta {
                    delta = min_reduced_cost[column];
                    next_column = column;
                }
            }

            if next_column == 0 {
                // only reachable with non-finite costs
                break;
            }

            for column in 0..=num_columns {
                if visited[column] {
                    row_potential[row_of_column[column]] += delta;
                    column_potential[column] -= delta;
                } else {
                    min_reduced_cost[column] -= delta;
                }
            }

            current_column = next_column;
            if row_of_column[current_column] == 0 {
                break;
            }
        }

        // augment along the alternating path
        while current_column != 0 {
            let previous = predecessor[current_column];
            row_of_column[current_column] = row_of_column[previous];
            current_column = previous;
        }
    }

    let mut column_of_row = vec![0; num_rows];
    for column in 1..=num_columns {
        if row_of_column[column] != 0 {
            column_of_row[row_of_column[column] - 1] = column - 1;
        }
    }
    column_of_row
}
