use super::GenericFactor;

/// The total cost of the true literals does not exceed the capacity.
///
/// Costs and capacity are non-negative integers, so the MAP oracle is the textbook 0/1
/// knapsack dynamic program over the remaining capacity.
#[derive(Clone, Debug)]
pub struct KnapsackFactor {
    costs: Box<[usize]>,
    capacity: usize,
}

impl KnapsackFactor {
    pub fn new(costs: Vec<usize>, capacity: usize) -> Self {
        KnapsackFactor {
            costs: costs.into(),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn selection_score(variable_scores: &[f64], selection: &[usize]) -> f64 {
        selection.iter().map(|&item| variable_scores[item]).sum()
    }
}

impl GenericFactor for KnapsackFactor {
    /// The selected items in increasing order.
    type Configuration = Vec<usize>;

    fn num_variables(&self) -> usize {
        self.costs.len()
    }

    fn num_additionals(&self) -> usize {
        0
    }

    fn maximize(&self, variable_scores: &[f64], _additional_scores: &[f64]) -> (Vec<usize>, f64) {
        let num_items = self.costs.len();
        let width = self.capacity + 1;

        // best[c] is the best value using at most c capacity among the items processed so far
        let mut best = vec![0.0; width];
        let mut keep = vec![false; num_items * width];

        for item in 0..num_items {
            let score = variable_scores[item];
            if score <= 0.0 {
                continue;
            }
            let cost = self.costs[item];
            if cost > self.capacity {
                continue;
            }
            for remaining in (cost..width).rev() {
                let with_item = best[remaining - cost] + score;
                if with_item > best[remaining] {
                    best[remaining] = with_item;
                    keep[item * width + remaining] = true;
                }
            }
        }

        let mut selection = Vec::new();
        let mut remaining = self.capacity;
        for item in (0..num_items).rev() {
            if keep[item * width + remaining] {
                selection.push(item);
                remaining -= self.costs[item];
            }
        }
        selection.reverse();

        let value = best[self.capacity];
        (selection, value)
    }

    fn evaluate(
        &self,
        variable_scores: &[f64],
        _additional_scores: &[f64],
        configuration: &Vec<usize>,
    ) -> f64 {
        KnapsackFactor::selection_score(variable_scores, configuration)
    }

    fn add_posteriors(
        &self,
        configuration: &Vec<usize>,
        weight: f64,
        variable_posteriors: &mut [f64],
        _additional_posteriors: &mut [f64],
    ) {
        for &item in configuration {
            variable_posteriors[item] += weight;
        }
    }

    fn active_variables(&self, configuration: &Vec<usize>) -> Vec<usize> {
        configuration.clone()
    }

    fn configuration_from_assignment(&self, assignment: &[bool]) -> Option<Vec<usize>> {
        let selection = assignment
            .iter()
            .enumerate()
            .filter(|(_, value)| **value)
            .map(|(item, _)| item)
            .collect::<Vec<_>>();
        let total_cost: usize = selection.iter().map(|&item| self.costs[item]).sum();

        (total_cost <= self.capacity).then_some(selection)
    }
}
