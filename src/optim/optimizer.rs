use crate::error::Result;
use crate::math::matrix::Matrix;
use crate::optim::optimizable::Optimizable;
use crate::optim::rules::UpdateRule;

/// How the dataset is sliced into the batch used by one iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Batching {
    /// Every iteration uses the entire dataset.
    Full,
    /// Iteration `t` uses the single example `t mod N`.
    Stochastic,
    /// The dataset is split into contiguous blocks of `batch_size` rows (the
    /// final block may be shorter); iteration `t` uses block
    /// `t mod number_of_blocks`.
    MiniBatch { batch_size: usize },
}

impl Batching {
    /// Row bounds `[start, end)` of the batch for the given iteration.
    fn batch_bounds(&self, iteration: usize, dataset_size: usize) -> (usize, usize) {
        match *self {
            Batching::Full => (0, dataset_size),
            Batching::Stochastic => {
                let row = iteration % dataset_size;
                (row, row + 1)
            }
            Batching::MiniBatch { batch_size } => {
                let number_of_blocks = (dataset_size + batch_size - 1) / batch_size;
                let block = iteration % number_of_blocks;
                let start = batch_size * block;
                (start, (start + batch_size).min(dataset_size))
            }
        }
    }
}

/// First-order optimization driver.
///
/// Holds the training policy — the caller-supplied continuation predicate and
/// an optional `publish` hook — while the [`Optimizable`] target is borrowed
/// only for the duration of a training call, so it is free for inspection
/// between runs. The optimizer repeatedly queries the target for cost and
/// gradient and applies an [`UpdateRule`] to the flattened parameter vector;
/// it has no termination policy of its own.
pub struct Optimizer<'a, T: Optimizable> {
    keep_training: Box<dyn FnMut(&T, usize, f64) -> bool + 'a>,
    publish: Box<dyn FnMut(&T, usize, f64) + 'a>,
}

impl<'a, T: Optimizable> Optimizer<'a, T> {
    /// New optimizer. `keep_training(target, iteration, cost)` is checked
    /// before every iteration; training stops when it returns false.
    pub fn new<K>(keep_training: K) -> Optimizer<'a, T>
    where
        K: FnMut(&T, usize, f64) -> bool + 'a,
    {
        Optimizer {
            keep_training: Box::new(keep_training),
            publish: Box::new(|_, _, _| {}),
        }
    }

    /// Attaches a progress hook called as `publish(target, iteration, cost)`
    /// once per iteration after the update. It never affects control flow.
    pub fn with_publish<P>(mut self, publish: P) -> Optimizer<'a, T>
    where
        P: FnMut(&T, usize, f64) + 'a,
    {
        self.publish = Box::new(publish);
        self
    }

    /// Trains with every iteration seeing the whole dataset.
    pub fn train_full_batch(
        &mut self,
        target: &mut T,
        rule: UpdateRule,
        input: &Matrix,
        output: &Matrix,
    ) -> Result<f64> {
        self.train(target, rule, Batching::Full, input, output)
    }

    /// Trains one example per iteration, cycling through the dataset in order.
    pub fn train_stochastic(
        &mut self,
        target: &mut T,
        rule: UpdateRule,
        input: &Matrix,
        output: &Matrix,
    ) -> Result<f64> {
        self.train(target, rule, Batching::Stochastic, input, output)
    }

    /// Trains on contiguous blocks of `batch_size` rows, cycling through the
    /// blocks in order.
    pub fn train_mini_batch(
        &mut self,
        target: &mut T,
        rule: UpdateRule,
        batch_size: usize,
        input: &Matrix,
        output: &Matrix,
    ) -> Result<f64> {
        self.train(target, rule, Batching::MiniBatch { batch_size }, input, output)
    }

    /// Runs the training loop until `keep_training` returns false and returns
    /// the last cost.
    ///
    /// Each iteration slices the batch for the chosen strategy, pulls the
    /// gradient from the target, applies the update rule to the flattened
    /// parameters, writes them back, and re-evaluates the cost on the same
    /// batch. Accumulator state is allocated once per call, sized to the
    /// parameter count at call start.
    pub fn train(
        &mut self,
        target: &mut T,
        rule: UpdateRule,
        batching: Batching,
        input: &Matrix,
        output: &Matrix,
    ) -> Result<f64> {
        assert!(input.height > 0, "training set must not be empty");
        assert_eq!(
            input.height, output.height,
            "input and output sets must have equal length"
        );
        if let Batching::MiniBatch { batch_size } = batching {
            assert!(batch_size > 0, "batch_size must be at least 1");
        }

        let mut state = rule.initial_state(target.parameter_count());

        let (start, end) = batching.batch_bounds(0, input.height);
        let mut last_cost =
            target.cost(&input.row_range(start, end), &output.row_range(start, end))?;

        let mut iteration = 0;
        while (self.keep_training)(target, iteration, last_cost) {
            let (start, end) = batching.batch_bounds(iteration, input.height);
            let batch_input = input.row_range(start, end);
            let batch_output = output.row_range(start, end);

            let gradient = target.cost_prime(&batch_input, &batch_output)?;
            let parameters = target.parameters();
            let (new_parameters, new_state) =
                rule.step(iteration, &parameters, &gradient, state);
            state = new_state;
            target.set_parameters(&new_parameters)?;

            last_cost = target.cost(&batch_input, &batch_output)?;
            (self.publish)(target, iteration, last_cost);

            iteration += 1;
        }

        Ok(last_cost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::cell::RefCell;

    /// Quadratic bowl `cost = ½·Σ(θ − c)²` that records the batches it is
    /// asked about. The dataset content is irrelevant to the cost; tests use
    /// the recorded batch shapes to verify slicing.
    struct Bowl {
        parameters: Vec<f64>,
        center: Vec<f64>,
        seen_batches: RefCell<Vec<(f64, usize)>>,
    }

    impl Bowl {
        fn new(parameters: Vec<f64>, center: Vec<f64>) -> Bowl {
            Bowl {
                parameters,
                center,
                seen_batches: RefCell::new(Vec::new()),
            }
        }
    }

    impl Optimizable for Bowl {
        fn parameters(&self) -> Vec<f64> {
            self.parameters.clone()
        }

        fn parameter_count(&self) -> usize {
            self.parameters.len()
        }

        fn set_parameters(&mut self, parameters: &[f64]) -> crate::error::Result<()> {
            if parameters.len() != self.parameters.len() {
                return Err(Error::ParameterCountMismatch {
                    expected: self.parameters.len(),
                    actual: parameters.len(),
                });
            }
            self.parameters = parameters.to_vec();
            Ok(())
        }

        fn cost(&self, _input: &Matrix, _output: &Matrix) -> crate::error::Result<f64> {
            Ok(self
                .parameters
                .iter()
                .zip(&self.center)
                .map(|(p, c)| (p - c) * (p - c))
                .sum::<f64>()
                / 2.0)
        }

        fn cost_prime(
            &self,
            input: &Matrix,
            _output: &Matrix,
        ) -> crate::error::Result<Vec<f64>> {
            self.seen_batches
                .borrow_mut()
                .push((input.get(0, 0), input.height));
            Ok(self
                .parameters
                .iter()
                .zip(&self.center)
                .map(|(p, c)| p - c)
                .collect())
        }
    }

    fn counting_dataset(rows: usize) -> (Matrix, Matrix) {
        let input = Matrix::from_fn(rows, 1, |r, _| r as f64);
        let output = Matrix::zeros(rows, 1);
        (input, output)
    }

    #[test]
    fn mini_batches_cycle_contiguous_blocks_in_order() {
        let (input, output) = counting_dataset(10);
        let mut bowl = Bowl::new(vec![0.0], vec![1.0]);

        let mut optimizer = Optimizer::new(|_: &Bowl, iteration, _| iteration < 6);
        optimizer
            .train_mini_batch(&mut bowl, UpdateRule::gradient_descent(0.1), 3, &input, &output)
            .unwrap();

        // Blocks [0,3) [3,6) [6,9) [9,10) then wrapping around.
        assert_eq!(
            *bowl.seen_batches.borrow(),
            vec![
                (0.0, 3),
                (3.0, 3),
                (6.0, 3),
                (9.0, 1),
                (0.0, 3),
                (3.0, 3),
            ]
        );
    }

    #[test]
    fn stochastic_visits_one_row_per_iteration() {
        let (input, output) = counting_dataset(4);
        let mut bowl = Bowl::new(vec![0.0], vec![1.0]);

        let mut optimizer = Optimizer::new(|_: &Bowl, iteration, _| iteration < 6);
        optimizer
            .train_stochastic(&mut bowl, UpdateRule::gradient_descent(0.1), &input, &output)
            .unwrap();

        assert_eq!(
            *bowl.seen_batches.borrow(),
            vec![
                (0.0, 1),
                (1.0, 1),
                (2.0, 1),
                (3.0, 1),
                (0.0, 1),
                (1.0, 1),
            ]
        );
    }

    #[test]
    fn full_batch_always_sees_the_whole_dataset() {
        let (input, output) = counting_dataset(5);
        let mut bowl = Bowl::new(vec![0.0], vec![1.0]);

        let mut optimizer = Optimizer::new(|_: &Bowl, iteration, _| iteration < 3);
        optimizer
            .train_full_batch(&mut bowl, UpdateRule::gradient_descent(0.1), &input, &output)
            .unwrap();

        assert_eq!(
            *bowl.seen_batches.borrow(),
            vec![(0.0, 5), (0.0, 5), (0.0, 5)]
        );
    }

    #[test]
    fn gradient_descent_converges_on_the_bowl() {
        let (input, output) = counting_dataset(1);
        let mut bowl = Bowl::new(vec![5.0, -3.0], vec![1.0, 2.0]);

        let mut optimizer = Optimizer::new(|_: &Bowl, iteration, _| iteration < 200);
        let cost = optimizer
            .train_full_batch(&mut bowl, UpdateRule::gradient_descent(0.1), &input, &output)
            .unwrap();

        assert!(cost < 1e-8);
        assert!((bowl.parameters[0] - 1.0).abs() < 1e-4);
        assert!((bowl.parameters[1] - 2.0).abs() < 1e-4);
    }

    #[test]
    fn target_is_free_between_training_calls() {
        // The target is only borrowed for the duration of one train call, so
        // it can be inspected and retrained with the same optimizer.
        let (input, output) = counting_dataset(1);
        let mut bowl = Bowl::new(vec![4.0], vec![0.0]);

        let mut optimizer = Optimizer::new(|_: &Bowl, iteration, _| iteration < 5);
        optimizer
            .train_full_batch(&mut bowl, UpdateRule::gradient_descent(0.1), &input, &output)
            .unwrap();

        let midway = bowl.parameters[0];
        assert!(midway < 4.0);

        optimizer
            .train_full_batch(&mut bowl, UpdateRule::gradient_descent(0.1), &input, &output)
            .unwrap();
        assert!(bowl.parameters[0] < midway);
    }

    #[test]
    fn publish_fires_once_per_iteration_with_decreasing_cost() {
        let (input, output) = counting_dataset(1);
        let mut bowl = Bowl::new(vec![4.0], vec![0.0]);

        let published = RefCell::new(Vec::new());
        let mut optimizer = Optimizer::new(|_: &Bowl, iteration, _| iteration < 10)
            .with_publish(|_, iteration, cost| published.borrow_mut().push((iteration, cost)));
        optimizer
            .train_full_batch(&mut bowl, UpdateRule::gradient_descent(0.1), &input, &output)
            .unwrap();
        drop(optimizer);

        let published = published.into_inner();
        assert_eq!(published.len(), 10);
        assert_eq!(published[0].0, 0);
        assert!(published.windows(2).all(|w| w[1].1 < w[0].1));
    }

    #[test]
    fn predicate_can_stop_on_cost_threshold() {
        let (input, output) = counting_dataset(1);
        let mut bowl = Bowl::new(vec![4.0], vec![0.0]);

        let mut optimizer = Optimizer::new(|_: &Bowl, _, cost| cost > 1e-3);
        let cost = optimizer
            .train_full_batch(&mut bowl, UpdateRule::gradient_descent(0.5), &input, &output)
            .unwrap();

        assert!(cost <= 1e-3);
    }
}
