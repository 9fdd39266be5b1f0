use crate::error::{Error, Result};
use crate::math::matrix::Matrix;
use crate::network::network::Network;

/// The minimal contract the [`Optimizer`](crate::optim::optimizer::Optimizer)
/// requires of a trainable target: its learnable values as one flat vector,
/// and cost plus cost gradient in the same flattened form.
///
/// Any model satisfying this trait is optimizable; the optimizer never sees
/// layer structure.
pub trait Optimizable {
    /// All learnable values as one flat vector in a fixed traversal order.
    fn parameters(&self) -> Vec<f64>;

    /// Length of the flattened parameter vector.
    fn parameter_count(&self) -> usize;

    /// Writes the vector back element-by-element in the same traversal order.
    /// Fails if the length disagrees with [`parameter_count`](Self::parameter_count).
    fn set_parameters(&mut self, parameters: &[f64]) -> Result<()>;

    /// Scalar cost of the model on the given dataset.
    fn cost(&self, input: &Matrix, output: &Matrix) -> Result<f64>;

    /// Cost gradient, flattened in the same order as the parameters.
    fn cost_prime(&self, input: &Matrix, output: &Matrix) -> Result<Vec<f64>>;
}

/// The network's parameter vector is a view over its live layer matrices in
/// the order weights[0], (biases[0]), weights[1], (biases[1]), ... with each
/// matrix traversed row-major. Nothing is copied into an intermediate owner:
/// `set_parameters` writes straight back into the layers.
impl Optimizable for Network {
    fn parameters(&self) -> Vec<f64> {
        let mut parameters = Vec::with_capacity(self.parameter_count());
        for layer in self.layers() {
            parameters.extend(layer.weights.iter());
            if let Some(biases) = &layer.biases {
                parameters.extend(biases.iter());
            }
        }
        parameters
    }

    fn parameter_count(&self) -> usize {
        self.layers()
            .iter()
            .map(|layer| {
                layer.weights.len() + layer.biases.as_ref().map_or(0, Matrix::len)
            })
            .sum()
    }

    fn set_parameters(&mut self, parameters: &[f64]) -> Result<()> {
        let expected = self.parameter_count();
        if parameters.len() != expected {
            return Err(Error::ParameterCountMismatch {
                expected,
                actual: parameters.len(),
            });
        }

        let mut cursor = 0;
        let mut next = |params: &[f64]| {
            let value = params[cursor];
            cursor += 1;
            value
        };
        for layer in self.layers_mut() {
            layer.weights.fill_with(|| next(parameters));
            if let Some(biases) = &mut layer.biases {
                biases.fill_with(|| next(parameters));
            }
        }

        Ok(())
    }

    fn cost(&self, input: &Matrix, output: &Matrix) -> Result<f64> {
        Network::cost(self, input, output)
    }

    fn cost_prime(&self, input: &Matrix, output: &Matrix) -> Result<Vec<f64>> {
        let gradients = Network::cost_prime(self, input, output)?;

        let mut flat = Vec::with_capacity(self.parameter_count());
        for gradient in &gradients {
            flat.extend(gradient.iter());
        }
        Ok(flat)
    }
}
