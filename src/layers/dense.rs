use serde::{Serialize, Deserialize};

use crate::activation::activation::ActivationFunction;
use crate::error::Result;
use crate::math::matrix::Matrix;

/// One dense stage of the network: the weights leading into it from the
/// previous layer, an optional bias row, and the activation applied in its
/// nodes.
///
/// `weights` is `inputs x outputs`: row = previous node, column = the node it
/// leads into. `biases`, when present, is a `1 x outputs` row broadcast over
/// every batch row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Layer {
    pub weights: Matrix,
    pub biases: Option<Matrix>,
    pub activation: ActivationFunction,
}

/// Pre- and post-activation values of one layer for one input batch.
///
/// `z` is the weighted (and biased) input, `a` is `z` with the activation
/// applied. The forward pass returns one record per layer; backpropagation
/// consumes them, which makes the forward-before-backward ordering an explicit
/// data dependency rather than hidden layer state.
#[derive(Debug, Clone)]
pub struct LayerActivation {
    pub z: Matrix,
    pub a: Matrix,
}

impl Layer {
    /// New unbiased layer with zeroed weights.
    pub fn new(inputs: usize, outputs: usize, activation: ActivationFunction) -> Layer {
        Layer {
            weights: Matrix::zeros(inputs, outputs),
            biases: None,
            activation,
        }
    }

    /// New biased layer with zeroed weights and biases.
    pub fn with_bias(inputs: usize, outputs: usize, activation: ActivationFunction) -> Layer {
        Layer {
            weights: Matrix::zeros(inputs, outputs),
            biases: Some(Matrix::zeros(1, outputs)),
            activation,
        }
    }

    /// Number of nodes of the previous layer.
    pub fn number_of_inputs(&self) -> usize {
        self.weights.height
    }

    /// Number of nodes (outputs) of this layer.
    pub fn number_of_outputs(&self) -> usize {
        self.weights.width
    }

    /// Forward propagates one input batch through the layer.
    ///
    /// `z = input . W` plus the broadcast bias row when present,
    /// `a = f(z)` elementwise.
    pub fn forward(&self, input: &Matrix) -> Result<LayerActivation> {
        let mut z = input.matmul(&self.weights)?;
        if let Some(biases) = &self.biases {
            z = z.zip_map_wrapping(biases, |x, b| x + b);
        }
        let a = z.map(|x| self.activation.function(x));

        Ok(LayerActivation { z, a })
    }

    /// Elementwise activation derivative at the given pre-activation values.
    pub fn activation_prime(&self, z: &Matrix) -> Matrix {
        z.map(|x| self.activation.derivative(x))
    }

    /// Gradient of the cost with respect to this layer's weights, given the
    /// previous layer's activations and this layer's delta.
    pub fn weight_gradient(&self, previous_a: &Matrix, delta: &Matrix) -> Result<Matrix> {
        previous_a.transpose().matmul(delta)
    }

    /// Gradient of the cost with respect to this layer's biases: the column
    /// sum of the delta over all batch rows, accumulating the shared bias
    /// gradient across the batch.
    pub fn bias_gradient(&self, delta: &Matrix) -> Matrix {
        delta.column_sums()
    }
}
