use rand::prelude::*;
use serde::{Serialize, Deserialize};

use crate::activation::activation::ActivationFunction;
use crate::error::Result;
use crate::layers::dense::{Layer, LayerActivation};
use crate::math::matrix::Matrix;

/// Feed-forward neural network: an ordered chain of dense layers.
///
/// Input and output sets are stored in matrices in which every row is one
/// dataset and every column feeds one node. The first layer is the first
/// hidden layer, the last layer is the output layer; the output size of layer
/// `i` equals the input size of layer `i + 1`.
///
/// A network is constructed either without per-node biases ([`Network::new`])
/// or with them ([`Network::with_biases`]); weights are Xavier-seeded at
/// construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Network {
    layers: Vec<Layer>,
}

impl Network {
    /// Builds an unbiased network and Xavier-seeds its weights.
    ///
    /// `layer_sizes` holds one node count per layer, the last being the
    /// output size; `activations` pairs one activation function with each
    /// layer.
    pub fn new(
        number_of_inputs: usize,
        layer_sizes: &[usize],
        activations: &[ActivationFunction],
    ) -> Network {
        Network::build(number_of_inputs, layer_sizes, activations, false)
    }

    /// Builds a network whose every layer carries a `1 x outputs` bias row.
    /// Weights are Xavier-seeded, biases drawn standard-normal.
    pub fn with_biases(
        number_of_inputs: usize,
        layer_sizes: &[usize],
        activations: &[ActivationFunction],
    ) -> Network {
        Network::build(number_of_inputs, layer_sizes, activations, true)
    }

    fn build(
        number_of_inputs: usize,
        layer_sizes: &[usize],
        activations: &[ActivationFunction],
        biased: bool,
    ) -> Network {
        assert!(number_of_inputs > 0, "number_of_inputs must be positive");
        assert!(!layer_sizes.is_empty(), "at least one layer is required");
        assert!(
            layer_sizes.iter().all(|&size| size > 0),
            "layer sizes must be positive"
        );
        assert_eq!(
            layer_sizes.len(),
            activations.len(),
            "one activation function is required per layer"
        );

        let mut layers = Vec::with_capacity(layer_sizes.len());
        let mut inputs = number_of_inputs;
        for (&size, &activation) in layer_sizes.iter().zip(activations) {
            layers.push(if biased {
                Layer::with_bias(inputs, size, activation)
            } else {
                Layer::new(inputs, size, activation)
            });
            inputs = size;
        }

        let mut network = Network { layers };
        network.seed_weights();
        network
    }

    pub fn number_of_inputs(&self) -> usize {
        self.layers[0].number_of_inputs()
    }

    pub fn number_of_outputs(&self) -> usize {
        self.layers[self.layers.len() - 1].number_of_outputs()
    }

    pub fn number_of_layers(&self) -> usize {
        self.layers.len()
    }

    /// Number of nodes in the given layer.
    pub fn layer_size(&self, layer: usize) -> usize {
        self.layers[layer].number_of_outputs()
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub(crate) fn layers_mut(&mut self) -> &mut [Layer] {
        &mut self.layers
    }

    pub fn weights(&self, layer: usize) -> &Matrix {
        &self.layers[layer].weights
    }

    pub fn weights_mut(&mut self, layer: usize) -> &mut Matrix {
        &mut self.layers[layer].weights
    }

    /// Replaces the weights of the given layer. Panics if the shape differs.
    pub fn set_weights(&mut self, layer: usize, weights: Matrix) {
        let current = &self.layers[layer].weights;
        assert_eq!(
            (current.height, current.width),
            (weights.height, weights.width),
            "replacement weights must match the layer shape"
        );
        self.layers[layer].weights = weights;
    }

    /// Biases of the given layer, or `None` in the unbiased variant.
    pub fn biases(&self, layer: usize) -> Option<&Matrix> {
        self.layers[layer].biases.as_ref()
    }

    pub fn biases_mut(&mut self, layer: usize) -> Option<&mut Matrix> {
        self.layers[layer].biases.as_mut()
    }

    /// Replaces the biases of the given layer. Panics in the unbiased variant
    /// or if the shape differs.
    pub fn set_biases(&mut self, layer: usize, biases: Matrix) {
        let current = self.layers[layer]
            .biases
            .as_ref()
            .expect("network has no biases");
        assert_eq!(
            (current.height, current.width),
            (biases.height, biases.width),
            "replacement biases must match the layer shape"
        );
        self.layers[layer].biases = Some(biases);
    }

    pub fn activation(&self, layer: usize) -> ActivationFunction {
        self.layers[layer].activation
    }

    /// Randomizes all weights with the Xavier initialization scheme.
    pub fn seed_weights(&mut self) {
        self.seed_weights_with(&mut rand::thread_rng());
    }

    /// Xavier-seeds all weights from a deterministic generator.
    pub fn seed_weights_seeded(&mut self, seed: u64) {
        self.seed_weights_with(&mut StdRng::seed_from_u64(seed));
    }

    /// Randomizes all weights with the Xavier initialization scheme using the
    /// given generator: each weight is drawn from N(0, 1/sqrt(avg)) where
    /// `avg = (inputs + outputs) / 2`; biases are drawn standard-normal.
    pub fn seed_weights_with<R: Rng>(&mut self, rng: &mut R) {
        for layer in &mut self.layers {
            let average =
                (layer.number_of_inputs() + layer.number_of_outputs()) as f64 / 2.0;
            let scale = 1.0 / average.sqrt();

            layer
                .weights
                .fill_with(|| scale * Matrix::sample_standard_normal(rng));
            if let Some(biases) = &mut layer.biases {
                biases.fill_with(|| Matrix::sample_standard_normal(rng));
            }
        }
    }

    /// Limits all weights and biases to `[-f64::MAX / 2, f64::MAX / 2]` while
    /// also eliminating NaNs.
    pub fn keep_weights_in_bounds(&mut self) {
        self.keep_weights_in_bounds_within(-f64::MAX / 2.0, f64::MAX / 2.0);
    }

    /// Limits all weights and biases to `[minimum, maximum]`, replacing NaNs
    /// with the midpoint of the range. This is remediation against numeric
    /// divergence, not an error path, and is never invoked implicitly.
    pub fn keep_weights_in_bounds_within(&mut self, minimum: f64, maximum: f64) {
        let bound = move |x: f64| {
            if x.is_nan() {
                (minimum + maximum) / 2.0
            } else if x < minimum {
                minimum
            } else if x > maximum {
                maximum
            } else {
                x
            }
        };

        for layer in &mut self.layers {
            layer.weights.map_inplace(bound);
            if let Some(biases) = &mut layer.biases {
                biases.map_inplace(bound);
            }
        }
    }

    /// Forward propagates the input batch and returns the network output.
    pub fn forward(&self, input: &Matrix) -> Result<Matrix> {
        let mut a = input.clone();
        for layer in &self.layers {
            a = layer.forward(&a)?.a;
        }
        Ok(a)
    }

    /// Forward propagates the input batch and returns the per-layer
    /// activation records consumed by backpropagation.
    pub fn forward_trace(&self, input: &Matrix) -> Result<Vec<LayerActivation>> {
        let mut trace = Vec::with_capacity(self.layers.len());
        let mut a = input.clone();
        for layer in &self.layers {
            let activation = layer.forward(&a)?;
            a = activation.a.clone();
            trace.push(activation);
        }
        Ok(trace)
    }

    /// Half the summed squared error of the network output against the wanted
    /// output, accumulated over every batch row and output column.
    ///
    /// The sum is deliberately not divided by the batch size; downstream
    /// learning-rate defaults are calibrated against this convention.
    pub fn cost(&self, input: &Matrix, output: &Matrix) -> Result<f64> {
        let difference = output.sub(&self.forward(input)?)?;
        let squared_error = difference.mul_elementwise(&difference)?;

        Ok(squared_error.iter().sum::<f64>() / 2.0)
    }

    /// Derivative of the cost with respect to every weight (and bias), in
    /// flattening order: `[dW0, (db0), dW1, (db1), ...]`.
    pub fn cost_prime(&self, input: &Matrix, output: &Matrix) -> Result<Vec<Matrix>> {
        let trace = self.forward_trace(input)?;
        let last = self.layers.len() - 1;

        // Output-layer delta: (y_hat - y) ⊙ f'(z_L).
        let mut delta = trace[last]
            .a
            .sub(output)?
            .mul_elementwise(&self.layers[last].activation_prime(&trace[last].z))?;

        // Walk backwards collecting (dW, db) per layer.
        let mut reversed: Vec<(Matrix, Option<Matrix>)> =
            Vec::with_capacity(self.layers.len());
        for i in (0..self.layers.len()).rev() {
            let layer = &self.layers[i];
            let previous_a = if i == 0 { input } else { &trace[i - 1].a };

            let weight_gradient = layer.weight_gradient(previous_a, &delta)?;
            let bias_gradient = layer.biases.as_ref().map(|_| layer.bias_gradient(&delta));
            reversed.push((weight_gradient, bias_gradient));

            if i > 0 {
                delta = delta
                    .matmul(&layer.weights.transpose())?
                    .mul_elementwise(
                        &self.layers[i - 1].activation_prime(&trace[i - 1].z),
                    )?;
            }
        }

        let mut gradients = Vec::with_capacity(2 * self.layers.len());
        for (weight_gradient, bias_gradient) in reversed.into_iter().rev() {
            gradients.push(weight_gradient);
            if let Some(bias_gradient) = bias_gradient {
                gradients.push(bias_gradient);
            }
        }

        Ok(gradients)
    }

    /// Serializes the network to a pretty-printed JSON file.
    pub fn save_json(&self, path: &str) -> std::io::Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
    }

    /// Deserializes a network from a JSON file previously written by
    /// `save_json`.
    pub fn load_json(path: &str) -> std::io::Result<Network> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        serde_json::from_reader(reader)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity_net(weights: Vec<Matrix>) -> Network {
        let sizes: Vec<usize> = weights.iter().map(|w| w.width).collect();
        let activations = vec![ActivationFunction::Identity; weights.len()];
        let mut net = Network::new(weights[0].height, &sizes, &activations);
        for (i, w) in weights.into_iter().enumerate() {
            net.set_weights(i, w);
        }
        net
    }

    #[test]
    fn forward_output_shape_matches_batch_and_last_layer() {
        let net = Network::with_biases(
            4,
            &[5, 3, 2],
            &[
                ActivationFunction::Tanh,
                ActivationFunction::Sigmoid,
                ActivationFunction::Identity,
            ],
        );

        let input = Matrix::zeros(7, 4);
        let output = net.forward(&input).unwrap();
        assert_eq!((output.height, output.width), (7, 2));
    }

    #[test]
    fn cost_is_half_summed_squared_error() {
        // Single identity layer computing y = x1 + x2.
        let net = identity_net(vec![Matrix::from_rows(vec![vec![1.0], vec![1.0]])]);

        let input = Matrix::from_rows(vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
        // Outputs are 3 and 7; targets leave errors of 1 and 2.
        let target = Matrix::from_rows(vec![vec![4.0], vec![5.0]]);

        let cost = net.cost(&input, &target).unwrap();
        assert!((cost - (1.0 + 4.0) / 2.0).abs() < 1e-12);
    }

    #[test]
    fn clone_copies_weights_deeply() {
        let mut original = Network::new(2, &[2], &[ActivationFunction::Identity]);
        original.seed_weights_seeded(3);
        let copy = original.clone();

        original.weights_mut(0).set(0, 0, 123.0);
        assert_ne!(copy.weights(0).get(0, 0), 123.0);
    }

    #[test]
    fn bounds_keeping_clamps_and_remediates_nan() {
        let mut net = Network::with_biases(1, &[2], &[ActivationFunction::Identity]);
        net.set_weights(0, Matrix::from_rows(vec![vec![5.0, f64::NAN]]));
        net.set_biases(0, Matrix::from_rows(vec![vec![-5.0, 0.5]]));

        net.keep_weights_in_bounds_within(-1.0, 1.0);

        assert_eq!(net.weights(0).get(0, 0), 1.0);
        assert_eq!(net.weights(0).get(0, 1), 0.0); // NaN -> range midpoint
        assert_eq!(net.biases(0).unwrap().get(0, 0), -1.0);
        assert_eq!(net.biases(0).unwrap().get(0, 1), 0.5);
    }

    #[test]
    fn xavier_seeding_matches_expected_spread() {
        // One 50x50 layer: avg fan = 50, expected std = 1/sqrt(50).
        let mut net = Network::new(50, &[50], &[ActivationFunction::Identity]);
        net.seed_weights_seeded(11);

        let values: Vec<f64> = net.weights(0).iter().collect();
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance =
            values.iter().map(|x| (x - mean) * (x - mean)).sum::<f64>() / (n - 1.0);
        let expected_std = 1.0 / (50.0f64).sqrt();

        assert!(mean.abs() < 0.02, "sample mean {mean} too far from 0");
        assert!(
            (variance.sqrt() - expected_std).abs() < 0.1 * expected_std,
            "sample std {} inconsistent with {}",
            variance.sqrt(),
            expected_std
        );
    }

    #[test]
    fn json_round_trip_preserves_weights() {
        let mut net = Network::with_biases(
            2,
            &[3, 1],
            &[ActivationFunction::Tanh, ActivationFunction::Identity],
        );
        net.seed_weights_seeded(21);

        let path = std::env::temp_dir().join("graphite_nn_round_trip.json");
        let path = path.to_str().unwrap().to_string();
        net.save_json(&path).unwrap();
        let restored = Network::load_json(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(restored.number_of_layers(), 2);
        assert_eq!(restored.weights(0), net.weights(0));
        assert_eq!(restored.biases(1), net.biases(1));
    }
}
