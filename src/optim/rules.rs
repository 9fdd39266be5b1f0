/// Divisor guard for the adaptive rules.
pub const EPSILON: f64 = 1e-8;

pub const DEFAULT_MOMENTUM: f64 = 0.9;
pub const DEFAULT_ADAGRAD_LEARNING_RATE: f64 = 0.01;
pub const DEFAULT_RMSPROP_LEARNING_RATE: f64 = 0.01;
pub const DEFAULT_RMSPROP_DECAY: f64 = 0.9;
pub const DEFAULT_ADAM_LEARNING_RATE: f64 = 1e-3;
pub const DEFAULT_ADAM_BETA1: f64 = 0.9;
pub const DEFAULT_ADAM_BETA2: f64 = 0.999;

/// One of the six first-order update rules applied to the flattened parameter
/// vector each iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UpdateRule {
    GradientDescent { learning_rate: f64 },
    Momentum { learning_rate: f64, momentum: f64 },
    Nesterov { learning_rate: f64, momentum: f64 },
    Adagrad { learning_rate: f64 },
    RmsProp { learning_rate: f64, decay: f64 },
    Adam { learning_rate: f64, beta1: f64, beta2: f64 },
}

/// Accumulator vectors a rule carries between iterations.
///
/// Allocated once per training call, sized to the parameter count at call
/// start, and discarded when the call returns; never shared across calls.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleState {
    Stateless,
    /// Parameter velocities (momentum and Nesterov).
    Velocity(Vec<f64>),
    /// Running squared-gradient sum (AdaGrad) or decayed mean (RMSProp).
    SquaredGradients(Vec<f64>),
    /// Adam's first and second moment estimates.
    Moments { first: Vec<f64>, second: Vec<f64> },
}

impl UpdateRule {
    pub fn gradient_descent(learning_rate: f64) -> UpdateRule {
        UpdateRule::GradientDescent { learning_rate }
    }

    /// Momentum with the default 0.9.
    pub fn momentum(learning_rate: f64) -> UpdateRule {
        UpdateRule::momentum_with(learning_rate, DEFAULT_MOMENTUM)
    }

    pub fn momentum_with(learning_rate: f64, momentum: f64) -> UpdateRule {
        UpdateRule::Momentum {
            learning_rate,
            momentum,
        }
    }

    /// Nesterov momentum with the default 0.9.
    pub fn nesterov(learning_rate: f64) -> UpdateRule {
        UpdateRule::nesterov_with(learning_rate, DEFAULT_MOMENTUM)
    }

    pub fn nesterov_with(learning_rate: f64, momentum: f64) -> UpdateRule {
        UpdateRule::Nesterov {
            learning_rate,
            momentum,
        }
    }

    /// AdaGrad with the default learning rate 0.01.
    pub fn adagrad() -> UpdateRule {
        UpdateRule::adagrad_with(DEFAULT_ADAGRAD_LEARNING_RATE)
    }

    pub fn adagrad_with(learning_rate: f64) -> UpdateRule {
        UpdateRule::Adagrad { learning_rate }
    }

    /// RMSProp with the defaults learning rate 0.01, decay 0.9.
    pub fn rmsprop() -> UpdateRule {
        UpdateRule::rmsprop_with(DEFAULT_RMSPROP_LEARNING_RATE, DEFAULT_RMSPROP_DECAY)
    }

    pub fn rmsprop_with(learning_rate: f64, decay: f64) -> UpdateRule {
        UpdateRule::RmsProp {
            learning_rate,
            decay,
        }
    }

    /// Adam with the defaults learning rate 1e-3, beta1 0.9, beta2 0.999.
    pub fn adam() -> UpdateRule {
        UpdateRule::adam_with(
            DEFAULT_ADAM_LEARNING_RATE,
            DEFAULT_ADAM_BETA1,
            DEFAULT_ADAM_BETA2,
        )
    }

    pub fn adam_with(learning_rate: f64, beta1: f64, beta2: f64) -> UpdateRule {
        UpdateRule::Adam {
            learning_rate,
            beta1,
            beta2,
        }
    }

    /// Zeroed accumulator state for a parameter vector of the given length.
    pub fn initial_state(&self, parameter_count: usize) -> RuleState {
        match self {
            UpdateRule::GradientDescent { .. } => RuleState::Stateless,
            UpdateRule::Momentum { .. } | UpdateRule::Nesterov { .. } => {
                RuleState::Velocity(vec![0.0; parameter_count])
            }
            UpdateRule::Adagrad { .. } | UpdateRule::RmsProp { .. } => {
                RuleState::SquaredGradients(vec![0.0; parameter_count])
            }
            UpdateRule::Adam { .. } => RuleState::Moments {
                first: vec![0.0; parameter_count],
                second: vec![0.0; parameter_count],
            },
        }
    }

    /// Applies one update to the parameter vector.
    ///
    /// Pure step: consumes the accumulator state and returns the new
    /// parameters together with the new state. `iteration` is zero-based and
    /// only Adam's bias correction reads it.
    pub fn step(
        &self,
        iteration: usize,
        parameters: &[f64],
        gradient: &[f64],
        state: RuleState,
    ) -> (Vec<f64>, RuleState) {
        match (*self, state) {
            (UpdateRule::GradientDescent { learning_rate }, RuleState::Stateless) => {
                let new_parameters =
                    combine(parameters, gradient, |p, g| p - learning_rate * g);
                (new_parameters, RuleState::Stateless)
            }

            (
                UpdateRule::Momentum {
                    learning_rate,
                    momentum,
                },
                RuleState::Velocity(velocity),
            ) => {
                let new_velocity = combine(gradient, &velocity, |g, v| {
                    learning_rate * g + momentum * v
                });
                let new_parameters = combine(parameters, &new_velocity, |p, v| p - v);
                (new_parameters, RuleState::Velocity(new_velocity))
            }

            (
                UpdateRule::Nesterov {
                    learning_rate,
                    momentum,
                },
                RuleState::Velocity(velocity),
            ) => {
                let new_velocity = combine(&velocity, gradient, |v, g| {
                    momentum * v - learning_rate * g
                });
                let update = combine(&velocity, &new_velocity, |v, v_new| {
                    (1.0 + momentum) * v_new - momentum * v
                });
                let new_parameters = combine(parameters, &update, |p, u| p + u);
                (new_parameters, RuleState::Velocity(new_velocity))
            }

            (
                UpdateRule::Adagrad { learning_rate },
                RuleState::SquaredGradients(sum),
            ) => {
                let new_sum = combine(&sum, gradient, |s, g| s + g * g);
                let new_parameters = apply_adaptive(parameters, gradient, &new_sum, learning_rate);
                (new_parameters, RuleState::SquaredGradients(new_sum))
            }

            (
                UpdateRule::RmsProp {
                    learning_rate,
                    decay,
                },
                RuleState::SquaredGradients(mean),
            ) => {
                let new_mean = combine(&mean, gradient, |m, g| {
                    decay * m + (1.0 - decay) * g * g
                });
                let new_parameters = apply_adaptive(parameters, gradient, &new_mean, learning_rate);
                (new_parameters, RuleState::SquaredGradients(new_mean))
            }

            (
                UpdateRule::Adam {
                    learning_rate,
                    beta1,
                    beta2,
                },
                RuleState::Moments { first, second },
            ) => {
                let new_first =
                    combine(&first, gradient, |m, g| beta1 * m + (1.0 - beta1) * g);
                let new_second = combine(&second, gradient, |v, g| {
                    beta2 * v + (1.0 - beta2) * g * g
                });

                // Bias correction; t is one-based.
                let t = (iteration + 1) as i32;
                let first_unbias: Vec<f64> = new_first
                    .iter()
                    .map(|m| m / (1.0 - beta1.powi(t)))
                    .collect();
                let second_unbias: Vec<f64> = new_second
                    .iter()
                    .map(|v| v / (1.0 - beta2.powi(t)))
                    .collect();

                let update = combine(&first_unbias, &second_unbias, |m, v| {
                    learning_rate / (v.sqrt() + EPSILON) * m
                });
                let new_parameters = combine(parameters, &update, |p, u| p - u);
                (
                    new_parameters,
                    RuleState::Moments {
                        first: new_first,
                        second: new_second,
                    },
                )
            }

            (rule, state) => unreachable!(
                "accumulator state {state:?} does not belong to update rule {rule:?}"
            ),
        }
    }
}

/// `θ ← θ − η·g/(√s + ε)`, shared by AdaGrad and RMSProp.
fn apply_adaptive(
    parameters: &[f64],
    gradient: &[f64],
    squared: &[f64],
    learning_rate: f64,
) -> Vec<f64> {
    parameters
        .iter()
        .zip(gradient.iter().zip(squared))
        .map(|(&p, (&g, &s))| p - learning_rate / (s.sqrt() + EPSILON) * g)
        .collect()
}

fn combine<F>(a: &[f64], b: &[f64], mut operator: F) -> Vec<f64>
where
    F: FnMut(f64, f64) -> f64,
{
    a.iter().zip(b).map(|(&x, &y)| operator(x, y)).collect()
}
