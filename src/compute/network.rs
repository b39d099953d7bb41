//! Feed-forward evaluation of dense networks.

use crate::schema::{Activation, LayerConfig, NetworkConfig};

/// Apply an activation to a whole layer in place.
pub fn activate_inplace(values: &mut [f32], activation: Activation) {
    match activation {
        Activation::Linear => {}
        Activation::Relu => {
            for v in values.iter_mut() {
                *v = v.max(0.0);
            }
        }
        Activation::Sigmoid => {
            for v in values.iter_mut() {
                *v = 1.0 / (1.0 + (-*v).exp());
            }
        }
        Activation::Tanh => {
            for v in values.iter_mut() {
                *v = v.tanh();
            }
        }
        Activation::Softmax => softmax_inplace(values),
    }
}

/// Numerically stable softmax.
pub fn softmax_inplace(values: &mut [f32]) {
    let max = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    if !max.is_finite() {
        return;
    }
    let mut sum = 0.0f32;
    for v in values.iter_mut() {
        *v = (*v - max).exp();
        sum += *v;
    }
    if sum > 0.0 {
        let inv = 1.0 / sum;
        for v in values.iter_mut() {
            *v *= inv;
        }
    }
}

/// Affine transform plus activation for one layer, writing into `output`.
fn layer_forward(layer: &LayerConfig, input: &[f32], output: &mut Vec<f32>) {
    output.clear();
    output.extend((0..layer.outputs).map(|row| {
        let weights = layer.row(row);
        let dot: f32 = weights.iter().zip(input).map(|(w, x)| w * x).sum();
        dot + layer.biases.get(row).copied().unwrap_or(0.0)
    }));
    activate_inplace(output, layer.activation);
}

/// Run a network on one input vector and return the output layer's values.
///
/// Inputs shorter than the first layer are treated as zero-padded; extra
/// values are ignored.
pub fn feedforward(config: &NetworkConfig, input: &[f32]) -> Vec<f32> {
    let mut current: Vec<f32> = input.to_vec();
    let mut next = Vec::new();
    for layer in &config.layers {
        current.resize(layer.inputs, 0.0);
        layer_forward(layer, &current, &mut next);
        std::mem::swap(&mut current, &mut next);
    }
    current
}

/// Index of the largest output. The first maximum wins; NaN never wins.
pub fn argmax(outputs: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &v) in outputs.iter().enumerate() {
        if v.is_nan() {
            continue;
        }
        if best.is_none_or(|(_, b)| v > b) {
            best = Some((i, v));
        }
    }
    best.map(|(i, _)| i)
}
