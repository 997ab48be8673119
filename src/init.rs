//! Weight initialization over a model's layer tree
//!
//! Every layer declares a [`LayerKind`]; the kind maps to a [`Category`] which
//! decides what happens to its parameters:
//!
//! - convolutional and fully-connected layers get the supplied initialization
//!   on their weight, and on their bias when the function can handle a 1-D
//!   tensor with default parameters,
//! - normalization layers are reset to weight 1 and bias 0,
//! - everything else is left alone.
//!
//! Parameters are `candle_core::Var`s owned by the caller and are updated in
//! place. Random draws come from the tensor generator in [`crate::seed`].

use candle_core::{DType, Device, Tensor, Var};
use candle_nn::{Conv2d, Conv2dConfig, Linear};
use rand::distr::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand_distr::Normal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::seed;

/// How a layer's parameters are initialized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// 2-D and 3-D convolutions
    Convolutional,
    /// Dense layers
    FullyConnected,
    /// Batch normalization
    Normalization,
}

/// Concrete layer types a model can be built from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LayerKind {
    Conv2d,
    Conv3d,
    Linear,
    BatchNorm1d,
    BatchNorm2d,
    LayerNorm,
    Embedding,
}

impl LayerKind {
    /// Initialization category, `None` for kinds the initializer skips
    pub const fn category(self) -> Option<Category> {
        match self {
            LayerKind::Conv2d | LayerKind::Conv3d => Some(Category::Convolutional),
            LayerKind::Linear => Some(Category::FullyConnected),
            LayerKind::BatchNorm1d | LayerKind::BatchNorm2d => Some(Category::Normalization),
            LayerKind::LayerNorm | LayerKind::Embedding => None,
        }
    }
}

/// A leaf layer: its kind plus weight and optional bias
#[derive(Debug, Clone)]
pub struct Layer {
    name: String,
    kind: LayerKind,
    weight: Var,
    bias: Option<Var>,
}

impl Layer {
    /// Wrap existing parameters
    pub fn new(name: impl Into<String>, kind: LayerKind, weight: Var, bias: Option<Var>) -> Self {
        Self {
            name: name.into(),
            kind,
            weight,
            bias,
        }
    }

    fn zeroed(
        name: impl Into<String>,
        kind: LayerKind,
        weight_shape: Vec<usize>,
        bias_len: Option<usize>,
        device: &Device,
    ) -> Result<Self> {
        let weight = Var::zeros(weight_shape, DType::F32, device)?;
        let bias = match bias_len {
            Some(len) => Some(Var::zeros(len, DType::F32, device)?),
            None => None,
        };
        Ok(Self::new(name, kind, weight, bias))
    }

    /// Dense layer with weight `(out, in)`
    pub fn linear(
        name: impl Into<String>,
        in_features: usize,
        out_features: usize,
        bias: bool,
        device: &Device,
    ) -> Result<Self> {
        Self::zeroed(
            name,
            LayerKind::Linear,
            vec![out_features, in_features],
            bias.then_some(out_features),
            device,
        )
    }

    /// 2-D convolution with weight `(out, in, k, k)`
    pub fn conv2d(
        name: impl Into<String>,
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        bias: bool,
        device: &Device,
    ) -> Result<Self> {
        Self::zeroed(
            name,
            LayerKind::Conv2d,
            vec![out_channels, in_channels, kernel_size, kernel_size],
            bias.then_some(out_channels),
            device,
        )
    }

    /// 3-D convolution with weight `(out, in, k, k, k)`
    pub fn conv3d(
        name: impl Into<String>,
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        bias: bool,
        device: &Device,
    ) -> Result<Self> {
        Self::zeroed(
            name,
            LayerKind::Conv3d,
            vec![out_channels, in_channels, kernel_size, kernel_size, kernel_size],
            bias.then_some(out_channels),
            device,
        )
    }

    /// 1-D batch normalization over `features`
    pub fn batch_norm1d(name: impl Into<String>, features: usize, device: &Device) -> Result<Self> {
        Self::zeroed(name, LayerKind::BatchNorm1d, vec![features], Some(features), device)
    }

    /// 2-D batch normalization over `features` channels
    pub fn batch_norm2d(name: impl Into<String>, features: usize, device: &Device) -> Result<Self> {
        Self::zeroed(name, LayerKind::BatchNorm2d, vec![features], Some(features), device)
    }

    /// Layer normalization over `features`
    pub fn layer_norm(name: impl Into<String>, features: usize, device: &Device) -> Result<Self> {
        Self::zeroed(name, LayerKind::LayerNorm, vec![features], Some(features), device)
    }

    /// Embedding table `(vocab, dim)`
    pub fn embedding(
        name: impl Into<String>,
        vocab_size: usize,
        dim: usize,
        device: &Device,
    ) -> Result<Self> {
        Self::zeroed(name, LayerKind::Embedding, vec![vocab_size, dim], None, device)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> LayerKind {
        self.kind
    }

    pub fn weight(&self) -> &Var {
        &self.weight
    }

    pub fn bias(&self) -> Option<&Var> {
        self.bias.as_ref()
    }

    /// View a dense layer as a `candle_nn::Linear` sharing the same storage
    pub fn to_linear(&self) -> Option<Linear> {
        (self.kind == LayerKind::Linear).then(|| {
            Linear::new(
                self.weight.as_tensor().clone(),
                self.bias.as_ref().map(|b| b.as_tensor().clone()),
            )
        })
    }

    /// View a 2-D convolution as a `candle_nn::Conv2d` sharing the same storage
    pub fn to_conv2d(&self, config: Conv2dConfig) -> Option<Conv2d> {
        (self.kind == LayerKind::Conv2d).then(|| {
            Conv2d::new(
                self.weight.as_tensor().clone(),
                self.bias.as_ref().map(|b| b.as_tensor().clone()),
                config,
            )
        })
    }
}

/// A node in a model: either a leaf layer or a container of sub-modules
pub trait Module {
    /// Local name of this module
    fn name(&self) -> &str;

    /// The leaf layer, if this module is one
    fn as_layer(&self) -> Option<&Layer> {
        None
    }

    /// Direct sub-modules in declaration order
    fn children(&self) -> Vec<&dyn Module> {
        Vec::new()
    }
}

impl Module for Layer {
    fn name(&self) -> &str {
        &self.name
    }

    fn as_layer(&self) -> Option<&Layer> {
        Some(self)
    }
}

/// Ordered container of sub-modules
#[derive(Default)]
pub struct Sequential {
    name: String,
    modules: Vec<Box<dyn Module>>,
}

impl Sequential {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            modules: Vec::new(),
        }
    }

    /// Append a sub-module
    pub fn add(mut self, module: impl Module + 'static) -> Self {
        self.modules.push(Box::new(module));
        self
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl Module for Sequential {
    fn name(&self) -> &str {
        &self.name
    }

    fn children(&self) -> Vec<&dyn Module> {
        self.modules.iter().map(|m| m.as_ref()).collect()
    }
}

/// Visit every leaf layer below `module` (children before parents), passing
/// its dotted path from the root.
pub fn visit_layers<F>(module: &dyn Module, f: &mut F) -> Result<()>
where
    F: FnMut(&str, &Layer) -> Result<()>,
{
    walk(module, module.name().to_string(), f)
}

fn walk<F>(module: &dyn Module, path: String, f: &mut F) -> Result<()>
where
    F: FnMut(&str, &Layer) -> Result<()>,
{
    for child in module.children() {
        let child_path = if path.is_empty() {
            child.name().to_string()
        } else {
            format!("{}.{}", path, child.name())
        };
        walk(child, child_path, f)?;
    }

    if let Some(layer) = module.as_layer() {
        f(&path, layer)?;
    }
    Ok(())
}

/// Fan computation mode for Kaiming initialization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FanMode {
    #[default]
    FanIn,
    FanOut,
}

/// Nonlinearity following the layer, used to pick the Kaiming gain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Nonlinearity {
    Linear,
    Sigmoid,
    Tanh,
    Relu,
    #[default]
    LeakyRelu,
}

impl Nonlinearity {
    /// Recommended gain; `slope` is the negative slope for leaky ReLU
    pub fn gain(self, slope: f64) -> f64 {
        match self {
            Nonlinearity::Linear | Nonlinearity::Sigmoid => 1.0,
            Nonlinearity::Tanh => 5.0 / 3.0,
            Nonlinearity::Relu => 2.0f64.sqrt(),
            Nonlinearity::LeakyRelu => (2.0 / (1.0 + slope * slope)).sqrt(),
        }
    }
}

/// Keyword parameters for an initialization function.
///
/// Unset fields fall back to each function's defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InitParams {
    /// Fill value for `Constant`
    pub val: Option<f64>,
    /// Mean for `Normal`
    pub mean: Option<f64>,
    /// Standard deviation for `Normal`
    pub std: Option<f64>,
    /// Lower bound for `Uniform`, negative slope for Kaiming
    pub a: Option<f64>,
    /// Upper bound for `Uniform`
    pub b: Option<f64>,
    /// Scaling for Xavier
    pub gain: Option<f64>,
    /// Fan mode for Kaiming
    pub mode: Option<FanMode>,
    /// Nonlinearity for Kaiming
    pub nonlinearity: Option<Nonlinearity>,
}

impl InitParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn val(mut self, val: f64) -> Self {
        self.val = Some(val);
        self
    }

    pub fn mean(mut self, mean: f64) -> Self {
        self.mean = Some(mean);
        self
    }

    pub fn std(mut self, std: f64) -> Self {
        self.std = Some(std);
        self
    }

    pub fn bounds(mut self, a: f64, b: f64) -> Self {
        self.a = Some(a);
        self.b = Some(b);
        self
    }

    pub fn slope(mut self, a: f64) -> Self {
        self.a = Some(a);
        self
    }

    pub fn gain(mut self, gain: f64) -> Self {
        self.gain = Some(gain);
        self
    }

    pub fn mode(mut self, mode: FanMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn nonlinearity(mut self, nonlinearity: Nonlinearity) -> Self {
        self.nonlinearity = Some(nonlinearity);
        self
    }
}

/// An initialization function applied to one parameter tensor
pub trait InitFn {
    /// Short name for logging
    fn name(&self) -> &str;

    /// Whether the function can fill a tensor of rank `rank` given `params`
    fn supports(&self, rank: usize, params: &InitParams) -> bool;

    /// Produce `shape.iter().product()` values in row-major order
    fn sample(&self, shape: &[usize], params: &InitParams, rng: &mut StdRng) -> Result<Vec<f32>>;
}

/// Built-in initialization functions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Init {
    Zeros,
    Ones,
    /// Fill with `val`
    Constant,
    /// N(`mean`, `std`²), defaults 0 and 1
    Normal,
    /// U(`a`, `b`), defaults 0 and 1
    Uniform,
    /// Glorot uniform, default `gain` 1
    XavierUniform,
    /// Glorot normal, default `gain` 1
    XavierNormal,
    /// He uniform, defaults `a` 0, fan-in, leaky ReLU
    KaimingUniform,
    /// He normal, defaults `a` 0, fan-in, leaky ReLU
    KaimingNormal,
}

impl Init {
    fn needs_fans(self) -> bool {
        matches!(
            self,
            Init::XavierUniform | Init::XavierNormal | Init::KaimingUniform | Init::KaimingNormal
        )
    }
}

/// `(fan_in, fan_out)` of a weight with at least two dimensions
pub fn fans(shape: &[usize]) -> Result<(usize, usize)> {
    if shape.len() < 2 {
        return Err(Error::initialization(format!(
            "fan in and fan out need a tensor with at least 2 dimensions, got shape {:?}",
            shape
        )));
    }
    let receptive_field: usize = shape[2..].iter().product();
    Ok((shape[1] * receptive_field, shape[0] * receptive_field))
}

fn sample_normal(len: usize, mean: f64, std: f64, rng: &mut StdRng) -> Result<Vec<f32>> {
    let normal = Normal::new(mean, std)
        .map_err(|e| Error::initialization(format!("invalid normal parameters: {}", e)))?;
    Ok((0..len).map(|_| normal.sample(rng) as f32).collect())
}

fn sample_uniform(len: usize, low: f64, high: f64, rng: &mut StdRng) -> Result<Vec<f32>> {
    if low == high {
        return Ok(vec![low as f32; len]);
    }
    let uniform = Uniform::new(low, high)
        .map_err(|e| Error::initialization(format!("invalid uniform bounds [{}, {}): {}", low, high, e)))?;
    Ok((0..len).map(|_| uniform.sample(rng) as f32).collect())
}

impl InitFn for Init {
    fn name(&self) -> &str {
        match self {
            Init::Zeros => "zeros",
            Init::Ones => "ones",
            Init::Constant => "constant",
            Init::Normal => "normal",
            Init::Uniform => "uniform",
            Init::XavierUniform => "xavier_uniform",
            Init::XavierNormal => "xavier_normal",
            Init::KaimingUniform => "kaiming_uniform",
            Init::KaimingNormal => "kaiming_normal",
        }
    }

    fn supports(&self, rank: usize, params: &InitParams) -> bool {
        match self {
            Init::Constant => params.val.is_some(),
            init if init.needs_fans() => rank >= 2,
            _ => true,
        }
    }

    fn sample(&self, shape: &[usize], params: &InitParams, rng: &mut StdRng) -> Result<Vec<f32>> {
        let len: usize = shape.iter().product();

        match self {
            Init::Zeros => Ok(vec![0.0; len]),
            Init::Ones => Ok(vec![1.0; len]),
            Init::Constant => {
                let val = params
                    .val
                    .ok_or_else(|| Error::initialization("constant initialization needs `val`"))?;
                Ok(vec![val as f32; len])
            }
            Init::Normal => sample_normal(
                len,
                params.mean.unwrap_or(0.0),
                params.std.unwrap_or(1.0),
                rng,
            ),
            Init::Uniform => sample_uniform(len, params.a.unwrap_or(0.0), params.b.unwrap_or(1.0), rng),
            Init::XavierUniform | Init::XavierNormal => {
                let (fan_in, fan_out) = fans(shape)?;
                let gain = params.gain.unwrap_or(1.0);
                let std = gain * (2.0 / (fan_in + fan_out) as f64).sqrt();
                if *self == Init::XavierUniform {
                    let bound = 3.0f64.sqrt() * std;
                    sample_uniform(len, -bound, bound, rng)
                } else {
                    sample_normal(len, 0.0, std, rng)
                }
            }
            Init::KaimingUniform | Init::KaimingNormal => {
                let (fan_in, fan_out) = fans(shape)?;
                let fan = match params.mode.unwrap_or_default() {
                    FanMode::FanIn => fan_in,
                    FanMode::FanOut => fan_out,
                };
                if fan == 0 {
                    return Err(Error::initialization("kaiming initialization of an empty tensor"));
                }
                let gain = params
                    .nonlinearity
                    .unwrap_or_default()
                    .gain(params.a.unwrap_or(0.0));
                let std = gain / (fan as f64).sqrt();
                if *self == Init::KaimingUniform {
                    let bound = 3.0f64.sqrt() * std;
                    sample_uniform(len, -bound, bound, rng)
                } else {
                    sample_normal(len, 0.0, std, rng)
                }
            }
        }
    }
}

fn fill(var: &Var, init: &dyn InitFn, params: &InitParams) -> Result<()> {
    let shape = var.dims().to_vec();
    let values = seed::with_tensor_rng(|rng| init.sample(&shape, params, rng))?;
    let tensor = Tensor::from_vec(values, shape, var.device())?.to_dtype(var.dtype())?;
    var.set(&tensor)?;
    Ok(())
}

/// Initialize every layer of `model` in place.
///
/// Weights of convolutional and fully-connected layers receive `init` with
/// `params`. Their biases receive `init` with default parameters, but only
/// when `init` supports a 1-D tensor that way; otherwise the bias is left as
/// it is. Normalization layers get weight 1 and bias 0 whatever `init` is.
pub fn initialize(model: &dyn Module, init: &dyn InitFn, params: &InitParams) -> Result<()> {
    let bias_params = InitParams::default();
    let bias_supported = init.supports(1, &bias_params);
    let mut touched = 0usize;

    visit_layers(model, &mut |path, layer| {
        match layer.kind().category() {
            Some(Category::Convolutional) | Some(Category::FullyConnected) => {
                fill(layer.weight(), init, params).map_err(|e| match e {
                    Error::Initialization(msg) => {
                        Error::initialization(format!("{} weight: {}", path, msg))
                    }
                    other => other,
                })?;
                if let Some(bias) = layer.bias().filter(|_| bias_supported) {
                    fill(bias, init, &bias_params)?;
                }
                debug!("Initialized {} ({:?}) with {}", path, layer.kind(), init.name());
            }
            Some(Category::Normalization) => {
                let weight = layer.weight();
                weight.set(&weight.ones_like()?)?;
                if let Some(bias) = layer.bias() {
                    bias.set(&bias.zeros_like()?)?;
                }
                debug!("Reset normalization layer {}", path);
            }
            None => return Ok(()),
        }
        touched += 1;
        Ok(())
    })?;

    info!("Initialized {} layers of {} with {}", touched, model.name(), init.name());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use candle_nn::Module as _;
    use test_case::test_case;

    fn values(var: &Var) -> Vec<f32> {
        var.as_tensor().flatten_all().unwrap().to_vec1::<f32>().unwrap()
    }

    fn small_model(device: &Device) -> Sequential {
        Sequential::new("net")
            .add(
                Sequential::new("backbone")
                    .add(Layer::conv3d("conv1", 1, 4, 3, true, device).unwrap())
                    .add(Layer::batch_norm2d("bn1", 4, device).unwrap()),
            )
            .add(Layer::linear("head", 4, 2, true, device).unwrap())
            .add(Layer::layer_norm("norm", 2, device).unwrap())
    }

    #[test_case(LayerKind::Conv2d, Some(Category::Convolutional))]
    #[test_case(LayerKind::Conv3d, Some(Category::Convolutional))]
    #[test_case(LayerKind::Linear, Some(Category::FullyConnected))]
    #[test_case(LayerKind::BatchNorm1d, Some(Category::Normalization))]
    #[test_case(LayerKind::BatchNorm2d, Some(Category::Normalization))]
    #[test_case(LayerKind::LayerNorm, None)]
    #[test_case(LayerKind::Embedding, None)]
    fn test_category_table(kind: LayerKind, expected: Option<Category>) {
        assert_eq!(kind.category(), expected);
    }

    #[test]
    fn test_visit_order_and_paths() {
        let model = small_model(&Device::Cpu);
        let mut seen = Vec::new();
        visit_layers(&model, &mut |path, _| {
            seen.push(path.to_string());
            Ok(())
        })
        .unwrap();
        assert_eq!(seen, vec!["net.backbone.conv1", "net.backbone.bn1", "net.head", "net.norm"]);
    }

    #[test]
    fn test_normalization_reset_regardless_of_init() {
        let device = Device::Cpu;
        let bn = Layer::batch_norm1d("bn", 3, &device).unwrap();
        bn.weight().set(&Tensor::new(&[0.2f32, 0.4, 0.6], &device).unwrap()).unwrap();
        bn.bias().unwrap().set(&Tensor::new(&[1.0f32, 2.0, 3.0], &device).unwrap()).unwrap();
        let model = Sequential::new("m").add(bn.clone());

        initialize(&model, &Init::Constant, &InitParams::new().val(7.0)).unwrap();

        assert_eq!(values(bn.weight()), vec![1.0; 3]);
        assert_eq!(values(bn.bias().unwrap()), vec![0.0; 3]);
    }

    #[test]
    fn test_constant_weight_skips_bias_without_value() {
        let device = Device::Cpu;
        let linear = Layer::linear("fc", 3, 2, true, &device).unwrap();
        let model = Sequential::new("m").add(linear.clone());

        initialize(&model, &Init::Constant, &InitParams::new().val(0.5)).unwrap();

        assert_eq!(values(linear.weight()), vec![0.5; 6]);
        // bias gets default parameters, which carry no `val`
        assert_eq!(values(linear.bias().unwrap()), vec![0.0; 2]);
    }

    #[test]
    fn test_kaiming_leaves_bias_untouched() {
        let _guard = seed::TEST_RNG_LOCK.lock();
        let device = Device::Cpu;
        let linear = Layer::linear("fc", 16, 8, true, &device).unwrap();
        let model = Sequential::new("m").add(linear.clone());

        initialize(&model, &Init::KaimingNormal, &InitParams::new().mode(FanMode::FanOut)).unwrap();

        assert!(values(linear.weight()).iter().any(|v| *v != 0.0));
        assert_eq!(values(linear.bias().unwrap()), vec![0.0; 8]);
    }

    #[test]
    fn test_normal_initializes_bias() {
        let _guard = seed::TEST_RNG_LOCK.lock();
        let device = Device::Cpu;
        let conv = Layer::conv2d("conv", 2, 4, 3, true, &device).unwrap();
        let model = Sequential::new("m").add(conv.clone());

        initialize(&model, &Init::Normal, &InitParams::new().std(0.02)).unwrap();

        assert!(values(conv.bias().unwrap()).iter().any(|v| *v != 0.0));
    }

    #[test]
    fn test_skipped_kinds_untouched() {
        let device = Device::Cpu;
        let embedding = Layer::embedding("emb", 5, 3, &device).unwrap();
        let norm = Layer::layer_norm("ln", 3, &device).unwrap();
        let model = Sequential::new("m").add(embedding.clone()).add(norm.clone());

        initialize(&model, &Init::Ones, &InitParams::new()).unwrap();

        assert_eq!(values(embedding.weight()), vec![0.0; 15]);
        assert_eq!(values(norm.weight()), vec![0.0; 3]);
    }

    #[test]
    fn test_seeded_initialization_is_reproducible() {
        let _guard = seed::TEST_RNG_LOCK.lock();
        let device = Device::Cpu;
        let run = || {
            seed::fix_random_seed(11, &device).unwrap();
            let model = small_model(&device);
            initialize(&model, &Init::XavierUniform, &InitParams::new()).unwrap();
            let mut weights = Vec::new();
            visit_layers(&model, &mut |_, layer| {
                weights.extend(values(layer.weight()));
                Ok(())
            })
            .unwrap();
            weights
        };

        assert_eq!(run(), run());
    }

    #[test]
    fn test_kaiming_uniform_bound() {
        let mut rng = rand::SeedableRng::seed_from_u64(0);
        let shape = [64, 32, 3, 3];
        let values = Init::KaimingUniform
            .sample(&shape, &InitParams::new().nonlinearity(Nonlinearity::Relu), &mut rng)
            .unwrap();

        let bound = (6.0f64 / (32.0 * 9.0)).sqrt() as f32;
        assert_eq!(values.len(), 64 * 32 * 9);
        assert!(values.iter().all(|v| v.abs() <= bound));
    }

    #[test]
    fn test_fans() {
        assert_eq!(fans(&[8, 4]).unwrap(), (4, 8));
        assert_eq!(fans(&[8, 4, 3, 3, 3]).unwrap(), (108, 216));
        assert!(fans(&[8]).is_err());
    }

    #[test]
    fn test_gain_values() {
        assert_relative_eq!(Nonlinearity::Relu.gain(0.0), 2.0f64.sqrt());
        assert_relative_eq!(Nonlinearity::LeakyRelu.gain(0.0), 2.0f64.sqrt());
        assert_relative_eq!(Nonlinearity::Tanh.gain(0.0), 5.0 / 3.0);
        assert_relative_eq!(Nonlinearity::Linear.gain(0.3), 1.0);
    }

    #[test]
    fn test_weight_failure_propagates() {
        let device = Device::Cpu;
        let model = Sequential::new("m").add(Layer::linear("fc", 2, 2, false, &device).unwrap());

        let result = initialize(&model, &Init::Constant, &InitParams::new());
        match result {
            Err(Error::Initialization(msg)) => assert!(msg.starts_with("m.fc weight")),
            other => panic!("expected initialization error, got {:?}", other),
        }
    }

    #[test]
    fn test_linear_view_uses_initialized_parameters() {
        let device = Device::Cpu;
        let layer = Layer::linear("fc", 3, 2, true, &device).unwrap();
        let model = Sequential::new("m").add(layer.clone());
        initialize(&model, &Init::Zeros, &InitParams::new()).unwrap();
        layer.bias().unwrap().set(&Tensor::new(&[1.5f32, -0.5], &device).unwrap()).unwrap();

        let linear = layer.to_linear().unwrap();
        let input = Tensor::ones((1, 3), DType::F32, &device).unwrap();
        let output = linear.forward(&input).unwrap().flatten_all().unwrap().to_vec1::<f32>().unwrap();

        assert_eq!(output, vec![1.5, -0.5]);
        assert!(layer.to_conv2d(Conv2dConfig::default()).is_none());
    }
}
