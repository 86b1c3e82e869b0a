//! Operator catalogue and dispatch
//!
//! [`Operator`] is the closed set of transformations. Each one declares its
//! parameters ([`ParamSpec`]) and is dispatched by [`Operator::apply`], which
//! translates validated parameters into a call to the matching function in
//! [`crate::filters`]. Names arriving from the outside (HTTP paths, CLI
//! arguments) are looked up through an [`OperatorRegistry`], which also knows
//! the legacy aliases.

pub mod params;

pub use params::{ParamKind, ParamSet, ParamSpec, NO_PARAMS, SEED_PARAM};

use crate::error::{FxError, Result};
use crate::filters::{ascii, learned, segmentation, spatial, stylize, tone, GrabCutConfig};
use crate::models::{ModelKind, ModelRegistry};
use crate::services::OutputFormatHandler;
use crate::types::{OutputFormat, PixelGrid};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Broad grouping used for listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatorFamily {
    Tone,
    Spatial,
    Stylize,
    Segmentation,
    Learned,
}

/// Every transformation the pipeline can run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Grayscale,
    Invert,
    AutoBrightness,
    AutoEnhance,
    ContrastAdjust,
    ShadowRemoval,
    Xray,
    Heat,
    Sharpen,
    Denoise,
    Canny,
    EdgeEnhance,
    Pixelate,
    Comic,
    Cartoon,
    OilPaint,
    Sketch,
    ColorSketch,
    WaterColor,
    Retro,
    Dot,
    Thread,
    Neon,
    Haunted,
    Frost,
    Kaleidoscope,
    AsciiArt,
    BackgroundRemoval,
    BackgroundBlur,
    Enlighten,
    Anime,
}

const EMPTY_SPECS: &[ParamSpec] = &[];

const AUTO_BRIGHTNESS_PARAMS: &[ParamSpec] =
    &[ParamSpec::integer("target", 128.0, 0.0, 255.0, "target mean brightness")];

const SHARPEN_PARAMS: &[ParamSpec] =
    &[ParamSpec::float("amount", 1.0, 0.1, 5.0, "blend factor between original and sharpened")];

const DENOISE_PARAMS: &[ParamSpec] =
    &[ParamSpec::integer("strength", 10.0, 1.0, 50.0, "filter strength h")];

const PIXELATE_PARAMS: &[ParamSpec] =
    &[ParamSpec::integer("block_size", 20.0, 2.0, 200.0, "pixel block edge length")];

const CARTOON_PARAMS: &[ParamSpec] = &[
    ParamSpec::integer("k", 8.0, 2.0, 32.0, "number of colour clusters"),
    ParamSpec::flag("warm_tone", true, "boost red and green"),
];

const OIL_PAINT_PARAMS: &[ParamSpec] = &[
    ParamSpec::integer("size", 4.0, 1.0, 10.0, "neighbourhood radius"),
    ParamSpec::integer("levels", 16.0, 2.0, 64.0, "intensity bins"),
];

const RETRO_PARAMS: &[ParamSpec] =
    &[ParamSpec::integer("levels", 4.0, 2.0, 16.0, "lightness quantization steps")];

const DOT_PARAMS: &[ParamSpec] =
    &[ParamSpec::integer("block_size", 8.0, 4.0, 64.0, "halftone cell size")];

const THREAD_PARAMS: &[ParamSpec] = &[
    ParamSpec::odd("blur_level", 5.0, 3.0, 15.0, "median blur kernel"),
    ParamSpec::integer("shadow_threshold", 100.0, 0.0, 255.0, "hatch where gray is below"),
    ParamSpec::integer("line_thickness", 1.0, 1.0, 10.0, "outline thickness"),
];

const NEON_PARAMS: &[ParamSpec] = &[
    ParamSpec::integer("line_thickness", 3.0, 1.0, 10.0, "edge dilation"),
    ParamSpec::integer("glow_strength", 50.0, 1.0, 100.0, "glow kernel size"),
];

const HAUNTED_PARAMS: &[ParamSpec] = &[
    ParamSpec::float("fog_density", 0.5, 0.0, 1.0, "blend toward the cold tint"),
    ParamSpec::float("vignette_strength", 1.5, 0.1, 5.0, "vignette falloff"),
    ParamSpec::integer("grain_amount", 25.0, 0.0, 100.0, "film grain standard deviation"),
];

const FROST_PARAMS: &[ParamSpec] =
    &[ParamSpec::integer("radius", 3.0, 1.0, 10.0, "neighbour jitter radius")];

const KALEIDOSCOPE_PARAMS: &[ParamSpec] =
    &[ParamSpec::integer("segments", 6.0, 3.0, 12.0, "mirrored wedges")];

const ASCII_PARAMS: &[ParamSpec] =
    &[ParamSpec::integer("columns", 120.0, 20.0, 300.0, "characters per row")];

const BACKGROUND_REMOVAL_PARAMS: &[ParamSpec] = &[
    ParamSpec::float("padding_percent", 5.0, 0.0, 45.0, "seed rectangle inset"),
    ParamSpec::integer("iterations", 5.0, 1.0, 10.0, "refinement rounds"),
];

const BACKGROUND_BLUR_PARAMS: &[ParamSpec] = &[
    ParamSpec::float("padding_percent", 5.0, 0.0, 45.0, "seed rectangle inset"),
    ParamSpec::integer("iterations", 5.0, 1.0, 10.0, "refinement rounds"),
    ParamSpec::odd("blur_strength", 21.0, 3.0, 99.0, "background blur kernel"),
];

impl Operator {
    pub const ALL: [Self; 31] = [
        Self::Grayscale,
        Self::Invert,
        Self::AutoBrightness,
        Self::AutoEnhance,
        Self::ContrastAdjust,
        Self::ShadowRemoval,
        Self::Xray,
        Self::Heat,
        Self::Sharpen,
        Self::Denoise,
        Self::Canny,
        Self::EdgeEnhance,
        Self::Pixelate,
        Self::Comic,
        Self::Cartoon,
        Self::OilPaint,
        Self::Sketch,
        Self::ColorSketch,
        Self::WaterColor,
        Self::Retro,
        Self::Dot,
        Self::Thread,
        Self::Neon,
        Self::Haunted,
        Self::Frost,
        Self::Kaleidoscope,
        Self::AsciiArt,
        Self::BackgroundRemoval,
        Self::BackgroundBlur,
        Self::Enlighten,
        Self::Anime,
    ];

    /// Canonical name
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Grayscale => "grayscale",
            Self::Invert => "invert",
            Self::AutoBrightness => "auto_brightness",
            Self::AutoEnhance => "auto_enhance",
            Self::ContrastAdjust => "contrast_adjust",
            Self::ShadowRemoval => "shadow_removal",
            Self::Xray => "xray",
            Self::Heat => "heat",
            Self::Sharpen => "sharpen",
            Self::Denoise => "denoise",
            Self::Canny => "canny",
            Self::EdgeEnhance => "edge_enhance",
            Self::Pixelate => "pixelate",
            Self::Comic => "comic",
            Self::Cartoon => "cartoon",
            Self::OilPaint => "oil_paint",
            Self::Sketch => "sketch",
            Self::ColorSketch => "color_sketch",
            Self::WaterColor => "water_color",
            Self::Retro => "retro",
            Self::Dot => "dot",
            Self::Thread => "thread",
            Self::Neon => "neon",
            Self::Haunted => "haunted",
            Self::Frost => "frost",
            Self::Kaleidoscope => "kaleidoscope",
            Self::AsciiArt => "ascii_art",
            Self::BackgroundRemoval => "background_removal",
            Self::BackgroundBlur => "background_blur",
            Self::Enlighten => "enlighten",
            Self::Anime => "anime",
        }
    }

    /// Alternative names accepted on input
    #[must_use]
    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            Self::Grayscale => &["gray", "greyscale"],
            Self::Invert => &["negative"],
            Self::Canny => &["edges"],
            Self::OilPaint => &["oil"],
            Self::WaterColor => &["watercolor"],
            Self::Dot => &["halftone"],
            Self::Thread => &["crosshatch"],
            Self::Kaleidoscope => &["kalaidoscope"],
            Self::AsciiArt => &["ascii"],
            Self::BackgroundRemoval => &["bgrem", "remove_background"],
            Self::BackgroundBlur => &["bgblur"],
            Self::Enlighten => &["low_light"],
            Self::Anime => &["ghibli"],
            _ => &[],
        }
    }

    #[must_use]
    pub fn family(self) -> OperatorFamily {
        match self {
            Self::Grayscale
            | Self::Invert
            | Self::AutoBrightness
            | Self::AutoEnhance
            | Self::ContrastAdjust
            | Self::ShadowRemoval
            | Self::Xray
            | Self::Heat => OperatorFamily::Tone,
            Self::Sharpen | Self::Denoise | Self::Canny | Self::EdgeEnhance | Self::Pixelate => {
                OperatorFamily::Spatial
            },
            Self::BackgroundRemoval | Self::BackgroundBlur => OperatorFamily::Segmentation,
            Self::Enlighten | Self::Anime => OperatorFamily::Learned,
            _ => OperatorFamily::Stylize,
        }
    }

    /// One-line summary for listings
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::Grayscale => "BT.601 luma, single channel",
            Self::Invert => "complement every sample",
            Self::AutoBrightness => "scale HSV value toward a target mean",
            Self::AutoEnhance => "CLAHE on LAB lightness",
            Self::ContrastAdjust => "CLAHE on LAB lightness",
            Self::ShadowRemoval => "divide out a dilated, median-filtered background",
            Self::Xray => "inverted, boosted grayscale",
            Self::Heat => "equalized saturation, brighter value",
            Self::Sharpen => "3x3 sharpening kernel blended with the original",
            Self::Denoise => "non-local means denoising",
            Self::Canny => "Canny edge map, single channel",
            Self::EdgeEnhance => "unsharp mask",
            Self::Pixelate => "blocky mosaic",
            Self::Comic => "bilateral colour with adaptive-threshold ink",
            Self::Cartoon => "k-means colour quantization with Sobel outlines",
            Self::OilPaint => "dominant intensity bin per neighbourhood",
            Self::Sketch => "pencil sketch, single channel",
            Self::ColorSketch => "pencil sketch over smoothed colour",
            Self::WaterColor => "edge-preserving smoothing with soft edge darkening",
            Self::Retro => "four-colour retro palette",
            Self::Dot => "black halftone dots on white",
            Self::Thread => "cross-hatched shadows with outlines",
            Self::Neon => "glowing edges in a random neon colour",
            Self::Haunted => "cold fog, grain and vignette",
            Self::Frost => "frosted glass jitter",
            Self::Kaleidoscope => "rotated, mirrored wedges",
            Self::AsciiArt => "ASCII-character mosaic",
            Self::BackgroundRemoval => "GrabCut foreground with transparent background",
            Self::BackgroundBlur => "GrabCut foreground over a blurred background",
            Self::Enlighten => "learned low-light enhancement",
            Self::Anime => "learned anime style transfer",
        }
    }

    /// Declared parameters, without the reserved `seed`
    #[must_use]
    pub fn param_specs(self) -> &'static [ParamSpec] {
        match self {
            Self::AutoBrightness => AUTO_BRIGHTNESS_PARAMS,
            Self::Sharpen => SHARPEN_PARAMS,
            Self::Denoise => DENOISE_PARAMS,
            Self::Pixelate => PIXELATE_PARAMS,
            Self::Cartoon => CARTOON_PARAMS,
            Self::OilPaint => OIL_PAINT_PARAMS,
            Self::Retro => RETRO_PARAMS,
            Self::Dot => DOT_PARAMS,
            Self::Thread => THREAD_PARAMS,
            Self::Neon => NEON_PARAMS,
            Self::Haunted => HAUNTED_PARAMS,
            Self::Frost => FROST_PARAMS,
            Self::Kaleidoscope => KALEIDOSCOPE_PARAMS,
            Self::AsciiArt => ASCII_PARAMS,
            Self::BackgroundRemoval => BACKGROUND_REMOVAL_PARAMS,
            Self::BackgroundBlur => BACKGROUND_BLUR_PARAMS,
            _ => EMPTY_SPECS,
        }
    }

    /// Whether the output depends on the injected RNG
    #[must_use]
    pub fn is_randomized(self) -> bool {
        matches!(
            self,
            Self::Cartoon | Self::Sketch | Self::Neon | Self::Haunted | Self::Frost
        )
    }

    /// Model a learned operator needs
    #[must_use]
    pub fn required_model(self) -> Option<ModelKind> {
        match self {
            Self::Enlighten => Some(ModelKind::Enlighten),
            Self::Anime => Some(ModelKind::Anime),
            _ => None,
        }
    }

    /// Validate raw key/value pairs against this operator's parameters
    ///
    /// # Errors
    /// Returns `InvalidParameter` for unknown keys and out-of-domain values.
    pub fn resolve_params<'a, I>(self, raw: I) -> Result<ParamSet>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        ParamSet::resolve(self.name(), self.param_specs(), raw)
    }

    /// Run the operator
    ///
    /// # Errors
    /// - `ModelUnavailable` for a learned operator whose model is not loaded
    /// - Any failure of the underlying filter
    pub fn apply(self, grid: &PixelGrid, params: &ParamSet, ctx: &mut OperatorContext<'_>) -> Result<PixelGrid> {
        let out = match self {
            Self::Grayscale => tone::grayscale(grid),
            Self::Invert => tone::invert(grid),
            Self::AutoBrightness => tone::auto_brightness(grid, params.u32("target")?.min(255) as u8),
            Self::AutoEnhance | Self::ContrastAdjust => tone::clahe_enhance(grid),
            Self::ShadowRemoval => tone::shadow_removal(grid),
            Self::Xray => tone::xray(grid),
            Self::Heat => tone::heat(grid),
            Self::Sharpen => spatial::sharpen(grid, params.f32("amount")?),
            Self::Denoise => spatial::denoise(grid, params.f32("strength")?),
            Self::Canny => spatial::canny_edges(grid),
            Self::EdgeEnhance => spatial::edge_enhance(grid),
            Self::Pixelate => spatial::pixelate(grid, params.u32("block_size")?)?,
            Self::Comic => stylize::comic(grid),
            Self::Cartoon => stylize::cartoon(grid, params.u32("k")?, params.flag("warm_tone")?, &mut ctx.rng),
            Self::OilPaint => stylize::oil_paint(grid, params.u32("size")?, params.u32("levels")?),
            Self::Sketch => stylize::sketch(grid, &mut ctx.rng)?,
            Self::ColorSketch => stylize::color_sketch(grid),
            Self::WaterColor => stylize::water_color(grid),
            Self::Retro => stylize::retro(grid, params.u32("levels")?),
            Self::Dot => stylize::dot(grid, params.u32("block_size")?),
            Self::Thread => stylize::thread(
                grid,
                params.u32("blur_level")?,
                params.u32("shadow_threshold")?.min(255) as u8,
                params.u32("line_thickness")?,
            ),
            Self::Neon => stylize::neon(
                grid,
                params.u32("line_thickness")?,
                params.u32("glow_strength")?,
                &mut ctx.rng,
            ),
            Self::Haunted => stylize::haunted(
                grid,
                params.f32("fog_density")?,
                params.f32("vignette_strength")?,
                params.f32("grain_amount")?,
                &mut ctx.rng,
            )?,
            Self::Frost => stylize::frost(grid, params.u32("radius")?, &mut ctx.rng),
            Self::Kaleidoscope => stylize::kaleidoscope(grid, params.u32("segments")?),
            Self::AsciiArt => ascii::ascii_art(grid, params.u32("columns")?)?,
            Self::BackgroundRemoval => segmentation::background_removal(grid, &ctx.grabcut_config(params)?)?,
            Self::BackgroundBlur => {
                segmentation::background_blur(grid, &ctx.grabcut_config(params)?, params.u32("blur_strength")?)?
            },
            Self::Enlighten | Self::Anime => {
                let kind = self
                    .required_model()
                    .ok_or_else(|| FxError::processing(format!("{self} has no model")))?;
                let model = ctx.models.get(kind)?;
                learned::infer(grid, model.backend.as_ref(), &model.profile)?
            },
        };
        Ok(out)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Operator {
    type Err = FxError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|op| op.name() == wanted || op.aliases().contains(&wanted.as_str()))
            .ok_or_else(|| FxError::invalid_parameter(format!("unknown operator '{s}'")))
    }
}

/// Name → operator dispatch table, including aliases
#[derive(Debug, Clone)]
pub struct OperatorRegistry {
    by_name: HashMap<&'static str, Operator>,
}

impl Default for OperatorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl OperatorRegistry {
    /// Registry holding every operator
    #[must_use]
    pub fn new() -> Self {
        let mut registry = Self {
            by_name: HashMap::new(),
        };
        for op in Operator::ALL {
            registry.register(op);
        }
        registry
    }

    fn register(&mut self, op: Operator) {
        self.by_name.insert(op.name(), op);
        for &alias in op.aliases() {
            self.by_name.insert(alias, op);
        }
    }

    /// Look up a canonical name or alias
    ///
    /// # Errors
    /// Returns `InvalidParameter` for unknown names.
    pub fn get(&self, name: &str) -> Result<Operator> {
        let wanted = name.trim().to_ascii_lowercase().replace('-', "_");
        self.by_name
            .get(wanted.as_str())
            .copied()
            .ok_or_else(|| FxError::invalid_parameter(format!("unknown operator '{name}'")))
    }

    /// Operators in catalogue order
    pub fn operators(&self) -> impl Iterator<Item = Operator> {
        Operator::ALL.into_iter()
    }

    /// Serializable catalogue for listings
    #[must_use]
    pub fn describe(&self) -> Vec<OperatorDescriptor> {
        self.operators().map(OperatorDescriptor::from).collect()
    }
}

/// Listing entry for one operator
#[derive(Debug, Clone, Serialize)]
pub struct OperatorDescriptor {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub family: OperatorFamily,
    pub description: &'static str,
    pub randomized: bool,
    pub params: &'static [ParamSpec],
}

impl From<Operator> for OperatorDescriptor {
    fn from(op: Operator) -> Self {
        Self {
            name: op.name(),
            aliases: op.aliases(),
            family: op.family(),
            description: op.description(),
            randomized: op.is_randomized(),
            params: op.param_specs(),
        }
    }
}

/// Per-call state handed to operators: the RNG and the shared models
pub struct OperatorContext<'a> {
    pub rng: StdRng,
    pub models: &'a ModelRegistry,
    pub segmentation_max_dimension: u32,
}

impl<'a> OperatorContext<'a> {
    /// Context seeded from `seed`, or from OS entropy when absent
    #[must_use]
    pub fn new(models: &'a ModelRegistry, seed: Option<u64>) -> Self {
        let rng = seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
        Self {
            rng,
            models,
            segmentation_max_dimension: GrabCutConfig::default().max_dimension,
        }
    }

    #[must_use]
    pub fn with_segmentation_max_dimension(mut self, max_dimension: u32) -> Self {
        self.segmentation_max_dimension = max_dimension;
        self
    }

    fn grabcut_config(&self, params: &ParamSet) -> Result<GrabCutConfig> {
        Ok(GrabCutConfig {
            max_dimension: self.segmentation_max_dimension,
            padding_percent: params.f32("padding_percent")?,
            iterations: params.u32("iterations")?,
        })
    }
}

/// One operator invocation on a decoded grid
#[derive(Debug, Clone)]
pub struct OperatorRequest {
    pub operator: Operator,
    pub grid: PixelGrid,
    pub params: ParamSet,
}

/// Result of an operator invocation and the container it should be written in
#[derive(Debug, Clone)]
pub struct OperatorOutput {
    pub grid: PixelGrid,
    pub format: OutputFormat,
}

impl OperatorRequest {
    #[must_use]
    pub fn new(operator: Operator, grid: PixelGrid, params: ParamSet) -> Self {
        Self { operator, grid, params }
    }

    /// Run the request; the output container is PNG whenever alpha is present
    ///
    /// # Errors
    /// See [`Operator::apply`].
    pub fn run(&self, ctx: &mut OperatorContext<'_>) -> Result<OperatorOutput> {
        let grid = self.operator.apply(&self.grid, &self.params, ctx)?;
        let format = OutputFormatHandler::format_for(&grid);
        Ok(OperatorOutput { grid, format })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::test_utils::MockBackend;
    use std::sync::Arc;

    fn gradient(h: usize, w: usize) -> PixelGrid {
        let data = ndarray::Array3::from_shape_fn((h, w, 3), |(y, x, c)| ((y * 11 + x * 7 + c * 60) % 256) as u8);
        PixelGrid::new(data).unwrap()
    }

    #[test]
    fn test_names_are_unique_and_round_trip() {
        let registry = OperatorRegistry::new();
        let mut seen = std::collections::HashSet::new();
        for op in Operator::ALL {
            assert!(seen.insert(op.name()), "duplicate name {op}");
            for &alias in op.aliases() {
                assert!(seen.insert(alias), "duplicate alias {alias}");
            }
            assert_eq!(registry.get(op.name()).unwrap(), op);
            assert_eq!(op.name().parse::<Operator>().unwrap(), op);
        }
    }

    #[test]
    fn test_aliases_and_unknown_names() {
        let registry = OperatorRegistry::new();
        assert_eq!(registry.get("bgrem").unwrap(), Operator::BackgroundRemoval);
        assert_eq!(registry.get("Kalaidoscope").unwrap(), Operator::Kaleidoscope);
        assert_eq!(registry.get("oil-paint").unwrap(), Operator::OilPaint);
        assert!(matches!(registry.get("sepia"), Err(FxError::InvalidParameter(_))));
        assert!(matches!("".parse::<Operator>(), Err(FxError::InvalidParameter(_))));
    }

    #[test]
    fn test_param_defaults_lie_in_range() {
        for op in Operator::ALL {
            for spec in op.param_specs() {
                assert!(
                    spec.check(op.name(), spec.default).is_ok(),
                    "{op}: default of '{}' is invalid",
                    spec.name
                );
            }
        }
    }

    #[test]
    fn test_parameterless_operators_accept_empty_params() {
        assert!(Operator::Grayscale.param_specs().is_empty());
        let params = Operator::Grayscale.resolve_params(crate::NO_PARAMS).unwrap();
        assert_eq!(params, ParamSet::default());
    }

    #[test]
    fn test_resolve_params_rejects_undeclared() {
        assert!(Operator::Invert.resolve_params(vec![("amount", "1")]).is_err());
        let params = Operator::Invert.resolve_params(vec![("seed", "3")]).unwrap();
        assert_eq!(params.seed(), Some(3));
    }

    #[test]
    fn test_apply_keeps_dimensions_for_classic_operators() {
        let models = ModelRegistry::empty();
        let grid = gradient(24, 32);
        for op in Operator::ALL.into_iter().filter(|op| op.required_model().is_none()) {
            let params = ParamSet::defaults(op.param_specs());
            let mut ctx = OperatorContext::new(&models, Some(7));
            let out = op.apply(&grid, &params, &mut ctx).unwrap();
            assert_eq!(out.dimensions(), (32, 24), "{op} changed the size");
        }
    }

    #[test]
    fn test_learned_operator_without_model() {
        let models = ModelRegistry::empty();
        let mut ctx = OperatorContext::new(&models, None);
        let err = Operator::Enlighten
            .apply(&gradient(8, 8), &ParamSet::default(), &mut ctx)
            .unwrap_err();
        assert!(matches!(err, FxError::ModelUnavailable(_)));
    }

    #[test]
    fn test_learned_operator_with_model() {
        let mut models = ModelRegistry::empty();
        models.insert(ModelKind::Enlighten, Arc::new(MockBackend::identity()));
        let mut ctx = OperatorContext::new(&models, None);
        let out = Operator::Enlighten
            .apply(&gradient(20, 20), &ParamSet::default(), &mut ctx)
            .unwrap();
        assert_eq!(out.dimensions(), (20, 20));
    }

    #[test]
    fn test_seeded_randomized_operators_are_reproducible() {
        let models = ModelRegistry::empty();
        let grid = gradient(20, 20);
        for op in Operator::ALL.into_iter().filter(|op| op.is_randomized()) {
            let params = ParamSet::defaults(op.param_specs());
            let a = op.apply(&grid, &params, &mut OperatorContext::new(&models, Some(99))).unwrap();
            let b = op.apply(&grid, &params, &mut OperatorContext::new(&models, Some(99))).unwrap();
            assert_eq!(a, b, "{op} is not reproducible under a fixed seed");
        }
    }

    #[test]
    fn test_request_picks_png_for_alpha() {
        let models = ModelRegistry::empty();
        let mut ctx = OperatorContext::new(&models, Some(1));
        let request = OperatorRequest::new(
            Operator::BackgroundRemoval,
            gradient(16, 16),
            ParamSet::defaults(Operator::BackgroundRemoval.param_specs()),
        );
        let out = request.run(&mut ctx).unwrap();
        assert_eq!(out.format, OutputFormat::Png);

        let request = OperatorRequest::new(Operator::Invert, gradient(4, 4), ParamSet::default());
        assert_eq!(request.run(&mut ctx).unwrap().format, OutputFormat::Jpeg);
    }

    #[test]
    fn test_descriptors_serialize() {
        let json = serde_json::to_value(OperatorRegistry::new().describe()).unwrap();
        let entries = json.as_array().unwrap();
        assert_eq!(entries.len(), Operator::ALL.len());
        let sharpen = entries.iter().find(|e| e["name"] == "sharpen").unwrap();
        assert_eq!(sharpen["params"][0]["name"], "amount");
        assert_eq!(sharpen["family"], "spatial");
    }
}
