// Shared domain types: presentation models, backgrounds, and progress events.
//
// These are the selections a front end collects from the user before a
// generation run, plus the events the orchestrator emits while it runs.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::media::ImageData;

// ---------------------------------------------------------------------------
// ModelType
// ---------------------------------------------------------------------------

/// How the product is presented in the generated mockup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ModelType {
    #[serde(rename = "male")]
    Male,
    #[serde(rename = "female")]
    Female,
    #[default]
    #[serde(rename = "unisex")]
    Unisex,
    #[serde(rename = "kid")]
    Kid,
    #[serde(rename = "baby")]
    Baby,
    #[serde(rename = "3d-product")]
    Product3D,
    #[serde(rename = "3d-animated")]
    Product3DAnimated,
}

impl ModelType {
    /// Every model type, in the order a picker presents them.
    pub const ALL: [ModelType; 7] = [
        ModelType::Male,
        ModelType::Female,
        ModelType::Unisex,
        ModelType::Kid,
        ModelType::Baby,
        ModelType::Product3D,
        ModelType::Product3DAnimated,
    ];

    /// Human-readable label, also used verbatim inside prompts.
    pub fn label(self) -> &'static str {
        match self {
            ModelType::Male => "Male",
            ModelType::Female => "Female",
            ModelType::Unisex => "Unisex",
            ModelType::Kid => "Kid",
            ModelType::Baby => "Baby",
            ModelType::Product3D => "3D Product",
            ModelType::Product3DAnimated => "3D Animated",
        }
    }

    /// Command-line / config identifier.
    pub fn slug(self) -> &'static str {
        match self {
            ModelType::Male => "male",
            ModelType::Female => "female",
            ModelType::Unisex => "unisex",
            ModelType::Kid => "kid",
            ModelType::Baby => "baby",
            ModelType::Product3D => "3d-product",
            ModelType::Product3DAnimated => "3d-animated",
        }
    }

    /// True for product renders that never show a human model.
    pub fn is_3d(self) -> bool {
        matches!(self, ModelType::Product3D | ModelType::Product3DAnimated)
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ModelType {
    type Err = String;

    /// Accepts either the slug (`3d-product`) or the label (`3D Product`),
    /// case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        ModelType::ALL
            .into_iter()
            .find(|m| m.slug().eq_ignore_ascii_case(wanted) || m.label().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                let choices: Vec<&str> = ModelType::ALL.iter().map(|m| m.slug()).collect();
                format!("unknown model type `{s}` (expected one of: {})", choices.join(", "))
            })
    }
}

// ---------------------------------------------------------------------------
// Backgrounds
// ---------------------------------------------------------------------------

/// Built-in background scenes described to the model by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PredefinedBackground {
    #[serde(rename = "studio-white")]
    StudioWhite,
    #[serde(rename = "outdoor-park")]
    OutdoorPark,
    #[serde(rename = "city-street")]
    CityStreet,
    #[serde(rename = "abstract-gradient")]
    AbstractGradient,
}

impl PredefinedBackground {
    pub const ALL: [PredefinedBackground; 4] = [
        PredefinedBackground::StudioWhite,
        PredefinedBackground::OutdoorPark,
        PredefinedBackground::CityStreet,
        PredefinedBackground::AbstractGradient,
    ];

    pub fn label(self) -> &'static str {
        match self {
            PredefinedBackground::StudioWhite => "Studio White",
            PredefinedBackground::OutdoorPark => "Outdoor Park",
            PredefinedBackground::CityStreet => "City Street",
            PredefinedBackground::AbstractGradient => "Abstract Gradient",
        }
    }

    pub fn slug(self) -> &'static str {
        match self {
            PredefinedBackground::StudioWhite => "studio-white",
            PredefinedBackground::OutdoorPark => "outdoor-park",
            PredefinedBackground::CityStreet => "city-street",
            PredefinedBackground::AbstractGradient => "abstract-gradient",
        }
    }
}

impl fmt::Display for PredefinedBackground {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for PredefinedBackground {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        PredefinedBackground::ALL
            .into_iter()
            .find(|b| b.slug().eq_ignore_ascii_case(wanted) || b.label().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                let choices: Vec<&str> = PredefinedBackground::ALL.iter().map(|b| b.slug()).collect();
                format!("unknown background `{s}` (expected one of: {})", choices.join(", "))
            })
    }
}

/// The background selection for a generation run. Exactly one mode is active.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Background {
    /// Neutral studio backdrop chosen by the model.
    #[default]
    None,
    /// A named scene from [`PredefinedBackground`].
    Predefined(PredefinedBackground),
    /// A user-supplied scene image, sent as the third image part.
    Custom(ImageData),
}

impl Background {
    /// Short description for logs and CLI output.
    pub fn describe(&self) -> String {
        match self {
            Background::None => "none".to_string(),
            Background::Predefined(p) => p.label().to_string(),
            Background::Custom(img) => format!("custom ({})", img.mime_type),
        }
    }
}

// ---------------------------------------------------------------------------
// MockupRequest
// ---------------------------------------------------------------------------

/// Everything needed to generate one set of mockups.
///
/// The product and design images are mandatory; a run cannot be started
/// without both.
#[derive(Debug, Clone, PartialEq)]
pub struct MockupRequest {
    pub product: ImageData,
    pub design: ImageData,
    pub model_type: ModelType,
    pub background: Background,
}

impl MockupRequest {
    pub fn new(product: ImageData, design: ImageData) -> Self {
        Self {
            product,
            design,
            model_type: ModelType::default(),
            background: Background::default(),
        }
    }

    pub fn with_model(mut self, model_type: ModelType) -> Self {
        self.model_type = model_type;
        self
    }

    pub fn with_background(mut self, background: Background) -> Self {
        self.background = background;
        self
    }
}

// ---------------------------------------------------------------------------
// Generation events
// ---------------------------------------------------------------------------

/// Progress events emitted by the orchestrator while a run is in flight.
///
/// `variant` is the zero-based variant index.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationEvent {
    /// A request for this variant has been issued.
    VariantStarted { variant: usize },
    /// The request for this variant has settled. `produced_image` is false
    /// both for API errors and for responses without an image.
    VariantFinished { variant: usize, produced_image: bool },
}
