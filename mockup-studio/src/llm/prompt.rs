// Prompt templates for mockup generation.
//
// Each run produces five variants of the same base prompt. The base prompt
// describes the input images, the presentation model, and the background;
// the variant suffix nudges lighting, angle, or pose so the five results
// differ from one another.

use crate::llm::client::Part;
use crate::protocol::{Background, ModelType, MockupRequest};

// ---------------------------------------------------------------------------
// Variation prompts
// ---------------------------------------------------------------------------

/// Number of variants generated per request.
pub const VARIANT_COUNT: usize = 5;

/// Variation suffixes for human-model mockups.
pub const HUMAN_MODEL_VARIATIONS: [&str; VARIANT_COUNT] = [
    "in a dynamic, confident pose.",
    "with soft, natural lighting.",
    "from a slightly different angle to showcase texture.",
    "with a cheerful and approachable expression.",
    "in a minimalist setting that highlights the product.",
];

/// Variation suffixes for 3D product renders.
pub const PRODUCT_3D_VARIATIONS: [&str; VARIANT_COUNT] = [
    "with clean studio lighting from the top-left.",
    "showcasing the product material texture.",
    "from a dramatic low-angle perspective.",
    "with a slight isometric view.",
    "perfectly centered with a subtle drop shadow.",
];

/// Select the variation list for a model type.
pub fn variation_prompts(model_type: ModelType) -> &'static [&'static str; VARIANT_COUNT] {
    if model_type.is_3d() {
        &PRODUCT_3D_VARIATIONS
    } else {
        &HUMAN_MODEL_VARIATIONS
    }
}

// ---------------------------------------------------------------------------
// Prompt sections
// ---------------------------------------------------------------------------

/// Describe who (or what) presents the product.
pub fn view_description(model_type: ModelType) -> String {
    match model_type {
        ModelType::Unisex => "The product must be worn by BOTH a male and a female model, \
             shown together in the same image frame. They can be standing side-by-side \
             or interacting naturally."
            .to_string(),
        ModelType::Product3D => "This is a 3D product render. DO NOT show any human models. \
             Focus on creating a high-quality 3D visualization of the product itself."
            .to_string(),
        ModelType::Product3DAnimated => "This is an animated 3D product render. The final \
             output must be a short, seamlessly looping animated GIF. DO NOT show any human \
             models. The animation should smoothly rotate the product to showcase the design."
            .to_string(),
        other => format!("The product must be worn by a {} model.", other.label()),
    }
}

/// Describe the scene behind the product.
pub fn background_description(background: &Background) -> String {
    match background {
        Background::Custom(_) => "The third image is the background scene. Integrate the \
             model and product seamlessly into this background."
            .to_string(),
        Background::Predefined(p) => format!(
            "Use a high-quality, professional '{}' background that complements the product and design.",
            p.label()
        ),
        Background::None => "Use a clean, neutral, professional studio background that \
             complements the product and design."
            .to_string(),
    }
}

// ---------------------------------------------------------------------------
// Full prompt
// ---------------------------------------------------------------------------

/// Build the text prompt for one variant.
pub fn build_mockup_prompt(
    model_type: ModelType,
    background: &Background,
    variation: &str,
) -> String {
    let mut prompt = String::with_capacity(1024);

    prompt.push_str(
        "You are an expert AI mockup generator. Your task is to create a single, \
         photorealistic mockup image or animation.\n",
    );
    prompt.push_str(
        "- **Product:** The first image is the product (e.g., t-shirt, hoodie, mug).\n",
    );
    prompt.push_str(
        "- **Design:** The second image is the design. Place this design prominently and \
         realistically onto the product, paying attention to texture, lighting, and wrinkles \
         for physical products, or mapping it perfectly for 3D renders.\n",
    );
    prompt.push_str(&format!(
        "- **View/Model:** {}\n",
        view_description(model_type)
    ));
    prompt.push_str(&format!(
        "- **Background:** {}\n",
        background_description(background)
    ));
    prompt.push_str(&format!(
        "- **Style:** The final output must be a high-quality, professional product \
         photograph or render. {variation}\n"
    ));
    prompt.push_str(
        "- **IMPORTANT:** Only return the final image or animation. Do not include any text, \
         explanations, or any other content in your response. Just the image/animation.",
    );

    prompt
}

/// Assemble the ordered request parts for one variant: product image, design
/// image, the custom background image if any, then the text prompt.
pub fn build_request_parts(request: &MockupRequest, variation: &str) -> Vec<Part> {
    let mut parts = Vec::with_capacity(4);
    parts.push(Part::InlineImage(request.product.clone()));
    parts.push(Part::InlineImage(request.design.clone()));
    if let Background::Custom(scene) = &request.background {
        parts.push(Part::InlineImage(scene.clone()));
    }
    parts.push(Part::Text(build_mockup_prompt(
        request.model_type,
        &request.background,
        variation,
    )));
    parts
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
