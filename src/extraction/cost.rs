//! Best-effort monetary accounting for model calls.
//!
//! Prices are USD per 1K tokens. A model missing from every table costs
//! nothing: accounting is advisory and never fails a request.

use crate::extraction::types::UsageMetadata;

struct OpenAiPricing {
    key: &'static str,
    input: f64,
    cached_input: f64,
    output: f64,
}

struct TokenPricing {
    key: &'static str,
    input: f64,
    output: f64,
}

struct ImageTokenPricing {
    key: &'static str,
    input: f64,
    output: f64,
    per_image: f64,
}

const OPENAI_PRICING: &[OpenAiPricing] = &[
    OpenAiPricing {
        key: "gpt-4o",
        input: 0.0025,
        cached_input: 0.00125,
        output: 0.01,
    },
    OpenAiPricing {
        key: "gpt-4o-2024-08-06",
        input: 0.0025,
        cached_input: 0.00125,
        output: 0.01,
    },
    OpenAiPricing {
        key: "gpt-4o-2024-05-13",
        input: 0.005,
        cached_input: 0.005,
        output: 0.015,
    },
    OpenAiPricing {
        key: "gpt-4o-mini",
        input: 0.00015,
        cached_input: 0.000075,
        output: 0.0006,
    },
    OpenAiPricing {
        key: "gpt-4o-mini-2024-07-18",
        input: 0.00015,
        cached_input: 0.000075,
        output: 0.0006,
    },
];

const ANTHROPIC_PRICING: &[TokenPricing] = &[
    TokenPricing {
        key: "claude-3-5-sonnet-20240620",
        input: 0.003,
        output: 0.015,
    },
    TokenPricing {
        key: "claude-3-sonnet-20240229",
        input: 0.003,
        output: 0.015,
    },
    TokenPricing {
        key: "claude-3-haiku-20240307",
        input: 0.00025,
        output: 0.00125,
    },
    TokenPricing {
        key: "claude-3-opus-20240229",
        input: 0.015,
        output: 0.075,
    },
];

const GEMINI_PRICING: &[TokenPricing] = &[
    TokenPricing {
        key: "gemini-1.5-flash",
        input: 0.075 / 1000.0,
        output: 0.30 / 1000.0,
    },
    TokenPricing {
        key: "gemini-1.5-flash-long",
        input: 0.15 / 1000.0,
        output: 0.60 / 1000.0,
    },
    TokenPricing {
        key: "gemini-1.5-pro",
        input: 1.25 / 1000.0,
        output: 5.0 / 1000.0,
    },
    TokenPricing {
        key: "gemini-1.5-pro-long",
        input: 2.5 / 1000.0,
        output: 10.0 / 1000.0,
    },
];

// Vertex bills characters; four characters per token.
const VERTEX_CHARS_PER_TOKEN: f64 = 4.0;

const VERTEX_GEMINI_PRICING: &[ImageTokenPricing] = &[ImageTokenPricing {
    key: "vertexai-gemini-1.5-flash",
    input: 0.00001875 * VERTEX_CHARS_PER_TOKEN,
    output: 0.000075 * VERTEX_CHARS_PER_TOKEN,
    per_image: 0.00002,
}];

/// `provider-model_id` when a provider is given, otherwise the bare model id.
pub fn pricing_key(model_id: &str, provider: Option<&str>) -> String {
    match provider.filter(|p| !p.is_empty()) {
        Some(provider) => format!("{provider}-{model_id}"),
        None => model_id.to_string(),
    }
}

/// Cost of one call. Tables are consulted in a fixed order and the first one
/// that knows the key wins; `image_count` only matters for per-image billing.
pub fn usage_cost(
    model_id: &str,
    provider: Option<&str>,
    usage: &UsageMetadata,
    image_count: usize,
) -> f64 {
    let key = pricing_key(model_id, provider);
    let input = usage.input_tokens as f64 / 1000.0;
    let output = usage.output_tokens as f64 / 1000.0;

    if let Some(price) = OPENAI_PRICING.iter().find(|p| p.key == key) {
        let cached = usage.cached_input_tokens.min(usage.input_tokens);
        let uncached = (usage.input_tokens - cached) as f64 / 1000.0;
        let cached = cached as f64 / 1000.0;
        return uncached * price.input + cached * price.cached_input + output * price.output;
    }

    if let Some(price) = ANTHROPIC_PRICING.iter().find(|p| p.key == key) {
        return input * price.input + output * price.output;
    }

    if let Some(price) = GEMINI_PRICING.iter().find(|p| p.key == key) {
        return input * price.input + output * price.output;
    }

    if let Some(price) = VERTEX_GEMINI_PRICING.iter().find(|p| p.key == key) {
        return input * price.input
            + image_count as f64 * price.per_image
            + output * price.output;
    }

    0.0
}
