//! Gemini-backed level and hint sources.
//!
//! Uses the blocking reqwest client; the app calls these from worker threads
//! so the render loop never waits on the network.

use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use robologic_core::{
    GRID_SIZE,
    level::LevelData,
    source::{HintSource, LevelSource, SourceError},
};

use crate::config::GeneratorConfig;

pub struct GeminiClient {
    client: Client,
    config: GeneratorConfig,
}

impl GeminiClient {
    pub fn new(config: GeneratorConfig) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|e| SourceError::Request(e.to_string()))?;
        Ok(Self { client, config })
    }

    pub fn is_configured(&self) -> bool {
        !self.config.api_key.trim().is_empty()
    }

    fn url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.endpoint.trim_end_matches('/'),
            self.config.model
        )
    }

    /// Sends one prompt and returns the first candidate's text.
    fn generate(&self, request: &GenerateRequest) -> Result<String, SourceError> {
        if !self.is_configured() {
            return Err(SourceError::Unavailable);
        }

        let response = self
            .client
            .post(self.url())
            .header("x-goog-api-key", self.config.api_key.trim())
            .json(request)
            .send()
            .map_err(|e| SourceError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().unwrap_or_default();
            return Err(SourceError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let body: GenerateResponse = response
            .json()
            .map_err(|e| SourceError::Parse(e.to_string()))?;
        body.first_text()
            .ok_or_else(|| SourceError::Parse("No candidates in response".into()))
    }
}

impl LevelSource for GeminiClient {
    fn generate_level(&self, difficulty: &str, level_number: u32) -> Result<LevelData, SourceError> {
        let request = GenerateRequest {
            contents: vec![Content::user(level_prompt(difficulty))],
            generation_config: Some(GenerationConfig {
                response_mime_type: "application/json".into(),
                response_schema: level_schema(),
            }),
        };
        debug!(difficulty, level_number, "requesting generated level");
        let text = self.generate(&request).inspect_err(|e| {
            warn!(error = %e, "level generation failed");
        })?;
        parse_level(&text, difficulty, level_number)
    }
}

impl HintSource for GeminiClient {
    fn hint(&self, layout: &[String], commands: &[String]) -> Result<String, SourceError> {
        let request = GenerateRequest {
            contents: vec![Content::user(hint_prompt(layout, commands))],
            generation_config: None,
        };
        self.generate(&request)
    }
}

// ============================================================================
// Prompts
// ============================================================================

fn level_prompt(difficulty: &str) -> String {
    format!(
        "Create a grid-based puzzle level for a coding game for kids (Elementary School).\n\
         Theme: Space Mars Rover.\n\
         Grid Size: {GRID_SIZE}x{GRID_SIZE}.\n\n\
         Symbols to use in layout:\n\
         'S' = Start Position (There must be exactly one 'S')\n\
         'G' = Goal/End Position (There must be exactly one 'G')\n\
         'X' = Obstacle/Rock\n\
         '.' = Empty Space\n\
         'C' = Coin (Optional bonus, put 1 or 2)\n\n\
         Difficulty: {difficulty}.\n\
         The path should be solvable.\n\n\
         Story: A short, fun, encouraging sentence in Indonesian language (Bahasa Indonesia) \
         introducing the mission."
    )
}

fn hint_prompt(layout: &[String], commands: &[String]) -> String {
    format!(
        "The user is playing a coding game.\n\
         Grid Layout (S=Start, G=Goal, X=Obstacle, .=Empty):\n{}\n\n\
         Current User Command Sequence:\n{}\n\n\
         Provide a helpful, encouraging hint in Indonesian (Bahasa Indonesia) for a child.\n\
         Do not give the exact answer, just a nudge in the right direction.\n\
         Keep it under 20 words.",
        json!(layout),
        json!(commands)
    )
}

fn level_schema() -> serde_json::Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "layout": {
                "type": "ARRAY",
                "items": { "type": "STRING" },
                "description": format!(
                    "Array of {GRID_SIZE} strings, each {GRID_SIZE} characters long representing the row."
                )
            },
            "story": {
                "type": "STRING",
                "description": "The mission briefing in Indonesian."
            },
            "par": {
                "type": "INTEGER",
                "description": "The estimated optimal number of moves."
            }
        },
        "required": ["layout", "story", "par"]
    })
}

/// The JSON object the level schema asks for.
#[derive(Debug, Deserialize)]
struct GeneratedLevel {
    layout: Vec<String>,
    story: String,
    par: u32,
}

/// Turns the model's JSON text into a level record. Layout validity is the
/// session's concern.
fn parse_level(text: &str, difficulty: &str, level_number: u32) -> Result<LevelData, SourceError> {
    let generated: GeneratedLevel =
        serde_json::from_str(text.trim()).map_err(|e| SourceError::Parse(e.to_string()))?;
    Ok(LevelData {
        id: level_number,
        grid_size: GRID_SIZE,
        layout: generated.layout,
        story: generated.story,
        difficulty: difficulty.to_string(),
        par: generated.par,
    })
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

impl Content {
    fn user(text: String) -> Self {
        Content {
            role: Some("user".into()),
            parts: vec![Part { text: Some(text) }],
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: String,
    response_schema: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

impl GenerateResponse {
    fn first_text(self) -> Option<String> {
        self.candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .find_map(|p| p.text)
    }
}
