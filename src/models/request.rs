//! Request models for the Gemini AI API.

use serde::{Deserialize, Serialize};

use super::{ContentPart, GenerationRequest, Part};

/// Author of a content block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user
    User,
    /// The model
    Model,
}

/// A content object containing parts of the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Content {
    /// Author of this block; omitted for system instructions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    /// The parts that make up the content.
    #[serde(default)]
    pub parts: Vec<Part>,
}

/// A `generateContent` request body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    /// Optional system instruction for the model
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    /// The contents of the request.
    pub contents: Vec<Content>,
}

impl From<&ContentPart> for Part {
    fn from(part: &ContentPart) -> Self {
        match part {
            ContentPart::Text(text) => Part::text(text.clone()),
            ContentPart::Binary { data, mime_type } => Part::inline_data(mime_type.clone(), data),
        }
    }
}

impl From<&GenerationRequest> for Request {
    fn from(request: &GenerationRequest) -> Self {
        Self {
            system_instruction: request.system_instruction().map(|text| Content {
                role: None,
                parts: vec![Part::text(text)],
            }),
            contents: vec![Content {
                role: Some(Role::User),
                parts: request.parts().iter().map(Part::from).collect(),
            }],
        }
    }
}
