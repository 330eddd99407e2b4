//! Caller-facing generation request and its builder.

use crate::error::GenerationError;

/// One unit of outbound payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentPart {
    /// Inline text
    Text(String),
    /// A binary attachment with its declared MIME type
    Binary {
        /// Raw bytes of the attachment
        data: Vec<u8>,
        /// MIME type declared by the source
        mime_type: String,
    },
}

impl ContentPart {
    /// Creates a text part.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Creates a binary part.
    pub fn binary(mime_type: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self::Binary {
            data: data.into(),
            mime_type: mime_type.into(),
        }
    }

    /// MIME type of a binary part, `None` for text.
    pub fn mime_type(&self) -> Option<&str> {
        match self {
            Self::Text(_) => None,
            Self::Binary { mime_type, .. } => Some(mime_type),
        }
    }
}

/// Raw caller input: a plain prompt or an ordered list of parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptInput {
    /// A plain text prompt
    Text(String),
    /// An ordered list of text and binary parts
    Parts(Vec<ContentPart>),
}

impl PromptInput {
    /// A short description used in demo output and logs.
    pub fn preview(&self, max_chars: usize) -> String {
        match self {
            Self::Text(text) => text.chars().take(max_chars).collect(),
            Self::Parts(parts) => format!("Multi-part content ({} parts)", parts.len()),
        }
    }
}

impl From<String> for PromptInput {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for PromptInput {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<Vec<ContentPart>> for PromptInput {
    fn from(parts: Vec<ContentPart>) -> Self {
        Self::Parts(parts)
    }
}

/// A validated, immutable request ready for a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    model_id: String,
    parts: Vec<ContentPart>,
    system_instruction: Option<String>,
}

impl GenerationRequest {
    /// Builds a request from caller input.
    ///
    /// The instruction is kept as metadata and never becomes a content part.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::InvalidRequest`] when the model id is blank,
    /// the part list is empty, or a binary part has no MIME type.
    pub fn build(
        model_id: impl Into<String>,
        input: impl Into<PromptInput>,
        system_instruction: Option<&str>,
    ) -> Result<Self, GenerationError> {
        let model_id = model_id.into();
        if model_id.trim().is_empty() {
            return Err(GenerationError::InvalidRequest(
                "model id must not be empty".into(),
            ));
        }

        let parts = match input.into() {
            PromptInput::Text(text) => vec![ContentPart::Text(text)],
            PromptInput::Parts(parts) => parts,
        };
        if parts.is_empty() {
            return Err(GenerationError::InvalidRequest(
                "request needs at least one content part".into(),
            ));
        }
        if let Some(index) = parts
            .iter()
            .position(|part| matches!(part.mime_type(), Some(mime) if mime.trim().is_empty()))
        {
            return Err(GenerationError::InvalidRequest(format!(
                "binary part {index} has no MIME type"
            )));
        }

        Ok(Self {
            model_id,
            parts,
            system_instruction: system_instruction
                .filter(|s| !s.trim().is_empty())
                .map(str::to_string),
        })
    }

    /// The target model.
    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// The content parts, in caller order.
    pub fn parts(&self) -> &[ContentPart] {
        &self.parts
    }

    /// The steering instruction, if any.
    pub fn system_instruction(&self) -> Option<&str> {
        self.system_instruction.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_string_yields_single_text_part() {
        let request = GenerationRequest::build("gemini-2.5-flash", "Cân bằng: Fe + O₂", None).unwrap();
        assert_eq!(request.parts(), &[ContentPart::text("Cân bằng: Fe + O₂")]);
        assert_eq!(request.system_instruction(), None);
    }

    #[test]
    fn list_preserves_order_and_mime() {
        let parts = vec![
            ContentPart::text("Giải đề sau"),
            ContentPart::binary("image/png", vec![0x89, b'P', b'N', b'G']),
        ];
        let request = GenerationRequest::build("m", parts.clone(), Some("persona")).unwrap();
        assert_eq!(request.parts(), parts.as_slice());
        assert_eq!(request.parts()[1].mime_type(), Some("image/png"));
        assert_eq!(request.system_instruction(), Some("persona"));
    }

    #[test]
    fn instruction_is_not_a_content_part() {
        let request = GenerationRequest::build("m", "hi", Some("secret persona")).unwrap();
        assert!(request
            .parts()
            .iter()
            .all(|p| !matches!(p, ContentPart::Text(t) if t.contains("secret persona"))));
    }

    #[test]
    fn rejects_empty_parts_and_blank_mime() {
        assert!(matches!(
            GenerationRequest::build("m", Vec::<ContentPart>::new(), None),
            Err(GenerationError::InvalidRequest(_))
        ));
        assert!(matches!(
            GenerationRequest::build("m", vec![ContentPart::binary(" ", vec![1])], None),
            Err(GenerationError::InvalidRequest(_))
        ));
        assert!(matches!(
            GenerationRequest::build("  ", "hi", None),
            Err(GenerationError::InvalidRequest(_))
        ));
    }
}
