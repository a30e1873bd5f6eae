use super::client::VertexClient;
use super::types::*;
use crate::error::GcpError;

pub struct MessageBuilder<'a> {
    client: &'a VertexClient,
    model: Option<String>,
    contents: Vec<VertexContent>,
    system_instruction: Option<String>,
    generation_config: GenerationConfig,
}

impl<'a> MessageBuilder<'a> {
    pub fn new(client: &'a VertexClient) -> Self {
        Self {
            client,
            model: None,
            contents: Vec::new(),
            system_instruction: None,
            generation_config: GenerationConfig::default(),
        }
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn user_message(mut self, text: impl Into<String>) -> Self {
        self.contents.push(VertexContent {
            role: VertexRole::User,
            parts: vec![VertexPart {
                text: Some(text.into()),
            }],
        });
        self
    }

    pub fn model_message(mut self, text: impl Into<String>) -> Self {
        self.contents.push(VertexContent {
            role: VertexRole::Model,
            parts: vec![VertexPart {
                text: Some(text.into()),
            }],
        });
        self
    }

    pub fn system(mut self, text: impl Into<String>) -> Self {
        self.system_instruction = Some(text.into());
        self
    }

    pub fn temperature(mut self, temp: f32) -> Self {
        self.generation_config.temperature = Some(temp);
        self
    }

    pub fn top_p(mut self, top_p: f32) -> Self {
        self.generation_config.top_p = Some(top_p);
        self
    }

    pub fn top_k(mut self, top_k: u32) -> Self {
        self.generation_config.top_k = Some(top_k);
        self
    }

    pub fn max_output_tokens(mut self, tokens: u32) -> Self {
        self.generation_config.max_output_tokens = Some(tokens);
        self
    }

    pub async fn send(self) -> Result<VertexGenerateContentResponse, GcpError> {
        let model = self
            .model
            .ok_or_else(|| GcpError::invalid_request("Model is required"))?;

        if self.contents.is_empty() {
            return Err(GcpError::invalid_request(
                "At least one message is required",
            ));
        }

        let request = VertexGenerateContentRequest {
            contents: self.contents,
            system_instruction: self.system_instruction.map(|text| VertexContent {
                role: VertexRole::User,
                parts: vec![VertexPart { text: Some(text) }],
            }),
            generation_config: Some(self.generation_config),
        };

        self.client.generate_content(model, request).await
    }
}
