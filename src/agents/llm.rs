//! Collaborators backed by a chat-completion backend.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;

use super::parse::{parse_plan, parse_review};
use super::prompts::{
    CODER_ROLE, PLANNER_ROLE, REVIEWER_ROLE, fix_prompt, generation_prompt, plan_prompt,
    review_prompt,
};
use super::{
    FixRequest, GenerationRequest, Generator, Plan, PlanRequest, Planner, ReviewRequest,
    ReviewVerdict, Reviewer,
};
use crate::llm::{ChatMessage, LlmClient};

async fn invoke(client: &dyn LlmClient, role: &str, prompt: String, purpose: &str) -> Result<String> {
    tracing::debug!(
        backend = client.name(),
        model = client.model(),
        purpose,
        prompt_len = prompt.len(),
        "invoking backend"
    );
    client
        .chat(role, &[ChatMessage::user(prompt)])
        .await
        .with_context(|| format!("{} request to {} failed", purpose, client.name()))
}

pub struct LlmPlanner {
    client: Arc<dyn LlmClient>,
}

impl LlmPlanner {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Planner for LlmPlanner {
    async fn plan(&self, request: &PlanRequest) -> Result<Plan> {
        let response = invoke(
            self.client.as_ref(),
            PLANNER_ROLE,
            plan_prompt(request),
            "Planning",
        )
        .await?;
        Ok(parse_plan(&response)?)
    }
}

pub struct LlmCoder {
    client: Arc<dyn LlmClient>,
}

impl LlmCoder {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Generator for LlmCoder {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        invoke(
            self.client.as_ref(),
            CODER_ROLE,
            generation_prompt(request),
            "Generation",
        )
        .await
    }

    async fn fix(&self, request: &FixRequest) -> Result<String> {
        invoke(self.client.as_ref(), CODER_ROLE, fix_prompt(request), "Fix").await
    }
}

pub struct LlmReviewer {
    client: Arc<dyn LlmClient>,
}

impl LlmReviewer {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Reviewer for LlmReviewer {
    async fn review(&self, request: &ReviewRequest) -> Result<ReviewVerdict> {
        let response = invoke(
            self.client.as_ref(),
            REVIEWER_ROLE,
            review_prompt(request),
            "Review",
        )
        .await?;
        Ok(parse_review(&response)?)
    }
}
