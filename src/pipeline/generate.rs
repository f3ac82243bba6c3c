use anyhow::{bail, Result};
use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, ChatCompletionToolArgs, ChatCompletionToolType,
    CreateChatCompletionRequestArgs, FunctionObjectArgs,
};
use async_openai::Client;
use serde_json::json;
use tracing::error;

use crate::config::GENERATION_MODEL;
use crate::prompts::{build_system_prompt, Prompts};

/// Invokes the chat model over the assembled context. Any provider error
/// becomes the canned fallback sentence: the conversation stays usable
/// instead of surfacing provider failures to the end user.
pub async fn generate_reply(
    client: &Client<OpenAIConfig>,
    messages: Vec<ChatCompletionRequestMessage>,
    user_instructions: Option<&str>,
    temperature: f32,
    enable_web_search: bool,
) -> String {
    match try_generate(client, messages, user_instructions, temperature, enable_web_search).await {
        Ok(text) => text,
        Err(e) => {
            error!("Error generating AI response: {e:?}");
            Prompts::GENERATION_FALLBACK.to_string()
        }
    }
}

async fn try_generate(
    client: &Client<OpenAIConfig>,
    messages: Vec<ChatCompletionRequestMessage>,
    user_instructions: Option<&str>,
    temperature: f32,
    enable_web_search: bool,
) -> Result<String> {
    let mut request_messages: Vec<ChatCompletionRequestMessage> =
        vec![ChatCompletionRequestSystemMessageArgs::default()
            .content(build_system_prompt(user_instructions))
            .build()?
            .into()];
    request_messages.extend(messages);

    let mut builder = CreateChatCompletionRequestArgs::default();
    builder
        .model(GENERATION_MODEL)
        .messages(request_messages)
        .temperature(temperature);

    if enable_web_search {
        builder.tools(vec![ChatCompletionToolArgs::default()
            .r#type(ChatCompletionToolType::Function)
            .function(
                FunctionObjectArgs::default()
                    .name("google_search")
                    .description("Search the web for current information.")
                    .parameters(json!({
                        "type": "object",
                        "properties": {
                            "query": {
                                "type": "string",
                                "description": "The search query.",
                            },
                        },
                        "required": ["query"],
                    }))
                    .build()?,
            )
            .build()?]);
    }

    let response = client.chat().create(builder.build()?).await?;

    let content = response
        .choices
        .first()
        .and_then(|choice| choice.message.content.clone())
        .unwrap_or_default();

    if content.trim().is_empty() {
        bail!("empty completion from provider");
    }

    Ok(content)
}

/// Short conversation title from the opening message, same
/// fallback-on-error policy as replies.
pub async fn generate_title(client: &Client<OpenAIConfig>, message: &str) -> String {
    match try_title(client, message).await {
        Ok(title) => title,
        Err(e) => {
            error!("Error generating title: {e:?}");
            Prompts::GENERATION_FALLBACK.to_string()
        }
    }
}

async fn try_title(client: &Client<OpenAIConfig>, message: &str) -> Result<String> {
    let request = CreateChatCompletionRequestArgs::default()
        .model(GENERATION_MODEL)
        .max_tokens(64u32)
        .messages([
            ChatCompletionRequestSystemMessageArgs::default()
                .content(Prompts::TITLE_SYSTEM)
                .build()?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(message)
                .build()?
                .into(),
        ])
        .build()?;

    let response = client.chat().create(request).await?;

    let raw = response
        .choices
        .first()
        .and_then(|choice| choice.message.content.clone())
        .unwrap_or_default();

    Ok(clean_title(&raw))
}

/// Enforces the title format contract regardless of what the model echoed:
/// no quotes or colons, at most 50 characters, no surrounding whitespace.
pub fn clean_title(raw: &str) -> String {
    let stripped: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, '"' | '\'' | ':' | '\u{201c}' | '\u{201d}' | '\u{2018}' | '\u{2019}'))
        .collect();

    stripped.trim().chars().take(50).collect::<String>().trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_title_strips_quotes_and_colons() {
        let title = clean_title("\"Savings Plan: Next Steps\"");
        assert!(!title.contains('"'));
        assert!(!title.contains(':'));
        assert_eq!(title, "Savings Plan Next Steps");
    }

    #[test]
    fn clean_title_enforces_length_cap() {
        let echoed = "What should I do with $10,000 in savings? And also tell me more about it";
        let title = clean_title(echoed);
        assert!(title.chars().count() <= 50);
        assert!(!title.contains('"'));
        assert!(!title.contains(':'));
    }

    #[test]
    fn clean_title_trims_whitespace() {
        assert_eq!(clean_title("  Budget Review  "), "Budget Review");
    }

    #[test]
    fn clean_title_handles_smart_quotes() {
        assert_eq!(clean_title("\u{201c}Roth IRA Basics\u{201d}"), "Roth IRA Basics");
    }
}
