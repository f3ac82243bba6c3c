use anyhow::Result;
use async_openai::types::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestUserMessageArgs,
};

use crate::models::message::{Message, Role};
use crate::pipeline::attachments::ProcessedAttachment;
use crate::prompts::Prompts;

/// Concatenates, per attachment that produced display text, a header naming
/// the file followed by the text, blocks separated by blank lines. `None`
/// when no attachment produced text.
pub fn build_attachments_context(results: &[ProcessedAttachment]) -> Option<String> {
    let blocks: Vec<String> = results
        .iter()
        .filter_map(|item| {
            item.display_text
                .as_ref()
                .map(|text| format!("File: {}\n{}", item.attachment.name, text))
        })
        .collect();

    if blocks.is_empty() {
        None
    } else {
        Some(blocks.join("\n\n"))
    }
}

/// Maps prior messages to the minimal role/content shape, oldest first, and
/// appends the new user turn. Empty user text is replaced with the review
/// placeholder; attachment context, when present, is appended to the final
/// user message under its own separator.
pub fn assemble_context(
    prior_messages: &[Message],
    user_text: &str,
    attachments_context: Option<&str>,
) -> Result<Vec<ChatCompletionRequestMessage>> {
    let mut formatted: Vec<ChatCompletionRequestMessage> =
        Vec::with_capacity(prior_messages.len() + 1);

    for message in prior_messages {
        let request_message = match message.role {
            Role::User => ChatCompletionRequestUserMessageArgs::default()
                .content(message.content.as_str())
                .build()?
                .into(),
            Role::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
                .content(message.content.as_str())
                .build()?
                .into(),
        };
        formatted.push(request_message);
    }

    let base_content = if user_text.trim().is_empty() {
        Prompts::REVIEW_ATTACHMENTS
    } else {
        user_text
    };
    let final_content = match attachments_context {
        Some(context) => format!("{base_content}\n\nAttached files:\n{context}"),
        None => base_content.to_string(),
    };

    formatted.push(
        ChatCompletionRequestUserMessageArgs::default()
            .content(final_content)
            .build()?
            .into(),
    );

    Ok(formatted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::attachment::Attachment;
    use async_openai::types::ChatCompletionRequestUserMessageContent;
    use chrono::Utc;
    use sqlx::types::Json;
    use uuid::Uuid;

    fn prior(role: Role, content: &str) -> Message {
        Message {
            id: Uuid::new_v4(),
            chat_id: Uuid::new_v4(),
            user_id: "user-1".to_string(),
            content: content.to_string(),
            role,
            attachments: Json(Vec::new()),
            created_at: Utc::now(),
        }
    }

    fn processed(name: &str, display_text: Option<&str>) -> ProcessedAttachment {
        ProcessedAttachment {
            attachment: Attachment {
                id: Uuid::new_v4(),
                name: name.to_string(),
                mime_type: "application/pdf".to_string(),
                size: 10,
                storage_path: format!("user-1/chat/{name}"),
                url: format!("signed://{name}"),
                summary: display_text.map(str::to_string),
            },
            display_text: display_text.map(str::to_string),
            full_text: display_text.map(str::to_string),
        }
    }

    fn last_user_content(messages: &[ChatCompletionRequestMessage]) -> String {
        match messages.last().expect("at least one message") {
            ChatCompletionRequestMessage::User(user) => match &user.content {
                ChatCompletionRequestUserMessageContent::Text(text) => text.clone(),
                other => panic!("unexpected content shape: {other:?}"),
            },
            other => panic!("last message should be a user turn: {other:?}"),
        }
    }

    #[test]
    fn placeholder_and_file_header_for_attachment_only_turn() {
        let history = vec![prior(Role::User, "hi")];
        let results = vec![processed("statement.pdf", Some("Balance: $500"))];
        let context = build_attachments_context(&results);

        let messages = assemble_context(&history, "", context.as_deref()).expect("assemble");

        assert_eq!(messages.len(), 2);
        let content = last_user_content(&messages);
        assert!(content.starts_with(Prompts::REVIEW_ATTACHMENTS));
        assert!(content.contains("File: statement.pdf"));
        assert!(content.contains("Balance: $500"));
    }

    #[test]
    fn history_order_is_preserved() {
        let history = vec![
            prior(Role::User, "first"),
            prior(Role::Assistant, "second"),
            prior(Role::User, "third"),
        ];

        let messages = assemble_context(&history, "fourth", None).expect("assemble");

        assert_eq!(messages.len(), 4);
        assert!(matches!(messages[0], ChatCompletionRequestMessage::User(_)));
        assert!(matches!(messages[1], ChatCompletionRequestMessage::Assistant(_)));
        assert!(matches!(messages[2], ChatCompletionRequestMessage::User(_)));
        assert_eq!(last_user_content(&messages), "fourth");
    }

    #[test]
    fn textless_attachments_add_no_context_block() {
        let results = vec![processed("data.xlsx", None)];
        assert!(build_attachments_context(&results).is_none());

        let messages = assemble_context(&[], "look at this", None).expect("assemble");
        assert_eq!(last_user_content(&messages), "look at this");
    }

    #[test]
    fn multiple_attachment_blocks_are_blank_line_separated() {
        let results = vec![
            processed("a.pdf", Some("Alpha")),
            processed("skip.bin", None),
            processed("b.pdf", Some("Beta")),
        ];

        let context = build_attachments_context(&results).expect("context");
        assert_eq!(context, "File: a.pdf\nAlpha\n\nFile: b.pdf\nBeta");
    }
}
