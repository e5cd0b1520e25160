// SPDX-License-Identifier: MIT

//! Dialogue component: system-prompt assembly, model call, log persistence.

use crate::error::AppError;
use crate::models::{AttributeCatalog, ConversationTurn, Role, UserProfile};
use crate::services::{ChatMessage, ChatModel};
use crate::session::Session;
use crate::store::UserStore;
use std::sync::Arc;

const BASE_SYSTEM_MESSAGE: &str = "You are a personal health assistant providing \
feedback and recommendations based on user health updates. Your advice is tailored \
specifically for the user. In creating the advice you consider all the information \
in their user profile and their conversation history.\n\n";

/// Composes prompts and runs one conversation turn against the model.
#[derive(Clone)]
pub struct DialogueService {
    model: Arc<dyn ChatModel>,
    catalog: AttributeCatalog,
}

impl DialogueService {
    pub fn new(model: Arc<dyn ChatModel>, catalog: AttributeCatalog) -> Self {
        Self { model, catalog }
    }

    pub fn catalog(&self) -> &AttributeCatalog {
        &self.catalog
    }

    /// System instruction: base instruction, then the user's profile, then
    /// the instruction text of every selected attribute.
    fn system_message(&self, profile: Option<&UserProfile>, attributes: &[String]) -> String {
        let mut message = String::from(BASE_SYSTEM_MESSAGE);

        if let Some(profile) = profile {
            message.push_str("User profile:\n");
            message.push_str(&profile.profile_text);
            message.push_str("\n\n");
        }

        if !attributes.is_empty() {
            message.push_str(
                "As you formulate your response, consider the following additional \
                 attributes of your personality.\n\n",
            );
            for key in attributes {
                message.push_str(self.catalog.instruction(key));
                message.push('\n');
            }
        }

        message
    }

    /// Run one turn: persist the user's message, call the model, persist the
    /// reply, and return it.
    ///
    /// The user turn is persisted before the model call, so a model failure
    /// leaves it in the log with no matching assistant reply. History
    /// renderers tolerate that.
    pub async fn submit_turn(
        &self,
        store: &UserStore,
        session: &mut Session,
        user_id: &str,
        text: &str,
    ) -> Result<String, AppError> {
        let user_turn = ConversationTurn::now(Role::User, text);
        store.append_and_persist(user_id, user_turn.clone())?;
        session.conversation.push(user_turn);

        let profile = store.load_profile(user_id)?;
        let attributes = store.load_attributes(user_id)?;
        let system = self.system_message(profile.as_ref(), &attributes);

        let mut messages = Vec::with_capacity(session.conversation.len() + 1);
        messages.push(ChatMessage {
            role: Role::System,
            content: system,
        });
        messages.extend(session.conversation.iter().map(|turn| ChatMessage {
            role: turn.role,
            content: turn.content.clone(),
        }));

        let reply = self.model.chat(&messages).await.map_err(|e| {
            tracing::error!(user_id, error = %e, "Model call failed, user turn kept in log");
            e
        })?;

        let assistant_turn = ConversationTurn::now(Role::Assistant, reply.clone());
        store.append_and_persist(user_id, assistant_turn.clone())?;
        session.conversation.push(assistant_turn);

        Ok(reply)
    }
}
