//! Webhook wire envelope.
//!
//! Inbound interactions carry a numeric `type`: `1` is the liveness handshake,
//! `2` an application command. Responses carry a numeric `type` as well: `1`
//! acknowledges a handshake, `4` is an immediate channel message whose text
//! may embed `<@id>` mention tokens.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{ArgValue, CommandInvocation, MAX_USER_ID_LENGTH};

pub const INTERACTION_PING: u8 = 1;
pub const INTERACTION_APPLICATION_COMMAND: u8 = 2;

pub const RESPONSE_PONG: u8 = 1;
pub const RESPONSE_CHANNEL_MESSAGE: u8 = 4;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InteractionError {
    #[error("interaction type {0} is not a command")]
    NotACommand(u8),
    #[error("command interaction has no data")]
    MissingData,
    #[error("command interaction has no caller")]
    MissingCaller,
    #[error("caller id too long (len={len}, max={max})")]
    CallerTooLong { len: usize, max: usize },
    #[error("target id too long (len={len}, max={max})")]
    TargetTooLong { len: usize, max: usize },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InteractionKind {
    Ping,
    ApplicationCommand,
    Unsupported(u8),
}

impl From<u8> for InteractionKind {
    fn from(value: u8) -> Self {
        match value {
            INTERACTION_PING => InteractionKind::Ping,
            INTERACTION_APPLICATION_COMMAND => InteractionKind::ApplicationCommand,
            other => InteractionKind::Unsupported(other),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct User {
    pub id: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Member {
    pub user: User,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CommandOption {
    pub name: String,
    #[serde(default)]
    pub value: Option<ArgValue>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct InteractionData {
    pub name: String,
    #[serde(default)]
    pub options: Vec<CommandOption>,
    #[serde(default)]
    pub target_id: Option<String>,
}

/// Inbound interaction as posted by the calling platform.
#[derive(Clone, Debug, Deserialize)]
pub struct Interaction {
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(default)]
    pub data: Option<InteractionData>,
    /// Present for interactions from a guild channel.
    #[serde(default)]
    pub member: Option<Member>,
    /// Present for interactions from a direct message.
    #[serde(default)]
    pub user: Option<User>,
}

impl Interaction {
    pub fn kind(&self) -> InteractionKind {
        InteractionKind::from(self.kind)
    }

    pub fn caller_id(&self) -> Option<&str> {
        self.member
            .as_ref()
            .map(|member| member.user.id.as_str())
            .or_else(|| self.user.as_ref().map(|user| user.id.as_str()))
    }

    /// Decode into the transport-independent command form.
    pub fn invocation(&self) -> Result<CommandInvocation, InteractionError> {
        if self.kind() != InteractionKind::ApplicationCommand {
            return Err(InteractionError::NotACommand(self.kind));
        }
        let data = self.data.as_ref().ok_or(InteractionError::MissingData)?;
        let caller = self
            .caller_id()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or(InteractionError::MissingCaller)?;
        if caller.len() > MAX_USER_ID_LENGTH {
            return Err(InteractionError::CallerTooLong {
                len: caller.len(),
                max: MAX_USER_ID_LENGTH,
            });
        }

        let mut invocation = CommandInvocation::new(data.name.clone(), caller);
        for option in &data.options {
            invocation
                .args
                .insert(option.name.clone(), option.value.clone());
        }
        let target = data
            .target_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty());
        if let Some(target) = target {
            if target.len() > MAX_USER_ID_LENGTH {
                return Err(InteractionError::TargetTooLong {
                    len: target.len(),
                    max: MAX_USER_ID_LENGTH,
                });
            }
        }
        invocation.target = target.map(str::to_string);
        Ok(invocation)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseData {
    pub content: String,
}

/// Outbound response envelope.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionResponse {
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<ResponseData>,
}

impl InteractionResponse {
    /// Handshake acknowledgement; carries no body content.
    pub fn pong() -> Self {
        Self {
            kind: RESPONSE_PONG,
            data: None,
        }
    }

    pub fn message(content: impl Into<String>) -> Self {
        Self {
            kind: RESPONSE_CHANNEL_MESSAGE,
            data: Some(ResponseData {
                content: content.into(),
            }),
        }
    }

    pub fn content(&self) -> Option<&str> {
        self.data.as_ref().map(|data| data.content.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pong_serializes_without_data() {
        let json = serde_json::to_string(&InteractionResponse::pong()).unwrap();
        assert_eq!(json, r#"{"type":1}"#);
    }

    #[test]
    fn test_message_serializes_content() {
        let json = serde_json::to_value(InteractionResponse::message("<@7> hi")).unwrap();
        assert_eq!(json, serde_json::json!({"type": 4, "data": {"content": "<@7> hi"}}));
    }

    #[test]
    fn test_guild_command_decodes_options_and_member() {
        let interaction: Interaction = serde_json::from_value(serde_json::json!({
            "type": 2,
            "data": {
                "name": "pay",
                "options": [
                    {"name": "user", "type": 6, "value": "222"},
                    {"name": "amount", "type": 4, "value": 300}
                ]
            },
            "member": {"user": {"id": "111"}}
        }))
        .unwrap();

        let invocation = interaction.invocation().unwrap();
        assert_eq!(invocation.name, "pay");
        assert_eq!(invocation.caller, "111");
        assert_eq!(invocation.arg("amount"), Some(&ArgValue::Integer(300)));
        assert_eq!(
            invocation.arg("user").and_then(ArgValue::as_identity).as_deref(),
            Some("222")
        );
        assert_eq!(invocation.target, None);
    }

    #[test]
    fn test_direct_message_command_uses_user_and_target() {
        let interaction: Interaction = serde_json::from_value(serde_json::json!({
            "type": 2,
            "data": {"name": "balance", "target_id": "999"},
            "user": {"id": "111"}
        }))
        .unwrap();

        let invocation = interaction.invocation().unwrap();
        assert_eq!(invocation.caller, "111");
        assert_eq!(invocation.target.as_deref(), Some("999"));
        assert!(invocation.args.is_empty());
    }

    #[test]
    fn test_oversized_target_is_rejected() {
        let interaction: Interaction = serde_json::from_value(serde_json::json!({
            "type": 2,
            "data": {"name": "balance", "target_id": "9".repeat(MAX_USER_ID_LENGTH + 1)},
            "user": {"id": "111"}
        }))
        .unwrap();
        assert_eq!(
            interaction.invocation().unwrap_err(),
            InteractionError::TargetTooLong {
                len: MAX_USER_ID_LENGTH + 1,
                max: MAX_USER_ID_LENGTH
            }
        );
    }

    #[test]
    fn test_ping_is_not_a_command() {
        let interaction: Interaction = serde_json::from_str(r#"{"type":1}"#).unwrap();
        assert_eq!(interaction.kind(), InteractionKind::Ping);
        assert_eq!(
            interaction.invocation().unwrap_err(),
            InteractionError::NotACommand(1)
        );
    }

    #[test]
    fn test_command_without_caller_is_rejected() {
        let interaction: Interaction = serde_json::from_value(serde_json::json!({
            "type": 2,
            "data": {"name": "balance"}
        }))
        .unwrap();
        assert_eq!(
            interaction.invocation().unwrap_err(),
            InteractionError::MissingCaller
        );
    }
}
