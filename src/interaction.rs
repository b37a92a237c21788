// Copyright 2025 interaction-store contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Interaction record types shared by the router, adapters and file fallback

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;

/// Where an interaction happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatContext {
    Private,
    Group,
    Channel,
}

impl fmt::Display for ChatContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChatContext::Private => "private",
            ChatContext::Group => "group",
            ChatContext::Channel => "channel",
        };
        f.write_str(s)
    }
}

impl FromStr for ChatContext {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "private" => Ok(ChatContext::Private),
            "group" => Ok(ChatContext::Group),
            "channel" => Ok(ChatContext::Channel),
            other => Err(format!(
                "unknown chat context '{}', expected private, group or channel",
                other
            )),
        }
    }
}

/// A single user interaction, immutable once recorded.
///
/// The payload is an opaque JSON document supplied by the caller; the
/// router never inspects it. The timestamp is assigned at construction
/// as an RFC 3339 string so records sort chronologically as plain
/// strings across heterogeneous backends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub user_id: String,
    pub payload: Value,
    pub timestamp: String,
    pub chat_context: ChatContext,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
}

impl InteractionRecord {
    pub fn new(user_id: impl Into<String>, payload: Value, chat_context: ChatContext) -> Self {
        Self {
            user_id: user_id.into(),
            payload,
            timestamp: Utc::now().to_rfc3339(),
            chat_context,
            group_id: None,
        }
    }

    /// Build a record from a message/response exchange, the shape the
    /// bot layer produces for every answered question.
    pub fn conversation(
        user_id: impl Into<String>,
        message: &str,
        response: &str,
        chat_context: ChatContext,
    ) -> Self {
        Self::new(
            user_id,
            json!({
                "message": message,
                "response": response,
            }),
            chat_context,
        )
    }

    pub fn with_group(mut self, group_id: impl Into<String>) -> Self {
        self.group_id = Some(group_id.into());
        self
    }

    /// Attach user feedback to the payload (thumbs up/down from the bot).
    pub fn with_feedback(mut self, feedback: &str) -> Self {
        if let Value::Object(ref mut map) = self.payload {
            map.insert("feedback".to_string(), Value::String(feedback.to_string()));
        }
        self
    }
}

/// Filter for retrieval: by user or by group chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryFilter {
    User(String),
    Group(String),
}

impl QueryFilter {
    pub fn matches(&self, record: &InteractionRecord) -> bool {
        match self {
            QueryFilter::User(user_id) => record.user_id == *user_id,
            QueryFilter::Group(group_id) => record.group_id.as_deref() == Some(group_id.as_str()),
        }
    }
}
