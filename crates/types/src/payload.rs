//! Invocation request sent from the host to an extension.

use serde::{Deserialize, Serialize};

use crate::ValueMap;

/// JSON request for a single command invocation. A payload is built fresh
/// for every invocation and never shared between commands.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payload {
    pub command: String,
    #[serde(default)]
    pub params: ValueMap,
    #[serde(default)]
    pub preferences: ValueMap,
    #[serde(default)]
    pub cwd: String,
    /// Current search query, for `search` mode commands.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
}

impl Payload {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Default::default()
        }
    }

    pub fn with_params(mut self, params: ValueMap) -> Self {
        self.params = params;
        self
    }

    pub fn with_preferences(mut self, preferences: ValueMap) -> Self {
        self.preferences = preferences;
        self
    }

    pub fn with_cwd(mut self, cwd: impl Into<String>) -> Self {
        self.cwd = cwd.into();
        self
    }

    /// Copy of this payload with `params` merged over the existing params.
    pub fn merged(&self, params: &ValueMap) -> Self {
        let mut next = self.clone();
        for (key, value) in params {
            next.params.insert(key.clone(), value.clone());
        }
        next
    }
}
