//! Pages returned by extensions.

use serde::{Deserialize, Serialize};

use crate::{Action, is_false};

/// What the host renders for a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Page {
    List(ListPage),
    Detail(DetailPage),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub items: Vec<ListItem>,
    /// List-level actions, available regardless of the selected item.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<Action>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub show_detail: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub empty_text: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailPage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Inline content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Shell command whose stdout is the content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    /// Syntax hint for the content (`markdown`, `json`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<Action>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub accessories: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<Preview>,
    /// The first action is the primary one.
    #[serde(default)]
    pub actions: Vec<Action>,
}

/// Secondary content shown next to a list item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preview {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl Page {
    pub fn title(&self) -> Option<&str> {
        match self {
            Self::List(list) => list.title.as_deref(),
            Self::Detail(detail) => detail.title.as_deref(),
        }
    }

    /// Page-level actions.
    pub fn actions(&self) -> &[Action] {
        match self {
            Self::List(list) => &list.actions,
            Self::Detail(detail) => &detail.actions,
        }
    }

    /// Items of a list page; empty for detail pages.
    pub fn items(&self) -> &[ListItem] {
        match self {
            Self::List(list) => &list.items,
            Self::Detail(_) => &[],
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::List(_) => "list",
            Self::Detail(_) => "detail",
        }
    }

    /// Every action declared anywhere on the page.
    pub fn all_actions(&self) -> impl Iterator<Item = &Action> {
        self.actions().iter().chain(self.items().iter().flat_map(|item| item.actions.iter()))
    }
}

impl ListItem {
    /// Stable key of the item, defaulting to its position.
    pub fn key(&self, index: usize) -> String {
        self.id.clone().unwrap_or_else(|| index.to_string())
    }

    pub fn primary_action(&self) -> Option<&Action> {
        self.actions.first()
    }
}

impl DetailPage {
    pub fn has_content(&self) -> bool {
        self.text.is_some() || self.command.is_some()
    }
}

impl Preview {
    pub fn has_content(&self) -> bool {
        self.text.is_some() || self.command.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn list_item_key_defaults_to_index() {
        let page: Page = serde_json::from_value(json!({
            "type": "list",
            "items": [{"title": "a"}, {"title": "b", "id": "bee"}]
        }))
        .expect("decode list");
        let items = page.items();
        assert_eq!(items[0].key(0), "0");
        assert_eq!(items[1].key(1), "bee");
        assert!(items[0].primary_action().is_none());
    }

    #[test]
    fn list_without_items_is_rejected() {
        assert!(serde_json::from_value::<Page>(json!({"type": "list", "title": "x"})).is_err());
    }

    #[test]
    fn optional_fields_are_omitted_not_null() {
        let page = Page::Detail(DetailPage {
            text: Some("hello".into()),
            ..Default::default()
        });
        assert_eq!(serde_json::to_value(&page).expect("encode"), json!({"type": "detail", "text": "hello"}));
    }
}
