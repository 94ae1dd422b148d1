use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

// -- Insert payloads --

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewComment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idea_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewIdea {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewUser {
    pub username: String,
    pub email: String,
}

// -- Patch payloads --
//
// Outer `None`: column untouched. For nullable columns `Some(None)` sends an
// explicit null.

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MessagePatch {
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Option<Uuid>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommentPatch {
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub idea_id: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Option<Uuid>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IdeaPatch {
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Option<Uuid>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// A field that is present in the input, even as `null`, becomes `Some`.
fn present<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn new_idea_omits_absent_fields() {
        let idea = NewIdea {
            title: "Ship faster".into(),
            ..Default::default()
        };
        assert_eq!(serde_json::to_value(&idea).unwrap(), json!({ "title": "Ship faster" }));
    }

    #[test]
    fn new_idea_rejects_category() {
        let input = json!({ "title": "Ship faster", "category": "ops" });
        assert!(serde_json::from_value::<NewIdea>(input).is_err());
    }

    #[test]
    fn new_idea_rejects_client_supplied_id() {
        let input = json!({ "id": "8d0c2a7e-4f57-4c1b-9a8e-1f2d3c4b5a69", "title": "x" });
        assert!(serde_json::from_value::<NewIdea>(input).is_err());
    }

    #[test]
    fn patch_sends_only_edited_field() {
        let patch = IdeaPatch {
            description: Some(Some("draft".into())),
            ..Default::default()
        };
        assert_eq!(serde_json::to_value(&patch).unwrap(), json!({ "description": "draft" }));
    }

    #[test]
    fn patch_can_clear_nullable_column() {
        let patch = IdeaPatch {
            description: Some(None),
            ..Default::default()
        };
        assert_eq!(serde_json::to_value(&patch).unwrap(), json!({ "description": null }));
    }

    #[test]
    fn patch_null_and_missing_differ() {
        let cleared: IdeaPatch = serde_json::from_value(json!({ "description": null })).unwrap();
        assert_eq!(cleared.description, Some(None));

        let untouched: IdeaPatch = serde_json::from_value(json!({ "title": "t" })).unwrap();
        assert_eq!(untouched.description, None);
    }
}
