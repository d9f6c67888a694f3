use crate::errors::ServerError;
use crate::schema::notes;
use diesel::{Insertable, Queryable};
use serde_derive::{Deserialize, Serialize};
use std::time::SystemTime;

#[derive(Clone, Debug, Queryable, Insertable, Serialize)]
#[diesel(table_name = notes)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    #[serde(skip_serializing)]
    pub user_id: String,
    pub title: String,
    pub content: String,
    #[serde(rename = "order")]
    pub sort_order: i32,
    pub pinned: bool,
    pub created_at: SystemTime,
    pub updated_at: SystemTime,
}

impl Note {
    /// A fresh unpinned note. The caller picks `sort_order` under the group lock.
    pub fn new(user_id: &str, content: ValidNote, sort_order: i32) -> Self {
        let time_now = SystemTime::now();
        Note {
            id: nanoid::nanoid!(),
            user_id: user_id.to_owned(),
            title: content.title,
            content: content.content,
            sort_order,
            pinned: false,
            created_at: time_now,
            updated_at: time_now,
        }
    }
}

/// Where a note sits: its pin-group and its slot inside that group.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Position {
    pub sort_order: i32,
    pub pinned: bool,
}

impl From<(i32, bool)> for Position {
    fn from((sort_order, pinned): (i32, bool)) -> Self {
        Position { sort_order, pinned }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct ReqNote {
    pub title: Option<String>,
    pub content: Option<String>,
}

/// Title and content that passed validation.
#[derive(Clone, Debug)]
pub struct ValidNote {
    pub title: String,
    pub content: String,
}

impl ReqNote {
    pub fn validate(self) -> Result<ValidNote, ServerError> {
        match (self.title, self.content) {
            (Some(title), Some(content)) if !title.is_empty() && !content.is_empty() => {
                Ok(ValidNote { title, content })
            }
            _ => Err(ServerError::InvalidArgument(
                "Missing required fields".to_string(),
            )),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReorderRequest {
    pub note_id: Option<String>,
    pub new_order: Option<i64>,
    /// Group the client dropped the note into, when it knows it.
    pub pinned: Option<bool>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct PinRequest {
    pub pinned: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_missing_or_empty_fields() {
        let missing = ReqNote {
            title: Some("title".into()),
            content: None,
        };
        assert!(matches!(
            missing.validate(),
            Err(ServerError::InvalidArgument(_))
        ));

        let empty = ReqNote {
            title: Some(String::new()),
            content: Some("body".into()),
        };
        assert!(matches!(
            empty.validate(),
            Err(ServerError::InvalidArgument(_))
        ));
    }

    #[test]
    fn serialized_note_hides_owner_and_uses_order_key() {
        let valid = ReqNote {
            title: Some("Shopping List".into()),
            content: Some("- Milk".into()),
        }
        .validate()
        .unwrap();
        let note = Note::new("user-1", valid, 3);
        let value = serde_json::to_value(&note).unwrap();

        assert_eq!(value["order"], 3);
        assert_eq!(value["pinned"], false);
        assert!(value.get("userId").is_none());
        assert!(value.get("createdAt").is_some());
    }
}
