use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::Serialize;

use crate::schema::posts;

/// A full `posts` row.
///
/// The field set is checked against the table definition for the Pg backend,
/// so a column mismatch is a compile error rather than a runtime surprise.
#[derive(Debug, Clone, PartialEq, Queryable, Selectable)]
#[diesel(table_name = posts)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Post {
    pub id: i64,
    pub content: String,
    pub likes: i32,
    pub created: NaiveDateTime,
    pub removed: bool,
}

#[derive(Insertable)]
#[diesel(table_name = posts)]
pub struct NewPost<'a> {
    pub content: &'a str,
}

/// The JSON record returned to clients.
#[derive(Debug, Serialize, PartialEq)]
pub struct PostDTO {
    pub id: i64,
    pub content: String,
    pub likes: i32,
    pub created: NaiveDateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub removed: Option<bool>,
}

impl From<Post> for PostDTO {
    fn from(row: Post) -> Self {
        PostDTO {
            id: row.id,
            content: row.content,
            likes: row.likes,
            created: row.created,
            removed: None,
        }
    }
}

impl PostDTO {
    /// Keeps the `removed` flag in the serialized record.
    pub fn with_removed(row: Post) -> Self {
        let removed = row.removed;
        PostDTO {
            removed: Some(removed),
            ..PostDTO::from(row)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn row(removed: bool) -> Post {
        Post {
            id: 7,
            content: "hello".to_string(),
            likes: 3,
            created: NaiveDate::from_ymd_opt(2024, 5, 1)
                .unwrap()
                .and_hms_opt(12, 30, 0)
                .unwrap(),
            removed,
        }
    }

    #[test]
    fn test_dto_omits_removed() {
        let json = serde_json::to_value(PostDTO::from(row(true))).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "id": 7,
                "content": "hello",
                "likes": 3,
                "created": "2024-05-01T12:30:00",
            })
        );
    }

    #[test]
    fn test_dto_with_removed() {
        let json = serde_json::to_value(PostDTO::with_removed(row(true))).unwrap();

        assert_eq!(json["removed"], true);
        assert_eq!(json["id"], 7);
    }
}
