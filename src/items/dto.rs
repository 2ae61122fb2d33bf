use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::bookings::repo_types::Booking;
use crate::error::{AppError, AppResult};
use crate::items::repo_types::{Comment, Item};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateItemRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub available: Option<bool>,
    pub request_id: Option<i64>,
}

impl CreateItemRequest {
    pub fn validate(&self) -> AppResult<()> {
        if self.name.as_deref().map_or(true, |s| s.trim().is_empty()) {
            return Err(AppError::Validation("name must not be blank".into()));
        }
        if self.description.as_deref().map_or(true, |s| s.trim().is_empty()) {
            return Err(AppError::Validation("description must not be blank".into()));
        }
        if self.available.is_none() {
            return Err(AppError::Validation("available is required".into()));
        }
        Ok(())
    }
}

/// Partial update; absent or blank text fields keep their stored value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateItemRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub available: Option<bool>,
}

impl UpdateItemRequest {
    pub fn apply_to(self, item: &mut Item) {
        if let Some(name) = self.name.filter(|s| !s.trim().is_empty()) {
            item.name = name;
        }
        if let Some(description) = self.description.filter(|s| !s.trim().is_empty()) {
            item.description = description;
        }
        if let Some(available) = self.available {
            item.available = available;
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCommentRequest {
    pub text: String,
}

/// Most relevant past or upcoming approved booking of an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingForItem {
    pub id: i64,
    pub booker_id: i64,
}

impl From<&Booking> for BookingForItem {
    fn from(b: &Booking) -> Self {
        Self {
            id: b.id,
            booker_id: b.booker_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentDto {
    pub id: i64,
    pub text: String,
    pub author_name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created: OffsetDateTime,
}

impl From<Comment> for CommentDto {
    fn from(c: Comment) -> Self {
        Self {
            id: c.id,
            text: c.text,
            author_name: c.author_name,
            created: c.created,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemDto {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub available: bool,
    pub request_id: Option<i64>,
    pub last_booking: Option<BookingForItem>,
    pub next_booking: Option<BookingForItem>,
    pub comments: Vec<CommentDto>,
}

impl ItemDto {
    pub fn annotated(
        item: Item,
        last_booking: Option<BookingForItem>,
        next_booking: Option<BookingForItem>,
        comments: Vec<CommentDto>,
    ) -> Self {
        Self {
            id: item.id,
            name: item.name,
            description: item.description,
            available: item.available,
            request_id: item.request_id,
            last_booking,
            next_booking,
            comments,
        }
    }
}

impl From<Item> for ItemDto {
    fn from(item: Item) -> Self {
        Self::annotated(item, None, None, Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item() -> Item {
        Item {
            id: 1,
            name: "Saw".into(),
            description: "Hand saw".into(),
            available: true,
            owner_id: Some(1),
            request_id: None,
        }
    }

    #[test]
    fn update_skips_blank_and_absent_fields() {
        let mut it = item();
        UpdateItemRequest {
            name: Some("   ".into()),
            description: None,
            available: Some(false),
        }
        .apply_to(&mut it);
        assert_eq!(it.name, "Saw");
        assert_eq!(it.description, "Hand saw");
        assert!(!it.available);

        UpdateItemRequest {
            name: Some("Jigsaw".into()),
            ..Default::default()
        }
        .apply_to(&mut it);
        assert_eq!(it.name, "Jigsaw");
        assert_eq!(it.owner_id, Some(1));
    }

    #[test]
    fn create_requires_all_fields() {
        let ok = CreateItemRequest {
            name: Some("Saw".into()),
            description: Some("Hand saw".into()),
            available: Some(true),
            request_id: None,
        };
        assert!(ok.validate().is_ok());
        let no_flag = CreateItemRequest {
            available: None,
            ..ok.clone()
        };
        assert!(matches!(no_flag.validate(), Err(AppError::Validation(_))));
        let blank = CreateItemRequest {
            name: Some("".into()),
            ..ok
        };
        assert!(matches!(blank.validate(), Err(AppError::Validation(_))));
    }

    #[test]
    fn serializes_camel_case_with_null_annotations() {
        let json = serde_json::to_value(ItemDto::from(item())).unwrap();
        assert_eq!(json["lastBooking"], serde_json::Value::Null);
        assert_eq!(json["requestId"], serde_json::Value::Null);
        assert!(json["comments"].as_array().unwrap().is_empty());
    }
}
