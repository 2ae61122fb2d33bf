use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::actor::ActorContext;
use crate::bookings::repo::BookingStore;
use crate::clock::Clock;
use crate::error::{AppError, AppResult};
use crate::guards;
use crate::items::annotate;
use crate::items::dto::{
    BookingForItem, CommentDto, CreateCommentRequest, CreateItemRequest, ItemDto,
    UpdateItemRequest,
};
use crate::items::repo::{CommentStore, ItemStore};
use crate::items::repo_types::{Item, NewComment, NewItem};
use crate::users::repo::UserStore;
use crate::users::repo_types::User;

/// Item catalogue plus the annotation engine that decorates item views
/// with comments and, for owners, the last and next approved booking.
#[derive(Clone)]
pub struct ItemService {
    users: Arc<dyn UserStore>,
    items: Arc<dyn ItemStore>,
    bookings: Arc<dyn BookingStore>,
    comments: Arc<dyn CommentStore>,
    clock: Arc<dyn Clock>,
}

impl ItemService {
    pub fn new(
        users: Arc<dyn UserStore>,
        items: Arc<dyn ItemStore>,
        bookings: Arc<dyn BookingStore>,
        comments: Arc<dyn CommentStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            users,
            items,
            bookings,
            comments,
            clock,
        }
    }

    async fn load_user(&self, user_id: i64) -> AppResult<User> {
        guards::require_user_exists(self.users.find_by_id(user_id).await?, user_id)
    }

    async fn load_item(&self, item_id: i64) -> AppResult<Item> {
        guards::require_item_exists(self.items.find_by_id(item_id).await?, item_id)
    }

    #[instrument(skip(self, req), fields(actor_id = actor.user_id))]
    pub async fn create_item(
        &self,
        actor: ActorContext,
        req: CreateItemRequest,
    ) -> AppResult<ItemDto> {
        req.validate()?;
        let owner = self.load_user(actor.user_id).await?;
        let item = self
            .items
            .insert(NewItem {
                name: req.name.unwrap_or_default(),
                description: req.description.unwrap_or_default(),
                available: req.available.unwrap_or_default(),
                owner_id: owner.id,
                request_id: req.request_id,
            })
            .await?;
        info!(item_id = item.id, owner_id = owner.id, "item created");
        Ok(item.into())
    }

    #[instrument(skip(self, req), fields(actor_id = actor.user_id))]
    pub async fn update_item(
        &self,
        actor: ActorContext,
        item_id: i64,
        req: UpdateItemRequest,
    ) -> AppResult<ItemDto> {
        let mut item = self.load_item(item_id).await?;
        guards::require_ownership(&item, actor.user_id)?;
        req.apply_to(&mut item);
        self.items.update(&item).await?;
        info!(item_id, "item updated");
        Ok(item.into())
    }

    /// Item view for `actor`. Comments are always attached; last/next
    /// bookings only when the actor owns the item.
    #[instrument(skip(self), fields(actor_id = actor.user_id))]
    pub async fn get_item(&self, actor: ActorContext, item_id: i64) -> AppResult<ItemDto> {
        self.load_user(actor.user_id).await?;
        let item = self.load_item(item_id).await?;

        let comments = self
            .comments
            .list_for_item(item.id)
            .await?
            .into_iter()
            .map(CommentDto::from)
            .collect();

        let (last, next) = if item.owner_id == Some(actor.user_id) {
            let now = self.clock.now();
            let last = self.bookings.last_approved_before(item.id, now).await?;
            let next = self.bookings.next_approved_after(item.id, now).await?;
            (
                last.as_ref().map(BookingForItem::from),
                next.as_ref().map(BookingForItem::from),
            )
        } else {
            (None, None)
        };

        Ok(ItemDto::annotated(item, last, next, comments))
    }

    /// Every item the actor owns, annotated as `get_item` would for the owner,
    /// using three bulk lookups.
    #[instrument(skip(self), fields(actor_id = actor.user_id))]
    pub async fn list_owned(&self, actor: ActorContext) -> AppResult<Vec<ItemDto>> {
        self.load_user(actor.user_id).await?;
        let items = self.items.list_by_owner(actor.user_id).await?;
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let now = self.clock.now();
        let ids: Vec<i64> = items.iter().map(|i| i.id).collect();
        let bookings = self.bookings.approved_for_items(&ids).await?;
        let comments = self.comments.list_for_items(&ids).await?;
        debug!(
            items = ids.len(),
            bookings = bookings.len(),
            comments = comments.len(),
            "annotating owned items"
        );
        Ok(annotate::annotate_owned(items, &bookings, comments, now))
    }

    /// Available items whose name or description contains `text`, ignoring
    /// case. A missing or blank query matches nothing; otherwise the text is
    /// matched as given, surrounding whitespace included.
    #[instrument(skip(self))]
    pub async fn search(&self, text: Option<&str>) -> AppResult<Vec<ItemDto>> {
        let Some(text) = text.filter(|t| !t.trim().is_empty()) else {
            return Ok(Vec::new());
        };
        let items = self.items.search_available(text).await?;
        Ok(items.into_iter().map(ItemDto::from).collect())
    }

    /// Adds a comment if the actor has any booking on the item that ended
    /// before now. The booking's status is not considered.
    #[instrument(skip(self, req), fields(actor_id = actor.user_id))]
    pub async fn add_comment(
        &self,
        actor: ActorContext,
        item_id: i64,
        req: CreateCommentRequest,
    ) -> AppResult<CommentDto> {
        if req.text.trim().is_empty() {
            return Err(AppError::Validation("text must not be blank".into()));
        }
        let author = self.load_user(actor.user_id).await?;
        let item = self.load_item(item_id).await?;

        let now = self.clock.now();
        if !self.bookings.has_finished(author.id, item.id, now).await? {
            warn!(item_id, "comment without completed rental");
            return Err(AppError::Conflict(format!(
                "User {} has not completed a rental of item {}",
                author.id, item.id
            )));
        }

        let saved = self
            .comments
            .insert(NewComment {
                text: req.text,
                item_id: item.id,
                author_id: author.id,
                created: now,
            })
            .await?;
        info!(comment_id = saved.id, item_id, "comment added");
        Ok(saved.into())
    }
}
