//! In-process implementation of every storage port.
//!
//! Used when no `DATABASE_URL` is configured and by the test suites. Tables
//! live behind one `RwLock`, so each port call observes a consistent
//! snapshot and writes to a record are serialized.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use crate::bookings::repo::BookingStore;
use crate::bookings::repo_types::{BookedItem, Booking, BookingFilter, BookingStatus, NewBooking};
use crate::items::repo::{CommentStore, ItemStore};
use crate::items::repo_types::{Comment, Item, NewComment, NewItem};
use crate::pagination::{PageRequest, SortDirection};
use crate::users::repo::{EmailTaken, UserStore};
use crate::users::repo_types::{NewUser, User};

#[derive(Debug, Clone)]
struct BookingEntry {
    id: i64,
    start: OffsetDateTime,
    end: OffsetDateTime,
    status: BookingStatus,
    item_id: i64,
    booker_id: i64,
}

#[derive(Debug, Clone)]
struct CommentEntry {
    id: i64,
    text: String,
    item_id: i64,
    author_id: i64,
    created: OffsetDateTime,
}

#[derive(Debug, Default)]
struct Tables {
    users: BTreeMap<i64, User>,
    items: BTreeMap<i64, Item>,
    bookings: BTreeMap<i64, BookingEntry>,
    comments: BTreeMap<i64, CommentEntry>,
    last_id: i64,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    fn email_holder(&self, email: &str) -> Option<i64> {
        let email = email.to_lowercase();
        self.users
            .values()
            .find(|u| u.email.to_lowercase() == email)
            .map(|u| u.id)
    }

    fn booking(&self, entry: &BookingEntry) -> anyhow::Result<Booking> {
        let item = self
            .items
            .get(&entry.item_id)
            .ok_or_else(|| anyhow!("booking {} references missing item {}", entry.id, entry.item_id))?;
        let owner_id = item
            .owner_id
            .ok_or_else(|| anyhow!("item {} has no owner", item.id))?;
        Ok(Booking {
            id: entry.id,
            start: entry.start,
            end: entry.end,
            status: entry.status,
            item: BookedItem {
                id: item.id,
                name: item.name.clone(),
                owner_id,
            },
            booker_id: entry.booker_id,
        })
    }

    fn bookings_where<F>(&self, pred: F) -> anyhow::Result<Vec<Booking>>
    where
        F: Fn(&Booking) -> bool,
    {
        let mut out = Vec::new();
        for entry in self.bookings.values() {
            let booking = self.booking(entry)?;
            if pred(&booking) {
                out.push(booking);
            }
        }
        Ok(out)
    }

    fn comment(&self, entry: &CommentEntry) -> anyhow::Result<Comment> {
        let author = self
            .users
            .get(&entry.author_id)
            .ok_or_else(|| anyhow!("comment {} references missing user {}", entry.id, entry.author_id))?;
        Ok(Comment {
            id: entry.id,
            text: entry.text.clone(),
            item_id: entry.item_id,
            author_id: entry.author_id,
            author_name: author.name.clone(),
            created: entry.created,
        })
    }

    fn comments_where<F>(&self, pred: F) -> anyhow::Result<Vec<Comment>>
    where
        F: Fn(&CommentEntry) -> bool,
    {
        let mut out = self
            .comments
            .values()
            .filter(|c| pred(c))
            .map(|c| self.comment(c))
            .collect::<anyhow::Result<Vec<_>>>()?;
        out.sort_by(|a, b| a.created.cmp(&b.created).then(a.id.cmp(&b.id)));
        Ok(out)
    }
}

fn paginate(mut bookings: Vec<Booking>, page: PageRequest) -> Vec<Booking> {
    bookings.sort_by(|a, b| {
        let ord = a.start.cmp(&b.start).then(a.id.cmp(&b.id));
        match page.direction {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        }
    });
    bookings
        .into_iter()
        .skip(page.offset.max(0) as usize)
        .take(page.limit.max(0) as usize)
        .collect()
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrites a booking's status without any guard. Test seeding only.
    #[cfg(test)]
    pub async fn force_status(&self, id: i64, status: BookingStatus) {
        if let Some(entry) = self.tables.write().await.bookings.get_mut(&id) {
            entry.status = status;
        }
    }

    /// Clears an item's owner to simulate a malformed record.
    #[cfg(test)]
    pub async fn drop_owner(&self, item_id: i64) {
        if let Some(item) = self.tables.write().await.items.get_mut(&item_id) {
            item.owner_id = None;
        }
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_by_id(&self, id: i64) -> anyhow::Result<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let email = email.to_lowercase();
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.email.to_lowercase() == email)
            .cloned())
    }

    async fn list(&self) -> anyhow::Result<Vec<User>> {
        Ok(self.tables.read().await.users.values().cloned().collect())
    }

    async fn insert(&self, user: NewUser) -> anyhow::Result<User> {
        let mut tables = self.tables.write().await;
        if tables.email_holder(&user.email).is_some() {
            return Err(EmailTaken(user.email).into());
        }
        let id = tables.next_id();
        let user = User {
            id,
            name: user.name,
            email: user.email,
        };
        tables.users.insert(id, user.clone());
        Ok(user)
    }

    async fn update(&self, user: &User) -> anyhow::Result<()> {
        let mut tables = self.tables.write().await;
        if tables.email_holder(&user.email).is_some_and(|id| id != user.id) {
            return Err(EmailTaken(user.email.clone()).into());
        }
        match tables.users.get_mut(&user.id) {
            Some(slot) => {
                *slot = user.clone();
                Ok(())
            }
            None => Err(anyhow!("user {} vanished before update", user.id)),
        }
    }

    async fn delete(&self, id: i64) -> anyhow::Result<bool> {
        let mut tables = self.tables.write().await;
        if tables.users.remove(&id).is_none() {
            return Ok(false);
        }
        // cascade like the relational schema
        let owned: Vec<i64> = tables
            .items
            .values()
            .filter(|i| i.owner_id == Some(id))
            .map(|i| i.id)
            .collect();
        tables.items.retain(|_, i| i.owner_id != Some(id));
        tables
            .bookings
            .retain(|_, b| b.booker_id != id && !owned.contains(&b.item_id));
        tables
            .comments
            .retain(|_, c| c.author_id != id && !owned.contains(&c.item_id));
        Ok(true)
    }
}

#[async_trait]
impl ItemStore for MemoryStore {
    async fn find_by_id(&self, id: i64) -> anyhow::Result<Option<Item>> {
        Ok(self.tables.read().await.items.get(&id).cloned())
    }

    async fn insert(&self, item: NewItem) -> anyhow::Result<Item> {
        let mut tables = self.tables.write().await;
        let id = tables.next_id();
        let item = Item {
            id,
            name: item.name,
            description: item.description,
            available: item.available,
            owner_id: Some(item.owner_id),
            request_id: item.request_id,
        };
        tables.items.insert(id, item.clone());
        Ok(item)
    }

    async fn update(&self, item: &Item) -> anyhow::Result<()> {
        let mut tables = self.tables.write().await;
        let slot = tables
            .items
            .get_mut(&item.id)
            .ok_or_else(|| anyhow!("item {} vanished before update", item.id))?;
        slot.name = item.name.clone();
        slot.description = item.description.clone();
        slot.available = item.available;
        Ok(())
    }

    async fn list_by_owner(&self, owner_id: i64) -> anyhow::Result<Vec<Item>> {
        let tables = self.tables.read().await;
        Ok(tables
            .items
            .values()
            .filter(|i| i.owner_id == Some(owner_id))
            .cloned()
            .collect())
    }

    async fn search_available(&self, text: &str) -> anyhow::Result<Vec<Item>> {
        let needle = text.to_lowercase();
        let tables = self.tables.read().await;
        Ok(tables
            .items
            .values()
            .filter(|i| i.available)
            .filter(|i| {
                i.name.to_lowercase().contains(&needle)
                    || i.description.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect())
    }
}

#[async_trait]
impl BookingStore for MemoryStore {
    async fn find_by_id(&self, id: i64) -> anyhow::Result<Option<Booking>> {
        let tables = self.tables.read().await;
        tables.bookings.get(&id).map(|b| tables.booking(b)).transpose()
    }

    async fn insert(&self, booking: NewBooking) -> anyhow::Result<Booking> {
        let mut tables = self.tables.write().await;
        if !tables.items.contains_key(&booking.item_id) {
            return Err(anyhow!("item {} does not exist", booking.item_id));
        }
        let id = tables.next_id();
        let entry = BookingEntry {
            id,
            start: booking.start,
            end: booking.end,
            status: BookingStatus::Waiting,
            item_id: booking.item_id,
            booker_id: booking.booker_id,
        };
        let out = tables.booking(&entry)?;
        tables.bookings.insert(id, entry);
        Ok(out)
    }

    async fn update_status(
        &self,
        id: i64,
        from: BookingStatus,
        to: BookingStatus,
    ) -> anyhow::Result<Option<Booking>> {
        let mut tables = self.tables.write().await;
        let entry = match tables.bookings.get_mut(&id) {
            Some(e) if e.status == from => {
                e.status = to;
                e.clone()
            }
            _ => return Ok(None),
        };
        tables.booking(&entry).map(Some)
    }

    async fn first_waiting_for_owner(&self, owner_id: i64) -> anyhow::Result<Option<Booking>> {
        let tables = self.tables.read().await;
        // BTreeMap iteration is id-ordered, so the first hit is the lowest id
        let all = tables.bookings_where(|b| {
            b.item.owner_id == owner_id && b.status == BookingStatus::Waiting
        })?;
        Ok(all.into_iter().next())
    }

    async fn list_by_booker(
        &self,
        booker_id: i64,
        filter: BookingFilter,
        page: PageRequest,
    ) -> anyhow::Result<Vec<Booking>> {
        let tables = self.tables.read().await;
        let hits = tables.bookings_where(|b| b.booker_id == booker_id && filter.matches(b))?;
        Ok(paginate(hits, page))
    }

    async fn list_by_owner(
        &self,
        owner_id: i64,
        filter: BookingFilter,
        page: PageRequest,
    ) -> anyhow::Result<Vec<Booking>> {
        let tables = self.tables.read().await;
        let hits = tables.bookings_where(|b| b.item.owner_id == owner_id && filter.matches(b))?;
        Ok(paginate(hits, page))
    }

    async fn last_approved_before(
        &self,
        item_id: i64,
        now: OffsetDateTime,
    ) -> anyhow::Result<Option<Booking>> {
        let tables = self.tables.read().await;
        let hits = tables.bookings_where(|b| {
            b.item.id == item_id && b.status == BookingStatus::Approved && b.start < now
        })?;
        // greatest start, lowest id on ties
        Ok(hits
            .into_iter()
            .max_by(|a, b| a.start.cmp(&b.start).then(b.id.cmp(&a.id))))
    }

    async fn next_approved_after(
        &self,
        item_id: i64,
        now: OffsetDateTime,
    ) -> anyhow::Result<Option<Booking>> {
        let tables = self.tables.read().await;
        let hits = tables.bookings_where(|b| {
            b.item.id == item_id && b.status == BookingStatus::Approved && b.start > now
        })?;
        Ok(hits
            .into_iter()
            .min_by(|a, b| a.start.cmp(&b.start).then(a.id.cmp(&b.id))))
    }

    async fn approved_for_items(&self, item_ids: &[i64]) -> anyhow::Result<Vec<Booking>> {
        let tables = self.tables.read().await;
        tables.bookings_where(|b| {
            b.status == BookingStatus::Approved && item_ids.contains(&b.item.id)
        })
    }

    async fn has_finished(
        &self,
        booker_id: i64,
        item_id: i64,
        now: OffsetDateTime,
    ) -> anyhow::Result<bool> {
        let tables = self.tables.read().await;
        Ok(tables
            .bookings
            .values()
            .any(|b| b.booker_id == booker_id && b.item_id == item_id && b.end < now))
    }
}

#[async_trait]
impl CommentStore for MemoryStore {
    async fn insert(&self, comment: NewComment) -> anyhow::Result<Comment> {
        let mut tables = self.tables.write().await;
        let id = tables.next_id();
        let entry = CommentEntry {
            id,
            text: comment.text,
            item_id: comment.item_id,
            author_id: comment.author_id,
            created: comment.created,
        };
        let out = tables.comment(&entry)?;
        tables.comments.insert(id, entry);
        Ok(out)
    }

    async fn list_for_item(&self, item_id: i64) -> anyhow::Result<Vec<Comment>> {
        self.tables
            .read()
            .await
            .comments_where(|c| c.item_id == item_id)
    }

    async fn list_for_items(&self, item_ids: &[i64]) -> anyhow::Result<Vec<Comment>> {
        self.tables
            .read()
            .await
            .comments_where(|c| item_ids.contains(&c.item_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    async fn seed(store: &MemoryStore) -> (User, Item) {
        let owner = UserStore::insert(
            store,
            NewUser {
                name: "Owner".into(),
                email: "owner@example.com".into(),
            },
        )
        .await
        .unwrap();
        let item = ItemStore::insert(
            store,
            NewItem {
                name: "Drill".into(),
                description: "Cordless".into(),
                available: true,
                owner_id: owner.id,
                request_id: None,
            },
        )
        .await
        .unwrap();
        (owner, item)
    }

    #[tokio::test]
    async fn conditional_update_only_applies_from_expected_status() {
        let store = MemoryStore::new();
        let (owner, item) = seed(&store).await;
        let booking = BookingStore::insert(
            &store,
            NewBooking {
                item_id: item.id,
                booker_id: owner.id,
                start: datetime!(2026-05-01 10:00 UTC),
                end: datetime!(2026-05-02 10:00 UTC),
            },
        )
        .await
        .unwrap();
        assert_eq!(booking.status, BookingStatus::Waiting);
        assert_eq!(booking.item.owner_id, owner.id);

        let first = store
            .update_status(booking.id, BookingStatus::Waiting, BookingStatus::Approved)
            .await
            .unwrap();
        assert_eq!(first.map(|b| b.status), Some(BookingStatus::Approved));

        let second = store
            .update_status(booking.id, BookingStatus::Waiting, BookingStatus::Rejected)
            .await
            .unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn paginates_by_start_in_requested_direction() {
        let store = MemoryStore::new();
        let (owner, item) = seed(&store).await;
        for day in 1..=5u8 {
            let start = datetime!(2026-05-01 10:00 UTC) + time::Duration::days(day as i64);
            BookingStore::insert(
                &store,
                NewBooking {
                    item_id: item.id,
                    booker_id: owner.id,
                    start,
                    end: start + time::Duration::hours(2),
                },
            )
            .await
            .unwrap();
        }

        let page = PageRequest {
            limit: 2,
            offset: 1,
            direction: SortDirection::Desc,
        };
        let got = store
            .list_by_booker(owner.id, BookingFilter::All, page)
            .await
            .unwrap();
        assert_eq!(got.len(), 2);
        assert_eq!(got[0].start, datetime!(2026-05-05 10:00 UTC));
        assert_eq!(got[1].start, datetime!(2026-05-04 10:00 UTC));
    }

    #[tokio::test]
    async fn email_lookup_ignores_case() {
        let store = MemoryStore::new();
        seed(&store).await;
        let found = store.find_by_email("OWNER@Example.com").await.unwrap();
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn insert_and_update_refuse_a_taken_email() {
        let store = MemoryStore::new();
        let (owner, _) = seed(&store).await;
        let err = UserStore::insert(
            &store,
            NewUser {
                name: "Copy".into(),
                email: "OWNER@example.com".into(),
            },
        )
        .await
        .unwrap_err();
        assert!(err.downcast_ref::<EmailTaken>().is_some());

        let other = UserStore::insert(
            &store,
            NewUser {
                name: "Other".into(),
                email: "other@example.com".into(),
            },
        )
        .await
        .unwrap();
        let stolen = User {
            email: owner.email.clone(),
            ..other
        };
        let err = UserStore::update(&store, &stolen).await.unwrap_err();
        assert!(err.downcast_ref::<EmailTaken>().is_some());
        UserStore::update(&store, &owner).await.unwrap();
    }
}
