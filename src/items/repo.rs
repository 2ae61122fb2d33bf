use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;

use crate::items::repo_types::{Comment, Item, NewComment, NewItem};

/// Storage port for items.
#[async_trait]
pub trait ItemStore: Send + Sync {
    async fn find_by_id(&self, id: i64) -> anyhow::Result<Option<Item>>;
    async fn insert(&self, item: NewItem) -> anyhow::Result<Item>;
    async fn update(&self, item: &Item) -> anyhow::Result<()>;
    /// Items owned by `owner_id`, ordered by id.
    async fn list_by_owner(&self, owner_id: i64) -> anyhow::Result<Vec<Item>>;
    /// Available items whose name or description contains `text`, ignoring
    /// case. `text` is expected non-blank.
    async fn search_available(&self, text: &str) -> anyhow::Result<Vec<Item>>;
}

/// Storage port for item comments. Lists are ordered by creation time.
#[async_trait]
pub trait CommentStore: Send + Sync {
    async fn insert(&self, comment: NewComment) -> anyhow::Result<Comment>;
    async fn list_for_item(&self, item_id: i64) -> anyhow::Result<Vec<Comment>>;
    async fn list_for_items(&self, item_ids: &[i64]) -> anyhow::Result<Vec<Comment>>;
}

/// Escapes LIKE metacharacters and wraps `text` for a substring match.
pub(crate) fn like_pattern(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('%');
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}

#[derive(Clone)]
pub struct PgItemStore {
    db: PgPool,
}

impl PgItemStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ItemStore for PgItemStore {
    async fn find_by_id(&self, id: i64) -> anyhow::Result<Option<Item>> {
        let item = sqlx::query_as::<_, Item>(
            r#"
            SELECT id, name, description, available, owner_id, request_id
            FROM items
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find item by id")?;
        Ok(item)
    }

    async fn insert(&self, item: NewItem) -> anyhow::Result<Item> {
        let item = sqlx::query_as::<_, Item>(
            r#"
            INSERT INTO items (name, description, available, owner_id, request_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, name, description, available, owner_id, request_id
            "#,
        )
        .bind(&item.name)
        .bind(&item.description)
        .bind(item.available)
        .bind(item.owner_id)
        .bind(item.request_id)
        .fetch_one(&self.db)
        .await
        .context("insert item")?;
        Ok(item)
    }

    async fn update(&self, item: &Item) -> anyhow::Result<()> {
        // owner_id is immutable and deliberately not written
        sqlx::query(
            r#"
            UPDATE items
               SET name = $2, description = $3, available = $4
             WHERE id = $1
            "#,
        )
        .bind(item.id)
        .bind(&item.name)
        .bind(&item.description)
        .bind(item.available)
        .execute(&self.db)
        .await
        .context("update item")?;
        Ok(())
    }

    async fn list_by_owner(&self, owner_id: i64) -> anyhow::Result<Vec<Item>> {
        let items = sqlx::query_as::<_, Item>(
            r#"
            SELECT id, name, description, available, owner_id, request_id
            FROM items
            WHERE owner_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.db)
        .await
        .context("list items by owner")?;
        Ok(items)
    }

    async fn search_available(&self, text: &str) -> anyhow::Result<Vec<Item>> {
        let items = sqlx::query_as::<_, Item>(
            r#"
            SELECT id, name, description, available, owner_id, request_id
            FROM items
            WHERE available
              AND (name ILIKE $1 ESCAPE '\' OR description ILIKE $1 ESCAPE '\')
            ORDER BY id ASC
            "#,
        )
        .bind(like_pattern(text))
        .fetch_all(&self.db)
        .await
        .context("search items")?;
        Ok(items)
    }
}

const SELECT_COMMENT: &str = r#"
    SELECT c.id, c.text, c.item_id, c.author_id, u.name AS author_name, c.created
      FROM comments c
      JOIN users u ON u.id = c.author_id
"#;

#[derive(Clone)]
pub struct PgCommentStore {
    db: PgPool,
}

impl PgCommentStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CommentStore for PgCommentStore {
    async fn insert(&self, comment: NewComment) -> anyhow::Result<Comment> {
        let saved = sqlx::query_as::<_, Comment>(
            r#"
            WITH inserted AS (
                INSERT INTO comments (text, item_id, author_id, created)
                VALUES ($1, $2, $3, $4)
                RETURNING id, text, item_id, author_id, created
            )
            SELECT c.id, c.text, c.item_id, c.author_id, u.name AS author_name, c.created
              FROM inserted c
              JOIN users u ON u.id = c.author_id
            "#,
        )
        .bind(&comment.text)
        .bind(comment.item_id)
        .bind(comment.author_id)
        .bind(comment.created)
        .fetch_one(&self.db)
        .await
        .context("insert comment")?;
        Ok(saved)
    }

    async fn list_for_item(&self, item_id: i64) -> anyhow::Result<Vec<Comment>> {
        let rows = sqlx::query_as::<_, Comment>(&format!(
            "{SELECT_COMMENT} WHERE c.item_id = $1 ORDER BY c.created ASC, c.id ASC"
        ))
        .bind(item_id)
        .fetch_all(&self.db)
        .await
        .context("list comments for item")?;
        Ok(rows)
    }

    async fn list_for_items(&self, item_ids: &[i64]) -> anyhow::Result<Vec<Comment>> {
        let rows = sqlx::query_as::<_, Comment>(&format!(
            "{SELECT_COMMENT} WHERE c.item_id = ANY($1) ORDER BY c.created ASC, c.id ASC"
        ))
        .bind(item_ids)
        .fetch_all(&self.db)
        .await
        .context("list comments for items")?;
        Ok(rows)
    }
}
