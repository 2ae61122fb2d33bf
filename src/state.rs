use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

use crate::bookings::repo::{BookingStore, PgBookingStore};
use crate::bookings::services::BookingService;
use crate::clock::{self, Clock};
use crate::config::{AppConfig, DatabaseConfig};
use crate::items::repo::{CommentStore, ItemStore, PgCommentStore, PgItemStore};
use crate::items::services::ItemService;
use crate::memory::MemoryStore;
use crate::users::repo::{PgUserStore, UserStore};
use crate::users::services::UserService;

/// The four storage ports every service is built from.
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserStore>,
    pub items: Arc<dyn ItemStore>,
    pub bookings: Arc<dyn BookingStore>,
    pub comments: Arc<dyn CommentStore>,
}

impl Stores {
    pub fn memory() -> Self {
        let store = Arc::new(MemoryStore::new());
        Self {
            users: store.clone(),
            items: store.clone(),
            bookings: store.clone(),
            comments: store,
        }
    }

    pub async fn postgres(cfg: &DatabaseConfig) -> anyhow::Result<Self> {
        let db = PgPoolOptions::new()
            .max_connections(cfg.max_connections)
            .connect(&cfg.url)
            .await
            .context("connect to database")?;

        if cfg.run_migrations {
            if let Err(e) = sqlx::migrate!("./migrations").run(&db).await {
                warn!(error = %e, "migration failed; continuing");
            }
        }

        Ok(Self {
            users: Arc::new(PgUserStore::new(db.clone())),
            items: Arc::new(PgItemStore::new(db.clone())),
            bookings: Arc::new(PgBookingStore::new(db.clone())),
            comments: Arc::new(PgCommentStore::new(db)),
        })
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: UserService,
    pub items: ItemService,
    pub bookings: BookingService,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = AppConfig::from_env()?;
        let stores = match &config.database {
            Some(db) => {
                info!("using postgres store");
                Stores::postgres(db).await?
            }
            None => {
                warn!("DATABASE_URL not set; using in-memory store");
                Stores::memory()
            }
        };
        Ok(Self::from_parts(Arc::new(config), stores, clock::system()))
    }

    pub fn from_parts(config: Arc<AppConfig>, stores: Stores, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            users: UserService::new(stores.users.clone()),
            items: ItemService::new(
                stores.users.clone(),
                stores.items.clone(),
                stores.bookings.clone(),
                stores.comments.clone(),
                clock.clone(),
            ),
            bookings: BookingService::new(stores.users, stores.items, stores.bookings, clock),
        }
    }

    /// In-memory state for tests.
    #[cfg(test)]
    pub fn fake(clock: Arc<dyn Clock>) -> Self {
        let config = Arc::new(AppConfig {
            host: "127.0.0.1".into(),
            port: 0,
            database: None,
        });
        Self::from_parts(config, Stores::memory(), clock)
    }
}
