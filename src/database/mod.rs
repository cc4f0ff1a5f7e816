// ==================== PERSISTENCE ====================
// Durable side of the entity store. The in-memory object graph is the source
// of truth while the process runs; a backend only loads it at startup and
// receives the pending writes on every save.

mod memory;

pub use memory::MemoryBackend;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::TryStreamExt;
use mongodb::bson::doc;
use mongodb::options::IndexOptions;
use mongodb::{Client, Collection, Database, IndexModel};
use serde::{Deserialize, Serialize};

use crate::models::{Feed, HelpQ, Location, Tag, User};
use crate::utils::AppError;

const USERS: &str = "users";
const FEEDS: &str = "feeds";
const LOCATIONS: &str = "locations";
const TAGS: &str = "tags";
const HELP_Q: &str = "help_q";
const PREFERENCES: &str = "preferences";

const LAST_UPDATED_KEY: &str = "last_updated";

/// Everything a backend holds, as loaded at startup
#[derive(Debug, Default, Clone)]
pub struct StoreSnapshot {
    pub user: Option<User>,
    pub feeds: Vec<Feed>,
    pub locations: Vec<Location>,
    pub tags: Vec<Tag>,
    pub help_q: Vec<HelpQ>,
    pub last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UserWrite {
    Upsert(User),
    Delete,
}

/// Entities changed since the last successful save
#[derive(Debug, Default, Clone)]
pub struct PendingWrites {
    pub user: Option<UserWrite>,
    pub feeds: Vec<Feed>,
    pub locations: Vec<Location>,
    pub tags: Vec<Tag>,
    pub help_q: Vec<HelpQ>,
    pub last_updated: Option<DateTime<Utc>>,
}

impl PendingWrites {
    pub fn len(&self) -> usize {
        self.user.iter().count()
            + self.feeds.len()
            + self.locations.len()
            + self.tags.len()
            + self.help_q.len()
            + self.last_updated.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
pub trait PersistentStore: Send + Sync {
    async fn load_all(&self) -> Result<StoreSnapshot, AppError>;

    /// Upserts every entity in `writes` by its natural key.
    async fn persist(&self, writes: PendingWrites) -> Result<(), AppError>;

    async fn health_check(&self) -> Result<(), AppError> {
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Preference {
    key: String,
    value: DateTime<Utc>,
}

#[derive(Clone)]
pub struct MongoDB {
    db: Database,
}

impl MongoDB {
    pub async fn new(uri: &str) -> Result<Self, AppError> {
        let mut client_options = mongodb::options::ClientOptions::parse(uri).await?;

        // Single device-local writer, a small pool is plenty
        client_options.max_pool_size = Some(4);
        client_options.min_pool_size = Some(1);
        client_options.max_idle_time = Some(std::time::Duration::from_secs(300));

        client_options.connect_timeout = Some(std::time::Duration::from_secs(5));
        client_options.server_selection_timeout = Some(std::time::Duration::from_secs(5));

        let client = Client::with_options(client_options)?;

        // Extract database name from URI or use default
        let db_name = uri
            .rsplit('/')
            .next()
            .and_then(|s| s.split('?').next())
            .filter(|s| !s.is_empty() && !s.contains(':'))
            .unwrap_or("companion");

        let db = client.database(db_name);

        // Test connection
        db.list_collection_names().await?;

        let mongodb = Self { db };

        mongodb.ensure_indexes().await?;

        Ok(mongodb)
    }

    /// Natural keys are unique: feeds(id), locations(name), tags(name), help_q(id)
    async fn ensure_indexes(&self) -> Result<(), AppError> {
        log::info!("🔧 Creating database indexes...");

        let unique_keys = [
            (FEEDS, "id"),
            (LOCATIONS, "name"),
            (TAGS, "name"),
            (HELP_Q, "id"),
            (PREFERENCES, "key"),
        ];

        for (collection_name, key) in unique_keys {
            let collection = self.collection::<mongodb::bson::Document>(collection_name);
            let index = IndexModel::builder()
                .keys(doc! { key: 1 })
                .options(IndexOptions::builder().unique(true).build())
                .build();

            match collection.create_index(index).await {
                Ok(_) => log::info!("   ✅ Index created: {}({})", collection_name, key),
                Err(e) => log::debug!("   ℹ️  Index already exists: {}", e),
            }
        }

        log::info!("✅ Database indexes ready");

        Ok(())
    }

    pub fn collection<T: Send + Sync>(&self, name: &str) -> Collection<T> {
        self.db.collection(name)
    }

    async fn find_all<T>(&self, name: &str) -> Result<Vec<T>, AppError>
    where
        T: serde::de::DeserializeOwned + Send + Sync + Unpin,
    {
        let cursor = self.collection::<T>(name).find(doc! {}).await?;
        Ok(cursor.try_collect().await?)
    }
}

#[async_trait]
impl PersistentStore for MongoDB {
    async fn load_all(&self) -> Result<StoreSnapshot, AppError> {
        let users: Vec<User> = self.find_all(USERS).await?;
        let preferences: Vec<Preference> = self.find_all(PREFERENCES).await?;

        Ok(StoreSnapshot {
            user: users.into_iter().next(),
            feeds: self.find_all(FEEDS).await?,
            locations: self.find_all(LOCATIONS).await?,
            tags: self.find_all(TAGS).await?,
            help_q: self.find_all(HELP_Q).await?,
            last_updated: preferences
                .into_iter()
                .find(|p| p.key == LAST_UPDATED_KEY)
                .map(|p| p.value),
        })
    }

    async fn persist(&self, writes: PendingWrites) -> Result<(), AppError> {
        if writes.is_empty() {
            return Ok(());
        }

        // Writes are idempotent upserts: a partially applied batch is simply
        // written again by the next save.
        match writes.user {
            Some(UserWrite::Upsert(user)) => {
                let users = self.collection::<User>(USERS);
                users.delete_many(doc! { "user_id": { "$ne": user.user_id } }).await?;
                users
                    .replace_one(doc! { "user_id": user.user_id }, &user)
                    .upsert(true)
                    .await?;
            }
            Some(UserWrite::Delete) => {
                self.collection::<User>(USERS).delete_many(doc! {}).await?;
            }
            None => {}
        }

        let feeds = self.collection::<Feed>(FEEDS);
        for feed in &writes.feeds {
            feeds.replace_one(doc! { "id": feed.id }, feed).upsert(true).await?;
        }

        let locations = self.collection::<Location>(LOCATIONS);
        for location in &writes.locations {
            locations
                .replace_one(doc! { "name": &location.name }, location)
                .upsert(true)
                .await?;
        }

        let tags = self.collection::<Tag>(TAGS);
        for tag in &writes.tags {
            tags.replace_one(doc! { "name": &tag.name }, tag).upsert(true).await?;
        }

        let help_q = self.collection::<HelpQ>(HELP_Q);
        for item in &writes.help_q {
            let key = mongodb::bson::to_bson(&item.id)
                .map_err(|e| AppError::DatabaseError(format!("Failed to encode help_q id: {}", e)))?;
            help_q.replace_one(doc! { "id": key }, item).upsert(true).await?;
        }

        if let Some(value) = writes.last_updated {
            let preference = Preference { key: LAST_UPDATED_KEY.to_string(), value };
            self.collection::<Preference>(PREFERENCES)
                .replace_one(doc! { "key": LAST_UPDATED_KEY }, &preference)
                .upsert(true)
                .await?;
        }

        Ok(())
    }

    async fn health_check(&self) -> Result<(), AppError> {
        self.db.list_collection_names().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore] // Requires MongoDB to be running
    async fn test_mongodb_roundtrip() {
        dotenv::dotenv().ok();
        let uri = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "mongodb://localhost:27017/companion_test".to_string());

        let db = MongoDB::new(&uri).await.unwrap();
        assert!(db.health_check().await.is_ok());

        let writes = PendingWrites {
            tags: vec![Tag { name: "HACKATHON".to_string(), feeds: [1].into_iter().collect() }],
            ..Default::default()
        };
        db.persist(writes).await.unwrap();

        let snapshot = db.load_all().await.unwrap();
        assert!(snapshot.tags.iter().any(|t| t.name == "HACKATHON"));
    }

    #[test]
    fn test_pending_writes_len() {
        let mut writes = PendingWrites::default();
        assert!(writes.is_empty());

        writes.user = Some(UserWrite::Delete);
        writes.last_updated = Some(Utc::now());
        assert_eq!(writes.len(), 2);
    }
}
