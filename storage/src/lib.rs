//storage holds the MongoDB quadrant snapshots & point catalogue ingestion

pub mod error;
pub mod ingest;
pub mod models;

pub use error::{Result, StorageError};
pub use ingest::map_points;
pub use models::QuadrantDoc;

use bson::doc;
use futures_util::stream::TryStreamExt;
use log::debug;
use mongodb::options::{ClientOptions, IndexOptions};
use mongodb::{Client, Collection, IndexModel};
use spacemap_core::{ClassifiedField, QuadrantCache, QuadrantKey};

pub struct QuadrantStore {
    col: Collection<QuadrantDoc>,
}

impl QuadrantStore {
    // Connect and make sure (seed, key) is unique
    pub async fn init(uri: &str, db_name: &str, col_name: &str) -> Result<Self> {
        let mut opts = ClientOptions::parse(uri).await?;
        opts.app_name = Some("SpacemapStorage".to_string());
        let client = Client::with_options(opts)?;
        let col = client.database(db_name).collection(col_name);

        let index_model = IndexModel::builder()
            .keys(doc! { "seed": 1, "key": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        col.create_index(index_model).await?;

        Ok(Self { col })
    }

    // Insert or replace the snapshot of one quadrant.
    pub async fn save(
        &self,
        seed: i64,
        key: QuadrantKey,
        quadrant: &ClassifiedField,
    ) -> Result<()> {
        let snapshot = QuadrantDoc::from_quadrant(seed, key, quadrant);
        self.col
            .replace_one(filter(seed, key), snapshot)
            .upsert(true)
            .await?;
        debug!("saved quadrant {key:?} for seed {seed}");
        Ok(())
    }

    pub async fn load(&self, seed: i64, key: QuadrantKey) -> Result<Option<ClassifiedField>> {
        match self.col.find_one(filter(seed, key)).await? {
            Some(found) => Ok(Some(found.into_quadrant()?.1)),
            None => Ok(None),
        }
    }

    // Load a snapshot straight into a cache. Returns false when nothing is stored.
    pub async fn restore_into(&self, cache: &QuadrantCache, key: QuadrantKey) -> Result<bool> {
        let seed = cache.seed();
        match self.load(seed, key).await? {
            Some(quadrant) => {
                cache.adopt(key, quadrant)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    // Stored keys for a seed, ascending.
    pub async fn list_keys(&self, seed: i64) -> Result<Vec<QuadrantKey>> {
        let mut cursor = self.col.find(doc! { "seed": seed }).await?;
        let mut keys = Vec::new();
        while let Some(found) = cursor.try_next().await? {
            keys.push(found.quadrant_key()?);
        }
        keys.sort_unstable();
        Ok(keys)
    }

    pub async fn delete(&self, seed: i64, key: QuadrantKey) -> Result<()> {
        self.col.delete_one(filter(seed, key)).await?;
        Ok(())
    }

    // Delete everything stored for a seed (for clean-up).
    pub async fn delete_seed(&self, seed: i64) -> Result<u64> {
        let res = self.col.delete_many(doc! { "seed": seed }).await?;
        Ok(res.deleted_count)
    }
}

fn filter(seed: i64, key: QuadrantKey) -> bson::Document {
    doc! { "seed": seed, "key": [key[0], key[1], key[2]] }
}
