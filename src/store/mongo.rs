//! MongoDB-backed location store.

use futures::TryStreamExt;
use mongodb::{
    bson::{doc, Bson, Document},
    Client, Collection, Database,
};
use tracing::info;

use super::LocationStore;
use crate::config::StoreConfig;
use crate::error::Result;

/// Handle on the location collection. Cheap to clone; the driver pools connections.
#[derive(Clone)]
pub struct MongoStore {
    database: Database,
    collection: Collection<Document>,
}

impl MongoStore {
    /// Connect to the store at `uri`
    pub async fn connect(uri: &str, database: &str, collection: &str) -> Result<Self> {
        info!("Connecting to MongoDB at {}", uri);
        let client = Client::with_uri_str(uri).await?;
        Ok(Self::from_client(&client, database, collection))
    }

    pub async fn from_config(config: &StoreConfig) -> Result<Self> {
        Self::connect(&config.uri, &config.database, &config.collection).await
    }

    /// Use an existing client; no round trip is made
    pub fn from_client(client: &Client, database: &str, collection: &str) -> Self {
        let database = client.database(database);
        let collection = database.collection::<Document>(collection);
        Self {
            database,
            collection,
        }
    }

    pub fn collection_name(&self) -> &str {
        self.collection.name()
    }

    /// Check if the server answers a ping
    pub async fn health_check(&self) -> Result<bool> {
        let reply = self.database.run_command(doc! { "ping": 1 }).await?;
        Ok(match reply.get("ok") {
            Some(Bson::Double(ok)) => *ok == 1.0,
            Some(Bson::Int32(ok)) => *ok == 1,
            _ => false,
        })
    }

    /// Estimated number of records in the collection
    pub async fn doc_count(&self) -> Result<u64> {
        Ok(self.collection.estimated_document_count().await?)
    }
}

impl LocationStore for MongoStore {
    async fn find(&self, filter: Document) -> Result<Vec<Document>> {
        // The cursor is killed on drop, so a cancelled drain leaves nothing open
        let cursor = self.collection.find(filter).await?;
        Ok(cursor.try_collect().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GeoQueryError;

    // Nothing listens on port 1; server selection gives up quickly
    const UNREACHABLE: &str = "mongodb://127.0.0.1:1/?serverSelectionTimeoutMS=200&connectTimeoutMS=200";

    #[tokio::test]
    async fn test_from_client_names_collection() {
        let client = Client::with_uri_str(UNREACHABLE).await.unwrap();
        let store = MongoStore::from_client(&client, "GIS", "location");
        assert_eq!(store.collection_name(), "location");
    }

    #[tokio::test]
    async fn test_unreachable_server_fails_startup_checks() {
        let store = MongoStore::connect(UNREACHABLE, "GIS", "location")
            .await
            .unwrap();

        assert!(matches!(
            store.health_check().await,
            Err(GeoQueryError::Store(_))
        ));
        assert!(matches!(store.doc_count().await, Err(GeoQueryError::Store(_))));
        assert!(matches!(
            store.find(doc! {}).await,
            Err(GeoQueryError::Store(_))
        ));
    }
}
