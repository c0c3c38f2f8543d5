//! Model definitions and their per-connection registration.

pub mod account;
pub mod tenant;

use bson::{Document, doc};
use mongodb::options::IndexOptions;
use mongodb::{Collection, IndexModel};
use tracing::{debug, info};

use super::connection::Connection;
use super::error::DatabaseError;

pub use account::{Account, GLOBAL_MODELS};
pub use tenant::TENANT_MODELS;

/// A named schema and the collection it lives in.
#[derive(Debug)]
pub struct ModelDefinition {
    pub name: &'static str,
    pub collection: &'static str,
    pub indexes: &'static [IndexSpec],
}

#[derive(Debug)]
pub struct IndexSpec {
    /// Field name and direction (1 ascending, -1 descending).
    pub keys: &'static [(&'static str, i32)],
    pub unique: bool,
}

impl IndexSpec {
    fn keys_document(&self) -> Document {
        let mut keys = Document::new();
        for (field, direction) in self.keys {
            keys.insert(*field, *direction);
        }
        keys
    }
}

/// Queryable handle for one model on one connection.
#[derive(Debug, Clone)]
pub struct Model {
    name: &'static str,
    collection_name: &'static str,
    connection_id: u64,
    collection: Option<Collection<Document>>,
}

impl Model {
    pub(crate) fn new(
        definition: &'static ModelDefinition,
        connection_id: u64,
        collection: Option<Collection<Document>>,
    ) -> Self {
        Self {
            name: definition.name,
            collection_name: definition.collection,
            connection_id,
            collection,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn collection_name(&self) -> &'static str {
        self.collection_name
    }

    /// Id of the connection this model was bound on.
    pub fn connection_id(&self) -> u64 {
        self.connection_id
    }

    pub fn collection(&self) -> Result<Collection<Document>, DatabaseError> {
        self.collection
            .clone()
            .ok_or_else(|| DatabaseError::NotReady(self.name.to_string()))
    }

    pub fn typed<T>(&self) -> Result<Collection<T>, DatabaseError> {
        Ok(self.collection()?.clone_with_type::<T>())
    }
}

/// Binds a fixed set of model definitions onto connections.
#[derive(Debug, Clone, Copy)]
pub struct ModelRegistrar {
    set: &'static [ModelDefinition],
}

impl ModelRegistrar {
    /// Registrar for tenant connections.
    pub fn tenant() -> Self {
        Self { set: TENANT_MODELS }
    }

    /// Registrar for the global account directory.
    pub fn global() -> Self {
        Self { set: GLOBAL_MODELS }
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> {
        self.set.iter().map(|definition| definition.name)
    }

    fn definition(&self, name: &str) -> Option<&'static ModelDefinition> {
        self.set.iter().find(|definition| definition.name == name)
    }

    /// Bind every model in the set that is not yet bound on `connection`.
    /// Returns how many were newly bound; already-bound names are skipped.
    pub async fn register_all(&self, connection: &Connection) -> usize {
        let mut bound = 0;
        for definition in self.set {
            let (_, newly_bound) = connection.bind_model(definition).await;
            if newly_bound {
                bound += 1;
            }
        }
        debug!(tenant = %connection.key(), bound, "Registered models");
        bound
    }

    /// Fetch a bound model, binding it on demand if `register_all` has not run.
    pub async fn get_model(&self, connection: &Connection, name: &str) -> Result<Model, DatabaseError> {
        if let Some(model) = connection.bound_model(name).await {
            return Ok(model);
        }
        let definition = self
            .definition(name)
            .ok_or_else(|| DatabaseError::UnknownModel(name.to_string()))?;
        let (model, _) = connection.bind_model(definition).await;
        Ok(model)
    }

    /// Create declared indexes. Connections without a driver are skipped.
    pub async fn sync_indexes(&self, connection: &Connection) -> Result<usize, DatabaseError> {
        if connection.database().is_err() {
            return Ok(0);
        }

        let mut created = 0;
        for definition in self.set {
            let collection = self.get_model(connection, definition.name).await?.collection()?;
            for index in definition.indexes {
                let options = IndexOptions::builder().unique(index.unique).build();
                let model = IndexModel::builder()
                    .keys(index.keys_document())
                    .options(options)
                    .build();
                collection.create_index(model, None).await?;
                created += 1;
            }
        }
        info!(tenant = %connection.key(), database = %connection.database_name(), created, "Synced indexes");
        Ok(created)
    }
}

impl Default for ModelRegistrar {
    fn default() -> Self {
        Self::tenant()
    }
}

/// Filter matching a document by its `_id`.
pub fn by_id(id: bson::oid::ObjectId) -> Document {
    doc! { "_id": id }
}
