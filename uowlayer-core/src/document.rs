//! Core traits for persisted documents.
//!
//! Every document stored through a repository carries exactly one identity
//! field, serialized as `_id`. The identity type is chosen by the document
//! (integers, strings, UUIDs, object ids, ...).

use bson::{
    Bson, Document as BsonDocument,
    de::deserialize_from_document,
    ser::{serialize_to_bson, serialize_to_document},
};
use serde::{Serialize, de::DeserializeOwned};
use std::fmt::Debug;

use crate::error::{UnitOfWorkError, UnitOfWorkResult};

/// Name of the identity field in the stored representation.
pub const ID_FIELD: &str = "_id";

/// Core trait that all documents handled by a repository must implement.
///
/// The identity field must serialize under [`ID_FIELD`], usually through
/// `#[serde(rename = "_id")]`. The type name feeds the collection name
/// resolver, so two document types sharing a type name share a collection.
///
/// # Example
///
/// ```ignore
/// use uowlayer::document::Document;
/// use serde::{Serialize, Deserialize};
///
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// pub struct Invoice {
///     #[serde(rename = "_id")]
///     pub id: i32,
///     pub total: f64,
/// }
///
/// impl Document for Invoice {
///     type Id = i32;
///
///     fn id(&self) -> &i32 {
///         &self.id
///     }
///
///     fn type_name() -> &'static str {
///         "Invoice"
///     }
/// }
/// ```
pub trait Document: Serialize + DeserializeOwned + Send + Sync + Unpin + Clone + Debug + 'static {
    /// The identity type. Unconstrained beyond being serializable and comparable.
    type Id: Serialize + DeserializeOwned + Clone + Debug + PartialEq + Send + Sync + 'static;

    /// Returns a reference to this document's identity.
    fn id(&self) -> &Self::Id;

    /// Returns the logical type name used to resolve the physical collection name.
    fn type_name() -> &'static str;
}

/// Conversion helpers between documents and their BSON representation.
///
/// Automatically implemented for every [`Document`].
pub trait DocumentExt: Document {
    /// Converts this document to a BSON document for storage.
    fn to_bson_document(&self) -> UnitOfWorkResult<BsonDocument>;

    /// Creates a document from its stored BSON representation.
    fn from_bson_document(document: BsonDocument) -> UnitOfWorkResult<Self>;

    /// Converts the identity of this document to a BSON value.
    fn id_bson(&self) -> UnitOfWorkResult<Bson>;
}

impl<D: Document> DocumentExt for D {
    fn to_bson_document(&self) -> UnitOfWorkResult<BsonDocument> {
        let document = serialize_to_document(self)?;

        if !document.contains_key(ID_FIELD) {
            return Err(UnitOfWorkError::Serialization(format!(
                "{} does not serialize its identity as `{}`",
                D::type_name(),
                ID_FIELD,
            )));
        }

        Ok(document)
    }

    fn from_bson_document(document: BsonDocument) -> UnitOfWorkResult<Self> {
        Ok(deserialize_from_document(document)?)
    }

    fn id_bson(&self) -> UnitOfWorkResult<Bson> {
        Ok(serialize_to_bson(self.id())?)
    }
}
