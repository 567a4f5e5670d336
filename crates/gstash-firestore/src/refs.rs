//! Collection and document handles.

use std::collections::HashMap;

use crate::client::FirestoreClient;
use crate::error::FirestoreResult;
use crate::types::{Document, ListDocumentsResponse, Value};

/// Page size used when listing a whole collection.
const LIST_PAGE_SIZE: u32 = 300;

/// Handle to a collection. Cheap to clone; performs no I/O until used.
#[derive(Clone)]
pub struct CollectionRef {
    client: FirestoreClient,
    name: String,
}

impl CollectionRef {
    pub(crate) fn new(client: FirestoreClient, name: String) -> Self {
        Self { client, name }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Handle to a document in this collection.
    pub fn doc(&self, key: impl Into<String>) -> DocumentRef {
        DocumentRef::new(self.client.clone(), self.name.clone(), key.into())
    }

    /// One page of documents.
    pub async fn list_page(
        &self,
        page_size: Option<u32>,
        page_token: Option<&str>,
    ) -> FirestoreResult<ListDocumentsResponse> {
        self.client
            .list_documents(&self.name, page_size, page_token)
            .await
    }

    /// Every document in the collection, following page tokens.
    pub async fn list(&self) -> FirestoreResult<Vec<Document>> {
        let mut documents = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page = self
                .list_page(Some(LIST_PAGE_SIZE), page_token.as_deref())
                .await?;
            documents.extend(page.documents.unwrap_or_default());

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(documents)
    }
}

/// Handle to one document.
#[derive(Clone)]
pub struct DocumentRef {
    client: FirestoreClient,
    collection: String,
    id: String,
}

impl DocumentRef {
    pub(crate) fn new(client: FirestoreClient, collection: String, id: String) -> Self {
        Self {
            client,
            collection,
            id,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// `collection/id`
    pub fn path(&self) -> String {
        format!("{}/{}", self.collection, self.id)
    }

    pub async fn get(&self) -> FirestoreResult<Option<Document>> {
        self.client.get_document(&self.collection, &self.id).await
    }

    pub async fn create(&self, fields: HashMap<String, Value>) -> FirestoreResult<Document> {
        self.client
            .create_document(&self.collection, &self.id, fields)
            .await
    }

    pub async fn set(&self, fields: HashMap<String, Value>) -> FirestoreResult<Document> {
        self.client
            .set_document(&self.collection, &self.id, fields)
            .await
    }

    pub async fn update(&self, fields: HashMap<String, Value>) -> FirestoreResult<Document> {
        self.client
            .update_document(&self.collection, &self.id, fields)
            .await
    }

    pub async fn delete(&self) -> FirestoreResult<()> {
        self.client.delete_document(&self.collection, &self.id).await
    }
}
