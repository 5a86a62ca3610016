use aws_sdk_dynamodb::types::AttributeValue;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AuthError;

use super::DynamoDb;

/// A registered application allowed to request tokens.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientTable {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    /// Hex-encoded SHA-256 of the client secret. Public clients have none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_hash: Option<String>,
}

impl ClientTable {
    pub fn new_public(slug: &str, name: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            slug: slug.to_string(),
            name: name.to_string(),
            secret_hash: None,
        }
    }
}

impl DynamoDb {
    pub async fn get_client_by_slug(&self, slug: &str) -> Result<Option<ClientTable>, AuthError> {
        let response = self
            .client
            .get_item()
            .table_name(&self.clients_table)
            .key("slug", AttributeValue::S(slug.to_string()))
            .send()
            .await
            .map_err(|e| AuthError::Internal(format!("DynamoDB get client failed: {e}")))?;

        match response.item {
            Some(item) => {
                let client = serde_dynamo::aws_sdk_dynamodb_1::from_item::<ClientTable>(item)
                    .map_err(|e| {
                        AuthError::Internal(format!("Failed to deserialize client: {e}"))
                    })?;
                Ok(Some(client))
            }
            None => Ok(None),
        }
    }

    pub async fn insert_client(&self, client: ClientTable) -> Result<(), AuthError> {
        let item = serde_dynamo::aws_sdk_dynamodb_1::to_item(&client)
            .map_err(|e| AuthError::Internal(format!("Failed to serialize client: {e}")))?;

        self.client
            .put_item()
            .table_name(&self.clients_table)
            .set_item(Some(item))
            .condition_expression("attribute_not_exists(slug)")
            .send()
            .await
            .map_err(|e| AuthError::Internal(format!("Failed to insert client: {e}")))?;

        Ok(())
    }
}
