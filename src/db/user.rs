use aws_sdk_dynamodb::types::AttributeValue;
use serde::{Deserialize, Serialize};
use serde_dynamo::aws_sdk_dynamodb_1::{from_item, to_item};
use uuid::Uuid;

use crate::{credentials::normalize_email, error::AuthError};

use super::DynamoDb;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    #[default]
    Active,
    Locked,
    Inactive,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserTable {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    #[serde(default)]
    pub status: UserStatus,
}

impl DynamoDb {
    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<UserTable>, AuthError> {
        let response = self
            .client
            .query()
            .table_name(&self.users_table)
            .index_name(&self.users_email_index)
            .key_condition_expression("email = :email")
            .expression_attribute_values(":email", AttributeValue::S(email.to_string()))
            .send()
            .await
            .map_err(|e| AuthError::Internal(format!("DynamoDB query user failed: {e}")))?;

        match response.items.and_then(|items| items.into_iter().next()) {
            Some(item) => {
                let user = from_item::<UserTable>(item)
                    .map_err(|e| AuthError::Internal(format!("Failed to deserialize user: {e}")))?;
                Ok(Some(user))
            }
            None => Ok(None),
        }
    }

    pub async fn get_user_by_id(&self, user_id: Uuid) -> Result<Option<UserTable>, AuthError> {
        let response = self
            .client
            .get_item()
            .table_name(&self.users_table)
            .key("id", AttributeValue::S(user_id.to_string()))
            .send()
            .await
            .map_err(|e| AuthError::Internal(format!("DynamoDB get user failed: {e}")))?;

        match response.item {
            Some(item) => {
                let user = from_item::<UserTable>(item)
                    .map_err(|e| AuthError::Internal(format!("Failed to deserialize user: {e}")))?;
                Ok(Some(user))
            }
            None => Ok(None),
        }
    }

    pub async fn insert_user(&self, mut user: UserTable) -> Result<(), AuthError> {
        user.email = normalize_email(&user.email);
        if self.get_user_by_email(&user.email).await?.is_some() {
            return Err(AuthError::Conflict("email already in use".to_string()));
        }

        let item = to_item(&user)
            .map_err(|e| AuthError::Internal(format!("Failed to serialize user: {e}")))?;

        self.client
            .put_item()
            .table_name(&self.users_table)
            .set_item(Some(item))
            .send()
            .await
            .map_err(|e| AuthError::Internal(format!("Failed to insert user: {e}")))?;

        Ok(())
    }
}
