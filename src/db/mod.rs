pub mod access_token;
pub mod client;
pub mod memory;
pub mod refresh_token;
pub mod user;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;
use serde::{de::DeserializeOwned, Serialize};
use uuid::Uuid;

use crate::{config::Config, error::AuthError};

use self::access_token::AccessTokenTable;
use self::client::ClientTable;
use self::refresh_token::RefreshTokenTable;
use self::user::UserTable;

/// Repository interface over the four record kinds the token service touches.
///
/// Every `destroy_expired_*` call removes the rows whose `expires` is not
/// after `now` and reports how many were removed. `add_user` stores the email
/// normalized, so `find_user_by_email` expects a normalized key.
#[async_trait]
pub trait Database: Send + Sync {
    // Client operations
    async fn find_client_by_slug(&self, slug: &str) -> Result<Option<ClientTable>, AuthError>;
    async fn add_client(&self, client: ClientTable) -> Result<(), AuthError>;

    // User operations
    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserTable>, AuthError>;
    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<UserTable>, AuthError>;
    async fn add_user(&self, user: UserTable) -> Result<(), AuthError>;

    // Access token operations
    async fn find_access_token(&self, token: &str)
        -> Result<Option<AccessTokenTable>, AuthError>;
    async fn add_access_token(&self, token: &AccessTokenTable) -> Result<(), AuthError>;
    async fn edit_access_token_expires(&self, token: &str, expires: i64)
        -> Result<(), AuthError>;
    async fn destroy_expired_access_tokens(&self, now: i64) -> Result<usize, AuthError>;

    // Refresh token operations
    async fn find_refresh_token(
        &self,
        token: &str,
    ) -> Result<Option<RefreshTokenTable>, AuthError>;
    async fn add_refresh_token(&self, token: &RefreshTokenTable) -> Result<(), AuthError>;
    async fn edit_refresh_token_expires(
        &self,
        token: &str,
        expires: i64,
    ) -> Result<(), AuthError>;
    async fn destroy_expired_refresh_tokens(&self, now: i64) -> Result<usize, AuthError>;
}

/// DynamoDB-backed storage for production use.
#[derive(Clone)]
pub struct DynamoDb {
    pub(crate) client: aws_sdk_dynamodb::Client,
    pub clients_table: String,
    pub users_table: String,
    pub users_email_index: String,
    pub access_tokens_table: String,
    pub refresh_tokens_table: String,
}

// Both token tables share the same key (`token`) and expiry attribute
// (`expires`), so the item plumbing lives here once.
impl DynamoDb {
    pub(crate) async fn get_token_item<T: DeserializeOwned>(
        &self,
        table: &str,
        token: &str,
    ) -> Result<Option<T>, AuthError> {
        let response = self
            .client
            .get_item()
            .table_name(table)
            .key("token", AttributeValue::S(token.to_string()))
            .send()
            .await
            .map_err(|e| AuthError::Internal(format!("DynamoDB get from {table} failed: {e}")))?;

        match response.item {
            Some(item) => {
                let record = serde_dynamo::aws_sdk_dynamodb_1::from_item::<T>(item).map_err(
                    |e| AuthError::Internal(format!("Failed to deserialize {table} item: {e}")),
                )?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    pub(crate) async fn put_token_item<T: Serialize>(
        &self,
        table: &str,
        record: &T,
    ) -> Result<(), AuthError> {
        let item = serde_dynamo::aws_sdk_dynamodb_1::to_item(record)
            .map_err(|e| AuthError::Internal(format!("Failed to serialize {table} item: {e}")))?;

        self.client
            .put_item()
            .table_name(table)
            .set_item(Some(item))
            .condition_expression("attribute_not_exists(#token)")
            .expression_attribute_names("#token", "token")
            .send()
            .await
            .map_err(|e| AuthError::Internal(format!("Failed to insert into {table}: {e}")))?;

        Ok(())
    }

    pub(crate) async fn update_token_expires(
        &self,
        table: &str,
        token: &str,
        expires: i64,
    ) -> Result<(), AuthError> {
        self.client
            .update_item()
            .table_name(table)
            .key("token", AttributeValue::S(token.to_string()))
            .update_expression("SET #expires = :expires")
            .condition_expression("attribute_exists(#token)")
            .expression_attribute_names("#expires", "expires")
            .expression_attribute_names("#token", "token")
            .expression_attribute_values(":expires", AttributeValue::N(expires.to_string()))
            .send()
            .await
            .map_err(|e| AuthError::Internal(format!("Failed to update expiry in {table}: {e}")))?;

        Ok(())
    }

    pub(crate) async fn delete_expired_token_items(
        &self,
        table: &str,
        now: i64,
    ) -> Result<usize, AuthError> {
        let mut deleted = 0;
        let mut start_key: Option<HashMap<String, AttributeValue>> = None;

        loop {
            let page = self
                .client
                .scan()
                .table_name(table)
                .filter_expression("#expires <= :now")
                .projection_expression("#token")
                .expression_attribute_names("#expires", "expires")
                .expression_attribute_names("#token", "token")
                .expression_attribute_values(":now", AttributeValue::N(now.to_string()))
                .set_exclusive_start_key(start_key)
                .send()
                .await
                .map_err(|e| AuthError::Internal(format!("DynamoDB scan of {table} failed: {e}")))?;

            for item in page.items.unwrap_or_default() {
                let Some(AttributeValue::S(token)) = item.get("token") else {
                    continue;
                };

                match self.delete_expired_token_item(table, token, now).send().await {
                    Ok(_) => deleted += 1,
                    Err(e) => {
                        let service_err = e.into_service_error();
                        // Rewritten with a later expiry since the scan; keep it.
                        if !service_err.is_conditional_check_failed_exception() {
                            return Err(AuthError::Internal(format!(
                                "Failed to delete from {table}: {service_err}"
                            )));
                        }
                    }
                }
            }

            start_key = page.last_evaluated_key;
            if start_key.is_none() {
                break;
            }
        }

        Ok(deleted)
    }

    fn delete_expired_token_item(
        &self,
        table: &str,
        token: &str,
        now: i64,
    ) -> aws_sdk_dynamodb::operation::delete_item::builders::DeleteItemFluentBuilder {
        self.client
            .delete_item()
            .table_name(table)
            .key("token", AttributeValue::S(token.to_string()))
            .condition_expression("#expires <= :now")
            .expression_attribute_names("#expires", "expires")
            .expression_attribute_values(":now", AttributeValue::N(now.to_string()))
    }
}

#[async_trait]
impl Database for DynamoDb {
    async fn find_client_by_slug(&self, slug: &str) -> Result<Option<ClientTable>, AuthError> {
        DynamoDb::get_client_by_slug(self, slug).await
    }

    async fn add_client(&self, client: ClientTable) -> Result<(), AuthError> {
        DynamoDb::insert_client(self, client).await
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserTable>, AuthError> {
        DynamoDb::get_user_by_email(self, email).await
    }

    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<UserTable>, AuthError> {
        DynamoDb::get_user_by_id(self, user_id).await
    }

    async fn add_user(&self, user: UserTable) -> Result<(), AuthError> {
        DynamoDb::insert_user(self, user).await
    }

    async fn find_access_token(
        &self,
        token: &str,
    ) -> Result<Option<AccessTokenTable>, AuthError> {
        self.get_token_item(&self.access_tokens_table, token).await
    }

    async fn add_access_token(&self, token: &AccessTokenTable) -> Result<(), AuthError> {
        self.put_token_item(&self.access_tokens_table, token).await
    }

    async fn edit_access_token_expires(
        &self,
        token: &str,
        expires: i64,
    ) -> Result<(), AuthError> {
        self.update_token_expires(&self.access_tokens_table, token, expires)
            .await
    }

    async fn destroy_expired_access_tokens(&self, now: i64) -> Result<usize, AuthError> {
        self.delete_expired_token_items(&self.access_tokens_table, now)
            .await
    }

    async fn find_refresh_token(
        &self,
        token: &str,
    ) -> Result<Option<RefreshTokenTable>, AuthError> {
        self.get_token_item(&self.refresh_tokens_table, token).await
    }

    async fn add_refresh_token(&self, token: &RefreshTokenTable) -> Result<(), AuthError> {
        self.put_token_item(&self.refresh_tokens_table, token).await
    }

    async fn edit_refresh_token_expires(
        &self,
        token: &str,
        expires: i64,
    ) -> Result<(), AuthError> {
        self.update_token_expires(&self.refresh_tokens_table, token, expires)
            .await
    }

    async fn destroy_expired_refresh_tokens(&self, now: i64) -> Result<usize, AuthError> {
        self.delete_expired_token_items(&self.refresh_tokens_table, now)
            .await
    }
}

#[async_trait]
impl Database for memory::MemoryDb {
    async fn find_client_by_slug(&self, slug: &str) -> Result<Option<ClientTable>, AuthError> {
        memory::MemoryDb::find_client_by_slug(self, slug).await
    }

    async fn add_client(&self, client: ClientTable) -> Result<(), AuthError> {
        memory::MemoryDb::add_client(self, client).await
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserTable>, AuthError> {
        memory::MemoryDb::find_user_by_email(self, email).await
    }

    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<UserTable>, AuthError> {
        memory::MemoryDb::find_user_by_id(self, user_id).await
    }

    async fn add_user(&self, user: UserTable) -> Result<(), AuthError> {
        memory::MemoryDb::add_user(self, user).await
    }

    async fn find_access_token(
        &self,
        token: &str,
    ) -> Result<Option<AccessTokenTable>, AuthError> {
        memory::MemoryDb::find_access_token(self, token).await
    }

    async fn add_access_token(&self, token: &AccessTokenTable) -> Result<(), AuthError> {
        memory::MemoryDb::add_access_token(self, token).await
    }

    async fn edit_access_token_expires(
        &self,
        token: &str,
        expires: i64,
    ) -> Result<(), AuthError> {
        memory::MemoryDb::edit_access_token_expires(self, token, expires).await
    }

    async fn destroy_expired_access_tokens(&self, now: i64) -> Result<usize, AuthError> {
        memory::MemoryDb::destroy_expired_access_tokens(self, now).await
    }

    async fn find_refresh_token(
        &self,
        token: &str,
    ) -> Result<Option<RefreshTokenTable>, AuthError> {
        memory::MemoryDb::find_refresh_token(self, token).await
    }

    async fn add_refresh_token(&self, token: &RefreshTokenTable) -> Result<(), AuthError> {
        memory::MemoryDb::add_refresh_token(self, token).await
    }

    async fn edit_refresh_token_expires(
        &self,
        token: &str,
        expires: i64,
    ) -> Result<(), AuthError> {
        memory::MemoryDb::edit_refresh_token_expires(self, token, expires).await
    }

    async fn destroy_expired_refresh_tokens(&self, now: i64) -> Result<usize, AuthError> {
        memory::MemoryDb::destroy_expired_refresh_tokens(self, now).await
    }
}

/// Create a DynamoDB-backed database, loading AWS config from the environment.
pub async fn dynamo(config: &Config) -> Arc<dyn Database> {
    let aws_config = aws_config::load_from_env().await;
    let client = aws_sdk_dynamodb::Client::new(&aws_config);
    Arc::new(DynamoDb {
        client,
        clients_table: config.clients_table.clone(),
        users_table: config.users_table.clone(),
        users_email_index: config.users_email_index.clone(),
        access_tokens_table: config.access_tokens_table.clone(),
        refresh_tokens_table: config.refresh_tokens_table.clone(),
    })
}

/// Create an in-memory database for local development and testing.
pub fn memory() -> Arc<dyn Database> {
    Arc::new(memory::MemoryDb::new())
}

#[cfg(test)]
mod tests {
    use aws_sdk_dynamodb::config::{BehaviorVersion, Region};

    use super::*;

    fn offline_dynamo() -> DynamoDb {
        let config = aws_sdk_dynamodb::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .build();
        DynamoDb {
            client: aws_sdk_dynamodb::Client::from_conf(config),
            clients_table: "ClientsTable".to_string(),
            users_table: "UsersTable".to_string(),
            users_email_index: "emailIndex".to_string(),
            access_tokens_table: "AccessTokensTable".to_string(),
            refresh_tokens_table: "RefreshTokensTable".to_string(),
        }
    }

    #[test]
    fn test_sweep_delete_only_removes_rows_still_expired() {
        let db = offline_dynamo();
        let request = db.delete_expired_token_item("AccessTokensTable", "stale", 1_000);
        let input = request.as_input();

        assert_eq!(input.get_table_name().as_deref(), Some("AccessTokensTable"));
        assert_eq!(
            input.get_condition_expression().as_deref(),
            Some("#expires <= :now")
        );
        let names = input.get_expression_attribute_names().clone().unwrap();
        assert_eq!(names.get("#expires").map(String::as_str), Some("expires"));
        let values = input.get_expression_attribute_values().clone().unwrap();
        assert_eq!(values.get(":now"), Some(&AttributeValue::N("1000".to_string())));
        let key = input.get_key().clone().unwrap();
        assert_eq!(key.get("token"), Some(&AttributeValue::S("stale".to_string())));
    }
}
