use aws_sdk_dynamodb::Client;
use aws_sdk_dynamodb::error::SdkError;
use aws_sdk_dynamodb::operation::delete_item::DeleteItemError;
use aws_sdk_dynamodb::operation::put_item::PutItemError;
use aws_sdk_dynamodb::operation::update_item::UpdateItemError;
use aws_sdk_dynamodb::types::AttributeValue;
use strata_core::LockConfig;
use strata_core::aws::build_sdk_config;
use strata_core::format_err_chain;

use crate::error::TableError;
use crate::record::{ATTR_HOLDER_ID, ATTR_INFO, ATTR_LOCK_KEY, LockRecord};
use crate::table::{BoxFuture, LockTable};

/// Lock table backed by a DynamoDB table with a string partition key
/// `lock_key`.
#[derive(Clone)]
pub struct DynamoDbLockTable {
    client: Client,
    table_name: String,
}

impl std::fmt::Debug for DynamoDbLockTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamoDbLockTable")
            .field("table_name", &self.table_name)
            .finish()
    }
}

impl DynamoDbLockTable {
    pub fn new(client: Client, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }

    /// Build the DynamoDB client from the config's AWS settings.
    pub async fn from_config(config: &LockConfig) -> Self {
        let sdk_config = build_sdk_config(&config.aws).await;
        Self::new(Client::new(&sdk_config), config.table.clone())
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }
}

impl LockTable for DynamoDbLockTable {
    fn put_if_absent<'a>(
        &'a self,
        lock_key: &'a str,
        holder_id: &'a str,
    ) -> BoxFuture<'a, Result<(), TableError>> {
        Box::pin(async move {
            self.client
                .put_item()
                .table_name(&self.table_name)
                .item(ATTR_LOCK_KEY, AttributeValue::S(lock_key.to_string()))
                .item(ATTR_HOLDER_ID, AttributeValue::S(holder_id.to_string()))
                .condition_expression("attribute_not_exists(#key)")
                .expression_attribute_names("#key", ATTR_LOCK_KEY)
                .send()
                .await
                .map(|_| ())
                .map_err(|e| {
                    classify(
                        "PutItem",
                        e,
                        PutItemError::is_conditional_check_failed_exception,
                    )
                })
        })
    }

    fn delete_if_holder<'a>(
        &'a self,
        lock_key: &'a str,
        holder_id: &'a str,
    ) -> BoxFuture<'a, Result<(), TableError>> {
        Box::pin(async move {
            self.client
                .delete_item()
                .table_name(&self.table_name)
                .key(ATTR_LOCK_KEY, AttributeValue::S(lock_key.to_string()))
                .condition_expression("#holder = :holder")
                .expression_attribute_names("#holder", ATTR_HOLDER_ID)
                .expression_attribute_values(":holder", AttributeValue::S(holder_id.to_string()))
                .send()
                .await
                .map(|_| ())
                .map_err(|e| {
                    classify(
                        "DeleteItem",
                        e,
                        DeleteItemError::is_conditional_check_failed_exception,
                    )
                })
        })
    }

    fn update_info_if_holder<'a>(
        &'a self,
        lock_key: &'a str,
        holder_id: &'a str,
        info: &'a str,
    ) -> BoxFuture<'a, Result<(), TableError>> {
        Box::pin(async move {
            // The holder condition also fails on a missing item, so this
            // never upserts a fresh record.
            self.client
                .update_item()
                .table_name(&self.table_name)
                .key(ATTR_LOCK_KEY, AttributeValue::S(lock_key.to_string()))
                .update_expression("SET #info = :info")
                .condition_expression("#holder = :holder")
                .expression_attribute_names("#info", ATTR_INFO)
                .expression_attribute_names("#holder", ATTR_HOLDER_ID)
                .expression_attribute_values(":info", AttributeValue::S(info.to_string()))
                .expression_attribute_values(":holder", AttributeValue::S(holder_id.to_string()))
                .send()
                .await
                .map(|_| ())
                .map_err(|e| {
                    classify(
                        "UpdateItem",
                        e,
                        UpdateItemError::is_conditional_check_failed_exception,
                    )
                })
        })
    }

    fn get<'a>(
        &'a self,
        lock_key: &'a str,
    ) -> BoxFuture<'a, Result<Option<LockRecord>, TableError>> {
        Box::pin(async move {
            let resp = self
                .client
                .get_item()
                .table_name(&self.table_name)
                .key(ATTR_LOCK_KEY, AttributeValue::S(lock_key.to_string()))
                .consistent_read(true)
                .send()
                .await
                .map_err(|e| classify("GetItem", e, |_| false))?;

            resp.item().map(LockRecord::from_item).transpose()
        })
    }
}

/// Split an SDK failure into "the condition said no" and everything else.
fn classify<E, R>(
    operation: &str,
    err: SdkError<E, R>,
    is_condition_failure: fn(&E) -> bool,
) -> TableError
where
    E: std::error::Error + 'static,
    R: std::fmt::Debug,
{
    if let SdkError::ServiceError(service_err) = &err
        && is_condition_failure(service_err.err())
    {
        return TableError::ConditionFailed;
    }
    TableError::Unavailable(format!(
        "DynamoDB {operation} failed: {}",
        format_err_chain(&err)
    ))
}
