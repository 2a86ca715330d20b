// src/adapters/mongo.rs
// MongoDB Data Source Adapter.

use async_trait::async_trait;
use mongodb::bson::{self, Document};
use mongodb::options::ClientOptions;
use mongodb::Client;
use serde_json::{Map, Value};
use std::time::Instant;

use super::DataSourceAdapter;
use crate::config::CONFIG;
use crate::error::sanitize_error;
use crate::model::request::{DataRequest, DataRequestKind, MongoOperation};
use crate::model::schema::{CollectionSchema, FieldSchema, SchemaPayload};
use crate::model::{Connection, ExecutionResult, SourceKind, SourceSchema};
use crate::summary::redact_row;

pub struct MongoAdapter {
    conn: Connection,
}

impl MongoAdapter {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    fn connection_string(&self) -> String {
        if let Some(uri) = self.conn.detail_str("uri") {
            return uri.to_string();
        }
        let auth_source = self.conn.detail_str("auth_source").unwrap_or("admin");
        match (&self.conn.username, &self.conn.password) {
            (Some(u), Some(p)) => format!(
                "mongodb://{u}:{p}@{}:{}/?authSource={auth_source}",
                self.conn.host.as_deref().unwrap_or("localhost"),
                self.conn.port.unwrap_or(27017),
            ),
            _ => format!(
                "mongodb://{}:{}",
                self.conn.host.as_deref().unwrap_or("localhost"),
                self.conn.port.unwrap_or(27017),
            ),
        }
    }

    async fn client(&self) -> anyhow::Result<Client> {
        let options = ClientOptions::parse(self.connection_string())
            .await
            .map_err(|e| anyhow::anyhow!(sanitize_error(&e.to_string())))?;
        Client::with_options(options).map_err(|e| anyhow::anyhow!(sanitize_error(&e.to_string())))
    }

    fn database_name(&self) -> String {
        self.conn.database.clone().unwrap_or_else(|| "admin".to_string())
    }
}

#[async_trait]
impl DataSourceAdapter for MongoAdapter {
    fn id(&self) -> i64 {
        self.conn.id
    }

    fn name(&self) -> &str {
        &self.conn.name
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Mongodb
    }

    async fn is_available(&self) -> bool {
        match self.client().await {
            Ok(client) => client.list_database_names().await.is_ok(),
            Err(_) => false,
        }
    }

    async fn extract_schema(&self) -> anyhow::Result<SourceSchema> {
        let client = self.client().await?;
        let db = client.database(&self.database_name());
        let collection_names = db.list_collection_names().await?;

        let mut collections = Vec::new();
        for name in collection_names {
            let coll = db.collection::<Document>(&name);
            let sample = coll.find_one(Document::new()).await?;
            let approx_count = coll.estimated_document_count().await.unwrap_or(0) as i64;
            let indexes = coll
                .list_index_names()
                .await
                .unwrap_or_default();

            let (sample_json, fields) = match &sample {
                Some(doc) => {
                    let mut json = bson_document_to_json(doc);
                    redact_row(&mut json);
                    let fields = json
                        .iter()
                        .map(|(k, v)| FieldSchema {
                            name: k.clone(),
                            field_type: field_type_of(v),
                        })
                        .collect();
                    (Value::Object(json), fields)
                }
                None => (Value::Null, Vec::new()),
            };

            collections.push(CollectionSchema {
                name,
                sample_document: sample_json,
                indexes,
                approx_count,
                fields,
            });
        }

        Ok(SourceSchema {
            source_id: self.conn.id,
            source_name: self.conn.name.clone(),
            source_kind: SourceKind::Mongodb,
            payload: SchemaPayload::Document { collections },
        })
    }

    async fn execute(&self, request: &DataRequest) -> ExecutionResult {
        let start = Instant::now();
        let DataRequestKind::MongoQuery {
            collection,
            operation,
            filter,
            limit,
        } = &request.kind
        else {
            return ExecutionResult::error(
                "MongoDB adapter received a non-MONGO_QUERY request",
                elapsed_ms(start),
            );
        };

        let client = match self.client().await {
            Ok(c) => c,
            Err(e) => return ExecutionResult::error(sanitize_error(&e.to_string()), elapsed_ms(start)),
        };
        let db = client.database(&self.database_name());
        let coll = db.collection::<Document>(collection);

        let result = match operation {
            MongoOperation::Count => self.run_count(&coll, filter).await,
            MongoOperation::Find => self.run_find(&coll, filter, limit.unwrap_or(CONFIG.execution.default_result_limit)).await,
            MongoOperation::Aggregate => self.run_aggregate(&coll, filter).await,
        };

        match result {
            Ok((rows, columns)) => ExecutionResult::ok(rows, columns, elapsed_ms(start)),
            Err(e) => ExecutionResult::error(sanitize_error(&e.to_string()), elapsed_ms(start)),
        }
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

impl MongoAdapter {
    async fn run_count(
        &self,
        coll: &mongodb::Collection<Document>,
        filter: &Value,
    ) -> anyhow::Result<(Vec<Map<String, Value>>, Vec<String>)> {
        let doc = json_to_bson_document(filter)?;
        let count = coll.count_documents(doc).await?;
        let mut row = Map::new();
        row.insert("count".to_string(), Value::from(count as i64));
        Ok((vec![row], vec!["count".to_string()]))
    }

    async fn run_find(
        &self,
        coll: &mongodb::Collection<Document>,
        filter: &Value,
        limit: u32,
    ) -> anyhow::Result<(Vec<Map<String, Value>>, Vec<String>)> {
        use futures::stream::TryStreamExt;

        let doc = json_to_bson_document(filter)?;
        let find_opts = mongodb::options::FindOptions::builder()
            .limit(Some(limit as i64))
            .build();
        let mut cursor = coll.find(doc).with_options(find_opts).await?;

        let mut rows = Vec::new();
        let mut columns: Vec<String> = Vec::new();
        while let Some(doc) = cursor.try_next().await? {
            let mut row = bson_document_to_json(&doc);
            for key in row.keys() {
                if !columns.contains(key) {
                    columns.push(key.clone());
                }
            }
            redact_row(&mut row);
            rows.push(row);
        }
        Ok((rows, columns))
    }

    async fn run_aggregate(
        &self,
        coll: &mongodb::Collection<Document>,
        filter: &Value,
    ) -> anyhow::Result<(Vec<Map<String, Value>>, Vec<String>)> {
        use futures::stream::TryStreamExt;

        let stages = filter
            .as_array()
            .ok_or_else(|| anyhow::anyhow!("aggregate filter must be a JSON array of pipeline stages"))?;
        let pipeline: Vec<Document> = stages
            .iter()
            .map(json_to_bson_document)
            .collect::<anyhow::Result<_>>()?;

        let mut cursor = coll.aggregate(pipeline).await?;
        let mut rows = Vec::new();
        let mut columns: Vec<String> = Vec::new();
        while let Some(doc) = cursor.try_next().await? {
            let mut row = bson_document_to_json(&doc);
            for key in row.keys() {
                if !columns.contains(key) {
                    columns.push(key.clone());
                }
            }
            redact_row(&mut row);
            rows.push(row);
        }
        Ok((rows, columns))
    }
}

fn json_to_bson_document(value: &Value) -> anyhow::Result<Document> {
    let bson_value = bson::to_bson(value)?;
    match bson_value {
        bson::Bson::Document(doc) => Ok(doc),
        _ => anyhow::bail!("filter must be a JSON object"),
    }
}

fn bson_document_to_json(doc: &Document) -> Map<String, Value> {
    let value = bson::Bson::Document(doc.clone()).into_relaxed_extjson();
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn field_type_of(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(_) => "Boolean".to_string(),
        Value::Number(_) => "Number".to_string(),
        Value::String(_) => "String".to_string(),
        Value::Array(_) => "Array".to_string(),
        Value::Object(_) => "Document".to_string(),
    }
}
