use std::collections::HashMap;

use async_trait::async_trait;
use qdrant_client::qdrant::{
    point_id::PointIdOptions, value::Kind, PointId, ScoredPoint, SearchPointsBuilder,
    Value as QdrantValue,
};
use qdrant_client::Qdrant;
use serde_json::{Map as JsonMap, Number, Value as JsonValue};

use super::VectorIndexClient;
use crate::error::ServiceError;
use crate::models::Match;

/// Vector index backed by a Qdrant collection. Each point's payload becomes the match metadata.
pub struct QdrantIndex {
    client: Qdrant,
    collection_name: String,
}

impl QdrantIndex {
    pub fn new(url: &str, collection_name: &str) -> Result<Self, ServiceError> {
        tracing::info!("Building Qdrant client for URL: {}", url);
        let client = Qdrant::from_url(url).build()?;

        Ok(Self {
            client,
            collection_name: collection_name.to_string(),
        })
    }
}

#[async_trait]
impl VectorIndexClient for QdrantIndex {
    async fn query(&self, vector: Vec<f32>, top_k: u64) -> Result<Vec<Match>, ServiceError> {
        let search_result = self
            .client
            .search_points(
                SearchPointsBuilder::new(&self.collection_name, vector, top_k)
                    .with_payload(true),
            )
            .await?;

        Ok(search_result.result.into_iter().map(point_to_match).collect())
    }

    async fn describe(&self) -> Result<(), ServiceError> {
        if !self.client.collection_exists(&self.collection_name).await? {
            return Err(ServiceError::invalid(
                "qdrant",
                format!("collection '{}' does not exist", self.collection_name),
            ));
        }
        Ok(())
    }
}

fn point_to_match(point: ScoredPoint) -> Match {
    Match {
        id: point.id.map(point_id_string).unwrap_or_default(),
        score: point.score,
        metadata: payload_to_json(point.payload),
    }
}

fn point_id_string(id: PointId) -> String {
    match id.point_id_options {
        Some(PointIdOptions::Uuid(uuid)) => uuid,
        Some(PointIdOptions::Num(num)) => num.to_string(),
        None => String::new(),
    }
}

fn payload_to_json(payload: HashMap<String, QdrantValue>) -> JsonMap<String, JsonValue> {
    payload
        .into_iter()
        .map(|(key, value)| (key, value_to_json(value)))
        .collect()
}

fn value_to_json(value: QdrantValue) -> JsonValue {
    match value.kind {
        None | Some(Kind::NullValue(_)) => JsonValue::Null,
        Some(Kind::BoolValue(b)) => JsonValue::Bool(b),
        Some(Kind::IntegerValue(i)) => JsonValue::Number(i.into()),
        Some(Kind::DoubleValue(d)) => Number::from_f64(d)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        Some(Kind::StringValue(s)) => JsonValue::String(s),
        Some(Kind::ListValue(list)) => {
            JsonValue::Array(list.values.into_iter().map(value_to_json).collect())
        }
        Some(Kind::StructValue(st)) => JsonValue::Object(payload_to_json(st.fields)),
    }
}
