//! The fixed response schema sent to the model, and the validator that turns
//! the model's JSON back into an [`AnalysisResult`].
//!
//! Validation is field by field: every required key, the sentiment enum and
//! the shape of every array element are checked, and the first failure is
//! reported with its field path (e.g. `knowledgeGraphData.links[2].source`).

use crate::error::AnalysisError;
use crate::model::{
    AnalysisResult, DataPoint, InfographicData, KnowledgeGraphData, KnowledgeGraphLink,
    KnowledgeGraphNode, Sentiment,
};
use serde_json::{json, Map, Value};

/// Convention only; longer series are accepted.
pub const MAX_INFOGRAPHIC_ENTRIES: usize = 5;

/// How a provider expects the schema to be spelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaDialect {
    /// Plain JSON Schema.
    JsonSchema,
    /// JSON Schema with `additionalProperties: false` on every object, as
    /// required by strict structured outputs.
    Strict,
    /// OpenAPI subset with upper-case type names.
    Gemini,
}

pub fn response_schema(dialect: SchemaDialect) -> Value {
    let mut schema = base_schema();
    match dialect {
        SchemaDialect::JsonSchema => {}
        SchemaDialect::Strict => close_objects(&mut schema),
        SchemaDialect::Gemini => uppercase_types(&mut schema),
    }
    schema
}

fn base_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "narrative": {
                "type": "string",
                "description": "A synthesized, comprehensive narrative of the news story, written in an engaging journalistic style."
            },
            "audioSummary": {
                "type": "string",
                "description": "A concise, 2-3 sentence summary suitable for a text-to-speech audio clip."
            },
            "sentiment": {
                "type": "string",
                "description": "The overall sentiment of the article.",
                "enum": ["Positive", "Negative", "Neutral"]
            },
            "infographicData": {
                "type": "object",
                "description": "Data for an infographic. Up to 5 key numerical facts or statistics.",
                "properties": {
                    "title": {
                        "type": "string",
                        "description": "A descriptive title for the infographic chart."
                    },
                    "data": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "label": { "type": "string" },
                                "value": { "type": "number" }
                            },
                            "required": ["label", "value"]
                        }
                    }
                },
                "required": ["title", "data"]
            },
            "knowledgeGraphData": {
                "type": "object",
                "description": "A knowledge graph of key entities (people, organizations, locations) and their relationships.",
                "properties": {
                    "nodes": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "id": { "type": "string", "description": "The name of the entity." },
                                "group": { "type": "string", "description": "The type of entity (person, organization, location)." }
                            },
                            "required": ["id", "group"]
                        }
                    },
                    "links": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "source": { "type": "string", "description": "The source node ID." },
                                "target": { "type": "string", "description": "The target node ID." },
                                "relationship": { "type": "string", "description": "The relationship between the nodes." }
                            },
                            "required": ["source", "target", "relationship"]
                        }
                    }
                },
                "required": ["nodes", "links"]
            }
        },
        "required": ["narrative", "audioSummary", "sentiment", "infographicData", "knowledgeGraphData"]
    })
}

fn close_objects(value: &mut Value) {
    match value {
        Value::Object(map) => {
            if map.get("type").and_then(Value::as_str) == Some("object") {
                map.insert("additionalProperties".to_string(), Value::Bool(false));
            }
            for child in map.values_mut() {
                close_objects(child);
            }
        }
        Value::Array(items) => items.iter_mut().for_each(close_objects),
        _ => {}
    }
}

fn uppercase_types(value: &mut Value) {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(kind)) = map.get_mut("type") {
                *kind = kind.to_uppercase();
            }
            for (key, child) in map.iter_mut() {
                // property names may themselves be called "type"
                if key != "type" {
                    uppercase_types(child);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(uppercase_types),
        _ => {}
    }
}

/// Parse the model's raw text output and validate it.
pub fn parse_response(text: &str) -> Result<AnalysisResult, AnalysisError> {
    let body = strip_code_fence(text);
    let value: Value = serde_json::from_str(body)
        .map_err(|e| AnalysisError::schema("$", format!("response is not valid JSON: {}", e)))?;
    validate(&value)
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

pub fn validate(value: &Value) -> Result<AnalysisResult, AnalysisError> {
    let root = object(value, "$")?;

    let narrative = string_field(root, "narrative", "narrative")?;
    let audio_summary = string_field(root, "audioSummary", "audioSummary")?;
    let sentiment_text = string_field(root, "sentiment", "sentiment")?;
    let sentiment = Sentiment::parse(&sentiment_text).ok_or_else(|| {
        AnalysisError::schema(
            "sentiment",
            format!("expected one of Positive, Negative, Neutral but got {:?}", sentiment_text),
        )
    })?;

    let infographic_data = validate_infographic(required(root, "infographicData", "infographicData")?)?;
    let knowledge_graph_data =
        validate_knowledge_graph(required(root, "knowledgeGraphData", "knowledgeGraphData")?)?;

    Ok(AnalysisResult {
        narrative,
        audio_summary,
        sentiment,
        infographic_data,
        knowledge_graph_data,
    })
}

fn validate_infographic(value: &Value) -> Result<InfographicData, AnalysisError> {
    let obj = object(value, "infographicData")?;
    let title = string_field(obj, "title", "infographicData.title")?;
    let entries = array(required(obj, "data", "infographicData.data")?, "infographicData.data")?;

    let mut data = Vec::with_capacity(entries.len());
    for (i, entry) in entries.iter().enumerate() {
        let path = format!("infographicData.data[{}]", i);
        let item = object(entry, &path)?;
        let label = string_field(item, "label", &format!("{}.label", path))?;
        let value = number_field(item, "value", &format!("{}.value", path))?;
        data.push(DataPoint { label, value });
    }

    if data.len() > MAX_INFOGRAPHIC_ENTRIES {
        tracing::warn!(
            entries = data.len(),
            "infographic has more than {} entries",
            MAX_INFOGRAPHIC_ENTRIES
        );
    }

    Ok(InfographicData { title, data })
}

fn validate_knowledge_graph(value: &Value) -> Result<KnowledgeGraphData, AnalysisError> {
    let obj = object(value, "knowledgeGraphData")?;

    let raw_nodes = array(required(obj, "nodes", "knowledgeGraphData.nodes")?, "knowledgeGraphData.nodes")?;
    let mut nodes = Vec::with_capacity(raw_nodes.len());
    for (i, entry) in raw_nodes.iter().enumerate() {
        let path = format!("knowledgeGraphData.nodes[{}]", i);
        let item = object(entry, &path)?;
        nodes.push(KnowledgeGraphNode {
            id: string_field(item, "id", &format!("{}.id", path))?,
            group: string_field(item, "group", &format!("{}.group", path))?,
        });
    }

    let raw_links = array(required(obj, "links", "knowledgeGraphData.links")?, "knowledgeGraphData.links")?;
    let mut links = Vec::with_capacity(raw_links.len());
    for (i, entry) in raw_links.iter().enumerate() {
        let path = format!("knowledgeGraphData.links[{}]", i);
        let item = object(entry, &path)?;
        links.push(KnowledgeGraphLink {
            source: string_field(item, "source", &format!("{}.source", path))?,
            target: string_field(item, "target", &format!("{}.target", path))?,
            relationship: string_field(item, "relationship", &format!("{}.relationship", path))?,
        });
    }

    Ok(KnowledgeGraphData { nodes, links })
}

fn required<'a>(obj: &'a Map<String, Value>, key: &str, path: &str) -> Result<&'a Value, AnalysisError> {
    match obj.get(key) {
        Some(Value::Null) | None => Err(AnalysisError::schema(path, "missing required field")),
        Some(value) => Ok(value),
    }
}

fn object<'a>(value: &'a Value, path: &str) -> Result<&'a Map<String, Value>, AnalysisError> {
    value
        .as_object()
        .ok_or_else(|| AnalysisError::schema(path, format!("expected an object, got {}", kind(value))))
}

fn array<'a>(value: &'a Value, path: &str) -> Result<&'a Vec<Value>, AnalysisError> {
    value
        .as_array()
        .ok_or_else(|| AnalysisError::schema(path, format!("expected an array, got {}", kind(value))))
}

fn string_field(obj: &Map<String, Value>, key: &str, path: &str) -> Result<String, AnalysisError> {
    let value = required(obj, key, path)?;
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| AnalysisError::schema(path, format!("expected a string, got {}", kind(value))))
}

fn number_field(obj: &Map<String, Value>, key: &str, path: &str) -> Result<f64, AnalysisError> {
    let value = required(obj, key, path)?;
    match value.as_f64() {
        Some(n) if n.is_finite() => Ok(n),
        _ => Err(AnalysisError::schema(path, format!("expected a number, got {}", kind(value)))),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> Value {
        json!({
            "narrative": "QuantumLeap unveiled Synapse.",
            "audioSummary": "QuantumLeap launched a neural interface.",
            "sentiment": "Neutral",
            "infographicData": {
                "title": "Launch by the numbers",
                "data": [
                    { "label": "Accuracy (%)", "value": 99 },
                    { "label": "Stock surge (%)", "value": 40 }
                ]
            },
            "knowledgeGraphData": {
                "nodes": [
                    { "id": "QuantumLeap", "group": "organization" },
                    { "id": "Dr. Aris Thorne", "group": "person" }
                ],
                "links": [
                    { "source": "Dr. Aris Thorne", "target": "QuantumLeap", "relationship": "CEO of" }
                ]
            }
        })
    }

    fn path_of(err: AnalysisError) -> String {
        match err {
            AnalysisError::SchemaViolation { path, .. } => path,
            other => panic!("expected a schema violation, got {:?}", other),
        }
    }

    #[test]
    fn accepts_a_complete_document() {
        let result = validate(&sample()).unwrap();
        assert_eq!(result.sentiment, Sentiment::Neutral);
        assert_eq!(result.infographic_data.data[0].value, 99.0);
        assert_eq!(result.knowledge_graph_data.nodes[0].id, "QuantumLeap");
    }

    #[test]
    fn missing_narrative_is_reported_by_path() {
        let mut doc = sample();
        doc.as_object_mut().unwrap().remove("narrative");
        assert_eq!(path_of(validate(&doc).unwrap_err()), "narrative");
    }

    #[test]
    fn unknown_sentiment_is_rejected() {
        let mut doc = sample();
        doc["sentiment"] = json!("Mixed");
        assert_eq!(path_of(validate(&doc).unwrap_err()), "sentiment");

        doc["sentiment"] = json!("positive");
        assert_eq!(path_of(validate(&doc).unwrap_err()), "sentiment");
    }

    #[test]
    fn element_shapes_are_checked() {
        let mut doc = sample();
        doc["knowledgeGraphData"]["links"][0]["source"] = json!(7);
        assert_eq!(
            path_of(validate(&doc).unwrap_err()),
            "knowledgeGraphData.links[0].source"
        );

        let mut doc = sample();
        doc["infographicData"]["data"][1]["value"] = json!("forty");
        assert_eq!(path_of(validate(&doc).unwrap_err()), "infographicData.data[1].value");

        let mut doc = sample();
        doc["knowledgeGraphData"]["nodes"] = json!({});
        assert_eq!(path_of(validate(&doc).unwrap_err()), "knowledgeGraphData.nodes");
    }

    #[test]
    fn null_counts_as_missing() {
        let mut doc = sample();
        doc["knowledgeGraphData"] = Value::Null;
        assert_eq!(path_of(validate(&doc).unwrap_err()), "knowledgeGraphData");
    }

    #[test]
    fn empty_collections_are_valid() {
        let mut doc = sample();
        doc["infographicData"]["data"] = json!([]);
        doc["knowledgeGraphData"] = json!({ "nodes": [], "links": [] });
        let result = validate(&doc).unwrap();
        assert!(result.infographic_data.data.is_empty());
        assert!(result.knowledge_graph_data.nodes.is_empty());
    }

    #[test]
    fn parse_tolerates_a_code_fence() {
        let text = format!("```json\n{}\n```", sample());
        assert!(parse_response(&text).is_ok());
    }

    #[test]
    fn parse_rejects_prose() {
        let err = parse_response("Here is your analysis: it was fine.").unwrap_err();
        assert_eq!(path_of(err), "$");
    }

    #[test]
    fn dialects() {
        let gemini = response_schema(SchemaDialect::Gemini);
        assert_eq!(gemini["type"], "OBJECT");
        assert_eq!(gemini["properties"]["infographicData"]["properties"]["data"]["items"]["properties"]["value"]["type"], "NUMBER");
        assert!(gemini.get("additionalProperties").is_none());

        let strict = response_schema(SchemaDialect::Strict);
        assert_eq!(strict["additionalProperties"], false);
        assert_eq!(strict["properties"]["knowledgeGraphData"]["properties"]["links"]["items"]["additionalProperties"], false);
        assert_eq!(strict["properties"]["sentiment"]["type"], "string");
    }
}
