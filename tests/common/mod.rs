#![allow(dead_code)]

use serde_json::{json, Value};

/// A well-formed analysis of the sample article.
pub fn sample_analysis() -> Value {
    json!({
        "narrative": "QuantumLeap unveiled Synapse, a neural interface headband.",
        "audioSummary": "QuantumLeap launched Synapse today. Experts are divided.",
        "sentiment": "Neutral",
        "infographicData": {
            "title": "Synapse by the numbers",
            "data": [
                { "label": "Accuracy %", "value": 99 },
                { "label": "Stock surge %", "value": 40 }
            ]
        },
        "knowledgeGraphData": {
            "nodes": [
                { "id": "QuantumLeap", "group": "organization" },
                { "id": "Dr. Aris Thorne", "group": "person" },
                { "id": "San Francisco", "group": "location" }
            ],
            "links": [
                { "source": "Dr. Aris Thorne", "target": "QuantumLeap", "relationship": "CEO of" },
                { "source": "QuantumLeap", "target": "San Francisco", "relationship": "based in" }
            ]
        }
    })
}

pub fn gemini_envelope(document: &Value) -> Value {
    json!({
        "candidates": [
            { "content": { "role": "model", "parts": [ { "text": document.to_string() } ] } }
        ]
    })
}
