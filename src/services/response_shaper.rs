//! Converts internal chat messages into their published JSON shape.
//!
//! Pure and deterministic: the type tag becomes its canonical name and any
//! conversation history nested in the message's context is shaped the same
//! way. Absent optional fields are simply omitted.

use serde_json::{json, Map, Value};

use crate::domain::models::{ChatContext, ChatHistory, ChatMessage, Origin};

/// Shape one message for publication.
pub fn shape_message(message: &ChatMessage) -> Value {
    let mut shaped = Map::new();
    shaped.insert(
        "type".to_string(),
        Value::String(message.message_type.canonical_name().to_string()),
    );

    if let Some(text) = &message.text {
        shaped.insert("text".to_string(), Value::String(text.clone()));
    }
    if let Some(structure) = &message.structure {
        shaped.insert("structure".to_string(), structure.clone());
    }
    if !message.origin.is_empty() {
        shaped.insert("origin".to_string(), shape_origin(&message.origin));
    }
    if let Some(chat_context) = &message.chat_context {
        shaped.insert("chat_context".to_string(), shape_context(chat_context));
    }

    Value::Object(shaped)
}

fn shape_context(chat_context: &ChatContext) -> Value {
    let histories: Vec<Value> = chat_context
        .chat_histories
        .iter()
        .map(shape_history)
        .collect();
    json!({ "chat_histories": histories })
}

fn shape_history(history: &ChatHistory) -> Value {
    let messages: Vec<Value> = history.messages.iter().map(shape_message).collect();
    json!({
        "origin": shape_origin(&history.origin),
        "messages": messages,
    })
}

fn shape_origin(origin: &[Origin]) -> Value {
    serde_json::to_value(origin).unwrap_or(Value::Null)
}
