//! JSON response envelopes used by controller actions.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

#[derive(Serialize)]
pub struct SuccessOne<T> {
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
}

#[derive(Serialize)]
pub struct SuccessMany<T> {
    pub data: Vec<T>,
    pub meta: MetaCount,
}

#[derive(Serialize)]
pub struct MetaCount {
    pub count: u64,
}

pub fn success_one<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(SuccessOne { data, meta: None })).into_response()
}

/// 201 with the new record and its id in `meta`.
pub fn created<T: Serialize>(id: &str, data: T) -> Response {
    (
        StatusCode::CREATED,
        Json(SuccessOne {
            data,
            meta: Some(serde_json::json!({ "id": id })),
        }),
    )
        .into_response()
}

pub fn success_many<T: Serialize>(data: Vec<T>) -> Response {
    many(StatusCode::OK, data)
}

/// 201 for a batch insert.
pub fn created_many<T: Serialize>(data: Vec<T>) -> Response {
    many(StatusCode::CREATED, data)
}

fn many<T: Serialize>(status: StatusCode, data: Vec<T>) -> Response {
    let count = data.len() as u64;
    (
        status,
        Json(SuccessMany {
            data,
            meta: MetaCount { count },
        }),
    )
        .into_response()
}

/// `{"data": {"<key>": <flag>}}` for actions that only report an outcome.
pub fn outcome(key: &str, flag: bool) -> Response {
    let mut body = serde_json::Map::new();
    body.insert(key.to_string(), flag.into());
    success_one(body)
}
