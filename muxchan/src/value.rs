//! Deferred-value trees and deep resolution
//!
//! Request data and handler results may nest not-yet-available values at any
//! depth. A [`DeepValue`] makes that explicit: a tree of ready JSON values,
//! arrays, objects and boxed futures, resolved into one plain
//! [`serde_json::Value`] before anything touches the wire.

use futures::future::{join_all, BoxFuture};
use serde_json::{Map, Value};
use std::future::Future;

/// A JSON value tree whose leaves may still be pending
pub enum DeepValue {
    Ready(Value),
    Deferred(BoxFuture<'static, DeepValue>),
    Array(Vec<DeepValue>),
    Object(Vec<(String, DeepValue)>),
}

impl DeepValue {
    /// A leaf produced by a future
    pub fn deferred<F, T>(future: F) -> Self
    where
        F: Future<Output = T> + Send + 'static,
        T: Into<DeepValue>,
    {
        DeepValue::Deferred(Box::pin(async move { future.await.into() }))
    }

    /// An object node from named children
    pub fn object<I, K>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, DeepValue)>,
        K: Into<String>,
    {
        DeepValue::Object(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Await every pending leaf, depth first, siblings concurrently
    pub fn resolve(self) -> BoxFuture<'static, Value> {
        Box::pin(async move {
            match self {
                DeepValue::Ready(value) => value,
                DeepValue::Deferred(future) => future.await.resolve().await,
                DeepValue::Array(items) => {
                    let resolved = join_all(items.into_iter().map(DeepValue::resolve)).await;
                    Value::Array(resolved)
                }
                DeepValue::Object(fields) => {
                    let (keys, values): (Vec<String>, Vec<DeepValue>) =
                        fields.into_iter().unzip();
                    let resolved = join_all(values.into_iter().map(DeepValue::resolve)).await;
                    Value::Object(keys.into_iter().zip(resolved).collect::<Map<_, _>>())
                }
            }
        })
    }
}

impl From<Value> for DeepValue {
    fn from(value: Value) -> Self {
        DeepValue::Ready(value)
    }
}

impl From<Vec<DeepValue>> for DeepValue {
    fn from(items: Vec<DeepValue>) -> Self {
        DeepValue::Array(items)
    }
}

impl From<()> for DeepValue {
    fn from(_: ()) -> Self {
        DeepValue::Ready(Value::Null)
    }
}

macro_rules! ready_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for DeepValue {
                fn from(value: $ty) -> Self {
                    DeepValue::Ready(Value::from(value))
                }
            }
        )*
    };
}

ready_from!(bool, i32, i64, u32, u64, f64, &str, String);
