use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use switchyard_rpc::{GET_USERS, HELLO, HelloInput, HelloOutput, WHOAMI, WhoAmIOutput};
use switchyard_types::{RpcError, RpcResult};

use crate::link::{Link, Operation};

/// Typed front door to a router, over whichever [`Link`] it was built with.
#[derive(Clone)]
pub struct RpcClient {
    link: Arc<dyn Link>,
}

impl fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcClient").finish_non_exhaustive()
    }
}

impl RpcClient {
    #[must_use]
    pub fn new(link: impl Link + 'static) -> Self {
        Self {
            link: Arc::new(link),
        }
    }

    #[must_use]
    pub fn from_shared(link: Arc<dyn Link>) -> Self {
        Self { link }
    }

    pub async fn query(&self, name: &str, input: Value) -> RpcResult<Value> {
        self.link.call(Operation::query(name, input)).await
    }

    pub async fn mutate(&self, name: &str, input: Value) -> RpcResult<Value> {
        self.link.call(Operation::mutation(name, input)).await
    }

    pub async fn query_as<I, O>(&self, name: &str, input: &I) -> RpcResult<O>
    where
        I: Serialize + ?Sized,
        O: DeserializeOwned,
    {
        let output = self.query(name, encode(input)?).await?;
        decode(name, output)
    }

    pub async fn mutate_as<I, O>(&self, name: &str, input: &I) -> RpcResult<O>
    where
        I: Serialize + ?Sized,
        O: DeserializeOwned,
    {
        let output = self.mutate(name, encode(input)?).await?;
        decode(name, output)
    }

    /// Several queries in one round trip where the link supports it.
    pub async fn batch_query<S: Into<String>>(
        &self,
        calls: impl IntoIterator<Item = (S, Value)>,
    ) -> Vec<RpcResult<Value>> {
        let ops = calls
            .into_iter()
            .map(|(name, input)| Operation::query(name, input))
            .collect();
        self.link.call_batch(ops).await
    }

    pub async fn get_users(&self) -> RpcResult<Value> {
        self.query(GET_USERS, Value::Object(Map::new())).await
    }

    pub async fn hello(&self, text: &str) -> RpcResult<HelloOutput> {
        self.query_as(
            HELLO,
            &HelloInput {
                text: text.to_string(),
            },
        )
        .await
    }

    pub async fn whoami(&self) -> RpcResult<WhoAmIOutput> {
        self.query_as(WHOAMI, &Value::Null).await
    }
}

fn encode<I: Serialize + ?Sized>(input: &I) -> RpcResult<Value> {
    serde_json::to_value(input).map_err(|e| RpcError::bad_input(e.to_string()))
}

fn decode<O: DeserializeOwned>(name: &str, output: Value) -> RpcResult<O> {
    serde_json::from_value(output)
        .map_err(|e| RpcError::internal(format!("unexpected output from '{name}': {e}")))
}
