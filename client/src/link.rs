//! Links carry operations from the client proxy to a router.

use std::future::Future;
use std::pin::Pin;

use futures_util::future::join_all;
use serde_json::Value;
use switchyard_rpc::Caller;
use switchyard_types::{ProcedureKind, RpcResult};

pub type LinkFut<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One procedure call as seen by a link.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub kind: ProcedureKind,
    pub path: String,
    pub input: Value,
}

impl Operation {
    #[must_use]
    pub fn query(path: impl Into<String>, input: Value) -> Self {
        Self {
            kind: ProcedureKind::Query,
            path: path.into(),
            input,
        }
    }

    #[must_use]
    pub fn mutation(path: impl Into<String>, input: Value) -> Self {
        Self {
            kind: ProcedureKind::Mutation,
            path: path.into(),
            input,
        }
    }
}

/// Transport between the client proxy and a router.
pub trait Link: Send + Sync {
    fn call(&self, op: Operation) -> LinkFut<'_, RpcResult<Value>>;

    /// Results come back in the order of `ops`.
    fn call_batch(&self, ops: Vec<Operation>) -> LinkFut<'_, Vec<RpcResult<Value>>> {
        Box::pin(async move {
            let mut results = Vec::with_capacity(ops.len());
            for op in ops {
                results.push(self.call(op).await);
            }
            results
        })
    }
}

/// Calls procedures in-process through a [`Caller`]. Used during server render
/// passes, where a network round trip to ourselves would be wasted.
#[derive(Debug, Clone)]
pub struct LocalLink {
    caller: Caller,
}

impl LocalLink {
    #[must_use]
    pub fn new(caller: Caller) -> Self {
        Self { caller }
    }

    #[must_use]
    pub fn caller(&self) -> &Caller {
        &self.caller
    }
}

impl Link for LocalLink {
    fn call(&self, op: Operation) -> LinkFut<'_, RpcResult<Value>> {
        Box::pin(async move {
            match op.kind {
                ProcedureKind::Query => self.caller.query(&op.path, &op.input).await,
                ProcedureKind::Mutation => self.caller.call(&op.path, op.input).await,
            }
        })
    }

    fn call_batch(&self, ops: Vec<Operation>) -> LinkFut<'_, Vec<RpcResult<Value>>> {
        Box::pin(join_all(ops.into_iter().map(|op| self.call(op))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use switchyard_rpc::{GET_USERS, HELLO, RouterBuilder, WHOAMI, app_router, mutation};
    use switchyard_types::{ErrorCode, RequestContext, RequestId, UserId};

    fn local(user: Option<&str>) -> LocalLink {
        let router = Arc::new(app_router().unwrap());
        let ctx = RequestContext::new(
            RequestId::new("local"),
            user.map(|u| UserId::new(u).unwrap()),
        );
        LocalLink::new(router.create_caller(Arc::new(ctx)))
    }

    #[tokio::test]
    async fn local_link_dispatches_queries() {
        let link = local(Some("user_123"));
        assert_eq!(
            link.call(Operation::query(GET_USERS, json!({}))).await.unwrap(),
            json!({})
        );
        assert_eq!(
            link.call(Operation::query(WHOAMI, Value::Null)).await.unwrap(),
            json!({"userId": "user_123"})
        );
    }

    #[tokio::test]
    async fn local_batch_preserves_order() {
        let link = local(None);
        let results = link
            .call_batch(vec![
                Operation::query(HELLO, json!({"text": "a"})),
                Operation::query("missing", Value::Null),
                Operation::query(HELLO, json!({"text": "b"})),
            ])
            .await;
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap()["greeting"], "hello a");
        assert_eq!(results[1].as_ref().unwrap_err().code, ErrorCode::NotFound);
        assert_eq!(results[2].as_ref().unwrap()["greeting"], "hello b");
    }

    #[tokio::test]
    async fn local_link_keeps_query_mutation_split() {
        let mut builder = RouterBuilder::new();
        builder
            .register(mutation("bump", |n: i64, _ctx| async move { Ok(n + 1) }))
            .unwrap();
        let router = Arc::new(builder.build());
        let link = LocalLink::new(
            router.create_caller(Arc::new(RequestContext::new(RequestId::new("m"), None))),
        );

        let err = link
            .call(Operation::query("bump", json!(1)))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::MethodNotSupported);
        assert_eq!(
            link.call(Operation::mutation("bump", json!(1))).await.unwrap(),
            json!(2)
        );
    }
}
