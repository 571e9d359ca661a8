//! The application's procedures.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use switchyard_types::{RequestContext, RpcResult};

use crate::procedure::query;
use crate::router::{Router, RouterBuildError, RouterBuilder};

pub const GET_USERS: &str = "getUsers";
pub const HELLO: &str = "hello";
pub const WHOAMI: &str = "whoami";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelloInput {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelloOutput {
    pub greeting: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhoAmIOutput {
    #[serde(rename = "userId")]
    pub user_id: String,
}

/// Placeholder listing: always the empty object.
async fn get_users(_input: Value, _ctx: Arc<RequestContext>) -> RpcResult<Value> {
    Ok(Value::Object(Map::new()))
}

async fn hello(input: HelloInput, _ctx: Arc<RequestContext>) -> RpcResult<HelloOutput> {
    Ok(HelloOutput {
        greeting: format!("hello {}", input.text),
    })
}

async fn whoami(_input: Value, ctx: Arc<RequestContext>) -> RpcResult<WhoAmIOutput> {
    let user = ctx.require_user()?;
    Ok(WhoAmIOutput {
        user_id: user.to_string(),
    })
}

fn hello_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "text": { "type": "string" }
        },
        "required": ["text"]
    })
}

/// Build the application router.
pub fn app_router() -> Result<Router, RouterBuildError> {
    let mut builder = RouterBuilder::new();
    builder.register(query(GET_USERS, get_users))?;
    builder.register(query(HELLO, hello).with_schema(hello_schema()))?;
    builder.register(query(WHOAMI, whoami).protected())?;
    Ok(builder.build())
}
