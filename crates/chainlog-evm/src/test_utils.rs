use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::rpc::{RpcClient, RpcError};

/// Replays queued responses in order and records every request.
#[derive(Default)]
pub struct ScriptedClient {
    responses: Mutex<VecDeque<Result<Value, RpcError>>>,
    calls: Mutex<Vec<(String, Vec<Value>)>>,
}

impl ScriptedClient {
    pub fn respond(&self, response: Result<Value, RpcError>) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub fn calls(&self) -> Vec<(String, Vec<Value>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl RpcClient for ScriptedClient {
    async fn request(&self, method: &str, params: Vec<Value>) -> Result<Value, RpcError> {
        self.calls.lock().unwrap().push((method.to_string(), params));
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(RpcError::Transport(format!("no scripted response for {method}")))
            })
    }
}
