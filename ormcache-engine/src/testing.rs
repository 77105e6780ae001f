//! An in-memory [`RawEngine`] used to exercise [`crate::EngineClient`] and
//! the coordinator without a real engine present.
//!
//! This is deliberately a toy dependency tracker: it invalidates a shape
//! whenever a mutation touches the model the shape's statement targets, and
//! forgets the shape once reported (callers must `add_query` it again if
//! they want it invalidated a second time). It exists for tests, not as a
//! reference semantics for a production engine.

use crate::abi::{LinearMemory, RawEngine};
use ormcache_core::{AppSchema, Mutation, Statement};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

const ABI_VERSION: u32 = 1;

const STATUS_OK: u32 = 0;
const STATUS_SCHEMA_INVALID: u32 = 3;
const STATUS_QUERY_INVALID: u32 = 4;
const STATUS_MUTATION_INVALID: u32 = 6;

#[derive(Default)]
struct InMemoryMemory {
    buffers: Mutex<HashMap<u32, Vec<u8>>>,
    next_ptr: AtomicU32,
}

impl InMemoryMemory {
    fn alloc(&self, len: u32) -> u32 {
        let ptr = self.next_ptr.fetch_add(1, Ordering::SeqCst).max(1);
        self.buffers
            .lock()
            .unwrap()
            .insert(ptr, vec![0u8; len as usize]);
        ptr
    }

    fn store(&self, bytes: Vec<u8>) -> (u32, u32) {
        let len = bytes.len() as u32;
        let ptr = self.next_ptr.fetch_add(1, Ordering::SeqCst).max(1);
        self.buffers.lock().unwrap().insert(ptr, bytes);
        (ptr, len)
    }
}

impl LinearMemory for InMemoryMemory {
    fn read(&self, ptr: u32, len: u32) -> Vec<u8> {
        self.buffers
            .lock()
            .unwrap()
            .get(&ptr)
            .map(|buf| buf[..len as usize].to_vec())
            .unwrap_or_default()
    }

    fn write(&self, ptr: u32, bytes: &[u8]) {
        self.buffers.lock().unwrap().insert(ptr, bytes.to_vec());
    }
}

#[derive(Default)]
struct State {
    schema: Option<AppSchema>,
    queries: HashMap<String, Statement>,
    last_result: (u32, u32),
    last_error: (u32, u32),
}

/// An in-memory stand-in for the Dependency Engine.
pub struct InMemoryEngine {
    memory: InMemoryMemory,
    state: Mutex<State>,
}

impl Default for InMemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryEngine {
    pub fn new() -> Self {
        Self {
            memory: InMemoryMemory::default(),
            state: Mutex::new(State::default()),
        }
    }

    fn succeed(&self, bytes: Vec<u8>) -> u32 {
        let (ptr, len) = self.memory.store(bytes);
        self.state.lock().unwrap().last_result = (ptr, len);
        STATUS_OK
    }

    fn fail(&self, status: u32, message: &str) -> u32 {
        let body = serde_json::json!({ "message": message });
        let (ptr, len) = self.memory.store(serde_json::to_vec(&body).unwrap());
        self.state.lock().unwrap().last_error = (ptr, len);
        status
    }
}

impl RawEngine for InMemoryEngine {
    fn version(&self) -> u32 {
        let body = serde_json::json!({
            "core": env!("CARGO_PKG_VERSION"),
            "contract": "1",
            "abi": ABI_VERSION.to_string(),
        });
        self.succeed(serde_json::to_vec(&body).unwrap())
    }

    fn malloc(&self, len: u32) -> u32 {
        self.memory.alloc(len)
    }

    fn free(&self, ptr: u32, _len: u32) {
        self.memory.buffers.lock().unwrap().remove(&ptr);
    }

    fn set_schema(&self, ptr: u32, len: u32) -> u32 {
        let bytes = self.memory.read(ptr, len);
        match serde_json::from_slice::<AppSchema>(&bytes) {
            Ok(schema) => {
                self.state.lock().unwrap().schema = Some(schema);
                self.succeed(b"{}".to_vec())
            }
            Err(err) => self.fail(STATUS_SCHEMA_INVALID, &err.to_string()),
        }
    }

    fn compute_shape_id(&self, ptr: u32, len: u32) -> u32 {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let bytes = self.memory.read(ptr, len);
        let statement: Statement = match serde_json::from_slice(&bytes) {
            Ok(statement) => statement,
            Err(err) => return self.fail(STATUS_QUERY_INVALID, &err.to_string()),
        };
        let canonical = serde_json::to_string(&statement).unwrap_or_default();
        let mut hasher = DefaultHasher::new();
        canonical.hash(&mut hasher);
        let shape_id = format!("shape:{:016x}", hasher.finish());
        let body = serde_json::json!({ "shapeId": shape_id });
        self.succeed(serde_json::to_vec(&body).unwrap())
    }

    fn add_query(&self, ptr: u32, len: u32) -> u32 {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        #[derive(serde::Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Request {
            shape: Statement,
            #[serde(default)]
            result_hint: Option<serde_json::Value>,
        }
        let bytes = self.memory.read(ptr, len);
        let request: Request = match serde_json::from_slice(&bytes) {
            Ok(request) => request,
            Err(err) => return self.fail(STATUS_QUERY_INVALID, &err.to_string()),
        };

        let canonical = serde_json::to_string(&request.shape).unwrap_or_default();
        let mut hasher = DefaultHasher::new();
        canonical.hash(&mut hasher);
        let shape_id = format!("shape:{:016x}", hasher.finish());

        let record_count = match &request.result_hint {
            Some(serde_json::Value::Array(items)) => items.len() as u64,
            Some(_) => 1,
            None => 0,
        };
        let model_count = 1 + request.shape.include.as_ref().map_or(0, |inc| inc.len()) as u64;

        self.state
            .lock()
            .unwrap()
            .queries
            .insert(shape_id.clone(), request.shape);

        let body = serde_json::json!({
            "shapeId": shape_id,
            "dependencies": {
                "modelCount": model_count,
                "recordCount": record_count,
            },
        });
        self.succeed(serde_json::to_vec(&body).unwrap())
    }

    fn invalidate(&self, ptr: u32, len: u32) -> u32 {
        let bytes = self.memory.read(ptr, len);
        let mutation: Mutation = match serde_json::from_slice(&bytes) {
            Ok(mutation) => mutation,
            Err(err) => return self.fail(STATUS_MUTATION_INVALID, &err.to_string()),
        };
        let affected: Vec<String> = mutation
            .affected_models()
            .into_iter()
            .map(str::to_string)
            .collect();

        let mut state = self.state.lock().unwrap();
        let mut invalidated = Vec::new();
        state.queries.retain(|shape_id, statement| {
            if affected.contains(&statement.model) {
                invalidated.push(shape_id.clone());
                false
            } else {
                true
            }
        });
        drop(state);

        let body = serde_json::json!({ "evict": invalidated });
        self.succeed(serde_json::to_vec(&body).unwrap())
    }

    fn explain_invalidation(&self, ptr: u32, len: u32) -> u32 {
        #[derive(serde::Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Request {
            mutation: Mutation,
            shape_id: String,
        }
        let bytes = self.memory.read(ptr, len);
        let request: Request = match serde_json::from_slice(&bytes) {
            Ok(request) => request,
            Err(err) => return self.fail(STATUS_QUERY_INVALID, &err.to_string()),
        };
        let affected = request.mutation.affected_models();
        let state = self.state.lock().unwrap();
        let body = match state.queries.get(&request.shape_id) {
            Some(statement) => {
                if affected.contains(&statement.model.as_str()) {
                    serde_json::json!({
                        "invalidate": true,
                        "reasons": [format!("mutation touches model {}", statement.model)],
                    })
                } else {
                    serde_json::json!({
                        "invalidate": false,
                        "reasons": [] as [String; 0],
                    })
                }
            }
            None => serde_json::json!({
                "invalidate": false,
                "reasons": ["shape is not tracked"],
            }),
        };
        drop(state);
        self.succeed(serde_json::to_vec(&body).unwrap())
    }

    fn reset(&self) -> u32 {
        let mut state = self.state.lock().unwrap();
        state.schema = None;
        state.queries.clear();
        STATUS_OK
    }

    fn take_result(&self) -> (u32, u32) {
        self.state.lock().unwrap().last_result
    }

    fn last_error(&self) -> (u32, u32) {
        self.state.lock().unwrap().last_error
    }

    fn memory(&self) -> &dyn LinearMemory {
        &self.memory
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EngineClient;
    use ormcache_core::{Change, FilterCondition, FilterNode};

    #[test]
    fn compute_shape_id_is_deterministic_for_equal_statements() {
        let client = EngineClient::new(InMemoryEngine::new());
        let stmt = Statement::for_model("User")
            .with_filter(FilterNode::leaf(FilterCondition::eq("id", serde_json::json!("u1"))));
        let a = client.compute_shape_id(&stmt).unwrap();
        let b = client.compute_shape_id(&stmt).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn invalidate_reports_shapes_whose_model_was_touched() {
        let client = EngineClient::new(InMemoryEngine::new());
        let stmt = Statement::for_model("User");
        let (shape_id, _deps) = client.add_query(&stmt, None).unwrap();

        let mutation = Mutation::single(Change::Update {
            model: "User".to_string(),
            ids: None,
            filter: None,
            values: serde_json::json!({"active": false}),
        });
        let invalidated = client.invalidate(&mutation).unwrap();
        assert_eq!(invalidated, vec![shape_id]);
    }

    #[test]
    fn invalidate_ignores_unrelated_models() {
        let client = EngineClient::new(InMemoryEngine::new());
        let stmt = Statement::for_model("User");
        client.add_query(&stmt, None).unwrap();

        let mutation = Mutation::single(Change::Insert {
            model: "Post".to_string(),
            values: serde_json::json!({"title": "hi"}),
        });
        let invalidated = client.invalidate(&mutation).unwrap();
        assert!(invalidated.is_empty());
    }

    #[test]
    fn explain_invalidation_reports_whether_mutation_touches_tracked_shape() {
        let client = EngineClient::new(InMemoryEngine::new());
        let stmt = Statement::for_model("User");
        let (shape_id, _deps) = client.add_query(&stmt, None).unwrap();

        let touching = Mutation::single(Change::Update {
            model: "User".to_string(),
            ids: None,
            filter: None,
            values: serde_json::json!({"active": false}),
        });
        let result = client.explain_invalidation(&touching, &shape_id).unwrap();
        assert!(result.invalidate);

        let unrelated = Mutation::single(Change::Insert {
            model: "Post".to_string(),
            values: serde_json::json!({"title": "hi"}),
        });
        let result = client.explain_invalidation(&unrelated, &shape_id).unwrap();
        assert!(!result.invalidate);
    }
}
