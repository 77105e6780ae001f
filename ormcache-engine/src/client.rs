//! The safe marshalling layer over [`RawEngine`].

use crate::abi::RawEngine;
use ormcache_core::{
    AppSchema, CacheError, DependenciesSummary, EngineError, EngineErrorCode, Mutation,
    SerializationError, ShapeId, Statement,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A type-safe facade over a [`RawEngine`], handling JSON marshalling, the
/// malloc/free/take_result/last_error dance, and status-code-to-error
/// translation.
pub struct EngineClient<E> {
    engine: E,
}

/// The engine's own version triple, as returned by `version()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub core: String,
    pub contract: String,
    pub abi: String,
}

/// The result of a diagnostic `explain_invalidation` call: whether the given
/// mutation would invalidate the given shape, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplainResult {
    pub invalidate: bool,
    pub reasons: Vec<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AddQueryRequest<'a> {
    shape: &'a Statement,
    #[serde(skip_serializing_if = "Option::is_none")]
    result_hint: Option<&'a serde_json::Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddQueryResponse {
    shape_id: String,
    dependencies: DependenciesSummary,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExplainRequest<'a> {
    mutation: &'a Mutation,
    shape_id: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ShapeIdResponse {
    shape_id: String,
}

#[derive(Deserialize)]
struct InvalidateResponse {
    evict: Vec<String>,
}

#[derive(Deserialize)]
struct EngineErrorPayload {
    message: String,
}

impl<E> EngineClient<E>
where
    E: RawEngine,
{
    pub fn new(engine: E) -> Self {
        Self { engine }
    }

    pub fn into_inner(self) -> E {
        self.engine
    }

    /// The engine's `{core, contract, abi}` version triple.
    pub fn version(&self) -> Result<VersionInfo, CacheError> {
        let bytes = self.invoke_noarg(|e| e.version())?;
        self.decode(&bytes, "version")
    }

    pub fn set_schema(&self, schema: &AppSchema) -> Result<(), CacheError> {
        let payload = self.encode(schema, "schema")?;
        self.invoke(&payload, |e, ptr, len| e.set_schema(ptr, len))?;
        Ok(())
    }

    pub fn compute_shape_id(&self, statement: &Statement) -> Result<ShapeId, CacheError> {
        let payload = self.encode(statement, "statement")?;
        let result = self.invoke(&payload, |e, ptr, len| e.compute_shape_id(ptr, len))?;
        let decoded: ShapeIdResponse = self.decode(&result, "shape id")?;
        Ok(ShapeId::new(decoded.shape_id))
    }

    /// Register a statement's dependencies with the engine. `result_hint`
    /// defaults to the fetched result itself when the caller doesn't supply
    /// a narrower hint. Returns the shape id the engine computed and a
    /// coarse summary of what it registered.
    pub fn add_query(
        &self,
        statement: &Statement,
        result_hint: Option<&serde_json::Value>,
    ) -> Result<(ShapeId, DependenciesSummary), CacheError> {
        let request = AddQueryRequest { shape: statement, result_hint };
        let payload = self.encode(&request, "add_query request")?;
        let result = self.invoke(&payload, |e, ptr, len| e.add_query(ptr, len))?;
        let decoded: AddQueryResponse = self.decode(&result, "add_query response")?;
        Ok((ShapeId::new(decoded.shape_id), decoded.dependencies))
    }

    /// Inform the engine of a mutation and get back the shapes it
    /// invalidates as a result.
    pub fn invalidate(&self, mutation: &Mutation) -> Result<Vec<ShapeId>, CacheError> {
        let payload = self.encode(mutation, "mutation")?;
        let result = self.invoke(&payload, |e, ptr, len| e.invalidate(ptr, len))?;
        let decoded: InvalidateResponse = self.decode(&result, "invalidate response")?;
        Ok(decoded.evict.into_iter().map(ShapeId::new).collect())
    }

    /// Diagnostic-only: ask the engine whether `mutation` would invalidate
    /// `shape_id`, and why. Not part of the read/write hot path.
    pub fn explain_invalidation(
        &self,
        mutation: &Mutation,
        shape_id: &ShapeId,
    ) -> Result<ExplainResult, CacheError> {
        let request = ExplainRequest {
            mutation,
            shape_id: shape_id.as_str(),
        };
        let payload = self.encode(&request, "explain request")?;
        let result = self.invoke(&payload, |e, ptr, len| e.explain_invalidation(ptr, len))?;
        self.decode(&result, "explain result")
    }

    pub fn reset(&self) -> Result<(), CacheError> {
        let status = self.engine.reset();
        if status != 0 {
            return Err(self.fetch_error(status).into());
        }
        Ok(())
    }

    fn encode<T: Serialize>(&self, value: &T, what: &'static str) -> Result<Vec<u8>, CacheError> {
        let json = serde_json::to_vec(value)
            .map_err(|err| SerializationError::Encode { what, reason: err.to_string() })?;
        if json.contains(&0u8) {
            return Err(SerializationError::ContainsNul.into());
        }
        Ok(json)
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8], what: &'static str) -> Result<T, CacheError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|err| SerializationError::InvalidUtf8 { reason: err.to_string() })?;
        serde_json::from_str(text)
            .map_err(|err| SerializationError::Decode { what, reason: err.to_string() }.into())
    }

    fn invoke(
        &self,
        payload: &[u8],
        call: impl FnOnce(&E, u32, u32) -> u32,
    ) -> Result<Vec<u8>, CacheError> {
        let len = payload.len() as u32;
        let ptr = self.engine.malloc(len);
        self.engine.memory().write(ptr, payload);
        let status = call(&self.engine, ptr, len);
        self.engine.free(ptr, len);
        if status != 0 {
            return Err(self.fetch_error(status).into());
        }
        // Fresh-buffer discipline: the result location is only asked for
        // after the call returns, and read immediately rather than through
        // any slice obtained before the call -- the engine's memory may have
        // grown underneath us.
        let (result_ptr, result_len) = self.engine.take_result();
        Ok(self.engine.memory().read(result_ptr, result_len))
    }

    fn invoke_noarg(&self, call: impl FnOnce(&E) -> u32) -> Result<Vec<u8>, CacheError> {
        let status = call(&self.engine);
        if status != 0 {
            return Err(self.fetch_error(status).into());
        }
        let (result_ptr, result_len) = self.engine.take_result();
        Ok(self.engine.memory().read(result_ptr, result_len))
    }

    fn fetch_error(&self, status: u32) -> EngineError {
        let (ptr, len) = self.engine.last_error();
        if len == 0 {
            return EngineError::from_status(status);
        }
        let bytes = self.engine.memory().read(ptr, len);
        let parsed = std::str::from_utf8(&bytes)
            .ok()
            .and_then(|s| serde_json::from_str::<EngineErrorPayload>(s).ok());
        match parsed {
            Some(payload) => EngineError::new(EngineErrorCode::from_status(status), payload.message),
            None => EngineError::from_status(status),
        }
    }
}
