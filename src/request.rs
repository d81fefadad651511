//! Request decoding
//!
//! Turns an untrusted body into a flattened query batch. Validation is
//! all-or-nothing: the first bad query rejects the whole request.
//!
//! ```text
//! { "queries": [[f32, ...], ...],   // required, every row == index dimension
//!   "top_k": int }                  // optional, advisory
//! ```

use serde_json::Value;

use crate::error::RequestError;

/// Field holding the list of query vectors
pub const QUERIES_FIELD: &str = "queries";

/// Optional per-request result count
pub const TOP_K_FIELD: &str = "top_k";

const QUERIES_SHAPE: &str = "an array of arrays of 32-bit float numbers";

/// Query vectors flattened row-major, `num_queries * dimension` long
#[derive(Debug, Clone, PartialEq)]
pub struct QueryBatch {
    pub vectors: Vec<f32>,
    pub num_queries: usize,
    pub dimension: usize,
}

impl QueryBatch {
    pub fn is_empty(&self) -> bool {
        self.num_queries == 0
    }

    #[cfg(test)]
    pub fn row(&self, i: usize) -> &[f32] {
        &self.vectors[i * self.dimension..(i + 1) * self.dimension]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedRequest {
    pub batch: QueryBatch,
    /// Raw `top_k` when it was a JSON integer; not yet checked for sign
    pub top_k: Option<i64>,
}

/// Decode a request body against an index of `dimension` components.
pub fn decode(body: &[u8], dimension: usize) -> Result<DecodedRequest, RequestError> {
    let root: Value =
        serde_json::from_slice(body).map_err(|e| RequestError::MalformedPayload(e.to_string()))?;

    let Value::Object(fields) = root else {
        return Err(RequestError::MalformedPayload(
            "root value must be an object".into(),
        ));
    };

    let queries = fields
        .get(QUERIES_FIELD)
        .ok_or(RequestError::MissingField(QUERIES_FIELD))?
        .as_array()
        .ok_or(RequestError::TypeMismatch {
            field: QUERIES_FIELD,
            expected: QUERIES_SHAPE,
        })?;

    // Malformed or absent top_k is ignored, never an error
    let top_k = fields.get(TOP_K_FIELD).and_then(Value::as_i64);

    let mut vectors = Vec::with_capacity(queries.len().saturating_mul(dimension));
    for (position, query) in queries.iter().enumerate() {
        let components = query.as_array().ok_or(RequestError::TypeMismatch {
            field: QUERIES_FIELD,
            expected: QUERIES_SHAPE,
        })?;

        if components.len() != dimension {
            return Err(RequestError::DimensionMismatch {
                position,
                expected: dimension,
                actual: components.len(),
            });
        }

        for component in components {
            // Numbers beyond the f32 range would become infinities
            let value = component
                .as_f64()
                .map(|v| v as f32)
                .filter(|v| v.is_finite())
                .ok_or(RequestError::TypeMismatch {
                    field: QUERIES_FIELD,
                    expected: QUERIES_SHAPE,
                })?;
            vectors.push(value);
        }
    }

    Ok(DecodedRequest {
        batch: QueryBatch {
            vectors,
            num_queries: queries.len(),
            dimension,
        },
        top_k,
    })
}
