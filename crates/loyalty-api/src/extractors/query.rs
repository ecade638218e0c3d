//! Query string extractor
//!
//! Wraps `Query` so malformed filters render as API errors.

use axum::{
    async_trait,
    extract::{FromRequestParts, Query},
    http::request::Parts,
};
use serde::de::DeserializeOwned;

use crate::response::ApiError;

#[derive(Debug, Clone)]
pub struct ApiQuery<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|e| ApiError::invalid_query(e.body_text()))?;
        Ok(ApiQuery(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use loyalty_service::dto::TransactionListQuery;

    async fn parse(uri: &str) -> Result<TransactionListQuery, ApiError> {
        let (mut parts, ()) = Request::builder().uri(uri).body(()).unwrap().into_parts();
        ApiQuery::<TransactionListQuery>::from_request_parts(&mut parts, &())
            .await
            .map(|ApiQuery(q)| q)
    }

    #[tokio::test]
    async fn test_transaction_filters() {
        let query = parse("/transactions?type=purchase&suspicious=true&page=2")
            .await
            .unwrap();
        assert_eq!(query.kind, Some(loyalty_core::TransactionKind::Purchase));
        assert_eq!(query.suspicious, Some(true));
        assert_eq!(query.page, Some(2));
    }

    #[tokio::test]
    async fn test_malformed_filter_rejected() {
        let err = parse("/transactions?page=abc").await.unwrap_err();
        assert_eq!(err.error_code(), "INVALID_QUERY_PARAMETER");
    }
}
