pub mod mock;

use crate::errors::CoreResult;
use crate::models::{QueryParameterValues, StatementResult};
use std::future::Future;
use std::pin::Pin;

pub type ApiFuture<T> = Pin<Box<dyn Future<Output = CoreResult<T>> + Send>>;

/// Statement-execution contract the runner executes through. Methods
/// return boxed futures so implementations stay usable behind a trait
/// object; the backend in use is selected once at session wiring.
///
/// A failed statement is a `FAILED` result, not an `Err`; `Err` is
/// reserved for transport-level failures.
pub trait QueryApi: Send + Sync {
    fn execute_statement(
        &self,
        statement: String,
        parameters: QueryParameterValues,
    ) -> ApiFuture<StatementResult>;

    fn get_statement_status(&self, statement_id: String) -> ApiFuture<StatementResult>;

    fn get_chunk(&self, statement_id: String, chunk_index: u32) -> ApiFuture<StatementResult>;

    fn cancel_statement(&self, statement_id: String) -> ApiFuture<bool>;
}
