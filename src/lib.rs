pub mod agent;
pub mod backend;
pub mod config;
pub mod error;
pub mod extract;
pub mod intent;
pub mod llm;
pub mod mcp;
pub mod model;
pub mod process;
pub mod query;
pub mod table;

use backend::SearchClient;
use config::BackendOptions;
use error::AgentError;
use model::SearchOutcome;
use query::SearchRequest;

/// One-shot search with a fresh client: filtered, sorted and truncated.
pub async fn search(
    request: SearchRequest,
    options: BackendOptions,
) -> Result<SearchOutcome, AgentError> {
    options.require_credentials()?;
    let client = SearchClient::new(options)?;
    client.search_advanced(&request).await
}
