// Copyright 2025 jonefeewang@gmail.com
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::sync::Arc;

use tracing::trace;

use crate::request::Response;
use crate::storage::SqlDatabase;
use crate::AppResult;

const QUERY_KEYWORD: &str = "SELECT";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Query,
    Command,
}

impl RequestKind {
    /// A statement is a query when, once trimmed, it starts with `SELECT` in any ASCII
    /// case. This is a prefix test, not a parse: anything else (comments first, `WITH`,
    /// a typo) goes down the command path and the engine has the final word.
    pub fn classify(statement: &str) -> RequestKind {
        let is_query = statement
            .trim()
            .get(..QUERY_KEYWORD.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(QUERY_KEYWORD));
        if is_query {
            RequestKind::Query
        } else {
            RequestKind::Command
        }
    }
}

pub struct RequestProcessor;

impl RequestProcessor {
    /// Produces exactly one response for one message.
    ///
    /// The statement runs on the blocking pool since the database lock and SQLite I/O
    /// are synchronous. Engine failures come back as `Response::Error`; only a worker
    /// that panicked or was cancelled surfaces as `Err`.
    pub async fn process_request(
        message: &str,
        database: &Arc<SqlDatabase>,
    ) -> AppResult<Response> {
        let statement = message.trim().to_string();
        let kind = RequestKind::classify(&statement);
        trace!("processing {:?}: {}", kind, statement);

        let database = Arc::clone(database);
        let outcome = tokio::task::spawn_blocking(move || match kind {
            RequestKind::Query => database.execute_query(&statement),
            RequestKind::Command => database.execute_command(&statement),
        })
        .await?;

        Ok(Response::from(outcome))
    }
}
