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

use std::fmt;

use crate::storage::DbOutcome;

const SUCCESS_MARKER: &str = "SUCCESS";
const ERROR_PREFIX: &str = "ERROR:";
const ROW_SEPARATOR: char = '|';

/// One reply on the wire, without its delimiter.
///
/// - `SUCCESS`
/// - `SUCCESS|<tuple1>|<tuple2>|...`
/// - `ERROR:<message>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// rendered row tuples, empty when there is nothing to report
    Success(Vec<String>),
    Error(String),
}

impl Response {
    /// Parses a reply as received by a client.
    ///
    /// Row tuples are split on `|`. A text value that itself contains `|` cannot be told
    /// apart from a separator, the wire format has no escaping for it.
    pub fn parse(raw: &str) -> Option<Response> {
        if let Some(message) = raw.strip_prefix(ERROR_PREFIX) {
            return Some(Response::Error(message.to_string()));
        }
        let rest = raw.strip_prefix(SUCCESS_MARKER)?;
        if rest.is_empty() {
            return Some(Response::Success(Vec::new()));
        }
        let rows = rest.strip_prefix(ROW_SEPARATOR)?;
        Some(Response::Success(
            rows.split(ROW_SEPARATOR).map(str::to_string).collect(),
        ))
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Response::Success(_))
    }
}

impl From<DbOutcome> for Response {
    fn from(outcome: DbOutcome) -> Self {
        match outcome {
            DbOutcome::Success => Response::Success(Vec::new()),
            DbOutcome::Rows(rows) => Response::Success(rows),
            DbOutcome::Failed(message) => Response::Error(message),
        }
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::Success(rows) => {
                f.write_str(SUCCESS_MARKER)?;
                for row in rows {
                    write!(f, "{}{}", ROW_SEPARATOR, row)?;
                }
                Ok(())
            }
            Response::Error(message) => write!(f, "{}{}", ERROR_PREFIX, message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render() {
        assert_eq!(Response::Success(vec![]).to_string(), "SUCCESS");
        assert_eq!(
            Response::Success(vec!["('alice',)".into(), "('bob',)".into()]).to_string(),
            "SUCCESS|('alice',)|('bob',)"
        );
        assert_eq!(
            Response::Error("near \"SELEC\": syntax error".into()).to_string(),
            "ERROR:near \"SELEC\": syntax error"
        );
    }

    #[test]
    fn test_from_outcome() {
        assert_eq!(Response::from(DbOutcome::Success).to_string(), "SUCCESS");
        assert_eq!(
            Response::from(DbOutcome::Rows(vec!["(1,)".into()])).to_string(),
            "SUCCESS|(1,)"
        );
        assert_eq!(
            Response::from(DbOutcome::Failed("no such table: x".into())).to_string(),
            "ERROR:no such table: x"
        );
    }

    #[test]
    fn test_parse() {
        assert_eq!(Response::parse("SUCCESS"), Some(Response::Success(vec![])));
        assert_eq!(
            Response::parse("SUCCESS|('alice',)|('bob',)"),
            Some(Response::Success(vec!["('alice',)".into(), "('bob',)".into()]))
        );
        assert_eq!(
            Response::parse("ERROR:incomplete input"),
            Some(Response::Error("incomplete input".into()))
        );
        assert_eq!(Response::parse("ERROR:"), Some(Response::Error(String::new())));
        assert_eq!(Response::parse("SUCCESSFUL"), None);
        assert_eq!(Response::parse("garbage"), None);
    }
}
