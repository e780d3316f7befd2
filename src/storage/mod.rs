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

//! Storage Module
//!
//! Owns the single SQLite connection of the relay. Every statement, whatever
//! connection it arrives on, goes through [`SqlDatabase`] and runs under its lock.
//!
//! - `database.rs`: the locked connection and the command/query operations
//! - `schema.rs`: DDL applied at startup
//! - `tuple.rs`: textual rendering of result rows

pub use database::{DbOutcome, SqlDatabase};
pub use schema::{SQLITE_INIT, SQLITE_PRAGMAS};

mod database;
mod schema;
mod tuple;
