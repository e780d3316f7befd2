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

//! DDL applied once when the relay opens its database.

/// Foreign keys are a per-connection setting in SQLite, not a file property,
/// so this must run on every open.
pub const SQLITE_PRAGMAS: &str = "PRAGMA foreign_keys = ON;";

/// - `users`: username is the primary key
/// - `login_history`: (username, login_time) primary key, cascades from `users`
/// - `file_tracking`: autoincrement id, cascades from `users`
pub const SQLITE_INIT: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    username TEXT PRIMARY KEY,
    password TEXT NOT NULL,
    registration_date TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS login_history (
    username TEXT NOT NULL,
    login_time TEXT NOT NULL,
    logout_time TEXT,
    PRIMARY KEY(username, login_time),
    FOREIGN KEY(username) REFERENCES users(username) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS file_tracking (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL,
    filename TEXT NOT NULL,
    upload_time TEXT NOT NULL,
    game_channel TEXT NOT NULL,
    FOREIGN KEY(username) REFERENCES users(username) ON DELETE CASCADE
);
"#;
