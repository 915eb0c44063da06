//! SQL schema for the SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS problems (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    title            TEXT    NOT NULL CHECK (length(title) <= 255),
    description      TEXT    NOT NULL,
    responsible_team TEXT    NOT NULL,
    status           TEXT    NOT NULL DEFAULT 'open'
                             CHECK (status IN ('open', 'closed')),
    created_at       TEXT    NOT NULL   -- RFC 3339 UTC, fixed width
);

-- Adjacency list: each cause points at the cause it explains.
-- Deleting a problem or a cause removes everything below it.
CREATE TABLE IF NOT EXISTS root_causes (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    problem_id    INTEGER NOT NULL REFERENCES problems(id)    ON DELETE CASCADE,
    parent_id     INTEGER          REFERENCES root_causes(id) ON DELETE CASCADE,
    cause_text    TEXT    NOT NULL,
    is_root_cause INTEGER NOT NULL DEFAULT 0 CHECK (is_root_cause IN (0, 1)),
    action_plan   TEXT,
    level         INTEGER NOT NULL DEFAULT 0 CHECK (level >= 0),
    created_at    TEXT    NOT NULL,
    CHECK (is_root_cause = 0 OR (action_plan IS NOT NULL AND action_plan <> ''))
);

CREATE INDEX IF NOT EXISTS problems_status_idx     ON problems(status);
CREATE INDEX IF NOT EXISTS problems_team_idx       ON problems(responsible_team);
CREATE INDEX IF NOT EXISTS root_causes_problem_idx ON root_causes(problem_id, level, created_at);
CREATE INDEX IF NOT EXISTS root_causes_parent_idx  ON root_causes(parent_id);

-- At most one identified root cause per problem.
CREATE UNIQUE INDEX IF NOT EXISTS root_causes_single_root_idx
    ON root_causes(problem_id) WHERE is_root_cause = 1;

PRAGMA user_version = 1;
";
