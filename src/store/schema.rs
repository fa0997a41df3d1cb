pub const SCHEMA: &str = r#"
-- Users own credentials and the admin flag
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,       -- argon2id hash with embedded salt
    is_admin INTEGER NOT NULL DEFAULT 0,
    is_root INTEGER NOT NULL DEFAULT 0, -- the bootstrap administrator
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now'))
);

-- Resource permissions: at most one grant per (resource, user)
CREATE TABLE IF NOT EXISTS resource_permissions (
    resource_id TEXT NOT NULL,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    level TEXT NOT NULL CHECK (level IN ('READ', 'EDIT', 'MANAGE')),
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now')),
    PRIMARY KEY (resource_id, user_id)
);

-- Sessions are keyed by the SHA-256 digest of the cookie token
CREATE TABLE IF NOT EXISTS sessions (
    token_digest TEXT PRIMARY KEY,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    username TEXT NOT NULL,            -- snapshot at login
    created_at TEXT NOT NULL,
    expires_at TEXT NOT NULL
);

-- Host resources (experiments) guarded by resource permissions
CREATE TABLE IF NOT EXISTS resources (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    created_at TEXT DEFAULT (datetime('now'))
);

-- The default resource always exists and cannot be deleted
INSERT OR IGNORE INTO resources (id, name) VALUES ('0', 'Default');

-- Create indexes
CREATE UNIQUE INDEX IF NOT EXISTS idx_users_single_root ON users(is_root) WHERE is_root = 1;
CREATE INDEX IF NOT EXISTS idx_resource_permissions_user ON resource_permissions(user_id);
CREATE INDEX IF NOT EXISTS idx_sessions_expires ON sessions(expires_at);
CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id);
"#;
