use rusqlite::Connection;

/// Initialize the main database schema (everything except audit logs)
pub fn init_db(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        -- Courses. title/description are LocalizedText JSON (plain string or {en,tg}).
        CREATE TABLE IF NOT EXISTS courses (
            id TEXT PRIMARY KEY,
            slug TEXT NOT NULL UNIQUE,
            title TEXT NOT NULL,
            description TEXT,
            price_cents INTEGER NOT NULL CHECK (price_cents >= 0),
            category TEXT NOT NULL CHECK (category IN ('trading', 'programming', 'design', 'marketing', 'language', 'other')),
            level TEXT NOT NULL CHECK (level IN ('beginner', 'intermediate', 'advanced')),
            status TEXT NOT NULL DEFAULT 'active' CHECK (status IN ('active', 'inactive', 'archived')),
            is_public INTEGER NOT NULL DEFAULT 1,
            current_version INTEGER NOT NULL DEFAULT 1 CHECK (current_version >= 1),
            thumbnail_key TEXT,
            total_enrollments INTEGER NOT NULL DEFAULT 0,
            archived_at INTEGER,
            archive_reason TEXT,
            archive_grace_until INTEGER,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_courses_status ON courses(status);
        CREATE INDEX IF NOT EXISTS idx_courses_category ON courses(category);

        -- Course versions: append-only snapshots, unique per (course, number).
        CREATE TABLE IF NOT EXISTS course_versions (
            id TEXT PRIMARY KEY,
            course_id TEXT NOT NULL REFERENCES courses(id),
            version_number INTEGER NOT NULL,
            title TEXT NOT NULL,
            description TEXT,
            price_cents INTEGER NOT NULL,
            level TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'active' CHECK (status IN ('active', 'inactive', 'archived')),
            is_public INTEGER NOT NULL DEFAULT 1,
            thumbnail_key TEXT,
            change_log TEXT,
            created_at INTEGER NOT NULL,
            UNIQUE(course_id, version_number)
        );
        CREATE INDEX IF NOT EXISTS idx_course_versions_course ON course_versions(course_id);

        -- Videos: owned by one course+version; blob deleted best-effort before the row.
        CREATE TABLE IF NOT EXISTS videos (
            id TEXT PRIMARY KEY,
            course_id TEXT NOT NULL REFERENCES courses(id),
            version_number INTEGER NOT NULL,
            title TEXT,
            blob_key TEXT NOT NULL,
            size_bytes INTEGER NOT NULL,
            mime_type TEXT NOT NULL,
            display_order INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_videos_course_version ON videos(course_id, version_number);

        CREATE TABLE IF NOT EXISTS materials (
            id TEXT PRIMARY KEY,
            course_id TEXT NOT NULL REFERENCES courses(id),
            version_number INTEGER NOT NULL,
            title TEXT,
            blob_key TEXT NOT NULL,
            size_bytes INTEGER NOT NULL,
            mime_type TEXT NOT NULL,
            display_order INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_materials_course_version ON materials(course_id, version_number);

        -- Bundles mirror courses minus versioning.
        CREATE TABLE IF NOT EXISTS bundles (
            id TEXT PRIMARY KEY,
            slug TEXT NOT NULL UNIQUE,
            title TEXT NOT NULL,
            description TEXT,
            price_cents INTEGER NOT NULL CHECK (price_cents >= 0),
            status TEXT NOT NULL DEFAULT 'active' CHECK (status IN ('active', 'inactive', 'archived')),
            is_public INTEGER NOT NULL DEFAULT 1,
            thumbnail_key TEXT,
            total_enrollments INTEGER NOT NULL DEFAULT 0,
            archived_at INTEGER,
            archive_reason TEXT,
            archive_grace_until INTEGER,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );

        -- Non-owning bundle -> course reference set.
        CREATE TABLE IF NOT EXISTS bundle_courses (
            bundle_id TEXT NOT NULL REFERENCES bundles(id),
            course_id TEXT NOT NULL,
            position INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (bundle_id, course_id)
        );
        CREATE INDEX IF NOT EXISTS idx_bundle_courses_course ON bundle_courses(course_id);

        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            name TEXT,
            role TEXT NOT NULL DEFAULT 'student' CHECK (role IN ('student', 'admin')),
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );

        -- Authoritative entitlements. The unique index makes concurrent
        -- double-purchase attempts collapse into a single grant.
        CREATE TABLE IF NOT EXISTS enrollments (
            id TEXT PRIMARY KEY,
            item_type TEXT NOT NULL CHECK (item_type IN ('course', 'bundle')),
            item_id TEXT NOT NULL,
            user_id TEXT NOT NULL REFERENCES users(id),
            granted_by TEXT NOT NULL CHECK (granted_by IN ('payment', 'admin')),
            status TEXT NOT NULL DEFAULT 'active' CHECK (status IN ('active', 'revoked')),
            version_enrolled INTEGER,
            enrolled_at INTEGER NOT NULL,
            UNIQUE(item_type, item_id, user_id)
        );
        CREATE INDEX IF NOT EXISTS idx_enrollments_user ON enrollments(user_id);
        CREATE INDEX IF NOT EXISTS idx_enrollments_item ON enrollments(item_type, item_id);

        -- Denormalized read-path projection of purchases (set semantics).
        CREATE TABLE IF NOT EXISTS user_purchases (
            user_id TEXT NOT NULL REFERENCES users(id),
            item_type TEXT NOT NULL CHECK (item_type IN ('course', 'bundle')),
            item_id TEXT NOT NULL,
            purchased_at INTEGER NOT NULL,
            PRIMARY KEY (user_id, item_type, item_id)
        );
        CREATE INDEX IF NOT EXISTS idx_user_purchases_item ON user_purchases(item_type, item_id);

        -- Payment ledger. session_id unique: webhook replays upsert the same row.
        CREATE TABLE IF NOT EXISTS payments (
            id TEXT PRIMARY KEY,
            session_id TEXT NOT NULL UNIQUE,
            user_id TEXT NOT NULL,
            course_id TEXT,
            bundle_id TEXT,
            amount_cents INTEGER NOT NULL,
            currency TEXT NOT NULL,
            status TEXT NOT NULL CHECK (status IN ('pending', 'completed', 'failed')),
            payment_method TEXT NOT NULL,
            item_title TEXT NOT NULL,
            user_email TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            CHECK ((course_id IS NULL) != (bundle_id IS NULL))
        );
        CREATE INDEX IF NOT EXISTS idx_payments_user ON payments(user_id);
        CREATE INDEX IF NOT EXISTS idx_payments_user_course ON payments(user_id, course_id);
        CREATE INDEX IF NOT EXISTS idx_payments_user_bundle ON payments(user_id, bundle_id);

        -- Certificates: course_id is a back-reference only (no FK, no cascade).
        -- Preserved across course deletion; course_title is a snapshot for
        -- exactly that reason.
        CREATE TABLE IF NOT EXISTS certificates (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id),
            course_id TEXT NOT NULL,
            course_title TEXT NOT NULL,
            blob_key TEXT,
            issued_at INTEGER NOT NULL,
            UNIQUE(user_id, course_id)
        );
        CREATE INDEX IF NOT EXISTS idx_certificates_course ON certificates(course_id);

        CREATE TABLE IF NOT EXISTS progress (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id),
            course_id TEXT NOT NULL,
            version_number INTEGER NOT NULL,
            completed_videos TEXT NOT NULL DEFAULT '[]',
            percent INTEGER NOT NULL DEFAULT 0,
            updated_at INTEGER NOT NULL,
            UNIQUE(user_id, course_id)
        );
        CREATE INDEX IF NOT EXISTS idx_progress_course ON progress(course_id);
        "#,
    )?;
    Ok(())
}

/// Initialize the audit log database schema (separate DB file)
/// Optimized for append-only workload with WAL mode
pub fn init_audit_db(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA wal_autocheckpoint = 1000;
        PRAGMA journal_size_limit = 67108864;

        CREATE TABLE IF NOT EXISTS audit_logs (
            id TEXT PRIMARY KEY,
            timestamp INTEGER NOT NULL,
            action TEXT NOT NULL,
            resource_type TEXT NOT NULL,
            resource_id TEXT NOT NULL,
            resource_title TEXT,
            performed_by TEXT NOT NULL,
            details TEXT,
            deletion_summary TEXT,
            ip_address TEXT,
            user_agent TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_audit_logs_timestamp ON audit_logs(timestamp);
        CREATE INDEX IF NOT EXISTS idx_audit_logs_resource ON audit_logs(resource_type, resource_id);
        CREATE INDEX IF NOT EXISTS idx_audit_logs_actor ON audit_logs(performed_by);
        "#,
    )?;
    Ok(())
}
