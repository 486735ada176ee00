use sqlx::{MySqlPool, mysql::MySqlPoolOptions};

pub async fn init_db(database_url: &str, admin_username: Option<&str>) -> Result<MySqlPool, sqlx::Error> {
    let pool = MySqlPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id BIGINT AUTO_INCREMENT PRIMARY KEY,
            username VARCHAR(191) NOT NULL UNIQUE,
            email VARCHAR(191) NOT NULL UNIQUE,
            hashed_password VARCHAR(255) NOT NULL,
            display_name VARCHAR(255) NULL,
            role VARCHAR(16) NOT NULL DEFAULT 'author',
            created_at DATETIME(6) NOT NULL DEFAULT CURRENT_TIMESTAMP(6),
            updated_at DATETIME(6) NULL,
            CONSTRAINT chk_users_role CHECK (role IN ('author', 'editor', 'admin'))
        ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS articles (
            id BIGINT AUTO_INCREMENT PRIMARY KEY,
            doi VARCHAR(64) NOT NULL,
            doi_year SMALLINT UNSIGNED NOT NULL,
            doi_sequence INT UNSIGNED NOT NULL,
            title VARCHAR(500) NOT NULL,
            authors VARCHAR(1000) NOT NULL,
            orcid_ids JSON NOT NULL,
            article_type VARCHAR(64) NOT NULL,
            publication_date DATE NOT NULL,
            pdf_url TEXT NULL,
            resolver_url VARCHAR(255) NOT NULL,
            volume VARCHAR(4) NOT NULL,
            issue VARCHAR(4) NOT NULL,
            abstract_text TEXT NOT NULL,
            created_by BIGINT NULL,
            created_at DATETIME(6) NOT NULL DEFAULT CURRENT_TIMESTAMP(6),
            updated_at DATETIME(6) NULL,
            UNIQUE KEY uq_articles_doi (doi),
            UNIQUE KEY uq_articles_doi_year_sequence (doi_year, doi_sequence),
            INDEX idx_articles_volume_issue (volume, issue),
            CONSTRAINT fk_articles_created_by FOREIGN KEY (created_by) REFERENCES users(id) ON DELETE SET NULL
        ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS manuscript_submissions (
            id CHAR(36) PRIMARY KEY,
            user_id BIGINT NULL,
            title VARCHAR(500) NOT NULL,
            manuscript_type VARCHAR(64) NOT NULL,
            abstract_text TEXT NOT NULL,
            keywords VARCHAR(1000) NOT NULL,
            corresponding_author_name VARCHAR(255) NOT NULL,
            corresponding_author_email VARCHAR(255) NOT NULL,
            corresponding_author_affiliation VARCHAR(500) NOT NULL,
            corresponding_author_orcid VARCHAR(19) NULL,
            all_authors TEXT NOT NULL,
            cover_letter TEXT NULL,
            file_paths JSON NOT NULL,
            status VARCHAR(32) NOT NULL DEFAULT 'pending',
            assigned_reviewer_id BIGINT NULL,
            copyright_agreed BOOLEAN NOT NULL DEFAULT FALSE,
            copyright_signature VARCHAR(255) NOT NULL,
            decision_date DATETIME(6) NULL,
            created_at DATETIME(6) NOT NULL DEFAULT CURRENT_TIMESTAMP(6),
            updated_at DATETIME(6) NULL,
            INDEX idx_submissions_user_id_created_at (user_id, created_at),
            INDEX idx_submissions_status_created_at (status, created_at),
            CONSTRAINT chk_submissions_status CHECK (
                status IN ('pending', 'under_review', 'revisions_requested', 'accepted', 'rejected')
            ),
            CONSTRAINT fk_submissions_user_id FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE SET NULL,
            CONSTRAINT fk_submissions_assigned_reviewer_id FOREIGN KEY (assigned_reviewer_id) REFERENCES users(id) ON DELETE SET NULL
        ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS submission_reviews (
            id BIGINT AUTO_INCREMENT PRIMARY KEY,
            submission_id CHAR(36) NOT NULL,
            reviewer_id BIGINT NULL,
            action VARCHAR(32) NOT NULL,
            comment TEXT NULL,
            created_at DATETIME(6) NOT NULL DEFAULT CURRENT_TIMESTAMP(6),
            INDEX idx_submission_reviews_submission_created_at (submission_id, created_at),
            CONSTRAINT chk_submission_reviews_action CHECK (
                action IN ('note', 'request_revision', 'accept', 'reject', 'assign_reviewer', 'unlock')
            ),
            CONSTRAINT fk_submission_reviews_submission_id FOREIGN KEY (submission_id) REFERENCES manuscript_submissions(id) ON DELETE CASCADE,
            CONSTRAINT fk_submission_reviews_reviewer_id FOREIGN KEY (reviewer_id) REFERENCES users(id) ON DELETE SET NULL
        ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci
        "#,
    )
    .execute(&pool)
    .await?;

    if let Some(username) = admin_username {
        let result = sqlx::query("UPDATE users SET role = 'admin' WHERE username = ?")
            .bind(username)
            .execute(&pool)
            .await?;
        if result.rows_affected() > 0 {
            tracing::info!("Promoted {} to admin", username);
        }
    }

    Ok(pool)
}
