/// User records
use crate::db::{parse_timestamp, text_enum, tool::Source};
use crate::error::MarketResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

text_enum! {
    Role, "role" {
        User => "user",
        Admin => "admin",
    }
}

/// User record in the database
///
/// The password hash never leaves the store layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub company_name: String,
    pub email: String,
    #[serde(skip)]
    pub password_hash: String,
    pub role: Role,
    pub company_logo_url: String,
    pub source: Source,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub const USER_COLUMNS: &str =
    "id, company_name, email, password_hash, role, company_logo_url, source, created_at, updated_at";

impl User {
    pub fn from_row(row: &SqliteRow) -> MarketResult<Self> {
        Ok(User {
            id: row.get("id"),
            company_name: row.get("company_name"),
            email: row.get("email"),
            password_hash: row.get("password_hash"),
            role: Role::parse(&row.get::<String, _>("role"))?,
            company_logo_url: row.get("company_logo_url"),
            source: Source::parse(&row.get::<String, _>("source"))?,
            created_at: parse_timestamp(&row.get::<String, _>("created_at"))?,
            updated_at: parse_timestamp(&row.get::<String, _>("updated_at"))?,
        })
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}
