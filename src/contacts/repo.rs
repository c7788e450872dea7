use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::{Date, Duration};
use uuid::Uuid;

/// Contact record in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Contact {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub birthday: Option<Date>,
    pub user_id: Uuid,
}

/// Mutable part of a contact, already validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactFields {
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub birthday: Option<Date>,
}

/// Data access for contacts. Every operation is scoped to `user_id`;
/// rows of other users behave as if they did not exist.
#[async_trait]
pub trait ContactStore: Send + Sync {
    async fn list(&self, user_id: Uuid, offset: u32, limit: u32) -> anyhow::Result<Vec<Contact>>;
    async fn get(&self, user_id: Uuid, id: i64) -> anyhow::Result<Option<Contact>>;
    async fn create(&self, user_id: Uuid, fields: &ContactFields) -> anyhow::Result<Contact>;
    async fn update(&self, user_id: Uuid, id: i64, fields: &ContactFields) -> anyhow::Result<Option<Contact>>;
    async fn delete(&self, user_id: Uuid, id: i64) -> anyhow::Result<Option<Contact>>;
    async fn search(&self, user_id: Uuid, query: &str, offset: u32, limit: u32) -> anyhow::Result<Vec<Contact>>;
    async fn upcoming_birthdays(
        &self,
        user_id: Uuid,
        today: Date,
        offset: u32,
        limit: u32,
    ) -> anyhow::Result<Vec<Contact>>;
}

pub const BIRTHDAY_WINDOW_DAYS: i64 = 7;

/// `MM-DD` bounds of the upcoming-birthday window starting at `today`.
pub fn birthday_window(today: Date) -> (String, String) {
    let end = today.saturating_add(Duration::days(BIRTHDAY_WINDOW_DAYS));
    (month_day(today), month_day(end))
}

pub fn month_day(d: Date) -> String {
    format!("{:02}-{:02}", u8::from(d.month()), d.day())
}

/// Whether `birthday` falls in the window. A window whose end sorts before
/// its start crosses New Year and matches either side of it.
pub fn in_birthday_window(birthday: Date, start: &str, end: &str) -> bool {
    let md = month_day(birthday);
    if start <= end {
        start <= md.as_str() && md.as_str() <= end
    } else {
        md.as_str() >= start || md.as_str() <= end
    }
}

/// Escapes LIKE metacharacters so `query` matches literally.
pub fn escape_like(query: &str) -> String {
    let mut out = String::with_capacity(query.len());
    for c in query.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[derive(Clone)]
pub struct PgContactStore {
    db: PgPool,
}

impl PgContactStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

const CONTACT_COLUMNS: &str = "id, first_name, last_name, email, phone_number, birthday, user_id";

#[async_trait]
impl ContactStore for PgContactStore {
    async fn list(&self, user_id: Uuid, offset: u32, limit: u32) -> anyhow::Result<Vec<Contact>> {
        let rows = sqlx::query_as::<_, Contact>(&format!(
            r#"
            SELECT {CONTACT_COLUMNS}
            FROM contacts
            WHERE user_id = $1
            ORDER BY id
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(user_id)
        .bind(i64::from(limit))
        .bind(i64::from(offset))
        .fetch_all(&self.db)
        .await
        .context("list contacts")?;
        Ok(rows)
    }

    async fn get(&self, user_id: Uuid, id: i64) -> anyhow::Result<Option<Contact>> {
        let row = sqlx::query_as::<_, Contact>(&format!(
            "SELECT {CONTACT_COLUMNS} FROM contacts WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await
        .context("get contact")?;
        Ok(row)
    }

    async fn create(&self, user_id: Uuid, fields: &ContactFields) -> anyhow::Result<Contact> {
        let row = sqlx::query_as::<_, Contact>(&format!(
            r#"
            INSERT INTO contacts (first_name, last_name, email, phone_number, birthday, user_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {CONTACT_COLUMNS}
            "#
        ))
        .bind(&fields.first_name)
        .bind(&fields.last_name)
        .bind(&fields.email)
        .bind(&fields.phone_number)
        .bind(fields.birthday)
        .bind(user_id)
        .fetch_one(&self.db)
        .await
        .context("insert contact")?;
        Ok(row)
    }

    async fn update(&self, user_id: Uuid, id: i64, fields: &ContactFields) -> anyhow::Result<Option<Contact>> {
        let row = sqlx::query_as::<_, Contact>(&format!(
            r#"
            UPDATE contacts
               SET first_name = $3, last_name = $4, email = $5, phone_number = $6, birthday = $7
             WHERE id = $1 AND user_id = $2
            RETURNING {CONTACT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(user_id)
        .bind(&fields.first_name)
        .bind(&fields.last_name)
        .bind(&fields.email)
        .bind(&fields.phone_number)
        .bind(fields.birthday)
        .fetch_optional(&self.db)
        .await
        .context("update contact")?;
        Ok(row)
    }

    async fn delete(&self, user_id: Uuid, id: i64) -> anyhow::Result<Option<Contact>> {
        let row = sqlx::query_as::<_, Contact>(&format!(
            "DELETE FROM contacts WHERE id = $1 AND user_id = $2 RETURNING {CONTACT_COLUMNS}"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await
        .context("delete contact")?;
        Ok(row)
    }

    async fn search(&self, user_id: Uuid, query: &str, offset: u32, limit: u32) -> anyhow::Result<Vec<Contact>> {
        let pattern = format!("%{}%", escape_like(query));
        let rows = sqlx::query_as::<_, Contact>(&format!(
            r#"
            SELECT {CONTACT_COLUMNS}
            FROM contacts
            WHERE user_id = $1
              AND (first_name ILIKE $2 OR last_name ILIKE $2 OR email ILIKE $2)
            ORDER BY id
            LIMIT $3 OFFSET $4
            "#
        ))
        .bind(user_id)
        .bind(pattern)
        .bind(i64::from(limit))
        .bind(i64::from(offset))
        .fetch_all(&self.db)
        .await
        .context("search contacts")?;
        Ok(rows)
    }

    async fn upcoming_birthdays(
        &self,
        user_id: Uuid,
        today: Date,
        offset: u32,
        limit: u32,
    ) -> anyhow::Result<Vec<Contact>> {
        let (start, end) = birthday_window(today);
        let rows = sqlx::query_as::<_, Contact>(&format!(
            r#"
            SELECT {CONTACT_COLUMNS}
            FROM contacts
            WHERE user_id = $1
              AND birthday IS NOT NULL
              AND CASE WHEN $2 <= $3
                       THEN TO_CHAR(birthday, 'MM-DD') BETWEEN $2 AND $3
                       ELSE TO_CHAR(birthday, 'MM-DD') >= $2 OR TO_CHAR(birthday, 'MM-DD') <= $3
                  END
            ORDER BY id
            LIMIT $4 OFFSET $5
            "#
        ))
        .bind(user_id)
        .bind(start)
        .bind(end)
        .bind(i64::from(limit))
        .bind(i64::from(offset))
        .fetch_all(&self.db)
        .await
        .context("contacts by upcoming birthday")?;
        Ok(rows)
    }
}
