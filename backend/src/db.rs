use chrono::Utc;
use diesel::prelude::*;
use diesel_async::{
    pooled_connection::{deadpool::Pool, AsyncDieselConnectionManager, ManagerConfig},
    AsyncPgConnection, RunQueryDsl,
};
use uuid::Uuid;

pub type DbPool = Pool<AsyncPgConnection>;

async fn establish_tls_connection(config: String) -> diesel::ConnectionResult<AsyncPgConnection> {
    // Set up rustls TLS configuration
    let root_store =
        rustls::RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let tls_config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();
    let tls = tokio_postgres_rustls::MakeRustlsConnect::new(tls_config);

    // Parse the connection string and connect with TLS
    let (client, connection) = tokio_postgres::connect(&config, tls)
        .await
        .map_err(|e| diesel::ConnectionError::BadConnection(e.to_string()))?;

    // Spawn the connection task
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::error!("Connection error: {}", e);
        }
    });

    // Build the async connection from the tokio-postgres client
    AsyncPgConnection::try_from(client).await
}

pub fn establish_connection_pool() -> anyhow::Result<DbPool> {
    let database_url = std::env::var("DATABASE_URL")
        .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?;

    let mut manager_config = ManagerConfig::default();
    manager_config.custom_setup =
        Box::new(|url| Box::pin(establish_tls_connection(url.to_string())));

    let config = AsyncDieselConnectionManager::<AsyncPgConnection>::new_with_config(
        database_url,
        manager_config,
    );
    let pool = Pool::builder(config).build()?;

    Ok(pool)
}

// Account database operations
pub mod accounts {
    use super::*;
    use crate::models::AccountRow;

    pub async fn list_all(conn: &mut AsyncPgConnection) -> anyhow::Result<Vec<AccountRow>> {
        use crate::schema::accounts::dsl::*;

        let rows = accounts
            .order_by(created_at.desc())
            .load::<AccountRow>(conn)
            .await?;

        Ok(rows)
    }

    pub async fn get_by_id(
        conn: &mut AsyncPgConnection,
        account_id: Uuid,
    ) -> anyhow::Result<Option<AccountRow>> {
        use crate::schema::accounts::dsl::*;

        let row = accounts
            .filter(id.eq(account_id))
            .first::<AccountRow>(conn)
            .await
            .optional()?;

        Ok(row)
    }

    pub async fn delete(conn: &mut AsyncPgConnection, account_id: Uuid) -> anyhow::Result<()> {
        use crate::schema::accounts::dsl::*;

        diesel::delete(accounts.filter(id.eq(account_id)))
            .execute(conn)
            .await?;

        Ok(())
    }
}

// Category database operations
pub mod categories {
    use super::*;
    use crate::models::{CategoryRow, NewCategory};
    use shared::models::Category;

    pub async fn list_for_account(
        conn: &mut AsyncPgConnection,
        account: Uuid,
    ) -> anyhow::Result<Vec<Category>> {
        use crate::schema::categories::dsl::*;

        let rows = categories
            .filter(account_id.eq(account))
            .order_by(key.asc())
            .load::<CategoryRow>(conn)
            .await?;

        rows.into_iter().map(|r| r.into_category()).collect()
    }

    pub async fn list_enabled(
        conn: &mut AsyncPgConnection,
        account: Uuid,
    ) -> anyhow::Result<Vec<Category>> {
        use crate::schema::categories::dsl::*;

        let rows = categories
            .filter(account_id.eq(account))
            .filter(enabled.eq(true))
            .order_by(key.asc())
            .load::<CategoryRow>(conn)
            .await?;

        rows.into_iter().map(|r| r.into_category()).collect()
    }

    pub async fn get_by_id(
        conn: &mut AsyncPgConnection,
        category_id: Uuid,
        account: Uuid,
    ) -> anyhow::Result<Option<Category>> {
        use crate::schema::categories::dsl::*;

        let row = categories
            .filter(id.eq(category_id))
            .filter(account_id.eq(account))
            .first::<CategoryRow>(conn)
            .await
            .optional()?;

        row.map(|r| r.into_category()).transpose()
    }

    pub async fn insert(
        conn: &mut AsyncPgConnection,
        new_category: NewCategory,
    ) -> anyhow::Result<Category> {
        use crate::schema::categories::dsl::*;

        let row = diesel::insert_into(categories)
            .values(&new_category)
            .get_result::<CategoryRow>(conn)
            .await?;

        row.into_category()
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn update_fields(
        conn: &mut AsyncPgConnection,
        category_id: Uuid,
        new_name: Option<&str>,
        new_color: Option<&str>,
        new_enabled: Option<bool>,
        new_description: Option<&str>,
        new_extra_rules: Option<&str>,
        new_generates_reply: Option<bool>,
        new_sort_order: Option<i32>,
    ) -> anyhow::Result<Category> {
        use crate::schema::categories::dsl::*;

        // Diesel changesets require concrete types per field, so apply
        // optional updates one at a time.
        if let Some(v) = new_name {
            diesel::update(categories.filter(id.eq(category_id)))
                .set(display_name.eq(v))
                .execute(conn)
                .await?;
        }
        if let Some(v) = new_color {
            diesel::update(categories.filter(id.eq(category_id)))
                .set(color_hex.eq(v))
                .execute(conn)
                .await?;
        }
        if let Some(v) = new_enabled {
            diesel::update(categories.filter(id.eq(category_id)))
                .set(enabled.eq(v))
                .execute(conn)
                .await?;
        }
        if let Some(v) = new_description {
            diesel::update(categories.filter(id.eq(category_id)))
                .set(description.eq(v))
                .execute(conn)
                .await?;
        }
        if let Some(v) = new_extra_rules {
            diesel::update(categories.filter(id.eq(category_id)))
                .set(extra_rules.eq(v))
                .execute(conn)
                .await?;
        }
        if let Some(v) = new_generates_reply {
            diesel::update(categories.filter(id.eq(category_id)))
                .set(generates_reply.eq(v))
                .execute(conn)
                .await?;
        }
        if let Some(v) = new_sort_order {
            diesel::update(categories.filter(id.eq(category_id)))
                .set(sort_order.eq(v))
                .execute(conn)
                .await?;
        }

        let row = diesel::update(categories.filter(id.eq(category_id)))
            .set(updated_at.eq(Utc::now()))
            .get_result::<CategoryRow>(conn)
            .await?;

        row.into_category()
    }

    pub async fn delete(conn: &mut AsyncPgConnection, category_id: Uuid) -> anyhow::Result<()> {
        use crate::schema::categories::dsl::*;

        diesel::delete(categories.filter(id.eq(category_id)))
            .execute(conn)
            .await?;

        Ok(())
    }

    /// Seed the stock taxonomy for an account that has no categories yet.
    pub async fn ensure_defaults(conn: &mut AsyncPgConnection, account: Uuid) -> anyhow::Result<()> {
        // Explicit imports: the dsl glob would pull in column structs that
        // collide with bindings inside macro expansions below.
        use crate::schema::categories::dsl::{account_id, categories};

        let existing: i64 = categories
            .filter(account_id.eq(account))
            .count()
            .get_result(conn)
            .await?;
        if existing > 0 {
            return Ok(());
        }

        for cat in shared::models::default_taxonomy() {
            let new_category = NewCategory {
                account_id: account,
                key: cat.key,
                display_name: cat.display_name,
                color_hex: cat.color_hex,
                enabled: cat.enabled,
                required: cat.required,
                role: cat.role.as_str().to_string(),
                description: cat.description,
                extra_rules: cat.extra_rules,
                generates_reply: cat.generates_reply,
                sort_order: cat.sort_order,
            };
            diesel::insert_into(categories)
                .values(&new_category)
                .execute(conn)
                .await?;
        }

        tracing::info!("Seeded default taxonomy for account {}", account);
        Ok(())
    }

    /// Reassign dense 1..N keys after a taxonomy edit.
    ///
    /// Enabled categories take 1..N in sort order so classification prompts
    /// always present a contiguous range; disabled ones follow after.
    pub async fn renumber(conn: &mut AsyncPgConnection, account: Uuid) -> anyhow::Result<()> {
        use crate::schema::categories::dsl::*;

        let rows = categories
            .filter(account_id.eq(account))
            .order_by((enabled.desc(), sort_order.asc(), created_at.asc()))
            .load::<crate::models::CategoryRow>(conn)
            .await?;

        for (i, row) in rows.iter().enumerate() {
            let new_key = (i + 1) as i32;
            if row.key != new_key {
                diesel::update(categories.filter(id.eq(row.id)))
                    .set(key.eq(new_key))
                    .execute(conn)
                    .await?;
            }
        }

        Ok(())
    }
}

// Scan session database operations
pub mod scan_sessions {
    use super::*;
    use crate::models::{NewScanSession, ScanSessionRow};

    pub async fn insert(
        conn: &mut AsyncPgConnection,
        new_session: NewScanSession,
    ) -> anyhow::Result<ScanSessionRow> {
        use crate::schema::scan_sessions::dsl::*;

        let row = diesel::insert_into(scan_sessions)
            .values(&new_session)
            .get_result::<ScanSessionRow>(conn)
            .await?;

        Ok(row)
    }

    pub async fn get_for_account(
        conn: &mut AsyncPgConnection,
        session_id: Uuid,
        account: Uuid,
    ) -> anyhow::Result<Option<ScanSessionRow>> {
        use crate::schema::scan_sessions::dsl::*;

        let row = scan_sessions
            .filter(id.eq(session_id))
            .filter(account_id.eq(account))
            .first::<ScanSessionRow>(conn)
            .await
            .optional()?;

        Ok(row)
    }

    pub async fn record_marked_read(
        conn: &mut AsyncPgConnection,
        session_id: Uuid,
        count: i32,
    ) -> anyhow::Result<()> {
        use crate::schema::scan_sessions::dsl::*;

        diesel::update(scan_sessions.filter(id.eq(session_id)))
            .set(marked_read_count.eq(Some(count)))
            .execute(conn)
            .await?;

        Ok(())
    }
}

// Label ownership database operations
pub mod label_ownership {
    use super::*;
    use shared::models::LabelOwnership;

    pub async fn get(
        conn: &mut AsyncPgConnection,
        account: Uuid,
    ) -> anyhow::Result<LabelOwnership> {
        use crate::schema::label_ownership::dsl::*;

        let row: Option<String> = label_ownership
            .filter(account_id.eq(account))
            .select(labels)
            .first::<String>(conn)
            .await
            .optional()?;

        match row {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(LabelOwnership::new()),
        }
    }

    pub async fn put(
        conn: &mut AsyncPgConnection,
        account: Uuid,
        ownership: &LabelOwnership,
    ) -> anyhow::Result<()> {
        use crate::schema::label_ownership::dsl::*;

        let json = serde_json::to_string(ownership)?;

        diesel::insert_into(label_ownership)
            .values((account_id.eq(account), labels.eq(&json)))
            .on_conflict(account_id)
            .do_update()
            .set((labels.eq(&json), updated_at.eq(Utc::now())))
            .execute(conn)
            .await?;

        Ok(())
    }
}

// Known contact allowlist operations
pub mod known_contacts {
    use super::*;
    use std::collections::HashSet;

    pub async fn list(
        conn: &mut AsyncPgConnection,
        account: Uuid,
    ) -> anyhow::Result<HashSet<String>> {
        use crate::schema::known_contacts::dsl::*;

        let addresses = known_contacts
            .filter(account_id.eq(account))
            .select(address)
            .load::<String>(conn)
            .await?;

        Ok(addresses.into_iter().collect())
    }

    /// Record senders whose mail the pipeline classified as important, so
    /// future pattern passes short-circuit them.
    pub async fn record(
        conn: &mut AsyncPgConnection,
        account: Uuid,
        addresses: &[String],
    ) -> anyhow::Result<usize> {
        use crate::schema::known_contacts::dsl::*;

        let mut inserted = 0;
        for addr in addresses {
            let n = diesel::insert_into(known_contacts)
                .values((account_id.eq(account), address.eq(addr)))
                .on_conflict((account_id, address))
                .do_nothing()
                .execute(conn)
                .await?;
            inserted += n;
        }

        Ok(inserted)
    }
}
