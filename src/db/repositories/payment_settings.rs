//! Payment settings repository (single row, id = 1)

use crate::db::{Backend, DynDatabasePool};
use crate::models::PaymentSettings;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;

#[async_trait]
pub trait PaymentSettingsRepository: Send + Sync {
    async fn get(&self) -> Result<PaymentSettings>;

    async fn update(&self, settings: &PaymentSettings) -> Result<PaymentSettings>;
}

const SETTINGS_ID: i64 = 1;

macro_rules! row_to_settings {
    ($row:expr) => {
        PaymentSettings {
            bank_name: $row.get("bank_name"),
            account_name: $row.get("account_name"),
            account_number: $row.get("account_number"),
            swift_code: $row.get("swift_code"),
            iban: $row.get("iban"),
            mobile_money_number: $row.get("mobile_money_number"),
            paypal_email: $row.get("paypal_email"),
            currency: $row.get("currency"),
            instructions: $row.get("instructions"),
            updated_at: Some($row.get("updated_at")),
        }
    };
}

pub struct SqlxPaymentSettingsRepository {
    pool: DynDatabasePool,
}

impl SqlxPaymentSettingsRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn PaymentSettingsRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl PaymentSettingsRepository for SqlxPaymentSettingsRepository {
    async fn get(&self) -> Result<PaymentSettings> {
        let sql = r#"
            SELECT bank_name, account_name, account_number, swift_code, iban,
                   mobile_money_number, paypal_email, currency, instructions, updated_at
            FROM payment_settings WHERE id = ?
        "#;
        let settings = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql)
                .bind(SETTINGS_ID)
                .fetch_optional(pool)
                .await
                .context("Failed to load payment settings")?
                .map(|row| row_to_settings!(row)),
            Backend::Mysql(pool) => sqlx::query(sql)
                .bind(SETTINGS_ID)
                .fetch_optional(pool)
                .await
                .context("Failed to load payment settings")?
                .map(|row| row_to_settings!(row)),
        };
        // The migration seeds the row; fall back in case it was removed by hand
        Ok(settings.unwrap_or_else(|| PaymentSettings {
            currency: "USD".to_string(),
            ..Default::default()
        }))
    }

    async fn update(&self, settings: &PaymentSettings) -> Result<PaymentSettings> {
        let sqlite_sql = r#"
            INSERT INTO payment_settings
                (id, bank_name, account_name, account_number, swift_code, iban,
                 mobile_money_number, paypal_email, currency, instructions, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                bank_name = excluded.bank_name,
                account_name = excluded.account_name,
                account_number = excluded.account_number,
                swift_code = excluded.swift_code,
                iban = excluded.iban,
                mobile_money_number = excluded.mobile_money_number,
                paypal_email = excluded.paypal_email,
                currency = excluded.currency,
                instructions = excluded.instructions,
                updated_at = excluded.updated_at
        "#;
        let mysql_sql = r#"
            INSERT INTO payment_settings
                (id, bank_name, account_name, account_number, swift_code, iban,
                 mobile_money_number, paypal_email, currency, instructions, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON DUPLICATE KEY UPDATE
                bank_name = VALUES(bank_name),
                account_name = VALUES(account_name),
                account_number = VALUES(account_number),
                swift_code = VALUES(swift_code),
                iban = VALUES(iban),
                mobile_money_number = VALUES(mobile_money_number),
                paypal_email = VALUES(paypal_email),
                currency = VALUES(currency),
                instructions = VALUES(instructions),
                updated_at = VALUES(updated_at)
        "#;
        let now = Utc::now();
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                sqlx::query(sqlite_sql)
                    .bind(SETTINGS_ID)
                    .bind(&settings.bank_name)
                    .bind(&settings.account_name)
                    .bind(&settings.account_number)
                    .bind(&settings.swift_code)
                    .bind(&settings.iban)
                    .bind(&settings.mobile_money_number)
                    .bind(&settings.paypal_email)
                    .bind(&settings.currency)
                    .bind(&settings.instructions)
                    .bind(now)
                    .execute(pool)
                    .await
                    .context("Failed to save payment settings")?;
            }
            Backend::Mysql(pool) => {
                sqlx::query(mysql_sql)
                    .bind(SETTINGS_ID)
                    .bind(&settings.bank_name)
                    .bind(&settings.account_name)
                    .bind(&settings.account_number)
                    .bind(&settings.swift_code)
                    .bind(&settings.iban)
                    .bind(&settings.mobile_money_number)
                    .bind(&settings.paypal_email)
                    .bind(&settings.currency)
                    .bind(&settings.instructions)
                    .bind(now)
                    .execute(pool)
                    .await
                    .context("Failed to save payment settings")?;
            }
        }
        self.get().await
    }
}
