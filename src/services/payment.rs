//! Payment settings and donation inquiries
//!
//! No money moves through the server: clients pay out of band using the
//! published settings and upload proof on their assignment request.

use crate::db::repositories::{DonationRepository, PaymentSettingsRepository};
use crate::models::{
    CreateDonationInput, DonationInquiry, DonationStatus, ListQuery, Money, PagedResult,
    PaymentSettings,
};
use crate::services::{listing, validate};
use anyhow::Context;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum PaymentServiceError {
    #[error("Donation inquiry not found")]
    NotFound,

    #[error("{0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Deserialize)]
pub struct DonationStatusInput {
    pub status: DonationStatus,
}

pub struct PaymentService {
    settings: Arc<dyn PaymentSettingsRepository>,
    donations: Arc<dyn DonationRepository>,
}

impl PaymentService {
    pub fn new(
        settings: Arc<dyn PaymentSettingsRepository>,
        donations: Arc<dyn DonationRepository>,
    ) -> Self {
        Self {
            settings,
            donations,
        }
    }

    pub async fn settings(&self) -> Result<PaymentSettings, PaymentServiceError> {
        Ok(self
            .settings
            .get()
            .await
            .context("Failed to load payment settings")?)
    }

    pub async fn update_settings(
        &self,
        input: PaymentSettings,
    ) -> Result<PaymentSettings, PaymentServiceError> {
        let invalid = PaymentServiceError::ValidationError;
        let paypal_email = match validate::optional(input.paypal_email) {
            Some(email) => Some(validate::email(&email).map_err(invalid)?),
            None => None,
        };
        let settings = PaymentSettings {
            bank_name: validate::optional(input.bank_name),
            account_name: validate::optional(input.account_name),
            account_number: validate::optional(input.account_number),
            swift_code: validate::optional(input.swift_code).map(|s| s.to_uppercase()),
            iban: validate::optional(input.iban).map(|s| s.to_uppercase()),
            mobile_money_number: validate::optional(input.mobile_money_number),
            paypal_email,
            currency: validate::currency(&input.currency).map_err(invalid)?,
            instructions: validate::optional(input.instructions),
            updated_at: None,
        };

        let saved = self
            .settings
            .update(&settings)
            .await
            .context("Failed to save payment settings")?;
        tracing::info!("Payment settings updated");
        Ok(saved)
    }

    /// Public donation form; currency defaults to the configured one
    pub async fn create_donation(
        &self,
        input: CreateDonationInput,
    ) -> Result<DonationInquiry, PaymentServiceError> {
        let invalid = PaymentServiceError::ValidationError;
        if input.amount.is_some_and(|amount| !amount.is_valid_charge()) {
            return Err(PaymentServiceError::ValidationError(format!(
                "Amount must be greater than zero and at most {}",
                Money::MAX
            )));
        }
        let currency = match validate::optional(input.currency) {
            Some(code) => validate::currency(&code).map_err(invalid)?,
            None => self.settings().await?.currency,
        };
        let input = CreateDonationInput {
            full_name: validate::required(&input.full_name, "Full name").map_err(invalid)?,
            email: validate::email(&input.email).map_err(invalid)?,
            phone: validate::optional(input.phone),
            amount: input.amount,
            currency: None,
            message: validate::optional(input.message),
        };

        let inquiry = self
            .donations
            .create(&input, &currency)
            .await
            .context("Failed to save donation inquiry")?;
        tracing::info!("Donation inquiry {} received", inquiry.id);
        Ok(inquiry)
    }

    pub async fn list_donations(
        &self,
        query: &ListQuery,
    ) -> Result<PagedResult<DonationInquiry>, PaymentServiceError> {
        let inquiries = self
            .donations
            .list()
            .await
            .context("Failed to list donation inquiries")?;
        Ok(listing::apply(inquiries, query))
    }

    pub async fn set_donation_status(
        &self,
        id: i64,
        status: DonationStatus,
    ) -> Result<DonationInquiry, PaymentServiceError> {
        let inquiry = self
            .donations
            .set_status(id, status)
            .await
            .context("Failed to update donation inquiry")?
            .ok_or(PaymentServiceError::NotFound)?;
        tracing::info!("Donation inquiry {} marked {}", id, status);
        Ok(inquiry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxDonationRepository, SqlxPaymentSettingsRepository};
    use crate::db::{create_test_pool, migrations};

    async fn setup() -> PaymentService {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        PaymentService::new(
            SqlxPaymentSettingsRepository::boxed(pool.clone()),
            SqlxDonationRepository::boxed(pool),
        )
    }

    fn donation() -> CreateDonationInput {
        CreateDonationInput {
            full_name: "Kind Donor".to_string(),
            email: "donor@example.com".to_string(),
            phone: None,
            amount: Money::from_major(50.0),
            currency: None,
            message: Some("For the clinic".to_string()),
        }
    }

    #[tokio::test]
    async fn test_settings_update() {
        let service = setup().await;
        assert_eq!(service.settings().await.unwrap().currency, "USD");

        let input = PaymentSettings {
            bank_name: Some("First Bank".to_string()),
            swift_code: Some(" fbnkghac ".to_string()),
            currency: "ghs".to_string(),
            ..Default::default()
        };
        let saved = service.update_settings(input).await.unwrap();
        assert_eq!(saved.currency, "GHS");
        assert_eq!(saved.swift_code.as_deref(), Some("FBNKGHAC"));
        assert_eq!(service.settings().await.unwrap().bank_name.as_deref(), Some("First Bank"));

        let bad = PaymentSettings {
            currency: "cedis".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            service.update_settings(bad).await,
            Err(PaymentServiceError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_donation_uses_configured_currency() {
        let service = setup().await;
        service
            .update_settings(PaymentSettings {
                currency: "EUR".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();

        let inquiry = service.create_donation(donation()).await.unwrap();
        assert_eq!(inquiry.currency, "EUR");
        assert_eq!(inquiry.status, DonationStatus::New);

        let mut explicit = donation();
        explicit.currency = Some("usd".to_string());
        assert_eq!(service.create_donation(explicit).await.unwrap().currency, "USD");
    }

    #[tokio::test]
    async fn test_donation_validation() {
        let service = setup().await;
        let mut negative = donation();
        negative.amount = Money::from_major(-5.0);
        assert!(matches!(
            service.create_donation(negative).await,
            Err(PaymentServiceError::ValidationError(_))
        ));

        let mut huge = donation();
        huge.amount = Some(Money::from_cents(Money::MAX.cents() + 1));
        assert!(matches!(
            service.create_donation(huge).await,
            Err(PaymentServiceError::ValidationError(_))
        ));

        let mut no_email = donation();
        no_email.email = " ".to_string();
        assert!(matches!(
            service.create_donation(no_email).await,
            Err(PaymentServiceError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_donation_status() {
        let service = setup().await;
        let inquiry = service.create_donation(donation()).await.unwrap();
        let contacted = service
            .set_donation_status(inquiry.id, DonationStatus::Contacted)
            .await
            .unwrap();
        assert_eq!(contacted.status, DonationStatus::Contacted);

        let new = service
            .list_donations(&ListQuery::default().with_status("new"))
            .await
            .unwrap();
        assert_eq!(new.total, 0);

        assert!(matches!(
            service.set_donation_status(999, DonationStatus::Closed).await,
            Err(PaymentServiceError::NotFound)
        ));
    }
}
