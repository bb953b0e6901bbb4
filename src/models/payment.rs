//! Payment settings shown to clients at the payment step, and donation
//! inquiries from the public donation page.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::Money;

/// Bank and wallet details; a single row
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PaymentSettings {
    pub bank_name: Option<String>,
    pub account_name: Option<String>,
    pub account_number: Option<String>,
    pub swift_code: Option<String>,
    pub iban: Option<String>,
    pub mobile_money_number: Option<String>,
    pub paypal_email: Option<String>,
    pub currency: String,
    pub instructions: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DonationStatus {
    #[default]
    New,
    Contacted,
    Closed,
}

impl DonationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DonationStatus::New => "new",
            DonationStatus::Contacted => "contacted",
            DonationStatus::Closed => "closed",
        }
    }
}

impl fmt::Display for DonationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DonationStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "new" => Ok(DonationStatus::New),
            "contacted" => Ok(DonationStatus::Contacted),
            "closed" => Ok(DonationStatus::Closed),
            _ => Err(anyhow::anyhow!("Invalid donation status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DonationInquiry {
    pub id: i64,
    pub full_name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<Money>,
    pub currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub status: DonationStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateDonationInput {
    pub full_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub amount: Option<Money>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_donation_status_from_str() {
        assert_eq!(DonationStatus::from_str("NEW").unwrap(), DonationStatus::New);
        assert_eq!(DonationStatus::from_str("closed").unwrap(), DonationStatus::Closed);
        assert!(DonationStatus::from_str("paid").is_err());
    }
}
