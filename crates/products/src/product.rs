use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pharmatrack_core::{DomainError, DomainResult, Entity, ProductId};

/// What the pharmacist must do before handing the product over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceCheck {
    /// Prescription-only medicine: verify the prescription first.
    VerifyPrescription,
    /// Over-the-counter: safe to sell.
    OverTheCounter,
}

/// Catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    id: ProductId,
    name: String,
    category: String,
    seasonal_tag: Option<String>,
    requires_prescription: bool,
    created_at: DateTime<Utc>,
}

/// Command: CreateProduct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateProduct {
    pub product_id: ProductId,
    pub name: String,
    pub category: String,
    pub seasonal_tag: Option<String>,
    pub requires_prescription: bool,
    pub occurred_at: DateTime<Utc>,
}

impl Product {
    /// Validate a creation command and build the catalog entry.
    pub fn create(cmd: CreateProduct) -> DomainResult<Self> {
        let name = cmd.name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        let category = cmd.category.trim();
        if category.is_empty() {
            return Err(DomainError::validation("category cannot be empty"));
        }

        Ok(Self {
            id: cmd.product_id,
            name: name.to_string(),
            category: category.to_string(),
            seasonal_tag: normalize_tag(cmd.seasonal_tag),
            requires_prescription: cmd.requires_prescription,
            created_at: cmd.occurred_at,
        })
    }

    /// Rebuild a product from persisted columns (no validation).
    pub fn restore(
        id: ProductId,
        name: String,
        category: String,
        seasonal_tag: Option<String>,
        requires_prescription: bool,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name,
            category,
            seasonal_tag,
            requires_prescription,
            created_at,
        }
    }

    pub fn id_typed(&self) -> ProductId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn seasonal_tag(&self) -> Option<&str> {
        self.seasonal_tag.as_deref()
    }

    pub fn requires_prescription(&self) -> bool {
        self.requires_prescription
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn compliance_check(&self) -> ComplianceCheck {
        if self.requires_prescription {
            ComplianceCheck::VerifyPrescription
        } else {
            ComplianceCheck::OverTheCounter
        }
    }

    /// Case-insensitive substring match on the product name ("dolo" finds
    /// "Dolo 650 (Paracetamol)"). A blank term matches nothing.
    pub fn matches_search(&self, term: &str) -> bool {
        let term = term.trim();
        if term.is_empty() {
            return false;
        }
        self.name.to_lowercase().contains(&term.to_lowercase())
    }
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Blank tags and the literal "None" used by older catalog imports mean "no season".
fn normalize_tag(tag: Option<String>) -> Option<String> {
    let tag = tag?;
    let tag = tag.trim();
    if tag.is_empty() || tag.eq_ignore_ascii_case("none") {
        None
    } else {
        Some(tag.to_string())
    }
}
