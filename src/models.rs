// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Replica Data Models
//!
//! Document shapes mirrored from chaincode state. Field names follow the
//! chaincode JSON encoding (camelCase, `type` for the object type tag) so a
//! document read back from the replica lines up key-for-key with the ledger
//! record it was replicated from.
//!
//! ## Unknown fields
//!
//! Every top-level document keeps fields it does not model in an `extra`
//! map (`#[serde(flatten)]`). Newer chaincode revisions can add fields
//! without the replica silently dropping them.
//!
//! ## Natural keys
//!
//! | Document | Key |
//! |----------|-----|
//! | [`User`] | `username` |
//! | [`Product`] | `id` (content hash) |
//! | [`Agreement`] | `txID` |
//! | [`InventoryEntry`] | `productID` |

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

fn is_false(value: &bool) -> bool {
    !*value
}

fn is_zero(value: &i64) -> bool {
    *value == 0
}

// =============================================================================
// Users
// =============================================================================

/// Organization details attached to a user acting on behalf of an institution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Org {
    /// Institution type (e.g. "Private Hospital").
    #[serde(default)]
    pub inst_type: String,
    #[serde(default)]
    pub org_name: String,
    #[serde(default)]
    pub active: bool,
    /// Identity IDs of the members transacting for the organization, in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<String>,
}

/// A marketplace participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub doc_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub mspid: String,
    /// Whether the user registered as an organization.
    #[serde(default)]
    pub is_org: bool,
    /// Username of the organization this user is a member of, if any.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub is_member_of: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org: Option<Org>,
    #[serde(default)]
    pub is_buyer: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub purposes: Vec<String>,
    /// End of the validity window (RFC 3339, as written by chaincode).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_to: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl User {
    /// Whether this user belongs to an existing organization.
    pub fn is_org_member(&self) -> bool {
        !self.is_member_of.is_empty()
    }
}

// =============================================================================
// Products
// =============================================================================

/// Data-sharing policy attached to a product.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    #[serde(default, skip_serializing_if = "is_false")]
    pub incl_personal_info: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub has_consent: bool,
    #[serde(default)]
    pub purposes: Vec<String>,
    /// Anonymization, Encryption, SMPC.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub protection_type: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub second_use_consent: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recipient_type: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub transfer_to_country: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub storage_period: i64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub approved_orgs: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub approved_users: Vec<String>,
    /// Automated decision-making consequences.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub automated: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A data-catalogue item.
///
/// `curations` lists the ids of the products this one was curated from. The
/// references form a DAG by chaincode convention; nothing here checks for
/// cycles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub doc_type: String,
    /// Username of the owning user.
    pub owner: String,
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default)]
    pub price: f64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub desc: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sector: String,
    /// default / analytics / dataunion
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub product_type: String,
    #[serde(default)]
    pub policy: Policy,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub curations: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// =============================================================================
// Agreements
// =============================================================================

/// Agreement lifecycle stages known to the chaincode.
///
/// Chaincode only ever moves an agreement forward; `Withdrawn` ends it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AgreementStage {
    Eligible,
    Paid,
    Access,
    Withdrawn,
}

impl AgreementStage {
    pub const ALL: [AgreementStage; 4] = [
        AgreementStage::Eligible,
        AgreementStage::Paid,
        AgreementStage::Access,
        AgreementStage::Withdrawn,
    ];

    /// Spelling the chaincode writes and accepts.
    pub fn name(self) -> &'static str {
        match self {
            AgreementStage::Eligible => "Eligible",
            AgreementStage::Paid => "Paid",
            AgreementStage::Access => "Access",
            AgreementStage::Withdrawn => "Withdrawn",
        }
    }

    /// Case-insensitive lookup, so `"PAID"` and `"Paid"` are the same stage.
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|stage| stage.name().eq_ignore_ascii_case(value))
    }
}

/// Agreement status exactly as the chaincode wrote it.
///
/// The replica mirrors the string verbatim, including spellings and values
/// it does not recognize; [`AgreementStatus::stage`] gives the typed view.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgreementStatus(String);

impl AgreementStatus {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `None` for a status this build does not know.
    pub fn stage(&self) -> Option<AgreementStage> {
        AgreementStage::parse(&self.0)
    }
}

impl From<AgreementStage> for AgreementStatus {
    fn from(stage: AgreementStage) -> Self {
        Self::new(stage.name())
    }
}

/// A purchase agreement between a seller and a buyer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agreement {
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub doc_type: String,
    #[serde(rename = "txID")]
    pub tx_id: String,
    #[serde(rename = "productID", default)]
    pub product_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub product_type: String,
    #[serde(default)]
    pub seller: String,
    #[serde(default)]
    pub buyer: String,
    #[serde(default)]
    pub price: f64,
    pub status: AgreementStatus,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// =============================================================================
// Inventory
// =============================================================================

/// Derived owner -> product index entry. Exists only while its product does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryEntry {
    #[serde(rename = "productID")]
    pub product_id: String,
    pub owner: String,
}

impl From<&Product> for InventoryEntry {
    fn from(product: &Product) -> Self {
        Self {
            product_id: product.id.clone(),
            owner: product.owner.clone(),
        }
    }
}
