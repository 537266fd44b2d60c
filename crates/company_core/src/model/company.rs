//! Company domain model.
//!
//! # Responsibility
//! - Define the persisted company record and its creation input.
//! - Own field-level validation shared by create and update paths.
//!
//! # Invariants
//! - `id` is assigned by the writer, never by the store, and never reused.
//! - `name` is non-empty and unique under case-insensitive comparison.
//! - `deleted_at` is the source of truth for tombstone state.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;

/// Stable identifier of a company.
pub type CompanyId = Uuid;

pub const NAME_MAX_CHARS: usize = 15;
pub const DESCRIPTION_MAX_CHARS: usize = 3000;

/// Closed set of company categories.
///
/// Wire and storage names match the values accepted by the public API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompanyType {
    #[serde(rename = "Corporations")]
    Corporations,
    #[serde(rename = "NonProfit")]
    NonProfit,
    #[serde(rename = "Cooperative")]
    Cooperative,
    #[serde(rename = "Sole Proprietorship")]
    SoleProprietorship,
}

impl CompanyType {
    pub const ALL: [CompanyType; 4] = [
        CompanyType::Corporations,
        CompanyType::NonProfit,
        CompanyType::Cooperative,
        CompanyType::SoleProprietorship,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Corporations => "Corporations",
            Self::NonProfit => "NonProfit",
            Self::Cooperative => "Cooperative",
            Self::SoleProprietorship => "Sole Proprietorship",
        }
    }
}

impl Display for CompanyType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompanyType {
    type Err = CompanyValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == value)
            .ok_or_else(|| CompanyValidationError::UnknownType(value.to_string()))
    }
}

/// Field-level validation failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompanyValidationError {
    NilId,
    EmptyName,
    NameTooLong { max: usize, actual: usize },
    DescriptionTooLong { max: usize, actual: usize },
    UnknownType(String),
    UnknownField(String),
    InvalidValue { field: &'static str, value: String },
}

impl Display for CompanyValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NilId => write!(f, "company id must not be nil"),
            Self::EmptyName => write!(f, "name is required"),
            Self::NameTooLong { max, actual } => {
                write!(f, "name must be at most {max} characters, got {actual}")
            }
            Self::DescriptionTooLong { max, actual } => {
                write!(f, "description must be at most {max} characters, got {actual}")
            }
            Self::UnknownType(value) => write!(
                f,
                "type must be one of Corporations|NonProfit|Cooperative|Sole Proprietorship, got `{value}`"
            ),
            Self::UnknownField(value) => write!(f, "unknown company field `{value}`"),
            Self::InvalidValue { field, value } => {
                write!(f, "invalid value `{value}` for field `{field}`")
            }
        }
    }
}

impl Error for CompanyValidationError {}

/// Persisted company record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    pub id: CompanyId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub amount_of_employees: u32,
    pub registered: bool,
    #[serde(rename = "type")]
    pub kind: CompanyType,
    /// Unix epoch milliseconds, assigned by the store.
    pub created_at: i64,
    /// Unix epoch milliseconds, assigned by the store on every mutation.
    pub updated_at: i64,
    /// Soft delete tombstone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<i64>,
}

impl Company {
    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }
}

/// Creation input. Timestamps are left to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCompany {
    pub id: CompanyId,
    pub name: String,
    pub description: Option<String>,
    pub amount_of_employees: u32,
    pub registered: bool,
    pub kind: CompanyType,
}

impl NewCompany {
    /// Creates input with a generated id.
    pub fn new(
        name: impl Into<String>,
        amount_of_employees: u32,
        registered: bool,
        kind: CompanyType,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: None,
            amount_of_employees,
            registered,
            kind,
        }
    }

    /// Creates input with a caller-provided id.
    pub fn with_id(
        id: CompanyId,
        name: impl Into<String>,
        amount_of_employees: u32,
        registered: bool,
        kind: CompanyType,
    ) -> Result<Self, CompanyValidationError> {
        if id.is_nil() {
            return Err(CompanyValidationError::NilId);
        }
        let mut company = Self::new(name, amount_of_employees, registered, kind);
        company.id = id;
        Ok(company)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn validate(&self) -> Result<(), CompanyValidationError> {
        if self.id.is_nil() {
            return Err(CompanyValidationError::NilId);
        }
        validate_name(&self.name)?;
        validate_description(self.description.as_deref())
    }
}

/// Uniqueness key for a company name: trimmed, then Unicode-lowercased.
pub fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

pub(crate) fn validate_name(name: &str) -> Result<(), CompanyValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(CompanyValidationError::EmptyName);
    }
    let actual = trimmed.chars().count();
    if actual > NAME_MAX_CHARS {
        return Err(CompanyValidationError::NameTooLong {
            max: NAME_MAX_CHARS,
            actual,
        });
    }
    Ok(())
}

pub(crate) fn validate_description(
    description: Option<&str>,
) -> Result<(), CompanyValidationError> {
    if let Some(value) = description {
        let actual = value.chars().count();
        if actual > DESCRIPTION_MAX_CHARS {
            return Err(CompanyValidationError::DescriptionTooLong {
                max: DESCRIPTION_MAX_CHARS,
                actual,
            });
        }
    }
    Ok(())
}
