//! Sparse partial-update input for companies.
//!
//! # Invariants
//! - Only fields in [`CompanyField`] can be expressed; identity and
//!   timestamps are not patchable.
//! - Entries keep insertion order; setting a field twice replaces the value
//!   in its original position.

use crate::model::company::{
    validate_description, validate_name, CompanyType, CompanyValidationError,
};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Allow-list of patchable company fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompanyField {
    Name,
    Description,
    AmountOfEmployees,
    Registered,
    Type,
}

impl CompanyField {
    /// Storage column backing this field.
    pub fn column(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Description => "description",
            Self::AmountOfEmployees => "amount_of_employees",
            Self::Registered => "registered",
            Self::Type => "type",
        }
    }

    /// Wire name used by upstream callers.
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Description => "description",
            Self::AmountOfEmployees => "amountOfEmployees",
            Self::Registered => "registered",
            Self::Type => "type",
        }
    }
}

impl Display for CompanyField {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.wire_name())
    }
}

impl FromStr for CompanyField {
    type Err = CompanyValidationError;

    /// Accepts both wire names and column names.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "name" => Ok(Self::Name),
            "description" => Ok(Self::Description),
            "amountOfEmployees" | "amount_of_employees" => Ok(Self::AmountOfEmployees),
            "registered" => Ok(Self::Registered),
            "type" => Ok(Self::Type),
            other => Err(CompanyValidationError::UnknownField(other.to_string())),
        }
    }
}

/// New value for one patchable field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchValue {
    Name(String),
    /// `None` clears the description.
    Description(Option<String>),
    AmountOfEmployees(u32),
    Registered(bool),
    Type(CompanyType),
}

impl PatchValue {
    pub fn field(&self) -> CompanyField {
        match self {
            Self::Name(_) => CompanyField::Name,
            Self::Description(_) => CompanyField::Description,
            Self::AmountOfEmployees(_) => CompanyField::AmountOfEmployees,
            Self::Registered(_) => CompanyField::Registered,
            Self::Type(_) => CompanyField::Type,
        }
    }

    /// Parses a textual value for `field`, e.g. from `name=value` arguments.
    pub fn parse(field: CompanyField, raw: &str) -> Result<Self, CompanyValidationError> {
        let invalid = || CompanyValidationError::InvalidValue {
            field: field.wire_name(),
            value: raw.to_string(),
        };
        match field {
            CompanyField::Name => Ok(Self::Name(raw.to_string())),
            CompanyField::Description => {
                if raw.is_empty() {
                    Ok(Self::Description(None))
                } else {
                    Ok(Self::Description(Some(raw.to_string())))
                }
            }
            CompanyField::AmountOfEmployees => raw
                .trim()
                .parse::<u32>()
                .map(Self::AmountOfEmployees)
                .map_err(|_| invalid()),
            CompanyField::Registered => match raw.trim() {
                "true" => Ok(Self::Registered(true)),
                "false" => Ok(Self::Registered(false)),
                _ => Err(invalid()),
            },
            CompanyField::Type => raw.parse::<CompanyType>().map(Self::Type),
        }
    }

    fn validate(&self) -> Result<(), CompanyValidationError> {
        match self {
            Self::Name(name) => validate_name(name),
            Self::Description(description) => validate_description(description.as_deref()),
            Self::AmountOfEmployees(_) | Self::Registered(_) | Self::Type(_) => Ok(()),
        }
    }
}

/// Ordered set of field updates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompanyPatch {
    entries: Vec<PatchValue>,
}

impl CompanyPatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a field, replacing any earlier value for the same field in place.
    pub fn set(&mut self, value: PatchValue) -> &mut Self {
        let field = value.field();
        match self.entries.iter_mut().find(|entry| entry.field() == field) {
            Some(existing) => *existing = value,
            None => self.entries.push(value),
        }
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.set(PatchValue::Name(name.into()));
        self
    }

    pub fn description(mut self, description: Option<String>) -> Self {
        self.set(PatchValue::Description(description));
        self
    }

    pub fn amount_of_employees(mut self, amount: u32) -> Self {
        self.set(PatchValue::AmountOfEmployees(amount));
        self
    }

    pub fn registered(mut self, registered: bool) -> Self {
        self.set(PatchValue::Registered(registered));
        self
    }

    pub fn kind(mut self, kind: CompanyType) -> Self {
        self.set(PatchValue::Type(kind));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &[PatchValue] {
        &self.entries
    }

    pub fn fields(&self) -> impl Iterator<Item = CompanyField> + '_ {
        self.entries.iter().map(PatchValue::field)
    }

    pub fn validate(&self) -> Result<(), CompanyValidationError> {
        self.entries.iter().try_for_each(PatchValue::validate)
    }
}
