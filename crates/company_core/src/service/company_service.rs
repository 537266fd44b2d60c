//! Company use-case service.
//!
//! # Responsibility
//! - Provide stable create/get/update/delete entry points for callers.
//! - Assign identity and normalize names before they reach the repository.
//!
//! # Invariants
//! - Service APIs never bypass repository validation/persistence contracts.
//! - Service layer remains storage-agnostic.

use crate::context::RequestContext;
use crate::error::AppResult;
use crate::model::company::{Company, CompanyId, CompanyType, NewCompany};
use crate::model::patch::{CompanyPatch, PatchValue};
use crate::repo::company_repo::CompanyRepository;
use once_cell::sync::Lazy;
use regex::Regex;
use uuid::Uuid;

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));

/// Request model for registering a company.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateCompanyRequest {
    pub name: String,
    pub description: Option<String>,
    pub amount_of_employees: u32,
    pub registered: bool,
    pub kind: CompanyType,
}

/// Use-case service wrapper for company operations.
pub struct CompanyService<R: CompanyRepository> {
    repo: R,
}

impl<R: CompanyRepository> CompanyService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    /// Registers a company under a freshly generated id.
    ///
    /// # Contract
    /// - Name is trimmed and inner whitespace runs collapse to one space.
    /// - Returns the persisted company including store timestamps.
    pub fn create_company(
        &self,
        ctx: &RequestContext,
        request: CreateCompanyRequest,
    ) -> AppResult<Company> {
        let company = NewCompany {
            id: Uuid::new_v4(),
            name: normalize_name(&request.name),
            description: request.description,
            amount_of_employees: request.amount_of_employees,
            registered: request.registered,
            kind: request.kind,
        };
        self.repo.create(ctx, &company)
    }

    pub fn get_company(&self, ctx: &RequestContext, id: CompanyId) -> AppResult<Company> {
        self.repo.find_by_id(ctx, id)
    }

    /// Applies a partial update; a new name is normalized like on create.
    pub fn update_company(
        &self,
        ctx: &RequestContext,
        id: CompanyId,
        mut patch: CompanyPatch,
    ) -> AppResult<Company> {
        let renamed = patch.entries().iter().find_map(|entry| match entry {
            PatchValue::Name(name) => Some(normalize_name(name)),
            _ => None,
        });
        if let Some(name) = renamed {
            patch.set(PatchValue::Name(name));
        }
        self.repo.update(ctx, id, &patch)
    }

    pub fn delete_company(&self, ctx: &RequestContext, id: CompanyId) -> AppResult<()> {
        self.repo.delete(ctx, id)
    }
}

/// Trims and collapses whitespace runs in a company name.
pub fn normalize_name(name: &str) -> String {
    WHITESPACE_RE.replace_all(name.trim(), " ").into_owned()
}

#[cfg(test)]
mod tests {
    use super::normalize_name;

    #[test]
    fn normalize_name_collapses_whitespace() {
        assert_eq!(normalize_name("  Acme \t  Corp\n"), "Acme Corp");
        assert_eq!(normalize_name("Acme"), "Acme");
    }
}
