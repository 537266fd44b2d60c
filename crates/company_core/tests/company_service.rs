use company_core::{
    AppError, AppResult, Company, CompanyId, CompanyPatch, CompanyRepository, CompanyService,
    CompanyType, CreateCompanyRequest, NewCompany, PatchValue, RequestContext,
    SqliteCompanyRepository, Store,
};
use std::collections::HashMap;
use std::sync::Mutex;

/// In-memory stand-in that records what the service hands down.
#[derive(Default)]
struct RecordingRepository {
    companies: Mutex<HashMap<CompanyId, Company>>,
    patches: Mutex<Vec<CompanyPatch>>,
}

impl CompanyRepository for RecordingRepository {
    fn create(&self, _ctx: &RequestContext, company: &NewCompany) -> AppResult<Company> {
        let stored = Company {
            id: company.id,
            name: company.name.clone(),
            description: company.description.clone(),
            amount_of_employees: company.amount_of_employees,
            registered: company.registered,
            kind: company.kind,
            created_at: 1,
            updated_at: 1,
            deleted_at: None,
        };
        self.companies
            .lock()
            .unwrap()
            .insert(stored.id, stored.clone());
        Ok(stored)
    }

    fn find_by_id(&self, _ctx: &RequestContext, id: CompanyId) -> AppResult<Company> {
        self.companies
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::not_found("company not found"))
    }

    fn update(
        &self,
        ctx: &RequestContext,
        id: CompanyId,
        patch: &CompanyPatch,
    ) -> AppResult<Company> {
        self.patches.lock().unwrap().push(patch.clone());
        self.find_by_id(ctx, id)
    }

    fn delete(&self, _ctx: &RequestContext, id: CompanyId) -> AppResult<()> {
        self.companies
            .lock()
            .unwrap()
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| AppError::not_found("company not found or already deleted"))
    }
}

fn request(name: &str) -> CreateCompanyRequest {
    CreateCompanyRequest {
        name: name.to_string(),
        description: None,
        amount_of_employees: 4,
        registered: false,
        kind: CompanyType::Cooperative,
    }
}

#[test]
fn service_assigns_fresh_ids_and_normalizes_names() {
    let service = CompanyService::new(RecordingRepository::default());
    let ctx = RequestContext::new();

    let first = service.create_company(&ctx, request("  Acme \t Co ")).unwrap();
    let second = service.create_company(&ctx, request("Globex")).unwrap();

    assert_eq!(first.name, "Acme Co");
    assert!(!first.id.is_nil());
    assert_ne!(first.id, second.id);
    assert_eq!(service.get_company(&ctx, first.id).unwrap(), first);
}

#[test]
fn service_normalizes_renames_in_place() {
    let service = CompanyService::new(RecordingRepository::default());
    let ctx = RequestContext::new();
    let created = service.create_company(&ctx, request("Acme")).unwrap();

    let patch = CompanyPatch::new()
        .registered(true)
        .name("  New   Name ");
    service.update_company(&ctx, created.id, patch).unwrap();

    let recorded = service.repository().patches.lock().unwrap();
    assert_eq!(
        recorded[0].entries(),
        &[
            PatchValue::Registered(true),
            PatchValue::Name("New Name".to_string())
        ]
    );
}

#[test]
fn service_propagates_repository_errors() {
    let service = CompanyService::new(RecordingRepository::default());
    let ctx = RequestContext::new();
    let created = service.create_company(&ctx, request("Acme")).unwrap();

    service.delete_company(&ctx, created.id).unwrap();
    assert!(service
        .delete_company(&ctx, created.id)
        .unwrap_err()
        .is_not_found());
    assert!(service
        .get_company(&ctx, created.id)
        .unwrap_err()
        .is_not_found());
}

#[test]
fn service_over_sqlite_store_end_to_end() {
    let store = Store::open_in_memory().unwrap();
    let service = CompanyService::new(SqliteCompanyRepository::new(store));
    let ctx = RequestContext::new();

    let created = service
        .create_company(&ctx, request("Acme  Corp"))
        .unwrap();
    assert_eq!(created.name, "Acme Corp");

    let conflict = service
        .create_company(&ctx, request("ACME CORP"))
        .unwrap_err();
    assert_eq!(conflict.status_code(), 409);

    let renamed = service
        .update_company(&ctx, created.id, CompanyPatch::new().name(" Initech "))
        .unwrap();
    assert_eq!(renamed.name, "Initech");
}
