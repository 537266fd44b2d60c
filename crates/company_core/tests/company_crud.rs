use company_core::repo::company_repo::{
    DELETED_MESSAGE, DELETE_NOT_FOUND_MESSAGE, EMPTY_PATCH_MESSAGE, NAME_CONFLICT_MESSAGE,
    NOT_FOUND_MESSAGE,
};
use company_core::{
    CompanyPatch, CompanyRepository, CompanyType, ErrorKind, Event, EventQuery, NewCompany,
    RequestContext, SqliteCompanyRepository, SqliteEventJournal, Store,
};
use uuid::Uuid;

fn setup() -> (Store, SqliteCompanyRepository) {
    let store = Store::open_in_memory().unwrap();
    let repo = SqliteCompanyRepository::new(store.clone());
    (store, repo)
}

fn acme() -> NewCompany {
    NewCompany::new("Acme", 10, true, CompanyType::Corporations)
}

fn events(store: &Store) -> Vec<Event> {
    let conn = store.connection(&RequestContext::new()).unwrap();
    SqliteEventJournal::new()
        .list_events(&conn, &EventQuery::default())
        .unwrap()
}

#[test]
fn create_and_find_roundtrip() {
    let (_store, repo) = setup();
    let ctx = RequestContext::new();
    let input = acme().with_description("Makes anvils");

    let created = repo.create(&ctx, &input).unwrap();
    assert_eq!(created.id, input.id);
    assert_eq!(created.name, "Acme");
    assert_eq!(created.description.as_deref(), Some("Makes anvils"));
    assert_eq!(created.amount_of_employees, 10);
    assert!(created.registered);
    assert_eq!(created.kind, CompanyType::Corporations);
    assert!(created.created_at > 0);
    assert_eq!(created.created_at, created.updated_at);
    assert_eq!(created.deleted_at, None);

    let loaded = repo.find_by_id(&ctx, input.id).unwrap();
    assert_eq!(loaded, created);
}

#[test]
fn create_rejects_case_insensitive_duplicate_name() {
    let (_store, repo) = setup();
    let ctx = RequestContext::new();
    repo.create(&ctx, &acme()).unwrap();

    let duplicate = NewCompany::new("aCME", 3, false, CompanyType::Cooperative);
    let err = repo.create(&ctx, &duplicate).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(err.status_code(), 409);
    assert_eq!(err.message(), NAME_CONFLICT_MESSAGE);

    assert!(repo.find_by_id(&ctx, duplicate.id).unwrap_err().is_not_found());
}

#[test]
fn create_folds_non_ascii_case_in_names() {
    let (store, repo) = setup();
    let ctx = RequestContext::new();
    let upper = NewCompany::new("Émile", 2, true, CompanyType::SoleProprietorship);
    repo.create(&ctx, &upper).unwrap();

    let lower = NewCompany::new("émile", 2, true, CompanyType::SoleProprietorship);
    let err = repo.create(&ctx, &lower).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(err.message(), NAME_CONFLICT_MESSAGE);
    assert!(repo.find_by_id(&ctx, lower.id).unwrap_err().is_not_found());
    assert_eq!(events(&store).len(), 1);
}

#[test]
fn create_maps_unique_index_violation_to_name_conflict() {
    let (store, repo) = setup();
    let ctx = RequestContext::new();
    {
        // A row with the same key lands between the pre-check and the insert.
        let conn = store.connection(&ctx).unwrap();
        conn.execute_batch(
            "CREATE TEMP TRIGGER sneak_in BEFORE INSERT ON companies
             WHEN NEW.name = 'Acme'
             BEGIN
                 INSERT INTO companies (id, name, name_key, amount_of_employees, registered, type)
                 VALUES ('other-writer', 'ACME', 'acme', 1, 1, 'Cooperative');
             END;",
        )
        .unwrap();
    }

    let input = acme();
    let err = repo.create(&ctx, &input).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(err.message(), NAME_CONFLICT_MESSAGE);

    let conn = store.connection(&ctx).unwrap();
    let rows: i64 = conn
        .query_row("SELECT COUNT(*) FROM companies;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(rows, 0);
    drop(conn);
    assert!(events(&store).is_empty());
}

#[test]
fn create_rejects_invalid_input_before_touching_storage() {
    let (store, repo) = setup();
    let ctx = RequestContext::new();

    let too_long = NewCompany::new("A name that is way too long", 1, true, CompanyType::NonProfit);
    let err = repo.create(&ctx, &too_long).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadRequest);

    let blank = NewCompany::new("   ", 1, true, CompanyType::NonProfit);
    assert_eq!(repo.create(&ctx, &blank).unwrap_err().kind(), ErrorKind::BadRequest);

    assert!(events(&store).is_empty());
}

#[test]
fn create_with_existing_id_is_conflict() {
    let (_store, repo) = setup();
    let ctx = RequestContext::new();
    let first = acme();
    repo.create(&ctx, &first).unwrap();

    let mut same_id = NewCompany::new("Initech", 50, true, CompanyType::Corporations);
    same_id.id = first.id;
    let err = repo.create(&ctx, &same_id).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_ne!(err.message(), NAME_CONFLICT_MESSAGE);
}

#[test]
fn update_changes_only_patched_fields_and_bumps_updated_at() {
    let (_store, repo) = setup();
    let ctx = RequestContext::new();
    let created = repo
        .create(&ctx, &acme().with_description("Makes anvils"))
        .unwrap();

    let updated = repo
        .update(&ctx, created.id, &CompanyPatch::new().name("X"))
        .unwrap();
    assert_eq!(updated.name, "X");
    assert!(updated.updated_at > created.updated_at);
    assert_eq!(updated.created_at, created.created_at);

    let loaded = repo.find_by_id(&ctx, created.id).unwrap();
    assert_eq!(loaded, updated);
    assert_eq!(loaded.description, created.description);
    assert_eq!(loaded.amount_of_employees, created.amount_of_employees);
    assert_eq!(loaded.registered, created.registered);
    assert_eq!(loaded.kind, created.kind);
}

#[test]
fn consecutive_updates_strictly_increase_updated_at() {
    let (_store, repo) = setup();
    let ctx = RequestContext::new();
    let created = repo.create(&ctx, &acme()).unwrap();

    let mut last = created.updated_at;
    for employees in 11..16 {
        let updated = repo
            .update(
                &ctx,
                created.id,
                &CompanyPatch::new().amount_of_employees(employees),
            )
            .unwrap();
        assert!(updated.updated_at > last);
        last = updated.updated_at;
    }
}

#[test]
fn update_can_clear_description_and_change_type() {
    let (_store, repo) = setup();
    let ctx = RequestContext::new();
    let created = repo
        .create(&ctx, &acme().with_description("Makes anvils"))
        .unwrap();

    let patch = CompanyPatch::new()
        .description(None)
        .kind(CompanyType::SoleProprietorship)
        .registered(false);
    let updated = repo.update(&ctx, created.id, &patch).unwrap();

    assert_eq!(updated.description, None);
    assert_eq!(updated.kind, CompanyType::SoleProprietorship);
    assert!(!updated.registered);
}

#[test]
fn update_with_empty_patch_is_bad_request() {
    let (store, repo) = setup();
    let ctx = RequestContext::new();
    let created = repo.create(&ctx, &acme()).unwrap();

    let err = repo
        .update(&ctx, created.id, &CompanyPatch::new())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadRequest);
    assert_eq!(err.message(), EMPTY_PATCH_MESSAGE);

    let loaded = repo.find_by_id(&ctx, created.id).unwrap();
    assert_eq!(loaded.updated_at, created.updated_at);
    assert_eq!(events(&store).len(), 1);
}

#[test]
fn update_to_taken_name_is_conflict_and_leaves_row_untouched() {
    let (store, repo) = setup();
    let ctx = RequestContext::new();
    repo.create(&ctx, &acme()).unwrap();
    let other = repo
        .create(
            &ctx,
            &NewCompany::new("Globex", 7, false, CompanyType::Cooperative),
        )
        .unwrap();

    let err = repo
        .update(&ctx, other.id, &CompanyPatch::new().name("ACME"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(err.message(), NAME_CONFLICT_MESSAGE);

    assert_eq!(repo.find_by_id(&ctx, other.id).unwrap(), other);
    assert_eq!(events(&store).len(), 2);
}

#[test]
fn update_of_missing_or_deleted_company_is_not_found() {
    let (_store, repo) = setup();
    let ctx = RequestContext::new();

    let err = repo
        .update(&ctx, Uuid::new_v4(), &CompanyPatch::new().registered(false))
        .unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.message(), NOT_FOUND_MESSAGE);

    let created = repo.create(&ctx, &acme()).unwrap();
    repo.delete(&ctx, created.id).unwrap();
    let err = repo
        .update(&ctx, created.id, &CompanyPatch::new().registered(false))
        .unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn delete_is_not_idempotent() {
    let (_store, repo) = setup();
    let ctx = RequestContext::new();
    let created = repo.create(&ctx, &acme()).unwrap();

    repo.delete(&ctx, created.id).unwrap();
    let err = repo.delete(&ctx, created.id).unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.status_code(), 404);
    assert_eq!(err.message(), DELETE_NOT_FOUND_MESSAGE);
}

#[test]
fn find_distinguishes_deleted_from_never_existed() {
    let (_store, repo) = setup();
    let ctx = RequestContext::new();
    let created = repo.create(&ctx, &acme()).unwrap();
    repo.delete(&ctx, created.id).unwrap();

    let deleted = repo.find_by_id(&ctx, created.id).unwrap_err();
    assert!(deleted.is_not_found());
    assert_eq!(deleted.message(), DELETED_MESSAGE);

    let missing = repo.find_by_id(&ctx, Uuid::new_v4()).unwrap_err();
    assert!(missing.is_not_found());
    assert_eq!(missing.message(), NOT_FOUND_MESSAGE);
}

#[test]
fn deleted_company_keeps_its_name_reserved() {
    let (_store, repo) = setup();
    let ctx = RequestContext::new();
    let created = repo.create(&ctx, &acme()).unwrap();
    repo.delete(&ctx, created.id).unwrap();

    let err = repo.create(&ctx, &acme()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[test]
fn acme_lifecycle_scenario() {
    let (_store, repo) = setup();
    let ctx = RequestContext::new();

    let created = repo.create(&ctx, &acme()).unwrap();
    assert!(!created.id.is_nil());

    let lower = NewCompany::new("acme", 10, true, CompanyType::Corporations);
    assert_eq!(
        repo.create(&ctx, &lower).unwrap_err().kind(),
        ErrorKind::Conflict
    );

    repo.delete(&ctx, created.id).unwrap();
    assert!(repo.delete(&ctx, created.id).unwrap_err().is_not_found());
    assert!(repo.find_by_id(&ctx, created.id).unwrap_err().is_not_found());
}

#[test]
fn every_successful_mutation_is_journaled_once() {
    let (store, repo) = setup();
    let ctx = RequestContext::new();

    let created = repo.create(&ctx, &acme()).unwrap();
    repo.create(&ctx, &acme()).unwrap_err();
    repo.update(&ctx, created.id, &CompanyPatch::new().name("Acme Two"))
        .unwrap();
    repo.delete(&ctx, created.id).unwrap();
    repo.delete(&ctx, created.id).unwrap_err();

    let journal = events(&store);
    let kinds: Vec<_> = journal.iter().map(|e| e.event_type.as_str()).collect();
    assert_eq!(
        kinds,
        vec!["company_deleted", "company_updated", "company_created"]
    );

    let snapshot = journal[1].payload_json().unwrap();
    assert_eq!(snapshot["id"], created.id.to_string());
    assert_eq!(snapshot["name"], "Acme Two");
    assert_eq!(snapshot["type"], "Corporations");

    let deleted = journal[0].payload_json().unwrap();
    assert!(deleted["deletedAt"].is_i64());
}
