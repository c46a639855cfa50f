use formstore::{
    DataNode, Dialect, ElementDef, FormDef, FormStore, StorageError, SubmissionId,
};

const NS: &str = "http://example.org/visit";

fn visit_form() -> FormDef {
    let root = ElementDef::new("visit")
        .with_child(ElementDef::new("date").with_type("date"))
        .with_child(
            ElementDef::new("patient")
                .with_child(ElementDef::new("name").with_type("string"))
                .with_child(ElementDef::new("age").with_type("integer")),
        )
        .with_child(
            ElementDef::new("items")
                .repeatable()
                .with_child(ElementDef::new("sku").with_type("string"))
                .with_child(ElementDef::new("count").with_type("int")),
        );
    FormDef::new("visit", NS, root)
}

fn visit_instance(date: &str) -> DataNode {
    DataNode::new("visit")
        .with_namespace(NS)
        .with_child(DataNode::new("date").with_text(date))
        .with_child(
            DataNode::new("patient")
                .with_child(DataNode::new("name").with_text("ada"))
                .with_child(DataNode::new("age").with_text("36")),
        )
        .with_child(
            DataNode::new("items")
                .with_child(DataNode::new("sku").with_text("AB-1"))
                .with_child(DataNode::new("count").with_text("2")),
        )
}

#[test]
fn test_add_schema_creates_all_tables() {
    let store = FormStore::new(Dialect::MySql);
    let record = store.add_schema(&visit_form()).unwrap();

    assert_eq!(record.root_table, "schema_visit");
    assert!(store.table_exists("schema_visit"));
    assert!(store.table_exists("schema_visit_items"));
    assert_eq!(store.table_count(), 2);
}

#[test]
fn test_add_schema_is_transactional() {
    let store = FormStore::new(Dialect::MySql);
    store.add_schema(&visit_form()).unwrap();

    // same form again: the root table name collides and nothing new is left
    let result = store.add_schema(&visit_form());
    assert!(matches!(result, Err(StorageError::TableExists(_))));
    assert_eq!(store.table_count(), 2);
    assert_eq!(store.registry().all_tables().len(), 2);
}

#[test]
fn test_schemas_with_domain_and_version_coexist() {
    let store = FormStore::new(Dialect::MySql);
    store.add_schema(&visit_form()).unwrap();
    let versioned = store
        .add_schema(&visit_form().with_domain("clinic").with_version(2))
        .unwrap();

    assert_eq!(versioned.root_table, "schema_clinic_visit_v2");
    assert!(store.table_exists("schema_clinic_visit_v2"));
    assert!(store.table_exists("schema_clinic_visit_items_v2"));
    assert_eq!(store.table_count(), 4);
}

#[test]
fn test_empty_form_is_rejected() {
    let store = FormStore::new(Dialect::MySql);
    let form = FormDef::new("empty", "http://example.org/empty", ElementDef::new("empty"));
    let result = store.add_schema(&form);
    assert!(matches!(result, Err(StorageError::EmptyForm(_))));
    assert_eq!(store.table_count(), 0);
}

#[test]
fn test_remove_schema_drops_tables_and_metadata() {
    let store = FormStore::new(Dialect::MySql);
    let record = store.add_schema(&visit_form()).unwrap();
    store
        .save_form_data(&visit_instance("2009-01-02"), SubmissionId::new())
        .unwrap();

    let issues = store.remove_schema(record.id).unwrap();
    assert!(issues.is_empty());
    assert!(!store.table_exists("schema_visit"));
    assert!(!store.table_exists("schema_visit_items"));
    assert!(store.get_form(record.id).is_err());
    assert!(store.registry().is_empty());
}

#[test]
fn test_schema_can_be_registered_again_after_removal() {
    let store = FormStore::new(Dialect::MySql);
    let first = store.add_schema(&visit_form()).unwrap();
    store.remove_schema(first.id).unwrap();

    let second = store.add_schema(&visit_form()).unwrap();
    assert_ne!(first.id, second.id);
    assert!(store.table_exists("schema_visit"));
}

#[test]
fn test_remove_schema_reverts_submission_handling() {
    let store = FormStore::new(Dialect::MySql);
    let record = store.add_schema(&visit_form()).unwrap();
    let submission = SubmissionId::new();
    store
        .save_form_data(&visit_instance("2009-01-02"), submission)
        .unwrap();
    assert!(!store.is_orphaned(submission));

    store.remove_schema(record.id).unwrap();
    // its data is gone, so the submission counts as unhandled again
    assert!(store.is_orphaned(submission));
}

#[test]
fn test_remove_unknown_schema_fails() {
    let store = FormStore::new(Dialect::MySql);
    assert!(matches!(
        store.remove_schema(99),
        Err(StorageError::SchemaNotFound(_))
    ));
}

#[test]
fn test_clear_leaves_nothing_behind() {
    let dir = tempfile::tempdir().unwrap();
    let store = FormStore::new(Dialect::MySql)
        .with_submission_dir(dir.path())
        .unwrap();
    store.add_schema(&visit_form()).unwrap();
    let submission = SubmissionId::new();
    store.store_payload(submission, b"<visit/>").unwrap();
    store.save_form_data(&visit_instance("2009-01-02"), submission).unwrap();

    let issues = store.clear();
    assert!(issues.is_empty(), "unexpected issues: {issues:?}");
    assert_eq!(store.table_count(), 0);
    assert!(store.registry().is_empty());
    assert!(store.is_orphaned(submission));
    let leftover: Vec<_> = std::fs::read_dir(dir.path()).unwrap().flatten().collect();
    assert!(leftover.is_empty());
}
