use formstore::{
    DataNode, Dialect, ElementDef, FormDef, FormStore, HandlingType, SubmissionId, Value,
    PARENT_ID_COLUMN,
};

const NS: &str = "http://example.org/order";

fn order_form() -> FormDef {
    let root = ElementDef::new("order")
        .with_child(ElementDef::new("customer").with_type("string"))
        .with_child(
            ElementDef::new("line")
                .repeatable()
                .with_child(ElementDef::new("sku").with_type("string"))
                .with_child(
                    ElementDef::new("batch")
                        .repeatable()
                        .with_child(ElementDef::new("lot").with_type("string")),
                ),
        );
    FormDef::new("order", NS, root)
}

fn order_instance(customer: &str) -> DataNode {
    DataNode::new("order")
        .with_namespace(NS)
        .with_child(DataNode::new("customer").with_text(customer))
        .with_child(
            DataNode::new("line")
                .with_child(DataNode::new("sku").with_text("AB-1"))
                .with_child(DataNode::new("batch").with_child(DataNode::new("lot").with_text("L1")))
                .with_child(DataNode::new("batch").with_child(DataNode::new("lot").with_text("L2"))),
        )
        .with_child(
            DataNode::new("line").with_child(DataNode::new("sku").with_text("CD-2")),
        )
}

#[test]
fn test_remove_instance_deletes_descendant_rows() {
    let store = FormStore::new(Dialect::MySql);
    let record = store.add_schema(&order_form()).unwrap();
    let row_id = store
        .save_form_data(&order_instance("ada"), SubmissionId::new())
        .unwrap()
        .unwrap();
    assert_eq!(store.row_count("schema_order_line").unwrap(), 2);
    assert_eq!(store.row_count("schema_order_line_batch").unwrap(), 2);

    let issues = store.remove_instance(record.id, row_id).unwrap();
    assert!(issues.is_empty(), "unexpected issues: {issues:?}");
    assert_eq!(store.row_count("schema_order").unwrap(), 0);
    assert_eq!(store.row_count("schema_order_line").unwrap(), 0);
    assert_eq!(store.row_count("schema_order_line_batch").unwrap(), 0);
}

#[test]
fn test_remove_instance_keeps_tables_and_other_instances() {
    let store = FormStore::new(Dialect::MySql);
    let record = store.add_schema(&order_form()).unwrap();
    let first = store
        .save_form_data(&order_instance("ada"), SubmissionId::new())
        .unwrap()
        .unwrap();
    let second = store
        .save_form_data(&order_instance("grace"), SubmissionId::new())
        .unwrap()
        .unwrap();

    store.remove_instance(record.id, first).unwrap();

    // tables survive even when emptied, and the other instance is intact
    assert!(store.table_exists("schema_order"));
    assert!(store.table_exists("schema_order_line"));
    assert_eq!(store.row_count("schema_order").unwrap(), 1);
    assert_eq!(
        store.engine().value_at("schema_order", second, "customer").unwrap(),
        Value::Text("grace".into())
    );
    let second_lines = store
        .engine()
        .rows_where("schema_order_line", PARENT_ID_COLUMN, &Value::Integer(second))
        .unwrap();
    assert_eq!(second_lines.len(), 2);
    assert_eq!(store.instances_for(record.id).len(), 1);
}

#[test]
fn test_remove_instance_rewrites_handling_records() {
    let store = FormStore::new(Dialect::MySql);
    let record = store.add_schema(&order_form()).unwrap();
    let submission = SubmissionId::new();
    let row_id = store.save_form_data(&order_instance("ada"), submission).unwrap().unwrap();

    store.remove_instance(record.id, row_id).unwrap();

    let records = store.handling_records(submission);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].handling_type, HandlingType::deleted());
}

#[test]
fn test_remove_missing_instance_reports_issue() {
    let store = FormStore::new(Dialect::MySql);
    let record = store.add_schema(&order_form()).unwrap();

    let issues = store.remove_instance(record.id, 42).unwrap();
    assert_eq!(issues.len(), 1);
    assert!(issues[0].detail.contains("root row not found"));
}

#[test]
fn test_remove_instance_is_idempotent_per_row() {
    let store = FormStore::new(Dialect::MySql);
    let record = store.add_schema(&order_form()).unwrap();
    let row_id = store
        .save_form_data(&order_instance("ada"), SubmissionId::new())
        .unwrap()
        .unwrap();

    assert!(store.remove_instance(record.id, row_id).unwrap().is_empty());
    // second removal finds nothing to delete but does not fail
    let issues = store.remove_instance(record.id, row_id).unwrap();
    assert!(!issues.is_empty());
}
