//! Projection Tests
//!
//! Depth handling of `select_struct` in uniform and per-field form, and
//! request validation against the generated spec.

use std::path::PathBuf;

use familiar_odm::{
    load_from_file, select_struct, DepthSpec, OdmError, ProjectionBuilder, ProjectionSpec,
    SchemaRegistry,
};
use serde_json::json;

fn registry() -> SchemaRegistry {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/blog_schemas.json");
    load_from_file(&path).unwrap()
}

fn depth(value: serde_json::Value) -> DepthSpec {
    serde_json::from_value(value).unwrap()
}

fn select(spec: serde_json::Value) -> ProjectionSpec {
    select_struct(&registry(), "post", &depth(spec)).unwrap()
}

// =============================================================================
// Uniform depth
// =============================================================================

#[test]
fn test_depth_zero_is_pure_fields_only() {
    let spec = select(json!(0));
    assert_eq!(spec.flag_names(), vec!["title", "body"]);
    assert!(spec.relation_names().is_empty());
    assert_eq!(spec.max_depth(), 0);
}

#[test]
fn test_negative_depth_is_pure_fields_only() {
    let spec = select(json!(-3));
    assert!(spec.relation_names().is_empty());
}

#[test]
fn test_depth_two_stops_at_second_level() {
    let spec = select(json!(2));
    // in-relations first, then out-relations
    assert_eq!(spec.relation_names(), vec!["comments", "editor"]);

    let comments = spec.nested("comments").unwrap();
    assert_eq!(comments.schema, "comment");
    assert_eq!(comments.flag_names(), vec!["text"]);
    assert_eq!(comments.relation_names(), vec!["writer"]);

    let writer = comments.nested("writer").unwrap();
    assert_eq!(writer.flag_names(), vec!["name", "email"]);
    assert!(writer.relation_names().is_empty());

    let editor = spec.nested("editor").unwrap();
    assert_eq!(editor.relation_names(), vec!["posts"]);
    assert!(editor.nested("posts").unwrap().relation_names().is_empty());
    assert_eq!(spec.max_depth(), 2);
}

#[test]
fn test_main_relations_are_not_projected() {
    let spec = select(json!(5));
    assert!(spec.get("author").is_none());
    assert!(spec.nested("comments").unwrap().get("post").is_none());
}

#[test]
fn test_descriptive_cycle_is_bounded_by_depth() {
    // user.posts -> post.comments -> comment.writer -> user ...
    let spec = select_struct(&registry(), "user", &DepthSpec::Leaf(4)).unwrap();
    assert_eq!(spec.max_depth(), 4);
    let writer = spec
        .nested("posts")
        .and_then(|p| p.nested("comments"))
        .and_then(|c| c.nested("writer"))
        .unwrap();
    assert_eq!(writer.schema, "user");
    assert_eq!(writer.relation_names(), vec!["posts"]);
}

// =============================================================================
// Per-field depth
// =============================================================================

#[test]
fn test_leaf_entry_expands_once() {
    let spec = select(json!({ "comments": 1 }));
    let comments = spec.nested("comments").unwrap();
    assert!(comments.relation_names().is_empty());
}

#[test]
fn test_exhausted_leaf_entry_is_skipped() {
    let spec = select(json!({ "comments": 0 }));
    assert!(spec.nested("comments").is_none());
    assert!(spec.get("comments").is_none());
}

#[test]
fn test_branch_entry_always_expands_and_passes_through() {
    let spec = select(json!({ "comments": { "writer": { "posts": 0 } } }));

    let comments = spec.nested("comments").unwrap();
    let writer = comments.nested("writer").unwrap();
    assert_eq!(writer.schema, "user");
    // {"posts": 0} reached the user level intact and was decremented there
    assert!(writer.nested("posts").is_none());

    let spec = select(json!({ "comments": { "writer": { "posts": 1 } } }));
    let posts = spec
        .nested("comments")
        .and_then(|c| c.nested("writer"))
        .and_then(|w| w.nested("posts"))
        .unwrap();
    assert!(posts.relation_names().is_empty());
}

#[test]
fn test_mixed_leaf_and_branch_entries() {
    let spec = select(json!({ "editor": 1, "comments": { "writer": 3 } }));

    // declaration order wins over the order of the depth map
    assert_eq!(spec.relation_names(), vec!["comments", "editor"]);

    // the leaf entry expands once and stops
    let editor = spec.nested("editor").unwrap();
    assert_eq!(editor.schema, "user");
    assert!(editor.relation_names().is_empty());

    // the branch entry reaches comment unchanged; "writer": 3 is spent there
    let writer = spec.nested("comments").and_then(|c| c.nested("writer")).unwrap();
    assert_eq!(writer.relation_names(), vec!["posts"]);
    let posts = writer.nested("posts").unwrap();
    assert_eq!(posts.relation_names(), vec!["comments", "editor"]);
    assert!(posts.nested("comments").unwrap().relation_names().is_empty());
    assert!(posts.nested("editor").unwrap().relation_names().is_empty());
}

#[test]
fn test_empty_branch_expands_pure_fields() {
    let spec = select(json!({ "comments": {} }));
    let comments = spec.nested("comments").unwrap();
    assert_eq!(comments.flag_names(), vec!["text"]);
    assert!(comments.relation_names().is_empty());
}

#[test]
fn test_unknown_keys_are_ignored() {
    let spec = select(json!({ "author": 3, "likes": 2, "comments": 1 }));
    assert_eq!(spec.relation_names(), vec!["comments"]);
}

// =============================================================================
// Builder, errors, validation
// =============================================================================

#[test]
fn test_builder_default_depth() {
    let registry = registry();
    let builder = ProjectionBuilder::new(&registry);
    assert_eq!(builder.select_default("post").unwrap().max_depth(), 2);
    assert_eq!(builder.with_default_depth(1).select_default("post").unwrap().max_depth(), 1);
}

#[test]
fn test_unknown_schema() {
    match select_struct(&registry(), "posts", &DepthSpec::default()) {
        Err(OdmError::UnknownSchema { suggestion, .. }) => assert_eq!(suggestion.as_deref(), Some("post")),
        other => panic!("Expected UnknownSchema, got {:?}", other),
    }
}

#[test]
fn test_validate_requests() {
    let spec = select(json!(2));

    assert!(spec.validate(&json!(null)).is_ok());
    assert!(spec.validate(&json!({})).is_ok());
    assert!(spec.validate(&json!({ "title": 1, "comments": { "text": 0, "writer": { "name": 1 } } })).is_ok());
    assert!(spec.validate(&json!({ "comments": null })).is_ok());

    let violation = spec.validate(&json!({ "title": 2 })).unwrap_err();
    assert_eq!(violation.path, "title");

    let violation = spec.validate(&json!({ "comments": { "writer": { "posts": 1 } } })).unwrap_err();
    assert_eq!(violation.path, "comments.writer.posts");

    let violation = spec.validate(&json!({ "comments": 1 })).unwrap_err();
    assert_eq!(violation.path, "comments");

    assert!(spec.validate(&json!([1])).is_err());
}

#[test]
fn test_to_document_includes_everything() {
    let spec = select(json!({ "comments": 1 }));
    assert_eq!(
        spec.to_document(),
        json!({ "title": 1, "body": 1, "comments": { "text": 1 } })
    );
}
