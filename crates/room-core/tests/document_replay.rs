//! Integration tests: wire-format batches applied to a scene document.
//!
//! Batches are decoded from the JSON the editor sends in
//! `PATCH /scenes/{id}/items` and replayed against a `SceneDocument`.

use pretty_assertions::assert_eq;
use room_core::{ApplyError, DeltaOp, ItemId, SceneDocument, Transform};
use serde_json::json;

fn living_room() -> SceneDocument {
    let mut doc = SceneDocument::new(5);
    doc.insert(ItemId::intern("chair-1"), "chair-oak", Transform::at([0.0, 0.0, 0.0]));
    doc.insert(ItemId::intern("sofa-1"), "sofa-classic", Transform::at([2.0, 0.0, 0.0]));
    doc
}

fn decode(batch: serde_json::Value) -> Vec<DeltaOp> {
    serde_json::from_value(batch).expect("valid batch")
}

#[test]
fn mixed_batch_applies_in_order() {
    let mut doc = living_room();
    let ops = decode(json!([
        { "op": "update_item", "id": "chair-1", "transform": { "position": [1.0, 0.0, 2.0] } },
        { "op": "update_item", "id": "chair-1", "transform": { "rotation_euler": [0.0, 1.5, 0.0] } },
        { "op": "add_item", "assetId": "lamp-arc", "categoryKey": "lighting",
          "transform": { "position": [3.0, 0.0, 1.0] } },
        { "op": "update_material", "id": "sofa-1", "materialOverrides": { "fabric": "linen" } },
        { "op": "update_props", "environment": "sunset", "exposure": 1.2 },
        { "op": "remove_item", "id": "chair-1" }
    ]));

    let version = doc.apply(&ops).unwrap();
    assert_eq!(version, 6);
    assert!(doc.item(ItemId::intern("chair-1")).is_none());
    assert_eq!(
        doc.item(ItemId::intern("item-1")).unwrap().category_key.as_deref(),
        Some("lighting")
    );
    assert_eq!(
        doc.item(ItemId::intern("sofa-1")).unwrap().material_overrides["fabric"],
        json!("linen")
    );
    assert_eq!(doc.props["environment"], json!("sunset"));
}

#[test]
fn update_after_remove_in_same_batch_fails() {
    let mut doc = living_room();
    let ops = decode(json!([
        { "op": "remove_item", "id": "sofa-1" },
        { "op": "update_item", "id": "sofa-1", "transform": { "scale": [2.0, 2.0, 2.0] } }
    ]));
    assert_eq!(
        doc.apply(&ops),
        Err(ApplyError::ItemNotFound(ItemId::intern("sofa-1")))
    );
    assert_eq!(doc.version, 5);
    assert!(doc.item(ItemId::intern("sofa-1")).is_some());
}

#[test]
fn update_without_transform_still_bumps_version() {
    let mut doc = living_room();
    let ops = decode(json!([{ "op": "update_item", "id": "chair-1" }]));
    assert_eq!(doc.apply(&ops), Ok(6));
    assert_eq!(
        doc.item(ItemId::intern("chair-1")).unwrap().transform,
        Transform::at([0.0, 0.0, 0.0])
    );
}

#[test]
fn document_serializes_for_inspection() {
    let doc = living_room();
    let v = serde_json::to_value(&doc).unwrap();
    assert_eq!(v["version"], json!(5));
    assert_eq!(v["items"]["chair-1"]["assetId"], json!("chair-oak"));
}

#[test]
fn hand_written_document_fills_defaults() {
    let mut doc: SceneDocument = serde_json::from_value(json!({
        "version": 2,
        "items": { "rug-1": { "id": "rug-1", "assetId": "rug-wool" } }
    }))
    .unwrap();
    let ops = decode(json!([{ "op": "add_item", "assetId": "plant" }]));
    assert_eq!(doc.apply(&ops), Ok(3));
    assert!(doc.item(ItemId::intern("item-1")).is_some());
    assert!(doc.props.is_empty());
}
