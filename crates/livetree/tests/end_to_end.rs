//! Connection-level scenarios: a template compiles once, a session tracks
//! one simulated connection's view of the data over several snapshots, and
//! a client-side cache reconstructs the same HTML a direct render would
//! produce at every step.

use std::sync::Arc;

use livetree::prelude::*;
use livetree_client::CachedTree;
use serde_json::{json, Value};

fn session(src: &str) -> Session {
    Session::new(Arc::new(compile(src).unwrap()), Registry::new(), EngineConfig::default())
}

fn direct(src: &str, data: Value) -> String {
    let tpl = compile(src).unwrap();
    render_html(&tpl, data, &Registry::new(), &EngineConfig::default()).unwrap()
}

/// A single text field changes between two renders; the client should only
/// ever need the delta, never a full resend.
#[test]
fn scenario_field_update_round_trips_through_the_client() {
    let src = "<p>Hello {{.Name}}!</p>";
    let mut s = session(src);
    let mut cache = CachedTree::default();

    let full = s.next_delta(json!({"Name": "World"})).unwrap().unwrap();
    assert!(full.statics.is_some());
    cache.merge(&full).unwrap();
    assert_eq!(cache.render(), direct(src, json!({"Name": "World"})));

    let delta = s.next_delta(json!({"Name": "Ada"})).unwrap().unwrap();
    assert!(delta.statics.is_none(), "unchanged statics must not be retransmitted");
    cache.merge(&delta).unwrap();
    assert_eq!(cache.render(), direct(src, json!({"Name": "Ada"})));
}

/// Toggling a conditional's branch changes which nested sub-tree is active.
#[test]
fn scenario_conditional_branch_switch() {
    let src = "<div>{{if .LoggedIn}}Welcome, {{.Name}}!{{else}}Please log in{{end}}</div>";
    let mut s = session(src);
    let mut cache = CachedTree::default();

    let full = s.next_delta(json!({"LoggedIn": false, "Name": "Ada"})).unwrap().unwrap();
    cache.merge(&full).unwrap();
    assert_eq!(cache.render(), "<div>Please log in</div>");

    let delta = s.next_delta(json!({"LoggedIn": true, "Name": "Ada"})).unwrap().unwrap();
    cache.merge(&delta).unwrap();
    assert_eq!(cache.render(), "<div>Welcome, Ada!</div>");
}

/// Appending to the tail of a keyed list takes the append fast path and
/// the client lands on exactly the same HTML a full render would produce.
#[test]
fn scenario_list_append() {
    let src = r#"<ul>{{range .Items}}<li id="{{.Id}}">{{.Text}}</li>{{end}}</ul>"#;
    let mut s = session(src);
    let mut cache = CachedTree::default();

    let full = s
        .next_delta(json!({"Items": [{"Id": "a", "Text": "A"}, {"Id": "b", "Text": "B"}]}))
        .unwrap()
        .unwrap();
    cache.merge(&full).unwrap();

    let delta = s
        .next_delta(json!({"Items": [
            {"Id": "a", "Text": "A"},
            {"Id": "b", "Text": "B"},
            {"Id": "c", "Text": "C"},
        ]}))
        .unwrap()
        .unwrap();
    cache.merge(&delta).unwrap();
    assert_eq!(
        cache.render(),
        direct(
            src,
            json!({"Items": [
                {"Id": "a", "Text": "A"},
                {"Id": "b", "Text": "B"},
                {"Id": "c", "Text": "C"},
            ]})
        )
    );
}

/// Removing and updating distinct keyed items in the same snapshot.
#[test]
fn scenario_keyed_remove_and_update() {
    let src = r#"<ul>{{range .Items}}<li id="{{.Id}}">{{.Text}}</li>{{end}}</ul>"#;
    let mut s = session(src);
    let mut cache = CachedTree::default();

    let items = json!([
        {"Id": "a", "Text": "A"},
        {"Id": "b", "Text": "B"},
        {"Id": "c", "Text": "C"},
    ]);
    let full = s.next_delta(json!({"Items": items})).unwrap().unwrap();
    cache.merge(&full).unwrap();

    let updated = json!([
        {"Id": "a", "Text": "A"},
        {"Id": "c", "Text": "C-changed"},
    ]);
    let delta = s.next_delta(json!({"Items": updated})).unwrap().unwrap();
    cache.merge(&delta).unwrap();
    assert_eq!(
        cache.render(),
        direct(src, json!({"Items": [{"Id": "a", "Text": "A"}, {"Id": "c", "Text": "C-changed"}]}))
    );
}

/// A pure reorder (same keys, new order) collapses to a single op.
#[test]
fn scenario_reorder() {
    let src = r#"<ul>{{range .Items}}<li id="{{.Id}}">{{.Text}}</li>{{end}}</ul>"#;
    let mut s = session(src);
    let mut cache = CachedTree::default();

    let items = json!([
        {"Id": "a", "Text": "A"},
        {"Id": "b", "Text": "B"},
        {"Id": "c", "Text": "C"},
    ]);
    let full = s.next_delta(json!({"Items": items})).unwrap().unwrap();
    cache.merge(&full).unwrap();

    let reordered = json!([
        {"Id": "c", "Text": "C"},
        {"Id": "a", "Text": "A"},
        {"Id": "b", "Text": "B"},
    ]);
    let delta = s.next_delta(json!({"Items": reordered.clone()})).unwrap().unwrap();
    cache.merge(&delta).unwrap();
    assert_eq!(cache.render(), direct(src, json!({"Items": reordered})));
}

/// A `{{ template }}` invocation renders a named sub-template against a
/// narrower data context, and reacts to changes in that sub-context alone.
#[test]
fn scenario_named_template_invocation() {
    let mut registry = Registry::new();
    registry.register("user_badge", "<span>{{.Name}} ({{.Role}})</span>").unwrap();
    let tpl = compile(r#"<div>{{template "user_badge" .User}}</div>"#).unwrap();
    let mut session = Session::new(Arc::new(tpl), registry, EngineConfig::default());
    let mut cache = CachedTree::default();

    let full = session
        .next_delta(json!({"User": {"Name": "Ada", "Role": "admin"}}))
        .unwrap()
        .unwrap();
    cache.merge(&full).unwrap();
    assert_eq!(cache.render(), "<div><span>Ada (admin)</span></div>");

    let delta = session
        .next_delta(json!({"User": {"Name": "Ada", "Role": "member"}}))
        .unwrap()
        .unwrap();
    cache.merge(&delta).unwrap();
    assert_eq!(cache.render(), "<div><span>Ada (member)</span></div>");
}

/// Reconnection: resetting a session forces the next call to hand back a
/// full tree again instead of (incorrectly) assuming the new client already
/// holds the previous one.
#[test]
fn scenario_reconnect_forces_a_full_resync() {
    let src = "<p>{{.Name}}</p>";
    let mut s = session(src);
    s.next_delta(json!({"Name": "Ada"})).unwrap();
    s.reset();
    let after_reconnect = s.next_delta(json!({"Name": "Ada"})).unwrap().unwrap();
    assert!(after_reconnect.statics.is_some());
}

/// P1: interleaving a tree's statics/dynamics reproduces a direct render.
#[test]
fn property_interleave_matches_direct_render() {
    let src = "<ul>{{range .Items}}<li>{{.}}</li>{{end}}</ul>";
    let data = json!({"Items": ["x", "y", "z"]});
    let tpl = compile(src).unwrap();
    let registry = Registry::new();
    let config = EngineConfig::default();
    let tree = livetree_core::render_tree(&tpl, &Scope::root(data.clone()), &registry, &config).unwrap();
    assert_eq!(livetree_core::interleave(&tree), direct(src, data));
}

/// P6: rendering the same template against the same data twice produces
/// byte-identical trees.
#[test]
fn property_render_is_pure() {
    let src = "<p>{{.Name}} is {{.Age}}</p>";
    let data = json!({"Name": "Ada", "Age": 36});
    let tpl = compile(src).unwrap();
    let registry = Registry::new();
    let config = EngineConfig::default();
    let a = livetree_core::render_tree(&tpl, &Scope::root(data.clone()), &registry, &config).unwrap();
    let b = livetree_core::render_tree(&tpl, &Scope::root(data), &registry, &config).unwrap();
    assert_eq!(a, b);
}

/// P5: an unchanged snapshot never produces a frame to send.
#[test]
fn property_unchanged_snapshot_yields_no_delta() {
    let mut s = session("<p>{{.Name}}</p>");
    s.next_delta(json!({"Name": "Ada"})).unwrap();
    assert!(s.next_delta(json!({"Name": "Ada"})).unwrap().is_none());
}
