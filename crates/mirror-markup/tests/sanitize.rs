use std::collections::BTreeMap;

use mirror_markup::{parse, sanitize, sanitize_attributes, sanitize_tree, ContentType};

fn html(src: &str) -> String {
    sanitize(src, ContentType::Html).expect("markup sanitizes")
}

#[test]
fn neutralizes_links_and_handlers() {
    assert_eq!(
        html(r#"<a href="javascript:evil()" onclick="evil()">hi</a>"#),
        r##"<a href="#">hi</a>"##
    );
}

#[test]
fn strips_frame_sources() {
    assert_eq!(
        html(r#"<div><iframe src="http://x" name="f"></iframe><frame src="y"></frame></div>"#),
        r#"<div><iframe name="f"></iframe><frame></frame></div>"#
    );
}

#[test]
fn removes_head_noise() {
    assert_eq!(
        html(r#"<head><meta charset="utf-8"><title>t</title><style>p{}</style></head>"#),
        "<head><style>p{}</style></head>"
    );
}

#[test]
fn inserts_tbody_for_bare_rows() {
    assert_eq!(
        html("<table><tr><td>1</td></tr><tr><td>2</td></tr></table>"),
        "<table><tbody><tr><td>1</td></tr><tr><td>2</td></tr></tbody></table>"
    );
}

#[test]
fn colgroup_stays_outside_inserted_tbody() {
    assert_eq!(
        html("<table><colgroup><col></colgroup><tr><td>1</td></tr></table>"),
        "<table><colgroup><col></colgroup><tbody><tr><td>1</td></tr></tbody></table>"
    );
}

#[test]
fn explicit_section_ends_inserted_tbody() {
    assert_eq!(
        html("<table><tr><td>a</td></tr><tfoot><tr><td>f</td></tr></tfoot><tr><td>b</td></tr></table>"),
        "<table><tbody><tr><td>a</td></tr></tbody><tfoot><tr><td>f</td></tr></tfoot><tbody><tr><td>b</td></tr></tbody></table>"
    );
}

#[test]
fn text_after_moved_row_moves_with_it() {
    assert_eq!(
        html("<table>\n<tr><td>1</td></tr>\n</table>"),
        "<table>\n<tbody><tr><td>1</td></tr>\n</tbody></table>"
    );
}

#[test]
fn nested_tables_are_fixed_too() {
    assert_eq!(
        html("<div><table><tr><td><table><tr><td>x</td></tr></table></td></tr></table></div>"),
        "<div><table><tbody><tr><td><table><tbody><tr><td>x</td></tr></tbody></table></td></tr></tbody></table></div>"
    );
}

#[test]
fn foreign_content_keeps_case_and_strips_script() {
    let out = sanitize(
        r#"<svg viewBox="0 0 1 1" onload="x()"><script>x()</script><a xlink:href="http://e"><title>t</title></a></svg>"#,
        ContentType::Svg,
    )
    .unwrap();
    assert_eq!(
        out,
        r##"<svg viewBox="0 0 1 1"><a xlink:href="#"><title>t</title></a></svg>"##
    );
}

#[test]
fn unknown_tags_pass_through() {
    let src = r#"<div><custom-widget data-x="1">y</custom-widget></div>"#;
    assert_eq!(html(src), src);
}

#[test]
fn sanitize_tree_matches_sanitize() {
    let src = r#"<p onmouseover="x()">a<script>b</script><blink>c</blink></p>"#;
    let tree = sanitize_tree(parse(src).unwrap().unwrap(), ContentType::Html).unwrap();
    assert_eq!(tree.to_markup(ContentType::Html), html(src));
    assert_eq!(html(src), "<p>ac</p>");
}

#[test]
fn sanitizing_is_idempotent() {
    let once = html(r#"<table onclick="x"><tr><td><a href="/y">y</a></td></tr></table>"#);
    assert_eq!(html(&once), once);
}

#[test]
fn malformed_markup_is_reported() {
    let err = sanitize("<div><span></div>", ContentType::Html).unwrap_err();
    assert_eq!(err.kind(), "mismatched_close_tag");
}

#[test]
fn stylesheet_links_survive_snapshot_and_attribute_changes() {
    let head = sanitize(
        r#"<head><link rel="stylesheet" href="a.css"></head>"#,
        ContentType::Html,
    )
    .unwrap();
    assert_eq!(head, r#"<head><link href="a.css" rel="stylesheet"></head>"#);

    let mut change = BTreeMap::from([
        ("href".to_string(), "b.css".to_string()),
        ("onload".to_string(), "x()".to_string()),
    ]);
    sanitize_attributes(&mut change);
    assert_eq!(
        change,
        BTreeMap::from([("href".to_string(), "b.css".to_string())])
    );
}
