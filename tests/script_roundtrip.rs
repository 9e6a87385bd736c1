//! Sanitized arguments parsed by a real script engine come back unchanged.
#![cfg(feature = "boa")]

use rfshield::boa::BoaWebView;
use rfshield::webview::{ContentWorld, WebView};
use rfshield::{sanitize, ScriptArgument, ScriptCall};
use serde_json::{json, Value};

fn hostile_strings() -> Vec<String> {
    vec![
        String::new(),
        "plain".to_string(),
        "it's".to_string(),
        "\"double\" and 'single'".to_string(),
        "</script><script>alert(1)</script>".to_string(),
        "back\\slash\\".to_string(),
        "\\u0041 is not A".to_string(),
        "line\nbreak\r\ttab\u{0}nul".to_string(),
        "sep\u{2028}ara\u{2029}tors".to_string(),
        "`${document.cookie}`".to_string(),
        "&lt;already&gt; &amp; entities".to_string(),
        "emoji \u{1F600} and \u{00e9}".to_string(),
        "');window.pwned=true;('".to_string(),
    ]
}

#[test]
fn strings_evaluate_back_to_themselves() {
    let mut view = BoaWebView::default();
    for s in hostile_strings() {
        let literal = sanitize(&ScriptArgument::from(s.as_str()), true).unwrap();
        let value = view.evaluate_javascript(&literal, None, &ContentWorld::Page).unwrap();
        assert_eq!(value, Value::String(s.clone()), "literal {}", literal);
    }
    let pwned = view.evaluate_javascript("typeof window.pwned", None, &ContentWorld::Page).unwrap();
    assert_eq!(pwned, json!("undefined"));
}

#[test]
fn strings_survive_a_full_call() {
    let mut view = BoaWebView::default();
    view.evaluate_javascript("function echo(a, b) { return [a, b]; }", None, &ContentWorld::Page)
        .unwrap();
    for s in hostile_strings() {
        let call = ScriptCall::build("echo", &[s.as_str().into(), ScriptArgument::Null], true).unwrap();
        let value = view.evaluate_javascript(call.as_str(), None, &ContentWorld::Page).unwrap();
        assert_eq!(value, json!([s, null]));
    }
}

#[test]
fn json_values_are_deep_equal_after_parsing() {
    let mut view = BoaWebView::default();
    let values = vec![
        json!(null),
        json!(true),
        json!(7),
        json!(2.5),
        json!("</script>"),
        json!([1, "two", [3], {"four": 4}]),
        json!({"html": "<img src=x onerror=alert(1)>", "amp": "a&b", "sep": "\u{2028}", "nested": {"list": [], "empty": {}}}),
    ];
    for v in values {
        let fragment = sanitize(&ScriptArgument::from(v.clone()), true).unwrap();
        assert!(!fragment.contains('<'));
        let value = view
            .evaluate_javascript(&format!("({})", fragment), None, &ContentWorld::Page)
            .unwrap();
        assert_eq!(value, v, "fragment {}", fragment);
    }
}

#[test]
fn call_has_one_fragment_per_argument() {
    let mut view = BoaWebView::default();
    view.evaluate_javascript("function count() { return arguments.length; }", None, &ContentWorld::Page)
        .unwrap();
    let args: Vec<ScriptArgument> = vec![
        "a, b".into(),
        json!({"x": [1, 2, 3]}).into(),
        ScriptArgument::Null,
        "'),(".into(),
    ];
    for n in 0..=args.len() {
        let call = ScriptCall::build("count", &args[..n], true).unwrap();
        let value = view.evaluate_javascript(call.as_str(), None, &ContentWorld::Page).unwrap();
        assert_eq!(value, json!(n));
    }
}
