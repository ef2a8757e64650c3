use super::*;

#[test]
fn default_registry_resolves_every_bundled_widget() {
    let registry = WidgetRegistry::default();
    assert_eq!(
        registry.widget_ids(),
        vec!["Continue", "MultipleChoiceInput", "NumericInput", "TextInput"]
    );
    for id in registry.widget_ids() {
        assert_eq!(registry.get_widget_by_id(id).expect("widget").id(), id);
    }
}

#[test]
fn unknown_widget_is_an_error() {
    let registry = WidgetRegistry::default();
    let err = registry
        .get_widget_by_id("InteractiveMap")
        .err()
        .expect("unknown widget");
    assert!(matches!(err, WidgetError::UnknownWidget(id) if id == "InteractiveMap"));
}

#[test]
fn stats_log_defaults_to_reader_response() {
    let widget = Continue;
    let args = CustomizationArgs::new();
    let params = Params::new();
    let answer = Value::Null;
    assert_eq!(
        widget.stats_log_html(&args, &params, &answer).expect("stats"),
        widget.reader_response_html(&args, &params, &answer).expect("response").html
    );
}
