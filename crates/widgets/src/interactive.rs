use serde_json::{json, Value};
use shared::domain::Params;

use crate::{
    template::{escape_html, parse_with_params, value_to_text},
    CustomizationArgs, InteractiveWidget, ReaderResponse, WidgetError,
};

/// Renders `<oppia-interactive-{tag} name-with-value="json" ...>`.
fn interactive_tag(tag: &str, attrs: &[(&str, Value)]) -> String {
    let mut out = format!("<oppia-interactive-{tag}");
    for (name, value) in attrs {
        out.push_str(&format!(
            " {name}-with-value=\"{}\"",
            escape_html(&value.to_string())
        ));
    }
    out.push_str(&format!("></oppia-interactive-{tag}>"));
    out
}

fn response_paragraph(text: &str) -> ReaderResponse {
    ReaderResponse {
        html: format!("<p class=\"oppia-reader-response\">{}</p>", escape_html(text)),
        iframe: String::new(),
    }
}

fn string_arg(args: &CustomizationArgs, name: &str, default: &str, params: &Params) -> String {
    let raw = args
        .get(name)
        .and_then(Value::as_str)
        .unwrap_or(default);
    parse_with_params(raw, params)
}

fn parse_number(widget: &'static str, answer: &Value) -> Result<f64, WidgetError> {
    let parsed = match answer {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed
        .filter(|n| n.is_finite())
        .ok_or_else(|| WidgetError::InvalidAnswer {
            widget,
            answer: answer.clone(),
            reason: "expected a number".into(),
        })
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Continue;

impl InteractiveWidget for Continue {
    fn id(&self) -> &'static str {
        "Continue"
    }

    fn raw_code(&self, args: &CustomizationArgs, params: &Params) -> Result<String, WidgetError> {
        let button_text = string_arg(args, "buttonText", "Continue", params);
        Ok(interactive_tag("continue", &[("button-text", json!(button_text))]))
    }

    fn normalize_answer(
        &self,
        _args: &CustomizationArgs,
        answer: &Value,
    ) -> Result<Value, WidgetError> {
        Ok(answer.clone())
    }

    fn reader_response_html(
        &self,
        args: &CustomizationArgs,
        params: &Params,
        _answer: &Value,
    ) -> Result<ReaderResponse, WidgetError> {
        Ok(response_paragraph(&string_arg(
            args,
            "buttonText",
            "Continue",
            params,
        )))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TextInput;

impl InteractiveWidget for TextInput {
    fn id(&self) -> &'static str {
        "TextInput"
    }

    fn raw_code(&self, args: &CustomizationArgs, params: &Params) -> Result<String, WidgetError> {
        let placeholder = string_arg(args, "placeholder", "Type your answer here.", params);
        let rows = match args.get("rows") {
            None => 1,
            Some(value) => value
                .as_u64()
                .filter(|rows| (1..=200).contains(rows))
                .ok_or_else(|| WidgetError::InvalidCustomization {
                    widget: "TextInput",
                    arg: "rows",
                    reason: format!("expected an integer between 1 and 200, got {value}"),
                })?,
        };
        Ok(interactive_tag(
            "text-input",
            &[("placeholder", json!(placeholder)), ("rows", json!(rows))],
        ))
    }

    fn normalize_answer(
        &self,
        _args: &CustomizationArgs,
        answer: &Value,
    ) -> Result<Value, WidgetError> {
        match answer {
            Value::String(_) => Ok(answer.clone()),
            Value::Number(_) | Value::Bool(_) => Ok(Value::String(answer.to_string())),
            _ => Err(WidgetError::InvalidAnswer {
                widget: "TextInput",
                answer: answer.clone(),
                reason: "expected text".into(),
            }),
        }
    }

    fn reader_response_html(
        &self,
        _args: &CustomizationArgs,
        _params: &Params,
        answer: &Value,
    ) -> Result<ReaderResponse, WidgetError> {
        Ok(response_paragraph(&value_to_text(answer)))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NumericInput;

impl InteractiveWidget for NumericInput {
    fn id(&self) -> &'static str {
        "NumericInput"
    }

    fn raw_code(&self, _args: &CustomizationArgs, _params: &Params) -> Result<String, WidgetError> {
        Ok(interactive_tag("numeric-input", &[]))
    }

    fn normalize_answer(
        &self,
        _args: &CustomizationArgs,
        answer: &Value,
    ) -> Result<Value, WidgetError> {
        let number = parse_number("NumericInput", answer)?;
        Ok(json!(number))
    }

    fn reader_response_html(
        &self,
        _args: &CustomizationArgs,
        _params: &Params,
        answer: &Value,
    ) -> Result<ReaderResponse, WidgetError> {
        Ok(response_paragraph(&value_to_text(answer)))
    }
}

/// Answers are 0-based indexes into the `choices` argument.
#[derive(Debug, Clone, Copy, Default)]
pub struct MultipleChoiceInput;

impl MultipleChoiceInput {
    fn choices(args: &CustomizationArgs, params: &Params) -> Result<Vec<String>, WidgetError> {
        let invalid = |reason: &str| WidgetError::InvalidCustomization {
            widget: "MultipleChoiceInput",
            arg: "choices",
            reason: reason.to_string(),
        };
        let choices = args
            .get("choices")
            .and_then(Value::as_array)
            .ok_or_else(|| invalid("expected a list of strings"))?;
        if choices.is_empty() {
            return Err(invalid("at least one choice is required"));
        }
        choices
            .iter()
            .map(|choice| {
                choice
                    .as_str()
                    .map(|text| parse_with_params(text, params))
                    .ok_or_else(|| invalid("expected a list of strings"))
            })
            .collect()
    }

    fn choice_index(args: &CustomizationArgs, answer: &Value) -> Result<usize, WidgetError> {
        let count = args
            .get("choices")
            .and_then(Value::as_array)
            .map(Vec::len)
            .unwrap_or_default();
        let index = parse_number("MultipleChoiceInput", answer)?;
        if index.fract() != 0.0 || index < 0.0 || index as usize >= count {
            return Err(WidgetError::InvalidAnswer {
                widget: "MultipleChoiceInput",
                answer: answer.clone(),
                reason: format!("expected a choice index below {count}"),
            });
        }
        Ok(index as usize)
    }
}

impl InteractiveWidget for MultipleChoiceInput {
    fn id(&self) -> &'static str {
        "MultipleChoiceInput"
    }

    fn raw_code(&self, args: &CustomizationArgs, params: &Params) -> Result<String, WidgetError> {
        let choices = Self::choices(args, params)?;
        Ok(interactive_tag(
            "multiple-choice-input",
            &[("choices", json!(choices))],
        ))
    }

    fn normalize_answer(
        &self,
        args: &CustomizationArgs,
        answer: &Value,
    ) -> Result<Value, WidgetError> {
        Ok(json!(Self::choice_index(args, answer)?))
    }

    fn reader_response_html(
        &self,
        args: &CustomizationArgs,
        params: &Params,
        answer: &Value,
    ) -> Result<ReaderResponse, WidgetError> {
        let choices = Self::choices(args, params)?;
        let index = Self::choice_index(args, answer)?;
        Ok(response_paragraph(&choices[index]))
    }
}

#[cfg(test)]
#[path = "tests/interactive_tests.rs"]
mod tests;
