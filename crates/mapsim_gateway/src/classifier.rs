//! Classification of render failures into gateway-style diagnostics.

use mapsim_vtl::EngineError;
use serde::{Deserialize, Serialize};

use crate::bindings::Mode;
use crate::renderer::RenderError;

/// Closed set of failure categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiagnosticKind {
    SyntaxError,
    ReferenceError,
    MethodError,
    ResourceError,
    UnknownError,
}

/// Structured description of a failed render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub message: String,
    #[serde(rename = "type")]
    pub kind: DiagnosticKind,
    pub template_type: Mode,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub line_number: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub column_number: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub context: Option<String>,
}

const UNDEFINED_REFERENCE: &str = "reference is not defined";

/// Text from the first `$` up to the next space.
fn variable_token(text: &str) -> Option<String> {
    let start = text.find('$')?;
    let rest = &text[start..];
    let end = rest.find(' ').unwrap_or(rest.len());
    Some(rest[..end].trim().to_string())
}

/// Text from the first `$` up to the next `(`.
fn method_token(text: &str) -> Option<String> {
    let start = text.find('$')?;
    let rest = &text[start..];
    let end = rest.find('(').unwrap_or(rest.len());
    Some(rest[..end].trim().to_string())
}

/// Map a render failure to its diagnostic.
pub fn classify(error: &RenderError, mode: Mode) -> Diagnostic {
    let engine = error.engine();
    let raw = engine.to_string();
    let role = mode.as_str();

    let diagnostic = |kind, message: String| Diagnostic {
        message,
        kind,
        template_type: mode,
        line_number: None,
        column_number: None,
        context: None,
    };

    match engine {
        EngineError::Parse { line, column, .. } => Diagnostic {
            line_number: Some(*line),
            column_number: Some(*column),
            ..diagnostic(
                DiagnosticKind::SyntaxError,
                format!("VTL syntax error in {} template: {}", role, raw),
            )
        },
        EngineError::Invocation { line, cause, .. } => {
            let cause_text = cause.as_ref().map(|c| c.to_string());
            let undefined = raw.contains(UNDEFINED_REFERENCE)
                || cause_text.as_deref().map_or(false, |c| c.contains(UNDEFINED_REFERENCE));

            if undefined {
                let message = format!("Reference error in {} template: {}", role, raw);
                Diagnostic {
                    line_number: Some(*line),
                    context: variable_token(&message).map(|v| format!("Variable: {}", v)),
                    ..diagnostic(DiagnosticKind::ReferenceError, message)
                }
            } else {
                let mut message = format!("Error in method invocation in {} template: {}", role, raw);
                if let Some(cause) = &cause_text {
                    message.push_str(" - ");
                    message.push_str(cause);
                }
                Diagnostic {
                    line_number: Some(*line),
                    context: cause_text
                        .as_deref()
                        .and_then(method_token)
                        .map(|m| format!("Method: {}", m)),
                    ..diagnostic(DiagnosticKind::MethodError, message)
                }
            }
        }
        EngineError::ResourceNotFound { .. } => {
            let message = format!("Resource not found in {} template: {}", role, raw);
            Diagnostic {
                context: variable_token(&message).map(|v| format!("Variable: {}", v)),
                ..diagnostic(DiagnosticKind::ResourceError, message)
            }
        }
        EngineError::Runtime { .. } => diagnostic(DiagnosticKind::UnknownError, raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mapsim_vtl::InvocationCause;

    fn render_error(source: EngineError) -> RenderError {
        RenderError::new("requestTemplate", source)
    }

    #[test]
    fn test_syntax_error() {
        let err = render_error(EngineError::Parse {
            template: "requestTemplate".into(),
            message: "Encountered \"<EOF>\"".into(),
            line: 3,
            column: 7,
        });
        let d = classify(&err, Mode::Request);
        assert_eq!(d.kind, DiagnosticKind::SyntaxError);
        assert!(d.message.starts_with("VTL syntax error in request template: Encountered"));
        assert_eq!((d.line_number, d.column_number), (Some(3), Some(7)));
        assert_eq!(d.context, None);
    }

    #[test]
    fn test_reference_error() {
        let err = render_error(EngineError::Invocation {
            template: "requestTemplate".into(),
            message: "Variable $undefinedVar reference is not defined".into(),
            reference: "$undefinedVar".into(),
            line: 1,
            column: 1,
            cause: None,
        });
        let d = classify(&err, Mode::Request);
        assert_eq!(d.kind, DiagnosticKind::ReferenceError);
        assert_eq!(d.context.as_deref(), Some("Variable: $undefinedVar"));
        assert_eq!(d.line_number, Some(1));
        assert_eq!(d.column_number, None);
    }

    #[test]
    fn test_method_error() {
        let err = render_error(EngineError::Invocation {
            template: "responseTemplate".into(),
            message: "Invocation of method 'substring' on String threw exception".into(),
            reference: "$name.substring(9)".into(),
            line: 2,
            column: 4,
            cause: Some(InvocationCause("$name.substring(): begin 9, end 3, length 3".into())),
        });
        let d = classify(&err, Mode::Response);
        assert_eq!(d.kind, DiagnosticKind::MethodError);
        assert!(d.message.starts_with("Error in method invocation in response template: "));
        assert!(d.message.ends_with(" - $name.substring(): begin 9, end 3, length 3"));
        assert_eq!(d.context.as_deref(), Some("Method: $name.substring"));
    }

    #[test]
    fn test_resource_and_unknown() {
        let err = render_error(EngineError::ResourceNotFound {
            template: "requestTemplate".into(),
            message: "Unable to find resource 'common' referenced by $name".into(),
            name: "common".into(),
            line: 1,
            column: 1,
        });
        let d = classify(&err, Mode::Request);
        assert_eq!(d.kind, DiagnosticKind::ResourceError);
        assert_eq!(d.context.as_deref(), Some("Variable: $name"));

        let err = render_error(EngineError::Runtime {
            template: "requestTemplate".into(),
            message: "Max recursion depth reached (10) for #parse".into(),
            line: 1,
            column: 1,
        });
        let d = classify(&err, Mode::Request);
        assert_eq!(d.kind, DiagnosticKind::UnknownError);
        assert_eq!(d.line_number, None);
    }

    #[test]
    fn test_serialized_shape() {
        let d = Diagnostic {
            message: "m".into(),
            kind: DiagnosticKind::ReferenceError,
            template_type: Mode::Request,
            line_number: Some(1),
            column_number: None,
            context: Some("Variable: $x".into()),
        };
        assert_eq!(
            serde_json::to_string(&d).unwrap(),
            r#"{"message":"m","type":"REFERENCE_ERROR","templateType":"request","lineNumber":1,"context":"Variable: $x"}"#
        );
    }
}
