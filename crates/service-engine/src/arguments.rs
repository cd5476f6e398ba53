//! Building the argument list of an invocation, and checking parameter constraints.

use crate::context::Context;
use crate::context::Field;
use crate::response::JsonMap;
use crate::response::JsonValue;
use crate::service::Argument;
use crate::service::MethodInfo;
use crate::service::ParamKind;
use regex::Regex;
use std::fmt;

/// A restriction on the value of a method parameter.
///
/// Lengths count characters of strings and items of lists.
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    MinValue(f64),
    MaxValue(f64),
    MinLength(usize),
    MaxLength(usize),
    Length(usize),
    Pattern(Pattern),
}

/// A regular expression the whole string must match, compiled when the constraint is built.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    /// `None` when `source` does not compile
    regex: Option<Regex>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConstraintViolation {
    #[error("`{param}` must be greater than or equal to {min}")]
    BelowMinimum { param: String, min: f64 },
    #[error("`{param}` must be less than or equal to {max}")]
    AboveMaximum { param: String, max: f64 },
    #[error("length of `{param}` must be greater than or equal to {min}")]
    TooShort { param: String, min: usize },
    #[error("length of `{param}` must be less than or equal to {max}")]
    TooLong { param: String, max: usize },
    #[error("length of `{param}` must be exactly {length}")]
    WrongLength { param: String, length: usize },
    #[error("`{param}` does not match the pattern `{pattern}`")]
    PatternMismatch { param: String, pattern: String },
    #[error("pattern `{pattern}` of `{param}` is not a valid regular expression")]
    InvalidPattern { param: String, pattern: String },
    #[error("constraint {constraint} does not apply to the value of `{param}`")]
    NotApplicable { param: String, constraint: String },
}

/// Lays out the arguments of `method` in declared parameter order.
///
/// Implicit parameters receive the context and the field. An absent argument is
/// left to its default when the parameter is defaultable, and is null otherwise.
pub(crate) fn build_arguments(
    method: &MethodInfo,
    arguments: &JsonMap,
    context: &Context,
    field: &Field,
) -> Vec<Argument> {
    method
        .params
        .iter()
        .map(|param| match param.kind {
            ParamKind::Context => Argument::Context(context.clone()),
            ParamKind::Field => Argument::Field(field.clone()),
            ParamKind::Input => {
                let value = match arguments.get(param.name.as_str()) {
                    Some(value) => Some(value.clone()),
                    None if param.defaultable => None,
                    None => Some(JsonValue::Null),
                };
                Argument::Value {
                    name: param.name.clone(),
                    value,
                }
            }
        })
        .collect()
}

/// Checks every constraint of every input parameter of `method`, reporting all violations.
///
/// Null and absent values are not constrained.
pub(crate) fn validate_constraints(
    method: &MethodInfo,
    arguments: &[Argument],
) -> Result<(), Vec<ConstraintViolation>> {
    let mut violations = Vec::new();
    for (param, argument) in method.params.iter().zip(arguments) {
        let Argument::Value {
            value: Some(value), ..
        } = argument
        else {
            continue;
        };
        if value.is_null() {
            continue;
        }
        for constraint in &param.constraints {
            if let Err(violation) = constraint.check(&param.name, value) {
                violations.push(violation)
            }
        }
    }
    if violations.is_empty() {
        Ok(())
    } else {
        Err(violations)
    }
}

impl Pattern {
    pub fn new(source: impl Into<String>) -> Self {
        let source = source.into();
        let regex = match Regex::new(&format!("^(?:{source})$")) {
            Ok(regex) => Some(regex),
            Err(error) => {
                tracing::warn!(pattern = %source, %error, "invalid pattern constraint");
                None
            }
        };
        Self { source, regex }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_valid(&self) -> bool {
        self.regex.is_some()
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Constraint {
    pub fn pattern(source: impl Into<String>) -> Self {
        Self::Pattern(Pattern::new(source))
    }

    pub fn check(&self, param: &str, value: &JsonValue) -> Result<(), ConstraintViolation> {
        let param = param.to_owned();
        match self {
            Self::MinValue(min) => match value.as_f64() {
                Some(number) if number < *min => Err(ConstraintViolation::BelowMinimum { param, min: *min }),
                Some(_) => Ok(()),
                None => Err(self.not_applicable(param)),
            },
            Self::MaxValue(max) => match value.as_f64() {
                Some(number) if number > *max => Err(ConstraintViolation::AboveMaximum { param, max: *max }),
                Some(_) => Ok(()),
                None => Err(self.not_applicable(param)),
            },
            Self::MinLength(min) => match length_of(value) {
                Some(length) if length < *min => Err(ConstraintViolation::TooShort { param, min: *min }),
                Some(_) => Ok(()),
                None => Err(self.not_applicable(param)),
            },
            Self::MaxLength(max) => match length_of(value) {
                Some(length) if length > *max => Err(ConstraintViolation::TooLong { param, max: *max }),
                Some(_) => Ok(()),
                None => Err(self.not_applicable(param)),
            },
            Self::Length(expected) => match length_of(value) {
                Some(length) if length != *expected => Err(ConstraintViolation::WrongLength {
                    param,
                    length: *expected,
                }),
                Some(_) => Ok(()),
                None => Err(self.not_applicable(param)),
            },
            Self::Pattern(pattern) => {
                let Some(text) = value.as_str() else {
                    return Err(self.not_applicable(param));
                };
                let Some(regex) = &pattern.regex else {
                    return Err(ConstraintViolation::InvalidPattern {
                        param,
                        pattern: pattern.source.clone(),
                    });
                };
                if regex.is_match(text) {
                    Ok(())
                } else {
                    Err(ConstraintViolation::PatternMismatch {
                        param,
                        pattern: pattern.source.clone(),
                    })
                }
            }
        }
    }

    fn not_applicable(&self, param: String) -> ConstraintViolation {
        ConstraintViolation::NotApplicable {
            param,
            constraint: self.to_string(),
        }
    }
}

fn length_of(value: &JsonValue) -> Option<usize> {
    match value {
        JsonValue::String(text) => Some(text.as_str().chars().count()),
        JsonValue::Array(items) => Some(items.len()),
        _ => None,
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MinValue(min) => write!(f, "min_value({min})"),
            Self::MaxValue(max) => write!(f, "max_value({max})"),
            Self::MinLength(min) => write!(f, "min_length({min})"),
            Self::MaxLength(max) => write!(f, "max_length({max})"),
            Self::Length(length) => write!(f, "length({length})"),
            Self::Pattern(pattern) => write!(f, "pattern({:?})", pattern.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::FieldSelection;
    use crate::service::ParamInfo;
    use pretty_assertions::assert_eq;
    use service_schema::name;
    use service_schema::schema::TypeRef;

    fn field() -> Field {
        Field::new(
            &FieldSelection::new(name!("search")),
            TypeRef::named(name!("String")),
            Vec::new(),
        )
    }

    fn search() -> MethodInfo {
        MethodInfo::get(["search"])
            .param(ParamInfo::context())
            .param(
                ParamInfo::input("term")
                    .constraint(Constraint::MinLength(2))
                    .constraint(Constraint::pattern("[a-z]+")),
            )
            .param(ParamInfo::input("limit").defaultable().constraint(Constraint::MaxValue(50.0)))
            .param(ParamInfo::input("tag"))
            .param(ParamInfo::field())
    }

    fn arguments(json: serde_json::Value) -> JsonMap {
        match JsonValue::from(json) {
            JsonValue::Object(map) => map,
            _ => JsonMap::new(),
        }
    }

    #[test]
    fn arguments_follow_parameter_order() {
        let method = search();
        let args = build_arguments(
            &method,
            &arguments(serde_json::json!({"tag": "new", "term": "rust"})),
            &Context::new(),
            &field(),
        );
        assert_eq!(args.len(), 5);
        assert!(matches!(args[0], Argument::Context(_)));
        assert!(matches!(&args[1], Argument::Value { name, value: Some(v) } if name == "term" && v.as_str() == Some("rust")));
        assert!(matches!(&args[2], Argument::Value { name, value: None } if name == "limit"));
        assert!(matches!(&args[3], Argument::Value { value: Some(v), .. } if v.as_str() == Some("new")));
        assert!(matches!(args[4], Argument::Field(_)));
    }

    #[test]
    fn missing_required_argument_is_null() {
        let method = search();
        let args = build_arguments(&method, &JsonMap::new(), &Context::new(), &field());
        assert!(matches!(&args[3], Argument::Value { value: Some(JsonValue::Null), .. }));
        assert_eq!(validate_constraints(&method, &args), Ok(()));
    }

    #[test]
    fn every_violation_is_reported() {
        let method = search();
        let args = build_arguments(
            &method,
            &arguments(serde_json::json!({"term": "R", "limit": 100})),
            &Context::new(),
            &field(),
        );
        let violations = validate_constraints(&method, &args).unwrap_err();
        let messages: Vec<String> = violations.iter().map(ToString::to_string).collect();
        assert_eq!(
            messages,
            [
                "length of `term` must be greater than or equal to 2",
                "`term` does not match the pattern `[a-z]+`",
                "`limit` must be less than or equal to 50",
            ]
        );
    }

    #[test]
    fn constraints_on_lists_and_mismatched_values() {
        let items = JsonValue::from(vec![JsonValue::from(1), JsonValue::from(2)]);
        assert_eq!(Constraint::Length(2).check("ids", &items), Ok(()));
        assert!(matches!(
            Constraint::MaxLength(1).check("ids", &items),
            Err(ConstraintViolation::TooLong { max: 1, .. })
        ));
        assert!(matches!(
            Constraint::MinValue(1.0).check("ids", &items),
            Err(ConstraintViolation::NotApplicable { .. })
        ));
        assert!(matches!(
            Constraint::pattern("(").check("name", &JsonValue::from("x")),
            Err(ConstraintViolation::InvalidPattern { .. })
        ));
    }

    #[test]
    fn patterns_are_compiled_when_built() {
        let Constraint::Pattern(pattern) = Constraint::pattern("[a-z]+") else {
            unreachable!()
        };
        assert!(pattern.is_valid());
        assert_eq!(pattern.as_str(), "[a-z]+");
        assert!(!Pattern::new("(").is_valid());
        // Matches the whole string
        let constraint = Constraint::Pattern(pattern);
        assert_eq!(constraint.check("term", &JsonValue::from("rust")), Ok(()));
        assert!(constraint.check("term", &JsonValue::from("rust 2021")).is_err());
        assert_eq!(constraint.to_string(), "pattern(\"[a-z]+\")");
    }
}
