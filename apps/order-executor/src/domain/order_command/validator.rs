//! Command schema validation.
//!
//! Turns raw message bytes into a typed [`Command`]. Each operation has its
//! own declarative rule-set; every violated rule is reported, not just the
//! first one. Properties not named by a rule-set are ignored.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde_json::{Map, Number, Value};
use thiserror::Error;

use super::command::{CancelOrderCommand, Command, CreateOrderCommand, Operation};
use super::value_objects::{OrderSide, OrderType};
use crate::domain::shared::symbol::symbol_regex;
use crate::domain::shared::{Symbol, VenueOrderId};

// ============================================================================
// Errors
// ============================================================================

/// A single violated schema rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// JSON pointer of the offending field (e.g. `/amount`).
    pub path: String,
    /// The rule that failed.
    pub rule: Rule,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.path, self.rule)
    }
}

/// Schema rules a field can violate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rule {
    /// Field is missing (or null where null is not allowed).
    Required,
    /// Field has the wrong JSON type.
    Type {
        /// Expected JSON type.
        expected: &'static str,
    },
    /// String value outside the allowed set.
    OneOf {
        /// Allowed values.
        allowed: &'static [&'static str],
    },
    /// String is empty.
    NonEmpty,
    /// String does not match the instrument pattern.
    SymbolPattern,
    /// Number must be strictly greater than zero.
    Positive,
    /// Number cannot be represented exactly as a decimal.
    Precision,
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Required => f.write_str("is required"),
            Self::Type { expected } => write!(f, "must be {expected}"),
            Self::OneOf { allowed } => write!(f, "must be one of {}", allowed.join(", ")),
            Self::NonEmpty => f.write_str("must not be empty"),
            Self::SymbolPattern => f.write_str("must be an instrument symbol"),
            Self::Positive => f.write_str("must be greater than 0"),
            Self::Precision => f.write_str("is not representable as a decimal"),
        }
    }
}

/// Why a message was rejected before dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Bytes are not a JSON object.
    #[error("malformed payload: {reason}")]
    MalformedPayload {
        /// Parser error or shape description.
        reason: String,
    },

    /// The `operation` tag is missing or not recognised.
    #[error("unknown operation: {}", found.as_deref().unwrap_or("<missing>"))]
    UnknownOperation {
        /// Tag value as received, if there was one.
        found: Option<String>,
    },

    /// The payload breaks one or more rules of its operation's schema.
    #[error("schema violation: {}", join_violations(violations))]
    SchemaViolation {
        /// Every rule that failed.
        violations: Vec<Violation>,
    },
}

impl ValidationError {
    /// Short kind name for logs and metric labels.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::MalformedPayload { .. } => "malformed_payload",
            Self::UnknownOperation { .. } => "unknown_operation",
            Self::SchemaViolation { .. } => "schema_violation",
        }
    }
}

fn join_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

// ============================================================================
// Declarative rule-sets
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Presence {
    Required,
    /// May be absent or null.
    Optional,
}

#[derive(Debug, Clone, Copy)]
enum FieldKind {
    NonEmptyString,
    Symbol,
    OneOf(&'static [&'static str]),
    PositiveNumber,
}

#[derive(Debug, Clone, Copy)]
struct FieldRule {
    name: &'static str,
    presence: Presence,
    kind: FieldKind,
}

/// `field` must be non-null when the message's `orderType` satisfies `applies`.
#[derive(Debug, Clone, Copy)]
struct RequiredWhen {
    field: &'static str,
    applies: fn(&OrderType) -> bool,
}

#[derive(Debug, Clone)]
struct RuleSet {
    fields: Vec<FieldRule>,
    conditions: Vec<RequiredWhen>,
}

const SIDES: &[&str] = &["buy", "sell"];

impl RuleSet {
    fn create() -> Self {
        Self {
            fields: vec![
                FieldRule {
                    name: "symbol",
                    presence: Presence::Required,
                    kind: FieldKind::Symbol,
                },
                FieldRule {
                    name: "orderType",
                    presence: Presence::Required,
                    kind: FieldKind::OneOf(&OrderType::WIRE_NAMES),
                },
                FieldRule {
                    name: "side",
                    presence: Presence::Required,
                    kind: FieldKind::OneOf(SIDES),
                },
                FieldRule {
                    name: "amount",
                    presence: Presence::Required,
                    kind: FieldKind::PositiveNumber,
                },
                FieldRule {
                    name: "price",
                    presence: Presence::Optional,
                    kind: FieldKind::PositiveNumber,
                },
                FieldRule {
                    name: "stopPrice",
                    presence: Presence::Optional,
                    kind: FieldKind::PositiveNumber,
                },
            ],
            conditions: vec![
                RequiredWhen {
                    field: "price",
                    applies: OrderType::requires_price,
                },
                RequiredWhen {
                    field: "stopPrice",
                    applies: OrderType::requires_stop_price,
                },
            ],
        }
    }

    fn cancel() -> Self {
        Self {
            fields: vec![
                FieldRule {
                    name: "id",
                    presence: Presence::Required,
                    kind: FieldKind::NonEmptyString,
                },
                FieldRule {
                    name: "symbol",
                    presence: Presence::Optional,
                    kind: FieldKind::Symbol,
                },
            ],
            conditions: Vec::new(),
        }
    }

    /// Check every rule, returning the accepted values or all violations.
    fn check(&self, object: &Map<String, Value>) -> Result<Fields, Vec<Violation>> {
        let mut fields = Fields::default();
        let mut violations = Vec::new();

        for rule in &self.fields {
            match object.get(rule.name) {
                None | Some(Value::Null) => {
                    if rule.presence == Presence::Required {
                        violations.push(violation(rule.name, Rule::Required));
                    }
                }
                Some(value) => match check_kind(rule.kind, value) {
                    Ok(accepted) => {
                        fields.values.insert(rule.name, accepted);
                    }
                    Err(failed) => violations.push(violation(rule.name, failed)),
                },
            }
        }

        for condition in &self.conditions {
            let applies = object
                .get("orderType")
                .and_then(Value::as_str)
                .and_then(OrderType::from_wire)
                .is_some_and(|order_type| (condition.applies)(&order_type));
            let present = !matches!(object.get(condition.field), None | Some(Value::Null));
            if applies && !present {
                violations.push(violation(condition.field, Rule::Required));
            }
        }

        if violations.is_empty() {
            Ok(fields)
        } else {
            Err(violations)
        }
    }
}

fn violation(field: &str, rule: Rule) -> Violation {
    Violation {
        path: format!("/{field}"),
        rule,
    }
}

fn check_kind(kind: FieldKind, value: &Value) -> Result<Accepted, Rule> {
    match kind {
        FieldKind::NonEmptyString => {
            let text = value.as_str().ok_or(Rule::Type { expected: "string" })?;
            if text.is_empty() {
                return Err(Rule::NonEmpty);
            }
            Ok(Accepted::Text(text.to_string()))
        }
        FieldKind::Symbol => {
            let text = value.as_str().ok_or(Rule::Type { expected: "string" })?;
            if text.is_empty() {
                return Err(Rule::NonEmpty);
            }
            if !symbol_regex().is_match(text) {
                return Err(Rule::SymbolPattern);
            }
            Ok(Accepted::Text(text.to_string()))
        }
        FieldKind::OneOf(allowed) => {
            let text = value.as_str().ok_or(Rule::Type { expected: "string" })?;
            if !allowed.contains(&text) {
                return Err(Rule::OneOf { allowed });
            }
            Ok(Accepted::Text(text.to_string()))
        }
        FieldKind::PositiveNumber => {
            let Value::Number(number) = value else {
                return Err(Rule::Type { expected: "number" });
            };
            let decimal = to_decimal(number).ok_or(Rule::Precision)?;
            if decimal <= Decimal::ZERO {
                return Err(Rule::Positive);
            }
            Ok(Accepted::Number(decimal))
        }
    }
}

/// Convert a JSON number to an exact decimal.
///
/// Integers convert directly; other numbers go through their shortest
/// textual form so `0.1` becomes exactly `0.1`.
fn to_decimal(number: &Number) -> Option<Decimal> {
    if let Some(i) = number.as_i64() {
        return Some(Decimal::from(i));
    }
    if let Some(u) = number.as_u64() {
        return Some(Decimal::from(u));
    }
    let text = number.to_string();
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
        .map(|d| d.normalize())
}

#[derive(Debug, Clone)]
enum Accepted {
    Text(String),
    Number(Decimal),
}

/// Values that passed their rules, keyed by field name.
#[derive(Debug, Default)]
struct Fields {
    values: HashMap<&'static str, Accepted>,
}

impl Fields {
    fn text(&self, name: &'static str) -> Option<&str> {
        match self.values.get(name) {
            Some(Accepted::Text(text)) => Some(text),
            _ => None,
        }
    }

    fn number(&self, name: &'static str) -> Option<Decimal> {
        match self.values.get(name) {
            Some(Accepted::Number(n)) => Some(*n),
            _ => None,
        }
    }

    fn required_text(&self, name: &'static str) -> Result<&str, ValidationError> {
        self.text(name).ok_or_else(|| missing(name))
    }

    fn required_number(&self, name: &'static str) -> Result<Decimal, ValidationError> {
        self.number(name).ok_or_else(|| missing(name))
    }
}

fn missing(name: &str) -> ValidationError {
    ValidationError::SchemaViolation {
        violations: vec![violation(name, Rule::Required)],
    }
}

// ============================================================================
// Validator
// ============================================================================

/// Validates raw messages into commands.
///
/// Build once at startup and share read-only; validation is pure and
/// deterministic.
#[derive(Debug, Clone)]
pub struct CommandValidator {
    create: RuleSet,
    cancel: RuleSet,
}

impl Default for CommandValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandValidator {
    /// Build the rule-sets for every supported operation.
    #[must_use]
    pub fn new() -> Self {
        // Compile the instrument pattern up front rather than on the first message.
        let _ = symbol_regex();
        Self {
            create: RuleSet::create(),
            cancel: RuleSet::cancel(),
        }
    }

    /// Validate a raw message.
    pub fn validate(&self, raw: &[u8]) -> Result<Command, ValidationError> {
        let document: Value =
            serde_json::from_slice(raw).map_err(|e| ValidationError::MalformedPayload {
                reason: e.to_string(),
            })?;

        let object = match document {
            Value::Object(object) => object,
            other => {
                return Err(ValidationError::MalformedPayload {
                    reason: format!("expected a JSON object, got {}", json_type(&other)),
                });
            }
        };

        let operation = match object.get("operation") {
            None => return Err(ValidationError::UnknownOperation { found: None }),
            Some(Value::String(tag)) => Operation::from_wire(tag).ok_or_else(|| {
                ValidationError::UnknownOperation {
                    found: Some(tag.clone()),
                }
            })?,
            Some(other) => {
                return Err(ValidationError::UnknownOperation {
                    found: Some(other.to_string()),
                });
            }
        };

        match operation {
            Operation::Create => {
                let fields = self
                    .create
                    .check(&object)
                    .map_err(|violations| ValidationError::SchemaViolation { violations })?;
                build_create(&fields).map(Command::Create)
            }
            Operation::Cancel => {
                let fields = self
                    .cancel
                    .check(&object)
                    .map_err(|violations| ValidationError::SchemaViolation { violations })?;
                build_cancel(&fields).map(Command::Cancel)
            }
        }
    }
}

fn build_create(fields: &Fields) -> Result<CreateOrderCommand, ValidationError> {
    let order_type = OrderType::from_wire(fields.required_text("orderType")?)
        .ok_or_else(|| missing("orderType"))?;
    let side = OrderSide::from_wire(fields.required_text("side")?).ok_or_else(|| missing("side"))?;

    Ok(CreateOrderCommand {
        symbol: Symbol::new_unchecked(fields.required_text("symbol")?),
        order_type,
        side,
        amount: fields.required_number("amount")?,
        price: fields.number("price"),
        stop_price: fields.number("stopPrice"),
    })
}

fn build_cancel(fields: &Fields) -> Result<CancelOrderCommand, ValidationError> {
    Ok(CancelOrderCommand {
        id: VenueOrderId::new(fields.required_text("id")?),
        symbol: fields.text("symbol").map(Symbol::new_unchecked),
    })
}

const fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
