//! Expression rendering for update and query requests.
//!
//! Attribute names always go through `#` placeholders so that reserved
//! words never reach the expression text.

use std::collections::HashMap;

use aws_sdk_dynamodb::types::AttributeValue;

use crate::store::{SortCondition, UpdateAction};

/// A rendered expression plus its placeholder maps.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Expression {
    pub text: String,
    pub names: Option<HashMap<String, String>>,
    pub values: Option<HashMap<String, AttributeValue>>,
}

#[derive(Default)]
struct Placeholders {
    names: HashMap<String, String>,
    values: HashMap<String, AttributeValue>,
}

impl Placeholders {
    fn name(&mut self, placeholder: String, attribute: &str) -> String {
        self.names.insert(placeholder.clone(), attribute.to_string());
        placeholder
    }

    fn value(&mut self, placeholder: String, value: AttributeValue) -> String {
        self.values.insert(placeholder.clone(), value);
        placeholder
    }

    fn finish(self, text: String) -> Expression {
        Expression {
            text,
            names: (!self.names.is_empty()).then_some(self.names),
            values: (!self.values.is_empty()).then_some(self.values),
        }
    }
}

/// Renders `SET ... REMOVE ...` for the given actions.
///
/// Returns `None` when there is nothing to update.
pub fn update_expression(actions: &[(String, UpdateAction)]) -> Option<Expression> {
    if actions.is_empty() {
        return None;
    }

    let mut placeholders = Placeholders::default();
    let mut set = Vec::new();
    let mut remove = Vec::new();

    for (i, (attribute, action)) in actions.iter().enumerate() {
        let name = placeholders.name(format!("#a{i}"), attribute);
        match action {
            UpdateAction::Set(value) => {
                let value = placeholders.value(format!(":v{i}"), value.clone());
                set.push(format!("{name} = {value}"));
            }
            UpdateAction::SetIfNotExists(value) => {
                let value = placeholders.value(format!(":v{i}"), value.clone());
                set.push(format!("{name} = if_not_exists({name}, {value})"));
            }
            UpdateAction::Increment { start, delta } => {
                // First write lands on `start`: (start - delta) + delta.
                let base = i128::from(*start) - i128::from(*delta);
                let base = placeholders.value(format!(":s{i}"), AttributeValue::N(base.to_string()));
                let delta = placeholders.value(format!(":d{i}"), AttributeValue::N(delta.to_string()));
                set.push(format!("{name} = if_not_exists({name}, {base}) + {delta}"));
            }
            UpdateAction::Remove => remove.push(name),
        }
    }

    let mut clauses = Vec::new();
    if !set.is_empty() {
        clauses.push(format!("SET {}", set.join(", ")));
    }
    if !remove.is_empty() {
        clauses.push(format!("REMOVE {}", remove.join(", ")));
    }
    Some(placeholders.finish(clauses.join(" ")))
}

/// Renders the key condition of a query.
pub fn key_condition(
    partition: &(String, AttributeValue),
    sort: Option<&(String, SortCondition)>,
) -> Expression {
    let mut placeholders = Placeholders::default();
    let pk = placeholders.name("#pk".to_string(), &partition.0);
    let pk_value = placeholders.value(":pk".to_string(), partition.1.clone());
    let mut text = format!("{pk} = {pk_value}");

    if let Some((attribute, condition)) = sort {
        let sk = placeholders.name("#sk".to_string(), attribute);
        let clause = match condition {
            SortCondition::Equal(value) => {
                format!("{sk} = {}", placeholders.value(":sk".to_string(), value.clone()))
            }
            SortCondition::BeginsWith(value) => format!(
                "begins_with({sk}, {})",
                placeholders.value(":sk".to_string(), value.clone())
            ),
            SortCondition::LessThan(value) => {
                format!("{sk} < {}", placeholders.value(":sk".to_string(), value.clone()))
            }
            SortCondition::GreaterThan(value) => {
                format!("{sk} > {}", placeholders.value(":sk".to_string(), value.clone()))
            }
        };
        text.push_str(" AND ");
        text.push_str(&clause);
    }

    placeholders.finish(text)
}
