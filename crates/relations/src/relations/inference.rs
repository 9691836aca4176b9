//! Foreign key naming conventions used when relation metadata leaves keys unset

use serde::{Deserialize, Serialize};

/// Foreign key naming conventions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForeignKeyConvention {
    /// modelId (e.g., customerId)
    #[default]
    CamelCase,
    /// model_id (e.g., customer_id)
    Underscore,
    /// ModelID (e.g., CustomerID)
    PascalCase,
}

impl ForeignKeyConvention {
    /// Infer the foreign key name pointing at `model_name`
    pub fn foreign_key_for(self, model_name: &str) -> String {
        let words = split_words(model_name);
        match self {
            ForeignKeyConvention::CamelCase => {
                let mut key = to_camel_case(&words);
                key.push_str(if key.is_empty() { "id" } else { "Id" });
                key
            }
            ForeignKeyConvention::Underscore => {
                let mut parts: Vec<String> = words.iter().map(|w| w.to_lowercase()).collect();
                parts.push("id".to_string());
                parts.join("_")
            }
            ForeignKeyConvention::PascalCase => {
                let mut key: String = words.iter().map(|w| capitalize(w)).collect();
                key.push_str("ID");
                key
            }
        }
    }

    /// Parse a convention name as accepted in configuration
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "camel_case" | "camelcase" | "camel" => Some(ForeignKeyConvention::CamelCase),
            "underscore" | "snake_case" | "snake" => Some(ForeignKeyConvention::Underscore),
            "pascal_case" | "pascalcase" | "pascal" => Some(ForeignKeyConvention::PascalCase),
            _ => None,
        }
    }
}

/// Convert an identifier such as `OrderItem` or `order_item` to `orderItem`
pub fn camel_case(value: &str) -> String {
    to_camel_case(&split_words(value))
}

fn to_camel_case(words: &[String]) -> String {
    let mut result = String::new();
    for (i, word) in words.iter().enumerate() {
        if i == 0 {
            result.push_str(&word.to_lowercase());
        } else {
            result.push_str(&capitalize(word));
        }
    }
    result
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(|c| c.to_lowercase()))
            .collect(),
        None => String::new(),
    }
}

/// Split an identifier into words on separators, lower-to-upper transitions
/// and the end of an acronym (`HTTPServer` -> `HTTP`, `Server`).
fn split_words(value: &str) -> Vec<String> {
    let chars: Vec<char> = value.chars().collect();
    let mut words = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if !c.is_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }

        if c.is_uppercase() && !current.is_empty() {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if prev.is_lowercase() || prev.is_numeric() || (prev.is_uppercase() && next_is_lower) {
                words.push(std::mem::take(&mut current));
            }
        }
        current.push(c);
    }

    if !current.is_empty() {
        words.push(current);
    }
    words
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camel_case_foreign_keys() {
        let convention = ForeignKeyConvention::CamelCase;
        assert_eq!(convention.foreign_key_for("Customer"), "customerId");
        assert_eq!(convention.foreign_key_for("CategoryProductLink"), "categoryProductLinkId");
        assert_eq!(convention.foreign_key_for("order_item"), "orderItemId");
        assert_eq!(convention.foreign_key_for("HTTPServer"), "httpServerId");
    }

    #[test]
    fn test_underscore_and_pascal_foreign_keys() {
        assert_eq!(
            ForeignKeyConvention::Underscore.foreign_key_for("OrderItem"),
            "order_item_id"
        );
        assert_eq!(
            ForeignKeyConvention::PascalCase.foreign_key_for("orderItem"),
            "OrderItemID"
        );
    }

    #[test]
    fn test_camel_case_helper() {
        assert_eq!(camel_case("Customer_id"), "customerId");
        assert_eq!(camel_case("already camel"), "alreadyCamel");
        assert_eq!(camel_case(""), "");
    }

    #[test]
    fn test_parse_convention() {
        assert_eq!(ForeignKeyConvention::parse("underscore"), Some(ForeignKeyConvention::Underscore));
        assert_eq!(ForeignKeyConvention::parse("CamelCase"), Some(ForeignKeyConvention::CamelCase));
        assert_eq!(ForeignKeyConvention::parse("kebab"), None);
    }
}
