//! Identifier case conversion used when schema names become code names.
//!
//! | Input | snake | kebab | Pascal | camel |
//! |-------|-------|-------|--------|-------|
//! | "firstName" | first_name | first-name | FirstName | firstName |
//! | "HTTPRequest" | http_request | http-request | HttpRequest | httpRequest |

/// Convert a string to snake_case.
pub fn to_snake_case(s: &str) -> String {
    split_words(s).join("_")
}

/// Convert a string to kebab-case.
pub fn to_kebab_case(s: &str) -> String {
    split_words(s).join("-")
}

/// Convert a string to PascalCase.
///
/// Used for entity and property names: `customer_order` -> `CustomerOrder`.
pub fn to_pascal_case(s: &str) -> String {
    split_words(s).iter().map(|w| capitalize(w)).collect()
}

/// Convert a string to camelCase.
pub fn to_camel_case(s: &str) -> String {
    let mut words = split_words(s).into_iter();
    let Some(first) = words.next() else {
        return String::new();
    };
    words.fold(first, |mut acc, w| {
        acc.push_str(&capitalize(&w));
        acc
    })
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => {
            let mut out = String::with_capacity(word.len());
            // to_uppercase handles Unicode correctly (e.g., "ß" -> "SS")
            out.extend(first.to_uppercase());
            out.push_str(chars.as_str());
            out
        }
        None => String::new(),
    }
}

/// Split a string into lowercase words based on casing and separators.
///
/// ## Word Boundary Detection
///
/// 1. **Explicit separators:** `_`, `-`, `.`, whitespace
/// 2. **Case transition (camelCase):** `aB` splits between `a` and `B`
/// 3. **Acronym boundary:** `HTTPRequest` splits between `P` and `R`
fn split_words(input: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '_' || c == '-' || c == '.' || c.is_whitespace() {
            if !current.is_empty() {
                words.push(current.to_lowercase());
                current.clear();
            }
            continue;
        }

        if let Some(&next) = chars.peek() {
            if c.is_lowercase() && next.is_uppercase() {
                current.push(c);
                words.push(current.to_lowercase());
                current.clear();
                continue;
            }

            if c.is_uppercase()
                && next.is_uppercase()
                && chars.clone().nth(1).is_some_and(|n| n.is_lowercase())
            {
                current.push(c);
                words.push(current.to_lowercase());
                current.clear();
                continue;
            }
        }

        current.push(c);
    }

    if !current.is_empty() {
        words.push(current.to_lowercase());
    }

    words
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pascal_case_from_schema_names() {
        assert_eq!(to_pascal_case("firstName"), "FirstName");
        assert_eq!(to_pascal_case("id"), "Id");
        assert_eq!(to_pascal_case("customer_order"), "CustomerOrder");
        assert_eq!(to_pascal_case("HTTPRequest"), "HttpRequest");
    }

    #[test]
    fn camel_case_keeps_first_word_lower() {
        assert_eq!(to_camel_case("FirstName"), "firstName");
        assert_eq!(to_camel_case("order-line item"), "orderLineItem");
        assert_eq!(to_camel_case(""), "");
    }

    #[test]
    fn snake_and_kebab_split_on_acronyms() {
        assert_eq!(to_snake_case("XMLHttpRequest"), "xml_http_request");
        assert_eq!(to_kebab_case("EntityClass"), "entity-class");
        assert_eq!(to_snake_case("  spaced  out "), "spaced_out");
    }
}
