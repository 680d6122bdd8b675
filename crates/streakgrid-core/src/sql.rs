use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

const TABLE_PATTERNS: [&str; 6] = [
    r"(?i)\bFROM\s+`?([A-Za-z0-9_]+)`?",
    r"(?i)\bJOIN\s+`?([A-Za-z0-9_]+)`?",
    r"(?i)\bINTO\s+`?([A-Za-z0-9_]+)`?",
    r"(?i)\bUPDATE\s+`?([A-Za-z0-9_]+)`?",
    r"(?i)\bTABLE\s+`?([A-Za-z0-9_]+)`?",
    // "таблица" and its case forms; names are ASCII identifiers
    r"(?i)\bтаблиц[аеоуыэюя][йиюмей]*\s+`?([A-Za-z0-9_]+)`?",
];

fn table_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        TABLE_PATTERNS
            .iter()
            .filter_map(|pattern| match Regex::new(pattern) {
                Ok(re) => Some(re),
                Err(err) => {
                    tracing::error!(pattern, error = %err, "failed compiling table pattern");
                    None
                }
            })
            .collect()
    })
}

/// Table names mentioned in a query or in lesson prose, lower-cased and
/// de-duplicated. Names are grouped by the keyword that introduced them, in
/// keyword order, then by position.
pub fn extract_table_names(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut names = Vec::new();

    for re in table_patterns() {
        for caps in re.captures_iter(text) {
            let Some(name) = caps.get(1).map(|m| m.as_str().to_lowercase()) else {
                continue;
            };
            if !name.is_empty() && seen.insert(name.clone()) {
                names.push(name);
            }
        }
    }

    names
}

/// Collapses whitespace runs to single spaces.
pub fn format_sql(sql: &str) -> String {
    sql.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_tables_behind_keywords() {
        let sql = "SELECT u.name FROM users u JOIN `orders` o ON o.user_id = u.id \
                   WHERE o.total > 10";
        assert_eq!(extract_table_names(sql), vec!["users", "orders"]);
    }

    #[test]
    fn deduplicates_case_insensitively() {
        let sql = "insert into Employees values (1); update employees set x = 1; \
                   create table departments (id int)";
        assert_eq!(extract_table_names(sql), vec!["employees", "departments"]);
    }

    #[test]
    fn reads_russian_prose() {
        let theory = "В таблице customers хранятся клиенты, а таблица orders содержит заказы.";
        let names = extract_table_names(theory);
        assert!(names.contains(&"customers".to_string()));
        assert!(names.contains(&"orders".to_string()));
    }

    #[test]
    fn russian_words_after_table_are_not_names() {
        assert!(extract_table_names("Таблица содержит строки. В таблице есть данные.").is_empty());
        assert_eq!(
            extract_table_names("Выберите строки из таблицы orders, затем FROM строк"),
            vec!["orders"]
        );
    }

    #[test]
    fn ignores_keyword_fragments() {
        assert!(extract_table_names("the platform fromage").is_empty());
    }

    #[test]
    fn collapses_whitespace() {
        assert_eq!(format_sql("  SELECT *\n\tFROM   users \n"), "SELECT * FROM users");
    }
}
