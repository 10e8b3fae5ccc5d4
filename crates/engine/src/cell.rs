use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::data_source::{ListId, LoadState};

/// Raw cell content as typed by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    pub content: String,
}

impl Cell {
    pub fn new(content: impl Into<String>) -> Self {
        Self { content: content.into() }
    }

    pub fn is_formula(&self) -> bool {
        self.content.starts_with('=')
    }

    /// The list this cell reads from, if it is a `LIST(...)` lookup.
    pub fn list_reference(&self) -> Option<ListReference> {
        parse_list_reference(&self.content).and_then(Result::ok)
    }
}

/// Evaluated value of a cell.
///
/// Only plain values and data-bound `LIST(...)` lookups are evaluated;
/// any other formula is reported as `Unevaluated` with its source text.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Text(String),
    Number(f64),
    /// The list backing this cell has not been loaded yet.
    Loading,
    Error(String),
    Unevaluated(String),
}

impl CellValue {
    pub fn to_text(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Text(s) => s.clone(),
            CellValue::Number(n) => {
                if n.fract() == 0.0 {
                    format!("{}", *n as i64)
                } else {
                    format!("{}", n)
                }
            }
            CellValue::Loading => "Loading...".to_string(),
            CellValue::Error(e) => format!("#ERROR: {}", e),
            CellValue::Unevaluated(f) => f.clone(),
        }
    }
}

/// `=LIST(list_id, row, "field")`: the `field` of the 1-based `row` of a list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListReference {
    pub list: ListId,
    pub row: usize,
    pub field: String,
}

/// Source of list rows for evaluation.
pub trait ListLookup {
    /// `None` when the workbook has no list with that id.
    fn list_state(&self, list: &ListId) -> Option<&LoadState>;
}

/// Evaluate raw content against the loaded list data.
pub fn evaluate(content: &str, lookup: &impl ListLookup) -> CellValue {
    if content.is_empty() {
        return CellValue::Empty;
    }
    if content.starts_with('=') {
        return match parse_list_reference(content) {
            Some(Ok(reference)) => evaluate_list_reference(&reference, lookup),
            Some(Err(message)) => CellValue::Error(message),
            None => CellValue::Unevaluated(content.to_string()),
        };
    }
    match content.trim().parse::<f64>() {
        Ok(n) if n.is_finite() => CellValue::Number(n),
        _ => CellValue::Text(content.to_string()),
    }
}

fn evaluate_list_reference(reference: &ListReference, lookup: &impl ListLookup) -> CellValue {
    match lookup.list_state(&reference.list) {
        None => CellValue::Error(format!("unknown list {}", reference.list)),
        Some(LoadState::Loading) => CellValue::Loading,
        Some(LoadState::Failed(message)) => CellValue::Error(message.clone()),
        Some(LoadState::Ready(rows)) => {
            let Some(row) = reference.row.checked_sub(1).and_then(|i| rows.get(i)) else {
                return CellValue::Empty;
            };
            match row.get(&reference.field) {
                None | Some(Value::Null) => CellValue::Empty,
                Some(Value::String(s)) => CellValue::Text(s.clone()),
                Some(Value::Number(n)) => n
                    .as_f64()
                    .map(CellValue::Number)
                    .unwrap_or_else(|| CellValue::Text(n.to_string())),
                Some(Value::Bool(b)) => CellValue::Text(if *b { "TRUE" } else { "FALSE" }.into()),
                // many2one style values: [id, "display name"]
                Some(Value::Array(items)) => match items.get(1) {
                    Some(Value::String(s)) => CellValue::Text(s.clone()),
                    _ => CellValue::Text(Value::Array(items.clone()).to_string()),
                },
                Some(other) => CellValue::Text(other.to_string()),
            }
        }
    }
}

/// Parse `=LIST(id, row, "field")`.
///
/// Returns `None` for formulas that are not a `LIST` call and `Some(Err)`
/// for a `LIST` call with bad arguments.
pub fn parse_list_reference(content: &str) -> Option<Result<ListReference, String>> {
    let body = content.strip_prefix('=')?.trim();
    let open = body.find('(')?;
    if !body[..open].trim().eq_ignore_ascii_case("LIST") {
        return None;
    }
    let Some(args) = body[open + 1..].trim_end().strip_suffix(')') else {
        return Some(Err("LIST: missing closing parenthesis".to_string()));
    };
    let args = split_args(args);
    if args.len() != 3 {
        return Some(Err(format!("LIST expects 3 arguments, got {}", args.len())));
    }
    let list = ListId::new(unquote(args[0]));
    let row = match unquote(args[1]).parse::<usize>() {
        Ok(row) if row > 0 => row,
        _ => return Some(Err(format!("LIST: invalid row {:?}", args[1]))),
    };
    let field = unquote(args[2]);
    if field.is_empty() {
        return Some(Err("LIST: empty field name".to_string()));
    }
    Some(Ok(ListReference { list, row, field: field.to_string() }))
}

fn split_args(args: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut in_quotes = false;
    let mut start = 0;
    for (i, c) in args.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                parts.push(args[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    let last = args[start..].trim();
    if !last.is_empty() || !parts.is_empty() {
        parts.push(last);
    }
    parts
}

fn unquote(arg: &str) -> &str {
    arg.strip_prefix('"').and_then(|a| a.strip_suffix('"')).unwrap_or(arg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustc_hash::FxHashMap;
    use serde_json::json;

    struct Lists(FxHashMap<ListId, LoadState>);

    impl ListLookup for Lists {
        fn list_state(&self, list: &ListId) -> Option<&LoadState> {
            self.0.get(list)
        }
    }

    fn lists(state: LoadState) -> Lists {
        let mut map = FxHashMap::default();
        map.insert(ListId::new("1"), state);
        Lists(map)
    }

    fn rows(values: &[&str]) -> Vec<crate::data_source::Row> {
        values
            .iter()
            .map(|v| json!({ "name": v }).as_object().cloned().unwrap())
            .collect()
    }

    #[test]
    fn test_plain_values() {
        let empty = lists(LoadState::Loading);
        assert_eq!(evaluate("", &empty), CellValue::Empty);
        assert_eq!(evaluate("42", &empty), CellValue::Number(42.0));
        assert_eq!(evaluate("hello", &empty), CellValue::Text("hello".into()));
        assert_eq!(evaluate("=A1+1", &empty), CellValue::Unevaluated("=A1+1".into()));
    }

    #[test]
    fn test_parse_list_reference() {
        let parsed = parse_list_reference(r#"=LIST(1,1,"name")"#).unwrap().unwrap();
        assert_eq!(parsed.list, ListId::new("1"));
        assert_eq!(parsed.row, 1);
        assert_eq!(parsed.field, "name");

        let spaced = parse_list_reference(r#"= list( "1" , 3 , "a,b" )"#).unwrap().unwrap();
        assert_eq!(spaced.row, 3);
        assert_eq!(spaced.field, "a,b");

        assert!(parse_list_reference("=SUM(A1:A2)").is_none());
        assert!(parse_list_reference(r#"=LIST(1,0,"name")"#).unwrap().is_err());
        assert!(parse_list_reference(r#"=LIST(1,1)"#).unwrap().is_err());
    }

    #[test]
    fn test_list_reference_follows_load_state() {
        let content = r#"=LIST(1,1,"name")"#;
        assert_eq!(evaluate(content, &lists(LoadState::Loading)), CellValue::Loading);
        assert_eq!(
            evaluate(content, &lists(LoadState::Ready(rows(&["test"])))),
            CellValue::Text("test".into())
        );
        assert_eq!(
            evaluate(content, &lists(LoadState::Failed("boom".into()))),
            CellValue::Error("boom".into())
        );
        assert_eq!(evaluate(content, &lists(LoadState::Ready(Vec::new()))), CellValue::Empty);
    }

    #[test]
    fn test_unknown_list_is_an_error() {
        let other = lists(LoadState::Loading);
        let value = evaluate(r#"=LIST(9,1,"name")"#, &other);
        assert!(matches!(value, CellValue::Error(_)));
    }

    #[test]
    fn test_many2one_display_name() {
        let row = json!({ "partner_id": [3, "Azure"] }).as_object().cloned().unwrap();
        let value = evaluate(r#"=LIST(1,1,"partner_id")"#, &lists(LoadState::Ready(vec![row])));
        assert_eq!(value, CellValue::Text("Azure".into()));
    }
}
