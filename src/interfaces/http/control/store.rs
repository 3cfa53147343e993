//! Store dump

use axum::extract::State;

use crate::interfaces::http::router::ControlState;
use crate::support::errors::AppResult;

/// Values longer than this are cut in the dump.
pub const VALUE_DISPLAY_LIMIT: usize = 150;

/// `GET /list-db`: every stored key and value as a plain-text table.
pub async fn list_db(State(state): State<ControlState>) -> AppResult<String> {
    let entries = state.runtime.store().entries().await?;
    Ok(render_entries(&entries))
}

pub fn render_entries(entries: &[(String, String)]) -> String {
    let width = entries
        .iter()
        .map(|(key, _)| key.len())
        .max()
        .unwrap_or(0)
        .max("KEY".len());

    let mut out = format!("{:<width$}  VALUE\n", "KEY", width = width);
    for (key, value) in entries {
        out.push_str(&format!(
            "{:<width$}  {}\n",
            key,
            truncate(value),
            width = width
        ));
    }
    out
}

fn truncate(value: &str) -> String {
    match value.char_indices().nth(VALUE_DISPLAY_LIMIT) {
        Some((cut, _)) => format!("{}...", &value[..cut]),
        None => value.to_string(),
    }
}
