//! Terminal rendering of the view state.
//!
//! Pure functions: state in, text out. Prices use Indian digit grouping
//! (`1,25,000`) with at most three fraction digits.

use crate::catalog::Product;
use crate::session::ViewState;

pub const TITLE: &str = "AI Product Recommender";
pub const LOADING_TEXT: &str = "Thinking...";
pub const NO_MATCH_TEXT: &str = "No products match your criteria.";
pub const PROMPT_HINT: &str = "e.g., I want a laptop under ₹60,000";

/// Formats `price` like `toLocaleString('en-IN')`, prefixed with `symbol`.
pub fn format_price(price: f64, symbol: &str) -> String {
    let millis = (price.max(0.0) * 1000.0).round() as u64;
    let whole = millis / 1000;
    let fraction = millis % 1000;

    let mut out = format!("{symbol}{}", group_indian(whole));
    if fraction > 0 {
        let digits = format!("{fraction:03}");
        out.push('.');
        out.push_str(digits.trim_end_matches('0'));
    }
    out
}

/// Last three digits, then groups of two: 12345678 → "1,23,45,678".
fn group_indian(n: u64) -> String {
    let digits = n.to_string();
    if digits.len() <= 3 {
        return digits;
    }

    let (head, tail) = digits.split_at(digits.len() - 3);
    let mut groups = Vec::new();
    let mut end = head.len();
    while end > 0 {
        let start = end.saturating_sub(2);
        groups.push(&head[start..end]);
        end = start;
    }
    groups.reverse();
    format!("{},{tail}", groups.join(","))
}

pub fn render_card(product: &Product, symbol: &str) -> String {
    format!(
        "┌ {}\n│ {}\n│ {}\n└ {}\n",
        product.name,
        format_price(product.price, symbol),
        product.category,
        product.description,
    )
}

/// Full screen for `state`.
pub fn render(state: &ViewState, symbol: &str) -> String {
    let mut output = format!("\n{TITLE}\n");

    if !state.query.is_empty() {
        output.push_str(&format!("Query: {}\n", state.query));
    }
    if state.is_loading {
        output.push_str(&format!("{LOADING_TEXT}\n"));
    }
    if let Some(ref message) = state.error_message {
        output.push_str(&format!("! {message}\n"));
    }
    output.push('\n');

    if state.shows_no_match() {
        output.push_str(&format!("{NO_MATCH_TEXT}\n"));
        return output;
    }

    for product in &state.results {
        output.push_str(&render_card(product, symbol));
        output.push('\n');
    }
    output
}
