//! Pure parsers for chat commands.
//!
//! # Parsing Rules
//!
//! - Commands start with `/`; anything else returns `None` (ordinary chat)
//! - Command verbs are case-insensitive
//! - Whitespace between tokens is flexible (spaces, tabs)
//! - A recognized verb with malformed arguments returns `None`; the
//!   per-domain `/usage` reply documents the expected shapes

use crate::types::{CrsCode, Pence};

use super::types::{BinsCommand, BudgetCommand, TrainsCommand};

/// Parses a budget command from chat text.
pub fn parse_budget(text: &str) -> Option<BudgetCommand> {
    let (verb, rest) = split_verb(text)?;
    match verb.as_str() {
        "balance" => Some(BudgetCommand::Balance),
        "add" => parse_amount_and_note(rest)
            .map(|(amount, note)| BudgetCommand::Add { amount, note }),
        "spend" | "sub" => parse_amount_and_note(rest)
            .map(|(amount, note)| BudgetCommand::Spend { amount, note }),
        "weekly" => {
            let (amount_str, rest) = split_first_word(rest.trim_start());
            if !rest.trim().is_empty() {
                return None;
            }
            let amount = Pence::parse(amount_str).ok()?;
            Some(BudgetCommand::SetWeekly { amount })
        }
        "history" => Some(BudgetCommand::History),
        "usage" | "help" => Some(BudgetCommand::Usage),
        _ => None,
    }
}

/// Parses a bins command from chat text.
pub fn parse_bins(text: &str) -> Option<BinsCommand> {
    let (verb, rest) = split_verb(text)?;
    if !rest.trim().is_empty() {
        return None;
    }
    match verb.as_str() {
        "bins" | "schedule" => Some(BinsCommand::Schedule),
        "usage" | "help" => Some(BinsCommand::Usage),
        _ => None,
    }
}

/// Parses a trains command from chat text.
pub fn parse_trains(text: &str) -> Option<TrainsCommand> {
    let (verb, rest) = split_verb(text)?;
    match verb.as_str() {
        "trains" | "departures" => {
            let station = optional_word(rest)?;
            Some(TrainsCommand::Departures { station })
        }
        "watch" => {
            let rest = rest.trim_start();
            let (time, rest) = split_first_word(rest);
            if !looks_like_time(time) {
                return None;
            }
            let station = optional_word(rest)?;
            Some(TrainsCommand::Watch {
                scheduled: time.to_string(),
                station,
            })
        }
        "unwatch" => Some(TrainsCommand::Unwatch),
        "shortcut" => {
            let rest = rest.trim_start();
            if rest.is_empty() {
                return Some(TrainsCommand::ListShortcuts);
            }
            let (name, rest) = split_first_word(rest);
            let (code, rest) = split_first_word(rest.trim_start());
            if !rest.trim().is_empty() {
                return None;
            }
            let station = CrsCode::parse(code).ok()?;
            Some(TrainsCommand::AddShortcut {
                name: name.to_string(),
                station,
            })
        }
        "shortcuts" => Some(TrainsCommand::ListShortcuts),
        "usage" | "help" => Some(TrainsCommand::Usage),
        _ => None,
    }
}

/// Splits `/verb rest` into a lowercased verb and the remainder.
fn split_verb(text: &str) -> Option<(String, &str)> {
    let text = text.trim_start();
    let text = text.strip_prefix('/')?;
    let (verb, rest) = split_first_word(text);
    if verb.is_empty() {
        return None;
    }
    Some((verb.to_ascii_lowercase(), rest))
}

/// Splits text at the first whitespace, returning (word, rest).
/// If no whitespace, returns (text, "").
fn split_first_word(text: &str) -> (&str, &str) {
    match text.find(|c: char| c.is_ascii_whitespace()) {
        Some(idx) => (&text[..idx], &text[idx..]),
        None => (text, ""),
    }
}

/// Parses `<amount> [note...]`, defaulting the note.
///
/// Amounts are magnitudes: `/add` credits and `/spend` debits, so a signed
/// amount is malformed rather than a direction override.
fn parse_amount_and_note(text: &str) -> Option<(Pence, String)> {
    let text = text.trim_start();
    let (amount_str, rest) = split_first_word(text);
    let amount = Pence::parse(amount_str).ok()?;
    if amount.is_negative() {
        return None;
    }
    let note = rest.trim();
    let note = if note.is_empty() { "manual" } else { note };
    Some((amount, note.to_string()))
}

/// Zero or one trailing word; more than one is malformed.
fn optional_word(text: &str) -> Option<Option<String>> {
    let text = text.trim();
    if text.is_empty() {
        return Some(None);
    }
    let (word, rest) = split_first_word(text);
    if !rest.trim().is_empty() {
        return None;
    }
    Some(Some(word.to_string()))
}

/// `HH:MM`, 24-hour.
fn looks_like_time(s: &str) -> bool {
    let bytes = s.as_bytes();
    if bytes.len() != 5 || bytes[2] != b':' {
        return false;
    }
    let digits = [bytes[0], bytes[1], bytes[3], bytes[4]];
    if !digits.iter().all(u8::is_ascii_digit) {
        return false;
    }
    let hours = (bytes[0] - b'0') * 10 + (bytes[1] - b'0');
    let minutes = (bytes[3] - b'0') * 10 + (bytes[4] - b'0');
    hours < 24 && minutes < 60
}
