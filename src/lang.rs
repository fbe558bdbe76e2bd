//! Compiled representation of a show-control script.
//!
//! A script compiles into a flat [`Program`] of [`Statement`]s executed in
//! source order by the CPU, plus a [`SymbolTable`] holding the `color` and
//! `value` definitions the script declared.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A wall-clock duration expressed as hours, minutes and seconds,
/// the way scripts write it (`hh:mm:ss`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HmsDuration {
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
}

impl HmsDuration {
    pub fn new(hour: u32, minute: u32, second: u32) -> Self {
        HmsDuration { hour, minute, second }
    }

    #[inline]
    pub fn as_seconds(&self) -> u64 {
        (self.hour as u64) * 3600 + (self.minute as u64) * 60 + self.second as u64
    }

    /// Parse a `hh:mm:ss` literal. Minutes and seconds must be below 60.
    pub fn parse(text: &str) -> Option<Self> {
        let (h, m, s) = parse_hms(text)?;
        if m >= 60 || s >= 60 {
            return None;
        }
        Some(HmsDuration::new(h, m, s))
    }
}

impl std::fmt::Display for HmsDuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}:{:02}", self.hour, self.minute, self.second)
    }
}

/// A time of day with second resolution, used by `do-at` and `do-until`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeOfDay {
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
}

impl TimeOfDay {
    pub fn new(hour: u32, minute: u32, second: u32) -> Self {
        TimeOfDay { hour, minute, second }
    }

    /// Parse a `hh:mm:ss` literal as a valid time of day.
    pub fn parse(text: &str) -> Option<Self> {
        let (h, m, s) = parse_hms(text)?;
        if h >= 24 || m >= 60 || s >= 60 {
            return None;
        }
        Some(TimeOfDay::new(h, m, s))
    }

    pub fn as_naive_time(&self) -> chrono::NaiveTime {
        // Components were validated at parse time
        chrono::NaiveTime::from_hms_opt(self.hour, self.minute, self.second)
            .unwrap_or(chrono::NaiveTime::MIN)
    }
}

impl std::fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}:{:02}", self.hour, self.minute, self.second)
    }
}

fn parse_hms(text: &str) -> Option<(u32, u32, u32)> {
    let mut parts = text.split(':');
    let h = parts.next()?.parse().ok()?;
    let m = parts.next()?.parse().ok()?;
    let s = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((h, m, s))
}

/// Pack RGB components into the `0xRRGGBB` form the driver boundary expects.
#[inline]
pub fn pack_rgb(r: u8, g: u8, b: u8) -> u32 {
    ((r as u32) << 16) | ((g as u32) << 8) | (b as u32)
}

/// One compiled script operation with its operands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Statement {
    /// `color` definition. Kept in the sequence so the compiled statement
    /// count matches the source, but inert at run time: the definition
    /// itself lives in the symbol table.
    Color { name: String, red: u8, green: u8, blue: u8 },
    /// `value` definition. Inert at run time, like [`Statement::Color`].
    Value { name: String, value: i64 },
    /// Message text with `$name` references resolved at run time.
    LogMessage(String),
    DoForN(u32),
    DoForNEnd,
    DoFor(HmsDuration),
    DoForEnd,
    DoAt(TimeOfDay),
    DoAtEnd,
    DoUntil(TimeOfDay),
    DoUntilEnd,
    DoForever,
    DoForeverEnd,
    /// Randomized single choice. The operand is the index of the matching
    /// [`Statement::SelectOneEnd`]; members occupy the statements between.
    SelectOne(usize),
    SelectOneEnd,
    Pause(HmsDuration),
    Reset,
    SetPixel { index: usize, color: u32 },
    Fill(u32),
    Brightness(u8),
    Show,
}

impl Statement {
    /// Opcode name as written in script source, for diagnostics and logs.
    pub fn opcode(&self) -> &'static str {
        match self {
            Statement::Color { .. } => "color",
            Statement::Value { .. } => "value",
            Statement::LogMessage(_) => "logmessage",
            Statement::DoForN(_) => "do-for-n",
            Statement::DoForNEnd => "do-for-n-end",
            Statement::DoFor(_) => "do-for",
            Statement::DoForEnd => "do-for-end",
            Statement::DoAt(_) => "do-at",
            Statement::DoAtEnd => "do-at-end",
            Statement::DoUntil(_) => "do-until",
            Statement::DoUntilEnd => "do-until-end",
            Statement::DoForever => "do-forever",
            Statement::DoForeverEnd => "do-forever-end",
            Statement::SelectOne(_) => "select-one",
            Statement::SelectOneEnd => "select-one-end",
            Statement::Pause(_) => "pause",
            Statement::Reset => "reset",
            Statement::SetPixel { .. } => "set",
            Statement::Fill(_) => "fill",
            Statement::Brightness(_) => "brightness",
            Statement::Show => "show",
        }
    }

    pub fn is_block_open(&self) -> bool {
        matches!(
            self,
            Statement::DoForN(_)
                | Statement::DoFor(_)
                | Statement::DoAt(_)
                | Statement::DoUntil(_)
                | Statement::DoForever
                | Statement::SelectOne(_)
        )
    }

    pub fn is_block_close(&self) -> bool {
        matches!(
            self,
            Statement::DoForNEnd
                | Statement::DoForEnd
                | Statement::DoAtEnd
                | Statement::DoUntilEnd
                | Statement::DoForeverEnd
                | Statement::SelectOneEnd
        )
    }
}

pub type Program = Vec<Statement>;

/// Color and value definitions collected at compile time.
/// Immutable once compilation has finished.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolTable {
    pub colors: HashMap<String, (u8, u8, u8)>,
    pub defines: HashMap<String, i64>,
}

impl SymbolTable {
    /// Render a `$name` reference for log message substitution.
    /// A color symbol wins over a value symbol of the same name.
    pub fn substitution(&self, name: &str) -> Option<String> {
        if let Some((r, g, b)) = self.colors.get(name) {
            return Some(format!("({}, {}, {})", r, g, b));
        }
        self.defines.get(name).map(|v| v.to_string())
    }
}

/// A compiled script: the statement sequence plus its symbol tables.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledScript {
    pub statements: Program,
    pub symbols: SymbolTable,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hms_duration_to_seconds() {
        let d = HmsDuration::parse("01:02:03").unwrap();
        assert_eq!(d.as_seconds(), 3723);
        assert_eq!(HmsDuration::parse("00:00:00").unwrap().as_seconds(), 0);
    }

    #[test]
    fn hms_duration_rejects_bad_fields() {
        assert!(HmsDuration::parse("00:60:00").is_none());
        assert!(HmsDuration::parse("00:00:61").is_none());
        assert!(HmsDuration::parse("1:2").is_none());
        assert!(HmsDuration::parse("1:2:3:4").is_none());
        assert!(HmsDuration::parse("abc").is_none());
    }

    #[test]
    fn time_of_day_bounds() {
        assert!(TimeOfDay::parse("23:59:59").is_some());
        assert!(TimeOfDay::parse("24:00:00").is_none());
    }

    #[test]
    fn rgb_packing() {
        assert_eq!(pack_rgb(0xFF, 0x00, 0x80), 0xFF0080);
        assert_eq!(pack_rgb(0, 0, 0), 0);
    }

    #[test]
    fn substitution_prefers_colors() {
        let mut symbols = SymbolTable::default();
        symbols.colors.insert("red".to_string(), (255, 0, 0));
        symbols.defines.insert("red".to_string(), 7);
        symbols.defines.insert("count".to_string(), 3);
        assert_eq!(symbols.substitution("red").unwrap(), "(255, 0, 0)");
        assert_eq!(symbols.substitution("count").unwrap(), "3");
        assert!(symbols.substitution("missing").is_none());
    }
}
