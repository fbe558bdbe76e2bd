//! Script compiler.
//!
//! A single linear pass over the line-oriented source produces the flat
//! statement sequence in source order and the color/value symbol tables.
//! Block structure is validated as it is built: every opener must be closed
//! by the matching closer, and `select-one` members must be plain one-shot
//! statements. On any error the caller receives only a diagnostic naming the
//! offending line; no partial program is exposed.

use serde::{Deserialize, Serialize};

use crate::lang::{
    CompiledScript, HmsDuration, Program, Statement, SymbolTable, TimeOfDay, pack_rgb,
};

/// A compilation diagnostic: the 1-based source line and what went wrong.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileError {
    pub line: usize,
    pub info: String,
}

impl CompileError {
    fn new(line: usize, info: impl Into<String>) -> Self {
        CompileError { line, info: info.into() }
    }
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}: {}", self.line, self.info)
    }
}

impl std::error::Error for CompileError {}

/// The HTML4 basic palette, usable in color operands without a `color`
/// definition.
const NAMED_COLORS: &[(&str, (u8, u8, u8))] = &[
    ("aqua", (0x00, 0xFF, 0xFF)),
    ("black", (0x00, 0x00, 0x00)),
    ("blue", (0x00, 0x00, 0xFF)),
    ("fuchsia", (0xFF, 0x00, 0xFF)),
    ("gray", (0x80, 0x80, 0x80)),
    ("green", (0x00, 0x80, 0x00)),
    ("lime", (0x00, 0xFF, 0x00)),
    ("maroon", (0x80, 0x00, 0x00)),
    ("navy", (0x00, 0x00, 0x80)),
    ("olive", (0x80, 0x80, 0x00)),
    ("purple", (0x80, 0x00, 0x80)),
    ("red", (0xFF, 0x00, 0x00)),
    ("silver", (0xC0, 0xC0, 0xC0)),
    ("teal", (0x00, 0x80, 0x80)),
    ("white", (0xFF, 0xFF, 0xFF)),
    ("yellow", (0xFF, 0xFF, 0x00)),
];

fn named_color(name: &str) -> Option<(u8, u8, u8)> {
    let lower = name.to_ascii_lowercase();
    NAMED_COLORS
        .iter()
        .find(|(n, _)| *n == lower)
        .map(|(_, rgb)| *rgb)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockKind {
    ForN,
    For,
    At,
    Until,
    Forever,
    SelectOne,
}

impl BlockKind {
    fn opcode(&self) -> &'static str {
        match self {
            BlockKind::ForN => "do-for-n",
            BlockKind::For => "do-for",
            BlockKind::At => "do-at",
            BlockKind::Until => "do-until",
            BlockKind::Forever => "do-forever",
            BlockKind::SelectOne => "select-one",
        }
    }
}

struct OpenBlock {
    kind: BlockKind,
    index: usize,
    line: usize,
}

#[derive(Debug, Default)]
pub struct ScriptCompiler;

impl ScriptCompiler {
    pub fn new() -> Self {
        ScriptCompiler
    }

    pub fn compile(&self, source: &str) -> Result<CompiledScript, CompileError> {
        let mut statements: Program = Vec::new();
        let mut symbols = SymbolTable::default();
        let mut open_blocks: Vec<OpenBlock> = Vec::new();

        for (offset, raw) in source.lines().enumerate() {
            let line_no = offset + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let tokens: Vec<&str> = line.split_whitespace().collect();
            let opcode = tokens[0].to_ascii_lowercase();
            let index = statements.len();

            let statement = match opcode.as_str() {
                "color" => {
                    expect_operands(&tokens, 4, "color <name> <r> <g> <b>", line_no)?;
                    let name = tokens[1].to_string();
                    if symbols.colors.contains_key(&name) {
                        return Err(CompileError::new(
                            line_no,
                            format!("color '{}' is already defined", name),
                        ));
                    }
                    let red = parse_component(tokens[2], "red", line_no)?;
                    let green = parse_component(tokens[3], "green", line_no)?;
                    let blue = parse_component(tokens[4], "blue", line_no)?;
                    symbols.colors.insert(name.clone(), (red, green, blue));
                    Statement::Color { name, red, green, blue }
                }
                "value" => {
                    expect_operands(&tokens, 2, "value <name> <integer>", line_no)?;
                    let name = tokens[1].to_string();
                    if symbols.defines.contains_key(&name) {
                        return Err(CompileError::new(
                            line_no,
                            format!("value '{}' is already defined", name),
                        ));
                    }
                    let value = tokens[2].parse::<i64>().map_err(|_| {
                        CompileError::new(line_no, format!("'{}' is not an integer", tokens[2]))
                    })?;
                    symbols.defines.insert(name.clone(), value);
                    Statement::Value { name, value }
                }
                "logmessage" => {
                    let text = line[tokens[0].len()..].trim_start();
                    if text.is_empty() {
                        return Err(CompileError::new(line_no, "logmessage requires message text"));
                    }
                    Statement::LogMessage(text.to_string())
                }
                "do-for-n" => {
                    expect_operands(&tokens, 1, "do-for-n <count>", line_no)?;
                    let count = tokens[1].parse::<u32>().map_err(|_| {
                        CompileError::new(line_no, format!("'{}' is not a count", tokens[1]))
                    })?;
                    if count == 0 {
                        return Err(CompileError::new(line_no, "do-for-n count must be positive"));
                    }
                    Statement::DoForN(count)
                }
                "do-for" => Statement::DoFor(parse_duration(&tokens, line_no)?),
                "do-at" => Statement::DoAt(parse_time_of_day(&tokens, line_no)?),
                "do-until" => Statement::DoUntil(parse_time_of_day(&tokens, line_no)?),
                "do-forever" => {
                    expect_operands(&tokens, 0, "do-forever", line_no)?;
                    Statement::DoForever
                }
                "select-one" => {
                    expect_operands(&tokens, 0, "select-one", line_no)?;
                    // end index patched when the closer is reached
                    Statement::SelectOne(0)
                }
                "do-for-n-end" => {
                    expect_operands(&tokens, 0, "do-for-n-end", line_no)?;
                    close_block(&mut open_blocks, BlockKind::ForN, &opcode, line_no)?;
                    Statement::DoForNEnd
                }
                "do-for-end" => {
                    expect_operands(&tokens, 0, "do-for-end", line_no)?;
                    close_block(&mut open_blocks, BlockKind::For, &opcode, line_no)?;
                    Statement::DoForEnd
                }
                "do-at-end" => {
                    expect_operands(&tokens, 0, "do-at-end", line_no)?;
                    close_block(&mut open_blocks, BlockKind::At, &opcode, line_no)?;
                    Statement::DoAtEnd
                }
                "do-until-end" => {
                    expect_operands(&tokens, 0, "do-until-end", line_no)?;
                    close_block(&mut open_blocks, BlockKind::Until, &opcode, line_no)?;
                    Statement::DoUntilEnd
                }
                "do-forever-end" => {
                    expect_operands(&tokens, 0, "do-forever-end", line_no)?;
                    close_block(&mut open_blocks, BlockKind::Forever, &opcode, line_no)?;
                    Statement::DoForeverEnd
                }
                "select-one-end" => {
                    expect_operands(&tokens, 0, "select-one-end", line_no)?;
                    let open = close_block(&mut open_blocks, BlockKind::SelectOne, &opcode, line_no)?;
                    if index - open.index <= 1 {
                        return Err(CompileError::new(open.line, "select-one block is empty"));
                    }
                    statements[open.index] = Statement::SelectOne(index);
                    Statement::SelectOneEnd
                }
                "pause" => Statement::Pause(parse_duration(&tokens, line_no)?),
                "reset" => {
                    expect_operands(&tokens, 0, "reset", line_no)?;
                    Statement::Reset
                }
                "set" => {
                    if tokens.len() < 3 {
                        return Err(CompileError::new(line_no, "usage: set <index> <color>"));
                    }
                    let pixel = tokens[1].parse::<usize>().map_err(|_| {
                        CompileError::new(
                            line_no,
                            format!("'{}' is not a pixel index", tokens[1]),
                        )
                    })?;
                    let color = parse_color_operand(&tokens[2..], &symbols, line_no)?;
                    Statement::SetPixel { index: pixel, color }
                }
                "fill" => {
                    if tokens.len() < 2 {
                        return Err(CompileError::new(line_no, "usage: fill <color>"));
                    }
                    let color = parse_color_operand(&tokens[1..], &symbols, line_no)?;
                    Statement::Fill(color)
                }
                "brightness" => {
                    expect_operands(&tokens, 1, "brightness <0-255>", line_no)?;
                    Statement::Brightness(parse_component(tokens[1], "brightness", line_no)?)
                }
                "show" => {
                    expect_operands(&tokens, 0, "show", line_no)?;
                    Statement::Show
                }
                other => {
                    return Err(CompileError::new(
                        line_no,
                        format!("'{}' is not a recognized statement", other),
                    ));
                }
            };

            // select-one members are executed out of line by the CPU, so
            // nothing that manipulates block state may appear inside one
            if let Some(open) = open_blocks.last() {
                if open.kind == BlockKind::SelectOne && statement.is_block_open() {
                    return Err(CompileError::new(
                        line_no,
                        format!(
                            "{} block is not allowed inside select-one",
                            statement.opcode()
                        ),
                    ));
                }
            }

            if statement.is_block_open() {
                let kind = match statement {
                    Statement::DoForN(_) => BlockKind::ForN,
                    Statement::DoFor(_) => BlockKind::For,
                    Statement::DoAt(_) => BlockKind::At,
                    Statement::DoUntil(_) => BlockKind::Until,
                    Statement::DoForever => BlockKind::Forever,
                    _ => BlockKind::SelectOne,
                };
                open_blocks.push(OpenBlock { kind, index, line: line_no });
            }

            statements.push(statement);
        }

        if let Some(open) = open_blocks.pop() {
            return Err(CompileError::new(
                open.line,
                format!("unterminated {} block", open.kind.opcode()),
            ));
        }

        Ok(CompiledScript { statements, symbols })
    }
}

fn expect_operands(
    tokens: &[&str],
    count: usize,
    usage: &str,
    line: usize,
) -> Result<(), CompileError> {
    if tokens.len() != count + 1 {
        return Err(CompileError::new(line, format!("usage: {}", usage)));
    }
    Ok(())
}

fn parse_component(token: &str, what: &str, line: usize) -> Result<u8, CompileError> {
    token
        .parse::<u8>()
        .map_err(|_| CompileError::new(line, format!("'{}' is not a {} value (0-255)", token, what)))
}

fn parse_duration(tokens: &[&str], line: usize) -> Result<HmsDuration, CompileError> {
    expect_operands(tokens, 1, &format!("{} <hh:mm:ss>", tokens[0]), line)?;
    HmsDuration::parse(tokens[1])
        .ok_or_else(|| CompileError::new(line, format!("'{}' is not a hh:mm:ss duration", tokens[1])))
}

fn parse_time_of_day(tokens: &[&str], line: usize) -> Result<TimeOfDay, CompileError> {
    expect_operands(tokens, 1, &format!("{} <hh:mm:ss>", tokens[0]), line)?;
    TimeOfDay::parse(tokens[1])
        .ok_or_else(|| CompileError::new(line, format!("'{}' is not a hh:mm:ss time of day", tokens[1])))
}

/// A color operand: a defined or built-in color name, a `0xRRGGBB` literal,
/// or three decimal components.
fn parse_color_operand(
    parts: &[&str],
    symbols: &SymbolTable,
    line: usize,
) -> Result<u32, CompileError> {
    match parts {
        [single] => {
            if let Some(hex) = single.strip_prefix("0x").or_else(|| single.strip_prefix("0X")) {
                let value = u32::from_str_radix(hex, 16).map_err(|_| {
                    CompileError::new(line, format!("'{}' is not a 0xRRGGBB color", single))
                })?;
                if value > 0xFFFFFF {
                    return Err(CompileError::new(
                        line,
                        format!("'{}' is out of the 0xRRGGBB range", single),
                    ));
                }
                Ok(value)
            } else if let Some(&(r, g, b)) = symbols.colors.get(*single) {
                Ok(pack_rgb(r, g, b))
            } else if let Some((r, g, b)) = named_color(single) {
                Ok(pack_rgb(r, g, b))
            } else {
                Err(CompileError::new(
                    line,
                    format!("'{}' is not a defined color", single),
                ))
            }
        }
        [r, g, b] => {
            let red = parse_component(r, "red", line)?;
            let green = parse_component(g, "green", line)?;
            let blue = parse_component(b, "blue", line)?;
            Ok(pack_rgb(red, green, blue))
        }
        _ => Err(CompileError::new(
            line,
            "expected a color name, 0xRRGGBB, or <r> <g> <b>",
        )),
    }
}

fn close_block(
    open_blocks: &mut Vec<OpenBlock>,
    kind: BlockKind,
    closer: &str,
    line: usize,
) -> Result<OpenBlock, CompileError> {
    match open_blocks.pop() {
        Some(open) if open.kind == kind => Ok(open),
        Some(open) => Err(CompileError::new(
            line,
            format!(
                "{} does not close the {} block opened on line {}",
                closer,
                open.kind.opcode(),
                open.line
            ),
        )),
        None => Err(CompileError::new(
            line,
            format!("{} without a matching {}", closer, kind.opcode()),
        )),
    }
}
