//! Бэктрейсы: единый тип кадра, два внешних формата трассы и текстовый вывод.
//!
//! Трасса из отладочного захвата и трасса, сохранённая в ошибке, приводятся
//! к `StackFrame` до форматирования, поэтому для одинаковых кадров вывод
//! совпадает побайтно.

use crate::error::LogError;
use serde::Deserialize;
use serde_json::Value;
use std::error::Error;
use std::path::Path;

const DEFAULT_MAX_ARG_LEN: usize = 80;
const INTERNAL_FUNCTION: &str = "[internal function]";

// Вызовы, аргументы которых содержат учётные данные.
const REDACTED_CALLS: &[(&str, &str)] = &[("DB::", "connect")];

// ===== Кадр стека =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum CallType {
    #[serde(rename = "->")]
    Instance,
    #[serde(rename = "::")]
    Static,
}

impl CallType {
    pub fn operator(&self) -> &'static str {
        match self {
            CallType::Instance => "->",
            CallType::Static => "::",
        }
    }
}

/// Значение аргумента в том виде, в каком оно попадает в сводку.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
    Array(usize),
    Object(String),
    Resource,
    Null,
}

impl ArgValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            ArgValue::Bool(_) => "boolean",
            ArgValue::Int(_) | ArgValue::UInt(_) => "integer",
            ArgValue::Float(_) => "double",
            ArgValue::Str(_) => "string",
            ArgValue::Array(_) => "array",
            ArgValue::Object(_) => "object",
            ArgValue::Resource => "resource",
            ArgValue::Null => "NULL",
        }
    }

    fn summary(&self, max_len: usize) -> String {
        match self {
            ArgValue::Bool(true) => "TRUE".to_owned(),
            ArgValue::Bool(false) => "FALSE".to_owned(),
            ArgValue::Int(n) => n.to_string(),
            ArgValue::UInt(n) => n.to_string(),
            ArgValue::Float(x) => x.to_string(),
            ArgValue::Str(s) => format!("\"{}\"", ellipsify(&escape(s), max_len)),
            ArgValue::Array(len) => format!("(Array:{})", len),
            ArgValue::Object(class) => format!("Object({})", class),
            ArgValue::Resource => "Resource".to_owned(),
            ArgValue::Null => "NULL".to_owned(),
        }
    }
}

impl From<&Value> for ArgValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => ArgValue::Null,
            Value::Bool(b) => ArgValue::Bool(*b),
            Value::Number(n) => match (n.as_i64(), n.as_u64()) {
                (Some(i), _) => ArgValue::Int(i),
                (None, Some(u)) => ArgValue::UInt(u),
                _ => ArgValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => ArgValue::Str(s.clone()),
            Value::Array(items) => ArgValue::Array(items.len()),
            // объект помечается ключом "__class__", иначе это ассоциативный массив
            Value::Object(map) => match map.get("__class__").and_then(Value::as_str) {
                Some(class) => ArgValue::Object(class.to_owned()),
                None => ArgValue::Array(map.len()),
            },
        }
    }
}

/// Один кадр вызова. Все поля, кроме имени функции, необязательны.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StackFrame {
    pub function: String,
    pub class: Option<String>,
    pub call_type: Option<CallType>,
    pub file: Option<String>,
    pub line: Option<u32>,
    pub args: Vec<ArgValue>,
}

impl StackFrame {
    pub fn new(function: &str) -> Self {
        StackFrame {
            function: function.to_owned(),
            ..Default::default()
        }
    }

    pub fn with_class(mut self, class: &str, call_type: CallType) -> Self {
        self.class = Some(class.to_owned());
        self.call_type = Some(call_type);
        self
    }

    pub fn at(mut self, file: &str, line: u32) -> Self {
        self.file = Some(file.to_owned());
        self.line = Some(line);
        self
    }

    pub fn with_args(mut self, args: Vec<ArgValue>) -> Self {
        self.args = args;
        self
    }

    /// `Class->` / `Class::`, либо пусто, если класса нет.
    fn class_prefix(&self) -> String {
        match &self.class {
            Some(class) => {
                let op = self.call_type.unwrap_or(CallType::Instance).operator();
                format!("{}{}", class, op)
            }
            None => String::new(),
        }
    }

    fn qualified_name(&self) -> String {
        format!("{}{}", self.class_prefix(), self.function)
    }

    /// Кадры из JSON отладочной трассы.
    pub fn from_debug_trace(json: &str) -> Result<Vec<StackFrame>, LogError> {
        parse_debug_trace(json)
    }

    /// Кадры из JSON трассы, сохранённой в ошибке.
    pub fn from_exception_trace(json: &str) -> Result<Vec<StackFrame>, LogError> {
        parse_exception_trace(json)
    }

    fn from_symbol(name: &str, file: Option<&Path>, line: Option<u32>) -> Self {
        let (class, function) = match name.rsplit_once("::") {
            Some((class, function)) => (Some(class.to_owned()), function.to_owned()),
            None => (None, name.to_owned()),
        };
        StackFrame {
            function,
            call_type: class.as_ref().map(|_| CallType::Static),
            class,
            file: file.map(|p| p.display().to_string()),
            line,
            args: Vec::new(),
        }
    }
}

// ===== Внешние формы трассы =====

/// Запись живой отладочной трассы, иногда с объектом.
#[derive(Debug, Clone, Deserialize)]
pub struct DebugTraceFrame {
    #[serde(default)]
    pub function: String,
    pub class: Option<String>,
    #[serde(rename = "type")]
    pub call_type: Option<CallType>,
    pub file: Option<String>,
    pub line: Option<u32>,
    pub args: Option<Vec<Value>>,
    /// Есть только у этого механизма, в вывод не попадает.
    pub object: Option<Value>,
}

/// Запись трассы, сохранённой вместе с ошибкой. Аргументы часто отсутствуют.
#[derive(Debug, Clone, Deserialize)]
pub struct ExceptionTraceFrame {
    #[serde(default)]
    pub function: String,
    pub class: Option<String>,
    #[serde(rename = "type")]
    pub call_type: Option<CallType>,
    pub file: Option<String>,
    pub line: Option<u32>,
    pub args: Option<Vec<Value>>,
}

impl From<DebugTraceFrame> for StackFrame {
    fn from(raw: DebugTraceFrame) -> Self {
        StackFrame {
            function: raw.function,
            class: raw.class,
            call_type: raw.call_type,
            file: raw.file,
            line: raw.line,
            args: raw
                .args
                .unwrap_or_default()
                .iter()
                .map(ArgValue::from)
                .collect(),
        }
    }
}

impl From<ExceptionTraceFrame> for StackFrame {
    fn from(raw: ExceptionTraceFrame) -> Self {
        StackFrame {
            function: raw.function,
            class: raw.class,
            call_type: raw.call_type,
            file: raw.file,
            line: raw.line,
            args: raw
                .args
                .unwrap_or_default()
                .iter()
                .map(ArgValue::from)
                .collect(),
        }
    }
}

/// Разбирает JSON-массив записей отладочной трассы.
pub fn parse_debug_trace(json: &str) -> Result<Vec<StackFrame>, LogError> {
    let raw: Vec<DebugTraceFrame> = serde_json::from_str(json)?;
    Ok(raw.into_iter().map(StackFrame::from).collect())
}

/// Разбирает JSON-массив записей трассы из ошибки.
pub fn parse_exception_trace(json: &str) -> Result<Vec<StackFrame>, LogError> {
    let raw: Vec<ExceptionTraceFrame> = serde_json::from_str(json)?;
    Ok(raw.into_iter().map(StackFrame::from).collect())
}

// ===== Захват текущего стека =====

/// Снимает стек вызывающего кода. Кадры самого захвата отбрасываются.
#[inline(never)]
pub fn capture() -> Vec<StackFrame> {
    let mut frames = Vec::new();
    backtrace::trace(|frame| {
        backtrace::resolve_frame(frame, |symbol| {
            if let Some(name) = symbol.name() {
                let name = format!("{:#}", name);
                frames.push(StackFrame::from_symbol(&name, symbol.filename(), symbol.lineno()));
            }
        });
        true
    });

    let own_name = concat!(module_path!(), "::capture");
    let skip = frames
        .iter()
        .position(|f| f.qualified_name() == own_name)
        .map_or(0, |i| i + 1);
    frames.split_off(skip)
}

// ===== Форматирование =====

#[derive(Debug, Clone)]
pub struct FormatOptions {
    pub show_args: bool,
    pub max_arg_len: usize,
}

impl Default for FormatOptions {
    fn default() -> Self {
        FormatOptions {
            show_args: true,
            max_arg_len: DEFAULT_MAX_ARG_LEN,
        }
    }
}

/// Строки кадров без номеров.
pub fn parse_backtrace(frames: &[StackFrame], options: &FormatOptions) -> Vec<String> {
    frames
        .iter()
        .map(|frame| {
            let class_prefix = frame.class_prefix();
            let redacted = REDACTED_CALLS
                .iter()
                .any(|(class, function)| class_prefix == *class && frame.function == *function);

            let args: Vec<String> = frame
                .args
                .iter()
                .map(|arg| {
                    if options.show_args && !redacted {
                        arg.summary(options.max_arg_len)
                    } else {
                        format!("({})", arg.type_name())
                    }
                })
                .collect();

            let location = match &frame.file {
                Some(file) => {
                    let line = frame.line.map(|l| l.to_string()).unwrap_or_default();
                    format!("  called at [{}:{}]", file, line)
                }
                None => format!(" {}", INTERNAL_FUNCTION),
            };

            format!(
                "{}{}({}){}",
                class_prefix,
                frame.function,
                args.join(", "),
                location
            )
        })
        .collect()
}

pub fn format_backtrace(frames: &[StackFrame]) -> String {
    format_backtrace_with(frames, &FormatOptions::default())
}

/// `#<i> <кадр>` построчно и завершающая строка `#<n> {main}`.
pub fn format_backtrace_with(frames: &[StackFrame], options: &FormatOptions) -> String {
    let lines = parse_backtrace(frames, options);
    let mut out = String::new();
    for (idx, line) in lines.iter().enumerate() {
        out.push_str(&format!("#{} {}\n", idx, line));
    }
    out.push_str(&format!("#{} {{main}}\n", lines.len()));
    out
}

/// Текст ошибки вместе с цепочкой причин и бэктрейсом.
pub fn format_text_exception<E: Error + ?Sized>(err: &E, frames: &[StackFrame]) -> String {
    let mut out = format!("{}: \"{}\"\n", std::any::type_name::<E>(), err);
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str(&format!("Caused by: \"{}\"\n", cause));
        source = cause.source();
    }
    out.push_str(&format_backtrace(frames));
    out
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\r' => out.push_str("\\r"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '"' => out.push_str("\\\""),
            _ => out.push(c),
        }
    }
    out
}

fn ellipsify(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        return s.to_owned();
    }
    let keep = max_len.saturating_sub(3);
    let mut out: String = s.chars().take(keep).collect();
    out.push_str("...");
    out
}
