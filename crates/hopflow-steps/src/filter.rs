//! `filter`: keeps rows matching a simple predicate.
//!
//! Conditions have the form `field OP literal` with OP ∈ {==, !=, <, <=, >, >=}.
//! Integer fields may be reduced first: `n % 2 == 0`. The literal is parsed
//! with the field's type; surrounding single or double quotes are stripped.
//!
//! Matching rows go to every output hop (or `send_true_to` only), the rest are
//! dropped (or sent to `send_false_to`). A row that cannot be evaluated is a
//! row error.

use std::cmp::Ordering;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use hopflow_core::graph::StepMeta;
use hopflow_core::schema::{RowSchema, ValueType};
use hopflow_core::step::{ErrorCause, Flow, RowIo, StepContext, StepError, StepLogic};
use hopflow_core::types::{compare_values, Row, Value};
use hopflow_core::variables::MessageCatalog;

use crate::registry::parse_config;

pub const TYPE: &str = "filter";

pub const MSG_UNKNOWN_FIELD: &str = "filter.unknown_field";
pub const MSG_BAD_LITERAL: &str = "filter.bad_literal";
pub const MSG_UNSUPPORTED: &str = "filter.unsupported";

pub fn register_messages(catalog: &mut MessageCatalog) {
    catalog.insert(MSG_UNKNOWN_FIELD, "field '{0}' is not in the input row");
    catalog.insert(MSG_BAD_LITERAL, "cannot compare field '{0}' with '{1}': {2}");
    catalog.insert(MSG_UNSUPPORTED, "operator '{1}' is not supported for field '{0}'");
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub condition: String,
    pub send_true_to: Option<String>,
    pub send_false_to: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    fn symbol(self) -> &'static str {
        match self {
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        }
    }

    fn holds(self, ord: Ordering) -> bool {
        match self {
            CmpOp::Eq => ord == Ordering::Equal,
            CmpOp::Ne => ord != Ordering::Equal,
            CmpOp::Lt => ord == Ordering::Less,
            CmpOp::Le => ord != Ordering::Greater,
            CmpOp::Gt => ord == Ordering::Greater,
            CmpOp::Ge => ord != Ordering::Less,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    pub field: String,
    pub modulus: Option<i64>,
    pub op: CmpOp,
    pub literal: String,
}

/// Parse a predicate like "age > 18", "name == 'Alice'" or "n % 2 == 0".
pub fn parse_predicate(expr: &str) -> Result<Predicate, StepError> {
    // Two-character operators first so "<=" is not read as "<".
    let ops = [
        ("==", CmpOp::Eq),
        ("!=", CmpOp::Ne),
        ("<=", CmpOp::Le),
        (">=", CmpOp::Ge),
        ("<", CmpOp::Lt),
        (">", CmpOp::Gt),
    ];
    let unparseable = || StepError::Config(format!("unparseable condition: '{expr}'"));

    let (pos, sym, op) = ops
        .iter()
        .find_map(|(sym, op)| expr.find(sym).map(|pos| (pos, *sym, *op)))
        .ok_or_else(unparseable)?;

    let lhs = expr[..pos].trim();
    let literal = strip_quotes(expr[pos + sym.len()..].trim()).to_string();
    let (field, modulus) = match lhs.split_once('%') {
        Some((f, m)) => {
            let m: i64 = m.trim().parse().map_err(|_| unparseable())?;
            if m == 0 {
                return Err(unparseable());
            }
            (f.trim(), Some(m))
        }
        None => (lhs, None),
    };
    if field.is_empty() {
        return Err(unparseable());
    }
    Ok(Predicate {
        field: field.to_string(),
        modulus,
        op,
        literal,
    })
}

fn strip_quotes(s: &str) -> &str {
    for q in ['\'', '"'] {
        if s.len() >= 2 && s.starts_with(q) && s.ends_with(q) {
            return &s[1..s.len() - 1];
        }
    }
    s
}

/// Message key, message arguments and error code.
type BindError = (&'static str, Vec<String>, &'static str);

/// Predicate bound to one input schema.
struct Bound {
    schema: Arc<RowSchema>,
    index: usize,
    literal: Value,
}

pub struct Filter {
    config: FilterConfig,
    predicate: Predicate,
    messages: Arc<MessageCatalog>,
    bound: Option<Bound>,
    checked_targets: bool,
}

impl Filter {
    pub fn new(config: FilterConfig) -> Result<Self, StepError> {
        let predicate = parse_predicate(&config.condition)?;
        Ok(Self {
            config,
            predicate,
            messages: Arc::new(MessageCatalog::new()),
            bound: None,
            checked_targets: false,
        })
    }

    fn reject(&self, row: Row, key: &str, args: &[&str], code: &str) -> StepError {
        StepError::row(
            row,
            ErrorCause::new(self.messages.render(key, args))
                .on_field(self.predicate.field.clone())
                .with_code(code),
        )
    }

    fn bind(&mut self, schema: &Arc<RowSchema>) -> Result<(), BindError> {
        if matches!(&self.bound, Some(b) if Arc::ptr_eq(&b.schema, schema)) {
            return Ok(());
        }
        let p = &self.predicate;
        let index = schema
            .index_of(&p.field)
            .ok_or_else(|| (MSG_UNKNOWN_FIELD, vec![p.field.clone()], "FILTER_FIELD"))?;
        let ty = schema.fields()[index].value_type;
        if ty == ValueType::Binary || (p.modulus.is_some() && ty != ValueType::Integer) {
            return Err((
                MSG_UNSUPPORTED,
                vec![p.field.clone(), p.op.symbol().to_string()],
                "FILTER_OP",
            ));
        }
        let literal = Value::parse_as(ty, &p.literal).map_err(|e| {
            (MSG_BAD_LITERAL, vec![p.field.clone(), p.literal.clone(), e], "FILTER_LITERAL")
        })?;
        self.bound = Some(Bound {
            schema: Arc::clone(schema),
            index,
            literal,
        });
        Ok(())
    }

    fn matches(&self, row: &Row) -> bool {
        let Some(b) = &self.bound else {
            return false;
        };
        let value = match (row.get(b.index), self.predicate.modulus) {
            (None | Some(Value::Null), _) => return false,
            (Some(Value::Integer(i)), Some(m)) => Value::Integer(i.rem_euclid(m)),
            (Some(v), _) => v.clone(),
        };
        if b.literal.is_null() {
            return false;
        }
        self.predicate.op.holds(compare_values(&value, &b.literal))
    }

    fn check_targets(&mut self, io: &dyn RowIo) -> Result<(), StepError> {
        if self.checked_targets {
            return Ok(());
        }
        let targets = io.output_targets();
        for t in [&self.config.send_true_to, &self.config.send_false_to]
            .into_iter()
            .flatten()
        {
            if !targets.contains(t) {
                return Err(StepError::Config(format!(
                    "filter target '{t}' is not an output hop"
                )));
            }
        }
        self.checked_targets = true;
        Ok(())
    }
}

pub fn create(meta: &StepMeta, _copy: usize) -> Result<Box<dyn StepLogic>, StepError> {
    Ok(Box::new(Filter::new(parse_config(meta)?)?))
}

impl StepLogic for Filter {
    fn init(&mut self, ctx: &StepContext) -> Result<(), StepError> {
        self.messages = Arc::clone(&ctx.messages);
        self.bound = None;
        self.checked_targets = false;
        Ok(())
    }

    fn process_row(&mut self, io: &mut dyn RowIo) -> Result<Flow, StepError> {
        self.check_targets(io)?;
        let Some(row) = io.get_row()? else {
            return Ok(Flow::EndOfStream);
        };
        let schema = io
            .input_schema()
            .ok_or_else(|| StepError::Schema("input row without schema".into()))?;
        if let Err((key, args, code)) = self.bind(&schema) {
            let args: Vec<&str> = args.iter().map(String::as_str).collect();
            return Err(self.reject(row, key, &args, code));
        }

        if self.matches(&row) {
            match (&self.config.send_true_to, &self.config.send_false_to) {
                (Some(t), _) => io.put_row_to(t, &schema, row)?,
                (None, Some(f)) => {
                    for t in io.output_targets().iter().filter(|t| *t != f) {
                        io.put_row_to(t, &schema, row.clone())?;
                    }
                }
                (None, None) => io.put_row(&schema, row)?,
            }
        } else if let Some(f) = &self.config.send_false_to {
            io.put_row_to(f, &schema, row)?;
        }
        Ok(Flow::Continue)
    }
}
