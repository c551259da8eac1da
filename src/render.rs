use std::fmt::Write as _;
use std::ops::Range;

use crate::types::{CompiledQuery, Dialect, Predicate, QueryPlan, SqlValue, TableRef};

/// Render a plan into SQL text with placeholders, plus the inlined display form.
#[must_use]
pub fn render(plan: &QueryPlan, dialect: Dialect) -> CompiledQuery {
    let mut bound = Renderer::new(Binding::Placeholders(dialect));
    let (sql, _) = bound.statement(plan);
    let mut inline = Renderer::new(Binding::Inline);
    let (inline_sql, predicate_span) = inline.statement(plan);
    CompiledQuery {
        sql,
        params: bound.params,
        limit: plan.limit,
        inline_sql,
        predicate_span,
    }
}

#[derive(Debug, Clone, Copy)]
enum Binding {
    Placeholders(Dialect),
    Inline,
}

struct Renderer {
    binding: Binding,
    params: Vec<SqlValue>,
    out: String,
}

impl Renderer {
    fn new(binding: Binding) -> Self {
        Self {
            binding,
            params: Vec::new(),
            out: String::new(),
        }
    }

    /// Returns the statement and the byte range of its WHERE predicate.
    fn statement(&mut self, plan: &QueryPlan) -> (String, Range<usize>) {
        self.out.push_str("SELECT * FROM ");
        self.table(&plan.table);
        self.out.push_str(" WHERE ");
        let start = self.out.len();
        self.predicate(&plan.predicate, 0);
        let span = start..self.out.len();
        // The limit is a trusted constant, never user input.
        let _ = write!(self.out, " LIMIT {}", plan.limit);
        (std::mem::take(&mut self.out), span)
    }

    fn table(&mut self, table: &TableRef) {
        if let Some(schema) = &table.schema {
            push_ident(&mut self.out, schema);
            self.out.push('.');
        }
        push_ident(&mut self.out, &table.name);
    }

    fn bind(&mut self, value: &SqlValue) {
        match self.binding {
            Binding::Placeholders(dialect) => {
                self.params.push(value.clone());
                self.out.push_str(&dialect.placeholder(self.params.len()));
            }
            Binding::Inline => {
                let _ = write!(self.out, "{value}");
            }
        }
    }

    /// Compound nodes nested below depth 0 are parenthesized so that mixed
    /// AND/OR never depend on SQL precedence.
    fn predicate(&mut self, predicate: &Predicate, depth: usize) {
        match predicate {
            Predicate::True => self.out.push_str("1=1"),
            Predicate::Compare { column, op, value } => {
                push_ident(&mut self.out, column);
                let _ = write!(self.out, " {op} ");
                self.bind(value);
            }
            Predicate::Like {
                column,
                pattern,
                negated,
            } => {
                push_ident(&mut self.out, column);
                self.out
                    .push_str(if *negated { " NOT LIKE " } else { " LIKE " });
                self.bind(&SqlValue::Text(pattern.clone()));
                self.out.push_str(" ESCAPE '\\'");
            }
            Predicate::Between { column, low, high } => {
                push_ident(&mut self.out, column);
                self.out.push_str(" BETWEEN ");
                self.bind(low);
                self.out.push_str(" AND ");
                self.bind(high);
            }
            Predicate::IsNull { column, negated } => {
                push_ident(&mut self.out, column);
                self.out
                    .push_str(if *negated { " IS NOT NULL" } else { " IS NULL" });
            }
            Predicate::Member {
                key,
                lookup,
                negated,
            } => {
                push_ident(&mut self.out, key);
                self.out.push_str(if *negated { " NOT IN " } else { " IN " });
                self.out.push_str("(SELECT ");
                push_ident(&mut self.out, &lookup.key_column);
                self.out.push_str(" FROM ");
                push_ident(&mut self.out, &lookup.table);
                self.out.push_str(" WHERE ");
                push_ident(&mut self.out, &lookup.segment_column);
                self.out.push_str(" = ");
                self.bind(&SqlValue::Text(lookup.segment_id.clone()));
                self.out.push(')');
            }
            Predicate::And(parts) => self.compound(parts, " AND ", depth),
            Predicate::Or(parts) => self.compound(parts, " OR ", depth),
        }
    }

    fn compound(&mut self, parts: &[Predicate], sep: &str, depth: usize) {
        if depth > 0 {
            self.out.push('(');
        }
        for (i, part) in parts.iter().enumerate() {
            if i > 0 {
                self.out.push_str(sep);
            }
            self.predicate(part, depth + 1);
        }
        if depth > 0 {
            self.out.push(')');
        }
    }
}

/// Write an identifier, double-quoting it unless it is a plain
/// `[A-Za-z_][A-Za-z0-9_]*` name.
pub(crate) fn push_ident(out: &mut String, ident: &str) {
    let mut chars = ident.chars();
    let plain = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if plain {
        out.push_str(ident);
    } else {
        out.push('"');
        out.push_str(&ident.replace('"', "\"\""));
        out.push('"');
    }
}
