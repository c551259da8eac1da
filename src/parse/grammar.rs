use winnow::ascii::{dec_uint, till_line_ending};
use winnow::combinator::{alt, cut_err, not, opt, preceded, repeat, terminated};
use winnow::error::{ContextError, ErrMode, ModalResult, StrContext, StrContextValue};
use winnow::prelude::*;
use winnow::token::{any, one_of, take_while};

use crate::{
    BoolOp, Condition, ConditionGroup, MembershipMode, Node, Operator, SegmentDefinition,
    SegmentRef,
};

enum Statement {
    Description(String),
    Dataset(String),
    Match(BoolOp),
    Where(Condition),
    Group(ConditionGroup),
    Member(SegmentRef, MembershipMode),
}

fn label(what: &'static str) -> StrContext {
    StrContext::Expected(StrContextValue::Description(what))
}

// -- Whitespace & comments --------------------------------------------------

fn ws(input: &mut &str) -> ModalResult<()> {
    let _: () = repeat(
        0..,
        alt((
            take_while(1.., |c: char| c.is_ascii_whitespace()).void(),
            ('#', till_line_ending).void(),
        )),
    )
    .parse_next(input)?;
    Ok(())
}

/// A keyword not immediately followed by another identifier character.
fn keyword<'i>(kw: &'static str) -> impl Parser<&'i str, &'i str, ErrMode<ContextError>> {
    terminated(kw, not(one_of(|c: char| c.is_ascii_alphanumeric() || c == '_')))
}

// -- Identifiers & values ---------------------------------------------------

fn ident<'i>(input: &mut &'i str) -> ModalResult<&'i str> {
    (
        take_while(1.., |c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(0.., |c: char| {
            c.is_ascii_alphanumeric() || c == '_' || c == '.'
        }),
    )
        .take()
        .parse_next(input)
}

fn string_literal(input: &mut &str) -> ModalResult<String> {
    '"'.parse_next(input)?;
    let mut s = String::new();
    loop {
        match any.parse_next(input)? {
            '"' => return Ok(s),
            '\\' => match any.parse_next(input)? {
                '"' => s.push('"'),
                '\\' => s.push('\\'),
                'n' => s.push('\n'),
                't' => s.push('\t'),
                other => {
                    s.push('\\');
                    s.push(other);
                }
            },
            c => s.push(c),
        }
    }
}

/// Field and dataset names: a bare identifier or a quoted string.
fn name(input: &mut &str) -> ModalResult<String> {
    alt((string_literal, ident.map(str::to_owned))).parse_next(input)
}

/// Condition values stay text; typing happens at compile time.
fn value(input: &mut &str) -> ModalResult<String> {
    alt((
        string_literal,
        take_while(1.., |c: char| {
            c.is_ascii_alphanumeric() || matches!(c, '-' | '+' | '.' | '_' | ':' | '@')
        })
        .map(str::to_owned),
    ))
    .parse_next(input)
}

fn operator(input: &mut &str) -> ModalResult<Operator> {
    alt((
        "!=".value(Operator::NotEquals),
        "==".value(Operator::Equals),
        "=".value(Operator::Equals),
        ">".value(Operator::GreaterThan),
        "<".value(Operator::LessThan),
        ident.verify_map(Operator::from_name),
    ))
    .parse_next(input)
}

fn bool_op(input: &mut &str) -> ModalResult<BoolOp> {
    alt((
        keyword("all").value(BoolOp::And),
        keyword("any").value(BoolOp::Or),
    ))
    .parse_next(input)
}

// -- Clauses ----------------------------------------------------------------

fn where_clause(input: &mut &str) -> ModalResult<Condition> {
    keyword("where").parse_next(input)?;
    let field = cut_err(preceded(ws, name))
        .context(label("field name"))
        .parse_next(input)?;
    let op = cut_err(preceded(ws, operator))
        .context(label("operator"))
        .parse_next(input)?;

    let mut condition = Condition::new(field, op);
    if !op.requires_value() {
        return Ok(condition);
    }
    let low = cut_err(preceded(ws, value))
        .context(label("value"))
        .parse_next(input)?;
    condition.value = Some(low);
    if op == Operator::Between {
        let high = cut_err(preceded((ws, keyword("and"), ws), value))
            .context(label("`and <upper bound>`"))
            .parse_next(input)?;
        condition.value2 = Some(high);
    }
    Ok(condition)
}

/// `include|exclude "id" ["display name" [count]]`
fn membership(input: &mut &str) -> ModalResult<(SegmentRef, MembershipMode)> {
    let mode = alt((
        keyword("include").value(MembershipMode::Include),
        keyword("exclude").value(MembershipMode::Exclude),
    ))
    .parse_next(input)?;
    let id = cut_err(preceded(ws, string_literal))
        .context(label("segment id"))
        .parse_next(input)?;
    let display = opt(preceded(ws, string_literal)).parse_next(input)?;
    let count = opt(preceded(ws, dec_uint::<_, u64, _>)).parse_next(input)?;

    let display = display.unwrap_or_else(|| id.clone());
    Ok((SegmentRef::new(id, display, count.unwrap_or(0)), mode))
}

fn group_item(input: &mut &str) -> ModalResult<Node> {
    ws.parse_next(input)?;
    alt((
        where_clause.map(Node::Attribute),
        group_block.map(Node::Group),
        membership.map(|(segment, mode)| Node::Membership { segment, mode }),
    ))
    .parse_next(input)
}

fn group_block(input: &mut &str) -> ModalResult<ConditionGroup> {
    keyword("group").parse_next(input)?;
    let op = cut_err(preceded(ws, bool_op))
        .context(label("`all` or `any`"))
        .parse_next(input)?;
    cut_err((ws, '{')).context(label("`{`")).parse_next(input)?;
    let children: Vec<Node> = repeat(0.., group_item).parse_next(input)?;
    cut_err((ws, '}'))
        .context(label("condition or `}`"))
        .parse_next(input)?;

    let mut group = ConditionGroup::new(op);
    group.children = children;
    Ok(group)
}

fn statement(input: &mut &str) -> ModalResult<Statement> {
    ws.parse_next(input)?;
    alt((
        preceded(keyword("description"), cut_err(preceded(ws, string_literal)))
            .map(Statement::Description),
        preceded(keyword("dataset"), cut_err(preceded(ws, name))).map(Statement::Dataset),
        preceded(keyword("match"), cut_err(preceded(ws, bool_op))).map(Statement::Match),
        where_clause.map(Statement::Where),
        group_block.map(Statement::Group),
        membership.map(|(segment, mode)| Statement::Member(segment, mode)),
    ))
    .parse_next(input)
}

// -- Top-level parser -------------------------------------------------------

pub fn segment(input: &mut &str) -> ModalResult<SegmentDefinition> {
    ws.parse_next(input)?;
    keyword("segment")
        .context(label("`segment`"))
        .parse_next(input)?;
    let name = cut_err(preceded(ws, string_literal))
        .context(label("segment name"))
        .parse_next(input)?;
    cut_err((ws, '{')).context(label("`{`")).parse_next(input)?;
    let statements: Vec<Statement> = repeat(0.., statement).parse_next(input)?;
    cut_err((ws, '}'))
        .context(label("statement or `}`"))
        .parse_next(input)?;
    ws.parse_next(input)?;

    let mut def = SegmentDefinition::new(name);
    for statement in statements {
        match statement {
            Statement::Description(text) => def.set_description(text),
            Statement::Dataset(dataset) => def.select_dataset(dataset),
            Statement::Match(op) => def.set_root_operator(op),
            Statement::Where(condition) => {
                def.add_condition(condition);
            }
            Statement::Group(group) => {
                def.add_group(group);
            }
            Statement::Member(segment, mode) => {
                let _ = def.memberships.add(segment, mode);
            }
        }
    }
    Ok(def)
}

#[cfg(test)]
mod tests {
    use crate::parse::parse;

    use super::*;

    #[test]
    fn parse_minimal_segment() {
        let def = parse(r#"segment "All" {}"#).unwrap();
        assert_eq!(def.name, "All");
        assert!(def.conditions.is_empty());
        assert_eq!(def.selected_dataset, None);
    }

    #[test]
    fn parse_header_statements() {
        let def = parse(
            r#"segment "Hanoi" {
                description "Customers in Hanoi"
                dataset customers
                match any
            }"#,
        )
        .unwrap();
        assert_eq!(def.description, "Customers in Hanoi");
        assert_eq!(def.selected_dataset.as_deref(), Some("customers"));
        assert_eq!(def.root_operator, BoolOp::Or);
    }

    #[test]
    fn parse_operator_names_and_aliases() {
        let cases = [
            ("equals", Operator::Equals),
            ("=", Operator::Equals),
            ("==", Operator::Equals),
            ("!=", Operator::NotEquals),
            ("not_equals", Operator::NotEquals),
            (">", Operator::GreaterThan),
            ("<", Operator::LessThan),
            ("contains", Operator::Contains),
            ("not_contains", Operator::NotContains),
            ("starts_with", Operator::StartsWith),
            ("ends_with", Operator::EndsWith),
        ];
        for (sym, expected) in cases {
            let def = parse(&format!(r#"segment "s" {{ where x {sym} "v" }}"#)).unwrap();
            assert_eq!(def.conditions[0].operator, expected, "failed for {sym}");
            assert_eq!(def.conditions[0].value.as_deref(), Some("v"));
        }
    }

    #[test]
    fn parse_null_and_between() {
        let def = parse(
            r#"segment "s" {
                where email is_not_null
                where phone is_null
                where age between 18 and 25
            }"#,
        )
        .unwrap();
        assert_eq!(def.conditions[0], Condition::new("email", Operator::IsNotNull));
        assert_eq!(def.conditions[1], Condition::new("phone", Operator::IsNull));
        assert_eq!(
            def.conditions[2],
            Condition::new("age", Operator::Between)
                .with_value("18")
                .with_value2("25")
        );
    }

    #[test]
    fn parse_bare_values_stay_text() {
        let def = parse(r#"segment "s" { where signup > 2024-01-01 }"#).unwrap();
        assert_eq!(def.conditions[0].value.as_deref(), Some("2024-01-01"));
    }

    #[test]
    fn parse_quoted_field_name() {
        let def = parse(r#"segment "s" { where "First Name" starts_with "A" }"#).unwrap();
        assert_eq!(def.conditions[0].field, "First Name");
    }

    #[test]
    fn parse_nested_groups() {
        let def = parse(
            r#"segment "s" {
                group any {
                    where tier = "gold"
                    group all { where churned equals "false" }
                    include "vip"
                }
            }"#,
        )
        .unwrap();
        let group = &def.condition_groups[0];
        assert_eq!(group.operator, BoolOp::Or);
        assert_eq!(group.children.len(), 3);
        assert!(matches!(&group.children[1], Node::Group(g) if g.operator == BoolOp::And));
        assert!(matches!(
            &group.children[2],
            Node::Membership { mode: MembershipMode::Include, segment } if segment.id == "vip"
        ));
    }

    #[test]
    fn parse_memberships() {
        let def = parse(
            r#"segment "s" {
                include "seg1" "Loyal buyers" 1200
                include "seg1" "Loyal again"
                exclude "seg2"
            }"#,
        )
        .unwrap();
        assert_eq!(
            def.inclusions(),
            [SegmentRef::new("seg1", "Loyal buyers", 1200)]
        );
        assert_eq!(def.exclusions(), [SegmentRef::new("seg2", "seg2", 0)]);
    }

    #[test]
    fn parse_comments() {
        let def = parse(
            "# leading\nsegment \"s\" { # after brace\n  where a = 1 # trailing\n}\n# end",
        )
        .unwrap();
        assert_eq!(def.conditions.len(), 1);
    }

    #[test]
    fn parse_string_with_escapes() {
        let def = parse(r#"segment "s" { where x = "a\"b\\c" }"#).unwrap();
        assert_eq!(def.conditions[0].value.as_deref(), Some("a\"b\\c"));
    }

    #[test]
    fn keyword_requires_boundary() {
        assert!(parse(r#"segment "s" { wherex = 1 }"#).is_err());
    }

    #[test]
    fn unknown_operator_is_error() {
        assert!(parse(r#"segment "s" { where x resembles "y" }"#).is_err());
    }

    #[test]
    fn between_requires_upper_bound() {
        assert!(parse(r#"segment "s" { where age between 18 }"#).is_err());
    }

    #[test]
    fn unclosed_block_is_error() {
        assert!(parse(r#"segment "s" { where a = 1"#).is_err());
    }
}
