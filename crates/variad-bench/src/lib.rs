//! Fixture builders for the matcher benchmarks.

use variad_infer::{DeclarationTable, DeclarationTableBuilder, MatchError};
use variad_types::{Alias, CallSite, ParameterList, Signature, TypeExpr};

const NAMES: [&str; 5] = ["int", "str", "bool", "float", "bytes"];

fn arg(i: usize) -> TypeExpr {
    TypeExpr::concrete(NAMES[i % NAMES.len()])
}

/// Benchmark declarations:
///
/// ```text
/// def framed(int, *Ts, str)
/// def concat(*Ts1, *Ts2, tail: tuple[*Ts2])
/// def zip_lists(*Map[list, Ts])
/// Nest0[*Ts] = tuple[*Ts]
/// NestN[*Ts] = list[NestN-1[*Ts]]
/// ```
pub fn build_table(nest_depth: usize) -> Result<DeclarationTable, MatchError> {
    let mut builder = DeclarationTableBuilder::new();
    let ts = builder.declare_tuple_var("Ts");
    let ts1 = builder.declare_tuple_var("Ts1");
    let ts2 = builder.declare_tuple_var("Ts2");
    let variadic = ParameterList::from_exprs(&[TypeExpr::Unpack(ts)]);

    builder.register_function(Signature::new(
        "framed",
        ParameterList::from_exprs(&[
            TypeExpr::concrete("int"),
            TypeExpr::Unpack(ts),
            TypeExpr::concrete("str"),
        ]),
        TypeExpr::tuple(vec![TypeExpr::Unpack(ts)]),
    ))?;
    builder.register_function(
        Signature::new(
            "concat",
            ParameterList::from_exprs(&[TypeExpr::Unpack(ts1), TypeExpr::Unpack(ts2)]),
            TypeExpr::tuple(vec![TypeExpr::Unpack(ts1), TypeExpr::Unpack(ts2)]),
        )
        .with_keyword("tail", TypeExpr::TupleVariable(ts2)),
    )?;
    builder.register_function(Signature::new(
        "zip_lists",
        ParameterList::from_exprs(&[TypeExpr::map_unpack(TypeExpr::concrete("list"), ts)]),
        TypeExpr::tuple(vec![TypeExpr::Unpack(ts)]),
    ))?;

    builder.register_alias(Alias::new(
        "Nest0",
        variadic.clone(),
        TypeExpr::tuple(vec![TypeExpr::Unpack(ts)]),
    ))?;
    for level in 1..=nest_depth {
        builder.register_alias(Alias::new(
            format!("Nest{level}"),
            variadic.clone(),
            TypeExpr::named_app(
                "list",
                vec![TypeExpr::named_app(format!("Nest{}", level - 1), vec![TypeExpr::Unpack(ts)])],
            ),
        ))?;
    }

    Ok(builder.freeze())
}

/// `framed(int, a1, .., an, str)`
pub fn framed_call(middle: usize) -> CallSite {
    let mut positional = vec![TypeExpr::concrete("int")];
    positional.extend((0..middle).map(arg));
    positional.push(TypeExpr::concrete("str"));
    CallSite::new(positional)
}

/// `concat(a1, .., an, tail=tuple[last half])`
pub fn concat_call(len: usize) -> CallSite {
    let positional: Vec<TypeExpr> = (0..len).map(arg).collect();
    let tail = TypeExpr::tuple(positional[len / 2..].to_vec());
    CallSite::new(positional).with_keyword("tail", tail)
}

/// `zip_lists(list[a1], .., list[an])`
pub fn zip_call(len: usize) -> CallSite {
    CallSite::new(
        (0..len)
            .map(|i| TypeExpr::named_app("list", vec![arg(i)]))
            .collect(),
    )
}

pub fn alias_args(len: usize) -> Vec<TypeExpr> {
    (0..len).map(arg).collect()
}
